pub mod knowledge;
pub mod openai;
pub mod sse;

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use shared::agent_api::ChatMessage;
use shared::error::CallError;
use shared::settings::{AuthScheme, KnowledgeService, ProviderRecord};

pub use knowledge::KnowledgeClient;
pub use openai::OpenAIClient;

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .read_timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

/// Raw response body chunks of a streaming call.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, CallError>>;

/// Body of the streaming chat-completion call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

/// Body of the knowledge retrieval call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalRequest {
    pub question: String,
    pub similarity: f32,
    pub topn: u32,
    pub dataset_name: String,
    pub temperature: f32,
    pub language: String,
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send the request and hand back the body stream once the status is known to be good.
    async fn stream_chat(&self, request: GenerationRequest) -> Result<ByteStream, CallError>;
}

#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// Retrieved snippets, best match first.
    async fn retrieve(&self, request: RetrievalRequest) -> Result<Vec<String>, CallError>;
}

/// Builds backends from configuration records. Config problems surface here,
/// before any request is sent.
pub trait BackendFactory: Send + Sync {
    fn retrieval(&self, service: &KnowledgeService) -> Result<Box<dyn RetrievalBackend>, CallError>;
    fn generation(&self, provider: &ProviderRecord)
        -> Result<Box<dyn GenerationBackend>, CallError>;
}

/// Production factory backed by `reqwest`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpBackends;

impl BackendFactory for HttpBackends {
    fn retrieval(&self, service: &KnowledgeService) -> Result<Box<dyn RetrievalBackend>, CallError> {
        Ok(Box::new(KnowledgeClient::from_record(service)?))
    }

    fn generation(
        &self,
        provider: &ProviderRecord,
    ) -> Result<Box<dyn GenerationBackend>, CallError> {
        Ok(Box::new(OpenAIClient::from_record(provider)?))
    }
}

pub(crate) fn apply_auth(
    req: RequestBuilder,
    scheme: AuthScheme,
    credential: Option<&str>,
) -> RequestBuilder {
    match (scheme, credential) {
        (AuthScheme::Bearer, Some(c)) => req.bearer_auth(c),
        (AuthScheme::ApiKeyHeader, Some(c)) => req.header("api-key", c),
        _ => req,
    }
}

pub(crate) fn transport_error(e: reqwest::Error) -> CallError {
    CallError::Transport(e.to_string())
}

/// Turn a non-success response into `CallError::HttpStatus`, keeping a slice of the body.
pub(crate) async fn check_status(resp: Response) -> Result<Response, CallError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let detail: String = body.trim().chars().take(800).collect();
    let message = if detail.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        detail
    };
    Err(CallError::HttpStatus {
        status: status.as_u16(),
        message,
    })
}
