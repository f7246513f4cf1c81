use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use shared::error::CallError;
use shared::settings::{parse_endpoint, require_credential, AuthScheme, ProviderRecord};

use crate::{
    apply_auth, check_status, transport_error, ByteStream, GenerationBackend, GenerationRequest,
    SHARED_HTTP,
};

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Streaming client for OpenAI-compatible `chat/completions` endpoints.
pub struct OpenAIClient {
    http: Client,
    url: String,
    auth_scheme: AuthScheme,
    auth_token: Option<String>,
}

impl OpenAIClient {
    /// A bare host (no path) gets the standard completions path appended;
    /// an endpoint with a path is used as is.
    pub fn from_record(provider: &ProviderRecord) -> Result<Self, CallError> {
        let endpoint = parse_endpoint(&provider.endpoint)?;
        let auth_token = require_credential(provider.auth_scheme, provider.credential.as_deref())?;

        let url = if endpoint.path() == "/" {
            format!(
                "{}{}",
                endpoint.as_str().trim_end_matches('/'),
                COMPLETIONS_PATH
            )
        } else {
            endpoint.to_string()
        };

        Ok(Self {
            http: SHARED_HTTP.clone(),
            url,
            auth_scheme: provider.auth_scheme,
            auth_token,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl GenerationBackend for OpenAIClient {
    async fn stream_chat(&self, request: GenerationRequest) -> Result<ByteStream, CallError> {
        tracing::debug!(
            url = %self.url,
            model = %request.model,
            messages = request.messages.len(),
            "sending chat completion request"
        );
        let req = self
            .http
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&request);
        let resp = apply_auth(req, self.auth_scheme, self.auth_token.as_deref())
            .send()
            .await
            .map_err(transport_error)?;
        let resp = check_status(resp).await?;

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(transport_error));
        Ok(stream.boxed())
    }
}
