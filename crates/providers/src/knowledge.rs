//! HTTP client for the knowledge retrieval service.
//!
//! One non-streaming POST per turn; a body `status` other than `"200"` is a
//! service-side failure carrying the service's own message.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::error::CallError;
use shared::settings::{parse_endpoint, AuthScheme, KnowledgeService};

use crate::{
    apply_auth, check_status, transport_error, RetrievalBackend, RetrievalRequest, SHARED_HTTP,
};

#[derive(Debug, Deserialize)]
struct RetrievalResponse {
    /// Sent as `"200"` by the service; numbers are tolerated too.
    status: serde_json::Value,
    #[serde(default)]
    data: Option<Vec<String>>,
    #[serde(default, alias = "msg")]
    message: Option<String>,
}

impl RetrievalResponse {
    fn is_ok(&self) -> bool {
        match &self.status {
            serde_json::Value::String(s) => s.trim() == "200",
            serde_json::Value::Number(n) => n.as_u64() == Some(200),
            _ => false,
        }
    }
}

pub struct KnowledgeClient {
    http: Client,
    url: String,
    credential: Option<String>,
}

impl KnowledgeClient {
    pub fn from_record(service: &KnowledgeService) -> Result<Self, CallError> {
        if !service.enabled {
            return Err(CallError::Config("knowledge service is disabled".into()));
        }
        let url = parse_endpoint(&service.endpoint)?;
        let credential = service
            .credential
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        Ok(Self {
            http: SHARED_HTTP.clone(),
            url: url.to_string(),
            credential,
        })
    }
}

#[async_trait]
impl RetrievalBackend for KnowledgeClient {
    async fn retrieve(&self, request: RetrievalRequest) -> Result<Vec<String>, CallError> {
        tracing::debug!(
            url = %self.url,
            dataset = %request.dataset_name,
            topn = request.topn,
            "sending retrieval request"
        );
        let req = self.http.post(&self.url).json(&request);
        let resp = apply_auth(req, AuthScheme::Bearer, self.credential.as_deref())
            .send()
            .await
            .map_err(|e| CallError::Transport(format!("retrieval request failed: {}", e)))?;
        let resp = check_status(resp).await?;

        let body: RetrievalResponse = resp
            .json()
            .await
            .map_err(|e| {
                if e.is_decode() {
                    CallError::Rejected(format!("unreadable retrieval response: {}", e))
                } else {
                    transport_error(e)
                }
            })?;

        if !body.is_ok() {
            let message = body
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("retrieval failed with status {}", body.status));
            return Err(CallError::Rejected(message));
        }
        Ok(body.data.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(endpoint: &str) -> KnowledgeService {
        KnowledgeService {
            endpoint: endpoint.to_string(),
            credential: Some("kb-key".into()),
            enabled: true,
        }
    }

    fn request() -> RetrievalRequest {
        RetrievalRequest {
            question: "what is x".into(),
            similarity: 0.2,
            topn: 3,
            dataset_name: "docs".into(),
            temperature: 0.7,
            language: "en".into(),
        }
    }

    #[tokio::test]
    async fn test_retrieve_returns_snippets() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer kb-key"))
            .and(body_json(serde_json::json!({
                "question": "what is x",
                "similarity": 0.2,
                "topn": 3,
                "dataset_name": "docs",
                "temperature": 0.7,
                "language": "en"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "200",
                "data": ["x is a letter", "x marks the spot"]
            })))
            .mount(&server)
            .await;

        let client = KnowledgeClient::from_record(&service(&server.uri())).unwrap();
        let items = client.retrieve(request()).await.unwrap();
        assert_eq!(items, vec!["x is a letter", "x marks the spot"]);
    }

    #[tokio::test]
    async fn test_empty_data_is_zero_matches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "200", "data": []})),
            )
            .mount(&server)
            .await;

        let client = KnowledgeClient::from_record(&service(&server.uri())).unwrap();
        assert!(client.retrieve(request()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_200_status_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "500",
                "message": "dataset docs not found"
            })))
            .mount(&server)
            .await;

        let client = KnowledgeClient::from_record(&service(&server.uri())).unwrap();
        let err = client.retrieve(request()).await.unwrap_err();
        assert_eq!(err, CallError::Rejected("dataset docs not found".into()));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = KnowledgeClient::from_record(&service(&server.uri())).unwrap();
        let err = client.retrieve(request()).await.unwrap_err();
        assert!(matches!(err, CallError::HttpStatus { status: 503, .. }));
    }

    #[test]
    fn test_disabled_service_is_config_error() {
        let mut s = service("http://kb.local");
        s.enabled = false;
        assert!(matches!(
            KnowledgeClient::from_record(&s),
            Err(CallError::Config(_))
        ));
    }
}
