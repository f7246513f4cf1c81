pub mod document;
pub mod error;
pub mod events;
pub mod sink;

pub mod settings {
    use serde::{Deserialize, Serialize};

    use crate::error::CallError;

    pub const DEFAULT_SIMILARITY: f32 = 0.2;
    pub const DEFAULT_TOP_N: u32 = 6;
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const DEFAULT_MAX_TOKENS: u32 = 2048;

    fn default_true() -> bool {
        true
    }

    fn default_similarity() -> f32 {
        DEFAULT_SIMILARITY
    }

    fn default_top_n() -> u32 {
        DEFAULT_TOP_N
    }

    fn default_temperature() -> f32 {
        DEFAULT_TEMPERATURE
    }

    fn default_max_tokens() -> u32 {
        DEFAULT_MAX_TOKENS
    }

    /// How the credential is attached to outgoing requests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    #[serde(rename_all = "snake_case")]
    pub enum AuthScheme {
        /// `Authorization: Bearer <credential>`
        #[default]
        Bearer,
        /// `api-key: <credential>`
        ApiKeyHeader,
        /// No credential sent (local gateways)
        None,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ProviderRecord {
        pub endpoint: String,
        #[serde(default)]
        pub credential: Option<String>,
        #[serde(default)]
        pub auth_scheme: AuthScheme,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ModelRecord {
        pub name: String,
        #[serde(default = "default_max_tokens")]
        pub max_tokens: u32,
        #[serde(default = "default_temperature")]
        pub temperature: f32,
        #[serde(default)]
        pub is_default: bool,
    }

    /// Retrieval tuning plus the system prompt used for generation.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ParameterRule {
        #[serde(default = "default_similarity")]
        pub similarity: f32,
        #[serde(default = "default_top_n")]
        pub top_n: u32,
        #[serde(default = "default_temperature")]
        pub temperature: f32,
        #[serde(default)]
        pub system_prompt: Option<String>,
    }

    impl Default for ParameterRule {
        fn default() -> Self {
            Self {
                similarity: DEFAULT_SIMILARITY,
                top_n: DEFAULT_TOP_N,
                temperature: DEFAULT_TEMPERATURE,
                system_prompt: None,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct KnowledgeService {
        pub endpoint: String,
        #[serde(default)]
        pub credential: Option<String>,
        #[serde(default = "default_true")]
        pub enabled: bool,
    }

    /// Everything a single turn needs from the configuration source.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TurnConfig {
        pub provider: ProviderRecord,
        #[serde(default)]
        pub models: Vec<ModelRecord>,
        #[serde(default)]
        pub rule: ParameterRule,
        #[serde(default)]
        pub knowledge: Option<KnowledgeService>,
    }

    impl TurnConfig {
        /// The model flagged as default, else the first one listed.
        pub fn active_model(&self) -> Result<&ModelRecord, CallError> {
            self.models
                .iter()
                .find(|m| m.is_default)
                .or_else(|| self.models.first())
                .ok_or_else(|| CallError::Config("no model configured".into()))
        }

        /// The knowledge service, provided it exists and is switched on.
        pub fn enabled_knowledge(&self) -> Result<&KnowledgeService, CallError> {
            match &self.knowledge {
                Some(k) if k.enabled => Ok(k),
                Some(_) => Err(CallError::Config("knowledge service is disabled".into())),
                None => Err(CallError::Config("no knowledge service configured".into())),
            }
        }
    }

    /// Validate a configured endpoint before any call is attempted.
    pub fn parse_endpoint(raw: &str) -> Result<url::Url, CallError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CallError::Config("endpoint is empty".into()));
        }
        let parsed = url::Url::parse(trimmed)
            .map_err(|e| CallError::Config(format!("invalid endpoint '{}': {}", trimmed, e)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(CallError::Config(format!(
                "unsupported endpoint scheme '{}'",
                other
            ))),
        }
    }

    /// Return the credential a scheme needs, or a config error when it is missing.
    pub fn require_credential(
        scheme: AuthScheme,
        credential: Option<&str>,
    ) -> Result<Option<String>, CallError> {
        match (scheme, credential.map(str::trim)) {
            (AuthScheme::None, _) => Ok(None),
            (_, Some(c)) if !c.is_empty() => Ok(Some(c.to_string())),
            _ => Err(CallError::Config("credential is missing".into())),
        }
    }

    /// Per-turn options chosen by the caller.
    #[derive(Debug, Clone)]
    pub struct TurnOptions {
        /// Knowledge-base selector. `None` means direct generation.
        pub dataset: Option<String>,
        pub language: String,
        pub include_history: bool,
    }

    impl Default for TurnOptions {
        fn default() -> Self {
            Self {
                dataset: None,
                language: "en".into(),
                include_history: true,
            }
        }
    }

    /// Supplies configuration records for each turn.
    pub trait ConfigSource: Send + Sync {
        fn turn_config(&self) -> anyhow::Result<TurnConfig>;
    }

    /// A fixed configuration, handy when embedding the client.
    pub struct StaticConfig(pub TurnConfig);

    impl ConfigSource for StaticConfig {
        fn turn_config(&self) -> anyhow::Result<TurnConfig> {
            Ok(self.0.clone())
        }
    }
}

pub mod agent_api {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Role {
        System,
        User,
        Assistant,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChatMessage {
        pub role: Role,
        pub content: String,
    }

    impl ChatMessage {
        pub fn system(content: impl Into<String>) -> Self {
            Self {
                role: Role::System,
                content: content.into(),
            }
        }

        pub fn user(content: impl Into<String>) -> Self {
            Self {
                role: Role::User,
                content: content.into(),
            }
        }

        pub fn assistant(content: impl Into<String>) -> Self {
            Self {
                role: Role::Assistant,
                content: content.into(),
            }
        }
    }
}
