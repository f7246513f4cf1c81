//! Structured errors for the two backend stages.
//!
//! The stage tag is attached where the call is issued, so a generation
//! failure can never be mistaken for a retrieval failure.

use serde::{Deserialize, Serialize};

/// Failure of a single backend call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    #[error("connection failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// The service answered but reported a failure in its body.
    #[error("{0}")]
    Rejected(String),
}

impl CallError {
    /// Remediation string for an HTTP status, if the status is an error.
    pub fn status_hint(status: u16) -> Option<&'static str> {
        let hint = match status {
            400 => "The request was rejected as malformed; check the model name and parameter values",
            401 => "The credential was refused; re-enter the API key",
            403 => "The credential has no access to this resource; check account permissions",
            404 => "The endpoint was not found; check the configured URL and path",
            408 => "The service timed out waiting for the request; try again",
            413 => "The request is too large; shorten the question or lower the match count",
            422 => "The service could not process the parameters; check max tokens and temperature",
            429 => "Rate limit or quota exceeded; wait a moment or check your plan",
            500 => "The service hit an internal error; try again later",
            502 | 504 => "A gateway between you and the service failed; try again later",
            503 => "The service is temporarily unavailable or overloaded; try again later",
            400..=499 => "The service rejected the request; review the configuration",
            500..=599 => "The service failed to answer; try again later",
            _ => return None,
        };
        Some(hint)
    }

    fn hint(&self) -> Option<&'static str> {
        match self {
            CallError::HttpStatus { status, .. } => Self::status_hint(*status),
            CallError::Transport(_) => {
                Some("The service could not be reached; check the network and endpoint")
            }
            CallError::Config(_) => Some("Complete the missing settings before asking again"),
            CallError::Rejected(_) => None,
        }
    }
}

/// Which backend call a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Knowledge,
    Model,
}

impl Stage {
    fn remediation(self) -> &'static [&'static str] {
        match self {
            Stage::Knowledge => &[
                "Check the knowledge service endpoint and credential",
                "Make sure the knowledge service is enabled",
                "Confirm the selected dataset exists on the knowledge service",
            ],
            Stage::Model => &[
                "Check the provider endpoint and API key",
                "Confirm the model name is available to your account",
                "Lower max tokens if the model limit is smaller",
            ],
        }
    }

    fn title(self) -> &'static str {
        match self {
            Stage::Knowledge => "Knowledge base request failed",
            Stage::Model => "Model request failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{stage:?} stage: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: CallError,
}

impl StageError {
    pub fn knowledge(source: CallError) -> Self {
        Self {
            stage: Stage::Knowledge,
            source,
        }
    }

    pub fn model(source: CallError) -> Self {
        Self {
            stage: Stage::Model,
            source,
        }
    }

    pub fn panel(&self) -> ErrorPanel {
        let mut hints: Vec<String> = Vec::new();
        if let Some(h) = self.source.hint() {
            hints.push(h.to_string());
        }
        hints.extend(self.stage.remediation().iter().map(|s| s.to_string()));
        ErrorPanel {
            stage: self.stage,
            title: self.stage.title().to_string(),
            message: self.source.to_string(),
            hints,
        }
    }
}

/// What the tip channel shows when a turn fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPanel {
    pub stage: Stage,
    pub title: String,
    pub message: String,
    pub hints: Vec<String>,
}
