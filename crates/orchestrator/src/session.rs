use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use providers::{BackendFactory, HttpBackends};
use shared::agent_api::ChatMessage;
use shared::error::{CallError, StageError};
use shared::events::{ConversationLog, LogEntry};
use shared::settings::{ConfigSource, TurnOptions};
use shared::sink::OutputSink;
use tracing::Instrument;
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::history::SessionHistory;
use crate::renderer::RENDER_INTERVAL;
use crate::turn::{RetrievalResult, Turn, TurnInput, TurnOutcome, TurnPhase};

/// A conversation: shared history plus the collaborators every turn needs.
///
/// Each call to [`Session::ask`] owns its own stream buffer, render state and
/// token, so turns on one session do not interfere with each other.
pub struct Session {
    config: Arc<dyn ConfigSource>,
    backends: Arc<dyn BackendFactory>,
    history: Mutex<SessionHistory>,
    log: Option<Arc<dyn ConversationLog>>,
    render_interval: Duration,
}

impl Session {
    pub fn new(config: Arc<dyn ConfigSource>) -> Self {
        Self::with_backends(config, Arc::new(HttpBackends))
    }

    pub fn with_backends(
        config: Arc<dyn ConfigSource>,
        backends: Arc<dyn BackendFactory>,
    ) -> Self {
        Self {
            config,
            backends,
            history: Mutex::new(SessionHistory::new()),
            log: None,
            render_interval: RENDER_INTERVAL,
        }
    }

    /// Completed turns are also appended to this log.
    pub fn with_log(mut self, log: Arc<dyn ConversationLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_render_interval(mut self, interval: Duration) -> Self {
        self.render_interval = interval;
        self
    }

    pub async fn ask(
        &self,
        question: &str,
        options: &TurnOptions,
        sink: &dyn OutputSink,
        token: &CancellationToken,
    ) -> TurnOutcome {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("turn", %id);
        async move {
            tracing::info!(dataset = ?options.dataset, "turn started");
            let turn = Turn::new(id, sink, token.clone(), self.render_interval);

            let config = match self.config.turn_config() {
                Ok(config) => config,
                Err(e) => {
                    let source = CallError::Config(format!("{:#}", e));
                    let error = if options.dataset.is_some() {
                        StageError::knowledge(source)
                    } else {
                        StageError::model(source)
                    };
                    let retrieval = RetrievalResult {
                        used_knowledge_base: options.dataset.is_some(),
                        ..Default::default()
                    };
                    return turn.fail(error, String::new(), retrieval);
                }
            };

            let history = if options.include_history {
                self.context()
            } else {
                Vec::new()
            };

            let outcome = turn
                .run(TurnInput {
                    question,
                    options,
                    config: &config,
                    backends: self.backends.as_ref(),
                    history,
                })
                .await;

            if outcome.phase == TurnPhase::Done {
                self.record(question, options, &outcome);
            }
            outcome
        }
        .instrument(span)
        .await
    }

    fn record(&self, question: &str, options: &TurnOptions, outcome: &TurnOutcome) {
        self.history.lock().append(question, &outcome.text);

        if let Some(log) = &self.log {
            let entry = LogEntry::completed(
                outcome.id,
                question,
                outcome.text.clone(),
                outcome.retrieval.match_count,
                options.dataset.clone(),
            );
            if let Err(e) = log.append(entry) {
                tracing::warn!(error = %e, "failed to append conversation log");
            }
        }
    }

    fn context(&self) -> Vec<ChatMessage> {
        self.history.lock().to_context()
    }

    /// Snapshot of the current history.
    pub fn history(&self) -> SessionHistory {
        self.history.lock().clone()
    }

    pub fn reset(&self) {
        self.history.lock().clear();
        tracing::info!("session reset");
    }
}
