//! One question/answer exchange: optional retrieval, then streamed generation.
//!
//! ```text
//! Idle -> Retrieving -> ShortCircuit
//!      \            \-> Generating -> Streaming -> Done | Stopped | Failed
//!       \-------------/
//! ```
//! Without a dataset selector the turn goes straight to `Generating`.

use std::fmt::Write;
use std::time::Duration;

use futures::StreamExt;
use providers::sse::StreamBuffer;
use providers::{BackendFactory, GenerationBackend, GenerationRequest, RetrievalRequest};
use shared::agent_api::ChatMessage;
use shared::error::{CallError, StageError};
use shared::settings::{ModelRecord, ParameterRule, TurnConfig, TurnOptions};
use shared::sink::{references_from, OutputSink, Tip};
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::renderer::CoalescingRenderer;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer accurately and concisely, using Markdown where it helps.";
pub const NO_KNOWLEDGE_STATUS: &str = "No relevant knowledge found for this question";
pub const SEARCHING_STATUS: &str = "Searching knowledge base…";
pub const GENERATING_STATUS: &str = "Generating answer…";
pub const STOPPED_STATUS: &str = "Stopped";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Retrieving,
    ShortCircuit,
    Generating,
    Streaming,
    Done,
    Stopped,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub match_count: usize,
    pub items: Vec<String>,
    /// Set whenever a dataset was selected, whatever the match count.
    pub used_knowledge_base: bool,
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub id: Uuid,
    pub phase: TurnPhase,
    /// Accumulated answer text at the point the turn ended.
    pub text: String,
    pub retrieval: RetrievalResult,
    pub error: Option<StageError>,
}

impl TurnOutcome {
    /// Short status for the caller to show once the turn is over.
    pub fn status_line(&self) -> String {
        match self.phase {
            TurnPhase::Done if self.retrieval.match_count > 0 => {
                format!("Done, {} matches", self.retrieval.match_count)
            }
            TurnPhase::Done => "Done".to_string(),
            TurnPhase::ShortCircuit => NO_KNOWLEDGE_STATUS.to_string(),
            TurnPhase::Stopped => STOPPED_STATUS.to_string(),
            TurnPhase::Failed => match &self.error {
                Some(e) => e.panel().title,
                None => "Failed".to_string(),
            },
            other => format!("{:?}", other),
        }
    }
}

/// Inputs for one run.
pub struct TurnInput<'a> {
    pub question: &'a str,
    pub options: &'a TurnOptions,
    pub config: &'a TurnConfig,
    pub backends: &'a dyn BackendFactory,
    /// Earlier turns of the session, oldest first.
    pub history: Vec<ChatMessage>,
}

pub struct Turn<'a> {
    id: Uuid,
    phase: TurnPhase,
    sink: &'a dyn OutputSink,
    token: CancellationToken,
    render_interval: Duration,
}

impl<'a> Turn<'a> {
    pub fn new(
        id: Uuid,
        sink: &'a dyn OutputSink,
        token: CancellationToken,
        render_interval: Duration,
    ) -> Self {
        Self {
            id,
            phase: TurnPhase::Idle,
            sink,
            token,
            render_interval,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub async fn run(mut self, input: TurnInput<'_>) -> TurnOutcome {
        let TurnInput {
            question,
            options,
            config,
            backends,
            history,
        } = input;
        let mut retrieval = RetrievalResult {
            used_knowledge_base: options.dataset.is_some(),
            ..Default::default()
        };

        // Generation config is checked before any call goes out, retrieval included.
        let (model, generator) = match resolve_generation(config, backends) {
            Ok(resolved) => resolved,
            Err(e) => return self.fail(StageError::model(e), String::new(), retrieval),
        };

        if let Some(dataset) = options.dataset.as_deref() {
            if !self.advance(TurnPhase::Retrieving) {
                return self.outcome(String::new(), retrieval, None);
            }
            self.tip(Tip::status(SEARCHING_STATUS));

            match self.retrieve(question, dataset, options, config, backends).await {
                Ok(Some(items)) => {
                    retrieval.match_count = items.len();
                    retrieval.items = items;
                }
                Ok(None) => {
                    self.advance(TurnPhase::Stopped);
                    return self.outcome(String::new(), retrieval, None);
                }
                Err(e) => return self.fail(StageError::knowledge(e), String::new(), retrieval),
            }
            tracing::info!(matches = retrieval.match_count, dataset, "retrieval finished");

            if retrieval.match_count == 0 {
                if self.advance(TurnPhase::ShortCircuit) {
                    self.tip(Tip::status(NO_KNOWLEDGE_STATUS));
                    self.references(&[]);
                }
                return self.outcome(String::new(), retrieval, None);
            }
        }

        if !self.advance(TurnPhase::Generating) {
            return self.outcome(String::new(), retrieval, None);
        }
        self.tip(Tip::status(GENERATING_STATUS));

        let mut stream = match self
            .open_stream(
                question,
                config,
                model,
                generator.as_ref(),
                history,
                &retrieval.items,
            )
            .await
        {
            Ok(Some(stream)) => stream,
            Ok(None) => {
                self.advance(TurnPhase::Stopped);
                return self.outcome(String::new(), retrieval, None);
            }
            Err(e) => return self.fail(StageError::model(e), String::new(), retrieval),
        };

        if !self.advance(TurnPhase::Streaming) {
            return self.outcome(String::new(), retrieval, None);
        }

        let sink = self.sink;
        let mut buffer = StreamBuffer::new();
        let mut renderer = CoalescingRenderer::new(sink, self.token.clone(), self.render_interval);

        loop {
            let deadline = renderer.deadline();
            tokio::select! {
                biased;
                _ = self.token.stopped() => {
                    // Dropping the stream closes the connection.
                    self.advance(TurnPhase::Stopped);
                    return self.outcome(buffer.into_text(), retrieval, None);
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(tokio::time::Instant::now)),
                    if deadline.is_some() => {
                    renderer.flush_pending();
                }
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        let ingested = buffer.ingest(&bytes);
                        if ingested.appended {
                            renderer.submit(buffer.text());
                        }
                        if ingested.complete {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        return self.fail(StageError::model(e), buffer.into_text(), retrieval);
                    }
                    None => {
                        tracing::debug!(pending = buffer.text().len(), "stream ended without sentinel");
                        buffer.finish();
                        break;
                    }
                },
            }
        }
        drop(stream);

        renderer.finish(buffer.text());
        if !self.advance(TurnPhase::Done) {
            return self.outcome(buffer.into_text(), retrieval, None);
        }

        if retrieval.used_knowledge_base && retrieval.match_count > 0 {
            self.tip(Tip::status(format!("Done, {} matches", retrieval.match_count)));
            self.references(&references_from(&retrieval.items));
        } else {
            self.tip(Tip::status("Done"));
        }
        tracing::info!(
            chars = buffer.text().len(),
            renders = renderer.renders(),
            "turn finished"
        );
        self.outcome(buffer.into_text(), retrieval, None)
    }

    async fn retrieve(
        &self,
        question: &str,
        dataset: &str,
        options: &TurnOptions,
        config: &TurnConfig,
        backends: &dyn BackendFactory,
    ) -> Result<Option<Vec<String>>, CallError> {
        let service = config.enabled_knowledge()?;
        let backend = backends.retrieval(service)?;
        let request = RetrievalRequest {
            question: question.to_string(),
            similarity: config.rule.similarity,
            topn: config.rule.top_n,
            dataset_name: dataset.to_string(),
            temperature: config.rule.temperature,
            language: options.language.clone(),
        };
        tokio::select! {
            biased;
            _ = self.token.stopped() => Ok(None),
            result = backend.retrieve(request) => result.map(Some),
        }
    }

    async fn open_stream(
        &self,
        question: &str,
        config: &TurnConfig,
        model: &ModelRecord,
        backend: &dyn GenerationBackend,
        history: Vec<ChatMessage>,
        snippets: &[String],
    ) -> Result<Option<providers::ByteStream>, CallError> {
        let request = GenerationRequest {
            model: model.name.clone(),
            messages: build_messages(&config.rule, history, question, snippets),
            max_tokens: model.max_tokens,
            temperature: model.temperature,
            stream: true,
        };
        tokio::select! {
            biased;
            _ = self.token.stopped() => Ok(None),
            result = backend.stream_chat(request) => result.map(Some),
        }
    }

    /// Move to `next` unless the turn was stopped; a stopped turn only ever becomes `Stopped`.
    fn advance(&mut self, next: TurnPhase) -> bool {
        if self.token.is_stopped() {
            if self.phase != TurnPhase::Stopped {
                tracing::debug!(turn = %self.id, from = ?self.phase, "turn stopped");
                self.phase = TurnPhase::Stopped;
            }
            return false;
        }
        tracing::debug!(turn = %self.id, from = ?self.phase, to = ?next, "turn phase");
        self.phase = next;
        true
    }

    pub(crate) fn fail(
        mut self,
        error: StageError,
        text: String,
        retrieval: RetrievalResult,
    ) -> TurnOutcome {
        if !self.advance(TurnPhase::Failed) {
            return self.outcome(text, retrieval, None);
        }
        tracing::warn!(stage = ?error.stage, error = %error.source, "turn failed");
        self.tip(Tip::Error(error.panel()));
        self.outcome(text, retrieval, Some(error))
    }

    fn tip(&self, tip: Tip) {
        if !self.token.is_stopped() {
            self.sink.tip(&tip);
        }
    }

    fn references(&self, references: &[shared::sink::Reference]) {
        if !self.token.is_stopped() {
            self.sink.references(references);
        }
    }

    fn outcome(
        &self,
        text: String,
        retrieval: RetrievalResult,
        error: Option<StageError>,
    ) -> TurnOutcome {
        TurnOutcome {
            id: self.id,
            phase: self.phase,
            text,
            retrieval,
            error,
        }
    }
}

fn resolve_generation<'c>(
    config: &'c TurnConfig,
    backends: &dyn BackendFactory,
) -> Result<(&'c ModelRecord, Box<dyn GenerationBackend>), CallError> {
    let model = config.active_model()?;
    let backend = backends.generation(&config.provider)?;
    Ok((model, backend))
}

/// `[system, ...history, user]`. The user message carries the retrieved
/// snippets ahead of the question when there are any.
pub fn build_messages(
    rule: &ParameterRule,
    history: Vec<ChatMessage>,
    question: &str,
    snippets: &[String],
) -> Vec<ChatMessage> {
    let system = rule
        .system_prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(history);
    messages.push(ChatMessage::user(assemble_context(question, snippets)));
    messages
}

pub fn assemble_context(question: &str, snippets: &[String]) -> String {
    if snippets.is_empty() {
        return question.to_string();
    }
    let mut context = String::from("Answer using the reference material below.\n\n");
    for (i, snippet) in snippets.iter().enumerate() {
        let _ = write!(context, "[{}] {}\n\n", i + 1, snippet.trim());
    }
    context.push_str("Question: ");
    context.push_str(question);
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::agent_api::Role;

    #[test]
    fn test_context_without_snippets_is_question() {
        assert_eq!(assemble_context("why?", &[]), "why?");
    }

    #[test]
    fn test_context_numbers_snippets() {
        let ctx = assemble_context("why?", &["one ".to_string(), "two".to_string()]);
        assert!(ctx.contains("[1] one\n\n[2] two\n\n"));
        assert!(ctx.ends_with("Question: why?"));
    }

    #[test]
    fn test_messages_use_rule_prompt_or_default() {
        let mut rule = ParameterRule::default();
        let msgs = build_messages(&rule, vec![], "q", &[]);
        assert_eq!(msgs[0], ChatMessage::system(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(msgs[1], ChatMessage::user("q"));

        rule.system_prompt = Some("Be terse.".into());
        let history = vec![ChatMessage::user("old q"), ChatMessage::assistant("old a")];
        let msgs = build_messages(&rule, history, "q", &[]);
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0].content, "Be terse.");
        assert_eq!(msgs[1].role, Role::User);
        assert_eq!(msgs[3], ChatMessage::user("q"));
    }

    #[test]
    fn test_status_line() {
        let mut outcome = TurnOutcome {
            id: Uuid::new_v4(),
            phase: TurnPhase::Done,
            text: String::new(),
            retrieval: RetrievalResult {
                match_count: 2,
                items: vec!["a".into(), "b".into()],
                used_knowledge_base: true,
            },
            error: None,
        };
        assert_eq!(outcome.status_line(), "Done, 2 matches");
        outcome.phase = TurnPhase::Stopped;
        assert_eq!(outcome.status_line(), STOPPED_STATUS);
    }
}
