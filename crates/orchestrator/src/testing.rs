//! In-memory sink and backends for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use providers::{
    BackendFactory, ByteStream, GenerationBackend, GenerationRequest, RetrievalBackend,
    RetrievalRequest,
};
use shared::document::Document;
use shared::error::CallError;
use shared::events::{ConversationLog, LogEntry};
use shared::settings::{
    AuthScheme, KnowledgeService, ModelRecord, ParameterRule, ProviderRecord, TurnConfig,
};
use shared::sink::{OutputSink, Reference, Tip};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Tip(Tip),
    Content(Document),
    References(Vec<Reference>),
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    pub fn contents(&self) -> Vec<Document> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Content(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn tips(&self) -> Vec<Tip> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Tip(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn references(&self) -> Vec<Vec<Reference>> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::References(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }
}

impl OutputSink for RecordingSink {
    fn tip(&self, tip: &Tip) {
        self.events.lock().push(SinkEvent::Tip(tip.clone()));
    }

    fn content(&self, document: &Document) {
        self.events.lock().push(SinkEvent::Content(document.clone()));
    }

    fn references(&self, references: &[Reference]) {
        self.events
            .lock()
            .push(SinkEvent::References(references.to_vec()));
    }
}

type Chunk = Result<Vec<u8>, CallError>;

pub struct FakeState {
    retrieval: Mutex<Result<Vec<String>, CallError>>,
    generation_error: Mutex<Option<CallError>>,
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<Chunk>>>,
    pub retrieval_calls: AtomicUsize,
    pub generation_calls: AtomicUsize,
    pub last_retrieval: Mutex<Option<RetrievalRequest>>,
    pub last_generation: Mutex<Option<GenerationRequest>>,
}

/// Scripted backends. Each generation call consumes the next queued stream.
#[derive(Clone)]
pub struct FakeBackends(pub Arc<FakeState>);

impl FakeBackends {
    pub fn new() -> Self {
        Self(Arc::new(FakeState {
            retrieval: Mutex::new(Ok(Vec::new())),
            generation_error: Mutex::new(None),
            streams: Mutex::new(VecDeque::new()),
            retrieval_calls: AtomicUsize::new(0),
            generation_calls: AtomicUsize::new(0),
            last_retrieval: Mutex::new(None),
            last_generation: Mutex::new(None),
        }))
    }

    /// Queue a stream that yields `chunks` and then ends.
    pub fn push_stream(&self, chunks: &[&[u8]]) -> &Self {
        let tx = self.push_live_stream();
        for chunk in chunks {
            let _ = tx.send(Ok(chunk.to_vec()));
        }
        self
    }

    /// Queue a stream fed by the returned sender; it ends when the sender drops.
    pub fn push_live_stream(&self) -> mpsc::UnboundedSender<Chunk> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.0.streams.lock().push_back(rx);
        tx
    }

    pub fn set_retrieval(&self, result: Result<Vec<String>, CallError>) {
        *self.0.retrieval.lock() = result;
    }

    pub fn fail_generation(&self, error: CallError) {
        *self.0.generation_error.lock() = Some(error);
    }

    pub fn retrieval_calls(&self) -> usize {
        self.0.retrieval_calls.load(Ordering::SeqCst)
    }

    pub fn generation_calls(&self) -> usize {
        self.0.generation_calls.load(Ordering::SeqCst)
    }

    pub fn last_generation(&self) -> Option<GenerationRequest> {
        self.0.last_generation.lock().clone()
    }

    pub fn last_retrieval(&self) -> Option<RetrievalRequest> {
        self.0.last_retrieval.lock().clone()
    }
}

struct FakeRetrieval(Arc<FakeState>);
struct FakeGeneration(Arc<FakeState>);

#[async_trait]
impl RetrievalBackend for FakeRetrieval {
    async fn retrieve(&self, request: RetrievalRequest) -> Result<Vec<String>, CallError> {
        self.0.retrieval_calls.fetch_add(1, Ordering::SeqCst);
        *self.0.last_retrieval.lock() = Some(request);
        self.0.retrieval.lock().clone()
    }
}

#[async_trait]
impl GenerationBackend for FakeGeneration {
    async fn stream_chat(&self, request: GenerationRequest) -> Result<ByteStream, CallError> {
        self.0.generation_calls.fetch_add(1, Ordering::SeqCst);
        *self.0.last_generation.lock() = Some(request);
        if let Some(e) = self.0.generation_error.lock().take() {
            return Err(e);
        }
        let rx = self
            .0
            .streams
            .lock()
            .pop_front()
            .ok_or_else(|| CallError::Transport("no scripted stream".into()))?;
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            let item = rx.recv().await?;
            Some((item, rx))
        });
        Ok(stream.boxed())
    }
}

impl BackendFactory for FakeBackends {
    fn retrieval(
        &self,
        service: &KnowledgeService,
    ) -> Result<Box<dyn RetrievalBackend>, CallError> {
        if !service.enabled {
            return Err(CallError::Config("knowledge service is disabled".into()));
        }
        Ok(Box::new(FakeRetrieval(self.0.clone())))
    }

    fn generation(
        &self,
        _provider: &ProviderRecord,
    ) -> Result<Box<dyn GenerationBackend>, CallError> {
        Ok(Box::new(FakeGeneration(self.0.clone())))
    }
}

#[derive(Default)]
pub struct MemoryLog {
    pub entries: Mutex<Vec<LogEntry>>,
}

impl ConversationLog for MemoryLog {
    fn append(&self, entry: LogEntry) -> anyhow::Result<()> {
        self.entries.lock().push(entry);
        Ok(())
    }
}

pub fn test_config() -> TurnConfig {
    TurnConfig {
        provider: ProviderRecord {
            endpoint: "http://localhost:8000".into(),
            credential: Some("sk-test".into()),
            auth_scheme: AuthScheme::Bearer,
        },
        models: vec![ModelRecord {
            name: "test-model".into(),
            max_tokens: 256,
            temperature: 0.1,
            is_default: true,
        }],
        rule: ParameterRule::default(),
        knowledge: Some(KnowledgeService {
            endpoint: "http://localhost:9000/search".into(),
            credential: Some("kb".into()),
            enabled: true,
        }),
    }
}

/// `data: {"choices":[{"delta":{"content":...}}]}` line for `text`.
pub fn delta_line(text: &str) -> String {
    format!(
        "data: {}\n",
        serde_json::json!({"choices": [{"delta": {"content": text}}]})
    )
}
