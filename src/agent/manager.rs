use std::sync::Arc;

use anyhow::Result;
use futures_util::StreamExt;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::assembler::{MessageAssembler, UnclassifiedPolicy};
use crate::agent::config::ChatSettings;
use crate::agent::message::Message;
use crate::agent::parser::{DONE_TOKEN, ParsedEvent, parse_frame};
use crate::agent::providers::http::HttpBackend;
use crate::agent::providers::{ChatMode, StreamBackend, TransportError};
use crate::agent::session::{SharedStore, StoreError};
use crate::agent::sse::SseDecoder;

/// Options for a single send cycle.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Cancelling the token stops reading the response. Content already
    /// assembled stays in the store.
    pub cancel: CancellationToken,
    pub mode: ChatMode,
}

/// Stream-level failures of a send cycle.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("response cancelled")]
    Cancelled,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Summary of a completed send cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOutcome {
    pub thread_id: String,
    /// Records applied to the store.
    pub records: usize,
    /// Frames skipped as malformed or off-protocol.
    pub skipped: usize,
    /// Whether the stream ended with the `[DONE]` token.
    pub saw_done: bool,
}

/// Drives one user turn: decoder, parser and assembler over the backend
/// stream, writing into the shared store.
///
/// `send` takes `&self`, so overlapping calls are possible. Each call gets
/// its own thread id and assembler; the responding flag is cleared when the
/// last call in flight finishes.
pub struct ChatManager {
    backend: Arc<dyn StreamBackend>,
    store: SharedStore,
    policy: UnclassifiedPolicy,
}

impl ChatManager {
    pub fn new(backend: Arc<dyn StreamBackend>, store: SharedStore, policy: UnclassifiedPolicy) -> Self {
        Self {
            backend,
            store,
            policy,
        }
    }

    /// Builds a manager talking HTTP to the configured backend.
    pub fn from_settings(settings: &ChatSettings, store: SharedStore) -> Result<Self> {
        let backend = HttpBackend::new(settings)?;
        Ok(Self::new(Arc::new(backend), store, settings.unclassified_policy))
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Sends `text` and assembles the response into the store.
    ///
    /// The user message is appended before any network I/O. On failure the
    /// active assistant message is marked errored and a failure notice is
    /// appended to the thread; on cancellation the active message stops
    /// streaming with no finish reason.
    pub async fn send(&self, text: &str, options: SendOptions) -> Result<SendOutcome, SendError> {
        let thread_id = Uuid::new_v4().to_string();
        self.store.append(Message::user(thread_id.clone(), text))?;
        let _responding = RespondingGuard::acquire(&self.store);

        let mut assembler = MessageAssembler::new(thread_id, self.policy);
        let result = self.drive(text, &options, &mut assembler).await;

        let settled = match &result {
            Ok(_) => Ok(()),
            Err(SendError::Cancelled) => {
                info!("response cancelled on thread {}", assembler.thread_id());
                assembler.abort(&self.store)
            }
            Err(err) => {
                error!("response failed on thread {}: {err}", assembler.thread_id());
                assembler
                    .fail(&self.store)
                    .and_then(|()| self.store.append(Message::failure(assembler.thread_id())))
            }
        };
        if let Err(err) = settled {
            error!("failed to settle active message: {err}");
        }
        result
    }

    async fn drive(
        &self,
        text: &str,
        options: &SendOptions,
        assembler: &mut MessageAssembler,
    ) -> Result<SendOutcome, SendError> {
        let cancel = &options.cancel;
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SendError::Cancelled),
            opened = self.backend.open(text, options.mode) => opened?,
        };

        let mut outcome = SendOutcome {
            thread_id: assembler.thread_id().to_string(),
            ..SendOutcome::default()
        };
        let mut decoder = SseDecoder::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SendError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            for frame in decoder.push(&chunk) {
                for event in parse_frame(&frame) {
                    match event {
                        ParsedEvent::Record(record) => {
                            assembler.apply(&record, &self.store)?;
                            outcome.records += 1;
                        }
                        ParsedEvent::StreamEnd => {
                            assembler.complete(&self.store)?;
                            outcome.saw_done = true;
                            return Ok(outcome);
                        }
                        ParsedEvent::ParseError { payload, reason } => {
                            warn!("skipping malformed record {payload:?}: {reason}");
                            outcome.skipped += 1;
                        }
                        ParsedEvent::ProtocolViolation { reason } => {
                            warn!("skipping frame: {reason}");
                            outcome.skipped += 1;
                        }
                    }
                }
            }
        }

        if let Some(rest) = decoder.finish() {
            warn!("dropping unterminated trailing fragment of {} bytes", rest.len());
        }
        warn!("stream ended without {DONE_TOKEN}");
        assembler.complete(&self.store)?;
        Ok(outcome)
    }
}

/// Holds the responding flag for the lifetime of a send cycle, including
/// when the send future is dropped mid-flight.
struct RespondingGuard {
    store: SharedStore,
}

impl RespondingGuard {
    fn acquire(store: &SharedStore) -> Self {
        store.begin_response();
        Self {
            store: store.clone(),
        }
    }
}

impl Drop for RespondingGuard {
    fn drop(&mut self) {
        self.store.end_response();
    }
}
