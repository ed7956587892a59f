//! Tandem Orchestrator
//!
//! The orchestrator sits between a UI (or the CLI) and the QA backend. It
//! decides, per question, whether to stream or to fall back to the one-shot
//! path, hands out [`Exchange`] handles whose snapshot feeds the caller
//! renders, remembers completed exchanges, and runs the feedback
//! side-channel with its absorb-all-failures contract.
//!
//! Mode preferences are read at submission time: flipping a mode mid-stream
//! affects the next question, never the one in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use crate::backend::QaBackend;
use crate::config::TandemConfig;
use crate::error::TandemError;
use crate::feedback::{FeedbackChoice, FeedbackHopeAnswer, FeedbackSubmission};
use crate::protocol::{AskRequest, SessionStatus};
use crate::session::{CancelHandle, StreamSession, CONNECTION_LOST_MESSAGE};
use crate::streaming::{AnswerSnapshot, TerminalReason};

// =============================================================================
// Mode Preferences
// =============================================================================

/// The two independent answer-mode toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModePrefs {
    /// Stream answers over the dual-track protocol
    pub streaming: bool,
    /// Ask the backend to consult its knowledge base
    pub use_knowledge_base: bool,
}

// =============================================================================
// Exchange History
// =============================================================================

/// A completed exchange as remembered for feedback correlation.
#[derive(Clone, Debug)]
pub struct ExchangeRecord {
    /// The question as submitted
    pub question: String,
    /// The fast answer the user saw, when one arrived
    pub fast: Option<FeedbackHopeAnswer>,
    /// The full detail-track text the user saw
    pub detail: String,
    /// Source documents reported at completion
    pub sources: Vec<String>,
    /// Session id the backend assigned
    pub session_id: Option<String>,
    /// Completion time, epoch milliseconds
    pub completed_at_ms: i64,
}

impl ExchangeRecord {
    /// Build a record from a completed exchange's final snapshot.
    #[must_use]
    pub fn from_snapshot(question: &str, snapshot: &AnswerSnapshot) -> Self {
        let fast = (!snapshot.fast_content.is_empty()).then(|| FeedbackHopeAnswer {
            content: snapshot.fast_content.clone(),
            source: snapshot.fast_source.clone(),
            confidence: snapshot.fast_confidence,
            response_time_ms: snapshot.fast_response_time_ms,
        });
        Self {
            question: question.to_string(),
            fast,
            detail: snapshot.detail_content.clone(),
            sources: snapshot.sources.clone(),
            session_id: snapshot.session_id.clone(),
            completed_at_ms: Utc::now().timestamp_millis(),
        }
    }
}

/// Insert a history record for a snapshot, if it is a recordable completion.
fn record_completion(
    history: &DashMap<String, ExchangeRecord>,
    question: &str,
    snapshot: &AnswerSnapshot,
) {
    if snapshot.terminal_reason != TerminalReason::Completed {
        return;
    }
    let Some(session_id) = snapshot.session_id.clone() else {
        tracing::debug!("Completed exchange carries no session id; not recording it");
        return;
    };
    tracing::debug!(session_id = %session_id, "Recording completed exchange");
    history.insert(session_id, ExchangeRecord::from_snapshot(question, snapshot));
}

// =============================================================================
// Exchange Handle
// =============================================================================

/// A caller's handle on one submitted question.
///
/// Both answer paths produce the same shape: a snapshot feed that starts at
/// "in progress" and ends on a terminal snapshot. Streamed exchanges can be
/// cancelled; one-shot exchanges ignore cancellation.
///
/// Dropping the handle does not cancel anything: a superseded exchange drains
/// in the background and is merely no longer displayed.
pub struct Exchange {
    snapshot_rx: watch::Receiver<AnswerSnapshot>,
    session: Option<StreamSession>,
    recorder: Option<JoinHandle<()>>,
}

impl Exchange {
    /// The most recently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AnswerSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// A new receiver on the snapshot feed.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AnswerSnapshot> {
        self.snapshot_rx.clone()
    }

    /// The snapshot feed as an async `Stream`. Yields the current value
    /// first, then every later publication that was not already superseded.
    #[must_use]
    pub fn snapshot_stream(&self) -> WatchStream<AnswerSnapshot> {
        WatchStream::new(self.subscribe())
    }

    /// True when this exchange went down the streaming path.
    #[must_use]
    pub fn is_streamed(&self) -> bool {
        self.session.is_some()
    }

    /// The underlying stream session, for streamed exchanges.
    #[must_use]
    pub fn session(&self) -> Option<&StreamSession> {
        self.session.as_ref()
    }

    /// Request cancellation. No-op for one-shot exchanges and after terminal.
    pub fn cancel(&self) {
        if let Some(session) = &self.session {
            session.cancel();
        }
    }

    /// A handle other tasks can use to cancel this exchange.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        match &self.session {
            Some(session) => session.cancel_handle(),
            None => CancelHandle::inert(),
        }
    }

    /// Wait until the exchange is terminal and its bookkeeping has run.
    pub async fn finished(&mut self) {
        if let Some(session) = &mut self.session {
            session.finished().await;
        }
        if let Some(recorder) = self.recorder.take() {
            if let Err(error) = recorder.await {
                tracing::error!(error = %error, "Exchange bookkeeping task failed");
            }
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Dual-track answer orchestrator over a QA backend.
pub struct Tandem<B: QaBackend> {
    /// The backend shared with per-exchange tasks
    backend: Arc<B>,
    /// Stable user id sent with every question
    user_id: String,
    /// Stall guard handed to each stream session
    stall_timeout: Option<Duration>,
    /// Mode toggles, read at submission time
    modes: RwLock<ModePrefs>,
    /// Completed exchanges by session id
    history: Arc<DashMap<String, ExchangeRecord>>,
}

impl<B: QaBackend + 'static> Tandem<B> {
    /// Create an orchestrator over the given backend.
    ///
    /// When the configuration names no user id, a random one is generated and
    /// kept for the life of this orchestrator.
    pub fn new(backend: B, config: &TandemConfig) -> Self {
        let user_id = config
            .user_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        tracing::debug!(
            user_id = %user_id,
            streaming = config.streaming,
            use_knowledge_base = config.use_knowledge_base,
            stall_timeout_secs = config.stall_timeout_secs,
            "Orchestrator ready"
        );
        Self {
            backend: Arc::new(backend),
            user_id,
            stall_timeout: config.stall_timeout(),
            modes: RwLock::new(ModePrefs {
                streaming: config.streaming,
                use_knowledge_base: config.use_knowledge_base,
            }),
            history: Arc::new(DashMap::new()),
        }
    }

    /// The user id sent with every question.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Current mode toggles.
    #[must_use]
    pub fn modes(&self) -> ModePrefs {
        *self.modes.read()
    }

    /// Switch between streaming and one-shot answers. Takes effect on the
    /// next question; an in-flight exchange is never touched.
    pub fn set_streaming(&self, streaming: bool) {
        self.modes.write().streaming = streaming;
        tracing::debug!(streaming, "Streaming mode set");
    }

    /// Toggle knowledge-base lookups. Takes effect on the next question.
    pub fn set_use_knowledge_base(&self, use_knowledge_base: bool) {
        self.modes.write().use_knowledge_base = use_knowledge_base;
        tracing::debug!(use_knowledge_base, "Knowledge-base mode set");
    }

    /// Submit a question under the modes in effect right now.
    ///
    /// Returns as soon as the exchange is observable; answers arrive through
    /// the handle's snapshot feed. Connection failures end the exchange with
    /// an errored snapshot rather than an `Err` here.
    ///
    /// # Errors
    ///
    /// [`TandemError::InvalidState`] on session lifecycle misuse, which a
    /// fresh session cannot hit in practice.
    pub async fn ask(&self, question: &str) -> Result<Exchange, TandemError> {
        let modes = self.modes();
        if modes.streaming {
            self.ask_streaming(question).await
        } else {
            Ok(self.ask_one_shot(question, modes.use_knowledge_base))
        }
    }

    /// Streaming path: run a stream session and record it on completion.
    async fn ask_streaming(&self, question: &str) -> Result<Exchange, TandemError> {
        let mut session = StreamSession::with_stall_timeout(self.stall_timeout);
        let mut feed = session.subscribe();
        session
            .start(self.backend.as_ref(), question, &self.user_id)
            .await?;

        let history = Arc::clone(&self.history);
        let question = question.to_string();
        let recorder = tokio::spawn(async move {
            let snapshot = match feed
                .wait_for(|snapshot| snapshot.terminal_reason.is_terminal())
                .await
            {
                Ok(snapshot) => snapshot.clone(),
                // publisher vanished before a terminal snapshot; nothing to record
                Err(_) => return,
            };
            record_completion(&history, &question, &snapshot);
        });

        Ok(Exchange {
            snapshot_rx: session.subscribe(),
            session: Some(session),
            recorder: Some(recorder),
        })
    }

    /// One-shot path: a synthetic "thinking" snapshot while the single
    /// request runs, then exactly one terminal snapshot built from its body.
    fn ask_one_shot(&self, question: &str, use_knowledge_base: bool) -> Exchange {
        let (snapshot_tx, snapshot_rx) = watch::channel(AnswerSnapshot::thinking());
        let request = AskRequest {
            question: question.to_string(),
            use_knowledge_base,
        };
        let backend = Arc::clone(&self.backend);
        let history = Arc::clone(&self.history);
        let question = question.to_string();

        let recorder = tokio::spawn(async move {
            tracing::debug!(backend = backend.name(), "Asking without streaming");
            let snapshot = match backend.ask_blocking(&request).await {
                Ok(response) => {
                    tracing::debug!(
                        response_time_ms = ?response.response_time_ms,
                        sources = response.sources.len(),
                        "One-shot answer arrived"
                    );
                    AnswerSnapshot {
                        detail_content: response.answer.clone(),
                        merged: response.answer,
                        sources: response.sources,
                        session_id: response.session_id,
                        terminal_reason: TerminalReason::Completed,
                        ..AnswerSnapshot::default()
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, "One-shot ask failed");
                    AnswerSnapshot {
                        merged: CONNECTION_LOST_MESSAGE.to_string(),
                        terminal_reason: TerminalReason::Errored,
                        ..AnswerSnapshot::default()
                    }
                }
            };
            record_completion(&history, &question, &snapshot);
            // the handle may already be gone; that just means nobody renders it
            let _ = snapshot_tx.send(snapshot);
        });

        Exchange {
            snapshot_rx,
            session: None,
            recorder: Some(recorder),
        }
    }

    /// Send answer-preference feedback.
    ///
    /// Best-effort by contract: delivery failures are logged and absorbed,
    /// and the call always completes as if it had succeeded.
    pub async fn submit_feedback(&self, submission: FeedbackSubmission) {
        tracing::debug!(
            choice = %submission.choice,
            session_id = ?submission.session_id,
            "Submitting answer feedback"
        );
        if let Err(error) = self.backend.send_feedback(&submission).await {
            tracing::warn!(error = %error, "Feedback delivery failed; absorbing");
        }
    }

    /// Rate a completed exchange by its session id.
    ///
    /// The submission is built from the recorded exchange. An unknown session
    /// id is absorbed the same way a delivery failure is.
    pub async fn rate_exchange(
        &self,
        session_id: &str,
        choice: FeedbackChoice,
        comment: Option<String>,
    ) {
        let Some(record) = self.exchange(session_id) else {
            tracing::warn!(session_id = %session_id, "No recorded exchange to rate; absorbing");
            return;
        };
        let mut submission = FeedbackSubmission::new(
            record.question,
            choice,
            record.fast.unwrap_or_else(FeedbackHopeAnswer::empty),
            record.detail,
            record.session_id,
            self.user_id.clone(),
        );
        if let Some(comment) = comment {
            submission = submission.with_comment(comment);
        }
        self.submit_feedback(submission).await;
    }

    /// Look up a completed exchange by session id.
    #[must_use]
    pub fn exchange(&self, session_id: &str) -> Option<ExchangeRecord> {
        self.history.get(session_id).map(|entry| entry.clone())
    }

    /// Number of completed exchanges remembered.
    #[must_use]
    pub fn exchange_count(&self) -> usize {
        self.history.len()
    }

    /// Whether the backend reports itself healthy.
    pub async fn health_check(&self) -> bool {
        self.backend.health_check().await
    }

    /// Backend-side status of a streaming session. Observational only.
    ///
    /// # Errors
    ///
    /// Propagates the backend's failure to answer the probe.
    pub async fn session_status(&self, session_id: &str) -> anyhow::Result<SessionStatus> {
        self.backend.session_status(session_id).await
    }
}

// =============================================================================
// Tests
// =============================================================================
