//! Stream Session Lifecycle
//!
//! One [`StreamSession`] drives one question through the dual-track protocol:
//! the initiating call, the optional short-circuit when the fast answer
//! already suffices, the event stream, and exactly one terminal transition.
//!
//! ```text
//!  Idle ──start()──▶ Requesting ──▶ (FastAnswered) ──▶ Streaming
//!                        │                │                │
//!                        │   canDirectAnswer=true          ├─ complete ─▶ Complete
//!                        │                └──────▶ Complete├─ error ────▶ Errored
//!                        │                                 ├─ stall ────▶ Errored
//!                        └─ cancel() ─▶ Stopped ◀─ cancel()┘
//! ```
//!
//! The transport handle (the frame channel receiver) is owned by the pump
//! task and dropped on every terminal transition. That drop is what closes
//! the underlying connection, so a superseded session's late frames can never
//! reach a newer session's state.
//!
//! Callers observe the session exclusively through a `watch` channel of
//! [`AnswerSnapshot`] values. Snapshots are published values, not views:
//! accumulation happens on state the renderer never touches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;

use crate::backend::{QaBackend, StreamEvent};
use crate::error::TandemError;
use crate::protocol::{StreamRequest, TrackFrame};
use crate::streaming::{AnswerSnapshot, DualTrackAccumulator};

/// Message published in place of answer content when the connection fails.
pub const CONNECTION_LOST_MESSAGE: &str =
    "Connection to the answer service was lost. Please try again.";

// =============================================================================
// Session Phase
// =============================================================================

/// Lifecycle phase of a streaming exchange.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created but not yet started
    #[default]
    Idle,
    /// Initiating call in flight
    Requesting,
    /// Fast answer arrived with the initiating response; stream not yet open
    FastAnswered,
    /// Event stream open, frames being pumped
    Streaming,
    /// Terminal: the exchange finished normally
    Complete,
    /// Terminal: the connection failed or the backend signalled an error
    Errored,
    /// Terminal: cancelled locally
    Stopped,
}

impl SessionPhase {
    /// True once no further frames will be processed.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Errored | Self::Stopped)
    }

    /// True while cancellation is meaningful.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Requesting | Self::FastAnswered | Self::Streaming)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Requesting => write!(f, "requesting"),
            Self::FastAnswered => write!(f, "fast-answered"),
            Self::Streaming => write!(f, "streaming"),
            Self::Complete => write!(f, "complete"),
            Self::Errored => write!(f, "errored"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

// =============================================================================
// Shared Session State
// =============================================================================

/// State shared between the session handle, its pump task, and cancel handles.
#[derive(Debug)]
struct SessionShared {
    /// Current lifecycle phase
    phase: RwLock<SessionPhase>,
    /// Latched once cancellation has been requested
    cancel_requested: AtomicBool,
    /// Wakes whichever suspension point is current when cancellation arrives
    cancel_notify: Notify,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            phase: RwLock::new(SessionPhase::Idle),
            cancel_requested: AtomicBool::new(false),
            cancel_notify: Notify::new(),
        }
    }

    fn phase(&self) -> SessionPhase {
        *self.phase.read()
    }

    fn set_phase(&self, next: SessionPhase) {
        let mut phase = self.phase.write();
        tracing::trace!(from = %*phase, to = %next, "Session phase transition");
        *phase = next;
    }

    /// Latch the cancel flag and wake the session. Safe from any task, any
    /// number of times; only the first call in an active phase does anything.
    fn request_cancel(&self) {
        let phase = self.phase();
        if !phase.is_active() {
            tracing::debug!(phase = %phase, "Cancel ignored outside an active exchange");
            return;
        }
        if self.cancel_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("Cancellation requested");
        self.cancel_notify.notify_one();
    }

    fn cancelled(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }
}

/// Cloneable handle that cancels its session from any task.
///
/// Obtained from [`StreamSession::cancel_handle`]. Handles for exchanges with
/// nothing to cancel (the non-streaming path) swallow calls silently.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    shared: Option<Arc<SessionShared>>,
}

impl CancelHandle {
    /// A handle with nothing behind it; calls are no-ops.
    pub(crate) fn inert() -> Self {
        Self { shared: None }
    }

    fn for_session(shared: Arc<SessionShared>) -> Self {
        Self {
            shared: Some(shared),
        }
    }

    /// Request cancellation of the associated session, if any.
    pub fn cancel(&self) {
        if let Some(shared) = &self.shared {
            shared.request_cancel();
        }
    }
}

// =============================================================================
// Stream Session
// =============================================================================

/// One dual-track streaming exchange, from initiating call to terminal state.
///
/// A session is single-shot: create, [`start`](Self::start), observe via
/// [`subscribe`](Self::subscribe), optionally [`cancel`](Self::cancel). A
/// finished session keeps serving its final snapshot but cannot be restarted.
pub struct StreamSession {
    shared: Arc<SessionShared>,
    /// Receiver kept so the final snapshot outlives the pump task
    snapshot_rx: watch::Receiver<AnswerSnapshot>,
    /// Present until `start` consumes it
    snapshot_tx: Option<watch::Sender<AnswerSnapshot>>,
    /// Give up on a stream after this long without a frame; `None` disables
    stall_timeout: Option<Duration>,
    /// Set once the event stream has been opened
    transport_opened: bool,
    /// The frame pump, while one is running
    pump: Option<JoinHandle<()>>,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    /// Create an idle session with no stall guard.
    #[must_use]
    pub fn new() -> Self {
        Self::with_stall_timeout(None)
    }

    /// Create an idle session that errors out a stream after `stall_timeout`
    /// without any inbound frame. `None` means a silent stream is waited on
    /// indefinitely.
    #[must_use]
    pub fn with_stall_timeout(stall_timeout: Option<Duration>) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(AnswerSnapshot::default());
        Self {
            shared: Arc::new(SessionShared::new()),
            snapshot_rx,
            snapshot_tx: Some(snapshot_tx),
            stall_timeout,
            transport_opened: false,
            pump: None,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.shared.phase()
    }

    /// The most recently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AnswerSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// A new receiver on the snapshot feed. The current value is immediately
    /// observable; every later publication replaces it whole.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AnswerSnapshot> {
        self.snapshot_rx.clone()
    }

    /// A handle other tasks can use to cancel this session.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::for_session(Arc::clone(&self.shared))
    }

    /// Request cancellation. Client-local: the transport is closed and the
    /// session ends in `Stopped` with whatever content had accumulated, but
    /// no stop request is sent to the backend. Idempotent; calls outside an
    /// active exchange are ignored.
    pub fn cancel(&self) {
        self.shared.request_cancel();
    }

    /// Run the exchange up to the point where frames flow (or a short-circuit
    /// or failure ends it).
    ///
    /// Only legal from `Idle`. On return the session is either terminal (direct
    /// answer, early failure, early cancel) or `Streaming` with a pump task
    /// feeding the snapshot channel.
    ///
    /// Connection failures are not `Err` outcomes: they end the exchange with
    /// a terminal errored snapshot carrying [`CONNECTION_LOST_MESSAGE`]. The
    /// only `Err` here is lifecycle misuse.
    ///
    /// # Errors
    ///
    /// [`TandemError::InvalidState`] when the session is not `Idle`.
    pub async fn start<B>(
        &mut self,
        backend: &B,
        question: &str,
        user_id: &str,
    ) -> Result<(), TandemError>
    where
        B: QaBackend + ?Sized,
    {
        let phase = self.shared.phase();
        if phase != SessionPhase::Idle {
            return Err(TandemError::InvalidState {
                operation: "start",
                phase,
            });
        }
        let Some(snapshot_tx) = self.snapshot_tx.take() else {
            return Err(TandemError::InvalidState {
                operation: "start",
                phase,
            });
        };

        self.shared.set_phase(SessionPhase::Requesting);
        let mut accumulator = DualTrackAccumulator::new();
        snapshot_tx.send_replace(accumulator.snapshot());

        let request = StreamRequest {
            question: question.to_string(),
            user_id: user_id.to_string(),
        };
        tracing::debug!(backend = backend.name(), "Initiating dual-track exchange");

        let response = tokio::select! {
            response = backend.begin_stream(&request) => response,
            () = self.shared.cancel_notify.notified() => {
                tracing::debug!("Cancelled during the initiating call");
                accumulator.on_stopped();
                conclude(&self.shared, &snapshot_tx, &accumulator, SessionPhase::Stopped);
                return Ok(());
            }
        };
        let response = match response {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(error = %error, "Initiating call failed");
                accumulator.fail(CONNECTION_LOST_MESSAGE);
                conclude(&self.shared, &snapshot_tx, &accumulator, SessionPhase::Errored);
                return Ok(());
            }
        };

        accumulator.set_session_id(&response.session_id);
        tracing::debug!(session_id = %response.session_id, "Exchange session assigned");

        if let Some(hope) = &response.hope_answer {
            accumulator.on_fast_answer(&hope.answer, None, hope.confidence, None);
            if hope.can_direct_answer {
                tracing::debug!("Fast answer declared sufficient; no stream will be opened");
                accumulator.on_complete(None, &[]);
                conclude(&self.shared, &snapshot_tx, &accumulator, SessionPhase::Complete);
                return Ok(());
            }
            self.shared.set_phase(SessionPhase::FastAnswered);
            snapshot_tx.send_replace(accumulator.snapshot());
        }

        if self.shared.cancelled() {
            accumulator.on_stopped();
            conclude(&self.shared, &snapshot_tx, &accumulator, SessionPhase::Stopped);
            return Ok(());
        }

        if self.transport_opened {
            return Err(TandemError::InvalidState {
                operation: "open transport",
                phase: self.shared.phase(),
            });
        }

        let events = tokio::select! {
            events = backend.open_stream(&response.sse_url) => events,
            () = self.shared.cancel_notify.notified() => {
                tracing::debug!("Cancelled while opening the stream");
                accumulator.on_stopped();
                conclude(&self.shared, &snapshot_tx, &accumulator, SessionPhase::Stopped);
                return Ok(());
            }
        };
        let events = match events {
            Ok(events) => events,
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    sse_url = %response.sse_url,
                    "Failed to open the event stream"
                );
                accumulator.fail(CONNECTION_LOST_MESSAGE);
                conclude(&self.shared, &snapshot_tx, &accumulator, SessionPhase::Errored);
                return Ok(());
            }
        };

        self.transport_opened = true;
        self.shared.set_phase(SessionPhase::Streaming);

        let shared = Arc::clone(&self.shared);
        let stall_timeout = self.stall_timeout;
        self.pump = Some(tokio::spawn(pump_frames(
            events,
            accumulator,
            snapshot_tx,
            shared,
            stall_timeout,
        )));
        Ok(())
    }

    /// Wait until the session stops publishing, if it has a running pump.
    /// Returns immediately for sessions that never opened a stream.
    pub async fn finished(&mut self) {
        if let Some(pump) = self.pump.take() {
            if let Err(error) = pump.await {
                tracing::error!(error = %error, "Stream pump task failed");
            }
        }
    }
}

/// Apply the terminal phase and publish the final snapshot, in that order, so
/// an observer woken by the snapshot always sees a terminal phase.
fn conclude(
    shared: &SessionShared,
    snapshot_tx: &watch::Sender<AnswerSnapshot>,
    accumulator: &DualTrackAccumulator,
    phase: SessionPhase,
) {
    shared.set_phase(phase);
    snapshot_tx.send_replace(accumulator.snapshot());
}

/// Completes when the stall window elapses; never completes when disabled.
async fn stall_guard(timeout: Option<Duration>) {
    match timeout {
        Some(window) => tokio::time::sleep(window).await,
        None => std::future::pending().await,
    }
}

/// Feed decoded events into the accumulator until a terminal event,
/// cancellation, a stall, or channel close.
///
/// Owns the frame receiver. Returning drops it, and that drop is what closes
/// the underlying connection, on every terminal path alike.
async fn pump_frames(
    mut events: mpsc::Receiver<StreamEvent>,
    mut accumulator: DualTrackAccumulator,
    snapshot_tx: watch::Sender<AnswerSnapshot>,
    shared: Arc<SessionShared>,
    stall_timeout: Option<Duration>,
) {
    loop {
        if shared.cancelled() {
            accumulator.on_stopped();
            conclude(&shared, &snapshot_tx, &accumulator, SessionPhase::Stopped);
            return;
        }

        let event = tokio::select! {
            event = events.recv() => event,
            () = shared.cancel_notify.notified() => {
                tracing::debug!("Cancelled mid-stream");
                accumulator.on_stopped();
                conclude(&shared, &snapshot_tx, &accumulator, SessionPhase::Stopped);
                return;
            }
            () = stall_guard(stall_timeout) => {
                tracing::warn!(stall_timeout = ?stall_timeout, "Stream stalled with no frames; giving up");
                accumulator.fail(CONNECTION_LOST_MESSAGE);
                conclude(&shared, &snapshot_tx, &accumulator, SessionPhase::Errored);
                return;
            }
        };

        match event {
            Some(StreamEvent::Frame(TrackFrame::Hope {
                content,
                source,
                confidence,
                can_direct_answer,
                response_time_ms,
                strategy,
            })) => {
                tracing::debug!(
                    source = ?source,
                    confidence = ?confidence,
                    strategy = ?strategy,
                    can_direct_answer,
                    "Fast answer arrived"
                );
                // mid-stream, canDirectAnswer is informational; only complete
                // and error frames terminate
                accumulator.on_fast_answer(&content, source.as_deref(), confidence, response_time_ms);
                snapshot_tx.send_replace(accumulator.snapshot());
            }
            Some(StreamEvent::Frame(TrackFrame::Llm {
                content,
                chunk_index,
            })) => {
                tracing::trace!(len = content.len(), chunk_index = ?chunk_index, "Detail delta");
                accumulator.on_detail_delta(&content);
                snapshot_tx.send_replace(accumulator.snapshot());
            }
            Some(StreamEvent::Frame(TrackFrame::Complete {
                session_id,
                sources,
                total_chunks,
                total_time_ms,
            })) => {
                tracing::debug!(
                    session_id = ?session_id,
                    sources = sources.len(),
                    total_chunks = ?total_chunks,
                    total_time_ms = ?total_time_ms,
                    "Stream completed"
                );
                accumulator.on_complete(session_id.as_deref(), &sources);
                conclude(&shared, &snapshot_tx, &accumulator, SessionPhase::Complete);
                return;
            }
            Some(StreamEvent::Frame(TrackFrame::Error { error })) => {
                tracing::warn!(error = %error, "Backend signalled an error");
                accumulator.fail(&error);
                conclude(&shared, &snapshot_tx, &accumulator, SessionPhase::Errored);
                return;
            }
            Some(StreamEvent::Frame(TrackFrame::Unknown)) => {
                // decode layer already logged the tag; nothing to route
            }
            Some(StreamEvent::ConnectionLost(detail)) => {
                tracing::warn!(detail = %detail, "Stream connection lost");
                accumulator.fail(CONNECTION_LOST_MESSAGE);
                conclude(&shared, &snapshot_tx, &accumulator, SessionPhase::Errored);
                return;
            }
            None => {
                tracing::warn!("Stream channel closed without a terminal frame");
                accumulator.fail(CONNECTION_LOST_MESSAGE);
                conclude(&shared, &snapshot_tx, &accumulator, SessionPhase::Errored);
                return;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
