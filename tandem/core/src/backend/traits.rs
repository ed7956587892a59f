//! QA Backend Traits
//!
//! Trait definitions for the dual-track QA backend. The abstraction keeps the
//! session state machine and the orchestrator independent of HTTP details and
//! lets tests drive them from plain channels.
//!
//! # Design Philosophy
//!
//! The `QaBackend` trait covers exactly the calls the protocol defines:
//! - the initiating call that may already resolve the fast answer
//! - opening the event stream for one session
//! - the one-shot non-streaming ask
//! - the feedback side-channel
//! - health and session-status probes
//!
//! Implementations own connection handling; consumers own lifecycle. Dropping
//! a stream's receiver is the one and only way a consumer closes a stream.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::feedback::FeedbackSubmission;
use crate::protocol::{
    AskRequest, AskResponse, SessionStatus, StreamRequest, StreamResponse, TrackFrame,
};

/// One item on the frame channel between a stream's pump task and its session.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// A decoded wire frame, delivered in arrival order
    Frame(TrackFrame),
    /// The connection itself failed or ended before a terminal frame.
    /// Terminal. The string is diagnostic detail for logs; the user-facing
    /// message is the generic connection-lost text.
    ConnectionLost(String),
}

/// Interface to the dual-track QA backend.
#[async_trait]
pub trait QaBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Check if the backend is reachable and reports itself healthy
    async fn health_check(&self) -> bool;

    /// Issue the initiating call for a streaming exchange.
    ///
    /// The response carries the session id, the stream URL, and possibly a
    /// fast answer that makes opening the stream unnecessary.
    async fn begin_stream(&self, request: &StreamRequest) -> anyhow::Result<StreamResponse>;

    /// Open the event stream for a session.
    ///
    /// `sse_url` may be relative; implementations resolve it against their
    /// base origin. Frames arrive on the returned channel in arrival order.
    /// Dropping the receiver closes the connection.
    async fn open_stream(&self, sse_url: &str) -> anyhow::Result<mpsc::Receiver<StreamEvent>>;

    /// One-shot ask without streaming.
    async fn ask_blocking(&self, request: &AskRequest) -> anyhow::Result<AskResponse>;

    /// Report which track the user preferred.
    ///
    /// Implementations report failures truthfully; the orchestrator is the
    /// layer that absorbs them.
    async fn send_feedback(&self, submission: &FeedbackSubmission) -> anyhow::Result<()>;

    /// Query backend-side status of a streaming session. Observational only;
    /// the client state machine never acts on it.
    async fn session_status(&self, session_id: &str) -> anyhow::Result<SessionStatus>;
}
