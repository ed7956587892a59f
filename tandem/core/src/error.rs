//! Error Types
//!
//! The crate distinguishes sharply between failures that are part of an
//! exchange's normal outcome space and failures that indicate caller bugs.
//!
//! - Stream-level failures (connection lost, backend `error` frame) end an
//!   exchange with a terminal errored snapshot. They are data, not `Err`.
//! - Malformed frames are logged and dropped inside the transport; they never
//!   surface here at all.
//! - Feedback delivery failures are absorbed by the orchestrator and replaced
//!   with a synthetic success.
//! - Lifecycle misuse (starting a non-idle session, double-opening a
//!   transport) is the one thing that comes back as an `Err`: it cannot be
//!   reached through a well-behaved caller and should fail loudly.

use thiserror::Error;

use crate::config::ConfigError;
use crate::session::SessionPhase;

/// Errors surfaced by the orchestration layer.
#[derive(Debug, Error)]
pub enum TandemError {
    /// A lifecycle method was called in a phase where it is not legal.
    #[error("invalid session state: {operation} is not legal in the {phase} phase")]
    InvalidState {
        /// What the caller tried to do
        operation: &'static str,
        /// The phase the session was in at the time
        phase: SessionPhase,
    },

    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
