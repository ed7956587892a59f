//! Tandem Core - Dual-Track Streaming Answer Client
//!
//! This crate implements the client side of a document-QA protocol that
//! answers every question twice over a single event stream: once fast (the
//! HOPE track, a whole answer at once) and once thorough (the LLM track,
//! token deltas). The two tracks are reconciled into one monotonically
//! growing view that any UI can render, completely independent of any UI
//! framework.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        UI / CLI (renderer)                       │
//! │      observes AnswerSnapshot          cancel() / feedback        │
//! └────────────────────────────┬─────────────────────────────────────┘
//!                              │ watch channel
//! ┌────────────────────────────┼─────────────────────────────────────┐
//! │                        TANDEM CORE                               │
//! │  ┌─────────────────────────┴────────────────────────────────┐    │
//! │  │                        Tandem                            │    │
//! │  │  ┌────────────┐  ┌──────────────┐  ┌─────────────────┐   │    │
//! │  │  │   Stream   │  │  Dual-Track  │  │    Feedback +   │   │    │
//! │  │  │   Session  │  │  Accumulator │  │     History     │   │    │
//! │  │  └──────┬─────┘  └──────────────┘  └─────────────────┘   │    │
//! │  └─────────┼──────────────────────────────────────────────  ┘    │
//! │  ┌─────────┴─────────┐    ┌──────────────────────────────┐       │
//! │  │ QaBackend (HTTP)  │───▶│  SSE decoder + frame demux   │       │
//! │  └───────────────────┘    └──────────────────────────────┘       │
//! └────────────────────────────┬─────────────────────────────────────┘
//!                              │ REST + SSE
//!                      document-QA backend
//! ```
//!
//! # Key Types
//!
//! - [`Tandem`]: The orchestrator; decides streaming vs one-shot per question
//! - [`Exchange`]: A caller's handle on one submitted question
//! - [`StreamSession`]: The per-question lifecycle state machine
//! - [`AnswerSnapshot`]: The immutable, render-ready view published to UIs
//! - [`TrackFrame`]: One decoded wire frame (`hope`/`llm`/`complete`/`error`)
//! - [`QaBackend`]/[`HttpBackend`]: The backend seam and its production impl
//! - [`FeedbackSubmission`]: The best-effort answer-preference payload
//!
//! # Quick Start
//!
//! ```ignore
//! use tandem_core::{load_config, HttpBackend, Tandem};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let backend = HttpBackend::from_config(&config);
//!     let tandem = Tandem::new(backend, &config);
//!
//!     let mut exchange = tandem.ask("What is X?").await?;
//!     let mut feed = exchange.subscribe();
//!     loop {
//!         let snapshot = feed.borrow_and_update().clone();
//!         render(&snapshot.merged);
//!         if snapshot.terminal_reason.is_terminal() {
//!             break;
//!         }
//!         if feed.changed().await.is_err() {
//!             break;
//!         }
//!     }
//!     exchange.finished().await;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: QA backend abstraction and the HTTP/SSE implementation
//! - [`config`]: TOML + environment configuration loading
//! - [`error`]: The crate's error taxonomy
//! - [`feedback`]: Answer-preference feedback payloads
//! - [`protocol`]: Wire types for every backend call and stream frame
//! - [`session`]: Per-question lifecycle state machine and cancellation
//! - [`streaming`]: The dual-track accumulator and published snapshots
//! - [`tandem`]: The orchestrator tying all of it together
//! - [`transport`]: SSE byte-stream decoding
//!
//! # Snapshot Discipline
//!
//! Accumulation happens on state that exactly one task owns; renderers only
//! ever receive finished [`AnswerSnapshot`] values over a watch channel.
//! However renders batch, lag, or coalesce, the accumulated content is
//! byte-for-byte the same.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod error;
pub mod feedback;
pub mod protocol;
pub mod session;
pub mod streaming;
pub mod tandem;
pub mod transport;

// Re-exports for convenience
pub use backend::{HttpBackend, QaBackend, StreamEvent, DEFAULT_BASE_URL};
pub use error::TandemError;
pub use feedback::{FeedbackChoice, FeedbackHopeAnswer, FeedbackSubmission};
pub use protocol::{
    decode_frame, AskRequest, AskResponse, HealthResponse, HopeAnswer, SessionStatus,
    StreamRequest, StreamResponse, TrackFrame,
};
pub use session::{CancelHandle, SessionPhase, StreamSession, CONNECTION_LOST_MESSAGE};
pub use streaming::{AnswerSnapshot, DualTrackAccumulator, TerminalReason, ANSWER_SEPARATOR};
pub use tandem::{Exchange, ExchangeRecord, ModePrefs, Tandem};
pub use transport::SseDecoder;

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, TandemConfig, TandemToml,
};
