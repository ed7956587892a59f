//! QA Backend Integration
//!
//! Abstracted access to the dual-track document-QA backend through a common
//! trait interface, so the orchestrator core never touches HTTP directly.
//!
//! # Available Backends
//!
//! - **HTTP**: the production REST/SSE backend (default)
//! - Channel-driven mocks in tests
//!
//! # Usage
//!
//! ```ignore
//! use tandem_core::backend::{HttpBackend, QaBackend};
//! use tandem_core::protocol::StreamRequest;
//!
//! let backend = HttpBackend::from_env();
//! let opened = backend
//!     .begin_stream(&StreamRequest {
//!         question: "What is X?".into(),
//!         user_id: "u-1".into(),
//!     })
//!     .await?;
//! let rx = backend.open_stream(&opened.sse_url).await?;
//! ```

mod http;
mod traits;

pub use http::{HttpBackend, DEFAULT_BASE_URL};
pub use traits::{QaBackend, StreamEvent};
