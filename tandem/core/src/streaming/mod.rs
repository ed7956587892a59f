//! Dual-Track Answer Accumulation
//!
//! One question produces two answer tracks at different paces: a fast answer
//! that arrives whole, and a detailed answer that arrives as appended deltas.
//! This module reconciles both into a single render-ready snapshot without
//! ever letting the presentation layer's read/render timing affect content.
//!
//! # Architecture
//!
//! ```text
//!            frames (arrival order)
//!                     │
//!                     ▼
//!        ┌────────────────────────────┐
//!        │    DualTrackAccumulator    │
//!        │  fast buffer   (replace)   │   authoritative state,
//!        │  detail buffer (append)    │   single owner, never shared
//!        │  sources / session id      │
//!        └────────────┬───────────────┘
//!                     │ snapshot() per frame
//!                     ▼
//!            AnswerSnapshot (value)
//!                     │
//!                     ▼
//!          watch channel → consumers
//! ```
//!
//! # Features
//!
//! - **Deterministic accumulation**: deltas d1..dN always concatenate to
//!   d1‖d2‖…‖dN no matter how reads and renders interleave with arrivals
//! - **Replace vs append**: the fast track replaces, the detail track appends
//! - **Value-semantic snapshots**: each publication is a fresh value; the
//!   next one fully replaces it, nothing is mutated in place
//! - **Error display policy**: a backend error replaces the merged view,
//!   discarding partial content from display
//!
//! # Example
//!
//! ```ignore
//! use tandem_core::streaming::DualTrackAccumulator;
//!
//! let mut acc = DualTrackAccumulator::new();
//! acc.on_fast_answer("Quick: X is Y", Some("cache"), Some(0.9), None);
//! acc.on_detail_delta("X is ");
//! acc.on_detail_delta("Y, in detail.");
//! acc.on_complete(Some("s1"), &["doc1.pdf".to_string()]);
//! let snapshot = acc.snapshot();
//! assert!(!snapshot.is_streaming);
//! ```

mod accumulator;

pub use accumulator::{
    AnswerSnapshot, DualTrackAccumulator, TerminalReason, ANSWER_SEPARATOR,
};
