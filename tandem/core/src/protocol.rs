//! Wire Protocol for the Dual-Track QA Backend
//!
//! Request/response bodies for the backend's REST endpoints plus [`TrackFrame`],
//! the discriminated union carried on the event stream. One question produces
//! two answer tracks over a single SSE connection: a fast `hope` answer that
//! arrives whole, and a slower `llm` track that arrives as appended deltas.
//!
//! # Design Philosophy
//!
//! Frames are decoded exactly once, here, at the protocol boundary. Everything
//! downstream works with typed values:
//!
//! - Unknown `type` tags decode into [`TrackFrame::Unknown`] so a newer backend
//!   never breaks an older client.
//! - Payloads that fail to parse are dropped by [`decode_frame`] (logged, not
//!   propagated). A single corrupt frame must never take down a healthy stream.
//! - Extra fields the backend sends are ignored; absent optional fields fall
//!   back to defaults.

use serde::{Deserialize, Serialize};

// =============================================================================
// Initiating Call
// =============================================================================

/// Body of the initiating call that starts a dual-track exchange.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    /// The question text, sent verbatim
    pub question: String,
    /// Stable per-installation user id
    pub user_id: String,
}

/// Response to the initiating call.
///
/// `sse_url` may be relative; the transport resolves it against the configured
/// base origin before opening the stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamResponse {
    /// Backend-assigned session id for this exchange
    pub session_id: String,
    /// Where to open the event stream
    pub sse_url: String,
    /// Fast answer resolved during the initiating call, if any
    #[serde(default)]
    pub hope_answer: Option<HopeAnswer>,
}

/// Fast-track answer embedded in the initiating response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HopeAnswer {
    /// When true the fast answer fully satisfies the question and no
    /// stream is opened at all
    #[serde(default)]
    pub can_direct_answer: bool,
    /// The complete fast answer text
    #[serde(default)]
    pub answer: String,
    /// Backend-reported confidence in [0, 1]
    #[serde(default)]
    pub confidence: Option<f64>,
}

// =============================================================================
// Stream Frames
// =============================================================================

/// A single inbound frame on the event stream, discriminated by its `type` tag.
///
/// Frames are immutable once received and are routed to the accumulator in
/// arrival order. `complete` and `error` are terminal for the session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TrackFrame {
    /// Fast-track answer. Arrives as one complete unit; a later `hope` frame
    /// replaces the previous one, never appends to it.
    #[serde(rename_all = "camelCase")]
    Hope {
        /// The whole fast answer
        #[serde(default)]
        content: String,
        /// Where the fast answer came from (cache, index, ...)
        #[serde(default)]
        source: Option<String>,
        /// Backend-reported confidence in [0, 1]
        #[serde(default)]
        confidence: Option<f64>,
        /// True when the fast answer alone is deemed sufficient
        #[serde(default)]
        can_direct_answer: bool,
        /// Time the fast track took server-side, in milliseconds
        #[serde(default, rename = "responseTime")]
        response_time_ms: Option<u64>,
        /// Retrieval strategy the backend used for this answer
        #[serde(default)]
        strategy: Option<String>,
    },

    /// Detail-track delta. Appended, never replacing earlier deltas.
    #[serde(rename_all = "camelCase")]
    Llm {
        /// Incremental text to append to the detail track
        #[serde(default)]
        content: String,
        /// Position of this delta in the stream, when the backend numbers them
        #[serde(default)]
        chunk_index: Option<u32>,
    },

    /// Terminal: the detail track finished normally.
    #[serde(rename_all = "camelCase")]
    Complete {
        /// Session id to keep for feedback correlation; absent means
        /// "keep the id from the initiating response"
        #[serde(default)]
        session_id: Option<String>,
        /// Source documents backing the answer
        #[serde(default)]
        sources: Vec<String>,
        /// Number of deltas the backend sent in total
        #[serde(default)]
        total_chunks: Option<u32>,
        /// End-to-end generation time in milliseconds
        #[serde(default, rename = "totalTime")]
        total_time_ms: Option<u64>,
    },

    /// Terminal: the backend gave up. The message is shown verbatim and any
    /// partially streamed content is discarded from display.
    Error {
        /// Human-readable failure description from the backend
        #[serde(default)]
        error: String,
    },

    /// A `type` tag this client does not know. Routed nowhere.
    #[serde(other)]
    Unknown,
}

/// Decode one SSE `data:` payload into a frame.
///
/// Returns `None` when the payload is not valid frame JSON. The caller moves
/// on to the next frame; a corrupt frame never terminates the session.
pub fn decode_frame(payload: &str) -> Option<TrackFrame> {
    match serde_json::from_str::<TrackFrame>(payload) {
        Ok(frame) => Some(frame),
        Err(err) => {
            tracing::warn!(
                error = %err,
                payload = %truncate_for_log(payload),
                "Dropping malformed stream frame"
            );
            None
        }
    }
}

/// Cap payload excerpts in log lines.
fn truncate_for_log(payload: &str) -> &str {
    let cap = 120;
    if payload.len() <= cap {
        payload
    } else {
        // Back off to a char boundary so the slice cannot panic
        let mut end = cap;
        while !payload.is_char_boundary(end) {
            end -= 1;
        }
        &payload[..end]
    }
}

// =============================================================================
// Non-Streaming Call
// =============================================================================

/// Body of the non-streaming ask call.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    /// The question text
    pub question: String,
    /// Whether the backend should consult its knowledge base
    pub use_knowledge_base: bool,
}

/// Response of the non-streaming ask call. One shot, no tracks.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    /// The complete answer text
    #[serde(default)]
    pub answer: String,
    /// Source documents backing the answer
    #[serde(default)]
    pub sources: Vec<String>,
    /// Session id assigned by the backend, when it created one
    #[serde(default)]
    pub session_id: Option<String>,
    /// Server-side processing time in milliseconds
    #[serde(default)]
    pub response_time_ms: Option<u64>,
}

// =============================================================================
// Health & Status
// =============================================================================

/// Health probe response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Backend-reported status label
    #[serde(default)]
    pub status: String,
    /// Free-text detail
    #[serde(default)]
    pub message: String,
}

/// Observational status of a streaming session, as the backend sees it.
///
/// Purely informational; the client state machine never acts on it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    /// The session being described
    #[serde(default)]
    pub session_id: String,
    /// Backend-side lifecycle label (e.g. `STREAMING`, `COMPLETED`)
    #[serde(default)]
    pub status: String,
    /// Generation progress in [0, 1], when the backend estimates one
    #[serde(default)]
    pub progress: Option<f64>,
    /// Seconds since the backend session started
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    /// Characters of answer accumulated server-side
    #[serde(default)]
    pub answer_length: Option<u64>,
}

// =============================================================================
// Tests
// =============================================================================
