//! The dual-track accumulator and its published snapshots.
//!
//! The accumulator owns the authoritative content buffers for one exchange.
//! Consumers only ever see [`AnswerSnapshot`] values derived from them; they
//! never read (let alone mutate) the buffers themselves. Every mutation is a
//! synchronous read-modify-write on the owned state, so content is identical
//! whether frames arrive back-to-back in one scheduler tick or spread over
//! seconds with renders in between.

/// Separator placed between fast and detail content in the merged view.
pub const ANSWER_SEPARATOR: &str = "\n\n---\n\n";

// =============================================================================
// Terminal Reason
// =============================================================================

/// Why an exchange ended, once it has.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TerminalReason {
    /// Exchange is still live (or never started)
    #[default]
    None,
    /// Stream finished normally
    Completed,
    /// Cancelled locally by the user
    Stopped,
    /// The connection failed or the backend signalled an error
    Errored,
}

impl TerminalReason {
    /// True for any reason other than `None`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self != Self::None
    }
}

impl std::fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Completed => write!(f, "completed"),
            Self::Stopped => write!(f, "stopped"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

// =============================================================================
// Answer Snapshot
// =============================================================================

/// The externally observable answer state at one point in time.
///
/// Snapshots are value-semantic: each publication is a fresh value and the
/// next publication fully replaces it. `merged` is the render surface; when
/// the exchange errors it carries the failure message regardless of what the
/// track fields hold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnswerSnapshot {
    /// Fast-track content. Replaced whole when a new fast answer arrives,
    /// never appended to.
    pub fast_content: String,
    /// Where the fast answer came from (cache, index, ...)
    pub fast_source: Option<String>,
    /// Backend-reported fast-track confidence
    pub fast_confidence: Option<f64>,
    /// Server-side fast-track latency in milliseconds; feedback payloads
    /// echo this back
    pub fast_response_time_ms: Option<u64>,
    /// Detail-track content. Grows by appended deltas only.
    pub detail_content: String,
    /// Render-ready view: fast content, separator, detail content, in that
    /// order, skipping whichever is absent. Replaced by the error message on
    /// a failed exchange.
    pub merged: String,
    /// True while more frames may still arrive
    pub is_streaming: bool,
    /// Source documents backing the answer, available at completion
    pub sources: Vec<String>,
    /// Session id for cancellation/feedback correlation
    pub session_id: Option<String>,
    /// Why the exchange ended, when it has
    pub terminal_reason: TerminalReason,
}

impl AnswerSnapshot {
    /// A placeholder published while a non-streaming request is in flight.
    #[must_use]
    pub fn thinking() -> Self {
        Self {
            is_streaming: true,
            ..Self::default()
        }
    }
}

// =============================================================================
// Dual-Track Accumulator
// =============================================================================

/// Authoritative accumulation state for one exchange.
///
/// Single-owner by design: exactly one task mutates it, and only snapshots
/// leave it. Dropping it drops the buffers; a new exchange always starts from
/// a fresh accumulator, so a prior exchange's content can never leak forward.
#[derive(Debug)]
pub struct DualTrackAccumulator {
    /// Fast-track buffer, replaced whole per fast answer
    fast: String,
    /// Where the fast answer came from
    fast_source: Option<String>,
    /// Backend-reported fast-track confidence
    fast_confidence: Option<f64>,
    /// Server-side fast-track latency in milliseconds
    fast_response_time_ms: Option<u64>,
    /// Detail-track buffer, append-only for the accumulator's lifetime
    detail: String,
    /// Source documents, set at completion
    sources: Vec<String>,
    /// Session id; seeded from the initiating call, overridden by `complete`
    session_id: Option<String>,
    /// Set when the exchange failed; replaces the merged view
    error_message: Option<String>,
    /// False once a terminal event was applied
    streaming: bool,
    /// Why the exchange ended
    terminal_reason: TerminalReason,
    /// Separator between the tracks in the merged view
    separator: String,
}

impl Default for DualTrackAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl DualTrackAccumulator {
    /// Create an accumulator for a fresh exchange.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fast: String::new(),
            fast_source: None,
            fast_confidence: None,
            fast_response_time_ms: None,
            detail: String::new(),
            sources: Vec::new(),
            session_id: None,
            error_message: None,
            streaming: true,
            terminal_reason: TerminalReason::None,
            separator: ANSWER_SEPARATOR.to_string(),
        }
    }

    /// Use a different separator in the merged view.
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Seed the session id from the initiating response.
    pub fn set_session_id(&mut self, session_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
    }

    /// Apply a fast-track answer. Replaces any previous fast answer; this
    /// track delivers whole answers, not deltas.
    pub fn on_fast_answer(
        &mut self,
        content: &str,
        source: Option<&str>,
        confidence: Option<f64>,
        response_time_ms: Option<u64>,
    ) {
        self.fast.clear();
        self.fast.push_str(content);
        self.fast_source = source.map(str::to_string);
        self.fast_confidence = confidence;
        self.fast_response_time_ms = response_time_ms;
    }

    /// Append one detail-track delta.
    pub fn on_detail_delta(&mut self, delta: &str) {
        self.detail.push_str(delta);
    }

    /// Apply the normal terminal event: store sources, adopt the completing
    /// session id when the backend sends one, stop streaming.
    pub fn on_complete(&mut self, session_id: Option<&str>, sources: &[String]) {
        if let Some(id) = session_id {
            self.session_id = Some(id.to_string());
        }
        self.sources = sources.to_vec();
        self.streaming = false;
        self.terminal_reason = TerminalReason::Completed;
    }

    /// Apply a failing terminal event. The message replaces the merged view;
    /// partially streamed content is discarded from display.
    pub fn fail(&mut self, message: &str) {
        if !self.detail.is_empty() || !self.fast.is_empty() {
            tracing::debug!(
                fast_len = self.fast.len(),
                detail_len = self.detail.len(),
                "Discarding partial answer content on error"
            );
        }
        self.error_message = Some(message.to_string());
        self.streaming = false;
        self.terminal_reason = TerminalReason::Errored;
    }

    /// Apply a local cancellation. Content accumulated so far stays visible.
    pub fn on_stopped(&mut self) {
        self.streaming = false;
        self.terminal_reason = TerminalReason::Stopped;
    }

    /// Derive a fresh published value from the authoritative state.
    #[must_use]
    pub fn snapshot(&self) -> AnswerSnapshot {
        AnswerSnapshot {
            fast_content: self.fast.clone(),
            fast_source: self.fast_source.clone(),
            fast_confidence: self.fast_confidence,
            fast_response_time_ms: self.fast_response_time_ms,
            detail_content: self.detail.clone(),
            merged: self.merged(),
            is_streaming: self.streaming,
            sources: self.sources.clone(),
            session_id: self.session_id.clone(),
            terminal_reason: self.terminal_reason,
        }
    }

    /// The render-ready merge of both tracks.
    #[must_use]
    pub fn merged(&self) -> String {
        if let Some(ref message) = self.error_message {
            return message.clone();
        }
        match (self.fast.is_empty(), self.detail.is_empty()) {
            (false, false) => format!("{}{}{}", self.fast, self.separator, self.detail),
            (false, true) => self.fast.clone(),
            (true, _) => self.detail.clone(),
        }
    }

    /// Fast-track content accumulated so far.
    #[must_use]
    pub fn fast_content(&self) -> &str {
        &self.fast
    }

    /// Where the fast answer came from, if one arrived.
    #[must_use]
    pub fn fast_source(&self) -> Option<&str> {
        self.fast_source.as_deref()
    }

    /// Fast-track confidence, if one arrived.
    #[must_use]
    pub fn fast_confidence(&self) -> Option<f64> {
        self.fast_confidence
    }

    /// Server-side fast-track latency, if reported.
    #[must_use]
    pub fn fast_response_time_ms(&self) -> Option<u64> {
        self.fast_response_time_ms
    }

    /// Detail-track content accumulated so far.
    #[must_use]
    pub fn detail_content(&self) -> &str {
        &self.detail
    }

    /// Source documents stored at completion.
    #[must_use]
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Current session id, if known.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// True once a terminal event was applied.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.terminal_reason.is_terminal()
    }
}

// =============================================================================
// Tests
// =============================================================================
