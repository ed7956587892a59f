//! Incremental Server-Sent-Events decoder
//!
//! Accumulates raw network bytes and yields the payload of each `data:` line.
//! Everything else in the SSE grammar (`event:`, `id:`, `retry:`, comment
//! lines, blank event separators) is skipped: the protocol discriminates
//! frames by a `type` field inside the JSON payload, not by SSE event names.

/// Maximum bytes we will buffer while waiting for a newline.
///
/// A single frame is a JSON object well under this; anything larger means the
/// stream is garbage and the buffer must not grow without bound.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Sentinel some gateways append at end of stream; carries no frame.
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental decoder from SSE bytes to `data:` payload strings.
///
/// Feed bytes with [`push_bytes`](Self::push_bytes), then drain payloads with
/// [`next_payload`](Self::next_payload) until it returns `None`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Unconsumed bytes; always starts at a line boundary
    buffer: Vec<u8>,
    /// Set once the buffer exceeded [`MAX_LINE_BYTES`] without a newline;
    /// bytes are discarded until the next newline resynchronizes us
    overflowed: bool,
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the network.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        if self.overflowed {
            // Drop everything up to and including the next newline, then
            // resume normal decoding with whatever follows it.
            if let Some(pos) = bytes.iter().position(|&b| b == b'\n') {
                self.overflowed = false;
                self.buffer.clear();
                self.buffer.extend_from_slice(&bytes[pos + 1..]);
            }
            return;
        }

        self.buffer.extend_from_slice(bytes);

        if self.buffer.len() > MAX_LINE_BYTES && !self.buffer.contains(&b'\n') {
            tracing::warn!(
                buffered = self.buffer.len(),
                "SSE line exceeded maximum length, discarding until next newline"
            );
            self.buffer.clear();
            self.overflowed = true;
        }
    }

    /// Pull the next `data:` payload, if a complete one is buffered.
    ///
    /// Non-data lines are consumed and skipped internally, so a `None` here
    /// only means "no complete payload yet", never "stream is over".
    pub fn next_payload(&mut self) -> Option<String> {
        while let Some(line) = self.take_line() {
            let line = line.trim_end_matches('\r');

            // Blank line: event separator. Comment line: keep-alive ping.
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let Some(data) = line.strip_prefix("data:") else {
                // event:, id:, retry:, or a field we do not know. The frame
                // type travels inside the payload, so none of these matter.
                continue;
            };

            let payload = data.strip_prefix(' ').unwrap_or(data);
            if payload.is_empty() || payload == DONE_SENTINEL {
                continue;
            }
            return Some(payload.to_string());
        }
        None
    }

    /// Remove and return one complete line from the buffer.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let rest = self.buffer.split_off(pos + 1);
        let mut line = std::mem::replace(&mut self.buffer, rest);
        line.pop(); // the newline itself
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Bytes currently waiting for a newline.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
