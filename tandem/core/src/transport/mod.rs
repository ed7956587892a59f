//! Stream Transport
//!
//! Decoding for the server-push side of the protocol. The backend delivers
//! frames over a Server-Sent-Events connection; this module turns the raw
//! byte stream into the `data:` payload strings that
//! [`crate::protocol::decode_frame`] understands.
//!
//! The decoder is incremental and chunk-boundary independent: the network may
//! hand us half a line, three lines, or a line split mid-UTF-8 sequence, and
//! the decoded payload sequence comes out identical.
//!
//! Connection ownership lives with the backend implementation
//! ([`crate::backend::HttpBackend`]); dropping the consumer end of the frame
//! channel is what closes the connection.

mod sse;

pub use sse::SseDecoder;
