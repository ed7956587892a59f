//! HTTP Backend Implementation
//!
//! Production backend over the document-QA REST/SSE surface.
//!
//! # Endpoints
//!
//! - `POST /api/qa/stream` - initiate a dual-track exchange
//! - `GET {sseUrl}` - the event stream for one session (text/event-stream)
//! - `POST /api/qa/ask` - one-shot non-streaming ask
//! - `POST /api/qa/comparison/feedback` - answer-preference feedback
//! - `GET /api/qa/health` - health probe
//! - `GET /api/qa/stream/{sessionId}/status` - backend-side session status
//!
//! The event stream is pumped by a spawned task that feeds decoded frames
//! into a bounded channel. The task stops when the server ends the stream or
//! when the receiver is dropped, whichever comes first; either way the HTTP
//! connection is released.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use super::traits::{QaBackend, StreamEvent};
use crate::feedback::FeedbackSubmission;
use crate::protocol::{
    decode_frame, AskRequest, AskResponse, HealthResponse, SessionStatus, StreamRequest,
    StreamResponse, TrackFrame,
};
use crate::transport::SseDecoder;

/// Default backend origin when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

/// HTTP client for the QA backend.
#[derive(Clone)]
pub struct HttpBackend {
    /// Base origin, no trailing slash
    base_url: String,
    /// Timeout applied to every non-streaming request
    request_timeout: Duration,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend for the given base origin.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeouts(base_url, Duration::from_secs(5), Duration::from_secs(30))
    }

    /// Create a backend with explicit connect and request timeouts.
    ///
    /// The request timeout applies to the initiating, ask, feedback, health
    /// and status calls. The event stream itself gets no overall timeout: it
    /// stays open for the life of a session, and stall handling is the
    /// session's configurable concern.
    pub fn with_timeouts(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            http_client: reqwest::Client::builder()
                .connect_timeout(connect_timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Create from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("TANDEM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    /// Create from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &crate::config::TandemConfig) -> Self {
        Self::with_timeouts(
            config.base_url.clone(),
            config.connect_timeout,
            config.request_timeout,
        )
    }

    /// Get the base origin.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn stream_url(&self) -> String {
        format!("{}/api/qa/stream", self.base_url)
    }

    fn ask_url(&self) -> String {
        format!("{}/api/qa/ask", self.base_url)
    }

    fn feedback_url(&self) -> String {
        format!("{}/api/qa/comparison/feedback", self.base_url)
    }

    fn health_url(&self) -> String {
        format!("{}/api/qa/health", self.base_url)
    }

    fn status_url(&self, session_id: &str) -> String {
        format!("{}/api/qa/stream/{}/status", self.base_url, session_id)
    }

    /// Resolve a possibly-relative stream URL against the base origin.
    fn resolve_sse_url(&self, sse_url: &str) -> anyhow::Result<String> {
        if sse_url.starts_with("http://") || sse_url.starts_with("https://") {
            return Ok(sse_url.to_string());
        }
        let base = reqwest::Url::parse(&self.base_url)?;
        Ok(base.join(sse_url)?.to_string())
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl QaBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn health_check(&self) -> bool {
        let response = self
            .http_client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        match response {
            Ok(resp) if resp.status().is_success() => {
                if let Ok(health) = resp.json::<HealthResponse>().await {
                    tracing::debug!(
                        status = %health.status,
                        message = %health.message,
                        "Backend health probe"
                    );
                }
                true
            }
            Ok(resp) => {
                tracing::debug!(status = %resp.status(), "Backend health probe failed");
                false
            }
            Err(_) => false,
        }
    }

    async fn begin_stream(&self, request: &StreamRequest) -> anyhow::Result<StreamResponse> {
        let response = self
            .http_client
            .post(self.stream_url())
            .json(request)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("QA backend returned {status}: {body}");
        }

        Ok(response.json::<StreamResponse>().await?)
    }

    async fn open_stream(&self, sse_url: &str) -> anyhow::Result<mpsc::Receiver<StreamEvent>> {
        let url = self.resolve_sse_url(sse_url)?;

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("QA backend returned {status} opening stream: {body}");
        }

        let mut stream = response.bytes_stream();
        let (tx, rx) = mpsc::channel(100);

        // Pump task: network bytes -> SSE payloads -> frames -> channel.
        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        decoder.push_bytes(&bytes);
                        while let Some(payload) = decoder.next_payload() {
                            // Malformed payloads are logged and dropped inside
                            // decode_frame; the stream keeps going.
                            let Some(frame) = decode_frame(&payload) else {
                                continue;
                            };
                            let terminal = matches!(
                                frame,
                                TrackFrame::Complete { .. } | TrackFrame::Error { .. }
                            );
                            if tx.send(StreamEvent::Frame(frame)).await.is_err() {
                                // Receiver dropped, stop streaming
                                return;
                            }
                            if terminal {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Event stream read failed");
                        let _ = tx.send(StreamEvent::ConnectionLost(e.to_string())).await;
                        return;
                    }
                }
            }

            // Server closed the stream without a terminal frame
            let _ = tx
                .send(StreamEvent::ConnectionLost(
                    "stream closed before completion".to_string(),
                ))
                .await;
        });

        Ok(rx)
    }

    async fn ask_blocking(&self, request: &AskRequest) -> anyhow::Result<AskResponse> {
        let response = self
            .http_client
            .post(self.ask_url())
            .json(request)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("QA backend returned {status}: {body}");
        }

        Ok(response.json::<AskResponse>().await?)
    }

    async fn send_feedback(&self, submission: &FeedbackSubmission) -> anyhow::Result<()> {
        let response = self
            .http_client
            .post(self.feedback_url())
            .json(submission)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("feedback endpoint returned {status}");
        }

        // Body is informational only
        let _ = response.json::<serde_json::Value>().await;
        Ok(())
    }

    async fn session_status(&self, session_id: &str) -> anyhow::Result<SessionStatus> {
        let response = self
            .http_client
            .get(self.status_url(session_id))
            .timeout(self.request_timeout)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            anyhow::bail!("backend no longer knows session {session_id}");
        }
        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("status endpoint returned {status}");
        }

        Ok(response.json::<SessionStatus>().await?)
    }
}
