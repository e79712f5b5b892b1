//! HTTP adapters for Quill sessions
//!
//! [`HttpBackend`] talks to a generation backend exposing:
//! - `GET {base}/sessions/{id}/events`: server-sent events, one JSON event per `data:` frame
//! - `GET {base}/sessions/{id}/status`: JSON status document
//!
//! It implements both [`EventSource`] and [`StatusEndpoint`], so one value
//! can back a whole session:
//!
//! ```rust,ignore
//! let backend = Arc::new(HttpBackend::new("http://localhost:8080")?);
//! let session = SessionHandle::start(id, &config, backend.clone(), backend);
//! ```

#![warn(unreachable_pub)]

use async_trait::async_trait;
use futures::TryStreamExt;
use quill_session::transport::sse_frames;
use quill_session::{
    EventSource, FrameStream, SessionId, StatusEndpoint, StatusResponse, TransportError,
};
use std::time::Duration;

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default limit for a whole status request; the event stream has none
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for one generation backend
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    status_timeout: Duration,
}

impl HttpBackend {
    /// Create backend client for `base_url`
    ///
    /// # Errors
    /// `Connect` if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Use an existing client
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
        }
    }

    /// With a limit on each status request
    #[must_use]
    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    /// Backend root URL, without trailing slash
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the event stream for `session_id`
    #[must_use]
    pub fn events_url(&self, session_id: &SessionId) -> String {
        format!("{}/sessions/{}/events", self.base_url, session_id)
    }

    /// URL of the status document for `session_id`
    #[must_use]
    pub fn status_url(&self, session_id: &SessionId) -> String {
        format!("{}/sessions/{}/status", self.base_url, session_id)
    }

    async fn get(
        &self,
        url: &str,
        accept: &str,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, TransportError> {
        let mut request = self.client.get(url).header(reqwest::header::ACCEPT, accept);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Interrupted(format!("request to {url} timed out"))
            } else {
                TransportError::Connect(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                endpoint: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl EventSource for HttpBackend {
    async fn subscribe(&self, session_id: &SessionId) -> Result<FrameStream, TransportError> {
        let url = self.events_url(session_id);
        let response = self.get(&url, "text/event-stream", None).await?;
        tracing::debug!(session = %session_id, %url, "event stream opened");

        let body = response
            .bytes_stream()
            .map_err(|e| TransportError::Interrupted(e.to_string()));
        Ok(sse_frames(body))
    }
}

#[async_trait]
impl StatusEndpoint for HttpBackend {
    async fn fetch_status(&self, session_id: &SessionId) -> Result<StatusResponse, TransportError> {
        let url = self.status_url(session_id);
        let response = self
            .get(&url, "application/json", Some(self.status_timeout))
            .await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Interrupted(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| TransportError::InvalidPayload(e.to_string()))
    }
}
