//! Replay of recorded sessions
//!
//! Frames come from an NDJSON file, one raw event per line. Status responses
//! for recovery come from a second NDJSON file and are answered in order;
//! once they run out every check reports `pending`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use quill_session::{
    ChannelEventSource, PollerConfig, QuillConfig, SessionHandle, SessionId, SessionReport,
    StatusEndpoint, StatusResponse, TransportError,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Status endpoint answering from a recording
#[derive(Debug, Default)]
pub(crate) struct RecordedStatus {
    responses: Mutex<VecDeque<StatusResponse>>,
}

impl RecordedStatus {
    pub(crate) fn new(responses: Vec<StatusResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    pub(crate) fn parse(text: &str) -> Result<Self> {
        let responses = ndjson_lines(text)
            .enumerate()
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("invalid status response on line {}", n + 1))
            })
            .collect::<Result<Vec<StatusResponse>>>()?;
        Ok(Self::new(responses))
    }
}

#[async_trait]
impl StatusEndpoint for RecordedStatus {
    async fn fetch_status(&self, _session_id: &SessionId) -> Result<StatusResponse, TransportError> {
        Ok(self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(StatusResponse::pending))
    }
}

/// Non-empty lines of an NDJSON document
pub(crate) fn ndjson_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Run recorded frames through a session and return its final report.
///
/// Recorded replays do not wait between status checks.
pub(crate) async fn replay(
    frames: Vec<String>,
    status: RecordedStatus,
    config: &QuillConfig,
) -> Result<(SessionReport, ReplayViews)> {
    let config = config
        .clone()
        .with_poller(PollerConfig::new(config.poller.max_attempts, Duration::ZERO));

    let (sender, source) = ChannelEventSource::new(frames.len().max(1));
    for frame in frames {
        sender
            .send(Ok(frame))
            .await
            .context("replay channel closed")?;
    }
    drop(sender);

    let mut session = SessionHandle::start(
        SessionId::generate(),
        &config,
        Arc::new(source),
        Arc::new(status),
    );
    session
        .wait_terminal()
        .await
        .context("session stopped before finishing")?;

    let views = ReplayViews {
        attribution: session.attribution().as_ref().clone(),
    };
    let report = session.dispose().await?;
    Ok((report, views))
}

/// Views computed before the session is disposed
#[derive(Debug, Clone)]
pub(crate) struct ReplayViews {
    pub(crate) attribution: Vec<quill_diff::AttributionSegment<quill_session::StageId>>,
}

/// Read both recordings and replay them
pub(crate) async fn replay_files(
    events: &Path,
    status: Option<&Path>,
    config: &QuillConfig,
) -> Result<(SessionReport, ReplayViews)> {
    let text = std::fs::read_to_string(events)
        .with_context(|| format!("reading events from {}", events.display()))?;
    let frames = ndjson_lines(&text).map(str::to_string).collect();

    let status = match status {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading status responses from {}", path.display()))?;
            RecordedStatus::parse(&text)?
        }
        None => RecordedStatus::default(),
    };

    replay(frames, status, config).await
}
