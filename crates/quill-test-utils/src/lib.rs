//! Testing utilities for the Quill workspace
//!
//! Scripted transports and frame builders.

#![allow(missing_docs)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use quill_session::{
    EventSource, FrameStream, SessionId, StatusEndpoint, StatusResponse, TransportError,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

/// One scripted stream item
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver a raw frame
    Frame(String),
    /// Fail the stream; later steps are never delivered
    Fail(TransportError),
    /// Stay open forever without delivering anything
    Hang,
}

/// Event source replaying a fixed script on every subscription
#[derive(Debug, Default)]
pub struct ScriptedEventSource {
    steps: Vec<Step>,
    refuse: Option<TransportError>,
    subscriptions: AtomicU32,
}

impl ScriptedEventSource {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Deliver `frames`, then end the stream
    pub fn frames<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(frames.into_iter().map(|f| Step::Frame(f.into())).collect())
    }

    /// Refuse every subscription
    pub fn refusing(error: TransportError) -> Self {
        Self {
            refuse: Some(error),
            ..Self::default()
        }
    }

    pub fn subscriptions(&self) -> u32 {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for ScriptedEventSource {
    async fn subscribe(&self, _session_id: &SessionId) -> Result<FrameStream, TransportError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.refuse {
            return Err(error.clone());
        }

        let mut items = Vec::new();
        let mut hang = false;
        for step in &self.steps {
            match step {
                Step::Frame(frame) => items.push(Ok(frame.clone())),
                Step::Fail(error) => {
                    items.push(Err(error.clone()));
                    break;
                }
                Step::Hang => {
                    hang = true;
                    break;
                }
            }
        }

        let head = stream::iter(items);
        if hang {
            Ok(head.chain(stream::pending()).boxed())
        } else {
            Ok(head.boxed())
        }
    }
}

/// Status endpoint answering from a queue, then `pending` forever
#[derive(Debug, Default)]
pub struct ScriptedStatusEndpoint {
    responses: Mutex<VecDeque<Result<StatusResponse, TransportError>>>,
    calls: AtomicU32,
}

impl ScriptedStatusEndpoint {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<StatusResponse, TransportError>>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicU32::new(0),
        }
    }

    /// `pending` on every call
    pub fn always_pending() -> Self {
        Self::default()
    }

    /// `pending` for `n` calls, then `last`
    pub fn pending_then(n: usize, last: StatusResponse) -> Self {
        Self::new(
            std::iter::repeat_with(|| Ok(StatusResponse::pending()))
                .take(n)
                .chain(std::iter::once(Ok(last))),
        )
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusEndpoint for ScriptedStatusEndpoint {
    async fn fetch_status(&self, _session_id: &SessionId) -> Result<StatusResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(StatusResponse::pending()))
    }
}

// Frame builders

pub fn pipeline_info(stages: &[(&str, &str)]) -> String {
    let stages: Vec<Value> = stages
        .iter()
        .map(|(id, label)| json!({ "id": id, "label": label }))
        .collect();
    json!({ "type": "pipeline-info", "stages": stages }).to_string()
}

pub fn stage_start(stage_id: &str, label: &str) -> String {
    json!({ "type": "stage-start", "stageId": stage_id, "label": label }).to_string()
}

pub fn stage_start_step(stage_id: &str, step_index: u32, total_steps: u32, trace_id: &str) -> String {
    json!({
        "type": "stage-start",
        "stageId": stage_id,
        "label": stage_id,
        "stepIndex": step_index,
        "totalSteps": total_steps,
        "traceId": trace_id,
    })
    .to_string()
}

pub fn stage_chunk(text: &str) -> String {
    json!({ "type": "stage-chunk", "text": text }).to_string()
}

pub fn stage_complete(stage_id: &str, output: &str) -> String {
    json!({ "type": "stage-complete", "stageId": stage_id, "output": output }).to_string()
}

pub fn complete(document: &str, metadata: Value) -> String {
    json!({ "type": "complete", "document": document, "metadata": metadata }).to_string()
}

pub fn error(message: &str) -> String {
    json!({ "type": "error", "message": message }).to_string()
}

/// A whole two-stage run ending in `complete`
pub fn two_stage_run(draft: &str, polished: &str) -> Vec<String> {
    vec![
        pipeline_info(&[("draft", "Draft"), ("polish", "Polish")]),
        stage_start("draft", "Draft"),
        stage_chunk(draft),
        stage_complete("draft", draft),
        stage_start("polish", "Polish"),
        stage_chunk(polished),
        stage_complete("polish", polished),
        complete(polished, json!({ "words": polished.split_whitespace().count() })),
    ]
}
