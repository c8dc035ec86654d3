//! Host integration shims
//!
//! The host sends messages through its own HTTP layer. The embedder forwards
//! each outgoing request here and we turn message sends into `messageSend`
//! events without changing the request itself.

use serde_json::Value;
use std::sync::Arc;

use crate::events::{EventBus, RuntimeEvent};

/// An outgoing host request as seen by the network layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingRequest {
    pub method: String,
    pub url: Option<String>,
    pub body: Option<String>,
}

impl OutgoingRequest {
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            url: Some(url.into()),
            body: Some(body.into()),
        }
    }
}

/// Synthesises `messageSend` events from outgoing requests
pub struct MessageSendShim {
    bus: Arc<EventBus>,
}

impl MessageSendShim {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Inspect `request`, emitting `messageSend` if it carries message content
    ///
    /// Returns whether an event was emitted. The request always proceeds.
    pub fn observe(&self, request: &OutgoingRequest) -> bool {
        let Some(body) = request.body.as_deref() else {
            return false;
        };
        let Ok(json) = serde_json::from_str::<Value>(body) else {
            return false;
        };
        let content = match json.get("content").and_then(Value::as_str) {
            Some(content) if !content.is_empty() => content.to_string(),
            _ => return false,
        };

        let channel_id = request.url.as_deref().and_then(channel_from_url);
        self.bus.publish(RuntimeEvent::MessageSend {
            content,
            channel_id,
        });
        true
    }
}

/// Second-to-last path segment, e.g. `/api/v9/channels/123/messages` -> `123`
fn channel_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let mut segments = path.trim_end_matches('/').rsplit('/');
    segments.next()?;
    segments
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}
