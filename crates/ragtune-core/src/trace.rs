//! [`ControllerTrace`]: the append-only structured event log.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single recorded decision. `timestamp` is milliseconds since the trace's
/// construction, not wall-clock time, so traces stay comparable across runs:
/// identical inputs produce identical event sequences modulo timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub timestamp_ms: u64,
    pub component: String,
    pub action: String,
    pub details: HashMap<String, serde_json::Value>,
}

/// Append-only ordered log, written only by the Controller (directly, or
/// relaying a tracker/pool decision it made).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerTrace {
    events: Vec<TraceEvent>,
    #[serde(skip)]
    start: Option<std::time::Instant>,
}

impl ControllerTrace {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start: Some(std::time::Instant::now()),
        }
    }

    pub fn record(
        &mut self,
        component: impl Into<String>,
        action: impl Into<String>,
        details: HashMap<String, serde_json::Value>,
    ) {
        let timestamp_ms = self
            .start
            .map(|s| s.elapsed().as_millis() as u64)
            .unwrap_or(0);
        let event = TraceEvent {
            timestamp_ms,
            component: component.into(),
            action: action.into(),
            details,
        };
        tracing::debug!(component = %event.component, action = %event.action, "trace_event");
        self.events.push(event);
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
