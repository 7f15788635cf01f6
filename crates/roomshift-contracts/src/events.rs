use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Append-only JSONL log for pipeline events.
///
/// - default fields are `type`, `request_id`, `ts`
/// - caller payload is merged last and can override defaults
/// - one compact JSON object per line
///
/// A writer without a path still builds every event, it just never touches disk.
/// Clones share the same sink; `for_request` rebinds the request id only.
#[derive(Debug, Clone)]
pub struct EventWriter {
    sink: Arc<EventSink>,
    request_id: String,
}

#[derive(Debug)]
struct EventSink {
    path: Option<PathBuf>,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            sink: Arc::new(EventSink {
                path: Some(path.into()),
                lock: Mutex::new(()),
            }),
            request_id: String::new(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            sink: Arc::new(EventSink {
                path: None,
                lock: Mutex::new(()),
            }),
            request_id: String::new(),
        }
    }

    pub fn for_request(&self, request_id: impl Into<String>) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            request_id: request_id.into(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.sink.path.as_deref()
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "request_id".to_string(),
            Value::String(self.request_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }

        let Some(path) = self.sink.path.as_deref() else {
            return Ok(Value::Object(event));
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create event log directory {}", parent.display())
            })?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .sink
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open event log {}", path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to event log {}", path.display()))?;

        Ok(Value::Object(event))
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
