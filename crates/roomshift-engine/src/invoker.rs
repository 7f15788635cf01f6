use std::cell::RefCell;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use roomshift_contracts::events::EventWriter;
use serde_json::{json, Value};
use thiserror::Error;

use crate::model::{GenerateRequest, ImageModel};
use crate::retry::{RetryDecision, RetryOutcome, RetryPolicy, Sleeper};
use crate::state::PipelineState;
use crate::{error_chain_text, map_object};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("model call timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("model call failed: {0}")]
    Call(String),
    #[error("model call worker exited without a result")]
    WorkerLost,
    #[error("model output invalid: {0}")]
    OutputInvalid(String),
}

impl InvocationError {
    /// Transient failures are retried; a malformed success payload is not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::OutputInvalid(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeOutcome {
    Succeeded {
        output_urls: Vec<String>,
        attempts: u32,
    },
    RetryExhausted {
        last_error: InvocationError,
        attempts: u32,
    },
    OutputInvalid {
        error: InvocationError,
        attempts: u32,
    },
}

/// Calls the model with a timeout race and a bounded retry budget.
///
/// Each attempt runs on its own thread. When the timer wins, the pending call is abandoned:
/// its eventual result lands in a dropped channel and is ignored.
pub struct ModelInvoker {
    model: Arc<dyn ImageModel>,
    policy: RetryPolicy,
    timeout: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl ModelInvoker {
    pub fn new(
        model: Arc<dyn ImageModel>,
        policy: RetryPolicy,
        timeout: Duration,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            model,
            policy,
            timeout,
            sleeper,
        }
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    pub fn invoke(&self, request: &GenerateRequest, events: &EventWriter) -> Result<InvokeOutcome> {
        let log = AttemptLog::new(events);
        let outcome = self.policy.run(
            self.sleeper.as_ref(),
            |attempt| {
                log.record(
                    "attempt_started",
                    json!({
                        "attempt": attempt,
                        "provider": self.model.name(),
                        "model": self.model.model_id(),
                    }),
                );
                let result = self.attempt(request);
                match &result {
                    Ok(urls) => log.record(
                        "attempt_succeeded",
                        json!({ "attempt": attempt, "outputs": urls.len() }),
                    ),
                    Err(err) => log.record(
                        "attempt_failed",
                        json!({
                            "attempt": attempt,
                            "error": err.to_string(),
                            "retryable": err.is_retryable(),
                        }),
                    ),
                }
                result
            },
            |err| {
                if err.is_retryable() {
                    RetryDecision::Retry
                } else {
                    RetryDecision::Stop
                }
            },
            |attempt, _err, delay| {
                log.transition(PipelineState::Invoking, PipelineState::Retrying);
                log.record(
                    "retry_scheduled",
                    json!({ "attempt": attempt, "delay_ms": delay.as_millis() as u64 }),
                );
                log.transition(PipelineState::Retrying, PipelineState::Invoking);
            },
        );
        let logged = log.finish();

        let outcome = match outcome {
            RetryOutcome::Succeeded { value, attempts } => InvokeOutcome::Succeeded {
                output_urls: value,
                attempts,
            },
            RetryOutcome::Exhausted { error, attempts } => InvokeOutcome::RetryExhausted {
                last_error: error,
                attempts,
            },
            RetryOutcome::Stopped { error, attempts } => {
                InvokeOutcome::OutputInvalid { error, attempts }
            }
        };
        // A render already exists; losing its log lines must not cost the caller the image.
        if !matches!(outcome, InvokeOutcome::Succeeded { .. }) {
            logged?;
        }
        Ok(outcome)
    }

    fn attempt(&self, request: &GenerateRequest) -> Result<Vec<String>, InvocationError> {
        let (tx, rx) = mpsc::channel();
        let model = Arc::clone(&self.model);
        let call = request.clone();
        thread::Builder::new()
            .name("roomshift-model-call".to_string())
            .spawn(move || {
                let result = model.generate(&call);
                // The receiver is gone once the invoker has timed out.
                let _ = tx.send(result);
            })
            .map_err(|err| InvocationError::Call(format!("failed to spawn model call: {err}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(output)) => validate_output(&output),
            Ok(Err(err)) => Err(InvocationError::Call(error_chain_text(&err, 1024))),
            Err(RecvTimeoutError::Timeout) => Err(InvocationError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(InvocationError::WorkerLost),
        }
    }
}

/// Event sink for the retry loop. The first write failure is parked and reported once the
/// loop is done, so a broken log never changes how many calls are made.
struct AttemptLog<'a> {
    events: &'a EventWriter,
    failure: RefCell<Option<anyhow::Error>>,
}

impl<'a> AttemptLog<'a> {
    fn new(events: &'a EventWriter) -> Self {
        Self {
            events,
            failure: RefCell::new(None),
        }
    }

    fn record(&self, event_type: &str, payload: Value) {
        let mut failure = self.failure.borrow_mut();
        if failure.is_some() {
            return;
        }
        if let Err(err) = self.events.emit(event_type, map_object(payload)) {
            *failure = Some(err);
        }
    }

    fn transition(&self, from: PipelineState, to: PipelineState) {
        self.record(
            "state_changed",
            json!({ "from": from.as_str(), "to": to.as_str() }),
        );
    }

    fn finish(self) -> Result<()> {
        match self.failure.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Output must be a non-empty array whose entries resolve to http(s) URLs.
pub fn validate_output(output: &Value) -> Result<Vec<String>, InvocationError> {
    let Some(rows) = output.as_array() else {
        return Err(InvocationError::OutputInvalid(format!(
            "expected an array of URLs, got {}",
            value_kind(output)
        )));
    };
    if rows.is_empty() {
        return Err(InvocationError::OutputInvalid(
            "model returned no outputs".to_string(),
        ));
    }
    let mut urls = Vec::new();
    for row in rows {
        extract_output_urls(row, &mut urls);
    }
    if urls.is_empty() {
        return Err(InvocationError::OutputInvalid(
            "model outputs contained no image URLs".to_string(),
        ));
    }
    Ok(urls)
}

fn extract_output_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(url) => {
            let trimmed = url.trim();
            if trimmed.starts_with("http") && !out.iter().any(|existing| existing == trimmed) {
                out.push(trimmed.to_string());
            }
        }
        Value::Array(rows) => {
            for row in rows {
                extract_output_urls(row, out);
            }
        }
        Value::Object(obj) => {
            if let Some(url) = obj.get("url") {
                extract_output_urls(url, out);
            }
        }
        _ => {}
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
