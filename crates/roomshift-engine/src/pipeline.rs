use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use roomshift_contracts::events::EventWriter;
use roomshift_contracts::prompt::build_prompt;
use roomshift_contracts::request::{validate_request, TransformRequest, ValidationError};
use roomshift_contracts::response::{
    FailureBody, SuccessBody, TransformMode, TransformResult, ValidationFailureBody,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::assemble::{Resolution, ResponseAssembler};
use crate::config::{OutputSettings, PipelineConfig, MOCK_MODEL};
use crate::fallback::{FallbackSource, FallbackSynthesizer};
use crate::invoker::{InvokeOutcome, ModelInvoker};
use crate::model::{GenerateRequest, ImageModel};
use crate::replicate::ReplicateModel;
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use crate::state::PipelineState;
use crate::{error_chain_text, map_object, sha256_hex};

/// Final answer for one request, ready to be written as an HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutcome {
    /// Live result or any fallback tier (HTTP 200).
    Completed(TransformResult),
    /// Malformed input (HTTP 400).
    Rejected(ValidationError),
    /// The fallback itself could not be built (HTTP 500).
    Failed(FailureBody),
}

impl TransformOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Completed(_) => 200,
            Self::Rejected(_) => 400,
            Self::Failed(_) => 500,
        }
    }

    pub fn mode(&self) -> Option<TransformMode> {
        match self {
            Self::Completed(result) => Some(result.mode()),
            _ => None,
        }
    }

    pub fn body(&self) -> Value {
        let body = match self {
            Self::Completed(result) => serde_json::to_value(SuccessBody::from(result.clone())),
            Self::Rejected(err) => serde_json::to_value(ValidationFailureBody::from(err)),
            Self::Failed(failure) => serde_json::to_value(failure),
        };
        body.unwrap_or(Value::Null)
    }
}

/// Why the guarded section stopped early.
#[derive(Debug)]
enum Interrupt {
    Invalid(ValidationError),
    Escalated(anyhow::Error),
}

impl From<anyhow::Error> for Interrupt {
    fn from(err: anyhow::Error) -> Self {
        Self::Escalated(err)
    }
}

/// What the request had reached when something escaped; recovery reuses it instead of
/// re-reading the payload.
#[derive(Debug)]
struct Progress {
    state: PipelineState,
    request: Option<TransformRequest>,
    prompt: Option<String>,
    attempts: u32,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            state: PipelineState::Validating,
            request: None,
            prompt: None,
            attempts: 0,
        }
    }
}

/// Stateless between requests: every field is read-only after construction.
pub struct TransformPipeline {
    invoker: Option<ModelInvoker>,
    fallback: FallbackSynthesizer,
    assembler: ResponseAssembler,
    output: OutputSettings,
    events: EventWriter,
}

impl TransformPipeline {
    /// Builds the live client once when a credential is configured.
    pub fn from_config(config: &PipelineConfig, events: EventWriter) -> Result<Self> {
        let model: Option<Arc<dyn ImageModel>> = match config.api_token.as_deref() {
            Some(token) => Some(Arc::new(ReplicateModel::new(config, token)?)),
            None => None,
        };
        Ok(Self::new(config, model, Arc::new(ThreadSleeper), events))
    }

    /// `model = None` means no credential: every valid request gets the mock path.
    pub fn new(
        config: &PipelineConfig,
        model: Option<Arc<dyn ImageModel>>,
        sleeper: Arc<dyn Sleeper>,
        events: EventWriter,
    ) -> Self {
        let live_model = model
            .as_ref()
            .map(|model| model.model_id().to_string())
            .unwrap_or_else(|| config.model.clone());
        let invoker = model.map(|model| {
            ModelInvoker::new(
                model,
                RetryPolicy::fixed(config.max_attempts, config.retry_delay),
                config.timeout,
                sleeper,
            )
        });
        Self {
            invoker,
            fallback: FallbackSynthesizer::from_config(config),
            assembler: ResponseAssembler::new(live_model, MOCK_MODEL),
            output: config.output.clone(),
            events,
        }
    }

    pub fn is_live(&self) -> bool {
        self.invoker.is_some()
    }

    /// Parses a raw JSON body exactly once and runs it.
    pub fn transform_body(&self, body: &str) -> TransformOutcome {
        match serde_json::from_str::<Value>(body) {
            Ok(payload) => self.transform(&payload),
            Err(err) => {
                TransformOutcome::Rejected(ValidationError::single("body", format!("invalid JSON: {err}")))
            }
        }
    }

    pub fn transform(&self, payload: &Value) -> TransformOutcome {
        let started = Instant::now();
        let events = self.events.for_request(Uuid::new_v4().to_string());
        let mut progress = Progress::default();

        let guarded = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run(payload, started, &events, &mut progress)
        }));
        let error = match guarded {
            Ok(Ok(result)) => return TransformOutcome::Completed(result),
            Ok(Err(Interrupt::Invalid(err))) => return TransformOutcome::Rejected(err),
            Ok(Err(Interrupt::Escalated(err))) => err,
            Err(panic) => anyhow!("pipeline panicked: {}", panic_message(panic.as_ref())),
        };
        self.recover(payload, progress, &error, started, &events)
    }

    fn run(
        &self,
        payload: &Value,
        started: Instant,
        events: &EventWriter,
        progress: &mut Progress,
    ) -> Result<TransformResult, Interrupt> {
        let request = match validate_request(payload) {
            Ok(request) => request,
            Err(err) => {
                // Terminal either way; a broken log must not turn this into a fallback.
                let _ = events.emit(
                    "validation_failed",
                    map_object(json!({ "details": err.violations })),
                );
                let _ = transition(events, progress, PipelineState::Failed);
                return Err(Interrupt::Invalid(err));
            }
        };
        progress.request = Some(request.clone());
        events.emit(
            "request_received",
            map_object(json!({ "request": request.summary(), "live": self.is_live() })),
        )?;

        let Some(invoker) = self.invoker.as_ref() else {
            transition(events, progress, PipelineState::FallbackNoCredential)?;
            let image = self
                .fallback
                .mock_for_style(&request)
                .context("mock image selection failed")?;
            emit_fallback(events, TransformMode::MockNoCredential, "no credential configured")?;
            return Ok(self.finish(Resolution::MockNoCredential { image }, started, events));
        };

        transition(events, progress, PipelineState::Invoking)?;
        let prompt = build_prompt(&request);
        progress.prompt = Some(prompt.clone());
        events.emit(
            "prompt_built",
            map_object(json!({
                "prompt_sha256": sha256_hex(prompt.as_bytes()),
                "chars": prompt.chars().count(),
            })),
        )?;

        let call = GenerateRequest::new(
            request.primary_photo(),
            prompt.clone(),
            request.inspiration_photos(),
            &self.output,
        );
        let resolution = match invoker.invoke(&call, events)? {
            InvokeOutcome::Succeeded {
                output_urls,
                attempts,
            } => {
                progress.attempts = attempts;
                let after_url = output_urls
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("model output had no URLs"))?;
                // From here on the render is kept whatever happens to the log.
                let _ = transition(events, progress, PipelineState::Succeeded);
                Resolution::Live {
                    before_url: request.primary_photo().to_string(),
                    after_url,
                    prompt,
                    attempts,
                }
            }
            InvokeOutcome::RetryExhausted {
                last_error,
                attempts,
            } => {
                progress.attempts = attempts;
                transition(events, progress, PipelineState::Retrying)?;
                transition(events, progress, PipelineState::FallbackAfterRetry)?;
                let last_error = last_error.to_string();
                let image = self
                    .fallback
                    .after_failure(FallbackSource::Validated(&request))
                    .context("fallback image selection failed")?;
                emit_fallback(events, TransformMode::FallbackAfterRetry, &last_error)?;
                Resolution::FallbackAfterRetry {
                    image,
                    prompt,
                    attempts,
                    last_error,
                }
            }
            InvokeOutcome::OutputInvalid { error, attempts } => {
                progress.attempts = attempts;
                return Err(Interrupt::Escalated(error.into()));
            }
        };

        Ok(self.finish(resolution, started, events))
    }

    fn finish(
        &self,
        resolution: Resolution,
        started: Instant,
        events: &EventWriter,
    ) -> TransformResult {
        let result = self.assembler.assemble(resolution, started);
        let _ = emit_assembled(events, &result);
        result
    }

    /// Last resort. Logging here is best-effort: the log may be what failed.
    fn recover(
        &self,
        payload: &Value,
        mut progress: Progress,
        error: &anyhow::Error,
        started: Instant,
        events: &EventWriter,
    ) -> TransformOutcome {
        let error_text = error_chain_text(error, 1024);
        let _ = transition(events, &mut progress, PipelineState::FallbackAfterError);
        let source = match progress.request.as_ref() {
            Some(request) => FallbackSource::Validated(request),
            None => FallbackSource::Raw(payload),
        };

        match self.fallback.after_failure(source) {
            Ok(image) => {
                let _ = emit_fallback(events, TransformMode::FallbackAfterError, &error_text);
                let result = self.assembler.assemble(
                    Resolution::FallbackAfterError {
                        image,
                        prompt: progress.prompt.take(),
                        attempts: progress.attempts,
                        error: error_text,
                    },
                    started,
                );
                let _ = emit_assembled(events, &result);
                TransformOutcome::Completed(result)
            }
            Err(fallback_err) => {
                let _ = transition(events, &mut progress, PipelineState::Failed);
                let _ = events.emit(
                    "pipeline_failed",
                    map_object(json!({
                        "error": error_text,
                        "fallback_error": fallback_err.to_string(),
                    })),
                );
                TransformOutcome::Failed(FailureBody {
                    error: "Transformation failed".to_string(),
                    details: error_text,
                    message: fallback_err.to_string(),
                })
            }
        }
    }
}

fn transition(events: &EventWriter, progress: &mut Progress, to: PipelineState) -> Result<()> {
    let from = progress.state;
    if !from.can_enter(to) {
        bail!(
            "refused state change {} -> {}",
            from.as_str(),
            to.as_str()
        );
    }
    progress.state = to;
    events.emit(
        "state_changed",
        map_object(json!({ "from": from.as_str(), "to": to.as_str() })),
    )?;
    Ok(())
}

fn emit_fallback(events: &EventWriter, mode: TransformMode, reason: &str) -> Result<()> {
    events.emit(
        "fallback_selected",
        map_object(json!({ "mode": mode.as_str(), "reason": reason })),
    )?;
    Ok(())
}

fn emit_assembled(events: &EventWriter, result: &TransformResult) -> Result<()> {
    let mode = result.mode();
    events.emit(
        "response_assembled",
        map_object(json!({
            "mode": mode.as_str(),
            "state": PipelineState::for_mode(mode).as_str(),
            "fallback": mode.is_fallback(),
            "processing_time_ms": result.metadata.processing_time_ms,
            "attempts": result.metadata.attempts,
        })),
    )?;
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_string();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    "unknown panic".to_string()
}
