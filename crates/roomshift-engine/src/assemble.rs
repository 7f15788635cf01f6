use std::time::Instant;

use roomshift_contracts::response::{ResultMetadata, TransformMode, TransformResult};

use crate::fallback::FallbackImage;
use crate::now_utc_iso;

/// How a request was resolved, before metadata is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Live {
        before_url: String,
        after_url: String,
        prompt: String,
        attempts: u32,
    },
    MockNoCredential {
        image: FallbackImage,
    },
    FallbackAfterRetry {
        image: FallbackImage,
        prompt: String,
        attempts: u32,
        last_error: String,
    },
    FallbackAfterError {
        image: FallbackImage,
        prompt: Option<String>,
        attempts: u32,
        error: String,
    },
}

impl Resolution {
    pub fn mode(&self) -> TransformMode {
        match self {
            Self::Live { .. } => TransformMode::Live,
            Self::MockNoCredential { .. } => TransformMode::MockNoCredential,
            Self::FallbackAfterRetry { .. } => TransformMode::FallbackAfterRetry,
            Self::FallbackAfterError { .. } => TransformMode::FallbackAfterError,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    live_model: String,
    mock_model: String,
}

impl ResponseAssembler {
    pub fn new(live_model: impl Into<String>, mock_model: impl Into<String>) -> Self {
        Self {
            live_model: live_model.into(),
            mock_model: mock_model.into(),
        }
    }

    /// `started` is pipeline entry. Only the no-credential mock reports a simulated time.
    pub fn assemble(&self, resolution: Resolution, started: Instant) -> TransformResult {
        let mode = resolution.mode();
        let elapsed_ms = elapsed_ms(started);
        let (before_url, after_url, model, prompt, processing_time_ms, attempts, error) =
            match resolution {
                Resolution::Live {
                    before_url,
                    after_url,
                    prompt,
                    attempts,
                } => (
                    before_url,
                    after_url,
                    self.live_model.clone(),
                    prompt,
                    elapsed_ms,
                    attempts,
                    None,
                ),
                Resolution::MockNoCredential { image } => (
                    image.before_url,
                    image.after_url,
                    self.mock_model.clone(),
                    String::new(),
                    image.simulated_ms.unwrap_or(elapsed_ms),
                    0,
                    None,
                ),
                Resolution::FallbackAfterRetry {
                    image,
                    prompt,
                    attempts,
                    last_error,
                } => (
                    image.before_url,
                    image.after_url,
                    self.mock_model.clone(),
                    prompt,
                    elapsed_ms,
                    attempts,
                    Some(last_error),
                ),
                Resolution::FallbackAfterError {
                    image,
                    prompt,
                    attempts,
                    error,
                } => (
                    image.before_url,
                    image.after_url,
                    self.mock_model.clone(),
                    prompt.unwrap_or_default(),
                    elapsed_ms,
                    attempts,
                    Some(error),
                ),
            };

        TransformResult {
            before_url,
            after_url,
            metadata: ResultMetadata {
                model,
                prompt,
                processing_time_ms,
                timestamp: now_utc_iso(),
                mode,
                attempts,
                error,
            },
        }
    }
}

/// Wall-clock milliseconds since `started`, never reported as zero.
fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis())
        .unwrap_or(u64::MAX)
        .max(1)
}
