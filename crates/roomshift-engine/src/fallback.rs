use std::ops::RangeInclusive;

use rand::Rng;
use roomshift_contracts::request::TransformRequest;
use serde_json::Value;
use thiserror::Error;

use crate::config::PipelineConfig;

/// What the fallback is built from. `Raw` is the last resort when no validated request
/// survived; it is read best-effort and never re-validated.
#[derive(Debug, Clone, Copy)]
pub enum FallbackSource<'a> {
    Validated(&'a TransformRequest),
    Raw(&'a Value),
}

impl FallbackSource<'_> {
    fn before_url(&self) -> Option<String> {
        let url = match self {
            Self::Validated(request) => request.primary_photo(),
            Self::Raw(payload) => payload
                .get("photosProjetUrls")
                .and_then(Value::as_array)
                .and_then(|rows| rows.first())
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default(),
        };
        (!url.is_empty()).then(|| url.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackImage {
    pub before_url: String,
    pub after_url: String,
    /// Set only on the no-credential path; failure paths report real elapsed time.
    pub simulated_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackError {
    #[error("mock rotation has no images")]
    EmptyRotation,
}

#[derive(Debug, Clone)]
pub struct FallbackSynthesizer {
    default_before_url: String,
    rotation: Vec<String>,
    simulated_ms: RangeInclusive<u64>,
}

impl FallbackSynthesizer {
    pub fn new(
        default_before_url: impl Into<String>,
        rotation: Vec<String>,
        simulated_ms: RangeInclusive<u64>,
    ) -> Self {
        Self {
            default_before_url: default_before_url.into(),
            rotation,
            simulated_ms,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.mock_before_url.clone(),
            config.mock_after_urls.clone(),
            config.simulated_ms.clone(),
        )
    }

    pub fn rotation(&self) -> &[String] {
        &self.rotation
    }

    /// Stable style → rotation slot mapping.
    pub fn after_url_for_style(&self, request: &TransformRequest) -> Result<&str, FallbackError> {
        if self.rotation.is_empty() {
            return Err(FallbackError::EmptyRotation);
        }
        let slot = request.style().ordinal() % self.rotation.len();
        Ok(&self.rotation[slot])
    }

    /// No-credential mock: style-keyed image plus a simulated processing time.
    pub fn mock_for_style(&self, request: &TransformRequest) -> Result<FallbackImage, FallbackError> {
        let after_url = self.after_url_for_style(request)?.to_string();
        Ok(FallbackImage {
            before_url: request.primary_photo().to_string(),
            after_url,
            simulated_ms: Some(self.simulated_processing_ms()),
        })
    }

    /// Degraded result after a failed live attempt: random rotation slot, no simulated time.
    pub fn after_failure(&self, source: FallbackSource<'_>) -> Result<FallbackImage, FallbackError> {
        if self.rotation.is_empty() {
            return Err(FallbackError::EmptyRotation);
        }
        let slot = rand::thread_rng().gen_range(0..self.rotation.len());
        Ok(FallbackImage {
            before_url: source
                .before_url()
                .unwrap_or_else(|| self.default_before_url.clone()),
            after_url: self.rotation[slot].clone(),
            simulated_ms: None,
        })
    }

    fn simulated_processing_ms(&self) -> u64 {
        let (low, high) = (*self.simulated_ms.start(), *self.simulated_ms.end());
        if low >= high {
            return low;
        }
        rand::thread_rng().gen_range(low..=high)
    }
}
