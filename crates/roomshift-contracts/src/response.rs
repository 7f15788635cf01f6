use std::fmt;

use serde::{Deserialize, Serialize};

use crate::request::{FieldViolation, ValidationError};

/// Which path produced a result. Exactly one per response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformMode {
    Live,
    MockNoCredential,
    FallbackAfterRetry,
    FallbackAfterError,
}

impl TransformMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::MockNoCredential => "mock-no-credential",
            Self::FallbackAfterRetry => "fallback-after-retry",
            Self::FallbackAfterError => "fallback-after-error",
        }
    }

    pub fn is_fallback(self) -> bool {
        !matches!(self, Self::Live)
    }
}

impl fmt::Display for TransformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every key is always present so the shape never depends on the path taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub model: String,
    pub prompt: String,
    #[serde(rename = "processingTime")]
    pub processing_time_ms: u64,
    pub timestamp: String,
    pub mode: TransformMode,
    pub attempts: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformResult {
    #[serde(rename = "avantUrl")]
    pub before_url: String,
    #[serde(rename = "apresUrl")]
    pub after_url: String,
    #[serde(rename = "meta")]
    pub metadata: ResultMetadata,
}

impl TransformResult {
    pub fn mode(&self) -> TransformMode {
        self.metadata.mode
    }
}

/// HTTP 200 body, shared by live success and every fallback tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessBody {
    pub success: bool,
    #[serde(flatten)]
    pub result: TransformResult,
}

impl From<TransformResult> for SuccessBody {
    fn from(result: TransformResult) -> Self {
        Self {
            success: true,
            result,
        }
    }
}

/// HTTP 400 body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailureBody {
    pub error: String,
    pub details: Vec<FieldViolation>,
}

impl From<&ValidationError> for ValidationFailureBody {
    fn from(err: &ValidationError) -> Self {
        Self {
            error: "Invalid request".to_string(),
            details: err.violations.clone(),
        }
    }
}

/// HTTP 500 body, only when the fallback itself could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureBody {
    pub error: String,
    pub details: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{ResultMetadata, SuccessBody, TransformMode, TransformResult};

    fn result(mode: TransformMode, error: Option<String>) -> TransformResult {
        TransformResult {
            before_url: "https://cdn.example.com/before.jpg".to_string(),
            after_url: "https://cdn.example.com/after.jpg".to_string(),
            metadata: ResultMetadata {
                model: "mock".to_string(),
                prompt: String::new(),
                processing_time_ms: 1200,
                timestamp: "2026-10-15T00:00:00.000000+00:00".to_string(),
                mode,
                attempts: 0,
                error,
            },
        }
    }

    #[test]
    fn mode_serializes_as_kebab_case() -> anyhow::Result<()> {
        for mode in [
            TransformMode::Live,
            TransformMode::MockNoCredential,
            TransformMode::FallbackAfterRetry,
            TransformMode::FallbackAfterError,
        ] {
            assert_eq!(serde_json::to_value(mode)?, json!(mode.as_str()));
        }
        Ok(())
    }

    #[test]
    fn success_body_uses_wire_names() -> anyhow::Result<()> {
        let body = serde_json::to_value(SuccessBody::from(result(
            TransformMode::MockNoCredential,
            None,
        )))?;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["avantUrl"], json!("https://cdn.example.com/before.jpg"));
        assert_eq!(body["apresUrl"], json!("https://cdn.example.com/after.jpg"));
        assert_eq!(body["meta"]["processingTime"], json!(1200));
        assert_eq!(body["meta"]["mode"], json!("mock-no-credential"));
        assert_eq!(body["meta"]["error"], Value::Null);
        Ok(())
    }

    #[test]
    fn body_shape_is_identical_across_modes() -> anyhow::Result<()> {
        let keys = |value: &Value| -> Vec<String> {
            let mut keys: Vec<String> = value["meta"]
                .as_object()
                .map(|meta| meta.keys().cloned().collect())
                .unwrap_or_default();
            keys.sort();
            keys
        };
        let live = serde_json::to_value(SuccessBody::from(result(TransformMode::Live, None)))?;
        let failed = serde_json::to_value(SuccessBody::from(result(
            TransformMode::FallbackAfterRetry,
            Some("timed out".to_string()),
        )))?;
        assert_eq!(keys(&live), keys(&failed));
        assert_eq!(keys(&live).len(), 7);
        Ok(())
    }
}
