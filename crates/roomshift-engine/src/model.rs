use anyhow::Result;
use serde_json::{json, Map, Value};

use crate::config::OutputSettings;

/// One call to the external image model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub image: String,
    pub prompt: String,
    pub reference_images: Vec<String>,
    pub num_outputs: u32,
    pub output_format: String,
    pub output_quality: u32,
}

impl GenerateRequest {
    pub fn new(
        image: impl Into<String>,
        prompt: impl Into<String>,
        reference_images: &[String],
        output: &OutputSettings,
    ) -> Self {
        Self {
            image: image.into(),
            prompt: prompt.into(),
            reference_images: reference_images
                .iter()
                .take(output.max_reference_images)
                .cloned()
                .collect(),
            num_outputs: output.num_outputs,
            output_format: output.output_format.clone(),
            output_quality: output.output_quality,
        }
    }

    /// Model input object; `reference_images` only when there are any.
    pub fn input(&self) -> Map<String, Value> {
        let mut input = Map::new();
        input.insert("image".to_string(), json!(self.image));
        input.insert("prompt".to_string(), json!(self.prompt));
        input.insert("num_outputs".to_string(), json!(self.num_outputs));
        input.insert("output_format".to_string(), json!(self.output_format));
        input.insert("output_quality".to_string(), json!(self.output_quality));
        if !self.reference_images.is_empty() {
            input.insert(
                "reference_images".to_string(),
                json!(self.reference_images),
            );
        }
        input
    }
}

/// The external generative-image collaborator.
///
/// Built once at startup and shared; `generate` runs on a worker thread and returns the
/// model's raw output value. Shape checks happen in the invoker.
pub trait ImageModel: Send + Sync {
    fn name(&self) -> &str;
    fn model_id(&self) -> &str;
    fn generate(&self, request: &GenerateRequest) -> Result<Value>;
}
