mod catalog;
mod validate;

use serde_json::{json, Value};

pub use catalog::{Palette, Style};
pub use validate::{validate_request, FieldViolation, ValidationError};

pub const MIN_SOURCE_PHOTOS: usize = 1;
pub const MAX_SOURCE_PHOTOS: usize = 5;
pub const MAX_INSPIRATION_PHOTOS: usize = 10;
pub const MIN_FLOOR_FEET: f64 = 1.0;
pub const MAX_FLOOR_FEET: f64 = 100.0;
pub const MIN_HEIGHT_FEET: f64 = 6.0;
pub const MAX_HEIGHT_FEET: f64 = 20.0;

/// Room size in feet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// A request that passed validation. Only `validate_request` builds one.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    dimensions: Dimensions,
    source_photos: Vec<String>,
    inspiration_photos: Vec<String>,
    style: Style,
    palette: Palette,
}

impl TransformRequest {
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// First source photo; always present on a validated request.
    pub fn primary_photo(&self) -> &str {
        self.source_photos
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn inspiration_photos(&self) -> &[String] {
        &self.inspiration_photos
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    /// Compact description for event payloads.
    pub fn summary(&self) -> Value {
        json!({
            "dimensions": {
                "length": self.dimensions.length,
                "width": self.dimensions.width,
                "height": self.dimensions.height,
            },
            "source_photos": self.source_photos.len(),
            "inspiration_photos": self.inspiration_photos.len(),
            "style": self.style.label(),
            "palette": self.palette.label(),
        })
    }
}
