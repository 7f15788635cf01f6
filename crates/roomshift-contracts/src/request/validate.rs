use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use super::{
    Dimensions, Palette, Style, TransformRequest, MAX_FLOOR_FEET, MAX_HEIGHT_FEET,
    MAX_INSPIRATION_PHOTOS, MAX_SOURCE_PHOTOS, MIN_FLOOR_FEET, MIN_HEIGHT_FEET, MIN_SOURCE_PHOTOS,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Malformed client input. Terminal for the request: never retried, never falls back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transform request: {}", describe(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![FieldViolation::new(field, message)],
        }
    }

    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|violation| violation.field == field)
    }
}

fn describe(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|violation| format!("{}: {}", violation.field, violation.message))
        .collect::<Vec<String>>()
        .join("; ")
}

/// Checks every field and reports all violations at once.
pub fn validate_request(payload: &Value) -> Result<TransformRequest, ValidationError> {
    let Some(body) = payload.as_object() else {
        return Err(ValidationError::single("body", "must be a JSON object"));
    };
    let mut violations = Vec::new();

    let dimensions = dimensions_from(body.get("dimensions"), &mut violations);
    let source_photos = photo_list(
        body,
        "photosProjetUrls",
        MIN_SOURCE_PHOTOS,
        MAX_SOURCE_PHOTOS,
        true,
        &mut violations,
    );
    let inspiration_photos = photo_list(
        body,
        "inspirationsUrls",
        0,
        MAX_INSPIRATION_PHOTOS,
        false,
        &mut violations,
    );
    let style = vocabulary(body, "style", Style::from_label, &Style::labels(), &mut violations);
    let palette = vocabulary(
        body,
        "palette",
        Palette::from_label,
        &Palette::labels(),
        &mut violations,
    );

    match (dimensions, style, palette) {
        (Some(dimensions), Some(style), Some(palette)) if violations.is_empty() => {
            Ok(TransformRequest {
                dimensions,
                source_photos,
                inspiration_photos,
                style,
                palette,
            })
        }
        _ => Err(ValidationError { violations }),
    }
}

fn dimensions_from(raw: Option<&Value>, violations: &mut Vec<FieldViolation>) -> Option<Dimensions> {
    let Some(raw) = raw else {
        violations.push(FieldViolation::new("dimensions", "is required"));
        return None;
    };
    let Some(obj) = raw.as_object() else {
        violations.push(FieldViolation::new("dimensions", "must be an object"));
        return None;
    };
    let length = bounded_number(obj, "longueur", MIN_FLOOR_FEET, MAX_FLOOR_FEET, violations);
    let width = bounded_number(obj, "largeur", MIN_FLOOR_FEET, MAX_FLOOR_FEET, violations);
    let height = bounded_number(obj, "hauteur", MIN_HEIGHT_FEET, MAX_HEIGHT_FEET, violations);
    Some(Dimensions {
        length: length?,
        width: width?,
        height: height?,
    })
}

fn bounded_number(
    obj: &Map<String, Value>,
    key: &str,
    min: f64,
    max: f64,
    violations: &mut Vec<FieldViolation>,
) -> Option<f64> {
    let field = format!("dimensions.{key}");
    let Some(raw) = obj.get(key) else {
        violations.push(FieldViolation::new(field, "is required"));
        return None;
    };
    let Some(value) = raw.as_f64().filter(|value| value.is_finite()) else {
        violations.push(FieldViolation::new(field, "must be a number"));
        return None;
    };
    if value < min || value > max {
        violations.push(FieldViolation::new(
            field,
            format!("must be between {min} and {max} feet (got {value})"),
        ));
        return None;
    }
    Some(value)
}

fn photo_list(
    body: &Map<String, Value>,
    key: &str,
    min: usize,
    max: usize,
    required: bool,
    violations: &mut Vec<FieldViolation>,
) -> Vec<String> {
    let rows = match body.get(key) {
        None | Some(Value::Null) if !required => return Vec::new(),
        None | Some(Value::Null) => {
            violations.push(FieldViolation::new(key, "is required"));
            return Vec::new();
        }
        Some(Value::Array(rows)) => rows,
        Some(_) => {
            violations.push(FieldViolation::new(key, "must be an array of URLs"));
            return Vec::new();
        }
    };

    if rows.len() < min || rows.len() > max {
        let message = if min == 0 {
            format!("must contain at most {max} photos (got {})", rows.len())
        } else {
            format!(
                "must contain between {min} and {max} photos (got {})",
                rows.len()
            )
        };
        violations.push(FieldViolation::new(key, message));
    }

    let mut urls = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let field = format!("{key}[{idx}]");
        match row.as_str() {
            Some(raw) if is_well_formed_url(raw) => urls.push(raw.to_string()),
            Some(raw) => violations.push(FieldViolation::new(
                field,
                format!("is not a well-formed URL: {}", preview(raw)),
            )),
            None => violations.push(FieldViolation::new(field, "must be a string URL")),
        }
    }
    urls
}

/// Script schemes parse fine but never name an image.
const REFUSED_SCHEMES: &[&str] = &["javascript", "vbscript"];

/// Any absolute URL, `data:` URIs included.
fn is_well_formed_url(raw: &str) -> bool {
    Url::parse(raw).is_ok_and(|url| !REFUSED_SCHEMES.contains(&url.scheme()))
}

fn preview(raw: &str) -> String {
    const MAX_CHARS: usize = 80;
    if raw.chars().count() <= MAX_CHARS {
        return format!("{raw:?}");
    }
    format!("{:?}…", raw.chars().take(MAX_CHARS).collect::<String>())
}

fn vocabulary<T>(
    body: &Map<String, Value>,
    key: &str,
    parse: fn(&str) -> Option<T>,
    allowed: &[&str],
    violations: &mut Vec<FieldViolation>,
) -> Option<T> {
    let Some(raw) = body.get(key) else {
        violations.push(FieldViolation::new(key, "is required"));
        return None;
    };
    let Some(text) = raw.as_str() else {
        violations.push(FieldViolation::new(key, "must be a string"));
        return None;
    };
    let parsed = parse(text);
    if parsed.is_none() {
        violations.push(FieldViolation::new(
            key,
            format!("unknown value {text:?} (expected one of: {})", allowed.join(", ")),
        ));
    }
    parsed
}
