pub mod assemble;
pub mod config;
pub mod fallback;
pub mod invoker;
pub mod model;
mod pipeline;
pub mod replicate;
pub mod retry;
pub mod state;

#[cfg(test)]
mod testing;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub use config::PipelineConfig;
pub use pipeline::{TransformOutcome, TransformPipeline};

/// Flattens an error and its causes into one line, skipping repeated messages.
pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts.last().is_some_and(|existing| existing == trimmed) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub(crate) fn now_utc_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{error_chain_text, map_object, sha256_hex, truncate_text};

    #[test]
    fn error_chain_keeps_every_distinct_cause() {
        let err = anyhow::anyhow!("connection reset")
            .context("replicate request failed")
            .context("replicate request failed");
        let rendered = error_chain_text(&err, 400);
        assert_eq!(
            rendered,
            "replicate request failed | caused by: connection reset"
        );
        assert_eq!(error_chain_text(&err, 8), "replicat…");
    }

    #[test]
    fn helpers_handle_edge_inputs() {
        assert_eq!(truncate_text("Bohème", 10), "Bohème");
        assert_eq!(truncate_text("Bohème", 4), "Bohè…");
        assert!(map_object(json!(["not", "an", "object"])).is_empty());
        assert_eq!(map_object(json!({ "a": 1 }))["a"], json!(1));
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
