use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;

const MAX_INLINE_CHARS: usize = 256;

/// What one generation attempt asked for and what came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptReceipt {
    pub schema_version: u64,
    pub session_id: Option<String>,
    pub milestone_id: String,
    pub path: String,
    pub path_reason: String,
    pub source_image: String,
    pub outcome: Value,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub started_at: String,
    pub finished_at: String,
    pub elapsed_ms: u64,
}

impl AttemptReceipt {
    pub fn to_value(&self) -> Value {
        sanitize_payload(&serde_json::to_value(self).unwrap_or(Value::Null))
    }
}

pub fn write_receipt(path: &Path, receipt: &AttemptReceipt) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&receipt.to_value())?)?;
    Ok(())
}

/// Replaces inline image bodies (data URIs, oversized strings) with a
/// placeholder so receipts stay small and never leak full uploads. `http(s)`
/// links are kept whole.
pub fn sanitize_payload(value: &Value) -> Value {
    match value {
        Value::String(text) => {
            if text.starts_with("data:") {
                return Value::String(format!("<data-uri omitted, {} chars>", text.len()));
            }
            let is_link = text.starts_with("https://") || text.starts_with("http://");
            if text.len() > MAX_INLINE_CHARS && !is_link {
                return Value::String(format!("<omitted, {} chars>", text.len()));
            }
            value.clone()
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        Value::Array(rows) => Value::Array(rows.iter().map(sanitize_payload).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, row) in map {
                let lowered = key.to_ascii_lowercase();
                if matches!(lowered.as_str(), "image_base64" | "image_input" | "access_token") {
                    out.insert(key.clone(), Value::String("<omitted>".to_string()));
                    continue;
                }
                out.insert(key.clone(), sanitize_payload(row));
            }
            Value::Object(out)
        }
    }
}
