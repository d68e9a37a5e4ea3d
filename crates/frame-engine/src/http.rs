use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;

pub(crate) const MAX_ERROR_CHARS: usize = 512;

pub(crate) fn http_client(timeout: Duration) -> reqwest::Result<HttpClient> {
    HttpClient::builder().timeout(timeout).build()
}

/// Status plus body of a finished call. Bodies that are not JSON are kept
/// as text so error messages can still quote them.
#[derive(Debug, Clone)]
pub(crate) struct JsonReply {
    pub status: u16,
    pub body: Option<Value>,
    pub text: String,
}

impl JsonReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Message for a failed call: the named body field when the remote side
    /// sent one, else a generic status line.
    pub fn failure_message(&self, field: &str) -> String {
        self.body
            .as_ref()
            .and_then(|body| body.get(field))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(|message| truncate_text(message, MAX_ERROR_CHARS))
            .unwrap_or_else(|| format!("request failed with status {}", self.status))
    }
}

pub(crate) fn read_json_reply(response: HttpResponse) -> reqwest::Result<JsonReply> {
    let status = response.status().as_u16();
    let text = response.text()?;
    let body = serde_json::from_str::<Value>(&text).ok();
    Ok(JsonReply { status, body, text })
}

pub(crate) fn transport_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return "request timed out".to_string();
    }
    if err.is_connect() {
        return format!("could not connect: {err}");
    }
    truncate_text(&err.to_string(), MAX_ERROR_CHARS)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
