use std::time::Duration;

use frame_contracts::wire::EnhancementRequest;
use reqwest::blocking::Client as HttpClient;
use serde_json::Value;
use tracing::debug;

use crate::error::EnhanceError;
use crate::http::{http_client, read_json_reply, transport_message};

type Extractor = fn(&Value) -> Option<&str>;

// The vendor publishes no stable response schema; these are the shapes seen
// so far, tried in order.
const RESPONSE_EXTRACTORS: [(&str, Extractor); 4] = [
    ("image_url", top_level_image_url),
    ("image", top_level_image),
    ("data.image_url", nested_data_image_url),
    ("result.url", nested_result_url),
];

/// Direct client for the image-generation endpoint. Holds the vendor key,
/// so it only belongs in trusted or explicitly insecure deployments.
#[derive(Clone)]
pub struct VendorClient {
    endpoint: String,
    api_key: String,
    http: HttpClient,
}

impl VendorClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            endpoint: endpoint.into().trim().to_string(),
            api_key: api_key.into(),
            http: http_client(timeout)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends the request and returns the enhanced image reference.
    pub fn generate(&self, request: &EnhancementRequest) -> Result<String, EnhanceError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request.to_vendor_payload())
            .send()
            .map_err(|err| EnhanceError::vendor(None, transport_message(&err)))?;
        let reply = read_json_reply(response)
            .map_err(|err| EnhanceError::vendor(None, transport_message(&err)))?;
        if !reply.is_success() {
            return Err(EnhanceError::vendor(
                Some(reply.status),
                reply.failure_message("message"),
            ));
        }
        let Some(body) = reply.body.as_ref() else {
            return Err(EnhanceError::UnexpectedResponseShape);
        };
        extract_image_reference(body)
    }
}

impl std::fmt::Debug for VendorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

pub fn extract_image_reference(body: &Value) -> Result<String, EnhanceError> {
    for (field_path, extractor) in RESPONSE_EXTRACTORS {
        if let Some(reference) = extractor(body).map(str::trim).filter(|value| !value.is_empty())
        {
            debug!(field_path, "vendor response image reference found");
            return Ok(reference.to_string());
        }
    }
    Err(EnhanceError::UnexpectedResponseShape)
}

fn top_level_image_url(body: &Value) -> Option<&str> {
    body.get("image_url").and_then(Value::as_str)
}

fn top_level_image(body: &Value) -> Option<&str> {
    body.get("image").and_then(Value::as_str)
}

fn nested_data_image_url(body: &Value) -> Option<&str> {
    body.get("data")
        .and_then(|data| data.get("image_url"))
        .and_then(Value::as_str)
}

fn nested_result_url(body: &Value) -> Option<&str> {
    body.get("result")
        .and_then(|result| result.get("url"))
        .and_then(Value::as_str)
}
