use std::fmt;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// An encoded source or result image: either a `data:` URI or a URL.
///
/// The engine never interprets pixels; the payload is passed through to the
/// vendor as-is and only decoded when it has to be uploaded to storage.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImagePayload(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Self {
        Self(format!("data:{mime_type};base64,{}", BASE64.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_data_uri(&self) -> bool {
        self.0.starts_with("data:")
    }

    pub fn is_remote(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }

    pub fn decode(&self) -> Result<DecodedImage> {
        let Some(rest) = self.0.strip_prefix("data:") else {
            bail!("image payload is not a data URI");
        };
        let Some((header, data)) = rest.split_once(',') else {
            bail!("data URI is missing its ',' separator");
        };
        let Some(mime_type) = header.strip_suffix(";base64") else {
            bail!("only base64 data URIs are supported");
        };
        let bytes = BASE64
            .decode(data.trim())
            .context("data URI body is not valid base64")?;
        let mime_type = if mime_type.is_empty() {
            "application/octet-stream".to_string()
        } else {
            mime_type.to_string()
        };
        Ok(DecodedImage { mime_type, bytes })
    }

    /// Short label safe for logs; never contains the encoded body.
    pub fn describe(&self) -> String {
        if self.is_data_uri() {
            let mime = self
                .0
                .strip_prefix("data:")
                .and_then(|rest| rest.split([';', ',']).next())
                .unwrap_or("");
            return format!("data-uri({mime}, {} chars)", self.0.len());
        }
        self.0.clone()
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ImagePayload").field(&self.describe()).finish()
    }
}

impl From<&str> for ImagePayload {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ImagePayload {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Extension used for stored objects of the given MIME type.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let lowered = mime_type.to_ascii_lowercase();
    if lowered.contains("png") {
        return "png";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "jpg"
}
