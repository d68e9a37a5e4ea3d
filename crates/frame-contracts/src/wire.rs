use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::payload::ImagePayload;

pub const VENDOR_MODEL: &str = "nano-banana-pro";
pub const VENDOR_ASPECT_RATIO: &str = "4:3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Resolution {
    #[default]
    #[serde(rename = "4K")]
    UltraHd,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UltraHd => "4K",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Ultra,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ultra => "ultra",
        }
    }
}

/// A fully resolved vendor call for one generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementRequest {
    pub source_image: ImagePayload,
    pub milestone_id: String,
    pub prompt: String,
    pub model: String,
    pub resolution: Resolution,
    pub aspect_ratio: String,
    pub style_preset: String,
    pub preserve_faces: bool,
    pub quality: Quality,
}

impl EnhancementRequest {
    /// JSON body expected by the image-generation endpoint.
    pub fn to_vendor_payload(&self) -> Value {
        json!({
            "model": self.model,
            "prompt": self.prompt,
            "image_input": [self.source_image.as_str()],
            "resolution": self.resolution.as_str(),
            "aspect_ratio": self.aspect_ratio,
            "style_preset": self.style_preset,
            "preserve_faces": self.preserve_faces,
            "quality": self.quality.as_str(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendEnhanceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    pub milestone_id: String,
    pub milestone_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BackendEnhanceResponse {
    #[serde(default)]
    pub success: bool,
    pub enhanced_image_url: Option<String>,
    pub image_id: Option<String>,
    pub milestone: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub healthy: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
}
