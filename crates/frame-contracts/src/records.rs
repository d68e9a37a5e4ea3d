use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_PAGE_LIMIT: u64 = 50;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user_id: String,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Location of an uploaded object in the `images` bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub path: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewImageRecord {
    pub user_id: String,
    pub original_image_url: String,
    pub enhanced_image_url: String,
    pub milestone_id: String,
    pub milestone_name: String,
    pub prompt: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub user_id: String,
    pub original_image_url: String,
    pub enhanced_image_url: Option<String>,
    pub milestone_id: String,
    pub milestone_name: Option<String>,
    pub prompt: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: Option<String>,
}

impl ImageRecord {
    pub fn from_new(id: impl Into<String>, record: NewImageRecord, created_at: String) -> Self {
        Self {
            id: id.into(),
            user_id: record.user_id,
            original_image_url: record.original_image_url,
            enhanced_image_url: Some(record.enhanced_image_url),
            milestone_id: record.milestone_id,
            milestone_name: Some(record.milestone_name),
            prompt: Some(record.prompt),
            status: record.status,
            metadata: record.metadata,
            created_at: Some(created_at),
        }
    }
}

/// Newest-first page of a user's gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePage {
    pub limit: u64,
    pub offset: u64,
}

impl Default for ImagePage {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

fn default_status() -> String {
    "completed".to_string()
}
