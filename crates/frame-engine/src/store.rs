use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use frame_contracts::payload::{extension_for_mime, DecodedImage, ImagePayload};
use frame_contracts::records::{AuthSession, ImagePage, ImageRecord, NewImageRecord, StoredObject};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("image payload cannot be stored: {0}")]
    InvalidPayload(String),
    #[error("storage request failed ({status}): {message}")]
    Request { status: u16, message: String },
    #[error("storage transport error: {0}")]
    Transport(String),
    #[error("image record not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Other(String),
}

/// Authentication-scoped file storage and image-record CRUD.
///
/// Every call is a fallible remote operation with no retry; callers decide
/// whether a failure is fatal.
pub trait ImageStore: Send + Sync {
    fn name(&self) -> &str;

    fn upload_image(
        &self,
        session: &AuthSession,
        payload: &ImagePayload,
        folder: &str,
    ) -> Result<StoredObject, StoreError>;

    fn create_image_record(
        &self,
        session: &AuthSession,
        record: NewImageRecord,
    ) -> Result<ImageRecord, StoreError>;

    fn get_image(&self, session: &AuthSession, image_id: &str) -> Result<ImageRecord, StoreError>;

    fn list_images(
        &self,
        session: &AuthSession,
        page: ImagePage,
    ) -> Result<Vec<ImageRecord>, StoreError>;

    fn delete_image(&self, session: &AuthSession, image_id: &str) -> Result<(), StoreError>;
}

/// `<user_id>/<folder>/<millis>-<suffix>.<ext>`, the bucket layout the
/// storage policies key on.
pub fn object_path(user_id: &str, folder: &str, mime_type: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{user_id}/{folder}/{}-{}.{}",
        Utc::now().timestamp_millis(),
        &suffix[..8],
        extension_for_mime(mime_type)
    )
}

pub(crate) fn decode_for_upload(payload: &ImagePayload) -> Result<DecodedImage, StoreError> {
    payload
        .decode()
        .map_err(|err| StoreError::InvalidPayload(format!("{err:#}")))
}

/// In-process store used by tests and offline runs.
#[derive(Debug)]
pub struct MemoryImageStore {
    public_base: String,
    objects: Mutex<BTreeMap<String, DecodedImage>>,
    records: Mutex<Vec<ImageRecord>>,
}

impl Default for MemoryImageStore {
    fn default() -> Self {
        Self::new("memory://images")
    }
}

impl MemoryImageStore {
    pub fn new(public_base: impl Into<String>) -> Self {
        Self {
            public_base: public_base.into(),
            objects: Mutex::new(BTreeMap::new()),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn object(&self, path: &str) -> Option<DecodedImage> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(path).cloned())
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }
}

fn poisoned() -> StoreError {
    StoreError::Other("memory store lock poisoned".to_string())
}

impl ImageStore for MemoryImageStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn upload_image(
        &self,
        session: &AuthSession,
        payload: &ImagePayload,
        folder: &str,
    ) -> Result<StoredObject, StoreError> {
        let decoded = decode_for_upload(payload)?;
        let path = object_path(&session.user_id, folder, &decoded.mime_type);
        let url = format!("{}/{path}", self.public_base);
        self.objects
            .lock()
            .map_err(|_| poisoned())?
            .insert(path.clone(), decoded);
        Ok(StoredObject { path, url })
    }

    fn create_image_record(
        &self,
        session: &AuthSession,
        mut record: NewImageRecord,
    ) -> Result<ImageRecord, StoreError> {
        record.user_id = session.user_id.clone();
        let created = ImageRecord::from_new(
            uuid::Uuid::new_v4().to_string(),
            record,
            Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        );
        self.records
            .lock()
            .map_err(|_| poisoned())?
            .push(created.clone());
        Ok(created)
    }

    fn get_image(&self, session: &AuthSession, image_id: &str) -> Result<ImageRecord, StoreError> {
        self.records
            .lock()
            .map_err(|_| poisoned())?
            .iter()
            .find(|record| record.id == image_id && record.user_id == session.user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(image_id.to_string()))
    }

    fn list_images(
        &self,
        session: &AuthSession,
        page: ImagePage,
    ) -> Result<Vec<ImageRecord>, StoreError> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        Ok(records
            .iter()
            .rev()
            .filter(|record| record.user_id == session.user_id)
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    fn delete_image(&self, session: &AuthSession, image_id: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        let before = records.len();
        records.retain(|record| !(record.id == image_id && record.user_id == session.user_id));
        if records.len() == before {
            return Err(StoreError::NotFound(image_id.to_string()));
        }
        Ok(())
    }
}
