use std::time::Duration;

use frame_contracts::payload::ImagePayload;
use frame_contracts::records::{AuthSession, ImagePage, ImageRecord, NewImageRecord, StoredObject};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde_json::{json, Value};
use tracing::debug;

use crate::http::{
    http_client, read_json_reply, transport_message, truncate_text, JsonReply, MAX_ERROR_CHARS,
};
use crate::store::{decode_for_upload, object_path, ImageStore, StoreError};

const IMAGES_BUCKET: &str = "images";
const IMAGES_TABLE: &str = "images";

/// Supabase-backed persistence: GoTrue auth, Storage objects and the
/// `images` table through PostgREST. Row-level security does the scoping;
/// every call carries the user's access token.
#[derive(Clone)]
pub struct SupabaseStore {
    base_url: String,
    anon_key: Option<String>,
    http: HttpClient,
}

impl SupabaseStore {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            anon_key,
            http: http_client(timeout)?,
        })
    }

    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{IMAGES_BUCKET}/{path}",
            self.base_url
        )
    }

    /// Email/password sign-in; returns the session used by every other call.
    pub fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, StoreError> {
        let url = format!("{}/auth/v1/token", self.base_url);
        let call = self
            .with_api_key(self.http.post(&url))
            .query(&[("grant_type", "password")])
            .json(&json!({"email": email, "password": password}));
        let reply = send(call)?;
        let body = reply.body.unwrap_or(Value::Null);
        let access_token = body.get("access_token").and_then(Value::as_str);
        let user_id = body
            .get("user")
            .and_then(|user| user.get("id"))
            .and_then(Value::as_str);
        match (access_token, user_id) {
            (Some(access_token), Some(user_id)) => Ok(AuthSession {
                access_token: access_token.to_string(),
                user_id: user_id.to_string(),
            }),
            _ => Err(StoreError::Other(
                "sign-in response did not include a session".to_string(),
            )),
        }
    }

    fn with_api_key(&self, call: RequestBuilder) -> RequestBuilder {
        match self.anon_key.as_deref() {
            Some(anon_key) => call.header("apikey", anon_key),
            None => call,
        }
    }

    fn authed(&self, call: RequestBuilder, session: &AuthSession) -> RequestBuilder {
        self.with_api_key(call).bearer_auth(&session.access_token)
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{IMAGES_TABLE}", self.base_url)
    }
}

impl std::fmt::Debug for SupabaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseStore")
            .field("base_url", &self.base_url)
            .field("anon_key", &self.anon_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn send(call: RequestBuilder) -> Result<JsonReply, StoreError> {
    let response = call
        .send()
        .map_err(|err| StoreError::Transport(transport_message(&err)))?;
    let reply =
        read_json_reply(response).map_err(|err| StoreError::Transport(transport_message(&err)))?;
    if !reply.is_success() {
        let message = reply
            .body
            .as_ref()
            .and_then(|body| {
                ["message", "error_description", "error", "msg"]
                    .iter()
                    .find_map(|key| body.get(*key).and_then(Value::as_str))
            })
            .unwrap_or_else(|| reply.text.trim());
        let message = truncate_text(message, MAX_ERROR_CHARS);
        return Err(StoreError::Request {
            status: reply.status,
            message,
        });
    }
    Ok(reply)
}

fn rows_from(reply: JsonReply) -> Result<Vec<ImageRecord>, StoreError> {
    let body = reply.body.unwrap_or(Value::Array(Vec::new()));
    serde_json::from_value(body)
        .map_err(|err| StoreError::Other(format!("unreadable image rows: {err}")))
}

impl ImageStore for SupabaseStore {
    fn name(&self) -> &str {
        "supabase"
    }

    fn upload_image(
        &self,
        session: &AuthSession,
        payload: &ImagePayload,
        folder: &str,
    ) -> Result<StoredObject, StoreError> {
        let decoded = decode_for_upload(payload)?;
        let path = object_path(&session.user_id, folder, &decoded.mime_type);
        let url = format!(
            "{}/storage/v1/object/{IMAGES_BUCKET}/{path}",
            self.base_url
        );
        let call = self
            .authed(self.http.post(&url), session)
            .header(reqwest::header::CONTENT_TYPE, decoded.mime_type.as_str())
            .header(reqwest::header::CACHE_CONTROL, "max-age=3600")
            .header("x-upsert", "false")
            .body(decoded.bytes);
        send(call)?;
        debug!(path = %path, "uploaded image object");
        Ok(StoredObject {
            url: self.public_url(&path),
            path,
        })
    }

    fn create_image_record(
        &self,
        session: &AuthSession,
        mut record: NewImageRecord,
    ) -> Result<ImageRecord, StoreError> {
        record.user_id = session.user_id.clone();
        let call = self
            .authed(self.http.post(self.table_url()), session)
            .header("Prefer", "return=representation")
            .json(&record);
        let rows = rows_from(send(call)?)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Other("insert returned no row".to_string()))
    }

    fn get_image(&self, session: &AuthSession, image_id: &str) -> Result<ImageRecord, StoreError> {
        let target = format!("eq.{image_id}");
        let call = self
            .authed(self.http.get(self.table_url()), session)
            .query(&[("select", "*"), ("id", target.as_str())]);
        rows_from(send(call)?)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(image_id.to_string()))
    }

    fn list_images(
        &self,
        session: &AuthSession,
        page: ImagePage,
    ) -> Result<Vec<ImageRecord>, StoreError> {
        let owner = format!("eq.{}", session.user_id);
        let limit = page.limit.to_string();
        let offset = page.offset.to_string();
        let call = self
            .authed(self.http.get(self.table_url()), session)
            .query(&[
                ("select", "*"),
                ("user_id", owner.as_str()),
                ("order", "created_at.desc"),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ]);
        rows_from(send(call)?)
    }

    fn delete_image(&self, session: &AuthSession, image_id: &str) -> Result<(), StoreError> {
        let target = format!("eq.{image_id}");
        let call = self
            .authed(self.http.delete(self.table_url()), session)
            .header("Prefer", "return=representation")
            .query(&[("id", target.as_str())]);
        let rows = rows_from(send(call)?)?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(image_id.to_string()));
        }
        Ok(())
    }
}
