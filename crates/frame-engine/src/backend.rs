use std::time::Duration;

use frame_contracts::records::AuthSession;
use frame_contracts::wire::{BackendEnhanceRequest, BackendEnhanceResponse, BackendHealth};
use reqwest::blocking::Client as HttpClient;
use tracing::debug;

use crate::error::EnhanceError;
use crate::http::{
    http_client, read_json_reply, transport_message, truncate_text, MAX_ERROR_CHARS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEnhancement {
    pub image_url: String,
    pub record_id: Option<String>,
}

/// Client for the `enhance-image` edge function. The function holds the
/// vendor key and persists the result; callers only present their session.
#[derive(Clone)]
pub struct BackendClient {
    functions_base: String,
    anon_key: Option<String>,
    http: HttpClient,
}

impl BackendClient {
    pub fn new(
        functions_base: impl Into<String>,
        anon_key: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            functions_base: functions_base.into().trim().trim_end_matches('/').to_string(),
            anon_key,
            http: http_client(timeout)?,
        })
    }

    pub fn enhance_endpoint(&self) -> String {
        format!("{}/enhance-image", self.functions_base)
    }

    pub fn enhance(
        &self,
        session: &AuthSession,
        request: &BackendEnhanceRequest,
    ) -> Result<BackendEnhancement, EnhanceError> {
        let endpoint = self.enhance_endpoint();
        let mut call = self
            .http
            .post(&endpoint)
            .bearer_auth(&session.access_token)
            .json(request);
        if let Some(anon_key) = self.anon_key.as_deref() {
            call = call.header("apikey", anon_key);
        }
        let response = call
            .send()
            .map_err(|err| EnhanceError::backend(None, transport_message(&err)))?;
        let reply = read_json_reply(response)
            .map_err(|err| EnhanceError::backend(None, transport_message(&err)))?;
        if !reply.is_success() {
            return Err(EnhanceError::backend(
                Some(reply.status),
                reply.failure_message("error"),
            ));
        }

        let parsed: BackendEnhanceResponse = reply
            .body
            .clone()
            .and_then(|body| serde_json::from_value(body).ok())
            .ok_or_else(|| {
                EnhanceError::backend(
                    Some(reply.status),
                    format!(
                        "backend returned an unreadable body: {}",
                        truncate_text(reply.text.trim(), MAX_ERROR_CHARS)
                    ),
                )
            })?;
        if !parsed.success {
            return Err(EnhanceError::backend(
                Some(reply.status),
                parsed
                    .error
                    .unwrap_or_else(|| "An unexpected error occurred".to_string()),
            ));
        }
        let Some(image_url) = parsed
            .enhanced_image_url
            .filter(|url| !url.trim().is_empty())
        else {
            return Err(EnhanceError::backend(
                Some(reply.status),
                "No image URL in API response",
            ));
        };
        debug!(record_id = ?parsed.image_id, "backend enhancement stored");
        Ok(BackendEnhancement {
            image_url,
            record_id: parsed.image_id,
        })
    }

    /// Liveness check; never fails, unreachable backends report unhealthy.
    pub fn health(&self) -> BackendHealth {
        match self.http.get(self.enhance_endpoint()).send() {
            Ok(response) => {
                let status = response.status();
                BackendHealth {
                    healthy: status.is_success(),
                    status: Some(status.as_u16()),
                    error: None,
                }
            }
            Err(err) => BackendHealth {
                healthy: false,
                status: None,
                error: Some(transport_message(&err)),
            },
        }
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("functions_base", &self.functions_base)
            .field("anon_key", &self.anon_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
