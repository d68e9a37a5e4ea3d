use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use frame_contracts::milestones::{Milestone, MilestoneCatalog};
use frame_contracts::payload::ImagePayload;
use frame_contracts::records::AuthSession;
use frame_contracts::wire::BackendEnhanceRequest;
use serde::Serialize;
use tracing::{info, warn};

use crate::backend::BackendClient;
use crate::builder::RequestBuilder;
use crate::config::{FrameConfig, DEFAULT_DEMO_DELAY};
use crate::error::EnhanceError;
use crate::routing::{select_path, EnhancementPath, PathFlags};
use crate::store::ImageStore;
use crate::supabase::SupabaseStore;
use crate::vendor::VendorClient;

const ORIGINALS_FOLDER: &str = "originals";

/// Per-call caller state. Passed explicitly so the gateway never reads
/// ambient auth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayContext {
    pub session: Option<AuthSession>,
}

impl GatewayContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(session: AuthSession) -> Self {
        Self {
            session: Some(session),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnhancementResult {
    Success {
        image_url: String,
        record_id: Option<String>,
    },
    Failure {
        message: String,
    },
}

impl EnhancementResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<Result<(String, Option<String>), EnhanceError>> for EnhancementResult {
    fn from(value: Result<(String, Option<String>), EnhanceError>) -> Self {
        match value {
            Ok((image_url, record_id)) => Self::Success {
                image_url,
                record_id,
            },
            Err(err) => Self::Failure {
                message: err.to_string(),
            },
        }
    }
}

/// Result of one attempt plus how it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOutcome {
    pub path: EnhancementPath,
    pub reason: String,
    pub result: EnhancementResult,
    pub upload_error: Option<String>,
    pub elapsed: Duration,
}

pub struct EnhancementGateway {
    builder: RequestBuilder,
    backend: Option<BackendClient>,
    vendor: Option<VendorClient>,
    store: Option<Arc<dyn ImageStore>>,
    demo_delay: Duration,
}

impl std::fmt::Debug for EnhancementGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnhancementGateway")
            .field("backend", &self.backend)
            .field("vendor", &self.vendor.as_ref().map(VendorClient::endpoint))
            .field("store", &self.store.as_ref().map(|store| store.name()))
            .field("demo_delay", &self.demo_delay)
            .finish()
    }
}

impl Default for EnhancementGateway {
    fn default() -> Self {
        Self::new(RequestBuilder::default())
    }
}

impl EnhancementGateway {
    /// A gateway with no remote paths configured; every attempt is a demo.
    pub fn new(builder: RequestBuilder) -> Self {
        Self {
            builder,
            backend: None,
            vendor: None,
            store: None,
            demo_delay: DEFAULT_DEMO_DELAY,
        }
    }

    pub fn from_config(config: &FrameConfig) -> Result<Self> {
        let mut gateway =
            Self::new(RequestBuilder::default()).with_demo_delay(config.demo_delay);
        if let (Some(functions_base), Some(supabase_url)) =
            (config.functions_base(), config.supabase_url.as_deref())
        {
            gateway = gateway
                .with_backend(
                    BackendClient::new(
                        functions_base,
                        config.supabase_anon_key.clone(),
                        config.http_timeout,
                    )
                    .context("failed to build backend client")?,
                )
                .with_store(Arc::new(
                    SupabaseStore::new(
                        supabase_url,
                        config.supabase_anon_key.clone(),
                        config.http_timeout,
                    )
                    .context("failed to build storage client")?,
                ));
        }
        if let Some(api_key) = config.vendor_api_key.as_deref() {
            gateway = gateway.with_vendor(
                VendorClient::new(&config.vendor_endpoint, api_key, config.http_timeout)
                    .context("failed to build vendor client")?,
            );
        }
        Ok(gateway)
    }

    pub fn with_backend(mut self, backend: BackendClient) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_vendor(mut self, vendor: VendorClient) -> Self {
        self.vendor = Some(vendor);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ImageStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_demo_delay(mut self, delay: Duration) -> Self {
        self.demo_delay = delay;
        self
    }

    pub fn catalog(&self) -> &MilestoneCatalog {
        self.builder.catalog()
    }

    pub fn builder(&self) -> &RequestBuilder {
        &self.builder
    }

    pub fn backend(&self) -> Option<&BackendClient> {
        self.backend.as_ref()
    }

    pub fn store(&self) -> Option<Arc<dyn ImageStore>> {
        self.store.clone()
    }

    pub fn flags(&self, context: &GatewayContext) -> PathFlags {
        PathFlags {
            backend_configured: self.backend.is_some(),
            authenticated: context.session.is_some(),
            vendor_key_configured: self.vendor.is_some(),
        }
    }

    pub fn enhance(
        &self,
        image: &ImagePayload,
        milestone_id: &str,
        context: &GatewayContext,
    ) -> EnhancementResult {
        self.run(image, milestone_id, context).result
    }

    /// Runs one attempt end to end. Never panics and never returns an error:
    /// every failure is folded into `EnhancementResult::Failure`.
    pub fn run(
        &self,
        image: &ImagePayload,
        milestone_id: &str,
        context: &GatewayContext,
    ) -> GatewayOutcome {
        let started = Instant::now();
        let selection = select_path(self.flags(context));
        info!(
            path = %selection.path,
            milestone_id,
            image = %image.describe(),
            "starting enhancement attempt"
        );

        let mut upload_error = None;
        let attempt = match self.builder.milestone(milestone_id) {
            Err(err) => Err(EnhanceError::from(err)),
            Ok(milestone) => match (selection.path, context.session.as_ref()) {
                (EnhancementPath::BackendProxied, Some(session)) => {
                    self.run_backend(session, image, milestone, &mut upload_error)
                }
                (EnhancementPath::DirectVendor, _) => self.run_vendor(image, milestone_id),
                _ => Ok(self.run_demo(image)),
            },
        };

        if let Err(err) = attempt.as_ref() {
            warn!(path = %selection.path, error = %err, "enhancement attempt failed");
        }

        GatewayOutcome {
            path: selection.path,
            reason: selection.reason,
            result: attempt.into(),
            upload_error,
            elapsed: started.elapsed(),
        }
    }

    fn run_backend(
        &self,
        session: &AuthSession,
        image: &ImagePayload,
        milestone: &Milestone,
        upload_error: &mut Option<String>,
    ) -> Result<(String, Option<String>), EnhanceError> {
        let Some(backend) = self.backend.as_ref() else {
            return Err(EnhanceError::backend(None, "backend is not configured"));
        };

        let uploaded = match self.store.as_ref().filter(|_| image.is_data_uri()) {
            Some(store) => match store.upload_image(session, image, ORIGINALS_FOLDER) {
                Ok(stored) => Some(stored.url),
                Err(err) => {
                    let err = EnhanceError::UploadFailed(err.to_string());
                    warn!(store = store.name(), error = %err, "continuing with in-memory payload");
                    *upload_error = Some(err.to_string());
                    None
                }
            },
            None => None,
        };

        let request = match uploaded {
            Some(url) => BackendEnhanceRequest {
                image_url: Some(url),
                image_base64: None,
                milestone_id: milestone.id.clone(),
                milestone_name: milestone.name.clone(),
            },
            None if image.is_remote() => BackendEnhanceRequest {
                image_url: Some(image.as_str().to_string()),
                image_base64: None,
                milestone_id: milestone.id.clone(),
                milestone_name: milestone.name.clone(),
            },
            None => BackendEnhanceRequest {
                image_url: None,
                image_base64: Some(image.as_str().to_string()),
                milestone_id: milestone.id.clone(),
                milestone_name: milestone.name.clone(),
            },
        };

        let enhanced = backend.enhance(session, &request)?;
        Ok((enhanced.image_url, enhanced.record_id))
    }

    fn run_vendor(
        &self,
        image: &ImagePayload,
        milestone_id: &str,
    ) -> Result<(String, Option<String>), EnhanceError> {
        let Some(vendor) = self.vendor.as_ref() else {
            return Err(EnhanceError::vendor(None, "vendor API key is not configured"));
        };
        let request = self.builder.build(image, milestone_id)?;
        let image_url = vendor.generate(&request)?;
        Ok((image_url, None))
    }

    fn run_demo(&self, image: &ImagePayload) -> (String, Option<String>) {
        if !self.demo_delay.is_zero() {
            thread::sleep(self.demo_delay);
        }
        (image.as_str().to_string(), None)
    }
}
