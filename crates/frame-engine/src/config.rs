use std::env;
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_VENDOR_ENDPOINT: &str =
    "https://gateway.nanobananapro.site/api/v1/images/generate";
pub const DEFAULT_DEMO_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Deployment switches for the enhancement paths.
///
/// The presence of `supabase_url` enables the backend-proxied path and the
/// persistence client; the presence of `vendor_api_key` enables the direct
/// vendor path.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameConfig {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub vendor_api_key: Option<String>,
    pub vendor_endpoint: String,
    pub demo_delay: Duration,
    pub http_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            vendor_api_key: None,
            vendor_endpoint: DEFAULT_VENDOR_ENDPOINT.to_string(),
            demo_delay: DEFAULT_DEMO_DELAY,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl FrameConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let demo_delay = match read("FOREVERFRAME_DEMO_DELAY_MS") {
            Some(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .with_context(|| format!("FOREVERFRAME_DEMO_DELAY_MS must be a number: {raw}"))?,
            ),
            None => DEFAULT_DEMO_DELAY,
        };
        let http_timeout = match read("FOREVERFRAME_HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse::<u64>().with_context(|| {
                format!("FOREVERFRAME_HTTP_TIMEOUT_SECS must be a number: {raw}")
            })?),
            None => DEFAULT_HTTP_TIMEOUT,
        };

        Ok(Self {
            supabase_url: read("SUPABASE_URL").map(|value| value.trim_end_matches('/').to_string()),
            supabase_anon_key: read("SUPABASE_ANON_KEY"),
            vendor_api_key: read("NANO_BANANA_PRO_API_KEY"),
            vendor_endpoint: read("NANO_BANANA_PRO_API_BASE")
                .unwrap_or_else(|| DEFAULT_VENDOR_ENDPOINT.to_string()),
            demo_delay,
            http_timeout,
        })
    }

    pub fn backend_configured(&self) -> bool {
        self.supabase_url.is_some()
    }

    pub fn vendor_configured(&self) -> bool {
        self.vendor_api_key.is_some()
    }

    /// Base URL of the deployed edge functions.
    pub fn functions_base(&self) -> Option<String> {
        self.supabase_url
            .as_deref()
            .map(|url| format!("{url}/functions/v1"))
    }
}

impl fmt::Debug for FrameConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "<set>");
        f.debug_struct("FrameConfig")
            .field("supabase_url", &self.supabase_url)
            .field("supabase_anon_key", &mask(&self.supabase_anon_key))
            .field("vendor_api_key", &mask(&self.vendor_api_key))
            .field("vendor_endpoint", &self.vendor_endpoint)
            .field("demo_delay", &self.demo_delay)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}
