use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementPath {
    BackendProxied,
    DirectVendor,
    Demonstration,
}

impl EnhancementPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackendProxied => "backend_proxied",
            Self::DirectVendor => "direct_vendor",
            Self::Demonstration => "demonstration",
        }
    }

    pub fn uses_network(&self) -> bool {
        !matches!(self, Self::Demonstration)
    }
}

impl fmt::Display for EnhancementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathFlags {
    pub backend_configured: bool,
    pub authenticated: bool,
    pub vendor_key_configured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSelection {
    pub path: EnhancementPath,
    pub reason: String,
}

/// Picks the enhancement path for one attempt. Priority is strict:
/// backend (configured and signed in), then direct vendor, then demo.
pub fn select_path(flags: PathFlags) -> PathSelection {
    if flags.backend_configured && flags.authenticated {
        return PathSelection {
            path: EnhancementPath::BackendProxied,
            reason: "Backend configured and session present; vendor key stays server-side."
                .to_string(),
        };
    }

    let skipped = if flags.backend_configured {
        "Backend configured but no signed-in session"
    } else {
        "No backend configured"
    };

    if flags.vendor_key_configured {
        return PathSelection {
            path: EnhancementPath::DirectVendor,
            reason: format!("{skipped}; calling the vendor directly with the client-side key."),
        };
    }

    PathSelection {
        path: EnhancementPath::Demonstration,
        reason: format!("{skipped} and no vendor key; returning the original photo."),
    }
}
