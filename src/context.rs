//! Lazily detected sandbox state: should I/O go through portals, and is the
//! network reachable directly?
//!
//! Detection runs at most once per [`SandboxContext`], on the first query:
//! - Marker file `<runtime-dir>/flatpak-info` present: portals are required and
//!   the network is available only if `[Context] shared` lists `network`.
//! - Marker file absent: portals are opt-in via `GTK_USE_PORTAL=1...` and the
//!   network is unrestricted.
//!
//! A missing or unparseable marker never surfaces as an error.

use std::env::VarError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::debug;

use crate::keyfile::KeyFile;
use crate::paths;

/// Env var that opts an unconfined process into portal use.
pub const ENV_USE_PORTAL: &str = "GTK_USE_PORTAL";

const CONTEXT_GROUP: &str = "Context";
const SHARED_KEY: &str = "shared";
const NETWORK_RESOURCE: &str = "network";

type EnvFn = dyn Fn(&str) -> Result<String, VarError> + Send + Sync;

/// Frozen result of sandbox detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxFlags {
    /// Route operations through the portal layer instead of doing them directly.
    pub use_portal: bool,

    /// Direct network access is permitted.
    pub network_available: bool,
}

#[derive(Debug, Clone)]
struct Detection {
    marker_path: PathBuf,
    marker_present: bool,
    flags: SandboxFlags,
}

/// Sandbox detector with its own cached state.
///
/// Use [`SandboxContext::global`] for the process-wide instance, or build an
/// isolated one with [`SandboxContext::with_env`] / [`SandboxContext::with_marker_path`].
pub struct SandboxContext {
    env_fn: Box<EnvFn>,
    marker_path: Option<PathBuf>,
    detection: OnceLock<Detection>,
}

impl SandboxContext {
    /// Context backed by the real process environment.
    pub fn new() -> Self {
        Self::with_env(|key| std::env::var(key))
    }

    /// Context resolving env vars through `env_fn`.
    pub fn with_env<F>(env_fn: F) -> Self
    where
        F: Fn(&str) -> Result<String, VarError> + Send + Sync + 'static,
    {
        Self {
            env_fn: Box::new(env_fn),
            marker_path: None,
            detection: OnceLock::new(),
        }
    }

    /// Context that inspects `marker_path` instead of `<runtime-dir>/flatpak-info`.
    pub fn with_marker_path<F>(marker_path: impl Into<PathBuf>, env_fn: F) -> Self
    where
        F: Fn(&str) -> Result<String, VarError> + Send + Sync + 'static,
    {
        Self {
            marker_path: Some(marker_path.into()),
            ..Self::with_env(env_fn)
        }
    }

    /// Process-wide context, created on first use.
    pub fn global() -> &'static SandboxContext {
        static GLOBAL: OnceLock<SandboxContext> = OnceLock::new();
        GLOBAL.get_or_init(SandboxContext::new)
    }

    pub fn should_use_portal(&self) -> bool {
        self.flags().use_portal
    }

    pub fn network_available(&self) -> bool {
        self.flags().network_available
    }

    /// Detection result; runs detection on first call.
    pub fn flags(&self) -> SandboxFlags {
        self.detection().flags
    }

    /// Whether detection has already run.
    pub fn is_detected(&self) -> bool {
        self.detection.get().is_some()
    }

    /// Marker file path that detection inspected.
    pub fn marker_path(&self) -> &Path {
        &self.detection().marker_path
    }

    /// Human-readable status lines.
    pub fn status_lines(&self) -> Vec<String> {
        let detection = self.detection();
        let mut lines = Vec::new();

        let marker = if detection.marker_present {
            "present"
        } else {
            "absent"
        };
        lines.push(format!(
            "  Marker:    {} ({})",
            detection.marker_path.display(),
            marker
        ));

        if detection.flags.use_portal {
            lines.push("  Portal:    required".to_string());
        } else {
            lines.push("  Portal:    not required".to_string());
        }

        if detection.flags.network_available {
            lines.push("  Network:   available".to_string());
        } else {
            lines.push("  Network:   restricted".to_string());
        }

        lines
    }

    fn detection(&self) -> &Detection {
        self.detection.get_or_init(|| self.detect())
    }

    fn detect(&self) -> Detection {
        let marker_path = match &self.marker_path {
            Some(path) => path.clone(),
            None => paths::marker_path_with_env(&*self.env_fn),
        };

        let marker_present = marker_path.is_file();
        let flags = if marker_present {
            flags_from_marker(&marker_path)
        } else {
            flags_from_env(&*self.env_fn)
        };

        debug!(
            "Sandbox detection: marker {} {}, use_portal={}, network_available={}",
            marker_path.display(),
            if marker_present { "present" } else { "absent" },
            flags.use_portal,
            flags.network_available
        );

        Detection {
            marker_path,
            marker_present,
            flags,
        }
    }
}

impl Default for SandboxContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SandboxContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxContext")
            .field("marker_path", &self.marker_path)
            .field("detection", &self.detection.get())
            .finish_non_exhaustive()
    }
}

/// Confined process: portals always, network only if explicitly shared.
fn flags_from_marker(path: &Path) -> SandboxFlags {
    let mut flags = SandboxFlags {
        use_portal: true,
        network_available: false,
    };

    match KeyFile::load(path) {
        Ok(keyfile) => {
            if let Ok(shared) = keyfile.string_list(CONTEXT_GROUP, SHARED_KEY) {
                flags.network_available = shared.iter().any(|s| s == NETWORK_RESOURCE);
            }
        }
        Err(e) => debug!("Ignoring unreadable sandbox marker {}: {}", path.display(), e),
    }

    flags
}

/// Unconfined process: portals only on request, network unrestricted.
fn flags_from_env(env_fn: &EnvFn) -> SandboxFlags {
    SandboxFlags {
        use_portal: env_flag_set(env_fn(ENV_USE_PORTAL)),
        network_available: true,
    }
}

/// An env flag is set when its value starts with `1`.
fn env_flag_set(value: Result<String, VarError>) -> bool {
    match value {
        Ok(v) => v.starts_with('1'),
        Err(VarError::NotUnicode(raw)) => raw.as_encoded_bytes().first() == Some(&b'1'),
        Err(VarError::NotPresent) => false,
    }
}
