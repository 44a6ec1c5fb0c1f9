//! Portal support - detect whether the process runs inside a Flatpak sandbox
//!
//! This crate answers three questions for I/O code that may need to route
//! operations through desktop portals:
//! - Should operations be mediated by portals? ([`should_use_portal`])
//! - Is direct network access permitted? ([`network_available_in_sandbox`])
//! - Which app id names the confined application? ([`lookup_sandboxed_app_id`])
//!
//! The first two are answered once per process and cached. The app-id lookup
//! reads `/proc/<pid>/cgroup` fresh on every call.

pub mod app_id;
pub mod context;
pub mod error;
pub mod keyfile;
pub mod paths;

pub use app_id::{
    lookup_app_id_for_pid, lookup_app_id_in, lookup_sandboxed_app_id, parse_cgroup_app_id,
};
pub use context::{ENV_USE_PORTAL, SandboxContext, SandboxFlags};
pub use error::{Error, Result};
pub use keyfile::{KeyFile, KeyFileError};
pub use paths::{ENV_RUNTIME_DIR, MARKER_FILE_NAME};

/// Whether operations should go through portals, for the current process.
pub fn should_use_portal() -> bool {
    SandboxContext::global().should_use_portal()
}

/// Whether the current process may use the network directly.
pub fn network_available_in_sandbox() -> bool {
    SandboxContext::global().network_available()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_wide_queries_are_stable() {
        let portal = should_use_portal();
        let network = network_available_in_sandbox();

        for _ in 0..3 {
            assert_eq!(should_use_portal(), portal);
            assert_eq!(network_available_in_sandbox(), network);
        }
        assert!(SandboxContext::global().is_detected());
    }
}
