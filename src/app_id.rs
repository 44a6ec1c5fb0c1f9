//! Recover a confined application's id from its systemd cgroup membership.
//!
//! Flatpak runs each app instance in a transient scope named
//! `flatpak-<app-id>-<instance>.scope`, which shows up in the process's
//! `name=systemd` cgroup line:
//!
//! ```text
//! 1:name=systemd:/user.slice/user-1000.slice/user@1000.service/app.slice/flatpak-org.example.App-12345.scope
//! ```

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

const SYSTEMD_CGROUP_PREFIX: &str = "1:name=systemd:";
const SCOPE_PREFIX: &str = "flatpak-";
const SCOPE_SUFFIX: &str = ".scope";

/// Look up the app id of the current process.
///
/// Returns `Ok("")` when the process sits in a systemd cgroup that is not a
/// flatpak scope.
pub fn lookup_sandboxed_app_id() -> Result<String> {
    lookup_app_id_for_pid(std::process::id())
}

/// Look up the app id of an arbitrary process via `/proc/<pid>/cgroup`.
pub fn lookup_app_id_for_pid(pid: u32) -> Result<String> {
    lookup_app_id_in(format!("/proc/{}/cgroup", pid))
}

/// Look up the app id from an explicit cgroup membership file.
///
/// The file is read fresh on every call.
pub fn lookup_app_id_in(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match parse_cgroup_app_id(&contents) {
        Some(app_id) => {
            debug!("Resolved app id {:?} from {}", app_id, path.display());
            Ok(app_id)
        }
        None => {
            debug!("No name=systemd cgroup in {}", path.display());
            Err(Error::NotFound)
        }
    }
}

/// Extract the app id from cgroup file contents.
///
/// `None` means no systemd line produced a result. A flatpak scope without a
/// `-` after the app id yields nothing and scanning moves on to later lines.
pub fn parse_cgroup_app_id(contents: &str) -> Option<String> {
    contents
        .split('\n')
        .filter_map(|line| line.strip_prefix(SYSTEMD_CGROUP_PREFIX))
        .find_map(app_id_from_unit)
}

fn app_id_from_unit(unit: &str) -> Option<String> {
    let scope = basename(unit);

    if !scope.ends_with(SCOPE_SUFFIX) {
        return Some(String::new());
    }

    match scope.strip_prefix(SCOPE_PREFIX) {
        Some(name) => name.split_once('-').map(|(app_id, _)| app_id.to_string()),
        None => Some(String::new()),
    }
}

/// Final path component, ignoring trailing slashes.
fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { "." } else { "/" };
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_cgroup(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cgroup");
        std::fs::write(&path, contents).unwrap();
        (tmp, path)
    }

    #[test]
    fn extracts_app_id_from_flatpak_scope() {
        let (_tmp, path) = write_cgroup(
            "12:pids:/user.slice\n1:name=systemd:/flatpak-org.example.App-12345.scope\n0::/\n",
        );
        assert_eq!(lookup_app_id_in(&path).unwrap(), "org.example.App");
    }

    #[test]
    fn extracts_app_id_from_nested_unit_path() {
        let contents = "1:name=systemd:/user.slice/user-1000.slice/user@1000.service/app.slice/flatpak-org.gnome.Maps-2094.scope";
        assert_eq!(
            parse_cgroup_app_id(contents).as_deref(),
            Some("org.gnome.Maps")
        );
    }

    #[test]
    fn non_flatpak_scope_yields_empty_id() {
        let contents = "1:name=systemd:/user.slice/user-1000.slice/session-2.scope\n";
        assert_eq!(parse_cgroup_app_id(contents).as_deref(), Some(""));
    }

    #[test]
    fn flatpak_prefix_without_scope_suffix_yields_empty_id() {
        let contents = "1:name=systemd:/app.slice/flatpak-org.example.App-1.service\n";
        assert_eq!(parse_cgroup_app_id(contents).as_deref(), Some(""));
    }

    #[test]
    fn first_systemd_line_wins() {
        let contents = "1:name=systemd:/init.scope\n1:name=systemd:/flatpak-org.example.App-1.scope\n";
        assert_eq!(parse_cgroup_app_id(contents).as_deref(), Some(""));
    }

    #[test]
    fn missing_systemd_line_is_not_found() {
        let (_tmp, path) = write_cgroup("0::/user.slice/user-1000.slice/session-2.scope\n");
        let err = lookup_app_id_in(&path).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Can't find peer app id: No name=systemd cgroup"
        );
    }

    #[test]
    fn other_hierarchy_ids_are_ignored() {
        let contents = "2:name=systemd:/flatpak-org.example.App-1.scope\n";
        assert_eq!(parse_cgroup_app_id(contents), None);
    }

    #[test]
    fn dashless_flatpak_scope_keeps_scanning() {
        let contents = "1:name=systemd:/flatpak-orgexampleapp.scope\n1:name=systemd:/flatpak-org.example.Other-7.scope\n";
        assert_eq!(
            parse_cgroup_app_id(contents).as_deref(),
            Some("org.example.Other")
        );
    }

    #[test]
    fn dashless_flatpak_scope_alone_is_not_found() {
        let (_tmp, path) = write_cgroup("1:name=systemd:/flatpak-orgexampleapp.scope\n");
        assert!(lookup_app_id_in(&path).unwrap_err().is_not_found());
    }

    #[test]
    fn unreadable_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = lookup_app_id_in(tmp.path().join("missing")).unwrap_err();
        assert!(err.is_io());
        assert!(err.to_string().starts_with("Can't find peer app id: "));
    }

    #[test]
    fn nonexistent_pid_is_io_error() {
        assert!(lookup_app_id_for_pid(u32::MAX).unwrap_err().is_io());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn current_process_lookup_reads_proc() {
        // The outcome depends on the host's cgroup layout, but /proc/self is readable.
        if let Err(e) = lookup_sandboxed_app_id() {
            assert!(e.is_not_found(), "unexpected error: {}", e);
        }
    }

    #[test]
    fn lookup_reads_fresh_contents_each_call() {
        let (_tmp, path) = write_cgroup("1:name=systemd:/flatpak-org.example.A-1.scope\n");
        assert_eq!(lookup_app_id_in(&path).unwrap(), "org.example.A");

        std::fs::write(&path, "1:name=systemd:/flatpak-org.example.B-2.scope\n").unwrap();
        assert_eq!(lookup_app_id_in(&path).unwrap(), "org.example.B");
    }

    #[test]
    fn basename_handles_edge_cases() {
        assert_eq!(basename("/a/b/c.scope"), "c.scope");
        assert_eq!(basename("/a/b/"), "b");
        assert_eq!(basename("c.scope"), "c.scope");
        assert_eq!(basename("/"), "/");
        assert_eq!(basename(""), ".");
    }
}
