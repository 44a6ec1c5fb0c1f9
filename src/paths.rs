//! XDG-style resolution of the per-user runtime directory.
//!
//! The runtime directory is resolved through a fallback chain:
//! 1. XDG_RUNTIME_DIR
//! 2. The user cache directory (XDG_CACHE_HOME, then `$HOME/.cache`)
//! 3. The platform cache directory via `etcetera`
//!
//! Relative paths from env vars are ignored per XDG spec. Every lookup goes
//! through an env function so callers (and tests) can resolve against a
//! synthetic environment.

use std::env::VarError;
use std::path::PathBuf;

/// Env var naming the per-user runtime directory.
pub const ENV_RUNTIME_DIR: &str = "XDG_RUNTIME_DIR";

/// Name of the sandbox marker file inside the runtime directory.
pub const MARKER_FILE_NAME: &str = "flatpak-info";

/// Resolve the runtime directory using real environment variables.
pub fn user_runtime_dir() -> PathBuf {
    user_runtime_dir_with_env(|key| std::env::var(key))
}

/// Resolve the runtime directory with a custom env var lookup.
pub fn user_runtime_dir_with_env<F>(env_fn: F) -> PathBuf
where
    F: Fn(&str) -> Result<String, VarError>,
{
    absolute_env(&env_fn, ENV_RUNTIME_DIR).unwrap_or_else(|| user_cache_dir(&env_fn))
}

/// Marker file location: `<runtime-dir>/flatpak-info`.
pub fn marker_path() -> PathBuf {
    marker_path_with_env(|key| std::env::var(key))
}

/// Marker file location resolved with a custom env var lookup.
pub fn marker_path_with_env<F>(env_fn: F) -> PathBuf
where
    F: Fn(&str) -> Result<String, VarError>,
{
    user_runtime_dir_with_env(env_fn).join(MARKER_FILE_NAME)
}

fn user_cache_dir<F>(env_fn: &F) -> PathBuf
where
    F: Fn(&str) -> Result<String, VarError>,
{
    if let Some(dir) = absolute_env(env_fn, "XDG_CACHE_HOME") {
        return dir;
    }

    if let Some(home) = absolute_env(env_fn, "HOME") {
        return home.join(".cache");
    }

    use etcetera::BaseStrategy;

    // No usable HOME in the given env: let etcetera consult the password database.
    etcetera::choose_base_strategy()
        .map(|strategy| strategy.cache_dir())
        .unwrap_or_else(|_| PathBuf::from(".cache"))
}

/// Read an env var as an absolute path. Empty and relative values are ignored.
fn absolute_env<F>(env_fn: &F, var: &str) -> Option<PathBuf>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    env_fn(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
}
