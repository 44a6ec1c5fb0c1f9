use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the app-id lookup. Sandbox detection itself never fails.
#[derive(Debug, Error)]
pub enum Error {
    /// The cgroup membership file could not be read.
    #[error("Can't find peer app id: failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cgroup file was readable but lists no systemd membership.
    #[error("Can't find peer app id: No name=systemd cgroup")]
    NotFound,
}

impl Error {
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}
