use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Couldn't read profile file {0}: {1}")]
    ReadProfile(PathBuf, #[source] std::io::Error),

    #[error("Couldn't parse profile file {0}: {1}")]
    ParseProfile(PathBuf, #[source] serde_json::Error),

    #[error("Couldn't write symbolicated profile to {0}: {1}")]
    WriteProfile(PathBuf, #[source] std::io::Error),

    #[error("Error while scanning library directory {0}: {1}")]
    LibDirScan(PathBuf, #[source] std::io::Error),
}
