use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse settings file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
}

pub type SettingsResult<T> = Result<T, SettingsError>;
