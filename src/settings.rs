use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log: LogSettings,
    /// Frames the driver runs before taking the snapshot.
    #[serde(default = "default_frames")]
    pub frames: u32,
    /// Rebuilders allocated up front.
    #[serde(default = "default_pool_capacity")]
    pub rebuilder_pool_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Daily rolling log files go here when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_frames() -> u32 {
    1
}

fn default_pool_capacity() -> usize {
    16
}

fn default_filter() -> String {
    "relayout=info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log: LogSettings::default(),
            frames: default_frames(),
            rebuilder_pool_capacity: default_pool_capacity(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            dir: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let data = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&data).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_settings(data: &str) -> Result<Settings, serde_json::Error> {
    serde_json::from_str(data)
}

#[cfg(test)]
#[path = "../tests/unit/settings.rs"]
mod tests;
