// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// Where the relay's YAML config comes from.
///
/// `FileSource` reads `chatrelay.yaml` (or whatever `--config` names);
/// `StringSource` holds the YAML inline, for tests and the replay tool's
/// built-in defaults.
pub trait ConfigSource {
    fn load(&self) -> Result<String, ConfigError>;

    /// Human-readable origin, logged at start-up.
    fn describe(&self) -> String;
}

/// Reads config from a file on disk.
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<String, ConfigError> {
        Ok(std::fs::read_to_string(&self.path)?)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Config content held in memory.
pub struct StringSource {
    pub content: String,
}

impl StringSource {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl ConfigSource for StringSource {
    fn load(&self) -> Result<String, ConfigError> {
        Ok(self.content.clone())
    }

    fn describe(&self) -> String {
        "<inline>".to_string()
    }
}
