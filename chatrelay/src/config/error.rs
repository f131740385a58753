// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

/// Errors from loading a relay config. Any of these aborts start-up.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read relay config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("relay config is not valid YAML for the v1 schema: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("invalid relay config: {0}")]
    Validation(String),

    #[error("relay config references ${{{name}}}, which is not set in the environment")]
    UndefinedVariable { name: String },
}
