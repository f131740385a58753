// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Config loader and validator
//
// Loads chatrelay.yaml, applies defaults, resolves variable interpolation,
// validates each section, and computes a deterministic config hash.

mod defaults;
mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use defaults::DEFAULT_CONFIG_YAML;
pub use error::ConfigError;
pub use interpolation::resolve_variables;
pub use loader::{compute_hash, load_config};
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::{BackendConfig, Config, IdentityConfig, PartialPolicyKind, StreamConfig};
