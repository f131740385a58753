// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use sha2::{Digest, Sha256};

use super::defaults::*;
use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::raw;
use super::source::ConfigSource;
use super::types::*;

/// Load and validate a relay config from the given source.
///
/// Steps:
/// 1. Read raw YAML from source
/// 2. Compute SHA256 config hash
/// 3. Parse YAML into raw deserialization types
/// 4. Validate the version key
/// 5. Resolve variable interpolation in string fields and apply defaults
/// 6. Validate each section
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    let raw_yaml = source.load()?;
    let config_hash = compute_hash(&raw_yaml);

    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.chatrelay != CONFIG_VERSION {
        return Err(ConfigError::Validation(format!(
            "unsupported config version \"{}\", expected \"{CONFIG_VERSION}\"",
            raw.chatrelay
        )));
    }

    Ok(Config {
        version: raw.chatrelay,
        backend: build_backend_config(raw.backend.unwrap_or_default())?,
        identity: build_identity_config(raw.identity.unwrap_or_default())?,
        stream: build_stream_config(raw.stream.unwrap_or_default())?,
        config_hash,
    })
}

pub fn compute_hash(raw_yaml: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_yaml.as_bytes());
    let hash = hasher.finalize();
    format!("sha256:{:x}", hash)
}

/// Interpolate an optional string field, falling back to `default`.
fn string_field(value: Option<String>, default: &str) -> Result<String, ConfigError> {
    match value {
        Some(v) => resolve_variables(&v),
        None => Ok(default.to_string()),
    }
}

fn build_backend_config(raw: raw::RawBackendConfig) -> Result<BackendConfig, ConfigError> {
    let base_url = string_field(raw.base_url, DEFAULT_BASE_URL)?;
    let base_url = base_url.trim_end_matches('/').to_string();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "backend.base_url must start with http:// or https://, got \"{base_url}\""
        )));
    }

    let run_path = string_field(raw.run_path, DEFAULT_RUN_PATH)?;
    if !run_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "backend.run_path must start with '/', got \"{run_path}\""
        )));
    }

    let app_name = string_field(raw.app_name, DEFAULT_APP_NAME)?;
    if app_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "backend.app_name must not be empty".to_string(),
        ));
    }

    let connect_timeout_ms = match raw.connect_timeout_ms {
        Some(0) => None,
        Some(ms) => Some(ms),
        None => Some(DEFAULT_CONNECT_TIMEOUT_MS),
    };

    Ok(BackendConfig {
        base_url,
        run_path,
        app_name,
        connect_timeout_ms,
    })
}

fn build_identity_config(raw: raw::RawIdentityConfig) -> Result<IdentityConfig, ConfigError> {
    let default_user_id = string_field(raw.default_user_id, DEFAULT_USER_ID)?;
    if default_user_id.is_empty() {
        return Err(ConfigError::Validation(
            "identity.default_user_id must not be empty".to_string(),
        ));
    }

    // An absent or empty session id means one is generated per request.
    let default_session_id = match raw.default_session_id {
        Some(v) => Some(resolve_variables(&v)?).filter(|s| !s.is_empty()),
        None => None,
    };

    Ok(IdentityConfig {
        default_user_id,
        default_session_id,
    })
}

fn build_stream_config(raw: raw::RawStreamConfig) -> Result<StreamConfig, ConfigError> {
    let text_pointer = string_field(raw.text_pointer, DEFAULT_TEXT_POINTER)?;
    validate_pointer("stream.text_pointer", &text_pointer)?;

    let partial_pointer = string_field(raw.partial_pointer, DEFAULT_PARTIAL_POINTER)?;
    validate_pointer("stream.partial_pointer", &partial_pointer)?;

    let partial_policy = match raw.partial_policy {
        Some(name) => name
            .parse::<PartialPolicyKind>()
            .map_err(ConfigError::Validation)?,
        None => PartialPolicyKind::default(),
    };

    let format_version = string_field(raw.format_version, DEFAULT_FORMAT_VERSION)?;
    if format_version.is_empty() || !format_version.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ConfigError::Validation(format!(
            "stream.format_version must be a non-empty header token, got \"{format_version}\""
        )));
    }

    let channel_capacity = raw.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY);
    if channel_capacity == 0 {
        return Err(ConfigError::Validation(
            "stream.channel_capacity must be at least 1".to_string(),
        ));
    }

    let max_record_bytes = match raw.max_record_bytes.unwrap_or(DEFAULT_MAX_RECORD_BYTES) {
        0 => None,
        max => Some(max),
    };

    let annotation_types = raw.annotation_types.unwrap_or_default();
    if let Some(empty) = annotation_types.iter().position(|t| t.is_empty()) {
        return Err(ConfigError::Validation(format!(
            "stream.annotation_types[{empty}] must not be empty"
        )));
    }

    Ok(StreamConfig {
        text_pointer,
        partial_pointer,
        partial_policy,
        annotation_types,
        format_version,
        channel_capacity,
        max_record_bytes,
    })
}

/// A JSON pointer is empty (the whole document) or starts with `/`.
fn validate_pointer(field: &str, pointer: &str) -> Result<(), ConfigError> {
    if pointer.is_empty() || pointer.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{field} must be a JSON pointer starting with '/', got \"{pointer}\""
        )))
    }
}
