// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Raw YAML deserialization types (internal)
// Every field is optional here; defaults, interpolation, and validation
// happen in the loader on the way to the public types.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub chatrelay: String,
    pub backend: Option<RawBackendConfig>,
    pub identity: Option<RawIdentityConfig>,
    pub stream: Option<RawStreamConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBackendConfig {
    pub base_url: Option<String>,
    pub run_path: Option<String>,
    pub app_name: Option<String>,
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawIdentityConfig {
    pub default_user_id: Option<String>,
    pub default_session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStreamConfig {
    pub text_pointer: Option<String>,
    pub partial_pointer: Option<String>,
    pub partial_policy: Option<String>,
    pub annotation_types: Option<Vec<String>>,
    pub format_version: Option<String>,
    pub channel_capacity: Option<usize>,
    pub max_record_bytes: Option<usize>,
}
