// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::defaults::*;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Parsed and validated relay config.
#[derive(Debug, Clone)]
pub struct Config {
    /// Config version. Always "v1".
    pub version: String,
    pub backend: BackendConfig,
    pub identity: IdentityConfig,
    pub stream: StreamConfig,
    /// SHA256 hash of the raw YAML: "sha256:{hex}".
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Where and how to reach the agent backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Scheme, host, and port, without a trailing slash.
    pub base_url: String,
    /// Path of the streaming run endpoint, starting with `/`.
    pub run_path: String,
    /// Agent application name sent as `appName`.
    pub app_name: String,
    /// Connect timeout. `None` disables it. Streams themselves never time out.
    pub connect_timeout_ms: Option<u64>,
}

impl BackendConfig {
    /// Full URL of the streaming run endpoint.
    pub fn run_url(&self) -> String {
        format!("{}{}", self.base_url, self.run_path)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            run_path: DEFAULT_RUN_PATH.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            connect_timeout_ms: Some(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

/// Identity used when a chat request does not carry its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub default_user_id: String,
    /// `None` means a fresh session id per request.
    pub default_session_id: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            default_user_id: DEFAULT_USER_ID.to_string(),
            default_session_id: None,
        }
    }
}

/// Re-framing behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// JSON pointer to the text increment.
    pub text_pointer: String,
    /// JSON pointer to the partial indicator.
    pub partial_pointer: String,
    pub partial_policy: PartialPolicyKind,
    /// Allowed annotation `type` values. Empty allows any.
    pub annotation_types: Vec<String>,
    pub format_version: String,
    pub channel_capacity: usize,
    /// Cap on bytes buffered for one SSE record. `None` disables it.
    pub max_record_bytes: Option<usize>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            text_pointer: DEFAULT_TEXT_POINTER.to_string(),
            partial_pointer: DEFAULT_PARTIAL_POINTER.to_string(),
            partial_policy: PartialPolicyKind::default(),
            annotation_types: Vec::new(),
            format_version: DEFAULT_FORMAT_VERSION.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_record_bytes: Some(DEFAULT_MAX_RECORD_BYTES),
        }
    }
}

// ---------------------------------------------------------------------------
// Partial policy selector
// ---------------------------------------------------------------------------

/// Which text events are emitted given the backend's partial indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialPolicyKind {
    /// Only events flagged partial.
    RequirePartial,
    /// Every text event.
    AcceptAll,
    /// Partial events, plus any other text that does not restate the turn.
    #[default]
    SkipFinalRestatement,
}

impl PartialPolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartialPolicyKind::RequirePartial => "require_partial",
            PartialPolicyKind::AcceptAll => "accept_all",
            PartialPolicyKind::SkipFinalRestatement => "skip_final_restatement",
        }
    }
}

impl fmt::Display for PartialPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartialPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "require_partial" => Ok(PartialPolicyKind::RequirePartial),
            "accept_all" => Ok(PartialPolicyKind::AcceptAll),
            "skip_final_restatement" => Ok(PartialPolicyKind::SkipFinalRestatement),
            other => Err(format!(
                "unknown partial_policy \"{other}\", expected one of: \
                 require_partial, accept_all, skip_final_restatement"
            )),
        }
    }
}
