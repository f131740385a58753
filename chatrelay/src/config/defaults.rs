// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Built-in values used when a config section or field is absent.
// They match the agent backend's development setup.

pub const CONFIG_VERSION: &str = "v1";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_RUN_PATH: &str = "/run_sse";
pub const DEFAULT_APP_NAME: &str = "agent";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

pub const DEFAULT_USER_ID: &str = "u_123";

/// Where the text increment lives in an agent event.
pub const DEFAULT_TEXT_POINTER: &str = "/content/parts/0/text";
/// Where the partial indicator lives in an agent event.
pub const DEFAULT_PARTIAL_POINTER: &str = "/partial";
/// Value of the `X-Vercel-AI-Data-Stream` response header.
pub const DEFAULT_FORMAT_VERSION: &str = "v1";
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Config used when no file is given, e.g. by the replay tool.
pub const DEFAULT_CONFIG_YAML: &str = r#"chatrelay: v1
backend:
  base_url: http://localhost:8000
  run_path: /run_sse
  app_name: agent
identity:
  default_user_id: u_123
  default_session_id: s_123
stream:
  partial_policy: skip_final_restatement
"#;
