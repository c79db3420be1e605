//! Router configuration.

use serde::{Deserialize, Serialize};

/// LineRouter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Login polls before a streaming dispatch gives up. Default: 5.
    #[serde(default = "default_login_retries")]
    pub login_retries: u32,
    /// Interval between login polls (ms). Default: 1,000.
    #[serde(default = "default_login_poll_ms")]
    pub login_poll_ms: u64,
    /// Line selected for every action at startup, e.g. `"client:rs;link:nor"`.
    /// Unset means REST over the normal path.
    #[serde(default)]
    pub initial_line: Option<String>,
}

fn default_login_retries() -> u32 {
    5
}

fn default_login_poll_ms() -> u64 {
    1_000
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            login_retries: default_login_retries(),
            login_poll_ms: default_login_poll_ms(),
            initial_line: None,
        }
    }
}
