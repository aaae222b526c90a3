use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{RetryPolicy, DEFAULT_BASE_URL};
use crate::series::ChartStyle;

pub const APP_NAME: &str = "mfnav";
pub const CONFIG_NAME: &str = "config";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_budget_ms: u64,
    pub request_timeout_secs: u64,
    pub default_chart_style: String,
    pub recent_rows: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            retry_budget_ms: 8000,
            request_timeout_secs: 15,
            default_chart_style: "line".to_string(),
            recent_rows: 30,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    pub fn path() -> Result<PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            budget: Duration::from_millis(self.retry_budget_ms),
        }
    }

    /// Per-attempt HTTP timeout. Attempts are also cut off by the retry
    /// budget, whichever comes first.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Falls back to a line chart when the configured value is not recognised.
    pub fn chart_style(&self) -> ChartStyle {
        self.default_chart_style.parse().unwrap_or_default()
    }
}
