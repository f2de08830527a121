//! Run configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default step ceiling per run
pub const DEFAULT_MAX_STEPS: u64 = 256;

/// Default wall-clock budget per run, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Environment variable overriding `max_steps`
pub const MAX_STEPS_VAR: &str = "OPERANT_MAX_STEPS";

/// Environment variable overriding the budget in whole seconds (`none` disables it)
pub const TIMEOUT_SECS_VAR: &str = "OPERANT_TIMEOUT_SECS";

/// Environment variable overriding the budget in milliseconds, wins over seconds
pub const TIMEOUT_MS_VAR: &str = "OPERANT_TIMEOUT_MS";

/// Limits applied to every run of an operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperateConfig {
    /// Maximum node visits, ingress and egress included
    pub max_steps: u64,

    /// Wall-clock budget in milliseconds, checked at every transition
    pub timeout_ms: Option<u64>,
}

impl Default for OperateConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            timeout_ms: Some(DEFAULT_TIMEOUT_SECS * 1000),
        }
    }
}

impl OperateConfig {
    /// Default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step ceiling
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the wall-clock budget (sub-millisecond remainders round up)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(duration_to_millis(timeout));
        self
    }

    /// Let runs take as long as they need
    pub fn without_timeout(mut self) -> Self {
        self.timeout_ms = None;
        self
    }

    /// The wall-clock budget, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Reject limits that would make every run fail
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_steps == 0 {
            return Err(ConfigError::Invalid("max_steps must be at least 1".to_string()));
        }
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "timeout_ms must be positive, use no timeout to disable".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by `OPERANT_*` variables (a `.env` file is honoured)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::default().apply_overrides(|var| std::env::var(var).ok())
    }

    fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(value) = lookup(MAX_STEPS_VAR) {
            self.max_steps = value.trim().parse().map_err(|_| ConfigError::Env {
                var: MAX_STEPS_VAR,
                value: value.clone(),
            })?;
        }

        if let Some(value) = lookup(TIMEOUT_SECS_VAR) {
            self.timeout_ms = parse_budget(TIMEOUT_SECS_VAR, &value)?
                .map(|secs| duration_to_millis(Duration::from_secs(secs)));
        }

        if let Some(value) = lookup(TIMEOUT_MS_VAR) {
            self.timeout_ms = parse_budget(TIMEOUT_MS_VAR, &value)?;
        }

        self.validate()?;
        Ok(self)
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

/// `none` or an empty value disables the budget
fn parse_budget(var: &'static str, value: &str) -> Result<Option<u64>, ConfigError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("none") || trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse().map(Some).map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}
