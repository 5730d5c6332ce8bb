//! Process-level configuration (§6 "Process-level controls"). Layered
//! env + optional TOML file via `figment`, following the teacher's
//! `config::Config::from_file` pattern.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{CostPilotError, Result};

fn default_hours_per_month() -> f64 {
    730.0
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_runs_dir() -> PathBuf {
    PathBuf::from("runs")
}

fn default_max_planner_attempts() -> u32 {
    3
}

fn default_max_parallel_fetch() -> usize {
    4
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_missing_category_placeholder() -> f64 {
    100.0
}

fn default_reservation_hourly_implausible_threshold() -> f64 {
    50.0
}

fn default_adjudicator_top_k() -> usize {
    5
}

/// Run-scoped configuration consumed by the Orchestrator and every
/// component it wires together. Not a CLI flag surface (explicitly out of
/// scope, §1) — just the minimal ambient layer a runnable binary needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub region: String,
    pub currency: String,
    #[serde(default = "default_hours_per_month")]
    pub hours_per_month: f64,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_runs_dir")]
    pub runs_dir: PathBuf,
    #[serde(default = "default_max_planner_attempts")]
    pub max_planner_attempts: u32,
    #[serde(default = "default_max_parallel_fetch")]
    pub max_parallel_fetch: usize,
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_missing_category_placeholder")]
    pub missing_category_placeholder: f64,
    #[serde(default = "default_reservation_hourly_implausible_threshold")]
    pub reservation_hourly_implausible_threshold: f64,
    #[serde(default = "default_adjudicator_top_k")]
    pub adjudicator_top_k: usize,
    #[serde(default)]
    pub knowledge_pack_path: Option<PathBuf>,
}

impl RunConfig {
    /// Loads configuration layering (in increasing priority): built-in
    /// defaults, an optional TOML file, then `COSTPILOT_*` environment
    /// variables. Mirrors the teacher's `Config::from_file` plus env
    /// override idiom, implemented with `figment` instead of hand-rolled
    /// merge logic.
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = toml_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("COSTPILOT_"));

        figment
            .extract()
            .map_err(|e| CostPilotError::config(format!("failed to load configuration: {e}")))
    }

    /// Minimal defaults for tests and deterministic fixtures; skips the
    /// env/file layering entirely.
    pub fn test_default(region: &str, currency: &str) -> Self {
        Self {
            region: region.to_string(),
            currency: currency.to_string(),
            hours_per_month: default_hours_per_month(),
            cache_dir: default_cache_dir(),
            runs_dir: default_runs_dir(),
            max_planner_attempts: default_max_planner_attempts(),
            max_parallel_fetch: default_max_parallel_fetch(),
            llm_timeout_secs: default_llm_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            max_retries: default_max_retries(),
            missing_category_placeholder: default_missing_category_placeholder(),
            reservation_hourly_implausible_threshold: default_reservation_hourly_implausible_threshold(),
            adjudicator_top_k: default_adjudicator_top_k(),
            knowledge_pack_path: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(CostPilotError::config(format!(
                "currency must be a three-letter uppercase code, got {}",
                self.currency
            )));
        }
        if self.region.is_empty() || self.region.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(CostPilotError::config(format!(
                "region must be a lower-kebab Azure region id, got {}",
                self.region
            )));
        }
        if self.hours_per_month <= 0.0 {
            return Err(CostPilotError::config("hours_per_month must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RunConfig::test_default("eastus", "USD");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_lowercase_currency() {
        let config = RunConfig::test_default("eastus", "usd");
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_uppercase_region() {
        let config = RunConfig::test_default("EastUS", "USD");
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_hours() {
        let mut config = RunConfig::test_default("eastus", "USD");
        config.hours_per_month = 0.0;
        assert!(config.validate().is_err());
    }
}
