//! Runtime configuration
//!
//! Defaults are tuned for an interactive desktop session. Every value can be
//! overridden through environment variables (a `.env` file is honoured by the
//! binary).

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Configuration for the orchestrator and the analysis components it builds
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Capacity of the insertion-ordered LRU result cache
    pub cache_capacity: usize,
    /// Expiry of the TTL cache used by long-running pipelines
    pub result_ttl: Duration,
    /// Timeout applied when the caller does not supply one
    pub default_timeout: Duration,
    /// Interval between synthetic progress events
    pub progress_interval: Duration,
    /// Monte Carlo trials per simulation
    pub monte_carlo_trials: usize,
    /// Fixed seed for reproducible simulations
    pub monte_carlo_seed: Option<u64>,
    /// Upper bound on a single LLM collaborator call
    pub llm_timeout: Duration,
    /// Gemini key; no key means no LLM collaborator
    pub gemini_api_key: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 50,
            result_ttl: Duration::from_secs(30 * 60),
            default_timeout: Duration::from_secs(30),
            progress_interval: Duration::from_millis(250),
            monte_carlo_trials: 100,
            monte_carlo_seed: None,
            llm_timeout: Duration::from_millis(8_000),
            gemini_api_key: None,
        }
    }
}

impl OrchestratorConfig {
    /// Build a config from `SCENARIO_*` environment variables, falling back
    /// to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache_capacity: parse_env("SCENARIO_CACHE_CAPACITY")
                .filter(|c: &usize| *c > 0)
                .unwrap_or(defaults.cache_capacity),
            result_ttl: parse_env("SCENARIO_RESULT_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.result_ttl),
            default_timeout: parse_env("SCENARIO_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_timeout),
            progress_interval: parse_env("SCENARIO_PROGRESS_INTERVAL_MS")
                .filter(|ms: &u64| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.progress_interval),
            monte_carlo_trials: parse_env("SCENARIO_MONTE_CARLO_TRIALS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.monte_carlo_trials),
            monte_carlo_seed: parse_env("SCENARIO_MONTE_CARLO_SEED"),
            llm_timeout: parse_env("SCENARIO_LLM_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.llm_timeout),
            gemini_api_key: env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
        }
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.cache_capacity, 50);
        assert_eq!(config.result_ttl, Duration::from_secs(1800));
        assert_eq!(config.monte_carlo_trials, 100);
        assert!(config.monte_carlo_seed.is_none());
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        env::set_var("SCENARIO_TEST_PARSE_GARBAGE", "not-a-number");
        assert_eq!(parse_env::<u64>("SCENARIO_TEST_PARSE_GARBAGE"), None);

        env::set_var("SCENARIO_TEST_PARSE_OK", " 42 ");
        assert_eq!(parse_env::<u64>("SCENARIO_TEST_PARSE_OK"), Some(42));
    }
}
