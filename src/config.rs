use crate::error::{DealscanError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Runtime configuration loaded from `config.toml`, with sane defaults when
/// the file or individual sections are absent. Marketplace credentials are
/// not configured here; adapters read them from the environment.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Budget for a single marketplace call before it is dropped from the
    /// batch.
    #[serde(default = "default_per_source_timeout_ms")]
    pub per_source_timeout_ms: u64,
    /// Overall fan-out deadline; on expiry the coordinator returns whatever
    /// sources have completed.
    #[serde(default = "default_overall_deadline_ms")]
    pub overall_deadline_ms: u64,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_min_trust_score")]
    pub min_trust_score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Minimum spacing between calls to the same marketplace.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Max in-flight requests per marketplace.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Serve synthetic listings instead of hitting marketplace APIs. Also
    /// forced on via the USE_MOCK_DATA env var.
    #[serde(default)]
    pub use_mock: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_per_source_timeout_ms() -> u64 {
    1000
}
fn default_overall_deadline_ms() -> u64 {
    5000
}
fn default_top_n() -> usize {
    10
}
fn default_min_trust_score() -> f64 {
    0.6
}
fn default_min_interval_ms() -> u64 {
    1000
}
fn default_max_concurrent() -> usize {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            per_source_timeout_ms: default_per_source_timeout_ms(),
            overall_deadline_ms: default_overall_deadline_ms(),
            top_n: default_top_n(),
            min_trust_score: default_min_trust_score(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            max_concurrent: default_max_concurrent(),
            use_mock: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                DealscanError::Config(format!(
                    "failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };
        // The env override applies with or without a config file present.
        if std::env::var("USE_MOCK_DATA")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
        {
            config.sources.use_mock = true;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load_from("/definitely/not/here/config.toml").unwrap();
        assert_eq!(config.search.per_source_timeout_ms, 1000);
        assert_eq!(config.search.top_n, 10);
        assert_eq!(config.sources.max_concurrent, 1);
    }

    #[test]
    fn mock_env_override_applies_without_a_config_file() {
        std::env::set_var("USE_MOCK_DATA", "1");
        let config = Config::load_from("/definitely/not/here/config.toml").unwrap();
        std::env::remove_var("USE_MOCK_DATA");
        assert!(config.sources.use_mock);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[search]\ntop_n = 3").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.search.top_n, 3);
        assert_eq!(config.search.min_trust_score, 0.6);
        assert_eq!(config.server.port, 8080);
    }
}
