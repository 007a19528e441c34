use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, ThaiMtError};

/// Environment variable overriding the default data directory
pub const DATA_DIR_ENV: &str = "THAIMT_DATA_DIR";

fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("thaimt-data")
}

fn default_connect_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where archives are cached and bundles unpacked
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Release base URL; archives live at `{base_url}/{name}-v{version}/{stem}.tar.gz`
    pub base_url: String,
    /// Connect timeout for bundle downloads
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the fairseq-interactive binary
    pub binary_path: String,
    /// Force CPU inference
    pub cpu: bool,
    /// Additional arguments appended to every invocation
    /// e.g. ["--max-len-b", "200"]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub reload: ReloadPolicy,
}

/// Order of operations when the cached engine must be replaced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReloadPolicy {
    /// Build the new engine, then swap it in; a failed load keeps the old engine
    #[default]
    SwapAfterLoad,
    /// Drop the old engine before building; never more than one engine alive
    ReleaseFirst,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            base_url: "https://github.com/PyThaiNLP/pythainlp-corpus/releases/download".to_string(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary_path: "fairseq-interactive".to_string(),
            cpu: true,
            extra_args: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            engine: EngineConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ThaiMtError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ThaiMtError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ThaiMtError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_round_trips_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("thaimt.toml");

        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("data");
        config.cache.reload = ReloadPolicy::ReleaseFirst;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.storage.data_dir, dir.path().join("data"));
        assert_eq!(loaded.cache.reload, ReloadPolicy::ReleaseFirst);
        assert_eq!(loaded.engine.binary_path, "fairseq-interactive");
    }

    #[test]
    fn test_optional_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            base_url = "http://mirror.local/corpus"

            [engine]
            binary_path = "/opt/fairseq/bin/fairseq-interactive"
            cpu = false
            extra_args = []
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.reload, ReloadPolicy::SwapAfterLoad);
        assert_eq!(config.storage.connect_timeout_secs, 30);
        assert!(!config.engine.cpu);
    }

    #[test]
    fn test_reload_policy_uses_kebab_case() {
        let cache: CacheConfig = toml::from_str("reload = \"release-first\"").unwrap();
        assert_eq!(cache.reload, ReloadPolicy::ReleaseFirst);
        assert!(toml::from_str::<CacheConfig>("reload = \"lazy\"").is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = Config::from_file("/nonexistent/thaimt.toml");
        assert!(matches!(result, Err(ThaiMtError::Config(_))));
    }

    #[test]
    fn test_malformed_file_is_toml_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("thaimt.toml");
        std::fs::write(&path, "[storage\nbase_url = 1").unwrap();

        let result = Config::from_file(&path);
        assert!(matches!(result, Err(ThaiMtError::Toml(_))));
    }
}
