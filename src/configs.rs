use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub module: ModuleConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub passphrase: PassphraseConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModuleConfig {
    #[serde(default = "default_module_name")]
    pub name: String,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            name: default_module_name(),
        }
    }
}

fn default_module_name() -> String {
    "OpenSSL".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    /// Tag written in front of every diagnostic line
    #[serde(default = "default_debug_prefix")]
    pub prefix: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            prefix: default_debug_prefix(),
        }
    }
}

fn default_debug_prefix() -> String {
    "OSSL_DEBUG".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PassphraseConfig {
    #[serde(default = "default_min_len")]
    pub min_len: usize,
    /// Upper bound on provider calls per request; unbounded when absent
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for PassphraseConfig {
    fn default() -> Self {
        Self {
            min_len: default_min_len(),
            max_attempts: None,
        }
    }
}

fn default_min_len() -> usize {
    4 // OpenSSL's PEM minimum
}

#[derive(Debug, Deserialize, Clone)]
pub struct VerifyConfig {
    #[serde(default = "default_slot_label")]
    pub slot_label: String,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            slot_label: default_slot_label(),
        }
    }
}

fn default_slot_label() -> String {
    "ossl_verify_cb_idx".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&config_str)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(config_str).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration with default path (config.toml)
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.module.name, "OpenSSL");
        assert_eq!(config.debug.prefix, "OSSL_DEBUG");
        assert_eq!(config.passphrase.min_len, 4);
        assert_eq!(config.passphrase.max_attempts, None);
        assert_eq!(config.verify.slot_label, "ossl_verify_cb_idx");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[passphrase]\nmin_len = 8\nmax_attempts = 3\n\n[debug]\nprefix = \"BRIDGE\""
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.passphrase.min_len, 8);
        assert_eq!(config.passphrase.max_attempts, Some(3));
        assert_eq!(config.debug.prefix, "BRIDGE");
        assert_eq!(config.module.name, "OpenSSL");
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = AppConfig::from_file("/nonexistent/config.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
