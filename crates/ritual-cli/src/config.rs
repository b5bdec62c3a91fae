//! Configuration file management for ritual.
//!
//! Provides a TOML-based config file at `~/.config/ritual/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use ritual_core::plan::{DEFAULT_STEPS_PER_LEVEL, Locale, NormalizeOptions};

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub normalize: NormalizeSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NormalizeSection {
    /// Locale tag for synthesized day/week labels.
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_steps_per_level")]
    pub steps_per_level: u32,
}

impl Default for NormalizeSection {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            steps_per_level: default_steps_per_level(),
        }
    }
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_steps_per_level() -> u32 {
    DEFAULT_STEPS_PER_LEVEL
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the ritual config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/ritual` or `~/.config/ritual`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("ritual");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ritual")
}

/// Return the path to the ritual config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;
    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct RitualConfig {
    pub locale: Locale,
    /// Passed to the normalizer as is; it applies its own coercion.
    pub steps_per_level: f64,
}

impl RitualConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Locale: `cli_locale` > `RITUAL_LOCALE` env > `normalize.locale` > `en`
    /// - Steps per level: `cli_steps_per_level` > `RITUAL_STEPS_PER_LEVEL` env >
    ///   `normalize.steps_per_level` > [`DEFAULT_STEPS_PER_LEVEL`]
    pub fn resolve(cli_locale: Option<&str>, cli_steps_per_level: Option<f64>) -> Result<Self> {
        let file_config = load_config().ok();

        let locale_tag = if let Some(tag) = cli_locale {
            tag.to_string()
        } else if let Ok(tag) = std::env::var("RITUAL_LOCALE") {
            tag
        } else if let Some(ref cfg) = file_config {
            cfg.normalize.locale.clone()
        } else {
            default_locale()
        };

        let steps_per_level = if let Some(n) = cli_steps_per_level {
            n
        } else if let Ok(raw) = std::env::var("RITUAL_STEPS_PER_LEVEL") {
            raw.trim()
                .parse::<f64>()
                .with_context(|| format!("RITUAL_STEPS_PER_LEVEL is not a number: {raw:?}"))?
        } else if let Some(ref cfg) = file_config {
            f64::from(cfg.normalize.steps_per_level)
        } else {
            f64::from(DEFAULT_STEPS_PER_LEVEL)
        };

        Ok(Self {
            locale: Locale::from_tag(&locale_tag),
            steps_per_level,
        })
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            locale: self.locale,
            steps_per_level: self.steps_per_level,
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    /// Point the config lookup at an empty temp dir and clear ritual env vars.
    fn isolated_env(tmp: &tempfile::TempDir) {
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };
        unsafe { std::env::remove_var("RITUAL_LOCALE") };
        unsafe { std::env::remove_var("RITUAL_STEPS_PER_LEVEL") };
    }

    #[test]
    fn defaults_when_nothing_set() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        isolated_env(&tmp);

        let config = RitualConfig::resolve(None, None).unwrap();
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.steps_per_level, 7.0);

        unsafe { std::env::remove_var("XDG_CONFIG_HOME") };
    }

    #[test]
    fn config_file_is_used_when_present() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        isolated_env(&tmp);

        save_config(&ConfigFile {
            normalize: NormalizeSection {
                locale: "fr".to_string(),
                steps_per_level: 5,
            },
        })
        .unwrap();
        assert!(config_path().starts_with(tmp.path()));

        let config = RitualConfig::resolve(None, None).unwrap();
        assert_eq!(config.locale, Locale::Fr);
        assert_eq!(config.steps_per_level, 5.0);

        unsafe { std::env::remove_var("XDG_CONFIG_HOME") };
    }

    #[test]
    fn env_overrides_file_and_cli_overrides_env() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        isolated_env(&tmp);

        save_config(&ConfigFile {
            normalize: NormalizeSection {
                locale: "en".to_string(),
                steps_per_level: 5,
            },
        })
        .unwrap();
        unsafe { std::env::set_var("RITUAL_LOCALE", "fr-CA") };
        unsafe { std::env::set_var("RITUAL_STEPS_PER_LEVEL", "3") };

        let from_env = RitualConfig::resolve(None, None).unwrap();
        assert_eq!(from_env.locale, Locale::Fr);
        assert_eq!(from_env.steps_per_level, 3.0);

        let from_cli = RitualConfig::resolve(Some("en"), Some(4.0)).unwrap();
        assert_eq!(from_cli.locale, Locale::En);
        assert_eq!(from_cli.steps_per_level, 4.0);

        unsafe { std::env::remove_var("RITUAL_LOCALE") };
        unsafe { std::env::remove_var("RITUAL_STEPS_PER_LEVEL") };
        unsafe { std::env::remove_var("XDG_CONFIG_HOME") };
    }

    #[test]
    fn invalid_env_steps_per_level_is_an_error() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        isolated_env(&tmp);
        unsafe { std::env::set_var("RITUAL_STEPS_PER_LEVEL", "seven") };

        let result = RitualConfig::resolve(None, None);

        unsafe { std::env::remove_var("RITUAL_STEPS_PER_LEVEL") };
        unsafe { std::env::remove_var("XDG_CONFIG_HOME") };

        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("RITUAL_STEPS_PER_LEVEL"), "unexpected error: {msg}");
    }

    #[test]
    fn partial_config_file_uses_defaults() {
        let parsed: ConfigFile = toml::from_str("[normalize]\nlocale = \"fr\"\n").unwrap();
        assert_eq!(parsed.normalize.locale, "fr");
        assert_eq!(parsed.normalize.steps_per_level, DEFAULT_STEPS_PER_LEVEL);

        let empty: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(empty.normalize.locale, "en");
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("ritual/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
