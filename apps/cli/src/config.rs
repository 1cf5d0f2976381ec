//! CLI configuration file support.
//!
//! Configuration precedence:
//! 1. CLI arguments and `LCM_OUTPUT_DIR` (handled by clap)
//! 2. Local config file (./.lcmrc)
//! 3. Global config file (~/.lcm/config.toml)
//! 4. Defaults

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Log level used when `--log-level` is absent
    #[serde(default)]
    pub log_level: Option<String>,

    /// Run output directory used when neither `--output-dir` nor `LCM_OUTPUT_DIR` is set
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Overrides applied to training recipes before command-line overrides
    #[serde(default)]
    pub overrides: Vec<String>,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format (human, json)
    #[serde(default = "default_output_format")]
    pub format: String,
}

fn default_output_format() -> String {
    "human".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { format: default_output_format() }
    }
}

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".lcm").join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".lcmrc")
    }

    /// Load the global then the local file; local values win.
    ///
    /// Unreadable files are skipped and described in the returned list so the
    /// caller can log them once tracing is installed.
    pub fn discover_and_load() -> (Self, Vec<String>) {
        Self::load_layered(&[Self::default_global_path(), Self::default_local_path()])
    }

    /// Merge `paths` in order, skipping absent files.
    pub fn load_layered(paths: &[PathBuf]) -> (Self, Vec<String>) {
        let mut config = Self::default();
        let mut problems = Vec::new();
        for path in paths.iter().filter(|path| path.exists()) {
            match Self::load_from_file(path) {
                Ok(file_config) => config.merge(file_config),
                Err(e) => problems.push(format!("ignoring {}: {e:#}", path.display())),
            }
        }
        (config, problems)
    }

    /// Merge another configuration into this one.
    ///
    /// Set values from `other` win; override lists are concatenated.
    pub fn merge(&mut self, other: Self) {
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if other.output_dir.is_some() {
            self.output_dir = other.output_dir;
        }
        self.overrides.extend(other.overrides);
        if other.output.format != "human" {
            self.output.format = other.output.format;
        }
    }
}

/// Load and merge CLI configuration, with any files that were skipped.
pub fn load_config() -> (CliConfig, Vec<String>) {
    CliConfig::discover_and_load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "log_level = \"debug\"\noutput_dir = \"/checkpoints\"\noverrides = [\"seed=2\"]\n\n[output]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = CliConfig::load_from_file(&path).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.output_dir, Some(PathBuf::from("/checkpoints")));
        assert_eq!(config.overrides, vec!["seed=2".to_string()]);
        assert_eq!(config.output.format, "json");
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "log_level = [").unwrap();
        assert!(CliConfig::load_from_file(&path).is_err());
    }

    #[test]
    fn test_load_layered_skips_broken_file() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("config.toml");
        let local = temp.path().join(".lcmrc");
        std::fs::write(&global, "log_level = \"debug\"\n").unwrap();
        std::fs::write(&local, "overrides = [").unwrap();

        let (config, problems) =
            CliConfig::load_layered(&[global, local.clone(), temp.path().join("absent.toml")]);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains(&local.display().to_string()));
    }

    #[test]
    fn test_merge_local_over_global() {
        let mut global = CliConfig {
            log_level: Some("warn".to_string()),
            output_dir: Some(PathBuf::from("/global")),
            overrides: vec!["seed=2".to_string()],
            output: OutputConfig { format: "json".to_string() },
        };
        let local = CliConfig {
            output_dir: Some(PathBuf::from("/local")),
            overrides: vec!["profile=true".to_string()],
            ..CliConfig::default()
        };
        global.merge(local);

        assert_eq!(global.log_level.as_deref(), Some("warn"));
        assert_eq!(global.output_dir, Some(PathBuf::from("/local")));
        assert_eq!(global.overrides, vec!["seed=2".to_string(), "profile=true".to_string()]);
        assert_eq!(global.output.format, "json");
    }
}
