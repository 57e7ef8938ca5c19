//! Configuration module for cdk-watch.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CDKW_` and use double underscores
//! to separate nested levels:
//! - `CDKW_WATCH__DEBOUNCE_MS=200` sets `watch.debounce_ms`
//! - `CDKW_TOOLS__ESBUILD=./node_modules/esbuild` sets `tools.esbuild`
//! - `CDKW_AWS__PROFILE=dev` sets `aws.profile`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory holding the settings file, searched for from the current directory upwards.
pub const CONFIG_DIR: &str = ".cdkw";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "CDKW_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Generated manifest mapping logical paths to Lambda entries
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,

    /// Root of the per-function working directories
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Watch loop settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// External tool command lines
    #[serde(default)]
    pub tools: ToolsConfig,

    /// AWS settings
    #[serde(default)]
    pub aws: AwsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// How long a file must be stable before a rebuild is triggered
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Skip the initial upload when a session starts
    #[serde(default)]
    pub skip_initial: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ToolsConfig {
    /// Node command line that hosts the bundler context
    #[serde(default = "default_node")]
    pub node: String,

    /// esbuild package specifier or path, resolved from the working directory
    #[serde(default = "default_esbuild")]
    pub esbuild: String,

    /// Type compiler command line, used for pre-compilation
    #[serde(default = "default_tsc")]
    pub tsc: String,

    /// CDK toolkit command line, used for synthesis
    #[serde(default = "default_cdk")]
    pub cdk: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AwsConfig {
    /// Named profile used when `--profile` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all modules
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides
    #[serde(default = "default_log_modules")]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_manifest_path() -> PathBuf {
    PathBuf::from("cdk.out/manifest.cdk-watch.json")
}
fn default_out_dir() -> PathBuf {
    PathBuf::from("cdk.out/cdk-watch")
}
fn default_debounce_ms() -> u64 {
    50
}
fn default_node() -> String {
    "node".to_string()
}
fn default_esbuild() -> String {
    "esbuild".to_string()
}
fn default_tsc() -> String {
    "npx tsc".to_string()
}
fn default_cdk() -> String {
    "npx cdk".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_log_modules() -> HashMap<String, String> {
    HashMap::from([("cdk_watch".to_string(), "info".to_string())])
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            manifest_path: default_manifest_path(),
            out_dir: default_out_dir(),
            watch: WatchConfig::default(),
            tools: ToolsConfig::default(),
            aws: AwsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            skip_initial: false,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            node: default_node(),
            esbuild: default_esbuild(),
            tsc: default_tsc(),
            cdk: default_cdk(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: default_log_modules(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels, single underscore stays in the key
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for a `.cdkw` directory
    /// from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(
            settings.manifest_path,
            PathBuf::from("cdk.out/manifest.cdk-watch.json")
        );
        assert_eq!(settings.watch.debounce_ms, 50);
        assert!(!settings.watch.skip_initial);
        assert_eq!(settings.tools.node, "node");
        assert_eq!(settings.tools.esbuild, "esbuild");
        assert!(settings.aws.profile.is_none());
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
out_dir = "build/watch"

[watch]
debounce_ms = 250
skip_initial = true

[tools]
esbuild = "./node_modules/esbuild"

[aws]
profile = "sandbox"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.out_dir, PathBuf::from("build/watch"));
        assert_eq!(settings.watch.debounce_ms, 250);
        assert!(settings.watch.skip_initial);
        assert_eq!(settings.tools.esbuild, "./node_modules/esbuild");
        // Untouched tools keep their defaults
        assert_eq!(settings.tools.tsc, "npx tsc");
        assert_eq!(settings.aws.profile.as_deref(), Some("sandbox"));
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.watch.debounce_ms = 10;
        settings.aws.profile = Some("prod".to_string());

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.watch.debounce_ms, 10);
        assert_eq!(loaded.aws.profile.as_deref(), Some("prod"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.out_dir, PathBuf::from("cdk.out/cdk-watch"));
        assert_eq!(
            settings.logging.modules.get("cdk_watch").map(String::as_str),
            Some("info")
        );
    }
}
