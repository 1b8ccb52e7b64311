//! Application Configuration
//!
//! Manages the settings the dex step reads from outside the project file:
//! - Android SDK and JDK locations
//! - The dx runner entry point and its classpath
//! - An optional dx jar override

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use tracing::{info, debug};

use crate::error::{CoreError, Result};

/// Main class spawned with the dx jar as its first argument
pub const DEFAULT_RUNNER_CLASS: &str = "org.jetbrains.android.compiler.tools.AndroidDxRunner";

/// Android SDK configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidConfig {
    /// Path to Android SDK, used for SDK definitions without a home
    pub sdk_path: Option<PathBuf>,
    /// Path to JDK, used when an SDK definition has no java_home
    pub jdk_path: Option<PathBuf>,
}

/// Dex step configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DexConfig {
    /// Fully qualified runner class
    pub runner_class: String,
    /// Jars and directories holding the runner class and its helpers
    pub runner_classpath: Vec<PathBuf>,
    /// Use this dx jar instead of looking one up in the SDK
    pub dx_jar: Option<PathBuf>,
}

impl Default for DexConfig {
    fn default() -> Self {
        Self {
            runner_class: DEFAULT_RUNNER_CLASS.to_string(),
            runner_classpath: Vec::new(),
            dx_jar: None,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration version for migrations
    pub version: u32,
    /// Android SDK settings
    pub android: AndroidConfig,
    /// Dex settings
    pub dex: DexConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            android: AndroidConfig::default(),
            dex: DexConfig::default(),
        }
    }
}

impl AppConfig {
    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "droid-dex", "droid-dex")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Load configuration from the default location, writing defaults on first use
    pub async fn load() -> Result<Self> {
        let config_file = Self::config_file()
            .ok_or_else(|| CoreError::Config("Cannot determine config path".into()))?;

        if config_file.exists() {
            Self::load_from(&config_file).await
        } else {
            info!("Config file not found, using defaults");
            let config = AppConfig::default();
            config.save_to(&config_file).await?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub async fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub async fn save_to(&self, config_file: &Path) -> Result<()> {
        if let Some(parent) = config_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)?;
        tokio::fs::write(config_file, contents).await?;

        debug!("Config saved to {:?}", config_file);
        Ok(())
    }

    /// Get Android SDK path, falling back to the usual environment variables
    pub fn get_sdk_path(&self) -> Option<PathBuf> {
        self.android.sdk_path.clone().or_else(|| {
            ["ANDROID_SDK_ROOT", "ANDROID_HOME"]
                .iter()
                .filter_map(|var| std::env::var_os(var))
                .map(PathBuf::from)
                .find(|p| p.is_dir())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.dex.runner_class, DEFAULT_RUNNER_CLASS);
        assert!(config.dex.runner_classpath.is_empty());
        assert!(config.dex.dx_jar.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [dex]
            runner_classpath = ["/opt/dx-runner/runner.jar", "/opt/dx-runner/util.jar"]
            "#,
        )
        .unwrap();

        assert_eq!(config.dex.runner_class, DEFAULT_RUNNER_CLASS);
        assert_eq!(config.dex.runner_classpath.len(), 2);
        assert!(config.android.sdk_path.is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.android.sdk_path = Some(PathBuf::from("/opt/android-sdk"));
        config.save_to(&path).await.unwrap();

        let loaded = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded.android.sdk_path, Some(PathBuf::from("/opt/android-sdk")));
    }
}
