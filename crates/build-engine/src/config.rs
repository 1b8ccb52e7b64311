//! Dex Settings
//!
//! The part of the application configuration the dex step consumes.

use std::path::PathBuf;

use droid_dex_core::config::DEFAULT_RUNNER_CLASS;
use droid_dex_core::AppConfig;

/// Max heap passed to the spawned JVM
pub const DX_MAX_HEAP: &str = "-Xmx1024M";

/// Settings for spawning dx
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexSettings {
    /// Main class launched with the dx jar as first argument
    pub runner_class: String,
    /// Classpath of the runner itself
    pub runner_classpath: Vec<PathBuf>,
    /// Fixed dx jar instead of SDK lookup
    pub dx_jar: Option<PathBuf>,
    /// JDK used when the Android SDK has none
    pub jdk_home: Option<PathBuf>,
}

impl Default for DexSettings {
    fn default() -> Self {
        Self {
            runner_class: DEFAULT_RUNNER_CLASS.to_string(),
            runner_classpath: Vec::new(),
            dx_jar: None,
            jdk_home: None,
        }
    }
}

impl From<&AppConfig> for DexSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            runner_class: config.dex.runner_class.clone(),
            runner_classpath: config.dex.runner_classpath.clone(),
            dx_jar: config.dex.dx_jar.clone(),
            jdk_home: config.android.jdk_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_app_config() {
        let mut config = AppConfig::default();
        config.dex.runner_classpath = vec![PathBuf::from("/opt/runner.jar")];
        config.android.jdk_path = Some(PathBuf::from("/usr/lib/jvm/java-8"));

        let settings = DexSettings::from(&config);
        assert_eq!(settings.runner_class, DEFAULT_RUNNER_CLASS);
        assert_eq!(settings.runner_classpath, vec![PathBuf::from("/opt/runner.jar")]);
        assert_eq!(settings.jdk_home, Some(PathBuf::from("/usr/lib/jvm/java-8")));
    }
}
