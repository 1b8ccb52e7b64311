//! Toolchain Detection
//!
//! Finds an Android SDK and a JDK on the host when the project file and the
//! configuration leave them unspecified.

use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use which::which;

use crate::sdk::{dx_jar_path, java_in, AndroidSdk};

/// Result of SDK detection
#[derive(Debug, Clone)]
pub struct SdkInfo {
    pub path: PathBuf,
    pub build_tools_versions: Vec<String>,
    pub platforms: Vec<String>,
    /// dx jar the dex step would use, if one is installed
    pub dx_jar: Option<PathBuf>,
}

/// Result of JDK detection
#[derive(Debug, Clone)]
pub struct JdkInfo {
    pub path: PathBuf,
    pub version: String,
    pub is_jdk: bool, // false for a JRE-only install
}

/// Toolchain detection errors
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Android SDK not found")]
    SdkNotFound,
    #[error("JDK not found")]
    JdkNotFound,
    #[error("Invalid installation: {0}")]
    InvalidInstallation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Toolchain detector
pub struct ToolchainDetector;

impl ToolchainDetector {
    /// Detect Android SDK installation
    pub async fn detect_sdk() -> Result<SdkInfo, DetectionError> {
        info!("Detecting Android SDK...");

        for path in Self::sdk_candidates() {
            if Self::is_valid_sdk(&path) {
                info!("Found Android SDK at {:?}", path);
                return Ok(Self::analyze_sdk(&path));
            }
        }

        Err(DetectionError::SdkNotFound)
    }

    /// SDK path candidates, most specific first
    fn sdk_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        for var in ["ANDROID_SDK_ROOT", "ANDROID_HOME"] {
            if let Ok(value) = env::var(var) {
                candidates.push(PathBuf::from(value));
            }
        }

        if cfg!(windows) {
            if let Some(local) = dirs::data_local_dir() {
                candidates.push(local.join("Android").join("Sdk"));
            }
            candidates.push(PathBuf::from(r"C:\Android\sdk"));
        }

        if cfg!(unix) {
            if let Some(home) = dirs::home_dir() {
                candidates.push(home.join("Android").join("Sdk"));
                candidates.push(home.join("Library").join("Android").join("sdk"));
                candidates.push(home.join("android-sdk"));
            }
            candidates.push(PathBuf::from("/opt/android-sdk"));
            candidates.push(PathBuf::from("/usr/local/android-sdk"));
        }

        candidates
    }

    /// An SDK needs platforms plus either build-tools or the legacy platform-tools
    pub fn is_valid_sdk(path: &Path) -> bool {
        path.join("platforms").is_dir()
            && (path.join("build-tools").is_dir() || path.join("platform-tools").is_dir())
    }

    /// Inspect an SDK directory
    pub fn analyze_sdk(path: &Path) -> SdkInfo {
        let sdk = AndroidSdk::new("detected", path.to_path_buf(), "");
        let dx_jar = Some(dx_jar_path(&sdk, None)).filter(|p| p.is_file());

        debug!("SDK {:?}: dx jar {:?}", path, dx_jar);
        SdkInfo {
            path: path.to_path_buf(),
            build_tools_versions: sdk.build_tools_versions(),
            platforms: sdk.platforms(),
            dx_jar,
        }
    }

    /// Detect JDK installation
    pub async fn detect_jdk() -> Result<JdkInfo, DetectionError> {
        info!("Detecting JDK...");

        if let Ok(java_home) = env::var("JAVA_HOME") {
            if let Ok(info) = Self::analyze_jdk(Path::new(&java_home)).await {
                return Ok(info);
            }
        }

        // bin/java -> JDK root
        if let Some(jdk_root) = which("java")
            .ok()
            .and_then(|java| std::fs::canonicalize(java).ok())
            .and_then(|java| java.parent()?.parent().map(Path::to_path_buf))
        {
            if let Ok(info) = Self::analyze_jdk(&jdk_root).await {
                return Ok(info);
            }
        }

        for path in Self::jdk_candidates() {
            if let Ok(info) = Self::analyze_jdk(&path).await {
                return Ok(info);
            }
        }

        Err(DetectionError::JdkNotFound)
    }

    fn jdk_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if cfg!(unix) {
            candidates.push(PathBuf::from("/usr/lib/jvm/default-java"));
            candidates.push(PathBuf::from("/usr/lib/jvm/java-17-openjdk"));
            candidates.push(PathBuf::from("/usr/lib/jvm/java-11-openjdk"));
            candidates.push(PathBuf::from("/usr/lib/jvm/java-8-openjdk"));

            if let Some(home) = dirs::home_dir() {
                candidates.push(home.join(".sdkman").join("candidates").join("java").join("current"));
            }
        }

        candidates
    }

    /// Inspect a JDK home by running `java -version`
    pub async fn analyze_jdk(path: &Path) -> Result<JdkInfo, DetectionError> {
        let java_exe = java_in(path);
        if !java_exe.is_file() {
            return Err(DetectionError::InvalidInstallation(format!(
                "java executable not found in {:?}",
                path
            )));
        }

        let javac = if cfg!(windows) { "javac.exe" } else { "javac" };
        let is_jdk = path.join("bin").join(javac).exists();

        let output = tokio::process::Command::new(&java_exe)
            .arg("-version")
            .output()
            .await?;

        // `java -version` prints to stderr
        let version = parse_java_version(&String::from_utf8_lossy(&output.stderr))
            .unwrap_or_else(|| "unknown".to_string());

        info!(
            "Found {} {} at {:?}",
            if is_jdk { "JDK" } else { "JRE" },
            version,
            path
        );

        Ok(JdkInfo {
            path: path.to_path_buf(),
            version,
            is_jdk,
        })
    }
}

fn parse_java_version(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.to_lowercase().contains("version"))
        .find_map(|line| {
            let start = line.find('"')? + 1;
            let end = line[start..].find('"')? + start;
            Some(line[start..end].to_string())
        })
}

/// Overall toolchain status
#[derive(Debug, Clone)]
pub struct ToolchainStatus {
    pub sdk: Option<SdkInfo>,
    pub jdk: Option<JdkInfo>,
}

impl ToolchainStatus {
    /// SDK with a dx jar, plus a JDK
    pub fn is_complete(&self) -> bool {
        self.sdk.as_ref().map(|s| s.dx_jar.is_some()).unwrap_or(false) && self.jdk.is_some()
    }

    /// Get missing components
    pub fn missing_components(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match &self.sdk {
            None => missing.push("Android SDK"),
            Some(sdk) if sdk.dx_jar.is_none() => missing.push("dx (build-tools)"),
            Some(_) => {}
        }
        if self.jdk.is_none() {
            missing.push("JDK");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdk_candidates() {
        let candidates = ToolchainDetector::sdk_candidates();
        assert!(!candidates.is_empty());
    }

    #[test]
    fn test_analyze_sdk_layout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("platforms").join("android-19")).unwrap();
        let lib = dir.path().join("build-tools").join("19.1.0").join("lib");
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(lib.join("dx.jar"), b"").unwrap();

        assert!(ToolchainDetector::is_valid_sdk(dir.path()));
        let info = ToolchainDetector::analyze_sdk(dir.path());
        assert_eq!(info.platforms, vec!["android-19".to_string()]);
        assert_eq!(info.build_tools_versions, vec!["19.1.0".to_string()]);
        assert_eq!(info.dx_jar, Some(lib.join("dx.jar")));
    }

    #[test]
    fn test_parse_java_version() {
        let out = "openjdk version \"17.0.2\" 2022-01-18\nOpenJDK Runtime Environment";
        assert_eq!(parse_java_version(out).as_deref(), Some("17.0.2"));
        assert_eq!(parse_java_version("garbage"), None);
    }

    #[test]
    fn test_missing_components() {
        let status = ToolchainStatus { sdk: None, jdk: None };
        assert_eq!(status.missing_components(), vec!["Android SDK", "JDK"]);
        assert!(!status.is_complete());
    }
}
