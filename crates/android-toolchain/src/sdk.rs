//! Android SDK and target resolution
//!
//! Turns an SDK definition from the project model into a usable Android SDK,
//! resolves its build target to a platform directory and finds the dx jar and
//! the java executable the dex step spawns.

use std::path::{Path, PathBuf};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use which::which;

use droid_dex_core::{SdkDefinition, SdkKind};

/// Name of the dx jar inside a tools `lib` directory
pub const DX_JAR: &str = "dx.jar";

static PLATFORM_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^android-(?:(\d+)|([A-Za-z][A-Za-z0-9_.]*))$").unwrap());

static ADDON_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^:]+:[^:]+:(\d+)$").unwrap());

/// SDK resolution errors
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("SDK '{0}' is not an Android SDK")]
    NotAndroid(String),
    #[error("Android SDK '{0}' has no home directory")]
    MissingHome(String),
    #[error("Android SDK '{0}' has no build target")]
    MissingBuildTarget(String),
    #[error("Unrecognized build target '{0}'")]
    InvalidTarget(String),
    #[error("Platform {target} not found at {path:?}")]
    PlatformNotFound { target: String, path: PathBuf },
}

impl SdkError {
    /// True when the module simply has no usable Android SDK configured, as
    /// opposed to one that is configured but broken
    pub fn is_unspecified(&self) -> bool {
        matches!(self, SdkError::NotAndroid(_) | SdkError::MissingHome(_))
    }
}

/// An Android SDK a module compiles against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidSdk {
    pub name: String,
    pub home: PathBuf,
    pub build_target: String,
    pub java_home: Option<PathBuf>,
}

impl AndroidSdk {
    pub fn new(name: impl Into<String>, home: PathBuf, build_target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            home,
            build_target: build_target.into(),
            java_home: None,
        }
    }

    pub fn with_java_home(mut self, java_home: PathBuf) -> Self {
        self.java_home = Some(java_home);
        self
    }

    /// Build from a project SDK definition
    pub fn from_definition(def: &SdkDefinition) -> Result<Self, SdkError> {
        if def.kind != SdkKind::Android {
            return Err(SdkError::NotAndroid(def.name.clone()));
        }
        let home = def
            .home
            .clone()
            .ok_or_else(|| SdkError::MissingHome(def.name.clone()))?;
        let build_target = def
            .build_target
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SdkError::MissingBuildTarget(def.name.clone()))?;

        Ok(Self {
            name: def.name.clone(),
            home,
            build_target,
            java_home: def.java_home.clone(),
        })
    }

    /// Java executable for spawning SDK tools: the SDK's JDK, then the
    /// fallback JDK, then `java` from PATH
    pub fn java_executable(&self, fallback_jdk: Option<&Path>) -> PathBuf {
        self.java_home
            .as_deref()
            .into_iter()
            .chain(fallback_jdk)
            .map(java_in)
            .find(|exe| exe.is_file())
            .or_else(|| which("java").ok())
            .unwrap_or_else(|| PathBuf::from("java"))
    }

    /// Installed build-tools versions, oldest first
    pub fn build_tools_versions(&self) -> Vec<String> {
        let mut versions = list_dirs(&self.home.join("build-tools"));
        versions.sort_by_key(|v| version_key(v));
        versions
    }

    /// Installed platform ids
    pub fn platforms(&self) -> Vec<String> {
        let mut platforms = list_dirs(&self.home.join("platforms"));
        platforms.sort();
        platforms
    }
}

/// A resolved build target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidTarget {
    /// Platform directory name, e.g. `android-19`
    pub id: String,
    pub api_level: Option<u32>,
    pub codename: Option<String>,
    pub location: PathBuf,
}

impl AndroidTarget {
    pub fn android_jar(&self) -> PathBuf {
        self.location.join("android.jar")
    }
}

/// Resolve the SDK's build target to an installed platform.
///
/// Accepts `android-<api>`, `android-<codename>` and add-on ids of the form
/// `vendor:name:<api>`, which resolve to their base platform.
pub fn parse_android_target(sdk: &AndroidSdk) -> Result<AndroidTarget, SdkError> {
    let target = sdk.build_target.trim();

    let (id, api_level, codename) = if let Some(caps) = PLATFORM_ID.captures(target) {
        let api = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let codename = caps.get(2).map(|m| m.as_str().to_string());
        (target.to_string(), api, codename)
    } else if let Some(caps) = ADDON_ID.captures(target) {
        let api: u32 = caps[1]
            .parse()
            .map_err(|_| SdkError::InvalidTarget(target.to_string()))?;
        (format!("android-{}", api), Some(api), None)
    } else {
        return Err(SdkError::InvalidTarget(target.to_string()));
    };

    let location = sdk.home.join("platforms").join(&id);
    let resolved = AndroidTarget {
        id,
        api_level,
        codename,
        location,
    };

    if !resolved.android_jar().is_file() {
        return Err(SdkError::PlatformNotFound {
            target: target.to_string(),
            path: resolved.location,
        });
    }

    debug!("Resolved target {} to {:?}", target, resolved.location);
    Ok(resolved)
}

/// Location of the dx jar for an SDK.
///
/// An explicit override wins; otherwise the newest build-tools that ships a
/// dx jar, then the legacy platform-tools copy. The returned path is not
/// guaranteed to exist.
pub fn dx_jar_path(sdk: &AndroidSdk, override_path: Option<&Path>) -> PathBuf {
    if let Some(path) = override_path {
        return path.to_path_buf();
    }

    let build_tools = sdk.home.join("build-tools");
    sdk.build_tools_versions()
        .iter()
        .rev()
        .map(|v| build_tools.join(v).join("lib").join(DX_JAR))
        .find(|p| p.is_file())
        .unwrap_or_else(|| sdk.home.join("platform-tools").join("lib").join(DX_JAR))
}

/// `bin/java` inside a JDK home
pub fn java_in(java_home: &Path) -> PathBuf {
    let exe = if cfg!(windows) { "java.exe" } else { "java" };
    java_home.join("bin").join(exe)
}

fn list_dirs(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.path().is_dir())
                .filter_map(|e| e.file_name().to_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn version_key(version: &str) -> Vec<u64> {
    version
        .split(|c| c == '.' || c == '-')
        .map(|part| {
            part.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_sdk(platforms: &[&str], build_tools_with_dx: &[&str]) -> (tempfile::TempDir, AndroidSdk) {
        let dir = tempfile::tempdir().unwrap();
        for p in platforms {
            let platform = dir.path().join("platforms").join(p);
            fs::create_dir_all(&platform).unwrap();
            fs::write(platform.join("android.jar"), b"").unwrap();
        }
        for v in build_tools_with_dx {
            let lib = dir.path().join("build-tools").join(v).join("lib");
            fs::create_dir_all(&lib).unwrap();
            fs::write(lib.join(DX_JAR), b"").unwrap();
        }
        let sdk = AndroidSdk::new("Android", dir.path().to_path_buf(), "android-19");
        (dir, sdk)
    }

    #[test]
    fn test_parse_numeric_target() {
        let (_dir, sdk) = fake_sdk(&["android-19"], &[]);
        let target = parse_android_target(&sdk).unwrap();
        assert_eq!(target.id, "android-19");
        assert_eq!(target.api_level, Some(19));
        assert!(target.android_jar().is_file());
    }

    #[test]
    fn test_parse_codename_and_addon_targets() {
        let (_dir, mut sdk) = fake_sdk(&["android-L", "android-17"], &[]);

        sdk.build_target = "android-L".into();
        let target = parse_android_target(&sdk).unwrap();
        assert_eq!(target.codename.as_deref(), Some("L"));
        assert_eq!(target.api_level, None);

        sdk.build_target = "Google Inc.:Google APIs:17".into();
        let target = parse_android_target(&sdk).unwrap();
        assert_eq!(target.id, "android-17");
    }

    #[test]
    fn test_missing_platform() {
        let (_dir, sdk) = fake_sdk(&["android-21"], &[]);
        let err = parse_android_target(&sdk).unwrap_err();
        assert!(matches!(err, SdkError::PlatformNotFound { .. }));
        assert!(!err.is_unspecified());
    }

    #[test]
    fn test_garbage_target() {
        let (_dir, mut sdk) = fake_sdk(&[], &[]);
        sdk.build_target = "nineteen".into();
        assert!(matches!(parse_android_target(&sdk), Err(SdkError::InvalidTarget(_))));
    }

    #[test]
    fn test_dx_jar_prefers_newest_build_tools() {
        let (dir, sdk) = fake_sdk(&[], &["19.1.0", "23.0.3", "9.0.0"]);
        assert_eq!(
            dx_jar_path(&sdk, None),
            dir.path().join("build-tools").join("23.0.3").join("lib").join(DX_JAR)
        );
    }

    #[test]
    fn test_dx_jar_fallback_and_override() {
        let (dir, sdk) = fake_sdk(&[], &[]);
        assert_eq!(
            dx_jar_path(&sdk, None),
            dir.path().join("platform-tools").join("lib").join(DX_JAR)
        );
        assert_eq!(
            dx_jar_path(&sdk, Some(Path::new("/opt/dx.jar"))),
            PathBuf::from("/opt/dx.jar")
        );
    }

    #[test]
    fn test_from_definition() {
        let mut def = SdkDefinition {
            name: "JDK".into(),
            kind: SdkKind::Java,
            home: Some(PathBuf::from("/usr/lib/jvm/java-8")),
            build_target: None,
            java_home: None,
        };
        assert!(AndroidSdk::from_definition(&def).unwrap_err().is_unspecified());

        def.kind = SdkKind::Android;
        def.home = None;
        assert!(matches!(AndroidSdk::from_definition(&def), Err(SdkError::MissingHome(_))));

        def.home = Some(PathBuf::from("/opt/sdk"));
        assert!(matches!(AndroidSdk::from_definition(&def), Err(SdkError::MissingBuildTarget(_))));

        def.build_target = Some("android-19".into());
        let sdk = AndroidSdk::from_definition(&def).unwrap();
        assert_eq!(sdk.build_target, "android-19");
    }

    #[test]
    fn test_java_executable_prefers_sdk_jdk() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(java_in(dir.path()), b"").unwrap();

        let sdk = AndroidSdk::new("Android", PathBuf::from("/opt/sdk"), "android-19")
            .with_java_home(dir.path().to_path_buf());
        assert_eq!(sdk.java_executable(Some(Path::new("/nowhere"))), java_in(dir.path()));
    }

    #[test]
    fn test_version_key_ordering() {
        assert!(version_key("23.0.3") > version_key("19.1.0"));
        assert!(version_key("26.0.0-rc1") > version_key("25.0.3"));
    }
}
