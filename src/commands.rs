//! CLI commands for droid-dex
//!
//! Each command is a plain struct with an `execute` method so it can be
//! driven from `main` or from scripts embedding the library.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use droid_dex_build_engine::{BuildRunner, BuildSummary, DexBuilder, DexSettings};
use droid_dex_core::{AppConfig, BuildMessage, MessageSink, ProjectModel, SdkKind};
use droid_dex_toolchain::{
    dx_jar_path, parse_android_target, AndroidSdk, ToolchainDetector, ToolchainStatus,
};

/// Load the config file given on the command line, or the default one
pub async fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path)
            .await
            .with_context(|| format!("Failed to load config {:?}", path)),
        None => AppConfig::load().await.context("Failed to load config"),
    }
}

/// Prints build messages as they arrive
pub struct ConsoleSink {
    json: bool,
}

impl ConsoleSink {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn render(&self, message: &BuildMessage) -> Option<String> {
        if self.json {
            return serde_json::to_string(message).ok();
        }
        match message {
            BuildMessage::Compiler(msg) => Some(msg.to_string()),
            BuildMessage::Progress { text } => Some(format!("> {}", text)),
        }
    }
}

impl MessageSink for ConsoleSink {
    fn process_message(&self, message: BuildMessage) {
        if let Some(line) = self.render(&message) {
            println!("{}", line);
        }
    }
}

/// Build command options
pub struct BuildCommand {
    pub project_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub tests: bool,
    pub json: bool,
}

impl BuildCommand {
    /// Run the dex step over every chunk of the project
    pub async fn execute(&self) -> Result<BuildSummary> {
        info!("Building project: {:?}", self.project_path);

        let config = load_config(self.config_path.as_deref()).await?;
        let mut project = ProjectModel::load(&self.project_path).await.map_err(|err| {
            anyhow!(
                "Failed to load project {:?}: {}",
                self.project_path,
                err.user_message()
            )
        })?;

        fill_sdk_homes(&mut project, &config).await;

        let runner =
            BuildRunner::new(DexBuilder::new(DexSettings::from(&config))).with_tests(self.tests);
        let sink: Arc<dyn MessageSink> = Arc::new(ConsoleSink::new(self.json));
        let summary = runner.run(Arc::new(project), sink).await?;

        if !self.json {
            println!(
                "Dex {} in {:.2}s: {} error(s), {} warning(s)",
                summary.exit_code.as_str(),
                summary.duration_secs,
                summary.errors,
                summary.warnings
            );
        }
        Ok(summary)
    }
}

/// Android SDK entries without a home get the configured or detected SDK
async fn fill_sdk_homes(project: &mut ProjectModel, config: &AppConfig) {
    let missing = project
        .sdks
        .iter()
        .any(|sdk| sdk.kind == SdkKind::Android && sdk.home.is_none());
    if !missing {
        return;
    }

    let home = match config.get_sdk_path() {
        Some(path) => Some(path),
        None => ToolchainDetector::detect_sdk().await.ok().map(|info| info.path),
    };
    let Some(home) = home else {
        warn!("No Android SDK configured or detected");
        return;
    };

    for sdk in project
        .sdks
        .iter_mut()
        .filter(|sdk| sdk.kind == SdkKind::Android && sdk.home.is_none())
    {
        info!("Using Android SDK {:?} for '{}'", home, sdk.name);
        sdk.home = Some(home.clone());
        if sdk.java_home.is_none() {
            sdk.java_home = config.android.jdk_path.clone();
        }
    }
}

/// SDK inspection command
pub struct SdkCommand {
    pub config_path: Option<PathBuf>,
    pub sdk_path: Option<PathBuf>,
    pub target: Option<String>,
}

impl SdkCommand {
    /// Report what the dex step would find
    pub async fn execute(&self) -> Result<()> {
        let config = load_config(self.config_path.as_deref()).await?;

        let sdk_path = match self.sdk_path.clone().or_else(|| config.get_sdk_path()) {
            Some(path) => path,
            None => ToolchainDetector::detect_sdk()
                .await
                .map(|info| info.path)
                .context("Android SDK not found; pass --sdk-path or set ANDROID_HOME")?,
        };

        if !ToolchainDetector::is_valid_sdk(&sdk_path) {
            warn!("{:?} does not look like an Android SDK", sdk_path);
        }
        let mut info = ToolchainDetector::analyze_sdk(&sdk_path);

        println!("Android SDK: {:?}", info.path);
        println!("  build-tools: {}", join_or_none(&info.build_tools_versions));
        println!("  platforms:   {}", join_or_none(&info.platforms));

        let sdk = AndroidSdk::new("cli", sdk_path.clone(), self.target.clone().unwrap_or_default());
        let dx_jar = dx_jar_path(&sdk, config.dex.dx_jar.as_deref());
        if dx_jar.is_file() {
            println!("  dx jar:      {:?}", dx_jar);
            info.dx_jar = Some(dx_jar);
        } else {
            println!("  dx jar:      missing ({:?})", dx_jar);
        }

        if let Some(target) = &self.target {
            match parse_android_target(&sdk) {
                Ok(resolved) => println!("  target:      {} -> {:?}", target, resolved.location),
                Err(err) => println!("  target:      {}", err),
            }
        }

        let jdk = match &config.android.jdk_path {
            Some(path) => ToolchainDetector::analyze_jdk(path).await.ok(),
            None => ToolchainDetector::detect_jdk().await.ok(),
        };
        let java = sdk.java_executable(jdk.as_ref().map(|jdk| jdk.path.as_path()));
        match &jdk {
            Some(jdk) => println!("Java: {:?} ({})", java, jdk.version),
            None => println!("Java: {:?}", java),
        }

        let status = ToolchainStatus { sdk: Some(info), jdk };
        if !status.is_complete() {
            println!("Missing: {}", status.missing_components().join(", "));
        }

        Ok(())
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use droid_dex_core::{CompilerMessage, MessageKind, SdkDefinition};

    #[test]
    fn test_console_sink_renders_text_and_json() {
        let message = BuildMessage::from(
            CompilerMessage::new("android-dex", MessageKind::Error, "boom").with_module("app"),
        );

        let text = ConsoleSink::new(false).render(&message).unwrap();
        assert!(text.contains("boom"));
        assert!(text.contains("app"));

        let json = ConsoleSink::new(true).render(&message).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "compiler");
        assert_eq!(value["text"], "boom");

        let progress = ConsoleSink::new(false).render(&BuildMessage::progress("Executing DEX"));
        assert_eq!(progress.as_deref(), Some("> Executing DEX"));
    }

    #[tokio::test]
    async fn test_fill_sdk_homes_uses_configured_sdk() {
        let sdk_dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.android.sdk_path = Some(sdk_dir.path().to_path_buf());
        config.android.jdk_path = Some(PathBuf::from("/opt/jdk"));

        let mut project = ProjectModel {
            name: "demo".into(),
            sdks: vec![
                SdkDefinition {
                    name: "android".into(),
                    kind: SdkKind::Android,
                    home: None,
                    build_target: Some("android-19".into()),
                    java_home: None,
                },
                SdkDefinition {
                    name: "jdk".into(),
                    kind: SdkKind::Java,
                    home: None,
                    build_target: None,
                    java_home: None,
                },
            ],
            ..Default::default()
        };

        fill_sdk_homes(&mut project, &config).await;

        assert_eq!(project.sdks[0].home.as_deref(), Some(sdk_dir.path()));
        assert_eq!(project.sdks[0].java_home, Some(PathBuf::from("/opt/jdk")));
        assert_eq!(project.sdks[1].home, None);
    }
}
