//! droid-dex Build Engine
//!
//! Module-level build steps and the runner that drives them over a project.
//! The dex step converts compiled classes into a `classes.dex` by running the
//! SDK's dx tool.

pub mod config;
pub mod builder;
pub mod context;
pub mod process;
pub mod dx_output;
pub mod dex;
pub mod runner;

pub use config::DexSettings;
pub use builder::{BuilderCategory, ExitCode, ModuleLevelBuilder};
pub use context::CompileContext;
pub use process::{JavaCommandLine, ProcessOutput, TokioProcessRunner, ToolRunner};
pub use dx_output::{classify_output, DexMessages};
pub use dex::DexBuilder;
pub use runner::{BuildRunner, BuildSummary};

use droid_dex_core::CoreError;

/// Build errors
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A step failed unexpectedly; the message has already been reported
    #[error("{message}")]
    ProjectBuild {
        message: String,
        #[source]
        source: Box<BuildError>,
    },
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Wrap an internal failure so the caller gets one concrete message
    pub fn project_build(message: impl Into<String>, source: BuildError) -> Self {
        BuildError::ProjectBuild {
            message: message.into(),
            source: Box::new(source),
        }
    }
}
