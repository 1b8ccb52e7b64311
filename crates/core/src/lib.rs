//! droid-dex Core - shared types
//!
//! This crate provides the build model the dex step runs against: the project
//! description, module chunks, application configuration and the messages a
//! build reports back to its caller.

pub mod config;
pub mod project;
pub mod messages;
pub mod error;

pub use config::AppConfig;
pub use project::{
    AndroidFacet, DependencyScope, Library, Module, ModuleChunk, ModuleDependency, ProjectModel,
    ProjectPaths, SdkDefinition, SdkKind,
};
pub use messages::{BuildMessage, CollectingSink, CompilerMessage, MessageKind, MessageSink};
pub use error::{CoreError, Result};

/// droid-dex version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "droid-dex";
