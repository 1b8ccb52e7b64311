//! droid-dex - the Android dex build step
//!
//! Converts the compiled classes of every Android module in a project into a
//! `classes.dex`, by spawning the SDK's dx tool through a runner class.
//!
//! ## Architecture
//!
//! droid-dex is organized into specialized crates:
//!
//! - `droid-dex-core`: project model, configuration and build messages
//! - `droid-dex-toolchain`: Android SDK target, dx jar and JDK resolution
//! - `droid-dex-build-engine`: module-level builders, the dex step and the runner

#![warn(clippy::all)]

pub mod commands;

// Re-export main components for library usage
pub use droid_dex_core as core;
pub use droid_dex_toolchain as toolchain;
pub use droid_dex_build_engine as build;

/// Prelude module for convenient imports
pub mod prelude {
    pub use droid_dex_core::{AppConfig, BuildMessage, MessageKind, MessageSink, ProjectModel};
    pub use droid_dex_toolchain::{AndroidSdk, ToolchainDetector};
    pub use droid_dex_build_engine::{BuildRunner, BuildSummary, DexBuilder, DexSettings, ExitCode};
}
