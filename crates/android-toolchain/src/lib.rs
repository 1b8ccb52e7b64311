//! Android Toolchain
//!
//! Resolves what the dex step needs from an Android SDK:
//! - Build target platforms
//! - The dx jar from build-tools
//! - The java executable used to run it

pub mod detector;
pub mod sdk;

pub use detector::{ToolchainDetector, ToolchainStatus, SdkInfo, JdkInfo, DetectionError};
pub use sdk::{AndroidSdk, AndroidTarget, SdkError, parse_android_target, dx_jar_path, java_in};
