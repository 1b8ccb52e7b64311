//! Shared helpers for the CLI integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub use assert_cmd::Command;

/// `droid-dex` binary with an isolated, empty config file
pub fn droid_dex_cmd(workdir: &Path) -> Command {
    let config = workdir.join("config.toml");
    if !config.exists() {
        fs::write(&config, "").expect("Failed to write test config");
    }

    let mut cmd = Command::cargo_bin("droid-dex").expect("Failed to find droid-dex binary for testing");
    cmd.arg("--config").arg(config);
    cmd.env_remove("ANDROID_HOME").env_remove("ANDROID_SDK_ROOT").env_remove("RUST_LOG");
    cmd
}

/// Write a project file into `workdir`
pub fn write_project(workdir: &Path, contents: &str) -> PathBuf {
    let path = workdir.join("project.toml");
    fs::write(&path, contents).expect("Failed to write project file");
    path
}

/// Minimal SDK layout with one platform
pub fn fake_sdk(root: &Path, platform: &str) -> PathBuf {
    let sdk = root.join("sdk");
    let platform_dir = sdk.join("platforms").join(platform);
    fs::create_dir_all(&platform_dir).expect("Failed to create platform dir");
    fs::write(platform_dir.join("android.jar"), b"").expect("Failed to write android.jar");

    let lib = sdk.join("build-tools").join("19.1.0").join("lib");
    fs::create_dir_all(&lib).expect("Failed to create build-tools dir");
    fs::write(lib.join("dx.jar"), b"").expect("Failed to write dx.jar");
    sdk
}
