//! Embeds the build revision shown in the diagnostic report header.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=ARRAYFORGE_BUILD_REVISION");

    let revision = std::env::var("ARRAYFORGE_BUILD_REVISION")
        .ok()
        .filter(|r| !r.trim().is_empty())
        .or_else(git_revision)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=ARRAYFORGE_BUILD_REVISION={}", revision.trim());
}

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let revision = String::from_utf8(output.stdout).ok()?;
    let revision = revision.trim();
    if revision.is_empty() {
        None
    } else {
        Some(revision.to_string())
    }
}
