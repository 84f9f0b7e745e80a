//! Human-readable platform and device diagnostics

use crate::device::Capability;

/// Revision the library was built from
pub const BUILD_REVISION: &str = env!("ARRAYFORGE_BUILD_REVISION");

/// Format an encoded toolkit version (`1000 * major + 10 * minor`) as "major.minor"
pub fn format_toolkit_version(version: u32) -> String {
    format!("{}.{}", version / 1000, (version % 1000) / 10)
}

/// Extract the driver version from the contents of `/proc/driver/nvidia/version`
pub fn parse_nvidia_proc_version(contents: &str) -> Option<String> {
    let line = contents
        .lines()
        .find(|line| line.trim_start().starts_with("NVRM version:"))?;

    line.split_whitespace()
        .find(|token| {
            token.contains('.') && token.chars().all(|c| c.is_ascii_digit() || c == '.')
        })
        .map(str::to_string)
}

/// Word size and operating system, e.g. "64-bit Linux"
pub fn system_description() -> String {
    let os = match std::env::consts::OS {
        "linux" => "Linux",
        "windows" => "Windows",
        "macos" => "Mac OSX",
        other => other,
    };
    format!("{}-bit {}", usize::BITS, os)
}

/// First line of the full report
pub fn report_header() -> String {
    format!(
        "ArrayForge v{} (CUDA, {}, build {})\n",
        env!("CARGO_PKG_VERSION"),
        system_description(),
        BUILD_REVISION
    )
}

/// Toolkit and driver line
pub fn platform_summary(toolkit_version: u32, driver_version: Option<&str>) -> String {
    let mut platform = format!(
        "Platform: CUDA Toolkit {}",
        format_toolkit_version(toolkit_version)
    );
    if let Some(driver) = driver_version.filter(|d| !d.is_empty()) {
        platform.push_str(", Driver: ");
        platform.push_str(driver);
    }
    platform.push('\n');
    platform
}

/// One device line; the active device's position is shown in brackets
pub fn device_summary(position: usize, capability: &Capability, active: bool) -> String {
    let id = if active {
        format!("[{}]", position)
    } else {
        format!("-{}-", position)
    };
    format!(
        "{} {}, {} MB, CUDA Compute {}\n",
        id,
        capability.name,
        capability.memory_mb(),
        capability.compute_capability()
    )
}
