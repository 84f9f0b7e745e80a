//! ArrayForge CLI
//!
//! Inspect, rank and select the CUDA devices seen by the ArrayForge backend.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arrayforge_cuda::{
    Capability, DeviceDescriptor, DeviceRegistry, Platform, RegistryConfig, SimulatedPlatform,
    SortMode,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "arrayforge")]
#[command(author = "ArrayForge Team")]
#[command(version)]
#[command(about = "CUDA device discovery and selection for ArrayForge", long_about = None)]
struct Cli {
    /// Use a simulated device set (JSON) instead of the CUDA driver
    #[arg(long, global = true)]
    simulate: Option<PathBuf>,

    /// Registry configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the platform and device report
    Info {
        /// Ranking policy
        #[arg(short, long)]
        sort: Option<SortModeArg>,
    },

    /// List devices in ranked order
    Devices {
        /// Ranking policy
        #[arg(short, long)]
        sort: Option<SortModeArg>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Activate a device and print the report
    Select {
        /// Ordered position of the device
        position: usize,

        /// Ranking policy applied before selecting
        #[arg(short, long)]
        sort: Option<SortModeArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortModeArg {
    Compute,
    Throughput,
    Memory,
    Native,
}

impl From<SortModeArg> for SortMode {
    fn from(arg: SortModeArg) -> Self {
        match arg {
            SortModeArg::Compute => SortMode::ComputeCapability,
            SortModeArg::Throughput => SortMode::Throughput,
            SortModeArg::Memory => SortMode::Memory,
            SortModeArg::Native => SortMode::NativeOrder,
        }
    }
}

/// Simulated platform file: either a bare device list or a full description
#[derive(Deserialize)]
#[serde(untagged)]
enum SimulationFile {
    Devices(Vec<Capability>),
    Platform {
        devices: Vec<Capability>,
        #[serde(default)]
        toolkit_version: Option<u32>,
        #[serde(default)]
        driver_version: Option<String>,
    },
}

impl SimulationFile {
    fn into_platform(self) -> SimulatedPlatform {
        match self {
            SimulationFile::Devices(devices) => SimulatedPlatform::new(devices),
            SimulationFile::Platform {
                devices,
                toolkit_version,
                driver_version,
            } => {
                let mut platform = SimulatedPlatform::new(devices);
                if let Some(version) = toolkit_version {
                    platform = platform.with_toolkit_version(version);
                }
                if let Some(version) = driver_version {
                    platform = platform.with_driver_version(version);
                }
                platform
            }
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { sort } => {
            apply_sort(&mut config, sort);
            let registry = open_registry(cli.simulate.as_deref(), &config)?;
            print!("{}", registry.full_report()?);
        }
        Commands::Devices { sort, json } => {
            apply_sort(&mut config, sort);
            let registry = open_registry(cli.simulate.as_deref(), &config)?;
            cmd_devices(&registry, json)?;
        }
        Commands::Select { position, sort } => {
            apply_sort(&mut config, sort);
            let registry = open_registry(cli.simulate.as_deref(), &config)?;
            let previous = registry.set_active_device(position)?;
            info!("Switched from device {} to device {}", previous, position);
            print!("{}", registry.full_report()?);
        }
    }

    Ok(())
}

fn apply_sort(config: &mut RegistryConfig, sort: Option<SortModeArg>) {
    if let Some(sort) = sort {
        config.sort_mode = sort.into();
    }
}

fn load_config(path: Option<&Path>) -> Result<RegistryConfig> {
    let Some(path) = path else {
        return Ok(RegistryConfig::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid config {}", path.display()))
}

fn load_simulation(path: &Path) -> Result<SimulatedPlatform> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read device file {}", path.display()))?;
    let file: SimulationFile = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid device file {}", path.display()))?;
    Ok(file.into_platform())
}

fn open_registry(
    simulate: Option<&Path>,
    config: &RegistryConfig,
) -> Result<DeviceRegistry<Box<dyn Platform>>> {
    let platform: Box<dyn Platform> = match simulate {
        Some(path) => Box::new(load_simulation(path)?),
        None => native_platform()?,
    };
    Ok(DeviceRegistry::with_config(platform, config)?)
}

#[cfg(feature = "cuda")]
fn native_platform() -> Result<Box<dyn Platform>> {
    Ok(Box::new(arrayforge_cuda::CudaPlatform::new()?))
}

#[cfg(not(feature = "cuda"))]
fn native_platform() -> Result<Box<dyn Platform>> {
    anyhow::bail!("arrayforge was built without CUDA support; rebuild with --features cuda or pass --simulate <devices.json>")
}

fn cmd_devices(registry: &DeviceRegistry<Box<dyn Platform>>, json: bool) -> Result<()> {
    let devices = registry.devices();
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    let active = registry.active_device_id();
    println!(
        "{:<4} {:<7} {:<28} {:>10} {:>8} {:>16}",
        "Pos", "Native", "Name", "Memory", "Compute", "Throughput"
    );
    println!("{:-<78}", "");
    for (position, device) in devices.iter().enumerate() {
        print_device(position, device, position == active);
    }
    Ok(())
}

fn print_device(position: usize, device: &DeviceDescriptor, active: bool) {
    let marker = if active { "*" } else { " " };
    println!(
        "{}{:<3} {:<7} {:<28} {:>7} MB {:>8} {:>16}",
        marker,
        position,
        device.native_id,
        device.capability.name,
        device.capability.memory_mb(),
        device.capability.compute_capability(),
        device.throughput_score
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_arg_conversion() {
        assert_eq!(SortMode::from(SortModeArg::Compute), SortMode::ComputeCapability);
        assert_eq!(SortMode::from(SortModeArg::Native), SortMode::NativeOrder);
    }

    #[test]
    fn test_simulation_file_formats() {
        let bare = r#"[{"name":"A","major":8,"minor":0,"total_memory":1024,"clock_rate":1410000,"multiprocessors":108}]"#;
        let platform = serde_json::from_str::<SimulationFile>(bare).unwrap().into_platform();
        assert_eq!(platform.device_count().unwrap(), 1);

        let full = r#"{"devices":[],"toolkit_version":11080,"driver_version":"520.61.05"}"#;
        let platform = serde_json::from_str::<SimulationFile>(full).unwrap().into_platform();
        assert_eq!(platform.toolkit_version().unwrap(), 11080);
        assert_eq!(platform.driver_version().as_deref(), Some("520.61.05"));
    }

    #[test]
    fn test_sample_device_file_uses_khz_clocks() {
        let sample = include_str!("../devices.sample.json");
        let platform = serde_json::from_str::<SimulationFile>(sample).unwrap().into_platform();
        let count = platform.device_count().unwrap();
        assert_eq!(count, 3);
        for native_id in 0..count {
            let clock_rate = platform.capability(native_id).unwrap().clock_rate;
            assert!(clock_rate >= 100_000, "device {} clock {} is not in kHz", native_id, clock_rate);
        }

        let platform: Box<dyn Platform> = Box::new(platform);
        let config = RegistryConfig {
            sort_mode: SortMode::Throughput,
            ..RegistryConfig::default()
        };
        let registry = DeviceRegistry::with_config(platform, &config).unwrap();
        let order: Vec<usize> = registry.devices().iter().map(|d| d.native_id).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn test_simulated_registry_with_sort() {
        let devices = r#"[
            {"name":"Slow","major":2,"minor":0,"total_memory":2147483648,"clock_rate":1500,"multiprocessors":8},
            {"name":"Fast","major":5,"minor":0,"total_memory":8589934592,"clock_rate":1000,"multiprocessors":20}
        ]"#;
        let platform: Box<dyn Platform> =
            Box::new(serde_json::from_str::<SimulationFile>(devices).unwrap().into_platform());
        let mut config = RegistryConfig::default();
        apply_sort(&mut config, Some(SortModeArg::Throughput));

        let registry = DeviceRegistry::with_config(platform, &config).unwrap();
        assert_eq!(registry.native_id(0).unwrap(), 1);
        assert_eq!(registry.active_native_id(), 1);
    }
}
