// AudioPopFix - keeps audio output devices awake
// Module declarations
pub mod audio;
pub mod cli;
pub mod error;
mod headless;
pub mod keepalive;
pub mod logging;
pub mod power;
pub mod settings;
pub mod startup;
pub mod state;
#[cfg(feature = "tray")]
mod tray;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use audio::{AudioBackend, CpalBackend};
use cli::Cli;
use keepalive::KeepAliveSettings;
use settings::{ConfigLocation, LocationOptions};
use state::AppState;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();

    if cli.list_devices {
        return list_devices();
    }

    let options = LocationOptions::from_process(cli.portable, cli.config_dir.clone())?;
    let location = ConfigLocation::resolve(&options)?;
    info!(
        config = %location.config_file().display(),
        portable = location.portable,
        "Config location"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("audiopopfix-rt")
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let state = AppState::new(
        location,
        KeepAliveSettings::default(),
        runtime.handle().clone(),
    )?;

    if let Some(ids) = cli.requested_devices() {
        let report = state.controller.set_target_devices(ids);
        for (id, e) in &report.failed {
            warn!(device = %id, error = %e, "Requested device not started");
        }
    }

    run_shell(&cli, state, runtime)
}

fn list_devices() -> Result<()> {
    let devices = CpalBackend::new()
        .enumerate_active_render_devices()
        .context("Failed to list output devices")?;

    for device in devices {
        println!("{}\t{}", device.id, device.display_name);
    }
    Ok(())
}

#[cfg(feature = "tray")]
fn run_shell(cli: &Cli, state: AppState, runtime: Runtime) -> Result<()> {
    if cli.headless {
        headless::run(state, runtime)
    } else {
        tray::run(state, runtime)
    }
}

#[cfg(not(feature = "tray"))]
fn run_shell(cli: &Cli, state: AppState, runtime: Runtime) -> Result<()> {
    if !cli.headless {
        info!("Built without the tray shell, running headless");
    }
    headless::run(state, runtime)
}
