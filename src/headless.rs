// Headless mode: keep devices awake until Ctrl-C
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;
use tracing::info;

use crate::state::AppState;

pub fn run(state: AppState, runtime: Runtime) -> Result<()> {
    info!(
        active = state.controller.active_devices().len(),
        "Running headless, press Ctrl-C to exit"
    );

    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("Failed to wait for Ctrl-C")?;

    info!("Shutting down");
    state.shutdown();
    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}
