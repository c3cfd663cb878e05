// Resume-from-sleep notifications
// Native power notifications on Windows, wall-clock gap detection elsewhere

mod clock_gap;
#[cfg(windows)]
mod windows_power;

use std::sync::Arc;

use tracing::info;
#[cfg(windows)]
use tracing::warn;

use crate::error::PowerError;

pub use clock_gap::ClockGapMonitor;

/// Invoked on the notifying thread; must return quickly
pub type ResumeCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Live resume subscription. Dropping it unsubscribes.
pub enum ResumeSubscription {
    ClockGap(ClockGapMonitor),
    #[cfg(windows)]
    Native(windows_power::PowerNotification),
}

impl ResumeSubscription {
    pub fn source(&self) -> &'static str {
        match self {
            ResumeSubscription::ClockGap(_) => "clock gap",
            #[cfg(windows)]
            ResumeSubscription::Native(_) => "power notification",
        }
    }
}

pub fn subscribe(callback: ResumeCallback) -> Result<ResumeSubscription, PowerError> {
    #[cfg(windows)]
    {
        match windows_power::PowerNotification::register(callback.clone()) {
            Ok(native) => {
                info!("Subscribed to system resume notifications");
                return Ok(ResumeSubscription::Native(native));
            }
            Err(e) => {
                warn!(error = %e, "Native resume notifications unavailable, watching the clock instead");
            }
        }
    }

    let monitor = ClockGapMonitor::spawn(
        callback,
        ClockGapMonitor::DEFAULT_TICK,
        ClockGapMonitor::DEFAULT_SLACK,
    )?;
    info!("Watching for resume by wall-clock gaps");
    Ok(ResumeSubscription::ClockGap(monitor))
}
