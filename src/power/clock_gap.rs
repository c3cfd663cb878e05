// Resume detection by wall-clock gaps
//
// A sleeping thread does not run while the machine is suspended, but the wall clock keeps
// going. When one tick took far longer than requested on the wall clock, the machine slept.
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use super::ResumeCallback;
use crate::error::PowerError;

pub struct ClockGapMonitor {
    stop: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ClockGapMonitor {
    pub const DEFAULT_TICK: Duration = Duration::from_secs(2);
    pub const DEFAULT_SLACK: Duration = Duration::from_secs(10);

    pub fn spawn(
        callback: ResumeCallback,
        tick: Duration,
        slack: Duration,
    ) -> Result<Self, PowerError> {
        let (stop, stop_rx) = mpsc::channel::<()>();

        let worker = thread::Builder::new()
            .name("resume-monitor".to_string())
            .spawn(move || {
                let mut last = SystemTime::now();
                loop {
                    match stop_rx.recv_timeout(tick) {
                        Err(RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }

                    let now = SystemTime::now();
                    if is_resume_gap(last, now, tick, slack) {
                        info!("Wall clock jumped, treating as resume");
                        callback();
                    }
                    last = now;
                }
                debug!("Resume monitor stopped");
            })?;

        Ok(Self {
            stop: Some(stop),
            worker: Some(worker),
        })
    }

    pub fn stop(&mut self) {
        // Dropping the sender wakes the worker
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for ClockGapMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// True when more than `tick + slack` of wall time passed during one tick.
/// A clock set backwards is never a resume.
pub(crate) fn is_resume_gap(
    last: SystemTime,
    now: SystemTime,
    tick: Duration,
    slack: Duration,
) -> bool {
    match now.duration_since(last) {
        Ok(elapsed) => elapsed > tick + slack,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    const TICK: Duration = Duration::from_secs(2);
    const SLACK: Duration = Duration::from_secs(10);

    #[test]
    fn test_normal_tick_is_not_a_resume() {
        let last = SystemTime::now();
        assert!(!is_resume_gap(last, last + Duration::from_secs(2), TICK, SLACK));
        assert!(!is_resume_gap(last, last + Duration::from_secs(12), TICK, SLACK));
    }

    #[test]
    fn test_long_gap_is_a_resume() {
        let last = SystemTime::now();
        assert!(is_resume_gap(last, last + Duration::from_secs(60), TICK, SLACK));
    }

    #[test]
    fn test_clock_set_backwards_is_ignored() {
        let last = SystemTime::now();
        assert!(!is_resume_gap(last, last - Duration::from_secs(600), TICK, SLACK));
    }

    #[test]
    fn test_stop_joins_worker_promptly() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let callback: ResumeCallback = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let started = Instant::now();
        let mut monitor = ClockGapMonitor::spawn(callback, Duration::from_secs(30), SLACK).unwrap();
        monitor.stop();
        monitor.stop();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
