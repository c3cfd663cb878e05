// Cancellable background tasks
use std::future::Future;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Slot holding at most one background task.
///
/// Scheduling a new task aborts the previous one. Aborting only takes effect at an `.await`,
/// so synchronous work between two awaits is never split.
#[derive(Default)]
pub struct ScheduledTask {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` on `runtime`, aborting whatever ran in this slot before.
    /// Returns true if a previous task was still running.
    pub fn replace<F>(&self, runtime: &Handle, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.handle.lock();
        let superseded = match slot.take() {
            Some(previous) => {
                let running = !previous.is_finished();
                previous.abort();
                running
            }
            None => false,
        };
        *slot = Some(runtime.spawn(future));
        superseded
    }

    /// Abort the task if any. Returns true if one was still running.
    pub fn cancel(&self) -> bool {
        match self.handle.lock().take() {
            Some(handle) => {
                let running = !handle.is_finished();
                handle.abort();
                running
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            handle.abort();
        }
    }
}
