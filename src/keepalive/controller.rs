// Keep-alive controller
// Converges running silent players to the selected devices and recovers them after resume
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::schedule::ScheduledTask;
use crate::audio::{AudioBackend, DeviceId, SilenceFormat, SilentPlayer};
use crate::error::KeepAliveError;
use crate::settings::ConfigStore;

/// Timer and format settings for the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveSettings {
    /// Period of the nudge timer
    pub health_interval: Duration,
    /// Delay between the passes of a resume recovery
    pub resume_pass_delay: Duration,
    pub format: SilenceFormat,
}

impl Default for KeepAliveSettings {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(5),
            resume_pass_delay: Duration::from_millis(300),
            format: SilenceFormat::default(),
        }
    }
}

/// What a single reconcile changed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub stopped: Vec<DeviceId>,
    pub started: Vec<DeviceId>,
    pub failed: Vec<(DeviceId, KeepAliveError)>,
}

impl ReconcileReport {
    /// True when no player was started or stopped
    pub fn is_noop(&self) -> bool {
        self.stopped.is_empty() && self.started.is_empty()
    }
}

/// Snapshot for status displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveStatus {
    pub targets: BTreeSet<DeviceId>,
    pub active: BTreeSet<DeviceId>,
    pub last_resume: Option<DateTime<Local>>,
    pub recovering: bool,
}

struct PlayerTable<B: AudioBackend> {
    targets: BTreeSet<DeviceId>,
    players: HashMap<DeviceId, SilentPlayer<B>>,
}

struct Shared<B: AudioBackend> {
    backend: Arc<B>,
    store: Arc<dyn ConfigStore>,
    settings: KeepAliveSettings,
    runtime: Handle,
    // Every read and write of targets and players goes through this lock
    table: Mutex<PlayerTable<B>>,
    // Kept apart from `table` so resume notifications never wait on device I/O
    last_resume: Mutex<Option<DateTime<Local>>>,
    shut_down: AtomicBool,
    recovery: ScheduledTask,
    health: ScheduledTask,
}

/// Cloneable handle to the keep-alive state
pub struct KeepAliveController<B: AudioBackend> {
    shared: Arc<Shared<B>>,
}

impl<B: AudioBackend> Clone for KeepAliveController<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: AudioBackend> KeepAliveController<B> {
    /// Build a controller with the target set loaded from `store`. Nothing is started yet.
    pub fn new(
        backend: Arc<B>,
        store: Arc<dyn ConfigStore>,
        settings: KeepAliveSettings,
        runtime: Handle,
    ) -> Self {
        let targets = store.load();
        info!(devices = targets.len(), "Loaded device selection");

        Self {
            shared: Arc::new(Shared {
                backend,
                store,
                settings,
                runtime,
                table: Mutex::new(PlayerTable {
                    targets,
                    players: HashMap::new(),
                }),
                last_resume: Mutex::new(None),
                shut_down: AtomicBool::new(false),
                recovery: ScheduledTask::new(),
                health: ScheduledTask::new(),
            }),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.shared.backend
    }

    pub fn targets(&self) -> BTreeSet<DeviceId> {
        self.shared.table.lock().targets.clone()
    }

    pub fn active_devices(&self) -> BTreeSet<DeviceId> {
        self.shared.table.lock().players.keys().cloned().collect()
    }

    pub fn status(&self) -> KeepAliveStatus {
        let last_resume = *self.shared.last_resume.lock();
        let table = self.shared.table.lock();
        KeepAliveStatus {
            targets: table.targets.clone(),
            active: table.players.keys().cloned().collect(),
            last_resume,
            recovering: self.shared.recovery.is_running(),
        }
    }

    /// Replace the whole target set, persist it and reconcile
    pub fn set_target_devices<I>(&self, ids: I) -> ReconcileReport
    where
        I: IntoIterator,
        I::Item: Into<DeviceId>,
    {
        let mut table = self.shared.table.lock();
        if self.shared.is_shut_down() {
            return ReconcileReport::default();
        }

        table.targets = ids.into_iter().map(Into::into).collect();
        info!(devices = table.targets.len(), "Device selection changed");
        if let Err(e) = self.shared.store.save(&table.targets) {
            warn!(error = %e, "Failed to save device selection");
        }

        self.shared.reconcile_locked(&mut table)
    }

    pub fn reconcile(&self) -> ReconcileReport {
        self.shared.reconcile()
    }

    /// Nudge every player. Errors never leave this call.
    pub fn periodic_health_check(&self) {
        self.shared.nudge_all();
    }

    /// Schedule the three-pass recovery without blocking the caller.
    /// Never takes the player table lock, so it is safe on an OS notification thread.
    pub fn on_system_resume(&self) {
        info!("System resumed, recovering silent streams");
        *self.shared.last_resume.lock() = Some(Local::now());
        self.schedule_recovery();
    }

    /// Same recovery as a resume, on user request
    pub fn restart_streams(&self) {
        info!("Restarting silent streams on request");
        self.schedule_recovery();
    }

    /// Start the periodic nudge timer. The first tick fires one interval from now.
    pub fn start_health_check(&self) {
        let period = self.shared.settings.health_interval;
        let weak = Arc::downgrade(&self.shared);

        self.shared.health.replace(&self.shared.runtime, async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !run_pass(&weak, Shared::nudge_all).await {
                    break;
                }
            }
        });
        debug!(?period, "Health check timer started");
    }

    /// Stop every player and cancel background work. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.shared.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.recovery.cancel();
        self.shared.health.cancel();

        let mut table = self.shared.table.lock();
        let count = table.players.len();
        for (_, mut player) in table.players.drain() {
            player.stop();
        }
        info!(players = count, "Keep-alive controller shut down");
    }

    fn schedule_recovery(&self) {
        if self.shared.is_shut_down() {
            return;
        }

        let weak = Arc::downgrade(&self.shared);
        let delay = self.shared.settings.resume_pass_delay;
        if self
            .shared
            .recovery
            .replace(&self.shared.runtime, run_recovery(weak, delay))
        {
            debug!("Superseded an in-flight recovery");
        }
    }
}

async fn run_recovery<B: AudioBackend>(shared: Weak<Shared<B>>, delay: Duration) {
    if !run_pass(&shared, Shared::restart_all).await {
        return;
    }

    // Drivers may re-enumerate endpoints right after resume
    tokio::time::sleep(delay).await;
    if !run_pass(&shared, |shared: &Shared<B>| {
        shared.reconcile();
    })
    .await
    {
        return;
    }

    tokio::time::sleep(delay).await;
    if run_pass(&shared, Shared::nudge_all).await {
        debug!("Recovery passes finished");
    }
}

/// Run one pass on the blocking pool; stream open and close block on device I/O.
/// Returns false once the controller is gone.
///
/// Aborting the caller does not interrupt a pass that already started.
async fn run_pass<B: AudioBackend>(shared: &Weak<Shared<B>>, pass: fn(&Shared<B>)) -> bool {
    let Some(shared) = shared.upgrade() else {
        return false;
    };

    match tokio::task::spawn_blocking(move || pass(&shared)).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Keep-alive pass did not complete");
            false
        }
    }
}

impl<B: AudioBackend> Shared<B> {
    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn reconcile(&self) -> ReconcileReport {
        let mut table = self.table.lock();
        if self.is_shut_down() {
            return ReconcileReport::default();
        }
        self.reconcile_locked(&mut table)
    }

    fn reconcile_locked(&self, table: &mut PlayerTable<B>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let removed: Vec<DeviceId> = table
            .players
            .keys()
            .filter(|id| !table.targets.contains(*id))
            .cloned()
            .collect();
        for id in removed {
            if let Some(mut player) = table.players.remove(&id) {
                player.stop();
            }
            info!(device = %id, "Stopped keeping device awake");
            report.stopped.push(id);
        }

        let missing: Vec<DeviceId> = table
            .targets
            .iter()
            .filter(|id| !table.players.contains_key(*id))
            .cloned()
            .collect();
        for id in missing {
            match self.start_player(&id) {
                Ok(player) => {
                    info!(device = %id, "Keeping device awake");
                    table.players.insert(id.clone(), player);
                    report.started.push(id);
                }
                Err(err) => {
                    warn!(device = %id, error = %err, "Unable to keep device awake");
                    report.failed.push((id, err));
                }
            }
        }

        report
    }

    fn start_player(&self, id: &DeviceId) -> Result<SilentPlayer<B>, KeepAliveError> {
        let device = self.backend.resolve(id)?;
        let mut player = SilentPlayer::new(
            Arc::clone(&self.backend),
            id.clone(),
            device,
            self.settings.format,
        );
        player.start()?;
        Ok(player)
    }

    /// Restart every player; a player that fails to come back is dropped from the table
    fn restart_all(&self) {
        let mut table = self.table.lock();
        if self.is_shut_down() {
            return;
        }

        let failed: Vec<DeviceId> = table
            .players
            .iter_mut()
            .filter_map(|(id, player)| match player.restart() {
                Ok(()) => None,
                Err(e) => {
                    warn!(device = %id, error = %e, "Restart failed, will re-resolve");
                    Some(id.clone())
                }
            })
            .collect();

        for id in failed {
            table.players.remove(&id);
        }
    }

    fn nudge_all(&self) {
        let table = self.table.lock();
        if self.is_shut_down() {
            return;
        }

        for (id, player) in &table.players {
            if let Err(e) = player.nudge() {
                debug!(device = %id, error = %e, "Nudge failed");
            }
        }
    }
}
