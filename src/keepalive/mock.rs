// In-memory backend and config store for tests
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::audio::{AudioBackend, DeviceId, DeviceInfo, SilenceFormat, SilentStream};
use crate::error::{ConfigError, DeviceError, StreamError};
use crate::settings::ConfigStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    Opened,
    Closed,
    Nudged,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub event: StreamEvent,
    pub device: DeviceId,
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    present: BTreeSet<DeviceId>,
    fail_open: HashSet<DeviceId>,
    fail_close: HashSet<DeviceId>,
    open_delay: Option<Duration>,
    open: usize,
    open_per_device: HashMap<DeviceId, usize>,
    // Opens that found another stream already open on the same device
    overlapping_opens: usize,
    records: Vec<Record>,
}

impl MockState {
    fn record(&mut self, event: StreamEvent, device: &DeviceId) {
        self.records.push(Record {
            event,
            device: device.clone(),
            at: Instant::now(),
        });
    }
}

#[derive(Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn with_devices(ids: &[&str]) -> Self {
        let backend = Self::default();
        for id in ids {
            backend.plug(id);
        }
        backend
    }

    pub fn plug(&self, id: &str) {
        self.state.lock().present.insert(DeviceId::from(id));
    }

    pub fn unplug(&self, id: &str) {
        self.state.lock().present.remove(&DeviceId::from(id));
    }

    pub fn fail_open(&self, id: &str) {
        self.state.lock().fail_open.insert(DeviceId::from(id));
    }

    pub fn allow_open(&self, id: &str) {
        self.state.lock().fail_open.remove(&DeviceId::from(id));
    }

    /// Make every open block the calling thread, like a driver waking up
    pub fn delay_open(&self, delay: Duration) {
        self.state.lock().open_delay = Some(delay);
    }

    pub fn fail_close(&self, id: &str) {
        self.state.lock().fail_close.insert(DeviceId::from(id));
    }

    pub fn open_streams(&self) -> usize {
        self.state.lock().open
    }

    pub fn overlapping_opens(&self) -> usize {
        self.state.lock().overlapping_opens
    }

    pub fn records(&self) -> Vec<Record> {
        self.state.lock().records.clone()
    }

    pub fn count(&self, event: StreamEvent, id: &str) -> usize {
        let id = DeviceId::from(id);
        self.state
            .lock()
            .records
            .iter()
            .filter(|r| r.event == event && r.device == id)
            .count()
    }

    pub fn clear_records(&self) {
        self.state.lock().records.clear();
    }
}

impl AudioBackend for MockBackend {
    type Device = DeviceId;
    type Stream = MockStream;

    fn enumerate_active_render_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        Ok(self
            .state
            .lock()
            .present
            .iter()
            .map(|id| DeviceInfo {
                id: id.clone(),
                display_name: id.to_string(),
            })
            .collect())
    }

    fn resolve(&self, id: &DeviceId) -> Result<DeviceId, DeviceError> {
        if self.state.lock().present.contains(id) {
            Ok(id.clone())
        } else {
            Err(DeviceError::NotFound { id: id.clone() })
        }
    }

    fn open_silent_stream(
        &self,
        device: &DeviceId,
        _format: &SilenceFormat,
    ) -> Result<MockStream, StreamError> {
        let delay = self.state.lock().open_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock();
        if state.fail_open.contains(device) || !state.present.contains(device) {
            return Err(StreamError::Build {
                device: device.to_string(),
                reason: "device busy".to_string(),
            });
        }

        state.open += 1;
        let per_device = state.open_per_device.entry(device.clone()).or_insert(0);
        *per_device += 1;
        if *per_device > 1 {
            state.overlapping_opens += 1;
        }
        state.record(StreamEvent::Opened, device);
        Ok(MockStream {
            id: device.clone(),
            state: self.state.clone(),
            open: true,
        })
    }
}

pub struct MockStream {
    id: DeviceId,
    state: Arc<Mutex<MockState>>,
    open: bool,
}

impl SilentStream for MockStream {
    fn reassert(&self) -> Result<(), StreamError> {
        self.state.lock().record(StreamEvent::Nudged, &self.id);
        Ok(())
    }

    fn close(&mut self) -> Result<(), StreamError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        let mut state = self.state.lock();
        state.open -= 1;
        if let Some(per_device) = state.open_per_device.get_mut(&self.id) {
            *per_device -= 1;
        }
        state.record(StreamEvent::Closed, &self.id);
        if state.fail_close.contains(&self.id) {
            return Err(StreamError::WorkerGone {
                device: self.id.to_string(),
            });
        }
        Ok(())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[derive(Default)]
pub struct MemoryConfigStore {
    saved: Mutex<BTreeSet<DeviceId>>,
    saves: Mutex<usize>,
    fail_save: bool,
}

impl MemoryConfigStore {
    pub fn with_ids(ids: &[&str]) -> Self {
        Self {
            saved: Mutex::new(ids.iter().map(|id| DeviceId::from(*id)).collect()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_save: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> BTreeSet<DeviceId> {
        self.saved.lock().clone()
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> BTreeSet<DeviceId> {
        self.saved.lock().clone()
    }

    fn save(&self, ids: &BTreeSet<DeviceId>) -> Result<(), ConfigError> {
        *self.saves.lock() += 1;
        if self.fail_save {
            return Err(ConfigError::Io {
                path: "memory".into(),
                source: std::io::Error::other("read-only"),
            });
        }
        *self.saved.lock() = ids.clone();
        Ok(())
    }
}
