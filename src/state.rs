// Application state management
// Built once at startup, torn down once at exit
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::audio::{AudioBackend, CpalBackend};
use crate::keepalive::{KeepAliveController, KeepAliveSettings};
use crate::power::{self, ResumeSubscription};
use crate::settings::{ConfigLocation, JsonConfigStore};
use crate::startup::StartupRegistration;

pub struct AppState<B: AudioBackend = CpalBackend> {
    pub controller: KeepAliveController<B>,
    pub location: ConfigLocation,
    pub startup: StartupRegistration,
    resume: Mutex<Option<ResumeSubscription>>,
}

impl AppState<CpalBackend> {
    pub fn new(location: ConfigLocation, settings: KeepAliveSettings, runtime: Handle) -> Result<Self> {
        Self::with_backend(Arc::new(CpalBackend::new()), location, settings, runtime)
    }
}

impl<B: AudioBackend> AppState<B> {
    /// Load the selection, start the streams, the health timer and resume handling
    pub fn with_backend(
        backend: Arc<B>,
        location: ConfigLocation,
        settings: KeepAliveSettings,
        runtime: Handle,
    ) -> Result<Self> {
        location
            .ensure_dir()
            .context("Failed to create config directory")?;

        let store = Arc::new(JsonConfigStore::in_dir(&location.dir));
        let controller = KeepAliveController::new(backend, store, settings, runtime);

        let report = controller.reconcile();
        info!(
            started = report.started.len(),
            failed = report.failed.len(),
            "Initial device reconcile"
        );
        controller.start_health_check();

        let on_resume = controller.clone();
        let resume = match power::subscribe(Arc::new(move || on_resume.on_system_resume())) {
            Ok(subscription) => {
                info!(source = subscription.source(), "Resume handling active");
                Some(subscription)
            }
            Err(e) => {
                warn!(error = %e, "Resume handling unavailable");
                None
            }
        };

        Ok(Self {
            controller,
            startup: StartupRegistration::new(location.portable),
            location,
            resume: Mutex::new(resume),
        })
    }

    /// Unsubscribe from resume notifications and stop every stream
    pub fn shutdown(&self) {
        if let Some(subscription) = self.resume.lock().take() {
            drop(subscription);
        }
        self.controller.shutdown();
    }

    pub fn about_text(&self) -> String {
        let status = self.controller.status();
        let last_resume = status
            .last_resume
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "none".to_string());

        format!(
            "AudioPopFix\n\n\
             Keeps selected audio devices awake by playing silence.\n\n\
             Config: {}\n\
             Portable Mode: {}\n\
             Active devices: {} of {}\n\
             Last resume: {}\n\n\
             Resume handling: auto-kick streams on wake from sleep/hibernate.",
            self.location.config_file().display(),
            self.location.portable,
            status.active.len(),
            status.targets.len(),
            last_resume,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keepalive::mock::MockBackend;
    use crate::settings::{ConfigStore, JsonConfigStore};

    fn location(dir: &std::path::Path) -> ConfigLocation {
        ConfigLocation {
            dir: dir.to_path_buf(),
            portable: true,
        }
    }

    #[tokio::test]
    async fn test_starts_saved_selection() {
        let dir = tempfile::tempdir().unwrap();
        let ids = ["A", "B"].into_iter().map(Into::into).collect();
        JsonConfigStore::in_dir(dir.path()).save(&ids).unwrap();

        let backend = Arc::new(MockBackend::with_devices(&["A", "B"]));
        let state = AppState::with_backend(
            backend.clone(),
            location(dir.path()),
            KeepAliveSettings::default(),
            Handle::current(),
        )
        .unwrap();

        assert_eq!(state.controller.active_devices(), ids);
        assert_eq!(backend.open_streams(), 2);

        state.shutdown();
        state.shutdown();
        assert_eq!(backend.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_about_text_shows_location() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::default());
        let state = AppState::with_backend(
            backend,
            location(dir.path()),
            KeepAliveSettings::default(),
            Handle::current(),
        )
        .unwrap();

        let text = state.about_text();
        assert!(text.contains("config.json"));
        assert!(text.contains("Portable Mode: true"));
        assert!(text.contains("Active devices: 0 of 0"));
        assert!(text.contains("Last resume: none"));
        state.shutdown();
    }
}
