// Silent stream player
// One player per device; owns at most one open stream
use std::sync::Arc;

use tracing::{debug, info};

use super::{AudioBackend, DeviceId, SilenceFormat, SilentStream};
use crate::error::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Playing,
}

pub struct SilentPlayer<B: AudioBackend> {
    backend: Arc<B>,
    id: DeviceId,
    device: B::Device,
    format: SilenceFormat,
    stream: Option<B::Stream>,
}

impl<B: AudioBackend> SilentPlayer<B> {
    /// Create a stopped player bound to `device`
    pub fn new(backend: Arc<B>, id: DeviceId, device: B::Device, format: SilenceFormat) -> Self {
        Self {
            backend,
            id,
            device,
            format,
            stream: None,
        }
    }

    pub fn state(&self) -> PlayerState {
        if self.stream.is_some() {
            PlayerState::Playing
        } else {
            PlayerState::Stopped
        }
    }

    /// Open a silent stream on the captured device, closing any stream already open
    pub fn start(&mut self) -> Result<(), StreamError> {
        self.stop();

        let stream = self.backend.open_silent_stream(&self.device, &self.format)?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Release the stream if any. Teardown errors are swallowed.
    pub fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close() {
                debug!(device = %self.id, error = %e, "Ignoring error while closing stream");
            }
        }
    }

    pub fn restart(&mut self) -> Result<(), StreamError> {
        info!(device = %self.id, "Restarting silent stream");
        self.start()
    }

    /// Reassert playback without reopening the stream
    pub fn nudge(&self) -> Result<(), StreamError> {
        match &self.stream {
            Some(stream) => stream.reassert(),
            None => Err(StreamError::NotPlaying {
                device: self.id.to_string(),
            }),
        }
    }
}

impl<B: AudioBackend> Drop for SilentPlayer<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keepalive::mock::{MockBackend, StreamEvent};

    fn player(backend: &Arc<MockBackend>, id: &str) -> SilentPlayer<MockBackend> {
        let id = DeviceId::from(id);
        let device = backend.resolve(&id).unwrap();
        SilentPlayer::new(backend.clone(), id, device, SilenceFormat::default())
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let backend = Arc::new(MockBackend::with_devices(&["A"]));
        let mut player = player(&backend, "A");
        assert_eq!(player.state(), PlayerState::Stopped);

        player.start().unwrap();
        assert_eq!(player.state(), PlayerState::Playing);
        assert_eq!(backend.open_streams(), 1);

        player.stop();
        assert_eq!(player.state(), PlayerState::Stopped);
        assert_eq!(backend.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_start_twice_keeps_single_stream() {
        let backend = Arc::new(MockBackend::with_devices(&["A"]));
        let mut player = player(&backend, "A");

        player.start().unwrap();
        player.start().unwrap();
        assert_eq!(backend.open_streams(), 1);
        assert_eq!(backend.count(StreamEvent::Opened, "A"), 2);
        assert_eq!(backend.count(StreamEvent::Closed, "A"), 1);
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let backend = Arc::new(MockBackend::with_devices(&["A"]));
        let mut player = player(&backend, "A");

        player.stop();
        player.stop();
        assert_eq!(backend.count(StreamEvent::Closed, "A"), 0);
    }

    #[tokio::test]
    async fn test_stop_swallows_close_errors() {
        let backend = Arc::new(MockBackend::with_devices(&["A"]));
        backend.fail_close("A");
        let mut player = player(&backend, "A");

        player.start().unwrap();
        player.stop();
        assert_eq!(player.state(), PlayerState::Stopped);
    }

    #[tokio::test]
    async fn test_start_failure_leaves_player_stopped() {
        let backend = Arc::new(MockBackend::with_devices(&["A"]));
        let mut player = player(&backend, "A");
        backend.fail_open("A");

        assert!(player.start().is_err());
        assert_eq!(player.state(), PlayerState::Stopped);
    }

    #[tokio::test]
    async fn test_restart_reopens_stream() {
        let backend = Arc::new(MockBackend::with_devices(&["A"]));
        let mut player = player(&backend, "A");

        player.start().unwrap();
        player.restart().unwrap();
        assert_eq!(backend.count(StreamEvent::Opened, "A"), 2);
        assert_eq!(backend.open_streams(), 1);
    }

    #[tokio::test]
    async fn test_nudge_requires_stream() {
        let backend = Arc::new(MockBackend::with_devices(&["A"]));
        let mut player = player(&backend, "A");
        assert!(player.nudge().is_err());

        player.start().unwrap();
        assert!(player.nudge().is_ok());
        assert_eq!(backend.count(StreamEvent::Nudged, "A"), 1);
        assert_eq!(backend.count(StreamEvent::Opened, "A"), 1);
    }

    #[tokio::test]
    async fn test_drop_stops_stream() {
        let backend = Arc::new(MockBackend::with_devices(&["A"]));
        {
            let mut player = player(&backend, "A");
            player.start().unwrap();
            assert_eq!(backend.open_streams(), 1);
        }
        assert_eq!(backend.open_streams(), 0);
    }
}
