// Audio output layer
// Device registry + silent stream seam, cpal implementation and the per-device player

pub mod output;
pub mod player;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, StreamError};

pub use output::CpalBackend;
pub use player::{PlayerState, SilentPlayer};

/// Opaque, stable name of one render endpoint. Compared by equality only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An active render device as shown in a picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub display_name: String,
}

/// Format of the generated silence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for SilenceFormat {
    /// 48k stereo, the most common shared-mode mix format
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

/// Device registry plus stream factory for one audio host.
///
/// `Device` is a transient handle obtained from [`resolve`](Self::resolve); the player keeps
/// it so a restart can reopen the same endpoint.
pub trait AudioBackend: Send + Sync + 'static {
    type Device: Clone + Send + 'static;
    type Stream: SilentStream;

    /// Active render devices, sorted by display name
    fn enumerate_active_render_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError>;

    fn resolve(&self, id: &DeviceId) -> Result<Self::Device, DeviceError>;

    /// Open a shared-mode stream emitting silence and start playback
    fn open_silent_stream(
        &self,
        device: &Self::Device,
        format: &SilenceFormat,
    ) -> Result<Self::Stream, StreamError>;
}

/// A live silent output stream. Dropping it releases the OS resources.
pub trait SilentStream: Send + 'static {
    /// Re-issue "play" without rebuilding the stream
    fn reassert(&self) -> Result<(), StreamError>;

    /// Stop playback and release the stream. Safe to call more than once.
    fn close(&mut self) -> Result<(), StreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_serializes_as_plain_string() {
        let id = DeviceId::from("{0.0.0.00000000}.{guid}");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"{0.0.0.00000000}.{guid}\"");

        let back: DeviceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_default_silence_format() {
        let format = SilenceFormat::default();
        assert_eq!(format.sample_rate, 48_000);
        assert_eq!(format.channels, 2);
    }
}
