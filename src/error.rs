// Error types for device resolution, silent streams, config, startup and power
use std::path::PathBuf;

use thiserror::Error;

use crate::audio::DeviceId;

/// Failure to enumerate or resolve render devices
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("audio device not found: {id}")]
    NotFound { id: DeviceId },

    #[error("failed to enumerate output devices: {reason}")]
    Enumerate { reason: String },
}

/// Failure to open or drive a silent stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("no usable output config on {device}: {reason}")]
    NoSupportedConfig { device: String, reason: String },

    #[error("unsupported sample format on {device}: {format}")]
    UnsupportedFormat { device: String, format: String },

    #[error("failed to build output stream on {device}: {reason}")]
    Build { device: String, reason: String },

    #[error("failed to play output stream on {device}: {reason}")]
    Play { device: String, reason: String },

    #[error("output stream on {device} reported an error since it was opened")]
    Faulted { device: String },

    #[error("stream worker for {device} exited")]
    WorkerGone { device: String },

    #[error("no stream open on {device}")]
    NotPlaying { device: String },
}

/// Why a target device is not currently being kept awake
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeepAliveError {
    #[error(transparent)]
    Resolve(#[from] DeviceError),

    #[error(transparent)]
    Start(#[from] StreamError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no per-user config directory available")]
    NoUserDir,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("start with login is disabled in portable mode")]
    PortableMode,

    #[error("start with login is not supported on this platform")]
    Unsupported,

    #[error("failed to update startup registration: {0}")]
    Registry(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PowerError {
    #[error("failed to register for resume notifications: code {code}")]
    Register { code: u32 },

    #[error("failed to spawn resume monitor thread: {0}")]
    Spawn(#[from] std::io::Error),
}
