// Audio output using cpal
// Every silent stream lives on its own worker thread since cpal::Stream is not Send

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use tracing::{debug, info, warn};

use super::{AudioBackend, DeviceId, DeviceInfo, SilenceFormat, SilentStream};
use crate::error::{DeviceError, StreamError};

/// Registry and stream factory over the default cpal host (WASAPI on Windows)
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }

    fn output_devices() -> Result<cpal::OutputDevices<cpal::Devices>, DeviceError> {
        cpal::default_host()
            .output_devices()
            .map_err(|e| DeviceError::Enumerate {
                reason: e.to_string(),
            })
    }

    /// Output devices in host order with their ids and display names
    fn named_devices() -> Result<Vec<(DeviceId, String, cpal::Device)>, DeviceError> {
        let (names, devices): (Vec<String>, Vec<cpal::Device>) = Self::output_devices()?
            .filter_map(|device| match device.name() {
                Ok(name) => Some((name, device)),
                Err(e) => {
                    debug!(error = %e, "Skipping output device without a name");
                    None
                }
            })
            .unzip();

        Ok(assign_ids(&names)
            .into_iter()
            .zip(devices)
            .map(|((id, display_name), device)| (id, display_name, device))
            .collect())
    }
}

/// Name each endpoint uniquely. The first endpoint with a given name uses the name itself;
/// later ones get `#2`, `#3`, ... in host order, skipping anything already taken.
pub(crate) fn assign_ids(names: &[String]) -> Vec<(DeviceId, String)> {
    let mut taken: HashSet<String> = names.iter().cloned().collect();
    let mut seen: HashSet<&str> = HashSet::new();

    names
        .iter()
        .map(|name| {
            if seen.insert(name.as_str()) {
                return (DeviceId::new(name.clone()), name.clone());
            }

            let mut n = 2;
            let mut id = format!("{}#{}", name, n);
            while taken.contains(&id) {
                n += 1;
                id = format!("{}#{}", name, n);
            }
            taken.insert(id.clone());
            (DeviceId::new(id), format!("{} ({})", name, n))
        })
        .collect()
}

impl AudioBackend for CpalBackend {
    type Device = cpal::Device;
    type Stream = CpalSilentStream;

    fn enumerate_active_render_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        let mut devices: Vec<DeviceInfo> = Self::named_devices()?
            .into_iter()
            .map(|(id, display_name, _)| DeviceInfo { id, display_name })
            .collect();

        devices.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(devices)
    }

    fn resolve(&self, id: &DeviceId) -> Result<cpal::Device, DeviceError> {
        Self::named_devices()?
            .into_iter()
            .find(|(candidate, _, _)| candidate == id)
            .map(|(_, _, device)| device)
            .ok_or_else(|| DeviceError::NotFound { id: id.clone() })
    }

    fn open_silent_stream(
        &self,
        device: &cpal::Device,
        format: &SilenceFormat,
    ) -> Result<CpalSilentStream, StreamError> {
        let name = device
            .name()
            .unwrap_or_else(|_| "unknown device".to_string());
        let faulted = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (commands, command_rx) = mpsc::channel();

        let worker = {
            let device = device.clone();
            let format = *format;
            let worker_name = name.clone();
            let faulted = faulted.clone();
            thread::Builder::new()
                .name(format!("silence-{}", name))
                .spawn(move || {
                    run_worker(device, worker_name, format, faulted, ready_tx, command_rx)
                })
                .map_err(|e| StreamError::Build {
                    device: name.clone(),
                    reason: e.to_string(),
                })?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(device = %name, "Started silent stream");
                Ok(CpalSilentStream {
                    device: name,
                    commands,
                    worker: Some(worker),
                    faulted,
                })
            }
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                let _ = worker.join();
                Err(StreamError::WorkerGone { device: name })
            }
        }
    }
}

enum StreamCommand {
    Reassert,
    Close,
}

/// Handle to a silent stream running on its worker thread
pub struct CpalSilentStream {
    device: String,
    commands: mpsc::Sender<StreamCommand>,
    worker: Option<JoinHandle<()>>,
    faulted: Arc<AtomicBool>,
}

impl CpalSilentStream {
    /// True once the host reported a stream error (device unplugged, invalidated, ...)
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }
}

impl SilentStream for CpalSilentStream {
    fn reassert(&self) -> Result<(), StreamError> {
        if self.worker.is_none() {
            return Err(StreamError::NotPlaying {
                device: self.device.clone(),
            });
        }

        self.commands
            .send(StreamCommand::Reassert)
            .map_err(|_| StreamError::WorkerGone {
                device: self.device.clone(),
            })?;

        if self.is_faulted() {
            return Err(StreamError::Faulted {
                device: self.device.clone(),
            });
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), StreamError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        // The worker also exits when the sender is gone, so a failed send is fine
        let _ = self.commands.send(StreamCommand::Close);
        worker.join().map_err(|_| StreamError::WorkerGone {
            device: self.device.clone(),
        })
    }
}

impl Drop for CpalSilentStream {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn run_worker(
    device: cpal::Device,
    name: String,
    format: SilenceFormat,
    faulted: Arc<AtomicBool>,
    ready: mpsc::SyncSender<Result<(), StreamError>>,
    commands: mpsc::Receiver<StreamCommand>,
) {
    let stream = match open_stream(&device, &name, &format, faulted.clone()) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(StreamError::Play {
            device: name,
            reason: e.to_string(),
        }));
        return;
    }

    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Ok(command) = commands.recv() {
        match command {
            StreamCommand::Reassert => {
                if let Err(e) = stream.play() {
                    debug!(device = %name, error = %e, "Reasserting playback failed");
                    faulted.store(true, Ordering::SeqCst);
                }
            }
            StreamCommand::Close => break,
        }
    }

    if let Err(e) = stream.pause() {
        debug!(device = %name, error = %e, "Pausing stream before release failed");
    }
    drop(stream);
    debug!(device = %name, "Released silent stream");
}

fn open_stream(
    device: &cpal::Device,
    name: &str,
    format: &SilenceFormat,
    faulted: Arc<AtomicBool>,
) -> Result<Stream, StreamError> {
    let (config, sample_format) = select_config(device, name, format)?;

    match sample_format {
        SampleFormat::F32 => build_stream::<f32>(device, &config, name, faulted),
        SampleFormat::I16 => build_stream::<i16>(device, &config, name, faulted),
        SampleFormat::U16 => build_stream::<u16>(device, &config, name, faulted),
        SampleFormat::I32 => build_stream::<i32>(device, &config, name, faulted),
        other => Err(StreamError::UnsupportedFormat {
            device: name.to_string(),
            format: format!("{:?}", other),
        }),
    }
}

/// Prefer f32 at the requested rate/channels, otherwise take the device mix format
fn select_config(
    device: &cpal::Device,
    name: &str,
    format: &SilenceFormat,
) -> Result<(StreamConfig, SampleFormat), StreamError> {
    let preferred = device
        .supported_output_configs()
        .ok()
        .and_then(|mut ranges| {
            ranges.find(|range| {
                range.channels() == format.channels
                    && range.sample_format() == SampleFormat::F32
                    && range.min_sample_rate().0 <= format.sample_rate
                    && format.sample_rate <= range.max_sample_rate().0
            })
        })
        .map(|range| range.with_sample_rate(cpal::SampleRate(format.sample_rate)));

    if let Some(config) = preferred {
        return Ok((config.config(), config.sample_format()));
    }

    let fallback = device
        .default_output_config()
        .map_err(|e| StreamError::NoSupportedConfig {
            device: name.to_string(),
            reason: e.to_string(),
        })?;
    debug!(
        device = %name,
        sample_rate = fallback.sample_rate().0,
        channels = fallback.channels(),
        "Requested silence format unsupported, using device default"
    );
    Ok((fallback.config(), fallback.sample_format()))
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &StreamConfig,
    name: &str,
    faulted: Arc<AtomicBool>,
) -> Result<Stream, StreamError> {
    let error_name = name.to_string();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    *sample = T::from_sample(0.0f32);
                }
            },
            move |err| {
                faulted.store(true, Ordering::SeqCst);
                warn!(device = %error_name, error = %err, "Silent stream error");
            },
            None,
        )
        .map_err(|e| StreamError::Build {
            device: name.to_string(),
            reason: e.to_string(),
        })
}
