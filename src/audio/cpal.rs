// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{error::Error, fmt, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use crate::{
    audio::{
        mixer::Mixer, thread_priority, Device as AudioDevice, Trigger, TriggerError,
        VOICE_QUEUE_SIZE,
    },
    config,
};

/// A small wrapper around a cpal::Device that owns a continuously running output
/// stream while open.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The stream configuration used when the output is opened.
    stream_config: cpal::StreamConfig,
    /// The sample format the device wants.
    sample_format: cpal::SampleFormat,
    /// Voice cap handed to the mixer.
    max_voices: usize,
    /// The running output, if open.
    output: Mutex<Option<Output>>,
}

/// A running output stream.
struct Output {
    /// Triggers for the audio callback.
    voice_tx: Sender<Trigger>,
    /// Dropping or signalling this tears the stream down.
    shutdown_tx: Sender<()>,
    /// The thread that owns the stream.
    output_thread: thread::JoinHandle<()>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Builds the output stream. The callback drains pending triggers into the mixer
/// and renders one buffer. It never blocks.
fn build_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut mixer: Mixer,
    voice_rx: Receiver<Trigger>,
) -> Result<cpal::Stream, Box<dyn Error>>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let priority = thread_priority::realtime_priority();
    let rt = thread_priority::rt_enabled();
    let mut priority_set = false;
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        stream_config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            thread_priority::configure_callback_priority(priority, rt, &mut priority_set);

            while let Ok(trigger) = voice_rx.try_recv() {
                mixer.add(trigger);
            }

            if scratch.len() != data.len() {
                scratch.resize(data.len(), 0.0);
            }
            mixer.mix_into(&mut scratch);
            for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(*src);
            }
        },
        |err| error!(err = %err, "CPAL output stream error"),
        None,
    )?;
    Ok(stream)
}

fn build_stream_for_format(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: Mixer,
    voice_rx: Receiver<Trigger>,
) -> Result<cpal::Stream, Box<dyn Error>> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, stream_config, mixer, voice_rx),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, stream_config, mixer, voice_rx),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, stream_config, mixer, voice_rx),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, stream_config, mixer, voice_rx),
        other => Err(format!("unsupported sample format {:?}", other).into()),
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that can output audio.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                if let Some(device) = Device::from_cpal(host_id, device) {
                    devices.push(device);
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Wraps a cpal device, or returns None if it has no usable output.
    fn from_cpal(host_id: cpal::HostId, device: cpal::Device) -> Option<Device> {
        let max_channels = device
            .supported_output_configs()
            .ok()?
            .map(|output_config| output_config.channels())
            .max()
            .unwrap_or(0);
        if max_channels == 0 {
            return None;
        }

        let default_config = device.default_output_config().ok()?;
        let name = device.name().ok()?;

        Some(Device {
            name,
            max_channels,
            host_id,
            sample_format: default_config.sample_format(),
            stream_config: default_config.config(),
            device,
            max_voices: config::DEFAULT_MAX_VOICES,
            output: Mutex::new(None),
        })
    }

    /// Gets the given cpal device. `default` picks the default output of the
    /// default host.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let device = if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device")?;
            Device::from_cpal(host.id(), device)
        } else {
            Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
        };

        match device {
            Some(mut device) => {
                if let Some(sample_rate) = config.sample_rate() {
                    device.stream_config.sample_rate = sample_rate;
                }
                device.max_voices = config.max_voices();
                Ok(device)
            }
            None => Err(format!("no device found with name {}", name).into()),
        }
    }
}

impl AudioDevice for Device {
    fn open(&self) -> Result<(), Box<dyn Error>> {
        let mut output = self.output.lock();
        if output.is_some() {
            return Ok(());
        }

        let (voice_tx, voice_rx) = crossbeam_channel::bounded::<Trigger>(VOICE_QUEUE_SIZE);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        let device = self.device.clone();
        let stream_config = self.stream_config.clone();
        let sample_format = self.sample_format;
        let mixer = Mixer::new(stream_config.channels, self.max_voices);
        let name = self.name.clone();

        // cpal streams can't move between threads on every host, so the stream is
        // created and kept alive on its own thread.
        let output_thread = thread::Builder::new()
            .name("tactus-audio".to_string())
            .spawn(move || {
                let span = span!(Level::INFO, "audio output (cpal)", device = name);
                let _enter = span.enter();

                let stream = match build_stream_for_format(
                    &device,
                    &stream_config,
                    sample_format,
                    mixer,
                    voice_rx,
                ) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }

                info!("CPAL output stream started");
                let _ = ready_tx.send(Ok(()));

                // Returns on close() or when the device is dropped.
                let _ = shutdown_rx.recv();
                drop(stream);
                info!("CPAL output stream stopped");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = output_thread.join();
                return Err(format!("unable to start output on {}: {}", self.name, e).into());
            }
            Err(_) => {
                let _ = output_thread.join();
                return Err(format!("output thread for {} exited early", self.name).into());
            }
        }

        *output = Some(Output {
            voice_tx,
            shutdown_tx,
            output_thread,
        });
        Ok(())
    }

    fn close(&self) {
        let Some(output) = self.output.lock().take() else {
            return;
        };

        let _ = output.shutdown_tx.send(());
        drop(output.voice_tx);
        if output.output_thread.join().is_err() {
            error!(device = self.name, "Audio output thread panicked");
        }
    }

    fn sample_rate(&self) -> u32 {
        self.stream_config.sample_rate
    }

    fn play(&self, trigger: Trigger) -> Result<(), TriggerError> {
        match self.output.lock().as_ref() {
            Some(output) => output.voice_tx.try_send(trigger).map_err(|e| match e {
                TrySendError::Full(_) => TriggerError::QueueFull,
                TrySendError::Disconnected(_) => TriggerError::Closed,
            }),
            None => Err(TriggerError::Closed),
        }
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<std::sync::Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.close();
    }
}
