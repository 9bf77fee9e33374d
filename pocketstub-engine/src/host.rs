//! Host (desktop) device adapters.
//!
//! [`CpalSink`] plays the pump's 16-bit mono output through the default (or a
//! named) CPAL output device. The pump writes from the game loop; CPAL pulls
//! from its own audio thread, so the two meet in a bounded sample queue. The
//! device's native rate is matched by nearest-sample stepping, not by real
//! resampling.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use pocketstub_core::audio::{AudioDevice, Volume, WaveOutConfig};
use pocketstub_core::error::AudioError;

/// Samples the queue may hold before the oldest are dropped (in source-rate seconds).
const QUEUE_SECONDS: usize = 1;

struct Shared {
    queue: VecDeque<i16>,
    capacity: usize,
    gain: f32,
}

impl Shared {
    fn push(&mut self, samples: &[i16]) {
        let overflow = (self.queue.len() + samples.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            log::trace!("host sink dropping {overflow} stale samples");
            self.queue.drain(..overflow.min(self.queue.len()));
        }
        let skip = samples.len().saturating_sub(self.capacity);
        self.queue.extend(&samples[skip..]);
    }
}

fn gain_for(volume: Volume) -> f32 {
    f32::from(volume.level()) / f32::from(Volume::MAX.level())
}

/// Names of every output device on the default host.
pub fn list_output_devices() -> Result<Vec<String>, cpal::DevicesError> {
    let host = cpal::default_host();
    Ok(host.output_devices()?.filter_map(|d| d.name().ok()).collect())
}

/// CPAL-backed wave-out sink.
#[derive(Default)]
pub struct CpalSink {
    device_name: Option<String>,
    shared: Option<Arc<Mutex<Shared>>>,
}

/// Open CPAL stream; dropping it stops playback.
pub struct CpalStream {
    stream: cpal::Stream,
    shared: Arc<Mutex<Shared>>,
}

impl CpalSink {
    /// Sink on the default output device.
    pub fn new() -> Self { Self::default() }

    /// Sink on the output device called `name`.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self { device_name: Some(name.into()), shared: None }
    }

    fn pick_device(&self) -> Result<cpal::Device, AudioError> {
        let host = cpal::default_host();
        match &self.device_name {
            Some(name) => host
                .output_devices()
                .map_err(|_| AudioError::OpenFailed("cannot enumerate output devices"))?
                .find(|d| d.name().is_ok_and(|n| n == *name))
                .ok_or(AudioError::OpenFailed("requested output device not found")),
            None => host
                .default_output_device()
                .ok_or(AudioError::OpenFailed("no default output device")),
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    source_rate: u32,
    shared: Arc<Mutex<Shared>>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let channels = usize::from(config.channels).max(1);
    #[allow(clippy::cast_precision_loss)]
    let step = source_rate as f32 / config.sample_rate.0.max(1) as f32;
    let mut pos = 0.0f32;
    let mut current = 0i16;

    device.build_output_stream(
        config,
        move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
            let gain = shared.gain;
            for frame in output.chunks_mut(channels) {
                pos += step;
                while pos >= 1.0 {
                    pos -= 1.0;
                    // Underrun holds the last sample instead of clicking to zero.
                    if let Some(s) = shared.queue.pop_front() {
                        current = s;
                    }
                }
                let v = T::from_sample(f32::from(current) / 32_768.0 * gain);
                for ch in frame.iter_mut() {
                    *ch = v;
                }
            }
        },
        |e| log::error!("cpal stream error: {e}"),
        None,
    )
}

impl AudioDevice for CpalSink {
    type Handle = CpalStream;

    fn open(&mut self, wave: &WaveOutConfig) -> Result<CpalStream, AudioError> {
        let device = self.pick_device()?;
        let supported = device
            .default_output_config()
            .map_err(|_| AudioError::OpenFailed("no usable output config"))?;
        let format = supported.sample_format();
        let config = supported.config();

        let capacity = wave.sample_rate as usize * QUEUE_SECONDS;
        let shared = Arc::new(Mutex::new(Shared {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            gain: gain_for(wave.volume),
        }));

        let stream = match format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, wave.sample_rate, Arc::clone(&shared)),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, wave.sample_rate, Arc::clone(&shared)),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, wave.sample_rate, Arc::clone(&shared)),
            other => {
                log::error!("unsupported device sample format: {other:?}");
                return Err(AudioError::OpenFailed("unsupported device sample format"));
            }
        }
        .map_err(|_| AudioError::OpenFailed("cannot build output stream"))?;
        stream.play().map_err(|_| AudioError::OpenFailed("cannot start output stream"))?;

        log::info!(
            "cpal sink on {:?}: device {} Hz x{} ({:?}), source {} Hz",
            device.name().ok(),
            config.sample_rate.0,
            config.channels,
            format,
            wave.sample_rate
        );
        self.shared = Some(Arc::clone(&shared));
        Ok(CpalStream { stream, shared })
    }

    fn write(&mut self, handle: &mut CpalStream, samples: &[i16]) {
        handle.shared.lock().unwrap_or_else(PoisonError::into_inner).push(samples);
    }

    fn set_volume(&mut self, volume: Volume) {
        if let Some(shared) = &self.shared {
            shared.lock().unwrap_or_else(PoisonError::into_inner).gain = gain_for(volume);
        }
    }

    fn close(&mut self, handle: CpalStream) {
        if let Err(e) = handle.stream.pause() {
            log::warn!("cpal pause on close failed: {e}");
        }
        self.shared = None;
    }
}
