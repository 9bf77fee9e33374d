//! Pull-based audio pump.
//!
//! Once per frame the pump asks the engine for as many signed 8-bit samples
//! as the elapsed time covers at the output rate, widens them to the device's
//! signed 16-bit format and writes them to the wave-out sink.
//!
//! - Demand above [`MAX_PUMP_SAMPLES`] is clamped; the excess is dropped, not queued.
//! - Volume changes are applied lazily: the device only hears about a new level
//!   on the next pump, and never twice for the same level.
//! - Pumping with no sink open is a no-op.

use crate::error::AudioError;

/// Largest number of samples moved by a single [`AudioPump::pump`] call
/// (about 0.74 s at 22050 Hz).
pub const MAX_PUMP_SAMPLES: usize = 16_384;

/// Output rate of the handheld wave-out device.
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

// --------------------------------- Volume ---------------------------------------

/// Device volume level in `0..=30`, moved in steps of 5.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Volume(u8);

/// One press of a volume button.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VolumeStep { Up, Down }

impl Volume {
    pub const MIN: Volume = Volume(0);
    pub const MAX: Volume = Volume(30);
    pub const STEP: u8 = 5;

    /// Clamp `level` into range and round it to the nearest step.
    #[inline]
    pub fn new(level: u8) -> Self {
        let level = level.min(Self::MAX.0);
        Self((level + Self::STEP / 2) / Self::STEP * Self::STEP)
    }

    #[inline]
    pub fn level(self) -> u8 { self.0 }

    /// Apply one step, saturating at the ends of the range.
    #[inline]
    #[must_use]
    pub fn step(self, step: VolumeStep) -> Self {
        match step {
            VolumeStep::Up => Self::new(self.0.saturating_add(Self::STEP)),
            VolumeStep::Down => Self(self.0.saturating_sub(Self::STEP)),
        }
    }
}

impl Default for Volume {
    fn default() -> Self { Self(15) }
}

// ------------------------------ Device contracts ---------------------------------

/// Engine pull callback: fill `out` completely with signed 8-bit samples.
/// Must not block.
pub trait AudioSource {
    fn fill(&mut self, out: &mut [i8]);
}

impl<F: FnMut(&mut [i8])> AudioSource for F {
    #[inline]
    fn fill(&mut self, out: &mut [i8]) { self(out) }
}

/// Parameters handed to [`AudioDevice::open`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WaveOutConfig {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
    pub volume: Volume,
}

/// Wave-out sink of the device.
///
/// `close` takes the handle by value, so a sink can be closed only once.
pub trait AudioDevice {
    type Handle;

    fn open(&mut self, config: &WaveOutConfig) -> Result<Self::Handle, AudioError>;
    fn write(&mut self, handle: &mut Self::Handle, samples: &[i16]);
    fn set_volume(&mut self, volume: Volume);
    fn close(&mut self, handle: Self::Handle);
}

// --------------------------------- Conversion -----------------------------------

/// Widen signed 8-bit samples to signed 16-bit (`x * 256`), sample by sample.
/// Converts `min(src.len(), dst.len())` samples.
#[inline]
pub fn convert_s8_to_s16(src: &[i8], dst: &mut [i16]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = i16::from(*s) * 256;
    }
}

// ----------------------------------- Pump ----------------------------------------

struct ActiveSink<H, S> {
    handle: H,
    source: S,
}

/// Per-frame audio puller owning the device and, while started, the engine source.
pub struct AudioPump<D: AudioDevice, S: AudioSource> {
    device: D,
    sink: Option<ActiveSink<D::Handle, S>>,
    sample_rate: u32,
    volume: Volume,
    applied_volume: Option<Volume>,
    raw: [i8; MAX_PUMP_SAMPLES],
    wide: [i16; MAX_PUMP_SAMPLES],
}

impl<D: AudioDevice, S: AudioSource> AudioPump<D, S> {
    pub fn new(device: D, sample_rate: u32, volume: Volume) -> Self {
        Self {
            device,
            sink: None,
            sample_rate,
            volume,
            applied_volume: None,
            raw: [0; MAX_PUMP_SAMPLES],
            wide: [0; MAX_PUMP_SAMPLES],
        }
    }

    /// Open the sink (16-bit mono at the configured rate, current volume) and
    /// start pulling from `source`.
    pub fn start(&mut self, source: S) -> Result<(), AudioError> {
        if self.sink.is_some() {
            return Err(AudioError::AlreadyStarted);
        }
        let config = WaveOutConfig {
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            channels: 1,
            volume: self.volume,
        };
        let handle = self.device.open(&config)?;
        self.applied_volume = Some(self.volume);
        self.sink = Some(ActiveSink { handle, source });
        log::debug!("audio started: {} Hz, volume {}", self.sample_rate, self.volume.level());
        Ok(())
    }

    /// Close the sink and give the source back. No-op when not started.
    pub fn stop(&mut self) -> Option<S> {
        let ActiveSink { handle, source } = self.sink.take()?;
        self.device.close(handle);
        log::debug!("audio stopped");
        Some(source)
    }

    /// Pull, convert and write the audio covering `delta_ms`.
    ///
    /// Returns the number of samples written (0 when idle).
    pub fn pump(&mut self, delta_ms: u32) -> usize {
        let Some(sink) = self.sink.as_mut() else { return 0 };
        if delta_ms == 0 {
            return 0;
        }
        let wanted = u64::from(delta_ms) * u64::from(self.sample_rate) / 1000;
        let count = usize::try_from(wanted).map_or(MAX_PUMP_SAMPLES, |n| n.min(MAX_PUMP_SAMPLES));
        if wanted > count as u64 {
            log::trace!("audio demand {wanted} clamped to {count} samples");
        }
        if count == 0 {
            return 0;
        }

        let raw = &mut self.raw[..count];
        sink.source.fill(raw);
        let wide = &mut self.wide[..count];
        convert_s8_to_s16(raw, wide);

        if self.applied_volume != Some(self.volume) {
            self.device.set_volume(self.volume);
            self.applied_volume = Some(self.volume);
        }
        self.device.write(&mut sink.handle, wide);
        count
    }

    #[inline] pub fn is_active(&self) -> bool { self.sink.is_some() }
    #[inline] pub fn sample_rate(&self) -> u32 { self.sample_rate }
    #[inline] pub fn volume(&self) -> Volume { self.volume }

    /// Change the volume; the device is updated on the next pump.
    #[inline]
    pub fn set_volume(&mut self, volume: Volume) { self.volume = volume; }

    #[inline]
    pub fn step_volume(&mut self, step: VolumeStep) -> Volume {
        self.volume = self.volume.step(step);
        self.volume
    }

    #[inline] pub fn device(&self) -> &D { &self.device }
    #[inline] pub fn device_mut(&mut self) -> &mut D { &mut self.device }
}

impl<D: AudioDevice, S: AudioSource> core::fmt::Debug for AudioPump<D, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AudioPump")
            .field("active", &self.is_active())
            .field("sample_rate", &self.sample_rate)
            .field("volume", &self.volume)
            .finish_non_exhaustive()
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingDevice {
        opened: Vec<WaveOutConfig>,
        writes: Vec<Vec<i16>>,
        volumes: Vec<Volume>,
        closed: usize,
    }

    impl AudioDevice for RecordingDevice {
        type Handle = u32;

        fn open(&mut self, config: &WaveOutConfig) -> Result<u32, AudioError> {
            self.opened.push(*config);
            Ok(7)
        }
        fn write(&mut self, handle: &mut u32, samples: &[i16]) {
            assert_eq!(*handle, 7);
            self.writes.push(samples.to_vec());
        }
        fn set_volume(&mut self, volume: Volume) { self.volumes.push(volume); }
        fn close(&mut self, _: u32) { self.closed += 1; }
    }

    type Source = fn(&mut [i8]);

    fn ramp(out: &mut [i8]) {
        for (i, s) in out.iter_mut().enumerate() {
            *s = (i % 256) as u8 as i8;
        }
    }

    fn pump() -> Box<AudioPump<RecordingDevice, Source>> {
        Box::new(AudioPump::new(RecordingDevice::default(), DEFAULT_SAMPLE_RATE, Volume::default()))
    }

    #[test]
    fn idle_pump_is_a_no_op() {
        let mut p = pump();
        assert_eq!(p.pump(100), 0);
        assert!(p.device().writes.is_empty());
    }

    #[test]
    fn opens_sixteen_bit_mono() {
        let mut p = pump();
        p.start(ramp).unwrap();
        assert_eq!(
            p.device().opened,
            [WaveOutConfig { sample_rate: 22_050, bits_per_sample: 16, channels: 1, volume: Volume::new(15) }]
        );
        assert_eq!(p.start(ramp).err(), Some(AudioError::AlreadyStarted));
    }

    #[test]
    fn sample_count_follows_elapsed_time() {
        let mut p = pump();
        p.start(ramp).unwrap();
        assert_eq!(p.pump(20), 441);
        assert_eq!(p.pump(0), 0);
        assert_eq!(p.device().writes.len(), 1);
        assert_eq!(p.device().writes[0].len(), 441);
    }

    #[test]
    fn demand_is_clamped_to_capacity() {
        let mut p = pump();
        p.start(ramp).unwrap();
        assert_eq!(p.pump(1000), MAX_PUMP_SAMPLES);
        assert_eq!(p.device().writes[0].len(), 16_384);
    }

    #[test]
    fn conversion_scales_by_256() {
        let src = [0i8, 1, -1, 127, -128];
        let mut dst = [0i16; 5];
        convert_s8_to_s16(&src, &mut dst);
        assert_eq!(dst, [0, 256, -256, 32_512, -32_768]);
    }

    #[test]
    fn volume_is_applied_once_per_change() {
        let mut p = pump();
        p.start(ramp).unwrap();
        p.pump(10);
        p.pump(10);
        assert!(p.device().volumes.is_empty(), "open already carried the level");

        p.step_volume(VolumeStep::Up);
        p.pump(10);
        p.pump(10);
        assert_eq!(p.device().volumes, [Volume::new(20)]);

        p.device_mut().volumes.clear();
        p.set_volume(Volume::new(20));
        p.pump(10);
        assert!(p.device().volumes.is_empty(), "same level is not re-sent");
    }

    #[test]
    fn off_grid_levels_snap_to_a_step() {
        assert_eq!(Volume::new(7).level(), 5);
        assert_eq!(Volume::new(8).level(), 10);
        assert_eq!(Volume::new(29).level(), 30);
        let mut v = Volume::new(7);
        for _ in 0..3 {
            v = v.step(VolumeStep::Up);
            assert_eq!(v.level() % Volume::STEP, 0);
        }
        assert_eq!(v, Volume::new(20));
    }

    #[test]
    fn stop_closes_exactly_once() {
        let mut p = pump();
        p.start(ramp).unwrap();
        assert!(p.stop().is_some());
        assert!(p.stop().is_none());
        assert_eq!(p.device().closed, 1);
        assert_eq!(p.pump(100), 0);
    }

    #[test]
    fn volume_clamps_at_both_ends() {
        let mut v = Volume::new(25);
        v = v.step(VolumeStep::Up).step(VolumeStep::Up);
        assert_eq!(v, Volume::MAX);
        let mut v = Volume::new(5);
        v = v.step(VolumeStep::Down).step(VolumeStep::Down);
        assert_eq!(v, Volume::MIN);
        assert_eq!(Volume::new(99), Volume::MAX);
    }
}
