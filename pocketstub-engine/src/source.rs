//! Sample generators usable as the engine's audio pull callback.
//!
//! The real game fills the pump with its own mixer output. For host runs and
//! tests this module provides a small `Generator` trait (one float sample at
//! a time) and [`GeneratorSource`], which quantizes a generator to the signed
//! 8-bit samples the pump pulls.

use pocketstub_core::audio::AudioSource;

/// Anything that can generate one mono sample at a time in `[-1, 1]`.
pub trait Generator {
    /// Called before the first sample and whenever the output rate changes.
    fn reset(&mut self, sr: f32);

    /// Generate the next sample.
    fn next(&mut self) -> f32;
}

/// Oscillator waveform.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wave { Sine, Square, Saw }

/// Free-running oscillator. Not anti-aliased; fine for 8-bit beeps.
#[derive(Copy, Clone, Debug)]
pub struct Osc {
    phase: f32,   // [0,1)
    freq:  f32,   // Hz
    sr:    f32,
    wave:  Wave,
    gain:  f32,   // output gain (0..1)
}

impl Osc {
    #[inline] pub fn new(freq_hz: f32, wave: Wave) -> Self { Self { phase: 0.0, freq: freq_hz, sr: 22_050.0, wave, gain: 1.0 } }
    #[inline] pub fn set_freq(&mut self, hz: f32) { self.freq = hz.max(0.0); }
    #[inline] pub fn set_gain(&mut self, g: f32) { self.gain = g.clamp(0.0, 1.0); }
    #[inline] pub fn freq(&self) -> f32 { self.freq }
}

impl Generator for Osc {
    #[inline]
    fn reset(&mut self, sr: f32) { self.sr = sr.max(1.0); }

    #[inline]
    fn next(&mut self) -> f32 {
        let s = match self.wave {
            Wave::Sine => (core::f32::consts::TAU * self.phase).sin(),
            Wave::Square => if self.phase < 0.5 { 1.0 } else { -1.0 },
            Wave::Saw => 2.0 * self.phase - 1.0,
        };
        self.phase = (self.phase + self.freq / self.sr) % 1.0;
        s * self.gain
    }
}

/// Adapts a [`Generator`] to the pump's 8-bit pull contract.
#[derive(Debug)]
pub struct GeneratorSource<G: Generator> {
    gen: G,
}

impl<G: Generator> GeneratorSource<G> {
    /// Wrap `gen`, telling it the output rate.
    pub fn new(mut gen: G, sample_rate: u32) -> Self {
        #[allow(clippy::cast_precision_loss)]
        gen.reset(sample_rate as f32);
        Self { gen }
    }

    /// Mutable access for live parameter tweaks.
    #[inline]
    pub fn generator_mut(&mut self) -> &mut G { &mut self.gen }
}

impl<G: Generator> AudioSource for GeneratorSource<G> {
    fn fill(&mut self, out: &mut [i8]) {
        for s in out.iter_mut() {
            #[allow(clippy::cast_possible_truncation)]
            let q = (self.gen.next().clamp(-1.0, 1.0) * 127.0).round() as i8;
            *s = q;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_quantizes_to_full_scale() {
        // Eight samples per cycle.
        let mut src = GeneratorSource::new(Osc::new(2756.25, Wave::Square), 22_050);
        let mut buf = [0i8; 8];
        src.fill(&mut buf);
        assert_eq!(buf, [127, 127, 127, 127, -127, -127, -127, -127]);
    }

    #[test]
    fn gain_scales_output() {
        let mut osc = Osc::new(100.0, Wave::Square);
        osc.set_gain(0.5);
        let mut src = GeneratorSource::new(osc, 22_050);
        let mut buf = [0i8; 4];
        src.fill(&mut buf);
        assert!(buf.iter().all(|&s| s == 64));
    }

    #[test]
    fn retune_through_the_source() {
        let mut src = GeneratorSource::new(Osc::new(2756.25, Wave::Square), 22_050);
        src.generator_mut().set_freq(-5.0);
        assert_eq!(src.generator_mut().freq(), 0.0);
        // A stopped oscillator holds its phase.
        let mut buf = [0i8; 16];
        src.fill(&mut buf);
        assert!(buf.iter().all(|&s| s == 127));
    }
}
