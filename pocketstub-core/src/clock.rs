//! Monotonic millisecond clock over a wrapping hardware tick counter.
//!
//! The handheld exposes a free-running 32-bit tick counter and its fixed
//! frequency. [`Clock`] turns that into milliseconds since construction that
//! never decrease, folding whole seconds into an accumulator as the raw
//! counter advances.
//!
//! Freshness: at most one second is folded per [`Clock::timestamp`] call and the
//! tick difference is taken with wrapping arithmetic, so the clock must be read
//! at least once per full counter wrap (2^32 ticks). A longer gap is not
//! detected and makes the timestamp lag by a whole wrap.

use cfg_if::cfg_if;

/// Device clock contract: a wrapping tick counter plus its fixed frequency.
pub trait TickSource {
    /// Current raw counter value. Wraps at `u32::MAX`.
    fn ticks(&self) -> u32;

    /// Counter frequency in ticks per second. Must be non-zero.
    fn ticks_per_second(&self) -> u32;
}

impl<T: TickSource + ?Sized> TickSource for &T {
    #[inline]
    fn ticks(&self) -> u32 { (**self).ticks() }
    #[inline]
    fn ticks_per_second(&self) -> u32 { (**self).ticks_per_second() }
}

/// Folded clock state: the counter value the current second started at, and
/// the milliseconds folded in from earlier seconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockState {
    pub tick_base: u32,
    pub accumulated_ms: u64,
}

/// Monotonic millisecond clock owning its tick source.
#[derive(Debug)]
pub struct Clock<S: TickSource> {
    source: S,
    state: ClockState,
}

impl<S: TickSource> Clock<S> {
    /// Start the clock at zero, based on the counter's current value.
    pub fn new(source: S) -> Self {
        let tick_base = source.ticks();
        log::debug!("clock started at tick {tick_base} ({} Hz)", source.ticks_per_second());
        Self { source, state: ClockState { tick_base, accumulated_ms: 0 } }
    }

    /// Milliseconds since [`Clock::new`]; never decreases while the freshness
    /// requirement in the module docs holds.
    pub fn timestamp(&mut self) -> u64 {
        let tps = self.source.ticks_per_second().max(1);
        let mut delta = self.source.ticks().wrapping_sub(self.state.tick_base);
        if delta > tps {
            delta -= tps;
            self.state.tick_base = self.state.tick_base.wrapping_add(tps);
            self.state.accumulated_ms += 1000;
        }
        u64::from(delta) * 1000 / u64::from(tps) + self.state.accumulated_ms
    }

    /// Raw counter value, unfolded.
    #[inline]
    pub fn raw_ticks(&self) -> u32 { self.source.ticks() }

    #[inline]
    pub fn state(&self) -> ClockState { self.state }

    #[inline]
    pub fn source(&self) -> &S { &self.source }
}

cfg_if! {
    if #[cfg(feature = "std")] {
        use std::time::Instant;

        /// Host tick source: microseconds since creation, truncated to `u32`
        /// (wraps roughly every 71.6 minutes like a real device counter).
        #[derive(Debug, Clone, Copy)]
        pub struct StdTicks {
            origin: Instant,
        }

        impl StdTicks {
            pub fn new() -> Self { Self { origin: Instant::now() } }
        }

        impl Default for StdTicks {
            fn default() -> Self { Self::new() }
        }

        impl TickSource for StdTicks {
            #[inline]
            #[allow(clippy::cast_possible_truncation)]
            fn ticks(&self) -> u32 { self.origin.elapsed().as_micros() as u32 }
            #[inline]
            fn ticks_per_second(&self) -> u32 { 1_000_000 }
        }
    }
}
