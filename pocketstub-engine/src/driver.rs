//! Frame driver: keeps timer-driven game logic in step with wall-clock time.
//!
//! The engine calls [`FrameDriver::advance`] once per rendered frame with the
//! frame's duration. The driver adds it to the game-time accumulator, pumps
//! one frame of audio, then scans the timer table until the clock has caught
//! up with game time. Callers that must not spin can use [`FrameDriver::begin`]
//! and [`FrameDriver::step`] instead and decide themselves what to do between
//! steps.

use pocketstub_core::audio::{AudioDevice, AudioPump, AudioSource};
use pocketstub_core::clock::{Clock, TickSource};
use pocketstub_core::timers::{FireReport, TimerCallback, TimerTable};

/// What one [`FrameDriver::advance`] call did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Audio samples written this frame.
    pub samples: usize,
    /// Timer-table scans performed before catching up.
    pub scans: u32,
    /// Callbacks fired across all scans.
    pub fired: usize,
}

/// Logical game-time accumulator and catch-up loop.
#[derive(Copy, Clone, Debug, Default)]
pub struct FrameDriver {
    game_time: u64,
}

impl FrameDriver {
    pub fn new() -> Self { Self::default() }

    /// Sum of every delta passed to [`begin`](Self::begin) so far, in ms.
    #[inline]
    pub fn game_time(&self) -> u64 { self.game_time }

    /// Start a frame: accumulate `delta_ms` and pump its audio exactly once.
    pub fn begin<D, S>(&mut self, delta_ms: u32, audio: &mut AudioPump<D, S>) -> usize
    where
        D: AudioDevice,
        S: AudioSource,
    {
        self.game_time += u64::from(delta_ms);
        audio.pump(delta_ms)
    }

    /// One scan of the timer table at the current time, then the catch-up
    /// check. Returns `true` once the clock has reached game time.
    ///
    /// Always scans at least once, so a frame that is already behind still
    /// services its timers.
    pub fn step<T, C, const N: usize>(&self, clock: &mut Clock<T>, timers: &mut TimerTable<C, N>) -> bool
    where
        T: TickSource,
        C: TimerCallback,
    {
        self.scan(clock, timers).0
    }

    /// [`begin`](Self::begin), then [`step`](Self::step) until caught up.
    ///
    /// Busy-waits on the clock: the calling thread does not return until
    /// wall-clock time has reached the new game time.
    pub fn advance<T, C, D, S, const N: usize>(
        &mut self,
        delta_ms: u32,
        clock: &mut Clock<T>,
        timers: &mut TimerTable<C, N>,
        audio: &mut AudioPump<D, S>,
    ) -> FrameStats
    where
        T: TickSource,
        C: TimerCallback,
        D: AudioDevice,
        S: AudioSource,
    {
        let mut stats = FrameStats { samples: self.begin(delta_ms, audio), ..FrameStats::default() };
        loop {
            let (caught_up, report) = self.scan(clock, timers);
            stats.scans += 1;
            stats.fired += report.fired;
            if caught_up {
                break;
            }
            core::hint::spin_loop();
        }
        log::trace!(
            "frame +{delta_ms} ms -> game time {}: {} scans, {} fired",
            self.game_time,
            stats.scans,
            stats.fired
        );
        stats
    }

    fn scan<T, C, const N: usize>(&self, clock: &mut Clock<T>, timers: &mut TimerTable<C, N>) -> (bool, FireReport)
    where
        T: TickSource,
        C: TimerCallback,
    {
        let report = timers.fire_due(clock.timestamp());
        (clock.timestamp() >= self.game_time, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use pocketstub_core::audio::{Volume, WaveOutConfig};
    use pocketstub_core::error::AudioError;
    use std::rc::Rc;

    /// Millisecond counter that moves `step` ticks every time it is read.
    struct SteppingTicks {
        now: Cell<u32>,
        step: u32,
    }

    impl TickSource for SteppingTicks {
        fn ticks(&self) -> u32 {
            let now = self.now.get();
            self.now.set(now.wrapping_add(self.step));
            now
        }
        fn ticks_per_second(&self) -> u32 { 1000 }
    }

    fn clock(step: u32) -> Clock<SteppingTicks> {
        Clock::new(SteppingTicks { now: Cell::new(0), step })
    }

    #[derive(Default)]
    struct CountingDevice {
        written: Vec<usize>,
    }

    impl AudioDevice for CountingDevice {
        type Handle = ();
        fn open(&mut self, _: &WaveOutConfig) -> Result<(), AudioError> { Ok(()) }
        fn write(&mut self, _: &mut (), samples: &[i16]) { self.written.push(samples.len()); }
        fn set_volume(&mut self, _: Volume) {}
        fn close(&mut self, _: ()) {}
    }

    type Pump = AudioPump<CountingDevice, fn(&mut [i8])>;
    type Boxed = Box<dyn FnMut(u32) -> bool>;

    fn silence(out: &mut [i8]) { out.fill(0); }

    fn counter() -> (Rc<Cell<u32>>, Boxed) {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        (hits, Box::new(move |_| { h.set(h.get() + 1); true }))
    }

    #[test]
    fn periodic_timer_fires_twice_in_250ms() {
        let mut clock = clock(1);
        let mut timers: TimerTable<Boxed> = TimerTable::new();
        let mut audio: Box<Pump> = Box::new(AudioPump::new(CountingDevice::default(), 22_050, Volume::default()));
        let mut driver = FrameDriver::new();

        let (hits, cb) = counter();
        let h = timers.add_with_period(0, 100, 100, cb).unwrap();
        driver.advance(250, &mut clock, &mut timers, &mut *audio);

        assert_eq!(hits.get(), 2);
        assert_eq!(timers.activation_time(h), Some(300));
        assert_eq!(driver.game_time(), 250);
        assert!(clock.timestamp() >= 250);
    }

    #[test]
    fn catch_up_advances_by_whole_periods() {
        const P: u32 = 40;
        let mut clock = clock(1);
        let mut timers: TimerTable<Boxed> = TimerTable::new();
        let mut audio: Box<Pump> = Box::new(AudioPump::new(CountingDevice::default(), 22_050, Volume::default()));
        let mut driver = FrameDriver::new();

        let (hits, cb) = counter();
        let h = timers.add_with_period(0, 0, P, cb).unwrap();
        driver.advance(3 * P, &mut clock, &mut timers, &mut *audio);

        assert!(hits.get() >= 3, "fired {} times", hits.get());
        assert_eq!(timers.activation_time(h), Some(u64::from(hits.get() * P)));
    }

    #[test]
    fn a_coarse_clock_fires_back_to_back() {
        // Every read jumps 50 ms, so a 10 ms timer falls behind and is due on
        // consecutive scans until its activation time catches up.
        let mut clock = clock(50);
        let mut timers: TimerTable<Boxed> = TimerTable::new();
        let mut audio: Box<Pump> = Box::new(AudioPump::new(CountingDevice::default(), 22_050, Volume::default()));
        let mut driver = FrameDriver::new();

        let (hits, cb) = counter();
        let h = timers.add(0, 10, cb).unwrap();
        let stats = driver.advance(300, &mut clock, &mut timers, &mut *audio);

        assert_eq!(stats.scans, 3);
        assert_eq!(stats.fired as u32, hits.get());
        assert_eq!(timers.activation_time(h), Some(10 + 10 * u64::from(hits.get())));
        assert!(timers.activation_time(h).unwrap() < clock.timestamp());
    }

    #[test]
    fn audio_is_pumped_once_per_frame() {
        let mut clock = clock(1);
        let mut timers: TimerTable<Boxed> = TimerTable::new();
        let mut audio: Box<Pump> = Box::new(AudioPump::new(CountingDevice::default(), 22_050, Volume::default()));
        audio.start(silence).unwrap();
        let mut driver = FrameDriver::new();

        let stats = driver.advance(20, &mut clock, &mut timers, &mut *audio);
        assert_eq!(stats.samples, 441);
        assert_eq!(audio.device().written, [441]);
        assert!(stats.scans >= 1);
    }

    #[test]
    fn step_reports_catch_up() {
        let mut clock = clock(1);
        let mut timers: TimerTable<Boxed> = TimerTable::new();
        let mut audio: Box<Pump> = Box::new(AudioPump::new(CountingDevice::default(), 22_050, Volume::default()));
        let mut driver = FrameDriver::new();

        driver.begin(10, &mut *audio);
        let mut steps = 1;
        while !driver.step(&mut clock, &mut timers) {
            steps += 1;
        }
        // Two reads per step, one ms per read.
        assert_eq!(steps, 5);
        assert!(driver.step(&mut clock, &mut timers));
    }

    proptest::proptest! {
        #[test]
        fn advance_never_returns_behind_game_time(deltas in proptest::collection::vec(0u32..60, 1..20), step in 1u32..25) {
            let mut clock = clock(step);
            let mut timers: TimerTable<Boxed> = TimerTable::new();
            let mut audio: Box<Pump> = Box::new(AudioPump::new(CountingDevice::default(), 22_050, Volume::default()));
            let mut driver = FrameDriver::new();

            let mut total = 0u64;
            for d in deltas {
                total += u64::from(d);
                driver.advance(d, &mut clock, &mut timers, &mut *audio);
                proptest::prop_assert_eq!(driver.game_time(), total);
                proptest::prop_assert!(clock.timestamp() >= total);
            }
        }
    }
}
