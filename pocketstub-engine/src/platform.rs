//! The system stub the game engine talks to.
//!
//! [`Platform`] owns the clock, the timer table, the audio pump, the frame
//! driver and the input decoder, and exposes them through the small surface
//! the engine expects from a platform backend: event polling, frame advance,
//! timers, audio start/stop and a timestamp.
//!
//! Threading
//! - Not thread-safe by construction; call everything from the loop that drives the engine.

use pocketstub_core::audio::{AudioDevice, AudioPump, AudioSource, Volume};
use pocketstub_core::clock::{Clock, TickSource};
use pocketstub_core::error::{AudioError, TimerError};
use pocketstub_core::input::{InputDecoder, KeyStatus, PlayerInput};
use pocketstub_core::timers::{TimerCallback, TimerHandle, TimerTable};

use crate::config::PlatformConfig;
use crate::driver::{FrameDriver, FrameStats};

/// One poll of the keypad plus the system-event flag.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyPoll {
    pub status: KeyStatus,
    /// The OS asked the game to exit (power switch, menu).
    pub system_exit: bool,
}

/// Input producer contract.
pub trait KeySource {
    fn poll(&mut self) -> KeyPoll;
}

/// Key source with nothing attached; every poll reports no keys held.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoKeys;

impl KeySource for NoKeys {
    #[inline]
    fn poll(&mut self) -> KeyPoll { KeyPoll::default() }
}

impl<F: FnMut() -> KeyPoll> KeySource for F {
    #[inline]
    fn poll(&mut self) -> KeyPoll { self() }
}

/// Platform backend for one game instance.
pub struct Platform<T, D, S, C, K = NoKeys>
where
    T: TickSource,
    D: AudioDevice,
    S: AudioSource,
    C: TimerCallback,
    K: KeySource,
{
    config: PlatformConfig,
    clock: Clock<T>,
    timers: TimerTable<C>,
    audio: AudioPump<D, S>,
    driver: FrameDriver,
    keys: K,
    decoder: InputDecoder,
    input: PlayerInput,
}

impl<T, D, S, C, K> Platform<T, D, S, C, K>
where
    T: TickSource,
    D: AudioDevice,
    S: AudioSource,
    C: TimerCallback,
    K: KeySource,
{
    /// Start the clock and set up an idle audio pump and an empty timer table.
    pub fn new(config: PlatformConfig, ticks: T, device: D, keys: K) -> Self {
        log::info!(
            "platform up: {} Hz output, volume {}",
            config.sample_rate,
            config.initial_volume.level()
        );
        Self {
            config,
            clock: Clock::new(ticks),
            timers: TimerTable::new(),
            audio: AudioPump::new(device, config.sample_rate, config.initial_volume),
            driver: FrameDriver::new(),
            keys,
            decoder: InputDecoder::new(),
            input: PlayerInput::default(),
        }
    }

    /// Service due timers once, then refresh the input snapshot.
    pub fn process_events(&mut self) {
        let now = self.clock.timestamp();
        self.timers.fire_due(now);
        self.poll_keys();
    }

    fn poll_keys(&mut self) {
        let poll = self.keys.poll();
        if poll.system_exit {
            self.input.dir_mask = 0;
            self.input.button = false;
            self.input.quit = true;
            log::info!("system exit requested");
            return;
        }
        let presses = self.decoder.decode(poll.status, &mut self.input);
        for step in presses.steps() {
            let volume = self.audio.step_volume(step);
            log::debug!("volume {:?} -> {}", step, volume.level());
        }
    }

    /// Account for a rendered frame of `delta_ms`: pump its audio and run
    /// timers until the clock catches up with game time. Spins until then.
    pub fn advance(&mut self, delta_ms: u32) -> FrameStats {
        self.driver.advance(delta_ms, &mut self.clock, &mut self.timers, &mut self.audio)
    }

    /// Non-blocking half of [`advance`](Self::advance): accumulate game time and pump audio.
    /// Follow with [`step`](Self::step) until it returns `true`.
    pub fn begin_frame(&mut self, delta_ms: u32) -> usize {
        self.driver.begin(delta_ms, &mut self.audio)
    }

    /// One timer scan; `true` once the clock has reached game time.
    pub fn step(&mut self) -> bool {
        self.driver.step(&mut self.clock, &mut self.timers)
    }

    /// Milliseconds since the platform was created.
    #[inline]
    pub fn timestamp(&mut self) -> u64 { self.clock.timestamp() }

    /// Schedule `callback` after `delay` ms, repeating every `delay` ms while it returns `true`.
    pub fn add_timer(&mut self, delay: u32, callback: C) -> Result<TimerHandle, TimerError> {
        let now = self.clock.timestamp();
        self.timers.add(now, delay, callback)
    }

    /// Schedule with a separate re-arm period (`0` = one-shot).
    pub fn add_periodic_timer(&mut self, delay: u32, period: u32, callback: C) -> Result<TimerHandle, TimerError> {
        let now = self.clock.timestamp();
        self.timers.add_with_period(now, delay, period, callback)
    }

    pub fn remove_timer(&mut self, handle: TimerHandle) -> Result<C, TimerError> {
        self.timers.remove(handle)
    }

    /// Open the device sink and start pulling samples from `source`.
    pub fn start_audio(&mut self, source: S) -> Result<(), AudioError> {
        self.audio.start(source)
    }

    /// Close the device sink, returning the source. No-op when not started.
    pub fn stop_audio(&mut self) -> Option<S> {
        self.audio.stop()
    }

    #[inline] pub fn output_sample_rate(&self) -> u32 { self.config.sample_rate }

    /// Raw device counter, for seeding the game's RNG.
    #[inline] pub fn seed(&self) -> u32 { self.clock.raw_ticks() }

    #[inline] pub fn input(&self) -> &PlayerInput { &self.input }
    #[inline] pub fn input_mut(&mut self) -> &mut PlayerInput { &mut self.input }
    #[inline] pub fn volume(&self) -> Volume { self.audio.volume() }
    #[inline] pub fn game_time(&self) -> u64 { self.driver.game_time() }
    #[inline] pub fn timers(&self) -> &TimerTable<C> { &self.timers }
    #[inline] pub fn audio(&self) -> &AudioPump<D, S> { &self.audio }
    #[inline] pub fn config(&self) -> &PlatformConfig { &self.config }
}

impl<T, D, S, C, K> Drop for Platform<T, D, S, C, K>
where
    T: TickSource,
    D: AudioDevice,
    S: AudioSource,
    C: TimerCallback,
    K: KeySource,
{
    fn drop(&mut self) {
        if self.audio.stop().is_some() {
            log::debug!("audio sink closed on platform drop");
        }
    }
}
