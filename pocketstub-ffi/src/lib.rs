//! C ABI wrapper for the pocketstub system stub.
//!
//! A C/C++ game links this library, fills a [`PocketstubHost`] with its device
//! hooks (tick counter, key status, wave-out sink) and drives the stub
//! through an opaque handle.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `Pocketstub` (heap-allocated; you own/delete it).
//! - Timer handles are non-zero `u64`s; `0` means the timer was not added.
//! - Callback `param` pointers are never dereferenced here; their lifetime is the caller's.
//! - Timer and audio callbacks run inside `pocketstub_process_events`/`pocketstub_delta`.
//!   Calls back into the same stub from there are refused: they return `0`/`false`
//!   and `pocketstub_destroy` does nothing.
//!
//! Threading
//! - The object is NOT thread-safe; call all functions from the game loop thread.

use std::cell::{Cell, UnsafeCell};
use std::ffi::c_void;

use pocketstub_core::audio::{AudioDevice, AudioSource, Volume, WaveOutConfig};
use pocketstub_core::clock::TickSource;
use pocketstub_core::error::AudioError;
use pocketstub_core::input::{KeyStatus, PlayerInput};
use pocketstub_core::timers::{TimerCallback, TimerHandle};
use pocketstub_engine::{KeyPoll, KeySource, Platform, PlatformConfig};

// --- Host hooks --------------------------------------------------------------------

/// Timer callback: return `true` to keep the timer running.
pub type PocketstubTimerCallback = extern "C" fn(period: u32, param: *mut c_void) -> bool;

/// Audio pull callback: fill `len` signed 8-bit samples at `buf`.
pub type PocketstubAudioCallback = extern "C" fn(param: *mut c_void, buf: *mut u8, len: u32);

/// Device hooks supplied by the host. Every hook is required.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct PocketstubHost {
    /// Passed back as the first argument of every hook.
    pub ctx: *mut c_void,
    /// Free-running tick counter.
    pub ticks: Option<extern "C" fn(ctx: *mut c_void) -> u32>,
    /// Counter frequency, non-zero.
    pub ticks_per_second: u32,
    /// Write the key-status word to `status`; return a negative value when
    /// the system asks the game to exit.
    pub key_status: Option<extern "C" fn(ctx: *mut c_void, status: *mut u32) -> i32>,
    /// Open the wave-out sink; return null on failure.
    pub waveout_open: Option<
        extern "C" fn(ctx: *mut c_void, sample_rate: u32, bits: u16, channels: u16, volume: u8) -> *mut c_void,
    >,
    pub waveout_write: Option<extern "C" fn(ctx: *mut c_void, handle: *mut c_void, buf: *const i16, bytes: u32)>,
    pub waveout_set_volume: Option<extern "C" fn(ctx: *mut c_void, volume: u8)>,
    pub waveout_close: Option<extern "C" fn(ctx: *mut c_void, handle: *mut c_void)>,
}

/// Hooks resolved from a validated [`PocketstubHost`].
#[derive(Copy, Clone)]
struct Hooks {
    ctx: *mut c_void,
    ticks: extern "C" fn(*mut c_void) -> u32,
    ticks_per_second: u32,
    key_status: extern "C" fn(*mut c_void, *mut u32) -> i32,
    open: extern "C" fn(*mut c_void, u32, u16, u16, u8) -> *mut c_void,
    write: extern "C" fn(*mut c_void, *mut c_void, *const i16, u32),
    set_volume: extern "C" fn(*mut c_void, u8),
    close: extern "C" fn(*mut c_void, *mut c_void),
}

impl Hooks {
    fn resolve(host: &PocketstubHost) -> Option<Self> {
        if host.ticks_per_second == 0 {
            return None;
        }
        Some(Self {
            ctx: host.ctx,
            ticks: host.ticks?,
            ticks_per_second: host.ticks_per_second,
            key_status: host.key_status?,
            open: host.waveout_open?,
            write: host.waveout_write?,
            set_volume: host.waveout_set_volume?,
            close: host.waveout_close?,
        })
    }
}

struct HostTicks(Hooks);

impl TickSource for HostTicks {
    #[inline]
    fn ticks(&self) -> u32 { (self.0.ticks)(self.0.ctx) }
    #[inline]
    fn ticks_per_second(&self) -> u32 { self.0.ticks_per_second }
}

struct HostKeys(Hooks);

impl KeySource for HostKeys {
    fn poll(&mut self) -> KeyPoll {
        let mut status = 0u32;
        let rc = (self.0.key_status)(self.0.ctx, &mut status);
        KeyPoll { status: KeyStatus(status), system_exit: rc < 0 }
    }
}

struct HostSink(Hooks);

impl AudioDevice for HostSink {
    type Handle = *mut c_void;

    fn open(&mut self, cfg: &WaveOutConfig) -> Result<*mut c_void, AudioError> {
        let handle = (self.0.open)(self.0.ctx, cfg.sample_rate, cfg.bits_per_sample, cfg.channels, cfg.volume.level());
        if handle.is_null() {
            return Err(AudioError::OpenFailed("waveout_open returned null"));
        }
        Ok(handle)
    }

    fn write(&mut self, handle: &mut *mut c_void, samples: &[i16]) {
        let bytes = u32::try_from(core::mem::size_of_val(samples)).unwrap_or(u32::MAX);
        (self.0.write)(self.0.ctx, *handle, samples.as_ptr(), bytes);
    }

    fn set_volume(&mut self, volume: Volume) { (self.0.set_volume)(self.0.ctx, volume.level()); }

    fn close(&mut self, handle: *mut c_void) { (self.0.close)(self.0.ctx, handle); }
}

struct CTimer {
    cb: PocketstubTimerCallback,
    param: *mut c_void,
}

impl TimerCallback for CTimer {
    #[inline]
    fn fire(&mut self, period: u32) -> bool { (self.cb)(period, self.param) }
}

struct CAudio {
    cb: PocketstubAudioCallback,
    param: *mut c_void,
}

impl AudioSource for CAudio {
    fn fill(&mut self, out: &mut [i8]) {
        let len = u32::try_from(out.len()).unwrap_or(u32::MAX);
        (self.cb)(self.param, out.as_mut_ptr().cast::<u8>(), len);
    }
}

// --- Handle ------------------------------------------------------------------------

type Inner = Platform<HostTicks, HostSink, CAudio, CTimer, HostKeys>;

/// Opaque stub handed to C.
pub struct Pocketstub {
    /// Set while an entry point holds the platform.
    busy: Cell<bool>,
    inner: UnsafeCell<Inner>,
}

/// Input snapshot as seen from C.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PocketstubInput {
    pub dir_mask: u8,
    pub button: bool,
    pub code: bool,
    pub pause: bool,
    pub quit: bool,
}

impl From<PlayerInput> for PocketstubInput {
    fn from(p: PlayerInput) -> Self {
        Self { dir_mask: p.dir_mask, button: p.button, code: p.code, pause: p.pause, quit: p.quit }
    }
}

impl From<PocketstubInput> for PlayerInput {
    fn from(p: PocketstubInput) -> Self {
        Self { dir_mask: p.dir_mask, button: p.button, code: p.code, pause: p.pause, quit: p.quit }
    }
}

/// Run `f` on the platform behind `stub`, or return `fallback` when `stub` is
/// null or already in use further up the stack.
fn with_stub<R>(stub: *mut Pocketstub, fallback: R, f: impl FnOnce(&mut Inner) -> R) -> R {
    // SAFETY: callers pass either null or a live pointer from `pocketstub_create`.
    let Some(s) = (unsafe { stub.as_ref() }) else { return fallback };
    if s.busy.replace(true) {
        log::warn!("re-entrant call from a callback refused");
        return fallback;
    }
    // SAFETY: `busy` guarantees this is the only borrow of `inner`.
    let out = f(unsafe { &mut *s.inner.get() });
    s.busy.set(false);
    out
}

// --- Creation / destruction -------------------------------------------------------

/// Create a stub over the given device hooks. `sample_rate == 0` selects 22050 Hz.
/// Returns null if `host` is null or incomplete.
#[no_mangle]
pub extern "C" fn pocketstub_create(host: *const PocketstubHost, sample_rate: u32) -> *mut Pocketstub {
    // SAFETY: `host` is null or points to a host struct valid for this call.
    let Some(host) = (unsafe { host.as_ref() }) else { return std::ptr::null_mut() };
    let Some(hooks) = Hooks::resolve(host) else {
        log::error!("pocketstub_create: incomplete host hooks");
        return std::ptr::null_mut();
    };
    let mut config = PlatformConfig::default();
    if sample_rate != 0 {
        config = config.with_sample_rate(sample_rate);
    }
    let inner = Platform::new(config, HostTicks(hooks), HostSink(hooks), HostKeys(hooks));
    Box::into_raw(Box::new(Pocketstub { busy: Cell::new(false), inner: UnsafeCell::new(inner) }))
}

/// Destroy a stub previously returned by `pocketstub_create`. Closes audio if open.
#[no_mangle]
pub extern "C" fn pocketstub_destroy(stub: *mut Pocketstub) {
    // SAFETY: `stub` is null or a live pointer from `pocketstub_create`.
    let Some(s) = (unsafe { stub.as_ref() }) else { return };
    if s.busy.get() {
        log::error!("pocketstub_destroy called from a callback; ignored");
        return;
    }
    unsafe { drop(Box::from_raw(stub)); }
}

// --- Frame loop --------------------------------------------------------------------

/// Fire due timers once and refresh the input snapshot.
#[no_mangle]
pub extern "C" fn pocketstub_process_events(stub: *mut Pocketstub) {
    with_stub(stub, (), Inner::process_events);
}

/// Advance game time by `time_delta` ms: pump audio, then run timers until the
/// clock catches up. Blocks (spins) until then.
#[no_mangle]
pub extern "C" fn pocketstub_delta(stub: *mut Pocketstub, time_delta: u32) {
    with_stub(stub, (), |p| { p.advance(time_delta); });
}

/// Milliseconds since creation (truncated to 32 bits).
#[no_mangle]
pub extern "C" fn pocketstub_get_timestamp(stub: *mut Pocketstub) -> u32 {
    let ms = with_stub(stub, 0, Inner::timestamp);
    #[allow(clippy::cast_possible_truncation)]
    let ms = ms as u32;
    ms
}

#[no_mangle]
pub extern "C" fn pocketstub_seed(stub: *mut Pocketstub) -> u32 {
    with_stub(stub, 0, |p| p.seed())
}

#[no_mangle]
pub extern "C" fn pocketstub_output_sample_rate(stub: *mut Pocketstub) -> u32 {
    with_stub(stub, 0, |p| p.output_sample_rate())
}

// --- Timers ------------------------------------------------------------------------

/// Schedule `callback(delay, param)` every `delay` ms while it returns true.
/// Returns 0 when the table is full or the stub is null.
#[no_mangle]
pub extern "C" fn pocketstub_add_timer(
    stub: *mut Pocketstub,
    delay: u32,
    callback: Option<PocketstubTimerCallback>,
    param: *mut c_void,
) -> u64 {
    let Some(cb) = callback else { return 0 };
    with_stub(stub, 0, |p| match p.add_timer(delay, CTimer { cb, param }) {
        Ok(handle) => handle.to_bits(),
        Err(e) => {
            log::warn!("pocketstub_add_timer: {e}");
            0
        }
    })
}

/// Remove a timer. Returns false for stale or unknown handles.
#[no_mangle]
pub extern "C" fn pocketstub_remove_timer(stub: *mut Pocketstub, timer: u64) -> bool {
    with_stub(stub, false, |p| p.remove_timer(TimerHandle::from_bits(timer)).is_ok())
}

// --- Audio -------------------------------------------------------------------------

/// Open the wave-out sink and start pulling samples from `callback`.
#[no_mangle]
pub extern "C" fn pocketstub_start_audio(
    stub: *mut Pocketstub,
    callback: Option<PocketstubAudioCallback>,
    param: *mut c_void,
) -> bool {
    let Some(cb) = callback else { return false };
    with_stub(stub, false, |p| match p.start_audio(CAudio { cb, param }) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("pocketstub_start_audio: {e}");
            false
        }
    })
}

#[no_mangle]
pub extern "C" fn pocketstub_stop_audio(stub: *mut Pocketstub) {
    with_stub(stub, (), |p| { p.stop_audio(); });
}

// --- Input -------------------------------------------------------------------------

/// Copy the current input snapshot to `out`.
#[no_mangle]
pub extern "C" fn pocketstub_get_input(stub: *mut Pocketstub, out: *mut PocketstubInput) -> bool {
    // SAFETY: `out` is null or points to writable storage for one snapshot.
    let Some(out) = (unsafe { out.as_mut() }) else { return false };
    with_stub(stub, false, |p| {
        *out = (*p.input()).into();
        true
    })
}

/// Overwrite the input snapshot, e.g. to clear latched `pause`/`quit` flags.
#[no_mangle]
pub extern "C" fn pocketstub_set_input(stub: *mut Pocketstub, input: *const PocketstubInput) -> bool {
    // SAFETY: `input` is null or points to a readable snapshot.
    let Some(input) = (unsafe { input.as_ref() }) else { return false };
    with_stub(stub, false, |p| {
        *p.input_mut() = (*input).into();
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Device {
        now: Cell<u32>,
        keys: Cell<u32>,
        exit: Cell<bool>,
        written_bytes: Cell<u32>,
        volume: Cell<u8>,
        closed: Cell<u32>,
    }

    fn dev<'a>(ctx: *mut c_void) -> &'a Device { unsafe { &*(ctx as *const Device) } }

    extern "C" fn ticks(ctx: *mut c_void) -> u32 {
        let d = dev(ctx);
        let now = d.now.get();
        d.now.set(now + 1);
        now
    }
    extern "C" fn key_status(ctx: *mut c_void, out: *mut u32) -> i32 {
        let d = dev(ctx);
        unsafe { *out = d.keys.get() };
        if d.exit.get() { -1 } else { 0 }
    }
    extern "C" fn open(ctx: *mut c_void, _: u32, _: u16, _: u16, volume: u8) -> *mut c_void {
        dev(ctx).volume.set(volume);
        ctx
    }
    extern "C" fn write(ctx: *mut c_void, _: *mut c_void, _: *const i16, bytes: u32) {
        let d = dev(ctx);
        d.written_bytes.set(d.written_bytes.get() + bytes);
    }
    extern "C" fn set_volume(ctx: *mut c_void, volume: u8) { dev(ctx).volume.set(volume); }
    extern "C" fn close(ctx: *mut c_void, _: *mut c_void) {
        let d = dev(ctx);
        d.closed.set(d.closed.get() + 1);
    }

    extern "C" fn count_fires(_: u32, param: *mut c_void) -> bool {
        let hits = unsafe { &*(param as *const Cell<u32>) };
        hits.set(hits.get() + 1);
        true
    }
    extern "C" fn silence(_: *mut c_void, buf: *mut u8, len: u32) {
        unsafe { std::ptr::write_bytes(buf, 0, len as usize) };
    }

    fn host(device: &Device) -> PocketstubHost {
        PocketstubHost {
            ctx: device as *const Device as *mut c_void,
            ticks: Some(ticks),
            ticks_per_second: 1000,
            key_status: Some(key_status),
            waveout_open: Some(open),
            waveout_write: Some(write),
            waveout_set_volume: Some(set_volume),
            waveout_close: Some(close),
        }
    }

    #[test]
    fn incomplete_host_is_rejected() {
        let device = Device::default();
        let mut h = host(&device);
        h.waveout_close = None;
        assert!(pocketstub_create(&h, 0).is_null());
        assert!(pocketstub_create(std::ptr::null(), 0).is_null());
    }

    #[test]
    fn timers_fire_through_the_abi() {
        let device = Device::default();
        let stub = pocketstub_create(&host(&device), 0);
        assert!(!stub.is_null());

        let hits = Cell::new(0u32);
        let param = &hits as *const Cell<u32> as *mut c_void;
        let timer = pocketstub_add_timer(stub, 100, Some(count_fires), param);
        assert_ne!(timer, 0);

        pocketstub_delta(stub, 250);
        assert_eq!(hits.get(), 2);
        assert!(pocketstub_get_timestamp(stub) >= 250);

        assert!(pocketstub_remove_timer(stub, timer));
        assert!(!pocketstub_remove_timer(stub, timer));
        pocketstub_destroy(stub);
    }

    #[test]
    fn audio_writes_sixteen_bit_bytes() {
        let device = Device::default();
        let stub = pocketstub_create(&host(&device), 0);
        assert_eq!(pocketstub_output_sample_rate(stub), 22_050);
        assert!(pocketstub_start_audio(stub, Some(silence), std::ptr::null_mut()));
        assert_eq!(device.volume.get(), 15);

        pocketstub_delta(stub, 20);
        assert_eq!(device.written_bytes.get(), 441 * 2);

        pocketstub_destroy(stub);
        assert_eq!(device.closed.get(), 1);
    }

    #[test]
    fn input_snapshot_roundtrips_and_clears() {
        let device = Device::default();
        let stub = pocketstub_create(&host(&device), 0);
        device.keys.set(KeyStatus::START);
        pocketstub_process_events(stub);

        let mut input = PocketstubInput::default();
        assert!(pocketstub_get_input(stub, &mut input));
        assert!(input.pause);

        input.pause = false;
        assert!(pocketstub_set_input(stub, &input));
        device.exit.set(true);
        pocketstub_process_events(stub);
        assert!(pocketstub_get_input(stub, &mut input));
        assert!(!input.pause);
        assert!(input.quit);
        pocketstub_destroy(stub);
    }

    /// State a re-entering timer callback reaches through its `param`.
    struct Reentry {
        stub: Cell<*mut Pocketstub>,
        added: Cell<Option<u64>>,
        removed: Cell<Option<bool>>,
        timestamp: Cell<Option<u32>>,
    }

    extern "C" fn call_back_in(_: u32, param: *mut c_void) -> bool {
        let r = unsafe { &*(param as *const Reentry) };
        let stub = r.stub.get();
        r.added.set(Some(pocketstub_add_timer(stub, 10, Some(count_fires), std::ptr::null_mut())));
        r.removed.set(Some(pocketstub_remove_timer(stub, 1)));
        r.timestamp.set(Some(pocketstub_get_timestamp(stub)));
        pocketstub_destroy(stub);
        false
    }

    #[test]
    fn callbacks_cannot_reenter_the_stub() {
        let device = Device::default();
        let stub = pocketstub_create(&host(&device), 0);
        let reentry = Reentry {
            stub: Cell::new(stub),
            added: Cell::new(None),
            removed: Cell::new(None),
            timestamp: Cell::new(None),
        };
        let param = &reentry as *const Reentry as *mut c_void;
        assert_ne!(pocketstub_add_timer(stub, 0, Some(call_back_in), param), 0);

        pocketstub_delta(stub, 5);
        assert_eq!(reentry.added.get(), Some(0));
        assert_eq!(reentry.removed.get(), Some(false));
        assert_eq!(reentry.timestamp.get(), Some(0));

        // The stub survived the destroy attempt and is usable again.
        let hits = Cell::new(0u32);
        let timer = pocketstub_add_timer(stub, 1, Some(count_fires), &hits as *const Cell<u32> as *mut c_void);
        assert_ne!(timer, 0);
        pocketstub_delta(stub, 10);
        assert!(hits.get() > 0);
        pocketstub_destroy(stub);
    }
}
