#![cfg_attr(not(feature = "std"), no_std)]
//! Pocketstub Core — no_std-ready timing, scheduling and audio primitives for a
//! single-threaded handheld game backend.
//!
//! Features
//! - `std` : (default) host tick source [`clock::StdTicks`] and `std::error::Error` impls
//!
//! Modules
//! - [`clock`]  : monotonic milliseconds over a wrapping hardware tick counter
//! - [`timers`] : fixed-capacity, insertion-ordered timer table
//! - [`audio`]  : per-frame pull audio pump, volume levels
//! - [`input`]  : key-status decoding with edge-triggered buttons
//! - [`error`]  : timer and audio error types
//!
//! Design
//! - No heap allocations; fixed-size tables and scratch buffers
//! - No hidden statics: every piece of cached state is a field of its owner
//! - Nothing here blocks; the catch-up spin lives in the engine crate

pub mod audio;
pub mod clock;
pub mod error;
pub mod input;
pub mod timers;

/// Commonly used types for convenience:
pub mod prelude {
    pub use crate::audio::{
        AudioDevice, AudioPump, AudioSource, Volume, VolumeStep, WaveOutConfig,
        DEFAULT_SAMPLE_RATE, MAX_PUMP_SAMPLES,
    };
    pub use crate::clock::{Clock, TickSource};
    pub use crate::error::{AudioError, TimerError};
    pub use crate::input::{InputDecoder, KeyStatus, PlayerInput, VolumePresses};
    pub use crate::timers::{TimerCallback, TimerHandle, TimerTable};

    #[cfg(feature = "std")]
    pub use crate::clock::StdTicks;
}
