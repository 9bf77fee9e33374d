//! Error types for the timer table and the audio pump.
//!
//! Everything else in the core is either a clamp or a no-op; these are the
//! only failures a caller has to handle.

use thiserror::Error;

/// Failures reported by [`TimerTable`](crate::timers::TimerTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
    /// Every slot of the fixed-capacity table is occupied.
    #[error("timer table full ({capacity} slots)")]
    CapacityExceeded { capacity: usize },

    /// The handle does not name a live timer (already removed, or fired as one-shot).
    #[error("stale or unknown timer handle")]
    StaleHandle,
}

/// Failures reported by [`AudioPump`](crate::audio::AudioPump) and [`AudioDevice`](crate::audio::AudioDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("audio sink already started")]
    AlreadyStarted,

    #[error("audio device refused to open: {0}")]
    OpenFailed(&'static str),
}
