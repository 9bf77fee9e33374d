//! Pocketstub Engine — the platform backend a game loop drives once per frame.
//!
//! Crate layout:
//! - [`config`]   : `PlatformConfig` (output rate, initial volume)
//! - [`driver`]   : `FrameDriver`, the game-time accumulator and catch-up loop
//! - [`platform`] : `Platform<T, D, S, C, K>`, the system stub facade
//! - [`source`]   : `Generator` trait and 8-bit sources for host runs
//! - `host`       : CPAL wave-out sink (feature `realtime`)
//!
//! Everything except the CPAL sink is single-threaded and allocation-free
//! after construction.

use cfg_if::cfg_if;

pub mod config;
pub mod driver;
pub mod platform;
pub mod source;

cfg_if! {
    if #[cfg(feature = "realtime")] {
        pub mod host;
        pub use host::{CpalSink, CpalStream};
    }
}

// Re-export some commonly used items to make downstream imports ergonomic.
pub use config::PlatformConfig;
pub use driver::{FrameDriver, FrameStats};
pub use platform::{KeyPoll, KeySource, NoKeys, Platform};
pub use source::{Generator, GeneratorSource, Osc, Wave};
