//! Platform configuration.

use pocketstub_core::audio::{Volume, DEFAULT_SAMPLE_RATE};

/// Settings fixed at [`Platform`](crate::platform::Platform) construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Wave-out rate in Hz. The handheld runs at 22050; host runs may differ.
    pub sample_rate: u32,
    /// Volume used when the sink is opened.
    pub initial_volume: Volume,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self { sample_rate: DEFAULT_SAMPLE_RATE, initial_volume: Volume::default() }
    }
}

impl PlatformConfig {
    #[must_use]
    pub fn with_sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate = hz.max(1);
        self
    }

    #[must_use]
    pub fn with_initial_volume(mut self, volume: Volume) -> Self {
        self.initial_volume = volume;
        self
    }
}
