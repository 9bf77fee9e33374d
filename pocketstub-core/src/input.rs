//! Key-status decoding and edge detection.
//!
//! The handheld reports every button as one bit of a 32-bit status word.
//! [`InputDecoder`] turns that word into the engine's [`PlayerInput`]
//! snapshot. Pause and the two volume triggers act once per press: each is
//! tracked by an [`EdgeDetector`] owned by the decoder.

use crate::audio::VolumeStep;

/// Raw key-status word as read from the keypad controller.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyStatus(pub u32);

impl KeyStatus {
    pub const POWER: u32 = 1 << 7;
    pub const BUTTON_A: u32 = 1 << 31;
    pub const BUTTON_B: u32 = 1 << 21;
    pub const BUTTON_X: u32 = 1 << 16;
    pub const BUTTON_Y: u32 = 1 << 6;
    pub const START: u32 = 1 << 11;
    pub const SELECT: u32 = 1 << 10;
    pub const TRIGGER_LEFT: u32 = 1 << 8;
    pub const TRIGGER_RIGHT: u32 = 1 << 29;
    pub const DPAD_UP: u32 = 1 << 20;
    pub const DPAD_DOWN: u32 = 1 << 27;
    pub const DPAD_LEFT: u32 = 1 << 28;
    pub const DPAD_RIGHT: u32 = 1 << 18;

    #[inline]
    pub fn pressed(self, bits: u32) -> bool { self.0 & bits != 0 }

    #[inline]
    #[must_use]
    pub fn with(self, bits: u32) -> Self { Self(self.0 | bits) }
}

/// Direction bits of [`PlayerInput::dir_mask`].
pub struct Direction;

impl Direction {
    pub const UP: u8 = 1 << 0;
    pub const RIGHT: u8 = 1 << 1;
    pub const DOWN: u8 = 1 << 2;
    pub const LEFT: u8 = 1 << 3;
}

/// Input snapshot consumed by the engine.
///
/// `dir_mask` and `button` are level state, rewritten on every poll. `code`,
/// `pause` and `quit` latch: the decoder sets them and the engine clears them
/// once handled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayerInput {
    pub dir_mask: u8,
    pub button: bool,
    pub code: bool,
    pub pause: bool,
    pub quit: bool,
}

/// Released-to-pressed transition detector.
#[derive(Copy, Clone, Debug, Default)]
pub struct EdgeDetector {
    held: bool,
}

impl EdgeDetector {
    /// Feed the current level; true only on the poll where it goes down.
    #[inline]
    pub fn rising(&mut self, pressed: bool) -> bool {
        let edge = pressed && !self.held;
        self.held = pressed;
        edge
    }

    #[inline]
    pub fn is_held(&self) -> bool { self.held }
}

/// Volume-trigger edges seen on one poll.
///
/// Both triggers can go down on the same poll; [`VolumePresses::steps`]
/// yields the down step before the up step, each saturating on its own, so
/// at level 0 the pair ends one step up.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VolumePresses {
    pub down: bool,
    pub up: bool,
}

impl VolumePresses {
    #[inline]
    pub fn is_empty(self) -> bool { !self.down && !self.up }

    /// Steps to apply, in order.
    pub fn steps(self) -> impl Iterator<Item = VolumeStep> {
        [(self.down, VolumeStep::Down), (self.up, VolumeStep::Up)]
            .into_iter()
            .filter_map(|(pressed, step)| pressed.then_some(step))
    }
}

/// Stateful key decoder.
#[derive(Copy, Clone, Debug, Default)]
pub struct InputDecoder {
    start: EdgeDetector,
    volume_down: EdgeDetector,
    volume_up: EdgeDetector,
}

impl InputDecoder {
    pub fn new() -> Self { Self::default() }

    /// Update `input` from one poll of the keypad and report the volume
    /// triggers that went down on this poll.
    pub fn decode(&mut self, status: KeyStatus, input: &mut PlayerInput) -> VolumePresses {
        input.dir_mask = 0;
        input.button = false;

        let dirs = [
            (KeyStatus::DPAD_LEFT, Direction::LEFT),
            (KeyStatus::DPAD_RIGHT, Direction::RIGHT),
            (KeyStatus::DPAD_UP, Direction::UP),
            (KeyStatus::DPAD_DOWN, Direction::DOWN),
        ];
        for (bit, dir) in dirs {
            if status.pressed(bit) {
                input.dir_mask |= dir;
            }
        }

        if status.pressed(KeyStatus::BUTTON_A) {
            input.button = true;
        }
        if status.pressed(KeyStatus::SELECT) {
            input.code = true;
        }
        if self.start.rising(status.pressed(KeyStatus::START)) {
            input.pause = true;
        }
        if status.pressed(KeyStatus::SELECT) && status.pressed(KeyStatus::START) {
            input.quit = true;
        }

        VolumePresses {
            down: self.volume_down.rising(status.pressed(KeyStatus::TRIGGER_LEFT)),
            up: self.volume_up.rising(status.pressed(KeyStatus::TRIGGER_RIGHT)),
        }
    }
}
