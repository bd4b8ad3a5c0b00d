//! Effect channel pool
//!
//! Short effects take the first idle channel. When all are busy the cursor
//! rotates and the next channel is reused, cutting off what it was playing.

use super::mixer::{Channel, Mixer};

/// Number of effect channels
pub const EFFECT_SLOTS: usize = Channel::EFFECTS.len();

#[derive(Debug)]
pub struct EffectPool {
    slots: [Channel; EFFECT_SLOTS],
    cursor: usize,
}

impl EffectPool {
    pub fn new(slots: [Channel; EFFECT_SLOTS]) -> Self {
        Self { slots, cursor: 0 }
    }

    /// Channel most recently handed out
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn acquire(&mut self, mixer: &impl Mixer) -> Channel {
        if let Some(index) = self.slots.iter().position(|c| !mixer.is_busy(*c)) {
            self.cursor = index;
        } else {
            self.cursor = (self.cursor + 1) % self.slots.len();
        }
        self.slots[self.cursor]
    }
}
