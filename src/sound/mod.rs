//! Teletype sounds.
//!
//! - **assets**: Sample catalog keyed by lid state and tag
//! - **mixer**: Playback channel contract and the tracing mixer
//! - **device**: Output device mixer (`audio` feature)
//! - **timer**: Deadline timers polled from the presentation loop
//! - **effects**: Effect channel pool with voice stealing
//! - **engine**: The keypress/print/idle state machine
//!
//! # Channels
//!
//! ```text
//! 0      motor, hum, lid
//! 1      printing spaces (loop)
//! 2      printing characters (loop)
//! 3..=5  effects: keys, platen, bell, carriage return
//! ```

pub mod assets;
#[cfg(feature = "audio")]
pub mod device;
pub mod effects;
pub mod engine;
pub mod mixer;
pub mod timer;

pub use assets::{LidState, SoundBank};
pub use engine::SoundEngine;
#[cfg(feature = "audio")]
pub use device::DeviceMixer;
pub use mixer::{Mixer, TraceMixer};
