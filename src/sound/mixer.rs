//! Playback channels
//!
//! The engine drives a fixed set of mixer channels: three for the continuous
//! loops and a small pool for short effects. Decoding and output belong to
//! the [`Mixer`] implementation: `DeviceMixer` when built with the `audio`
//! feature, otherwise [`TraceMixer`].

use std::time::Duration;

use tracing::trace;

use super::assets::Sample;

/// A mixer channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(pub u8);

impl Channel {
    /// Motor, background hum and lid
    pub const HUM: Channel = Channel(0);
    /// Printing spaces (loop)
    pub const SPACES: Channel = Channel(1);
    /// Printing characters (loop)
    pub const CHARS: Channel = Channel(2);
    /// Keys, platen, bell, carriage return
    pub const EFFECTS: [Channel; 3] = [Channel(3), Channel(4), Channel(5)];
}

/// An audio output device
pub trait Mixer {
    /// Start a sample from its beginning, replacing whatever the channel played
    fn play(&mut self, channel: Channel, sample: &Sample, looping: bool);

    fn stop(&mut self, channel: Channel);

    /// Volume in [0, 1]
    fn set_volume(&mut self, channel: Channel, volume: f32);

    fn pause(&mut self, channel: Channel);

    fn unpause(&mut self, channel: Channel);

    /// Fade the channel to silence and stop it
    fn fadeout(&mut self, channel: Channel, duration: Duration);

    /// Whether the channel is still playing something
    fn is_busy(&self, channel: Channel) -> bool;
}

impl<M: Mixer + ?Sized> Mixer for Box<M> {
    fn play(&mut self, channel: Channel, sample: &Sample, looping: bool) {
        (**self).play(channel, sample, looping)
    }

    fn stop(&mut self, channel: Channel) {
        (**self).stop(channel)
    }

    fn set_volume(&mut self, channel: Channel, volume: f32) {
        (**self).set_volume(channel, volume)
    }

    fn pause(&mut self, channel: Channel) {
        (**self).pause(channel)
    }

    fn unpause(&mut self, channel: Channel) {
        (**self).unpause(channel)
    }

    fn fadeout(&mut self, channel: Channel, duration: Duration) {
        (**self).fadeout(channel, duration)
    }

    fn is_busy(&self, channel: Channel) -> bool {
        (**self).is_busy(channel)
    }
}

/// A mixer with no device behind it; every call is traced. Used when no
/// output device is available.
#[derive(Debug, Default)]
pub struct TraceMixer;

impl Mixer for TraceMixer {
    fn play(&mut self, channel: Channel, sample: &Sample, looping: bool) {
        trace!("play {} on {:?} (loop: {})", sample.name, channel, looping);
    }

    fn stop(&mut self, channel: Channel) {
        trace!("stop {:?}", channel);
    }

    fn set_volume(&mut self, channel: Channel, volume: f32) {
        trace!("volume {:?} = {:.2}", channel, volume);
    }

    fn pause(&mut self, channel: Channel) {
        trace!("pause {:?}", channel);
    }

    fn unpause(&mut self, channel: Channel) {
        trace!("unpause {:?}", channel);
    }

    fn fadeout(&mut self, channel: Channel, duration: Duration) {
        trace!("fadeout {:?} over {:?}", channel, duration);
    }

    fn is_busy(&self, _channel: Channel) -> bool {
        false
    }
}
