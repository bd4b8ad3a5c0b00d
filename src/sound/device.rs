//! Sound card output through rodio
//!
//! Each channel owns one sink. Starting a sample replaces the channel's sink,
//! which silences whatever it played before. Decoded clips are cached per
//! file, so repeated keys and loop restarts do not touch the disk.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rodio::decoder::DecoderError;
use rodio::source::Buffered;
use rodio::{Decoder, OutputStream, OutputStreamHandle, PlayError, Sink, Source, StreamError};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::assets::Sample;
use super::mixer::{Channel, Mixer};

type Clip = Buffered<Decoder<BufReader<File>>>;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No audio output device: {0}")]
    Open(#[from] StreamError),

    #[error("Failed to open a playback channel: {0}")]
    Sink(#[from] PlayError),

    #[error("Failed to read sample {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to decode sample {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecoderError,
    },
}

/// Decode a sample file into a clip that can be replayed cheaply
fn load_clip(path: &Path) -> Result<Clip, DeviceError> {
    let file = File::open(path).map_err(|source| DeviceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|source| DeviceError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decoder.buffered())
}

struct Voice {
    sink: Sink,
    clip: Clip,
    looping: bool,
    started: Instant,
}

/// Plays on the default output device
pub struct DeviceMixer {
    // Dropping the stream closes the device
    _stream: OutputStream,
    handle: OutputStreamHandle,
    clips: HashMap<PathBuf, Clip>,
    voices: HashMap<Channel, Voice>,
    volumes: HashMap<Channel, f32>,
}

impl DeviceMixer {
    pub fn open() -> Result<Self, DeviceError> {
        let (stream, handle) = OutputStream::try_default()?;
        info!("Audio output opened");
        Ok(Self {
            _stream: stream,
            handle,
            clips: HashMap::new(),
            voices: HashMap::new(),
            volumes: HashMap::new(),
        })
    }

    fn clip(&mut self, sample: &Sample) -> Option<Clip> {
        if let Some(clip) = self.clips.get(&sample.path) {
            return Some(clip.clone());
        }
        match load_clip(&sample.path) {
            Ok(clip) => {
                debug!("Decoded {}", sample.name);
                self.clips.insert(sample.path.clone(), clip.clone());
                Some(clip)
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    fn volume(&self, channel: Channel) -> f32 {
        self.volumes.get(&channel).copied().unwrap_or(1.0)
    }

    fn new_sink(&self, channel: Channel) -> Option<Sink> {
        match Sink::try_new(&self.handle) {
            Ok(sink) => {
                sink.set_volume(self.volume(channel));
                Some(sink)
            }
            Err(e) => {
                warn!("{}", DeviceError::from(e));
                None
            }
        }
    }
}

impl Mixer for DeviceMixer {
    fn play(&mut self, channel: Channel, sample: &Sample, looping: bool) {
        self.voices.remove(&channel);
        let Some(clip) = self.clip(sample) else {
            return;
        };
        let Some(sink) = self.new_sink(channel) else {
            return;
        };
        if looping {
            sink.append(clip.clone().repeat_infinite());
        } else {
            sink.append(clip.clone());
        }
        self.voices.insert(
            channel,
            Voice {
                sink,
                clip,
                looping,
                started: Instant::now(),
            },
        );
    }

    fn stop(&mut self, channel: Channel) {
        self.voices.remove(&channel);
    }

    fn set_volume(&mut self, channel: Channel, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.volumes.insert(channel, volume);
        if let Some(voice) = self.voices.get(&channel) {
            voice.sink.set_volume(volume);
        }
    }

    fn pause(&mut self, channel: Channel) {
        if let Some(voice) = self.voices.get(&channel) {
            voice.sink.pause();
        }
    }

    fn unpause(&mut self, channel: Channel) {
        if let Some(voice) = self.voices.get(&channel) {
            voice.sink.play();
        }
    }

    /// Continue from the current position for `duration`, fading to silence
    fn fadeout(&mut self, channel: Channel, duration: Duration) {
        let Some(voice) = self.voices.remove(&channel) else {
            return;
        };
        let Some(sink) = self.new_sink(channel) else {
            return;
        };
        let position = voice.started.elapsed();
        if voice.looping {
            let mut tail = voice
                .clip
                .clone()
                .repeat_infinite()
                .skip_duration(position)
                .take_duration(duration);
            tail.set_filter_fadeout();
            sink.append(tail);
        } else {
            let mut tail = voice.clip.clone().skip_duration(position).take_duration(duration);
            tail.set_filter_fadeout();
            sink.append(tail);
        }
        // The old sink stops when dropped; the tail takes over
        drop(voice.sink);
        self.voices.insert(
            channel,
            Voice {
                sink,
                clip: voice.clip,
                looping: false,
                started: Instant::now(),
            },
        );
    }

    fn is_busy(&self, channel: Channel) -> bool {
        self.voices
            .get(&channel)
            .map_or(false, |voice| !voice.sink.empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// A short 8 kHz mono 16-bit PCM file
    fn write_wav(path: &Path, frames: u32) {
        let data_len = frames * 2;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&8000u32.to_le_bytes());
        bytes.extend_from_slice(&16000u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..frames {
            let value = if i % 16 < 8 { 4000i16 } else { -4000i16 };
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        File::create(path).unwrap().write_all(&bytes).unwrap();
    }

    #[test]
    fn test_clip_decodes_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("up-key.wav");
        write_wav(&path, 800);

        let clip = load_clip(&path).unwrap();
        assert_eq!(clip.channels(), 1);
        assert_eq!(clip.sample_rate(), 8000);
        assert_eq!(clip.clone().count(), 800);
        // Clones replay from the start
        assert_eq!(clip.count(), 800);
    }

    #[test]
    fn test_clip_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("up-bell.wav");
        assert!(matches!(load_clip(&missing), Err(DeviceError::Read { .. })));

        let garbage = dir.path().join("up-cr.wav");
        std::fs::write(&garbage, b"not a wave file at all").unwrap();
        match load_clip(&garbage) {
            Err(DeviceError::Decode { path, .. }) => assert_eq!(path, garbage),
            Err(other) => panic!("expected a decode error, got {}", other),
            Ok(_) => panic!("garbage decoded"),
        }
    }
}
