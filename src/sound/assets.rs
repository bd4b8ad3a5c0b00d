//! Sound sample catalog
//!
//! Samples are `.wav` files named `<lid>-<tag>[suffix].wav`, for example
//! `up-key3.wav` or `down-print-chars.wav`. Several files may share a tag;
//! one of them is picked at random on every lookup.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Position of the cover over the print mechanism
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LidState {
    #[default]
    Up,
    Down,
}

impl LidState {
    pub const ALL: [LidState; 2] = [LidState::Up, LidState::Down];

    /// File name prefix for this variant set
    pub fn prefix(self) -> &'static str {
        match self {
            LidState::Up => "up",
            LidState::Down => "down",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            LidState::Up => LidState::Down,
            LidState::Down => LidState::Up,
        }
    }
}

/// What a sample sounds like
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundTag {
    Hum,
    Key,
    Bell,
    CarriageReturn,
    Lid,
    Platen,
    PrintSpaces,
    PrintChars,
    MotorOn,
    MotorOff,
}

impl SoundTag {
    pub const ALL: [SoundTag; 10] = [
        SoundTag::Hum,
        SoundTag::Key,
        SoundTag::Bell,
        SoundTag::CarriageReturn,
        SoundTag::Lid,
        SoundTag::Platen,
        SoundTag::PrintSpaces,
        SoundTag::PrintChars,
        SoundTag::MotorOn,
        SoundTag::MotorOff,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SoundTag::Hum => "hum",
            SoundTag::Key => "key",
            SoundTag::Bell => "bell",
            SoundTag::CarriageReturn => "cr",
            SoundTag::Lid => "lid",
            SoundTag::Platen => "platen",
            SoundTag::PrintSpaces => "print-spaces",
            SoundTag::PrintChars => "print-chars",
            SoundTag::MotorOn => "motor-on",
            SoundTag::MotorOff => "motor-off",
        }
    }
}

#[derive(Error, Debug)]
pub enum SoundError {
    #[error("Failed to read sound directory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No '{lid}-{tag}' sample found")]
    MissingVariant {
        lid: &'static str,
        tag: &'static str,
    },
}

/// A loadable sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub name: String,
    pub path: PathBuf,
}

/// Split a file stem into its lid state and tag
fn classify(stem: &str) -> Option<(LidState, SoundTag)> {
    let (prefix, rest) = stem.split_once('-')?;
    let lid = LidState::ALL.into_iter().find(|lid| lid.prefix() == prefix)?;
    SoundTag::ALL
        .into_iter()
        .filter(|tag| rest.starts_with(tag.name()))
        .max_by_key(|tag| tag.name().len())
        .map(|tag| (lid, tag))
}

/// Every sample, indexed by lid state and tag. Construction guarantees both
/// lid variants exist for every tag.
#[derive(Debug, Clone)]
pub struct SoundBank {
    samples: HashMap<(LidState, SoundTag), Vec<Sample>>,
}

impl SoundBank {
    /// Scan a directory for `.wav` samples
    pub fn load_dir(dir: &Path) -> Result<Self, SoundError> {
        let read_error = |source| SoundError::Read {
            path: dir.to_path_buf(),
            source,
        };

        let mut samples = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_error)? {
            let path = entry.map_err(read_error)?.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "wav") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                samples.push(Sample {
                    name: stem.to_string(),
                    path: path.clone(),
                });
            }
        }
        Self::from_samples(samples)
    }

    /// Index samples by name, rejecting sets with a missing variant
    pub fn from_samples(samples: impl IntoIterator<Item = Sample>) -> Result<Self, SoundError> {
        let mut indexed: HashMap<(LidState, SoundTag), Vec<Sample>> = HashMap::new();
        for sample in samples {
            match classify(&sample.name) {
                Some(key) => indexed.entry(key).or_default().push(sample),
                None => debug!("Ignoring sample {}", sample.name),
            }
        }

        for lid in LidState::ALL {
            for tag in SoundTag::ALL {
                if !indexed.contains_key(&(lid, tag)) {
                    return Err(SoundError::MissingVariant {
                        lid: lid.prefix(),
                        tag: tag.name(),
                    });
                }
            }
        }

        for group in indexed.values_mut() {
            group.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(Self { samples: indexed })
    }

    /// Pick one sample for the tag at random
    pub fn pick(&self, lid: LidState, tag: SoundTag) -> Option<&Sample> {
        self.samples
            .get(&(lid, tag))
            .and_then(|group| group.choose(&mut rand::thread_rng()))
    }

    /// All samples sharing a tag
    pub fn variants(&self, lid: LidState, tag: SoundTag) -> &[Sample] {
        self.samples.get(&(lid, tag)).map_or(&[], Vec::as_slice)
    }

    /// Total number of samples
    pub fn len(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// One sample per lid and tag, named `<lid>-<tag>`
    pub fn complete_bank() -> SoundBank {
        let samples = LidState::ALL.into_iter().flat_map(|lid| {
            SoundTag::ALL.into_iter().map(move |tag| {
                let name = format!("{}-{}", lid.prefix(), tag.name());
                Sample {
                    path: PathBuf::from(format!("{}.wav", name)),
                    name,
                }
            })
        });
        SoundBank::from_samples(samples).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_names() {
        assert_eq!(classify("up-hum"), Some((LidState::Up, SoundTag::Hum)));
        assert_eq!(classify("down-key12"), Some((LidState::Down, SoundTag::Key)));
        assert_eq!(
            classify("up-print-spaces"),
            Some((LidState::Up, SoundTag::PrintSpaces))
        );
        assert_eq!(
            classify("down-motor-off"),
            Some((LidState::Down, SoundTag::MotorOff))
        );
        assert_eq!(classify("sideways-hum"), None);
        assert_eq!(classify("up-whistle"), None);
        assert_eq!(classify("hum"), None);
    }

    #[test]
    fn test_missing_variant_is_rejected() {
        let samples = SoundTag::ALL.into_iter().map(|tag| Sample {
            name: format!("up-{}", tag.name()),
            path: PathBuf::new(),
        });
        match SoundBank::from_samples(samples) {
            Err(SoundError::MissingVariant { lid, tag }) => {
                assert_eq!(lid, "down");
                assert_eq!(tag, "hum");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_load_dir_and_pick() {
        let dir = tempfile::tempdir().unwrap();
        for lid in LidState::ALL {
            for tag in SoundTag::ALL {
                let name = format!("{}-{}.wav", lid.prefix(), tag.name());
                fs::write(dir.path().join(name), b"RIFF").unwrap();
            }
        }
        fs::write(dir.path().join("up-key2.wav"), b"RIFF").unwrap();
        fs::write(dir.path().join("notes.txt"), b"not a sample").unwrap();

        let bank = SoundBank::load_dir(dir.path()).unwrap();
        assert_eq!(bank.len(), 21);
        assert_eq!(bank.variants(LidState::Up, SoundTag::Key).len(), 2);

        for _ in 0..20 {
            let key = bank.pick(LidState::Up, SoundTag::Key).unwrap();
            assert!(key.name == "up-key" || key.name == "up-key2");
        }
        assert_eq!(
            bank.pick(LidState::Down, SoundTag::Lid).unwrap().name,
            "down-lid"
        );
    }

    #[test]
    fn test_load_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            SoundBank::load_dir(&missing),
            Err(SoundError::Read { .. })
        ));
    }
}
