//! Configuration and paper color management for ttyemu.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.ttyemu/config.toml`
//! - Built-in paper schemes (canary, white, green-bar, night)
//!
//! # Configuration File
//!
//! ```toml
//! columns = 72
//! # 0 fits the console height
//! lines_per_screen = 0
//! pacing_ms = 105
//!
//! [backend]
//! kind = "pipe"          # loopback, stream, pipe
//! host = "localhost"
//! port = 23
//! command = "sh"
//! crmod = true
//! lecho = false
//!
//! [sound]
//! enabled = true
//! dir = "/usr/share/ttyemu/sounds"
//! lid = "down"
//!
//! [paper]
//! scheme = "canary"
//! ink = { r = 20, g = 20, b = 60 }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::terminal::DEFAULT_COLUMNS;
use crate::sound::LidState;
use crate::transport::pump::DEFAULT_PACING;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not determine home directory")]
    NoHome,
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Platen width in columns
    pub columns: usize,
    /// Visible lines; 0 fits the console
    pub lines_per_screen: usize,
    /// Delay between received bytes when not in fast mode
    pub pacing_ms: u64,
    pub backend: BackendConfig,
    pub sound: SoundConfig,
    pub paper: PaperConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            lines_per_screen: 0,
            pacing_ms: DEFAULT_PACING.as_millis() as u64,
            backend: BackendConfig::default(),
            sound: SoundConfig::default(),
            paper: PaperConfig::default(),
        }
    }
}

/// Which transport to wire to the keyboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Loopback,
    Stream,
    Pipe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub host: String,
    pub port: u16,
    /// Command line for the pipe backend
    pub command: Option<String>,
    pub crmod: bool,
    pub lecho: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Loopback,
            host: "localhost".to_string(),
            port: 23,
            command: None,
            crmod: false,
            lecho: false,
        }
    }
}

impl BackendConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    pub enabled: bool,
    /// Sample directory; defaults to `~/.ttyemu/sounds`
    pub dir: Option<PathBuf>,
    /// Lid position at power on
    pub lid: LidState,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            lid: LidState::Up,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    /// Built-in scheme name
    pub scheme: String,
    /// Overrides the scheme's background
    pub background: Option<Color>,
    /// Overrides the scheme's ink
    pub ink: Option<Color>,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            scheme: "canary".to_string(),
            background: None,
            ink: None,
        }
    }
}

impl PaperConfig {
    /// The named scheme with any overrides applied
    pub fn resolve(&self) -> PaperScheme {
        let mut scheme = PaperScheme::by_name(&self.scheme);
        if let Some(background) = self.background {
            scheme.background = background;
        }
        if let Some(ink) = self.ink {
            scheme.ink = ink;
        }
        scheme
    }
}

impl Config {
    /// Load configuration from `~/.ttyemu/config.toml`, falling back to
    /// defaults when it is missing or unreadable
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to `~/.ttyemu/config.toml`
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoHome)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get config file path
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Where to look for samples
    pub fn sound_dir(&self) -> PathBuf {
        self.sound
            .dir
            .clone()
            .or_else(|| config_dir().map(|dir| dir.join("sounds")))
            .unwrap_or_else(|| PathBuf::from("sounds"))
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// Paper and ribbon colors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperScheme {
    pub name: String,
    pub background: Color,
    pub ink: Color,
}

impl Default for PaperScheme {
    fn default() -> Self {
        Self::canary()
    }
}

impl PaperScheme {
    /// Yellow roll paper
    pub fn canary() -> Self {
        Self {
            name: "canary".to_string(),
            background: Color::new(250, 240, 190),
            ink: Color::new(40, 40, 40),
        }
    }

    pub fn white() -> Self {
        Self {
            name: "white".to_string(),
            background: Color::new(245, 245, 240),
            ink: Color::new(30, 30, 30),
        }
    }

    /// Fanfold computer paper
    pub fn green_bar() -> Self {
        Self {
            name: "green-bar".to_string(),
            background: Color::new(220, 240, 220),
            ink: Color::new(20, 40, 20),
        }
    }

    /// Light ink on a dark console, for late sessions
    pub fn night() -> Self {
        Self {
            name: "night".to_string(),
            background: Color::new(20, 20, 24),
            ink: Color::new(200, 190, 160),
        }
    }

    /// Get scheme by name
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "white" => Self::white(),
            "green-bar" | "green_bar" | "greenbar" => Self::green_bar(),
            "night" => Self::night(),
            _ => Self::canary(),
        }
    }

    /// List all available scheme names
    pub fn available_schemes() -> &'static [&'static str] {
        &["canary", "white", "green-bar", "night"]
    }
}

/// `~/.ttyemu`, holding the config file, log and default sound directory
pub fn config_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".ttyemu"))
}

/// Get home directory
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
