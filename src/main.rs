//! ttyemu - A mechanical teletype emulator for the console
//!
//! ttyemu prints like an ASR-33: 72 columns, upper case, overstrikes kept,
//! paper that rolls by, and the noises the machine makes while it works.
//!
//! # Features
//!
//! - **Overstrike**: Backspace and carriage return strike over earlier glyphs
//! - **Pacing**: Received text arrives at 10 characters per second (F5 for fast mode)
//! - **Transports**: Loopback, raw TCP character stream, local process over pipes
//! - **Sound**: Keys, print head, carriage return, bell, lid and motor cues
//!
//! # Quick Start
//!
//! ```text
//! ttyemu                          # Loopback: type onto the paper
//! ttyemu --pipe sh --crmod        # A shell on the teletype
//! ttyemu --connect host:2323      # Raw character stream
//! ```
//!
//! Sound plays through the sound card when built with `--features audio`;
//! without it the cues are only written to the log at trace level.
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | F5 | Toggle fast mode |
//! | F7 | Open/close the lid |
//! | PageUp/PageDown | Roll the platen |
//! | F10 | Power off |

mod config;
mod core;
mod sound;
mod transport;
mod ui;

use std::env;
use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{BackendKind, Config as TtyConfig, PaperScheme};
use crate::core::contracts::{mailbox, Backend, Inbox, Presentation};
use crate::core::session::Session;
use crate::sound::{Mixer, SoundBank, SoundEngine, TraceMixer};
use crate::transport::{LoopbackBackend, PipeBackend, StreamBackend};
use crate::ui::{ConsoleFrontend, PlainFrontend};

/// Command line choices; anything left unset falls back to config.toml
#[derive(Debug, Default)]
struct Args {
    backend: Option<BackendKind>,
    address: Option<String>,
    command: Option<String>,
    crmod: bool,
    lecho: bool,
    plain: bool,
    no_sound: bool,
    sounds: Option<PathBuf>,
    columns: Option<usize>,
    list_schemes: bool,
    save_config: bool,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Overrides the log filter, e.g. `TTYEMU_LOG=ttyemu=trace`
const LOG_ENV: &str = "TTYEMU_LOG";

fn print_version() {
    eprintln!("ttyemu {}", VERSION);
}

fn print_help() {
    eprintln!("ttyemu {} - A mechanical teletype emulator", VERSION);
    eprintln!();
    eprintln!("Usage: ttyemu [OPTIONS]");
    eprintln!();
    eprintln!("Transport options:");
    eprintln!("  --loopback            Echo keystrokes onto the paper (default)");
    eprintln!("  --connect HOST:PORT   Raw TCP character stream");
    eprintln!("  --pipe CMD            Run CMD through the shell, over pipes");
    eprintln!("  --crmod               Map CR to LF on input and LF to CR LF on output");
    eprintln!("  --lecho               Echo keystrokes locally (pipe only)");
    eprintln!();
    eprintln!("Presentation options:");
    eprintln!("  --plain               Stream to stdout instead of the full-screen view");
    eprintln!("  --columns N           Platen width (default 72)");
    eprintln!("  --no-sound            Disable sound");
    eprintln!("  --sounds DIR          Sample directory (default ~/.ttyemu/sounds)");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  --schemes             List paper color schemes");
    eprintln!("  --save-config         Write the effective settings to config.toml");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  F5                    Toggle fast mode");
    eprintln!("  F7                    Open/close the lid");
    eprintln!("  PageUp/PageDown       Roll the platen");
    eprintln!("  F10                   Power off");
    eprintln!();
    eprintln!("Configuration: ~/.ttyemu/config.toml");
    eprintln!("Log:           ~/.ttyemu/ttyemu.log");
}

fn parse_args() -> Result<Args, String> {
    parse_arg_list(env::args().skip(1))
}

fn parse_arg_list(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let args: Vec<String> = args.into_iter().collect();
    let mut parsed = Args::default();
    let mut i = 0;

    let value = |i: usize, flag: &str| -> Result<String, String> {
        args.get(i)
            .cloned()
            .ok_or_else(|| format!("Missing argument for {}", flag))
    };

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "--loopback" => {
                parsed.backend = Some(BackendKind::Loopback);
            }
            "--connect" => {
                i += 1;
                parsed.address = Some(value(i, "--connect")?);
                parsed.backend = Some(BackendKind::Stream);
            }
            "--pipe" => {
                i += 1;
                parsed.command = Some(value(i, "--pipe")?);
                parsed.backend = Some(BackendKind::Pipe);
            }
            "--crmod" => parsed.crmod = true,
            "--lecho" => parsed.lecho = true,
            "--plain" => parsed.plain = true,
            "--no-sound" => parsed.no_sound = true,
            "--schemes" => parsed.list_schemes = true,
            "--save-config" => parsed.save_config = true,
            "--sounds" => {
                i += 1;
                parsed.sounds = Some(PathBuf::from(value(i, "--sounds")?));
            }
            "--columns" => {
                i += 1;
                let n = value(i, "--columns")?;
                let n: usize = n
                    .parse()
                    .map_err(|_| format!("Invalid column count: {}", n))?;
                if n == 0 {
                    return Err("Column count must be at least 1".to_string());
                }
                parsed.columns = Some(n);
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Command line overrides config file
fn merge(mut config: TtyConfig, args: &Args) -> TtyConfig {
    if let Some(kind) = args.backend {
        config.backend.kind = kind;
    }
    if let Some(address) = &args.address {
        match address.rsplit_once(':').map(|(host, port)| (host, port.parse::<u16>())) {
            Some((host, Ok(port))) => {
                config.backend.host = host.to_string();
                config.backend.port = port;
            }
            _ => config.backend.host = address.clone(),
        }
    }
    if let Some(command) = &args.command {
        config.backend.command = Some(command.clone());
    }
    config.backend.crmod |= args.crmod;
    config.backend.lecho |= args.lecho;
    if args.no_sound {
        config.sound.enabled = false;
    }
    if let Some(dir) = &args.sounds {
        config.sound.dir = Some(dir.clone());
    }
    if let Some(columns) = args.columns {
        config.columns = columns;
    }
    config
}

fn init_logging() {
    let log_path = config::config_dir()
        .map(|dir| dir.join("ttyemu.log"))
        .unwrap_or_else(|| PathBuf::from("ttyemu.log"));

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn build_backend(config: &TtyConfig) -> anyhow::Result<Box<dyn Backend>> {
    let backend = &config.backend;
    Ok(match backend.kind {
        BackendKind::Loopback => Box::new(LoopbackBackend::new()),
        BackendKind::Stream => {
            Box::new(StreamBackend::new(backend.address()).with_pacing(config.pacing()))
        }
        BackendKind::Pipe => {
            let command = backend
                .command
                .clone()
                .ok_or_else(|| anyhow::anyhow!("The pipe backend needs a command"))?;
            Box::new(
                PipeBackend::new(command)
                    .crmod(backend.crmod)
                    .lecho(backend.lecho)
                    .with_pacing(config.pacing()),
            )
        }
    })
}

type OutputMixer = Box<dyn Mixer>;

/// The sound card when available, otherwise the tracing mixer
fn open_mixer() -> OutputMixer {
    #[cfg(feature = "audio")]
    {
        match crate::sound::DeviceMixer::open() {
            Ok(mixer) => return Box::new(mixer),
            Err(e) => tracing::warn!("{}; sound cues go to the log only", e),
        }
    }
    #[cfg(not(feature = "audio"))]
    {
        info!("Built without audio output; sound cues go to the log only");
    }
    Box::new(TraceMixer)
}

fn build_sounds(config: &TtyConfig) -> SoundEngine<OutputMixer> {
    if !config.sound.enabled {
        info!("Sound disabled");
        return SoundEngine::disabled();
    }
    let dir = config.sound_dir();
    info!("Loading sounds from {}", dir.display());
    SoundEngine::from_bank(SoundBank::load_dir(&dir), open_mixer(), config.sound.lid)
}

fn run_session<P: Presentation>(
    frontend: P,
    inbox: Inbox,
    backend: Box<dyn Backend>,
    sounds: SoundEngine<OutputMixer>,
    columns: usize,
) -> anyhow::Result<()> {
    let mut session = Session::new(frontend, inbox, backend, sounds, columns);
    session.run()
}

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    if args.list_schemes {
        for name in PaperScheme::available_schemes() {
            println!("{}", name);
        }
        return Ok(());
    }

    init_logging();
    info!("ttyemu {} starting...", VERSION);

    let config = merge(TtyConfig::load(), &args);
    if args.save_config {
        config.save()?;
        if let Some(path) = TtyConfig::config_path() {
            eprintln!("Saved {}", path.display());
        }
        return Ok(());
    }
    info!("Transport: {:?}", config.backend.kind);
    info!("Platen: {} columns", config.columns);

    let backend = build_backend(&config)?;
    let sounds = build_sounds(&config);
    let (outbox, inbox) = mailbox();

    let result = if args.plain {
        run_session(PlainFrontend::new(outbox), inbox, backend, sounds, config.columns)
    } else {
        let paper = config.paper.resolve();
        let frontend = ConsoleFrontend::new(outbox, paper, config.columns, config.lines_per_screen);
        run_session(frontend, inbox, backend, sounds, config.columns)
    };

    if let Err(e) = &result {
        error!("Session failed: {:#}", e);
    }
    result
}
