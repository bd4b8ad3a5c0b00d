//! Presentation layers and input handling.
//!
//! - **console**: Full-screen paper view in the alternate screen
//! - **plain**: Streams glyphs to stdout, keys from stdin
//! - **keymapper**: Console key events to teletype keystrokes and controls

pub mod console;
pub mod keymapper;
pub mod plain;

pub use console::ConsoleFrontend;
pub use plain::PlainFrontend;
