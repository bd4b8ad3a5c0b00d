//! Core teletype emulation components.
//!
//! - **line**: Overstrike line model (extents of stacked glyphs)
//! - **terminal**: Cursor, scroll and paper state driven by printed characters
//! - **contracts**: Frontend/Backend capabilities and the inbound queue
//! - **session**: The loop coupling a presentation layer to a transport
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── Terminal<P: Presentation>
//! │   └── BTreeMap<line, Line>
//! │       └── Extent (start column + cells of struck glyphs)
//! ├── Box<dyn Backend> (I/O thread posts into the Outbox)
//! ├── Inbox (drained once per loop iteration)
//! └── SoundEngine<M: Mixer>
//! ```

pub mod contracts;
pub mod line;
pub mod session;
pub mod terminal;
