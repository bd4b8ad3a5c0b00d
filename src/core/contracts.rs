//! Capability contracts between presentation layers and transports
//!
//! A presentation layer implements [`Frontend`] (consumed by the terminal
//! engine) and a transport implements [`Backend`] (consumed by the session
//! loop). The only state crossing threads is the inbound [`Outbox`] queue and
//! the [`FastMode`] flag.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Printed once when a transport's I/O loop ends
pub const DISCONNECT_NOTICE: &str = "Disconnected. Local mode.\r\n";

/// Messages from a transport thread to the session loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Decoded text to print
    Text(String),
    /// The transport's I/O loop has finished
    Disconnected,
}

/// Sending half of the inbound queue. Cheap to clone, safe to move to a
/// transport thread, never blocks.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: Sender<Inbound>,
}

impl Outbox {
    /// Enqueue text for printing
    pub fn post_characters(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        // A closed receiver means the session is tearing down
        let _ = self.tx.send(Inbound::Text(text.to_string()));
    }

    /// Enqueue the final notice followed by the end-of-session marker
    pub fn post_disconnect(&self) {
        let _ = self.tx.send(Inbound::Text(DISCONNECT_NOTICE.to_string()));
        let _ = self.tx.send(Inbound::Disconnected);
    }
}

/// Receiving half of the inbound queue, owned by the session loop
pub struct Inbox {
    rx: Receiver<Inbound>,
}

impl Inbox {
    /// Take everything queued so far without blocking
    pub fn drain(&mut self) -> Vec<Inbound> {
        let mut messages = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        messages
    }
}

/// Create a connected outbox/inbox pair
pub fn mailbox() -> (Outbox, Inbox) {
    let (tx, rx) = mpsc::channel();
    (Outbox { tx }, Inbox { rx })
}

/// Shared bulk-delivery flag. Unset, transports pace bytes like the real
/// machine; set, they deliver whatever is available.
#[derive(Clone, Debug, Default)]
pub struct FastMode(Arc<AtomicBool>);

impl FastMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, fast: bool) {
        self.0.store(fast, Ordering::SeqCst);
    }

    /// Flip the flag, returning the new value
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::SeqCst)
    }
}

/// What the terminal engine needs from a presentation layer
pub trait Frontend {
    /// Handle for transports to enqueue inbound text
    fn outbox(&self) -> &Outbox;

    /// Enqueue inbound text; processed later on the presentation loop
    fn post_characters(&self, text: &str) {
        self.outbox().post_characters(text);
    }

    /// A glyph was struck at an absolute line and column. Spaces leave no
    /// ink and are never reported; the line model still records them.
    fn draw_char(&mut self, line: usize, column: usize, ch: char);

    /// Show the page starting at `scroll_base` with the cursor at the given position
    fn refresh_screen(&mut self, scroll_base: usize, cursor_line: usize, cursor_column: usize);

    /// Number of visible lines (at least 1)
    fn lines_per_screen(&self) -> usize;

    /// Discard everything drawn so far
    fn reinit(&mut self);
}

/// Input from the person at the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent {
    /// A key that sends a character
    Key(char),
    /// Toggle bulk delivery
    ToggleFastMode,
    /// Open or close the lid
    ToggleLid,
    /// Hand-roll the platen back
    PageUp,
    /// Hand-roll the platen forward
    PageDown,
    /// The display changed size
    Resized,
    /// Power off
    Quit,
}

/// A frontend that also owns a display and an input source
pub trait Presentation: Frontend {
    fn init(&mut self) -> io::Result<()>;

    fn cleanup(&mut self) -> io::Result<()>;

    /// Wait up to `timeout` for the next input event
    fn poll_event(&mut self, timeout: Duration) -> io::Result<Option<UserEvent>>;
}

/// Transport errors surfaced while starting a session
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to start I/O thread: {0}")]
    Thread(#[source] io::Error),

    #[error("Backend already started")]
    AlreadyStarted,
}

/// What the session needs from a transport
pub trait Backend: Send {
    /// Send one keystroke
    fn write_char(&mut self, ch: char);

    /// The flag shared with this backend's I/O loop
    fn fast_mode(&self) -> &FastMode;

    /// Spawn the I/O loop on its own thread; it posts into `outbox` for the
    /// session's lifetime and ends with [`Outbox::post_disconnect`]
    fn start(&mut self, outbox: Outbox) -> Result<(), BackendError>;

    /// Unblock and join the I/O loop, releasing the connection or process
    fn shutdown(&mut self);
}

#[cfg(test)]
pub mod testing {
    //! In-memory presentation layer for tests

    use std::collections::VecDeque;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Refresh {
        pub scroll_base: usize,
        pub cursor_line: usize,
        pub cursor_column: usize,
    }

    pub struct RecordingFrontend {
        outbox: Outbox,
        pub lines: usize,
        pub draws: Vec<(usize, usize, char)>,
        pub refreshes: Vec<Refresh>,
        pub reinits: usize,
        pub events: VecDeque<UserEvent>,
    }

    impl RecordingFrontend {
        pub fn new(outbox: Outbox, lines: usize) -> Self {
            Self {
                outbox,
                lines,
                draws: Vec::new(),
                refreshes: Vec::new(),
                reinits: 0,
                events: VecDeque::new(),
            }
        }

        pub fn last_refresh(&self) -> Option<Refresh> {
            self.refreshes.last().copied()
        }

        pub fn drawn_text(&self) -> String {
            self.draws.iter().map(|(_, _, ch)| *ch).collect()
        }
    }

    impl Frontend for RecordingFrontend {
        fn outbox(&self) -> &Outbox {
            &self.outbox
        }

        fn draw_char(&mut self, line: usize, column: usize, ch: char) {
            self.draws.push((line, column, ch));
        }

        fn refresh_screen(&mut self, scroll_base: usize, cursor_line: usize, cursor_column: usize) {
            self.refreshes.push(Refresh {
                scroll_base,
                cursor_line,
                cursor_column,
            });
        }

        fn lines_per_screen(&self) -> usize {
            self.lines
        }

        fn reinit(&mut self) {
            self.reinits += 1;
            self.draws.clear();
        }
    }

    impl Presentation for RecordingFrontend {
        fn init(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn cleanup(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn poll_event(&mut self, _timeout: Duration) -> io::Result<Option<UserEvent>> {
            Ok(self.events.pop_front())
        }
    }
}
