//! Plain stdout presentation
//!
//! Streams struck glyphs to standard output as they happen and reads
//! keystrokes from standard input, line by line. Useful when stdout is not a
//! console or the output is being captured.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::contracts::{Frontend, Outbox, Presentation, UserEvent};

/// Reported page height
pub const PLAIN_LINES: usize = 24;

/// Turns absolute strikes back into a character stream
#[derive(Debug, Default)]
struct Printhead {
    line: usize,
    column: usize,
}

impl Printhead {
    /// Bytes that move the output from the last strike to `(line, column)`
    /// and print `ch`
    fn strike(&mut self, line: usize, column: usize, ch: char) -> String {
        let mut out = String::new();
        if line > self.line {
            out.extend(std::iter::repeat('\n').take(line - self.line));
            self.line = line;
            self.column = 0;
        }
        if column < self.column {
            out.push('\r');
            self.column = 0;
        }
        out.extend(std::iter::repeat(' ').take(column - self.column));
        out.push(ch);
        self.column = column + 1;
        out
    }
}

pub struct PlainFrontend<W: Write = io::Stdout> {
    outbox: Outbox,
    out: W,
    head: Printhead,
    keys: Option<Receiver<char>>,
}

impl PlainFrontend {
    pub fn new(outbox: Outbox) -> Self {
        Self::with_writer(outbox, io::stdout())
    }
}

impl<W: Write> PlainFrontend<W> {
    pub fn with_writer(outbox: Outbox, out: W) -> Self {
        Self {
            outbox,
            out,
            head: Printhead::default(),
            keys: None,
        }
    }

    fn emit(&mut self, text: &str) {
        let written = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush());
        if let Err(e) = written {
            warn!("stdout write failed: {}", e);
        }
    }
}

/// Reads stdin on its own thread. A line's newline becomes carriage return,
/// the teletype's RETURN key. The sender drops at end of input.
fn spawn_stdin_reader() -> io::Result<Receiver<char>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                for ch in line.chars().chain(std::iter::once('\r')) {
                    if tx.send(ch).is_err() {
                        return;
                    }
                }
            }
            debug!("stdin closed");
        })?;
    Ok(rx)
}

impl<W: Write> Frontend for PlainFrontend<W> {
    fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    fn draw_char(&mut self, line: usize, column: usize, ch: char) {
        let text = self.head.strike(line, column, ch);
        self.emit(&text);
    }

    /// The stream has no window to move
    fn refresh_screen(&mut self, _scroll_base: usize, _cursor_line: usize, _cursor_column: usize) {}

    fn lines_per_screen(&self) -> usize {
        PLAIN_LINES
    }

    fn reinit(&mut self) {
        self.head = Printhead::default();
        self.emit("\n");
    }
}

impl<W: Write> Presentation for PlainFrontend<W> {
    fn init(&mut self) -> io::Result<()> {
        if self.keys.is_none() {
            self.keys = Some(spawn_stdin_reader()?);
        }
        Ok(())
    }

    fn cleanup(&mut self) -> io::Result<()> {
        self.out.write_all(b"\n")?;
        self.out.flush()
    }

    /// End of input powers the machine off
    fn poll_event(&mut self, timeout: Duration) -> io::Result<Option<UserEvent>> {
        let Some(keys) = &self.keys else {
            thread::sleep(timeout);
            return Ok(None);
        };
        match keys.recv_timeout(timeout) {
            Ok(ch) => Ok(Some(UserEvent::Key(ch))),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Ok(Some(UserEvent::Quit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contracts::mailbox;

    fn plain() -> PlainFrontend<Vec<u8>> {
        let (outbox, _inbox) = mailbox();
        PlainFrontend::with_writer(outbox, Vec::new())
    }

    fn output(frontend: &PlainFrontend<Vec<u8>>) -> String {
        String::from_utf8(frontend.out.clone()).unwrap()
    }

    #[test]
    fn test_strikes_become_stream() {
        let mut frontend = plain();
        frontend.draw_char(0, 0, 'H');
        frontend.draw_char(0, 1, 'I');
        frontend.draw_char(0, 4, 'X');
        frontend.draw_char(2, 1, 'Y');
        assert_eq!(output(&frontend), "HI  X\n\n Y");
    }

    #[test]
    fn test_overstrike_returns_carriage() {
        let mut frontend = plain();
        frontend.draw_char(0, 0, 'A');
        frontend.draw_char(0, 1, 'B');
        frontend.draw_char(0, 0, '_');
        assert_eq!(output(&frontend), "AB\r_");
    }

    #[test]
    fn test_reinit_restarts_stream() {
        let mut frontend = plain();
        frontend.draw_char(3, 2, 'A');
        frontend.reinit();
        frontend.draw_char(0, 0, 'B');
        assert_eq!(output(&frontend), "\n\n\n  A\nB");
        assert_eq!(frontend.lines_per_screen(), PLAIN_LINES);
    }

    #[test]
    fn test_poll_without_reader() {
        let mut frontend = plain();
        assert_eq!(frontend.poll_event(Duration::ZERO).unwrap(), None);
    }
}
