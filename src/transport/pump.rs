//! Transport read loop
//!
//! Every byte-stream backend runs the same loop on its reader thread: read,
//! decode, hand off, and wait out the machine's print time unless fast mode
//! is on.

use std::io::{ErrorKind, Read};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::core::contracts::{FastMode, Outbox};

/// Time an ASR-33 takes to print one character at 110 baud
pub const DEFAULT_PACING: Duration = Duration::from_millis(105);

/// Bytes taken per read in fast mode
pub const BULK_READ: usize = 1024;

/// Decode 7-bit ASCII; other bytes become U+FFFD
pub fn decode_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
        .collect()
}

/// Turn bare newlines into carriage return plus newline
pub fn expand_newlines(text: &str) -> String {
    text.replace('\n', "\r\n")
}

/// Read until end of stream or error, posting decoded text.
///
/// Returns when the source is exhausted; the caller decides whether to post
/// the disconnect notice.
pub fn pump<R: Read>(
    mut reader: R,
    outbox: &Outbox,
    fast: &FastMode,
    pacing: Duration,
    crmod: bool,
) {
    let mut buffer = [0u8; BULK_READ];
    loop {
        let bulk = fast.is_set();
        let want = if bulk { BULK_READ } else { 1 };
        match reader.read(&mut buffer[..want]) {
            Ok(0) => {
                debug!("End of stream");
                break;
            }
            Ok(n) => {
                let text = decode_ascii(&buffer[..n]);
                if crmod {
                    outbox.post_characters(&expand_newlines(&text));
                } else {
                    outbox.post_characters(&text);
                }
                if !bulk && !pacing.is_zero() {
                    thread::sleep(pacing);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Read failed: {}", e);
                break;
            }
        }
    }
}
