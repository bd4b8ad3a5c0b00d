//! Loopback backend: the keyboard prints straight onto the paper.

use tracing::debug;

use crate::core::contracts::{Backend, BackendError, FastMode, Outbox};

#[derive(Debug, Default)]
pub struct LoopbackBackend {
    fast: FastMode,
    outbox: Option<Outbox>,
}

impl LoopbackBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for LoopbackBackend {
    fn write_char(&mut self, ch: char) {
        if let Some(outbox) = &self.outbox {
            let mut buf = [0u8; 4];
            outbox.post_characters(ch.encode_utf8(&mut buf));
        }
    }

    fn fast_mode(&self) -> &FastMode {
        &self.fast
    }

    /// Nothing to read, so no thread is needed
    fn start(&mut self, outbox: Outbox) -> Result<(), BackendError> {
        if self.outbox.is_some() {
            return Err(BackendError::AlreadyStarted);
        }
        debug!("Loopback started");
        self.outbox = Some(outbox);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.outbox = None;
    }
}
