//! Session management
//!
//! Couples a presentation layer, a transport and the sound engine, and runs
//! the loop that moves characters between them. Everything here happens on
//! one thread; transports only reach it through the inbox.

use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use super::contracts::{Backend, BackendError, Inbound, Inbox, Presentation, UserEvent};
use super::terminal::Terminal;
use crate::sound::mixer::Mixer;
use crate::sound::SoundEngine;

/// Longest wait for input before the loop checks the inbox again
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A running teletype
pub struct Session<P: Presentation, M: Mixer> {
    terminal: Terminal<P>,
    backend: Box<dyn Backend>,
    sounds: SoundEngine<M>,
    inbox: Inbox,
    /// Cleared by Quit
    running: bool,
    /// Cleared once the transport posts its final notice
    connected: bool,
}

impl<P: Presentation, M: Mixer> Session<P, M> {
    /// `inbox` must be the receiving end of the frontend's outbox
    pub fn new(
        frontend: P,
        inbox: Inbox,
        backend: Box<dyn Backend>,
        sounds: SoundEngine<M>,
        columns: usize,
    ) -> Self {
        Self {
            terminal: Terminal::new(frontend, columns),
            backend,
            sounds,
            inbox,
            running: false,
            connected: false,
        }
    }

    pub fn terminal(&self) -> &Terminal<P> {
        &self.terminal
    }

    pub fn sounds(&self) -> &SoundEngine<M> {
        &self.sounds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Start the transport's I/O loop
    pub fn connect(&mut self) -> Result<(), BackendError> {
        let outbox = self.terminal.frontend().outbox().clone();
        self.backend.start(outbox)?;
        self.connected = true;
        self.running = true;
        Ok(())
    }

    /// Connect, take over the display and run until Quit
    pub fn run(&mut self) -> anyhow::Result<()> {
        self.connect()?;
        self.terminal.frontend_mut().init()?;

        self.terminal.refresh_screen();
        self.sounds.start(Instant::now());
        let result = self.main_loop();

        let linger = self.sounds.stop();
        if !linger.is_zero() {
            thread::sleep(linger);
        }
        self.backend.shutdown();
        let cleanup = self.terminal.frontend_mut().cleanup();

        result?;
        cleanup?;
        info!("Session ended");
        Ok(())
    }

    fn main_loop(&mut self) -> anyhow::Result<()> {
        while self.running {
            let now = Instant::now();
            self.pump_inbound(now);
            self.sounds.tick(now);

            let timeout = self.poll_timeout(Instant::now());
            if let Some(event) = self.terminal.frontend_mut().poll_event(timeout)? {
                self.handle_event(event, Instant::now());
            }
        }
        Ok(())
    }

    /// How long the loop may block before a sound timer needs service
    pub fn poll_timeout(&self, now: Instant) -> Duration {
        match self.sounds.next_deadline() {
            Some(deadline) => deadline.saturating_duration_since(now).min(POLL_INTERVAL),
            None => POLL_INTERVAL,
        }
    }

    /// Print everything the transport has posted. Returns whether any text arrived.
    pub fn pump_inbound(&mut self, now: Instant) -> bool {
        let mut printed = false;
        for message in self.inbox.drain() {
            match message {
                Inbound::Text(text) => {
                    self.terminal.output_chars(&text);
                    self.sounds.print_chars(&text, now);
                    printed = true;
                }
                Inbound::Disconnected => {
                    if self.connected {
                        info!("Transport closed, continuing in local mode");
                    }
                    self.connected = false;
                }
            }
        }
        printed
    }

    pub fn handle_event(&mut self, event: UserEvent, now: Instant) {
        match event {
            UserEvent::Key(ch) => {
                self.sounds.keypress(now);
                if self.connected {
                    self.backend.write_char(ch);
                } else {
                    let mut buf = [0u8; 4];
                    self.terminal.frontend().post_characters(ch.encode_utf8(&mut buf));
                }
            }
            UserEvent::ToggleFastMode => {
                let fast = self.backend.fast_mode().toggle();
                info!("Fast mode {}", if fast { "on" } else { "off" });
            }
            UserEvent::ToggleLid => self.sounds.lid(now),
            UserEvent::PageUp => {
                self.sounds.platen();
                self.terminal.page_up();
            }
            UserEvent::PageDown => {
                self.sounds.platen();
                self.terminal.page_down();
            }
            UserEvent::Resized => {
                self.terminal.scroll_into_view();
                self.terminal.refresh_screen();
            }
            UserEvent::Quit => {
                info!("Power off requested");
                self.running = false;
            }
        }
    }
}
