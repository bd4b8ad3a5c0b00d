//! TCP character stream backend
//!
//! Raw bytes both ways, no telnet option negotiation. Reading happens on a
//! cloned handle; shutting the socket down unblocks the reader.

use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::pump::{pump, DEFAULT_PACING};
use crate::core::contracts::{Backend, BackendError, FastMode, Outbox};

pub struct StreamBackend {
    addr: String,
    fast: FastMode,
    pacing: Duration,
    stream: Option<TcpStream>,
    write_failed: bool,
    reader: Option<JoinHandle<()>>,
}

impl StreamBackend {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            fast: FastMode::new(),
            pacing: DEFAULT_PACING,
            stream: None,
            write_failed: false,
            reader: None,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Backend for StreamBackend {
    fn write_char(&mut self, ch: char) {
        if self.write_failed {
            return;
        }
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        let mut buf = [0u8; 4];
        if let Err(e) = stream.write_all(ch.encode_utf8(&mut buf).as_bytes()) {
            warn!("Write to {} failed: {}", self.addr, e);
            self.write_failed = true;
        }
    }

    fn fast_mode(&self) -> &FastMode {
        &self.fast
    }

    fn start(&mut self, outbox: Outbox) -> Result<(), BackendError> {
        if self.reader.is_some() {
            return Err(BackendError::AlreadyStarted);
        }

        let connect_error = |source| BackendError::Connect {
            addr: self.addr.clone(),
            source,
        };
        let stream = TcpStream::connect(&self.addr).map_err(connect_error)?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {}", e);
        }
        let read_half = stream.try_clone().map_err(connect_error)?;
        info!("Connected to {}", self.addr);

        let fast = self.fast.clone();
        let pacing = self.pacing;
        let handle = thread::Builder::new()
            .name("stream-reader".into())
            .spawn(move || {
                pump(read_half, &outbox, &fast, pacing, false);
                outbox.post_disconnect();
            })
            .map_err(BackendError::Thread)?;

        self.stream = Some(stream);
        self.reader = Some(handle);
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(stream) = self.stream.take() {
            // Wakes the reader blocked in read()
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                warn!("Stream reader thread panicked");
            }
        }
        debug!("Stream to {} closed", self.addr);
    }
}

impl Drop for StreamBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contracts::{mailbox, Inbound, DISCONNECT_NOTICE};
    use crate::transport::testing::collect_until_disconnect;
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn test_exchange_then_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = thread::spawn(move || {
            let (mut peer, _) = listener.accept().unwrap();
            let mut key = [0u8; 1];
            peer.read_exact(&mut key).unwrap();
            peer.write_all(b"GOT ").unwrap();
            peer.write_all(&key).unwrap();
            key[0]
        });

        let (outbox, mut inbox) = mailbox();
        let mut backend = StreamBackend::new(addr).with_pacing(Duration::ZERO);
        backend.start(outbox.clone()).unwrap();
        backend.write_char('x');

        let text = collect_until_disconnect(&mut inbox, Duration::from_secs(5));
        assert_eq!(text, format!("GOT x{}", DISCONNECT_NOTICE));
        assert_eq!(server.join().unwrap(), b'x');

        assert!(matches!(
            backend.start(outbox),
            Err(BackendError::AlreadyStarted)
        ));
        backend.shutdown();
    }

    #[test]
    fn test_shutdown_unblocks_live_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let server = thread::spawn(move || {
            let (peer, _) = listener.accept().unwrap();
            // Hold the connection open without sending anything
            let _ = release_rx.recv();
            drop(peer);
        });

        let (outbox, mut inbox) = mailbox();
        let mut backend = StreamBackend::new(addr);
        backend.start(outbox).unwrap();
        thread::sleep(Duration::from_millis(100));

        let started = std::time::Instant::now();
        backend.shutdown();
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "shutdown took {:?}",
            started.elapsed()
        );
        assert!(inbox.drain().contains(&Inbound::Disconnected));

        release_tx.send(()).unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_connect_failure_names_address() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let (outbox, _inbox) = mailbox();
        let mut backend = StreamBackend::new(addr.clone());
        match backend.start(outbox) {
            Err(BackendError::Connect { addr: failed, .. }) => assert_eq!(failed, addr),
            other => panic!("expected connect error, got {:?}", other.err()),
        }
    }
}
