//! Local subprocess backend
//!
//! Keystrokes go to the child's stdin; its stdout and stderr are both
//! printed. Unix programs expect newline where a teletype sends carriage
//! return, so `crmod` translates in both directions.

use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::pump::{expand_newlines, pump, DEFAULT_PACING};
use crate::core::contracts::{Backend, BackendError, FastMode, Outbox};

/// Value of TERM handed to the child
pub const CHILD_TERM: &str = "tty33";

/// How long teardown waits for the readers to see end of file
const READER_GRACE: Duration = Duration::from_millis(500);

pub struct PipeBackend {
    command: String,
    crmod: bool,
    lecho: bool,
    fast: FastMode,
    pacing: Duration,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    echo: Option<Outbox>,
    readers: Vec<JoinHandle<()>>,
}

impl PipeBackend {
    /// `command` is run through the shell
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            crmod: false,
            lecho: false,
            fast: FastMode::new(),
            pacing: DEFAULT_PACING,
            child: None,
            stdin: None,
            echo: None,
            readers: Vec::new(),
        }
    }

    /// Translate CR to LF on input and LF to CR LF on output
    pub fn crmod(mut self, enabled: bool) -> Self {
        self.crmod = enabled;
        self
    }

    /// Echo keystrokes locally instead of relying on the child
    pub fn lecho(mut self, enabled: bool) -> Self {
        self.lecho = enabled;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    fn build_command(&self) -> Command {
        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.command);
            cmd
        };
        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&self.command);
            cmd
        };
        cmd.env("TERM", CHILD_TERM)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so teardown reaches everything the shell starts
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    fn spawn_reader<R>(
        &mut self,
        name: &str,
        source: R,
        outbox: Outbox,
        notify: bool,
    ) -> Result<(), BackendError>
    where
        R: std::io::Read + Send + 'static,
    {
        let fast = self.fast.clone();
        let pacing = self.pacing;
        let crmod = self.crmod;
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                pump(source, &outbox, &fast, pacing, crmod);
                if notify {
                    outbox.post_disconnect();
                }
            })
            .map_err(BackendError::Thread)?;
        self.readers.push(handle);
        Ok(())
    }
}

impl Backend for PipeBackend {
    fn write_char(&mut self, ch: char) {
        let ch = if self.crmod && ch == '\r' { '\n' } else { ch };
        let mut buf = [0u8; 4];
        let encoded = ch.encode_utf8(&mut buf);

        if let Some(stdin) = self.stdin.as_mut() {
            let written = stdin.write_all(encoded.as_bytes()).and_then(|_| stdin.flush());
            if let Err(e) = written {
                warn!("Write to '{}' failed: {}", self.command, e);
                self.stdin = None;
            }
        }

        if self.lecho {
            if let Some(outbox) = &self.echo {
                if self.crmod {
                    outbox.post_characters(&expand_newlines(encoded));
                } else {
                    outbox.post_characters(encoded);
                }
            }
        }
    }

    fn fast_mode(&self) -> &FastMode {
        &self.fast
    }

    fn start(&mut self, outbox: Outbox) -> Result<(), BackendError> {
        if self.child.is_some() {
            return Err(BackendError::AlreadyStarted);
        }

        let mut child = self.build_command().spawn().map_err(|source| BackendError::Spawn {
            command: self.command.clone(),
            source,
        })?;
        info!("Spawned '{}' (pid {})", self.command, child.id());

        self.stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        self.child = Some(child);
        self.echo = Some(outbox.clone());

        // Only stdout announces the end; stderr closes alongside it
        if let Some(stderr) = stderr {
            self.spawn_reader("pipe-stderr", stderr, outbox.clone(), false)?;
        }
        match stdout {
            Some(stdout) => self.spawn_reader("pipe-stdout", stdout, outbox, true)?,
            None => outbox.post_disconnect(),
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        // Closing stdin lets well-behaved children exit on their own
        self.stdin = None;
        self.echo = None;
        if let Some(mut child) = self.child.take() {
            kill_group(&child);
            if let Err(e) = child.kill() {
                debug!("kill '{}': {}", self.command, e);
            }
            match child.wait() {
                Ok(status) => debug!("'{}' exited: {}", self.command, status),
                Err(e) => warn!("wait '{}': {}", self.command, e),
            }
        }

        // A descendant outside the group may still hold the pipes open;
        // such a reader is left to finish on its own
        let deadline = Instant::now() + READER_GRACE;
        for handle in self.readers.drain(..) {
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            if !handle.is_finished() {
                warn!("Pipe reader still blocked, detaching it");
                continue;
            }
            if handle.join().is_err() {
                warn!("Pipe reader thread panicked");
            }
        }
    }
}

/// Kill the child's whole process group
#[cfg(unix)]
fn kill_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: kill(2) takes no pointers; a negative pid names the group
    // created for this child in build_command
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        debug!("killpg {}: {}", pgid, std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

impl Drop for PipeBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::contracts::{mailbox, Inbound, DISCONNECT_NOTICE};
    use crate::transport::testing::{collect_until, collect_until_disconnect};

    #[test]
    fn test_cat_with_crmod() {
        let (outbox, mut inbox) = mailbox();
        let mut backend = PipeBackend::new("cat").crmod(true).with_pacing(Duration::ZERO);
        backend.start(outbox).unwrap();
        for ch in "HI\r".chars() {
            backend.write_char(ch);
        }

        let text = collect_until(&mut inbox, Duration::from_secs(5), |t| t.contains("\r\n"));
        assert_eq!(text, "HI\r\n");

        backend.shutdown();
        assert!(inbox.drain().contains(&Inbound::Disconnected));
    }

    #[test]
    fn test_child_exit_posts_notice_once() {
        let (outbox, mut inbox) = mailbox();
        let mut backend = PipeBackend::new("echo out; echo err 1>&2")
            .crmod(true)
            .with_pacing(Duration::ZERO);
        backend.start(outbox).unwrap();

        let text = collect_until_disconnect(&mut inbox, Duration::from_secs(5));
        assert_eq!(text.matches(DISCONNECT_NOTICE).count(), 1);
        assert!(text.contains("out\r\n"));
        backend.shutdown();
    }

    #[test]
    fn test_local_echo() {
        let (outbox, mut inbox) = mailbox();
        let mut backend = PipeBackend::new("cat > /dev/null")
            .crmod(true)
            .lecho(true)
            .with_pacing(Duration::ZERO);
        backend.start(outbox).unwrap();
        backend.write_char('A');
        backend.write_char('\r');
        assert_eq!(
            inbox.drain(),
            vec![Inbound::Text("A".into()), Inbound::Text("\r\n".into())]
        );
        backend.shutdown();
    }

    #[test]
    fn test_shutdown_reaches_grandchildren() {
        let (outbox, mut inbox) = mailbox();
        let mut backend = PipeBackend::new("sleep 30; true").with_pacing(Duration::ZERO);
        backend.start(outbox).unwrap();
        thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        backend.shutdown();
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "shutdown took {:?}",
            started.elapsed()
        );
        assert!(backend.readers.is_empty());
        assert!(inbox.drain().contains(&Inbound::Disconnected));
    }

    #[test]
    fn test_start_twice() {
        let (outbox, _inbox) = mailbox();
        let mut backend = PipeBackend::new("cat").with_pacing(Duration::ZERO);
        backend.start(outbox.clone()).unwrap();
        assert!(matches!(
            backend.start(outbox),
            Err(BackendError::AlreadyStarted)
        ));
        backend.shutdown();
    }
}
