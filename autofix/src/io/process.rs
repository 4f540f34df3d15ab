//! Child processes with a wall-clock limit and bounded output capture.

use std::borrow::Cow;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

const READ_CHUNK: usize = 8 * 1024;

/// How long readers may keep draining once the child itself is gone.
const READER_GRACE: Duration = Duration::from_secs(2);

/// Leading bytes of one output stream plus a count of what was discarded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BoundedCapture {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

impl BoundedCapture {
    fn push(&mut self, chunk: &[u8], limit: usize) {
        let keep = chunk.len().min(limit.saturating_sub(self.bytes.len()));
        self.bytes.extend_from_slice(&chunk[..keep]);
        self.dropped += chunk.len() - keep;
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// What a finished (or killed) child left behind.
#[derive(Debug)]
pub struct ChildOutcome {
    pub status: ExitStatus,
    pub stdout: BoundedCapture,
    pub stderr: BoundedCapture,
    pub timed_out: bool,
}

impl ChildOutcome {
    /// Stdout, then stderr, each followed by a notice if bytes were dropped.
    pub fn combined_text(&self) -> String {
        let mut buf = String::new();
        for (name, capture) in [("stdout", &self.stdout), ("stderr", &self.stderr)] {
            if capture.bytes.is_empty() && capture.dropped == 0 {
                continue;
            }
            if !buf.is_empty() && !buf.ends_with('\n') {
                buf.push('\n');
            }
            buf.push_str(&capture.text());
            if capture.dropped > 0 {
                buf.push_str(&format!("\n[{name} truncated, {} bytes dropped]\n", capture.dropped));
            }
        }
        buf
    }
}

/// Run `cmd` to completion, killing it once `timeout` elapses.
///
/// On unix the child leads its own process group and the whole group is
/// killed, so grandchildren (`sh` -> `npm` -> `node`) cannot outlive the
/// deadline or hold the pipes open. Stdin is closed. Both pipes are drained
/// on their own threads, each keeping at most `limit` bytes.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), limit))]
pub fn run_bounded(mut cmd: Command, timeout: Duration, limit: usize) -> Result<ChildOutcome> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|err| {
        error!(err = %err, "failed to spawn child");
        anyhow::Error::new(err).context("spawn command")
    })?;
    debug!(pid = child.id(), "child spawned");

    let stdout = Reader::spawn("stdout", child.stdout.take(), limit)?;
    let stderr = Reader::spawn("stderr", child.stderr.take(), limit)?;

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => {
            // Background jobs left behind would keep the pipes open.
            kill_group(&child);
            (status, false)
        }
        None => {
            warn!(timeout_secs = timeout.as_secs(), "deadline passed, killing process group");
            kill_tree(&mut child)?;
            (child.wait().context("reap killed command")?, true)
        }
    };

    let stdout = stdout.finish(READER_GRACE)?;
    let stderr = stderr.finish(READER_GRACE)?;
    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "child output exceeded limit"
        );
    }
    debug!(exit_code = ?status.code(), timed_out, "child finished");

    Ok(ChildOutcome {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

/// A pipe drained on a background thread into a shared bounded buffer.
struct Reader {
    name: &'static str,
    sink: Arc<Mutex<BoundedCapture>>,
    handle: JoinHandle<Result<()>>,
}

impl Reader {
    fn spawn<R: Read + Send + 'static>(
        name: &'static str,
        pipe: Option<R>,
        limit: usize,
    ) -> Result<Self> {
        let mut pipe = pipe.ok_or_else(|| anyhow!("{name} was not piped"))?;
        let sink = Arc::new(Mutex::new(BoundedCapture::default()));
        let thread_sink = Arc::clone(&sink);
        let handle = thread::spawn(move || -> Result<()> {
            let mut chunk = [0u8; READ_CHUNK];
            loop {
                let n = pipe.read(&mut chunk).context("read child output")?;
                if n == 0 {
                    return Ok(());
                }
                thread_sink
                    .lock()
                    .map_err(|_| anyhow!("capture buffer poisoned"))?
                    .push(&chunk[..n], limit);
            }
        });
        Ok(Self { name, sink, handle })
    }

    /// Wait up to `grace` for EOF, then return whatever was captured.
    ///
    /// A reader still blocked after the grace period is abandoned; its
    /// thread ends when the last writer closes the pipe.
    fn finish(self, grace: Duration) -> Result<BoundedCapture> {
        let give_up = Instant::now() + grace;
        while !self.handle.is_finished() && Instant::now() < give_up {
            thread::sleep(Duration::from_millis(10));
        }
        if self.handle.is_finished() {
            self.handle
                .join()
                .map_err(|_| anyhow!("{} reader thread panicked", self.name))?
                .with_context(|| format!("capture {}", self.name))?;
        } else {
            warn!(stream = self.name, "pipe still open after child exit, keeping partial output");
        }
        let capture = self
            .sink
            .lock()
            .map_err(|_| anyhow!("{} capture buffer poisoned", self.name))?
            .clone();
        Ok(capture)
    }
}

/// Kill the child and, on unix, every process in its group.
fn kill_tree(child: &mut Child) -> Result<()> {
    if kill_group(child) {
        return Ok(());
    }
    child.kill().context("kill command")
}

/// SIGKILL the child's process group. Returns `false` if no signal was sent.
#[cfg(unix)]
fn kill_group(child: &Child) -> bool {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(child.id()) else {
        return false;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => true,
        Err(err) => {
            debug!(pgid, err = %err, "process group not signalled");
            false
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) -> bool {
    false
}
