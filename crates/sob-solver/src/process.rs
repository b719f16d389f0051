//! Guarded child processes with timeout and cancellation.

use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cancel::CancelToken;

const POLL_MIN: Duration = Duration::from_millis(10);
const POLL_MAX: Duration = Duration::from_millis(200);

/// How a guarded process ended.
#[derive(Debug)]
pub enum ProcessExit {
    Exited(ExitStatus),
    TimedOut(Duration),
    Cancelled,
}

/// Owns a child and kills it on drop unless it was reaped.
///
/// Children spawned through [`ChildGuard::spawn`] lead their own process
/// group, so termination also reaches anything they started (MPI ranks,
/// wrapper-script workers).
#[derive(Debug)]
pub struct ChildGuard {
    child: Option<Child>,
    group: bool,
}

impl ChildGuard {
    /// Guard a child spawned elsewhere; only that pid is killed.
    pub fn new(child: Child) -> Self {
        Self {
            child: Some(child),
            group: false,
        }
    }

    /// Spawn `cmd` as the leader of a new process group.
    pub fn spawn(cmd: &mut Command) -> io::Result<Self> {
        isolate(cmd);
        Ok(Self {
            child: Some(cmd.spawn()?),
            group: cfg!(unix),
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Non-blocking reap; the guard is disarmed once the child has exited.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        let status = child.try_wait()?;
        if status.is_some() {
            self.child = None;
        }
        Ok(status)
    }

    /// Kill the child (and its group) and reap it. Idempotent.
    pub fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            let pid = child.id();
            let killed = if self.group {
                kill_group(pid)
            } else {
                child.kill()
            };
            if let Err(err) = killed {
                // already exited between the last poll and now
                debug!(pid, error = %err, "kill failed");
                child.kill().ok();
            }
            if let Err(err) = child.wait() {
                warn!(pid, error = %err, "failed to reap terminated child");
            }
        }
    }
}

#[cfg(unix)]
fn isolate(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_group(pgid: u32) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pgid).map_err(io::Error::other)?;
    // SAFETY: killpg takes plain integers and touches no memory of ours.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Limits applied while waiting on a guarded process.
#[derive(Debug, Clone, Default)]
pub struct WaitLimits<'a> {
    pub timeout: Option<Duration>,
    pub cancel: Option<&'a CancelToken>,
}

/// Spawn `cmd` with stdout and stderr written to `log`, then wait.
///
/// The child never outlives this call: timeout, cancellation and every
/// error path go through [`ChildGuard::terminate`].
pub fn run_to_completion(
    mut cmd: Command,
    log: &Path,
    limits: WaitLimits<'_>,
) -> io::Result<ProcessExit> {
    let out = File::create(log)?;
    let err = out.try_clone()?;
    cmd.stdout(Stdio::from(out)).stderr(Stdio::from(err));
    wait_guarded(cmd, limits)
}

/// Like [`run_to_completion`] but stdout goes to its own file, for
/// converters that write their product to stdout.
pub fn run_with_stdout(
    mut cmd: Command,
    stdout: &Path,
    log: &Path,
    limits: WaitLimits<'_>,
) -> io::Result<ProcessExit> {
    cmd.stdout(Stdio::from(File::create(stdout)?))
        .stderr(Stdio::from(File::create(log)?));
    wait_guarded(cmd, limits)
}

fn wait_guarded(mut cmd: Command, limits: WaitLimits<'_>) -> io::Result<ProcessExit> {
    if limits.cancel.is_some_and(CancelToken::is_cancelled) {
        return Ok(ProcessExit::Cancelled);
    }
    cmd.stdin(Stdio::null());

    let mut guard = ChildGuard::spawn(&mut cmd)?;
    debug!(pid = guard.id(), program = ?cmd.get_program(), "process spawned");

    let started = Instant::now();
    let mut poll = POLL_MIN;
    loop {
        if let Some(status) = guard.try_wait()? {
            return Ok(ProcessExit::Exited(status));
        }
        if limits.cancel.is_some_and(CancelToken::is_cancelled) {
            guard.terminate();
            return Ok(ProcessExit::Cancelled);
        }
        let elapsed = started.elapsed();
        let mut sleep = poll;
        if let Some(timeout) = limits.timeout {
            if elapsed >= timeout {
                guard.terminate();
                return Ok(ProcessExit::TimedOut(elapsed));
            }
            sleep = sleep.min(timeout - elapsed);
        }
        thread::sleep(sleep);
        poll = (poll * 2).min(POLL_MAX);
    }
}
