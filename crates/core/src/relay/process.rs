use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::backoff::Backoff;
use super::launcher::Launcher;
use super::{ProcessRole, ProcessState};
use crate::error::Result;

/// Lines of stderr kept per process for exit diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// Poll period while waiting for a terminated process to exit.
const EXIT_POLL: Duration = Duration::from_millis(50);

/// A running external process, as seen by the supervisor.
pub trait ChildProcess: Send {
    fn id(&self) -> u32;

    /// Non-blocking liveness check.
    ///
    /// `Ok(None)` while running, `Ok(Some(code))` once exited (`code` is
    /// `None` when the process was killed by a signal).
    fn try_wait(&mut self) -> io::Result<Option<Option<i32>>>;

    /// Ask the process to shut down (SIGTERM on Unix).
    fn terminate(&mut self) -> io::Result<()>;

    /// Force the process down (SIGKILL on Unix).
    fn kill(&mut self) -> io::Result<()>;

    /// Last lines the process wrote to stderr.
    fn stderr_tail(&self) -> String;
}

/// [`ChildProcess`] backed by a real OS process.
///
/// stderr is drained continuously by a reader thread so a chatty process
/// never blocks on a full pipe. The most recent lines are kept for
/// diagnostics and echoed at debug level.
pub struct SystemChild {
    child: Child,
    stderr: Arc<Mutex<VecDeque<String>>>,
}

impl SystemChild {
    /// Spawn `command` with stdout discarded and stderr captured.
    pub fn spawn(role: ProcessRole, mut command: Command) -> io::Result<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            // Own process group: a terminal Ctrl-C reaches the bridge, not
            // the children, so shutdown order stays under our control.
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn()?;
        let stderr = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));

        let pipe = child.stderr.take();
        let process = Self { child, stderr };

        // From here on a failure drops `process`, which kills the child.
        if let Some(pipe) = pipe {
            let tail = process.stderr.clone();
            let pid = process.child.id();
            thread::Builder::new()
                .name(format!("{role}-stderr"))
                .spawn(move || {
                    for line in BufReader::new(pipe).lines() {
                        let Ok(line) = line else { break };
                        tracing::debug!(%role, pid, "{line}");
                        let mut tail = tail.lock();
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                })?;
        }

        Ok(process)
    }
}

/// A child still running when its handle goes away is killed and reaped.
impl Drop for SystemChild {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            tracing::warn!(pid = self.child.id(), "killing unsupervised child process");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

impl ChildProcess for SystemChild {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn try_wait(&mut self) -> io::Result<Option<Option<i32>>> {
        Ok(self.child.try_wait()?.map(|status| status.code()))
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        kill(Pid::from_raw(self.child.id() as i32), Signal::SIGTERM).map_err(io::Error::from)
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.child.kill()
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.kill()
    }

    fn stderr_tail(&self) -> String {
        self.stderr
            .lock()
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One supervised process: role, lifecycle state, handle, restart delay.
///
/// All liveness checks go through [`poll`](Self::poll); the supervisor never
/// inspects the handle directly.
pub struct ManagedProcess {
    role: ProcessRole,
    state: ProcessState,
    handle: Option<Box<dyn ChildProcess>>,
    backoff: Backoff,
    restarts: u32,
}

impl ManagedProcess {
    pub fn new(role: ProcessRole, backoff: Backoff) -> Self {
        Self {
            role,
            state: ProcessState::NotStarted,
            handle: None,
            backoff,
            restarts: 0,
        }
    }

    pub fn role(&self) -> ProcessRole {
        self.role
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        match self.state {
            ProcessState::Running => self.handle.as_ref().map(|h| h.id()),
            _ => None,
        }
    }

    /// Successful spawns after the first.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn restart_delay(&self) -> Duration {
        self.backoff.current()
    }

    pub fn backoff_mut(&mut self) -> &mut Backoff {
        &mut self.backoff
    }

    /// Launch the process. On failure the previous state is kept.
    pub fn spawn(&mut self, launcher: &dyn Launcher) -> Result<()> {
        let handle = launcher.launch(self.role)?;
        if !matches!(self.state, ProcessState::NotStarted) {
            self.restarts += 1;
        }
        tracing::info!(role = %self.role, pid = handle.id(), "process started");
        self.handle = Some(handle);
        self.state = ProcessState::Running;
        Ok(())
    }

    /// Refresh and return the lifecycle state.
    pub fn poll(&mut self) -> ProcessState {
        if self.state != ProcessState::Running {
            return self.state;
        }
        let Some(handle) = self.handle.as_mut() else {
            return self.state;
        };
        match handle.try_wait() {
            Ok(Some(code)) => self.state = ProcessState::Exited(code),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(role = %self.role, error = %e, "failed to poll process");
            }
        }
        self.state
    }

    pub fn stderr_tail(&self) -> String {
        self.handle
            .as_ref()
            .map(|h| h.stderr_tail())
            .unwrap_or_default()
    }

    /// Stop the process: SIGTERM, wait up to `timeout`, then kill.
    ///
    /// Tolerates a process that already exited or never started.
    pub fn terminate(&mut self, timeout: Duration) {
        let Some(mut handle) = self.handle.take() else {
            self.state = ProcessState::Stopped;
            return;
        };

        if self.poll_handle(handle.as_mut()).is_none() {
            if let Err(e) = handle.terminate() {
                tracing::debug!(role = %self.role, error = %e, "terminate signal failed");
            }

            let deadline = Instant::now() + timeout;
            while self.poll_handle(handle.as_mut()).is_none() {
                if Instant::now() >= deadline {
                    tracing::warn!(
                        role = %self.role,
                        pid = handle.id(),
                        "process ignored SIGTERM, killing"
                    );
                    if let Err(e) = handle.kill() {
                        tracing::error!(role = %self.role, error = %e, "failed to kill process");
                    }
                    let _ = handle.try_wait();
                    break;
                }
                thread::sleep(EXIT_POLL);
            }
        }

        tracing::info!(role = %self.role, "process stopped");
        self.state = ProcessState::Stopped;
    }

    fn poll_handle(&self, handle: &mut dyn ChildProcess) -> Option<Option<i32>> {
        match handle.try_wait() {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(role = %self.role, error = %e, "failed to poll process");
                Some(None)
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    fn wait_exit(child: &mut SystemChild) -> Option<i32> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(code) = child.try_wait().unwrap() {
                return code;
            }
            assert!(Instant::now() < deadline, "process did not exit");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn captures_exit_code_and_stderr() {
        let mut child =
            SystemChild::spawn(ProcessRole::StreamForwarder, sh("echo boom >&2; exit 3")).unwrap();
        assert_eq!(wait_exit(&mut child), Some(3));

        let deadline = Instant::now() + Duration::from_secs(2);
        while child.stderr_tail().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(child.stderr_tail(), "boom");
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let script = sh("for i in $(seq 1 50); do echo line$i >&2; done");
        let mut child = SystemChild::spawn(ProcessRole::RelayServer, script).unwrap();
        wait_exit(&mut child);

        let deadline = Instant::now() + Duration::from_secs(2);
        while !child.stderr_tail().ends_with("line50") && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        let tail = child.stderr_tail();
        assert_eq!(tail.lines().count(), STDERR_TAIL_LINES);
        assert!(tail.starts_with("line31"));
    }

    #[test]
    fn dropping_a_running_child_kills_it() {
        let child =
            SystemChild::spawn(ProcessRole::StreamForwarder, sh("exec sleep 30")).unwrap();
        let pid = nix::unistd::Pid::from_raw(child.id() as i32);
        assert!(nix::sys::signal::kill(pid, None).is_ok());

        drop(child);
        assert!(nix::sys::signal::kill(pid, None).is_err(), "child outlived its handle");
    }

    #[test]
    fn dropping_managed_process_kills_child() {
        struct Sleeper;
        impl Launcher for Sleeper {
            fn locate(&self) -> Result<()> {
                Ok(())
            }
            fn launch(&self, role: ProcessRole) -> Result<Box<dyn ChildProcess>> {
                Ok(Box::new(SystemChild::spawn(role, sh("exec sleep 30"))?))
            }
        }

        let mut process = ManagedProcess::new(
            ProcessRole::RelayServer,
            Backoff::new(Duration::from_secs(1), Duration::from_secs(2)),
        );
        process.spawn(&Sleeper).unwrap();
        let pid = nix::unistd::Pid::from_raw(process.pid().unwrap() as i32);

        drop(process);
        assert!(nix::sys::signal::kill(pid, None).is_err());
    }

    #[test]
    fn terminate_sends_sigterm() {
        let mut child = SystemChild::spawn(ProcessRole::RelayServer, sh("exec sleep 30")).unwrap();
        assert!(child.try_wait().unwrap().is_none());
        child.terminate().unwrap();
        assert_eq!(wait_exit(&mut child), None);
    }
}
