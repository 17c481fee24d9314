use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;
use serde::Serialize;

use super::backoff::Backoff;
use super::launcher::{CommandLauncher, Launcher};
use super::process::ManagedProcess;
use super::{ProcessRole, ProcessState};
use crate::cancel::CancelToken;
use crate::config::{BridgeConfig, RelayConfig};
use crate::error::{BridgeError, Result};

/// Point-in-time view of one supervised process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    pub role: ProcessRole,
    pub state: ProcessState,
    pub pid: Option<u32>,
    pub restarts: u32,
}

impl ProcessStatus {
    fn idle(role: ProcessRole) -> Self {
        Self {
            role,
            state: ProcessState::NotStarted,
            pid: None,
            restarts: 0,
        }
    }

    fn of(process: &ManagedProcess) -> Self {
        Self {
            role: process.role(),
            state: process.state(),
            pid: process.pid(),
            restarts: process.restarts(),
        }
    }
}

/// Point-in-time view of the supervisor, as reported by `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorStatus {
    pub active: bool,
    pub relay_server: ProcessStatus,
    pub stream_forwarder: ProcessStatus,
    /// Delay before the next stream-forwarder restart.
    pub forwarder_restart_delay_ms: u64,
}

impl SupervisorStatus {
    fn idle(relay: &RelayConfig) -> Self {
        Self {
            active: false,
            relay_server: ProcessStatus::idle(ProcessRole::RelayServer),
            stream_forwarder: ProcessStatus::idle(ProcessRole::StreamForwarder),
            forwarder_restart_delay_ms: relay.restart_base.min(relay.restart_cap).as_millis()
                as u64,
        }
    }
}

/// The two processes, relay-server first.
///
/// Owned by the monitoring thread while it runs; handed back through its
/// `JoinHandle` on stop.
struct SupervisorState {
    relay_server: ManagedProcess,
    stream_forwarder: ManagedProcess,
}

impl SupervisorState {
    fn new(relay: &RelayConfig) -> Self {
        let backoff = Backoff::new(relay.restart_base, relay.restart_cap);
        Self {
            relay_server: ManagedProcess::new(ProcessRole::RelayServer, backoff),
            stream_forwarder: ManagedProcess::new(ProcessRole::StreamForwarder, backoff),
        }
    }

    fn snapshot(&self, active: bool) -> SupervisorStatus {
        SupervisorStatus {
            active,
            relay_server: ProcessStatus::of(&self.relay_server),
            stream_forwarder: ProcessStatus::of(&self.stream_forwarder),
            forwarder_restart_delay_ms: self.stream_forwarder.restart_delay().as_millis() as u64,
        }
    }

    /// Forwarder first: it publishes into the relay-server.
    fn shutdown(&mut self, relay: &RelayConfig) {
        self.stream_forwarder.terminate(relay.terminate_timeout);
        self.relay_server.terminate(relay.terminate_timeout);
    }
}

struct Running {
    cancel: CancelToken,
    monitor: JoinHandle<SupervisorState>,
}

/// Keeps the relay-server and stream-forwarder alive.
///
/// # Example
///
/// ```no_run
/// use onvif_bridge::{BridgeConfig, relay::Supervisor};
///
/// let mut supervisor = Supervisor::for_config(&BridgeConfig::default())?;
/// supervisor.start()?;
/// // ...
/// supervisor.stop();
/// # Ok::<(), onvif_bridge::BridgeError>(())
/// ```
pub struct Supervisor {
    relay: RelayConfig,
    launcher: Arc<dyn Launcher>,
    status: Arc<RwLock<SupervisorStatus>>,
    running: Option<Running>,
}

impl Supervisor {
    pub fn new(relay: RelayConfig, launcher: Arc<dyn Launcher>) -> Self {
        let status = Arc::new(RwLock::new(SupervisorStatus::idle(&relay)));
        Self {
            relay,
            launcher,
            status,
            running: None,
        }
    }

    /// Supervisor running `mediamtx` and `ffmpeg` for `config`.
    pub fn for_config(config: &BridgeConfig) -> Result<Self> {
        let launcher = CommandLauncher::mediamtx_ffmpeg(config)?;
        Ok(Self::new(config.relay.clone(), Arc::new(launcher)))
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn status(&self) -> SupervisorStatus {
        self.status.read().clone()
    }

    /// Shared handle to the live status, for readers on other threads.
    pub fn status_handle(&self) -> Arc<RwLock<SupervisorStatus>> {
        self.status.clone()
    }

    /// Start both processes in order and begin monitoring.
    ///
    /// On error nothing is left running.
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(BridgeError::AlreadyRunning);
        }

        self.launcher.locate()?;

        let cancel = CancelToken::new();
        let mut state = SupervisorState::new(&self.relay);
        if let Err(e) = self.start_processes(&mut state, &cancel) {
            state.shutdown(&self.relay);
            *self.status.write() = state.snapshot(false);
            return Err(e);
        }
        *self.status.write() = state.snapshot(true);

        let monitor = Monitor {
            relay: self.relay.clone(),
            launcher: self.launcher.clone(),
            status: self.status.clone(),
            cancel: cancel.clone(),
        };
        let handle = thread::Builder::new()
            .name("relay-monitor".to_string())
            .spawn(move || monitor.run(state));

        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                // Dropping the closure dropped the state, which kills both
                // processes.
                tracing::error!(error = %e, "failed to spawn relay monitor");
                self.status.write().active = false;
                return Err(e.into());
            }
        };

        tracing::info!(
            interval_ms = self.relay.monitor_interval.as_millis() as u64,
            "relay supervisor started"
        );
        self.running = Some(Running {
            cancel,
            monitor: handle,
        });
        Ok(())
    }

    fn start_processes(&self, state: &mut SupervisorState, cancel: &CancelToken) -> Result<()> {
        let launcher = self.launcher.as_ref();

        state.relay_server.spawn(launcher)?;
        cancel.sleep(self.relay.server_grace);
        check_started(&mut state.relay_server)?;

        cancel.sleep(self.relay.warmup);

        state.stream_forwarder.spawn(launcher)?;
        cancel.sleep(self.relay.forwarder_grace);
        check_started(&mut state.stream_forwarder)?;

        Ok(())
    }

    /// Stop monitoring, then terminate the forwarder and the relay-server.
    ///
    /// No-op when not running.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.cancel.cancel();
        match running.monitor.join() {
            Ok(mut state) => {
                state.shutdown(&self.relay);
                *self.status.write() = state.snapshot(false);
            }
            Err(_) => {
                tracing::error!("relay monitor panicked; relay processes killed during unwind");
                self.status.write().active = false;
            }
        }
        tracing::info!("relay supervisor stopped");
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn check_started(process: &mut ManagedProcess) -> Result<()> {
    match process.poll() {
        ProcessState::Exited(code) => {
            let stderr = process.stderr_tail();
            tracing::error!(
                role = %process.role(),
                ?code,
                %stderr,
                "process exited during startup"
            );
            Err(BridgeError::ProcessStart {
                role: process.role(),
                code,
                stderr,
            })
        }
        _ => Ok(()),
    }
}

/// The monitoring loop and what it needs besides the process state.
struct Monitor {
    relay: RelayConfig,
    launcher: Arc<dyn Launcher>,
    status: Arc<RwLock<SupervisorStatus>>,
    cancel: CancelToken,
}

impl Monitor {
    fn run(self, mut state: SupervisorState) -> SupervisorState {
        while self.cancel.sleep(self.relay.monitor_interval) {
            self.tick(&mut state);
            self.publish(&state);
        }
        tracing::debug!("relay monitor exiting");
        state
    }

    fn publish(&self, state: &SupervisorState) {
        *self.status.write() = state.snapshot(!self.cancel.is_cancelled());
    }

    fn tick(&self, state: &mut SupervisorState) {
        let launcher = self.launcher.as_ref();

        if let ProcessState::Exited(code) = state.relay_server.poll() {
            self.publish(state);
            let server = &mut state.relay_server;
            tracing::warn!(
                role = %server.role(),
                ?code,
                stderr = %server.stderr_tail(),
                "relay-server exited, restarting"
            );
            match self.cancel.unless_cancelled(|| server.spawn(launcher)) {
                None => return,
                Some(Err(e)) => tracing::error!(error = %e, "failed to restart relay-server"),
                Some(Ok(())) => {
                    self.publish(state);
                    if !self.cancel.sleep(self.relay.settle) {
                        return;
                    }
                }
            }
        }

        match state.stream_forwarder.poll() {
            ProcessState::Exited(code) => {
                // Visible as exited for the whole restart delay.
                self.publish(state);
                let forwarder = &mut state.stream_forwarder;
                let delay = forwarder.restart_delay();
                tracing::warn!(
                    role = %forwarder.role(),
                    ?code,
                    stderr = %forwarder.stderr_tail(),
                    delay_ms = delay.as_millis() as u64,
                    "stream-forwarder exited, restarting after delay"
                );
                if !self.cancel.sleep(delay) {
                    return;
                }
                match self.cancel.unless_cancelled(|| forwarder.spawn(launcher)) {
                    None => return,
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "failed to restart stream-forwarder")
                    }
                    Some(Ok(())) => {}
                }
                forwarder.backoff_mut().advance();
            }
            ProcessState::Running => {
                let forwarder = &mut state.stream_forwarder;
                if !forwarder.backoff_mut().is_at_base() {
                    tracing::info!("stream-forwarder healthy, restart delay reset");
                    forwarder.backoff_mut().reset();
                }
            }
            ProcessState::NotStarted | ProcessState::Stopped => {}
        }
    }
}
