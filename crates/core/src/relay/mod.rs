//! Relay supervision: a local RTSP server plus a stream forwarder.
//!
//! The bridge does not touch media itself. It runs two external processes:
//!
//! ```text
//! camera --RTSP/TCP--> stream-forwarder --RTSP/TCP--> relay-server <-- ONVIF clients
//!                      (ffmpeg, -c:v copy)            (mediamtx, /stream)
//! ```
//!
//! The [`Supervisor`] starts them in that order (relay-server first, since
//! the forwarder publishes into it), watches both on a fixed interval, and
//! restarts whichever one dies. Forwarder restarts back off exponentially
//! because the usual cause is an unreachable camera.
//!
//! Process creation sits behind the [`Launcher`] trait so the supervisor's
//! policy can be exercised without `mediamtx` or `ffmpeg` installed.

pub mod backoff;
pub mod launcher;
pub mod process;
pub mod supervisor;

use std::fmt;

use serde::Serialize;

pub use backoff::Backoff;
pub use launcher::{CommandLauncher, CommandSpec, Launcher};
pub use process::{ChildProcess, ManagedProcess, SystemChild};
pub use supervisor::{ProcessStatus, Supervisor, SupervisorStatus};

/// Which of the two supervised processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessRole {
    /// Local RTSP server clients connect to.
    RelayServer,
    /// Pulls the camera stream and publishes it into the relay-server.
    StreamForwarder,
}

impl ProcessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelayServer => "relay-server",
            Self::StreamForwarder => "stream-forwarder",
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a supervised process.
///
/// ```text
/// NotStarted --spawn--> Running --exit--> Exited(code) --spawn--> Running
///                          \                  /
///                           +---terminate---> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    NotStarted,
    Running,
    /// Exited on its own. `None` when killed by a signal.
    Exited(Option<i32>),
    /// Terminated by the supervisor.
    Stopped,
}
