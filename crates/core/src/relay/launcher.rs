use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use tempfile::NamedTempFile;

use super::ProcessRole;
use super::process::{ChildProcess, SystemChild};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};

/// Creates the supervised processes.
///
/// The supervisor only decides *when* to start something; a launcher
/// decides *what* gets started.
pub trait Launcher: Send + Sync {
    /// Check that every executable this launcher needs is available.
    fn locate(&self) -> Result<()>;

    /// Start the process for `role`.
    fn launch(&self, role: ProcessRole) -> Result<Box<dyn ChildProcess>>;
}

/// Program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn resolve(&self) -> Result<PathBuf> {
        which::which(&self.program).map_err(|_| BridgeError::DependencyMissing {
            program: self.program.clone(),
        })
    }
}

/// [`Launcher`] that runs real executables.
pub struct CommandLauncher {
    server: CommandSpec,
    forwarder: CommandSpec,
    // Deleted on drop; must outlive the relay-server.
    _config_file: Option<NamedTempFile>,
}

impl CommandLauncher {
    pub fn new(server: CommandSpec, forwarder: CommandSpec) -> Self {
        Self {
            server,
            forwarder,
            _config_file: None,
        }
    }

    /// `mediamtx` as relay-server, `ffmpeg` as stream-forwarder.
    ///
    /// Writes the relay-server configuration to a temporary file that lives
    /// as long as the launcher.
    pub fn mediamtx_ffmpeg(config: &BridgeConfig) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("onvif-bridge-mediamtx-")
            .suffix(".yml")
            .tempfile()?;
        file.write_all(relay_server_config(config.rtsp_proxy_port).as_bytes())?;
        file.flush()?;
        tracing::debug!(path = %file.path().display(), "wrote relay-server config");

        let server = CommandSpec::new(&config.relay.server_program).arg(file.path());
        let forwarder = CommandSpec::new(&config.relay.forwarder_program)
            .args(forwarder_args(&config.rtsp_url, config.rtsp_proxy_port));

        Ok(Self {
            server,
            forwarder,
            _config_file: Some(file),
        })
    }

    pub fn spec(&self, role: ProcessRole) -> &CommandSpec {
        match role {
            ProcessRole::RelayServer => &self.server,
            ProcessRole::StreamForwarder => &self.forwarder,
        }
    }
}

impl Launcher for CommandLauncher {
    fn locate(&self) -> Result<()> {
        for spec in [&self.server, &self.forwarder] {
            let path = spec.resolve()?;
            tracing::debug!(program = %spec.program, path = %path.display(), "found executable");
        }
        Ok(())
    }

    fn launch(&self, role: ProcessRole) -> Result<Box<dyn ChildProcess>> {
        let spec = self.spec(role);
        let program = spec.resolve()?;
        let mut command = Command::new(program);
        command.args(&spec.args);

        let child = SystemChild::spawn(role, command).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BridgeError::DependencyMissing {
                program: spec.program.clone(),
            },
            _ => BridgeError::Io(e),
        })?;
        Ok(Box::new(child))
    }
}

/// mediamtx configuration: TCP-only RTSP on `port`, one publisher path.
pub fn relay_server_config(port: u16) -> String {
    format!(
        "logLevel: warn\n\
         rtspAddress: :{port}\n\
         protocols: [tcp]\n\
         paths:\n  \
           stream:\n    \
             source: publisher\n"
    )
}

/// ffmpeg arguments: pull `camera_url` over TCP, copy video, drop audio,
/// publish to the local relay-server.
pub fn forwarder_args(camera_url: &str, port: u16) -> Vec<String> {
    [
        "-hide_banner",
        "-loglevel",
        "warning",
        "-rtsp_transport",
        "tcp",
        "-i",
        camera_url,
        "-c:v",
        "copy",
        "-an",
        "-f",
        "rtsp",
        "-rtsp_transport",
        "tcp",
    ]
    .into_iter()
    .map(String::from)
    .chain(std::iter::once(format!("rtsp://127.0.0.1:{port}/stream")))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_server_config_layout() {
        let yaml = relay_server_config(8554);
        assert_eq!(
            yaml,
            "logLevel: warn\nrtspAddress: :8554\nprotocols: [tcp]\npaths:\n  stream:\n    source: publisher\n"
        );
    }

    #[test]
    fn forwarder_pushes_to_local_stream_path() {
        let args = forwarder_args("rtsp://cam/ch1", 9554);
        assert_eq!(
            args[..7],
            [
                "-hide_banner",
                "-loglevel",
                "warning",
                "-rtsp_transport",
                "tcp",
                "-i",
                "rtsp://cam/ch1"
            ]
        );
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("rtsp://127.0.0.1:9554/stream"));
    }

    #[test]
    fn mediamtx_config_file_lives_with_launcher() {
        let config = BridgeConfig {
            rtsp_proxy_port: 8600,
            ..BridgeConfig::default()
        };
        let launcher = CommandLauncher::mediamtx_ffmpeg(&config).unwrap();
        let path = PathBuf::from(&launcher.spec(ProcessRole::RelayServer).args[0]);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("rtspAddress: :8600"));

        drop(launcher);
        assert!(!path.exists());
    }

    #[test]
    fn missing_program_is_reported() {
        let launcher = CommandLauncher::new(
            CommandSpec::new("definitely-not-installed-relay"),
            CommandSpec::new("sh"),
        );
        match launcher.locate() {
            Err(BridgeError::DependencyMissing { program }) => {
                assert_eq!(program, "definitely-not-installed-relay")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
