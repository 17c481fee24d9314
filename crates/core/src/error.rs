//! Error types for the ONVIF bridge library.

use std::fmt;
use std::net::SocketAddr;

use crate::relay::ProcessRole;

/// Errors that can occur in the bridge library.
///
/// Variants map to the failure modes of each subsystem:
///
/// - **Discovery**: [`Bind`](Self::Bind). Fatal to discovery only; the
///   bridge keeps serving without it.
/// - **Relay**: [`DependencyMissing`](Self::DependencyMissing),
///   [`ProcessStart`](Self::ProcessStart). Both abort
///   [`Supervisor::start`](crate::relay::Supervisor::start) and leave no
///   process running.
/// - **HTTP**: [`Parse`](Self::Parse). Answered with `400 Bad Request` on
///   the offending connection only.
/// - **Lifecycle**: [`AlreadyRunning`](Self::AlreadyRunning).
/// - **Configuration**: [`InvalidConfig`](Self::InvalidConfig).
///
/// A relay process that exits after a successful start is not an error:
/// the supervisor records it as
/// [`ProcessState::Exited`](crate::relay::ProcessState::Exited) and restarts
/// it. Undecodable discovery datagrams are dropped and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The discovery socket could not be bound or could not join the
    /// multicast group.
    #[error("failed to bind discovery socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A required executable was not found on `PATH`.
    #[error("required executable not found: {program}")]
    DependencyMissing { program: String },

    /// A spawned process exited within its startup grace period.
    #[error("{role} exited during startup (code {code:?}): {stderr}")]
    ProcessStart {
        role: ProcessRole,
        code: Option<i32>,
        stderr: String,
    },

    /// Failed to parse an HTTP request.
    #[error("HTTP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// `start()` was called on a component that is already running.
    #[error("already running")]
    AlreadyRunning,

    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Specific kind of HTTP parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input was empty (no request line).
    EmptyRequest,
    /// Request line did not have the expected `Method Path Version` format.
    InvalidRequestLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// `Content-Length` was not a number.
    InvalidContentLength,
    /// Header block or body exceeded the size limit.
    TooLarge,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "empty request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::InvalidContentLength => write!(f, "invalid content length"),
            Self::TooLarge => write!(f, "request too large"),
        }
    }
}

/// Convenience alias for `Result<T, BridgeError>`.
pub type Result<T> = std::result::Result<T, BridgeError>;
