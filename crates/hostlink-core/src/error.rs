//! Error types for hostlink
//!
//! Four failure families, each surfaced differently at the boundary:
//!
//! - `BootstrapFailure` - `bool` from init / relaunch checks, reason logged
//! - `ResolutionFailure` - empty result from the registry
//! - `DispatchFault` - error from the pump, or the fault channel in
//!   isolation mode
//! - use after shutdown - not detected in release builds

use crate::handle::{PipeHandle, UserHandle};
use core::fmt;

/// Result type for hostlink operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that can occur in runtime operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Service unreachable or relaunch required
    Bootstrap(BootstrapFailure),

    /// `(name, version)` could not be resolved
    Resolution {
        name: String,
        version: String,
        reason: ResolutionFailure,
    },

    /// A callback sink faulted during a pump cycle
    Dispatch(DispatchFault),

    /// Runtime used before `init` or after `shutdown`
    NotInitialized,

    /// Pipe handle is not open
    UnknownPipe(PipeHandle),

    /// User handle is not connected on the given pipe
    UnknownUser(PipeHandle, UserHandle),

    /// The pump was re-entered for a pipe that is already pumping
    PumpReentered(PipeHandle),

    /// A handle or pointer was used after its pipe closed
    UseAfterShutdown,

    /// Remote call rejected by the service
    CallFailed(String),

    /// Configuration rejected by validation
    InvalidConfig(&'static str),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Bootstrap(e) => write!(f, "bootstrap failed: {}", e),
            ApiError::Resolution { name, version, reason } => {
                write!(f, "cannot resolve {}{}: {}", name, version, reason)
            }
            ApiError::Dispatch(e) => write!(f, "dispatch fault: {}", e),
            ApiError::NotInitialized => write!(f, "runtime not initialized"),
            ApiError::UnknownPipe(p) => write!(f, "unknown pipe {}", p),
            ApiError::UnknownUser(p, u) => write!(f, "user {} not connected on pipe {}", u, p),
            ApiError::PumpReentered(p) => write!(f, "pump re-entered on pipe {}", p),
            ApiError::UseAfterShutdown => write!(f, "use after shutdown"),
            ApiError::CallFailed(msg) => write!(f, "remote call failed: {}", msg),
            ApiError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn resolution(name: &str, version: &str, reason: ResolutionFailure) -> Self {
        ApiError::Resolution {
            name: name.to_string(),
            version: version.to_string(),
            reason,
        }
    }

    /// The resolution reason, if this is a resolution failure
    pub fn resolution_reason(&self) -> Option<ResolutionFailure> {
        match self {
            ApiError::Resolution { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Why the service could not be reached at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapFailure {
    /// No backing service module has been loaded
    ModuleNotLoaded,

    /// The service process is not running
    ServiceNotRunning,

    /// The local discovery marker is missing
    NoDiscoveryMarker,

    /// The app must be relaunched under the service
    RelaunchRequired,

    /// The service serves none of the interfaces this build knows
    NoCommonInterfaces,

    /// Service-specific connection failure
    ConnectFailed(String),
}

impl fmt::Display for BootstrapFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapFailure::ModuleNotLoaded => write!(f, "no service module loaded"),
            BootstrapFailure::ServiceNotRunning => write!(f, "service is not running"),
            BootstrapFailure::NoDiscoveryMarker => write!(f, "no local discovery marker present"),
            BootstrapFailure::RelaunchRequired => {
                write!(f, "process must be relaunched under the service")
            }
            BootstrapFailure::NoCommonInterfaces => {
                write!(f, "service serves no interface version known to this build")
            }
            BootstrapFailure::ConnectFailed(msg) => write!(f, "connect failed: {}", msg),
        }
    }
}

impl From<BootstrapFailure> for ApiError {
    fn from(e: BootstrapFailure) -> Self {
        ApiError::Bootstrap(e)
    }
}

/// Why a `(name, version)` request produced no pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// No service module loaded
    ModuleNotLoaded,

    /// `init` has not negotiated an interface table
    NotNegotiated,

    /// Pipe is closed or was never opened
    PipeClosed,

    /// User handle is not connected on the pipe
    UnknownUser,

    /// No subsystem has that name
    UnknownInterface,

    /// The runtime has no adapter for that tag
    UnknownVersion,

    /// The running service does not serve that tag
    NotServed,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionFailure::ModuleNotLoaded => write!(f, "service module not loaded"),
            ResolutionFailure::NotNegotiated => write!(f, "no negotiated interface table"),
            ResolutionFailure::PipeClosed => write!(f, "pipe closed"),
            ResolutionFailure::UnknownUser => write!(f, "user not connected on pipe"),
            ResolutionFailure::UnknownInterface => write!(f, "unknown interface name"),
            ResolutionFailure::UnknownVersion => write!(f, "unknown version tag"),
            ResolutionFailure::NotServed => write!(f, "version not served by running service"),
        }
    }
}

/// Identifier of one callback registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegistrationId(pub u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reg#{}", self.0)
    }
}

/// How a sink faulted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultCause {
    /// Sink returned `Err(SinkFault)`
    Returned(String),
    /// Sink panicked
    Panicked(String),
}

/// A sink fault observed during a pump cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFault {
    pub pipe: PipeHandle,
    pub user: UserHandle,
    pub kind: u32,
    pub seq: u64,
    pub registration: RegistrationId,
    pub cause: FaultCause,
}

impl fmt::Display for DispatchFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (how, msg) = match &self.cause {
            FaultCause::Returned(m) => ("returned error", m),
            FaultCause::Panicked(m) => ("panicked", m),
        };
        write!(
            f,
            "{} {} on kind {} (pipe {}, user {}, seq {}): {}",
            self.registration, how, self.kind, self.pipe, self.user, self.seq, msg
        )
    }
}

/// Error a sink returns to signal a fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkFault(pub String);

impl SinkFault {
    pub fn new(msg: impl Into<String>) -> Self {
        SinkFault(msg.into())
    }
}

impl fmt::Display for SinkFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for SinkFault {}

impl From<&str> for SinkFault {
    fn from(msg: &str) -> Self {
        SinkFault(msg.to_string())
    }
}

impl From<String> for SinkFault {
    fn from(msg: String) -> Self {
        SinkFault(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = ApiError::Bootstrap(BootstrapFailure::ServiceNotRunning);
        assert_eq!(format!("{}", e), "bootstrap failed: service is not running");

        let e = ApiError::resolution("User", "099", ResolutionFailure::UnknownVersion);
        assert_eq!(format!("{}", e), "cannot resolve User099: unknown version tag");
        assert_eq!(e.resolution_reason(), Some(ResolutionFailure::UnknownVersion));
    }

    #[test]
    fn test_error_conversion() {
        let e: ApiError = BootstrapFailure::RelaunchRequired.into();
        assert!(matches!(e, ApiError::Bootstrap(BootstrapFailure::RelaunchRequired)));
        assert_eq!(e.resolution_reason(), None);
    }

    #[test]
    fn test_fault_display() {
        let fault = DispatchFault {
            pipe: PipeHandle::new(1),
            user: UserHandle::new(2),
            kind: 101,
            seq: 4,
            registration: RegistrationId(9),
            cause: FaultCause::Panicked("boom".into()),
        };
        assert_eq!(
            fault.to_string(),
            "reg#9 panicked on kind 101 (pipe 1, user 2, seq 4): boom"
        );
    }
}
