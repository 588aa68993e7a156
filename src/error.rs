/*!
 * Error types for permsync
 */

use permsync_core_identity::{IdentityError, Uid};
use permsync_core_vpn::VpnError;
use permsync_interface::BackendError;
use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, PermSyncError>;

#[derive(Debug)]
pub enum PermSyncError {
    /// Event received before `start_monitoring`
    NotMonitoring,

    /// Package registry does not know the package
    UnknownPackage(String),

    /// Package is not tracked for the UID named by the event
    PackageNotTracked { package: String, uid: Uid },

    /// Registry reports the package under a different app id than the event
    UidMismatch {
        package: String,
        event_uid: Uid,
        registry_uid: Uid,
    },

    /// Event names a user or UID outside the UID space
    Identity(IdentityError),

    /// VPN range tracking rejected the event
    Vpn(VpnError),

    /// Backend did not apply a command
    Backend {
        command: String,
        source: BackendError,
    },

    /// Configuration error
    Config(String),

    /// I/O error
    Io(io::Error),

    /// Monitor state lock was poisoned by a panicking thread
    LockPoisoned,

    /// Daemon task is gone
    DaemonStopped,
}

impl PermSyncError {
    /// Check if this error is fatal (the engine should not keep feeding events)
    pub fn is_fatal(&self) -> bool {
        match self {
            PermSyncError::Config(_) => true,
            PermSyncError::LockPoisoned => true,
            PermSyncError::DaemonStopped => true,

            // Recoverable: the next affecting event resends the right state
            PermSyncError::NotMonitoring => false,
            PermSyncError::UnknownPackage(_) => false,
            PermSyncError::PackageNotTracked { .. } => false,
            PermSyncError::UidMismatch { .. } => false,
            PermSyncError::Identity(_) => false,
            PermSyncError::Vpn(_) => false,
            PermSyncError::Backend { .. } => false,
            PermSyncError::Io(_) => false,
        }
    }

    /// Get error category for logging and statistics
    pub fn category(&self) -> ErrorCategory {
        match self {
            PermSyncError::NotMonitoring
            | PermSyncError::UnknownPackage(_)
            | PermSyncError::PackageNotTracked { .. }
            | PermSyncError::UidMismatch { .. }
            | PermSyncError::Identity(_) => ErrorCategory::InputInconsistency,
            PermSyncError::Vpn(err) if err.is_invariant_violation() => {
                ErrorCategory::InvariantViolation
            }
            PermSyncError::Vpn(_) => ErrorCategory::InputInconsistency,
            PermSyncError::Backend { .. } => ErrorCategory::Backend,
            PermSyncError::Config(_) | PermSyncError::Io(_) => ErrorCategory::Configuration,
            PermSyncError::LockPoisoned | PermSyncError::DaemonStopped => {
                ErrorCategory::Concurrency
            }
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Event references state the registry or engine does not have
    InputInconsistency,
    /// Filtering backend push failures
    Backend,
    /// Collaborator contract violations
    InvariantViolation,
    /// Configuration loading and validation
    Configuration,
    /// Locking and task lifecycle
    Concurrency,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::InputInconsistency => write!(f, "input-inconsistency"),
            ErrorCategory::Backend => write!(f, "backend"),
            ErrorCategory::InvariantViolation => write!(f, "invariant-violation"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Concurrency => write!(f, "concurrency"),
        }
    }
}

impl fmt::Display for PermSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermSyncError::NotMonitoring => {
                write!(f, "Permission monitoring has not been started")
            }
            PermSyncError::UnknownPackage(name) => {
                write!(f, "Unknown package: {}", name)
            }
            PermSyncError::PackageNotTracked { package, uid } => {
                write!(f, "Package {} is not tracked for uid {}", package, uid)
            }
            PermSyncError::UidMismatch {
                package,
                event_uid,
                registry_uid,
            } => {
                write!(
                    f,
                    "Package {} belongs to uid {}, event referenced uid {}",
                    package, registry_uid, event_uid
                )
            }
            PermSyncError::Identity(err) => {
                write!(f, "Identity error: {}", err)
            }
            PermSyncError::Vpn(err) => {
                write!(f, "VPN error: {}", err)
            }
            PermSyncError::Backend { command, source } => {
                write!(f, "Backend push failed for {}: {}", command, source)
            }
            PermSyncError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            PermSyncError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            PermSyncError::LockPoisoned => {
                write!(f, "Monitor state lock poisoned")
            }
            PermSyncError::DaemonStopped => {
                write!(f, "Monitor daemon is not running")
            }
        }
    }
}

impl std::error::Error for PermSyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PermSyncError::Io(err) => Some(err),
            PermSyncError::Identity(err) => Some(err),
            PermSyncError::Vpn(err) => Some(err),
            PermSyncError::Backend { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for PermSyncError {
    fn from(err: io::Error) -> Self {
        PermSyncError::Io(err)
    }
}

impl From<IdentityError> for PermSyncError {
    fn from(err: IdentityError) -> Self {
        PermSyncError::Identity(err)
    }
}

impl From<VpnError> for PermSyncError {
    fn from(err: VpnError) -> Self {
        PermSyncError::Vpn(err)
    }
}

impl From<toml::de::Error> for PermSyncError {
    fn from(err: toml::de::Error) -> Self {
        PermSyncError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<serde_json::Error> for PermSyncError {
    fn from(err: serde_json::Error) -> Self {
        PermSyncError::Config(format!("JSON encode error: {}", err))
    }
}
