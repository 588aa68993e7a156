/*!
 * Permsync - network permission state synchronization
 *
 * Tracks, for every UID on a multi-user device, which network privileges the
 * UID holds and keeps a filtering backend consistent with that state:
 * - Ranked network classification (NONE < NETWORK < SYSTEM) per UID
 * - Traffic permission bits, with an UNINSTALLED sentinel for unowned UIDs
 * - Shared-UID aggregation across every live package
 * - Legacy carry-over for privileged pre-installed packages
 * - VPN tunnel UID-range filtering
 * - Diff-based, batched backend pushes behind a single lock
 *
 * Pure building blocks live in the `permsync-core-*` crates; this crate
 * owns the reconcile loop and its async front end.
 */

pub mod aggregator;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod plan;
pub mod sent_state;
pub mod snapshot;
pub mod stats;
pub mod testing;

// Re-export commonly used types
pub use aggregator::{UidAggregator, UidState};
pub use config::{BatchingConfig, ClassifierConfig, LogLevel, MonitorConfig, VpnConfig};
pub use daemon::{MonitorDaemon, MonitorEvent, MonitorHandle};
pub use error::{ErrorCategory, PermSyncError, Result};
pub use monitor::{Collaborators, PermissionMonitor};
pub use snapshot::MonitorSnapshot;
pub use stats::SyncStats;

pub use permsync_core_classifier::{
    NetworkClass, PackageRecord, PermissionKind, Provenance, TrafficPermissions, TrafficState,
};
pub use permsync_core_identity::{
    derive_uid, AppId, IdentityError, Uid, UidRange, UserId, MAX_USER_ID, PER_USER_RANGE,
};
pub use permsync_interface::{BackendCommand, BackendError, FilterBackend, UserFilter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
