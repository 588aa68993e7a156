//! Async front end for the permission monitor
//!
//! Callers on independent tasks post [`MonitorEvent`]s through a cloneable
//! [`MonitorHandle`]. A single background task owns the monitor and applies
//! events strictly in arrival order, replying to each sender over a oneshot
//! channel. The task exits once every handle has been dropped.
//!
//! ```text
//!   package callbacks ─┐
//!   user callbacks ────┼──> mpsc (bounded) ──> daemon task ──> PermissionMonitor
//!   VPN callbacks ─────┘         ^                  │
//!                                └──── oneshot <────┘
//! ```

use crate::error::{PermSyncError, Result};
use crate::monitor::PermissionMonitor;
use crate::stats::SyncStats;
use permsync_core_identity::{Uid, UidRange, UserId};
use permsync_interface::FilterBackend;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// One monitor entry point, in message form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    StartMonitoring,
    UserAdded(UserId),
    UserRemoved(UserId),
    PackageAdded {
        name: String,
        uid: Uid,
    },
    PackageChanged {
        name: String,
        uid: Uid,
    },
    PackageRemoved {
        name: String,
        uid: Uid,
    },
    VpnRangesAdded {
        tunnel: String,
        ranges: Vec<UidRange>,
        owner: Uid,
    },
    VpnRangesRemoved {
        tunnel: String,
        ranges: Vec<UidRange>,
        owner: Uid,
    },
    VpnDisconnected {
        tunnel: String,
    },
}

impl MonitorEvent {
    pub fn package_added(name: impl Into<String>, uid: Uid) -> Self {
        MonitorEvent::PackageAdded {
            name: name.into(),
            uid,
        }
    }

    pub fn package_removed(name: impl Into<String>, uid: Uid) -> Self {
        MonitorEvent::PackageRemoved {
            name: name.into(),
            uid,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MonitorEvent::StartMonitoring => "start_monitoring",
            MonitorEvent::UserAdded(_) => "user_added",
            MonitorEvent::UserRemoved(_) => "user_removed",
            MonitorEvent::PackageAdded { .. } => "package_added",
            MonitorEvent::PackageChanged { .. } => "package_changed",
            MonitorEvent::PackageRemoved { .. } => "package_removed",
            MonitorEvent::VpnRangesAdded { .. } => "vpn_ranges_added",
            MonitorEvent::VpnRangesRemoved { .. } => "vpn_ranges_removed",
            MonitorEvent::VpnDisconnected { .. } => "vpn_disconnected",
        }
    }

    fn apply<B: FilterBackend>(&self, monitor: &PermissionMonitor<B>) -> Result<()> {
        match self {
            MonitorEvent::StartMonitoring => monitor.start_monitoring(),
            MonitorEvent::UserAdded(user) => monitor.on_user_added(*user),
            MonitorEvent::UserRemoved(user) => monitor.on_user_removed(*user),
            MonitorEvent::PackageAdded { name, uid } => monitor.on_package_added(name, *uid),
            MonitorEvent::PackageChanged { name, uid } => monitor.on_package_changed(name, *uid),
            MonitorEvent::PackageRemoved { name, uid } => monitor.on_package_removed(name, *uid),
            MonitorEvent::VpnRangesAdded {
                tunnel,
                ranges,
                owner,
            } => monitor.on_vpn_uid_ranges_added(tunnel, ranges, *owner),
            MonitorEvent::VpnRangesRemoved {
                tunnel,
                ranges,
                owner,
            } => monitor.on_vpn_uid_ranges_removed(tunnel, ranges, *owner),
            MonitorEvent::VpnDisconnected { tunnel } => monitor.on_vpn_disconnected(tunnel),
        }
    }
}

type Envelope = (MonitorEvent, Option<oneshot::Sender<Result<()>>>);

/// Sending side of the daemon queue
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    event_tx: mpsc::Sender<Envelope>,
}

impl MonitorHandle {
    /// Queue `event` and wait for its result
    pub async fn send(&self, event: MonitorEvent) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.event_tx
            .send((event, Some(reply_tx)))
            .await
            .map_err(|_| PermSyncError::DaemonStopped)?;
        reply_rx.await.map_err(|_| PermSyncError::DaemonStopped)?
    }

    /// Queue `event` without waiting for it to be applied
    ///
    /// The outcome still shows up in the logs and in [`SyncStats`].
    pub async fn post(&self, event: MonitorEvent) -> Result<()> {
        self.event_tx
            .send((event, None))
            .await
            .map_err(|_| PermSyncError::DaemonStopped)
    }

    pub fn is_closed(&self) -> bool {
        self.event_tx.is_closed()
    }
}

/// Single-writer task in front of a [`PermissionMonitor`]
pub struct MonitorDaemon;

impl MonitorDaemon {
    /// Spawn the daemon task on the current tokio runtime
    ///
    /// The queue depth comes from `event_queue_depth` in the monitor's
    /// configuration. The join handle resolves to the final statistics once
    /// every [`MonitorHandle`] is gone.
    pub fn spawn<B>(
        monitor: Arc<PermissionMonitor<B>>,
    ) -> (MonitorHandle, JoinHandle<Result<SyncStats>>)
    where
        B: FilterBackend + 'static,
    {
        let depth = monitor.config().event_queue_depth;
        let (event_tx, event_rx) = mpsc::channel(depth);
        let task = tokio::spawn(run_event_loop(monitor, event_rx));
        info!(queue_depth = depth, "monitor daemon started");
        (MonitorHandle { event_tx }, task)
    }
}

async fn run_event_loop<B: FilterBackend>(
    monitor: Arc<PermissionMonitor<B>>,
    mut event_rx: mpsc::Receiver<Envelope>,
) -> Result<SyncStats> {
    let mut handled = 0u64;
    while let Some((event, reply_tx)) = event_rx.recv().await {
        let name = event.name();
        let result = event.apply(&monitor);
        handled += 1;
        debug!(event = name, ok = result.is_ok(), "daemon event handled");

        let poisoned = matches!(result, Err(PermSyncError::LockPoisoned));
        if let Some(reply_tx) = reply_tx {
            // Sender may have given up waiting
            let _ = reply_tx.send(result);
        }
        if poisoned {
            event_rx.close();
            error!(handled, "monitor state poisoned, daemon stopping");
            return Err(PermSyncError::LockPoisoned);
        }
    }

    let stats = monitor.stats()?;
    info!(handled, summary = %stats.summary(), "monitor daemon stopped");
    Ok(stats)
}
