/*!
 * Permission monitor: the reconcile loop
 *
 * Every entry point takes the state lock, updates the in-memory model,
 * diffs the affected UIDs against what the backend was last told and pushes
 * the difference before releasing the lock. Two events can therefore never
 * interleave their pushes for the same UID.
 *
 * ```text
 *   event ──> aggregator / tracker ──> SyncPlan (diff vs. SentState)
 *                                          │
 *                                          v
 *                               FilterBackend commands ──> SentState
 * ```
 */

use crate::aggregator::{UidAggregator, UidState};
use crate::config::MonitorConfig;
use crate::error::{ErrorCategory, PermSyncError, Result};
use crate::plan::SyncPlan;
use crate::sent_state::SentState;
use crate::snapshot::{MonitorSnapshot, TunnelSnapshot, UidSnapshot, VpnFilterSnapshot};
use crate::stats::SyncStats;
use permsync_core_classifier::{
    Classifier, NetworkClass, PackageRecord, PermissionKind, PermissionSet, TrafficState,
};
use permsync_core_identity::{Uid, UidRange, UserId};
use permsync_core_vpn::VpnRangeTracker;
use permsync_interface::{
    DeviceHistory, FilterBackend, PackageRegistry, PermissionGrants, UserFilter, UserRegistry,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// External authorities the monitor reads from
#[derive(Clone)]
pub struct Collaborators {
    pub packages: Arc<dyn PackageRegistry>,
    pub users: Arc<dyn UserRegistry>,
    pub grants: Arc<dyn PermissionGrants>,
    pub history: Arc<dyn DeviceHistory>,
}

impl Collaborators {
    /// Use one object for every role
    pub fn from_device<D>(device: Arc<D>) -> Self
    where
        D: PackageRegistry + UserRegistry + PermissionGrants + DeviceHistory + 'static,
    {
        Self {
            packages: device.clone(),
            users: device.clone(),
            grants: device.clone(),
            history: device,
        }
    }
}

struct MonitorState<B> {
    monitoring: bool,
    active_users: BTreeSet<UserId>,
    aggregator: UidAggregator,
    tracker: VpnRangeTracker,
    sent: SentState,
    stats: SyncStats,
    backend: B,
}

pub struct PermissionMonitor<B> {
    collaborators: Collaborators,
    config: MonitorConfig,
    classifier: Classifier,
    state: Mutex<MonitorState<B>>,
}

impl<B: FilterBackend> PermissionMonitor<B> {
    /// Create an idle monitor
    ///
    /// The device's first platform version is read here, once.
    pub fn new(collaborators: Collaborators, backend: B, config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        let classifier = Classifier::new(
            collaborators.history.first_platform_version(),
            config.classifier.modern_permission_version,
        );
        info!(
            first_platform_version = classifier.first_platform_version(),
            legacy_device = classifier.is_legacy_device(),
            coalesce = config.batching.coalesce,
            "permission monitor created"
        );

        Ok(Self {
            collaborators,
            config,
            classifier,
            state: Mutex::new(MonitorState {
                monitoring: false,
                active_users: BTreeSet::new(),
                aggregator: UidAggregator::new(classifier),
                tracker: VpnRangeTracker::new(),
                sent: SentState::new(),
                stats: SyncStats::new(),
                backend,
            }),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn classifier(&self) -> Classifier {
        self.classifier
    }

    fn lock(&self) -> Result<MutexGuard<'_, MonitorState<B>>> {
        self.state.lock().map_err(|_| PermSyncError::LockPoisoned)
    }

    // --- events -----------------------------------------------------------

    /// Rebuild the model from the registries and push a full snapshot
    ///
    /// May be called again later; all in-memory state is discarded first.
    pub fn start_monitoring(&self) -> Result<()> {
        self.run_event("start_monitoring", true, |monitor, state| {
            monitor.full_sync(state)
        })
    }

    pub fn on_user_added(&self, user: UserId) -> Result<()> {
        self.run_event("user_added", false, |monitor, state| {
            let user = user.validate()?;
            if !state.active_users.insert(user) {
                debug!(%user, "user already active");
            }

            let mut uids = BTreeSet::new();
            for template in state.aggregator.templates() {
                let record = template.for_user(user)?;
                uids.insert(record.uid);
                monitor.track(state, record);
            }
            info!(%user, uids = uids.len(), "user added");
            monitor.push(state, uids)
        })
    }

    pub fn on_user_removed(&self, user: UserId) -> Result<()> {
        self.run_event("user_removed", false, |monitor, state| {
            state.active_users.remove(&user);
            let uids = state.aggregator.remove_user(user);
            info!(%user, uids = uids.len(), "user removed");
            monitor.push(state, uids)
        })
    }

    /// Package installed or updated for `uid`
    pub fn on_package_added(&self, name: &str, uid: Uid) -> Result<()> {
        self.run_event("package_added", false, |monitor, state| {
            let record = monitor.resolve_package(name, uid)?;
            let after = monitor.track(state, record);
            debug!(
                package = name,
                %uid,
                network = %after.network,
                traffic = %after.traffic,
                "package added"
            );
            monitor.push(state, [uid])
        })
    }

    /// Same as [`Self::on_package_added`]: the registry's current record
    /// replaces the tracked one
    pub fn on_package_changed(&self, name: &str, uid: Uid) -> Result<()> {
        self.on_package_added(name, uid)
    }

    pub fn on_package_removed(&self, name: &str, uid: Uid) -> Result<()> {
        self.run_event("package_removed", false, |monitor, state| {
            let after = state.aggregator.remove_package(uid, name).ok_or_else(|| {
                PermSyncError::PackageNotTracked {
                    package: name.to_string(),
                    uid,
                }
            })?;
            debug!(
                package = name,
                %uid,
                network = %after.network,
                traffic = %after.traffic,
                "package removed"
            );
            monitor.adopt_shared_packages(state, uid, name);
            monitor.push(state, [uid])
        })
    }

    pub fn on_vpn_uid_ranges_added(
        &self,
        tunnel: &str,
        ranges: &[UidRange],
        owner: Uid,
    ) -> Result<()> {
        self.run_event("vpn_ranges_added", false, |monitor, state| {
            let installed = state.aggregator.installed_uids();
            let covered = state.tracker.ranges_added(tunnel, ranges, owner, &installed)?;
            info!(
                tunnel,
                %owner,
                ranges = ranges.len(),
                covered = covered.len(),
                "VPN ranges added"
            );
            monitor.push(state, covered)
        })
    }

    pub fn on_vpn_uid_ranges_removed(
        &self,
        tunnel: &str,
        ranges: &[UidRange],
        owner: Uid,
    ) -> Result<()> {
        self.run_event("vpn_ranges_removed", false, |monitor, state| {
            let installed = state.aggregator.installed_uids();
            let covered = state.tracker.ranges_removed(tunnel, ranges, owner, &installed)?;
            info!(
                tunnel,
                %owner,
                ranges = ranges.len(),
                covered = covered.len(),
                "VPN ranges removed"
            );
            monitor.push(state, covered)
        })
    }

    pub fn on_vpn_disconnected(&self, tunnel: &str) -> Result<()> {
        self.run_event("vpn_disconnected", false, |monitor, state| {
            let installed = state.aggregator.installed_uids();
            let (owner, covered) = state.tracker.disconnected(tunnel, &installed)?;
            info!(tunnel, %owner, covered = covered.len(), "VPN disconnected");
            monitor.push(state, covered)
        })
    }

    // --- queries ----------------------------------------------------------

    /// Ask the grant authority directly
    pub fn has_permission(&self, permission: &str, uid: Uid) -> bool {
        self.collaborators.grants.has_permission(permission, uid)
    }

    /// Granted the restricted-networks permission or a network-stack one
    pub fn has_restricted_network_permission(&self, uid: Uid) -> bool {
        PermissionKind::ALL
            .iter()
            .filter(|kind| kind.is_restricted())
            .any(|kind| self.has_permission(kind.name(), uid))
    }

    /// Whether the engine currently classifies `uid` above NONE
    pub fn has_use_background_networks_permission(&self, uid: Uid) -> Result<bool> {
        Ok(!self.network_class(uid)?.is_none())
    }

    pub fn network_class(&self, uid: Uid) -> Result<NetworkClass> {
        Ok(self.lock()?.aggregator.state(uid).network)
    }

    pub fn traffic_state(&self, uid: Uid) -> Result<TrafficState> {
        Ok(self.lock()?.aggregator.state(uid).traffic)
    }

    /// Range-set of `tunnel`, `None` for unknown tunnels
    pub fn vpn_uid_ranges(&self, tunnel: &str) -> Result<Option<BTreeSet<UidRange>>> {
        Ok(self.lock()?.tracker.ranges(tunnel).cloned())
    }

    pub fn is_monitoring(&self) -> Result<bool> {
        Ok(self.lock()?.monitoring)
    }

    pub fn stats(&self) -> Result<SyncStats> {
        Ok(self.lock()?.stats.clone())
    }

    pub fn snapshot(&self) -> Result<MonitorSnapshot> {
        let state = self.lock()?;
        let uids = state
            .aggregator
            .known_uids()
            .into_iter()
            .map(|uid| {
                let current = state.aggregator.state(uid);
                UidSnapshot {
                    uid,
                    network: current.network,
                    traffic: current.traffic,
                    packages: state.aggregator.package_names(uid),
                }
            })
            .collect();
        let tunnels = state
            .tracker
            .iter()
            .map(|(name, info)| TunnelSnapshot {
                name: name.to_string(),
                owner: info.owner,
                ranges: info.ranges.iter().copied().collect(),
            })
            .collect();
        let vpn_filters = state
            .sent
            .filtered()
            .map(|(uid, tunnel)| VpnFilterSnapshot {
                uid,
                tunnel: tunnel.to_string(),
            })
            .collect();

        Ok(MonitorSnapshot {
            monitoring: state.monitoring,
            first_platform_version: self.classifier.first_platform_version(),
            modern_permission_version: self.classifier.modern_permission_version(),
            active_users: state.active_users.iter().copied().collect(),
            uids,
            tunnels,
            vpn_filters,
            stats: state.stats.clone(),
        })
    }

    // --- internals --------------------------------------------------------

    fn run_event<F>(&self, event: &'static str, allow_idle: bool, apply: F) -> Result<()>
    where
        F: FnOnce(&Self, &mut MonitorState<B>) -> Result<()>,
    {
        let mut guard = self.lock()?;
        let state = &mut *guard;

        let result = if !allow_idle && !state.monitoring {
            Err(PermSyncError::NotMonitoring)
        } else {
            apply(self, state)
        };

        match &result {
            Ok(()) => state.stats.record_outcome(None),
            Err(err) => {
                let category = err.category();
                state.stats.record_outcome(Some(category));
                match category {
                    ErrorCategory::InputInconsistency => {
                        warn!(event, error = %err, "event rejected")
                    }
                    ErrorCategory::Backend => {
                        error!(event, error = %err, "event only partially pushed")
                    }
                    _ => error!(event, %category, error = %err, "event failed"),
                }
            }
        }
        result
    }

    fn full_sync(&self, state: &mut MonitorState<B>) -> Result<()> {
        state.monitoring = false;
        state.aggregator.clear();
        state.tracker.clear();
        state.sent.clear();

        let users: BTreeSet<UserId> = self
            .collaborators
            .users
            .active_users()
            .into_iter()
            .filter(|user| match user.validate() {
                Ok(_) => true,
                Err(err) => {
                    warn!(%user, error = %err, "skipping user");
                    false
                }
            })
            .collect();
        let records = self
            .collaborators
            .packages
            .list_installed_packages(UserFilter::All);
        for record in &records {
            let own_user = record.uid.user_id();
            for user in users.iter().copied().chain(std::iter::once(own_user)) {
                match record.for_user(user) {
                    Ok(copy) => {
                        self.track(state, copy);
                    }
                    Err(err) => warn!(
                        package = %record.name,
                        uid = %record.uid,
                        error = %err,
                        "skipping package"
                    ),
                }
            }
        }

        for (uid, names) in self.collaborators.packages.system_uid_permissions() {
            let bits = Classifier::traffic_bits(&PermissionSet::from_names(&names));
            state.aggregator.set_native_grants(uid, bits);
        }

        let uids = state.aggregator.known_uids();
        info!(
            users = users.len(),
            packages = records.len(),
            uids = uids.len(),
            "starting permission monitoring"
        );
        state.active_users = users;
        state.monitoring = true;
        state.stats.full_syncs += 1;
        self.push(state, uids)
    }

    /// Registry record for `name`, rebased onto the user of `uid`
    fn resolve_package(&self, name: &str, uid: Uid) -> Result<PackageRecord> {
        let record = self
            .collaborators
            .packages
            .package_info(name)
            .ok_or_else(|| PermSyncError::UnknownPackage(name.to_string()))?;
        if record.uid.app_id() != uid.app_id() {
            return Err(PermSyncError::UidMismatch {
                package: name.to_string(),
                event_uid: uid,
                registry_uid: record.uid,
            });
        }
        Ok(record.for_user(uid.user_id())?)
    }

    /// Track `record` with only the permissions the grant authority confirms
    fn track(&self, state: &mut MonitorState<B>, record: PackageRecord) -> UidState {
        let granted: PermissionSet = record
            .permissions
            .iter()
            .filter_map(|name| PermissionKind::from_name(name))
            .filter(|kind| {
                self.collaborators
                    .grants
                    .has_permission(kind.name(), record.uid)
            })
            .collect();
        state.aggregator.add_package(record, granted)
    }

    /// Pick up packages the registry still lists for `uid` that the model
    /// lost track of
    fn adopt_shared_packages(&self, state: &mut MonitorState<B>, uid: Uid, removed: &str) {
        for name in self.collaborators.packages.packages_for_uid(uid) {
            if name == removed || state.aggregator.contains(uid, &name) {
                continue;
            }
            match self.resolve_package(&name, uid) {
                Ok(record) => {
                    info!(package = %name, %uid, "adopting untracked package sharing uid");
                    self.track(state, record);
                }
                Err(err) => warn!(package = %name, %uid, error = %err, "cannot adopt package"),
            }
        }
    }

    /// Tunnel `uid` should be filtered to, if any
    fn desired_tunnel<'a>(
        &self,
        state: &'a MonitorState<B>,
        uid: Uid,
        desired: UidState,
    ) -> Option<&'a str> {
        if !state.aggregator.is_installed(uid) {
            return None;
        }
        if self.config.vpn.exempt_system_uids && desired.network == NetworkClass::System {
            return None;
        }
        state.tracker.tunnels_covering(uid).into_iter().next()
    }

    /// Diff `uids` against the sent state and push the difference
    ///
    /// Every command is attempted. Only accepted commands update the sent
    /// state; the first failure is returned.
    fn push<I>(&self, state: &mut MonitorState<B>, uids: I) -> Result<()>
    where
        I: IntoIterator<Item = Uid>,
    {
        let mut plan = SyncPlan::new();
        for uid in uids {
            let desired = state.aggregator.state(uid);
            let tunnel = self.desired_tunnel(state, uid, desired);
            plan.diff_uid(uid, desired, tunnel, &state.sent);
        }
        if plan.is_empty() {
            debug!("backend already up to date");
            return Ok(());
        }

        debug!(uids = plan.uid_count(), "pushing backend diff");
        let mut first_failure = None;
        for command in plan.into_commands(self.config.batching.coalesce) {
            match command.apply(&mut state.backend) {
                Ok(()) => {
                    debug!(%command, "backend command applied");
                    state.stats.record_command(command.uids().len(), true);
                    state.sent.record(&command);
                }
                Err(source) => {
                    error!(%command, error = %source, "backend rejected command");
                    state.stats.record_command(command.uids().len(), false);
                    if first_failure.is_none() {
                        first_failure = Some(PermSyncError::Backend {
                            command: command.to_string(),
                            source,
                        });
                    }
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
