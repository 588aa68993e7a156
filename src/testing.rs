//! In-memory collaborators for tests and benchmarks
//!
//! [`FakeDevice`] plays every registry role at once, [`RecordingBackend`]
//! stands in for the filtering backend and keeps the state the backend would
//! end up with.
//!
//! ## Example
//!
//! ```
//! use permsync::testing::{FakeDevice, RecordingBackend};
//! use permsync::{
//!     Collaborators, MonitorConfig, NetworkClass, PackageRecord, PermissionMonitor, Uid,
//! };
//! use std::sync::Arc;
//!
//! let device = Arc::new(FakeDevice::new(29));
//! device.install(
//!     PackageRecord::new("com.example", Uid(10001))
//!         .with_permissions(["android.permission.CHANGE_NETWORK_STATE"]),
//! );
//!
//! let backend = RecordingBackend::new();
//! let monitor = PermissionMonitor::new(
//!     Collaborators::from_device(device),
//!     backend.clone(),
//!     MonitorConfig::default(),
//! )
//! .unwrap();
//! monitor.start_monitoring().unwrap();
//!
//! assert_eq!(backend.view().network(Uid(10001)), NetworkClass::Network);
//! ```

use crate::sent_state::SentState;
use permsync_core_classifier::{NetworkClass, PackageRecord, TrafficState};
use permsync_core_identity::{IdentityError, Uid, UserId};
use permsync_interface::{
    BackendCommand, BackendError, DeviceHistory, FilterBackend, PackageRegistry,
    PermissionGrants, UserFilter, UserRegistry,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct DeviceState {
    first_platform_version: u32,
    users: BTreeSet<UserId>,
    /// Declared record per package name
    packages: BTreeMap<String, PackageRecord>,
    /// Users each package is installed for
    installs: BTreeMap<String, BTreeSet<UserId>>,
    revoked: BTreeSet<(String, Uid)>,
    native: BTreeMap<Uid, Vec<String>>,
}

impl DeviceState {
    fn installed_for(&self, uid: Uid) -> impl Iterator<Item = &PackageRecord> + '_ {
        self.packages.values().filter(move |record| {
            record.uid.app_id() == uid.app_id()
                && self
                    .installs
                    .get(&record.name)
                    .is_some_and(|users| users.contains(&uid.user_id()))
        })
    }
}

/// Package registry, user registry, grant authority and device history in one
///
/// Every declared permission counts as granted unless revoked with
/// [`FakeDevice::revoke`].
#[derive(Debug)]
pub struct FakeDevice {
    state: Mutex<DeviceState>,
}

impl FakeDevice {
    /// Device first deployed at `first_platform_version`, user 0 active
    pub fn new(first_platform_version: u32) -> Self {
        let state = DeviceState {
            first_platform_version,
            users: [UserId(0)].into_iter().collect(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn add_user(&self, user: UserId) {
        lock(&self.state).users.insert(user);
    }

    /// Deactivate `user` and uninstall everything installed for it
    pub fn remove_user(&self, user: UserId) {
        let mut state = lock(&self.state);
        state.users.remove(&user);
        for users in state.installs.values_mut() {
            users.remove(&user);
        }
        state.installs.retain(|_, users| !users.is_empty());
        let installed: BTreeSet<String> = state.installs.keys().cloned().collect();
        state.packages.retain(|name, _| installed.contains(name));
    }

    /// Install or update `record` for the user its UID belongs to
    pub fn install(&self, record: PackageRecord) {
        let mut state = lock(&self.state);
        state
            .installs
            .entry(record.name.clone())
            .or_default()
            .insert(record.uid.user_id());
        state.packages.insert(record.name.clone(), record);
    }

    /// Install `record` for each of `users`
    pub fn install_for_users(
        &self,
        record: PackageRecord,
        users: &[UserId],
    ) -> Result<(), IdentityError> {
        for user in users {
            self.install(record.for_user(*user)?);
        }
        Ok(())
    }

    /// Uninstall `name` for `user`; false if it was not installed there
    pub fn uninstall(&self, name: &str, user: UserId) -> bool {
        let mut state = lock(&self.state);
        let Some(users) = state.installs.get_mut(name) else {
            return false;
        };
        let removed = users.remove(&user);
        if users.is_empty() {
            state.installs.remove(name);
            state.packages.remove(name);
        }
        removed
    }

    pub fn revoke(&self, permission: &str, uid: Uid) {
        lock(&self.state)
            .revoked
            .insert((permission.to_string(), uid));
    }

    pub fn grant(&self, permission: &str, uid: Uid) {
        lock(&self.state)
            .revoked
            .remove(&(permission.to_string(), uid));
    }

    /// Permissions held by a native service running as `uid`
    pub fn set_native_permissions(&self, uid: Uid, permissions: &[&str]) {
        lock(&self.state).native.insert(
            uid,
            permissions.iter().map(|p| p.to_string()).collect(),
        );
    }
}

impl PackageRegistry for FakeDevice {
    fn list_installed_packages(&self, filter: UserFilter) -> Vec<PackageRecord> {
        let state = lock(&self.state);
        let mut records = Vec::new();
        for (name, users) in &state.installs {
            let Some(record) = state.packages.get(name) else {
                continue;
            };
            for user in users {
                if filter != UserFilter::All && filter != UserFilter::User(*user) {
                    continue;
                }
                if let Ok(record) = record.for_user(*user) {
                    records.push(record);
                }
            }
        }
        records
    }

    fn package_info(&self, name: &str) -> Option<PackageRecord> {
        lock(&self.state).packages.get(name).cloned()
    }

    fn packages_for_uid(&self, uid: Uid) -> Vec<String> {
        lock(&self.state)
            .installed_for(uid)
            .map(|record| record.name.clone())
            .collect()
    }

    fn system_uid_permissions(&self) -> Vec<(Uid, Vec<String>)> {
        lock(&self.state)
            .native
            .iter()
            .map(|(uid, permissions)| (*uid, permissions.clone()))
            .collect()
    }
}

impl UserRegistry for FakeDevice {
    fn active_users(&self) -> Vec<UserId> {
        lock(&self.state).users.iter().copied().collect()
    }
}

impl PermissionGrants for FakeDevice {
    fn has_permission(&self, permission: &str, uid: Uid) -> bool {
        let state = lock(&self.state);
        if state.revoked.contains(&(permission.to_string(), uid)) {
            return false;
        }
        let native = state
            .native
            .get(&uid)
            .is_some_and(|permissions| permissions.iter().any(|p| p == permission));
        native
            || state
                .installed_for(uid)
                .any(|record| record.permissions.contains(permission))
    }
}

impl DeviceHistory for FakeDevice {
    fn first_platform_version(&self) -> u32 {
        lock(&self.state).first_platform_version
    }
}

#[derive(Debug, Default)]
struct Recording {
    accepted: Vec<BackendCommand>,
    rejected: Vec<BackendCommand>,
    fail_next: usize,
    failing: BTreeSet<&'static str>,
    view: SentState,
}

/// Filtering backend that records every command
///
/// Clones share the same recording, so a test keeps one handle while the
/// monitor owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands the backend accepted, in arrival order
    pub fn commands(&self) -> Vec<BackendCommand> {
        lock(&self.inner).accepted.clone()
    }

    /// Accepted commands since the last call
    pub fn take_commands(&self) -> Vec<BackendCommand> {
        std::mem::take(&mut lock(&self.inner).accepted)
    }

    pub fn rejected(&self) -> Vec<BackendCommand> {
        lock(&self.inner).rejected.clone()
    }

    pub fn command_count(&self) -> usize {
        lock(&self.inner).accepted.len()
    }

    /// Forget recorded commands, keep the backend view
    pub fn clear(&self) {
        let mut recording = lock(&self.inner);
        recording.accepted.clear();
        recording.rejected.clear();
    }

    /// Reject the next `count` commands
    pub fn fail_next(&self, count: usize) {
        lock(&self.inner).fail_next = count;
    }

    /// Reject every command of one operation (see [`BackendCommand::name`])
    pub fn fail_operation(&self, operation: &'static str) {
        lock(&self.inner).failing.insert(operation);
    }

    /// Stop injecting failures
    pub fn heal(&self) {
        let mut recording = lock(&self.inner);
        recording.fail_next = 0;
        recording.failing.clear();
    }

    /// State the backend holds after applying every accepted command
    pub fn view(&self) -> SentState {
        lock(&self.inner).view.clone()
    }

    fn handle(&mut self, command: BackendCommand) -> Result<(), BackendError> {
        let mut recording = lock(&self.inner);
        let failing = recording.failing.contains(command.name());
        if failing || recording.fail_next > 0 {
            recording.fail_next = recording.fail_next.saturating_sub(1);
            let err = BackendError::Rejected {
                command: command.to_string(),
                reason: "injected failure".to_string(),
            };
            recording.rejected.push(command);
            return Err(err);
        }
        recording.view.record(&command);
        recording.accepted.push(command);
        Ok(())
    }
}

impl FilterBackend for RecordingBackend {
    fn set_network_class(
        &mut self,
        class: NetworkClass,
        uids: &[Uid],
    ) -> Result<(), BackendError> {
        self.handle(BackendCommand::SetNetworkClass {
            class,
            uids: uids.to_vec(),
        })
    }

    fn clear_network_class(&mut self, uids: &[Uid]) -> Result<(), BackendError> {
        self.handle(BackendCommand::ClearNetworkClass {
            uids: uids.to_vec(),
        })
    }

    fn set_traffic_permission(
        &mut self,
        state: TrafficState,
        uids: &[Uid],
    ) -> Result<(), BackendError> {
        self.handle(BackendCommand::SetTrafficPermission {
            state,
            uids: uids.to_vec(),
        })
    }

    fn add_vpn_uid_filter(&mut self, tunnel: &str, uids: &[Uid]) -> Result<(), BackendError> {
        self.handle(BackendCommand::AddVpnUidFilter {
            tunnel: tunnel.to_string(),
            uids: uids.to_vec(),
        })
    }

    fn remove_vpn_uid_filter(&mut self, uids: &[Uid]) -> Result<(), BackendError> {
        self.handle(BackendCommand::RemoveVpnUidFilter {
            uids: uids.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERNET: &str = "android.permission.INTERNET";

    #[test]
    fn test_fake_device_installs_per_user() {
        let device = FakeDevice::new(29);
        device.add_user(UserId(1));
        device.install_for_users(
            PackageRecord::new("com.example", Uid(10001)).with_permissions([INTERNET]),
            &[UserId(0), UserId(1)],
        )
        .unwrap();

        let all = device.list_installed_packages(UserFilter::All);
        let uids: Vec<Uid> = all.iter().map(|r| r.uid).collect();
        assert_eq!(uids, vec![Uid(10001), Uid(110001)]);
        assert_eq!(
            device.list_installed_packages(UserFilter::User(UserId(1))).len(),
            1
        );
        assert_eq!(device.packages_for_uid(Uid(110001)), vec!["com.example".to_string()]);

        assert!(device.uninstall("com.example", UserId(1)));
        assert!(device.packages_for_uid(Uid(110001)).is_empty());
        assert!(device.package_info("com.example").is_some());
    }

    #[test]
    fn test_fake_device_grants() {
        let device = FakeDevice::new(29);
        device.install(PackageRecord::new("com.example", Uid(10001)).with_permissions([INTERNET]));

        assert!(device.has_permission(INTERNET, Uid(10001)));
        assert!(!device.has_permission(INTERNET, Uid(10002)));

        device.revoke(INTERNET, Uid(10001));
        assert!(!device.has_permission(INTERNET, Uid(10001)));
        device.grant(INTERNET, Uid(10001));
        assert!(device.has_permission(INTERNET, Uid(10001)));

        device.set_native_permissions(Uid(1041), &[INTERNET]);
        assert!(device.has_permission(INTERNET, Uid(1041)));
    }

    #[test]
    fn test_recording_backend_failure_injection() {
        let backend = RecordingBackend::new();
        let mut handle = backend.clone();

        backend.fail_next(1);
        assert!(handle.clear_network_class(&[Uid(10001)]).is_err());
        assert!(handle.clear_network_class(&[Uid(10001)]).is_ok());

        backend.fail_operation("add_vpn_uid_filter");
        assert!(handle.add_vpn_uid_filter("tun0", &[Uid(10001)]).is_err());
        backend.heal();
        assert!(handle.add_vpn_uid_filter("tun0", &[Uid(10001)]).is_ok());

        assert_eq!(backend.rejected().len(), 2);
        assert_eq!(backend.command_count(), 2);
        assert_eq!(backend.view().vpn_tunnel(Uid(10001)), Some("tun0"));
        assert_eq!(backend.take_commands().len(), 2);
        assert_eq!(backend.command_count(), 0);
    }
}
