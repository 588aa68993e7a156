/*!
 * UID aggregation: every live package sharing a UID contributes to its state
 *
 * A UID's state is always re-derived from scratch over its live packages.
 * Incremental OR-ing would never lower a grant once a package drops a
 * permission, so the aggregator keeps the records themselves and folds them
 * again on every change.
 */

use permsync_core_classifier::{
    Classifier, NetworkClass, PackageRecord, PermissionSet, TrafficPermissions, TrafficState,
};
use permsync_core_identity::{Uid, UserId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Derived privilege state of one UID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UidState {
    pub network: NetworkClass,
    pub traffic: TrafficState,
}

impl UidState {
    /// State of a UID nothing owns
    pub const UNINSTALLED: UidState = UidState {
        network: NetworkClass::None,
        traffic: TrafficState::Uninstalled,
    };
}

/// A package as installed for one UID
#[derive(Debug, Clone, PartialEq, Eq)]
struct LivePackage {
    /// Record as declared by the registry
    record: PackageRecord,
    /// Declared permissions the grant authority confirmed
    granted: PermissionSet,
}

#[derive(Debug, Clone)]
pub struct UidAggregator {
    classifier: Classifier,
    packages: BTreeMap<Uid, BTreeMap<String, LivePackage>>,
    native: BTreeMap<Uid, TrafficPermissions>,
    memo: BTreeMap<Uid, UidState>,
}

impl UidAggregator {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            packages: BTreeMap::new(),
            native: BTreeMap::new(),
            memo: BTreeMap::new(),
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Insert or replace `record` under its UID and return the new UID state
    ///
    /// `granted` is the subset of the declared permissions that the grant
    /// authority confirmed for `record.uid`.
    pub fn add_package(&mut self, record: PackageRecord, granted: PermissionSet) -> UidState {
        let uid = record.uid;
        let name = record.name.clone();
        let replaced = self
            .packages
            .entry(uid)
            .or_default()
            .insert(name.clone(), LivePackage { record, granted })
            .is_some();
        debug!(%uid, package = %name, replaced, "package tracked");
        self.refresh(uid)
    }

    /// Remove `name` from `uid`, `None` if it was not tracked there
    pub fn remove_package(&mut self, uid: Uid, name: &str) -> Option<UidState> {
        let packages = self.packages.get_mut(&uid)?;
        packages.remove(name)?;
        if packages.is_empty() {
            self.packages.remove(&uid);
        }
        debug!(%uid, package = %name, "package dropped");
        Some(self.refresh(uid))
    }

    /// Drop every package installed for `user` and return the affected UIDs
    pub fn remove_user(&mut self, user: UserId) -> BTreeSet<Uid> {
        let uids: BTreeSet<Uid> = self
            .packages
            .keys()
            .copied()
            .filter(|uid| uid.user_id() == user)
            .collect();
        for uid in &uids {
            self.packages.remove(uid);
            self.refresh(*uid);
        }
        uids
    }

    /// Fold native-service traffic grants into `uid`
    pub fn set_native_grants(&mut self, uid: Uid, bits: TrafficPermissions) -> UidState {
        if bits.is_empty() {
            self.native.remove(&uid);
        } else {
            self.native.insert(uid, bits);
        }
        self.refresh(uid)
    }

    /// Aggregate state over the live packages of `uid`
    ///
    /// Network class is the maximum over the packages' individual classes.
    /// Traffic is the OR of their bits plus native grants, or UNINSTALLED
    /// when neither exists.
    pub fn recompute_uid(&self, uid: Uid) -> UidState {
        let native = self.native.get(&uid).copied();
        let Some(packages) = self.packages.get(&uid) else {
            return match native {
                Some(bits) => UidState {
                    network: NetworkClass::None,
                    traffic: TrafficState::Granted(bits),
                },
                None => UidState::UNINSTALLED,
            };
        };

        let mut network = NetworkClass::None;
        let mut traffic = native.unwrap_or_else(TrafficPermissions::empty);
        for live in packages.values() {
            network = network.max(self.classifier.rank(&live.granted, live.record.provenance));
            traffic |= Classifier::traffic_bits(&live.granted);
        }
        UidState {
            network,
            traffic: TrafficState::Granted(traffic),
        }
    }

    fn refresh(&mut self, uid: Uid) -> UidState {
        let state = self.recompute_uid(uid);
        if state == UidState::UNINSTALLED {
            self.memo.remove(&uid);
        } else {
            self.memo.insert(uid, state);
        }
        state
    }

    /// Memoized state of `uid`, UNINSTALLED if nothing owns it
    pub fn state(&self, uid: Uid) -> UidState {
        self.memo.get(&uid).copied().unwrap_or(UidState::UNINSTALLED)
    }

    pub fn contains(&self, uid: Uid, name: &str) -> bool {
        self.packages
            .get(&uid)
            .is_some_and(|packages| packages.contains_key(name))
    }

    pub fn package_names(&self, uid: Uid) -> Vec<String> {
        self.packages
            .get(&uid)
            .map(|packages| packages.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_installed(&self, uid: Uid) -> bool {
        self.packages.contains_key(&uid)
    }

    /// UIDs owned by at least one package
    pub fn installed_uids(&self) -> BTreeSet<Uid> {
        self.packages.keys().copied().collect()
    }

    /// Every UID with a non-UNINSTALLED state, including native-only ones
    pub fn known_uids(&self) -> BTreeSet<Uid> {
        self.memo.keys().copied().collect()
    }

    /// One declared record per package name, whatever user it came from
    pub fn templates(&self) -> Vec<PackageRecord> {
        let mut templates: BTreeMap<&str, &PackageRecord> = BTreeMap::new();
        for live in self.packages.values().flat_map(|packages| packages.values()) {
            templates.entry(live.record.name.as_str()).or_insert(&live.record);
        }
        templates.into_values().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.packages.clear();
        self.native.clear();
        self.memo.clear();
    }
}
