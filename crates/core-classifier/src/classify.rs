//! Classification rules
//!
//! Network classification, in order of precedence:
//!
//! 1. SYSTEM if the package holds a network-stack or restricted-networks permission
//! 2. SYSTEM if the package is a carry-over candidate (see [`Classifier::is_carryover`])
//! 3. NETWORK if the package holds the change-network-state permission
//! 4. NONE otherwise
//!
//! Traffic permissions are computed independently, one bit per matched permission.

use crate::package::{PackageRecord, Provenance};
use crate::permission::{PermissionKind, PermissionSet};
use crate::state::{NetworkClass, TrafficPermissions};
use tracing::trace;

/// Both facets for a single package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageClassification {
    pub network: NetworkClass,
    pub traffic: TrafficPermissions,
}

/// Stateless classifier, parameterized by device history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    /// Platform version the device first booted with (fixed at first boot)
    first_platform_version: u32,
    /// Platform version that made the explicit permission mandatory
    modern_permission_version: u32,
}

impl Classifier {
    pub fn new(first_platform_version: u32, modern_permission_version: u32) -> Self {
        Self {
            first_platform_version,
            modern_permission_version,
        }
    }

    pub fn first_platform_version(&self) -> u32 {
        self.first_platform_version
    }

    pub fn modern_permission_version(&self) -> u32 {
        self.modern_permission_version
    }

    /// Whether the device predates the modern permission model
    pub fn is_legacy_device(&self) -> bool {
        self.first_platform_version < self.modern_permission_version
    }

    /// Carry-over candidates keep network privilege without the explicit
    /// permission string.
    ///
    /// Only the device's first platform version matters here; the package's
    /// own target SDK is deliberately not consulted.
    pub fn is_carryover(&self, provenance: Provenance) -> bool {
        provenance.is_privileged() && self.is_legacy_device()
    }

    /// Rank a single package
    pub fn network_class(&self, package: &PackageRecord) -> NetworkClass {
        let permissions = PermissionSet::from_names(&package.permissions);
        let class = self.rank(&permissions, package.provenance);
        trace!(
            package = %package.name,
            uid = %package.uid,
            %class,
            "classified package"
        );
        class
    }

    /// Rank an already-parsed permission set
    pub fn rank(&self, permissions: &PermissionSet, provenance: Provenance) -> NetworkClass {
        if permissions.has_restricted() || self.is_carryover(provenance) {
            NetworkClass::System
        } else if permissions.contains(PermissionKind::ChangeNetworkState) {
            NetworkClass::Network
        } else {
            NetworkClass::None
        }
    }

    /// Traffic bits contributed by a single package
    ///
    /// A package declaring none of the traffic permissions contributes the
    /// empty set, never the UID-level UNINSTALLED sentinel.
    pub fn traffic_permissions(package: &PackageRecord) -> TrafficPermissions {
        Self::traffic_bits(&PermissionSet::from_names(&package.permissions))
    }

    pub fn traffic_bits(permissions: &PermissionSet) -> TrafficPermissions {
        let mut bits = TrafficPermissions::empty();
        if permissions.contains(PermissionKind::Internet) {
            bits |= TrafficPermissions::INTERNET;
        }
        if permissions.contains(PermissionKind::UpdateDeviceStats) {
            bits |= TrafficPermissions::UPDATE_DEVICE_STATS;
        }
        bits
    }

    pub fn classify(&self, package: &PackageRecord) -> PackageClassification {
        PackageClassification {
            network: self.network_class(package),
            traffic: Self::traffic_permissions(package),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LEGACY_PLATFORM_VERSION, MODERN_PERMISSION_VERSION};
    use permsync_core_identity::Uid;

    const CHANGE_NETWORK_STATE: &str = "android.permission.CHANGE_NETWORK_STATE";
    const NETWORK_STACK: &str = "android.permission.NETWORK_STACK";
    const RESTRICTED: &str = "android.permission.CONNECTIVITY_USE_RESTRICTED_NETWORKS";
    const INTERNET: &str = "android.permission.INTERNET";
    const UPDATE_DEVICE_STATS: &str = "android.permission.UPDATE_DEVICE_STATS";

    fn legacy() -> Classifier {
        Classifier::new(LEGACY_PLATFORM_VERSION, MODERN_PERMISSION_VERSION)
    }

    fn modern() -> Classifier {
        Classifier::new(MODERN_PERMISSION_VERSION, MODERN_PERMISSION_VERSION)
    }

    fn app(permissions: &[&str]) -> PackageRecord {
        PackageRecord::new("appName1", Uid(10001)).with_permissions(permissions.iter().copied())
    }

    #[test]
    fn test_ranking_precedence() {
        let classifier = modern();
        assert_eq!(classifier.network_class(&app(&[])), NetworkClass::None);
        assert_eq!(
            classifier.network_class(&app(&[CHANGE_NETWORK_STATE])),
            NetworkClass::Network
        );
        assert_eq!(
            classifier.network_class(&app(&[NETWORK_STACK])),
            NetworkClass::System
        );
        assert_eq!(
            classifier.network_class(&app(&[RESTRICTED, CHANGE_NETWORK_STATE])),
            NetworkClass::System
        );
        assert_eq!(
            classifier.network_class(&app(&["android.permission.CHANGE_WIFI_STATE"])),
            NetworkClass::None
        );
    }

    #[test]
    fn test_carryover_truth_table() {
        let legacy = legacy();
        let modern = modern();
        for provenance in [
            Provenance::PlatformCore,
            Provenance::Oem,
            Provenance::Product,
            Provenance::Vendor,
        ] {
            assert!(legacy.is_carryover(provenance), "{:?}", provenance);
            assert!(!modern.is_carryover(provenance), "{:?}", provenance);
        }
        assert!(!legacy.is_carryover(Provenance::Other));
        assert!(!modern.is_carryover(Provenance::Other));
    }

    #[test]
    fn test_carryover_platform_core_without_permission() {
        let core = PackageRecord::new("sysName1", Uid(1000)).with_provenance(Provenance::PlatformCore);
        assert_eq!(legacy().network_class(&core), NetworkClass::System);
        assert_eq!(modern().network_class(&core), NetworkClass::None);
    }

    #[test]
    fn test_carryover_ignores_target_sdk() {
        for target_sdk in [LEGACY_PLATFORM_VERSION, MODERN_PERMISSION_VERSION, 34] {
            let vendor = PackageRecord::new("vendorApp", Uid(10001))
                .with_provenance(Provenance::Vendor)
                .with_target_sdk(target_sdk);
            assert_eq!(legacy().network_class(&vendor), NetworkClass::System);
            assert_eq!(modern().network_class(&vendor), NetworkClass::None);
        }
    }

    #[test]
    fn test_modern_device_requires_explicit_permission() {
        let vendor = PackageRecord::new("vendorApp", Uid(10001))
            .with_provenance(Provenance::Oem)
            .with_permissions([CHANGE_NETWORK_STATE]);
        assert_eq!(modern().network_class(&vendor), NetworkClass::Network);
    }

    #[test]
    fn test_traffic_bits_independent_of_ranking() {
        let package = app(&[INTERNET, UPDATE_DEVICE_STATS]);
        let classification = modern().classify(&package);
        assert_eq!(classification.network, NetworkClass::None);
        assert_eq!(
            classification.traffic,
            TrafficPermissions::INTERNET | TrafficPermissions::UPDATE_DEVICE_STATS
        );
        assert!(Classifier::traffic_permissions(&app(&[NETWORK_STACK])).is_empty());
    }
}
