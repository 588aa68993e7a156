//! Recognized permission kinds
//!
//! Permission strings are matched once, at the classifier boundary, against a
//! closed set. Anything else a package declares is irrelevant to network
//! privilege and dropped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Permission strings that influence network privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PermissionKind {
    /// May open network sockets
    Internet,
    /// May be charged in traffic accounting on behalf of others
    UpdateDeviceStats,
    /// General "change network state" permission
    ChangeNetworkState,
    /// Platform network stack
    NetworkStack,
    /// Updatable network stack module
    MainlineNetworkStack,
    /// May use restricted networks
    UseRestrictedNetworks,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 6] = [
        PermissionKind::Internet,
        PermissionKind::UpdateDeviceStats,
        PermissionKind::ChangeNetworkState,
        PermissionKind::NetworkStack,
        PermissionKind::MainlineNetworkStack,
        PermissionKind::UseRestrictedNetworks,
    ];

    /// Look up a permission string; `None` for anything unrecognized
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    /// The permission string this kind is declared as
    pub fn name(self) -> &'static str {
        match self {
            PermissionKind::Internet => "android.permission.INTERNET",
            PermissionKind::UpdateDeviceStats => "android.permission.UPDATE_DEVICE_STATS",
            PermissionKind::ChangeNetworkState => "android.permission.CHANGE_NETWORK_STATE",
            PermissionKind::NetworkStack => "android.permission.NETWORK_STACK",
            PermissionKind::MainlineNetworkStack => "android.permission.MAINLINE_NETWORK_STACK",
            PermissionKind::UseRestrictedNetworks => {
                "android.permission.CONNECTIVITY_USE_RESTRICTED_NETWORKS"
            }
        }
    }

    /// Grants SYSTEM classification on its own
    pub fn is_restricted(self) -> bool {
        matches!(
            self,
            PermissionKind::NetworkStack
                | PermissionKind::MainlineNetworkStack
                | PermissionKind::UseRestrictedNetworks
        )
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of recognized permissions held by a package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<PermissionKind>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse permission strings, silently skipping unrecognized ones
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .filter_map(|name| PermissionKind::from_name(name.as_ref()))
                .collect(),
        )
    }

    pub fn contains(&self, kind: PermissionKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn insert(&mut self, kind: PermissionKind) -> bool {
        self.0.insert(kind)
    }

    pub fn has_restricted(&self) -> bool {
        self.0.iter().any(|kind| kind.is_restricted())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PermissionKind> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<PermissionKind> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = PermissionKind>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
