//! Filtering backend command sink

use permsync_core_classifier::{NetworkClass, TrafficState};
use permsync_core_identity::Uid;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend rejected {command}: {reason}")]
    Rejected { command: String, reason: String },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// One-way command sink for the firewall/routing layer
///
/// Each call carries a batch of UIDs that receive the same value. Calls are
/// synchronous; an `Err` means the backend did not apply the batch.
pub trait FilterBackend: Send {
    /// Set the network-access class for `uids`; `class` is never `None`
    fn set_network_class(
        &mut self,
        class: NetworkClass,
        uids: &[Uid],
    ) -> Result<(), BackendError>;

    fn clear_network_class(&mut self, uids: &[Uid]) -> Result<(), BackendError>;

    fn set_traffic_permission(
        &mut self,
        state: TrafficState,
        uids: &[Uid],
    ) -> Result<(), BackendError>;

    fn add_vpn_uid_filter(&mut self, tunnel: &str, uids: &[Uid]) -> Result<(), BackendError>;

    /// Drop whatever VPN filter rule each UID currently has
    fn remove_vpn_uid_filter(&mut self, uids: &[Uid]) -> Result<(), BackendError>;
}

impl<B: FilterBackend + ?Sized> FilterBackend for Box<B> {
    fn set_network_class(
        &mut self,
        class: NetworkClass,
        uids: &[Uid],
    ) -> Result<(), BackendError> {
        (**self).set_network_class(class, uids)
    }

    fn clear_network_class(&mut self, uids: &[Uid]) -> Result<(), BackendError> {
        (**self).clear_network_class(uids)
    }

    fn set_traffic_permission(
        &mut self,
        state: TrafficState,
        uids: &[Uid],
    ) -> Result<(), BackendError> {
        (**self).set_traffic_permission(state, uids)
    }

    fn add_vpn_uid_filter(&mut self, tunnel: &str, uids: &[Uid]) -> Result<(), BackendError> {
        (**self).add_vpn_uid_filter(tunnel, uids)
    }

    fn remove_vpn_uid_filter(&mut self, uids: &[Uid]) -> Result<(), BackendError> {
        (**self).remove_vpn_uid_filter(uids)
    }
}

/// A single backend call, as planned by the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    SetNetworkClass { class: NetworkClass, uids: Vec<Uid> },
    ClearNetworkClass { uids: Vec<Uid> },
    SetTrafficPermission { state: TrafficState, uids: Vec<Uid> },
    AddVpnUidFilter { tunnel: String, uids: Vec<Uid> },
    RemoveVpnUidFilter { uids: Vec<Uid> },
}

impl BackendCommand {
    pub fn apply<B: FilterBackend + ?Sized>(&self, backend: &mut B) -> Result<(), BackendError> {
        match self {
            BackendCommand::SetNetworkClass { class, uids } => {
                backend.set_network_class(*class, uids)
            }
            BackendCommand::ClearNetworkClass { uids } => backend.clear_network_class(uids),
            BackendCommand::SetTrafficPermission { state, uids } => {
                backend.set_traffic_permission(*state, uids)
            }
            BackendCommand::AddVpnUidFilter { tunnel, uids } => {
                backend.add_vpn_uid_filter(tunnel, uids)
            }
            BackendCommand::RemoveVpnUidFilter { uids } => backend.remove_vpn_uid_filter(uids),
        }
    }

    pub fn uids(&self) -> &[Uid] {
        match self {
            BackendCommand::SetNetworkClass { uids, .. }
            | BackendCommand::ClearNetworkClass { uids }
            | BackendCommand::SetTrafficPermission { uids, .. }
            | BackendCommand::AddVpnUidFilter { uids, .. }
            | BackendCommand::RemoveVpnUidFilter { uids } => uids,
        }
    }

    /// Short operation name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::SetNetworkClass { .. } => "set_network_class",
            BackendCommand::ClearNetworkClass { .. } => "clear_network_class",
            BackendCommand::SetTrafficPermission { .. } => "set_traffic_permission",
            BackendCommand::AddVpnUidFilter { .. } => "add_vpn_uid_filter",
            BackendCommand::RemoveVpnUidFilter { .. } => "remove_vpn_uid_filter",
        }
    }
}

impl fmt::Display for BackendCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uids = self
            .uids()
            .iter()
            .map(|uid| uid.to_string())
            .collect::<Vec<_>>()
            .join(",");
        match self {
            BackendCommand::SetNetworkClass { class, .. } => {
                write!(f, "{}({class}; [{uids}])", self.name())
            }
            BackendCommand::SetTrafficPermission { state, .. } => {
                write!(f, "{}({state}; [{uids}])", self.name())
            }
            BackendCommand::AddVpnUidFilter { tunnel, .. } => {
                write!(f, "{}({tunnel}; [{uids}])", self.name())
            }
            _ => write!(f, "{}([{uids}])", self.name()),
        }
    }
}
