//! Error types for VPN range tracking

use permsync_core_identity::{IdentityError, Uid, UidRange};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VpnError {
    #[error("Unknown VPN tunnel: {0}")]
    UnknownTunnel(String),

    #[error("Tunnel {tunnel} is owned by uid {existing}, not uid {requested}")]
    OwnerConflict {
        tunnel: String,
        existing: Uid,
        requested: Uid,
    },

    #[error("Range {range} overlaps range {existing} already routed through tunnel {tunnel}")]
    OverlapsExisting {
        tunnel: String,
        range: UidRange,
        existing: UidRange,
    },

    #[error("Invalid UID range set: {0}")]
    Range(#[from] IdentityError),
}

impl VpnError {
    /// Contract violations by the caller, as opposed to references to
    /// tunnels that no longer exist
    pub fn is_invariant_violation(&self) -> bool {
        !matches!(self, VpnError::UnknownTunnel(_))
    }
}
