//! Privilege facets pushed to the filtering backend

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ranked network classification of a UID
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum NetworkClass {
    #[default]
    None,
    Network,
    System,
}

impl NetworkClass {
    /// Backend encoding; `None` is never set, only cleared
    pub fn wire_value(self) -> Option<i32> {
        match self {
            NetworkClass::None => None,
            NetworkClass::Network => Some(1),
            NetworkClass::System => Some(2),
        }
    }

    pub fn is_none(self) -> bool {
        self == NetworkClass::None
    }
}

impl fmt::Display for NetworkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkClass::None => write!(f, "none"),
            NetworkClass::Network => write!(f, "network"),
            NetworkClass::System => write!(f, "system"),
        }
    }
}

bitflags! {
    /// Coarse traffic capabilities, one bit per capability
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TrafficPermissions: u32 {
        /// May use network sockets
        const INTERNET = 1 << 2;
        /// May be charged in traffic accounting
        const UPDATE_DEVICE_STATS = 1 << 3;
    }
}

/// Traffic state of a UID as the backend sees it
///
/// `Uninstalled` is a UID-level sentinel: no package owns the UID. It is
/// distinct from `Granted(empty)`, which means the UID is present with no
/// traffic grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "i32")]
pub enum TrafficState {
    Uninstalled,
    Granted(TrafficPermissions),
}

impl TrafficState {
    pub const UNINSTALLED_WIRE_VALUE: i32 = -1;

    pub fn none() -> Self {
        TrafficState::Granted(TrafficPermissions::empty())
    }

    pub fn wire_value(self) -> i32 {
        match self {
            TrafficState::Uninstalled => Self::UNINSTALLED_WIRE_VALUE,
            // Only bits 2 and 3 are defined, the cast cannot overflow
            TrafficState::Granted(bits) => bits.bits() as i32,
        }
    }

    pub fn is_uninstalled(self) -> bool {
        self == TrafficState::Uninstalled
    }
}

impl From<TrafficState> for i32 {
    fn from(state: TrafficState) -> Self {
        state.wire_value()
    }
}

impl fmt::Display for TrafficState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrafficState::Uninstalled => write!(f, "uninstalled"),
            TrafficState::Granted(bits) if bits.is_empty() => write!(f, "none"),
            TrafficState::Granted(bits) => {
                let names: Vec<&str> = bits.iter_names().map(|(name, _)| name).collect();
                write!(f, "{}", names.join("|").to_lowercase())
            }
        }
    }
}
