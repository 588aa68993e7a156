/*!
 * Point-in-time dump of the engine state
 */

use crate::error::Result;
use crate::stats::SyncStats;
use permsync_core_classifier::{NetworkClass, TrafficState};
use permsync_core_identity::{Uid, UidRange, UserId};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub monitoring: bool,
    pub first_platform_version: u32,
    pub modern_permission_version: u32,
    pub active_users: Vec<UserId>,
    pub uids: Vec<UidSnapshot>,
    pub tunnels: Vec<TunnelSnapshot>,
    /// Filters the backend was told about, as opposed to desired ones
    pub vpn_filters: Vec<VpnFilterSnapshot>,
    pub stats: SyncStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UidSnapshot {
    pub uid: Uid,
    pub network: NetworkClass,
    pub traffic: TrafficState,
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunnelSnapshot {
    pub name: String,
    pub owner: Uid,
    pub ranges: Vec<UidRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VpnFilterSnapshot {
    pub uid: Uid,
    pub tunnel: String,
}

impl MonitorSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn uid(&self, uid: Uid) -> Option<&UidSnapshot> {
        self.uids.iter().find(|entry| entry.uid == uid)
    }

    /// UIDs bound to `tunnel` in the backend
    pub fn filtered_uids(&self, tunnel: &str) -> Vec<Uid> {
        self.vpn_filters
            .iter()
            .filter(|filter| filter.tunnel == tunnel)
            .map(|filter| filter.uid)
            .collect()
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for MonitorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Permission monitor: {} (first platform version {}, modern permission version {})",
            if self.monitoring { "monitoring" } else { "idle" },
            self.first_platform_version,
            self.modern_permission_version
        )?;
        writeln!(f, "Active users: [{}]", join(&self.active_users))?;

        writeln!(f, "UIDs:")?;
        for entry in &self.uids {
            writeln!(
                f,
                "  {}: network={} traffic={} packages=[{}]",
                entry.uid,
                entry.network,
                entry.traffic,
                entry.packages.join(", ")
            )?;
        }

        writeln!(f, "Tunnels:")?;
        for tunnel in &self.tunnels {
            writeln!(
                f,
                "  {}: owner={} ranges=[{}]",
                tunnel.name,
                tunnel.owner,
                join(&tunnel.ranges)
            )?;
        }

        writeln!(f, "Interface filtering rules:")?;
        for filter in &self.vpn_filters {
            writeln!(f, "  {} -> {}", filter.uid, filter.tunnel)?;
        }

        write!(f, "{}", self.stats.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permsync_core_classifier::TrafficPermissions;

    fn snapshot() -> MonitorSnapshot {
        MonitorSnapshot {
            monitoring: true,
            first_platform_version: 28,
            modern_permission_version: 29,
            active_users: vec![UserId(0), UserId(1)],
            uids: vec![UidSnapshot {
                uid: Uid(10001),
                network: NetworkClass::Network,
                traffic: TrafficState::Granted(TrafficPermissions::INTERNET),
                packages: vec!["com.example".to_string()],
            }],
            tunnels: vec![TunnelSnapshot {
                name: "tun0".to_string(),
                owner: Uid(10002),
                ranges: vec![UidRange::new(0, 10085).unwrap()],
            }],
            vpn_filters: vec![VpnFilterSnapshot {
                uid: Uid(10001),
                tunnel: "tun0".to_string(),
            }],
            stats: SyncStats::default(),
        }
    }

    #[test]
    fn test_json_uses_wire_values() {
        let json = snapshot().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["uids"][0]["traffic"], 4);
        assert_eq!(value["uids"][0]["network"], "network");
        assert_eq!(value["tunnels"][0]["owner"], 10002);
        assert_eq!(value["active_users"][1], 1);
    }

    #[test]
    fn test_dump_lists_filters() {
        let dump = snapshot().to_string();
        assert!(dump.contains("Active users: [u0, u1]"));
        assert!(dump.contains("tun0: owner=10002 ranges=[0-10085]"));
        assert!(dump.contains("10001 -> tun0"));
    }

    #[test]
    fn test_lookup_helpers() {
        let snap = snapshot();
        assert_eq!(snap.uid(Uid(10001)).map(|e| e.network), Some(NetworkClass::Network));
        assert!(snap.uid(Uid(1)).is_none());
        assert_eq!(snap.filtered_uids("tun0"), vec![Uid(10001)]);
        assert!(snap.filtered_uids("tun1").is_empty());
    }
}
