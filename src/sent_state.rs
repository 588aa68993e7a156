/*!
 * Memory of what the backend was last told
 *
 * The cache is only written after the backend accepted a command, so a
 * failed push leaves the old value in place and the next event touching the
 * same UID diffs against it again.
 */

use permsync_core_classifier::{NetworkClass, TrafficState};
use permsync_core_identity::Uid;
use permsync_interface::BackendCommand;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct SentState {
    /// Only classes other than NONE are kept
    network: BTreeMap<Uid, NetworkClass>,
    /// UNINSTALLED UIDs are dropped
    traffic: BTreeMap<Uid, TrafficState>,
    /// Filtered UID -> tunnel it is bound to
    vpn: BTreeMap<Uid, String>,
}

impl SentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network(&self, uid: Uid) -> NetworkClass {
        self.network.get(&uid).copied().unwrap_or_default()
    }

    /// UNINSTALLED unless a live state was sent for `uid`
    pub fn traffic(&self, uid: Uid) -> TrafficState {
        self.traffic
            .get(&uid)
            .copied()
            .unwrap_or(TrafficState::Uninstalled)
    }

    pub fn vpn_tunnel(&self, uid: Uid) -> Option<&str> {
        self.vpn.get(&uid).map(String::as_str)
    }

    /// Apply the effect of a command the backend accepted
    pub fn record(&mut self, command: &BackendCommand) {
        match command {
            BackendCommand::SetNetworkClass { class, uids } => {
                for uid in uids {
                    if class.is_none() {
                        self.network.remove(uid);
                    } else {
                        self.network.insert(*uid, *class);
                    }
                }
            }
            BackendCommand::ClearNetworkClass { uids } => {
                for uid in uids {
                    self.network.remove(uid);
                }
            }
            BackendCommand::SetTrafficPermission { state, uids } => {
                for uid in uids {
                    if *state == TrafficState::Uninstalled {
                        self.traffic.remove(uid);
                    } else {
                        self.traffic.insert(*uid, *state);
                    }
                }
            }
            BackendCommand::AddVpnUidFilter { tunnel, uids } => {
                for uid in uids {
                    self.vpn.insert(*uid, tunnel.clone());
                }
            }
            BackendCommand::RemoveVpnUidFilter { uids } => {
                for uid in uids {
                    self.vpn.remove(uid);
                }
            }
        }
    }

    pub fn filtered(&self) -> impl Iterator<Item = (Uid, &str)> {
        self.vpn.iter().map(|(uid, tunnel)| (*uid, tunnel.as_str()))
    }

    pub fn clear(&mut self) {
        self.network.clear();
        self.traffic.clear();
        self.vpn.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permsync_core_classifier::TrafficPermissions;

    #[test]
    fn test_defaults_for_unknown_uid() {
        let sent = SentState::new();
        assert_eq!(sent.network(Uid(10001)), NetworkClass::None);
        assert_eq!(sent.traffic(Uid(10001)), TrafficState::Uninstalled);
        assert_eq!(sent.vpn_tunnel(Uid(10001)), None);
    }

    #[test]
    fn test_record_network_set_and_clear() {
        let mut sent = SentState::new();
        sent.record(&BackendCommand::SetNetworkClass {
            class: NetworkClass::System,
            uids: vec![Uid(1000), Uid(10001)],
        });
        assert_eq!(sent.network(Uid(10001)), NetworkClass::System);

        sent.record(&BackendCommand::ClearNetworkClass {
            uids: vec![Uid(10001)],
        });
        assert_eq!(sent.network(Uid(10001)), NetworkClass::None);
        assert_eq!(sent.network(Uid(1000)), NetworkClass::System);
    }

    #[test]
    fn test_record_traffic_drops_uninstalled() {
        let mut sent = SentState::new();
        sent.record(&BackendCommand::SetTrafficPermission {
            state: TrafficState::Granted(TrafficPermissions::INTERNET),
            uids: vec![Uid(10001), Uid(10002)],
        });
        sent.record(&BackendCommand::SetTrafficPermission {
            state: TrafficState::none(),
            uids: vec![Uid(10003)],
        });
        assert_eq!(sent.traffic.len(), 3);

        sent.record(&BackendCommand::SetTrafficPermission {
            state: TrafficState::Uninstalled,
            uids: vec![Uid(10001), Uid(10003)],
        });
        assert_eq!(sent.traffic(Uid(10001)), TrafficState::Uninstalled);
        assert_eq!(sent.traffic(Uid(10003)), TrafficState::Uninstalled);
        assert_eq!(
            sent.traffic(Uid(10002)),
            TrafficState::Granted(TrafficPermissions::INTERNET)
        );
        assert_eq!(sent.traffic.keys().copied().collect::<Vec<_>>(), vec![Uid(10002)]);
    }

    #[test]
    fn test_record_vpn_bindings() {
        let mut sent = SentState::new();
        sent.record(&BackendCommand::AddVpnUidFilter {
            tunnel: "tun0".to_string(),
            uids: vec![Uid(1000), Uid(10001)],
        });
        sent.record(&BackendCommand::RemoveVpnUidFilter {
            uids: vec![Uid(1000)],
        });

        let filtered: Vec<(Uid, &str)> = sent.filtered().collect();
        assert_eq!(filtered, vec![(Uid(10001), "tun0")]);
    }
}
