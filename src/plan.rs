/*!
 * Diff planning: desired state vs. sent state -> ordered backend commands
 *
 * Commands leave a plan in a fixed order: filter removals, classification
 * clears, classification sets, traffic updates, then filter additions.
 * Revocations therefore reach the backend before grants for the same event.
 */

use crate::aggregator::UidState;
use crate::sent_state::SentState;
use permsync_core_classifier::{NetworkClass, TrafficState};
use permsync_core_identity::Uid;
use permsync_interface::BackendCommand;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    unfilter: BTreeSet<Uid>,
    clear: BTreeSet<Uid>,
    network: BTreeMap<Uid, NetworkClass>,
    traffic: BTreeMap<Uid, TrafficState>,
    filter: BTreeMap<Uid, String>,
}

impl SyncPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue whatever `uid` needs to move the backend from `sent` to `desired`
    ///
    /// `tunnel` is the tunnel the UID should be filtered to, if any.
    pub fn diff_uid(
        &mut self,
        uid: Uid,
        desired: UidState,
        tunnel: Option<&str>,
        sent: &SentState,
    ) {
        let sent_class = sent.network(uid);
        if desired.network != sent_class {
            if desired.network.is_none() {
                self.clear.insert(uid);
            } else {
                self.network.insert(uid, desired.network);
            }
        }

        if sent.traffic(uid) != desired.traffic {
            self.traffic.insert(uid, desired.traffic);
        }

        match (sent.vpn_tunnel(uid), tunnel) {
            (Some(bound), Some(wanted)) if bound == wanted => {}
            (Some(_), Some(wanted)) => {
                self.unfilter.insert(uid);
                self.filter.insert(uid, wanted.to_string());
            }
            (Some(_), None) => {
                self.unfilter.insert(uid);
            }
            (None, Some(wanted)) => {
                self.filter.insert(uid, wanted.to_string());
            }
            (None, None) => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unfilter.is_empty()
            && self.clear.is_empty()
            && self.network.is_empty()
            && self.traffic.is_empty()
            && self.filter.is_empty()
    }

    /// Number of distinct UIDs the plan touches
    pub fn uid_count(&self) -> usize {
        let mut uids: BTreeSet<Uid> = self.unfilter.clone();
        uids.extend(self.clear.iter().copied());
        uids.extend(self.network.keys().copied());
        uids.extend(self.traffic.keys().copied());
        uids.extend(self.filter.keys().copied());
        uids.len()
    }

    /// Render the plan as backend commands
    ///
    /// With `coalesce`, UIDs receiving the same value share one command.
    /// Without it every UID gets its own command.
    pub fn into_commands(self, coalesce: bool) -> Vec<BackendCommand> {
        let mut commands = Vec::new();

        push_batches(
            &mut commands,
            coalesce,
            vec![((), self.unfilter.into_iter().collect())],
            |(), uids| BackendCommand::RemoveVpnUidFilter { uids },
        );
        push_batches(
            &mut commands,
            coalesce,
            vec![((), self.clear.into_iter().collect())],
            |(), uids| BackendCommand::ClearNetworkClass { uids },
        );

        let mut by_class: BTreeMap<NetworkClass, Vec<Uid>> = BTreeMap::new();
        for (uid, class) in self.network {
            by_class.entry(class).or_default().push(uid);
        }
        push_batches(
            &mut commands,
            coalesce,
            by_class.into_iter().collect(),
            |class, uids| BackendCommand::SetNetworkClass { class, uids },
        );

        // TrafficState has no ordering of its own, group by wire value
        let mut by_state: BTreeMap<i32, (TrafficState, Vec<Uid>)> = BTreeMap::new();
        for (uid, state) in self.traffic {
            by_state
                .entry(state.wire_value())
                .or_insert_with(|| (state, Vec::new()))
                .1
                .push(uid);
        }
        push_batches(
            &mut commands,
            coalesce,
            by_state.into_values().collect(),
            |state, uids| BackendCommand::SetTrafficPermission { state, uids },
        );

        let mut by_tunnel: BTreeMap<String, Vec<Uid>> = BTreeMap::new();
        for (uid, tunnel) in self.filter {
            by_tunnel.entry(tunnel).or_default().push(uid);
        }
        push_batches(
            &mut commands,
            coalesce,
            by_tunnel.into_iter().collect(),
            |tunnel, uids| BackendCommand::AddVpnUidFilter { tunnel, uids },
        );

        commands
    }
}

fn push_batches<K, F>(
    commands: &mut Vec<BackendCommand>,
    coalesce: bool,
    groups: Vec<(K, Vec<Uid>)>,
    make: F,
) where
    K: Clone,
    F: Fn(K, Vec<Uid>) -> BackendCommand,
{
    for (key, uids) in groups {
        if uids.is_empty() {
            continue;
        }
        if coalesce {
            commands.push(make(key, uids));
        } else {
            for uid in uids {
                commands.push(make(key.clone(), vec![uid]));
            }
        }
    }
}
