//! Tunnel range bookkeeping

use crate::error::VpnError;
use permsync_core_identity::{ensure_disjoint, ranges_contain, Uid, UidRange};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Current state of one tunnel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunnelInfo {
    /// UID of the VPN app that owns the tunnel
    pub owner: Uid,
    /// Disjoint ranges currently routed through the tunnel
    pub ranges: BTreeSet<UidRange>,
}

impl TunnelInfo {
    fn covers(&self, uid: Uid) -> bool {
        uid != self.owner && ranges_contain(&self.ranges, uid)
    }
}

/// Tunnel identifier -> owner and range-set
#[derive(Debug, Clone, Default)]
pub struct VpnRangeTracker {
    tunnels: BTreeMap<String, TunnelInfo>,
}

impl VpnRangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `ranges` for `tunnel` and return the installed UIDs they cover
    ///
    /// The returned set excludes `owner`. Ranges are merged into the tunnel's
    /// existing set; they must be disjoint from each other and from what is
    /// already routed. Nothing changes when an error is returned.
    pub fn ranges_added(
        &mut self,
        tunnel: &str,
        ranges: &[UidRange],
        owner: Uid,
        installed: &BTreeSet<Uid>,
    ) -> Result<BTreeSet<Uid>, VpnError> {
        ensure_disjoint(ranges)?;

        if let Some(info) = self.tunnels.get(tunnel) {
            if info.owner != owner {
                return Err(VpnError::OwnerConflict {
                    tunnel: tunnel.to_string(),
                    existing: info.owner,
                    requested: owner,
                });
            }
            for range in ranges {
                if let Some(existing) = info.ranges.iter().find(|r| r.overlaps(range)) {
                    return Err(VpnError::OverlapsExisting {
                        tunnel: tunnel.to_string(),
                        range: *range,
                        existing: *existing,
                    });
                }
            }
        }

        if ranges.is_empty() {
            return Ok(BTreeSet::new());
        }

        let covered = intersect(ranges, owner, installed);
        let info = self
            .tunnels
            .entry(tunnel.to_string())
            .or_insert_with(|| TunnelInfo {
                owner,
                ranges: BTreeSet::new(),
            });
        info.ranges.extend(ranges.iter().copied());

        debug!(
            tunnel,
            owner = %owner,
            ranges = ranges.len(),
            covered = covered.len(),
            "VPN ranges added"
        );
        Ok(covered)
    }

    /// Remove `ranges` from `tunnel` and return the installed UIDs they covered
    ///
    /// Ranges that are not part of the tunnel's set are skipped. Once the last
    /// range is gone the tunnel becomes unknown.
    pub fn ranges_removed(
        &mut self,
        tunnel: &str,
        ranges: &[UidRange],
        owner: Uid,
        installed: &BTreeSet<Uid>,
    ) -> Result<BTreeSet<Uid>, VpnError> {
        let info = self
            .tunnels
            .get_mut(tunnel)
            .ok_or_else(|| VpnError::UnknownTunnel(tunnel.to_string()))?;
        if info.owner != owner {
            return Err(VpnError::OwnerConflict {
                tunnel: tunnel.to_string(),
                existing: info.owner,
                requested: owner,
            });
        }

        let mut removed = Vec::with_capacity(ranges.len());
        for range in ranges {
            if info.ranges.remove(range) {
                removed.push(*range);
            } else {
                warn!(
                    tunnel,
                    range = %range,
                    "Ignoring removal of a range the tunnel does not route"
                );
            }
        }

        let covered = intersect(&removed, owner, installed);
        if info.ranges.is_empty() {
            self.tunnels.remove(tunnel);
            debug!(tunnel, "Last VPN range removed, tunnel forgotten");
        }
        Ok(covered)
    }

    /// Forget `tunnel` and return the owner plus every installed UID it covered
    pub fn disconnected(
        &mut self,
        tunnel: &str,
        installed: &BTreeSet<Uid>,
    ) -> Result<(Uid, BTreeSet<Uid>), VpnError> {
        let info = self
            .tunnels
            .remove(tunnel)
            .ok_or_else(|| VpnError::UnknownTunnel(tunnel.to_string()))?;
        let covered = installed
            .iter()
            .copied()
            .filter(|uid| info.covers(*uid))
            .collect();
        Ok((info.owner, covered))
    }

    /// Range-set of `tunnel`, `None` if the tunnel is unknown
    pub fn ranges(&self, tunnel: &str) -> Option<&BTreeSet<UidRange>> {
        self.tunnels.get(tunnel).map(|info| &info.ranges)
    }

    /// Every active tunnel whose ranges cover `uid`, skipping tunnels owned by it
    pub fn tunnels_covering(&self, uid: Uid) -> Vec<&str> {
        self.tunnels
            .iter()
            .filter(|(_, info)| info.covers(uid))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Derived view: installed UID -> tunnels covering it
    pub fn coverage(&self, installed: &BTreeSet<Uid>) -> BTreeMap<Uid, BTreeSet<String>> {
        let mut coverage: BTreeMap<Uid, BTreeSet<String>> = BTreeMap::new();
        for uid in installed {
            for name in self.tunnels_covering(*uid) {
                coverage.entry(*uid).or_default().insert(name.to_string());
            }
        }
        coverage
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TunnelInfo)> {
        self.tunnels.iter().map(|(name, info)| (name.as_str(), info))
    }

    pub fn len(&self) -> usize {
        self.tunnels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunnels.is_empty()
    }

    pub fn clear(&mut self) {
        self.tunnels.clear();
    }
}

fn intersect(ranges: &[UidRange], owner: Uid, installed: &BTreeSet<Uid>) -> BTreeSet<Uid> {
    installed
        .iter()
        .copied()
        .filter(|uid| *uid != owner && ranges_contain(ranges, *uid))
        .collect()
}
