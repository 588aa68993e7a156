//! Inclusive UID ranges
//!
//! VPN tunnels route traffic for sets of contiguous UID intervals. A range may
//! span several user namespaces.

use crate::error::IdentityError;
use crate::{derive_uid, AppId, Uid, UserId, PER_USER_RANGE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Contiguous, inclusive interval of UIDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UidRange {
    start: Uid,
    stop: Uid,
}

impl UidRange {
    /// Create a range covering `start..=stop`
    ///
    /// Fails if `start > stop`.
    pub fn new(start: u32, stop: u32) -> Result<Self, IdentityError> {
        if start > stop {
            return Err(IdentityError::InvalidRange { start, stop });
        }
        Ok(Self {
            start: Uid(start),
            stop: Uid(stop),
        })
    }

    /// Range holding exactly one UID
    pub fn single(uid: Uid) -> Self {
        Self {
            start: uid,
            stop: uid,
        }
    }

    /// Range covering every UID of one user namespace
    pub fn for_user(user: UserId) -> Result<Self, IdentityError> {
        let start = derive_uid(user, AppId(0))?;
        let stop = derive_uid(user, AppId(PER_USER_RANGE - 1))?;
        Ok(Self { start, stop })
    }

    pub fn start(&self) -> Uid {
        self.start
    }

    pub fn stop(&self) -> Uid {
        self.stop
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.start <= uid && uid <= self.stop
    }

    pub fn overlaps(&self, other: &UidRange) -> bool {
        self.start <= other.stop && other.start <= self.stop
    }

    /// Users whose namespaces this range touches, in ascending order
    pub fn users(&self) -> impl Iterator<Item = UserId> {
        (self.start.user_id().0..=self.stop.user_id().0).map(UserId)
    }

    /// Number of UIDs in the range
    pub fn len(&self) -> u64 {
        u64::from(self.stop.0 - self.start.0) + 1
    }

    /// Always false: a valid range holds at least one UID
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for UidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.stop)
    }
}

/// Whether any range of the set contains `uid`
pub fn ranges_contain<'a, I>(ranges: I, uid: Uid) -> bool
where
    I: IntoIterator<Item = &'a UidRange>,
{
    ranges.into_iter().any(|range| range.contains(uid))
}

/// Check that no two ranges of the set share a UID
pub fn ensure_disjoint(ranges: &[UidRange]) -> Result<(), IdentityError> {
    let mut sorted = ranges.to_vec();
    sorted.sort();
    for pair in sorted.windows(2) {
        if pair[0].overlaps(&pair[1]) {
            return Err(IdentityError::OverlappingRanges {
                first: pair[0],
                second: pair[1],
            });
        }
    }
    Ok(())
}
