//! Permsync Core VPN: UID range tracking per tunnel
//!
//! A VPN tunnel routes a set of disjoint UID ranges. Apps whose UID falls in
//! one of those ranges get a filter rule binding their traffic to the
//! tunnel's interface; the VPN app that owns the tunnel never does.
//!
//! The tracker only remembers ranges. Which UIDs are covered is always
//! recomputed from the caller's installed set, so it cannot drift from the
//! package model.
//!
//! ```text
//!   tun0 (owner 10002): [0-10085] [10087-99999]
//!   installed:          1000  10001  10002  10086
//!   covered:            1000  10001
//!                              (10002 is the owner, 10086 is outside)
//! ```
//!
//! # Example
//!
//! ```
//! use permsync_core_identity::{Uid, UidRange};
//! use permsync_core_vpn::VpnRangeTracker;
//! use std::collections::BTreeSet;
//!
//! let installed: BTreeSet<Uid> = [Uid(10001), Uid(10002)].into_iter().collect();
//! let ranges = vec![UidRange::new(10000, 19999).unwrap()];
//!
//! let mut tracker = VpnRangeTracker::new();
//! let added = tracker.ranges_added("tun0", &ranges, Uid(10002), &installed).unwrap();
//! assert_eq!(added.into_iter().collect::<Vec<_>>(), vec![Uid(10001)]);
//!
//! tracker.ranges_removed("tun0", &ranges, Uid(10002), &installed).unwrap();
//! assert!(tracker.ranges("tun0").is_none());
//! ```

pub mod error;
pub mod tracker;

pub use error::VpnError;
pub use tracker::{TunnelInfo, VpnRangeTracker};
