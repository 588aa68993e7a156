//! Permsync Core Identity: UID arithmetic for multi-user devices
//!
//! Every application identity on a multi-user device is a single integer UID
//! that decomposes into a user namespace and a base application id which is
//! replicated per user:
//!
//! ```text
//!   uid = user_id * PER_USER_RANGE + app_id
//!
//!   user 0: [      0 ..  99_999]   app 10001 -> uid  10001
//!   user 1: [100_000 .. 199_999]   app 10001 -> uid 110001
//! ```
//!
//! This crate is **pure logic**: it owns the arithmetic and the UID range
//! type used by VPN tunnels, and nothing else.
//!
//! # Example
//!
//! ```
//! use permsync_core_identity::{derive_uid, AppId, Uid, UidRange, UserId};
//!
//! let uid = derive_uid(UserId(1), AppId(10001))?;
//! assert_eq!(uid, Uid(110001));
//! assert_eq!(uid.user_id(), UserId(1));
//! assert_eq!(uid.app_id(), AppId(10001));
//!
//! let range = UidRange::for_user(UserId(1))?;
//! assert!(range.contains(uid));
//!
//! // Namespaces past the top of the UID space do not exist
//! assert!(derive_uid(UserId(50_000), AppId(10001)).is_err());
//! # Ok::<(), permsync_core_identity::IdentityError>(())
//! ```

pub mod error;
pub mod range;

pub use error::IdentityError;
pub use range::{ensure_disjoint, ranges_contain, UidRange};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of UIDs reserved for each user namespace
pub const PER_USER_RANGE: u32 = 100_000;

/// Highest user whose whole namespace fits in the UID space
pub const MAX_USER_ID: UserId = UserId(u32::MAX / PER_USER_RANGE - 1);

/// An OS-level identity an app (or a shared group of apps) runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub u32);

/// A multi-user namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

/// Base application identity, replicated for every user
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub u32);

impl Uid {
    /// User namespace this UID belongs to
    pub fn user_id(self) -> UserId {
        UserId(self.0 / PER_USER_RANGE)
    }

    /// Base application id of this UID
    pub fn app_id(self) -> AppId {
        AppId(self.0 % PER_USER_RANGE)
    }

    /// The same application identity, moved into another user's namespace
    pub fn for_user(self, user: UserId) -> Result<Uid, IdentityError> {
        derive_uid(user, self.app_id())
    }
}

impl UserId {
    /// Fails for users above [`MAX_USER_ID`]
    pub fn validate(self) -> Result<UserId, IdentityError> {
        if self > MAX_USER_ID {
            return Err(IdentityError::UserOutOfRange { user: self.0 });
        }
        Ok(self)
    }
}

/// Synthesize the UID of `app` inside `user`'s namespace
///
/// This is the only place per-user UIDs are computed. Derived UIDs are never
/// stored as independent identities; `Uid::user_id` and `Uid::app_id` always
/// recover the pair. Users above [`MAX_USER_ID`] are rejected instead of
/// wrapping onto another user's UIDs.
pub fn derive_uid(user: UserId, app: AppId) -> Result<Uid, IdentityError> {
    let user = user.validate()?;
    Ok(Uid(user.0 * PER_USER_RANGE + app.0 % PER_USER_RANGE))
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompose_user_zero() {
        let uid = Uid(10001);
        assert_eq!(uid.user_id(), UserId(0));
        assert_eq!(uid.app_id(), AppId(10001));
    }

    #[test]
    fn test_derive_is_inverse_of_decompose() {
        for uid in [Uid(0), Uid(1000), Uid(10086), Uid(110001), Uid(1_299_999)] {
            assert_eq!(derive_uid(uid.user_id(), uid.app_id()).unwrap(), uid);
        }
    }

    #[test]
    fn test_derive_masks_foreign_user_bits() {
        // An app id that already carries user bits is folded back into the base range
        assert_eq!(derive_uid(UserId(2), AppId(110001)).unwrap(), Uid(210001));
    }

    #[test]
    fn test_for_user_keeps_app_id() {
        let uid = Uid(10001).for_user(UserId(1)).unwrap();
        assert_eq!(uid, Uid(110001));
        assert_eq!(uid.app_id(), AppId(10001));
    }

    #[test]
    fn test_derive_at_top_of_uid_space() {
        assert_eq!(MAX_USER_ID, UserId(42_948));
        let top = derive_uid(MAX_USER_ID, AppId(PER_USER_RANGE - 1)).unwrap();
        assert_eq!(top, Uid(4_294_899_999));
        assert_eq!(top.user_id(), MAX_USER_ID);

        for user in [42_949, 50_000, u32::MAX] {
            let err = derive_uid(UserId(user), AppId(0)).unwrap_err();
            assert_eq!(err, IdentityError::UserOutOfRange { user });
        }
    }

    #[test]
    fn test_for_user_rejects_partial_namespace() {
        // uid 4_294_967_295 sits in user 42949, whose namespace is cut off
        let uid = Uid(u32::MAX);
        assert!(uid.user_id().validate().is_err());
        assert!(uid.for_user(uid.user_id()).is_err());
        assert_eq!(uid.for_user(UserId(0)).unwrap(), Uid(67_295));
    }

    #[test]
    fn test_display() {
        assert_eq!(Uid(10001).to_string(), "10001");
        assert_eq!(UserId(1).to_string(), "u1");
        assert_eq!(AppId(1000).to_string(), "a1000");
    }
}
