//! Read-only collaborators

use permsync_core_classifier::PackageRecord;
use permsync_core_identity::{Uid, UserId};

/// Which users' packages to enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFilter {
    /// Packages installed for any user
    All,
    /// Packages installed for one user
    User(UserId),
}

/// Enumerates installed packages and their declared permissions
pub trait PackageRegistry: Send + Sync {
    /// Every installed package matching `filter`, one record per (package, user)
    fn list_installed_packages(&self, filter: UserFilter) -> Vec<PackageRecord>;

    /// Current record of a package, `None` if the registry does not know it
    fn package_info(&self, name: &str) -> Option<PackageRecord>;

    /// Names of the packages currently sharing `uid`
    fn packages_for_uid(&self, uid: Uid) -> Vec<String>;

    /// Permission strings granted to native services that have no package
    fn system_uid_permissions(&self) -> Vec<(Uid, Vec<String>)> {
        Vec::new()
    }
}

/// User-lifecycle authority
pub trait UserRegistry: Send + Sync {
    fn active_users(&self) -> Vec<UserId>;
}

/// Permission-grant authority
pub trait PermissionGrants: Send + Sync {
    fn has_permission(&self, permission: &str, uid: Uid) -> bool;
}

/// Device history, read once per process lifetime
pub trait DeviceHistory: Send + Sync {
    /// Platform version the device was first deployed with
    fn first_platform_version(&self) -> u32;
}
