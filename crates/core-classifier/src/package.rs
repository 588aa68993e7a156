//! Package records as reported by the package registry

use permsync_core_identity::{IdentityError, Uid, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Origin classification of a package
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Part of the platform core identity
    PlatformCore,
    /// Pre-installed on the OEM partition
    Oem,
    /// Pre-installed on the product partition
    Product,
    /// Pre-installed on the vendor partition
    Vendor,
    /// Anything else (user-installed or ordinary system apps)
    #[default]
    Other,
}

impl Provenance {
    /// OEM, product or vendor partition
    pub fn is_privileged_partition(self) -> bool {
        matches!(self, Provenance::Oem | Provenance::Product | Provenance::Vendor)
    }

    /// Eligible for the carry-over rule
    pub fn is_privileged(self) -> bool {
        self == Provenance::PlatformCore || self.is_privileged_partition()
    }
}

/// One installed package
///
/// Several records may share a UID. The UID's effective privilege is always
/// derived from every live record that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub uid: Uid,
    #[serde(default)]
    pub provenance: Provenance,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub target_sdk: u32,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, uid: Uid) -> Self {
        Self {
            name: name.into(),
            uid,
            provenance: Provenance::Other,
            permissions: BTreeSet::new(),
            target_sdk: 0,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_target_sdk(mut self, target_sdk: u32) -> Self {
        self.target_sdk = target_sdk;
        self
    }

    /// The same package, provisioned for another user
    pub fn for_user(&self, user: UserId) -> Result<Self, IdentityError> {
        Ok(Self {
            uid: self.uid.for_user(user)?,
            ..self.clone()
        })
    }
}
