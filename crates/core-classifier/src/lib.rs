//! Permsync Core Classifier: network privilege ranking
//!
//! Maps a package's declared permission strings and provenance to the two
//! independent facets the filtering backend needs:
//!
//! - **Network classification**: `NONE < NETWORK < SYSTEM`
//! - **Traffic permissions**: OR-combinable capability bits
//!
//! # Key Principles
//!
//! This crate is **pure logic**. It holds no state beyond the two platform
//! versions that drive the carry-over rule, and it never talks to a registry
//! or backend. Unrecognized permission strings are ignored.
//!
//! # Example
//!
//! ```
//! use permsync_core_classifier::{
//!     Classifier, NetworkClass, PackageRecord, Provenance, TrafficPermissions,
//! };
//! use permsync_core_identity::Uid;
//!
//! let classifier = Classifier::new(28, 29);
//! let app = PackageRecord::new("com.example.browser", Uid(10001))
//!     .with_permissions(["android.permission.INTERNET"]);
//! assert_eq!(classifier.network_class(&app), NetworkClass::None);
//! assert_eq!(Classifier::traffic_permissions(&app), TrafficPermissions::INTERNET);
//!
//! // Legacy devices keep privileged pre-installed apps working
//! let core = PackageRecord::new("platform", Uid(1000)).with_provenance(Provenance::PlatformCore);
//! assert_eq!(classifier.network_class(&core), NetworkClass::System);
//! ```

pub mod classify;
pub mod package;
pub mod permission;
pub mod state;

pub use classify::{Classifier, PackageClassification};
pub use package::{PackageRecord, Provenance};
pub use permission::{PermissionKind, PermissionSet};
pub use state::{NetworkClass, TrafficPermissions, TrafficState};

/// Last platform version that predates the modern network permission model
pub const LEGACY_PLATFORM_VERSION: u32 = 28;

/// Platform version that introduced the modern network permission model
pub const MODERN_PERMISSION_VERSION: u32 = 29;
