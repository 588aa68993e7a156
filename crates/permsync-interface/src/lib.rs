//! Permsync Interface: the engine's view of the outside world
//!
//! The synchronization engine never enumerates packages, users or grants on
//! its own, and it never talks to the filtering backend except through the
//! traits defined here.
//!
//! # Architecture
//!
//! ```text
//!   PackageRegistry ─┐
//!   UserRegistry ────┤
//!   PermissionGrants ┼──> PermissionMonitor ──> FilterBackend
//!   DeviceHistory ───┘         (owns it exclusively)
//! ```
//!
//! Registries are queried through shared references and must be
//! `Send + Sync`. The backend is a one-way command sink owned by exactly one
//! monitor, so its methods take `&mut self`.
//!
//! # Example
//!
//! ```rust
//! use permsync_interface::{BackendCommand, BackendError, FilterBackend};
//! use permsync_core_classifier::{NetworkClass, TrafficState};
//! use permsync_core_identity::Uid;
//!
//! struct LoggingBackend;
//!
//! impl FilterBackend for LoggingBackend {
//!     fn set_network_class(&mut self, class: NetworkClass, uids: &[Uid]) -> Result<(), BackendError> {
//!         println!("set {class} for {uids:?}");
//!         Ok(())
//!     }
//!     fn clear_network_class(&mut self, uids: &[Uid]) -> Result<(), BackendError> { Ok(()) }
//!     fn set_traffic_permission(&mut self, state: TrafficState, uids: &[Uid]) -> Result<(), BackendError> { Ok(()) }
//!     fn add_vpn_uid_filter(&mut self, tunnel: &str, uids: &[Uid]) -> Result<(), BackendError> { Ok(()) }
//!     fn remove_vpn_uid_filter(&mut self, uids: &[Uid]) -> Result<(), BackendError> { Ok(()) }
//! }
//!
//! let mut backend = LoggingBackend;
//! BackendCommand::SetNetworkClass { class: NetworkClass::Network, uids: vec![Uid(10001)] }
//!     .apply(&mut backend)
//!     .unwrap();
//! ```

pub mod backend;
pub mod registry;

pub use backend::{BackendCommand, BackendError, FilterBackend};
pub use registry::{DeviceHistory, PackageRegistry, PermissionGrants, UserFilter, UserRegistry};
