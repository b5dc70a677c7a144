//! Collaborator ports. Storage adapters implement these in the server crate.

pub mod identity;
pub mod packages;

pub use identity::{IdentityRecord, IdentityStore};
pub use packages::PackageStore;

#[cfg(any(test, feature = "testing"))]
pub use identity::MockIdentityStore;
#[cfg(any(test, feature = "testing"))]
pub use packages::MockPackageStore;
