pub mod provider;
pub mod registry;
pub mod snapshot;

pub use provider::{MetadataProvider, RoleProvider};
pub use registry::{ReloadError, Registry};
pub use snapshot::Snapshot;
