mod sqlite_store;
#[allow(clippy::module_inception)]
mod store;
mod types;

pub use sqlite_store::SqliteAcquisitionStore;
pub use store::{AcquisitionStore, StoreError};
pub use types::*;
