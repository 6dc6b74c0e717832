//! Persistence and remote-source infrastructure.

pub mod cache;
pub mod remote;

pub use cache::{Dataset, ReferenceCache, StoreError};
pub use remote::{DatasetClient, FetchError, SourceConfig};
