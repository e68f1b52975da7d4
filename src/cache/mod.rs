pub mod backend;
pub mod error;
pub mod key;
pub mod store;

pub use backend::{CacheBackend, MemoryBackend, RemoteBackend};
pub use error::CacheError;
pub use key::{CacheKey, CachePrefix};
pub use store::{CacheStore, CacheTtl};
