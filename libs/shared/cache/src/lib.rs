pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::CacheError;
pub use memory::MemoryCache;
pub use redis_store::RedisCache;
pub use store::{CacheStore, CacheStoreExt};
