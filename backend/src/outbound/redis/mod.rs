//! Redis adapters for the distributed cache tier and the stampede lock.
//!
//! Both adapters share one bb8-backed connection pool. They are optional at
//! runtime: when no Redis URL is configured, the gateway substitutes no-op
//! ports and leans on the local cache and the database instead.

mod mutation_lock;
mod pool;
mod response_cache;

pub use mutation_lock::RedisMutationLock;
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError};
pub use response_cache::RedisResponseCache;
