pub mod audit;
pub mod handlers;
pub mod invalidate;
pub mod model;

/// Cache keys this system's admin invalidator is allowed to touch. Every
/// pattern/exact-key it builds is rooted here; the key-registry namespace
/// lives under a different prefix and is never reachable through this path.
pub const CACHE_NAMESPACE_PREFIX: &str = "proxy:GET:";

/// Redis `DEL` is batched at this size when a scan turns up more matches
/// than a single call should carry.
pub const DELETE_BATCH_SIZE: usize = 100;
