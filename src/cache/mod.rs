mod store;

pub use store::{CacheInvalidator, CachedData, DataCache};
