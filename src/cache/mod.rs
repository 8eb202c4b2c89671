//! Distributed cache facility seen from the refresher.
//!
//! The refresher only issues invalidations; how a region is refreshed or
//! removed across the cluster belongs to whoever implements
//! [`DistributedCache`]. [`RecordingCache`] keeps every call for tests and dry
//! runs, [`LoggingCache`] traces calls on their way to another facility.

mod facility;
mod region;

pub use facility::{DistributedCache, LoggingCache, RecordingCache};
pub use region::{CacheRegion, InvalidationAction};
