//! In-memory caches used to skip redundant upstream calls.
//!
//! Caches are plain injected components: services receive an
//! `Arc<TtlCache<_>>` at construction time, and tests swap the clock for a
//! [`ManualClock`] to drive expiry deterministically.

mod clock;
mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ttl::TtlCache;

pub(crate) use ttl::{METRIC_CACHE_EXPIRED, METRIC_CACHE_HIT, METRIC_CACHE_MISS};
