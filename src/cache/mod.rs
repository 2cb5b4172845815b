//! Stale-while-revalidate cache for dashboard data
//!
//! Every card reads its data through this module. Stored values are shown
//! immediately, even when stale, and refreshed in the background once older
//! than the card's TTL. Fetch failures are reported next to the last good
//! value instead of replacing it. Entries persist as JSON in a flat,
//! string-keyed store (one file per key by default).

mod clock;
mod entry;
mod error;
mod inflight;
mod storage;
mod swr;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, Cacheable, DecodeError};
pub use error::{FetchError, StorageError};
pub use storage::{CacheStorage, FileStorage, MemoryStorage};
pub use swr::{fetcher, CacheHandle, CacheState, Fetcher, SwrCache};
