//! Memoizing cache shared by every engine built on one `NumericalCore`.

pub mod keys;
pub mod memo;

pub use keys::{CacheKey, KeyStrategy};
pub use memo::{CacheEntry, CacheStats, MemoCache};
