//! Data types flowing through the blame pipeline.
//!
//! - `blame`: BlameRecord, BlameKey, CacheEntry for per-line attribution
//! - `commit`: PrInfo, UserIdentity, FileCommit for enrichment lookups
//!
//! All types serialize to JSON so the driver binary can dump them.

pub mod blame;
pub mod commit;

pub use blame::*;
pub use commit::*;
