//! Classification cache and the scans that fill it

mod mod_cache;
mod scan;

pub use mod_cache::{CACHE_VERSION, CacheDocument, CacheError, CacheRecords, ModCache};
pub use scan::{ScanCoordinator, ScanOutcome};
