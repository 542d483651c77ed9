//! Tuning knobs for batch resolution

use std::fmt;
use std::sync::Arc;

/// Progress callback function type, receives (completed, total) pairs
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Options for a [`crate::BatchResolver`]
#[derive(Clone)]
pub struct ResolveOptions {
    /// Optional progress callback, invoked about once per percent of a batch
    pub progress: Option<ProgressCallback>,

    /// Worker threads used for a batch
    pub threads: usize,

    /// Store freshly routed distances back into the cache
    pub write_back: bool,

    /// With write-back on, also store `NO_ROUTE` results
    pub cache_no_route: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            progress: None,
            threads: num_cpus::get(),
            write_back: true,
            cache_no_route: true,
        }
    }
}

impl fmt::Debug for ResolveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveOptions")
            .field("progress", &self.progress.is_some())
            .field("threads", &self.threads)
            .field("write_back", &self.write_back)
            .field("cache_no_route", &self.cache_no_route)
            .finish()
    }
}
