//! Cache-aside batch resolution
//!
//! Every pair is looked up in the distance store first and only routed on a
//! miss. A batch fans out over a rayon pool, writes each result into the slot
//! of its input index, and wraps all cache writes in one store transaction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::core::coords::CoordinatePair;
use crate::core::engine::RoutingEngine;
use crate::core::error::{Error, Result};
use crate::core::options::{ProgressCallback, ResolveOptions};
use crate::core::store::DistanceStore;

/// Where a single distance came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Cached(i64),
    Routed(i64),
    Unresolved,
}

impl Resolution {
    fn distance(self) -> Option<i64> {
        match self {
            Resolution::Cached(d) | Resolution::Routed(d) => Some(d),
            Resolution::Unresolved => None,
        }
    }
}

/// Result of [`BatchResolver::resolve_batch`]
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// `distances[i]` belongs to input pair `i`
    pub distances: Vec<i64>,

    /// Pairs of this batch answered from the cache
    pub hits: u64,

    /// Resolver-wide hit counter after the batch
    pub total_cache_hits: u64,
}

impl BatchOutcome {
    /// Share of this batch served from the cache, 0.0 for an empty batch
    pub fn hit_ratio(&self) -> f64 {
        if self.distances.is_empty() {
            0.0
        } else {
            self.hits as f64 / self.distances.len() as f64
        }
    }
}

/// Resolves distances from a cache, a routing engine, or both.
///
/// The engine must already be set up. The hit counter lives as long as the
/// resolver and is never reset.
pub struct BatchResolver {
    store: Option<Arc<dyn DistanceStore>>,
    engine: Option<Arc<dyn RoutingEngine>>,
    write_back: bool,
    cache_no_route: bool,
    cache_hits: AtomicU64,
    progress: Option<ProgressCallback>,
    pool: ThreadPool,
}

impl BatchResolver {
    /// Resolver with default [`ResolveOptions`]
    pub fn new(
        store: Option<Arc<dyn DistanceStore>>,
        engine: Option<Arc<dyn RoutingEngine>>,
    ) -> Result<Self> {
        Self::with_options(store, engine, ResolveOptions::default())
    }

    pub fn with_options(
        store: Option<Arc<dyn DistanceStore>>,
        engine: Option<Arc<dyn RoutingEngine>>,
        options: ResolveOptions,
    ) -> Result<Self> {
        if store.is_none() && engine.is_none() {
            return Err(Error::Configuration(
                "either a distance cache or a routing engine is required".to_string(),
            ));
        }

        let threads = options.threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("butterfly-walk-{i}"))
            .build()
            .map_err(|e| Error::Configuration(format!("could not start worker pool: {e}")))?;

        debug!(
            "Resolver ready: cache={}, engine={}, write_back={}, threads={}",
            store.is_some(),
            engine.is_some(),
            options.write_back,
            threads
        );

        Ok(Self {
            store,
            engine,
            write_back: options.write_back,
            cache_no_route: options.cache_no_route,
            cache_hits: AtomicU64::new(0),
            progress: options.progress,
            pool,
        })
    }

    pub fn set_write_back(&mut self, enabled: bool) {
        self.write_back = enabled;
    }

    pub fn write_back(&self) -> bool {
        self.write_back
    }

    /// Cache hits since the resolver was created
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Acquire)
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Resolve a single pair
    pub fn resolve(&self, pair: &CoordinatePair) -> Result<i64> {
        self.resolve_one(pair)
            .distance()
            .ok_or(Error::UnresolvablePair {
                index: None,
                pair: *pair,
            })
    }

    fn resolve_one(&self, pair: &CoordinatePair) -> Resolution {
        if let Some(store) = &self.store {
            if let Some(distance) = store.lookup(pair) {
                self.cache_hits.fetch_add(1, Ordering::AcqRel);
                return Resolution::Cached(distance);
            }
        }

        let Some(engine) = &self.engine else {
            return Resolution::Unresolved;
        };

        let distance = engine.resolve(pair);
        if distance < 0 {
            debug!("Routing failed for {pair}");
            if !self.cache_no_route {
                return Resolution::Routed(distance);
            }
        }

        if self.write_back {
            if let Some(store) = &self.store {
                if !store.upsert(pair, distance) {
                    debug!("Distance for {pair} was not written to the cache");
                }
            }
        }

        Resolution::Routed(distance)
    }

    /// Resolve a batch in parallel.
    ///
    /// Fails with the lowest-index unresolvable pair, after every pair has
    /// been attempted and the cache transaction has been committed.
    pub fn resolve_batch(&self, pairs: &[CoordinatePair]) -> Result<BatchOutcome> {
        let total = pairs.len() as u64;
        let mut slots: Vec<Option<i64>> = vec![None; pairs.len()];

        let in_transaction = match &self.store {
            Some(store) => match store.begin_batch() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Could not open cache transaction, writing without one: {e}");
                    false
                }
            },
            None => false,
        };

        let completed = AtomicU64::new(0);
        let batch_hits = AtomicU64::new(0);
        let report_every = (total / 100).max(1);

        info!(
            "Resolving {} pairs on {} threads",
            pairs.len(),
            self.pool.current_num_threads()
        );

        self.pool.install(|| {
            slots
                .par_iter_mut()
                .zip(pairs.par_iter())
                .for_each(|(slot, pair)| {
                    let resolution = self.resolve_one(pair);
                    if let Resolution::Cached(_) = resolution {
                        batch_hits.fetch_add(1, Ordering::AcqRel);
                    }
                    *slot = resolution.distance();

                    let done = completed.fetch_add(1, Ordering::AcqRel) + 1;
                    if done % report_every == 0 || done == total {
                        self.report_progress(done, total, batch_hits.load(Ordering::Acquire));
                    }
                });
        });

        if in_transaction {
            if let Some(store) = &self.store {
                if let Err(e) = store.commit_batch() {
                    warn!("Committing cache writes failed, some may be lost: {e}");
                }
            }
        }

        if let Some(index) = slots.iter().position(Option::is_none) {
            return Err(Error::UnresolvablePair {
                index: Some(index),
                pair: pairs[index],
            });
        }

        Ok(BatchOutcome {
            distances: slots.into_iter().flatten().collect(),
            hits: batch_hits.into_inner(),
            total_cache_hits: self.cache_hits(),
        })
    }

    fn report_progress(&self, done: u64, total: u64, hits: u64) {
        let percent = done as f64 / total as f64 * 100.0;
        let hit_ratio = hits as f64 / done as f64 * 100.0;
        info!("Resolved {done}/{total} pairs ({percent:.0}%), cache hit ratio {hit_ratio:.1}%");

        if let Some(progress) = &self.progress {
            progress(done, total);
        }
    }
}
