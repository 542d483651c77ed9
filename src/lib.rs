//! # Butterfly-walk Library
//!
//! Cached batch resolution of walking distances between coordinate pairs,
//! built for filling the `d_walk` column of GTFS stop-distance tables.
//!
//! ## Features
//!
//! - **Persistent cache**: SQLite store keyed on the exact coordinate 4-tuple
//! - **Pluggable routing**: any [`RoutingEngine`], including an HTTP client for butterfly-route
//! - **Parallel batches**: worker pool with results in input order
//! - **Progress tracking**: optional callback, about once per percent
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use butterfly_walk::{BatchResolver, CoordinatePair, SqliteDistanceStore, StraightLineEngine};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteDistanceStore::open("walk-cache.sqlite")?);
//!     let engine = butterfly_walk::setup_engine(StraightLineEngine::new())?;
//!     let resolver = BatchResolver::new(Some(store), Some(engine))?;
//!
//!     let pair = CoordinatePair::new(62.895169, 27.682910, 62.895512, 27.676259);
//!     let meters = resolver.resolve(&pair)?;
//!     println!("{meters} m");
//!     Ok(())
//! }
//! ```
//!
//! ## Routing through butterfly-route
//!
//! ```rust,no_run
//! use butterfly_walk::{BatchResolver, CoordinatePair, HttpRoutingEngine, ResolveOptions};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = butterfly_walk::setup_engine(HttpRoutingEngine::with_base_url("http://localhost:3000"))?;
//!     let options = ResolveOptions {
//!         progress: Some(Arc::new(|done, total| eprintln!("{done}/{total}"))),
//!         ..Default::default()
//!     };
//!     let resolver = BatchResolver::with_options(None, Some(engine), options)?;
//!
//!     let pairs = vec![CoordinatePair::new(50.8503, 4.3517, 50.8466, 4.3528)];
//!     let outcome = resolver.resolve_batch(&pairs)?;
//!     println!("{:?} ({} cache hits)", outcome.distances, outcome.hits);
//!     Ok(())
//! }
//! ```

// Re-export core types that users might need
pub use crate::core::coords::{haversine_distance, EARTH_RADIUS_M};
pub use crate::core::error::{Error, Result};
pub use crate::core::{
    setup_engine, BatchOutcome, BatchResolver, CoordinatePair, DistanceStore, HttpEngineConfig,
    HttpRoutingEngine, ProgressCallback, ResolveOptions, RoutingEngine, SqliteDistanceStore,
    StopDistanceTable, StopPair, StraightLineEngine, NO_ROUTE,
};

// Internal modules
mod core;
