//! Core library modules for butterfly-walk
//!
//! This module contains the internal implementation details of the butterfly-walk library.

pub mod coords;
pub mod engine;
pub mod error;
pub mod gtfs;
pub mod http;
pub mod options;
pub mod resolver;
pub mod store;

// Re-export main types for internal use
pub use coords::CoordinatePair;
pub use engine::{setup_engine, RoutingEngine, StraightLineEngine, NO_ROUTE};
pub use gtfs::{StopDistanceTable, StopPair};
pub use http::{HttpEngineConfig, HttpRoutingEngine};
pub use options::{ProgressCallback, ResolveOptions};
pub use resolver::{BatchOutcome, BatchResolver};
pub use store::{DistanceStore, SqliteDistanceStore};
