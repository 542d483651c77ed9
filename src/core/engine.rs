//! Routing engine capability
//!
//! The resolver only sees this trait. Concrete engines live next to it:
//! [`StraightLineEngine`] here, the HTTP client for butterfly-route in
//! [`crate::core::http`].

use std::sync::Arc;
use std::time::Instant;

use log::info;

use crate::core::coords::CoordinatePair;
use crate::core::error::Result;

/// Distance returned when an engine cannot route a pair (e.g. no path found)
pub const NO_ROUTE: i64 = -1;

/// Something that can turn a coordinate pair into a walking distance.
pub trait RoutingEngine: Send + Sync {
    /// One-time preparation. Must succeed before the first [`RoutingEngine::resolve`].
    fn setup(&mut self) -> Result<()>;

    /// Distance in meters. A negative value means this particular pair could
    /// not be routed; that is data for the caller, not an error.
    fn resolve(&self, pair: &CoordinatePair) -> i64;
}

/// Run the one-time setup of an engine and hand it out ready to share.
///
/// Keeps the concrete type so callers can still query engine specifics.
pub fn setup_engine<E: RoutingEngine>(mut engine: E) -> Result<Arc<E>> {
    let start = Instant::now();
    engine.setup()?;
    info!("Routing engine set up in {:.3}s", start.elapsed().as_secs_f64());
    Ok(Arc::new(engine))
}

/// Great-circle distance, truncated to whole meters.
///
/// Needs no network data, which makes it the engine of choice for dry runs
/// and for filling in a cache with lower bounds.
#[derive(Debug, Default, Clone)]
pub struct StraightLineEngine;

impl StraightLineEngine {
    pub fn new() -> Self {
        Self
    }
}

impl RoutingEngine for StraightLineEngine {
    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    fn resolve(&self, pair: &CoordinatePair) -> i64 {
        let d = pair.straight_line_distance();
        if d.is_finite() {
            d as i64
        } else {
            NO_ROUTE
        }
    }
}
