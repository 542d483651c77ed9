//! GTFS stop-distance table
//!
//! Reads the stop pairs of a gtfspy-style SQLite database (`stop_distances`
//! joined with `stops`) and writes the walking distances back into its
//! `d_walk` column.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rusqlite::{params, Connection};

use crate::core::coords::CoordinatePair;
use crate::core::error::{Error, Result};

const READ_PAIRS_SQL: &str = "SELECT SD.from_stop_I, SD.to_stop_I, \
            S1.lat, S1.lon, S2.lat, S2.lon \
     FROM stop_distances SD \
     LEFT JOIN stops S1 ON (SD.from_stop_I = S1.stop_I) \
     LEFT JOIN stops S2 ON (SD.to_stop_I = S2.stop_I) \
     ORDER BY SD.from_stop_I, SD.to_stop_I";

const UPDATE_WALK_SQL: &str =
    "UPDATE stop_distances SET d_walk = ?1 WHERE from_stop_I = ?2 AND to_stop_I = ?3";

/// One row of `stop_distances` with its stop coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct StopPair {
    pub from_stop_i: i64,
    pub to_stop_i: i64,
    pub coords: CoordinatePair,
}

/// Handle on a GTFS SQLite database
pub struct StopDistanceTable {
    path: PathBuf,
}

impl StopDistanceTable {
    /// The database must already exist; it is never created here.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::InvalidInput(format!(
                "'{}' is not a valid path to a sqlite database",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.path)?)
    }

    /// Read stop pairs, at most `limit` of them.
    ///
    /// Pairs whose stops have no coordinates are skipped.
    pub fn read_pairs(&self, limit: Option<usize>) -> Result<Vec<StopPair>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(READ_PAIRS_SQL)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<f64>>(4)?,
                row.get::<_, Option<f64>>(5)?,
            ))
        })?;

        let limit = limit.unwrap_or(usize::MAX);
        let mut pairs = Vec::new();
        let mut skipped = 0usize;

        for row in rows {
            if pairs.len() >= limit {
                break;
            }
            let (from_stop_i, to_stop_i, lat1, lon1, lat2, lon2) = row?;
            match (lat1, lon1, lat2, lon2) {
                (Some(lat1), Some(lon1), Some(lat2), Some(lon2)) => pairs.push(StopPair {
                    from_stop_i,
                    to_stop_i,
                    coords: CoordinatePair::new(lat1, lon1, lat2, lon2),
                }),
                _ => {
                    debug!("Stop pair {from_stop_i} -> {to_stop_i} has no coordinates");
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!("Skipped {skipped} stop pairs without stop coordinates");
        }
        info!("Read {} stop pairs from {}", pairs.len(), self.path.display());
        Ok(pairs)
    }

    /// Store walking distances in `d_walk`, one transaction for all rows.
    ///
    /// Returns the number of updated rows.
    pub fn write_walk_distances(&self, pairs: &[StopPair], distances: &[i64]) -> Result<usize> {
        if pairs.len() != distances.len() {
            return Err(Error::InvalidInput(format!(
                "{} stop pairs but {} distances",
                pairs.len(),
                distances.len()
            )));
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(UPDATE_WALK_SQL)?;
            for (pair, distance) in pairs.iter().zip(distances) {
                updated += stmt.execute(params![distance, pair.from_stop_i, pair.to_stop_i])?;
            }
        }
        tx.commit()?;

        info!("Updated d_walk for {updated} stop pairs");
        Ok(updated)
    }
}
