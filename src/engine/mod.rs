//! Core engine: the traffic model and the two drivers that feed it.
//!
//! `generator` turns (time, location, rain) into an observation,
//! `backfill` replays a historical date range through it once at
//! startup, and `live` runs one observation per location per tick.

pub mod backfill;
pub mod generator;
pub mod live;

pub use backfill::{BackfillDriver, BackfillRange, BackfillSummary};
pub use generator::TrafficGenerator;
pub use live::LiveSimulator;
