//! Spatial partitioning and range queries over registered sensor nodes.
//!
//! [`grid`] holds the region-cell arithmetic, [`index`] the concurrency-safe
//! registry built on top of it.

pub mod grid;
mod index;

pub use index::SpatialIndex;
pub(crate) use index::IndexState;
