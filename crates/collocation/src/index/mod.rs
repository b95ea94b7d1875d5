//! Spatial and temporal indexes over HyperPoints.

pub mod bin;
pub mod haversine;
pub mod kdtree;
pub mod scaled;

pub use bin::{CellAxis, CellBucket, GridCellBinIndex};
pub use haversine::HaversineIndex;
pub use kdtree::{KdTree, MAX_DIMS};
pub use scaled::{within_separation, ScaledIndex, Separation};
