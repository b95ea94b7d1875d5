//! Common data model shared by all CIS crates.
//!
//! Provides the coordinate and HyperPoint model, masked arrays, the gridded
//! and ungridded containers, time handling on the standard epoch, history
//! records and the error taxonomy used across the workspace.

pub mod coord;
pub mod data;
pub mod error;
pub mod gridded;
pub mod history;
pub mod hyperpoint;
pub mod masked;
pub mod metadata;
pub mod time;
pub mod ungridded;

pub use coord::{fix_longitude_range, Axis, Coord};
pub use data::{CommonData, DataList, Dataset};
pub use error::{CisError, ErrorKind, Result};
pub use gridded::{AuxCoord, GriddedData};
pub use history::HistoryRecord;
pub use hyperpoint::{haversine, HyperPoint, EARTH_RADIUS_KM};
pub use masked::MaskedArray;
pub use metadata::Metadata;
pub use time::{Bound, PartialDateTime, TimeUnits};
pub use ungridded::UngriddedData;

/// Fill value used when a variable does not declare its own.
pub const DEFAULT_FILL_VALUE: f64 = -9999.0;
