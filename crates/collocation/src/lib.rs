//! Collocation engine for gridded and ungridded atmospheric data.
//!
//! Resamples a *source* variable onto the coordinates of a *sample*
//! dataset, aggregates onto regular grids, and subsets to coordinate
//! ranges.
//!
//! # Architecture
//!
//! ```text
//! CollocationOptions ──► Collocator::plan ──► (Constraint, Kernel)
//!                                                  │
//!             ┌────────────────────────────────────┴──────────────┐
//!             ▼                                                   ▼
//!   gridded source                                       ungridded source
//!   GriddedInterpolator                                  ConstraintIndex
//!   (linear / nearest, hybrid                            (separation k-d tree,
//!    vertical profiles)                                   bin index, all points)
//!             │                                                   │
//!             │                                          PointKernel::compute
//!             ▼                                                   ▼
//!                  one masked output per kernel suffix,
//!                  on exactly the sample's coordinates
//! ```
//!
//! Plugins are plain values looked up by name in a [`Registry`].
//!
//! # Example
//!
//! ```ignore
//! use collocation::{CollocationConfig, CollocationOptions, Collocator, PluginSpec, Registry};
//!
//! let registry = Registry::default();
//! let config = CollocationConfig::from_env();
//! let options = CollocationOptions {
//!     constraint: Some(PluginSpec::parse("separation[h_sep=10km,t_sep=PT1H]")?),
//!     kernel: Some(PluginSpec::new("mean")),
//!     ..Default::default()
//! };
//! let outputs = Collocator::new(&registry, &config).collocate(&sample, &source, &options)?;
//! ```

pub mod aggregate;
pub mod collocator;
pub mod config;
pub mod constraint;
pub mod index;
pub mod kernel;
pub mod params;
pub mod registry;
pub mod subset;

// Re-export commonly used types at crate root
pub use aggregate::{Aggregator, AxisRange, AxisSpec, GridSpec};
pub use collocator::{CollocationOptions, Collocator, Plan};
pub use config::CollocationConfig;
pub use constraint::{Constraint, SeparationParams};
pub use kernel::{GriddedKernel, GriddedMethod, Kernel, PointKernel};
pub use params::PluginSpec;
pub use registry::Registry;
pub use subset::{subset, AxisLimit, SubsetLimits};
