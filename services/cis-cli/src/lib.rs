//! Command-line frontend for the CIS collocation engine.
//!
//! Parses datagroups and samplegroups, reads and writes JSON dataset
//! documents, and runs the `col`, `aggregate`, `collapse`, `subset`,
//! `info` and `version` sub-commands.

pub mod cli;
pub mod commands;
pub mod dataset_io;
pub mod groups;
pub mod overwrite;

pub use cli::{Args, Command};
pub use commands::{exit_code, load_config, Session};
pub use groups::{DataGroup, SampleGroup};
pub use overwrite::OverwritePolicy;
