//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cis")]
#[command(about = "Collocate, aggregate and subset gridded and ungridded atmospheric data")]
pub struct Args {
    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// YAML file overriding the environment configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output file
    #[arg(short, long, global = true, default_value = "out.json")]
    pub output: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Collocate data onto the coordinates of a sample
    Col {
        /// variables:filenames[:product=..,name=..]
        datagroup: String,
        /// filenames[:variable=..,collocator=..,constraint=..,kernel=..,missing_data_for_missing_sample=..]
        samplegroup: String,
    },

    /// Aggregate onto a regular grid, e.g. x=[-180,180,10],y=[-90,90,10],t
    Aggregate {
        datagroup: String,
        grid: String,
        /// Kernel, e.g. mean or moments (configuration default when absent)
        #[arg(long)]
        kernel: Option<String>,
    },

    /// Collapse whole axes, e.g. x,y
    Collapse {
        datagroup: String,
        axes: String,
        #[arg(long)]
        kernel: Option<String>,
    },

    /// Restrict data to coordinate ranges, e.g. x=[-10,10],t=[2010-01,2010-02]
    Subset { datagroup: String, limits: String },

    /// Describe the variables in a file
    Info {
        file: String,
        /// Only these variables
        #[arg(long = "variable")]
        variables: Vec<String>,
    },

    /// Print the version
    Version,
}

impl Command {
    /// Whether the command writes the output file.
    pub fn writes_output(&self) -> bool {
        !matches!(self, Command::Info { .. } | Command::Version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_col() {
        let args = Args::try_parse_from([
            "cis",
            "col",
            "AOD550:aeronet.json",
            "track.json:collocator=box[h_sep=10km]",
            "-o",
            "col.json",
        ])
        .unwrap();
        assert_eq!(args.output, PathBuf::from("col.json"));
        assert!(args.command.writes_output());
        match args.command {
            Command::Col { datagroup, samplegroup } => {
                assert_eq!(datagroup, "AOD550:aeronet.json");
                assert_eq!(samplegroup, "track.json:collocator=box[h_sep=10km]");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["cis", "--log-json", "version"]).unwrap();
        assert_eq!(args.output, PathBuf::from("out.json"));
        assert!(args.log_json);
        assert!(!args.command.writes_output());
    }

    #[test]
    fn test_aggregate_kernel() {
        let args = Args::try_parse_from(["cis", "aggregate", "t:m.json", "x=[0,10,1]", "--kernel", "mean"]).unwrap();
        assert_eq!(
            args.command,
            Command::Aggregate {
                datagroup: "t:m.json".to_string(),
                grid: "x=[0,10,1]".to_string(),
                kernel: Some("mean".to_string()),
            }
        );
    }
}
