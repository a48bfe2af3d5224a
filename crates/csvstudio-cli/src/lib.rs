//! Shared CLI definitions for csvstudio.
//!
//! Used by the main application and by the build script (manpage).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for csvstudio
#[derive(Clone, Parser, Debug)]
#[command(
    name = "csvstudio",
    version,
    about = "Register folders of CSV files as databases and query them with SQL"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Connection catalog file (default: connections.json, or [catalog] path from config.toml)
    #[arg(long = "catalog", value_name = "FILE", global = true)]
    pub catalog: Option<PathBuf>,

    /// Read config.toml from this directory instead of the user config directory
    #[arg(long = "config-dir", value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Log operational detail (per-file loads, query timings) to stderr
    #[arg(short = 'v', long = "verbose", action, global = true)]
    pub verbose: bool,

    /// Write a commented default config.toml and exit
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Overwrite an existing config.toml when used with --generate-config
    #[arg(long = "force", action, requires = "generate_config")]
    pub force: bool,

    /// Clear the query history cache and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,
}

/// Operations on registered connections
#[derive(Clone, Subcommand, Debug)]
pub enum Command {
    /// Register a folder of CSV files under a name and load it
    Add {
        /// Connection name
        name: String,
        /// Folder containing *.csv files
        path: PathBuf,
    },
    /// List registered connections
    List,
    /// List the tables loaded for a connection
    Tables { name: String },
    /// Show the columns and types of a table
    Describe { name: String, table: String },
    /// Run one SQL statement against a connection
    Query { name: String, sql: String },
    /// Drop every table and load the folder's CSV files again
    Reload { name: String },
    /// Write every table back to the connection's folder as CSV
    Publish { name: String },
    /// Read SQL statements from stdin, one per line
    Shell { name: String },
}

impl Args {
    /// True when the invocation only performs a maintenance action and exits.
    pub fn is_maintenance(&self) -> bool {
        self.generate_config || self.clear_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_query_subcommand() {
        let args = Args::parse_from(["csvstudio", "query", "sales", "SELECT 1"]);
        match args.command {
            Some(Command::Query { name, sql }) => {
                assert_eq!(name, "sales");
                assert_eq!(sql, "SELECT 1");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_catalog_after_subcommand() {
        let args = Args::parse_from(["csvstudio", "list", "--catalog", "/tmp/c.json"]);
        assert_eq!(args.catalog, Some(PathBuf::from("/tmp/c.json")));
        assert!(!args.is_maintenance());
    }
}
