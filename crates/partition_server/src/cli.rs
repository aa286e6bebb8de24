//! Command-line interface for the partition server.

use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "partitions.toml";

/// Command line arguments parsed from user input.
///
/// Every option except `--check` overrides the matching setting from the
/// configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Validate the configuration and exit
    pub check: bool,
    /// Optional override for the full-sweep interval, in seconds
    pub reconcile_interval: Option<u64>,
}

impl CliArgs {
    /// Parses the process arguments.
    pub fn parse() -> Self {
        Self::from_matches(Self::command().get_matches())
    }

    fn command() -> Command {
        Command::new("Partition Server")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Runs the partition isolation engine against a headless host")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value(DEFAULT_CONFIG_PATH),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("check")
                    .long("check")
                    .help("Validate the configuration and exit")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("reconcile-interval")
                    .short('r')
                    .long("reconcile-interval")
                    .value_name("SECONDS")
                    .help("Seconds between full visibility sweeps (0 disables)")
                    .value_parser(clap::value_parser!(u64)),
            )
    }

    fn from_matches(matches: clap::ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            check: matches.get_flag("check"),
            reconcile_interval: matches.get_one::<u64>("reconcile-interval").copied(),
        }
    }
}
