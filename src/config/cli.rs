use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the cache-refresher binary.
#[derive(Debug, Parser)]
#[command(
    name = "cache-refresher",
    version,
    about = "Inspect and dry-run the cache refresh routing table"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "CACHE_REFRESHER_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the routing table and the exempt signatures.
    Routes(RoutesArgs),
    /// Raise events from a JSON file through in-memory producers and print
    /// the invalidations they cause.
    Replay(ReplayArgs),
}

impl Default for Command {
    fn default() -> Self {
        Command::Routes(RoutesArgs::default())
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Keep detach bookkeeping so handlers can be unbound again.
    #[arg(
        long = "support-unbinding",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub support_unbinding: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RoutesArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Emit the table as JSON instead of aligned text.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// JSON file holding an array of events to raise.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}
