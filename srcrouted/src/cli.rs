use std::path::PathBuf;

use clap::Parser;

/// Source-address policy routing daemon for multi-homed hosts.
///
/// For every managed interface, mirrors the main routing table into a
/// dedicated per-interface table and keeps one `from <address> lookup
/// <table>` rule per interface address, following DHCP leases, router
/// advertisements and link flaps as they happen.
#[derive(Debug, Parser)]
#[command(name = "srcrouted", version, about)]
pub struct Cli {
    /// Logging level (0 = trace, 1 = debug, 2 = info, 3 = warning,
    /// 4 = error, 5 = fatal)
    #[arg(short = 'L', long, value_parser = clap::value_parser!(u8).range(0..=5))]
    pub loglevel: Option<u8>,

    /// Use ANSI color escape sequences for log output
    #[arg(short = 'Z', long, action = clap::ArgAction::Set, value_name = "BOOL")]
    pub logcolor: Option<bool>,

    /// Write logs to a file instead of standard error
    #[arg(short = 'O', long, value_name = "FILE")]
    pub logfile: Option<PathBuf>,

    /// Shortcut for --loglevel 0
    #[arg(short = 'v', long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Shortcut for --loglevel 3
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Configuration file (ini-style KEY = value lines)
    #[arg(short = 'C', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Managed interface mapping, e.g. eno1:2000 (repeatable)
    #[arg(short = 'N', long = "network", value_name = "IF:TABLEID")]
    pub networks: Vec<String>,
}
