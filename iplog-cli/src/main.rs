//! ## iplog-cli
//! **IP-layer record extraction from packet captures**
//!
//! - `extract`: capture file or directory to a newline-delimited JSON log
//! - `export`: record log to a Parquet snapshot
//! - `info`: packet count and time range of a capture

use clap::Parser;

mod commands;

use commands::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract(args) => commands::extract(args),
        Commands::Export(args) => commands::export(args),
        Commands::Info(args) => commands::info(args),
    }
}
