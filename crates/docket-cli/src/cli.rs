use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "docket",
    about = "Docket: JSON collections cached in memory, persisted as blobs",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file; environment variables override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Keep collections in process memory only
    #[arg(long, conflicts_with_all = ["root", "bucket"])]
    pub memory: bool,
    /// Directory holding bucket directories
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Bucket directory name
    #[arg(long)]
    pub bucket: Option<String>,
}
