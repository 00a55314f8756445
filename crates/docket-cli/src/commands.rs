use std::path::Path;

use colored::Colorize;
use docket_server::{DocketServer, ServerConfig};
use docket_store::backend::{DEFAULT_BUCKET, DEFAULT_ROOT};
use docket_store::StoreBackend;

use crate::cli::{Cli, Command, ServeArgs};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args),
        Command::Config => cmd_config(&config, cli.config.as_deref()),
    }
}

/// Defaults, then the optional file, then the environment.
fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    let mut config = match path {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

fn apply_serve_args(config: &mut ServerConfig, args: ServeArgs) {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if args.memory {
        config.store = StoreBackend::Memory;
        return;
    }
    if args.root.is_none() && args.bucket.is_none() {
        return;
    }
    let (root, bucket) = match &config.store {
        StoreBackend::Fs { root, bucket } => (root.clone(), bucket.clone()),
        StoreBackend::Memory => (DEFAULT_ROOT.into(), DEFAULT_BUCKET.to_string()),
    };
    config.store = StoreBackend::Fs {
        root: args.root.unwrap_or(root),
        bucket: args.bucket.unwrap_or(bucket),
    };
}

fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    apply_serve_args(&mut config, args);
    let server = DocketServer::new(config)?;
    println!(
        "{} Docket {} on {} (store: {})",
        "✓".green().bold(),
        env!("CARGO_PKG_VERSION"),
        server.config().bind_addr.to_string().bold(),
        server.registry().store().describe().cyan()
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve())?;
    println!("{} Docket stopped", "✓".green().bold());
    Ok(())
}

fn cmd_config(config: &ServerConfig, source: Option<&Path>) -> anyhow::Result<()> {
    let origin = match source {
        Some(path) => format!("{} + environment", path.display()),
        None => "defaults + environment".to_string(),
    };
    eprintln!("{} {}", "# Effective configuration:".bold(), origin.dimmed());
    print!("{}", config.to_toml()?);
    Ok(())
}
