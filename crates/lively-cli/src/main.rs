// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Args, Parser, Subcommand};
use lively_cli::commands;
use lively_cli::config::{Config, Overrides};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lively")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Live-reloading static development server", long_about = None)]
struct Cli {
    /// Log filter such as `debug` or `warn,lively_cli=trace`
    /// (default: warnings plus request logs)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Configuration file (default: lively.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a directory and reload browsers on change
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },
    /// Watch files and print reload patterns (no server)
    Watch {
        #[command(flatten)]
        args: ServeArgs,
    },
    /// Write a starter lively.toml
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Paths to watch, relative to the root (default: the root itself)
    watch: Vec<PathBuf>,

    /// Directory to serve
    #[arg(long)]
    root: Option<PathBuf>,

    /// Directory holding custom error pages such as 404.html
    #[arg(long)]
    base: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    port: Option<u16>,

    /// URL prefix stripped before resolving files
    #[arg(long)]
    prefix: Option<String>,

    /// Ignore pattern, relative to the root (repeatable)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Do not log requests or print the startup banner
    #[arg(short, long)]
    quiet: bool,

    /// Open the browser once listening
    #[arg(long)]
    open: bool,
}

impl From<ServeArgs> for Overrides {
    fn from(args: ServeArgs) -> Self {
        Overrides {
            root: args.root,
            base: args.base,
            host: args.host,
            port: args.port,
            prefix: args.prefix,
            watch: args.watch,
            ignore: args.ignore,
            quiet: args.quiet,
            open: args.open,
        }
    }
}

fn load_config(path: Option<&PathBuf>, args: ServeArgs) -> anyhow::Result<Config> {
    let mut config = Config::load(path.map(PathBuf::as_path))?;
    config.apply(args.into());
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    lively_cli::logging::init(cli.log_level.as_deref());

    match cli.command {
        Commands::Serve { args } => {
            let config = load_config(cli.config.as_ref(), args)?;
            commands::serve::run(config).await
        }
        Commands::Watch { args } => {
            let config = load_config(cli.config.as_ref(), args)?;
            commands::watch::run(config).await
        }
        Commands::Init { force } => commands::init::run(&std::env::current_dir()?, force).await,
    }
}
