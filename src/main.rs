use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{Generator, generate};
use colored::Colorize;
use std::io;
use std::process;
use tracing_subscriber::EnvFilter;
use treewatch::cli::{Cli, Commands};
use treewatch::output::{self, Verbosity};
use treewatch::{WatchContext, commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "treewatch=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (only possible in tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    output::set_verbosity(if cli.quiet {
        Verbosity::Quiet
    } else if cli.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    });

    if let Commands::Completion { shell } = cli.command {
        print_completions(shell, &mut Cli::command());
        return Ok(());
    }

    let mut ctx = match cli.config {
        Some(path) => WatchContext::new_explicit(path)?,
        None => WatchContext::new()?,
    };
    output::verbose(&format!("Using configuration {}", ctx.config_path.display()));

    match cli.command {
        Commands::Watch { root, interval } => commands::watch::execute(&ctx, &root, interval)?,
        Commands::Scan { root } => commands::scan::execute(&ctx, &root)?,
        Commands::Changes { root, kind, dirs } => {
            commands::changes::execute(&ctx, &root, kind, dirs)?;
        }
        Commands::Summary { root } => commands::summary::execute(&ctx, &root)?,
        Commands::Config {
            key,
            value,
            unset,
            list,
        } => commands::config::execute(&mut ctx, key.as_deref(), value.as_deref(), unset, list)?,
        Commands::Completion { .. } => {}
    }

    Ok(())
}

fn print_completions<G: Generator>(g: G, cmd: &mut clap::Command) {
    generate(g, cmd, cmd.get_name().to_string(), &mut io::stdout());
}
