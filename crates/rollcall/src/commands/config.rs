//! Config command - inspect configuration.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved session settings
    Show,

    /// Show the default configuration file path
    Path,
}

pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let session = &config.session;
    println!("# Rollcall Configuration\n");
    match &ctx.config_path {
        Some(path) => println!("Config file: {}\n", path.display()),
        None => println!("Config file: default location\n"),
    }
    println!("Session:");
    println!("  id_pattern:         {}", session.id_pattern);
    println!("  retention_secs:     {}", session.retention_secs);
    println!("  reap_interval_secs: {}", session.reap_interval_secs);
    match session.max_sessions {
        Some(max) => println!("  max_sessions:       {max}"),
        None => println!("  max_sessions:       unbounded"),
    }
    Ok(())
}

fn cmd_path() -> Result<()> {
    if let Some(path) = rollcall_session::default_config_path() {
        println!("{}", path.display());
    } else {
        eprintln!("Could not determine config directory");
    }
    Ok(())
}
