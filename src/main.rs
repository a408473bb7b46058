// src/main.rs

use anyhow::Result;
use chime::cli::{Cli, Commands};
use chime::commands;
use clap::{CommandFactory, Parser};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Setup { data_dir }) => commands::cmd_setup(data_dir),
        Some(Commands::Uninstall { data_dir }) => commands::cmd_uninstall(data_dir),
        Some(Commands::Apply {
            scheme,
            no_fallback,
            data_dir,
        }) => commands::cmd_apply(&scheme, no_fallback, data_dir),
        Some(Commands::Update {
            event,
            sound,
            data_dir,
        }) => commands::cmd_update(&event, sound.as_deref(), data_dir),
        Some(Commands::CopyDefault {
            event,
            from,
            data_dir,
        }) => commands::cmd_copy_default(&event, from.as_deref(), data_dir),
        Some(Commands::Export { output, data_dir }) => commands::cmd_export(&output, data_dir),
        Some(Commands::Import { archive, data_dir }) => commands::cmd_import(&archive, data_dir),
        Some(Commands::Current { data_dir }) => commands::cmd_current(data_dir),
        Some(Commands::Schemes { data_dir }) => commands::cmd_schemes(data_dir),
        Some(Commands::Events) => commands::cmd_events(),
        Some(Commands::Patch { action, data_dir }) => commands::cmd_patch(&action, data_dir),
        Some(Commands::Meta {
            name,
            author,
            about,
            data_dir,
        }) => commands::cmd_meta(name, author, about, data_dir),
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}
