// src/cli.rs
//! CLI definitions for the chime sound scheme manager
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chime")]
#[command(version)]
#[command(about = "Layered sound scheme manager with startup sound patching", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register the managed scheme and its per-event entries
    Setup {
        /// Data directory (default: $CHIME_DATA or a per-user directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Remove the managed scheme and restore the shell module
    Uninstall {
        /// Data directory (default: $CHIME_DATA or a per-user directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Resolve a scheme into the current pointer layer
    Apply {
        /// Internal scheme name (".Default" is the factory layer)
        scheme: String,

        /// Do not fall back to the default layer for missing sounds
        #[arg(long)]
        no_fallback: bool,

        /// Data directory (default: $CHIME_DATA or a per-user directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Install a sound file for one event in the managed scheme
    Update {
        /// Event id (see `chime events`)
        event: String,

        /// Sound file to install; omit to clear the event
        sound: Option<PathBuf>,

        /// Data directory (default: $CHIME_DATA or a per-user directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Copy an event's sound from another layer into the managed scheme
    CopyDefault {
        /// Event id (see `chime events`)
        event: String,

        /// Source scheme (default: the factory layer)
        #[arg(long)]
        from: Option<String>,

        /// Data directory (default: $CHIME_DATA or a per-user directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Export the managed scheme as a portable archive
    Export {
        /// Output archive path
        output: PathBuf,

        /// Data directory (default: $CHIME_DATA or a per-user directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Import a portable or proprietary archive and apply it
    Import {
        /// Archive to import
        archive: PathBuf,

        /// Data directory (default: $CHIME_DATA or a per-user directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Show the sound each event currently resolves to
    Current {
        /// Data directory (default: $CHIME_DATA or a per-user directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// List registered schemes
    Schemes {
        /// Data directory (default: $CHIME_DATA or a per-user directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// List the event catalog
    Events,

    /// Manage the embedded startup sound patch
    Patch {
        #[command(subcommand)]
        action: PatchAction,

        /// Data directory (default: $CHIME_DATA or a per-user directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Show or edit scheme metadata
    Meta {
        /// Set the scheme name
        #[arg(long)]
        name: Option<String>,

        /// Set the scheme author
        #[arg(long)]
        author: Option<String>,

        /// Set the scheme comment
        #[arg(long)]
        about: Option<String>,

        /// Data directory (default: $CHIME_DATA or a per-user directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum PatchAction {
    /// Back up the pristine shell module
    Backup,

    /// Restore the shell module from its backup
    Restore,

    /// Extract the factory startup sound to a file
    Extract {
        /// Output sound file
        output: PathBuf,
    },

    /// Patch the managed startup sound into the module
    Apply,
}
