// src/lib.rs

//! Chime sound scheme manager
//!
//! Maintains a layered catalog of named sound events and resolves, per event,
//! which customized sound the host should play.
//!
//! # Architecture
//!
//! - Hive-backed layers: per-event overlay entries under `AppEvents\Schemes`,
//!   resolved into a single `.Current` pointer by `SchemeStore::apply`
//! - Fixed event catalog: a static table of tagged records, one per sound event
//! - Embedded startup sound: on host generations that embed it, the factory
//!   startup sound lives inside a shell module resource; `ResourcePatcher`
//!   replaces it with backup/rollback guarantees
//! - Archive codec: portable ZIP snapshots of the managed layer, plus a
//!   decode-only converter for a legacy encrypted third-party container

pub mod archive;
pub mod cli;
pub mod commands;
mod error;
pub mod events;
pub mod hive;
pub mod host;
pub mod paths;
pub mod patcher;
pub mod scheme;
pub mod settings;

pub use error::{Error, ErrorCategory, Result};
pub use events::{EventRole, FactorySource, SoundEvent};
pub use hive::Hive;
pub use host::{Elevation, HostProfile, ProcessElevation, StartupPatch};
pub use paths::{ExpandablePath, RuntimeDirs};
pub use patcher::ResourcePatcher;
pub use scheme::{Scheme, SchemeStore, Transcoder, MANAGED_SCHEME, SCHEME_DEFAULT};
pub use settings::Settings;

/// Internal name of this application, used as the managed layer's key.
pub const APP_INTERNAL_NAME: &str = "Chime";

/// Display name of this application.
pub const APP_DISPLAY_NAME: &str = "Chime Sound Scheme";
