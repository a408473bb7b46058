// src/settings.rs

//! Application settings handle
//!
//! Load-at-start, save-on-change. The store takes a [`Settings`] value as an
//! explicit collaborator; nothing in the library reads settings ambiently.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::events::SoundEvent;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Patch the embedded startup sound when updating the startup event.
    pub patch_startup_sound: bool,
    /// When applying a scheme, fall back to the default layer for missing sounds.
    pub missing_sound_use_default: bool,
    /// Replace imported proprietary archives with converted portable ones.
    pub convert_proprietary_files: bool,
    /// Events muted by the user, keyed by event id.
    pub disabled_events: BTreeSet<String>,

    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            patch_startup_sound: false,
            missing_sound_use_default: true,
            convert_proprietary_files: false,
            disabled_events: BTreeSet::new(),
            path: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when the file does not exist.
    ///
    /// `patch_required` seeds the startup-patch default on first run, so hosts
    /// that embed the startup sound patch it out of the box.
    pub fn load(path: &Path, patch_required: bool) -> Result<Settings> {
        let mut settings = if path.exists() {
            let text = fs::read_to_string(path)?;
            toml::from_str::<Settings>(&text)?
        } else {
            Settings {
                patch_startup_sound: patch_required,
                ..Settings::default()
            }
        };
        // Stale ids (from older catalogs) are dropped rather than kept around.
        settings
            .disabled_events
            .retain(|id| SoundEvent::by_id(id).is_some());
        settings.path = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Write the settings file, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn is_disabled(&self, event: &SoundEvent) -> bool {
        self.disabled_events.contains(event.id)
    }

    /// Flip an event's disabled flag and persist.
    pub fn set_disabled(&mut self, event: &SoundEvent, disabled: bool) -> Result<()> {
        if disabled {
            self.disabled_events.insert(event.id.to_string());
        } else {
            self.disabled_events.remove(event.id);
        }
        self.save()
    }

    /// Detach from any backing file (in-memory settings for tests and tools).
    pub fn ephemeral(mut self) -> Settings {
        self.path = None;
        self
    }
}
