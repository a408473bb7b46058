// src/paths.rs

//! Path handling: environment-expanding path strings and runtime locations
//!
//! Overlay entries in the layered store may contain `%VAR%` placeholders.
//! Expansion is an explicit, auditable step (`ExpandablePath::resolve`), never
//! ambient substitution.

use std::env;
use std::path::{Path, PathBuf};

use crate::events::SoundEvent;

/// File name of the managed scheme's metadata, kept next to the event files.
pub const SCHEME_INFO_FILE: &str = "Scheme.ini";

/// File name of the managed scheme's thumbnail.
pub const SCHEME_IMAGE_FILE: &str = "Scheme.png";

/// A path string that may contain `%VAR%` environment placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandablePath(String);

impl ExpandablePath {
    pub fn new(raw: impl Into<String>) -> Self {
        ExpandablePath(raw.into())
    }

    /// The stored, unexpanded form.
    pub fn raw(&self) -> &str {
        &self.0
    }

    /// Expand `%VAR%` placeholders against the process environment.
    ///
    /// Unknown variables are left in place, matching how the host shell treats
    /// them. A trailing unmatched `%` is literal.
    pub fn resolve(&self) -> PathBuf {
        let raw = &self.0;
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw.as_str();
        while let Some(start) = rest.find('%') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('%') {
                Some(end) => {
                    let name = &after[..end];
                    match lookup_var(name) {
                        Some(value) => out.push_str(&value),
                        None => {
                            out.push('%');
                            out.push_str(name);
                            out.push('%');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push('%');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        PathBuf::from(out)
    }
}

impl From<&Path> for ExpandablePath {
    fn from(path: &Path) -> Self {
        ExpandablePath(path.to_string_lossy().into_owned())
    }
}

fn lookup_var(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    // Host environments with case-insensitive variables store them uppercased.
    env::var(name)
        .or_else(|_| env::var(name.to_uppercase()))
        .ok()
}

/// Where the managed layer keeps its files.
#[derive(Debug, Clone)]
pub struct RuntimeDirs {
    /// Per-event canonical sound files plus scheme metadata.
    pub media_dir: PathBuf,
    /// Application settings file.
    pub settings_file: PathBuf,
    /// Backing file for the layered hive.
    pub hive_file: PathBuf,
}

impl RuntimeDirs {
    /// Lay out runtime paths under the given data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        RuntimeDirs {
            media_dir: data_dir.join("Media"),
            settings_file: data_dir.join("settings.toml"),
            hive_file: data_dir.join("hive.json"),
        }
    }

    /// Default data directory: `$CHIME_DATA`, else a dot directory in `$HOME`
    /// (`%APPDATA%` on hosts that define it).
    pub fn default_data_dir() -> PathBuf {
        if let Ok(dir) = env::var("CHIME_DATA") {
            return PathBuf::from(dir);
        }
        if let Ok(appdata) = env::var("APPDATA") {
            return PathBuf::from(appdata).join("Chime");
        }
        match env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(".chime"),
            Err(_) => PathBuf::from(".chime"),
        }
    }

    /// Canonical file path for an event's sound.
    pub fn media_path(&self, event: &SoundEvent) -> PathBuf {
        self.media_dir.join(event.file_name())
    }

    pub fn scheme_info_path(&self) -> PathBuf {
        self.media_dir.join(SCHEME_INFO_FILE)
    }

    pub fn scheme_image_path(&self) -> PathBuf {
        self.media_dir.join(SCHEME_IMAGE_FILE)
    }
}
