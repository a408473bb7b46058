// src/archive/meta.rs

//! Scheme metadata sidecar
//!
//! Name, author and free-text comment for the managed scheme, stored as a
//! small INI file next to the sound files. Parsing is deliberately lax:
//! legacy files ship as a single `;`-joined line, quote their values, and
//! use localized key aliases, and all of those must still load.

use std::fs;

use serde::{Deserialize, Serialize};

use crate::paths::RuntimeDirs;
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeMeta {
    pub name: String,
    pub author: String,
    pub about: String,
}

impl SchemeMeta {
    pub fn new(
        name: impl Into<String>,
        author: impl Into<String>,
        about: impl Into<String>,
    ) -> SchemeMeta {
        SchemeMeta {
            name: name.into(),
            author: author.into(),
            about: about.into(),
        }
    }

    /// Parse scheme info text. Unknown keys are ignored; missing keys leave
    /// their fields empty.
    pub fn parse(text: &str) -> SchemeMeta {
        let mut meta = SchemeMeta::default();

        let lines: Vec<&str> = {
            let non_empty: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
            // Legacy single-line form joins the pairs with semicolons.
            match non_empty.as_slice() {
                [only] if only.contains(';') => only.split(';').collect(),
                _ => non_empty,
            }
        };

        for line in lines {
            let line = line.trim();
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim_matches(|c| c == ' ' || c == '"').to_lowercase();
            let value = value.trim_matches(|c| c == ' ' || c == '"').to_string();
            match key.as_str() {
                "name" | "nom" => meta.name = value,
                "author" | "auteur" => meta.author = value,
                "about" | "commentaire" => meta.about = value,
                _ => {}
            }
        }
        meta
    }

    /// Serialize in the canonical CRLF form other tools expect.
    pub fn serialize(&self) -> String {
        format!(
            "[SchemeInfo]\r\nname={}\r\nauthor={}\r\nabout={}\r\n",
            self.name, self.author, self.about
        )
    }

    /// Load from the runtime directory; a missing file yields empty metadata.
    pub fn load(dirs: &RuntimeDirs) -> Result<SchemeMeta> {
        let path = dirs.scheme_info_path();
        if !path.is_file() {
            return Ok(SchemeMeta::default());
        }
        let text = fs::read_to_string(&path)?;
        Ok(SchemeMeta::parse(&text))
    }

    pub fn save(&self, dirs: &RuntimeDirs) -> Result<()> {
        fs::create_dir_all(&dirs.media_dir)?;
        fs::write(dirs.scheme_info_path(), self.serialize())?;
        Ok(())
    }

    /// Drop the metadata sidecars (info file and thumbnail) from the runtime
    /// directory.
    pub fn reset(dirs: &RuntimeDirs) -> Result<()> {
        for path in [dirs.scheme_info_path(), dirs.scheme_image_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}
