// src/hive/mod.rs

//! Layered store backend
//!
//! A small hierarchical key namespace, addressed with `\`-separated paths the
//! way the host's per-user sound settings are laid out:
//!
//! ```text
//! AppEvents\Schemes            (value: name of the applied scheme)
//! AppEvents\Schemes\Names\<scheme>         (value: display name)
//! AppEvents\Schemes\Apps\<eventPath>\<scheme>  (value: resolved sound path)
//! ```
//!
//! Persisted as one JSON document. Writes are last-writer-wins: the design
//! assumes a single mutating instance at a time, enforced by the surrounding
//! application, so there is no internal locking.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Key path separator.
pub const SEPARATOR: char = '\\';

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Node {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    value: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    children: BTreeMap<String, Node>,
}

/// A hierarchical key-value store, optionally backed by a file.
#[derive(Debug, Default)]
pub struct Hive {
    root: Node,
    file: Option<PathBuf>,
}

impl Hive {
    /// Open a hive backed by `path`. A missing file yields an empty hive that
    /// will be created on first save.
    pub fn open(path: &Path) -> Result<Hive> {
        let root = if path.exists() {
            serde_json::from_str(&fs::read_to_string(path)?)?
        } else {
            Node::default()
        };
        Ok(Hive {
            root,
            file: Some(path.to_path_buf()),
        })
    }

    /// An unbacked hive; `save` is a no-op. Used by tests.
    pub fn in_memory() -> Hive {
        Hive::default()
    }

    /// Persist the hive to its backing file, if any.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.root)?)?;
        Ok(())
    }

    fn node(&self, key: &str) -> Option<&Node> {
        let mut node = &self.root;
        for part in split_key(key) {
            node = node.children.get(part)?;
        }
        Some(node)
    }

    fn node_mut(&mut self, key: &str) -> &mut Node {
        let mut node = &mut self.root;
        for part in split_key(key) {
            node = node.children.entry(part.to_string()).or_default();
        }
        node
    }

    /// Value stored at `key`, if the key exists and has one.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.node(key)?.value.as_deref()
    }

    /// Create `key` (and intermediates) and set its value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.node_mut(key).value = Some(value.into());
    }

    /// Create `key` without assigning a value.
    pub fn create(&mut self, key: &str) {
        self.node_mut(key);
    }

    /// Whether `key` exists (with or without a value).
    pub fn exists(&self, key: &str) -> bool {
        self.node(key).is_some()
    }

    /// Delete `key` and its whole subtree. Returns whether anything was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        let parts: Vec<&str> = split_key(key).collect();
        let Some((last, parents)) = parts.split_last() else {
            return false;
        };
        let mut node = &mut self.root;
        for part in parents {
            match node.children.get_mut(*part) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.children.remove(*last).is_some()
    }

    /// Names of the direct children of `key`, in stable order.
    pub fn subkeys(&self, key: &str) -> Vec<String> {
        match self.node(key) {
            Some(node) => node.children.keys().cloned().collect(),
            None => Vec::new(),
        }
    }
}

fn split_key(key: &str) -> impl Iterator<Item = &str> {
    key.split(SEPARATOR).filter(|part| !part.is_empty())
}
