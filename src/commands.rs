// src/commands.rs
//! Command handlers for the chime CLI

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::archive::{self, SchemeMeta};
use crate::cli::PatchAction;
use crate::events::{FactorySource, SoundEvent};
use crate::hive::Hive;
use crate::host::{HostProfile, ProcessElevation};
use crate::paths::RuntimeDirs;
use crate::scheme::SchemeStore;
use crate::settings::Settings;

/// Open the layered store with host detection, persisted settings and
/// process-level elevation state.
pub fn open_store(data_dir: Option<PathBuf>) -> Result<SchemeStore> {
    let data_dir = data_dir.unwrap_or_else(RuntimeDirs::default_data_dir);
    let dirs = RuntimeDirs::new(data_dir);
    let host = HostProfile::detect();
    let settings = Settings::load(&dirs.settings_file, host.patch_required())?;
    let hive = Hive::open(&dirs.hive_file)?;
    Ok(SchemeStore::new(
        hive,
        dirs,
        host,
        settings,
        Box::new(ProcessElevation),
    ))
}

fn lookup_event(id: &str) -> Result<&'static SoundEvent> {
    SoundEvent::by_id(id).ok_or_else(|| {
        anyhow::anyhow!("unknown event '{id}', run `chime events` for the catalog")
    })
}

pub fn cmd_setup(data_dir: Option<PathBuf>) -> Result<()> {
    let mut store = open_store(data_dir)?;
    store.setup()?;
    store.settings().save()?;
    println!(
        "Registered scheme '{}' for {} events",
        crate::APP_DISPLAY_NAME,
        SoundEvent::all().len()
    );
    Ok(())
}

pub fn cmd_uninstall(data_dir: Option<PathBuf>) -> Result<()> {
    let mut store = open_store(data_dir)?;
    store.uninstall()?;
    println!("Removed scheme '{}'", crate::APP_DISPLAY_NAME);
    Ok(())
}

pub fn cmd_apply(scheme: &str, no_fallback: bool, data_dir: Option<PathBuf>) -> Result<()> {
    let mut store = open_store(data_dir)?;
    let scheme = store.scheme_by_name(scheme)?;
    let fallback = !no_fallback && store.settings().missing_sound_use_default;
    store.apply(&scheme, fallback)?;
    println!("Applied scheme '{}'", scheme.display_name());
    Ok(())
}

pub fn cmd_update(event: &str, sound: Option<&Path>, data_dir: Option<PathBuf>) -> Result<()> {
    let event = lookup_event(event)?;
    let mut store = open_store(data_dir)?;
    store.update(event, sound)?;
    match sound {
        Some(path) => println!("Installed '{}' for event '{}'", path.display(), event.id),
        None => println!("Cleared event '{}'", event.id),
    }
    Ok(())
}

pub fn cmd_copy_default(
    event: &str,
    from: Option<&str>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let event = lookup_event(event)?;
    let mut store = open_store(data_dir)?;
    let source = match from {
        Some(name) => Some(store.scheme_by_name(name)?),
        None => None,
    };
    store.copy_default(event, source.as_ref())?;
    println!("Copied factory sound for event '{}'", event.id);
    Ok(())
}

pub fn cmd_export(output: &Path, data_dir: Option<PathBuf>) -> Result<()> {
    let store = open_store(data_dir)?;
    archive::export(&store, output)?;
    println!("Exported scheme to '{}'", output.display());
    Ok(())
}

pub fn cmd_import(path: &Path, data_dir: Option<PathBuf>) -> Result<()> {
    let mut store = open_store(data_dir)?;
    archive::import(&mut store, path)?;
    let meta = SchemeMeta::load(store.dirs())?;
    if meta.name.is_empty() {
        println!("Imported '{}'", path.display());
    } else {
        println!("Imported scheme '{}' from '{}'", meta.name, path.display());
    }
    Ok(())
}

pub fn cmd_current(data_dir: Option<PathBuf>) -> Result<()> {
    let store = open_store(data_dir)?;
    for event in SoundEvent::all() {
        match store.current_file(event) {
            Some(path) => println!("{:<18} {}", event.id, path.display()),
            None => println!("{:<18} -", event.id),
        }
    }
    Ok(())
}

pub fn cmd_schemes(data_dir: Option<PathBuf>) -> Result<()> {
    let store = open_store(data_dir)?;
    let active = store
        .hive()
        .get("AppEvents\\Schemes")
        .unwrap_or_default()
        .to_string();
    for scheme in store.schemes() {
        let marker = if scheme.internal_name() == active { "*" } else { " " };
        println!("{marker} {:<24} {}", scheme.internal_name(), scheme.display_name());
    }
    Ok(())
}

pub fn cmd_events() -> Result<()> {
    for event in SoundEvent::all() {
        let embedded = if event.factory == FactorySource::ShellModuleResource {
            " (embedded factory sound)"
        } else {
            ""
        };
        println!("{:<18} {}{embedded}", event.id, event.file_name());
    }
    Ok(())
}

pub fn cmd_patch(action: &PatchAction, data_dir: Option<PathBuf>) -> Result<()> {
    let store = open_store(data_dir)?;
    let patcher = store.patcher()?;
    match action {
        PatchAction::Backup => {
            patcher.backup()?;
            println!("Backed up '{}'", patcher.module_path().display());
        }
        PatchAction::Restore => {
            patcher.restore()?;
            println!("Restored '{}'", patcher.module_path().display());
        }
        PatchAction::Extract { output } => {
            patcher.extract_default(output)?;
            println!("Extracted factory startup sound to '{}'", output.display());
        }
        PatchAction::Apply => {
            let startup = lookup_event("Startup")?;
            let sound = store.dirs().media_path(startup);
            let replacement = sound.is_file().then_some(sound.as_path());
            patcher.patch(replacement)?;
            match replacement {
                Some(path) => println!("Patched startup sound from '{}'", path.display()),
                None => println!("Patched silent startup sound"),
            }
        }
    }
    Ok(())
}

pub fn cmd_meta(
    name: Option<String>,
    author: Option<String>,
    about: Option<String>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let store = open_store(data_dir)?;
    let mut meta = SchemeMeta::load(store.dirs())?;

    if name.is_none() && author.is_none() && about.is_none() {
        println!("name:   {}", meta.name);
        println!("author: {}", meta.author);
        println!("about:  {}", meta.about);
        return Ok(());
    }

    if let Some(name) = name {
        meta.name = name;
    }
    if let Some(author) = author {
        meta.author = author;
    }
    if let Some(about) = about {
        meta.about = about;
    }
    meta.save(store.dirs())?;
    info!("scheme metadata updated");
    println!("Updated scheme metadata");
    Ok(())
}
