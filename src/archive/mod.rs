// src/archive/mod.rs

//! Portable scheme archives
//!
//! A portable archive is a flat ZIP of canonical per-event sound files plus
//! the metadata sidecars. Import is tolerant by design: entries may carry
//! legacy localized names, events absent from the archive are cleared rather
//! than left stale, and a sound that fails validation degrades that one event
//! instead of aborting the whole import. Proprietary containers are converted
//! up front, either in place or through a temporary file depending on
//! settings.

pub mod meta;
pub mod proprietary;

pub use meta::SchemeMeta;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::events::SoundEvent;
use crate::paths::{SCHEME_IMAGE_FILE, SCHEME_INFO_FILE};
use crate::scheme::{Scheme, SchemeStore};
use crate::{Error, Result};

/// File extension of the portable archive format.
pub const PORTABLE_EXT: &str = "chs";

// Entry names used by the XP-era releases of the third-party tool.
const LEGACY_IMAGE_ENTRY: &str = "visuel.bmp";
const LEGACY_INFO_ENTRY: &str = "infos.ini";

/// Write the managed scheme (sounds plus sidecars) to `path`.
pub fn export(store: &SchemeStore, path: &Path) -> Result<()> {
    let out = fs::File::create(path)?;
    let mut writer = ZipWriter::new(out);
    let options = SimpleFileOptions::default();

    let mut count = 0;
    for event in SoundEvent::all() {
        let media = store.dirs().media_path(event);
        if media.is_file() {
            writer.start_file(event.file_name(), options)?;
            io::copy(&mut fs::File::open(&media)?, &mut writer)?;
            count += 1;
        }
    }
    for sidecar in [store.dirs().scheme_image_path(), store.dirs().scheme_info_path()] {
        if sidecar.is_file() {
            let name = sidecar
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            writer.start_file(name, options)?;
            io::copy(&mut fs::File::open(&sidecar)?, &mut writer)?;
        }
    }
    writer.finish()?;

    info!("exported {count} sounds to '{}'", path.display());
    Ok(())
}

/// Import an archive into the managed scheme and apply it.
///
/// Every cataloged event is touched: extracted and installed when the archive
/// has a sound for it (under its canonical or legacy name), cleared when it
/// does not or when the sound is rejected.
pub fn import(store: &mut SchemeStore, path: &Path) -> Result<()> {
    let mut temp_to_delete: Option<PathBuf> = None;
    let mut source = path.to_path_buf();

    if proprietary::is_proprietary(path) {
        if store.settings().convert_proprietary_files {
            // Convert next to the original and replace it.
            let converted = path.with_extension(PORTABLE_EXT);
            proprietary::convert(path, &converted)?;
            if let Err(err) = fs::remove_file(path) {
                warn!("could not delete converted original '{}': {err}", path.display());
            }
            source = converted;
        } else {
            let temp = std::env::temp_dir().join(format!(
                "chime-import-{}.{PORTABLE_EXT}",
                std::process::id()
            ));
            proprietary::convert(path, &temp)?;
            temp_to_delete = Some(temp.clone());
            source = temp;
        }
    }

    let file = fs::File::open(&source)?;
    let mut zip = ZipArchive::new(file).map_err(|err| Error::MalformedArchive {
        path: source.display().to_string(),
        reason: err.to_string(),
    })?;
    fs::create_dir_all(&store.dirs().media_dir)?;

    // Stage extracted sounds so each one goes through the full install path
    // (format probe, duration ceiling, transcoding) instead of landing on the
    // canonical file directly.
    let staging = store.dirs().media_dir.join(".incoming");
    fs::create_dir_all(&staging)?;
    for event in SoundEvent::all() {
        let staged = staging.join(event.file_name());
        let mut extracted = try_extract(&mut zip, &event.file_name(), &staged)?;
        if !extracted {
            if let Some(legacy) = event.legacy_file_name {
                extracted = try_extract(&mut zip, legacy, &staged)?;
            }
        }

        if extracted {
            if let Err(err) = store.update(event, Some(&staged)) {
                // One bad sound degrades its event, not the import.
                warn!("imported sound for '{}' rejected: {err}", event.id);
                store.remove(event)?;
            }
            let _ = fs::remove_file(&staged);
        } else {
            store.remove(event)?;
        }
    }
    let _ = fs::remove_dir_all(&staging);

    SchemeMeta::reset(store.dirs())?;
    let image = store.dirs().scheme_image_path();
    if !try_extract(&mut zip, SCHEME_IMAGE_FILE, &image)? {
        try_extract(&mut zip, LEGACY_IMAGE_ENTRY, &image)?;
    }
    let infos = store.dirs().scheme_info_path();
    if !try_extract(&mut zip, SCHEME_INFO_FILE, &infos)? {
        try_extract(&mut zip, LEGACY_INFO_ENTRY, &infos)?;
    }

    let missing_use_default = store.settings().missing_sound_use_default;
    store.apply(&Scheme::managed(), missing_use_default)?;

    if let Some(temp) = temp_to_delete {
        let _ = fs::remove_file(temp);
    }
    info!("imported '{}'", path.display());
    Ok(())
}

fn try_extract(zip: &mut ZipArchive<fs::File>, entry: &str, dest: &Path) -> Result<bool> {
    match zip.by_name(entry) {
        Ok(mut file) => {
            let mut out = fs::File::create(dest)?;
            io::copy(&mut file, &mut out)?;
            Ok(true)
        }
        Err(ZipError::FileNotFound) => Ok(false),
        Err(err) => Err(err.into()),
    }
}
