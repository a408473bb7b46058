// src/patcher/mod.rs

//! Embedded-resource patching of the shell module
//!
//! On hosts whose startup sound lives inside a system module rather than in a
//! file, swapping it means rewriting a WAVE resource in that module. The
//! protocol is backup-first: the pristine module is copied aside once, every
//! patch starts over from that pristine copy, and restore puts it back
//! verbatim. The live module may be locked by the host while loaded, so
//! patching moves it aside (best effort) before writing the replacement.

mod pe;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::scheme::wave::SILENT_WAVE;
use crate::{Error, Result};

const RESOURCE_KIND: &str = "WAVE";

fn with_appended_extension(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Patches a single WAVE resource in one shell module.
pub struct ResourcePatcher {
    module: PathBuf,
    backup: PathBuf,
    staged: PathBuf,
    resource_id: u32,
    locale: u16,
    elevated: bool,
}

impl ResourcePatcher {
    pub fn new(module: PathBuf, resource_id: u32, locale: u16, elevated: bool) -> ResourcePatcher {
        let backup = with_appended_extension(&module, "bak");
        let staged = with_appended_extension(&module, "old");
        ResourcePatcher {
            module,
            backup,
            staged,
            resource_id,
            locale,
            elevated,
        }
    }

    pub fn module_path(&self) -> &Path {
        &self.module
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    fn require_elevation(&self, operation: &'static str) -> Result<()> {
        if self.elevated {
            Ok(())
        } else {
            Err(Error::ElevationRequired { operation })
        }
    }

    fn read_module(&self, path: &Path) -> Result<Vec<u8>> {
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(Error::ModuleNotFound {
                path: path.to_path_buf(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Copy the pristine module aside, once. A backup already on disk is
    /// trusted; it predates any patch this application made.
    pub fn backup(&self) -> Result<()> {
        if self.backup.is_file() {
            return Ok(());
        }
        self.require_elevation("back up the shell module")?;
        if !self.module.is_file() {
            return Err(Error::ModuleNotFound {
                path: self.module.clone(),
            });
        }
        fs::copy(&self.module, &self.backup)?;
        info!("backed up '{}' to '{}'", self.module.display(), self.backup.display());
        Ok(())
    }

    /// Install `replacement` (or the silent placeholder when `None`) as the
    /// module's startup WAVE resource.
    ///
    /// The patched image is always built from the pristine backup, never the
    /// live module, so patches do not stack and a damaged live module still
    /// patches cleanly. The live module is moved aside first so a loaded copy
    /// does not block the write; when that move fails the write happens in
    /// place. A failed write rolls the live module back to the backup.
    pub fn patch(&self, replacement: Option<&Path>) -> Result<()> {
        self.require_elevation("patch the shell module")?;
        self.backup()?;

        let payload = match replacement {
            Some(path) => fs::read(path)?,
            None => SILENT_WAVE.to_vec(),
        };

        let image = self.read_module(&self.backup)?;
        let patched = pe::replace_resource(
            &image,
            RESOURCE_KIND,
            self.resource_id,
            self.locale,
            &payload,
        )
        .map_err(|reason| Error::MalformedModule {
            path: self.backup.display().to_string(),
            reason,
        })?;

        // Move the live module aside; a locked file keeps its name and the
        // write below lands in place instead.
        if let Err(err) = fs::remove_file(&self.staged) {
            if err.kind() != ErrorKind::NotFound {
                debug!("could not clear staged module '{}': {err}", self.staged.display());
            }
        }
        if let Err(err) = fs::rename(&self.module, &self.staged) {
            debug!("could not move module aside, writing in place: {err}");
        }

        if let Err(err) = fs::write(&self.module, &patched) {
            // Leave a working module behind whatever happens.
            if let Err(rollback_err) = fs::copy(&self.backup, &self.module) {
                warn!(
                    "could not roll '{}' back to its backup: {rollback_err}",
                    self.module.display()
                );
            }
            return Err(err.into());
        }
        info!(
            "patched resource {} in '{}' ({} payload bytes)",
            self.resource_id,
            self.module.display(),
            payload.len()
        );
        Ok(())
    }

    /// Put the pristine backup back as the live module. The backup stays on
    /// disk for later rounds.
    pub fn restore(&self) -> Result<()> {
        self.require_elevation("restore the shell module")?;
        if !self.backup.is_file() {
            return Err(Error::BackupNotFound {
                path: self.backup.clone(),
            });
        }
        fs::copy(&self.backup, &self.module)?;
        info!("restored '{}' from backup", self.module.display());
        Ok(())
    }

    /// Write the factory startup sound to `out`, reading the pristine backup
    /// when one exists so an already-patched module still yields the factory
    /// payload.
    pub fn extract_default(&self, out: &Path) -> Result<()> {
        let source = if self.backup.is_file() {
            &self.backup
        } else {
            &self.module
        };
        let image = self.read_module(source)?;
        let payload = pe::extract_resource(&image, RESOURCE_KIND, self.resource_id, self.locale)
            .map_err(|reason| Error::MalformedModule {
                path: source.display().to_string(),
                reason,
            })?
            .ok_or_else(|| Error::MalformedModule {
                path: source.display().to_string(),
                reason: "module carries no startup sound resource",
            })?;
        fs::write(out, payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::pe::testutil::synthetic_module;
    use super::*;
    use crate::host::{STARTUP_RESOURCE_ID_VISTA, STARTUP_RESOURCE_LOCALE};
    use tempfile::tempdir;

    fn patcher_for(module: &Path, elevated: bool) -> ResourcePatcher {
        ResourcePatcher::new(
            module.to_path_buf(),
            STARTUP_RESOURCE_ID_VISTA,
            STARTUP_RESOURCE_LOCALE,
            elevated,
        )
    }

    #[test]
    fn test_operations_require_elevation() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("imageres.dll");
        fs::write(&module, synthetic_module(5051, 1033, b"factory")).unwrap();
        let patcher = patcher_for(&module, false);
        assert!(matches!(
            patcher.backup(),
            Err(Error::ElevationRequired { .. })
        ));
        assert!(matches!(
            patcher.patch(None),
            Err(Error::ElevationRequired { .. })
        ));
        assert!(matches!(
            patcher.restore(),
            Err(Error::ElevationRequired { .. })
        ));
    }

    #[test]
    fn test_backup_is_one_shot() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("imageres.dll");
        fs::write(&module, synthetic_module(5051, 1033, b"factory")).unwrap();
        let patcher = patcher_for(&module, true);

        patcher.backup().unwrap();
        let first = fs::read(patcher.backup_path()).unwrap();

        // Later module changes never refresh the backup.
        fs::write(&module, synthetic_module(5051, 1033, b"changed")).unwrap();
        patcher.backup().unwrap();
        assert_eq!(fs::read(patcher.backup_path()).unwrap(), first);
    }

    #[test]
    fn test_patch_and_restore_round_trip() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("imageres.dll");
        let pristine = synthetic_module(5051, 1033, b"factory-chime");
        fs::write(&module, &pristine).unwrap();
        let patcher = patcher_for(&module, true);

        let replacement = dir.path().join("Startup.wav");
        fs::write(&replacement, crate::scheme::wave::pcm_fixture(1)).unwrap();
        patcher.patch(Some(&replacement)).unwrap();

        let patched = fs::read(&module).unwrap();
        let embedded =
            pe::extract_resource(&patched, "WAVE", 5051, 1033).unwrap().unwrap();
        assert_eq!(embedded, fs::read(&replacement).unwrap());

        // The pre-patch module was moved aside.
        assert_eq!(fs::read(module.with_file_name("imageres.dll.old")).unwrap(), pristine);

        patcher.restore().unwrap();
        assert_eq!(fs::read(&module).unwrap(), pristine);
        assert!(patcher.backup_path().is_file());
    }

    #[test]
    fn test_patch_without_replacement_installs_silence() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("imageres.dll");
        fs::write(&module, synthetic_module(5080, 1033, b"factory")).unwrap();
        let patcher = ResourcePatcher::new(module.clone(), 5080, 1033, true);

        patcher.patch(None).unwrap();
        let patched = fs::read(&module).unwrap();
        let embedded = pe::extract_resource(&patched, "WAVE", 5080, 1033).unwrap().unwrap();
        assert_eq!(embedded, SILENT_WAVE.to_vec());
    }

    #[test]
    fn test_patch_starts_over_from_pristine_backup() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("imageres.dll");
        fs::write(&module, synthetic_module(5051, 1033, b"factory")).unwrap();
        let patcher = patcher_for(&module, true);
        patcher.backup().unwrap();

        // A damaged live module is no obstacle while the backup is intact.
        fs::write(&module, b"corrupted by an update").unwrap();
        patcher.patch(None).unwrap();
        let patched = fs::read(&module).unwrap();
        let embedded = pe::extract_resource(&patched, "WAVE", 5051, 1033).unwrap().unwrap();
        assert_eq!(embedded, SILENT_WAVE.to_vec());

        // Repeated patches rebuild from the backup, they never stack.
        let big = dir.path().join("big.wav");
        fs::write(&big, crate::scheme::wave::pcm_fixture(2)).unwrap();
        patcher.patch(Some(&big)).unwrap();
        let first = fs::read(&module).unwrap();
        patcher.patch(Some(&big)).unwrap();
        assert_eq!(fs::read(&module).unwrap(), first);
    }

    #[test]
    fn test_patch_rejects_malformed_module() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("imageres.dll");
        fs::write(&module, b"not a module at all").unwrap();
        let patcher = patcher_for(&module, true);

        let err = patcher.patch(None).unwrap_err();
        assert!(matches!(err, Error::MalformedModule { .. }));
        // The live module was not rewritten.
        assert_eq!(fs::read(&module).unwrap(), b"not a module at all");
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_write_leaves_module_matching_backup() {
        use std::os::unix::fs::PermissionsExt;

        // Permission bits do not bind root.
        if nix::unistd::geteuid().is_root() {
            return;
        }

        let dir = tempdir().unwrap();
        let module = dir.path().join("imageres.dll");
        let pristine = synthetic_module(5051, 1033, b"factory");
        fs::write(&module, &pristine).unwrap();
        let patcher = patcher_for(&module, true);
        patcher.backup().unwrap();

        fs::set_permissions(&module, fs::Permissions::from_mode(0o444)).unwrap();
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o555)).unwrap();

        let err = patcher.patch(None).unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();
        fs::set_permissions(&module, fs::Permissions::from_mode(0o644)).unwrap();
        assert_eq!(fs::read(&module).unwrap(), pristine);
        assert_eq!(
            fs::read(&module).unwrap(),
            fs::read(patcher.backup_path()).unwrap()
        );
    }

    #[test]
    fn test_extract_default_prefers_backup() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("imageres.dll");
        fs::write(&module, synthetic_module(5051, 1033, b"factory-chime")).unwrap();
        let patcher = patcher_for(&module, true);
        patcher.patch(None).unwrap();

        let out = dir.path().join("Startup.wav");
        patcher.extract_default(&out).unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"factory-chime");
    }

    #[test]
    fn test_restore_without_backup_is_reported() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("imageres.dll");
        fs::write(&module, synthetic_module(5051, 1033, b"factory")).unwrap();
        let patcher = patcher_for(&module, true);
        assert!(matches!(
            patcher.restore(),
            Err(Error::BackupNotFound { .. })
        ));
    }
}
