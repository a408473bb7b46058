// src/scheme/mod.rs

//! Layered scheme store
//!
//! Owns the per-event overlay layers and the publish step. Layers live in the
//! hive under `AppEvents\Schemes`; `apply` projects one layer (with optional
//! default-layer fallback) into the per-event `.Current` pointers the host
//! consumes. The store drives [`crate::patcher::ResourcePatcher`] for the one
//! event whose factory sound is embedded in the shell module.
//!
//! Per-event state machine: no entry -> managed file present -> (startup event
//! only) patched into the module resource. `.Current` is a derived projection
//! recomputed by `apply`, never part of that machine.

mod transcode;
pub mod wave;

pub use transcode::Transcoder;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use md5::{Digest, Md5};

use crate::events::{EventRole, FactorySource, SoundEvent};
use crate::hive::Hive;
use crate::host::{self, Elevation, HostProfile, STARTUP_RESOURCE_LOCALE};
use crate::patcher::ResourcePatcher;
use crate::paths::{ExpandablePath, RuntimeDirs};
use crate::settings::Settings;
use crate::{Error, Result};

/// Factory default layer name.
pub const SCHEME_DEFAULT: &str = ".Default";

/// Resolved-pointer layer name.
pub const SCHEME_CURRENT: &str = ".Current";

/// The layer this application owns and freely rewrites.
pub const MANAGED_SCHEME: &str = crate::APP_INTERNAL_NAME;

const REG_SCHEMES: &str = "AppEvents\\Schemes";
const REG_NAMES: &str = "AppEvents\\Schemes\\Names";
const REG_APPS: &str = "AppEvents\\Schemes\\Apps";

/// MD5 of the factory startup sound shipped by the embedding host
/// generations; too common to be worth playing as a scheme preview.
const FACTORY_STARTUP_FINGERPRINT: &str = "155f2a0f886570157416ea85f4b4c613";

/// A named overlay layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheme {
    internal_name: String,
    display_name: String,
}

impl Scheme {
    pub fn new(internal_name: impl Into<String>, display_name: impl Into<String>) -> Scheme {
        Scheme {
            internal_name: internal_name.into(),
            display_name: display_name.into(),
        }
    }

    /// The factory default layer.
    pub fn default_scheme() -> Scheme {
        Scheme::new(SCHEME_DEFAULT, SCHEME_DEFAULT)
    }

    /// The managed layer.
    pub fn managed() -> Scheme {
        Scheme::new(MANAGED_SCHEME, crate::APP_DISPLAY_NAME)
    }

    pub fn internal_name(&self) -> &str {
        &self.internal_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// The layered overlay store and its operations.
pub struct SchemeStore {
    hive: Hive,
    dirs: RuntimeDirs,
    host: HostProfile,
    settings: Settings,
    elevation: Box<dyn Elevation>,
    transcoder: Option<Box<dyn Transcoder>>,
}

impl SchemeStore {
    pub fn new(
        hive: Hive,
        dirs: RuntimeDirs,
        host: HostProfile,
        settings: Settings,
        elevation: Box<dyn Elevation>,
    ) -> SchemeStore {
        SchemeStore {
            hive,
            dirs,
            host,
            settings,
            elevation,
            transcoder: None,
        }
    }

    /// Attach a host transcoder capability.
    pub fn with_transcoder(mut self, transcoder: Box<dyn Transcoder>) -> SchemeStore {
        self.transcoder = Some(transcoder);
        self
    }

    pub fn dirs(&self) -> &RuntimeDirs {
        &self.dirs
    }

    pub fn host(&self) -> &HostProfile {
        &self.host
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn hive(&self) -> &Hive {
        &self.hive
    }

    fn names_key(scheme: &str) -> String {
        format!("{REG_NAMES}\\{scheme}")
    }

    fn entry_key(registry_path: &str, scheme: &str) -> String {
        format!("{REG_APPS}\\{registry_path}\\{scheme}")
    }

    /// Patcher for the embedded startup sound, when this host has one.
    pub fn patcher(&self) -> Result<ResourcePatcher> {
        let Some(resource_id) = self.host.startup_resource_id() else {
            return Err(Error::PatchingUnsupported);
        };
        Ok(ResourcePatcher::new(
            self.host.shell_module.clone(),
            resource_id,
            STARTUP_RESOURCE_LOCALE,
            self.elevation.is_elevated(),
        ))
    }

    /// Register the managed layer and write its overlay entry for every event.
    ///
    /// Entries are written whether or not the canonical file exists yet; the
    /// existence check happens at apply time. On hosts that require the
    /// embedded-resource patch, a one-time module backup is attempted when
    /// rights permit; failure here is tolerated and surfaced again on an
    /// explicit patch operation.
    pub fn setup(&mut self) -> Result<()> {
        self.hive
            .set(&Self::names_key(MANAGED_SCHEME), crate::APP_DISPLAY_NAME);
        for event in SoundEvent::all() {
            let media_path = self.dirs.media_path(event);
            for registry_path in event.registry_paths {
                self.hive.set(
                    &Self::entry_key(registry_path, MANAGED_SCHEME),
                    media_path.to_string_lossy(),
                );
            }
        }
        self.hive.save()?;

        if self.host.patch_required() && self.elevation.is_elevated() {
            if let Err(err) = self.patcher()?.backup() {
                warn!("module backup during setup failed (will retry on patch): {err}");
            }
        }
        Ok(())
    }

    /// Remove the sound associated with an event from the managed layer.
    pub fn remove(&mut self, event: &SoundEvent) -> Result<()> {
        self.update(event, None)
    }

    /// Central write path: install `source` as the event's managed sound.
    ///
    /// - `None` or a missing source deletes the canonical file.
    /// - The event's own canonical path is a refresh: no copy, but the
    ///   embedded-resource and read-permission steps still run.
    /// - A canonical-format source is copied byte-for-byte; anything else is
    ///   transcoded when the host can, else deleted with a capability error.
    pub fn update(&mut self, event: &SoundEvent, source: Option<&Path>) -> Result<()> {
        let canonical = self.dirs.media_path(event);
        let refresh = source == Some(canonical.as_path());

        if !refresh {
            match source {
                Some(src) if src.is_file() => self.install_file(src, &canonical)?,
                _ => remove_existing(&canonical)?,
            }
        }

        if event.factory == FactorySource::ShellModuleResource
            && self.host.patch_required()
            && self.settings.patch_startup_sound
        {
            if !self.elevation.is_elevated() {
                return Err(Error::ElevationRequired {
                    operation: "patch the embedded startup sound",
                });
            }
            let replacement = canonical.is_file().then(|| canonical.clone());
            self.patcher()?.patch(replacement.as_deref())?;
        }

        if self.host.widen_read_access && canonical.is_file() {
            host::widen_read_access(&canonical)?;
        }
        Ok(())
    }

    fn install_file(&self, source: &Path, canonical: &Path) -> Result<()> {
        fs::create_dir_all(&self.dirs.media_dir)?;

        // Duration ceiling, checked before any write.
        if let Some(transcoder) = &self.transcoder {
            let duration = transcoder.probe_duration(source)?;
            if duration > wave::MAX_SOUND_DURATION {
                return Err(Error::SoundTooLong {
                    seconds: duration.as_secs(),
                    limit: wave::MAX_SOUND_DURATION.as_secs(),
                });
            }
        }

        match wave::probe(source)? {
            Some(info) if info.is_canonical() => {
                fs::copy(source, canonical)?;
                Ok(())
            }
            _ => match &self.transcoder {
                Some(transcoder) => {
                    if let Err(err) = transcoder.transcode_to_wave(source, canonical) {
                        // Never leave a half-written canonical file behind.
                        remove_existing(canonical)?;
                        return Err(err);
                    }
                    Ok(())
                }
                None => {
                    remove_existing(canonical)?;
                    Err(Error::TranscodingUnavailable)
                }
            },
        }
    }

    /// Copy an event's sound from another layer (the default layer unless a
    /// source scheme is given) into the managed layer.
    pub fn copy_default(&mut self, event: &SoundEvent, source: Option<&Scheme>) -> Result<()> {
        let source_layer = source
            .map(|s| s.internal_name.clone())
            .unwrap_or_else(|| SCHEME_DEFAULT.to_string());

        let mut found = false;
        for registry_path in event.registry_paths {
            if let Some(value) = self.hive.get(&Self::entry_key(registry_path, &source_layer)) {
                let resolved = ExpandablePath::new(value).resolve();
                if resolved.is_file() {
                    self.update(event, Some(&resolved))?;
                    found = true;
                    break;
                }
            }
        }

        if event.factory == FactorySource::ShellModuleResource && self.host.patch_required() {
            // The factory sound lives in the module: pull it from the backup
            // (after restoring the live module when rights permit).
            if self.elevation.is_elevated() {
                if let Err(err) = self.patcher()?.restore() {
                    warn!("module restore during copy-default failed: {err}");
                }
            }
            fs::create_dir_all(&self.dirs.media_dir)?;
            self.patcher()?.extract_default(&self.dirs.media_path(event))?;
        } else if !found {
            self.remove(event)?;
        }
        Ok(())
    }

    /// Project `scheme` into the `.Current` layer, event by event.
    ///
    /// Resolution is independent per event: the scheme's entry if its file
    /// exists, else (when `missing_use_default`) the default layer's entry,
    /// else cleared. Walks the whole `Apps` tree so pre-existing third-party
    /// events resolve too.
    pub fn apply(&mut self, scheme: &Scheme, missing_use_default: bool) -> Result<()> {
        let name = scheme.internal_name.as_str();
        if name != SCHEME_DEFAULT && !self.hive.exists(&Self::names_key(name)) {
            return Err(Error::UnknownScheme {
                name: name.to_string(),
            });
        }

        for app in self.hive.subkeys(REG_APPS) {
            for sound in self.hive.subkeys(&format!("{REG_APPS}\\{app}")) {
                let base = format!("{REG_APPS}\\{app}\\{sound}");
                let mut resolved = self
                    .hive
                    .get(&format!("{base}\\{name}"))
                    .map(str::to_string);

                let missing = resolved.as_deref().map_or(true, entry_file_missing);
                if missing && missing_use_default {
                    resolved = self
                        .hive
                        .get(&format!("{base}\\{SCHEME_DEFAULT}"))
                        .map(str::to_string);
                }
                if resolved.as_deref().map_or(false, entry_file_missing) {
                    resolved = None;
                }

                self.hive
                    .set(&format!("{base}\\{SCHEME_CURRENT}"), resolved.unwrap_or_default());
            }
        }

        self.hive.set(REG_SCHEMES, name);
        self.hive.save()
    }

    /// Remove the managed layer from the store; restore the shell module on
    /// hosts where the startup sound was patched into it.
    pub fn uninstall(&mut self) -> Result<()> {
        if self.hive.get(REG_SCHEMES) == Some(MANAGED_SCHEME) {
            self.apply(&Scheme::default_scheme(), true)?;
        }

        for app in self.hive.subkeys(REG_APPS) {
            for sound in self.hive.subkeys(&format!("{REG_APPS}\\{app}")) {
                self.hive
                    .delete(&format!("{REG_APPS}\\{app}\\{sound}\\{MANAGED_SCHEME}"));
            }
        }
        self.hive.delete(&Self::names_key(MANAGED_SCHEME));
        self.hive.save()?;

        if self.host.patch_required() && self.elevation.is_elevated() {
            if let Err(err) = self.patcher()?.restore() {
                // No backup to restore, or the module is still locked; the
                // uninstall itself has succeeded.
                warn!("module restore during uninstall failed: {err}");
            }
        }
        Ok(())
    }

    /// Resolved sound path the host currently plays for `event`, if any.
    pub fn current_file(&self, event: &SoundEvent) -> Option<PathBuf> {
        for registry_path in event.registry_paths {
            if let Some(value) = self.hive.get(&Self::entry_key(registry_path, SCHEME_CURRENT)) {
                if value.is_empty() {
                    continue;
                }
                let resolved = ExpandablePath::new(value).resolve();
                if resolved.is_file() {
                    return Some(resolved);
                }
            }
        }
        None
    }

    /// All layers registered in the store.
    pub fn schemes(&self) -> Vec<Scheme> {
        self.hive
            .subkeys(REG_NAMES)
            .into_iter()
            .map(|internal| {
                let display = match self.hive.get(&Self::names_key(&internal)) {
                    // Indirect resource strings are unreadable here; show the key.
                    Some(d) if !d.trim().is_empty() && !d.starts_with('@') => d.to_string(),
                    _ => internal.clone(),
                };
                Scheme::new(internal, display)
            })
            .collect()
    }

    /// Look up a registered scheme by internal name.
    pub fn scheme_by_name(&self, name: &str) -> Result<Scheme> {
        if name == SCHEME_DEFAULT {
            return Ok(Scheme::default_scheme());
        }
        self.schemes()
            .into_iter()
            .find(|s| s.internal_name == name)
            .ok_or_else(|| Error::UnknownScheme {
                name: name.to_string(),
            })
    }

    /// Pick the event whose sound a scheme load should play:
    /// LoadScheme when present and enabled; Logon for schemes lacking a
    /// startup sound; Logon again when the startup sound is the factory one
    /// (too common to be a useful preview); else Startup.
    pub fn load_sound_event(&self) -> &'static SoundEvent {
        let load = SoundEvent::by_role(EventRole::LoadScheme);
        let startup = SoundEvent::by_role(EventRole::Startup);
        let logon = SoundEvent::by_role(EventRole::Logon);

        if let Some(load) = load {
            if self.dirs.media_path(load).is_file() && !self.settings.is_disabled(load) {
                return load;
            }
        }
        let (Some(startup), Some(logon)) = (startup, logon) else {
            // The catalog always carries both roles.
            return startup.or(logon).or(load).unwrap_or(&SoundEvent::all()[0]);
        };

        let startup_file = self.dirs.media_path(startup);
        if !startup_file.is_file() && !self.settings.is_disabled(logon) {
            return logon;
        }
        if let Ok(data) = fs::read(&startup_file) {
            let digest = hex::encode(Md5::digest(&data));
            if digest == FACTORY_STARTUP_FINGERPRINT {
                return logon;
            }
        }
        startup
    }
}

fn entry_file_missing(entry: &str) -> bool {
    entry.is_empty() || !ExpandablePath::new(entry).resolve().is_file()
}

fn remove_existing(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            debug!("could not remove '{}': {err}", path.display());
            Err(err.into())
        }
    }
}
