// tests/patching.rs

//! Startup sound patching workflow against a synthetic shell module.

mod common;

use std::fs;
use std::path::PathBuf;

use chime::events::SoundEvent;
use chime::hive::Hive;
use chime::host::{FixedElevation, HostProfile, StartupPatch, STARTUP_RESOURCE_ID_VISTA};
use chime::paths::RuntimeDirs;
use chime::scheme::SchemeStore;
use chime::settings::Settings;
use chime::Error;

#[test]
fn test_patch_applied_on_update_and_reverted_on_uninstall() {
    let temp_dir = tempfile::tempdir().unwrap();
    let module = temp_dir.path().join("imageres.dll");
    let pristine =
        common::synthetic_shell_module(STARTUP_RESOURCE_ID_VISTA, 1033, b"factory-chime");
    fs::write(&module, &pristine).unwrap();

    let mut store = common::patch_required_store(&temp_dir, module.clone());
    store.setup().unwrap();
    // Setup takes the one-time pristine backup.
    assert!(module.with_file_name("imageres.dll.bak").is_file());

    let source = temp_dir.path().join("chord.wav");
    fs::write(&source, common::pcm_wave(1)).unwrap();
    let startup = SoundEvent::by_id("Startup").unwrap();
    store.update(startup, Some(&source)).unwrap();
    assert_ne!(fs::read(&module).unwrap(), pristine);

    store.uninstall().unwrap();
    assert_eq!(fs::read(&module).unwrap(), pristine);
}

#[test]
fn test_copy_default_recovers_factory_sound_from_module() {
    let temp_dir = tempfile::tempdir().unwrap();
    let module = temp_dir.path().join("imageres.dll");
    let pristine =
        common::synthetic_shell_module(STARTUP_RESOURCE_ID_VISTA, 1033, b"factory-chime");
    fs::write(&module, &pristine).unwrap();

    let mut store = common::patch_required_store(&temp_dir, module.clone());
    store.setup().unwrap();

    let source = temp_dir.path().join("chord.wav");
    fs::write(&source, common::pcm_wave(1)).unwrap();
    let startup = SoundEvent::by_id("Startup").unwrap();
    store.update(startup, Some(&source)).unwrap();

    store.copy_default(startup, None).unwrap();
    // The canonical file now holds the factory payload and the module is
    // back to its pristine bytes.
    assert_eq!(
        fs::read(store.dirs().media_path(startup)).unwrap(),
        b"factory-chime"
    );
    assert_eq!(fs::read(&module).unwrap(), pristine);
}

#[test]
fn test_unelevated_startup_update_reports_privilege() {
    let temp_dir = tempfile::tempdir().unwrap();
    let module = temp_dir.path().join("imageres.dll");
    let pristine =
        common::synthetic_shell_module(STARTUP_RESOURCE_ID_VISTA, 1033, b"factory-chime");
    fs::write(&module, &pristine).unwrap();

    let dirs = RuntimeDirs::new(temp_dir.path().join("data"));
    let host = HostProfile {
        startup_patch: StartupPatch::Required {
            resource_id: STARTUP_RESOURCE_ID_VISTA,
        },
        shell_module: module.clone(),
        widen_read_access: false,
    };
    let mut settings = Settings::default();
    settings.patch_startup_sound = true;
    let mut store = SchemeStore::new(
        Hive::in_memory(),
        dirs,
        host,
        settings,
        Box::new(FixedElevation(false)),
    );
    store.setup().unwrap();

    let source = temp_dir.path().join("chord.wav");
    fs::write(&source, common::pcm_wave(1)).unwrap();
    let startup = SoundEvent::by_id("Startup").unwrap();
    let err = store.update(startup, Some(&source)).unwrap_err();
    assert!(matches!(err, Error::ElevationRequired { .. }));
    // The module was never touched without rights.
    assert_eq!(fs::read(&module).unwrap(), pristine);
}

#[test]
fn test_patcher_unsupported_on_plain_host() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dirs = RuntimeDirs::new(temp_dir.path().join("data"));
    let host = HostProfile {
        startup_patch: StartupPatch::NotPossible,
        shell_module: PathBuf::new(),
        widen_read_access: false,
    };
    let store = SchemeStore::new(
        Hive::in_memory(),
        dirs,
        host,
        Settings::default(),
        Box::new(FixedElevation(true)),
    );
    assert!(matches!(store.patcher(), Err(Error::PatchingUnsupported)));
}
