// tests/archive_roundtrip.rs

//! Portable archive export/import tests, including proprietary conversion.

mod common;

use std::fs;
use std::io::Write;

use chime::archive::{self, SchemeMeta};
use chime::events::SoundEvent;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

#[test]
fn test_export_import_preserves_sounds_and_metadata() {
    let (temp_a, mut store_a) = common::plain_store();
    store_a.setup().unwrap();

    let source = temp_a.path().join("chord.wav");
    fs::write(&source, common::pcm_wave(1)).unwrap();
    for id in ["Startup", "Logon", "RecycleBin"] {
        let event = SoundEvent::by_id(id).unwrap();
        store_a.update(event, Some(&source)).unwrap();
    }
    SchemeMeta::new("Ocean", "Iris", "Recorded at the shore")
        .save(store_a.dirs())
        .unwrap();

    let archive_path = temp_a.path().join("ocean.chs");
    archive::export(&store_a, &archive_path).unwrap();

    let (_temp_b, mut store_b) = common::plain_store();
    store_b.setup().unwrap();
    archive::import(&mut store_b, &archive_path).unwrap();

    for id in ["Startup", "Logon", "RecycleBin"] {
        let event = SoundEvent::by_id(id).unwrap();
        assert_eq!(
            fs::read(store_b.dirs().media_path(event)).unwrap(),
            common::pcm_wave(1)
        );
        // Import applies the managed scheme.
        assert_eq!(
            store_b.current_file(event).unwrap(),
            store_b.dirs().media_path(event)
        );
    }
    assert_eq!(
        SchemeMeta::load(store_b.dirs()).unwrap(),
        SchemeMeta::new("Ocean", "Iris", "Recorded at the shore")
    );
}

#[test]
fn test_import_clears_events_absent_from_archive() {
    let (temp_dir, mut store) = common::plain_store();
    store.setup().unwrap();

    let source = temp_dir.path().join("chord.wav");
    fs::write(&source, common::pcm_wave(1)).unwrap();
    let stale = SoundEvent::by_id("Print").unwrap();
    store.update(stale, Some(&source)).unwrap();

    let archive_path = temp_dir.path().join("only-default.chs");
    {
        let out = fs::File::create(&archive_path).unwrap();
        let mut writer = ZipWriter::new(out);
        writer
            .start_file("Default.wav", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(&common::pcm_wave(1)).unwrap();
        writer.finish().unwrap();
    }

    archive::import(&mut store, &archive_path).unwrap();
    assert!(!store.dirs().media_path(stale).is_file());
    let default = SoundEvent::by_id("Default").unwrap();
    assert!(store.dirs().media_path(default).is_file());
}

#[test]
fn test_import_reads_legacy_localized_entries() {
    let (temp_dir, mut store) = common::plain_store();
    store.setup().unwrap();

    let archive_path = temp_dir.path().join("retro.chs");
    {
        let out = fs::File::create(&archive_path).unwrap();
        let mut writer = ZipWriter::new(out);
        let options = SimpleFileOptions::default();
        writer
            .start_file("Windows XP Démarrage.wav", options)
            .unwrap();
        writer.write_all(&common::pcm_wave(1)).unwrap();
        writer.start_file("infos.ini", options).unwrap();
        writer
            .write_all("nom=Rétro;auteur=JB;commentaire=Époque XP".as_bytes())
            .unwrap();
        writer.finish().unwrap();
    }

    archive::import(&mut store, &archive_path).unwrap();
    let startup = SoundEvent::by_id("Startup").unwrap();
    // Stored under the canonical name, not the legacy one.
    assert!(store.dirs().media_path(startup).is_file());
    let meta = SchemeMeta::load(store.dirs()).unwrap();
    assert_eq!(meta.name, "Rétro");
    assert_eq!(meta.author, "JB");
}
