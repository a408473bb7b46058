// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use chime::hive::Hive;
use chime::host::{FixedElevation, HostProfile, StartupPatch, STARTUP_RESOURCE_ID_VISTA};
use chime::paths::RuntimeDirs;
use chime::scheme::SchemeStore;
use chime::settings::Settings;
use tempfile::TempDir;

/// Store over an in-memory hive on a host without an embedded startup sound.
///
/// Returns (TempDir, store) - keep the TempDir alive to prevent cleanup.
pub fn plain_store() -> (TempDir, SchemeStore) {
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
        Box::new(FixedElevation(false)),
    );
    (temp_dir, store)
}

/// Elevated store on a host that requires patching the given shell module.
pub fn patch_required_store(temp_dir: &TempDir, shell_module: PathBuf) -> SchemeStore {
    let dirs = RuntimeDirs::new(temp_dir.path().join("data"));
    let host = HostProfile {
        startup_patch: StartupPatch::Required {
            resource_id: STARTUP_RESOURCE_ID_VISTA,
        },
        shell_module,
        widen_read_access: false,
    };
    let mut settings = Settings::default();
    settings.patch_startup_sound = true;
    SchemeStore::new(
        Hive::in_memory(),
        dirs,
        host,
        settings,
        Box::new(FixedElevation(true)),
    )
}

/// A one-second canonical PCM sound (44.1 kHz, 16-bit mono).
pub fn pcm_wave(seconds: u32) -> Vec<u8> {
    let sample_rate: u32 = 44100;
    let byte_rate = sample_rate * 2;
    let data_len = byte_rate * seconds;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);
    bytes
}

/// Build a minimal PE32+ module whose resource section holds one WAVE payload
/// under the given id and locale, laid out the way the resource compiler does.
pub fn synthetic_shell_module(id: u32, locale: u16, payload: &[u8]) -> Vec<u8> {
    const SUBDIR_FLAG: u32 = 0x8000_0000;

    fn put_u32(buf: &mut [u8], off: usize, value: u32) {
        buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }
    fn put_u16(buf: &mut [u8], off: usize, value: u16) {
        buf[off..off + 2].copy_from_slice(&value.to_le_bytes());
    }
    fn align_up(value: usize, alignment: usize) -> usize {
        value.div_ceil(alignment) * alignment
    }

    // Resource section: root dir -> "WAVE" dir -> id dir -> locale data.
    // Three 24-byte tables at 0/24/48, the data record at 72, the name
    // string at 88, the payload 8-aligned at 104.
    let rsrc_va: u32 = 0x1000;
    let string_off = 88usize;
    let data_off = 104usize;
    let mut rsrc = vec![0u8; data_off + payload.len()];
    // Root table: one named entry pointing at the type table.
    put_u16(&mut rsrc, 12, 1);
    put_u32(&mut rsrc, 16, string_off as u32 | SUBDIR_FLAG);
    put_u32(&mut rsrc, 20, 24 | SUBDIR_FLAG);
    // Type table: one id entry pointing at the locale table.
    put_u16(&mut rsrc, 24 + 14, 1);
    put_u32(&mut rsrc, 24 + 16, id);
    put_u32(&mut rsrc, 24 + 20, 48 | SUBDIR_FLAG);
    // Locale table: one id entry pointing at the data record.
    put_u16(&mut rsrc, 48 + 14, 1);
    put_u32(&mut rsrc, 48 + 16, locale as u32);
    put_u32(&mut rsrc, 48 + 20, 72);
    // Data record.
    put_u32(&mut rsrc, 72, rsrc_va + data_off as u32);
    put_u32(&mut rsrc, 76, payload.len() as u32);
    // "WAVE" as a length-prefixed UTF-16 string.
    put_u16(&mut rsrc, string_off, 4);
    for (i, c) in "WAVE".encode_utf16().enumerate() {
        put_u16(&mut rsrc, string_off + 2 + i * 2, c);
    }
    rsrc[data_off..].copy_from_slice(payload);

    // PE wrapper: DOS header, COFF header, PE32+ optional header, one section.
    let raw_size = align_up(rsrc.len(), 0x200);
    let mut image = vec![0u8; 0x200 + raw_size];
    image[..2].copy_from_slice(b"MZ");
    put_u32(&mut image, 0x3c, 0x40);
    image[0x40..0x44].copy_from_slice(b"PE\0\0");
    let coff = 0x44;
    put_u16(&mut image, coff, 0x8664);
    put_u16(&mut image, coff + 2, 1); // one section
    put_u16(&mut image, coff + 16, 240); // optional header size

    let opt = coff + 20;
    put_u16(&mut image, opt, 0x20b);
    put_u32(&mut image, opt + 32, 0x1000); // SectionAlignment
    put_u32(&mut image, opt + 36, 0x200); // FileAlignment
    put_u32(&mut image, opt + 56, 0x1000 + align_up(rsrc.len(), 0x1000) as u32);
    put_u32(&mut image, opt + 60, 0x200); // SizeOfHeaders
    put_u32(&mut image, opt + 108, 16); // NumberOfRvaAndSizes
    put_u32(&mut image, opt + 112 + 16, rsrc_va); // resource directory RVA
    put_u32(&mut image, opt + 112 + 20, rsrc.len() as u32);

    let header = opt + 240;
    image[header..header + 8].copy_from_slice(b".rsrc\0\0\0");
    put_u32(&mut image, header + 8, rsrc.len() as u32);
    put_u32(&mut image, header + 12, rsrc_va);
    put_u32(&mut image, header + 16, raw_size as u32);
    put_u32(&mut image, header + 20, 0x200);
    put_u32(&mut image, header + 36, 0x4000_0040);

    image[0x200..0x200 + rsrc.len()].copy_from_slice(&rsrc);
    image
}
