// src/archive/proprietary.rs

//! Decode-only converter for a legacy encrypted scheme container
//!
//! Interoperability shim for a third-party format: an AES-128-CBC layer over
//! a ZIP archive, whose metadata entry is base64 text wrapping a 3DES-CBC
//! encrypted XML index. Decryption here exists solely so user-supplied files
//! of that format can be imported; producing such files is out of scope.
//!
//! The XML index maps hive paths to archive entry names; sounds are matched
//! through the event catalog's registry paths and repacked into the portable
//! format. Source entries the index never claims are carried along under an
//! `_unused_` prefix so no user data is dropped.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use aes::cipher::block_padding::{Iso10126, Pkcs7};
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use base64::Engine;
use log::{debug, info};
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use super::meta::SchemeMeta;
use crate::events::SoundEvent;
use crate::{Error, Result};

/// File extension of the proprietary container.
pub const PROPRIETARY_EXT: &str = "soundpack";

const METADATA_ENTRY: &str = "soundpackage.data";
const UNUSED_PREFIX: &str = "_unused_";

// Outer layer: AES-128-CBC with ISO 10126 padding over the whole ZIP stream.
const ZIP_AES_KEY: [u8; 16] = [
    0x43, 0x6f, 0x70, 0x79, 0x72, 0x69, 0x67, 0x68, 0x74, 0x3f, 0x53, 0x74, 0x61, 0x72, 0x64,
    0x6f,
];
const ZIP_AES_IV: [u8; 16] = [
    0x7d, 0x2a, 0x7e, 0x61, 0x70, 0x3f, 0x3f, 0x3f, 0x53, 0x74, 0x61, 0x72, 0x64, 0x6f, 0x63,
    0x6b,
];

// Inner layer: 3DES-CBC with PKCS7 padding over the XML index.
const XML_3DES_KEY: [u8; 24] = [
    0x3f, 0x43, 0x6f, 0x70, 0x79, 0x72, 0x69, 0x67, 0x68, 0x74, 0x53, 0x74, 0x61, 0x72, 0x64,
    0x6f, 0x63, 0x6b, 0x32, 0x30, 0x30, 0x38, 0x3f, 0x3f,
];
const XML_3DES_IV: [u8; 8] = [0x7d, 0x6c, 0x60, 0x3f, 0x2a, 0x7e, 0x61, 0x70];

type AesCbcDec = cbc::Decryptor<aes::Aes128>;
type TdesCbcDec = cbc::Decryptor<des::TdesEde3>;

pub fn is_proprietary(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(PROPRIETARY_EXT))
        .unwrap_or(false)
}

fn malformed(path: &Path, reason: impl Into<String>) -> Error {
    Error::MalformedArchive {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Convert a proprietary container into a portable scheme archive at
/// `outfile`.
pub fn convert(infile: &Path, outfile: &Path) -> Result<()> {
    let raw = fs::read(infile)?;

    // Some distributions ship the inner ZIP unencrypted; probe before
    // decrypting.
    let plain = match ZipArchive::new(Cursor::new(raw.as_slice())) {
        Ok(_) => raw,
        Err(_) => {
            debug!("outer layer is encrypted, applying AES");
            AesCbcDec::new(&ZIP_AES_KEY.into(), &ZIP_AES_IV.into())
                .decrypt_padded_vec_mut::<Iso10126>(&raw)
                .map_err(|_| malformed(infile, "outer encryption layer did not decrypt"))?
        }
    };

    let mut archive = ZipArchive::new(Cursor::new(plain.as_slice()))
        .map_err(|err| malformed(infile, format!("not a ZIP container: {err}")))?;

    let xml_text = read_metadata_xml(infile, &mut archive)?;
    let index = parse_index(&xml_text)?;

    let name = index.child_text(&["name"]).unwrap_or_default();
    let author = index.child_text(&["author"]).unwrap_or_default();
    let about = index
        .child_text(&["notes"])
        .or_else(|| index.child_text(&["website"]))
        .or_else(|| index.child_text(&["email"]))
        .or_else(|| index.child_text(&["copyright"]))
        .unwrap_or_default();
    let thumbnail = index.child_text(&["preview", "icon"]);

    // Destination entry name -> source entry name, insertion-ordered.
    let mut files_to_copy: Vec<(String, String)> = Vec::new();
    let mut claimed: Vec<String> = Vec::new();

    if let Some(thumbnail) = thumbnail.filter(|t| !t.is_empty()) {
        files_to_copy.push((crate::paths::SCHEME_IMAGE_FILE.to_string(), thumbnail.clone()));
        claimed.push(thumbnail);
    }

    if let Some(groups) = index.child(&["groups"]) {
        for event in SoundEvent::all() {
            for registry_path in event.registry_paths {
                let steps: Vec<&str> = registry_path.split('\\').collect();
                if let Some(file_name) = groups.grouped_text(&steps) {
                    if !file_name.is_empty() {
                        files_to_copy.push((event.file_name(), file_name.clone()));
                        claimed.push(file_name);
                        break;
                    }
                }
            }
        }
    }

    let entry_names: Vec<String> = archive.file_names().map(str::to_string).collect();
    for entry in &entry_names {
        if !claimed.contains(entry) {
            files_to_copy.push((format!("{UNUSED_PREFIX}{entry}"), entry.clone()));
        }
    }

    let out = fs::File::create(outfile)?;
    let mut writer = ZipWriter::new(out);
    let options = SimpleFileOptions::default();
    for (dest, source) in &files_to_copy {
        // The index may reference entries that are not in the container.
        let Some(actual) = entry_names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(source))
            .cloned()
        else {
            debug!("index references missing entry '{source}', skipping");
            continue;
        };
        let mut entry = archive.by_name(&actual)?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        writer.start_file(dest.as_str(), options)?;
        writer.write_all(&bytes)?;
    }

    let meta = SchemeMeta::new(name, author, about);
    writer.start_file(crate::paths::SCHEME_INFO_FILE, options)?;
    writer.write_all(meta.serialize().as_bytes())?;
    writer.start_file(format!("{UNUSED_PREFIX}{METADATA_ENTRY}.xml"), options)?;
    writer.write_all(xml_text.as_bytes())?;
    writer.finish()?;

    info!(
        "converted proprietary archive '{}' ({} entries) to '{}'",
        infile.display(),
        files_to_copy.len(),
        outfile.display()
    );
    Ok(())
}

/// Pull the metadata entry out of the container and peel its base64 and 3DES
/// layers.
fn read_metadata_xml(infile: &Path, archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<String> {
    let entry_name = archive
        .file_names()
        .find(|n| n.eq_ignore_ascii_case(METADATA_ENTRY))
        .map(str::to_string)
        .ok_or_else(|| malformed(infile, format!("missing '{METADATA_ENTRY}' entry")))?;

    let mut text = String::new();
    archive.by_name(&entry_name)?.read_to_string(&mut text)?;

    // Transport mangling turns '+' into spaces; line breaks are decoration.
    let cleaned: String = text
        .chars()
        .map(|c| if c == ' ' { '+' } else { c })
        .filter(|c| !matches!(c, '\r' | '\n' | '\t'))
        .collect();
    let encrypted = base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|err| malformed(infile, format!("metadata entry is not base64: {err}")))?;

    let decrypted = TdesCbcDec::new(&XML_3DES_KEY.into(), &XML_3DES_IV.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&encrypted)
        .map_err(|_| malformed(infile, "metadata entry did not decrypt"))?;

    Ok(String::from_utf8_lossy(&decrypted).into_owned())
}

/// Minimal owned XML tree; the index is small and read twice (by tag path and
/// by `name` attribute), which a streaming pass handles poorly.
#[derive(Debug, Default)]
struct XmlNode {
    tag: String,
    name_attr: Option<String>,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    /// All descendant text, concatenated in document order.
    fn inner_text(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.inner_text());
        }
        out
    }

    fn child(&self, path: &[&str]) -> Option<&XmlNode> {
        let mut node = self;
        for step in path {
            node = node.children.iter().find(|c| c.tag == *step)?;
        }
        Some(node)
    }

    fn child_text(&self, path: &[&str]) -> Option<String> {
        self.child(path).map(XmlNode::inner_text)
    }

    /// Walk children by their `name` attribute, one step per path element.
    fn grouped_text(&self, path: &[&str]) -> Option<String> {
        let mut node = self;
        for step in path {
            node = node
                .children
                .iter()
                .find(|c| c.name_attr.as_deref() == Some(*step))?;
        }
        Some(node.inner_text())
    }
}

/// Parse the metadata XML, retrying with bare ampersands escaped; indexes in
/// the wild embed unescaped entities in free-text fields.
fn parse_index(text: &str) -> Result<XmlNode> {
    match parse_tree(text) {
        Ok(root) => Ok(root),
        Err(first) => match parse_tree(&text.replace('&', "&amp;")) {
            Ok(root) => Ok(root),
            Err(_) => Err(Error::MalformedXml { reason: first }),
        },
    }
}

fn parse_tree(text: &str) -> std::result::Result<XmlNode, String> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<XmlNode> = vec![XmlNode::default()];

    loop {
        match reader.read_event().map_err(|err| err.to_string())? {
            Event::Start(start) => {
                stack.push(node_from_start(&start)?);
            }
            Event::Empty(start) => {
                let node = node_from_start(&start)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Event::End(_) => {
                let node = stack.pop().ok_or("unbalanced closing tag")?;
                stack
                    .last_mut()
                    .ok_or("closing tag at document root")?
                    .children
                    .push(node);
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(|err| err.to_string())?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(value.trim());
                }
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let document = stack.pop().ok_or("empty document")?;
    if !stack.is_empty() {
        return Err("unclosed element at end of document".to_string());
    }
    document
        .children
        .into_iter()
        .find(|n| !n.tag.is_empty())
        .ok_or_else(|| "document has no root element".to_string())
}

fn node_from_start(
    start: &quick_xml::events::BytesStart<'_>,
) -> std::result::Result<XmlNode, String> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut name_attr = None;
    for attr in start.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        if attr.key.as_ref() == b"name" {
            let value = attr.unescape_value().map_err(|err| err.to_string())?;
            name_attr = Some(value.into_owned());
        }
    }
    Ok(XmlNode {
        tag,
        name_attr,
        text: String::new(),
        children: Vec::new(),
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const INDEX_XML: &str = r#"<?xml version="1.0"?>
<soundpackage>
  <name>Ocean Pack</name>
  <author>Iris &amp; Co</author>
  <notes>Recorded at the shore</notes>
  <preview><icon>cover.png</icon></preview>
  <groups>
    <group name=".Default">
      <group name="SystemStart">startup.wav</group>
      <group name=".Default">ding.wav</group>
    </group>
    <group name="Explorer">
      <group name="EmptyRecycleBin">bin.wav</group>
    </group>
  </groups>
</soundpackage>"#;

    fn converted_names(outfile: &Path) -> Vec<String> {
        let file = fs::File::open(outfile).unwrap();
        let archive = ZipArchive::new(file).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn test_is_proprietary_by_extension() {
        assert!(is_proprietary(Path::new("pack.soundpack")));
        assert!(is_proprietary(Path::new("PACK.SOUNDPACK")));
        assert!(!is_proprietary(Path::new("pack.chs")));
        assert!(!is_proprietary(Path::new("soundpack")));
    }

    #[test]
    fn test_convert_maps_events_and_preserves_unused() {
        let dir = tempdir().unwrap();
        let infile = dir.path().join("ocean.soundpack");
        let container = testutil::build_container(
            INDEX_XML,
            &[
                ("startup.wav", b"wave-startup"),
                ("ding.wav", b"wave-ding"),
                ("bin.wav", b"wave-bin"),
                ("cover.png", b"png-bytes"),
                ("readme.txt", b"hello"),
            ],
            true,
        );
        fs::write(&infile, container).unwrap();

        let outfile = dir.path().join("ocean.chs");
        convert(&infile, &outfile).unwrap();

        let names = converted_names(&outfile);
        assert!(names.contains(&"Startup.wav".to_string()));
        assert!(names.contains(&"Default.wav".to_string()));
        assert!(names.contains(&"RecycleBin.wav".to_string()));
        assert!(names.contains(&"Scheme.png".to_string()));
        assert!(names.contains(&"Scheme.ini".to_string()));
        // Unclaimed entries ride along; claimed ones do not get duplicated.
        assert!(names.contains(&"_unused_readme.txt".to_string()));
        assert!(names.contains(&"_unused_soundpackage.data.xml".to_string()));
        assert!(!names.contains(&"_unused_startup.wav".to_string()));

        let file = fs::File::open(&outfile).unwrap();
        let mut archive = ZipArchive::new(file).unwrap();
        let mut info = String::new();
        archive
            .by_name("Scheme.ini")
            .unwrap()
            .read_to_string(&mut info)
            .unwrap();
        let meta = SchemeMeta::parse(&info);
        assert_eq!(meta.name, "Ocean Pack");
        assert_eq!(meta.author, "Iris & Co");
        assert_eq!(meta.about, "Recorded at the shore");
    }

    #[test]
    fn test_convert_accepts_unencrypted_outer_layer() {
        let dir = tempdir().unwrap();
        let infile = dir.path().join("plain.soundpack");
        let container =
            testutil::build_container(INDEX_XML, &[("startup.wav", b"wave")], false);
        fs::write(&infile, container).unwrap();

        let outfile = dir.path().join("plain.chs");
        convert(&infile, &outfile).unwrap();
        assert!(converted_names(&outfile).contains(&"Startup.wav".to_string()));
    }

    #[test]
    fn test_convert_recovers_from_bare_ampersands() {
        let dir = tempdir().unwrap();
        let infile = dir.path().join("amp.soundpack");
        let xml = "<soundpackage><name>Rock & Roll</name><groups/></soundpackage>";
        let container = testutil::build_container(xml, &[], true);
        fs::write(&infile, container).unwrap();

        let outfile = dir.path().join("amp.chs");
        convert(&infile, &outfile).unwrap();

        let file = fs::File::open(&outfile).unwrap();
        let mut archive = ZipArchive::new(file).unwrap();
        let mut info = String::new();
        archive
            .by_name("Scheme.ini")
            .unwrap()
            .read_to_string(&mut info)
            .unwrap();
        assert_eq!(SchemeMeta::parse(&info).name, "Rock & Roll");
    }

    #[test]
    fn test_convert_without_index_is_rejected() {
        let dir = tempdir().unwrap();
        let infile = dir.path().join("noindex.soundpack");
        let mut zip_bytes = Vec::new();
        {
            let mut writer = ZipWriter::new(Cursor::new(&mut zip_bytes));
            writer
                .start_file("startup.wav", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"wave").unwrap();
            writer.finish().unwrap();
        }
        fs::write(&infile, zip_bytes).unwrap();

        let err = convert(&infile, &dir.path().join("out.chs")).unwrap_err();
        assert!(matches!(err, Error::MalformedArchive { .. }));
    }

    #[test]
    fn test_garbage_input_is_rejected() {
        let dir = tempdir().unwrap();
        let infile = dir.path().join("garbage.soundpack");
        fs::write(&infile, b"not an archive at all").unwrap();
        let err = convert(&infile, &dir.path().join("out.chs")).unwrap_err();
        assert!(matches!(err, Error::MalformedArchive { .. }));
    }
}
