// src/patcher/pe.rs

//! Minimal PE resource reader/writer
//!
//! Parses just enough of a PE image to reach the resource directory, and
//! rebuilds the resource section when a payload is swapped. Every read is
//! bounds-checked; a truncated or inconsistent image is reported with a
//! reason string the caller wraps with the module path.
//!
//! The rebuild writes the canonical section layout: directory tables, data
//! entry records, name strings, then the payloads. When the rebuilt section
//! no longer fits the raw span it occupied, a fresh section is appended at
//! the image tail and the resource data directory is repointed.

use std::collections::VecDeque;

type PeResult<T> = std::result::Result<T, &'static str>;

const DOS_MAGIC: &[u8] = b"MZ";
const PE_MAGIC: &[u8] = b"PE\0\0";
const SUBDIR_FLAG: u32 = 0x8000_0000;
const SECTION_HEADER_LEN: usize = 40;
const APPENDED_SECTION_NAME: &[u8; 8] = b".rsrc2\0\0";
// IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_READ
const APPENDED_SECTION_FLAGS: u32 = 0x4000_0040;

fn u16_at(image: &[u8], off: usize) -> PeResult<u16> {
    let bytes = image
        .get(off..off + 2)
        .ok_or("image truncated inside a header field")?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn u32_at(image: &[u8], off: usize) -> PeResult<u32> {
    let bytes = image
        .get(off..off + 4)
        .ok_or("image truncated inside a header field")?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn put_u32(image: &mut [u8], off: usize, value: u32) {
    image[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

#[derive(Debug, Clone)]
struct Section {
    header_off: usize,
    virtual_size: u32,
    virtual_address: u32,
    raw_size: u32,
    raw_offset: u32,
}

#[derive(Debug)]
struct Pe {
    num_sections_off: usize,
    section_alignment: u32,
    file_alignment: u32,
    size_of_image_off: usize,
    size_of_headers: u32,
    /// Offset of IMAGE_DATA_DIRECTORY[2] (the resource directory).
    res_dir_entry_off: usize,
    section_table_off: usize,
    sections: Vec<Section>,
}

fn parse(image: &[u8]) -> PeResult<Pe> {
    if image.len() < 0x40 || &image[..2] != DOS_MAGIC {
        return Err("missing DOS header");
    }
    let pe_off = u32_at(image, 0x3c)? as usize;
    if image.get(pe_off..pe_off + 4) != Some(PE_MAGIC) {
        return Err("missing PE signature");
    }

    let coff_off = pe_off + 4;
    let num_sections = u16_at(image, coff_off + 2)? as usize;
    let size_of_opt = u16_at(image, coff_off + 16)? as usize;
    let opt_off = coff_off + 20;

    let magic = u16_at(image, opt_off)?;
    let pe64 = match magic {
        0x10b => false,
        0x20b => true,
        _ => return Err("unknown optional header magic"),
    };
    let section_alignment = u32_at(image, opt_off + 32)?;
    let file_alignment = u32_at(image, opt_off + 36)?;
    if section_alignment == 0 || file_alignment == 0 {
        return Err("zero alignment in optional header");
    }
    let size_of_image_off = opt_off + 56;
    let size_of_headers = u32_at(image, opt_off + 60)?;

    let num_dirs_off = opt_off + if pe64 { 108 } else { 92 };
    let dirs_off = opt_off + if pe64 { 112 } else { 96 };
    if u32_at(image, num_dirs_off)? < 3 {
        return Err("image carries no resource directory slot");
    }
    let res_dir_entry_off = dirs_off + 2 * 8;

    let section_table_off = opt_off + size_of_opt;
    let mut sections = Vec::with_capacity(num_sections);
    for i in 0..num_sections {
        let header_off = section_table_off + i * SECTION_HEADER_LEN;
        sections.push(Section {
            header_off,
            virtual_size: u32_at(image, header_off + 8)?,
            virtual_address: u32_at(image, header_off + 12)?,
            raw_size: u32_at(image, header_off + 16)?,
            raw_offset: u32_at(image, header_off + 20)?,
        });
    }

    Ok(Pe {
        num_sections_off: coff_off + 2,
        section_alignment,
        file_alignment,
        size_of_image_off,
        size_of_headers,
        res_dir_entry_off,
        section_table_off,
        sections,
    })
}

/// Locate the section backing the resource directory RVA.
fn resource_section<'a>(pe: &Pe, image: &'a [u8]) -> PeResult<(&'a [u8], u32, usize)> {
    let rsrc_rva = u32_at(image, pe.res_dir_entry_off)?;
    if rsrc_rva == 0 {
        return Err("image has no resource section");
    }
    for (index, section) in pe.sections.iter().enumerate() {
        let span = section.virtual_size.max(section.raw_size);
        if rsrc_rva >= section.virtual_address && rsrc_rva < section.virtual_address + span {
            let start = section.raw_offset as usize;
            let end = start + section.raw_size as usize;
            let data = image.get(start..end).ok_or("resource section truncated")?;
            return Ok((data, section.virtual_address, index));
        }
    }
    Err("resource directory points outside every section")
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ResId {
    Name(String),
    Id(u32),
}

#[derive(Debug)]
enum ResEntry {
    Dir(ResDir),
    Data { bytes: Vec<u8>, codepage: u32 },
}

#[derive(Debug, Default)]
struct ResDir {
    entries: Vec<(ResId, ResEntry)>,
}

impl ResDir {
    fn child_dir(&self, id: &ResId) -> Option<&ResDir> {
        self.entries.iter().find_map(|(eid, entry)| match entry {
            ResEntry::Dir(dir) if eid == id => Some(dir),
            _ => None,
        })
    }

    fn child_dir_mut_or_insert(&mut self, id: ResId) -> &mut ResDir {
        let pos = self
            .entries
            .iter()
            .position(|(eid, entry)| *eid == id && matches!(entry, ResEntry::Dir(_)));
        let pos = match pos {
            Some(pos) => pos,
            None => {
                self.entries.push((id, ResEntry::Dir(ResDir::default())));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[pos].1 {
            ResEntry::Dir(dir) => dir,
            ResEntry::Data { .. } => unreachable!(),
        }
    }
}

fn parse_name(section: &[u8], off: usize) -> PeResult<String> {
    let len = u16_at(section, off)? as usize;
    let mut units = Vec::with_capacity(len);
    for i in 0..len {
        units.push(u16_at(section, off + 2 + i * 2)?);
    }
    String::from_utf16(&units).map_err(|_| "resource name is not valid UTF-16")
}

fn parse_dir(section: &[u8], off: usize, rsrc_va: u32, depth: u8) -> PeResult<ResDir> {
    if depth > 4 {
        return Err("resource directory nests too deep");
    }
    let named = u16_at(section, off + 12)? as usize;
    let by_id = u16_at(section, off + 14)? as usize;

    let mut dir = ResDir::default();
    for i in 0..named + by_id {
        let entry_off = off + 16 + i * 8;
        let raw_id = u32_at(section, entry_off)?;
        let raw_target = u32_at(section, entry_off + 4)?;

        let id = if raw_id & SUBDIR_FLAG != 0 {
            ResId::Name(parse_name(section, (raw_id & !SUBDIR_FLAG) as usize)?)
        } else {
            ResId::Id(raw_id)
        };
        let entry = if raw_target & SUBDIR_FLAG != 0 {
            ResEntry::Dir(parse_dir(
                section,
                (raw_target & !SUBDIR_FLAG) as usize,
                rsrc_va,
                depth + 1,
            )?)
        } else {
            let desc_off = raw_target as usize;
            let data_rva = u32_at(section, desc_off)?;
            let size = u32_at(section, desc_off + 4)? as usize;
            let codepage = u32_at(section, desc_off + 8)?;
            let start = data_rva
                .checked_sub(rsrc_va)
                .ok_or("resource payload lies before its section")? as usize;
            let bytes = section
                .get(start..start + size)
                .ok_or("resource payload truncated")?
                .to_vec();
            ResEntry::Data { bytes, codepage }
        };
        dir.entries.push((id, entry));
    }
    Ok(dir)
}

// ---- section rebuild ----

enum FlatTarget {
    Dir(usize),
    Data(usize),
}

struct FlatDir {
    entries: Vec<(ResId, FlatTarget)>,
}

fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

/// Serialize a resource tree into section bytes with data RVAs computed
/// against `rsrc_va`.
fn build_section(root: &ResDir, rsrc_va: u32) -> Vec<u8> {
    // Flatten breadth-first so child directories are serialized after
    // their parents, with named entries ahead of id entries in each table.
    let mut flat_dirs: Vec<FlatDir> = Vec::new();
    let mut flat_data: Vec<(&[u8], u32)> = Vec::new();
    let mut queue: VecDeque<(&ResDir, usize)> = VecDeque::new();
    flat_dirs.push(FlatDir { entries: Vec::new() });
    queue.push_back((root, 0));

    while let Some((dir, index)) = queue.pop_front() {
        let mut sorted: Vec<&(ResId, ResEntry)> = dir.entries.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let mut entries = Vec::with_capacity(sorted.len());
        for (id, entry) in sorted {
            let target = match entry {
                ResEntry::Dir(child) => {
                    flat_dirs.push(FlatDir { entries: Vec::new() });
                    let child_index = flat_dirs.len() - 1;
                    queue.push_back((child, child_index));
                    FlatTarget::Dir(child_index)
                }
                ResEntry::Data { bytes, codepage } => {
                    flat_data.push((bytes, *codepage));
                    FlatTarget::Data(flat_data.len() - 1)
                }
            };
            entries.push((id.clone(), target));
        }
        flat_dirs[index].entries = entries;
    }

    // Layout: tables, data entry records, strings, aligned payloads.
    let mut dir_offsets = Vec::with_capacity(flat_dirs.len());
    let mut cursor = 0usize;
    for dir in &flat_dirs {
        dir_offsets.push(cursor);
        cursor += 16 + dir.entries.len() * 8;
    }
    let desc_base = cursor;
    cursor += flat_data.len() * 16;

    let mut string_offsets = Vec::new();
    for dir in &flat_dirs {
        for (id, _) in &dir.entries {
            if let ResId::Name(name) = id {
                string_offsets.push(cursor);
                cursor += 2 + name.encode_utf16().count() * 2;
            }
        }
    }
    let data_base = align_up(cursor, 8);
    let mut data_offsets = Vec::with_capacity(flat_data.len());
    cursor = data_base;
    for (bytes, _) in &flat_data {
        data_offsets.push(cursor);
        cursor = align_up(cursor + bytes.len(), 4);
    }

    let mut out = vec![0u8; cursor];
    let mut string_iter = string_offsets.iter();
    for (dir, &dir_off) in flat_dirs.iter().zip(&dir_offsets) {
        let named = dir
            .entries
            .iter()
            .filter(|(id, _)| matches!(id, ResId::Name(_)))
            .count();
        out[dir_off + 12..dir_off + 14].copy_from_slice(&(named as u16).to_le_bytes());
        out[dir_off + 14..dir_off + 16]
            .copy_from_slice(&((dir.entries.len() - named) as u16).to_le_bytes());

        for (i, (id, target)) in dir.entries.iter().enumerate() {
            let entry_off = dir_off + 16 + i * 8;
            let raw_id = match id {
                ResId::Name(name) => {
                    let str_off = *string_iter.next().unwrap_or(&0);
                    let units: Vec<u16> = name.encode_utf16().collect();
                    out[str_off..str_off + 2]
                        .copy_from_slice(&(units.len() as u16).to_le_bytes());
                    for (j, unit) in units.iter().enumerate() {
                        out[str_off + 2 + j * 2..str_off + 4 + j * 2]
                            .copy_from_slice(&unit.to_le_bytes());
                    }
                    str_off as u32 | SUBDIR_FLAG
                }
                ResId::Id(id) => *id,
            };
            let raw_target = match target {
                FlatTarget::Dir(child) => dir_offsets[*child] as u32 | SUBDIR_FLAG,
                FlatTarget::Data(data_index) => (desc_base + data_index * 16) as u32,
            };
            put_u32(&mut out, entry_off, raw_id);
            put_u32(&mut out, entry_off + 4, raw_target);
        }
    }

    for (data_index, (bytes, codepage)) in flat_data.iter().enumerate() {
        let desc_off = desc_base + data_index * 16;
        let data_off = data_offsets[data_index];
        put_u32(&mut out, desc_off, rsrc_va + data_off as u32);
        put_u32(&mut out, desc_off + 4, bytes.len() as u32);
        put_u32(&mut out, desc_off + 8, *codepage);
        out[data_off..data_off + bytes.len()].copy_from_slice(bytes);
    }
    out
}

fn navigate<'a>(root: &'a ResDir, kind: &str, id: u32, locale: u16) -> Option<&'a [u8]> {
    let kind_dir = root.child_dir(&ResId::Name(kind.to_string()))?;
    let id_dir = kind_dir.child_dir(&ResId::Id(id))?;
    let exact = id_dir.entries.iter().find_map(|(eid, entry)| match entry {
        ResEntry::Data { bytes, .. } if *eid == ResId::Id(locale as u32) => Some(bytes.as_slice()),
        _ => None,
    });
    exact.or_else(|| {
        id_dir.entries.iter().find_map(|(_, entry)| match entry {
            ResEntry::Data { bytes, .. } => Some(bytes.as_slice()),
            _ => None,
        })
    })
}

/// Read one resource payload out of a module image.
pub(crate) fn extract_resource(
    image: &[u8],
    kind: &str,
    id: u32,
    locale: u16,
) -> PeResult<Option<Vec<u8>>> {
    let pe = parse(image)?;
    let (section, rsrc_va, _) = resource_section(&pe, image)?;
    let root = parse_dir(section, 0, rsrc_va, 0)?;
    Ok(navigate(&root, kind, id, locale).map(<[u8]>::to_vec))
}

/// Return a new image with `payload` installed as the given resource,
/// creating the kind/id/locale path when absent.
pub(crate) fn replace_resource(
    image: &[u8],
    kind: &str,
    id: u32,
    locale: u16,
    payload: &[u8],
) -> PeResult<Vec<u8>> {
    let pe = parse(image)?;
    let (section, rsrc_va, section_index) = resource_section(&pe, image)?;
    let mut root = parse_dir(section, 0, rsrc_va, 0)?;

    let locale_dir = root
        .child_dir_mut_or_insert(ResId::Name(kind.to_string()))
        .child_dir_mut_or_insert(ResId::Id(id));
    let new_entry = ResEntry::Data {
        bytes: payload.to_vec(),
        codepage: 0,
    };
    match locale_dir
        .entries
        .iter_mut()
        .find(|(eid, _)| *eid == ResId::Id(locale as u32))
    {
        Some((_, entry)) => *entry = new_entry,
        None => locale_dir.entries.push((ResId::Id(locale as u32), new_entry)),
    }

    let current = &pe.sections[section_index];
    let rebuilt = build_section(&root, rsrc_va);
    let mut out = image.to_vec();

    if rebuilt.len() <= current.raw_size as usize {
        // Fits the existing raw span: overwrite in place and zero the slack.
        let start = current.raw_offset as usize;
        out[start..start + rebuilt.len()].copy_from_slice(&rebuilt);
        out[start + rebuilt.len()..start + current.raw_size as usize].fill(0);
        put_u32(&mut out, current.header_off + 8, rebuilt.len() as u32);
        put_u32(&mut out, pe.res_dir_entry_off + 4, rebuilt.len() as u32);
        return Ok(out);
    }

    // Outgrown: append a fresh section at the image tail.
    let header_off = pe.section_table_off + pe.sections.len() * SECTION_HEADER_LEN;
    if header_off + SECTION_HEADER_LEN > pe.size_of_headers as usize {
        return Err("no room in the header area for another section");
    }

    let size_of_image = u32_at(&out, pe.size_of_image_off)?;
    let new_va = align_up(size_of_image as usize, pe.section_alignment as usize) as u32;
    let rebuilt = build_section(&root, new_va);

    let raw_offset = align_up(out.len(), pe.file_alignment as usize);
    let raw_size = align_up(rebuilt.len(), pe.file_alignment as usize);
    out.resize(raw_offset + raw_size, 0);
    out[raw_offset..raw_offset + rebuilt.len()].copy_from_slice(&rebuilt);

    let header = &mut out[header_off..header_off + SECTION_HEADER_LEN];
    header[..8].copy_from_slice(APPENDED_SECTION_NAME);
    header[8..12].copy_from_slice(&(rebuilt.len() as u32).to_le_bytes());
    header[12..16].copy_from_slice(&new_va.to_le_bytes());
    header[16..20].copy_from_slice(&(raw_size as u32).to_le_bytes());
    header[20..24].copy_from_slice(&(raw_offset as u32).to_le_bytes());
    header[36..40].copy_from_slice(&APPENDED_SECTION_FLAGS.to_le_bytes());

    let num_sections = (pe.sections.len() + 1) as u16;
    out[pe.num_sections_off..pe.num_sections_off + 2]
        .copy_from_slice(&num_sections.to_le_bytes());
    let new_image_size =
        new_va + align_up(rebuilt.len(), pe.section_alignment as usize) as u32;
    put_u32(&mut out, pe.size_of_image_off, new_image_size);
    put_u32(&mut out, pe.res_dir_entry_off, new_va);
    put_u32(&mut out, pe.res_dir_entry_off + 4, rebuilt.len() as u32);
    Ok(out)
}
