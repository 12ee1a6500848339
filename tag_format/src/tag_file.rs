//! Source tag files as written by the editing kit.
//!
//! A 64 byte big-endian header is followed by the root struct and then the
//! trailing data of every reflexive, dependency and data field in field
//! order. Elements of a reflexive are stored back to back, followed by the
//! trailing data of each element.

use thiserror::Error;

use crate::bytes::{read_u16_be, read_u32_be, read_u32_le, write_u32_le};
use crate::record::{Record, TagReference};
use crate::schema::{
    FieldKind, FieldLayout, StructDef, DATA_LENGTH, DEPENDENCY_CLASS, DEPENDENCY_PATH_SIZE,
    DEPENDENCY_TAG_ID, REFLEXIVE_COUNT,
};
use crate::tag_class::{fourcc_to_string, TagClass};
use crate::tag_path::{TagPath, TagPathError};
use crate::{definitions, NULL_ID};

pub const TAG_FILE_HEADER_SIZE: usize = 0x40;
const BLAM: u32 = 0x626C_616D;
const ENGINE_MARKER: u16 = 0x00FF;

#[derive(Debug, Error)]
pub enum TagFileError {
    #[error("tag file is truncated: {structure} needs {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        structure: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("invalid tag file header")]
    InvalidHeader,
    #[error("unknown tag class '{0}'")]
    UnknownClass(String),
    #[error("{class} tag has version {found}, expected {expected}")]
    WrongVersion {
        class: TagClass,
        found: u16,
        expected: u16,
    },
    #[error("{field} has {count} elements (max {maximum})")]
    ReflexiveTooLarge {
        field: String,
        count: u32,
        maximum: u32,
    },
    #[error("{field} references unknown class '{class}'")]
    UnknownDependencyClass { field: String, class: String },
    #[error("{field} has an invalid path: {source}")]
    InvalidDependencyPath {
        field: String,
        #[source]
        source: TagPathError,
    },
    #[error("{field} path is not NUL terminated")]
    UnterminatedPath { field: String },
    #[error("{0} bytes of trailing data after the tag body")]
    TrailingData(usize),
}

#[derive(Debug, Clone)]
pub struct TagFile {
    pub class: TagClass,
    pub record: Record,
    /// Set when the header carries a checksum that does not match the body.
    pub checksum_mismatch: bool,
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, structure: &'static str, len: usize) -> Result<&'a [u8], TagFileError> {
        let available = self.data.len() - self.offset;
        if len > available {
            return Err(TagFileError::Truncated {
                structure,
                offset: self.offset + TAG_FILE_HEADER_SIZE,
                needed: len,
                available,
            });
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }
}

pub fn parse_tag_file(data: &[u8]) -> Result<TagFile, TagFileError> {
    if data.len() < TAG_FILE_HEADER_SIZE {
        return Err(TagFileError::Truncated {
            structure: "tag file header",
            offset: 0,
            needed: TAG_FILE_HEADER_SIZE,
            available: data.len(),
        });
    }
    let class_value = read_u32_be(data, 36);
    let checksum = read_u32_be(data, 40);
    let header_size = read_u32_be(data, 44);
    let version = read_u16_be(data, 56);
    if header_size as usize != TAG_FILE_HEADER_SIZE
        || read_u16_be(data, 58) != ENGINE_MARKER
        || read_u32_be(data, 60) != BLAM
    {
        return Err(TagFileError::InvalidHeader);
    }
    let class = TagClass::from_fourcc(class_value)
        .ok_or_else(|| TagFileError::UnknownClass(fourcc_to_string(class_value)))?;
    if version != class.version() {
        return Err(TagFileError::WrongVersion {
            class,
            found: version,
            expected: class.version(),
        });
    }

    let body = &data[TAG_FILE_HEADER_SIZE..];
    let checksum_mismatch = checksum != NULL_ID && crc32fast::hash(body) != checksum;

    let mut reader = Reader {
        data: body,
        offset: 0,
    };
    let mut record = read_struct(&mut reader, definitions::root_definition(class))?;
    read_trailing(&mut reader, &mut record, "")?;
    if reader.offset != body.len() {
        return Err(TagFileError::TrailingData(body.len() - reader.offset));
    }

    Ok(TagFile {
        class,
        record,
        checksum_mismatch,
    })
}

fn read_struct(reader: &mut Reader<'_>, def: &'static StructDef) -> Result<Record, TagFileError> {
    let mut bytes = reader.take(def.name, def.size())?.to_vec();
    def.swap_endianness(&mut bytes);
    Ok(Record::from_bytes(def, bytes))
}

fn read_trailing(
    reader: &mut Reader<'_>,
    record: &mut Record,
    prefix: &str,
) -> Result<(), TagFileError> {
    let def = record.def();
    for FieldLayout { offset, field } in def.layout() {
        let locator = || format!("{}{}", prefix, field.name);
        match field.kind {
            FieldKind::Dependency(_) => {
                let path_size = read_u32_le(record.bytes(), offset + DEPENDENCY_PATH_SIZE) as usize;
                if path_size == 0 {
                    continue;
                }
                let raw = reader.take(def.name, path_size + 1)?;
                if raw[path_size] != 0 {
                    return Err(TagFileError::UnterminatedPath { field: locator() });
                }
                let class_value = read_u32_le(record.bytes(), offset + DEPENDENCY_CLASS);
                let class = TagClass::from_fourcc(class_value).ok_or_else(|| {
                    TagFileError::UnknownDependencyClass {
                        field: locator(),
                        class: fourcc_to_string(class_value),
                    }
                })?;
                let text = String::from_utf8_lossy(&raw[..path_size]);
                let path = TagPath::parse(&text).map_err(|source| {
                    TagFileError::InvalidDependencyPath {
                        field: locator(),
                        source,
                    }
                })?;
                record.set_dependency_at(offset, TagReference::new(class, path));
            }
            FieldKind::Reflexive {
                def: child,
                maximum,
            } => {
                let count = read_u32_le(record.bytes(), offset + REFLEXIVE_COUNT);
                if count > maximum {
                    return Err(TagFileError::ReflexiveTooLarge {
                        field: locator(),
                        count,
                        maximum,
                    });
                }
                let mut elements = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    elements.push(read_struct(reader, child)?);
                }
                for (index, element) in elements.iter_mut().enumerate() {
                    let nested = format!("{}{}[{}].", prefix, field.name, index);
                    read_trailing(reader, element, &nested)?;
                }
                record.set_reflexive_at(offset, elements);
            }
            FieldKind::Data => {
                let size = read_u32_le(record.bytes(), offset + DATA_LENGTH) as usize;
                if size > 0 {
                    let raw = reader.take(def.name, size)?;
                    record.set_data_at(offset, raw.to_vec());
                }
            }
            _ => {}
        }
    }
    record.clear_reference_slots();
    Ok(())
}

/// Serializes `record` as a source tag file with a valid checksum.
pub fn write_tag_file(class: TagClass, record: &Record) -> Vec<u8> {
    let mut body = Vec::new();
    write_struct(record, &mut body);
    write_trailing(record, &mut body);

    let mut out = vec![0u8; TAG_FILE_HEADER_SIZE];
    out[36..40].copy_from_slice(&class.fourcc().to_be_bytes());
    out[40..44].copy_from_slice(&crc32fast::hash(&body).to_be_bytes());
    out[44..48].copy_from_slice(&(TAG_FILE_HEADER_SIZE as u32).to_be_bytes());
    out[56..58].copy_from_slice(&class.version().to_be_bytes());
    out[58..60].copy_from_slice(&ENGINE_MARKER.to_be_bytes());
    out[60..64].copy_from_slice(&BLAM.to_be_bytes());
    out.extend_from_slice(&body);
    out
}

fn write_struct(record: &Record, out: &mut Vec<u8>) {
    let mut bytes = record.bytes().to_vec();
    for FieldLayout { offset, field } in record.def().layout() {
        match field.kind {
            FieldKind::Dependency(_) => {
                bytes[offset + 4..offset + 12].fill(0);
                write_u32_le(&mut bytes, offset + DEPENDENCY_TAG_ID, NULL_ID);
                if let Some(reference) = record.dependency_at(offset) {
                    write_u32_le(&mut bytes, offset + DEPENDENCY_CLASS, reference.class.fourcc());
                    write_u32_le(
                        &mut bytes,
                        offset + DEPENDENCY_PATH_SIZE,
                        reference.path.as_str().len() as u32,
                    );
                }
            }
            FieldKind::Reflexive { .. } => {
                bytes[offset..offset + 12].fill(0);
                let count = record.reflexive_at(offset).len() as u32;
                write_u32_le(&mut bytes, offset + REFLEXIVE_COUNT, count);
            }
            FieldKind::Data => {
                bytes[offset..offset + 20].fill(0);
                let size = record.data_at(offset).len() as u32;
                write_u32_le(&mut bytes, offset + DATA_LENGTH, size);
            }
            _ => {}
        }
    }
    record.def().swap_endianness(&mut bytes);
    out.extend_from_slice(&bytes);
}

fn write_trailing(record: &Record, out: &mut Vec<u8>) {
    for FieldLayout { offset, field } in record.def().layout() {
        match field.kind {
            FieldKind::Dependency(_) => {
                if let Some(reference) = record.dependency_at(offset) {
                    out.extend_from_slice(reference.path.as_str().as_bytes());
                    out.push(0);
                }
            }
            FieldKind::Reflexive { .. } => {
                let elements = record.reflexive_at(offset);
                for element in elements {
                    write_struct(element, out);
                }
                for element in elements {
                    write_trailing(element, out);
                }
            }
            FieldKind::Data => out.extend_from_slice(record.data_at(offset)),
            _ => {}
        }
    }
}
