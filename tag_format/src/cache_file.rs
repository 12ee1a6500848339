//! Tag data region of an uncompressed cache file.
//!
//! The region is loaded at the dialect's base address and starts with a
//! 40 byte tag data header, followed by the tag array, the tag paths and the
//! compiled structs.

use std::ops::Range;

use thiserror::Error;

use crate::bytes::{read_fixed_string, read_u32_le, write_u32_le};
use crate::cache_header::{CacheHeader, CacheHeaderError, Dialect, HeaderLayout, HEADER_SIZE};
use crate::tag_class::{fourcc_to_string, TagClass};
use crate::NULL_ID;

pub const TAG_DATA_HEADER_SIZE: usize = 40;
pub const TAG_ARRAY_ENTRY_SIZE: usize = 32;
pub const TAGS_LITERAL: u32 = 0x7461_6773;
pub const MAX_TAG_COUNT: usize = 0xFFFF;
const TAG_ID_SALT: u32 = 0xE174;

/// Tag id of the tag at `index`: salt in the high half, index in the low half.
pub fn tag_id(index: usize) -> u32 {
    let index = index as u32 & 0xFFFF;
    ((TAG_ID_SALT.wrapping_add(index) & 0xFFFF) << 16) | index
}

/// Index encoded in `id`, if `id` is a well-formed tag id.
pub fn tag_index(id: u32) -> Option<usize> {
    if id == NULL_ID {
        return None;
    }
    let index = (id & 0xFFFF) as usize;
    (tag_id(index) == id).then_some(index)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagDataHeader {
    pub tag_array_address: u32,
    pub scenario_tag_id: u32,
    pub checksum: u32,
    pub tag_count: u32,
    pub tags_literal: u32,
}

impl TagDataHeader {
    pub fn read(bytes: &[u8]) -> Self {
        Self {
            tag_array_address: read_u32_le(bytes, 0),
            scenario_tag_id: read_u32_le(bytes, 4),
            checksum: read_u32_le(bytes, 8),
            tag_count: read_u32_le(bytes, 12),
            tags_literal: read_u32_le(bytes, 36),
        }
    }

    /// The five model fields between the count and the literal stay zero.
    pub fn write(&self, out: &mut [u8]) {
        out[..TAG_DATA_HEADER_SIZE].fill(0);
        write_u32_le(out, 0, self.tag_array_address);
        write_u32_le(out, 4, self.scenario_tag_id);
        write_u32_le(out, 8, self.checksum);
        write_u32_le(out, 12, self.tag_count);
        write_u32_le(out, 36, self.tags_literal);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagArrayEntry {
    pub class: u32,
    pub secondary_class: u32,
    pub tertiary_class: u32,
    pub tag_id: u32,
    pub path_address: u32,
    /// Address of the root struct, or the resource index when `indexed`.
    pub data: u32,
    pub indexed: bool,
}

impl TagArrayEntry {
    pub fn read(bytes: &[u8]) -> Self {
        Self {
            class: read_u32_le(bytes, 0),
            secondary_class: read_u32_le(bytes, 4),
            tertiary_class: read_u32_le(bytes, 8),
            tag_id: read_u32_le(bytes, 12),
            path_address: read_u32_le(bytes, 16),
            data: read_u32_le(bytes, 20),
            indexed: read_u32_le(bytes, 24) != 0,
        }
    }

    pub fn write(&self, out: &mut [u8]) {
        out[..TAG_ARRAY_ENTRY_SIZE].fill(0);
        write_u32_le(out, 0, self.class);
        write_u32_le(out, 4, self.secondary_class);
        write_u32_le(out, 8, self.tertiary_class);
        write_u32_le(out, 12, self.tag_id);
        write_u32_le(out, 16, self.path_address);
        write_u32_le(out, 20, self.data);
        write_u32_le(out, 24, u32::from(self.indexed));
    }
}

/// Byte range of a cache file covered by its checksum.
pub fn checksum_region(dialect: Dialect, header: &CacheHeader, file_len: usize) -> Range<usize> {
    if dialect.checksums_whole_body() {
        HEADER_SIZE.min(file_len)..file_len
    } else {
        let start = (header.tag_data_offset as usize).min(file_len);
        let end = start
            .saturating_add(header.tag_data_size as usize)
            .min(file_len);
        start..end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheFileError {
    #[error(transparent)]
    Header(#[from] CacheHeaderError),
    #[error("unknown dialect 0x{0:08X}")]
    UnknownDialect(u32),
    #[error("cache file is compressed; decompress it first")]
    Compressed,
    #[error("tag data region 0x{offset:X}+0x{size:X} lies outside the file")]
    TagDataOutOfBounds { offset: u32, size: u32 },
    #[error("tag data header is missing its 'tags' literal")]
    MissingTagsLiteral,
    #[error("address 0x{0:08X} lies outside the tag data region")]
    AddressOutOfBounds(u32),
}

#[derive(Debug, Clone)]
pub struct CachedTag {
    pub index: usize,
    pub class: Option<TagClass>,
    pub class_name: String,
    pub path: String,
    pub entry: TagArrayEntry,
}

/// Read-only view over an uncompressed cache file.
#[derive(Debug)]
pub struct CacheFileView<'a> {
    pub header: CacheHeader,
    pub layout: HeaderLayout,
    pub dialect: Dialect,
    pub tag_data_header: TagDataHeader,
    data: &'a [u8],
}

impl<'a> CacheFileView<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, CacheFileError> {
        let (header, layout) = CacheHeader::detect(data)?;
        let dialect = header
            .dialect()
            .ok_or(CacheFileError::UnknownDialect(header.engine))?;
        if dialect.is_compressed_variant() || header.decompressed_file_size != 0 {
            return Err(CacheFileError::Compressed);
        }
        let offset = header.tag_data_offset as usize;
        let size = header.tag_data_size as usize;
        let in_bounds = offset
            .checked_add(size)
            .map(|end| end <= data.len() && size >= TAG_DATA_HEADER_SIZE)
            .unwrap_or(false);
        if !in_bounds {
            return Err(CacheFileError::TagDataOutOfBounds {
                offset: header.tag_data_offset,
                size: header.tag_data_size,
            });
        }
        let tag_data_header = TagDataHeader::read(&data[offset..]);
        if tag_data_header.tags_literal != TAGS_LITERAL {
            return Err(CacheFileError::MissingTagsLiteral);
        }
        Ok(Self {
            header,
            layout,
            dialect,
            tag_data_header,
            data,
        })
    }

    pub fn tag_data(&self) -> &'a [u8] {
        let offset = self.header.tag_data_offset as usize;
        &self.data[offset..offset + self.header.tag_data_size as usize]
    }

    /// Bytes at `address`, which must lie in the tag data region.
    pub fn read_at(&self, address: u32, len: usize) -> Result<&'a [u8], CacheFileError> {
        let tag_data = self.tag_data();
        let start = address
            .checked_sub(self.dialect.base_address())
            .map(|offset| offset as usize)
            .ok_or(CacheFileError::AddressOutOfBounds(address))?;
        match start.checked_add(len) {
            Some(end) if end <= tag_data.len() => Ok(&tag_data[start..end]),
            _ => Err(CacheFileError::AddressOutOfBounds(address)),
        }
    }

    pub fn tags(&self) -> Result<Vec<CachedTag>, CacheFileError> {
        let count = self.tag_data_header.tag_count as usize;
        let mut tags = Vec::with_capacity(count.min(MAX_TAG_COUNT));
        for index in 0..count {
            let address = self
                .tag_data_header
                .tag_array_address
                .wrapping_add((index * TAG_ARRAY_ENTRY_SIZE) as u32);
            let entry = TagArrayEntry::read(self.read_at(address, TAG_ARRAY_ENTRY_SIZE)?);
            let path = self.read_string(entry.path_address)?;
            tags.push(CachedTag {
                index,
                class: TagClass::from_fourcc(entry.class),
                class_name: fourcc_to_string(entry.class),
                path,
                entry,
            });
        }
        Ok(tags)
    }

    fn read_string(&self, address: u32) -> Result<String, CacheFileError> {
        let tag_data = self.tag_data();
        let start = address
            .checked_sub(self.dialect.base_address())
            .map(|offset| offset as usize)
            .filter(|start| *start < tag_data.len())
            .ok_or(CacheFileError::AddressOutOfBounds(address))?;
        Ok(read_fixed_string(&tag_data[start..]))
    }

    pub fn checksum_matches(&self) -> bool {
        let region = checksum_region(self.dialect, &self.header, self.data.len());
        crc32fast::hash(&self.data[region]) == self.header.crc32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_ids_carry_salt() {
        assert_eq!(tag_id(0), 0xE174_0000);
        assert_eq!(tag_id(3), 0xE177_0003);
        assert_eq!(tag_index(tag_id(42)), Some(42));
        assert_eq!(tag_index(NULL_ID), None);
        assert_eq!(tag_index(0x1234_0001), None);
    }

    #[test]
    fn tag_array_entry_layout() {
        let entry = TagArrayEntry {
            class: TagClass::Bitmap.fourcc(),
            secondary_class: NULL_ID,
            tertiary_class: NULL_ID,
            tag_id: tag_id(1),
            path_address: 0x4044_0100,
            data: 7,
            indexed: true,
        };
        let mut bytes = [0xAAu8; TAG_ARRAY_ENTRY_SIZE];
        entry.write(&mut bytes);
        assert_eq!(read_u32_le(&bytes, 24), 1);
        assert_eq!(read_u32_le(&bytes, 28), 0);
        assert_eq!(TagArrayEntry::read(&bytes), entry);
    }

    #[test]
    fn compressed_file_is_rejected() {
        let mut header = CacheHeader::new(Dialect::RetailCompressed, HeaderLayout::Standard);
        header.decompressed_file_size = 0x1000;
        let bytes = header.to_bytes(HeaderLayout::Standard);
        let err = CacheFileView::parse(&bytes).expect_err("compressed");
        assert_eq!(err, CacheFileError::Compressed);
    }
}
