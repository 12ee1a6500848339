//! Resource map archives (`bitmaps.map`, `sounds.map`, `loc.map`).
//!
//! Layout, all little-endian:
//! `type u32, paths u32, resources u32, count u32`, then the data blobs, the
//! NUL-terminated path table and finally `count` descriptors of
//! `path_offset u32, size u32, data_offset u32`. Path offsets are relative to
//! the start of the path table; data offsets are absolute.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::bytes::{read_u32_le, write_u32_le};
use crate::tag_class::TagClass;
use crate::tag_path::TagPath;

pub const RESOURCE_MAP_HEADER_SIZE: usize = 0x10;
pub const RESOURCE_DESCRIPTOR_SIZE: usize = 0xC;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceMapError {
    #[error("malformed resource map: {reason}")]
    MalformedResourceMap { reason: String },
    #[error("unknown resource map type {0}")]
    UnknownType(u32),
    #[error("resource map is too large to address ({0} bytes)")]
    TooLarge(usize),
}

fn malformed(reason: impl Into<String>) -> ResourceMapError {
    ResourceMapError::MalformedResourceMap {
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceMapType {
    Bitmaps,
    Sounds,
    Loc,
}

impl ResourceMapType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(ResourceMapType::Bitmaps),
            2 => Some(ResourceMapType::Sounds),
            3 => Some(ResourceMapType::Loc),
            _ => None,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            ResourceMapType::Bitmaps => 1,
            ResourceMapType::Sounds => 2,
            ResourceMapType::Loc => 3,
        }
    }

    pub fn hosts(self, class: TagClass) -> bool {
        match self {
            ResourceMapType::Bitmaps => class == TagClass::Bitmap,
            ResourceMapType::Sounds => class == TagClass::Sound,
            ResourceMapType::Loc => matches!(
                class,
                TagClass::Font | TagClass::UnicodeStringList | TagClass::HudMessageText
            ),
        }
    }

    /// Path under which a tag is stored. Loc maps mix classes, so their
    /// paths carry the class extension.
    pub fn resource_path(self, class: TagClass, path: &TagPath) -> String {
        match self {
            ResourceMapType::Loc => path.with_extension(class),
            _ => path.as_str().to_string(),
        }
    }
}

impl fmt::Display for ResourceMapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceMapType::Bitmaps => "bitmaps",
            ResourceMapType::Sounds => "sounds",
            ResourceMapType::Loc => "loc",
        };
        f.write_str(name)
    }
}

impl FromStr for ResourceMapType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "bitmaps" => Ok(ResourceMapType::Bitmaps),
            "sounds" => Ok(ResourceMapType::Sounds),
            "loc" => Ok(ResourceMapType::Loc),
            other => Err(format!("unknown resource map type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub path_offset: u32,
    pub size: u32,
    pub data_offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub path: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMap {
    pub map_type: ResourceMapType,
    pub resources: Vec<Resource>,
}

impl ResourceMap {
    pub fn new(map_type: ResourceMapType) -> Self {
        Self {
            map_type,
            resources: Vec::new(),
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, ResourceMapError> {
        if data.len() < RESOURCE_MAP_HEADER_SIZE {
            return Err(malformed("header is truncated"));
        }
        let type_value = read_u32_le(data, 0);
        let map_type =
            ResourceMapType::from_u32(type_value).ok_or(ResourceMapError::UnknownType(type_value))?;
        let paths = read_u32_le(data, 4) as usize;
        let descriptors = read_u32_le(data, 8) as usize;
        let count = read_u32_le(data, 12) as usize;

        if paths > data.len() {
            return Err(malformed("path table starts past the end"));
        }
        let table_end = count
            .checked_mul(RESOURCE_DESCRIPTOR_SIZE)
            .and_then(|len| len.checked_add(descriptors))
            .ok_or_else(|| malformed("descriptor table overflows"))?;
        if table_end > data.len() {
            return Err(malformed(format!(
                "{} descriptors at 0x{:X} run past the end (0x{:X})",
                count,
                descriptors,
                data.len()
            )));
        }

        let mut resources = Vec::with_capacity(count);
        for index in 0..count {
            let at = descriptors + index * RESOURCE_DESCRIPTOR_SIZE;
            let descriptor = ResourceDescriptor {
                path_offset: read_u32_le(data, at),
                size: read_u32_le(data, at + 4),
                data_offset: read_u32_le(data, at + 8),
            };
            resources.push(read_resource(data, paths, index, descriptor)?);
        }

        Ok(Self {
            map_type,
            resources,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, ResourceMapError> {
        let mut out = vec![0u8; RESOURCE_MAP_HEADER_SIZE];
        let mut descriptors = Vec::with_capacity(self.resources.len());

        for resource in &self.resources {
            let data_offset = out.len();
            out.extend_from_slice(&resource.data);
            descriptors.push((data_offset, resource.data.len()));
        }

        let paths = out.len();
        let mut path_offsets = Vec::with_capacity(self.resources.len());
        for resource in &self.resources {
            path_offsets.push(out.len() - paths);
            out.extend_from_slice(resource.path.as_bytes());
            out.push(0);
        }

        let table = out.len();
        for ((data_offset, size), path_offset) in descriptors.into_iter().zip(path_offsets) {
            out.extend_from_slice(&to_u32(path_offset)?.to_le_bytes());
            out.extend_from_slice(&to_u32(size)?.to_le_bytes());
            out.extend_from_slice(&to_u32(data_offset)?.to_le_bytes());
        }
        to_u32(out.len())?;

        write_u32_le(&mut out, 0, self.map_type.to_u32());
        write_u32_le(&mut out, 4, paths as u32);
        write_u32_le(&mut out, 8, table as u32);
        write_u32_le(&mut out, 12, self.resources.len() as u32);
        Ok(out)
    }

    /// Index of the resource holding `(class, path)`, if this map hosts it.
    pub fn find(&self, class: TagClass, path: &TagPath) -> Option<usize> {
        if !self.map_type.hosts(class) {
            return None;
        }
        let wanted = self.map_type.resource_path(class, path);
        self.resources.iter().position(|resource| {
            resource.path.replace('/', "\\").eq_ignore_ascii_case(&wanted)
        })
    }

    pub fn push(&mut self, path: impl Into<String>, data: Vec<u8>) -> usize {
        self.resources.push(Resource {
            path: path.into(),
            data,
        });
        self.resources.len() - 1
    }
}

fn to_u32(value: usize) -> Result<u32, ResourceMapError> {
    u32::try_from(value).map_err(|_| ResourceMapError::TooLarge(value))
}

fn read_resource(
    data: &[u8],
    paths: usize,
    index: usize,
    descriptor: ResourceDescriptor,
) -> Result<Resource, ResourceMapError> {
    let start = descriptor.data_offset as usize;
    let end = start
        .checked_add(descriptor.size as usize)
        .ok_or_else(|| malformed(format!("resource #{} size overflows", index)))?;
    if end > data.len() {
        return Err(malformed(format!(
            "resource #{} data runs past the end",
            index
        )));
    }

    let path_start = paths
        .checked_add(descriptor.path_offset as usize)
        .filter(|start| *start < data.len())
        .ok_or_else(|| malformed(format!("resource #{} path starts past the end", index)))?;
    let path_len = data[path_start..]
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| malformed(format!("resource #{} path is not terminated", index)))?;
    let path = std::str::from_utf8(&data[path_start..path_start + path_len])
        .map_err(|_| malformed(format!("resource #{} path is not utf-8", index)))?;

    Ok(Resource {
        path: path.to_string(),
        data: data[start..end].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResourceMap {
        let mut map = ResourceMap::new(ResourceMapType::Bitmaps);
        map.push("ui\\hud\\crosshairs", vec![1, 2, 3, 4, 5]);
        map.push("ui\\shell\\background", vec![9; 12]);
        map.push("effects\\empty", Vec::new());
        map
    }

    #[test]
    fn encode_then_decode_is_identity() {
        let map = sample();
        let bytes = map.encode().expect("encode");
        assert_eq!(read_u32_le(&bytes, 12), 3);
        let decoded = ResourceMap::decode(&bytes).expect("decode");
        assert_eq!(decoded, map);
        assert_eq!(decoded.encode().expect("encode"), bytes);
    }

    #[test]
    fn find_matches_normalized_path() {
        let map = sample();
        let path = TagPath::parse("UI/Shell/Background").expect("path");
        assert_eq!(map.find(TagClass::Bitmap, &path), Some(1));
        assert_eq!(map.find(TagClass::Sound, &path), None);
    }

    #[test]
    fn loc_paths_carry_extension() {
        let mut map = ResourceMap::new(ResourceMapType::Loc);
        map.push("ui\\strings.unicode_string_list", vec![0; 4]);
        map.push("ui\\strings.font", vec![0; 4]);
        let path = TagPath::parse("ui\\strings").expect("path");
        assert_eq!(map.find(TagClass::Font, &path), Some(1));
        assert_eq!(map.find(TagClass::UnicodeStringList, &path), Some(0));
        assert_eq!(map.find(TagClass::Bitmap, &path), None);
    }

    #[test]
    fn descriptor_past_end_is_malformed() {
        let mut bytes = sample().encode().expect("encode");
        // Move the descriptor table so the third descriptor hangs off the end.
        let table = read_u32_le(&bytes, 8) as usize;
        write_u32_le(&mut bytes, 8, (table + 8) as u32);
        let err = ResourceMap::decode(&bytes).expect_err("malformed");
        assert!(matches!(err, ResourceMapError::MalformedResourceMap { .. }));
    }

    #[test]
    fn data_past_end_is_malformed() {
        let mut bytes = sample().encode().expect("encode");
        let table = read_u32_le(&bytes, 8) as usize;
        write_u32_le(&mut bytes, table + 4, 0xFFFF);
        let err = ResourceMap::decode(&bytes).expect_err("malformed");
        assert!(matches!(err, ResourceMapError::MalformedResourceMap { .. }));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut bytes = sample().encode().expect("encode");
        write_u32_le(&mut bytes, 0, 7);
        let err = ResourceMap::decode(&bytes).expect_err("type");
        assert_eq!(err, ResourceMapError::UnknownType(7));
    }
}
