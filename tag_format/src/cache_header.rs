//! The 0x800 byte header at the start of every cache file.
//!
//! Most dialects use the standard layout framed by `head`/`foot`. The demo
//! dialect shuffles the same fields around and frames them with
//! `Ehed`/`Gfot`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::bytes::{read_fixed_string, read_u16_le, read_u32_le, write_u16_le, write_u32_le};

pub const HEADER_SIZE: usize = 0x800;

pub const HEAD_LITERAL: u32 = 0x6865_6164;
pub const FOOT_LITERAL: u32 = 0x666F_6F74;
pub const DEMO_HEAD_LITERAL: u32 = 0x4568_6564;
pub const DEMO_FOOT_LITERAL: u32 = 0x4766_6F74;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheHeaderError {
    #[error("cache file is truncated ({0} bytes, header needs {HEADER_SIZE})")]
    Truncated(usize),
    #[error("invalid cache file header")]
    InvalidHeader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Demo,
    Retail,
    CustomEdition,
    DarkCirclet,
    DemoCompressed,
    RetailCompressed,
    CustomEditionCompressed,
}

impl Dialect {
    pub const ALL: [Dialect; 7] = [
        Dialect::Demo,
        Dialect::Retail,
        Dialect::CustomEdition,
        Dialect::DarkCirclet,
        Dialect::DemoCompressed,
        Dialect::RetailCompressed,
        Dialect::CustomEditionCompressed,
    ];

    pub fn to_u32(self) -> u32 {
        match self {
            Dialect::Demo => 6,
            Dialect::Retail => 7,
            Dialect::CustomEdition => 609,
            Dialect::DarkCirclet => 0x1A86,
            Dialect::DemoCompressed => 0x861A_0006,
            Dialect::RetailCompressed => 0x861A_0007,
            Dialect::CustomEditionCompressed => 0x861A_0261,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|dialect| dialect.to_u32() == value)
    }

    /// Compressed counterpart of an uncompressed dialect.
    pub fn compressed(self) -> Option<Self> {
        match self {
            Dialect::Demo => Some(Dialect::DemoCompressed),
            Dialect::Retail => Some(Dialect::RetailCompressed),
            Dialect::CustomEdition => Some(Dialect::CustomEditionCompressed),
            _ => None,
        }
    }

    /// Uncompressed counterpart of a compressed dialect.
    pub fn decompressed(self) -> Option<Self> {
        match self {
            Dialect::DemoCompressed => Some(Dialect::Demo),
            Dialect::RetailCompressed => Some(Dialect::Retail),
            Dialect::CustomEditionCompressed => Some(Dialect::CustomEdition),
            _ => None,
        }
    }

    pub fn is_compressed_variant(self) -> bool {
        self.decompressed().is_some()
    }

    /// Whether the build pipeline can target this dialect directly.
    pub fn is_build_target(self) -> bool {
        !self.is_compressed_variant()
    }

    /// Address the tag data region is loaded at.
    pub fn base_address(self) -> u32 {
        match self {
            Dialect::Demo | Dialect::DemoCompressed => 0x4BF1_0000,
            _ => 0x4044_0000,
        }
    }

    /// Maximum size of the tag data region.
    pub fn tag_space_limit(self) -> u64 {
        match self {
            Dialect::DarkCirclet => 64 * MIB,
            _ => 23 * MIB,
        }
    }

    /// Only Custom Edition can leave tags in resource maps.
    pub fn supports_indexed_tags(self) -> bool {
        self == Dialect::CustomEdition
    }

    pub fn uses_demo_layout(self) -> bool {
        self == Dialect::Demo
    }

    /// Whether the checksum covers everything after the header rather than
    /// only the tag data region.
    pub fn checksums_whole_body(self) -> bool {
        self == Dialect::DarkCirclet
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Demo => "demo",
            Dialect::Retail => "retail",
            Dialect::CustomEdition => "custom-edition",
            Dialect::DarkCirclet => "dark-circlet",
            Dialect::DemoCompressed => "demo (compressed)",
            Dialect::RetailCompressed => "retail (compressed)",
            Dialect::CustomEditionCompressed => "custom-edition (compressed)",
        };
        f.write_str(name)
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().replace('_', "-").as_str() {
            "demo" => Ok(Dialect::Demo),
            "retail" | "pc" => Ok(Dialect::Retail),
            "custom-edition" | "ce" => Ok(Dialect::CustomEdition),
            "dark-circlet" | "mcc" => Ok(Dialect::DarkCirclet),
            other => Err(format!("unknown dialect '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapType {
    Singleplayer,
    Multiplayer,
    UserInterface,
}

impl MapType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(MapType::Singleplayer),
            1 => Some(MapType::Multiplayer),
            2 => Some(MapType::UserInterface),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            MapType::Singleplayer => 0,
            MapType::Multiplayer => 1,
            MapType::UserInterface => 2,
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MapType::Singleplayer => "singleplayer",
            MapType::Multiplayer => "multiplayer",
            MapType::UserInterface => "user interface",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    Standard,
    Demo,
}

struct Offsets {
    head: usize,
    engine: usize,
    decompressed_file_size: usize,
    compressed_padding: Option<usize>,
    tag_data_offset: usize,
    tag_data_size: usize,
    name: usize,
    build: usize,
    map_type: usize,
    crc32: usize,
    foot: usize,
}

const STANDARD: Offsets = Offsets {
    head: 0x0,
    engine: 0x4,
    decompressed_file_size: 0x8,
    compressed_padding: Some(0xC),
    tag_data_offset: 0x10,
    tag_data_size: 0x14,
    name: 0x20,
    build: 0x40,
    map_type: 0x60,
    crc32: 0x64,
    foot: 0x7FC,
};

const DEMO: Offsets = Offsets {
    map_type: 0x2,
    head: 0x2C0,
    tag_data_size: 0x2C4,
    build: 0x2C8,
    engine: 0x588,
    name: 0x58C,
    crc32: 0x5B0,
    decompressed_file_size: 0x5E8,
    tag_data_offset: 0x5EC,
    foot: 0x5F0,
    compressed_padding: None,
};

impl HeaderLayout {
    fn offsets(self) -> &'static Offsets {
        match self {
            HeaderLayout::Standard => &STANDARD,
            HeaderLayout::Demo => &DEMO,
        }
    }

    /// Offset of the CRC32 field, patched after the file is assembled.
    pub fn crc32_offset(self) -> usize {
        self.offsets().crc32
    }

    pub fn literals(self) -> (u32, u32) {
        match self {
            HeaderLayout::Standard => (HEAD_LITERAL, FOOT_LITERAL),
            HeaderLayout::Demo => (DEMO_HEAD_LITERAL, DEMO_FOOT_LITERAL),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeader {
    pub head_literal: u32,
    /// Raw dialect value; see [`CacheHeader::dialect`].
    pub engine: u32,
    pub decompressed_file_size: u32,
    pub compressed_padding: u32,
    pub tag_data_offset: u32,
    pub tag_data_size: u32,
    pub name: [u8; 32],
    pub build: [u8; 32],
    pub map_type: u16,
    pub crc32: u32,
    pub foot_literal: u32,
}

impl CacheHeader {
    /// Fresh header for `dialect` with the literals of `layout`.
    pub fn new(dialect: Dialect, layout: HeaderLayout) -> Self {
        let (head_literal, foot_literal) = layout.literals();
        Self {
            head_literal,
            engine: dialect.to_u32(),
            decompressed_file_size: 0,
            compressed_padding: 0,
            tag_data_offset: 0,
            tag_data_size: 0,
            name: [0; 32],
            build: [0; 32],
            map_type: 0,
            crc32: 0,
            foot_literal,
        }
    }

    pub fn read(bytes: &[u8], layout: HeaderLayout) -> Result<Self, CacheHeaderError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CacheHeaderError::Truncated(bytes.len()));
        }
        let at = layout.offsets();
        let mut name = [0u8; 32];
        name.copy_from_slice(&bytes[at.name..at.name + 32]);
        let mut build = [0u8; 32];
        build.copy_from_slice(&bytes[at.build..at.build + 32]);
        Ok(Self {
            head_literal: read_u32_le(bytes, at.head),
            engine: read_u32_le(bytes, at.engine),
            decompressed_file_size: read_u32_le(bytes, at.decompressed_file_size),
            compressed_padding: at
                .compressed_padding
                .map(|offset| read_u32_le(bytes, offset))
                .unwrap_or(0),
            tag_data_offset: read_u32_le(bytes, at.tag_data_offset),
            tag_data_size: read_u32_le(bytes, at.tag_data_size),
            name,
            build,
            map_type: read_u16_le(bytes, at.map_type),
            crc32: read_u32_le(bytes, at.crc32),
            foot_literal: read_u32_le(bytes, at.foot),
        })
    }

    /// Writes the known fields of `layout` over `out`, leaving padding as is.
    pub fn write_into(&self, out: &mut [u8], layout: HeaderLayout) {
        let at = layout.offsets();
        write_u32_le(out, at.head, self.head_literal);
        write_u32_le(out, at.engine, self.engine);
        write_u32_le(out, at.decompressed_file_size, self.decompressed_file_size);
        if let Some(offset) = at.compressed_padding {
            write_u32_le(out, offset, self.compressed_padding);
        }
        write_u32_le(out, at.tag_data_offset, self.tag_data_offset);
        write_u32_le(out, at.tag_data_size, self.tag_data_size);
        out[at.name..at.name + 32].copy_from_slice(&self.name);
        out[at.build..at.build + 32].copy_from_slice(&self.build);
        write_u16_le(out, at.map_type, self.map_type);
        write_u32_le(out, at.crc32, self.crc32);
        write_u32_le(out, at.foot, self.foot_literal);
    }

    pub fn to_bytes(&self, layout: HeaderLayout) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_SIZE];
        self.write_into(&mut out, layout);
        out
    }

    /// Detects the layout: demo first, by its own literals and engine value,
    /// then the standard layout.
    pub fn detect(bytes: &[u8]) -> Result<(Self, HeaderLayout), CacheHeaderError> {
        let demo = Self::read(bytes, HeaderLayout::Demo)?;
        if demo.has_literals(HeaderLayout::Demo) && demo.dialect() == Some(Dialect::Demo) {
            return Ok((demo, HeaderLayout::Demo));
        }
        let standard = Self::read(bytes, HeaderLayout::Standard)?;
        if standard.has_literals(HeaderLayout::Standard) {
            return Ok((standard, HeaderLayout::Standard));
        }
        Err(CacheHeaderError::InvalidHeader)
    }

    pub fn has_literals(&self, layout: HeaderLayout) -> bool {
        (self.head_literal, self.foot_literal) == layout.literals()
    }

    pub fn dialect(&self) -> Option<Dialect> {
        Dialect::from_u32(self.engine)
    }

    pub fn set_literals(&mut self, layout: HeaderLayout) {
        let (head, foot) = layout.literals();
        self.head_literal = head;
        self.foot_literal = foot;
    }

    pub fn name_str(&self) -> String {
        read_fixed_string(&self.name)
    }

    pub fn build_str(&self) -> String {
        read_fixed_string(&self.build)
    }

    /// Stores at most 31 bytes.
    pub fn set_name(&mut self, name: &str) {
        self.name = fixed_string(name);
    }

    pub fn set_build(&mut self, build: &str) {
        self.build = fixed_string(build);
    }
}

fn fixed_string(value: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    let len = value.len().min(31);
    out[..len].copy_from_slice(&value.as_bytes()[..len]);
    out
}
