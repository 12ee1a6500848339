//! Declarative layout of every compiled struct.
//!
//! A [`StructDef`] is an ordered list of fixed-width fields. The same layout
//! describes a struct in a big-endian source tag file and in the
//! little-endian cache file; only the byte order of each scalar differs.

use thiserror::Error;

use crate::tag_class::TagClass;

pub const DEPENDENCY_SIZE: usize = 16;
pub const REFLEXIVE_SIZE: usize = 12;
pub const DATA_SIZE: usize = 20;

/// Offsets inside a 16 byte dependency field.
pub const DEPENDENCY_CLASS: usize = 0;
pub const DEPENDENCY_PATH_POINTER: usize = 4;
pub const DEPENDENCY_PATH_SIZE: usize = 8;
pub const DEPENDENCY_TAG_ID: usize = 12;

/// Offsets inside a 12 byte reflexive field.
pub const REFLEXIVE_COUNT: usize = 0;
pub const REFLEXIVE_POINTER: usize = 4;

/// Offsets inside a 20 byte data field.
pub const DATA_LENGTH: usize = 0;
pub const DATA_FILE_OFFSET: usize = 8;
pub const DATA_POINTER: usize = 12;

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    /// Radians.
    Angle,
    Enum16(&'static [&'static str]),
    Flags8(&'static [&'static str]),
    Flags16(&'static [&'static str]),
    Flags32(&'static [&'static str]),
    String32,
    Pad(usize),
    /// Reference to another tag. An empty class list accepts any class.
    Dependency(&'static [TagClass]),
    Reflexive {
        def: &'static StructDef,
        maximum: u32,
    },
    Data,
}

impl FieldKind {
    pub fn size(&self) -> usize {
        match self {
            FieldKind::I8 | FieldKind::U8 | FieldKind::Flags8(_) => 1,
            FieldKind::I16 | FieldKind::U16 | FieldKind::Enum16(_) | FieldKind::Flags16(_) => 2,
            FieldKind::I32
            | FieldKind::U32
            | FieldKind::F32
            | FieldKind::Angle
            | FieldKind::Flags32(_) => 4,
            FieldKind::String32 => 32,
            FieldKind::Pad(len) => *len,
            FieldKind::Dependency(_) => DEPENDENCY_SIZE,
            FieldKind::Reflexive { .. } => REFLEXIVE_SIZE,
            FieldKind::Data => DATA_SIZE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::I8 => "int8",
            FieldKind::U8 => "uint8",
            FieldKind::I16 => "int16",
            FieldKind::U16 => "uint16",
            FieldKind::I32 => "int32",
            FieldKind::U32 => "uint32",
            FieldKind::F32 => "float",
            FieldKind::Angle => "angle",
            FieldKind::Enum16(_) => "enum",
            FieldKind::Flags8(_) | FieldKind::Flags16(_) | FieldKind::Flags32(_) => "flags",
            FieldKind::String32 => "string",
            FieldKind::Pad(_) => "padding",
            FieldKind::Dependency(_) => "dependency",
            FieldKind::Reflexive { .. } => "reflexive",
            FieldKind::Data => "data",
        }
    }

    /// Mask of the declared bits of a flags field.
    pub fn flag_mask(&self) -> Option<u32> {
        let names = match self {
            FieldKind::Flags8(names) | FieldKind::Flags16(names) | FieldKind::Flags32(names) => {
                names
            }
            _ => return None,
        };
        if names.len() >= 32 {
            Some(u32::MAX)
        } else {
            Some((1u32 << names.len()) - 1)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

pub const fn field(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef { name, kind }
}

#[derive(Debug)]
pub struct StructDef {
    pub name: &'static str,
    pub fields: &'static [FieldDef],
}

#[derive(Debug, Clone, Copy)]
pub struct FieldLayout {
    pub offset: usize,
    pub field: &'static FieldDef,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("{structure} has no field named '{field}'")]
    UnknownField {
        structure: &'static str,
        field: String,
    },
    #[error("{structure}.{field} is a {actual} field, not {expected}")]
    WrongKind {
        structure: &'static str,
        field: &'static str,
        actual: &'static str,
        expected: &'static str,
    },
}

impl StructDef {
    pub fn size(&self) -> usize {
        self.fields.iter().map(|field| field.kind.size()).sum()
    }

    pub fn layout(&self) -> impl Iterator<Item = FieldLayout> {
        let fields: &'static [FieldDef] = self.fields;
        fields.iter().scan(0usize, |offset, field| {
            let at = *offset;
            *offset += field.kind.size();
            Some(FieldLayout { offset: at, field })
        })
    }

    pub fn field(&self, name: &str) -> Result<FieldLayout, FieldError> {
        self.layout()
            .find(|layout| layout.field.name == name)
            .ok_or_else(|| FieldError::UnknownField {
                structure: self.name,
                field: name.to_string(),
            })
    }

    /// Looks up `name` and checks its kind with `accept`.
    pub fn expect_field(
        &self,
        name: &str,
        expected: &'static str,
        accept: fn(&FieldKind) -> bool,
    ) -> Result<FieldLayout, FieldError> {
        let layout = self.field(name)?;
        if accept(&layout.field.kind) {
            Ok(layout)
        } else {
            Err(FieldError::WrongKind {
                structure: self.name,
                field: layout.field.name,
                actual: layout.field.kind.name(),
                expected,
            })
        }
    }

    /// Converts one struct between big- and little-endian in place.
    pub fn swap_endianness(&self, bytes: &mut [u8]) {
        for layout in self.layout() {
            let start = layout.offset;
            let kind = layout.field.kind;
            match kind {
                FieldKind::I8
                | FieldKind::U8
                | FieldKind::Flags8(_)
                | FieldKind::String32
                | FieldKind::Pad(_) => {}
                FieldKind::I16 | FieldKind::U16 | FieldKind::Enum16(_) | FieldKind::Flags16(_) => {
                    bytes[start..start + 2].reverse()
                }
                FieldKind::I32
                | FieldKind::U32
                | FieldKind::F32
                | FieldKind::Angle
                | FieldKind::Flags32(_) => bytes[start..start + 4].reverse(),
                FieldKind::Dependency(_) | FieldKind::Reflexive { .. } | FieldKind::Data => {
                    for word in bytes[start..start + kind.size()].chunks_exact_mut(4) {
                        word.reverse();
                    }
                }
            }
        }
    }
}
