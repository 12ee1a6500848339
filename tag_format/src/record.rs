//! Parsed, mutable form of one struct and everything hanging off it.

use std::collections::BTreeMap;

use crate::bytes::{read_fixed_string, read_u16_le, read_u32_le, write_u16_le, write_u32_le};
use crate::schema::{
    FieldError, FieldKind, FieldLayout, StructDef, DEPENDENCY_CLASS, DEPENDENCY_TAG_ID,
};
use crate::tag_class::TagClass;
use crate::tag_path::TagPath;
use crate::NULL_ID;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagReference {
    pub class: TagClass,
    pub path: TagPath,
}

impl TagReference {
    pub fn new(class: TagClass, path: TagPath) -> Self {
        Self { class, path }
    }
}

impl std::fmt::Display for TagReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path.with_extension(self.class))
    }
}

/// A dependency found while walking a record tree.
#[derive(Debug, Clone)]
pub struct DependencyUse {
    /// Field locator such as `crosshairs[1].crosshair_bitmap`.
    pub locator: String,
    pub classes: &'static [TagClass],
    pub reference: TagReference,
}

impl DependencyUse {
    pub fn class_allowed(&self) -> bool {
        self.classes.is_empty() || self.classes.contains(&self.reference.class)
    }
}

fn is_u8(kind: &FieldKind) -> bool {
    matches!(kind, FieldKind::U8 | FieldKind::I8 | FieldKind::Flags8(_))
}

fn is_u16(kind: &FieldKind) -> bool {
    matches!(
        kind,
        FieldKind::U16 | FieldKind::I16 | FieldKind::Enum16(_) | FieldKind::Flags16(_)
    )
}

fn is_u32(kind: &FieldKind) -> bool {
    matches!(kind, FieldKind::U32 | FieldKind::I32 | FieldKind::Flags32(_))
}

fn is_f32(kind: &FieldKind) -> bool {
    matches!(kind, FieldKind::F32 | FieldKind::Angle)
}

fn is_string(kind: &FieldKind) -> bool {
    matches!(kind, FieldKind::String32)
}

fn is_dependency(kind: &FieldKind) -> bool {
    matches!(kind, FieldKind::Dependency(_))
}

fn is_reflexive(kind: &FieldKind) -> bool {
    matches!(kind, FieldKind::Reflexive { .. })
}

fn is_data(kind: &FieldKind) -> bool {
    matches!(kind, FieldKind::Data)
}

/// Read-only typed access to one little-endian struct.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    def: &'static StructDef,
    bytes: &'a [u8],
}

impl<'a> Fields<'a> {
    /// `bytes` must hold at least `def.size()` bytes.
    pub fn new(def: &'static StructDef, bytes: &'a [u8]) -> Self {
        Self { def, bytes }
    }

    pub fn def(&self) -> &'static StructDef {
        self.def
    }

    pub fn bytes(&self) -> &'a [u8] {
        &self.bytes[..self.def.size()]
    }

    pub fn u8(&self, name: &str) -> Result<u8, FieldError> {
        let layout = self.def.expect_field(name, "8-bit", is_u8)?;
        Ok(self.bytes[layout.offset])
    }

    pub fn i8(&self, name: &str) -> Result<i8, FieldError> {
        Ok(self.u8(name)? as i8)
    }

    pub fn u16(&self, name: &str) -> Result<u16, FieldError> {
        let layout = self.def.expect_field(name, "16-bit", is_u16)?;
        Ok(read_u16_le(self.bytes, layout.offset))
    }

    pub fn i16(&self, name: &str) -> Result<i16, FieldError> {
        Ok(self.u16(name)? as i16)
    }

    pub fn u32(&self, name: &str) -> Result<u32, FieldError> {
        let layout = self.def.expect_field(name, "32-bit", is_u32)?;
        Ok(read_u32_le(self.bytes, layout.offset))
    }

    pub fn i32(&self, name: &str) -> Result<i32, FieldError> {
        Ok(self.u32(name)? as i32)
    }

    pub fn f32(&self, name: &str) -> Result<f32, FieldError> {
        let layout = self.def.expect_field(name, "float", is_f32)?;
        Ok(f32::from_bits(read_u32_le(self.bytes, layout.offset)))
    }

    pub fn string32(&self, name: &str) -> Result<String, FieldError> {
        let layout = self.def.expect_field(name, "string", is_string)?;
        Ok(read_fixed_string(
            &self.bytes[layout.offset..layout.offset + 32],
        ))
    }

    pub fn reflexive_count(&self, name: &str) -> Result<u32, FieldError> {
        let layout = self.def.expect_field(name, "reflexive", is_reflexive)?;
        Ok(read_u32_le(self.bytes, layout.offset))
    }

    pub fn dependency_tag_id(&self, name: &str) -> Result<u32, FieldError> {
        let layout = self.def.expect_field(name, "dependency", is_dependency)?;
        Ok(read_u32_le(self.bytes, layout.offset + DEPENDENCY_TAG_ID))
    }
}

/// One struct plus its reflexive children, dependency paths and data blobs.
///
/// Scalars are kept little-endian in `bytes`. Variable-length parts live
/// beside the bytes, keyed by the offset of the owning field; counts, sizes
/// and pointers inside `bytes` are only meaningful once compiled.
#[derive(Debug, Clone)]
pub struct Record {
    def: &'static StructDef,
    bytes: Vec<u8>,
    reflexives: BTreeMap<usize, Vec<Record>>,
    dependencies: BTreeMap<usize, TagReference>,
    data: BTreeMap<usize, Vec<u8>>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.def, other.def)
            && self.bytes == other.bytes
            && self.reflexives == other.reflexives
            && self.dependencies == other.dependencies
            && self.data == other.data
    }
}

impl Record {
    /// Zeroed record with null dependencies.
    pub fn new(def: &'static StructDef) -> Self {
        let mut record = Self::from_bytes(def, vec![0; def.size()]);
        record.clear_reference_slots();
        record
    }

    /// Wraps little-endian struct bytes; `bytes.len()` must equal `def.size()`.
    pub(crate) fn from_bytes(def: &'static StructDef, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), def.size());
        Self {
            def,
            bytes,
            reflexives: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            data: BTreeMap::new(),
        }
    }

    /// Zeroes every count, size and pointer slot; null tag ids become the sentinel.
    pub(crate) fn clear_reference_slots(&mut self) {
        for layout in self.def.layout() {
            let start = layout.offset;
            match layout.field.kind {
                FieldKind::Dependency(_) => {
                    self.bytes[start + 4..start + 12].fill(0);
                    write_u32_le(&mut self.bytes, start + DEPENDENCY_TAG_ID, NULL_ID);
                    if read_u32_le(&self.bytes, start + DEPENDENCY_CLASS) == 0 {
                        write_u32_le(&mut self.bytes, start + DEPENDENCY_CLASS, NULL_ID);
                    }
                }
                FieldKind::Reflexive { .. } => self.bytes[start..start + 12].fill(0),
                FieldKind::Data => self.bytes[start..start + 20].fill(0),
                _ => {}
            }
        }
    }

    pub fn def(&self) -> &'static StructDef {
        self.def
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn fields(&self) -> Fields<'_> {
        Fields::new(self.def, &self.bytes)
    }

    pub fn get_u8(&self, name: &str) -> Result<u8, FieldError> {
        self.fields().u8(name)
    }

    pub fn get_i8(&self, name: &str) -> Result<i8, FieldError> {
        self.fields().i8(name)
    }

    pub fn get_u16(&self, name: &str) -> Result<u16, FieldError> {
        self.fields().u16(name)
    }

    pub fn get_i16(&self, name: &str) -> Result<i16, FieldError> {
        self.fields().i16(name)
    }

    pub fn get_u32(&self, name: &str) -> Result<u32, FieldError> {
        self.fields().u32(name)
    }

    pub fn get_i32(&self, name: &str) -> Result<i32, FieldError> {
        self.fields().i32(name)
    }

    pub fn get_f32(&self, name: &str) -> Result<f32, FieldError> {
        self.fields().f32(name)
    }

    pub fn get_string32(&self, name: &str) -> Result<String, FieldError> {
        self.fields().string32(name)
    }

    pub fn set_u8(&mut self, name: &str, value: u8) -> Result<(), FieldError> {
        let layout = self.def.expect_field(name, "8-bit", is_u8)?;
        self.bytes[layout.offset] = value;
        Ok(())
    }

    pub fn set_i8(&mut self, name: &str, value: i8) -> Result<(), FieldError> {
        self.set_u8(name, value as u8)
    }

    pub fn set_u16(&mut self, name: &str, value: u16) -> Result<(), FieldError> {
        let layout = self.def.expect_field(name, "16-bit", is_u16)?;
        write_u16_le(&mut self.bytes, layout.offset, value);
        Ok(())
    }

    pub fn set_i16(&mut self, name: &str, value: i16) -> Result<(), FieldError> {
        self.set_u16(name, value as u16)
    }

    pub fn set_u32(&mut self, name: &str, value: u32) -> Result<(), FieldError> {
        let layout = self.def.expect_field(name, "32-bit", is_u32)?;
        write_u32_le(&mut self.bytes, layout.offset, value);
        Ok(())
    }

    pub fn set_i32(&mut self, name: &str, value: i32) -> Result<(), FieldError> {
        self.set_u32(name, value as u32)
    }

    pub fn set_f32(&mut self, name: &str, value: f32) -> Result<(), FieldError> {
        let layout = self.def.expect_field(name, "float", is_f32)?;
        write_u32_le(&mut self.bytes, layout.offset, value.to_bits());
        Ok(())
    }

    /// Stores at most 31 bytes so the field stays NUL terminated.
    pub fn set_string32(&mut self, name: &str, value: &str) -> Result<(), FieldError> {
        let layout = self.def.expect_field(name, "string", is_string)?;
        let slot = &mut self.bytes[layout.offset..layout.offset + 32];
        slot.fill(0);
        let len = value.len().min(31);
        slot[..len].copy_from_slice(&value.as_bytes()[..len]);
        Ok(())
    }

    pub fn dependency(&self, name: &str) -> Result<Option<&TagReference>, FieldError> {
        let layout = self.def.expect_field(name, "dependency", is_dependency)?;
        Ok(self.dependencies.get(&layout.offset))
    }

    pub fn set_dependency(
        &mut self,
        name: &str,
        reference: Option<TagReference>,
    ) -> Result<(), FieldError> {
        let layout = self.def.expect_field(name, "dependency", is_dependency)?;
        match reference {
            Some(reference) => {
                write_u32_le(
                    &mut self.bytes,
                    layout.offset + DEPENDENCY_CLASS,
                    reference.class.fourcc(),
                );
                self.dependencies.insert(layout.offset, reference);
            }
            None => {
                self.dependencies.remove(&layout.offset);
            }
        }
        Ok(())
    }

    pub fn reflexive(&self, name: &str) -> Result<&[Record], FieldError> {
        let layout = self.def.expect_field(name, "reflexive", is_reflexive)?;
        Ok(self.reflexive_at(layout.offset))
    }

    pub fn reflexive_mut(&mut self, name: &str) -> Result<&mut Vec<Record>, FieldError> {
        let layout = self.def.expect_field(name, "reflexive", is_reflexive)?;
        Ok(self.reflexives.entry(layout.offset).or_default())
    }

    /// Appends a zeroed element to a reflexive and returns it.
    pub fn push_element(&mut self, name: &str) -> Result<&mut Record, FieldError> {
        let layout = self.def.field(name)?;
        let child = match layout.field.kind {
            FieldKind::Reflexive { def, .. } => def,
            other => {
                return Err(FieldError::WrongKind {
                    structure: self.def.name,
                    field: layout.field.name,
                    actual: other.name(),
                    expected: "reflexive",
                })
            }
        };
        let elements = self.reflexives.entry(layout.offset).or_default();
        elements.push(Record::new(child));
        let last = elements.len() - 1;
        Ok(&mut elements[last])
    }

    pub fn data(&self, name: &str) -> Result<&[u8], FieldError> {
        let layout = self.def.expect_field(name, "data", is_data)?;
        Ok(self.data_at(layout.offset))
    }

    pub fn set_data(&mut self, name: &str, value: Vec<u8>) -> Result<(), FieldError> {
        let layout = self.def.expect_field(name, "data", is_data)?;
        if value.is_empty() {
            self.data.remove(&layout.offset);
        } else {
            self.data.insert(layout.offset, value);
        }
        Ok(())
    }

    pub fn reflexive_at(&self, offset: usize) -> &[Record] {
        self.reflexives
            .get(&offset)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn take_reflexive_at(&mut self, offset: usize) -> Vec<Record> {
        self.reflexives.remove(&offset).unwrap_or_default()
    }

    pub(crate) fn set_reflexive_at(&mut self, offset: usize, elements: Vec<Record>) {
        if !elements.is_empty() {
            self.reflexives.insert(offset, elements);
        }
    }

    pub fn dependency_at(&self, offset: usize) -> Option<&TagReference> {
        self.dependencies.get(&offset)
    }

    pub(crate) fn set_dependency_at(&mut self, offset: usize, reference: TagReference) {
        self.dependencies.insert(offset, reference);
    }

    pub fn data_at(&self, offset: usize) -> &[u8] {
        self.data.get(&offset).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn take_data_at(&mut self, offset: usize) -> Vec<u8> {
        self.data.remove(&offset).unwrap_or_default()
    }

    pub(crate) fn set_data_at(&mut self, offset: usize, value: Vec<u8>) {
        if !value.is_empty() {
            self.data.insert(offset, value);
        }
    }

    /// Every non-null dependency in field order, descending into reflexives
    /// at the position of the reflexive field.
    pub fn dependencies_recursive(&self) -> Vec<DependencyUse> {
        let mut out = Vec::new();
        self.collect_dependencies("", &mut out);
        out
    }

    fn collect_dependencies(&self, prefix: &str, out: &mut Vec<DependencyUse>) {
        for FieldLayout { offset, field } in self.def.layout() {
            match field.kind {
                FieldKind::Dependency(classes) => {
                    if let Some(reference) = self.dependencies.get(&offset) {
                        out.push(DependencyUse {
                            locator: format!("{}{}", prefix, field.name),
                            classes,
                            reference: reference.clone(),
                        });
                    }
                }
                FieldKind::Reflexive { .. } => {
                    for (index, element) in self.reflexive_at(offset).iter().enumerate() {
                        let nested = format!("{}{}[{}].", prefix, field.name, index);
                        element.collect_dependencies(&nested, out);
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions;

    fn path(value: &str) -> TagPath {
        TagPath::parse(value).expect("tag path")
    }

    #[test]
    fn new_record_has_null_dependencies() {
        let record = Record::new(&definitions::DAMAGE_EFFECT);
        assert_eq!(record.dependency("sound").expect("field"), None);
        let layout = definitions::DAMAGE_EFFECT.field("sound").expect("layout");
        assert_eq!(
            read_u32_le(record.bytes(), layout.offset + DEPENDENCY_TAG_ID),
            NULL_ID
        );
    }

    #[test]
    fn scalar_accessors_check_kinds() {
        let mut record = Record::new(&definitions::LENS_FLARE);
        record.set_f32("vertical_scale", 2.5).expect("set");
        assert_eq!(record.get_f32("vertical_scale").expect("get"), 2.5);
        let err = record.get_u16("vertical_scale").expect_err("kind");
        assert!(matches!(err, FieldError::WrongKind { .. }));
        let err = record.set_f32("no_such_field", 1.0).expect_err("unknown");
        assert!(matches!(err, FieldError::UnknownField { .. }));
    }

    #[test]
    fn string32_truncates_to_fit() {
        let mut record = Record::new(&definitions::BITMAP_GROUP_SEQUENCE);
        record.set_string32("name", &"x".repeat(40)).expect("set");
        assert_eq!(record.get_string32("name").expect("get").len(), 31);
    }

    #[test]
    fn dependencies_are_listed_in_field_order() {
        let mut hud = Record::new(&definitions::WEAPON_HUD_INTERFACE);
        hud.set_dependency(
            "child_hud",
            Some(TagReference::new(
                TagClass::WeaponHudInterface,
                path("weapons\\child"),
            )),
        )
        .expect("child");
        let crosshair = hud.push_element("crosshairs").expect("crosshair");
        crosshair
            .set_dependency(
                "crosshair_bitmap",
                Some(TagReference::new(TagClass::Bitmap, path("ui\\crosshair"))),
            )
            .expect("bitmap");

        let uses = hud.dependencies_recursive();
        let locators: Vec<&str> = uses.iter().map(|dep| dep.locator.as_str()).collect();
        assert_eq!(locators, vec!["child_hud", "crosshairs[0].crosshair_bitmap"]);
        assert!(uses.iter().all(DependencyUse::class_allowed));
    }
}
