//! Per-definition compile hooks.
//!
//! A hook is registered under the name of the [`StructDef`] it handles. The
//! root definition of a class stands for the asset type; element definitions
//! of reflexives may carry hooks of their own. `pre_compile` runs once per
//! element while its record is still editable, `post_compile` once per
//! element after the whole closure has been compiled.

mod bitmap;
mod damage_effect;
mod lens_flare;
mod scenario;
mod sound;
mod string_list;
mod weapon_hud_interface;

use std::collections::HashMap;
use std::fmt;

use tag_format::bytes::{read_u32_le, write_u16_le, write_u32_le};
use tag_format::record::Fields;
use tag_format::schema::FieldKind;
use tag_format::{Dialect, Record, StructDef, TagClass};

use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
use crate::error::CompileError;
use crate::structs::{CompiledStruct, ReferenceKind, StructIndex};
use crate::workload::{BuildWorkload, PostCompileSite, TagIndex};

pub trait CompileHook {
    fn pre_compile(&self, _ctx: &mut PreCompile<'_>) -> Result<(), CompileError> {
        Ok(())
    }

    fn post_compile(&self, _ctx: &mut PostCompile<'_>) -> Result<(), CompileError> {
        Ok(())
    }

    /// Whether `post_compile` patches the compiled element. Such elements
    /// never take part in deduplication.
    fn mutates_after_compile(&self) -> bool {
        false
    }
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<&'static str, Box<dyn CompileHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks for every supported asset type.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("bitmap", bitmap::BitmapHook);
        registry.register("damage_effect", damage_effect::DamageEffectHook);
        registry.register("lens_flare", lens_flare::LensFlareHook);
        registry.register("lens_flare_reflection", lens_flare::ReflectionHook);
        registry.register("scenario", scenario::ScenarioHook);
        registry.register("sound", sound::SoundHook);
        registry.register("sound_pitch_range", sound::PitchRangeHook);
        registry.register("string_list_string", string_list::StringHook { wide: false });
        registry.register(
            "unicode_string_list_string",
            string_list::StringHook { wide: true },
        );
        registry.register(
            "weapon_hud_interface",
            weapon_hud_interface::WeaponHudInterfaceHook,
        );
        registry.register(
            "weapon_hud_interface_crosshair",
            weapon_hud_interface::CrosshairHook,
        );
        registry.register("weapon_hud_interface_meter", weapon_hud_interface::MeterHook);
        registry.register(
            "weapon_hud_interface_static_element",
            weapon_hud_interface::StaticElementHook,
        );
        registry.register(
            "weapon_hud_interface_overlay_element",
            weapon_hud_interface::OverlayElementHook,
        );
        registry
    }

    pub fn register(&mut self, def_name: &'static str, hook: impl CompileHook + 'static) {
        self.hooks.insert(def_name, Box::new(hook));
    }

    pub fn get(&self, def_name: &str) -> Option<&dyn CompileHook> {
        self.hooks.get(def_name).map(Box::as_ref)
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.hooks.keys().collect();
        names.sort();
        f.debug_struct("HookRegistry").field("hooks", &names).finish()
    }
}

/// Editable view of one element before it is frozen.
pub struct PreCompile<'a> {
    pub(crate) record: &'a mut Record,
    pub(crate) dialect: Dialect,
    pub(crate) tag: TagIndex,
    pub(crate) tag_name: &'a str,
    pub(crate) locator: &'a str,
    pub(crate) element_index: usize,
    pub(crate) diagnostics: &'a mut Diagnostics,
    /// Field offsets whose dependency edges adjust the size budget.
    pub(crate) adjusted: Vec<usize>,
}

impl<'a> PreCompile<'a> {
    pub fn record(&self) -> &Record {
        self.record
    }

    pub fn record_mut(&mut self) -> &mut Record {
        self.record
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn tag(&self) -> TagIndex {
        self.tag
    }

    pub fn tag_name(&self) -> &str {
        self.tag_name
    }

    pub fn element_index(&self) -> usize {
        self.element_index
    }

    pub fn default_f32(&mut self, name: &str, value: f32) -> Result<(), CompileError> {
        if self.record.get_f32(name)? == 0.0 {
            self.record.set_f32(name, value)?;
        }
        Ok(())
    }

    pub fn default_i16(&mut self, name: &str, value: i16) -> Result<(), CompileError> {
        if self.record.get_i16(name)? == 0 {
            self.record.set_i16(name, value)?;
        }
        Ok(())
    }

    pub fn default_u16(&mut self, name: &str, value: u16) -> Result<(), CompileError> {
        if self.record.get_u16(name)? == 0 {
            self.record.set_u16(name, value)?;
        }
        Ok(())
    }

    /// Folds the referenced tag's budget into this tag's budget.
    pub fn add_dependency_adjust_size(&mut self, name: &str) -> Result<(), CompileError> {
        let layout = self.record.def().expect_field(name, "dependency", |kind| {
            matches!(kind, FieldKind::Dependency(_))
        })?;
        if !self.adjusted.contains(&layout.offset) {
            self.adjusted.push(layout.offset);
        }
        Ok(())
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.report(Severity::Warning, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.report(Severity::Error, message.into());
    }

    fn report(&mut self, severity: Severity, message: String) {
        self.diagnostics.push(Diagnostic::new(
            severity,
            self.tag_name,
            self.locator,
            message,
        ));
    }
}

/// Handle to one compiled element.
#[derive(Debug, Clone, Copy)]
pub struct StructView {
    pub structure: StructIndex,
    pub offset: usize,
    pub def: &'static StructDef,
}

/// Read access to the whole compiled closure for cross-tag checks.
pub struct PostCompile<'a> {
    pub(crate) workload: &'a mut BuildWorkload,
    pub(crate) site: &'a PostCompileSite,
    pub(crate) mutable: bool,
}

impl<'a> PostCompile<'a> {
    pub fn element(&self) -> StructView {
        StructView {
            structure: self.site.structure,
            offset: self.site.element_offset,
            def: self.site.def,
        }
    }

    pub fn element_index(&self) -> usize {
        self.site.element_index
    }

    pub fn tag(&self) -> TagIndex {
        self.site.tag
    }

    pub fn tag_name(&self, tag: TagIndex) -> String {
        self.workload.tag_name(tag)
    }

    pub fn tag_class(&self, tag: TagIndex) -> Option<TagClass> {
        self.workload.tag(tag).map(|entry| entry.reference.class)
    }

    pub fn dialect(&self) -> Dialect {
        self.workload.dialect()
    }

    pub fn fields(&self, view: StructView) -> Result<Fields<'_>, CompileError> {
        Ok(Fields::new(view.def, self.element_bytes(view)?))
    }

    /// Tag named by a dependency field of `view`.
    pub fn dependency(
        &self,
        view: StructView,
        name: &str,
    ) -> Result<Option<TagIndex>, CompileError> {
        let layout = view.def.expect_field(name, "dependency", |kind| {
            matches!(kind, FieldKind::Dependency(_))
        })?;
        let compiled = self.compiled(view.structure)?;
        match compiled.site_at(view.offset + layout.offset).map(|site| site.kind) {
            Some(ReferenceKind::TagDependency(target)) => Ok(target),
            _ => Ok(None),
        }
    }

    /// Root element of a compiled tag.
    pub fn root(&self, tag: TagIndex) -> Option<StructView> {
        let entry = self.workload.tag(tag)?;
        Some(StructView {
            structure: entry.root_struct?,
            offset: 0,
            def: entry.record.def(),
        })
    }

    /// Elements of a reflexive field of `view`.
    pub fn reflexive(&self, view: StructView, name: &str) -> Result<Vec<StructView>, CompileError> {
        let layout = view.def.expect_field(name, "reflexive", |kind| {
            matches!(kind, FieldKind::Reflexive { .. })
        })?;
        let FieldKind::Reflexive { def, .. } = layout.field.kind else {
            return Ok(Vec::new());
        };
        let count = self.fields(view)?.reflexive_count(name)? as usize;
        if count == 0 {
            return Ok(Vec::new());
        }
        let compiled = self.compiled(view.structure)?;
        match compiled.site_at(view.offset + layout.offset).map(|site| site.kind) {
            Some(ReferenceKind::Reflexive(child)) => Ok((0..count)
                .map(|index| StructView {
                    structure: child,
                    offset: index * def.size(),
                    def,
                })
                .collect()),
            _ => Err(CompileError::Fatal(format!(
                "{}.{} has {} elements but no compiled array",
                view.def.name, name, count
            ))),
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.report(Severity::Warning, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.report(Severity::Error, message.into());
    }

    pub fn set_u16(&mut self, view: StructView, name: &str, value: u16) -> Result<(), CompileError> {
        let offset = self.patch_offset(view, name, |kind| {
            matches!(
                kind,
                FieldKind::U16 | FieldKind::I16 | FieldKind::Enum16(_) | FieldKind::Flags16(_)
            )
        })?;
        write_u16_le(self.struct_bytes_mut(view.structure)?, offset, value);
        Ok(())
    }

    pub fn set_i16(&mut self, view: StructView, name: &str, value: i16) -> Result<(), CompileError> {
        self.set_u16(view, name, value as u16)
    }

    pub fn set_u32(&mut self, view: StructView, name: &str, value: u32) -> Result<(), CompileError> {
        let offset = self.patch_offset(view, name, |kind| {
            matches!(kind, FieldKind::U32 | FieldKind::I32 | FieldKind::Flags32(_))
        })?;
        write_u32_le(self.struct_bytes_mut(view.structure)?, offset, value);
        Ok(())
    }

    pub fn set_f32(&mut self, view: StructView, name: &str, value: f32) -> Result<(), CompileError> {
        let offset = self.patch_offset(view, name, |kind| {
            matches!(kind, FieldKind::F32 | FieldKind::Angle)
        })?;
        write_u32_le(self.struct_bytes_mut(view.structure)?, offset, value.to_bits());
        Ok(())
    }

    /// Raw little-endian word of `view` at `offset`.
    pub fn read_u32(&self, view: StructView, offset: usize) -> Result<u32, CompileError> {
        Ok(read_u32_le(self.element_bytes(view)?, offset))
    }

    fn report(&mut self, severity: Severity, message: String) {
        let tag = self.workload.tag_name(self.site.tag);
        self.workload.diagnostics.push(Diagnostic::new(
            severity,
            tag,
            self.site.locator.clone(),
            message,
        ));
    }

    fn compiled(&self, structure: StructIndex) -> Result<&CompiledStruct, CompileError> {
        self.workload
            .structs
            .get(structure)
            .ok_or_else(|| CompileError::Fatal(format!("struct {} does not exist", structure)))
    }

    fn element_bytes(&self, view: StructView) -> Result<&[u8], CompileError> {
        let compiled = self.compiled(view.structure)?;
        compiled
            .data
            .get(view.offset..view.offset + view.def.size())
            .ok_or_else(|| {
                CompileError::Fatal(format!(
                    "{} element at 0x{:X} lies outside struct {}",
                    view.def.name, view.offset, view.structure
                ))
            })
    }

    fn patch_offset(
        &self,
        view: StructView,
        name: &str,
        accept: fn(&FieldKind) -> bool,
    ) -> Result<usize, CompileError> {
        if !self.mutable || view.structure != self.site.structure {
            return Err(CompileError::Fatal(format!(
                "{} may not patch {}.{} after compilation",
                self.site.def.name, view.def.name, name
            )));
        }
        let layout = view.def.expect_field(name, "patchable", accept)?;
        self.element_bytes(view)?;
        Ok(view.offset + layout.offset)
    }

    fn struct_bytes_mut(&mut self, structure: StructIndex) -> Result<&mut [u8], CompileError> {
        self.workload
            .structs
            .get_mut(structure)
            .map(|compiled| compiled.data.as_mut_slice())
            .ok_or_else(|| CompileError::Fatal(format!("struct {} does not exist", structure)))
    }
}
