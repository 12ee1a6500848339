//! Turns parsed records into compiled structs.
//!
//! Each tag yields a root struct plus one contiguous struct per non-empty
//! reflexive and one blob per non-empty data field. Structs are reserved in
//! pre-order (parent before children, children depth-first in field order)
//! and that reservation order is the placement order used by the linker.

use tag_format::bytes::{read_u16_le, read_u32_le, write_u32_le};
use tag_format::schema::{
    FieldKind, DATA_LENGTH, DATA_POINTER, DATA_SIZE, DEPENDENCY_PATH_POINTER, DEPENDENCY_TAG_ID,
};
use tag_format::{Record, StructDef, NULL_ID};

use crate::diagnostics::{Diagnostic, Severity};
use crate::error::CompileError;
use crate::hooks::{HookRegistry, PostCompile, PreCompile};
use crate::structs::{
    CompiledStruct, ReferenceKind, ReferenceSite, StructIndex, STRUCT_ALIGNMENT,
};
use crate::workload::{BuildWorkload, DependencyEdge, PostCompileSite, TagIndex};

pub struct TagCompiler<'a> {
    workload: &'a mut BuildWorkload,
    hooks: &'a HookRegistry,
}

impl<'a> TagCompiler<'a> {
    pub fn new(workload: &'a mut BuildWorkload, hooks: &'a HookRegistry) -> Self {
        Self { workload, hooks }
    }

    /// Compiles every tag in index order.
    pub fn compile_all(&mut self) -> Result<(), CompileError> {
        for index in 0..self.workload.tags.len() {
            self.compile_tag(TagIndex(index))?;
        }
        tracing::info!(
            tags = self.workload.tags.len(),
            structs = self.workload.structs.len(),
            "compiled tags"
        );
        Ok(())
    }

    pub fn compile_tag(&mut self, tag: TagIndex) -> Result<StructIndex, CompileError> {
        let entry = &self.workload.tags[tag.0];
        let record = entry.record.clone();
        let name = entry.name();
        tracing::debug!(tag = %name, "compiling");

        let root = self.workload.structs.reserve();
        self.workload.tags[tag.0].root_struct = Some(root);
        self.compile_array(tag, &name, record.def(), vec![record], None, root, false)?;
        Ok(root)
    }

    /// Freezes `elements` into the struct reserved at `index`.
    ///
    /// `field` is the locator of the owning reflexive; `None` for a tag root.
    #[allow(clippy::too_many_arguments)]
    fn compile_array(
        &mut self,
        tag: TagIndex,
        tag_name: &str,
        def: &'static StructDef,
        elements: Vec<Record>,
        field: Option<&str>,
        index: StructIndex,
        dedupable: bool,
    ) -> Result<(), CompileError> {
        let hooks = self.hooks;
        let hook = hooks.get(def.name);
        let dedupable = dedupable && !hook.map_or(false, |hook| hook.mutates_after_compile());
        let size = def.size();
        let count = elements.len();
        let mut data = vec![0u8; size * count];
        let mut sites = Vec::new();

        for (element_index, mut element) in elements.into_iter().enumerate() {
            let locator = match field {
                Some(field) => format!("{}[{}]", field, element_index),
                None => String::new(),
            };
            self.validate(tag_name, &locator, &mut element);

            let mut adjusted = Vec::new();
            if let Some(hook) = hook {
                let mut ctx = PreCompile {
                    record: &mut element,
                    dialect: self.workload.dialect(),
                    tag,
                    tag_name,
                    locator: &locator,
                    element_index,
                    diagnostics: &mut self.workload.diagnostics,
                    adjusted: Vec::new(),
                };
                hook.pre_compile(&mut ctx)
                    .map_err(|err| err.in_tag(tag_name, &locator))?;
                adjusted = ctx.adjusted;
            }

            let base = element_index * size;
            data[base..base + size].copy_from_slice(element.bytes());

            for layout in def.layout() {
                let at = base + layout.offset;
                match layout.field.kind {
                    FieldKind::Dependency(classes) => {
                        let target = match element.dependency_at(layout.offset) {
                            None => None,
                            Some(_) if self.workload.standalone => None,
                            Some(reference) => match self.workload.find_tag(reference) {
                                Some(target) => Some(target),
                                // Reported as a wrong-class error during discovery.
                                None if !classes.is_empty()
                                    && !classes.contains(&reference.class) =>
                                {
                                    None
                                }
                                None => {
                                    let field = match locator.is_empty() {
                                        true => layout.field.name.to_string(),
                                        false => format!("{}.{}", locator, layout.field.name),
                                    };
                                    return Err(CompileError::Fatal(format!(
                                        "{} is not part of the build",
                                        reference
                                    ))
                                    .in_tag(tag_name, &field));
                                }
                            },
                        };
                        data[at + DEPENDENCY_PATH_POINTER..at + DEPENDENCY_TAG_ID].fill(0);
                        write_u32_le(&mut data, at + DEPENDENCY_TAG_ID, NULL_ID);
                        sites.push(ReferenceSite {
                            offset: at,
                            kind: ReferenceKind::TagDependency(target),
                        });
                        if let Some(target) = target {
                            self.workload.edges.push(DependencyEdge {
                                source: index,
                                offset: at,
                                target,
                                adjust_size: adjusted.contains(&layout.offset),
                            });
                        }
                    }
                    FieldKind::Reflexive {
                        def: child_def,
                        maximum,
                    } => {
                        let children = element.take_reflexive_at(layout.offset);
                        let child_locator = match locator.is_empty() {
                            true => layout.field.name.to_string(),
                            false => format!("{}.{}", locator, layout.field.name),
                        };
                        if children.len() > maximum as usize {
                            self.workload.diagnostics.push(Diagnostic::new(
                                Severity::Error,
                                tag_name,
                                child_locator.clone(),
                                format!(
                                    "{} elements exceed the maximum of {}",
                                    children.len(),
                                    maximum
                                ),
                            ));
                        }
                        data[at..at + 12].fill(0);
                        write_u32_le(&mut data, at, children.len() as u32);
                        if children.is_empty() {
                            continue;
                        }
                        let child = self.workload.structs.reserve();
                        sites.push(ReferenceSite {
                            offset: at,
                            kind: ReferenceKind::Reflexive(child),
                        });
                        self.compile_array(
                            tag,
                            tag_name,
                            child_def,
                            children,
                            Some(&child_locator),
                            child,
                            true,
                        )?;
                    }
                    FieldKind::Data => {
                        let blob = element.take_data_at(layout.offset);
                        data[at..at + DATA_SIZE].fill(0);
                        write_u32_le(&mut data, at + DATA_LENGTH, blob.len() as u32);
                        if blob.is_empty() {
                            continue;
                        }
                        let blob = self.workload.structs.push(CompiledStruct::blob(blob, tag));
                        sites.push(ReferenceSite {
                            offset: at + DATA_POINTER,
                            kind: ReferenceKind::StructPointer(blob),
                        });
                    }
                    _ => {}
                }
            }

            if hook.is_some() {
                self.workload.post_sites.push(PostCompileSite {
                    tag,
                    def,
                    structure: index,
                    element_index,
                    element_offset: base,
                    locator,
                });
            }
        }

        self.workload.structs.set(
            index,
            CompiledStruct {
                data,
                alignment: STRUCT_ALIGNMENT,
                sites,
                origin: Some(tag),
                def: Some(def),
                element_count: count,
                dedupable,
            },
        );
        Ok(())
    }

    /// Range-checks enums and clears flag bits the definition does not name.
    fn validate(&mut self, tag_name: &str, locator: &str, element: &mut Record) {
        let def = element.def();
        for layout in def.layout() {
            let offset = layout.offset;
            match layout.field.kind {
                FieldKind::Enum16(names) => {
                    let value = read_u16_le(element.bytes(), offset);
                    if usize::from(value) >= names.len() {
                        let field = match locator.is_empty() {
                            true => layout.field.name.to_string(),
                            false => format!("{}.{}", locator, layout.field.name),
                        };
                        self.workload.diagnostics.push(Diagnostic::new(
                            Severity::Error,
                            tag_name,
                            field,
                            format!(
                                "enum value {} is out of range (must be less than {})",
                                value,
                                names.len()
                            ),
                        ));
                    }
                }
                kind @ (FieldKind::Flags8(_) | FieldKind::Flags16(_) | FieldKind::Flags32(_)) => {
                    let Some(mask) = kind.flag_mask() else {
                        continue;
                    };
                    let bytes = element.bytes_mut();
                    match kind.size() {
                        1 => bytes[offset] &= mask as u8,
                        2 => {
                            let value = read_u16_le(bytes, offset) & mask as u16;
                            bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
                        }
                        _ => {
                            let value = read_u32_le(bytes, offset) & mask;
                            write_u32_le(bytes, offset, value);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

/// Runs every queued post-compile hook once the whole closure is compiled.
pub fn run_post_compile(
    workload: &mut BuildWorkload,
    hooks: &HookRegistry,
) -> Result<(), CompileError> {
    let sites = std::mem::take(&mut workload.post_sites);
    for site in &sites {
        let Some(hook) = hooks.get(site.def.name) else {
            continue;
        };
        let tag_name = workload.tag_name(site.tag);
        let mut ctx = PostCompile {
            workload: &mut *workload,
            site,
            mutable: hook.mutates_after_compile(),
        };
        hook.post_compile(&mut ctx)
            .map_err(|err| err.in_tag(&tag_name, &site.locator))?;
    }
    workload.post_sites = sites;
    Ok(())
}
