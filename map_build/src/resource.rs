//! Resource map building and loading.
//!
//! Every tag is compiled on its own: dependencies are written as null
//! references and struct references hold struct indices. A resource holds
//! `count u32`, `offsets[count] u32` and the structs, in placement order.

use std::fs;
use std::path::Path;

use tag_format::{Dialect, ResourceMap, ResourceMapType, TagReference};
use tag_tree::TagSource;

use crate::compile::{run_post_compile, TagCompiler};
use crate::diagnostics::Diagnostics;
use crate::discovery::load_tag;
use crate::error::BuildError;
use crate::hooks::HookRegistry;
use crate::linker::{link, AddressMode, LinkedArtifact};
use crate::workload::{BuildOptions, BuildWorkload};

#[derive(Debug)]
pub struct ResourceBuildOutput {
    pub map: ResourceMap,
    pub diagnostics: Diagnostics,
}

pub fn build_resource_map(
    source: &dyn TagSource,
    map_type: ResourceMapType,
    tags: &[TagReference],
) -> Result<ResourceBuildOutput, BuildError> {
    build_resource_map_with_hooks(source, map_type, tags, &HookRegistry::standard())
}

pub fn build_resource_map_with_hooks(
    source: &dyn TagSource,
    map_type: ResourceMapType,
    tags: &[TagReference],
    hooks: &HookRegistry,
) -> Result<ResourceBuildOutput, BuildError> {
    let mut map = ResourceMap::new(map_type);
    let mut diagnostics = Diagnostics::new();
    for reference in tags {
        if !map_type.hosts(reference.class) {
            return Err(BuildError::NotHostedByResourceMap {
                tag: reference.to_string(),
                map_type: map_type.to_string(),
            });
        }
        let (data, tag_diagnostics) = compile_resource(source, reference, hooks)?;
        diagnostics.append(tag_diagnostics);
        map.push(map_type.resource_path(reference.class, &reference.path), data);
    }
    if diagnostics.has_errors() {
        return Err(BuildError::CompileFailed {
            errors: diagnostics.errors(),
            warnings: diagnostics.warnings(),
            diagnostics: diagnostics.as_slice().to_vec(),
        });
    }
    tracing::info!(map_type = %map_type, resources = map.resources.len(), "built resource map");
    Ok(ResourceBuildOutput { map, diagnostics })
}

fn compile_resource(
    source: &dyn TagSource,
    reference: &TagReference,
    hooks: &HookRegistry,
) -> Result<(Vec<u8>, Diagnostics), BuildError> {
    let (record, warning) = load_tag(source, reference, None)?;
    let mut workload = BuildWorkload::new(BuildOptions::new(
        Dialect::CustomEdition,
        reference.clone(),
    ));
    workload.standalone = true;
    workload.diagnostics.merge(warning.into_iter().collect());
    workload.push_tag(reference.clone(), record);

    TagCompiler::new(&mut workload, hooks).compile_all()?;
    run_post_compile(&mut workload, hooks)?;
    let linked = link(&workload, AddressMode::Index)?;
    Ok((resource_bytes(&linked), workload.diagnostics))
}

fn resource_bytes(linked: &LinkedArtifact) -> Vec<u8> {
    let mut placements: Vec<_> = linked.placements.iter().flatten().copied().collect();
    placements.sort_unstable_by_key(|placement| placement.index);
    placements.dedup_by_key(|placement| placement.index);
    let offsets: Vec<usize> = placements.iter().map(|placement| placement.offset).collect();

    let mut out = Vec::with_capacity(4 + offsets.len() * 4 + linked.blob.len());
    out.extend_from_slice(&(offsets.len() as u32).to_le_bytes());
    for offset in &offsets {
        out.extend_from_slice(&(*offset as u32).to_le_bytes());
    }
    out.extend_from_slice(&linked.blob);
    out
}

pub fn load_resource_map(path: &Path) -> Result<ResourceMap, BuildError> {
    let bytes = fs::read(path).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let map = ResourceMap::decode(&bytes)?;
    tracing::debug!(
        path = %path.display(),
        map_type = %map.map_type,
        resources = map.resources.len(),
        "loaded resource map"
    );
    Ok(map)
}

pub fn load_resource_maps<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<ResourceMap>, BuildError> {
    paths
        .iter()
        .map(|path| load_resource_map(path.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, reference};
    use tag_format::bytes::read_u32_le;
    use tag_format::definitions::SOUND;
    use tag_format::{Record, TagClass, NULL_ID};
    use tag_tree::MemoryTagSource;

    #[test]
    fn builds_indexed_resources() {
        let source = fixtures::sample_tree();
        let tags = vec![
            reference(TagClass::Bitmap, "ui\\glow"),
            reference(TagClass::Bitmap, "ui\\hud\\crosshair"),
        ];
        let output =
            build_resource_map(&source, ResourceMapType::Bitmaps, &tags).expect("resource map");
        let decoded = ResourceMap::decode(&output.map.encode().expect("encode")).expect("decode");
        assert_eq!(decoded.resources.len(), 2);
        assert_eq!(decoded.resources[1].path, "ui\\hud\\crosshair");
        assert_eq!(
            decoded.find(TagClass::Bitmap, &tags[1].path),
            Some(1)
        );

        let data = &decoded.resources[1].data;
        let count = read_u32_le(data, 0) as usize;
        assert!(count >= 2);
        assert_eq!(read_u32_le(data, 4), 0);
        // Sequence reflexive of the root points at struct #1.
        let blob = &data[4 + count * 4..];
        let sequences = tag_format::definitions::BITMAP
            .field("bitmap_group_sequence")
            .expect("field")
            .offset;
        assert_eq!(read_u32_le(blob, sequences + 4), 1);
    }

    #[test]
    fn dependencies_become_null() {
        let mut source = MemoryTagSource::new();
        let mut sound = Record::new(&SOUND);
        sound
            .set_dependency("promotion_sound", Some(reference(TagClass::Sound, "sound\\b")))
            .expect("promotion");
        sound.push_element("pitch_ranges").expect("pitch range");
        let a = reference(TagClass::Sound, "sound\\a");
        fixtures::insert(&mut source, &a, &sound);

        let output = build_resource_map(&source, ResourceMapType::Sounds, &[a]).expect("build");
        let data = &output.map.resources[0].data;
        let count = read_u32_le(data, 0) as usize;
        let blob = &data[4 + count * 4..];
        let promotion = SOUND.field("promotion_sound").expect("field").offset;
        assert_eq!(read_u32_le(blob, promotion + 4), NULL_ID);
        assert_eq!(read_u32_le(blob, promotion + 12), NULL_ID);
    }

    #[test]
    fn unhosted_classes_are_rejected() {
        let source = fixtures::sample_tree();
        let err = build_resource_map(
            &source,
            ResourceMapType::Bitmaps,
            &[reference(TagClass::Sound, "sound\\thump")],
        )
        .expect_err("not hosted");
        assert!(matches!(err, BuildError::NotHostedByResourceMap { .. }));
    }

    #[test]
    fn loc_paths_carry_the_extension() {
        let source = fixtures::sample_tree();
        let names = reference(TagClass::UnicodeStringList, "ui\\names");
        let output =
            build_resource_map(&source, ResourceMapType::Loc, &[names.clone()]).expect("build");
        assert_eq!(output.map.resources[0].path, "ui\\names.unicode_string_list");
        assert_eq!(output.map.find(names.class, &names.path), Some(0));
    }

    #[test]
    fn loads_maps_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sounds.map");
        let mut map = ResourceMap::new(ResourceMapType::Sounds);
        map.push("sound\\a", vec![1, 2, 3, 4]);
        fs::write(&path, map.encode().expect("encode")).expect("write");

        let loaded = load_resource_maps(&[path]).expect("load");
        assert_eq!(loaded, vec![map]);
        assert!(matches!(
            load_resource_map(&dir.path().join("missing.map")),
            Err(BuildError::Io { .. })
        ));
    }
}
