//! Placement and relocation of the compiled struct table.
//!
//! `link` externalizes tags found in loaded resource maps, merges identical
//! dedupable structs, places the survivors in table order, checks the result
//! against the tag space and finally writes every reference site.

use std::collections::HashMap;

use tag_format::bytes::write_u32_le;
use tag_format::cache_file::{tag_id, MAX_TAG_COUNT, TAG_ARRAY_ENTRY_SIZE, TAG_DATA_HEADER_SIZE};
use tag_format::schema::{
    DEPENDENCY_PATH_POINTER, DEPENDENCY_PATH_SIZE, DEPENDENCY_TAG_ID, REFLEXIVE_POINTER,
};
use tag_format::{align_up, TagClass, TagPath, NULL_ID};

use crate::error::LinkError;
use crate::structs::{ReferenceKind, StructIndex};
use crate::workload::{BuildWorkload, TagIndex};

/// How reference sites are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    /// Absolute address: `base + offset in the tag data region`.
    Pointer { base: u32 },
    /// Zero-based placement index of the target struct.
    Index,
}

/// Offsets inside the tag data region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionLayout {
    pub tag_array_offset: usize,
    pub paths_offset: usize,
    pub blob_offset: usize,
    /// Per tag, in tag order.
    pub path_offsets: Vec<usize>,
}

impl RegionLayout {
    fn for_tags(tags: &[LinkedTag]) -> Self {
        let tag_array_offset = TAG_DATA_HEADER_SIZE;
        let paths_offset = tag_array_offset + tags.len() * TAG_ARRAY_ENTRY_SIZE;
        let mut cursor = paths_offset;
        let mut path_offsets = Vec::with_capacity(tags.len());
        for tag in tags {
            path_offsets.push(cursor);
            cursor += tag.path.as_str().len() + 1;
        }
        Self {
            tag_array_offset,
            paths_offset,
            blob_offset: align_up(cursor, 4),
            path_offsets,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagData {
    /// Root struct offset inside the blob.
    Embedded { root_offset: usize },
    External { resource_index: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedTag {
    pub class: TagClass,
    pub path: TagPath,
    pub tag_id: u32,
    pub data: TagData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub index: usize,
    /// Offset inside the blob.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub compiled_structs: usize,
    pub placed_structs: usize,
    pub merged_structs: usize,
    pub external_tags: usize,
    pub blob_size: usize,
    pub tag_data_size: usize,
}

#[derive(Debug, Clone)]
pub struct LinkedArtifact {
    pub mode: AddressMode,
    pub layout: RegionLayout,
    pub blob: Vec<u8>,
    pub tags: Vec<LinkedTag>,
    /// Per struct index; merged structs share their survivor's placement,
    /// externalized structs have none.
    pub placements: Vec<Option<Placement>>,
    pub stats: LinkStats,
}

impl LinkedArtifact {
    /// Size of the whole tag data region.
    pub fn tag_data_size(&self) -> usize {
        self.layout.blob_offset + self.blob.len()
    }

    /// Value written for a reference to the struct placed at `placement`.
    pub fn address_of(&self, placement: Placement) -> Result<u32, LinkError> {
        match self.mode {
            AddressMode::Pointer { base } => {
                address(base, self.layout.blob_offset + placement.offset)
            }
            AddressMode::Index => u32::try_from(placement.index)
                .map_err(|_| LinkError::AddressOverflow(placement.index)),
        }
    }

    fn path_address(&self, tag: TagIndex) -> Result<u32, LinkError> {
        match self.mode {
            AddressMode::Pointer { base } => address(base, self.layout.path_offsets[tag.0]),
            AddressMode::Index => Ok(0),
        }
    }
}

fn address(base: u32, offset: usize) -> Result<u32, LinkError> {
    u32::try_from(offset)
        .ok()
        .and_then(|offset| base.checked_add(offset))
        .ok_or(LinkError::AddressOverflow(offset))
}

pub fn link(workload: &BuildWorkload, mode: AddressMode) -> Result<LinkedArtifact, LinkError> {
    if workload.tags.len() > MAX_TAG_COUNT {
        return Err(LinkError::TooManyTags(workload.tags.len()));
    }
    let count = workload.structs.len();

    let external = externalize(workload, mode);
    let mut alive = vec![true; count];
    for (index, compiled) in workload.structs.iter() {
        if let Some(origin) = compiled.origin {
            if external[origin.0].is_some() {
                alive[index.0] = false;
            }
        }
    }

    let (canonical, merged) = deduplicate(workload, &alive);

    let mut placements: Vec<Option<Placement>> = vec![None; count];
    let mut cursor = 0usize;
    let mut placed = 0usize;
    for (index, compiled) in workload.structs.iter() {
        if !alive[index.0] || canonical[index.0] != index.0 {
            continue;
        }
        let offset = align_up(cursor, compiled.alignment);
        placements[index.0] = Some(Placement {
            index: placed,
            offset,
        });
        cursor = offset + compiled.data.len();
        placed += 1;
    }
    for index in 0..count {
        if alive[index] && canonical[index] != index {
            placements[index] = placements[canonical[index]];
        }
    }

    let mut tags = Vec::with_capacity(workload.tags.len());
    for (index, entry) in workload.tags.iter().enumerate() {
        let data = match external[index] {
            Some(resource_index) => TagData::External { resource_index },
            None => {
                let root = entry
                    .root_struct
                    .and_then(|root| placements[root.0])
                    .ok_or_else(|| LinkError::MissingRootStruct(entry.name()))?;
                TagData::Embedded {
                    root_offset: root.offset,
                }
            }
        };
        tags.push(LinkedTag {
            class: entry.reference.class,
            path: entry.reference.path.clone(),
            tag_id: tag_id(index),
            data,
        });
    }

    let layout = match mode {
        AddressMode::Pointer { .. } => RegionLayout::for_tags(&tags),
        AddressMode::Index => RegionLayout::default(),
    };
    let mut artifact = LinkedArtifact {
        mode,
        layout,
        blob: vec![0u8; cursor],
        tags,
        placements,
        stats: LinkStats {
            compiled_structs: count,
            placed_structs: placed,
            merged_structs: merged,
            external_tags: external.iter().filter(|entry| entry.is_some()).count(),
            blob_size: cursor,
            tag_data_size: 0,
        },
    };
    artifact.stats.tag_data_size = artifact.tag_data_size();

    if let AddressMode::Pointer { base } = mode {
        let size = artifact.tag_data_size() as u64;
        let limit = workload.options.tag_space_limit();
        if size > limit {
            return Err(LinkError::ArtifactTooLarge { size, limit });
        }
        address(base, artifact.tag_data_size())?;
    }

    resolve(workload, &mut artifact, &alive, &canonical)?;
    tracing::info!(
        placed = artifact.stats.placed_structs,
        merged = artifact.stats.merged_structs,
        external = artifact.stats.external_tags,
        size = artifact.stats.tag_data_size,
        "linked"
    );
    Ok(artifact)
}

/// Resource index of every non-root tag that a loaded resource map holds.
fn externalize(workload: &BuildWorkload, mode: AddressMode) -> Vec<Option<u32>> {
    let mut external = vec![None; workload.tags.len()];
    let enabled = matches!(mode, AddressMode::Pointer { .. })
        && !workload.standalone
        && workload.dialect().supports_indexed_tags();
    if !enabled {
        return external;
    }
    for (index, entry) in workload.tags.iter().enumerate().skip(1) {
        let found = workload.options.resource_maps.iter().find_map(|map| {
            map.find(entry.reference.class, &entry.reference.path)
        });
        if let Some(resource_index) = found {
            tracing::debug!(tag = %entry.name(), resource_index, "externalized");
            external[index] = Some(resource_index as u32);
        }
    }
    external
}

fn find(canonical: &[usize], mut index: usize) -> usize {
    while canonical[index] != index {
        index = canonical[index];
    }
    index
}

/// Merges bit-identical dedupable structs until nothing changes. The lowest
/// index of each group survives.
fn deduplicate(workload: &BuildWorkload, alive: &[bool]) -> (Vec<usize>, usize) {
    let count = workload.structs.len();
    let mut canonical: Vec<usize> = (0..count).collect();
    let mut merged = 0usize;
    loop {
        let mut changed = false;
        let mut buckets: HashMap<blake3::Hash, Vec<usize>> = HashMap::new();
        for (index, compiled) in workload.structs.iter() {
            let index = index.0;
            if !alive[index] || canonical[index] != index || !compiled.dedupable {
                continue;
            }
            let resolve = |target: StructIndex| StructIndex(find(&canonical, target.0));
            let hash = compiled.content_hash(resolve);
            let bucket = buckets.entry(hash).or_default();
            let survivor = bucket.iter().copied().find(|&other| {
                workload
                    .structs
                    .get(StructIndex(other))
                    .map_or(false, |other| other.same_content(compiled, resolve))
            });
            match survivor {
                Some(survivor) => {
                    canonical[index] = survivor;
                    merged += 1;
                    changed = true;
                }
                None => bucket.push(index),
            }
        }
        if !changed {
            break;
        }
    }
    for index in 0..count {
        canonical[index] = find(&canonical, index);
    }
    (canonical, merged)
}

fn resolve(
    workload: &BuildWorkload,
    artifact: &mut LinkedArtifact,
    alive: &[bool],
    canonical: &[usize],
) -> Result<(), LinkError> {
    let mut blob = std::mem::take(&mut artifact.blob);
    for (index, compiled) in workload.structs.iter() {
        if !alive[index.0] || canonical[index.0] != index.0 {
            continue;
        }
        let placement = artifact.placements[index.0].ok_or(LinkError::UnresolvedReference {
            structure: index.0,
            offset: 0,
        })?;
        let start = placement.offset;
        blob[start..start + compiled.data.len()].copy_from_slice(&compiled.data);

        for site in &compiled.sites {
            let at = start + site.offset;
            let unresolved = LinkError::UnresolvedReference {
                structure: index.0,
                offset: site.offset,
            };
            match site.kind {
                ReferenceKind::StructPointer(target) => {
                    let target = artifact.placements[target.0].ok_or(unresolved)?;
                    write_u32_le(&mut blob, at, artifact.address_of(target)?);
                }
                ReferenceKind::Reflexive(target) => {
                    let target = artifact.placements[target.0].ok_or(unresolved)?;
                    let value = artifact.address_of(target)?;
                    write_u32_le(&mut blob, at + REFLEXIVE_POINTER, value);
                }
                ReferenceKind::TagDependency(Some(target)) => {
                    if target.0 >= artifact.tags.len() {
                        return Err(unresolved);
                    }
                    let path = artifact.path_address(target)?;
                    write_u32_le(&mut blob, at + DEPENDENCY_PATH_POINTER, path);
                    write_u32_le(&mut blob, at + DEPENDENCY_PATH_SIZE, 0);
                    write_u32_le(&mut blob, at + DEPENDENCY_TAG_ID, artifact.tags[target.0].tag_id);
                }
                ReferenceKind::TagDependency(None) => {
                    write_u32_le(&mut blob, at + DEPENDENCY_PATH_POINTER, NULL_ID);
                    write_u32_le(&mut blob, at + DEPENDENCY_PATH_SIZE, 0);
                    write_u32_le(&mut blob, at + DEPENDENCY_TAG_ID, NULL_ID);
                }
            }
        }
    }
    artifact.blob = blob;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use tag_format::bytes::read_u32_le;
    use tag_format::definitions::UNICODE_STRING_LIST;
    use tag_format::record::Fields;
    use tag_format::{Dialect, ResourceMap, ResourceMapType};

    fn base() -> AddressMode {
        AddressMode::Pointer {
            base: Dialect::CustomEdition.base_address(),
        }
    }

    #[test]
    fn identical_string_lists_share_their_strings() {
        let workload = fixtures::compiled_sample(Dialect::CustomEdition, Vec::new());
        let artifact = link(&workload, base()).expect("link");
        assert!(artifact.stats.merged_structs >= 2, "{:?}", artifact.stats);

        let names = workload
            .find_tag(&fixtures::reference(TagClass::UnicodeStringList, "ui\\names"))
            .expect("names");
        let help = workload
            .find_tag(&fixtures::reference(TagClass::UnicodeStringList, "ui\\help"))
            .expect("help");
        let offset_of = |tag: TagIndex| match artifact.tags[tag.0].data {
            TagData::Embedded { root_offset } => root_offset,
            TagData::External { .. } => panic!("embedded"),
        };
        let names_root = &artifact.blob[offset_of(names)..];
        let help_root = &artifact.blob[offset_of(help)..];
        let names_strings = Fields::new(&UNICODE_STRING_LIST, &names_root[..12]);
        assert_eq!(names_strings.reflexive_count("strings").expect("count"), 2);
        assert_eq!(read_u32_le(names_root, 4), read_u32_le(help_root, 4));

        let needle = fixtures::wide("Warthog");
        let copies = artifact
            .blob
            .windows(needle.len())
            .filter(|window| *window == needle.as_slice())
            .count();
        assert_eq!(copies, 1);
    }

    #[test]
    fn every_site_resolves_inside_the_region() {
        let workload = fixtures::compiled_sample(Dialect::Retail, Vec::new());
        let mode = AddressMode::Pointer {
            base: Dialect::Retail.base_address(),
        };
        let artifact = link(&workload, mode).expect("link");
        let base = Dialect::Retail.base_address();
        let region = artifact.tag_data_size() as u32;
        for (index, compiled) in workload.structs.iter() {
            let Some(placement) = artifact.placements[index.0] else {
                panic!("struct {} was not placed", index);
            };
            for site in &compiled.sites {
                let at = placement.offset + site.offset;
                let (value, null) = match site.kind {
                    ReferenceKind::StructPointer(_) => (read_u32_le(&artifact.blob, at), false),
                    ReferenceKind::Reflexive(_) => (read_u32_le(&artifact.blob, at + 4), false),
                    ReferenceKind::TagDependency(target) => {
                        let id = read_u32_le(&artifact.blob, at + 12);
                        match target {
                            Some(target) => assert_eq!(id, tag_id(target.0)),
                            None => assert_eq!(id, NULL_ID),
                        }
                        (read_u32_le(&artifact.blob, at + 4), target.is_none())
                    }
                };
                if null {
                    assert_eq!(value, NULL_ID);
                } else {
                    assert!(value >= base && value < base + region, "0x{:08X}", value);
                }
            }
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        let mut workload = fixtures::compiled_sample(Dialect::Retail, Vec::new());
        let mode = AddressMode::Pointer {
            base: Dialect::Retail.base_address(),
        };
        let size = link(&workload, mode).expect("link").tag_data_size() as u64;

        workload.options.tag_space_limit = Some(size);
        link(&workload, mode).expect("exact fit");

        workload.options.tag_space_limit = Some(size - 1);
        let err = link(&workload, mode).expect_err("one byte over");
        assert!(matches!(
            err,
            LinkError::ArtifactTooLarge { size: s, limit } if s == size && limit == size - 1
        ));
    }

    #[test]
    fn tags_in_resource_maps_are_externalized() {
        let mut bitmaps = ResourceMap::new(ResourceMapType::Bitmaps);
        bitmaps.push("ui\\other", vec![1, 2, 3]);
        bitmaps.push("ui\\hud\\crosshair", vec![4, 5, 6]);
        let workload = fixtures::compiled_sample(Dialect::CustomEdition, vec![bitmaps.clone()]);
        let embedded = fixtures::compiled_sample(Dialect::CustomEdition, Vec::new());

        let artifact = link(&workload, base()).expect("link");
        let full = link(&embedded, base()).expect("link");
        let crosshair = workload
            .find_tag(&fixtures::reference(TagClass::Bitmap, "ui\\hud\\crosshair"))
            .expect("crosshair");

        assert_eq!(
            artifact.tags[crosshair.0].data,
            TagData::External { resource_index: 1 }
        );
        assert_eq!(artifact.stats.external_tags, 1);
        assert!(artifact.blob.len() < full.blob.len());
        for structure in workload.structs_of(crosshair) {
            assert_eq!(artifact.placements[structure.0], None);
        }
    }

    #[test]
    fn retail_keeps_every_tag_embedded() {
        let mut bitmaps = ResourceMap::new(ResourceMapType::Bitmaps);
        bitmaps.push("ui\\hud\\crosshair", vec![4, 5, 6]);
        let workload = fixtures::compiled_sample(Dialect::Retail, vec![bitmaps]);
        let mode = AddressMode::Pointer {
            base: Dialect::Retail.base_address(),
        };
        let artifact = link(&workload, mode).expect("link");
        assert_eq!(artifact.stats.external_tags, 0);
    }

    #[test]
    fn linking_is_deterministic() {
        let first = link(&fixtures::compiled_sample(Dialect::CustomEdition, Vec::new()), base())
            .expect("link");
        let second = link(&fixtures::compiled_sample(Dialect::CustomEdition, Vec::new()), base())
            .expect("link");
        assert_eq!(first.blob, second.blob);
        assert_eq!(first.placements, second.placements);
    }
}
