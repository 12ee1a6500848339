//! Cache file assembly: header, tag data header, tag array, paths, blob.

use tag_format::cache_file::{
    checksum_region, tag_id, TagArrayEntry, TagDataHeader, TAGS_LITERAL, TAG_ARRAY_ENTRY_SIZE,
    TAG_DATA_HEADER_SIZE,
};
use tag_format::cache_header::HEADER_SIZE;
use tag_format::bytes::write_u32_le;
use tag_format::{CacheHeader, HeaderLayout, TagClass, NULL_ID};

use crate::error::BuildError;
use crate::linker::{LinkedArtifact, TagData};
use crate::workload::BuildWorkload;

const MAX_SCENARIO_NAME: usize = 31;

/// Name written into the header: the configured name, or the root's base name.
pub fn scenario_name(workload: &BuildWorkload) -> Result<String, BuildError> {
    let name = match &workload.options.scenario_name {
        Some(name) => name.clone(),
        None => workload.options.root.path.base_name().to_string(),
    };
    if name.len() > MAX_SCENARIO_NAME {
        return Err(BuildError::ScenarioNameTooLong(name));
    }
    Ok(name)
}

pub fn emit_cache_file(
    workload: &BuildWorkload,
    linked: &LinkedArtifact,
) -> Result<Vec<u8>, BuildError> {
    let dialect = workload.dialect();
    if !dialect.is_build_target() {
        return Err(BuildError::UnsupportedDialect(dialect));
    }
    let layout = if dialect.uses_demo_layout() {
        HeaderLayout::Demo
    } else {
        HeaderLayout::Standard
    };
    let name = scenario_name(workload)?;
    let base = dialect.base_address();
    let region = &linked.layout;

    let mut tag_data = vec![0u8; linked.tag_data_size()];
    let root_is_scenario = linked
        .tags
        .first()
        .map_or(false, |tag| tag.class == TagClass::Scenario);
    TagDataHeader {
        tag_array_address: base + region.tag_array_offset as u32,
        scenario_tag_id: if root_is_scenario { tag_id(0) } else { NULL_ID },
        checksum: 0,
        tag_count: linked.tags.len() as u32,
        tags_literal: TAGS_LITERAL,
    }
    .write(&mut tag_data[..TAG_DATA_HEADER_SIZE]);

    for (index, tag) in linked.tags.iter().enumerate() {
        let (secondary_class, tertiary_class) = tag.class.parent_fourccs();
        let (data, indexed) = match tag.data {
            TagData::Embedded { root_offset } => {
                (base + (region.blob_offset + root_offset) as u32, false)
            }
            TagData::External { resource_index } => (resource_index, true),
        };
        let at = region.tag_array_offset + index * TAG_ARRAY_ENTRY_SIZE;
        TagArrayEntry {
            class: tag.class.fourcc(),
            secondary_class,
            tertiary_class,
            tag_id: tag.tag_id,
            path_address: base + region.path_offsets[index] as u32,
            data,
            indexed,
        }
        .write(&mut tag_data[at..at + TAG_ARRAY_ENTRY_SIZE]);

        let path = tag.path.as_str().as_bytes();
        let at = region.path_offsets[index];
        tag_data[at..at + path.len()].copy_from_slice(path);
    }
    tag_data[region.blob_offset..].copy_from_slice(&linked.blob);

    let mut header = CacheHeader::new(dialect, layout);
    header.tag_data_offset = HEADER_SIZE as u32;
    header.tag_data_size = tag_data.len() as u32;
    header.set_name(&name);
    header.set_build(&workload.options.build_string());
    header.map_type = map_type(workload);

    let mut file = header.to_bytes(layout);
    file.extend_from_slice(&tag_data);

    let crc = crc32fast::hash(&file[checksum_region(dialect, &header, file.len())]);
    write_u32_le(&mut file, layout.crc32_offset(), crc);
    tracing::info!(
        dialect = %dialect,
        size = file.len(),
        crc = format_args!("0x{:08X}", crc),
        "emitted cache file"
    );
    Ok(file)
}

/// Map type from the root scenario, 0 for other roots.
fn map_type(workload: &BuildWorkload) -> u16 {
    workload
        .tags
        .first()
        .filter(|tag| tag.reference.class == TagClass::Scenario)
        .and_then(|tag| tag.record.get_u16("type").ok())
        .unwrap_or(0)
}
