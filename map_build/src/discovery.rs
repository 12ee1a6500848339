//! Dependency closure of the root tag.
//!
//! Tags are indexed depth-first in pre-order: a tag is numbered when it is
//! first read, then its dependencies are visited in field order. Tags that
//! were already numbered are skipped, so back-references terminate.

use std::collections::HashSet;

use tag_format::cache_file::MAX_TAG_COUNT;
use tag_format::tag_file::parse_tag_file;
use tag_format::{Record, TagReference};
use tag_tree::{TagSource, TagSourceError};

use crate::diagnostics::{Diagnostic, Severity};
use crate::error::DiscoveryError;

#[derive(Debug, Clone)]
pub struct DiscoveredTag {
    pub reference: TagReference,
    pub record: Record,
}

#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// In index order.
    pub tags: Vec<DiscoveredTag>,
    pub diagnostics: Vec<Diagnostic>,
}

struct Pending {
    reference: TagReference,
    referenced_by: Option<String>,
}

pub fn discover(source: &dyn TagSource, root: &TagReference) -> Result<Discovery, DiscoveryError> {
    let mut discovery = Discovery::default();
    let mut visited: HashSet<TagReference> = HashSet::new();
    let mut stack = vec![Pending {
        reference: root.clone(),
        referenced_by: None,
    }];

    while let Some(Pending {
        reference,
        referenced_by,
    }) = stack.pop()
    {
        if !visited.insert(reference.clone()) {
            continue;
        }
        if discovery.tags.len() >= MAX_TAG_COUNT {
            return Err(DiscoveryError::TooManyTags(discovery.tags.len() + 1));
        }

        let name = reference.to_string();
        let (record, warning) = load_tag(source, &reference, referenced_by.as_deref())?;
        discovery.diagnostics.extend(warning);
        tracing::debug!(index = discovery.tags.len(), tag = %name, "discovered");

        let mut children = Vec::new();
        for dependency in record.dependencies_recursive() {
            if !dependency.class_allowed() {
                discovery.diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    name.clone(),
                    dependency.locator.clone(),
                    format!(
                        "{} is the wrong class for this field",
                        dependency.reference
                    ),
                ));
                continue;
            }
            children.push(Pending {
                reference: dependency.reference,
                referenced_by: Some(format!("{} ({})", name, dependency.locator)),
            });
        }
        stack.extend(children.into_iter().rev());

        discovery.tags.push(DiscoveredTag { reference, record });
    }

    tracing::info!(tags = discovery.tags.len(), "discovery finished");
    Ok(discovery)
}

/// Reads and parses one tag. A checksum mismatch comes back as a warning.
pub fn load_tag(
    source: &dyn TagSource,
    reference: &TagReference,
    referenced_by: Option<&str>,
) -> Result<(Record, Option<Diagnostic>), DiscoveryError> {
    let name = reference.to_string();
    let bytes = match source.read_tag(&reference.path, reference.class) {
        Ok(bytes) => bytes,
        Err(TagSourceError::NotFound(_)) => {
            return Err(DiscoveryError::MissingDependency {
                tag: name,
                referenced_by: referenced_by.unwrap_or("(root)").to_string(),
            })
        }
        Err(source) => return Err(DiscoveryError::UnreadableTag { tag: name, source }),
    };
    let file = parse_tag_file(&bytes).map_err(|source| DiscoveryError::InvalidTag {
        tag: name.clone(),
        source,
    })?;
    if file.class != reference.class {
        return Err(DiscoveryError::ClassMismatch {
            tag: name,
            found: file.class,
        });
    }
    let warning = file.checksum_mismatch.then(|| {
        Diagnostic::new(
            Severity::Warning,
            name,
            "",
            "tag file checksum does not match its contents",
        )
    });
    Ok((file.record, warning))
}
