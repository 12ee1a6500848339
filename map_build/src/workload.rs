//! Session state for one build invocation.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tag_format::{Dialect, Record, ResourceMap, StructDef, TagClass, TagReference};

use crate::diagnostics::Diagnostics;
use crate::structs::{StructIndex, StructTable};

/// Dense index of a tag in discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagIndex(pub usize);

impl fmt::Display for TagIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub dialect: Dialect,
    pub root: TagReference,
    /// Defaults to the root tag's base name.
    pub scenario_name: Option<String>,
    /// Defaults to [`default_build_string`].
    pub build_string: Option<String>,
    /// Defaults to the dialect's tag space.
    pub tag_space_limit: Option<u64>,
    pub budget_ceilings: BTreeMap<TagClass, u64>,
    pub resource_maps: Vec<ResourceMap>,
}

impl BuildOptions {
    pub fn new(dialect: Dialect, root: TagReference) -> Self {
        Self {
            dialect,
            root,
            scenario_name: None,
            build_string: None,
            tag_space_limit: None,
            budget_ceilings: BTreeMap::new(),
            resource_maps: Vec::new(),
        }
    }

    pub fn tag_space_limit(&self) -> u64 {
        self.tag_space_limit
            .unwrap_or_else(|| self.dialect.tag_space_limit())
    }

    pub fn build_string(&self) -> String {
        self.build_string
            .clone()
            .unwrap_or_else(|| default_build_string(self.dialect).to_string())
    }
}

pub fn default_build_string(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Demo | Dialect::DemoCompressed => "01.00.00.0576",
        Dialect::Retail | Dialect::RetailCompressed => "01.00.00.0564",
        Dialect::CustomEdition | Dialect::CustomEditionCompressed => "01.00.00.0609",
        Dialect::DarkCirclet => "01.03.43.0000",
    }
}

#[derive(Debug, Clone)]
pub struct TagEntry {
    pub reference: TagReference,
    /// Parsed source record. Compilation works on a copy.
    pub record: Record,
    pub root_struct: Option<StructIndex>,
}

impl TagEntry {
    pub fn name(&self) -> String {
        self.reference.to_string()
    }
}

/// Reference from a struct field to a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyEdge {
    pub source: StructIndex,
    pub offset: usize,
    pub target: TagIndex,
    /// Fold the target's budget into the source tag's budget.
    pub adjust_size: bool,
}

/// Element whose definition carries a hook, queued for the post-compile pass.
#[derive(Debug, Clone)]
pub struct PostCompileSite {
    pub tag: TagIndex,
    pub def: &'static StructDef,
    pub structure: StructIndex,
    pub element_index: usize,
    pub element_offset: usize,
    pub locator: String,
}

#[derive(Debug)]
pub struct BuildWorkload {
    pub options: BuildOptions,
    pub tags: Vec<TagEntry>,
    pub structs: StructTable,
    pub edges: Vec<DependencyEdge>,
    pub diagnostics: Diagnostics,
    pub post_sites: Vec<PostCompileSite>,
    /// Per-tag size budgets, filled once compilation is done.
    pub budgets: Vec<u64>,
    /// Compile each tag on its own; dependencies become null references.
    pub standalone: bool,
    lookup: HashMap<TagReference, TagIndex>,
}

impl BuildWorkload {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            tags: Vec::new(),
            structs: StructTable::new(),
            edges: Vec::new(),
            diagnostics: Diagnostics::new(),
            post_sites: Vec::new(),
            budgets: Vec::new(),
            standalone: false,
            lookup: HashMap::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.options.dialect
    }

    /// Appends a tag; indices are never reused.
    pub fn push_tag(&mut self, reference: TagReference, record: Record) -> TagIndex {
        let index = TagIndex(self.tags.len());
        self.lookup.insert(reference.clone(), index);
        self.tags.push(TagEntry {
            reference,
            record,
            root_struct: None,
        });
        index
    }

    pub fn find_tag(&self, reference: &TagReference) -> Option<TagIndex> {
        self.lookup.get(reference).copied()
    }

    pub fn tag(&self, index: TagIndex) -> Option<&TagEntry> {
        self.tags.get(index.0)
    }

    pub fn tag_name(&self, index: TagIndex) -> String {
        self.tag(index)
            .map(TagEntry::name)
            .unwrap_or_else(|| format!("<tag {}>", index))
    }

    /// Structs compiled from tag `index`.
    pub fn structs_of(&self, index: TagIndex) -> impl Iterator<Item = StructIndex> + '_ {
        self.structs
            .iter()
            .filter(move |(_, compiled)| compiled.origin == Some(index))
            .map(|(structure, _)| structure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tag_format::definitions::SOUND;
    use tag_format::TagPath;

    fn reference(path: &str) -> TagReference {
        TagReference::new(TagClass::Sound, TagPath::parse(path).expect("tag path"))
    }

    #[test]
    fn tags_are_indexed_in_push_order() {
        let mut workload = BuildWorkload::new(BuildOptions::new(
            Dialect::CustomEdition,
            reference("a"),
        ));
        let a = workload.push_tag(reference("a"), Record::new(&SOUND));
        let b = workload.push_tag(reference("b"), Record::new(&SOUND));
        assert_eq!(a, TagIndex(0));
        assert_eq!(b, TagIndex(1));
        assert_eq!(workload.find_tag(&reference("b")), Some(b));
        assert_eq!(workload.tag_name(a), "a.sound");
    }

    #[test]
    fn options_fall_back_to_dialect_defaults() {
        let options = BuildOptions::new(Dialect::DarkCirclet, reference("a"));
        assert_eq!(options.tag_space_limit(), Dialect::DarkCirclet.tag_space_limit());
        assert_eq!(options.build_string(), "01.03.43.0000");
    }
}
