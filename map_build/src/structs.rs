//! Arena of compiled structs and the reference sites inside them.

use std::fmt;

use tag_format::StructDef;

use crate::workload::TagIndex;

/// Alignment of every compiled struct and data blob.
pub const STRUCT_ALIGNMENT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructIndex(pub usize);

impl fmt::Display for StructIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// A bare 32-bit pointer at the site offset.
    StructPointer(StructIndex),
    /// A 16 byte dependency field; `None` resolves to the null sentinel.
    TagDependency(Option<TagIndex>),
    /// A 12 byte reflexive field whose pointer slot addresses the array.
    Reflexive(StructIndex),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceSite {
    pub offset: usize,
    pub kind: ReferenceKind,
}

#[derive(Debug, Clone)]
pub struct CompiledStruct {
    /// Little-endian engine layout; reference slots are filled by the linker.
    pub data: Vec<u8>,
    pub alignment: usize,
    pub sites: Vec<ReferenceSite>,
    /// Tag that produced the struct. Diagnostics only.
    pub origin: Option<TagIndex>,
    /// `None` for raw data blobs.
    pub def: Option<&'static StructDef>,
    pub element_count: usize,
    pub dedupable: bool,
}

impl CompiledStruct {
    pub fn blob(data: Vec<u8>, origin: TagIndex) -> Self {
        Self {
            data,
            alignment: STRUCT_ALIGNMENT,
            sites: Vec::new(),
            origin: Some(origin),
            def: None,
            element_count: 0,
            dedupable: true,
        }
    }

    fn placeholder() -> Self {
        Self {
            data: Vec::new(),
            alignment: STRUCT_ALIGNMENT,
            sites: Vec::new(),
            origin: None,
            def: None,
            element_count: 0,
            dedupable: false,
        }
    }

    /// Hash over bytes, alignment and sites, with struct targets mapped
    /// through `canonical` so merged children hash like their survivor.
    pub fn content_hash(&self, canonical: impl Fn(StructIndex) -> StructIndex) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.alignment as u64).to_le_bytes());
        hasher.update(&(self.data.len() as u64).to_le_bytes());
        hasher.update(&self.data);
        for site in &self.sites {
            hasher.update(&(site.offset as u64).to_le_bytes());
            match site.kind {
                ReferenceKind::StructPointer(target) => {
                    hasher.update(&[0]);
                    hasher.update(&(canonical(target).0 as u64).to_le_bytes());
                }
                ReferenceKind::TagDependency(target) => {
                    hasher.update(&[1]);
                    let value = target.map(|tag| tag.0 as u64).unwrap_or(u64::MAX);
                    hasher.update(&value.to_le_bytes());
                }
                ReferenceKind::Reflexive(target) => {
                    hasher.update(&[2]);
                    hasher.update(&(canonical(target).0 as u64).to_le_bytes());
                }
            }
        }
        hasher.finalize()
    }

    /// Exact comparison backing a hash match.
    pub fn same_content(
        &self,
        other: &CompiledStruct,
        canonical: impl Fn(StructIndex) -> StructIndex,
    ) -> bool {
        if self.data != other.data
            || self.alignment != other.alignment
            || self.sites.len() != other.sites.len()
        {
            return false;
        }
        self.sites.iter().zip(&other.sites).all(|(a, b)| {
            a.offset == b.offset
                && match (a.kind, b.kind) {
                    (ReferenceKind::StructPointer(x), ReferenceKind::StructPointer(y))
                    | (ReferenceKind::Reflexive(x), ReferenceKind::Reflexive(y)) => {
                        canonical(x) == canonical(y)
                    }
                    (ReferenceKind::TagDependency(x), ReferenceKind::TagDependency(y)) => x == y,
                    _ => false,
                }
        })
    }

    /// Site at exactly `offset`, if any.
    pub fn site_at(&self, offset: usize) -> Option<&ReferenceSite> {
        self.sites.iter().find(|site| site.offset == offset)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StructTable {
    structs: Vec<CompiledStruct>,
}

impl StructTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next index; placement order follows reservation order.
    pub fn reserve(&mut self) -> StructIndex {
        self.structs.push(CompiledStruct::placeholder());
        StructIndex(self.structs.len() - 1)
    }

    pub fn set(&mut self, index: StructIndex, compiled: CompiledStruct) {
        self.structs[index.0] = compiled;
    }

    pub fn push(&mut self, compiled: CompiledStruct) -> StructIndex {
        self.structs.push(compiled);
        StructIndex(self.structs.len() - 1)
    }

    pub fn get(&self, index: StructIndex) -> Option<&CompiledStruct> {
        self.structs.get(index.0)
    }

    pub fn get_mut(&mut self, index: StructIndex) -> Option<&mut CompiledStruct> {
        self.structs.get_mut(index.0)
    }

    pub fn len(&self) -> usize {
        self.structs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StructIndex, &CompiledStruct)> {
        self.structs
            .iter()
            .enumerate()
            .map(|(index, compiled)| (StructIndex(index), compiled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_site(data: Vec<u8>, kind: ReferenceKind) -> CompiledStruct {
        let mut compiled = CompiledStruct::blob(data, TagIndex(0));
        compiled.sites.push(ReferenceSite { offset: 0, kind });
        compiled
    }

    #[test]
    fn hash_follows_canonical_targets() {
        let a = with_site(vec![0; 12], ReferenceKind::Reflexive(StructIndex(3)));
        let b = with_site(vec![0; 12], ReferenceKind::Reflexive(StructIndex(5)));
        let identity = |index: StructIndex| index;
        assert_ne!(a.content_hash(identity), b.content_hash(identity));
        assert!(!a.same_content(&b, identity));

        let merged = |index: StructIndex| if index.0 == 5 { StructIndex(3) } else { index };
        assert_eq!(a.content_hash(merged), b.content_hash(merged));
        assert!(a.same_content(&b, merged));
    }

    #[test]
    fn dependency_targets_are_part_of_identity() {
        let a = with_site(vec![0; 16], ReferenceKind::TagDependency(Some(TagIndex(1))));
        let b = with_site(vec![0; 16], ReferenceKind::TagDependency(None));
        assert_ne!(a.content_hash(|index| index), b.content_hash(|index| index));
    }

    #[test]
    fn reserve_keeps_order() {
        let mut table = StructTable::new();
        let first = table.reserve();
        let second = table.push(CompiledStruct::blob(vec![1], TagIndex(0)));
        table.set(first, CompiledStruct::blob(vec![2], TagIndex(0)));
        assert_eq!(first, StructIndex(0));
        assert_eq!(second, StructIndex(1));
        assert_eq!(table.get(first).expect("first").data, vec![2]);
    }
}
