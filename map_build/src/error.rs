use std::io;
use std::path::PathBuf;

use tag_format::cache_file::MAX_TAG_COUNT;
use tag_format::{Dialect, FieldError, ResourceMapError, TagClass, TagFileError};
use tag_tree::TagSourceError;
use thiserror::Error;

use crate::diagnostics::Diagnostic;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("missing dependency {tag} (referenced by {referenced_by})")]
    MissingDependency { tag: String, referenced_by: String },
    #[error("failed to read {tag}: {source}")]
    UnreadableTag {
        tag: String,
        #[source]
        source: TagSourceError,
    },
    #[error("failed to parse {tag}: {source}")]
    InvalidTag {
        tag: String,
        #[source]
        source: TagFileError,
    },
    #[error("{tag} holds a {found} tag")]
    ClassMismatch { tag: String, found: TagClass },
    #[error("cyclic size-adjusting dependency: {cycle}")]
    CyclicDependencyDetected { cycle: String },
    #[error("dependency closure has {0} tags (max {MAX_TAG_COUNT})")]
    TooManyTags(usize),
}

/// Fatal compile failure. Hook validation problems that should not stop the
/// pass are reported as diagnostics instead.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("{0}")]
    Fatal(String),
    #[error("{tag}: {locator}: {source}")]
    InTag {
        tag: String,
        locator: String,
        #[source]
        source: Box<CompileError>,
    },
}

impl CompileError {
    pub(crate) fn in_tag(self, tag: &str, locator: &str) -> Self {
        match self {
            CompileError::InTag { .. } => self,
            other => CompileError::InTag {
                tag: tag.to_string(),
                locator: if locator.is_empty() {
                    "(root)".to_string()
                } else {
                    locator.to_string()
                },
                source: Box::new(other),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("tag data is {size} bytes, over the {limit} byte limit")]
    ArtifactTooLarge { size: u64, limit: u64 },
    #[error("unresolved reference in struct #{structure} at offset 0x{offset:X}")]
    UnresolvedReference { structure: usize, offset: usize },
    #[error("{0} has no compiled root struct")]
    MissingRootStruct(String),
    #[error("too many tags to link: {0} (max {MAX_TAG_COUNT})")]
    TooManyTags(usize),
    #[error("address space overflow at offset 0x{0:X}")]
    AddressOverflow(usize),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("build failed with {errors} error(s) and {warnings} warning(s)")]
    CompileFailed {
        errors: usize,
        warnings: usize,
        diagnostics: Vec<Diagnostic>,
    },
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    ResourceMap(#[from] ResourceMapError),
    #[error("{tag} cannot be stored in a {map_type} resource map")]
    NotHostedByResourceMap { tag: String, map_type: String },
    #[error("scenario name '{0}' is longer than 31 characters")]
    ScenarioNameTooLong(String),
    #[error("cannot build directly for {0}")]
    UnsupportedDialect(Dialect),
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
