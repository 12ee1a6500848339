//! Binary formats shared by the map toolchain: tag classes and paths, the
//! struct schema, source tag files, resource maps and cache file headers.

#![forbid(unsafe_code)]

pub mod bytes;
pub mod cache_file;
pub mod cache_header;
pub mod definitions;
pub mod record;
pub mod resource_map;
pub mod schema;
pub mod tag_class;
pub mod tag_file;
pub mod tag_path;

pub use bytes::align_up;
pub use cache_header::{CacheHeader, CacheHeaderError, Dialect, HeaderLayout, MapType};
pub use record::{Record, TagReference};
pub use resource_map::{ResourceMap, ResourceMapError, ResourceMapType};
pub use schema::{FieldDef, FieldError, FieldKind, FieldLayout, StructDef};
pub use tag_class::TagClass;
pub use tag_file::{TagFile, TagFileError};
pub use tag_path::{TagPath, TagPathError};

/// Sentinel written to null tag ids, null path pointers and unset checksums.
pub const NULL_ID: u32 = 0xFFFF_FFFF;
