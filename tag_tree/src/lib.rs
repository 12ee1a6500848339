//! Tag roots on disk and in memory.
//!
//! A [`TagTree`] searches an ordered list of roots, each a directory or a
//! `.zip` archive; the first root holding a tag wins.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tag_format::{TagClass, TagPath};
use thiserror::Error;
use zip::read::ZipArchive;

/// Deepest directory nesting followed while scanning.
const MAX_SCAN_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum TagSourceError {
    #[error("tag not found: {0}")]
    NotFound(String),
    #[error("tag root does not exist: {}", .0.display())]
    MissingRoot(PathBuf),
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("zip error in {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> TagSourceError + '_ {
    move |source| TagSourceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Byte-fetch-by-identity capability the build pipeline needs.
pub trait TagSource {
    fn read_tag(&self, path: &TagPath, class: TagClass) -> Result<Vec<u8>, TagSourceError>;

    fn contains(&self, path: &TagPath, class: TagClass) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootKind {
    Dir,
    Zip,
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RootKind::Dir => "dir",
            RootKind::Zip => "zip",
        };
        write!(f, "{}", label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootSummary {
    pub order: usize,
    pub kind: RootKind,
    pub source: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagFileEntry {
    pub path: TagPath,
    pub class: TagClass,
    pub root: usize,
    /// File on disk, or the archive holding the tag.
    pub source: PathBuf,
}

#[derive(Debug, Default)]
pub struct TagTree {
    roots: Vec<TagRoot>,
}

#[derive(Debug)]
enum TagRoot {
    Dir(PathBuf),
    Zip(ZipRoot),
}

#[derive(Debug)]
struct ZipRoot {
    source: PathBuf,
    /// Normalized lowercase `dir/name.ext` to the raw entry name.
    lookup: HashMap<String, String>,
}

impl TagTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from roots in priority order.
    pub fn from_roots<P: AsRef<Path>>(roots: &[P]) -> Result<Self, TagSourceError> {
        let mut tree = Self::new();
        for root in roots {
            tree.add_root(root.as_ref())?;
        }
        Ok(tree)
    }

    /// Adds a root after the existing ones; `.zip` files become archive roots.
    pub fn add_root(&mut self, path: impl Into<PathBuf>) -> Result<(), TagSourceError> {
        let path = path.into();
        if path.is_dir() {
            tracing::debug!(root = %path.display(), "added tag directory");
            self.roots.push(TagRoot::Dir(path));
            return Ok(());
        }
        let is_zip = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);
        if path.is_file() && is_zip {
            let root = ZipRoot::open(path)?;
            tracing::debug!(
                root = %root.source.display(),
                entries = root.lookup.len(),
                "added tag archive"
            );
            self.roots.push(TagRoot::Zip(root));
            return Ok(());
        }
        Err(TagSourceError::MissingRoot(path))
    }

    pub fn roots(&self) -> Vec<RootSummary> {
        self.roots
            .iter()
            .enumerate()
            .map(|(order, root)| RootSummary {
                order,
                kind: root.kind(),
                source: root.source().to_path_buf(),
            })
            .collect()
    }

    /// Lists every tag once, first root winning, sorted by path then class.
    pub fn scan(&self) -> Result<Vec<TagFileEntry>, TagSourceError> {
        let mut found: BTreeMap<(TagPath, TagClass), TagFileEntry> = BTreeMap::new();
        for (order, root) in self.roots.iter().enumerate() {
            let mut entries = Vec::new();
            match root {
                TagRoot::Dir(dir) => scan_dir(dir, dir, 0, order, &mut entries)?,
                TagRoot::Zip(zip) => {
                    for name in zip.lookup.keys() {
                        if let Some((path, class)) = parse_tag_file_name(name) {
                            entries.push(TagFileEntry {
                                path,
                                class,
                                root: order,
                                source: zip.source.clone(),
                            });
                        }
                    }
                }
            }
            for entry in entries {
                found
                    .entry((entry.path.clone(), entry.class))
                    .or_insert(entry);
            }
        }
        tracing::debug!(tags = found.len(), roots = self.roots.len(), "scanned tag roots");
        Ok(found.into_values().collect())
    }
}

impl TagSource for TagTree {
    fn read_tag(&self, path: &TagPath, class: TagClass) -> Result<Vec<u8>, TagSourceError> {
        for root in &self.roots {
            if let Some(data) = root.read(path, class)? {
                return Ok(data);
            }
        }
        Err(TagSourceError::NotFound(path.with_extension(class)))
    }

    fn contains(&self, path: &TagPath, class: TagClass) -> bool {
        self.roots.iter().any(|root| root.exists(path, class))
    }
}

impl TagRoot {
    fn kind(&self) -> RootKind {
        match self {
            TagRoot::Dir(_) => RootKind::Dir,
            TagRoot::Zip(_) => RootKind::Zip,
        }
    }

    fn source(&self) -> &Path {
        match self {
            TagRoot::Dir(path) => path,
            TagRoot::Zip(zip) => &zip.source,
        }
    }

    fn read(&self, path: &TagPath, class: TagClass) -> Result<Option<Vec<u8>>, TagSourceError> {
        match self {
            TagRoot::Dir(dir) => {
                let Some(file) = find_in_dir(dir, path, class) else {
                    return Ok(None);
                };
                fs::read(&file).map(Some).map_err(io_error(&file))
            }
            TagRoot::Zip(zip) => zip.read(path, class),
        }
    }

    fn exists(&self, path: &TagPath, class: TagClass) -> bool {
        match self {
            TagRoot::Dir(dir) => find_in_dir(dir, path, class).is_some(),
            TagRoot::Zip(zip) => zip.lookup.contains_key(&zip_key(path, class)),
        }
    }
}

impl ZipRoot {
    fn open(source: PathBuf) -> Result<Self, TagSourceError> {
        let file = fs::File::open(&source).map_err(io_error(&source))?;
        let mut archive = ZipArchive::new(file).map_err(|err| TagSourceError::Archive {
            path: source.clone(),
            message: format!("open failed: {}", err),
        })?;
        let mut lookup = HashMap::new();
        for index in 0..archive.len() {
            let entry = archive
                .by_index(index)
                .map_err(|err| TagSourceError::Archive {
                    path: source.clone(),
                    message: format!("entry {} failed: {}", index, err),
                })?;
            if entry.is_dir() {
                continue;
            }
            let raw_name = entry.name().to_string();
            let name = raw_name.replace('\\', "/").to_ascii_lowercase();
            lookup.entry(name).or_insert(raw_name);
        }
        Ok(Self { source, lookup })
    }

    fn read(&self, path: &TagPath, class: TagClass) -> Result<Option<Vec<u8>>, TagSourceError> {
        let Some(raw_name) = self.lookup.get(&zip_key(path, class)) else {
            return Ok(None);
        };
        let archive_error = |message: String| TagSourceError::Archive {
            path: self.source.clone(),
            message,
        };
        let file = fs::File::open(&self.source).map_err(io_error(&self.source))?;
        let mut archive =
            ZipArchive::new(file).map_err(|err| archive_error(format!("open failed: {}", err)))?;
        let mut entry = archive
            .by_name(raw_name)
            .map_err(|err| archive_error(format!("read {} failed: {}", raw_name, err)))?;
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(io_error(&self.source))?;
        Ok(Some(data))
    }
}

fn zip_key(path: &TagPath, class: TagClass) -> String {
    path.with_extension(class).replace('\\', "/")
}

/// Resolves a tag file under `dir`, falling back to a case-insensitive
/// match per component.
fn find_in_dir(dir: &Path, path: &TagPath, class: TagClass) -> Option<PathBuf> {
    let exact = dir.join(path.to_file_path(class));
    if exact.is_file() {
        return Some(exact);
    }
    let relative = path.to_file_path(class);
    let mut current = dir.to_path_buf();
    for component in relative.iter() {
        let wanted = component.to_str()?;
        let next = fs::read_dir(&current)
            .ok()?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|candidate| {
                candidate
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.eq_ignore_ascii_case(wanted))
                    .unwrap_or(false)
            })
            .min()?;
        current = next;
    }
    current.is_file().then_some(current)
}

fn scan_dir(
    root: &Path,
    dir: &Path,
    depth: usize,
    order: usize,
    out: &mut Vec<TagFileEntry>,
) -> Result<(), TagSourceError> {
    if depth > MAX_SCAN_DEPTH {
        tracing::warn!(dir = %dir.display(), "tag directory nesting too deep; skipped");
        return Ok(());
    }
    let mut children: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_error(dir))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .collect();
    children.sort();
    for child in children {
        if child.is_dir() {
            scan_dir(root, &child, depth + 1, order, out)?;
            continue;
        }
        let Ok(relative) = child.strip_prefix(root) else {
            continue;
        };
        let Some(name) = relative.to_str() else {
            continue;
        };
        if let Some((path, class)) = parse_tag_file_name(&name.replace('\\', "/")) {
            out.push(TagFileEntry {
                path,
                class,
                root: order,
                source: child.clone(),
            });
        }
    }
    Ok(())
}

fn parse_tag_file_name(name: &str) -> Option<(TagPath, TagClass)> {
    TagPath::parse_with_extension(name).ok()
}

/// In-memory tag source.
#[derive(Debug, Default, Clone)]
pub struct MemoryTagSource {
    tags: BTreeMap<(TagPath, TagClass), Vec<u8>>,
}

impl MemoryTagSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: TagPath, class: TagClass, data: Vec<u8>) {
        self.tags.insert((path, class), data);
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl TagSource for MemoryTagSource {
    fn read_tag(&self, path: &TagPath, class: TagClass) -> Result<Vec<u8>, TagSourceError> {
        self.tags
            .get(&(path.clone(), class))
            .cloned()
            .ok_or_else(|| TagSourceError::NotFound(path.with_extension(class)))
    }

    fn contains(&self, path: &TagPath, class: TagClass) -> bool {
        self.tags.contains_key(&(path.clone(), class))
    }
}
