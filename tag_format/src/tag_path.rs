use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::tag_class::TagClass;

/// Longest path the engine's tag array can carry, excluding the NUL.
pub const MAX_TAG_PATH_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagPathError {
    #[error("tag path is empty")]
    Empty,
    #[error("tag path is unsafe: {0}")]
    Unsafe(String),
    #[error("tag path is {len} bytes long (max {MAX_TAG_PATH_LEN})")]
    TooLong { len: usize },
    #[error("tag path has no recognised class extension: {0}")]
    UnknownExtension(String),
}

/// Engine-relative tag path without extension.
///
/// Stored lowercase with `\` separators; `/` is accepted on input. Absolute
/// paths, drive prefixes, empty components and `.`/`..` are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagPath {
    normalized: String,
}

impl TagPath {
    pub fn parse(path: &str) -> Result<Self, TagPathError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(TagPathError::Empty);
        }
        let unified = trimmed.replace('/', "\\");
        if unified.starts_with('\\') {
            return Err(TagPathError::Unsafe(path.to_string()));
        }
        let mut components = Vec::new();
        for part in unified.split('\\') {
            if part.is_empty() || part == "." || part == ".." || part.contains(':') {
                return Err(TagPathError::Unsafe(path.to_string()));
            }
            components.push(part.to_ascii_lowercase());
        }
        let normalized = components.join("\\");
        if normalized.len() > MAX_TAG_PATH_LEN {
            return Err(TagPathError::TooLong {
                len: normalized.len(),
            });
        }
        Ok(Self { normalized })
    }

    /// Splits `levels/test/test.scenario` into path and class.
    pub fn parse_with_extension(path: &str) -> Result<(Self, TagClass), TagPathError> {
        let trimmed = path.trim();
        let (stem, extension) = trimmed
            .rsplit_once('.')
            .ok_or_else(|| TagPathError::UnknownExtension(path.to_string()))?;
        let class = TagClass::from_extension(extension)
            .ok_or_else(|| TagPathError::UnknownExtension(path.to_string()))?;
        Ok((Self::parse(stem)?, class))
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.normalized.split('\\')
    }

    /// Last path component, used as the default scenario name.
    pub fn base_name(&self) -> &str {
        self.components().last().unwrap_or("")
    }

    pub fn with_extension(&self, class: TagClass) -> String {
        format!("{}.{}", self.normalized, class.extension())
    }

    /// Relative file system path of the source tag file.
    pub fn to_file_path(&self, class: TagClass) -> PathBuf {
        let mut out = PathBuf::new();
        let mut components = self.components().peekable();
        while let Some(part) = components.next() {
            if components.peek().is_some() {
                out.push(part);
            } else {
                out.push(format!("{}.{}", part, class.extension()));
            }
        }
        out
    }
}

impl fmt::Display for TagPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators_and_case() {
        let path = TagPath::parse("UI/Hud\\Bitmaps/Crosshair").expect("path");
        assert_eq!(path.as_str(), "ui\\hud\\bitmaps\\crosshair");
        assert_eq!(path.base_name(), "crosshair");
        assert_eq!(
            path.to_file_path(TagClass::Bitmap),
            PathBuf::from("ui/hud/bitmaps/crosshair.bitmap")
        );
    }

    #[test]
    fn rejects_unsafe_paths() {
        for bad in ["/abs/path", "a/../b", "a/./b", "c:/tags/a", "a//b", "   "] {
            assert!(TagPath::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn rejects_long_paths() {
        let long = "a".repeat(MAX_TAG_PATH_LEN + 1);
        let err = TagPath::parse(&long).expect_err("too long");
        assert!(matches!(err, TagPathError::TooLong { .. }));
    }

    #[test]
    fn parse_with_extension_splits_class() {
        let (path, class) =
            TagPath::parse_with_extension("weapons/pistol/pistol.weapon_hud_interface")
                .expect("path");
        assert_eq!(path.as_str(), "weapons\\pistol\\pistol");
        assert_eq!(class, TagClass::WeaponHudInterface);
        assert_eq!(path.with_extension(class), "weapons\\pistol\\pistol.weapon_hud_interface");

        let err = TagPath::parse_with_extension("weapons/pistol/pistol.model").expect_err("class");
        assert!(matches!(err, TagPathError::UnknownExtension(_)));
    }
}
