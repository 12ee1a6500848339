//! TOML build manifests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tag_format::{Dialect, ResourceMap, TagClass, TagPath, TagReference};

use crate::workload::BuildOptions;

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildManifest {
    /// Tag roots in priority order.
    pub tags: Vec<PathBuf>,
    pub scenario: String,
    #[serde(default = "default_dialect")]
    pub dialect: String,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub resource_maps: Vec<PathBuf>,
    #[serde(default)]
    pub compression_level: Option<i32>,
    #[serde(default)]
    pub build_string: Option<String>,
    #[serde(default)]
    pub scenario_name: Option<String>,
    #[serde(default)]
    pub tag_space_limit: Option<u64>,
    #[serde(default)]
    pub budget_ceilings: BTreeMap<String, u64>,
}

fn default_dialect() -> String {
    "custom-edition".to_string()
}

#[derive(Clone, Debug, Default)]
pub struct ManifestValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ManifestValidation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl BuildManifest {
    pub fn parse_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|err| err.to_string())
    }

    /// Reads a manifest and rebases its relative paths on the manifest's
    /// directory.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
        let mut manifest =
            Self::parse_toml(&text).map_err(|err| format!("{}: {}", path.display(), err))?;
        if let Some(dir) = path.parent() {
            manifest.rebase(dir);
        }
        Ok(manifest)
    }

    pub fn rebase(&mut self, dir: &Path) {
        let rebase = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        };
        self.tags.iter_mut().for_each(rebase);
        self.resource_maps.iter_mut().for_each(rebase);
        if let Some(output) = self.output.as_mut() {
            rebase(output);
        }
    }

    pub fn validate(&self) -> ManifestValidation {
        let mut validation = ManifestValidation::default();
        if self.tags.is_empty() {
            validation
                .errors
                .push("tags must list at least one tag root".to_string());
        }
        if let Err(err) = TagPath::parse(&self.scenario) {
            validation
                .errors
                .push(format!("scenario '{}' is invalid: {}", self.scenario, err));
        }
        match self.dialect.parse::<Dialect>() {
            Ok(dialect) => {
                if !self.resource_maps.is_empty() && !dialect.supports_indexed_tags() {
                    validation.warnings.push(format!(
                        "resource maps are ignored when building for {}",
                        dialect
                    ));
                }
            }
            Err(err) => validation.errors.push(err),
        }
        if let Some(level) = self.compression_level {
            if !(1..=19).contains(&level) {
                validation
                    .errors
                    .push(format!("compression_level {} is outside 1..=19", level));
            }
        }
        if let Some(name) = &self.scenario_name {
            if name.len() > 31 {
                validation
                    .errors
                    .push("scenario_name must be at most 31 characters".to_string());
            }
        }
        if let Some(build) = &self.build_string {
            if build.len() > 31 {
                validation
                    .errors
                    .push("build_string must be at most 31 characters".to_string());
            }
        }
        if self.tag_space_limit == Some(0) {
            validation
                .errors
                .push("tag_space_limit must be > 0".to_string());
        }
        for class in self.budget_ceilings.keys() {
            if class.parse::<TagClass>().is_err() {
                validation
                    .errors
                    .push(format!("budget_ceilings names unknown class '{}'", class));
            }
        }
        validation
    }

    pub fn to_options(&self, resource_maps: Vec<ResourceMap>) -> Result<BuildOptions, String> {
        let dialect = self.dialect.parse::<Dialect>()?;
        let path = TagPath::parse(&self.scenario).map_err(|err| err.to_string())?;
        let mut options =
            BuildOptions::new(dialect, TagReference::new(TagClass::Scenario, path));
        options.scenario_name = self.scenario_name.clone();
        options.build_string = self.build_string.clone();
        options.tag_space_limit = self.tag_space_limit;
        options.resource_maps = resource_maps;
        for (class, ceiling) in &self.budget_ceilings {
            options.budget_ceilings.insert(class.parse()?, *ceiling);
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
tags = ["tags", "/abs/more_tags.zip"]
scenario = "levels\\test\\test"
dialect = "retail"
output = "maps/test.map"
compression_level = 19
tag_space_limit = 4096

[budget_ceilings]
sound = 1024
"#;

    #[test]
    fn parses_and_converts() {
        let manifest = BuildManifest::parse_toml(MANIFEST).expect("manifest");
        assert!(manifest.validate().is_ok());
        let options = manifest.to_options(Vec::new()).expect("options");
        assert_eq!(options.dialect, Dialect::Retail);
        assert_eq!(options.root.class, TagClass::Scenario);
        assert_eq!(options.root.path.as_str(), "levels\\test\\test");
        assert_eq!(options.tag_space_limit(), 4096);
        assert_eq!(options.budget_ceilings.get(&TagClass::Sound), Some(&1024));
        assert_eq!(options.build_string(), "01.00.00.0564");
    }

    #[test]
    fn dialect_defaults_to_custom_edition() {
        let manifest =
            BuildManifest::parse_toml("tags = [\"tags\"]\nscenario = \"a\\\\b\"\n").expect("manifest");
        assert_eq!(manifest.dialect, "custom-edition");
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = BuildManifest::parse_toml("tags = []\nscenario = \"a\"\nspeed = 3\n")
            .expect_err("unknown key");
        assert!(err.contains("speed"), "{}", err);
    }

    #[test]
    fn validation_collects_every_problem() {
        let manifest = BuildManifest::parse_toml(
            r#"
tags = []
scenario = "a"
dialect = "xbox"
compression_level = 40
[budget_ceilings]
teapot = 1
"#,
        )
        .expect("manifest");
        let validation = manifest.validate();
        assert!(!validation.is_ok());
        assert_eq!(validation.errors.len(), 4, "{:?}", validation.errors);
    }

    #[test]
    fn resource_maps_outside_custom_edition_warn() {
        let manifest = BuildManifest::parse_toml(
            "tags = [\"t\"]\nscenario = \"a\"\ndialect = \"retail\"\nresource_maps = [\"loc.map\"]\n",
        )
        .expect("manifest");
        let validation = manifest.validate();
        assert!(validation.is_ok());
        assert_eq!(validation.warnings.len(), 1);
    }

    #[test]
    fn load_rebases_relative_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("build.toml");
        fs::write(&path, MANIFEST).expect("write");
        let manifest = BuildManifest::load(&path).expect("load");
        assert_eq!(manifest.tags[0], dir.path().join("tags"));
        assert_eq!(manifest.tags[1], PathBuf::from("/abs/more_tags.zip"));
        assert_eq!(manifest.output, Some(dir.path().join("maps/test.map")));
    }
}
