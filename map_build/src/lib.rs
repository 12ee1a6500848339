//! Tag compilation and linking into cache files and resource maps.
#![forbid(unsafe_code)]

mod budget;
mod compile;
mod diagnostics;
mod discovery;
mod emit;
mod error;
pub mod hooks;
mod linker;
mod manifest;
mod resource;
mod structs;
mod workload;

#[cfg(test)]
mod fixtures;

use tag_tree::TagSource;

pub use budget::resolve_budgets;
pub use compile::{run_post_compile, TagCompiler};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use discovery::{discover, load_tag, DiscoveredTag, Discovery};
pub use emit::{emit_cache_file, scenario_name};
pub use error::{BuildError, CompileError, DiscoveryError, LinkError};
pub use hooks::HookRegistry;
pub use linker::{link, AddressMode, LinkStats, LinkedArtifact, LinkedTag, Placement, TagData};
pub use manifest::{BuildManifest, ManifestValidation};
pub use resource::{
    build_resource_map, build_resource_map_with_hooks, load_resource_map, load_resource_maps,
    ResourceBuildOutput,
};
pub use structs::{CompiledStruct, ReferenceKind, ReferenceSite, StructIndex, StructTable};
pub use workload::{
    default_build_string, BuildOptions, BuildWorkload, DependencyEdge, TagEntry, TagIndex,
};

#[derive(Debug)]
pub struct BuildOutput {
    pub bytes: Vec<u8>,
    pub diagnostics: Diagnostics,
    pub stats: LinkStats,
}

pub fn build_cache_file(
    source: &dyn TagSource,
    options: BuildOptions,
) -> Result<BuildOutput, BuildError> {
    build_cache_file_with_hooks(source, options, &HookRegistry::standard())
}

/// Discovers, compiles, links and emits one cache file. Any error-severity
/// diagnostic stops the build before linking.
pub fn build_cache_file_with_hooks(
    source: &dyn TagSource,
    options: BuildOptions,
    hooks: &HookRegistry,
) -> Result<BuildOutput, BuildError> {
    let dialect = options.dialect;
    if !dialect.is_build_target() {
        return Err(BuildError::UnsupportedDialect(dialect));
    }
    scenario_name_fits(&options)?;

    let discovery = discover(source, &options.root)?;
    let mut workload = BuildWorkload::new(options);
    workload.diagnostics.merge(discovery.diagnostics);
    for tag in discovery.tags {
        workload.push_tag(tag.reference, tag.record);
    }

    TagCompiler::new(&mut workload, hooks).compile_all()?;
    run_post_compile(&mut workload, hooks)?;
    resolve_budgets(&mut workload)?;
    tracing::info!(
        tags = workload.tags.len(),
        structs = workload.structs.len(),
        warnings = workload.diagnostics.warnings(),
        errors = workload.diagnostics.errors(),
        "compiled"
    );
    if workload.diagnostics.has_errors() {
        return Err(BuildError::CompileFailed {
            errors: workload.diagnostics.errors(),
            warnings: workload.diagnostics.warnings(),
            diagnostics: workload.diagnostics.as_slice().to_vec(),
        });
    }

    let linked = link(
        &workload,
        AddressMode::Pointer {
            base: dialect.base_address(),
        },
    )?;
    let bytes = emit_cache_file(&workload, &linked)?;
    Ok(BuildOutput {
        bytes,
        diagnostics: workload.diagnostics,
        stats: linked.stats,
    })
}

fn scenario_name_fits(options: &BuildOptions) -> Result<(), BuildError> {
    match &options.scenario_name {
        Some(name) if name.len() > 31 => Err(BuildError::ScenarioNameTooLong(name.clone())),
        _ => Ok(()),
    }
}
