use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use map_build::{
    build_cache_file, build_resource_map, load_resource_maps, BuildError, BuildManifest,
    BuildOptions,
};
use map_compress::CompressionError;
use tag_format::cache_file::CacheFileView;
use tag_format::{CacheHeader, Dialect, ResourceMap, ResourceMapType, TagClass, TagPath, TagReference};
use tag_tree::TagTree;
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: i32 = 0;
const EXIT_USAGE: i32 = 2;
const EXIT_DISCOVERY: i32 = 10;
const EXIT_COMPILE: i32 = 11;
const EXIT_LINK: i32 = 12;
const EXIT_RESOURCE_MAP: i32 = 13;
const EXIT_COMPRESSION: i32 = 14;
const EXIT_IO: i32 = 15;

#[derive(Parser)]
#[command(name = "tools", version, about = "Tag build tools CLI")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Build(BuildArgs),
    Compress {
        input: PathBuf,
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = map_compress::DEFAULT_LEVEL)]
        level: i32,
    },
    Decompress {
        input: PathBuf,
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    Resource(ResourceArgs),
    Info {
        map: PathBuf,
    },
    Tags {
        #[arg(long = "tags", value_name = "PATH", required = true)]
        roots: Vec<PathBuf>,
    },
}

#[derive(Args)]
struct BuildArgs {
    #[arg(long, value_name = "PATH")]
    manifest: Option<PathBuf>,
    #[arg(long = "tags", value_name = "PATH")]
    roots: Vec<PathBuf>,
    #[arg(long)]
    scenario: Option<String>,
    #[arg(long)]
    dialect: Option<String>,
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    #[arg(long = "resource-map", value_name = "PATH")]
    resource_maps: Vec<PathBuf>,
    #[arg(long)]
    compression_level: Option<i32>,
    #[arg(long)]
    build_string: Option<String>,
    #[arg(long)]
    scenario_name: Option<String>,
    #[arg(long)]
    tag_space_limit: Option<u64>,
}

#[derive(Args)]
struct ResourceArgs {
    #[command(subcommand)]
    command: ResourceCommand,
}

#[derive(Subcommand)]
enum ResourceCommand {
    Build {
        #[arg(long = "tags", value_name = "PATH", required = true)]
        roots: Vec<PathBuf>,
        /// bitmaps, sounds or loc
        #[arg(long = "type")]
        map_type: String,
        #[arg(long, value_name = "PATH")]
        output: PathBuf,
        /// Tag paths with their class extension.
        #[arg(required = true)]
        tags: Vec<String>,
    },
    List {
        map: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let exit_code = match cli.command {
        Commands::Build(args) => run_build(args),
        Commands::Compress {
            input,
            output,
            level,
        } => run_compress(&input, output.as_deref(), level),
        Commands::Decompress { input, output } => run_decompress(&input, output.as_deref()),
        Commands::Resource(args) => run_resource(args),
        Commands::Info { map } => run_info(&map),
        Commands::Tags { roots } => run_tags(&roots),
    };
    std::process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_exit_code(err: &BuildError) -> i32 {
    match err {
        BuildError::Discovery(_) => EXIT_DISCOVERY,
        BuildError::Compile(_)
        | BuildError::CompileFailed { .. }
        | BuildError::ScenarioNameTooLong(_) => EXIT_COMPILE,
        BuildError::Link(_) => EXIT_LINK,
        BuildError::ResourceMap(_) | BuildError::NotHostedByResourceMap { .. } => {
            EXIT_RESOURCE_MAP
        }
        BuildError::UnsupportedDialect(_) => EXIT_USAGE,
        BuildError::Io { .. } => EXIT_IO,
    }
}

fn compression_exit_code(err: &CompressionError) -> i32 {
    match err {
        CompressionError::InvalidLevel(_) => EXIT_USAGE,
        CompressionError::Io { .. } => EXIT_IO,
        _ => EXIT_COMPRESSION,
    }
}

/// Manifest values with command-line flags layered on top.
fn resolve_manifest(args: BuildArgs) -> Result<BuildManifest, String> {
    let mut manifest = match &args.manifest {
        Some(path) => BuildManifest::load(path)?,
        None => BuildManifest {
            tags: Vec::new(),
            scenario: args
                .scenario
                .clone()
                .ok_or_else(|| "--scenario is required without --manifest".to_string())?,
            dialect: "custom-edition".to_string(),
            output: None,
            resource_maps: Vec::new(),
            compression_level: None,
            build_string: None,
            scenario_name: None,
            tag_space_limit: None,
            budget_ceilings: Default::default(),
        },
    };
    if !args.roots.is_empty() {
        manifest.tags = args.roots;
    }
    if let Some(scenario) = args.scenario {
        manifest.scenario = scenario;
    }
    if let Some(dialect) = args.dialect {
        manifest.dialect = dialect;
    }
    if args.output.is_some() {
        manifest.output = args.output;
    }
    if !args.resource_maps.is_empty() {
        manifest.resource_maps = args.resource_maps;
    }
    if args.compression_level.is_some() {
        manifest.compression_level = args.compression_level;
    }
    if args.build_string.is_some() {
        manifest.build_string = args.build_string;
    }
    if args.scenario_name.is_some() {
        manifest.scenario_name = args.scenario_name;
    }
    if args.tag_space_limit.is_some() {
        manifest.tag_space_limit = args.tag_space_limit;
    }
    Ok(manifest)
}

fn run_build(args: BuildArgs) -> i32 {
    let manifest = match resolve_manifest(args) {
        Ok(manifest) => manifest,
        Err(err) => {
            eprintln!("{}", err);
            return EXIT_USAGE;
        }
    };
    let validation = manifest.validate();
    for warning in &validation.warnings {
        tracing::warn!("{}", warning);
    }
    if !validation.is_ok() {
        for error in &validation.errors {
            eprintln!("manifest error: {}", error);
        }
        return EXIT_USAGE;
    }

    let tree = match TagTree::from_roots(&manifest.tags[..]) {
        Ok(tree) => tree,
        Err(err) => {
            eprintln!("tag roots: {}", err);
            return EXIT_IO;
        }
    };
    let maps = match load_resource_maps(&manifest.resource_maps[..]) {
        Ok(maps) => maps,
        Err(err) => {
            eprintln!("{}", err);
            return build_exit_code(&err);
        }
    };
    let options: BuildOptions = match manifest.to_options(maps) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{}", err);
            return EXIT_USAGE;
        }
    };
    let output = manifest.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!("{}.map", options.root.path.base_name()))
    });

    let built = match build_cache_file(&tree, options) {
        Ok(built) => built,
        Err(err) => {
            eprintln!("build failed: {}", err);
            return build_exit_code(&err);
        }
    };
    let bytes = match manifest.compression_level {
        Some(level) => match map_compress::compress_map(&built.bytes, level) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("compression failed: {}", err);
                return compression_exit_code(&err);
            }
        },
        None => built.bytes,
    };
    if let Err(err) = write_file(&output, &bytes) {
        eprintln!("{}", err);
        return EXIT_IO;
    }
    println!(
        "built {} ({} bytes, {} structs placed, {} merged, {} external, {} warning(s))",
        output.display(),
        bytes.len(),
        built.stats.placed_structs,
        built.stats.merged_structs,
        built.stats.external_tags,
        built.diagnostics.warnings()
    );
    EXIT_SUCCESS
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), String> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|err| format!("failed to create {}: {}", dir.display(), err))?;
    }
    fs::write(path, bytes).map_err(|err| format!("failed to write {}: {}", path.display(), err))
}

fn run_compress(input: &Path, output: Option<&Path>, level: i32) -> i32 {
    match map_compress::compress_map_file(input, output, level) {
        Ok(size) => {
            println!("compressed {} ({} bytes)", output.unwrap_or(input).display(), size);
            EXIT_SUCCESS
        }
        Err(err) => {
            eprintln!("compress failed: {}", err);
            compression_exit_code(&err)
        }
    }
}

fn run_decompress(input: &Path, output: Option<&Path>) -> i32 {
    match map_compress::decompress_map_file(input, output) {
        Ok(size) => {
            println!("decompressed {} ({} bytes)", output.unwrap_or(input).display(), size);
            EXIT_SUCCESS
        }
        Err(err) => {
            eprintln!("decompress failed: {}", err);
            compression_exit_code(&err)
        }
    }
}

fn run_resource(args: ResourceArgs) -> i32 {
    match args.command {
        ResourceCommand::Build {
            roots,
            map_type,
            output,
            tags,
        } => resource_build(&roots, &map_type, &output, &tags),
        ResourceCommand::List { map } => resource_list(&map),
    }
}

fn resource_build(roots: &[PathBuf], map_type: &str, output: &Path, tags: &[String]) -> i32 {
    let map_type: ResourceMapType = match map_type.parse() {
        Ok(map_type) => map_type,
        Err(err) => {
            eprintln!("{}", err);
            return EXIT_USAGE;
        }
    };
    let mut references = Vec::with_capacity(tags.len());
    for tag in tags {
        match TagPath::parse_with_extension(tag) {
            Ok((path, class)) => references.push(TagReference::new(class, path)),
            Err(err) => {
                eprintln!("{}: {}", tag, err);
                return EXIT_USAGE;
            }
        }
    }
    let tree = match TagTree::from_roots(roots) {
        Ok(tree) => tree,
        Err(err) => {
            eprintln!("tag roots: {}", err);
            return EXIT_IO;
        }
    };
    let built = match build_resource_map(&tree, map_type, &references) {
        Ok(built) => built,
        Err(err) => {
            eprintln!("resource build failed: {}", err);
            return build_exit_code(&err);
        }
    };
    let bytes = match built.map.encode() {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("resource map encode failed: {}", err);
            return EXIT_RESOURCE_MAP;
        }
    };
    if let Err(err) = write_file(output, &bytes) {
        eprintln!("{}", err);
        return EXIT_IO;
    }
    println!(
        "built {} resource map {} ({} resources, {} bytes)",
        map_type,
        output.display(),
        built.map.resources.len(),
        bytes.len()
    );
    EXIT_SUCCESS
}

fn resource_list(path: &Path) -> i32 {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("failed to read {}: {}", path.display(), err);
            return EXIT_IO;
        }
    };
    let map = match ResourceMap::decode(&bytes) {
        Ok(map) => map,
        Err(err) => {
            eprintln!("resource map parse failed: {}", err);
            return EXIT_RESOURCE_MAP;
        }
    };
    println!("resource map: {} ({})", path.display(), map.map_type);
    for (index, resource) in map.resources.iter().enumerate() {
        println!("{:>6} {:>10} {}", index, resource.data.len(), resource.path);
    }
    EXIT_SUCCESS
}

fn run_info(path: &Path) -> i32 {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("failed to read {}: {}", path.display(), err);
            return EXIT_IO;
        }
    };
    let (header, layout) = match CacheHeader::detect(&bytes) {
        Ok(detected) => detected,
        Err(err) => {
            eprintln!("{}: {}", path.display(), err);
            return EXIT_COMPRESSION;
        }
    };
    let dialect = header.dialect();
    println!("map:      {}", path.display());
    println!("name:     {}", header.name_str());
    println!("build:    {}", header.build_str());
    match dialect {
        Some(dialect) => println!("dialect:  {} ({:?} header)", dialect, layout),
        None => println!("dialect:  unknown (0x{:X})", header.engine),
    }
    println!("size:     {} bytes", bytes.len());

    let compressed = dialect.map_or(false, Dialect::is_compressed_variant)
        || (dialect == Some(Dialect::DarkCirclet) && header.decompressed_file_size > 0);
    if compressed {
        println!("compressed: yes ({} bytes decompressed)", header.decompressed_file_size);
        return EXIT_SUCCESS;
    }
    let view = match CacheFileView::parse(&bytes) {
        Ok(view) => view,
        Err(err) => {
            eprintln!("{}: {}", path.display(), err);
            return EXIT_COMPRESSION;
        }
    };
    println!(
        "crc32:    0x{:08X} ({})",
        view.header.crc32,
        if view.checksum_matches() { "ok" } else { "mismatch" }
    );
    println!("tags:     {}", view.tag_data_header.tag_count);
    EXIT_SUCCESS
}

fn run_tags(roots: &[PathBuf]) -> i32 {
    let tree = match TagTree::from_roots(roots) {
        Ok(tree) => tree,
        Err(err) => {
            eprintln!("tag roots: {}", err);
            return EXIT_IO;
        }
    };
    for root in tree.roots() {
        println!("root {} [{}] {}", root.order, root.kind, root.source.display());
    }
    let entries = match tree.scan() {
        Ok(entries) => entries,
        Err(err) => {
            eprintln!("scan failed: {}", err);
            return EXIT_IO;
        }
    };
    for entry in &entries {
        println!("{:>3} {}", entry.root, entry.path.with_extension(entry.class));
    }
    let scenarios = entries
        .iter()
        .filter(|entry| entry.class == TagClass::Scenario)
        .count();
    println!("{} tags ({} scenarios)", entries.len(), scenarios);
    EXIT_SUCCESS
}
