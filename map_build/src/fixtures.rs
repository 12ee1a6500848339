//! Small tag trees shared by the unit tests.

use tag_format::definitions::{
    BITMAP, DAMAGE_EFFECT, LENS_FLARE, SCENARIO, SCENERY, SOUND, UNICODE_STRING_LIST,
    WEAPON_HUD_INTERFACE,
};
use tag_format::record::Fields;
use tag_format::tag_file::write_tag_file;
use tag_format::{Dialect, Record, ResourceMap, TagClass, TagPath, TagReference};
use tag_tree::MemoryTagSource;

use crate::compile::{run_post_compile, TagCompiler};
use crate::diagnostics::Severity;
use crate::discovery::discover;
use crate::hooks::HookRegistry;
use crate::workload::{BuildOptions, BuildWorkload, TagIndex};

pub fn reference(class: TagClass, path: &str) -> TagReference {
    TagReference::new(class, TagPath::parse(path).expect("tag path"))
}

pub fn scenario_reference() -> TagReference {
    reference(TagClass::Scenario, "levels\\test\\test")
}

pub fn insert(source: &mut MemoryTagSource, reference: &TagReference, record: &Record) {
    source.insert(
        reference.path.clone(),
        reference.class,
        write_tag_file(reference.class, record),
    );
}

/// UTF-16LE with a terminating NUL.
pub fn wide(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}

/// A bitmap with one sequence per entry of `sprites`, each covering one
/// bitmap and holding that many sprites.
pub fn bitmap_with_sequences(sprites: &[usize]) -> Record {
    let mut bitmap = Record::new(&BITMAP);
    for (index, &count) in sprites.iter().enumerate() {
        let sequence = bitmap
            .push_element("bitmap_group_sequence")
            .expect("sequence");
        sequence
            .set_string32("name", &format!("sequence {}", index))
            .expect("name");
        sequence.set_i16("first_bitmap_index", 0).expect("first");
        sequence.set_i16("bitmap_count", 1).expect("count");
        for _ in 0..count {
            sequence.push_element("sprites").expect("sprite");
        }
    }
    let data = bitmap.push_element("bitmap_data").expect("bitmap data");
    data.set_u16("width", 16).expect("width");
    data.set_u16("height", 16).expect("height");
    bitmap
}

fn string_list(strings: &[&str]) -> Record {
    let mut list = Record::new(&UNICODE_STRING_LIST);
    for text in strings {
        list.push_element("strings")
            .expect("string")
            .set_data("string", wide(text))
            .expect("data");
    }
    list
}

pub fn sample_tree() -> MemoryTagSource {
    sample_tree_with(0)
}

/// Scenario with one scenery, two identical string lists and a HUD whose
/// crosshair overlay uses `sequence_index` of a three-sequence bitmap.
pub fn sample_tree_with(sequence_index: i16) -> MemoryTagSource {
    let mut source = MemoryTagSource::new();
    let rock = reference(TagClass::Scenery, "scenery\\rock\\rock");
    let glow = reference(TagClass::LensFlare, "effects\\glow");
    let glow_bitmap = reference(TagClass::Bitmap, "ui\\glow");
    let thump = reference(TagClass::DamageEffect, "effects\\thump");
    let thump_sound = reference(TagClass::Sound, "sound\\thump");
    let names = reference(TagClass::UnicodeStringList, "ui\\names");
    let help = reference(TagClass::UnicodeStringList, "ui\\help");
    let rifle = reference(TagClass::WeaponHudInterface, "ui\\hud\\rifle");
    let crosshair = reference(TagClass::Bitmap, "ui\\hud\\crosshair");

    let mut scenario = Record::new(&SCENARIO);
    scenario.set_u16("type", 1).expect("type");
    scenario
        .push_element("scenery_palette")
        .expect("palette")
        .set_dependency("name", Some(rock.clone()))
        .expect("name");
    let placement = scenario.push_element("scenery").expect("placement");
    placement.set_i16("type", 0).expect("type");
    placement.set_i16("name", -1).expect("name");
    placement.set_f32("position_z", 2.5).expect("position");
    scenario
        .set_dependency("custom_object_names", Some(names.clone()))
        .expect("names");
    scenario
        .set_dependency("ingame_help_text", Some(help.clone()))
        .expect("help");
    scenario
        .set_dependency("weapon_hud_interface", Some(rifle.clone()))
        .expect("hud");
    insert(&mut source, &scenario_reference(), &scenario);

    let mut scenery = Record::new(&SCENERY);
    scenery.set_f32("bounding_radius", 1.5).expect("radius");
    scenery
        .push_element("attachments")
        .expect("attachment")
        .set_dependency("type", Some(glow.clone()))
        .expect("glow");
    scenery
        .push_element("attachments")
        .expect("attachment")
        .set_dependency("type", Some(thump.clone()))
        .expect("thump");
    insert(&mut source, &rock, &scenery);

    let mut flare = Record::new(&LENS_FLARE);
    flare.set_f32("falloff_angle", 0.5).expect("falloff");
    flare.set_f32("cutoff_angle", 1.0).expect("cutoff");
    flare
        .set_dependency("bitmap", Some(glow_bitmap.clone()))
        .expect("bitmap");
    flare.push_element("reflections").expect("reflection");
    insert(&mut source, &glow, &flare);
    insert(&mut source, &glow_bitmap, &bitmap_with_sequences(&[1]));

    let mut damage = Record::new(&DAMAGE_EFFECT);
    damage.set_f32("duration", 0.25).expect("duration");
    damage
        .set_dependency("sound", Some(thump_sound.clone()))
        .expect("sound");
    insert(&mut source, &thump, &damage);

    let mut sound = Record::new(&SOUND);
    sound.set_f32("maximum_distance", 20.0).expect("distance");
    sound
        .push_element("pitch_ranges")
        .expect("pitch range")
        .set_string32("name", "default")
        .expect("name");
    insert(&mut source, &thump_sound, &sound);

    let strings = string_list(&["Warthog", "Ghost"]);
    insert(&mut source, &names, &strings);
    insert(&mut source, &help, &strings);

    let mut hud = Record::new(&WEAPON_HUD_INTERFACE);
    let element = hud.push_element("crosshairs").expect("crosshair");
    element
        .set_dependency("crosshair_bitmap", Some(crosshair.clone()))
        .expect("bitmap");
    element
        .push_element("crosshair_overlays")
        .expect("overlay")
        .set_i16("sequence_index", sequence_index)
        .expect("sequence");
    insert(&mut source, &rifle, &hud);
    insert(&mut source, &crosshair, &bitmap_with_sequences(&[1, 1, 1]));

    source
}

/// The sample tree discovered and compiled, ready to link.
pub fn compiled_sample(dialect: Dialect, resource_maps: Vec<ResourceMap>) -> BuildWorkload {
    let source = sample_tree();
    let mut options = BuildOptions::new(dialect, scenario_reference());
    options.resource_maps = resource_maps;
    let discovery = discover(&source, &scenario_reference()).expect("discovery");
    let mut workload = BuildWorkload::new(options);
    for tag in discovery.tags {
        workload.push_tag(tag.reference, tag.record);
    }
    let hooks = HookRegistry::standard();
    TagCompiler::new(&mut workload, &hooks)
        .compile_all()
        .expect("compile");
    run_post_compile(&mut workload, &hooks).expect("post compile");
    assert!(
        !workload.diagnostics.has_errors(),
        "{:?}",
        workload.diagnostics
    );
    workload
}

/// Compiles `tags` in order, the first one being the root, and runs the
/// post-compile pass.
pub fn compile_tags(dialect: Dialect, tags: Vec<(TagReference, Record)>) -> BuildWorkload {
    let root = tags[0].0.clone();
    let mut workload = BuildWorkload::new(BuildOptions::new(dialect, root));
    for (reference, record) in tags {
        workload.push_tag(reference, record);
    }
    let hooks = HookRegistry::standard();
    TagCompiler::new(&mut workload, &hooks)
        .compile_all()
        .expect("compile");
    run_post_compile(&mut workload, &hooks).expect("post compile");
    workload
}

/// Compiled root element of `tag`.
pub fn root_fields(workload: &BuildWorkload, tag: usize) -> Fields<'_> {
    let entry = workload.tag(TagIndex(tag)).expect("tag");
    let root = entry.root_struct.expect("root struct");
    let compiled = workload.structs.get(root).expect("compiled root");
    Fields::new(entry.record.def(), &compiled.data)
}

/// `locator: message` of every diagnostic with `severity`.
pub fn reported(workload: &BuildWorkload, severity: Severity) -> Vec<String> {
    workload
        .diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.severity == severity)
        .map(|diagnostic| format!("{}: {}", diagnostic.locator, diagnostic.message))
        .collect()
}
