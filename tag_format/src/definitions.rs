//! Struct layouts of every tag class the toolchain builds.

use crate::schema::field;
use crate::schema::FieldKind::{self, *};
use crate::schema::StructDef;
use crate::tag_class::TagClass;

const fn reflexive(def: &'static StructDef, maximum: u32) -> FieldKind {
    Reflexive { def, maximum }
}

pub const CROSSHAIR_TYPES: &[&str] = &[
    "aim",
    "zoom",
    "charge",
    "should_reload",
    "flash_heat",
    "flash_total_ammo",
    "flash_battery",
    "reload_overheat",
    "flash_when_firing_and_no_ammo",
    "flash_when_throwing_and_no_grenade",
    "low_ammo_and_none_left_to_reload",
    "should_reload_secondary_trigger",
    "flash_secondary_total_ammo",
    "flash_secondary_reload",
    "flash_when_firing_secondary_trigger_with_no_ammo",
    "low_secondary_ammo_and_none_left_to_reload",
    "primary_trigger_ready",
    "secondary_trigger_ready",
    "flash_when_firing_with_depleted_battery",
];

pub const CROSSHAIR_OVERLAY_FLAGS: &[&str] = &[
    "flashes_when_active",
    "not_a_sprite",
    "show_only_when_zoomed",
    "show_sniper_data",
    "hide_area_outside_reticle",
    "one_zoom_level",
    "dont_show_when_zoomed",
];

const MAP_TYPES: &[&str] = &["singleplayer", "multiplayer", "user_interface"];
const FUNCTIONS: &[&str] = &[
    "one", "zero", "cosine", "cosine_variable_period", "diagonal_wave",
    "diagonal_wave_variable_period", "slide", "slide_variable_period", "noise", "jitter",
    "wander", "spark",
];
const HUD_ANCHORS: &[&str] = &[
    "top_left",
    "top_right",
    "bottom_left",
    "bottom_right",
    "center",
];
const HUD_STATES: &[&str] = &[
    "total_ammo",
    "loaded_ammo",
    "heat",
    "age",
    "secondary_weapon_total_ammo",
    "secondary_weapon_loaded_ammo",
    "distance_to_target",
    "elevation_to_target",
];
const FLASH_FLAGS: &[&str] = &["reverse_default_flashing_colors"];

// bitmap

pub static BITMAP_SPRITE: StructDef = StructDef {
    name: "bitmap_group_sprite",
    fields: &[
        field("bitmap_index", I16),
        field("pad0", Pad(2)),
        field("pad1", Pad(4)),
        field("left", F32),
        field("right", F32),
        field("top", F32),
        field("bottom", F32),
        field("registration_point_x", F32),
        field("registration_point_y", F32),
    ],
};

pub static BITMAP_GROUP_SEQUENCE: StructDef = StructDef {
    name: "bitmap_group_sequence",
    fields: &[
        field("name", String32),
        field("first_bitmap_index", I16),
        field("bitmap_count", I16),
        field("pad0", Pad(16)),
        field("sprites", reflexive(&BITMAP_SPRITE, 64)),
    ],
};

pub static BITMAP_DATA: StructDef = StructDef {
    name: "bitmap_data",
    fields: &[
        field("bitmap_class", U32),
        field("width", U16),
        field("height", U16),
        field("depth", U16),
        field("type", Enum16(&["2d_texture", "3d_texture", "cube_map", "white"])),
        field(
            "format",
            Enum16(&[
                "a8", "y8", "ay8", "a8y8", "unused1", "unused2", "r5g6b5", "unused3",
                "a1r5g5b5", "a4r4g4b4", "x8r8g8b8", "a8r8g8b8", "unused4", "unused5",
                "dxt1", "dxt3", "dxt5", "p8_bump",
            ]),
        ),
        field(
            "flags",
            Flags16(&[
                "power_of_two_dimensions",
                "compressed",
                "palettized",
                "swizzled",
                "linear",
                "v16u16",
                "external",
            ]),
        ),
        field("registration_point_x", I16),
        field("registration_point_y", I16),
        field("mipmap_count", U16),
        field("pad0", Pad(2)),
        field("pixel_data_offset", U32),
        field("pixel_data_size", U32),
        field("bitmap_tag_id", U32),
        field("pointer", U32),
        field("pad1", Pad(8)),
    ],
};

pub static BITMAP: StructDef = StructDef {
    name: "bitmap",
    fields: &[
        field(
            "type",
            Enum16(&[
                "2d_textures",
                "3d_textures",
                "cube_maps",
                "sprites",
                "interface_bitmaps",
            ]),
        ),
        field(
            "encoding_format",
            Enum16(&[
                "dxt1",
                "dxt3",
                "dxt5",
                "16_bit",
                "32_bit",
                "monochrome",
            ]),
        ),
        field(
            "usage",
            Enum16(&[
                "alpha_blend",
                "default",
                "height_map",
                "detail_map",
                "light_map",
                "vector_map",
            ]),
        ),
        field(
            "flags",
            Flags16(&[
                "enable_diffusion_dithering",
                "disable_height_map_compression",
                "uniform_sprite_sequences",
                "filthy_sprite_bug_fix",
            ]),
        ),
        field("detail_fade_factor", F32),
        field("sharpen_amount", F32),
        field("bump_height", F32),
        field(
            "sprite_budget_size",
            Enum16(&["32x32", "64x64", "128x128", "256x256", "512x512"]),
        ),
        field("sprite_budget_count", U16),
        field("color_plate_width", U16),
        field("color_plate_height", U16),
        field("compressed_color_plate_data", Data),
        field("processed_pixel_data", Data),
        field("blur_filter_size", F32),
        field("alpha_bias", F32),
        field("mipmap_count", U16),
        field(
            "sprite_usage",
            Enum16(&["blend_add_subtract_max", "multiply_min", "double_multiply"]),
        ),
        field("sprite_spacing", U16),
        field("pad0", Pad(2)),
        field("bitmap_group_sequence", reflexive(&BITMAP_GROUP_SEQUENCE, 256)),
        field("bitmap_data", reflexive(&BITMAP_DATA, 2048)),
    ],
};

// sound

pub static SOUND_PERMUTATION: StructDef = StructDef {
    name: "sound_permutation",
    fields: &[
        field("name", String32),
        field("skip_fraction", F32),
        field("gain", F32),
        field("compression", Enum16(&["none", "xbox_adpcm", "ima_adpcm", "ogg"])),
        field("next_permutation_index", I16),
        field("pad0", Pad(20)),
        field("samples", Data),
        field("mouth_data", Data),
        field("subtitle_data", Data),
    ],
};

pub static SOUND_PITCH_RANGE: StructDef = StructDef {
    name: "sound_pitch_range",
    fields: &[
        field("name", String32),
        field("natural_pitch", F32),
        field("bend_bounds_from", F32),
        field("bend_bounds_to", F32),
        field("actual_permutation_count", I16),
        field("pad0", Pad(2)),
        field("pad1", Pad(12)),
        field("permutations", reflexive(&SOUND_PERMUTATION, 256)),
    ],
};

pub static SOUND: StructDef = StructDef {
    name: "sound",
    fields: &[
        field(
            "flags",
            Flags32(&[
                "fit_to_adpcm_blocksize",
                "split_long_sound_into_permutations",
            ]),
        ),
        field(
            "sound_class",
            Enum16(&[
                "projectile_impact",
                "projectile_detonation",
                "unused",
                "unused1",
                "weapon_fire",
                "weapon_ready",
                "weapon_reload",
                "weapon_empty",
                "weapon_charge",
                "weapon_overheat",
                "weapon_idle",
                "object_impacts",
                "particle_impacts",
                "slow_particle_impacts",
                "unit_footsteps",
                "unit_dialog",
                "vehicle_collision",
                "vehicle_engine",
                "device_door",
                "ambient_nature",
                "music",
                "scripted_effect",
            ]),
        ),
        field("sample_rate", Enum16(&["22050_hz", "44100_hz"])),
        field("minimum_distance", F32),
        field("maximum_distance", F32),
        field("skip_fraction", F32),
        field("random_pitch_bounds_from", F32),
        field("random_pitch_bounds_to", F32),
        field("inner_cone_angle", Angle),
        field("outer_cone_angle", Angle),
        field("outer_cone_gain", F32),
        field("gain_modifier", F32),
        field("maximum_bend_per_second", F32),
        field("pad0", Pad(12)),
        field("channel_count", Enum16(&["mono", "stereo"])),
        field("format", Enum16(&["16_bit_pcm", "xbox_adpcm", "ima_adpcm", "ogg_vorbis"])),
        field("promotion_sound", Dependency(&[TagClass::Sound])),
        field("promotion_count", I16),
        field("pad1", Pad(22)),
        field("pitch_ranges", reflexive(&SOUND_PITCH_RANGE, 8)),
    ],
};

// damage_effect

pub static DAMAGE_EFFECT: StructDef = StructDef {
    name: "damage_effect",
    fields: &[
        field("radius_from", F32),
        field("radius_to", F32),
        field("cutoff_scale", F32),
        field(
            "flags",
            Flags32(&["dont_scale_damage_by_distance"]),
        ),
        field("pad0", Pad(20)),
        field("type", Enum16(&["none", "lightning", "pulse", "flash"])),
        field("priority", Enum16(&["low", "medium", "high"])),
        field("pad1", Pad(8)),
        field("duration", F32),
        field("fade_function", Enum16(&["linear", "early", "very_early", "late", "very_late"])),
        field("pad2", Pad(2)),
        field("rotation", Angle),
        field("pushback", F32),
        field("jitter_from", F32),
        field("jitter_to", F32),
        field("frequency", F32),
        field("pad3", Pad(24)),
        field("sound", Dependency(&[TagClass::Sound])),
        field("damage_lower_bound", F32),
        field("damage_upper_bound_from", F32),
        field("damage_upper_bound_to", F32),
        field("vehicle_passthrough_penalty", F32),
        field("active_camouflage_damage", F32),
        field("stun", F32),
        field("maximum_stun", F32),
        field("stun_time", F32),
        field("pad4", Pad(4)),
        field("instantaneous_acceleration", F32),
        field("pad5", Pad(8)),
    ],
};

// lens_flare

pub static LENS_FLARE_REFLECTION: StructDef = StructDef {
    name: "lens_flare_reflection",
    fields: &[
        field(
            "flags",
            Flags16(&[
                "align_rotation_with_screen_center",
                "radius_not_scaled_by_distance",
                "radius_scaled_by_occlusion_factor",
                "occluded_by_solid_objects",
            ]),
        ),
        field("pad0", Pad(2)),
        field("bitmap_index", I16),
        field("pad1", Pad(2)),
        field("position", F32),
        field("rotation_offset", F32),
        field("radius_from", F32),
        field("radius_to", F32),
        field("brightness_from", F32),
        field("brightness_to", F32),
        field("tint_color_a", F32),
        field("tint_color_r", F32),
        field("tint_color_g", F32),
        field("tint_color_b", F32),
        field("animation_function", Enum16(FUNCTIONS)),
        field("pad2", Pad(2)),
        field("animation_period", F32),
        field("animation_phase", F32),
        field("pad3", Pad(4)),
    ],
};

pub static LENS_FLARE: StructDef = StructDef {
    name: "lens_flare",
    fields: &[
        field("falloff_angle", Angle),
        field("cutoff_angle", Angle),
        field("cos_falloff_angle", F32),
        field("cos_cutoff_angle", F32),
        field("occlusion_radius", F32),
        field(
            "occlusion_offset_direction",
            Enum16(&["toward_viewer", "marker_forward", "none"]),
        ),
        field("pad0", Pad(2)),
        field("near_fade_distance", F32),
        field("far_fade_distance", F32),
        field("bitmap", Dependency(&[TagClass::Bitmap])),
        field("flags", Flags16(&["sun", "no_occlusion_test", "only_render_in_first_person"])),
        field("pad1", Pad(2)),
        field(
            "rotation_function",
            Enum16(&["none", "rotation_a", "rotation_b", "rotation_translation", "translation"]),
        ),
        field("pad2", Pad(2)),
        field("rotation_function_scale", F32),
        field("pad3", Pad(24)),
        field("horizontal_scale", F32),
        field("vertical_scale", F32),
        field("pad4", Pad(28)),
        field("reflections", reflexive(&LENS_FLARE_REFLECTION, 32)),
        field("pad5", Pad(32)),
    ],
};

// weapon_hud_interface

pub static WEAPON_HUD_INTERFACE_STATIC_ELEMENT: StructDef = StructDef {
    name: "weapon_hud_interface_static_element",
    fields: &[
        field("state_attached_to", Enum16(HUD_STATES)),
        field("pad0", Pad(2)),
        field("can_use_on_map_type", Enum16(MAP_TYPES)),
        field("pad1", Pad(2)),
        field("anchor_offset_x", I16),
        field("anchor_offset_y", I16),
        field("width_scale", F32),
        field("height_scale", F32),
        field("interface_bitmap", Dependency(&[TagClass::Bitmap])),
        field("default_color", U32),
        field("flashing_color", U32),
        field("flash_period", F32),
        field("flash_delay", F32),
        field("number_of_flashes", I16),
        field("flash_flags", Flags16(FLASH_FLAGS)),
        field("flash_length", F32),
        field("disabled_color", U32),
        field("pad2", Pad(4)),
        field("sequence_index", I16),
        field("pad3", Pad(2)),
        field("pad4", Pad(16)),
    ],
};

pub static WEAPON_HUD_INTERFACE_METER: StructDef = StructDef {
    name: "weapon_hud_interface_meter",
    fields: &[
        field("state_attached_to", Enum16(HUD_STATES)),
        field("pad0", Pad(2)),
        field("can_use_on_map_type", Enum16(MAP_TYPES)),
        field("pad1", Pad(2)),
        field("anchor_offset_x", I16),
        field("anchor_offset_y", I16),
        field("width_scale", F32),
        field("height_scale", F32),
        field("meter_bitmap", Dependency(&[TagClass::Bitmap])),
        field("color_at_meter_minimum", U32),
        field("color_at_meter_maximum", U32),
        field("flash_color", U32),
        field("empty_color", U32),
        field(
            "meter_flags",
            Flags8(&["use_min_max_for_state_changes", "interpolate_between_min_max_flash_colors_as_state_changes"]),
        ),
        field("minimum_meter_value", U8),
        field("sequence_index", I16),
        field("alpha_multiplier", U8),
        field("alpha_bias", U8),
        field("value_scale", I16),
        field("opacity", F32),
        field("translucency", F32),
        field("disabled_color", U32),
        field("pad2", Pad(16)),
    ],
};

pub static WEAPON_HUD_INTERFACE_CROSSHAIR_OVERLAY: StructDef = StructDef {
    name: "weapon_hud_interface_crosshair_overlay",
    fields: &[
        field("anchor_offset_x", I16),
        field("anchor_offset_y", I16),
        field("width_scale", F32),
        field("height_scale", F32),
        field("default_color", U32),
        field("flashing_color", U32),
        field("flash_period", F32),
        field("flash_delay", F32),
        field("number_of_flashes", I16),
        field("flash_flags", Flags16(FLASH_FLAGS)),
        field("flash_length", F32),
        field("disabled_color", U32),
        field("pad0", Pad(4)),
        field("frame_rate", I16),
        field("sequence_index", I16),
        field("flags", Flags32(CROSSHAIR_OVERLAY_FLAGS)),
        field("pad1", Pad(32)),
    ],
};

pub static WEAPON_HUD_INTERFACE_CROSSHAIR: StructDef = StructDef {
    name: "weapon_hud_interface_crosshair",
    fields: &[
        field("crosshair_type", Enum16(CROSSHAIR_TYPES)),
        field("pad0", Pad(2)),
        field("can_use_on_map_type", Enum16(MAP_TYPES)),
        field("pad1", Pad(2)),
        field("pad2", Pad(28)),
        field("crosshair_bitmap", Dependency(&[TagClass::Bitmap])),
        field(
            "crosshair_overlays",
            reflexive(&WEAPON_HUD_INTERFACE_CROSSHAIR_OVERLAY, 16),
        ),
        field("pad3", Pad(40)),
    ],
};

pub static WEAPON_HUD_INTERFACE_OVERLAY: StructDef = StructDef {
    name: "weapon_hud_interface_overlay",
    fields: &[
        field("anchor_offset_x", I16),
        field("anchor_offset_y", I16),
        field("width_scale", F32),
        field("height_scale", F32),
        field("default_color", U32),
        field("flashing_color", U32),
        field("flash_period", F32),
        field("flash_delay", F32),
        field("number_of_flashes", I16),
        field("flash_flags", Flags16(FLASH_FLAGS)),
        field("flash_length", F32),
        field("disabled_color", U32),
        field("pad0", Pad(4)),
        field("frame_rate", I16),
        field("pad1", Pad(2)),
        field("sequence_index", I16),
        field(
            "type",
            Flags16(&["show_on_flashing", "show_on_empty", "show_on_reload_overheating", "show_on_default", "show_always"]),
        ),
        field("flags", Flags32(&["flashes_when_active"])),
        field("pad2", Pad(56)),
    ],
};

pub static WEAPON_HUD_INTERFACE_OVERLAY_ELEMENT: StructDef = StructDef {
    name: "weapon_hud_interface_overlay_element",
    fields: &[
        field("state_attached_to", Enum16(HUD_STATES)),
        field("pad0", Pad(2)),
        field("can_use_on_map_type", Enum16(MAP_TYPES)),
        field("pad1", Pad(2)),
        field("pad2", Pad(28)),
        field("overlay_bitmap", Dependency(&[TagClass::Bitmap])),
        field("overlays", reflexive(&WEAPON_HUD_INTERFACE_OVERLAY, 16)),
        field("pad3", Pad(40)),
    ],
};

pub static WEAPON_HUD_INTERFACE: StructDef = StructDef {
    name: "weapon_hud_interface",
    fields: &[
        field("child_hud", Dependency(&[TagClass::WeaponHudInterface])),
        field(
            "flags",
            Flags16(&["use_parent_hud_flashing_parameters"]),
        ),
        field("pad0", Pad(2)),
        field("total_ammo_cutoff", I16),
        field("loaded_ammo_cutoff", I16),
        field("heat_cutoff", I16),
        field("age_cutoff", I16),
        field("pad1", Pad(32)),
        field("anchor", Enum16(HUD_ANCHORS)),
        field("pad2", Pad(2)),
        field("pad3", Pad(32)),
        field(
            "static_elements",
            reflexive(&WEAPON_HUD_INTERFACE_STATIC_ELEMENT, 16),
        ),
        field("meter_elements", reflexive(&WEAPON_HUD_INTERFACE_METER, 16)),
        field("crosshairs", reflexive(&WEAPON_HUD_INTERFACE_CROSSHAIR, 19)),
        field(
            "overlay_elements",
            reflexive(&WEAPON_HUD_INTERFACE_OVERLAY_ELEMENT, 16),
        ),
        field("crosshair_types", Flags32(CROSSHAIR_TYPES)),
        field("pad4", Pad(12)),
    ],
};

// scenery

pub static OBJECT_ATTACHMENT: StructDef = StructDef {
    name: "object_attachment",
    fields: &[
        field(
            "type",
            Dependency(&[TagClass::LensFlare, TagClass::Sound, TagClass::DamageEffect]),
        ),
        field("marker", String32),
        field("primary_scale", Enum16(&["none", "a_out", "b_out", "c_out", "d_out"])),
        field("secondary_scale", Enum16(&["none", "a_out", "b_out", "c_out", "d_out"])),
        field("change_color", Enum16(&["none", "a", "b", "c", "d"])),
        field("pad0", Pad(2)),
        field("pad1", Pad(16)),
    ],
};

pub static SCENERY: StructDef = StructDef {
    name: "scenery",
    fields: &[
        field("object_type", I16),
        field(
            "flags",
            Flags16(&[
                "does_not_cast_shadow",
                "transparent_self_occlusion",
                "brighter_than_it_should_be",
                "not_a_pathfinding_obstacle",
            ]),
        ),
        field("bounding_radius", F32),
        field("bounding_offset_x", F32),
        field("bounding_offset_y", F32),
        field("bounding_offset_z", F32),
        field("acceleration_scale", F32),
        field("pad0", Pad(4)),
        field("attachments", reflexive(&OBJECT_ATTACHMENT, 8)),
        field("creation_effect", Dependency(&[TagClass::DamageEffect])),
        field("pad1", Pad(20)),
    ],
};

// scenario

pub static SCENARIO_CHILD_SCENARIO: StructDef = StructDef {
    name: "scenario_child_scenario",
    fields: &[
        field("child_scenario", Dependency(&[TagClass::Scenario])),
        field("pad0", Pad(16)),
    ],
};

pub static SCENARIO_SCENERY_PALETTE: StructDef = StructDef {
    name: "scenario_scenery_palette",
    fields: &[
        field("name", Dependency(&[TagClass::Scenery])),
        field("pad0", Pad(32)),
    ],
};

pub static SCENARIO_SCENERY: StructDef = StructDef {
    name: "scenario_scenery",
    fields: &[
        field("type", I16),
        field("name", I16),
        field("not_placed", Flags16(&["automatically", "on_easy", "on_normal", "on_hard"])),
        field("desired_permutation", I16),
        field("position_x", F32),
        field("position_y", F32),
        field("position_z", F32),
        field("rotation_yaw", Angle),
        field("rotation_pitch", Angle),
        field("rotation_roll", Angle),
        field("pad0", Pad(8)),
    ],
};

pub static SCENARIO: StructDef = StructDef {
    name: "scenario",
    fields: &[
        field("type", Enum16(MAP_TYPES)),
        field(
            "flags",
            Flags16(&["cortana_hack", "use_demo_ui"]),
        ),
        field("local_north", Angle),
        field("pad0", Pad(20)),
        field("child_scenarios", reflexive(&SCENARIO_CHILD_SCENARIO, 16)),
        field("scenery_palette", reflexive(&SCENARIO_SCENERY_PALETTE, 100)),
        field("scenery", reflexive(&SCENARIO_SCENERY, 2000)),
        field("custom_object_names", Dependency(&[TagClass::UnicodeStringList])),
        field("ingame_help_text", Dependency(&[TagClass::UnicodeStringList])),
        field("hud_messages", Dependency(&[TagClass::HudMessageText])),
        field("script_strings", Dependency(&[TagClass::StringList])),
        field("weapon_hud_interface", Dependency(&[TagClass::WeaponHudInterface])),
        field("default_font", Dependency(&[TagClass::Font])),
        field("pad1", Pad(36)),
    ],
};

// font

pub static FONT_CHARACTER: StructDef = StructDef {
    name: "font_character",
    fields: &[
        field("character", U16),
        field("character_width", I16),
        field("bitmap_width", I16),
        field("bitmap_height", I16),
        field("bitmap_origin_x", I16),
        field("bitmap_origin_y", I16),
        field("hardware_character_index", I16),
        field("pad0", Pad(2)),
        field("pixels_offset", I32),
    ],
};

pub static FONT: StructDef = StructDef {
    name: "font",
    fields: &[
        field("flags", Flags32(&["disable_mcc_font_override"])),
        field("ascending_height", I16),
        field("descending_height", I16),
        field("leading_height", I16),
        field("leading_width", I16),
        field("pad0", Pad(36)),
        field("bold", Dependency(&[TagClass::Font])),
        field("italic", Dependency(&[TagClass::Font])),
        field("condense", Dependency(&[TagClass::Font])),
        field("underline", Dependency(&[TagClass::Font])),
        field("characters", reflexive(&FONT_CHARACTER, 20000)),
        field("pixels", Data),
    ],
};

// string lists

pub static STRING_LIST_STRING: StructDef = StructDef {
    name: "string_list_string",
    fields: &[field("string", Data)],
};

pub static STRING_LIST: StructDef = StructDef {
    name: "string_list",
    fields: &[field("strings", reflexive(&STRING_LIST_STRING, 32767))],
};

pub static UNICODE_STRING_LIST_STRING: StructDef = StructDef {
    name: "unicode_string_list_string",
    fields: &[field("string", Data)],
};

pub static UNICODE_STRING_LIST: StructDef = StructDef {
    name: "unicode_string_list",
    fields: &[field("strings", reflexive(&UNICODE_STRING_LIST_STRING, 32767))],
};

// hud_message_text

pub static HUD_MESSAGE_TEXT_ELEMENT: StructDef = StructDef {
    name: "hud_message_text_element",
    fields: &[field("type", I8), field("data", I8)],
};

pub static HUD_MESSAGE_TEXT_MESSAGE: StructDef = StructDef {
    name: "hud_message_text_message",
    fields: &[
        field("name", String32),
        field("start_index_into_text_blob", I16),
        field("start_index_of_message_block", I16),
        field("panel_count", I8),
        field("pad0", Pad(3)),
        field("pad1", Pad(24)),
    ],
};

pub static HUD_MESSAGE_TEXT: StructDef = StructDef {
    name: "hud_message_text",
    fields: &[
        field("text_data", Data),
        field("message_elements", reflexive(&HUD_MESSAGE_TEXT_ELEMENT, 8192)),
        field("messages", reflexive(&HUD_MESSAGE_TEXT_MESSAGE, 1024)),
        field("pad0", Pad(84)),
    ],
};

/// Root struct of a tag of `class`.
pub fn root_definition(class: TagClass) -> &'static StructDef {
    match class {
        TagClass::Bitmap => &BITMAP,
        TagClass::DamageEffect => &DAMAGE_EFFECT,
        TagClass::Font => &FONT,
        TagClass::HudMessageText => &HUD_MESSAGE_TEXT,
        TagClass::LensFlare => &LENS_FLARE,
        TagClass::Scenario => &SCENARIO,
        TagClass::Scenery => &SCENERY,
        TagClass::Sound => &SOUND,
        TagClass::StringList => &STRING_LIST,
        TagClass::UnicodeStringList => &UNICODE_STRING_LIST,
        TagClass::WeaponHudInterface => &WEAPON_HUD_INTERFACE,
    }
}
