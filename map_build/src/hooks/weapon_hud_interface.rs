//! Weapon HUD interfaces: crosshair type flags and sequence index checks.

use tag_format::Dialect;

use super::{CompileHook, PostCompile, PreCompile, StructView};
use crate::error::CompileError;

const NULL_SEQUENCE: u16 = 0xFFFF;

const CROSSHAIR_TYPE_ZOOM: u32 = 1 << 1;
const OVERLAY_NOT_A_SPRITE: u32 = 1 << 1;
const OVERLAY_SHOW_ONLY_WHEN_ZOOMED: u32 = 1 << 2;
const OVERLAY_DONT_SHOW_WHEN_ZOOMED: u32 = 1 << 6;

pub struct WeaponHudInterfaceHook;

impl CompileHook for WeaponHudInterfaceHook {
    fn pre_compile(&self, ctx: &mut PreCompile<'_>) -> Result<(), CompileError> {
        let mut types = 0u32;
        let mut zoom_overlays = 0usize;
        for crosshair in ctx.record().reflexive("crosshairs")? {
            let kind = u32::from(crosshair.get_u16("crosshair_type")?);
            if kind < 32 {
                types |= 1 << kind;
            }
            for overlay in crosshair.reflexive("crosshair_overlays")? {
                let flags = overlay.get_u32("flags")?;
                if flags & (OVERLAY_SHOW_ONLY_WHEN_ZOOMED | OVERLAY_DONT_SHOW_WHEN_ZOOMED) != 0 {
                    zoom_overlays += 1;
                }
            }
        }
        ctx.record_mut().set_u32("crosshair_types", types)?;

        if ctx.dialect() != Dialect::DarkCirclet
            && types & CROSSHAIR_TYPE_ZOOM == 0
            && zoom_overlays > 0
        {
            let verb = if zoom_overlays == 1 { " is" } else { "s are" };
            ctx.warn(format!(
                "{} overlay{} set to change on zoom, but no zoom crosshairs exist",
                zoom_overlays, verb
            ));
        }
        Ok(())
    }
}

struct Sequence {
    bitmap_count: i16,
    sprite_count: u32,
}

/// Sequences of the bitmap named by `field`, with the path used in messages.
fn bitmap_sequences(
    ctx: &PostCompile<'_>,
    view: StructView,
    field: &str,
) -> Result<(String, Vec<Sequence>), CompileError> {
    let Some(bitmap) = ctx.dependency(view, field)? else {
        return Ok(("NULL".to_string(), Vec::new()));
    };
    let name = ctx.tag_name(bitmap);
    let Some(root) = ctx.root(bitmap) else {
        return Ok((name, Vec::new()));
    };
    let mut sequences = Vec::new();
    for sequence in ctx.reflexive(root, "bitmap_group_sequence")? {
        let fields = ctx.fields(sequence)?;
        sequences.push(Sequence {
            bitmap_count: fields.i16("bitmap_count")?,
            sprite_count: fields.reflexive_count("sprites")?,
        });
    }
    Ok((name, sequences))
}

fn sequence_index(ctx: &PostCompile<'_>, view: StructView) -> Result<Option<usize>, CompileError> {
    let index = ctx.fields(view)?.u16("sequence_index")?;
    Ok((index != NULL_SEQUENCE).then_some(usize::from(index)))
}

pub struct CrosshairHook;

impl CompileHook for CrosshairHook {
    fn post_compile(&self, ctx: &mut PostCompile<'_>) -> Result<(), CompileError> {
        let crosshair = ctx.element();
        let (bitmap, sequences) = bitmap_sequences(ctx, crosshair, "crosshair_bitmap")?;
        let mut problems = Vec::new();
        for (overlay_index, overlay) in ctx
            .reflexive(crosshair, "crosshair_overlays")?
            .into_iter()
            .enumerate()
        {
            let Some(index) = sequence_index(ctx, overlay)? else {
                continue;
            };
            let element = format!(
                "overlay #{} of crosshair #{}",
                overlay_index,
                ctx.element_index()
            );
            let Some(sequence) = sequences.get(index) else {
                problems.push(out_of_bounds(index, &bitmap, &element, sequences.len()));
                continue;
            };
            let flags = ctx.fields(overlay)?.u32("flags")?;
            if flags & OVERLAY_NOT_A_SPRITE != 0 {
                if sequence.bitmap_count == 0 {
                    problems.push(empty(index, &bitmap, &element, "bitmaps"));
                }
            } else if sequence.sprite_count == 0 {
                problems.push(empty(index, &bitmap, &element, "sprites"));
            }
        }
        for problem in problems {
            ctx.error(problem);
        }
        Ok(())
    }
}

pub struct MeterHook;

impl CompileHook for MeterHook {
    fn post_compile(&self, ctx: &mut PostCompile<'_>) -> Result<(), CompileError> {
        let meter = ctx.element();
        let Some(index) = sequence_index(ctx, meter)? else {
            return Ok(());
        };
        let (bitmap, sequences) = bitmap_sequences(ctx, meter, "meter_bitmap")?;
        let element = format!("meter #{}", ctx.element_index());
        match sequences.get(index) {
            None => ctx.error(out_of_bounds(index, &bitmap, &element, sequences.len())),
            Some(sequence) if sequence.sprite_count == 0 => {
                ctx.error(empty(index, &bitmap, &element, "sprites"))
            }
            Some(_) => {}
        }
        Ok(())
    }
}

pub struct StaticElementHook;

impl CompileHook for StaticElementHook {
    fn post_compile(&self, ctx: &mut PostCompile<'_>) -> Result<(), CompileError> {
        let view = ctx.element();
        let Some(index) = sequence_index(ctx, view)? else {
            return Ok(());
        };
        let (bitmap, sequences) = bitmap_sequences(ctx, view, "interface_bitmap")?;
        let element = format!("static element #{}", ctx.element_index());
        match sequences.get(index) {
            None => ctx.error(out_of_bounds(index, &bitmap, &element, sequences.len())),
            Some(sequence) if sequence.bitmap_count == 0 && sequence.sprite_count == 0 => {
                ctx.error(empty(index, &bitmap, &element, "sprites/bitmaps"))
            }
            Some(_) => {}
        }
        Ok(())
    }
}

pub struct OverlayElementHook;

impl CompileHook for OverlayElementHook {
    fn post_compile(&self, ctx: &mut PostCompile<'_>) -> Result<(), CompileError> {
        let view = ctx.element();
        let (bitmap, sequences) = bitmap_sequences(ctx, view, "overlay_bitmap")?;
        let mut problems = Vec::new();
        for (overlay_index, overlay) in ctx.reflexive(view, "overlays")?.into_iter().enumerate() {
            let Some(index) = sequence_index(ctx, overlay)? else {
                continue;
            };
            let element = format!(
                "overlay #{} of element #{}",
                overlay_index,
                ctx.element_index()
            );
            match sequences.get(index) {
                None => problems.push(out_of_bounds(index, &bitmap, &element, sequences.len())),
                Some(sequence) if sequence.bitmap_count == 0 => {
                    problems.push(empty(index, &bitmap, &element, "bitmaps"))
                }
                Some(_) => {}
            }
        }
        for problem in problems {
            ctx.error(problem);
        }
        Ok(())
    }
}

fn out_of_bounds(index: usize, bitmap: &str, element: &str, count: usize) -> String {
    format!(
        "Sequence #{} in {} referenced in {} is out of bounds (>= {})",
        index, bitmap, element, count
    )
}

fn empty(index: usize, bitmap: &str, element: &str, what: &str) -> String {
    format!(
        "Sequence #{} in {} referenced in {} has 0 {}",
        index, bitmap, element, what
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::fixtures::{self, reference};
    use crate::workload::BuildWorkload;
    use tag_format::definitions::WEAPON_HUD_INTERFACE;
    use tag_format::{Record, TagClass, TagReference};

    fn sheet() -> TagReference {
        reference(TagClass::Bitmap, "ui\\hud\\sheet")
    }

    /// Sequence 0 holds one bitmap and one sprite, sequence 1 holds neither.
    fn sheet_record() -> Record {
        let mut bitmap = fixtures::bitmap_with_sequences(&[1, 0]);
        bitmap.reflexive_mut("bitmap_group_sequence").expect("sequences")[1]
            .set_i16("bitmap_count", 0)
            .expect("count");
        bitmap
    }

    fn compile(dialect: Dialect, hud: Record) -> BuildWorkload {
        fixtures::compile_tags(
            dialect,
            vec![
                (reference(TagClass::WeaponHudInterface, "ui\\hud\\rifle"), hud),
                (sheet(), sheet_record()),
            ],
        )
    }

    fn crosshair(hud: &mut Record, kind: u16) -> &mut Record {
        let crosshair = hud.push_element("crosshairs").expect("crosshair");
        crosshair.set_u16("crosshair_type", kind).expect("type");
        crosshair
    }

    fn overlay(parent: &mut Record, field: &str, sequence: i16, flags: u32) {
        let overlay = parent.push_element(field).expect("overlay");
        overlay.set_i16("sequence_index", sequence).expect("sequence");
        overlay.set_u32("flags", flags).expect("flags");
    }

    #[test]
    fn crosshair_types_follow_the_crosshairs() {
        let mut hud = Record::new(&WEAPON_HUD_INTERFACE);
        crosshair(&mut hud, 0);
        crosshair(&mut hud, 2);
        crosshair(&mut hud, 2);
        let workload = compile(Dialect::Retail, hud);
        let fields = fixtures::root_fields(&workload, 0);
        assert_eq!(fields.u32("crosshair_types").expect("types"), 0b101);
        assert!(workload.diagnostics.as_slice().is_empty());
    }

    fn zoom_hud(with_zoom_crosshair: bool) -> Record {
        let mut hud = Record::new(&WEAPON_HUD_INTERFACE);
        let aim = crosshair(&mut hud, 0);
        overlay(aim, "crosshair_overlays", -1, OVERLAY_SHOW_ONLY_WHEN_ZOOMED);
        overlay(aim, "crosshair_overlays", -1, OVERLAY_DONT_SHOW_WHEN_ZOOMED);
        overlay(aim, "crosshair_overlays", -1, 0);
        if with_zoom_crosshair {
            crosshair(&mut hud, 1);
        }
        hud
    }

    #[test]
    fn zoom_overlays_without_a_zoom_crosshair_warn() {
        let workload = compile(Dialect::Retail, zoom_hud(false));
        assert_eq!(
            fixtures::reported(&workload, Severity::Warning),
            [": 2 overlays are set to change on zoom, but no zoom crosshairs exist"]
        );
        assert_eq!(workload.diagnostics.errors(), 0);

        let workload = compile(Dialect::Retail, zoom_hud(true));
        assert_eq!(workload.diagnostics.warnings(), 0);
        let fields = fixtures::root_fields(&workload, 0);
        assert_eq!(fields.u32("crosshair_types").expect("types"), 0b11);
    }

    #[test]
    fn dark_circlet_skips_the_zoom_warning() {
        let workload = compile(Dialect::DarkCirclet, zoom_hud(false));
        assert_eq!(workload.diagnostics.warnings(), 0);
    }

    #[test]
    fn crosshair_overlays_need_bitmaps_or_sprites() {
        let mut hud = Record::new(&WEAPON_HUD_INTERFACE);
        let aim = crosshair(&mut hud, 0);
        aim.set_dependency("crosshair_bitmap", Some(sheet()))
            .expect("bitmap");
        overlay(aim, "crosshair_overlays", 1, OVERLAY_NOT_A_SPRITE);
        overlay(aim, "crosshair_overlays", 1, 0);
        overlay(aim, "crosshair_overlays", 0, 0);
        overlay(aim, "crosshair_overlays", 2, 0);
        let workload = compile(Dialect::Retail, hud);
        assert_eq!(
            fixtures::reported(&workload, Severity::Error),
            [
                "crosshairs[0]: Sequence #1 in ui\\hud\\sheet.bitmap referenced in overlay #0 of crosshair #0 has 0 bitmaps",
                "crosshairs[0]: Sequence #1 in ui\\hud\\sheet.bitmap referenced in overlay #1 of crosshair #0 has 0 sprites",
                "crosshairs[0]: Sequence #2 in ui\\hud\\sheet.bitmap referenced in overlay #3 of crosshair #0 is out of bounds (>= 2)",
            ]
        );
    }

    #[test]
    fn meters_check_their_sequence() {
        let mut hud = Record::new(&WEAPON_HUD_INTERFACE);
        for sequence in [1, 5, 0] {
            let meter = hud.push_element("meter_elements").expect("meter");
            meter
                .set_dependency("meter_bitmap", Some(sheet()))
                .expect("bitmap");
            meter.set_i16("sequence_index", sequence).expect("sequence");
        }
        let unset = hud.push_element("meter_elements").expect("meter");
        unset.set_i16("sequence_index", -1).expect("sequence");
        hud.push_element("meter_elements").expect("meter");

        let workload = compile(Dialect::Retail, hud);
        assert_eq!(
            fixtures::reported(&workload, Severity::Error),
            [
                "meter_elements[0]: Sequence #1 in ui\\hud\\sheet.bitmap referenced in meter #0 has 0 sprites",
                "meter_elements[1]: Sequence #5 in ui\\hud\\sheet.bitmap referenced in meter #1 is out of bounds (>= 2)",
                "meter_elements[4]: Sequence #0 in NULL referenced in meter #4 is out of bounds (>= 0)",
            ]
        );
    }

    #[test]
    fn static_elements_need_bitmaps_or_sprites() {
        let mut hud = Record::new(&WEAPON_HUD_INTERFACE);
        for sequence in [1, 0] {
            let element = hud.push_element("static_elements").expect("element");
            element
                .set_dependency("interface_bitmap", Some(sheet()))
                .expect("bitmap");
            element.set_i16("sequence_index", sequence).expect("sequence");
        }
        let workload = compile(Dialect::Retail, hud);
        assert_eq!(
            fixtures::reported(&workload, Severity::Error),
            ["static_elements[0]: Sequence #1 in ui\\hud\\sheet.bitmap referenced in static element #0 has 0 sprites/bitmaps"]
        );
    }

    #[test]
    fn overlay_elements_check_every_overlay() {
        let mut hud = Record::new(&WEAPON_HUD_INTERFACE);
        let element = hud.push_element("overlay_elements").expect("element");
        element
            .set_dependency("overlay_bitmap", Some(sheet()))
            .expect("bitmap");
        overlay(element, "overlays", 1, 0);
        overlay(element, "overlays", 0, 0);
        overlay(element, "overlays", 3, 0);
        let workload = compile(Dialect::Retail, hud);
        assert_eq!(
            fixtures::reported(&workload, Severity::Error),
            [
                "overlay_elements[0]: Sequence #1 in ui\\hud\\sheet.bitmap referenced in overlay #0 of element #0 has 0 bitmaps",
                "overlay_elements[0]: Sequence #3 in ui\\hud\\sheet.bitmap referenced in overlay #2 of element #0 is out of bounds (>= 2)",
            ]
        );
    }
}
