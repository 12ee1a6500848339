use super::{CompileHook, PreCompile};
use crate::error::CompileError;

pub struct SoundHook;

impl CompileHook for SoundHook {
    fn pre_compile(&self, ctx: &mut PreCompile<'_>) -> Result<(), CompileError> {
        if ctx.record().reflexive("pitch_ranges")?.is_empty() {
            ctx.warn("sound has no pitch ranges and will not play");
        }
        Ok(())
    }
}

pub struct PitchRangeHook;

impl CompileHook for PitchRangeHook {
    fn pre_compile(&self, ctx: &mut PreCompile<'_>) -> Result<(), CompileError> {
        ctx.default_f32("natural_pitch", 1.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::Severity;
    use crate::fixtures::{self, reference};
    use crate::structs::StructIndex;
    use tag_format::definitions::{SOUND, SOUND_PITCH_RANGE};
    use tag_format::record::Fields;
    use tag_format::{Dialect, Record, TagClass};

    #[test]
    fn sounds_without_pitch_ranges_warn() {
        let workload = fixtures::compile_tags(
            Dialect::Retail,
            vec![(reference(TagClass::Sound, "sound\\mute"), Record::new(&SOUND))],
        );
        assert_eq!(
            fixtures::reported(&workload, Severity::Warning),
            [": sound has no pitch ranges and will not play"]
        );
        assert_eq!(workload.diagnostics.errors(), 0);
    }

    #[test]
    fn natural_pitch_defaults_to_one() {
        let mut sound = Record::new(&SOUND);
        sound.push_element("pitch_ranges").expect("pitch range");
        sound
            .push_element("pitch_ranges")
            .expect("pitch range")
            .set_f32("natural_pitch", 0.5)
            .expect("pitch");
        let workload = fixtures::compile_tags(
            Dialect::Retail,
            vec![(reference(TagClass::Sound, "sound\\hum"), sound)],
        );
        assert_eq!(workload.diagnostics.warnings(), 0);

        let ranges = workload.structs.get(StructIndex(1)).expect("pitch ranges");
        let size = SOUND_PITCH_RANGE.size();
        let pitch = |index: usize| {
            Fields::new(&SOUND_PITCH_RANGE, &ranges.data[index * size..])
                .f32("natural_pitch")
                .expect("pitch")
        };
        assert_eq!(pitch(0), 1.0);
        assert_eq!(pitch(1), 0.5);
    }
}
