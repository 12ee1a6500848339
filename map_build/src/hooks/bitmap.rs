use super::{CompileHook, PreCompile};
use crate::error::CompileError;

pub struct BitmapHook;

impl CompileHook for BitmapHook {
    fn pre_compile(&self, ctx: &mut PreCompile<'_>) -> Result<(), CompileError> {
        let record = ctx.record();
        let bitmap_count = record.reflexive("bitmap_data")?.len();
        let mut problems = Vec::new();
        for (index, sequence) in record.reflexive("bitmap_group_sequence")?.iter().enumerate() {
            let first = sequence.get_i16("first_bitmap_index")?;
            let count = sequence.get_i16("bitmap_count")?;
            if count <= 0 {
                continue;
            }
            let end = i32::from(first) + i32::from(count);
            if first < 0 || end as usize > bitmap_count {
                problems.push(format!(
                    "Sequence #{} covers bitmaps {}..{} but only {} bitmap(s) exist",
                    index, first, end, bitmap_count
                ));
            }
        }
        for problem in problems {
            ctx.error(problem);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::Severity;
    use crate::fixtures::{self, reference};
    use tag_format::{Dialect, TagClass};

    #[test]
    fn sequences_must_stay_inside_the_bitmap_data() {
        let mut bitmap = fixtures::bitmap_with_sequences(&[1, 1, 1]);
        let sequences = bitmap
            .reflexive_mut("bitmap_group_sequence")
            .expect("sequences");
        sequences[0].set_i16("bitmap_count", 2).expect("count");
        sequences[1].set_i16("first_bitmap_index", -1).expect("first");
        sequences[2].set_i16("bitmap_count", 0).expect("count");
        let workload = fixtures::compile_tags(
            Dialect::CustomEdition,
            vec![(reference(TagClass::Bitmap, "ui\\bad"), bitmap)],
        );
        assert_eq!(
            fixtures::reported(&workload, Severity::Error),
            [
                ": Sequence #0 covers bitmaps 0..2 but only 1 bitmap(s) exist",
                ": Sequence #1 covers bitmaps -1..0 but only 1 bitmap(s) exist",
            ]
        );
        assert_eq!(workload.diagnostics.as_slice()[0].tag, "ui\\bad.bitmap");
    }
}
