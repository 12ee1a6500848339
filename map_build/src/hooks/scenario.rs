use super::{CompileHook, PreCompile};
use crate::error::CompileError;

/// Placements must name an entry of the scenery palette, or -1 for none.
pub struct ScenarioHook;

impl CompileHook for ScenarioHook {
    fn pre_compile(&self, ctx: &mut PreCompile<'_>) -> Result<(), CompileError> {
        let record = ctx.record();
        let palette = record.reflexive("scenery_palette")?.len();
        let mut problems = Vec::new();
        for (index, placement) in record.reflexive("scenery")?.iter().enumerate() {
            let kind = placement.get_i16("type")?;
            if kind < -1 || (kind >= 0 && kind as usize >= palette) {
                problems.push(format!(
                    "Scenery #{} uses palette entry #{} but the palette has {} entries",
                    index, kind, palette
                ));
            }
        }
        for problem in problems {
            ctx.error(problem);
        }
        Ok(())
    }
}
