use super::{CompileHook, PreCompile};
use crate::error::CompileError;

pub struct DamageEffectHook;

impl CompileHook for DamageEffectHook {
    fn pre_compile(&self, ctx: &mut PreCompile<'_>) -> Result<(), CompileError> {
        ctx.add_dependency_adjust_size("sound")
    }
}

#[cfg(test)]
mod tests {
    use crate::budget::resolve_budgets;
    use crate::fixtures::{self, reference};
    use crate::structs::STRUCT_ALIGNMENT;
    use crate::workload::TagIndex;
    use tag_format::definitions::{DAMAGE_EFFECT, SOUND};
    use tag_format::{align_up, Dialect, Record, TagClass};

    #[test]
    fn sound_counts_toward_the_effect_budget() {
        let sound = reference(TagClass::Sound, "sound\\hit");
        let mut effect = Record::new(&DAMAGE_EFFECT);
        effect
            .set_dependency("sound", Some(sound.clone()))
            .expect("sound");
        let mut workload = fixtures::compile_tags(
            Dialect::Retail,
            vec![
                (reference(TagClass::DamageEffect, "effects\\hit"), effect),
                (sound, Record::new(&SOUND)),
            ],
        );
        assert_eq!(workload.edges.len(), 1);
        assert!(workload.edges[0].adjust_size);
        assert_eq!(workload.edges[0].target, TagIndex(1));

        resolve_budgets(&mut workload).expect("budgets");
        let own = align_up(DAMAGE_EFFECT.size(), STRUCT_ALIGNMENT) as u64;
        assert!(workload.budgets[1] > 0);
        assert_eq!(workload.budgets[0], own + workload.budgets[1]);
    }
}
