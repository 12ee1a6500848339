use super::{CompileHook, PreCompile};
use crate::error::CompileError;

pub struct LensFlareHook;

impl CompileHook for LensFlareHook {
    fn pre_compile(&self, ctx: &mut PreCompile<'_>) -> Result<(), CompileError> {
        ctx.add_dependency_adjust_size("bitmap")?;
        ctx.default_f32("vertical_scale", 1.0)?;
        ctx.default_f32("horizontal_scale", 1.0)?;
        ctx.default_f32("rotation_function_scale", 360.0)?;

        let record = ctx.record_mut();
        let falloff = record.get_f32("falloff_angle")?;
        let cutoff = record.get_f32("cutoff_angle")?;
        record.set_f32("cos_falloff_angle", falloff.cos())?;
        record.set_f32("cos_cutoff_angle", cutoff.cos())?;
        Ok(())
    }
}

pub struct ReflectionHook;

impl CompileHook for ReflectionHook {
    fn pre_compile(&self, ctx: &mut PreCompile<'_>) -> Result<(), CompileError> {
        ctx.default_f32("animation_period", 1.0)
    }
}
