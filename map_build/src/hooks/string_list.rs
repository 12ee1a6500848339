use super::{CompileHook, PreCompile};
use crate::error::CompileError;

/// Each string must end in a NUL character of the list's width.
pub struct StringHook {
    pub wide: bool,
}

impl CompileHook for StringHook {
    fn pre_compile(&self, ctx: &mut PreCompile<'_>) -> Result<(), CompileError> {
        let data = ctx.record().data("string")?;
        let terminated = if self.wide {
            data.len() >= 2 && data.len() % 2 == 0 && data[data.len() - 2..] == [0, 0]
        } else {
            data.last() == Some(&0)
        };
        if !terminated {
            let index = ctx.element_index();
            ctx.error(format!("String #{} is not null-terminated", index));
        }
        Ok(())
    }
}
