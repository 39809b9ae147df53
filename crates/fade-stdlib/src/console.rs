//! `PRINT` and the output buffer it writes to.

use fade_types::TypeCode;
use fade_vm::{HostMethod, HostMethodTable, HostValue, VmResult};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Lines printed by a running program.
///
/// Cloning shares the buffer: the host keeps one handle and the `print`
/// command holds another.
#[derive(Debug, Clone, Default)]
pub struct Console {
    lines: Rc<RefCell<Vec<String>>>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line printed so far, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    /// Drains the buffer.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.borrow_mut())
    }

    fn push(&self, line: String) {
        debug!(target: "fade_stdlib::print", "{line}");
        self.lines.borrow_mut().push(line);
    }
}

pub(crate) fn register(table: &mut HostMethodTable, console: &Console) -> VmResult<()> {
    let out = console.clone();
    table.register(
        HostMethod::new("print", move |args| {
            let line = args.first().map(ToString::to_string).unwrap_or_default();
            out.push(line);
            Ok(HostValue::Void)
        })
        .param(TypeCode::Any),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_buffer() {
        let console = Console::new();
        let handle = console.clone();
        handle.push("one".into());
        handle.push("two".into());
        assert_eq!(console.lines(), vec!["one", "two"]);
        assert_eq!(console.take(), vec!["one", "two"]);
        assert!(handle.lines().is_empty());
    }
}
