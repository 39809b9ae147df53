//! # fade-stdlib
//!
//! The standard Fade command set, implemented as host methods.
//!
//! [`register_standard_commands`] adds every command to a
//! [`HostMethodTable`]; the compiler resolves a command name to its
//! address with [`HostMethodTable::find`]. `PRINT` writes to a shared
//! [`Console`] the embedding host reads back.

mod args;
mod console;
mod math;
mod strings;

pub use console::Console;

use fade_vm::{HostMethodTable, VmResult};

/// Registers every standard command. Names are unique and matched
/// case-insensitively by [`HostMethodTable::find`].
pub fn register_standard_commands(
    table: &mut HostMethodTable,
    console: &Console,
) -> VmResult<()> {
    console::register(table, console)?;
    strings::register(table)?;
    math::register(table)
}

/// A method table holding only the standard commands.
pub fn standard_table(console: &Console) -> VmResult<HostMethodTable> {
    let mut table = HostMethodTable::new();
    register_standard_commands(&mut table, console)?;
    Ok(table)
}
