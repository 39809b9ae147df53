//! Shared bytecode contract for Fade.
//!
//! This crate is the agreement between the compiler that produces bytecode
//! and the VM that runs it: the primitive [`TypeCode`] table with its
//! payload widths and promotion order, the [`OpCode`] byte values, the
//! little-endian literal [`codec`], a [`BytecodeBuilder`] encoder, and
//! the [`VmError`] taxonomy.

pub mod builder;
pub mod codec;
mod error;
pub mod opcode;
mod type_code;

pub use builder::{BytecodeBuilder, Label};
pub use codec::{Primitive, CHAR_WIDTH};
pub use error::{BuildError, VmError, VmResult};
pub use opcode::OpCode;
pub use type_code::{TypeCode, MAX_PAYLOAD};
