//! Runtime and bytecode-building error types.

use crate::type_code::TypeCode;
use thiserror::Error;

/// A fatal VM condition. Any of these aborts the current `execute` call;
/// the VM performs no retry or rollback.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    /// The byte at `ip` is not an opcode.
    #[error("unknown opcode 0x{byte:02X} at {ip}")]
    UnknownOpCode { byte: u8, ip: usize },

    /// An instruction's inline operands run past the end of the program.
    #[error("truncated instruction at {ip}")]
    TruncatedInstruction { ip: usize },

    /// A tag byte (inline or on the stack) is not a known type code.
    #[error("invalid type code {0}")]
    InvalidTypeCode(u8),

    /// Popped more bytes than the operand stack holds.
    #[error("stack underflow: needed {needed} bytes, {available} available")]
    StackUnderflow { needed: usize, available: usize },

    /// No conversion exists between the two tags.
    #[error("cannot cast {from} to {to}")]
    UnsupportedCast { from: TypeCode, to: TypeCode },

    /// An operator was applied to a tag combination it does not support.
    #[error("operator {op} not supported for {lhs} and {rhs}")]
    UnsupportedOperation {
        op: &'static str,
        lhs: TypeCode,
        rhs: TypeCode,
    },

    /// An operand had the wrong tag for the instruction consuming it.
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: TypeCode, actual: TypeCode },

    /// Integer division or modulo by zero.
    #[error("division by zero")]
    DivideByZero,

    /// A host call argument did not match the declared parameter type.
    #[error("host method '{method}' argument {index}: expected {expected}, found {actual}")]
    HostArgumentMismatch {
        method: String,
        index: usize,
        expected: TypeCode,
        actual: TypeCode,
    },

    /// `CALL_HOST` named an address with no registered method.
    #[error("no host method at address {0}")]
    UnknownHostMethod(i32),

    /// The native implementation of a host method reported a failure.
    #[error("host method '{method}' failed: {message}")]
    HostFailure { method: String, message: String },

    /// The pointer has no entry in the heap's allocation table.
    #[error("untracked heap pointer {0}")]
    UntrackedPointer(i64),

    /// A heap access fell outside the backing buffer.
    #[error("heap access out of bounds: {len} bytes at {ptr}")]
    HeapOutOfBounds { ptr: i64, len: usize },

    /// `ALLOC`, `READ` or `WRITE` received a negative byte count.
    #[error("negative length {0}")]
    NegativeLength(i32),

    /// A heap string contained a slot that is not a Unicode scalar value.
    #[error("invalid string at heap pointer {0}")]
    InvalidString(i64),

    /// A jump target lies outside the program.
    #[error("jump target {0} out of range")]
    InvalidJumpTarget(i32),

    /// Too many nested `JUMP_HISTORY` frames.
    #[error("call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),

    /// `RETURN` without a matching `JUMP_HISTORY`.
    #[error("return without a recorded call site")]
    ReturnWithoutCall,

    /// More host methods than `int` addresses can name.
    #[error("host method table is full ({0} methods)")]
    HostTableFull(usize),
}

/// Result alias for VM operations.
pub type VmResult<T> = Result<T, VmError>;

/// Errors raised while assembling a program with the bytecode builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A jump refers to a label that was never placed.
    #[error("label {0} was never placed")]
    UnplacedLabel(usize),

    /// A jump target does not fit in an `int` literal.
    #[error("jump target {0} does not fit in an int")]
    TargetOutOfRange(usize),

    /// A span is longer than its `u32` length prefix can express.
    #[error("span of {0} bytes is too long")]
    SpanTooLong(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_values() {
        let err = VmError::UnknownOpCode { byte: 0xAB, ip: 12 };
        assert_eq!(err.to_string(), "unknown opcode 0xAB at 12");

        let err = VmError::UnsupportedCast {
            from: TypeCode::Struct,
            to: TypeCode::Real,
        };
        assert_eq!(err.to_string(), "cannot cast struct to real");

        let err = VmError::HostArgumentMismatch {
            method: "len".into(),
            index: 0,
            expected: TypeCode::String,
            actual: TypeCode::Real,
        };
        assert_eq!(
            err.to_string(),
            "host method 'len' argument 0: expected string, found real"
        );
    }
}
