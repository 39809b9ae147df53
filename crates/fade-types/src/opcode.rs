//! Opcode byte values.
//!
//! Each instruction is a one-byte opcode optionally followed by inline
//! operands:
//!
//! | Operand kind | Encoding                                       |
//! |--------------|------------------------------------------------|
//! | register     | 1 byte (address 0–255)                         |
//! | tag          | 1 byte ([`TypeCode`](crate::TypeCode))         |
//! | literal      | tag byte, then `width(tag)` little-endian bytes |
//! | span         | `u32` little-endian length, then that many bytes |
//!
//! Jump targets and host method addresses are not inline; they are `int`
//! values popped from the operand stack.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Noop = 0x00,
    /// `PUSH <tag> <payload>`
    Push = 0x01,
    /// `PUSH_SPAN <u32 len> <bytes>`: untagged bytes.
    PushSpan = 0x02,
    /// `PUSH_TYPE <tag>`: a bare tag byte, closing raw bytes into a cell.
    PushType = 0x03,
    /// `PUSH_REG_PTR <reg>`
    PushRegPtr = 0x04,
    Dupe = 0x05,
    Discard = 0x06,
    /// Pops only the trailing tag byte, leaving the payload as raw bytes.
    DiscardType = 0x07,

    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Divide = 0x13,
    Mod = 0x14,
    Negate = 0x15,

    Gt = 0x20,
    Gte = 0x21,
    Lt = 0x22,
    Lte = 0x23,
    Eq = 0x24,
    Neq = 0x25,
    And = 0x26,
    Or = 0x27,
    Not = 0x28,

    /// `CAST <tag>`
    Cast = 0x30,
    /// `STORE <reg>`
    Store = 0x31,
    /// `LOAD <reg>`
    Load = 0x32,
    /// `STORE_PTR <reg>`: write top cell's payload at the pointer held in reg.
    StorePtr = 0x33,
    /// `LOAD_PTR <reg> <tag>`: read a `tag` value at the pointer held in reg.
    LoadPtr = 0x34,

    Alloc = 0x40,
    Free = 0x41,
    Write = 0x42,
    Read = 0x43,

    Jump = 0x50,
    JumpZero = 0x51,
    JumpGtZero = 0x52,
    JumpHistory = 0x53,
    Return = 0x54,

    CallHost = 0x60,
    DbgPrint = 0x61,
    Breakpoint = 0x62,
}

impl OpCode {
    /// Returns the opcode byte.
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Parses an opcode byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        let op = match b {
            0x00 => OpCode::Noop,
            0x01 => OpCode::Push,
            0x02 => OpCode::PushSpan,
            0x03 => OpCode::PushType,
            0x04 => OpCode::PushRegPtr,
            0x05 => OpCode::Dupe,
            0x06 => OpCode::Discard,
            0x07 => OpCode::DiscardType,
            0x10 => OpCode::Add,
            0x11 => OpCode::Sub,
            0x12 => OpCode::Mul,
            0x13 => OpCode::Divide,
            0x14 => OpCode::Mod,
            0x15 => OpCode::Negate,
            0x20 => OpCode::Gt,
            0x21 => OpCode::Gte,
            0x22 => OpCode::Lt,
            0x23 => OpCode::Lte,
            0x24 => OpCode::Eq,
            0x25 => OpCode::Neq,
            0x26 => OpCode::And,
            0x27 => OpCode::Or,
            0x28 => OpCode::Not,
            0x30 => OpCode::Cast,
            0x31 => OpCode::Store,
            0x32 => OpCode::Load,
            0x33 => OpCode::StorePtr,
            0x34 => OpCode::LoadPtr,
            0x40 => OpCode::Alloc,
            0x41 => OpCode::Free,
            0x42 => OpCode::Write,
            0x43 => OpCode::Read,
            0x50 => OpCode::Jump,
            0x51 => OpCode::JumpZero,
            0x52 => OpCode::JumpGtZero,
            0x53 => OpCode::JumpHistory,
            0x54 => OpCode::Return,
            0x60 => OpCode::CallHost,
            0x61 => OpCode::DbgPrint,
            0x62 => OpCode::Breakpoint,
            _ => return None,
        };
        Some(op)
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Noop => "NOOP",
            OpCode::Push => "PUSH",
            OpCode::PushSpan => "PUSH_SPAN",
            OpCode::PushType => "PUSH_TYPE",
            OpCode::PushRegPtr => "PUSH_REG_PTR",
            OpCode::Dupe => "DUPE",
            OpCode::Discard => "DISCARD",
            OpCode::DiscardType => "DISCARD_TYPE",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Divide => "DIVIDE",
            OpCode::Mod => "MOD",
            OpCode::Negate => "NEGATE",
            OpCode::Gt => "GT",
            OpCode::Gte => "GTE",
            OpCode::Lt => "LT",
            OpCode::Lte => "LTE",
            OpCode::Eq => "EQ",
            OpCode::Neq => "NEQ",
            OpCode::And => "AND",
            OpCode::Or => "OR",
            OpCode::Not => "NOT",
            OpCode::Cast => "CAST",
            OpCode::Store => "STORE",
            OpCode::Load => "LOAD",
            OpCode::StorePtr => "STORE_PTR",
            OpCode::LoadPtr => "LOAD_PTR",
            OpCode::Alloc => "ALLOC",
            OpCode::Free => "FREE",
            OpCode::Write => "WRITE",
            OpCode::Read => "READ",
            OpCode::Jump => "JUMP",
            OpCode::JumpZero => "JUMP_ZERO",
            OpCode::JumpGtZero => "JUMP_GT_ZERO",
            OpCode::JumpHistory => "JUMP_HISTORY",
            OpCode::Return => "RETURN",
            OpCode::CallHost => "CALL_HOST",
            OpCode::DbgPrint => "DBG_PRINT",
            OpCode::Breakpoint => "BREAKPOINT",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
