//! Primitive type codes and their fixed payload widths.
//!
//! Every value on the operand stack, in a register, or described by a host
//! method signature carries one of these one-byte tags. The tag is stored
//! *after* its payload on the stack (see `fade-vm`'s operand stack), so the
//! width table below is how the VM knows how many bytes precede a tag.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One-byte discriminator for a value's primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TypeCode {
    /// Signed 32-bit integer.
    Int = 0,
    /// 32-bit float.
    Real = 1,
    /// Heap pointer to a string (4-byte code units per character).
    String = 2,
    /// Boolean stored in one byte.
    Bool = 3,
    /// Unsigned 8-bit integer.
    Byte = 4,
    /// Unsigned 16-bit integer.
    Word = 5,
    /// Unsigned 32-bit integer.
    #[serde(rename = "dword")]
    DWord = 6,
    /// Signed 64-bit integer.
    #[serde(rename = "dint")]
    DInt = 7,
    /// 64-bit float.
    #[serde(rename = "dfloat")]
    DFloat = 8,
    /// Heap pointer to a struct instance.
    Struct = 9,
    /// No value. Also marks an omitted optional host argument.
    Void = 10,
    /// Register indirection; payload is the register address.
    PtrReg = 11,
    /// Heap indirection; payload is a heap pointer.
    PtrHeap = 12,
    /// Wildcard, only meaningful in host method signatures.
    Any = 13,
}

/// Payload width in bytes, indexed by `TypeCode as u8`.
const TYPE_SIZES: [usize; 14] = [
    4, // int
    4, // real
    4, // string
    1, // bool
    1, // byte
    2, // word
    4, // dword
    8, // dint
    8, // dfloat
    4, // struct
    0, // void
    1, // ptr_reg
    4, // ptr_heap
    0, // any
];

/// Width of the widest payload (`dint` / `dfloat`).
pub const MAX_PAYLOAD: usize = 8;

impl TypeCode {
    pub const ALL: [TypeCode; 14] = [
        TypeCode::Int,
        TypeCode::Real,
        TypeCode::String,
        TypeCode::Bool,
        TypeCode::Byte,
        TypeCode::Word,
        TypeCode::DWord,
        TypeCode::DInt,
        TypeCode::DFloat,
        TypeCode::Struct,
        TypeCode::Void,
        TypeCode::PtrReg,
        TypeCode::PtrHeap,
        TypeCode::Any,
    ];

    /// Numeric types in promotion order, narrowest first. `bool` ranks
    /// here so it can be promoted and cast, but two `bool` operands have
    /// no arithmetic of their own.
    pub const NUMERIC: [TypeCode; 8] = [
        TypeCode::Bool,
        TypeCode::Byte,
        TypeCode::Word,
        TypeCode::Int,
        TypeCode::DWord,
        TypeCode::Real,
        TypeCode::DInt,
        TypeCode::DFloat,
    ];

    /// Returns the tag byte.
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Parses a tag byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.get(usize::from(b)).copied()
    }

    /// Payload width in bytes.
    pub fn size(self) -> usize {
        TYPE_SIZES[self as usize]
    }

    /// Position in the promotion order, or `None` for non-numeric tags.
    pub fn rank(self) -> Option<u8> {
        match self {
            TypeCode::Bool => Some(0),
            TypeCode::Byte => Some(1),
            TypeCode::Word => Some(2),
            TypeCode::Int => Some(3),
            TypeCode::DWord => Some(4),
            TypeCode::Real => Some(5),
            TypeCode::DInt => Some(6),
            TypeCode::DFloat => Some(7),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.rank().is_some()
    }

    /// Tags whose payload is "an integer that happens to mean a heap
    /// address". Casts among these are bit-identical.
    pub fn is_pointer_like(self) -> bool {
        matches!(
            self,
            TypeCode::Int | TypeCode::String | TypeCode::Struct | TypeCode::PtrHeap
        )
    }

    /// The common tag two operands are promoted to before a binary
    /// operation. Identical tags promote to themselves; otherwise both
    /// must be numeric and the wider one wins.
    pub fn promote(self, other: TypeCode) -> Option<TypeCode> {
        if self == other {
            return Some(self);
        }
        let (a, b) = (self.rank()?, other.rank()?);
        Some(if a >= b { self } else { other })
    }

    /// Lower-case name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            TypeCode::Int => "int",
            TypeCode::Real => "real",
            TypeCode::String => "string",
            TypeCode::Bool => "bool",
            TypeCode::Byte => "byte",
            TypeCode::Word => "word",
            TypeCode::DWord => "dword",
            TypeCode::DInt => "dint",
            TypeCode::DFloat => "dfloat",
            TypeCode::Struct => "struct",
            TypeCode::Void => "void",
            TypeCode::PtrReg => "ptr_reg",
            TypeCode::PtrHeap => "ptr_heap",
            TypeCode::Any => "any",
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
