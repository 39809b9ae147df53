//! Tagged cells: a payload of `width(tag)` bytes plus its type tag.

use crate::heap::Heap;
use fade_types::{Primitive, TypeCode, VmError, VmResult, MAX_PAYLOAD};

/// One dynamically-typed value, held by value (never boxed).
///
/// Only the first `tag.size()` bytes of `payload` are significant; the rest
/// are zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaggedValue {
    pub tag: TypeCode,
    pub payload: [u8; MAX_PAYLOAD],
}

impl TaggedValue {
    /// Builds a cell from the first `tag.size()` bytes of `bytes`.
    pub fn new(tag: TypeCode, bytes: &[u8]) -> Self {
        let mut payload = [0u8; MAX_PAYLOAD];
        let n = tag.size().min(bytes.len());
        payload[..n].copy_from_slice(&bytes[..n]);
        Self { tag, payload }
    }

    pub fn void() -> Self {
        Self {
            tag: TypeCode::Void,
            payload: [0; MAX_PAYLOAD],
        }
    }

    pub fn from_primitive<P: Primitive>(value: P) -> Self {
        Self {
            tag: P::TYPE,
            payload: value.to_payload(),
        }
    }

    /// A pointer-like value (`string`, `struct`, `ptr_heap`, `int`).
    pub fn pointer(tag: TypeCode, ptr: i32) -> Self {
        Self {
            tag,
            payload: ptr.to_payload(),
        }
    }

    /// A pointer-like value for a heap offset.
    pub fn heap_pointer(tag: TypeCode, ptr: usize) -> VmResult<Self> {
        let raw = i32::try_from(ptr).map_err(|_| VmError::HeapOutOfBounds {
            ptr: i64::try_from(ptr).unwrap_or(i64::MAX),
            len: 0,
        })?;
        Ok(Self::pointer(tag, raw))
    }

    /// A register indirection naming `reg`.
    pub fn register_ref(reg: u8) -> Self {
        Self::new(TypeCode::PtrReg, &[reg])
    }

    /// The significant payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.payload[..self.tag.size()]
    }

    /// Reinterprets the payload as `P`, regardless of the tag.
    pub fn get<P: Primitive>(&self) -> P {
        P::from_payload(self.bytes())
    }

    /// True when every payload byte is zero (BASIC falsiness).
    pub fn is_zero(&self) -> bool {
        self.bytes().iter().all(|b| *b == 0)
    }

    /// Reads an `int` operand, as consumed by jumps, `ALLOC` and `CALL_HOST`.
    pub fn expect_int(&self) -> VmResult<i32> {
        if self.tag != TypeCode::Int {
            return Err(VmError::TypeMismatch {
                expected: TypeCode::Int,
                actual: self.tag,
            });
        }
        Ok(self.get())
    }

    /// Reads a heap address from any pointer-like tag.
    pub fn expect_pointer(&self) -> VmResult<usize> {
        if !self.tag.is_pointer_like() {
            return Err(VmError::TypeMismatch {
                expected: TypeCode::PtrHeap,
                actual: self.tag,
            });
        }
        let raw: i32 = self.get();
        usize::try_from(raw).map_err(|_| VmError::HeapOutOfBounds {
            ptr: i64::from(raw),
            len: 0,
        })
    }
}

impl TaggedValue {
    /// Human-readable rendering, as printed by `DBG_PRINT` and shown to a
    /// debugger. Strings are decoded from the heap.
    pub fn display(&self, heap: &Heap) -> String {
        match self.tag {
            TypeCode::Int => self.get::<i32>().to_string(),
            TypeCode::Real => self.get::<f32>().to_string(),
            TypeCode::Bool => self.get::<bool>().to_string(),
            TypeCode::Byte => self.get::<u8>().to_string(),
            TypeCode::Word => self.get::<u16>().to_string(),
            TypeCode::DWord => self.get::<u32>().to_string(),
            TypeCode::DInt => self.get::<i64>().to_string(),
            TypeCode::DFloat => self.get::<f64>().to_string(),
            TypeCode::String => {
                let ptr = self.get::<i32>();
                usize::try_from(ptr)
                    .ok()
                    .and_then(|p| heap.read_string(p).ok())
                    .unwrap_or_else(|| format!("<invalid string @{ptr}>"))
            }
            TypeCode::Struct => format!("struct@{}", self.get::<i32>()),
            TypeCode::PtrHeap => format!("&heap[{}]", self.get::<i32>()),
            TypeCode::PtrReg => format!("&r{}", self.get::<u8>()),
            TypeCode::Void => "void".to_string(),
            TypeCode::Any => "any".to_string(),
        }
    }
}

impl Default for TaggedValue {
    /// Zero `int`, the initial state of every register.
    fn default() -> Self {
        Self {
            tag: TypeCode::Int,
            payload: [0; MAX_PAYLOAD],
        }
    }
}
