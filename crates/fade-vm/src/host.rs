//! Host methods: natively implemented commands callable from bytecode.
//!
//! A [`HostMethod`] describes the native signature (parameter tags, which
//! parameters are optional or by-reference, the return tag) together with
//! the callback that implements it. [`invoke`] is the calling convention
//! used by `CALL_HOST`:
//!
//! 1. Parameters are popped in reverse declaration order.
//! 2. A `ptr_reg` argument is resolved to the named register's value, and a
//!    `ptr_heap` argument for a by-reference parameter to the value stored
//!    at that address. The location is remembered for write-back.
//! 3. `void` for an optional parameter becomes the declared default.
//! 4. `string` parameters accept an `int` or `string` heap pointer and are
//!    decoded; `any` accepts every tag; otherwise tags must match exactly.
//! 5. After the callback, indirected arguments are written back (strings
//!    get a freshly allocated block) and the result is pushed unless the
//!    method returns `void`.

use crate::heap::Heap;
use crate::ops;
use crate::registers::RegisterFile;
use crate::stack::OperandStack;
use crate::value::TaggedValue;
use fade_types::{TypeCode, VmError, VmResult};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// A value as seen by native code.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Void,
    Int(i32),
    Real(f32),
    Bool(bool),
    Byte(u8),
    Word(u16),
    DWord(u32),
    DInt(i64),
    DFloat(f64),
    Str(String),
    Struct(i32),
    HeapPtr(i32),
}

impl HostValue {
    pub fn type_code(&self) -> TypeCode {
        match self {
            HostValue::Void => TypeCode::Void,
            HostValue::Int(_) => TypeCode::Int,
            HostValue::Real(_) => TypeCode::Real,
            HostValue::Bool(_) => TypeCode::Bool,
            HostValue::Byte(_) => TypeCode::Byte,
            HostValue::Word(_) => TypeCode::Word,
            HostValue::DWord(_) => TypeCode::DWord,
            HostValue::DInt(_) => TypeCode::DInt,
            HostValue::DFloat(_) => TypeCode::DFloat,
            HostValue::Str(_) => TypeCode::String,
            HostValue::Struct(_) => TypeCode::Struct,
            HostValue::HeapPtr(_) => TypeCode::PtrHeap,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            HostValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_dfloat(&self) -> Option<f64> {
        match self {
            HostValue::DFloat(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Decodes a cell whose tag is not `string`, `void` or an indirection.
    fn from_primitive_cell(value: &TaggedValue) -> Option<Self> {
        Some(match value.tag {
            TypeCode::Int => HostValue::Int(value.get()),
            TypeCode::Real => HostValue::Real(value.get()),
            TypeCode::Bool => HostValue::Bool(value.get()),
            TypeCode::Byte => HostValue::Byte(value.get()),
            TypeCode::Word => HostValue::Word(value.get()),
            TypeCode::DWord => HostValue::DWord(value.get()),
            TypeCode::DInt => HostValue::DInt(value.get()),
            TypeCode::DFloat => HostValue::DFloat(value.get()),
            TypeCode::Struct => HostValue::Struct(value.get()),
            TypeCode::PtrHeap => HostValue::HeapPtr(value.get()),
            _ => return None,
        })
    }

    /// Encodes into a cell, allocating heap storage for strings.
    fn to_cell(&self, heap: &mut Heap) -> VmResult<TaggedValue> {
        Ok(match self {
            HostValue::Void => TaggedValue::void(),
            HostValue::Int(i) => TaggedValue::from_primitive(*i),
            HostValue::Real(f) => TaggedValue::from_primitive(*f),
            HostValue::Bool(b) => TaggedValue::from_primitive(*b),
            HostValue::Byte(b) => TaggedValue::from_primitive(*b),
            HostValue::Word(w) => TaggedValue::from_primitive(*w),
            HostValue::DWord(d) => TaggedValue::from_primitive(*d),
            HostValue::DInt(i) => TaggedValue::from_primitive(*i),
            HostValue::DFloat(f) => TaggedValue::from_primitive(*f),
            HostValue::Str(s) => {
                let ptr = heap.allocate_string(s)?;
                TaggedValue::heap_pointer(TypeCode::String, ptr)?
            }
            HostValue::Struct(p) => TaggedValue::pointer(TypeCode::Struct, *p),
            HostValue::HeapPtr(p) => TaggedValue::pointer(TypeCode::PtrHeap, *p),
        })
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Void => Ok(()),
            HostValue::Int(v) => write!(f, "{v}"),
            HostValue::Real(v) => write!(f, "{v}"),
            HostValue::Bool(v) => write!(f, "{v}"),
            HostValue::Byte(v) => write!(f, "{v}"),
            HostValue::Word(v) => write!(f, "{v}"),
            HostValue::DWord(v) => write!(f, "{v}"),
            HostValue::DInt(v) => write!(f, "{v}"),
            HostValue::DFloat(v) => write!(f, "{v}"),
            HostValue::Str(s) => f.write_str(s),
            HostValue::Struct(p) => write!(f, "struct@{p}"),
            HostValue::HeapPtr(p) => write!(f, "&heap[{p}]"),
        }
    }
}

/// Failure reported by a native command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("argument {index}: expected {expected}")]
    BadArgument { index: usize, expected: TypeCode },
    #[error("{0}")]
    Failed(String),
}

pub type HostResult = Result<HostValue, HostError>;

/// Native implementation. Receives the marshalled arguments in declaration
/// order; mutations to by-reference arguments are written back.
pub type HostCallback = Box<dyn Fn(&mut [HostValue]) -> HostResult>;

#[derive(Debug, Clone, PartialEq)]
pub struct HostParam {
    pub ty: TypeCode,
    pub by_ref: bool,
    /// Substituted when the caller passes `void`. Presence marks the
    /// parameter optional.
    pub default: Option<HostValue>,
}

/// Descriptor of one registered command. Immutable once registered.
pub struct HostMethod {
    pub name: String,
    pub params: Vec<HostParam>,
    pub returns: TypeCode,
    callback: HostCallback,
}

impl HostMethod {
    /// A method taking no parameters and returning `void`.
    pub fn new(
        name: impl Into<String>,
        callback: impl Fn(&mut [HostValue]) -> HostResult + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: TypeCode::Void,
            callback: Box::new(callback),
        }
    }

    pub fn param(mut self, ty: TypeCode) -> Self {
        self.params.push(HostParam {
            ty,
            by_ref: false,
            default: None,
        });
        self
    }

    pub fn optional(mut self, ty: TypeCode, default: HostValue) -> Self {
        self.params.push(HostParam {
            ty,
            by_ref: false,
            default: Some(default),
        });
        self
    }

    pub fn by_ref(mut self, ty: TypeCode) -> Self {
        self.params.push(HostParam {
            ty,
            by_ref: true,
            default: None,
        });
        self
    }

    pub fn returns(mut self, ty: TypeCode) -> Self {
        self.returns = ty;
        self
    }
}

impl fmt::Debug for HostMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostMethod")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// Registered methods, addressed by registration index.
#[derive(Debug, Default)]
pub struct HostMethodTable {
    methods: Vec<HostMethod>,
}

impl HostMethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `method` and returns the address `CALL_HOST` uses for it.
    pub fn register(&mut self, method: HostMethod) -> VmResult<i32> {
        let address = address_for(self.methods.len())?;
        self.methods.push(method);
        Ok(address)
    }

    pub fn get(&self, address: i32) -> Option<&HostMethod> {
        usize::try_from(address).ok().and_then(|i| self.methods.get(i))
    }

    /// Address of the first method named `name`, for the compiler.
    pub fn find(&self, name: &str) -> Option<i32> {
        self.methods
            .iter()
            .position(|m| m.name.eq_ignore_ascii_case(name))
            .and_then(|i| i32::try_from(i).ok())
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// `CALL_HOST` address for the method at `index`.
fn address_for(index: usize) -> VmResult<i32> {
    i32::try_from(index).map_err(|_| VmError::HostTableFull(index))
}

// ══════════════════════════════════════════════════════════════════════════════
// Calling convention
// ══════════════════════════════════════════════════════════════════════════════

/// Where a by-reference argument came from.
#[derive(Debug, Clone, Copy)]
enum RefSlot {
    Register(u8),
    Heap(usize),
}

fn mismatch(method: &HostMethod, index: usize, expected: TypeCode, actual: TypeCode) -> VmError {
    VmError::HostArgumentMismatch {
        method: method.name.clone(),
        index,
        expected,
        actual,
    }
}

/// Resolves register and heap indirection for one popped argument.
fn resolve(
    method: &HostMethod,
    index: usize,
    param: &HostParam,
    value: TaggedValue,
    registers: &RegisterFile,
    heap: &Heap,
) -> VmResult<(TaggedValue, Option<RefSlot>)> {
    match value.tag {
        TypeCode::PtrReg => {
            let reg: u8 = value.get();
            Ok((registers.load(reg), Some(RefSlot::Register(reg))))
        }
        TypeCode::PtrHeap if param.by_ref && param.ty != TypeCode::PtrHeap => {
            // A string slot holds the string's pointer.
            let stored = match param.ty {
                TypeCode::String => TypeCode::Int,
                TypeCode::Any | TypeCode::Void | TypeCode::PtrReg => {
                    return Err(mismatch(method, index, param.ty, value.tag))
                }
                other => other,
            };
            let ptr = value.expect_pointer()?;
            let cell = TaggedValue::new(stored, heap.read(ptr, stored.size())?);
            Ok((cell, Some(RefSlot::Heap(ptr))))
        }
        _ => Ok((value, None)),
    }
}

/// Converts an effective argument cell to the native value for `param`.
fn marshal(
    method: &HostMethod,
    index: usize,
    param: &HostParam,
    value: TaggedValue,
    heap: &Heap,
) -> VmResult<HostValue> {
    if value.tag == TypeCode::Void {
        if let Some(default) = &param.default {
            return Ok(default.clone());
        }
    }
    let is_string_ptr = matches!(value.tag, TypeCode::Int | TypeCode::String);
    match param.ty {
        TypeCode::String if is_string_ptr => {
            Ok(HostValue::Str(heap.read_string(value.expect_pointer()?)?))
        }
        TypeCode::Any if value.tag == TypeCode::String => {
            Ok(HostValue::Str(heap.read_string(value.expect_pointer()?)?))
        }
        TypeCode::Any => HostValue::from_primitive_cell(&value)
            .ok_or_else(|| mismatch(method, index, param.ty, value.tag)),
        ty if ty == value.tag => HostValue::from_primitive_cell(&value)
            .ok_or_else(|| mismatch(method, index, param.ty, value.tag)),
        _ => Err(mismatch(method, index, param.ty, value.tag)),
    }
}

/// Encodes a native value for storage into a by-reference slot.
fn write_back(
    slot: RefSlot,
    value: &HostValue,
    registers: &mut RegisterFile,
    heap: &mut Heap,
) -> VmResult<()> {
    let cell = value.to_cell(heap)?;
    match slot {
        RefSlot::Register(reg) => registers.store(reg, &cell),
        RefSlot::Heap(ptr) => heap.write(ptr, cell.bytes())?,
    }
    Ok(())
}

/// Executes `CALL_HOST` for a resolved method.
pub fn invoke(
    method: &HostMethod,
    stack: &mut OperandStack,
    registers: &mut RegisterFile,
    heap: &mut Heap,
) -> VmResult<()> {
    let arity = method.params.len();
    let mut args = vec![HostValue::Void; arity];
    let mut slots: Vec<Option<RefSlot>> = vec![None; arity];

    for (index, param) in method.params.iter().enumerate().rev() {
        let popped = stack.pop_value()?;
        let (effective, slot) = resolve(method, index, param, popped, registers, heap)?;
        args[index] = marshal(method, index, param, effective, heap)?;
        slots[index] = slot;
    }

    debug!(method = %method.name, arity, "host call");
    let result = (method.callback)(&mut args).map_err(|e| VmError::HostFailure {
        method: method.name.clone(),
        message: e.to_string(),
    })?;

    for (slot, arg) in slots.iter().zip(&args) {
        if let Some(slot) = slot {
            write_back(*slot, arg, registers, heap)?;
        }
    }

    if method.returns == TypeCode::Void {
        return Ok(());
    }
    if result == HostValue::Void {
        return Err(VmError::HostFailure {
            method: method.name.clone(),
            message: format!("returned no value, declared {}", method.returns),
        });
    }
    let mut cell = result.to_cell(heap)?;
    if method.returns != TypeCode::Any && cell.tag != method.returns {
        cell = ops::cast(cell, method.returns)?;
    }
    stack.push_value(&cell);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_records_signature() {
        let m = HostMethod::new("mid$", |_| Ok(HostValue::Void))
            .param(TypeCode::String)
            .param(TypeCode::Int)
            .optional(TypeCode::Int, HostValue::Int(-1))
            .returns(TypeCode::String);
        assert_eq!(m.params.len(), 3);
        assert_eq!(m.params[2].default, Some(HostValue::Int(-1)));
        assert!(!m.params[0].by_ref);
        assert_eq!(m.returns, TypeCode::String);
    }

    #[test]
    fn table_addresses_follow_registration_order() {
        let mut table = HostMethodTable::new();
        let a = table.register(HostMethod::new("first", |_| Ok(HostValue::Void))).unwrap();
        let b = table.register(HostMethod::new("Second", |_| Ok(HostValue::Void))).unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(table.find("second"), Some(1));
        assert_eq!(table.get(1).map(|m| m.name.as_str()), Some("Second"));
        assert!(table.get(2).is_none());
        assert!(table.get(-1).is_none());
    }

    #[test]
    fn addresses_stop_at_int_range() {
        assert_eq!(address_for(0), Ok(0));
        assert_eq!(address_for(i32::MAX as usize), Ok(i32::MAX));
        let overflow = i32::MAX as usize + 1;
        assert_eq!(address_for(overflow), Err(VmError::HostTableFull(overflow)));
    }

    #[test]
    fn host_value_tags() {
        assert_eq!(HostValue::Str("x".into()).type_code(), TypeCode::String);
        assert_eq!(HostValue::DFloat(1.0).type_code(), TypeCode::DFloat);
        assert_eq!(HostValue::Int(3).to_string(), "3");
    }
}
