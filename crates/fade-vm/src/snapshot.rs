//! Serializable view of VM state for debugger clients.

use crate::value::TaggedValue;
use crate::vm::Vm;
use fade_types::TypeCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterView {
    pub address: u8,
    pub type_code: TypeCode,
    /// Significant payload bytes, little-endian.
    pub raw: Vec<u8>,
    /// Rendered value; strings are decoded from the heap.
    pub display: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationView {
    pub ptr: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapView {
    pub capacity: usize,
    pub cursor: usize,
    pub allocations: Vec<AllocationView>,
}

/// Point-in-time copy of the state a debugger inspects between steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmSnapshot {
    pub instruction_pointer: usize,
    pub complete: bool,
    pub stack_bytes: usize,
    /// Registers that differ from their initial zero `int`.
    pub registers: Vec<RegisterView>,
    pub heap: HeapView,
}

impl RegisterView {
    fn new(address: u8, value: &TaggedValue, vm: &Vm) -> Self {
        Self {
            address,
            type_code: value.tag,
            raw: value.bytes().to_vec(),
            display: value.display(vm.heap()),
        }
    }
}

impl VmSnapshot {
    pub fn capture(vm: &Vm) -> Self {
        let heap = vm.heap();
        Self {
            instruction_pointer: vm.instruction_pointer(),
            complete: vm.is_complete(),
            stack_bytes: vm.stack().len(),
            registers: vm
                .registers()
                .occupied()
                .map(|(addr, value)| RegisterView::new(addr, &value, vm))
                .collect(),
            heap: HeapView {
                capacity: heap.capacity(),
                cursor: heap.cursor(),
                allocations: heap
                    .allocations()
                    .map(|(ptr, len)| AllocationView { ptr, len })
                    .collect(),
            },
        }
    }
}
