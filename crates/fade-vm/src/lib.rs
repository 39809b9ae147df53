//! Fade bytecode virtual machine.
//!
//! # Architecture
//!
//! A [`Vm`] owns, exclusively:
//! - an [`OperandStack`] of tagged cells (payload bytes, then a one-byte
//!   [`TypeCode`](fade_types::TypeCode)),
//! - a [`RegisterFile`] of 256 slots addressed by `u8`,
//! - a [`Heap`] arena with an allocation table and exact-size free list,
//! - a [`HostMethodTable`] of native commands reachable via `CALL_HOST`.
//!
//! The [`ops`] module is the type & arithmetic engine (casts, promotion,
//! operators); [`host`] is the host-call marshaller.
//!
//! ## Execution
//!
//! [`Vm::execute`] is bounded: it runs at most `budget` instructions and
//! returns an [`ExecStatus`]. State persists between calls, so a debugger
//! drives the VM by calling `execute` repeatedly and inspecting
//! [`Vm::snapshot`] in between. The VM is single-threaded and never
//! blocks; pausing is simply not calling `execute`.

pub mod config;
pub mod heap;
pub mod host;
pub mod ops;
pub mod registers;
pub mod snapshot;
pub mod stack;
pub mod value;
pub mod vm;

pub use config::VmConfig;
pub use heap::Heap;
pub use host::{HostError, HostMethod, HostMethodTable, HostParam, HostResult, HostValue};
pub use registers::{RegisterFile, REGISTER_COUNT};
pub use snapshot::VmSnapshot;
pub use stack::OperandStack;
pub use value::TaggedValue;
pub use vm::{ExecStatus, Vm};

pub use fade_types::{VmError, VmResult};
