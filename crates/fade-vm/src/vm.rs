//! The instruction dispatcher.
//!
//! [`Vm::execute`] runs a bounded number of instructions and returns; all
//! state (instruction pointer, stack, registers, heap, GOSUB history)
//! persists on the `Vm`, so a host can interleave debugger work between
//! calls. Repeated bounded calls behave exactly like one unbounded call.

use crate::config::VmConfig;
use crate::heap::Heap;
use crate::host::{self, HostMethodTable};
use crate::ops::{self, BinaryOp, CompareOp};
use crate::registers::RegisterFile;
use crate::snapshot::VmSnapshot;
use crate::stack::OperandStack;
use crate::value::TaggedValue;
use fade_types::{OpCode, TypeCode, VmError, VmResult};
use tracing::{debug, trace};

/// Why [`Vm::execute`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// The instruction pointer reached the end of the program.
    Complete,
    /// The instruction budget ran out; call `execute` again to continue.
    Suspended,
    /// A `BREAKPOINT` instruction was executed. The instruction pointer is
    /// already past it.
    Breakpoint,
}

enum Flow {
    Continue,
    Break,
}

/// Reads `n` inline operand bytes at `*ip`, advancing it.
fn fetch<'p>(program: &'p [u8], ip: &mut usize, n: usize) -> VmResult<&'p [u8]> {
    let start = *ip;
    let bytes = program
        .get(start..start + n)
        .ok_or(VmError::TruncatedInstruction { ip: start })?;
    *ip += n;
    Ok(bytes)
}

fn fetch_u8(program: &[u8], ip: &mut usize) -> VmResult<u8> {
    Ok(fetch(program, ip, 1)?[0])
}

fn fetch_tag(program: &[u8], ip: &mut usize) -> VmResult<TypeCode> {
    let byte = fetch_u8(program, ip)?;
    TypeCode::from_byte(byte).ok_or(VmError::InvalidTypeCode(byte))
}

fn fetch_u32(program: &[u8], ip: &mut usize) -> VmResult<u32> {
    let bytes = fetch(program, ip, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub struct Vm {
    program: Vec<u8>,
    ip: usize,
    /// Offset of the instruction most recently started.
    current: usize,
    stack: OperandStack,
    registers: RegisterFile,
    heap: Heap,
    host_methods: HostMethodTable,
    call_stack: Vec<usize>,
    config: VmConfig,
    debug_output: Vec<String>,
    executed: u64,
}

impl Vm {
    pub fn new(program: Vec<u8>, host_methods: HostMethodTable) -> Self {
        Self::with_config(program, host_methods, VmConfig::default())
    }

    pub fn with_config(program: Vec<u8>, host_methods: HostMethodTable, config: VmConfig) -> Self {
        Self {
            program,
            ip: 0,
            current: 0,
            stack: OperandStack::with_capacity(config.stack_capacity),
            registers: RegisterFile::new(),
            heap: Heap::new(config.initial_heap_size),
            host_methods,
            call_stack: Vec::new(),
            config,
            debug_output: Vec::new(),
            executed: 0,
        }
    }

    // ── Debug-stepping surface ───────────────────────────────────────────

    pub fn instruction_pointer(&self) -> usize {
        self.ip
    }

    /// Offset of the instruction most recently started; after an error,
    /// the instruction that failed.
    pub fn current_instruction(&self) -> usize {
        self.current
    }

    pub fn is_complete(&self) -> bool {
        self.ip >= self.program.len()
    }

    /// Total instructions executed across all `execute` calls.
    pub fn instructions_executed(&self) -> u64 {
        self.executed
    }

    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn register(&self, addr: u8) -> TaggedValue {
        self.registers.load(addr)
    }

    /// Overwrites a register, e.g. when a debugger edits a variable.
    pub fn set_register(&mut self, addr: u8, value: TaggedValue) {
        self.registers.store(addr, &value);
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn host_methods(&self) -> &HostMethodTable {
        &self.host_methods
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Lines produced by `DBG_PRINT`, oldest first.
    pub fn debug_output(&self) -> &[String] {
        &self.debug_output
    }

    pub fn snapshot(&self) -> VmSnapshot {
        VmSnapshot::capture(self)
    }

    // ── Execution ────────────────────────────────────────────────────────

    /// Runs at most `budget` instructions, or until completion or a
    /// breakpoint when `budget` is 0.
    pub fn execute(&mut self, budget: usize) -> VmResult<ExecStatus> {
        debug!(ip = self.ip, budget, "execute");
        let mut ran = 0usize;
        while self.ip < self.program.len() {
            if budget != 0 && ran >= budget {
                debug!(ip = self.ip, ran, "suspended");
                return Ok(ExecStatus::Suspended);
            }
            ran += 1;
            self.executed += 1;

            self.current = self.ip;
            let byte = self.program[self.ip];
            let op = OpCode::from_byte(byte).ok_or(VmError::UnknownOpCode { byte, ip: self.ip })?;
            self.ip += 1;
            trace!(ip = self.current, %op);

            if let Flow::Break = self.step(op)? {
                debug!(ip = self.ip, "breakpoint");
                return Ok(ExecStatus::Breakpoint);
            }
        }
        debug!(ran, "complete");
        Ok(ExecStatus::Complete)
    }

    /// Runs until completion, skipping over breakpoints.
    pub fn run(&mut self) -> VmResult<()> {
        while self.execute(0)? != ExecStatus::Complete {}
        Ok(())
    }

    fn step(&mut self, op: OpCode) -> VmResult<Flow> {
        match op {
            OpCode::Noop => {}

            // ── Stack ────────────────────────────────────────────────────
            OpCode::Push => {
                let tag = fetch_tag(&self.program, &mut self.ip)?;
                let payload = fetch(&self.program, &mut self.ip, tag.size())?;
                self.stack.push(payload, tag);
            }
            OpCode::PushSpan => {
                let len = fetch_u32(&self.program, &mut self.ip)? as usize;
                let bytes = fetch(&self.program, &mut self.ip, len)?;
                self.stack.push_raw(bytes);
            }
            OpCode::PushType => {
                let tag = fetch_tag(&self.program, &mut self.ip)?;
                self.stack.push_raw(&[tag.byte()]);
            }
            OpCode::PushRegPtr => {
                let reg = fetch_u8(&self.program, &mut self.ip)?;
                self.stack.push_value(&TaggedValue::register_ref(reg));
            }
            OpCode::Dupe => {
                let top = self.stack.peek_value()?;
                self.stack.push_value(&top);
            }
            OpCode::Discard => {
                self.stack.pop_value()?;
            }
            OpCode::DiscardType => {
                self.stack.pop_tag()?;
            }

            // ── Operators ────────────────────────────────────────────────
            OpCode::Add => self.binary(BinaryOp::Add)?,
            OpCode::Sub => self.binary(BinaryOp::Sub)?,
            OpCode::Mul => self.binary(BinaryOp::Mul)?,
            OpCode::Divide => self.binary(BinaryOp::Div)?,
            OpCode::Mod => self.binary(BinaryOp::Mod)?,
            OpCode::Negate => {
                let value = self.stack.pop_value()?;
                self.stack.push_value(&ops::negate(value)?);
            }
            OpCode::Gt => self.compare(CompareOp::Gt)?,
            OpCode::Gte => self.compare(CompareOp::Gte)?,
            OpCode::Lt => self.compare(CompareOp::Lt)?,
            OpCode::Lte => self.compare(CompareOp::Lte)?,
            OpCode::Eq => self.compare(CompareOp::Eq)?,
            OpCode::Neq => self.compare(CompareOp::Neq)?,
            OpCode::And | OpCode::Or => {
                let rhs = !self.stack.pop_value()?.is_zero();
                let lhs = !self.stack.pop_value()?.is_zero();
                let out = if op == OpCode::And { lhs && rhs } else { lhs || rhs };
                self.stack.push_value(&TaggedValue::from_primitive(out));
            }
            OpCode::Not => {
                let value = self.stack.pop_value()?;
                self.stack.push_value(&TaggedValue::from_primitive(value.is_zero()));
            }
            OpCode::Cast => {
                let tag = fetch_tag(&self.program, &mut self.ip)?;
                let value = self.stack.pop_value()?;
                self.stack.push_value(&ops::cast(value, tag)?);
            }

            // ── Registers ────────────────────────────────────────────────
            OpCode::Store => {
                let reg = fetch_u8(&self.program, &mut self.ip)?;
                let value = self.stack.pop_value()?;
                self.registers.store(reg, &value);
            }
            OpCode::Load => {
                let reg = fetch_u8(&self.program, &mut self.ip)?;
                self.stack.push_value(&self.registers.load(reg));
            }
            OpCode::StorePtr => {
                let reg = fetch_u8(&self.program, &mut self.ip)?;
                let ptr = self.registers.load(reg).expect_pointer()?;
                let value = self.stack.pop_value()?;
                self.heap.write(ptr, value.bytes())?;
            }
            OpCode::LoadPtr => {
                let reg = fetch_u8(&self.program, &mut self.ip)?;
                let tag = fetch_tag(&self.program, &mut self.ip)?;
                let ptr = self.registers.load(reg).expect_pointer()?;
                let bytes = self.heap.read(ptr, tag.size())?;
                self.stack.push(bytes, tag);
            }

            // ── Heap ─────────────────────────────────────────────────────
            OpCode::Alloc => {
                let size = self.pop_length()?;
                let ptr = self.heap.allocate(size);
                self.stack.push_value(&TaggedValue::heap_pointer(TypeCode::PtrHeap, ptr)?);
            }
            OpCode::Free => {
                let ptr = self.stack.pop_value()?.expect_pointer()?;
                self.heap.free(ptr)?;
            }
            OpCode::Write => {
                let ptr = self.stack.pop_value()?.expect_pointer()?;
                let len = self.pop_length()?;
                let bytes = self.stack.pop_span(len)?;
                self.heap.write(ptr, bytes)?;
            }
            OpCode::Read => {
                let ptr = self.stack.pop_value()?.expect_pointer()?;
                let len = self.pop_length()?;
                let bytes = self.heap.read(ptr, len)?;
                self.stack.push_raw(bytes);
            }

            // ── Control flow ─────────────────────────────────────────────
            OpCode::Jump => {
                let target = self.pop_target()?;
                self.ip = target;
            }
            OpCode::JumpZero => {
                let target = self.pop_target()?;
                if self.stack.pop_value()?.is_zero() {
                    self.ip = target;
                }
            }
            OpCode::JumpGtZero => {
                let target = self.pop_target()?;
                if ops::is_positive(&self.stack.pop_value()?)? {
                    self.ip = target;
                }
            }
            OpCode::JumpHistory => {
                let target = self.pop_target()?;
                if self.call_stack.len() >= self.config.max_call_depth {
                    return Err(VmError::CallDepthExceeded(self.config.max_call_depth));
                }
                self.call_stack.push(self.ip);
                self.ip = target;
            }
            OpCode::Return => {
                self.ip = self.call_stack.pop().ok_or(VmError::ReturnWithoutCall)?;
            }

            // ── Host & debugging ─────────────────────────────────────────
            OpCode::CallHost => {
                let address = self.stack.pop_value()?.expect_int()?;
                let method = self
                    .host_methods
                    .get(address)
                    .ok_or(VmError::UnknownHostMethod(address))?;
                host::invoke(method, &mut self.stack, &mut self.registers, &mut self.heap)?;
            }
            OpCode::DbgPrint => {
                let value = self.stack.pop_value()?;
                let line = value.display(&self.heap);
                debug!(target: "fade_vm::dbg_print", "{line}");
                self.debug_output.push(line);
            }
            OpCode::Breakpoint => return Ok(Flow::Break),
        }
        Ok(Flow::Continue)
    }

    fn binary(&mut self, op: BinaryOp) -> VmResult<()> {
        let rhs = self.stack.pop_value()?;
        let lhs = self.stack.pop_value()?;
        let out = ops::binary(op, lhs, rhs, &mut self.heap)?;
        self.stack.push_value(&out);
        Ok(())
    }

    fn compare(&mut self, op: CompareOp) -> VmResult<()> {
        let rhs = self.stack.pop_value()?;
        let lhs = self.stack.pop_value()?;
        let out = ops::compare(op, lhs, rhs, &self.heap)?;
        self.stack.push_value(&TaggedValue::from_primitive(out));
        Ok(())
    }

    /// Pops a non-negative `int` byte count.
    fn pop_length(&mut self) -> VmResult<usize> {
        let len = self.stack.pop_value()?.expect_int()?;
        usize::try_from(len).map_err(|_| VmError::NegativeLength(len))
    }

    fn pop_target(&mut self) -> VmResult<usize> {
        let target = self.stack.pop_value()?.expect_int()?;
        match usize::try_from(target) {
            Ok(t) if t <= self.program.len() => Ok(t),
            _ => Err(VmError::InvalidJumpTarget(target)),
        }
    }
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("ip", &self.ip)
            .field("program_len", &self.program.len())
            .field("stack_bytes", &self.stack.len())
            .field("call_depth", &self.call_stack.len())
            .finish_non_exhaustive()
    }
}
