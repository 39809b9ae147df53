//! Integration tests for the standard command set, run through bytecode.
//!
//! Tests cover:
//! - PRINT and the shared console
//! - string commands (len, case, slicing, conversion)
//! - numeric commands
//! - by-reference commands (inc, append$)

use fade_stdlib::{register_standard_commands, standard_table, Console};
use fade_types::{BytecodeBuilder, OpCode, TypeCode, VmError};
use fade_vm::{HostMethod, HostMethodTable, HostValue, TaggedValue, Vm};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

const SCRATCH: u8 = 250;

/// Program builder that resolves command names against the standard table.
struct Program {
    builder: BytecodeBuilder,
    table: HostMethodTable,
}

impl Program {
    fn new(console: &Console) -> Self {
        Self {
            builder: BytecodeBuilder::new(),
            table: standard_table(console).expect("registration failed"),
        }
    }

    fn call(&mut self, name: &str) -> &mut BytecodeBuilder {
        let address = self.table.find(name).expect("unknown command");
        self.builder.call_host(address)
    }

    fn string(&mut self, text: &str) -> &mut BytecodeBuilder {
        self.builder.push_string(text, SCRATCH).unwrap()
    }

    fn run(self) -> Result<Vm, VmError> {
        let code = self.builder.finish().expect("build failed");
        let mut vm = Vm::new(code, self.table);
        vm.run()?;
        Ok(vm)
    }
}

/// Evaluates `emit`, then prints whatever it left on the stack.
fn printed(emit: impl FnOnce(&mut Program)) -> Vec<String> {
    let console = Console::new();
    let mut p = Program::new(&console);
    emit(&mut p);
    p.call("print");
    p.run().expect("execution failed");
    console.take()
}

// ══════════════════════════════════════════════════════════════════════════════
// Registration & PRINT
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn every_command_is_registered_once() {
    let table = standard_table(&Console::new()).unwrap();
    let names = [
        "print", "len", "str$", "val", "upper$", "lower$", "left$", "right$", "mid$", "append$",
        "abs", "sqrt", "max", "min", "inc",
    ];
    assert_eq!(table.len(), names.len());
    for name in names {
        assert!(table.find(name).is_some(), "{name} missing");
    }
    assert_eq!(table.find("PRINT"), table.find("print"));
}

#[test]
fn registers_after_existing_methods() {
    let mut table = HostMethodTable::new();
    table.register(HostMethod::new("custom", |_| Ok(HostValue::Void))).unwrap();
    register_standard_commands(&mut table, &Console::new()).unwrap();
    assert_eq!(table.find("custom"), Some(0));
    assert_eq!(table.find("print"), Some(1));
}

#[test]
fn print_renders_each_tag() {
    let console = Console::new();
    let mut p = Program::new(&console);
    p.builder.push(12i32);
    p.call("print");
    p.builder.push(0.5f32);
    p.call("print");
    p.builder.push(true);
    p.call("print");
    p.string("hello");
    p.call("print");
    let vm = p.run().unwrap();
    assert_eq!(console.lines(), vec!["12", "0.5", "true", "hello"]);
    assert!(vm.stack().is_empty());
}

// ══════════════════════════════════════════════════════════════════════════════
// Strings
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn len_counts_characters() {
    let out = printed(|p| {
        p.string("héllo");
        p.call("len");
    });
    assert_eq!(out, vec!["5"]);
}

#[test]
fn case_conversion() {
    let out = printed(|p| {
        p.string("MiXeD");
        p.call("upper$");
        p.call("lower$");
    });
    assert_eq!(out, vec!["mixed"]);
}

#[test]
fn left_and_right() {
    let out = printed(|p| {
        p.string("abcdef");
        p.builder.push(2i32);
        p.call("left$");
    });
    assert_eq!(out, vec!["ab"]);

    let out = printed(|p| {
        p.string("abcdef");
        p.builder.push(10i32);
        p.call("right$");
    });
    assert_eq!(out, vec!["abcdef"]);
}

#[test]
fn mid_with_and_without_length() {
    let out = printed(|p| {
        p.string("basic");
        p.builder.push(2i32).push(3i32);
        p.call("mid$");
    });
    assert_eq!(out, vec!["asi"]);

    let out = printed(|p| {
        p.string("basic");
        p.builder.push(3i32).push_void();
        p.call("mid$");
    });
    assert_eq!(out, vec!["sic"]);
}

#[test]
fn mid_rejects_zero_start() {
    let console = Console::new();
    let mut p = Program::new(&console);
    p.string("basic");
    p.builder.push(0i32).push_void();
    p.call("mid$");
    let err = p.run().unwrap_err();
    assert!(matches!(err, VmError::HostFailure { method, .. } if method == "mid$"));
}

#[test]
fn str_and_val_convert() {
    let out = printed(|p| {
        p.builder.push(-42i64);
        p.call("str$");
    });
    assert_eq!(out, vec!["-42"]);

    let out = printed(|p| {
        p.string(" 3.25 apples");
        p.call("val");
    });
    assert_eq!(out, vec!["3.25"]);
}

#[test]
fn str_of_string_is_rejected() {
    let console = Console::new();
    let mut p = Program::new(&console);
    p.string("x");
    p.call("str$");
    assert!(matches!(p.run(), Err(VmError::HostFailure { .. })));
}

#[test]
fn append_updates_register_in_place() {
    let console = Console::new();
    let mut p = Program::new(&console);
    p.string("foo").store(0);
    p.builder.push_reg_ptr(0);
    p.string("bar");
    p.call("append$");
    p.builder.load(0);
    p.call("print");
    p.run().unwrap();
    assert_eq!(console.lines(), vec!["foobar"]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Numbers
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn math_commands() {
    let out = printed(|p| {
        p.builder.push(-2i32).cast(TypeCode::DFloat);
        p.call("abs");
        p.builder.push(9.0f64);
        p.call("sqrt");
        p.call("max");
        p.builder.push(1.5f64);
        p.call("min");
    });
    assert_eq!(out, vec!["1.5"]);
}

#[test]
fn sqrt_of_negative_fails() {
    let console = Console::new();
    let mut p = Program::new(&console);
    p.builder.push(-1.0f64);
    p.call("sqrt");
    assert!(matches!(p.run(), Err(VmError::HostFailure { .. })));
}

#[test]
fn math_requires_dfloat_operands() {
    let console = Console::new();
    let mut p = Program::new(&console);
    p.builder.push(4i32);
    p.call("abs");
    let err = p.run().unwrap_err();
    assert!(matches!(
        err,
        VmError::HostArgumentMismatch {
            expected: TypeCode::DFloat,
            actual: TypeCode::Int,
            ..
        }
    ));
}

#[test]
fn inc_with_default_and_explicit_step() {
    let console = Console::new();
    let mut p = Program::new(&console);
    p.builder.push(10i32).store(3);
    p.builder.push_reg_ptr(3).push_void();
    p.call("inc");
    p.builder.push_reg_ptr(3).push(5i32);
    p.call("inc");
    let vm = p.run().unwrap();
    assert_eq!(vm.register(3), TaggedValue::from_primitive(16i32));
}

#[test]
fn inc_through_heap_pointer() {
    let console = Console::new();
    let mut p = Program::new(&console);
    p.builder.push(4i32).op(OpCode::Alloc).store(0);
    p.builder.push(41i32).store_ptr(0);
    p.builder.load(0).push_void();
    p.call("inc");
    p.builder.load_ptr(0, TypeCode::Int);
    p.call("print");
    p.run().unwrap();
    assert_eq!(console.lines(), vec!["42"]);
}
