//! Bytecode encoder.
//!
//! The compiler front end (out of tree) lowers a checked program through
//! this builder; tests use it to write programs by hand. Labels let jumps
//! be emitted before their target is known; targets are patched in
//! [`BytecodeBuilder::finish`].

use crate::codec::{encode_string, Primitive, CHAR_WIDTH};
use crate::error::BuildError;
use crate::opcode::OpCode;
use crate::type_code::TypeCode;

/// A jump target handed out by [`BytecodeBuilder::new_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug, Default)]
pub struct BytecodeBuilder {
    code: Vec<u8>,
    labels: Vec<Option<usize>>,
    /// (offset of the int literal payload, label it must point at)
    fixups: Vec<(usize, Label)>,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next emitted byte will have.
    pub fn position(&self) -> usize {
        self.code.len()
    }

    pub fn op(&mut self, op: OpCode) -> &mut Self {
        self.code.push(op.byte());
        self
    }

    // ── Literals ─────────────────────────────────────────────────────────

    /// `PUSH <tag> <payload>` for any fixed-width native value.
    pub fn push<P: Primitive>(&mut self, value: P) -> &mut Self {
        let payload = value.to_payload();
        self.push_tagged(P::TYPE, &payload[..P::TYPE.size()])
    }

    /// `PUSH <tag> <payload>` with an explicit tag, e.g. a `struct`
    /// pointer literal. `payload` must be `width(tag)` bytes.
    pub fn push_tagged(&mut self, tag: TypeCode, payload: &[u8]) -> &mut Self {
        self.op(OpCode::Push);
        self.code.push(tag.byte());
        self.code.extend_from_slice(payload);
        self
    }

    /// Pushes `void`, the marker for an omitted optional argument.
    pub fn push_void(&mut self) -> &mut Self {
        self.push_tagged(TypeCode::Void, &[])
    }

    pub fn push_span(&mut self, bytes: &[u8]) -> Result<&mut Self, BuildError> {
        let len = u32::try_from(bytes.len()).map_err(|_| BuildError::SpanTooLong(bytes.len()))?;
        self.op(OpCode::PushSpan);
        self.code.extend_from_slice(&len.to_le_bytes());
        self.code.extend_from_slice(bytes);
        Ok(self)
    }

    pub fn push_type(&mut self, tag: TypeCode) -> &mut Self {
        self.op(OpCode::PushType);
        self.code.push(tag.byte());
        self
    }

    pub fn push_reg_ptr(&mut self, reg: u8) -> &mut Self {
        self.op(OpCode::PushRegPtr);
        self.code.push(reg);
        self
    }

    /// Materialises a string literal on the heap and leaves its
    /// `string`-tagged pointer on the stack. `scratch` is clobbered.
    pub fn push_string(&mut self, text: &str, scratch: u8) -> Result<&mut Self, BuildError> {
        let bytes = encode_string(text);
        let size = i32::try_from(text.chars().count() * CHAR_WIDTH)
            .map_err(|_| BuildError::SpanTooLong(bytes.len()))?;
        self.push_span(&bytes)?;
        self.push(size).op(OpCode::Alloc).store(scratch);
        self.push(size).load(scratch).op(OpCode::Write);
        self.load(scratch).cast(TypeCode::String);
        Ok(self)
    }

    // ── Registers, casts, heap ───────────────────────────────────────────

    pub fn store(&mut self, reg: u8) -> &mut Self {
        self.op(OpCode::Store);
        self.code.push(reg);
        self
    }

    pub fn load(&mut self, reg: u8) -> &mut Self {
        self.op(OpCode::Load);
        self.code.push(reg);
        self
    }

    pub fn store_ptr(&mut self, reg: u8) -> &mut Self {
        self.op(OpCode::StorePtr);
        self.code.push(reg);
        self
    }

    pub fn load_ptr(&mut self, reg: u8, tag: TypeCode) -> &mut Self {
        self.op(OpCode::LoadPtr);
        self.code.push(reg);
        self.code.push(tag.byte());
        self
    }

    pub fn cast(&mut self, tag: TypeCode) -> &mut Self {
        self.op(OpCode::Cast);
        self.code.push(tag.byte());
        self
    }

    /// `PUSH int <addr>; CALL_HOST`
    pub fn call_host(&mut self, address: i32) -> &mut Self {
        self.push(address).op(OpCode::CallHost)
    }

    // ── Control flow ─────────────────────────────────────────────────────

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the current position.
    pub fn place(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.code.len());
        self
    }

    fn push_target(&mut self, label: Label) {
        self.op(OpCode::Push);
        self.code.push(TypeCode::Int.byte());
        self.fixups.push((self.code.len(), label));
        self.code.extend_from_slice(&[0; 4]);
    }

    pub fn jump(&mut self, label: Label) -> &mut Self {
        self.push_target(label);
        self.op(OpCode::Jump)
    }

    /// Jumps if the condition already on the stack is zero.
    pub fn jump_zero(&mut self, label: Label) -> &mut Self {
        self.push_target(label);
        self.op(OpCode::JumpZero)
    }

    /// Jumps if the condition already on the stack is greater than zero.
    pub fn jump_gt_zero(&mut self, label: Label) -> &mut Self {
        self.push_target(label);
        self.op(OpCode::JumpGtZero)
    }

    /// `GOSUB label`
    pub fn gosub(&mut self, label: Label) -> &mut Self {
        self.push_target(label);
        self.op(OpCode::JumpHistory)
    }

    /// Patches label targets and returns the program bytes.
    pub fn finish(mut self) -> Result<Vec<u8>, BuildError> {
        for (offset, label) in std::mem::take(&mut self.fixups) {
            let target = self.labels[label.0].ok_or(BuildError::UnplacedLabel(label.0))?;
            let target = i32::try_from(target).map_err(|_| BuildError::TargetOutOfRange(target))?;
            self.code[offset..offset + 4].copy_from_slice(&target.to_le_bytes());
        }
        Ok(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_encodes_tag_then_little_endian_payload() {
        let mut b = BytecodeBuilder::new();
        b.push(258i32);
        let code = b.finish().unwrap();
        assert_eq!(code, vec![OpCode::Push.byte(), TypeCode::Int.byte(), 2, 1, 0, 0]);
    }

    #[test]
    fn forward_label_is_patched() {
        let mut b = BytecodeBuilder::new();
        let end = b.new_label();
        b.jump(end);
        b.push(1i32);
        b.place(end);
        let target = b.position();
        let code = b.finish().unwrap();
        assert_eq!(&code[2..6], &(target as i32).to_le_bytes());
        assert_eq!(code[6], OpCode::Jump.byte());
    }

    #[test]
    fn unplaced_label_is_an_error() {
        let mut b = BytecodeBuilder::new();
        let nowhere = b.new_label();
        b.jump(nowhere);
        assert_eq!(b.finish(), Err(BuildError::UnplacedLabel(0)));
    }

    #[test]
    fn span_carries_length_prefix() {
        let mut b = BytecodeBuilder::new();
        b.push_span(&[9, 8, 7]).unwrap();
        let code = b.finish().unwrap();
        assert_eq!(code, vec![OpCode::PushSpan.byte(), 3, 0, 0, 0, 9, 8, 7]);
    }
}
