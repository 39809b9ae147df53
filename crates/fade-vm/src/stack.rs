//! The operand stack: a flat byte buffer of tagged cells.
//!
//! A cell is written payload-first, tag-last, so popping reads the tag and
//! then knows how many payload bytes sit below it. Raw untagged spans can
//! be pushed too (`PUSH_SPAN`, `READ`); the instruction stream is
//! responsible for closing them into cells or consuming them again.

use crate::value::TaggedValue;
use fade_types::{TypeCode, VmError, VmResult};

#[derive(Debug, Clone)]
pub struct OperandStack {
    buffer: Vec<u8>,
    cursor: usize,
}

impl OperandStack {
    /// Creates a stack pre-sized to `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity],
            cursor: 0,
        }
    }

    /// Bytes currently on the stack.
    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// The live bytes, bottom first.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.cursor]
    }

    /// Appends raw bytes.
    pub fn push_raw(&mut self, bytes: &[u8]) {
        let end = self.cursor + bytes.len();
        if end > self.buffer.len() {
            let grown = end.max(self.buffer.len() * 2);
            self.buffer.resize(grown, 0);
        }
        self.buffer[self.cursor..end].copy_from_slice(bytes);
        self.cursor = end;
    }

    /// Appends `payload` then `tag`.
    pub fn push(&mut self, payload: &[u8], tag: TypeCode) {
        self.push_raw(payload);
        self.push_raw(&[tag.byte()]);
    }

    pub fn push_value(&mut self, value: &TaggedValue) {
        self.push(value.bytes(), value.tag);
    }

    /// Removes `size` bytes and returns them.
    pub fn pop_span(&mut self, size: usize) -> VmResult<&[u8]> {
        if size > self.cursor {
            return Err(VmError::StackUnderflow {
                needed: size,
                available: self.cursor,
            });
        }
        self.cursor -= size;
        Ok(&self.buffer[self.cursor..self.cursor + size])
    }

    /// Removes and returns the trailing tag byte.
    pub fn pop_tag(&mut self) -> VmResult<TypeCode> {
        let byte = self.pop_span(1)?[0];
        TypeCode::from_byte(byte).ok_or(VmError::InvalidTypeCode(byte))
    }

    /// Inspects the trailing tag byte without removing it.
    pub fn peek_tag(&self) -> VmResult<TypeCode> {
        let byte = self
            .cursor
            .checked_sub(1)
            .map(|i| self.buffer[i])
            .ok_or(VmError::StackUnderflow {
                needed: 1,
                available: 0,
            })?;
        TypeCode::from_byte(byte).ok_or(VmError::InvalidTypeCode(byte))
    }

    /// Pops a whole cell: tag first, then its payload.
    pub fn pop_value(&mut self) -> VmResult<TaggedValue> {
        let tag = self.pop_tag()?;
        let payload = self.pop_span(tag.size())?;
        Ok(TaggedValue::new(tag, payload))
    }

    /// Copies the top cell without removing it.
    pub fn peek_value(&self) -> VmResult<TaggedValue> {
        let tag = self.peek_tag()?;
        let size = tag.size();
        let end = self.cursor - 1;
        let start = end.checked_sub(size).ok_or(VmError::StackUnderflow {
            needed: size + 1,
            available: self.cursor,
        })?;
        Ok(TaggedValue::new(tag, &self.buffer[start..end]))
    }
}
