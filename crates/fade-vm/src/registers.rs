//! The register file: 256 fixed slots held as parallel payload/tag arrays.

use crate::value::TaggedValue;
use fade_types::{TypeCode, MAX_PAYLOAD};

/// Number of addressable registers. Addresses are a `u8`, so every
/// address an instruction can name is in range.
pub const REGISTER_COUNT: usize = 256;

#[derive(Debug, Clone)]
pub struct RegisterFile {
    payloads: [[u8; MAX_PAYLOAD]; REGISTER_COUNT],
    tags: [TypeCode; REGISTER_COUNT],
}

impl RegisterFile {
    /// All registers start as zero `int`.
    pub fn new() -> Self {
        Self {
            payloads: [[0; MAX_PAYLOAD]; REGISTER_COUNT],
            tags: [TypeCode::Int; REGISTER_COUNT],
        }
    }

    pub fn store(&mut self, addr: u8, value: &TaggedValue) {
        let i = usize::from(addr);
        self.payloads[i] = value.payload;
        self.tags[i] = value.tag;
    }

    pub fn load(&self, addr: u8) -> TaggedValue {
        let i = usize::from(addr);
        TaggedValue {
            tag: self.tags[i],
            payload: self.payloads[i],
        }
    }

    /// Registers whose contents differ from the initial zero `int`.
    pub fn occupied(&self) -> impl Iterator<Item = (u8, TaggedValue)> + '_ {
        (0..=u8::MAX)
            .map(|addr| (addr, self.load(addr)))
            .filter(|(_, v)| *v != TaggedValue::default())
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
