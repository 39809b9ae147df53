//! Byte-level encoding shared by the bytecode producer and the VM.
//!
//! All multi-byte payloads (literals after `PUSH <tag>`, register and heap
//! contents, span lengths) are **little-endian**. Strings are stored one
//! fixed-width slot per character: [`CHAR_WIDTH`] bytes holding the
//! character's Unicode scalar value, little-endian.

use crate::type_code::{TypeCode, MAX_PAYLOAD};

/// Bytes per string character.
pub const CHAR_WIDTH: usize = 4;

/// A native type with a fixed-width payload encoding.
pub trait Primitive: Copy {
    /// Tag this native type is stored under.
    const TYPE: TypeCode;

    /// Little-endian payload, zero-padded to [`MAX_PAYLOAD`].
    fn to_payload(self) -> [u8; MAX_PAYLOAD];

    /// Decodes a little-endian payload. Missing trailing bytes read as zero.
    fn from_payload(bytes: &[u8]) -> Self;
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    let n = bytes.len().min(N);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

macro_rules! impl_primitive {
    ($($ty:ty => $code:ident),* $(,)?) => {
        $(
            impl Primitive for $ty {
                const TYPE: TypeCode = TypeCode::$code;

                fn to_payload(self) -> [u8; MAX_PAYLOAD] {
                    le_array(&self.to_le_bytes())
                }

                fn from_payload(bytes: &[u8]) -> Self {
                    <$ty>::from_le_bytes(le_array(bytes))
                }
            }
        )*
    };
}

impl_primitive! {
    i32 => Int,
    f32 => Real,
    u8 => Byte,
    u16 => Word,
    u32 => DWord,
    i64 => DInt,
    f64 => DFloat,
}

impl Primitive for bool {
    const TYPE: TypeCode = TypeCode::Bool;

    fn to_payload(self) -> [u8; MAX_PAYLOAD] {
        le_array(&[u8::from(self)])
    }

    fn from_payload(bytes: &[u8]) -> Self {
        bytes.first().is_some_and(|b| *b != 0)
    }
}

/// Encodes `text` as fixed-width character slots.
pub fn encode_string(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.chars().count() * CHAR_WIDTH);
    for ch in text.chars() {
        out.extend_from_slice(&u32::from(ch).to_le_bytes());
    }
    out
}

/// Decodes fixed-width character slots. Returns `None` if a slot is not a
/// Unicode scalar value.
pub fn decode_string(bytes: &[u8]) -> Option<String> {
    bytes
        .chunks(CHAR_WIDTH)
        .map(|slot| char::from_u32(u32::from_payload(slot)))
        .collect()
}
