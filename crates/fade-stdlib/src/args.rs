//! Argument accessors shared by the command implementations.
//!
//! The marshaller has already checked tags against each signature, so a
//! mismatch here means a command was registered with the wrong signature.

use fade_types::TypeCode;
use fade_vm::{HostError, HostValue};

/// The argument at `index` as passed, for `any` parameters.
pub(crate) fn value(args: &[HostValue], index: usize) -> Result<&HostValue, HostError> {
    args.get(index).ok_or(HostError::BadArgument {
        index,
        expected: TypeCode::Any,
    })
}

/// Writable slot for a by-reference argument.
pub(crate) fn slot(
    args: &mut [HostValue],
    index: usize,
    expected: TypeCode,
) -> Result<&mut HostValue, HostError> {
    args.get_mut(index).ok_or(HostError::BadArgument { index, expected })
}

pub(crate) fn int(args: &[HostValue], index: usize) -> Result<i32, HostError> {
    args.get(index)
        .and_then(HostValue::as_int)
        .ok_or(HostError::BadArgument {
            index,
            expected: TypeCode::Int,
        })
}

pub(crate) fn dfloat(args: &[HostValue], index: usize) -> Result<f64, HostError> {
    args.get(index)
        .and_then(HostValue::as_dfloat)
        .ok_or(HostError::BadArgument {
            index,
            expected: TypeCode::DFloat,
        })
}

pub(crate) fn string(args: &[HostValue], index: usize) -> Result<&str, HostError> {
    args.get(index)
        .and_then(HostValue::as_str)
        .ok_or(HostError::BadArgument {
            index,
            expected: TypeCode::String,
        })
}

/// Character count as a BASIC `int`.
pub(crate) fn char_count(s: &str) -> Result<i32, HostError> {
    i32::try_from(s.chars().count()).map_err(|_| HostError::Failed("string too long".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_arguments_are_bad_arguments() {
        let mut none: Vec<HostValue> = Vec::new();
        assert_eq!(
            value(&none, 0),
            Err(HostError::BadArgument {
                index: 0,
                expected: TypeCode::Any
            })
        );
        assert_eq!(
            slot(&mut none, 0, TypeCode::Int),
            Err(HostError::BadArgument {
                index: 0,
                expected: TypeCode::Int
            })
        );
        assert!(string(&none, 1).is_err());
    }

    #[test]
    fn slot_writes_through() {
        let mut args = vec![HostValue::Int(1)];
        *slot(&mut args, 0, TypeCode::Int).unwrap() = HostValue::Int(2);
        assert_eq!(args, vec![HostValue::Int(2)]);
        assert_eq!(int(&args, 0), Ok(2));
        assert_eq!(
            dfloat(&args, 0),
            Err(HostError::BadArgument {
                index: 0,
                expected: TypeCode::DFloat
            })
        );
    }
}
