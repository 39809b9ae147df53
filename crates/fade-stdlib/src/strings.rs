//! String commands. Positions and lengths count characters, not bytes;
//! `mid$` positions are 1-based as in BASIC.

use crate::args;
use fade_types::TypeCode;
use fade_vm::{HostError, HostMethod, HostMethodTable, HostValue, VmResult};

pub(crate) fn register(table: &mut HostMethodTable) -> VmResult<()> {
    table.register(
        HostMethod::new("len", |a| Ok(HostValue::Int(args::char_count(args::string(a, 0)?)?)))
            .param(TypeCode::String)
            .returns(TypeCode::Int),
    )?;
    table.register(
        HostMethod::new("str$", |a| format_number(args::value(a, 0)?))
            .param(TypeCode::Any)
            .returns(TypeCode::String),
    )?;
    table.register(
        HostMethod::new("val", |a| {
            Ok(HostValue::DFloat(parse_leading_number(args::string(a, 0)?)))
        })
        .param(TypeCode::String)
        .returns(TypeCode::DFloat),
    )?;
    table.register(
        HostMethod::new("upper$", |a| Ok(HostValue::Str(args::string(a, 0)?.to_uppercase())))
            .param(TypeCode::String)
            .returns(TypeCode::String),
    )?;
    table.register(
        HostMethod::new("lower$", |a| Ok(HostValue::Str(args::string(a, 0)?.to_lowercase())))
            .param(TypeCode::String)
            .returns(TypeCode::String),
    )?;
    table.register(
        HostMethod::new("left$", |a| {
            let n = count(args::int(a, 1)?);
            Ok(HostValue::Str(args::string(a, 0)?.chars().take(n).collect()))
        })
        .param(TypeCode::String)
        .param(TypeCode::Int)
        .returns(TypeCode::String),
    )?;
    table.register(
        HostMethod::new("right$", |a| {
            let s = args::string(a, 0)?;
            let n = count(args::int(a, 1)?);
            let skip = s.chars().count().saturating_sub(n);
            Ok(HostValue::Str(s.chars().skip(skip).collect()))
        })
        .param(TypeCode::String)
        .param(TypeCode::Int)
        .returns(TypeCode::String),
    )?;
    table.register(
        HostMethod::new("mid$", |a| {
            let s = args::string(a, 0)?;
            let start = args::int(a, 1)?;
            if start < 1 {
                return Err(HostError::Failed(format!("mid$ start must be >= 1, got {start}")));
            }
            let len = args::int(a, 2)?;
            let rest = s.chars().skip(count(start - 1));
            let out = if len < 0 { rest.collect() } else { rest.take(count(len)).collect() };
            Ok(HostValue::Str(out))
        })
        .param(TypeCode::String)
        .param(TypeCode::Int)
        .optional(TypeCode::Int, HostValue::Int(-1))
        .returns(TypeCode::String),
    )?;
    table.register(
        HostMethod::new("append$", |a| {
            let tail = args::string(a, 1)?.to_owned();
            match args::slot(a, 0, TypeCode::String)? {
                HostValue::Str(s) => s.push_str(&tail),
                _ => {
                    return Err(HostError::BadArgument {
                        index: 0,
                        expected: TypeCode::String,
                    })
                }
            }
            Ok(HostValue::Void)
        })
        .by_ref(TypeCode::String)
        .param(TypeCode::String),
    )?;
    Ok(())
}

/// Negative counts clamp to zero.
fn count(n: i32) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn format_number(value: &HostValue) -> Result<HostValue, HostError> {
    if !value.type_code().is_numeric() {
        return Err(HostError::BadArgument {
            index: 0,
            expected: TypeCode::DFloat,
        });
    }
    Ok(HostValue::Str(value.to_string()))
}

/// BASIC `VAL`: the longest numeric prefix after leading whitespace, or 0.
fn parse_leading_number(s: &str) -> f64 {
    let s = s.trim_start();
    s.char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .rev()
        .find_map(|end| s[..end].parse::<f64>().ok().filter(|v| v.is_finite()))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn val_reads_numeric_prefix() {
        assert_eq!(parse_leading_number("42"), 42.0);
        assert_eq!(parse_leading_number("  -1.5xyz"), -1.5);
        assert_eq!(parse_leading_number("3e2 apples"), 300.0);
        assert_eq!(parse_leading_number("abc"), 0.0);
        assert_eq!(parse_leading_number(""), 0.0);
    }

    #[test]
    fn str_rejects_non_numbers() {
        assert_eq!(
            format_number(&HostValue::Str("x".into())),
            Err(HostError::BadArgument {
                index: 0,
                expected: TypeCode::DFloat
            })
        );
        assert_eq!(format_number(&HostValue::Byte(7)), Ok(HostValue::Str("7".into())));
    }

    #[test]
    fn negative_counts_clamp() {
        assert_eq!(count(-3), 0);
        assert_eq!(count(4), 4);
    }
}
