//! Numeric commands. `abs`, `sqrt`, `max` and `min` work in `dfloat`;
//! callers cast narrower operands first. `inc` updates an `int` in place.

use crate::args;
use fade_types::TypeCode;
use fade_vm::{HostError, HostMethod, HostMethodTable, HostValue, VmResult};

pub(crate) fn register(table: &mut HostMethodTable) -> VmResult<()> {
    table.register(
        HostMethod::new("abs", |a| Ok(HostValue::DFloat(args::dfloat(a, 0)?.abs())))
            .param(TypeCode::DFloat)
            .returns(TypeCode::DFloat),
    )?;
    table.register(
        HostMethod::new("sqrt", |a| {
            let x = args::dfloat(a, 0)?;
            if x < 0.0 {
                return Err(HostError::Failed(format!("sqrt of negative number {x}")));
            }
            Ok(HostValue::DFloat(x.sqrt()))
        })
        .param(TypeCode::DFloat)
        .returns(TypeCode::DFloat),
    )?;
    table.register(
        HostMethod::new("max", |a| {
            let (x, y) = (args::dfloat(a, 0)?, args::dfloat(a, 1)?);
            Ok(HostValue::DFloat(x.max(y)))
        })
        .param(TypeCode::DFloat)
        .param(TypeCode::DFloat)
        .returns(TypeCode::DFloat),
    )?;
    table.register(
        HostMethod::new("min", |a| {
            let (x, y) = (args::dfloat(a, 0)?, args::dfloat(a, 1)?);
            Ok(HostValue::DFloat(x.min(y)))
        })
        .param(TypeCode::DFloat)
        .param(TypeCode::DFloat)
        .returns(TypeCode::DFloat),
    )?;
    table.register(
        HostMethod::new("inc", |a| {
            let value = args::int(a, 0)?;
            let step = args::int(a, 1)?;
            *args::slot(a, 0, TypeCode::Int)? = HostValue::Int(value.wrapping_add(step));
            Ok(HostValue::Void)
        })
        .by_ref(TypeCode::Int)
        .optional(TypeCode::Int, HostValue::Int(1)),
    )?;
    Ok(())
}
