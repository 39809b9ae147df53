//! Type & arithmetic engine: casts, promotion, operators over raw payloads.
//!
//! Binary operators promote mismatched operands to the wider tag (see
//! [`TypeCode::promote`]) and then reinterpret both payloads as the native
//! type for that tag. Integer arithmetic wraps; integer division or modulo
//! by zero is [`VmError::DivideByZero`]. Float equality is tolerant to
//! machine epsilon.

use crate::heap::Heap;
use crate::value::TaggedValue;
use fade_types::{Primitive, TypeCode, VmError, VmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "mod",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Eq => "=",
            CompareOp::Neq => "<>",
        }
    }

    fn is_equality(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Neq)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Native numeric behaviour
// ══════════════════════════════════════════════════════════════════════════════

trait Numeric: Primitive + PartialOrd {
    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;
    fn div(self, rhs: Self) -> Option<Self>;
    fn rem(self, rhs: Self) -> Option<Self>;
    fn neg(self) -> Self;
    fn approx_eq(self, rhs: Self) -> bool;
    fn is_positive(self) -> bool;
}

macro_rules! impl_int_numeric {
    ($($ty:ty),*) => {
        $(
            impl Numeric for $ty {
                fn add(self, rhs: Self) -> Self { self.wrapping_add(rhs) }
                fn sub(self, rhs: Self) -> Self { self.wrapping_sub(rhs) }
                fn mul(self, rhs: Self) -> Self { self.wrapping_mul(rhs) }
                fn div(self, rhs: Self) -> Option<Self> {
                    (rhs != 0).then(|| self.wrapping_div(rhs))
                }
                fn rem(self, rhs: Self) -> Option<Self> {
                    (rhs != 0).then(|| self.wrapping_rem(rhs))
                }
                fn neg(self) -> Self {
                    let zero: $ty = 0;
                    zero.wrapping_sub(self)
                }
                fn approx_eq(self, rhs: Self) -> bool { self == rhs }
                fn is_positive(self) -> bool { self > 0 }
            }
        )*
    };
}

macro_rules! impl_float_numeric {
    ($($ty:ty),*) => {
        $(
            impl Numeric for $ty {
                fn add(self, rhs: Self) -> Self { self + rhs }
                fn sub(self, rhs: Self) -> Self { self - rhs }
                fn mul(self, rhs: Self) -> Self { self * rhs }
                fn div(self, rhs: Self) -> Option<Self> { Some(self / rhs) }
                fn rem(self, rhs: Self) -> Option<Self> { Some(self % rhs) }
                fn neg(self) -> Self { -self }
                fn approx_eq(self, rhs: Self) -> bool { (self - rhs).abs() < <$ty>::EPSILON }
                fn is_positive(self) -> bool { self > 0.0 }
            }
        )*
    };
}

impl_int_numeric!(i32, u8, u16, u32, i64);
impl_float_numeric!(f32, f64);

/// Calls `$func::<T>(args)` with `T` the native type for an arithmetic tag,
/// or evaluates to `None` for tags without arithmetic.
macro_rules! dispatch_numeric {
    ($tag:expr, $func:ident($($arg:expr),*)) => {
        match $tag {
            TypeCode::Int => Some($func::<i32>($($arg),*)),
            TypeCode::Byte => Some($func::<u8>($($arg),*)),
            TypeCode::Word => Some($func::<u16>($($arg),*)),
            TypeCode::DWord => Some($func::<u32>($($arg),*)),
            TypeCode::DInt => Some($func::<i64>($($arg),*)),
            TypeCode::Real => Some($func::<f32>($($arg),*)),
            TypeCode::DFloat => Some($func::<f64>($($arg),*)),
            _ => None,
        }
    };
}

fn arith_as<T: Numeric>(
    op: BinaryOp,
    lhs: &TaggedValue,
    rhs: &TaggedValue,
) -> VmResult<TaggedValue> {
    let (a, b): (T, T) = (lhs.get(), rhs.get());
    let out = match op {
        BinaryOp::Add => a.add(b),
        BinaryOp::Sub => a.sub(b),
        BinaryOp::Mul => a.mul(b),
        BinaryOp::Div => a.div(b).ok_or(VmError::DivideByZero)?,
        BinaryOp::Mod => a.rem(b).ok_or(VmError::DivideByZero)?,
    };
    Ok(TaggedValue::from_primitive(out))
}

fn compare_as<T: Numeric>(op: CompareOp, lhs: &TaggedValue, rhs: &TaggedValue) -> bool {
    let (a, b): (T, T) = (lhs.get(), rhs.get());
    match op {
        CompareOp::Gt => a > b,
        CompareOp::Gte => a > b || a.approx_eq(b),
        CompareOp::Lt => a < b,
        CompareOp::Lte => a < b || a.approx_eq(b),
        CompareOp::Eq => a.approx_eq(b),
        CompareOp::Neq => !a.approx_eq(b),
    }
}

fn negate_as<T: Numeric>(value: &TaggedValue) -> TaggedValue {
    TaggedValue::from_primitive(value.get::<T>().neg())
}

fn positive_as<T: Numeric>(value: &TaggedValue) -> bool {
    value.get::<T>().is_positive()
}

// ══════════════════════════════════════════════════════════════════════════════
// Casts
// ══════════════════════════════════════════════════════════════════════════════

enum Scalar {
    Int(i64),
    Float(f64),
}

fn scalar(value: &TaggedValue) -> Scalar {
    match value.tag {
        TypeCode::Real => Scalar::Float(f64::from(value.get::<f32>())),
        TypeCode::DFloat => Scalar::Float(value.get::<f64>()),
        TypeCode::Bool => Scalar::Int(i64::from(value.get::<bool>())),
        TypeCode::Byte => Scalar::Int(i64::from(value.get::<u8>())),
        TypeCode::Word => Scalar::Int(i64::from(value.get::<u16>())),
        TypeCode::DWord => Scalar::Int(i64::from(value.get::<u32>())),
        TypeCode::DInt => Scalar::Int(value.get::<i64>()),
        _ => Scalar::Int(i64::from(value.get::<i32>())),
    }
}

/// Numeric conversion between two numeric tags. Integer narrowing keeps
/// the low-order bytes; float to integer truncates toward zero.
fn convert(value: &TaggedValue, to: TypeCode) -> TaggedValue {
    let s = scalar(value);
    match to {
        TypeCode::Real => TaggedValue::from_primitive(match s {
            Scalar::Int(i) => i as f32,
            Scalar::Float(f) => f as f32,
        }),
        TypeCode::DFloat => TaggedValue::from_primitive(match s {
            Scalar::Int(i) => i as f64,
            Scalar::Float(f) => f,
        }),
        TypeCode::Bool => TaggedValue::from_primitive(match s {
            Scalar::Int(i) => i != 0,
            Scalar::Float(f) => f != 0.0,
        }),
        _ => {
            let i = match s {
                Scalar::Int(i) => i,
                Scalar::Float(f) => f as i64,
            };
            match to {
                TypeCode::Byte => TaggedValue::from_primitive(i as u8),
                TypeCode::Word => TaggedValue::from_primitive(i as u16),
                TypeCode::DWord => TaggedValue::from_primitive(i as u32),
                TypeCode::DInt => TaggedValue::from_primitive(i),
                _ => TaggedValue::from_primitive(i as i32),
            }
        }
    }
}

/// Casts `value` to `to`.
///
/// Supported: identity; bit-identical retagging among `int`, `string`,
/// `struct` and `ptr_heap`; numeric conversion between any two numeric
/// tags. Everything else is [`VmError::UnsupportedCast`].
pub fn cast(value: TaggedValue, to: TypeCode) -> VmResult<TaggedValue> {
    let from = value.tag;
    if from == to {
        return Ok(value);
    }
    if from.is_pointer_like() && to.is_pointer_like() {
        return Ok(TaggedValue::new(to, value.bytes()));
    }
    if from.is_numeric() && to.is_numeric() {
        return Ok(convert(&value, to));
    }
    Err(VmError::UnsupportedCast { from, to })
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

/// Applies an arithmetic operator. `lhs` is the deeper stack operand, `rhs`
/// the top one. `string + string` concatenates on the heap.
///
/// `bool` only takes part through promotion: `bool op int` computes in
/// `int`, but `bool op bool` has no arithmetic tag and is
/// [`VmError::UnsupportedOperation`].
pub fn binary(
    op: BinaryOp,
    lhs: TaggedValue,
    rhs: TaggedValue,
    heap: &mut Heap,
) -> VmResult<TaggedValue> {
    if op == BinaryOp::Add && lhs.tag == TypeCode::String && rhs.tag == TypeCode::String {
        return concat(&lhs, &rhs, heap);
    }
    let unsupported = || VmError::UnsupportedOperation {
        op: op.symbol(),
        lhs: lhs.tag,
        rhs: rhs.tag,
    };
    let common = lhs.tag.promote(rhs.tag).ok_or_else(unsupported)?;
    let (a, b) = (cast(lhs, common)?, cast(rhs, common)?);
    dispatch_numeric!(common, arith_as(op, &a, &b)).unwrap_or_else(|| Err(unsupported()))
}

/// New string holding rhs's characters followed by lhs's.
///
/// The rhs-first order is relied on by existing programs and is kept as is.
fn concat(lhs: &TaggedValue, rhs: &TaggedValue, heap: &mut Heap) -> VmResult<TaggedValue> {
    let (lptr, rptr) = (lhs.expect_pointer()?, rhs.expect_pointer()?);
    let (llen, rlen) = (heap.allocation_size(lptr)?, heap.allocation_size(rptr)?);
    let ptr = heap.allocate(llen + rlen);
    heap.copy(rptr, ptr, rlen)?;
    heap.copy(lptr, ptr + rlen, llen)?;
    TaggedValue::heap_pointer(TypeCode::String, ptr)
}

/// Applies a comparison. Strings compare by content for `=`/`<>`; other
/// non-numeric tags only support `=`/`<>` against the same tag, by payload.
pub fn compare(op: CompareOp, lhs: TaggedValue, rhs: TaggedValue, heap: &Heap) -> VmResult<bool> {
    let unsupported = || VmError::UnsupportedOperation {
        op: op.symbol(),
        lhs: lhs.tag,
        rhs: rhs.tag,
    };
    let common = lhs.tag.promote(rhs.tag).ok_or_else(unsupported)?;

    if common == TypeCode::String && op.is_equality() {
        let equal = string_bytes(&lhs, heap)? == string_bytes(&rhs, heap)?;
        return Ok(equal == (op == CompareOp::Eq));
    }
    if common == TypeCode::Bool {
        let (a, b) = (truth(&lhs), truth(&rhs));
        return Ok(compare_as::<u8>(op, &a, &b));
    }

    let (a, b) = (cast(lhs, common)?, cast(rhs, common)?);
    match dispatch_numeric!(common, compare_as(op, &a, &b)) {
        Some(result) => Ok(result),
        None if op.is_equality() => Ok((a.bytes() == b.bytes()) == (op == CompareOp::Eq)),
        None => Err(unsupported()),
    }
}

/// A bool cell normalised to payload 0 or 1.
fn truth(value: &TaggedValue) -> TaggedValue {
    TaggedValue::from_primitive(!value.is_zero())
}

fn string_bytes<'h>(value: &TaggedValue, heap: &'h Heap) -> VmResult<&'h [u8]> {
    let ptr = value.expect_pointer()?;
    heap.read(ptr, heap.allocation_size(ptr)?)
}

/// Arithmetic negation, keeping the operand's tag.
pub fn negate(value: TaggedValue) -> VmResult<TaggedValue> {
    dispatch_numeric!(value.tag, negate_as(&value)).ok_or(VmError::UnsupportedOperation {
        op: "-",
        lhs: value.tag,
        rhs: value.tag,
    })
}

/// True when a numeric value is strictly greater than zero.
pub fn is_positive(value: &TaggedValue) -> VmResult<bool> {
    if value.tag == TypeCode::Bool {
        return Ok(!value.is_zero());
    }
    dispatch_numeric!(value.tag, positive_as(value)).ok_or(VmError::TypeMismatch {
        expected: TypeCode::Int,
        actual: value.tag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v<P: Primitive>(x: P) -> TaggedValue {
        TaggedValue::from_primitive(x)
    }

    fn add(a: TaggedValue, b: TaggedValue) -> TaggedValue {
        binary(BinaryOp::Add, a, b, &mut Heap::new(16)).unwrap()
    }

    // ── Casts ────────────────────────────────────────────────────────────

    #[test]
    fn narrowing_keeps_low_order_bytes() {
        let b = cast(v(300i32), TypeCode::Byte).unwrap();
        assert_eq!(b.get::<u8>(), 44);
        let w = cast(v(0x0001_2345i32), TypeCode::Word).unwrap();
        assert_eq!(w.get::<u16>(), 0x2345);
        let i = cast(v(0x1_0000_0007i64), TypeCode::Int).unwrap();
        assert_eq!(i.get::<i32>(), 7);
    }

    #[test]
    fn widening_round_trips() {
        for x in [0u8, 1, 127, 128, 255] {
            let up = cast(v(x), TypeCode::Int).unwrap();
            assert_eq!(up.get::<i32>(), i32::from(x));
            assert_eq!(cast(up, TypeCode::Byte).unwrap(), v(x));
        }
        let w = cast(v(65_535u16), TypeCode::DInt).unwrap();
        assert_eq!(cast(w, TypeCode::Word).unwrap(), v(65_535u16));
    }

    #[test]
    fn int_real_round_trip_is_exact_up_to_two_pow_24() {
        for x in [0i32, 1, -1, 123_456, 16_777_216, -16_777_216] {
            let r = cast(v(x), TypeCode::Real).unwrap();
            assert_eq!(cast(r, TypeCode::Int).unwrap(), v(x), "{x}");
        }
        // 2^24 + 1 has no f32 representation and rounds to 2^24.
        let r = cast(v(16_777_217i32), TypeCode::Real).unwrap();
        assert_eq!(cast(r, TypeCode::Int).unwrap().get::<i32>(), 16_777_216);
    }

    #[test]
    fn real_to_int_truncates_toward_zero() {
        assert_eq!(cast(v(3.9f32), TypeCode::Int).unwrap().get::<i32>(), 3);
        assert_eq!(cast(v(-3.9f32), TypeCode::Int).unwrap().get::<i32>(), -3);
        assert_eq!(cast(v(2.5f64), TypeCode::Real).unwrap().get::<f32>(), 2.5);
    }

    #[test]
    fn pointer_like_casts_are_bit_identical() {
        let s = TaggedValue::pointer(TypeCode::String, 40);
        let i = cast(s, TypeCode::Int).unwrap();
        assert_eq!(i.get::<i32>(), 40);
        let p = cast(i, TypeCode::PtrHeap).unwrap();
        assert_eq!(p.tag, TypeCode::PtrHeap);
        assert_eq!(p.bytes(), s.bytes());
        assert_eq!(cast(p, TypeCode::Struct).unwrap().bytes(), s.bytes());
    }

    #[test]
    fn unsupported_cast_is_fatal() {
        let s = TaggedValue::pointer(TypeCode::String, 0);
        assert_eq!(
            cast(s, TypeCode::Real),
            Err(VmError::UnsupportedCast {
                from: TypeCode::String,
                to: TypeCode::Real
            })
        );
        assert!(cast(TaggedValue::void(), TypeCode::Int).is_err());
        assert!(cast(TaggedValue::register_ref(1), TypeCode::Int).is_err());
    }

    #[test]
    fn bool_casts_normalise() {
        assert_eq!(cast(v(7i32), TypeCode::Bool).unwrap(), v(true));
        assert_eq!(cast(v(0.0f64), TypeCode::Bool).unwrap(), v(false));
        assert_eq!(cast(v(true), TypeCode::DFloat).unwrap(), v(1.0f64));
    }

    // ── Arithmetic ───────────────────────────────────────────────────────

    #[test]
    fn mixed_operands_promote_to_wider_tag() {
        let r = add(v(2u8), v(3i32));
        assert_eq!(r, v(5i32));
        let r = add(v(2i32), v(0.5f32));
        assert_eq!(r, v(2.5f32));
        let r = add(v(1.5f32), v(10i64));
        assert_eq!(r.tag, TypeCode::DInt);
        assert_eq!(r.get::<i64>(), 11);
    }

    #[test]
    fn addition_commutes_across_numeric_tags() {
        let samples = [v(true), v(7u8), v(300u16), v(-5i32), v(9u32), v(1.25f32), v(-40i64), v(0.5f64)];
        for a in samples {
            for b in samples {
                if a.tag == TypeCode::Bool && b.tag == TypeCode::Bool {
                    // covered by bool_with_bool_has_no_arithmetic
                    continue;
                }
                assert_eq!(add(a, b), add(b, a), "{} + {}", a.tag, b.tag);
            }
        }
    }

    #[test]
    fn bool_with_bool_has_no_arithmetic() {
        let mut heap = Heap::new(4);
        for op in [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div, BinaryOp::Mod] {
            assert_eq!(
                binary(op, v(true), v(false), &mut heap),
                Err(VmError::UnsupportedOperation {
                    op: op.symbol(),
                    lhs: TypeCode::Bool,
                    rhs: TypeCode::Bool,
                })
            );
        }
        assert_eq!(add(v(true), v(2i32)), v(3i32));
    }

    #[test]
    fn non_canonical_bool_compares_by_truth() {
        let heap = Heap::new(4);
        let odd = TaggedValue::new(TypeCode::Bool, &[2]);
        assert!(compare(CompareOp::Eq, odd, v(true), &heap).unwrap());
        assert!(!compare(CompareOp::Neq, odd, v(true), &heap).unwrap());
        assert!(compare(CompareOp::Gt, odd, v(false), &heap).unwrap());
    }

    #[test]
    fn operand_order_matters_for_sub_and_div() {
        let mut heap = Heap::new(4);
        assert_eq!(binary(BinaryOp::Sub, v(10i32), v(3i32), &mut heap).unwrap(), v(7i32));
        assert_eq!(binary(BinaryOp::Div, v(10i32), v(3i32), &mut heap).unwrap(), v(3i32));
        assert_eq!(binary(BinaryOp::Mod, v(10i32), v(3i32), &mut heap).unwrap(), v(1i32));
        assert_eq!(binary(BinaryOp::Div, v(1.0f64), v(4.0f64), &mut heap).unwrap(), v(0.25f64));
    }

    #[test]
    fn integer_arithmetic_wraps() {
        assert_eq!(add(v(250u8), v(10u8)), v(4u8));
        assert_eq!(add(v(i32::MAX), v(1i32)), v(i32::MIN));
    }

    #[test]
    fn integer_division_by_zero_is_an_error() {
        let mut heap = Heap::new(4);
        assert_eq!(
            binary(BinaryOp::Div, v(1i32), v(0i32), &mut heap),
            Err(VmError::DivideByZero)
        );
        assert_eq!(
            binary(BinaryOp::Mod, v(1i64), v(0u8), &mut heap),
            Err(VmError::DivideByZero)
        );
        let inf = binary(BinaryOp::Div, v(1.0f32), v(0.0f32), &mut heap).unwrap();
        assert!(inf.get::<f32>().is_infinite());
    }

    #[test]
    fn mixing_string_and_number_is_rejected() {
        let mut heap = Heap::new(4);
        let s = TaggedValue::pointer(TypeCode::String, 0);
        assert!(matches!(
            binary(BinaryOp::Add, s, v(1i32), &mut heap),
            Err(VmError::UnsupportedOperation { op: "+", .. })
        ));
        assert!(binary(BinaryOp::Sub, s, s, &mut heap).is_err());
        let st = TaggedValue::pointer(TypeCode::Struct, 0);
        assert!(binary(BinaryOp::Add, st, st, &mut heap).is_err());
    }

    #[test]
    fn concatenation_places_rhs_first() {
        let mut heap = Heap::new(8);
        let abc = heap.allocate_string("abc").unwrap();
        let defgh = heap.allocate_string("defgh").unwrap();
        let lhs = TaggedValue::heap_pointer(TypeCode::String, abc).unwrap();
        let rhs = TaggedValue::heap_pointer(TypeCode::String, defgh).unwrap();

        let out = binary(BinaryOp::Add, lhs, rhs, &mut heap).unwrap();
        assert_eq!(out.tag, TypeCode::String);
        let ptr = out.expect_pointer().unwrap();
        assert_eq!(heap.allocation_size(ptr), Ok(8 * fade_types::CHAR_WIDTH));
        assert_eq!(heap.read_string(ptr).unwrap(), "defghabc");
    }

    // ── Comparisons ──────────────────────────────────────────────────────

    #[test]
    fn comparisons_promote() {
        let heap = Heap::new(4);
        assert!(compare(CompareOp::Gt, v(3i32), v(2.5f32), &heap).unwrap());
        assert!(compare(CompareOp::Lte, v(2u8), v(2i64), &heap).unwrap());
        assert!(!compare(CompareOp::Lt, v(2u8), v(2i64), &heap).unwrap());
        assert!(compare(CompareOp::Neq, v(1i32), v(2i32), &heap).unwrap());
    }

    #[test]
    fn float_equality_is_epsilon_tolerant() {
        let heap = Heap::new(4);
        let sum = add(v(0.1f64), v(0.2f64));
        assert!(compare(CompareOp::Eq, sum, v(0.3f64), &heap).unwrap());
        assert!(compare(CompareOp::Gte, sum, v(0.3f64), &heap).unwrap());
        assert!(!compare(CompareOp::Eq, v(1.0f32), v(1.001f32), &heap).unwrap());
    }

    #[test]
    fn strings_compare_by_content() {
        let mut heap = Heap::new(8);
        let a = heap.allocate_string("same").unwrap();
        let b = heap.allocate_string("same").unwrap();
        let c = heap.allocate_string("diff").unwrap();
        let s = |p| TaggedValue::heap_pointer(TypeCode::String, p).unwrap();
        assert!(compare(CompareOp::Eq, s(a), s(b), &heap).unwrap());
        assert!(compare(CompareOp::Neq, s(a), s(c), &heap).unwrap());
        assert!(compare(CompareOp::Gt, s(a), s(c), &heap).is_err());
    }

    #[test]
    fn negate_and_sign() {
        assert_eq!(negate(v(5i32)).unwrap(), v(-5i32));
        assert_eq!(negate(v(1.5f64)).unwrap(), v(-1.5f64));
        assert!(is_positive(&v(1u8)).unwrap());
        assert!(!is_positive(&v(-0.5f32)).unwrap());
        assert!(negate(TaggedValue::pointer(TypeCode::String, 0)).is_err());
    }
}
