//! Operators: Python's numeric tower for scalars and sequences, and the
//! elementwise kernels shared by array operators and library functions.

use std::cmp::Ordering;

use num_complex::Complex64;
use xeq_core::pyfmt::float_repr;

use crate::ScriptResult;
use crate::array::{Array, DType, Flavor, broadcast_shapes};
use crate::error::ScriptError;
use crate::numeric::{as_array, ensure_size};
use crate::object::Obj;
use crate::parser::{BinOp, CmpOp, UnaryOp};

/// Largest sequence a repetition may build.
const MAX_REPEAT_LEN: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Fmod,
    Pow,
    Maximum,
    Minimum,
    Atan2,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl ElementOp {
    fn ufunc_name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "subtract",
            Self::Mul => "multiply",
            Self::Div => "divide",
            Self::FloorDiv => "floor_divide",
            Self::Mod => "remainder",
            Self::Fmod => "fmod",
            Self::Pow => "power",
            Self::Maximum => "maximum",
            Self::Minimum => "minimum",
            Self::Atan2 => "arctan2",
            Self::Eq => "equal",
            Self::Ne => "not_equal",
            Self::Lt => "less",
            Self::Le => "less_equal",
            Self::Gt => "greater",
            Self::Ge => "greater_equal",
            Self::LogicalAnd => "logical_and",
            Self::LogicalOr => "logical_or",
            Self::LogicalXor => "logical_xor",
            Self::BitAnd => "bitwise_and",
            Self::BitOr => "bitwise_or",
            Self::BitXor => "bitwise_xor",
            Self::Shl => "left_shift",
            Self::Shr => "right_shift",
        }
    }

    fn tf_op_name(self) -> &'static str {
        match self {
            Self::Add => "AddV2",
            Self::Sub => "Sub",
            Self::Mul => "Mul",
            Self::Div => "RealDiv",
            Self::FloorDiv => "FloorDiv",
            Self::Mod | Self::Fmod => "FloorMod",
            Self::Pow => "Pow",
            Self::Maximum => "Maximum",
            Self::Minimum => "Minimum",
            Self::Atan2 => "Atan2",
            Self::Eq => "Equal",
            Self::Ne => "NotEqual",
            Self::Lt => "Less",
            Self::Le => "LessEqual",
            Self::Gt => "Greater",
            Self::Ge => "GreaterEqual",
            Self::LogicalAnd => "LogicalAnd",
            Self::LogicalOr => "LogicalOr",
            Self::LogicalXor => "LogicalXor",
            Self::BitAnd => "BitwiseAnd",
            Self::BitOr => "BitwiseOr",
            Self::BitXor => "BitwiseXor",
            Self::Shl => "LeftShift",
            Self::Shr => "RightShift",
        }
    }

    fn from_binop(op: BinOp) -> Option<Self> {
        Some(match op {
            BinOp::Add => Self::Add,
            BinOp::Sub => Self::Sub,
            BinOp::Mul => Self::Mul,
            BinOp::Div => Self::Div,
            BinOp::FloorDiv => Self::FloorDiv,
            BinOp::Mod => Self::Mod,
            BinOp::Pow => Self::Pow,
            BinOp::BitAnd => Self::BitAnd,
            BinOp::BitOr => Self::BitOr,
            BinOp::BitXor => Self::BitXor,
            BinOp::Shl => Self::Shl,
            BinOp::Shr => Self::Shr,
            BinOp::MatMul => return None,
        })
    }

    fn from_cmpop(op: CmpOp) -> Option<Self> {
        Some(match op {
            CmpOp::Eq => Self::Eq,
            CmpOp::NotEq => Self::Ne,
            CmpOp::Lt => Self::Lt,
            CmpOp::LtE => Self::Le,
            CmpOp::Gt => Self::Gt,
            CmpOp::GtE => Self::Ge,
            _ => return None,
        })
    }
}

enum Num {
    Int(i64),
    Float(f64),
    Complex(Complex64),
}

fn num(obj: &Obj) -> Option<Num> {
    match obj {
        Obj::Bool(value) => Some(Num::Int(i64::from(*value))),
        Obj::Int(value) => Some(Num::Int(*value)),
        Obj::Float(value) => Some(Num::Float(*value)),
        Obj::Complex(value) => Some(Num::Complex(*value)),
        _ => None,
    }
}

fn is_array_like(obj: &Obj) -> bool {
    match obj {
        Obj::Array(_) => true,
        Obj::List(items) | Obj::Tuple(items) => items.iter().any(is_array_like),
        _ => false,
    }
}

fn symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Pow => "** or pow()",
        other => other.symbol(),
    }
}

fn unsupported_operands(op: BinOp, lhs: &Obj, rhs: &Obj) -> ScriptError {
    ScriptError::Type(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        symbol(op),
        lhs.type_name(),
        rhs.type_name()
    ))
}

/// `lhs <op> rhs`.
pub fn binary(op: BinOp, lhs: &Obj, rhs: &Obj) -> ScriptResult<Obj> {
    let array_side = matches!(lhs, Obj::Array(_)) || matches!(rhs, Obj::Array(_));
    if array_side || (is_array_like(lhs) && is_array_like(rhs)) {
        return array_binary(op, lhs, rhs);
    }
    if let (Some(a), Some(b)) = (num(lhs), num(rhs)) {
        return numeric_binary(op, a, b, lhs, rhs);
    }
    sequence_binary(op, lhs, rhs)
}

fn array_binary(op: BinOp, lhs: &Obj, rhs: &Obj) -> ScriptResult<Obj> {
    let flavor = array_flavor(lhs)
        .or_else(|| array_flavor(rhs))
        .unwrap_or(Flavor::Numpy);
    match ElementOp::from_binop(op) {
        Some(element_op) => elementwise(element_op, lhs, rhs, flavor),
        None => {
            let a = as_array(lhs, flavor)?;
            let b = as_array(rhs, flavor)?;
            Ok(Obj::from_array(Array::matmul(&a, &b)?))
        }
    }
}

fn array_flavor(obj: &Obj) -> Option<Flavor> {
    match obj {
        Obj::Array(array) => Some(array.flavor()),
        _ => None,
    }
}

fn numeric_binary(op: BinOp, a: Num, b: Num, lhs: &Obj, rhs: &Obj) -> ScriptResult<Obj> {
    if matches!(lhs, Obj::Bool(_)) && matches!(rhs, Obj::Bool(_)) {
        let (x, y) = (lhs.truth()?, rhs.truth()?);
        match op {
            BinOp::BitAnd => return Ok(Obj::Bool(x & y)),
            BinOp::BitOr => return Ok(Obj::Bool(x | y)),
            BinOp::BitXor => return Ok(Obj::Bool(x ^ y)),
            _ => {}
        }
    }
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_binary(op, x, y, lhs, rhs),
        (Num::Complex(x), y) => complex_binary(op, x, complex_of(&y), lhs, rhs),
        (x, Num::Complex(y)) => complex_binary(op, complex_of(&x), y, lhs, rhs),
        (x, y) => float_binary(op, real_of(&x), real_of(&y), lhs, rhs),
    }
}

fn real_of(value: &Num) -> f64 {
    match value {
        Num::Int(v) => *v as f64,
        Num::Float(v) => *v,
        Num::Complex(v) => v.re,
    }
}

fn complex_of(value: &Num) -> Complex64 {
    match value {
        Num::Complex(v) => *v,
        other => Complex64::new(real_of(other), 0.0),
    }
}

fn int_binary(op: BinOp, x: i64, y: i64, lhs: &Obj, rhs: &Obj) -> ScriptResult<Obj> {
    let promoted = || float_binary(op, x as f64, y as f64, lhs, rhs);
    match op {
        BinOp::Add => x.checked_add(y).map_or_else(promoted, |v| Ok(Obj::Int(v))),
        BinOp::Sub => x.checked_sub(y).map_or_else(promoted, |v| Ok(Obj::Int(v))),
        BinOp::Mul => x.checked_mul(y).map_or_else(promoted, |v| Ok(Obj::Int(v))),
        BinOp::Div => {
            if y == 0 {
                return Err(ScriptError::ZeroDivision("division by zero".to_string()));
            }
            Ok(Obj::Float(x as f64 / y as f64))
        }
        BinOp::FloorDiv => {
            if y == 0 {
                return Err(ScriptError::ZeroDivision(
                    "integer division or modulo by zero".to_string(),
                ));
            }
            int_floor_div(x, y).map_or_else(promoted, |v| Ok(Obj::Int(v)))
        }
        BinOp::Mod => {
            if y == 0 {
                return Err(ScriptError::ZeroDivision(
                    "integer modulo by zero".to_string(),
                ));
            }
            Ok(Obj::Int(int_mod(x, y)))
        }
        BinOp::Pow => {
            if y < 0 {
                return float_pow(x as f64, y as f64);
            }
            u32::try_from(y)
                .ok()
                .and_then(|exp| x.checked_pow(exp))
                .map_or_else(|| float_pow(x as f64, y as f64), |v| Ok(Obj::Int(v)))
        }
        BinOp::BitAnd => Ok(Obj::Int(x & y)),
        BinOp::BitOr => Ok(Obj::Int(x | y)),
        BinOp::BitXor => Ok(Obj::Int(x ^ y)),
        BinOp::Shl | BinOp::Shr => {
            if y < 0 {
                return Err(ScriptError::value_error("negative shift count"));
            }
            if op == BinOp::Shr {
                return Ok(Obj::Int(if y >= 64 { x >> 63 } else { x >> y }));
            }
            let shifted = u32::try_from(y)
                .ok()
                .and_then(|bits| x.checked_shl(bits))
                .filter(|v| v >> y == x);
            shifted.map(Obj::Int).ok_or_else(|| {
                ScriptError::Overflow("int too large to shift in fixed precision".to_string())
            })
        }
        BinOp::MatMul => Err(unsupported_operands(op, lhs, rhs)),
    }
}

fn int_floor_div(x: i64, y: i64) -> Option<i64> {
    let quotient = x.checked_div(y)?;
    let remainder = x.checked_rem(y)?;
    Some(if remainder != 0 && ((remainder < 0) != (y < 0)) {
        quotient - 1
    } else {
        quotient
    })
}

fn int_mod(x: i64, y: i64) -> i64 {
    let remainder = x.checked_rem(y).unwrap_or(0);
    if remainder != 0 && ((remainder < 0) != (y < 0)) {
        remainder + y
    } else {
        remainder
    }
}

/// Python's float `%`: the result takes the sign of the divisor.
#[must_use]
pub fn float_mod(x: f64, y: f64) -> f64 {
    let remainder = x % y;
    if remainder != 0.0 && ((remainder < 0.0) != (y < 0.0)) {
        remainder + y
    } else if remainder == 0.0 {
        0.0_f64.copysign(y)
    } else {
        remainder
    }
}

fn float_binary(op: BinOp, x: f64, y: f64, lhs: &Obj, rhs: &Obj) -> ScriptResult<Obj> {
    let zero = |message: &str| Err(ScriptError::ZeroDivision(message.to_string()));
    match op {
        BinOp::Add => Ok(Obj::Float(x + y)),
        BinOp::Sub => Ok(Obj::Float(x - y)),
        BinOp::Mul => Ok(Obj::Float(x * y)),
        BinOp::Div if y == 0.0 => zero("float division by zero"),
        BinOp::Div => Ok(Obj::Float(x / y)),
        BinOp::FloorDiv if y == 0.0 => zero("float floor division by zero"),
        BinOp::FloorDiv => Ok(Obj::Float((x / y).floor())),
        BinOp::Mod if y == 0.0 => zero("float modulo by zero"),
        BinOp::Mod => Ok(Obj::Float(float_mod(x, y))),
        BinOp::Pow => float_pow(x, y),
        _ => Err(unsupported_operands(op, lhs, rhs)),
    }
}

fn float_pow(x: f64, y: f64) -> ScriptResult<Obj> {
    if x == 0.0 && y < 0.0 {
        return Err(ScriptError::ZeroDivision(
            "0.0 cannot be raised to a negative power".to_string(),
        ));
    }
    if x < 0.0 && y.is_finite() && y.fract() != 0.0 {
        return Ok(Obj::Complex(Complex64::new(x, 0.0).powf(y)));
    }
    let result = x.powf(y);
    if result.is_infinite() && x.is_finite() && y.is_finite() {
        return Err(ScriptError::Overflow(
            "(34, 'Numerical result out of range')".to_string(),
        ));
    }
    Ok(Obj::Float(result))
}

fn complex_binary(
    op: BinOp,
    x: Complex64,
    y: Complex64,
    lhs: &Obj,
    rhs: &Obj,
) -> ScriptResult<Obj> {
    let zero = Complex64::new(0.0, 0.0);
    match op {
        BinOp::Add => Ok(Obj::Complex(x + y)),
        BinOp::Sub => Ok(Obj::Complex(x - y)),
        BinOp::Mul => Ok(Obj::Complex(x * y)),
        BinOp::Div if y == zero => Err(ScriptError::ZeroDivision(
            "complex division by zero".to_string(),
        )),
        BinOp::Div => Ok(Obj::Complex(x / y)),
        BinOp::Pow if x == zero && (y.re < 0.0 || y.im != 0.0) => Err(ScriptError::ZeroDivision(
            "0.0 to a negative or complex power".to_string(),
        )),
        BinOp::Pow if y == zero => Ok(Obj::Complex(Complex64::new(1.0, 0.0))),
        BinOp::Pow => Ok(Obj::Complex(x.powc(y))),
        _ => Err(unsupported_operands(op, lhs, rhs)),
    }
}

fn sequence_binary(op: BinOp, lhs: &Obj, rhs: &Obj) -> ScriptResult<Obj> {
    match (op, lhs, rhs) {
        (BinOp::Add, Obj::Str(a), Obj::Str(b)) => Ok(Obj::Str(format!("{a}{b}"))),
        (BinOp::Add, Obj::List(a), Obj::List(b)) => {
            Ok(Obj::List(a.iter().chain(b).cloned().collect()))
        }
        (BinOp::Add, Obj::Tuple(a), Obj::Tuple(b)) => {
            Ok(Obj::Tuple(a.iter().chain(b).cloned().collect()))
        }
        (BinOp::Add, Obj::Str(_) | Obj::List(_) | Obj::Tuple(_), other) => {
            Err(ScriptError::Type(format!(
                "can only concatenate {} (not \"{}\") to {}",
                lhs.type_name(),
                other.type_name(),
                lhs.type_name()
            )))
        }
        (BinOp::Mul, seq @ (Obj::Str(_) | Obj::List(_) | Obj::Tuple(_)), count)
        | (BinOp::Mul, count, seq @ (Obj::Str(_) | Obj::List(_) | Obj::Tuple(_))) => {
            repeat(seq, count)
        }
        (BinOp::Mod, Obj::Str(_), _) => Err(ScriptError::unsupported(
            "printf-style string formatting is not supported",
        )),
        _ => Err(unsupported_operands(op, lhs, rhs)),
    }
}

fn repeat(seq: &Obj, count: &Obj) -> ScriptResult<Obj> {
    let times = match count {
        Obj::Int(n) => *n,
        Obj::Bool(flag) => i64::from(*flag),
        other => {
            return Err(ScriptError::Type(format!(
                "can't multiply sequence by non-int of type '{}'",
                other.type_name()
            )));
        }
    };
    let times = usize::try_from(times).unwrap_or(0);
    let len = match seq {
        Obj::Str(text) => text.chars().count(),
        Obj::List(items) | Obj::Tuple(items) => items.len(),
        _ => 0,
    };
    if len.saturating_mul(times) > MAX_REPEAT_LEN {
        return Err(ScriptError::unsupported("repeated sequence is too large"));
    }
    Ok(match seq {
        Obj::Str(text) => Obj::Str(text.repeat(times)),
        Obj::List(items) => Obj::List(repeat_items(items, times)),
        Obj::Tuple(items) => Obj::Tuple(repeat_items(items, times)),
        other => other.clone(),
    })
}

fn repeat_items(items: &[Obj], times: usize) -> Vec<Obj> {
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    out
}

/// `<op> operand`.
pub fn unary(op: UnaryOp, operand: &Obj) -> ScriptResult<Obj> {
    if op == UnaryOp::Not {
        return Ok(Obj::Bool(!operand.truth()?));
    }
    if let Obj::Array(array) = operand {
        return array_unary(op, array);
    }
    let bad = || {
        let symbol = match op {
            UnaryOp::Plus => "+",
            UnaryOp::Neg => "-",
            _ => "~",
        };
        ScriptError::Type(format!(
            "bad operand type for unary {symbol}: '{}'",
            operand.type_name()
        ))
    };
    match (op, num(operand).ok_or_else(bad)?) {
        (UnaryOp::Plus, Num::Int(v)) => Ok(Obj::Int(v)),
        (UnaryOp::Plus, Num::Float(v)) => Ok(Obj::Float(v)),
        (UnaryOp::Plus, Num::Complex(v)) => Ok(Obj::Complex(v)),
        (UnaryOp::Neg, Num::Int(v)) => Ok(v
            .checked_neg()
            .map_or(Obj::Float(-(v as f64)), Obj::Int)),
        (UnaryOp::Neg, Num::Float(v)) => Ok(Obj::Float(-v)),
        (UnaryOp::Neg, Num::Complex(v)) => Ok(Obj::Complex(-v)),
        (UnaryOp::Invert, Num::Int(v)) => Ok(Obj::Int(!v)),
        _ => Err(bad()),
    }
}

fn array_unary(op: UnaryOp, array: &Array) -> ScriptResult<Obj> {
    let dtype = array.dtype();
    let result = match op {
        UnaryOp::Plus => array.clone(),
        UnaryOp::Neg if dtype == DType::Bool => {
            return Err(match array.flavor() {
                Flavor::Torch => ScriptError::Runtime(
                    "Negation, the `-` operator, on a bool tensor is not supported. If you are trying to invert a mask, use the `~` or `logical_not()` operator instead.".to_string(),
                ),
                _ => ScriptError::type_error(
                    "The numpy boolean negative, the `-` operator, is not supported, use the `~` operator or the logical_not function instead.",
                ),
            });
        }
        UnaryOp::Neg => array.map(dtype, |v| -v),
        UnaryOp::Invert if dtype == DType::Bool => {
            array.map(dtype, |v| f64::from(u8::from(v == 0.0)))
        }
        UnaryOp::Invert if dtype.is_integer() => array.map(dtype, |v| !(v as i64) as f64),
        UnaryOp::Invert => {
            return Err(ScriptError::type_error(
                "ufunc 'invert' not supported for the input types, and the inputs could not be safely coerced to any supported types according to the casting rule ''safe''",
            ));
        }
        UnaryOp::Not => return Ok(Obj::Bool(!Obj::Array(array.clone()).truth()?)),
    };
    Ok(Obj::from_array(result))
}

/// Applies `op` elementwise after converting both sides to arrays. Python
/// scalars are weakly typed: they adopt the array's dtype where they fit.
pub fn elementwise(op: ElementOp, lhs: &Obj, rhs: &Obj, flavor: Flavor) -> ScriptResult<Obj> {
    let (a, b) = operands(lhs, rhs, flavor)?;
    Ok(Obj::from_array(apply(op, &a, &b)?))
}

/// Both operands as arrays, typing Python scalars against the array side.
pub fn operands(lhs: &Obj, rhs: &Obj, flavor: Flavor) -> ScriptResult<(Array, Array)> {
    Ok(match (lhs, rhs) {
        (Obj::Array(a), Obj::Array(b)) => (a.clone(), b.clone()),
        (Obj::Array(a), other) => (a.clone(), weak_operand(other, a)?),
        (other, Obj::Array(b)) => (weak_operand(other, b)?, b.clone()),
        (a, b) => (as_array(a, flavor)?, as_array(b, flavor)?),
    })
}

fn weak_operand(obj: &Obj, array: &Array) -> ScriptResult<Array> {
    let flavor = array.flavor();
    let dtype = array.dtype();
    match obj {
        Obj::Bool(value) => Ok(Array::scalar(f64::from(u8::from(*value)), DType::Bool, flavor)),
        Obj::Int(value) => {
            let scalar_dtype = if dtype == DType::Bool {
                flavor.default_int()
            } else {
                dtype
            };
            Ok(Array::scalar(*value as f64, scalar_dtype, flavor))
        }
        Obj::Float(value) => {
            if dtype.is_float() {
                return Ok(Array::scalar(*value, dtype, flavor));
            }
            if flavor == Flavor::Tensorflow {
                return Err(ScriptError::Type(format!(
                    "Cannot convert {} to EagerTensor of dtype {}",
                    float_repr(*value),
                    dtype.name()
                )));
            }
            Ok(Array::scalar(*value, flavor.default_float(), flavor))
        }
        other => as_array(other, flavor),
    }
}

fn bool_of(value: bool) -> f64 {
    f64::from(u8::from(value))
}

fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

/// The elementwise kernel behind operators and ufunc-style functions.
pub fn apply(op: ElementOp, a: &Array, b: &Array) -> ScriptResult<Array> {
    let flavor = a.flavor().combine(b.flavor());
    if flavor == Flavor::Tensorflow && a.dtype() != b.dtype() {
        let name = op.tf_op_name();
        return Err(ScriptError::Value(format!(
            "cannot compute {name} as input #1(zero-based) was expected to be a {} tensor but is a {} tensor [Op:{name}]",
            a.dtype().name(),
            b.dtype().name()
        )));
    }
    ensure_size(&broadcast_shapes(a.shape(), b.shape(), flavor)?)?;
    let promoted = a.dtype().promote(b.dtype());
    let float_out = if promoted.is_float() {
        promoted
    } else if flavor == Flavor::Tensorflow {
        DType::Float64
    } else {
        flavor.default_float()
    };
    let int_out = if promoted == DType::Bool {
        flavor.default_int()
    } else {
        promoted
    };
    let integer_division = matches!(op, ElementOp::FloorDiv | ElementOp::Mod | ElementOp::Fmod);
    if integer_division
        && flavor == Flavor::Torch
        && !promoted.is_float()
        && b.data().contains(&0.0)
    {
        return Err(ScriptError::Runtime("ZeroDivisionError".to_string()));
    }

    match op {
        ElementOp::Add if promoted == DType::Bool => {
            Array::zip(a, b, DType::Bool, |x, y| bool_of(x != 0.0 || y != 0.0))
        }
        ElementOp::Add => Array::zip(a, b, promoted, |x, y| x + y),
        ElementOp::Sub if promoted == DType::Bool => Err(match flavor {
            Flavor::Torch => ScriptError::Runtime(
                "Subtraction, the `-` operator, with two bool tensors is not supported. Use the `^` or `logical_xor()` operator instead.".to_string(),
            ),
            _ => ScriptError::type_error(
                "numpy boolean subtract, the `-` operator, is not supported, use the bitwise_xor, the `^` operator, or the logical_xor function instead.",
            ),
        }),
        ElementOp::Sub => Array::zip(a, b, promoted, |x, y| x - y),
        ElementOp::Mul if promoted == DType::Bool => {
            Array::zip(a, b, DType::Bool, |x, y| bool_of(x != 0.0 && y != 0.0))
        }
        ElementOp::Mul => Array::zip(a, b, promoted, |x, y| x * y),
        ElementOp::Div => Array::zip(a, b, float_out, |x, y| x / y),
        ElementOp::Atan2 => Array::zip(a, b, float_out, f64::atan2),
        ElementOp::FloorDiv if promoted.is_float() => {
            Array::zip(a, b, promoted, |x, y| (x / y).floor())
        }
        ElementOp::FloorDiv => Array::zip(a, b, int_out, |x, y| {
            if y == 0.0 {
                0.0
            } else {
                (x / y).floor()
            }
        }),
        ElementOp::Mod if promoted.is_float() => {
            Array::zip(a, b, promoted, |x, y| if y == 0.0 { f64::NAN } else { float_mod(x, y) })
        }
        ElementOp::Mod => Array::zip(a, b, int_out, |x, y| {
            if y == 0.0 {
                0.0
            } else {
                int_mod(x as i64, y as i64) as f64
            }
        }),
        ElementOp::Fmod => Array::zip(a, b, int_out, |x, y| {
            if y == 0.0 && !promoted.is_float() {
                0.0
            } else {
                x % y
            }
        }),
        ElementOp::Pow if !promoted.is_float() => {
            if b.data().iter().any(|y| *y < 0.0) {
                const MESSAGE: &str = "Integers to negative integer powers are not allowed.";
                match flavor {
                    Flavor::Numpy => return Err(ScriptError::value_error(MESSAGE)),
                    Flavor::Torch => return Err(ScriptError::Runtime(MESSAGE.to_string())),
                    Flavor::Tensorflow | Flavor::Mlx => {}
                }
            }
            Array::zip(a, b, int_out, |x, y| x.powf(y).trunc())
        }
        ElementOp::Pow => Array::zip(a, b, promoted, f64::powf),
        ElementOp::Maximum => Array::zip(a, b, promoted, nan_max),
        ElementOp::Minimum => Array::zip(a, b, promoted, nan_min),
        ElementOp::Eq => Array::zip(a, b, DType::Bool, |x, y| bool_of(x == y)),
        ElementOp::Ne => Array::zip(a, b, DType::Bool, |x, y| bool_of(x != y)),
        ElementOp::Lt => Array::zip(a, b, DType::Bool, |x, y| bool_of(x < y)),
        ElementOp::Le => Array::zip(a, b, DType::Bool, |x, y| bool_of(x <= y)),
        ElementOp::Gt => Array::zip(a, b, DType::Bool, |x, y| bool_of(x > y)),
        ElementOp::Ge => Array::zip(a, b, DType::Bool, |x, y| bool_of(x >= y)),
        ElementOp::LogicalAnd => {
            Array::zip(a, b, DType::Bool, |x, y| bool_of(x != 0.0 && y != 0.0))
        }
        ElementOp::LogicalOr => {
            Array::zip(a, b, DType::Bool, |x, y| bool_of(x != 0.0 || y != 0.0))
        }
        ElementOp::LogicalXor => {
            Array::zip(a, b, DType::Bool, |x, y| bool_of((x != 0.0) != (y != 0.0)))
        }
        ElementOp::BitAnd | ElementOp::BitOr | ElementOp::BitXor | ElementOp::Shl
        | ElementOp::Shr
            if promoted.is_float() =>
        {
            Err(ScriptError::Type(format!(
                "ufunc '{}' not supported for the input types, and the inputs could not be safely coerced to any supported types according to the casting rule ''safe''",
                op.ufunc_name()
            )))
        }
        ElementOp::BitAnd => Array::zip(a, b, promoted, |x, y| ((x as i64) & (y as i64)) as f64),
        ElementOp::BitOr => Array::zip(a, b, promoted, |x, y| ((x as i64) | (y as i64)) as f64),
        ElementOp::BitXor => Array::zip(a, b, promoted, |x, y| ((x as i64) ^ (y as i64)) as f64),
        ElementOp::Shl => Array::zip(a, b, int_out, |x, y| {
            (x as i64).checked_shl(y as u32).unwrap_or(0) as f64
        }),
        ElementOp::Shr => Array::zip(a, b, int_out, |x, y| {
            (x as i64).checked_shr(y as u32).unwrap_or(0) as f64
        }),
    }
}

/// One link of a comparison chain.
pub fn compare(op: CmpOp, lhs: &Obj, rhs: &Obj) -> ScriptResult<Obj> {
    if let Some(element_op) = ElementOp::from_cmpop(op) {
        let array_side = matches!(lhs, Obj::Array(_)) || matches!(rhs, Obj::Array(_));
        if array_side {
            let flavor = array_flavor(lhs)
                .or_else(|| array_flavor(rhs))
                .unwrap_or(Flavor::Numpy);
            return elementwise(element_op, lhs, rhs, flavor);
        }
    }
    let result = match op {
        CmpOp::Eq => py_eq(lhs, rhs),
        CmpOp::NotEq => !py_eq(lhs, rhs),
        CmpOp::Lt => py_order(lhs, rhs, "<")? == Some(Ordering::Less),
        CmpOp::LtE => matches!(
            py_order(lhs, rhs, "<=")?,
            Some(Ordering::Less | Ordering::Equal)
        ),
        CmpOp::Gt => py_order(lhs, rhs, ">")? == Some(Ordering::Greater),
        CmpOp::GtE => matches!(
            py_order(lhs, rhs, ">=")?,
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CmpOp::In => contains(rhs, lhs)?,
        CmpOp::NotIn => !contains(rhs, lhs)?,
        CmpOp::Is => is_same(lhs, rhs),
        CmpOp::IsNot => !is_same(lhs, rhs),
    };
    Ok(Obj::Bool(result))
}

fn is_same(lhs: &Obj, rhs: &Obj) -> bool {
    match (lhs, rhs) {
        (Obj::None, Obj::None) => true,
        (Obj::Bool(a), Obj::Bool(b)) => a == b,
        (Obj::Module(a), Obj::Module(b)) => a == b,
        (Obj::Function(a), Obj::Function(b)) => a == b,
        (Obj::DType(a, fa), Obj::DType(b, fb)) => a == b && fa == fb,
        _ => false,
    }
}

/// Python `==` for non-array operands.
#[must_use]
pub fn py_eq(lhs: &Obj, rhs: &Obj) -> bool {
    if let (Some(a), Some(b)) = (num(lhs), num(rhs)) {
        return match (a, b) {
            (Num::Int(x), Num::Int(y)) => x == y,
            (Num::Complex(x), y) | (y, Num::Complex(x)) => x == complex_of(&y),
            (x, y) => real_of(&x) == real_of(&y),
        };
    }
    match (lhs, rhs) {
        (Obj::None, Obj::None) => true,
        (Obj::Str(a), Obj::Str(b)) => a == b,
        (Obj::List(a), Obj::List(b)) | (Obj::Tuple(a), Obj::Tuple(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| py_eq(x, y))
        }
        (a @ Obj::Range { .. }, b @ Obj::Range { .. }) => a == b,
        (Obj::DType(a, _), Obj::DType(b, _)) => a == b,
        (Obj::Array(a), Obj::Array(b)) => a == b,
        (a, b) => is_same(a, b),
    }
}

pub fn py_order(lhs: &Obj, rhs: &Obj, symbol: &str) -> ScriptResult<Option<Ordering>> {
    if let (Some(a), Some(b)) = (num(lhs), num(rhs)) {
        return match (a, b) {
            (Num::Int(x), Num::Int(y)) => Ok(Some(x.cmp(&y))),
            (Num::Complex(_), _) | (_, Num::Complex(_)) => Err(not_orderable(lhs, rhs, symbol)),
            (x, y) => Ok(real_of(&x).partial_cmp(&real_of(&y))),
        };
    }
    match (lhs, rhs) {
        (Obj::Str(a), Obj::Str(b)) => Ok(Some(a.cmp(b))),
        (Obj::List(a), Obj::List(b)) | (Obj::Tuple(a), Obj::Tuple(b)) => {
            for (x, y) in a.iter().zip(b) {
                if !py_eq(x, y) {
                    return py_order(x, y, symbol);
                }
            }
            Ok(Some(a.len().cmp(&b.len())))
        }
        _ => Err(not_orderable(lhs, rhs, symbol)),
    }
}

fn not_orderable(lhs: &Obj, rhs: &Obj, symbol: &str) -> ScriptError {
    ScriptError::Type(format!(
        "'{symbol}' not supported between instances of '{}' and '{}'",
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn contains(container: &Obj, item: &Obj) -> ScriptResult<bool> {
    match (container, item) {
        (Obj::Str(haystack), Obj::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Obj::Str(_), other) => Err(ScriptError::Type(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (Obj::Array(array), other) => {
            let hits = elementwise(ElementOp::Eq, container, other, array.flavor())?;
            match hits {
                Obj::Array(mask) => Ok(mask.data().iter().any(|v| *v != 0.0)),
                scalar => scalar.truth(),
            }
        }
        (Obj::List(_) | Obj::Tuple(_) | Obj::Range { .. }, _) => {
            Ok(container.iterate()?.iter().any(|element| py_eq(element, item)))
        }
        (other, _) => Err(ScriptError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{ElementOp, apply, binary, compare, elementwise, float_mod, unary};
    use crate::array::{Array, DType, Flavor};
    use crate::object::Obj;
    use crate::parser::{BinOp, CmpOp, UnaryOp};

    fn err(op: BinOp, lhs: Obj, rhs: Obj) -> String {
        binary(op, &lhs, &rhs).expect_err("should raise").to_string()
    }

    #[test]
    fn zero_division_messages_match_python() {
        assert_eq!(err(BinOp::Div, Obj::Int(1), Obj::Int(0)), "division by zero");
        assert_eq!(
            err(BinOp::Div, Obj::Float(1.0), Obj::Int(0)),
            "float division by zero"
        );
        assert_eq!(
            err(BinOp::FloorDiv, Obj::Int(1), Obj::Int(0)),
            "integer division or modulo by zero"
        );
        assert_eq!(
            err(BinOp::Mod, Obj::Int(1), Obj::Int(0)),
            "integer modulo by zero"
        );
        assert_eq!(
            err(BinOp::Pow, Obj::Float(0.0), Obj::Int(-1)),
            "0.0 cannot be raised to a negative power"
        );
    }

    #[test]
    fn integer_arithmetic_floors_toward_negative_infinity() {
        assert_eq!(
            binary(BinOp::FloorDiv, &Obj::Int(-7), &Obj::Int(2)),
            Ok(Obj::Int(-4))
        );
        assert_eq!(binary(BinOp::Mod, &Obj::Int(-7), &Obj::Int(2)), Ok(Obj::Int(1)));
        assert_eq!(float_mod(-7.5, 2.0), 0.5);
        assert_eq!(binary(BinOp::Pow, &Obj::Int(2), &Obj::Int(-1)), Ok(Obj::Float(0.5)));
        assert_eq!(
            binary(BinOp::Add, &Obj::Int(i64::MAX), &Obj::Int(1)),
            Ok(Obj::Float(i64::MAX as f64 + 1.0))
        );
    }

    #[test]
    fn float_power_overflow_and_complex_roots() {
        assert_eq!(
            err(BinOp::Pow, Obj::Float(10.0), Obj::Float(400.0)),
            "(34, 'Numerical result out of range')"
        );
        let root = binary(BinOp::Pow, &Obj::Float(-8.0), &Obj::Float(1.0 / 3.0))
            .expect("complex root");
        assert!(matches!(root, Obj::Complex(_)));
    }

    #[test]
    fn sequence_errors_name_both_types() {
        assert_eq!(
            err(BinOp::Add, Obj::Int(1), Obj::Str("a".into())),
            "unsupported operand type(s) for +: 'int' and 'str'"
        );
        assert_eq!(
            err(BinOp::Add, Obj::Str("a".into()), Obj::Int(1)),
            "can only concatenate str (not \"int\") to str"
        );
        assert_eq!(
            binary(BinOp::Mul, &Obj::Int(2), &Obj::List(vec![Obj::Int(1)])),
            Ok(Obj::List(vec![Obj::Int(1), Obj::Int(1)]))
        );
    }

    #[test]
    fn python_scalars_are_weak_against_arrays() {
        let ints = Array::new(vec![2], vec![1.0, 2.0], DType::Int32, Flavor::Numpy);
        let Obj::Array(sum) = binary(BinOp::Add, &Obj::Array(ints.clone()), &Obj::Int(1))
            .expect("add")
        else {
            panic!("expected array");
        };
        assert_eq!(sum.dtype(), DType::Int32);
        let Obj::Array(scaled) =
            binary(BinOp::Mul, &Obj::Array(ints), &Obj::Float(0.5)).expect("mul")
        else {
            panic!("expected array");
        };
        assert_eq!(scaled.dtype(), DType::Float64);
        assert_eq!(scaled.data(), &[0.5, 1.0]);
    }

    #[test]
    fn array_division_by_zero_depends_on_library() {
        let ints = Array::new(vec![2], vec![4.0, 5.0], DType::Int64, Flavor::Numpy);
        let zero = Array::scalar(0.0, DType::Int64, Flavor::Numpy);
        let floored = apply(ElementOp::FloorDiv, &ints, &zero).expect("numpy yields zero");
        assert_eq!(floored.data(), &[0.0, 0.0]);
        let divided = apply(ElementOp::Div, &ints, &zero).expect("true division");
        assert!(divided.data().iter().all(|v| v.is_infinite()));

        let tensor = ints.clone().with_flavor(Flavor::Torch);
        let zero = zero.with_flavor(Flavor::Torch);
        let err = apply(ElementOp::FloorDiv, &tensor, &zero).expect_err("torch raises");
        assert_eq!(err.to_string(), "ZeroDivisionError");
    }

    #[test]
    fn tensorflow_refuses_mixed_dtypes() {
        let a = Array::new(vec![1], vec![1.0], DType::Float32, Flavor::Tensorflow);
        let b = Array::new(vec![1], vec![1.0], DType::Float64, Flavor::Tensorflow);
        let err = apply(ElementOp::Add, &a, &b).expect_err("dtype mismatch");
        assert!(err.to_string().contains("[Op:AddV2]"));
        let err = elementwise(
            ElementOp::Add,
            &Obj::Array(Array::new(vec![1], vec![1.0], DType::Int32, Flavor::Tensorflow)),
            &Obj::Float(1.5),
            Flavor::Tensorflow,
        )
        .expect_err("float into int tensor");
        assert_eq!(
            err.to_string(),
            "Cannot convert 1.5 to EagerTensor of dtype int32"
        );
    }

    #[test]
    fn comparisons_cover_membership_and_identity() {
        let list = Obj::List(vec![Obj::Int(1), Obj::Float(2.0)]);
        assert_eq!(compare(CmpOp::In, &Obj::Int(2), &list), Ok(Obj::Bool(true)));
        assert_eq!(compare(CmpOp::Is, &Obj::None, &Obj::None), Ok(Obj::Bool(true)));
        assert_eq!(
            compare(CmpOp::Lt, &Obj::Float(f64::NAN), &Obj::Int(1)),
            Ok(Obj::Bool(false))
        );
        let err = compare(CmpOp::Lt, &Obj::Str("a".into()), &Obj::Int(1)).expect_err("type");
        assert_eq!(
            err.to_string(),
            "'<' not supported between instances of 'str' and 'int'"
        );
    }

    #[test]
    fn unary_operators() {
        assert_eq!(unary(UnaryOp::Neg, &Obj::Bool(true)), Ok(Obj::Int(-1)));
        assert_eq!(unary(UnaryOp::Invert, &Obj::Int(5)), Ok(Obj::Int(-6)));
        assert_eq!(unary(UnaryOp::Not, &Obj::Int(0)), Ok(Obj::Bool(true)));
        let mask = Array::new(vec![2], vec![1.0, 0.0], DType::Bool, Flavor::Numpy);
        let Obj::Array(flipped) = unary(UnaryOp::Invert, &Obj::Array(mask)).expect("invert")
        else {
            panic!("expected array");
        };
        assert_eq!(flipped.data(), &[0.0, 1.0]);
    }
}
