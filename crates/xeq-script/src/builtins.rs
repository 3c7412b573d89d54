//! Python builtins, the `math` module and methods on scalar objects.

use std::cmp::Ordering;

use num_complex::Complex64;
use xeq_core::pyfmt::parse_python_float;

use crate::ScriptResult;
use crate::array::Flavor;
use crate::error::ScriptError;
use crate::modules::ModuleId;
use crate::numeric::{self, float_arg, int_arg};
use crate::object::{Args, Obj};
use crate::ops::{self, binary, compare};
use crate::parser::{BinOp, CmpOp};

pub const BUILTIN_NAMES: &[&str] = &[
    "float", "int", "complex", "bool", "str", "repr", "len", "abs", "sum", "min", "max", "pow",
    "round", "range", "list", "tuple", "sorted", "any", "all", "print", "enumerate", "zip",
    "reversed", "divmod",
];

#[must_use]
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

/// Calls the builtin `name`.
pub fn call(name: &str, args: &Args) -> ScriptResult<Obj> {
    let arg = |index: usize| args.positional.get(index);
    match name {
        "float" => arg(0).map_or(Ok(Obj::Float(0.0)), to_float),
        "int" => arg(0).map_or(Ok(Obj::Int(0)), to_int),
        "complex" => {
            let re = arg(0).map(float_arg).transpose()?.unwrap_or(0.0);
            let im = arg(1).map(float_arg).transpose()?.unwrap_or(0.0);
            Ok(Obj::Complex(Complex64::new(re, im)))
        }
        "bool" => Ok(Obj::Bool(arg(0).map(Obj::truth).transpose()?.unwrap_or(false))),
        "str" => Ok(Obj::Str(arg(0).map(Obj::text).unwrap_or_default())),
        "repr" => Ok(Obj::Str(required(args, 0, name)?.repr())),
        "len" => len(required(args, 0, name)?),
        "abs" => abs(required(args, 0, name)?),
        "sum" => {
            let start = args.get(1, &["start"]).cloned().unwrap_or(Obj::Int(0));
            required(args, 0, name)?
                .iterate()?
                .iter()
                .try_fold(start, |total, item| binary(BinOp::Add, &total, item))
        }
        "min" | "max" => extreme(name, args),
        "pow" => match args.positional.as_slice() {
            [base, exponent] => binary(BinOp::Pow, base, exponent),
            [base, exponent, modulus] => modular_pow(base, exponent, modulus),
            _ => Err(ScriptError::Type(format!(
                "pow expected 2 arguments, got {}",
                args.positional.len()
            ))),
        },
        "round" => round(required(args, 0, name)?, args.optional(1, &["ndigits"])),
        "range" => range(args),
        "list" => Ok(Obj::List(arg(0).map_or(Ok(Vec::new()), Obj::iterate)?)),
        "tuple" => Ok(Obj::Tuple(arg(0).map_or(Ok(Vec::new()), Obj::iterate)?)),
        "sorted" => sorted(required(args, 0, name)?, args.flag(&["reverse"])),
        "any" => {
            for item in required(args, 0, name)?.iterate()? {
                if item.truth()? {
                    return Ok(Obj::Bool(true));
                }
            }
            Ok(Obj::Bool(false))
        }
        "all" => {
            for item in required(args, 0, name)?.iterate()? {
                if !item.truth()? {
                    return Ok(Obj::Bool(false));
                }
            }
            Ok(Obj::Bool(true))
        }
        "print" => Ok(Obj::None),
        "enumerate" => {
            let start = args.get(1, &["start"]).map(int_arg).transpose()?.unwrap_or(0);
            let items = required(args, 0, name)?.iterate()?;
            Ok(Obj::List(
                items
                    .into_iter()
                    .zip(start..)
                    .map(|(item, index)| Obj::Tuple(vec![Obj::Int(index), item]))
                    .collect(),
            ))
        }
        "zip" => {
            let columns = args
                .positional
                .iter()
                .map(Obj::iterate)
                .collect::<ScriptResult<Vec<_>>>()?;
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            Ok(Obj::List(
                (0..rows)
                    .map(|row| Obj::Tuple(columns.iter().map(|column| column[row].clone()).collect()))
                    .collect(),
            ))
        }
        "reversed" => {
            let mut items = required(args, 0, name)?.iterate()?;
            items.reverse();
            Ok(Obj::List(items))
        }
        "divmod" => {
            let a = required(args, 0, name)?;
            let b = required(args, 1, name)?;
            Ok(Obj::Tuple(vec![
                binary(BinOp::FloorDiv, a, b)?,
                binary(BinOp::Mod, a, b)?,
            ]))
        }
        _ => Err(ScriptError::Name(name.to_string())),
    }
}

fn required<'a>(args: &'a Args, index: usize, name: &str) -> ScriptResult<&'a Obj> {
    args.positional.get(index).ok_or_else(|| {
        ScriptError::Type(format!(
            "{name}() takes at least {} argument{} ({} given)",
            index + 1,
            if index == 0 { "" } else { "s" },
            args.positional.len()
        ))
    })
}

fn to_float(obj: &Obj) -> ScriptResult<Obj> {
    match obj {
        Obj::Str(text) => parse_python_float(text).map(Obj::Float).ok_or_else(|| {
            ScriptError::Value(format!("could not convert string to float: '{text}'"))
        }),
        Obj::Complex(_) => Err(ScriptError::type_error(
            "float() argument must be a string or a real number, not 'complex'",
        )),
        Obj::Array(array) => array
            .item()
            .map(Obj::Float)
            .ok_or_else(|| numeric::scalar_conversion_error(array)),
        other => other.as_f64().map(Obj::Float).ok_or_else(|| {
            ScriptError::Type(format!(
                "float() argument must be a string or a real number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

/// An integral float as `int`; values past `i64` stay floats.
fn integral(value: f64) -> ScriptResult<Obj> {
    if value.is_nan() {
        return Err(ScriptError::value_error("cannot convert float NaN to integer"));
    }
    if value.is_infinite() {
        return Err(ScriptError::Overflow(
            "cannot convert float infinity to integer".to_string(),
        ));
    }
    if value >= -(2f64.powi(63)) && value < 2f64.powi(63) {
        Ok(Obj::Int(value as i64))
    } else {
        Ok(Obj::Float(value))
    }
}

fn to_int(obj: &Obj) -> ScriptResult<Obj> {
    match obj {
        Obj::Bool(value) => Ok(Obj::Int(i64::from(*value))),
        Obj::Int(value) => Ok(Obj::Int(*value)),
        Obj::Float(value) => integral(value.trunc()),
        Obj::Str(text) => {
            let cleaned = text.trim().replace('_', "");
            cleaned.parse::<i64>().map(Obj::Int).map_err(|_| {
                ScriptError::Value(format!(
                    "invalid literal for int() with base 10: {}",
                    obj.repr()
                ))
            })
        }
        Obj::Array(array) => match array.item() {
            Some(value) => integral(value.trunc()),
            None => Err(numeric::scalar_conversion_error(array)),
        },
        other => Err(ScriptError::Type(format!(
            "int() argument must be a string, a bytes-like object or a real number, not '{}'",
            other.type_name()
        ))),
    }
}

fn len(obj: &Obj) -> ScriptResult<Obj> {
    let count = match obj {
        Obj::Str(text) => text.chars().count(),
        Obj::List(items) | Obj::Tuple(items) => items.len(),
        Obj::Range { start, stop, step } => {
            return Ok(Obj::Int(crate::object::range_len(*start, *stop, *step)));
        }
        Obj::Array(array) => match array.shape().first() {
            Some(rows) => *rows,
            None if array.flavor() == Flavor::Torch => {
                return Err(ScriptError::type_error("len() of a 0-d tensor"));
            }
            None => return Err(ScriptError::type_error("len() of unsized object")),
        },
        other => {
            return Err(ScriptError::Type(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )));
        }
    };
    Ok(Obj::Int(count as i64))
}

fn abs(obj: &Obj) -> ScriptResult<Obj> {
    match obj {
        Obj::Bool(value) => Ok(Obj::Int(i64::from(*value))),
        Obj::Int(value) => Ok(value
            .checked_abs()
            .map_or(Obj::Float((*value as f64).abs()), Obj::Int)),
        Obj::Float(value) => Ok(Obj::Float(value.abs())),
        Obj::Complex(value) => Ok(Obj::Float(value.norm())),
        Obj::Array(array) => numeric::call(
            ModuleId::for_flavor(array.flavor()),
            "abs",
            &Args::positional(vec![obj.clone()]),
        ),
        other => Err(ScriptError::Type(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

fn is_less(lhs: &Obj, rhs: &Obj) -> ScriptResult<bool> {
    compare(CmpOp::Lt, lhs, rhs)?.truth()
}

fn extreme(name: &str, args: &Args) -> ScriptResult<Obj> {
    if args.keyword(&["key"]).is_some() {
        return Err(ScriptError::unsupported(format!(
            "{name}() with a key function is not supported"
        )));
    }
    let items = match args.positional.as_slice() {
        [] => {
            return Err(ScriptError::Type(format!(
                "{name} expected at least 1 argument, got 0"
            )));
        }
        [single] => single.iterate()?,
        many => many.to_vec(),
    };
    let mut items = items.into_iter();
    let Some(mut best) = items.next() else {
        if let Some(default) = args.keyword(&["default"]) {
            return Ok(default.clone());
        }
        return Err(ScriptError::Value(format!(
            "{name}() iterable argument is empty"
        )));
    };
    for item in items {
        let better = if name == "max" {
            is_less(&best, &item)?
        } else {
            is_less(&item, &best)?
        };
        if better {
            best = item;
        }
    }
    Ok(best)
}

fn modular_pow(base: &Obj, exponent: &Obj, modulus: &Obj) -> ScriptResult<Obj> {
    let (Obj::Int(base), Obj::Int(exponent), Obj::Int(modulus)) = (base, exponent, modulus) else {
        return Err(ScriptError::type_error(
            "pow() 3rd argument not allowed unless all arguments are integers",
        ));
    };
    if *modulus == 0 {
        return Err(ScriptError::value_error("pow() 3rd argument cannot be 0"));
    }
    if *exponent < 0 {
        return Err(ScriptError::unsupported(
            "pow() with a negative exponent and a modulus is not supported",
        ));
    }
    let modulus = i128::from(*modulus);
    let mut result: i128 = 1;
    let mut factor = i128::from(*base).rem_euclid(modulus);
    let mut remaining = *exponent;
    while remaining > 0 {
        if remaining & 1 == 1 {
            result = (result * factor).rem_euclid(modulus);
        }
        factor = (factor * factor).rem_euclid(modulus);
        remaining >>= 1;
    }
    // Python's result takes the sign of the modulus.
    if modulus < 0 && result > 0 {
        result += modulus;
    }
    Ok(Obj::Int(result as i64))
}

fn round(value: &Obj, ndigits: Option<&Obj>) -> ScriptResult<Obj> {
    let digits = ndigits.map(int_arg).transpose()?;
    match (value, digits) {
        (Obj::Bool(flag), _) => Ok(Obj::Int(i64::from(*flag))),
        (Obj::Int(number), None) => Ok(Obj::Int(*number)),
        (Obj::Int(number), Some(digits)) if digits >= 0 => Ok(Obj::Int(*number)),
        (Obj::Int(number), Some(digits)) => {
            let scale = 10f64.powi(digits.unsigned_abs().min(300) as i32);
            integral((*number as f64 / scale).round_ties_even() * scale)
        }
        (Obj::Float(number), None) => integral(number.round_ties_even()),
        (Obj::Float(number), Some(digits)) => Ok(Obj::Float(round_digits(*number, digits))),
        (Obj::Array(array), _) => {
            let mut args = vec![value.clone()];
            args.extend(digits.map(Obj::Int));
            numeric::call(
                ModuleId::for_flavor(array.flavor()),
                "round",
                &Args::positional(args),
            )
        }
        (other, _) => Err(ScriptError::Type(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}

/// Rounds through the shortest decimal text so halfway cases follow the
/// stored binary value, the way CPython does.
fn round_digits(value: f64, digits: i64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    if digits >= 0 {
        let precision = usize::try_from(digits.min(340)).unwrap_or(340);
        return format!("{value:.precision$}").parse().unwrap_or(value);
    }
    let scale = 10f64.powi(digits.unsigned_abs().min(308) as i32);
    (value / scale).round_ties_even() * scale
}

fn range(args: &Args) -> ScriptResult<Obj> {
    let bounds = args
        .positional
        .iter()
        .map(int_arg)
        .collect::<ScriptResult<Vec<_>>>()?;
    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => {
            return Err(ScriptError::Type(format!(
                "range expected at most 3 arguments, got {}",
                bounds.len()
            )));
        }
    };
    if step == 0 {
        return Err(ScriptError::value_error("range() arg 3 must not be zero"));
    }
    Ok(Obj::Range { start, stop, step })
}

fn sorted(iterable: &Obj, reverse: bool) -> ScriptResult<Obj> {
    let mut items = iterable.iterate()?;
    let mut failure = None;
    let mut order = |a: &Obj, b: &Obj| -> Ordering {
        if failure.is_some() {
            return Ordering::Equal;
        }
        let outcome = is_less(a, b).and_then(|less| {
            if less {
                Ok(Ordering::Less)
            } else if is_less(b, a)? {
                Ok(Ordering::Greater)
            } else {
                Ok(Ordering::Equal)
            }
        });
        outcome.unwrap_or_else(|err| {
            failure = Some(err);
            Ordering::Equal
        })
    };
    if reverse {
        items.sort_by(|a, b| order(b, a));
    } else {
        items.sort_by(|a, b| order(a, b));
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(Obj::List(items)),
    }
}

fn domain_error() -> ScriptError {
    ScriptError::value_error("math domain error")
}

fn range_error() -> ScriptError {
    ScriptError::Overflow("math range error".to_string())
}

/// Applies a one-argument libm function with CPython's error mapping: a NaN
/// from a non-NaN input is a domain error, an infinity from a finite input
/// is a range error when `overflows`, else a domain error.
fn math_1(x: f64, f: fn(f64) -> f64, overflows: bool) -> ScriptResult<Obj> {
    let result = f(x);
    if result.is_nan() && !x.is_nan() {
        return Err(domain_error());
    }
    if result.is_infinite() && x.is_finite() {
        return Err(if overflows { range_error() } else { domain_error() });
    }
    Ok(Obj::Float(result))
}

fn math_arg(args: &Args, index: usize, name: &str) -> ScriptResult<f64> {
    args.positional
        .get(index)
        .ok_or_else(|| {
            ScriptError::Type(format!(
                "{name}() missing required argument (pos {})",
                index + 1
            ))
        })
        .and_then(float_arg)
}

/// Calls `math.name(*args)`.
pub fn math_call(name: &str, args: &Args) -> ScriptResult<Obj> {
    let x = || math_arg(args, 0, name);
    let y = || math_arg(args, 1, name);
    match name {
        "sqrt" => math_1(x()?, f64::sqrt, false),
        "exp" => math_1(x()?, f64::exp, true),
        "expm1" => math_1(x()?, f64::exp_m1, true),
        "log" => {
            let value = x()?;
            if value <= 0.0 {
                return Err(domain_error());
            }
            match args.positional.get(1) {
                None => math_1(value, f64::ln, false),
                Some(base) => {
                    let base = float_arg(base)?;
                    if base <= 0.0 {
                        return Err(domain_error());
                    }
                    if base == 1.0 {
                        return Err(ScriptError::ZeroDivision("division by zero".to_string()));
                    }
                    Ok(Obj::Float(value.ln() / base.ln()))
                }
            }
        }
        "log2" | "log10" => {
            let value = x()?;
            if value <= 0.0 {
                return Err(domain_error());
            }
            let f = if name == "log2" { f64::log2 } else { f64::log10 };
            math_1(value, f, false)
        }
        "log1p" => {
            let value = x()?;
            if value <= -1.0 {
                return Err(domain_error());
            }
            math_1(value, f64::ln_1p, false)
        }
        "sin" => math_1(x()?, f64::sin, false),
        "cos" => math_1(x()?, f64::cos, false),
        "tan" => math_1(x()?, f64::tan, false),
        "asin" => math_1(x()?, f64::asin, false),
        "acos" => math_1(x()?, f64::acos, false),
        "atan" => math_1(x()?, f64::atan, false),
        "sinh" => math_1(x()?, f64::sinh, true),
        "cosh" => math_1(x()?, f64::cosh, true),
        "tanh" => math_1(x()?, f64::tanh, false),
        "asinh" => math_1(x()?, f64::asinh, false),
        "acosh" => math_1(x()?, f64::acosh, false),
        "atanh" => math_1(x()?, f64::atanh, false),
        "fabs" => Ok(Obj::Float(x()?.abs())),
        "degrees" => Ok(Obj::Float(x()?.to_degrees())),
        "radians" => Ok(Obj::Float(x()?.to_radians())),
        "atan2" => Ok(Obj::Float(x()?.atan2(y()?))),
        "copysign" => Ok(Obj::Float(x()?.copysign(y()?))),
        "hypot" => {
            let coords = args
                .positional
                .iter()
                .map(float_arg)
                .collect::<ScriptResult<Vec<_>>>()?;
            if coords.iter().any(|c| c.is_infinite()) {
                return Ok(Obj::Float(f64::INFINITY));
            }
            Ok(Obj::Float(coords.iter().map(|c| c * c).sum::<f64>().sqrt()))
        }
        "fmod" => {
            let (a, b) = (x()?, y()?);
            if b == 0.0 || a.is_infinite() {
                if a.is_nan() || b.is_nan() {
                    return Ok(Obj::Float(f64::NAN));
                }
                return Err(domain_error());
            }
            Ok(Obj::Float(a % b))
        }
        "pow" => {
            let (a, b) = (x()?, y()?);
            if a == 0.0 && b < 0.0 {
                return Err(domain_error());
            }
            let result = a.powf(b);
            if result.is_nan() && !a.is_nan() && !b.is_nan() {
                return Err(domain_error());
            }
            if result.is_infinite() && a.is_finite() && b.is_finite() {
                return Err(range_error());
            }
            Ok(Obj::Float(result))
        }
        "floor" | "ceil" | "trunc" => {
            let value = args.positional.first().ok_or_else(|| {
                ScriptError::Type(format!("{name}() missing required argument (pos 1)"))
            })?;
            if let Obj::Int(number) = value {
                return Ok(Obj::Int(*number));
            }
            let number = float_arg(value)?;
            integral(match name {
                "floor" => number.floor(),
                "ceil" => number.ceil(),
                _ => number.trunc(),
            })
        }
        "isnan" => Ok(Obj::Bool(x()?.is_nan())),
        "isinf" => Ok(Obj::Bool(x()?.is_infinite())),
        "isfinite" => Ok(Obj::Bool(x()?.is_finite())),
        "isclose" => {
            let (a, b) = (x()?, y()?);
            let rel_tol = args.keyword(&["rel_tol"]).map(float_arg).transpose()?.unwrap_or(1e-09);
            let abs_tol = args.keyword(&["abs_tol"]).map(float_arg).transpose()?.unwrap_or(0.0);
            if rel_tol < 0.0 || abs_tol < 0.0 {
                return Err(ScriptError::value_error("tolerances must be non-negative"));
            }
            let close = a == b
                || (a.is_finite()
                    && b.is_finite()
                    && (a - b).abs() <= (rel_tol * b.abs()).max(rel_tol * a.abs()).max(abs_tol));
            Ok(Obj::Bool(close))
        }
        "factorial" => {
            let value = args.positional.first().ok_or_else(|| {
                ScriptError::type_error("factorial() missing required argument (pos 1)")
            })?;
            let n = int_arg(value)?;
            if n < 0 {
                return Err(ScriptError::value_error(
                    "factorial() not defined for negative values",
                ));
            }
            let mut product: i64 = 1;
            for k in 2..=n {
                match product.checked_mul(k) {
                    Some(next) => product = next,
                    None => {
                        return Err(ScriptError::unsupported(format!(
                            "factorial({n}) exceeds 64-bit integers"
                        )));
                    }
                }
            }
            Ok(Obj::Int(product))
        }
        "gcd" => {
            let mut result: i64 = 0;
            for value in &args.positional {
                let mut a = result.unsigned_abs();
                let mut b = int_arg(value)?.unsigned_abs();
                while b != 0 {
                    (a, b) = (b, a % b);
                }
                result = i64::try_from(a).map_err(|_| {
                    ScriptError::unsupported("gcd() result exceeds 64-bit integers")
                })?;
            }
            Ok(Obj::Int(result))
        }
        "prod" => {
            let start = args.keyword(&["start"]).cloned().unwrap_or(Obj::Int(1));
            args.positional
                .first()
                .ok_or_else(|| ScriptError::type_error("prod() takes exactly 1 positional argument (0 given)"))?
                .iterate()?
                .iter()
                .try_fold(start, |total, item| binary(BinOp::Mul, &total, item))
        }
        "fsum" => {
            let items = args
                .positional
                .first()
                .ok_or_else(|| ScriptError::type_error("fsum() takes exactly one argument (0 given)"))?
                .iterate()?;
            let mut sum = 0.0f64;
            let mut compensation = 0.0f64;
            for item in &items {
                let value = float_arg(item)?;
                let total = sum + value;
                compensation += if sum.abs() >= value.abs() {
                    (sum - total) + value
                } else {
                    (value - total) + sum
                };
                sum = total;
            }
            Ok(Obj::Float(sum + compensation))
        }
        _ => Err(ScriptError::Attribute(format!(
            "module 'math' has no attribute '{name}'"
        ))),
    }
}

const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "lstrip", "rstrip", "startswith", "endswith", "replace", "split",
    "join",
];
const SEQUENCE_METHODS: &[&str] = &["count", "index"];
const LIST_MUTATORS: &[&str] = &["append", "extend", "insert", "pop", "remove", "sort", "reverse", "clear"];

/// `obj.name` for objects other than modules and arrays.
pub fn scalar_attr(obj: &Obj, name: &str) -> ScriptResult<Obj> {
    let bound = || Ok(Obj::Method(Box::new(obj.clone()), name.to_string()));
    match (obj, name) {
        (Obj::Bool(flag), "real") => Ok(Obj::Int(i64::from(*flag))),
        (Obj::Int(_) | Obj::Float(_), "real") => Ok(obj.clone()),
        (Obj::Bool(_) | Obj::Int(_), "imag") => Ok(Obj::Int(0)),
        (Obj::Float(_), "imag") => Ok(Obj::Float(0.0)),
        (Obj::Complex(value), "real") => Ok(Obj::Float(value.re)),
        (Obj::Complex(value), "imag") => Ok(Obj::Float(value.im)),
        (Obj::Float(_), "is_integer") => bound(),
        (Obj::Bool(_) | Obj::Int(_) | Obj::Float(_) | Obj::Complex(_), "conjugate") => bound(),
        (Obj::Str(_), _) if STR_METHODS.contains(&name) => bound(),
        (Obj::Str(_) | Obj::List(_) | Obj::Tuple(_), _) if SEQUENCE_METHODS.contains(&name) => {
            bound()
        }
        (Obj::List(_), _) if LIST_MUTATORS.contains(&name) => Err(ScriptError::unsupported(
            format!("list.{name}() mutates in place and is not supported"),
        )),
        (Obj::DType(dtype, _), "name") => Ok(Obj::Str(dtype.name().to_string())),
        (Obj::DType(dtype, _), "is_floating_point") => Ok(Obj::Bool(dtype.is_float())),
        _ => Err(ScriptError::Attribute(format!(
            "'{}' object has no attribute '{name}'",
            obj.type_name()
        ))),
    }
}

fn str_arg<'a>(args: &'a Args, index: usize, method: &str) -> ScriptResult<&'a str> {
    match args.positional.get(index) {
        Some(Obj::Str(text)) => Ok(text),
        Some(other) => Err(ScriptError::Type(format!(
            "{method}() argument must be str, not {}",
            other.type_name()
        ))),
        None => Err(ScriptError::Type(format!(
            "{method}() takes at least {} argument ({} given)",
            index + 1,
            args.positional.len()
        ))),
    }
}

/// Calls a bound method of a scalar, string or sequence receiver.
pub fn call_scalar_method(receiver: &Obj, name: &str, args: &Args) -> ScriptResult<Obj> {
    match (receiver, name) {
        (Obj::Complex(value), "conjugate") => Ok(Obj::Complex(value.conj())),
        (Obj::Bool(_) | Obj::Int(_), "conjugate") => Ok(Obj::Int(receiver.as_index().unwrap_or(0))),
        (Obj::Float(value), "conjugate") => Ok(Obj::Float(*value)),
        (Obj::Float(value), "is_integer") => {
            Ok(Obj::Bool(value.is_finite() && value.fract() == 0.0))
        }
        (Obj::Str(text), "upper") => Ok(Obj::Str(text.to_uppercase())),
        (Obj::Str(text), "lower") => Ok(Obj::Str(text.to_lowercase())),
        (Obj::Str(text), "strip") => Ok(Obj::Str(text.trim().to_string())),
        (Obj::Str(text), "lstrip") => Ok(Obj::Str(text.trim_start().to_string())),
        (Obj::Str(text), "rstrip") => Ok(Obj::Str(text.trim_end().to_string())),
        (Obj::Str(text), "startswith") => {
            Ok(Obj::Bool(text.starts_with(str_arg(args, 0, name)?)))
        }
        (Obj::Str(text), "endswith") => Ok(Obj::Bool(text.ends_with(str_arg(args, 0, name)?))),
        (Obj::Str(text), "replace") => Ok(Obj::Str(
            text.replace(str_arg(args, 0, name)?, str_arg(args, 1, name)?),
        )),
        (Obj::Str(text), "split") => {
            let parts: Vec<Obj> = match args.positional.first() {
                None | Some(Obj::None) => text
                    .split_whitespace()
                    .map(|part| Obj::Str(part.to_string()))
                    .collect(),
                Some(_) => {
                    let separator = str_arg(args, 0, name)?;
                    if separator.is_empty() {
                        return Err(ScriptError::value_error("empty separator"));
                    }
                    text.split(separator)
                        .map(|part| Obj::Str(part.to_string()))
                        .collect()
                }
            };
            Ok(Obj::List(parts))
        }
        (Obj::Str(text), "join") => {
            let items = args
                .positional
                .first()
                .ok_or_else(|| ScriptError::type_error("join() takes exactly one argument (0 given)"))?
                .iterate()?;
            let pieces = items
                .iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Obj::Str(piece) => Ok(piece.clone()),
                    other => Err(ScriptError::Type(format!(
                        "sequence item {index}: expected str instance, {} found",
                        other.type_name()
                    ))),
                })
                .collect::<ScriptResult<Vec<_>>>()?;
            Ok(Obj::Str(pieces.join(text)))
        }
        (Obj::Str(text), "count") => {
            let needle = str_arg(args, 0, name)?;
            let count = if needle.is_empty() {
                text.chars().count() + 1
            } else {
                text.matches(needle).count()
            };
            Ok(Obj::Int(count as i64))
        }
        (Obj::Str(text), "index") => {
            let needle = str_arg(args, 0, name)?;
            text.find(needle)
                .map(|byte| Obj::Int(text[..byte].chars().count() as i64))
                .ok_or_else(|| ScriptError::value_error("substring not found"))
        }
        (Obj::List(items) | Obj::Tuple(items), "count") => {
            let needle = args
                .positional
                .first()
                .ok_or_else(|| ScriptError::type_error("count() takes exactly one argument (0 given)"))?;
            let count = items.iter().filter(|item| ops::py_eq(item, needle)).count();
            Ok(Obj::Int(count as i64))
        }
        (Obj::List(items) | Obj::Tuple(items), "index") => {
            let needle = args
                .positional
                .first()
                .ok_or_else(|| ScriptError::type_error("index expected at least 1 argument, got 0"))?;
            items
                .iter()
                .position(|item| ops::py_eq(item, needle))
                .map(|position| Obj::Int(position as i64))
                .ok_or_else(|| {
                    let what = if matches!(receiver, Obj::List(_)) { "list" } else { "tuple" };
                    ScriptError::Value(format!("{what}.index(x): x not in {what}"))
                })
        }
        _ => Err(ScriptError::Attribute(format!(
            "'{}' object has no attribute '{name}'",
            receiver.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{call, call_scalar_method, math_call, scalar_attr};
    use crate::error::ScriptError;
    use crate::object::{Args, Obj};

    fn run(name: &str, args: Vec<Obj>) -> Result<Obj, ScriptError> {
        call(name, &Args::positional(args))
    }

    fn ints(values: &[i64]) -> Obj {
        Obj::List(values.iter().map(|v| Obj::Int(*v)).collect())
    }

    #[test]
    fn conversions_match_python() {
        assert_eq!(run("float", vec![Obj::Str(" 1e3 ".into())]), Ok(Obj::Float(1000.0)));
        assert_eq!(run("int", vec![Obj::Float(-2.7)]), Ok(Obj::Int(-2)));
        assert_eq!(
            run("int", vec![Obj::Str("x".into())])
                .expect_err("not a number")
                .to_string(),
            "invalid literal for int() with base 10: 'x'"
        );
        assert_eq!(
            run("int", vec![Obj::Float(f64::NAN)]).expect_err("nan").to_string(),
            "cannot convert float NaN to integer"
        );
        assert_eq!(run("bool", vec![ints(&[])]), Ok(Obj::Bool(false)));
        assert_eq!(run("str", vec![Obj::Float(0.1)]), Ok(Obj::Str("0.1".into())));
    }

    #[test]
    fn rounding_is_half_even() {
        assert_eq!(run("round", vec![Obj::Float(2.5)]), Ok(Obj::Int(2)));
        assert_eq!(run("round", vec![Obj::Float(3.5)]), Ok(Obj::Int(4)));
        assert_eq!(
            run("round", vec![Obj::Float(2.675), Obj::Int(2)]),
            Ok(Obj::Float(2.67))
        );
        assert_eq!(
            run("round", vec![Obj::Int(1250), Obj::Int(-2)]),
            Ok(Obj::Int(1200))
        );
    }

    #[test]
    fn aggregates_and_sequences() {
        assert_eq!(run("sum", vec![ints(&[1, 2, 3])]), Ok(Obj::Int(6)));
        assert_eq!(run("max", vec![Obj::Int(3), Obj::Float(4.5)]), Ok(Obj::Float(4.5)));
        assert_eq!(
            run("max", vec![ints(&[])]).expect_err("empty").to_string(),
            "max() iterable argument is empty"
        );
        assert_eq!(run("sorted", vec![ints(&[3, 1, 2])]), Ok(ints(&[1, 2, 3])));
        assert!(
            run("sorted", vec![Obj::List(vec![Obj::Int(1), Obj::Str("a".into())])])
                .expect_err("mixed types")
                .to_string()
                .starts_with("'<' not supported between instances of")
        );
        assert_eq!(
            run("pow", vec![Obj::Int(3), Obj::Int(4), Obj::Int(5)]),
            Ok(Obj::Int(1))
        );
        assert_eq!(
            run("range", vec![Obj::Int(0), Obj::Int(5), Obj::Int(0)])
                .expect_err("zero step")
                .to_string(),
            "range() arg 3 must not be zero"
        );
        assert_eq!(
            run("zip", vec![ints(&[1, 2]), ints(&[3])]),
            Ok(Obj::List(vec![Obj::Tuple(vec![Obj::Int(1), Obj::Int(3)])]))
        );
    }

    #[test]
    fn math_errors_follow_cpython() {
        let math = |name: &str, args: Vec<Obj>| math_call(name, &Args::positional(args));
        assert_eq!(
            math("sqrt", vec![Obj::Int(-1)]).expect_err("domain").to_string(),
            "math domain error"
        );
        assert_eq!(
            math("exp", vec![Obj::Int(1000)]).expect_err("range").to_string(),
            "math range error"
        );
        assert_eq!(math("floor", vec![Obj::Float(-1.5)]), Ok(Obj::Int(-2)));
        assert_eq!(
            math("ceil", vec![Obj::Float(f64::INFINITY)])
                .expect_err("inf")
                .to_string(),
            "cannot convert float infinity to integer"
        );
        assert_eq!(math("factorial", vec![Obj::Int(5)]), Ok(Obj::Int(120)));
        assert_eq!(math("gcd", vec![Obj::Int(12), Obj::Int(-18)]), Ok(Obj::Int(6)));
        assert_eq!(
            math(
                "fsum",
                vec![Obj::List(vec![
                    Obj::Float(1e100),
                    Obj::Float(1.0),
                    Obj::Float(-1e100),
                    Obj::Float(1.0)
                ])]
            ),
            Ok(Obj::Float(2.0))
        );
    }

    #[test]
    fn scalar_methods() {
        let text = Obj::Str("a,b".into());
        assert!(matches!(scalar_attr(&text, "split"), Ok(Obj::Method(..))));
        assert_eq!(
            call_scalar_method(&text, "split", &Args::positional(vec![Obj::Str(",".into())])),
            Ok(Obj::List(vec![Obj::Str("a".into()), Obj::Str("b".into())]))
        );
        assert_eq!(
            call_scalar_method(&Obj::Float(2.0), "is_integer", &Args::default()),
            Ok(Obj::Bool(true))
        );
        assert_eq!(scalar_attr(&Obj::Int(3), "real"), Ok(Obj::Int(3)));
        assert!(scalar_attr(&Obj::Int(3), "shape").is_err());
    }
}
