//! Flattening heterogeneous results into float vectors and measuring the
//! distance between them.

use thiserror::Error;
use xeq_core::pyfmt::parse_python_float;
use xeq_core::{ArrayData, NdArray, Value};

/// Stand-in for `+inf` (and its negation for `-inf`) before differencing.
pub const INFINITY_SUBSTITUTE: f64 = 1e10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("array is not numeric: {0}")]
    NonNumericArray(String),
}

/// Flattens `value` into a float vector.
pub fn normalize(value: &Value) -> Result<Vec<f64>, NormalizeError> {
    match value {
        Value::None => Ok(vec![0.0]),
        Value::Bool(flag) => Ok(vec![f64::from(u8::from(*flag))]),
        Value::Int(number) => Ok(vec![*number as f64]),
        Value::Real(number) => Ok(vec![*number]),
        Value::Complex(number) => Ok(vec![number.re, number.im]),
        Value::List(items) | Value::Tuple(items) => Ok(normalize_sequence(items)),
        Value::NdArray(array) => array_values(array),
        Value::Tensor(tensor) | Value::Deferred(tensor) => Ok(tensor
            .extracted
            .as_ref()
            .ok()
            .and_then(|array| array.values())
            .map_or_else(|| vec![0.0], <[f64]>::to_vec)),
        Value::Str(_) | Value::Opaque(_) => Ok(vec![text_length(value)]),
    }
}

fn array_values(array: &NdArray) -> Result<Vec<f64>, NormalizeError> {
    match &array.data {
        ArrayData::Numeric(values) => Ok(values.clone()),
        ArrayData::NonNumeric(reason) => Err(NormalizeError::NonNumericArray(reason.clone())),
    }
}

/// Coerces a sequence to a rectangular float array, falling back to the
/// length of each element's `str()`.
fn normalize_sequence(items: &[Value]) -> Vec<f64> {
    match rectangular(items) {
        Some(Block { values, .. }) => values,
        None => items.iter().map(text_length).collect(),
    }
}

struct Block {
    shape: Vec<usize>,
    values: Vec<f64>,
}

fn rectangular(items: &[Value]) -> Option<Block> {
    let mut inner_shape: Option<Vec<usize>> = None;
    let mut values = Vec::new();
    for item in items {
        let block = coerce_element(item)?;
        match &inner_shape {
            Some(shape) if *shape != block.shape => return None,
            Some(_) => {}
            None => inner_shape = Some(block.shape),
        }
        values.extend(block.values);
    }

    let mut shape = vec![items.len()];
    shape.extend(inner_shape.unwrap_or_default());
    Some(Block { shape, values })
}

fn coerce_element(value: &Value) -> Option<Block> {
    let scalar = |number: f64| Block {
        shape: Vec::new(),
        values: vec![number],
    };
    match value {
        Value::None => Some(scalar(f64::NAN)),
        Value::Bool(flag) => Some(scalar(f64::from(u8::from(*flag)))),
        Value::Int(number) => Some(scalar(*number as f64)),
        Value::Real(number) => Some(scalar(*number)),
        Value::Str(text) => parse_python_float(text).map(scalar),
        Value::List(items) | Value::Tuple(items) => rectangular(items),
        Value::NdArray(array) => array_block(array),
        Value::Tensor(tensor) | Value::Deferred(tensor) => {
            tensor.extracted.as_ref().ok().and_then(array_block)
        }
        Value::Complex(_) | Value::Opaque(_) => None,
    }
}

fn array_block(array: &NdArray) -> Option<Block> {
    array.values().map(|values| Block {
        shape: array.shape.clone(),
        values: values.to_vec(),
    })
}

fn text_length(value: &Value) -> f64 {
    value.python_str().chars().count() as f64
}

fn sanitize(number: f64) -> f64 {
    if number.is_nan() {
        0.0
    } else if number == f64::INFINITY {
        INFINITY_SUBSTITUTE
    } else if number == f64::NEG_INFINITY {
        -INFINITY_SUBSTITUTE
    } else {
        number
    }
}

/// L2 distance between two normalized vectors after replacing non-finite
/// entries and zero-padding the shorter one.
#[must_use]
pub fn vector_distance(lhs: &[f64], rhs: &[f64]) -> f64 {
    let len = lhs.len().max(rhs.len());
    (0..len)
        .map(|index| {
            let a = lhs.get(index).copied().map_or(0.0, sanitize);
            let b = rhs.get(index).copied().map_or(0.0, sanitize);
            (a - b) * (a - b)
        })
        .sum::<f64>()
        .sqrt()
}

/// Distance between two results; `+inf` when either cannot be normalized.
#[must_use]
pub fn distance(lhs: &Value, rhs: &Value) -> f64 {
    match (normalize(lhs), normalize(rhs)) {
        (Ok(lhs), Ok(rhs)) => vector_distance(&lhs, &rhs),
        _ => f64::INFINITY,
    }
}
