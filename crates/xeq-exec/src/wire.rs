//! Decoding of the single JSON line the python harness prints.

use num_complex::Complex64;
use serde::{Deserialize, Deserializer, de};
use xeq_core::{ArrayData, NdArray, TensorValue, Value};

use crate::Bindings;

/// Either the snippet's bindings or the message of the exception it raised.
pub(crate) type HarnessReply = Result<Bindings, String>;

#[derive(Debug, Deserialize)]
struct WireReply {
    ok: bool,
    #[serde(default)]
    bindings: Vec<(String, WireValue)>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum WireValue {
    None,
    Bool { value: bool },
    Int { value: i64 },
    Real { value: WireFloat },
    Complex { re: WireFloat, im: WireFloat },
    Str { value: String },
    List { items: Vec<WireValue> },
    Tuple { items: Vec<WireValue> },
    Ndarray(WireArray),
    Tensor(WireTensor),
    Deferred(WireTensor),
    Opaque { repr: String },
}

#[derive(Debug, Deserialize)]
struct WireArray {
    shape: Vec<usize>,
    #[serde(default)]
    data: Option<Vec<WireFloat>>,
    #[serde(default)]
    error: Option<String>,
    text: String,
    repr: String,
}

#[derive(Debug, Deserialize)]
struct WireTensor {
    text: String,
    repr: String,
    #[serde(default)]
    array: Option<WireArray>,
    #[serde(default)]
    error: Option<String>,
}

/// A float that may arrive as one of the strings `nan`, `inf`, `-inf`.
#[derive(Debug, Clone, Copy)]
struct WireFloat(f64);

impl<'de> Deserialize<'de> for WireFloat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Special(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(Self(value)),
            Raw::Special(text) => match text.as_str() {
                "nan" => Ok(Self(f64::NAN)),
                "inf" => Ok(Self(f64::INFINITY)),
                "-inf" => Ok(Self(f64::NEG_INFINITY)),
                other => Err(de::Error::custom(format!(
                    "invalid float literal '{other}'"
                ))),
            },
        }
    }
}

pub(crate) fn decode_reply(line: &str) -> Result<HarnessReply, serde_json::Error> {
    let reply: WireReply = serde_json::from_str(line)?;
    if !reply.ok {
        return Ok(Err(reply
            .error
            .unwrap_or_else(|| "python harness reported failure without a message".to_string())));
    }
    Ok(Ok(reply
        .bindings
        .into_iter()
        .map(|(name, value)| (name, value.into_value()))
        .collect()))
}

impl WireValue {
    fn into_value(self) -> Value {
        match self {
            Self::None => Value::None,
            Self::Bool { value } => Value::Bool(value),
            Self::Int { value } => Value::Int(value),
            Self::Real { value } => Value::Real(value.0),
            Self::Complex { re, im } => Value::Complex(Complex64::new(re.0, im.0)),
            Self::Str { value } => Value::Str(value),
            Self::List { items } => Value::List(items.into_iter().map(Self::into_value).collect()),
            Self::Tuple { items } => {
                Value::Tuple(items.into_iter().map(Self::into_value).collect())
            }
            Self::Ndarray(array) => Value::NdArray(array.into_array()),
            Self::Tensor(tensor) => Value::Tensor(tensor.into_tensor()),
            Self::Deferred(tensor) => Value::Deferred(tensor.into_tensor()),
            Self::Opaque { repr } => Value::Opaque(repr),
        }
    }
}

impl WireArray {
    fn into_array(self) -> NdArray {
        let data = match (self.data, self.error) {
            (Some(values), _) => ArrayData::Numeric(values.into_iter().map(|v| v.0).collect()),
            (None, Some(error)) => ArrayData::NonNumeric(error),
            (None, None) => ArrayData::NonNumeric("array data missing".to_string()),
        };
        NdArray {
            shape: self.shape,
            data,
            text: self.text,
            repr: self.repr,
        }
    }
}

impl WireTensor {
    fn into_tensor(self) -> TensorValue {
        let extracted = match (self.array, self.error) {
            (Some(array), _) => Ok(array.into_array()),
            (None, Some(error)) => Err(error),
            (None, None) => Err("tensor could not be converted".to_string()),
        };
        TensorValue {
            text: self.text,
            repr: self.repr,
            extracted,
        }
    }
}

#[cfg(test)]
mod tests {
    use xeq_core::{ArrayData, Value};

    use super::decode_reply;

    #[test]
    fn decodes_scalars_in_binding_order() {
        let line = r#"{"ok": true, "bindings": [
            ["b", {"kind": "bool", "value": true}],
            ["n", {"kind": "int", "value": -3}],
            ["x", {"kind": "real", "value": "-inf"}],
            ["c", {"kind": "complex", "re": 1.5, "im": "nan"}],
            ["s", {"kind": "str", "value": "hi"}],
            ["t", {"kind": "tuple", "items": [{"kind": "none"}, {"kind": "real", "value": 2}]}]
        ]}"#;
        let bindings = decode_reply(line)
            .expect("valid reply")
            .expect("successful run");
        let names: Vec<&str> = bindings.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["b", "n", "x", "c", "s", "t"]);
        assert_eq!(bindings[0].1, Value::Bool(true));
        assert_eq!(bindings[1].1, Value::Int(-3));
        assert_eq!(bindings[2].1, Value::Real(f64::NEG_INFINITY));
        match &bindings[3].1 {
            Value::Complex(value) => {
                assert_eq!(value.re, 1.5);
                assert!(value.im.is_nan());
            }
            other => panic!("expected complex, got {other:?}"),
        }
        assert_eq!(
            bindings[5].1,
            Value::Tuple(vec![Value::None, Value::Real(2.0)])
        );
    }

    #[test]
    fn decodes_arrays_and_tensors() {
        let line = r#"{"ok": true, "bindings": [
            ["a", {"kind": "ndarray", "shape": [2], "data": [1.0, "nan"], "text": "[ 1. nan]", "repr": "array([ 1., nan])"}],
            ["w", {"kind": "ndarray", "shape": [1], "error": "could not convert string to float: 'a'", "text": "['a']", "repr": "array(['a'], dtype='<U1')"}],
            ["t", {"kind": "tensor", "text": "tensor([2.])", "repr": "tensor([2.])",
                   "array": {"kind": "ndarray", "shape": [1], "data": [2.0], "text": "[2.]", "repr": "array([2.], dtype=float32)"}}],
            ["g", {"kind": "deferred", "text": "Tensor(...)", "repr": "<tf.Tensor ...>", "error": "no session"}]
        ]}"#;
        let bindings = decode_reply(line)
            .expect("valid reply")
            .expect("successful run");

        let Value::NdArray(array) = &bindings[0].1 else {
            panic!("expected ndarray");
        };
        assert_eq!(array.shape, vec![2]);
        let values = array.values().expect("numeric data");
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());

        let Value::NdArray(words) = &bindings[1].1 else {
            panic!("expected ndarray");
        };
        assert!(matches!(&words.data, ArrayData::NonNumeric(msg) if msg.contains("could not convert")));

        let Value::Tensor(tensor) = &bindings[2].1 else {
            panic!("expected tensor");
        };
        assert_eq!(tensor.text, "tensor([2.])");
        let extracted = tensor.extracted.as_ref().expect("extracted array");
        assert_eq!(extracted.values(), Some([2.0].as_slice()));

        let Value::Deferred(deferred) = &bindings[3].1 else {
            panic!("expected deferred");
        };
        assert_eq!(deferred.extracted, Err("no session".to_string()));
    }

    #[test]
    fn failure_reply_carries_exception_message() {
        let reply = decode_reply(r#"{"ok": false, "error": "division by zero"}"#)
            .expect("valid reply");
        assert_eq!(reply, Err("division by zero".to_string()));
    }

    #[test]
    fn unknown_kind_and_bad_float_are_rejected() {
        assert!(decode_reply(r#"{"ok": true, "bindings": [["x", {"kind": "set"}]]}"#).is_err());
        assert!(
            decode_reply(r#"{"ok": true, "bindings": [["x", {"kind": "real", "value": "huge"}]]}"#)
                .is_err()
        );
    }
}
