use num_complex::Complex64;
use xeq_core::pyfmt::{complex_repr, float_repr, str_repr};
use xeq_core::{NdArray, TensorValue, Value};

use crate::ScriptResult;
use crate::array::{Array, DType, Flavor};
use crate::error::ScriptError;
use crate::modules::ModuleId;

/// Largest `range` the interpreter will materialize.
const MAX_RANGE_LEN: i64 = 10_000_000;

/// A callable looked up from a module, or a builtin when `module` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub module: Option<ModuleId>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Obj {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex64),
    Str(String),
    List(Vec<Obj>),
    Tuple(Vec<Obj>),
    Range { start: i64, stop: i64, step: i64 },
    Array(Array),
    Module(ModuleId),
    Function(Function),
    /// A bound method: receiver and method name.
    Method(Box<Obj>, String),
    DType(DType, Flavor),
}

impl Obj {
    pub fn builtin(name: &str) -> Self {
        Self::Function(Function {
            module: None,
            name: name.to_string(),
        })
    }

    /// Wraps a library result. Zero-dimensional numpy results become Python
    /// scalars, the way numpy reductions hand back `np.float64` and friends.
    #[must_use]
    pub fn from_array(array: Array) -> Self {
        if array.flavor() == Flavor::Numpy && array.ndim() == 0 {
            if let Some(value) = array.item() {
                return scalar_of(value, array.dtype());
            }
        }
        Self::Array(array)
    }

    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::None => "NoneType".to_string(),
            Self::Bool(_) => "bool".to_string(),
            Self::Int(_) => "int".to_string(),
            Self::Float(_) => "float".to_string(),
            Self::Complex(_) => "complex".to_string(),
            Self::Str(_) => "str".to_string(),
            Self::List(_) => "list".to_string(),
            Self::Tuple(_) => "tuple".to_string(),
            Self::Range { .. } => "range".to_string(),
            Self::Array(array) => array.flavor().type_name().to_string(),
            Self::Module(_) => "module".to_string(),
            Self::Function(_) => "builtin_function_or_method".to_string(),
            Self::Method(..) => "method".to_string(),
            Self::DType(..) => "dtype".to_string(),
        }
    }

    /// Python truthiness.
    pub fn truth(&self) -> ScriptResult<bool> {
        Ok(match self {
            Self::None => false,
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
            Self::Float(value) => *value != 0.0,
            Self::Complex(value) => value.re != 0.0 || value.im != 0.0,
            Self::Str(text) => !text.is_empty(),
            Self::List(items) | Self::Tuple(items) => !items.is_empty(),
            Self::Range { start, stop, step } => range_len(*start, *stop, *step) > 0,
            Self::Array(array) => match array.item() {
                Some(value) => value != 0.0,
                None if array.size() == 0 && array.flavor() == Flavor::Numpy => false,
                None => return Err(ambiguous_truth(array)),
            },
            Self::Module(_) | Self::Function(_) | Self::Method(..) | Self::DType(..) => true,
        })
    }

    /// Python `repr()`.
    #[must_use]
    pub fn repr(&self) -> String {
        match self {
            Self::None => "None".to_string(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => float_repr(*value),
            Self::Complex(value) => complex_repr(*value),
            Self::Str(text) => str_repr(text),
            Self::List(items) => format!("[{}]", join_reprs(items)),
            Self::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            Self::Tuple(items) => format!("({})", join_reprs(items)),
            Self::Range { start, stop, step } if *step == 1 => format!("range({start}, {stop})"),
            Self::Range { start, stop, step } => format!("range({start}, {stop}, {step})"),
            Self::Array(array) => array.repr(),
            Self::Module(module) => format!("<module '{}'>", module.name()),
            Self::Function(Function { module: None, name }) => {
                format!("<built-in function {name}>")
            }
            Self::Function(Function {
                module: Some(module),
                name,
            }) => format!("<function {}.{name}>", module.name()),
            Self::Method(receiver, name) => {
                format!("<built-in method {name} of {} object>", receiver.type_name())
            }
            Self::DType(dtype, flavor) => match flavor {
                Flavor::Numpy => format!("dtype('{}')", dtype.name()),
                _ => dtype.display(*flavor),
            },
        }
    }

    /// Python `str()`.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Str(text) => text.clone(),
            Self::Array(array) => array.text(),
            Self::DType(dtype, Flavor::Numpy) => dtype.name().to_string(),
            other => other.repr(),
        }
    }

    /// Numeric view of Python scalars (`bool`, `int`, `float`).
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(value) => Some(f64::from(u8::from(*value))),
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Integer view for indices, axes and counts.
    #[must_use]
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Self::Bool(value) => Some(i64::from(*value)),
            Self::Int(value) => Some(*value),
            Self::Array(array) if array.dtype().is_integer() || array.dtype() == DType::Bool => {
                array.item().map(|value| value as i64)
            }
            _ => None,
        }
    }

    /// The elements produced by iterating over this object.
    pub fn iterate(&self) -> ScriptResult<Vec<Obj>> {
        match self {
            Self::List(items) | Self::Tuple(items) => Ok(items.clone()),
            Self::Str(text) => Ok(text.chars().map(|c| Self::Str(c.to_string())).collect()),
            Self::Range { start, stop, step } => {
                let len = range_len(*start, *stop, *step);
                if len > MAX_RANGE_LEN {
                    return Err(ScriptError::unsupported(format!(
                        "range of {len} elements is too large"
                    )));
                }
                Ok((0..len).map(|i| Self::Int(start + i * step)).collect())
            }
            Self::Array(array) => Ok(array
                .rows()?
                .into_iter()
                .map(Self::from_array)
                .collect()),
            other => Err(ScriptError::Type(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Converts the final binding into the value model consumed by the
    /// comparator.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::None => Value::None,
            Self::Bool(value) => Value::Bool(*value),
            Self::Int(value) => Value::Int(*value),
            Self::Float(value) => Value::Real(*value),
            Self::Complex(value) => Value::Complex(*value),
            Self::Str(text) => Value::Str(text.clone()),
            Self::List(items) => Value::List(items.iter().map(Self::to_value).collect()),
            Self::Tuple(items) => Value::Tuple(items.iter().map(Self::to_value).collect()),
            Self::Array(array) if array.flavor() == Flavor::Numpy => {
                Value::NdArray(ndarray_of(array))
            }
            Self::Array(array) => {
                let as_numpy = array.clone().with_flavor(Flavor::Numpy);
                Value::Tensor(TensorValue {
                    text: array.text(),
                    repr: array.repr(),
                    extracted: Ok(ndarray_of(&as_numpy)),
                })
            }
            other => Value::Opaque(other.repr()),
        }
    }
}

/// Call arguments after evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub positional: Vec<Obj>,
    pub keywords: Vec<(String, Obj)>,
}

impl Args {
    #[must_use]
    pub fn new(positional: Vec<Obj>, keywords: Vec<(String, Obj)>) -> Self {
        Self {
            positional,
            keywords,
        }
    }

    #[must_use]
    pub fn positional(positional: Vec<Obj>) -> Self {
        Self::new(positional, Vec::new())
    }

    /// Prepends a method receiver as the first positional argument.
    #[must_use]
    pub fn with_receiver(&self, receiver: Obj) -> Self {
        let mut positional = Vec::with_capacity(self.positional.len() + 1);
        positional.push(receiver);
        positional.extend(self.positional.iter().cloned());
        Self::new(positional, self.keywords.clone())
    }

    #[must_use]
    pub fn keyword(&self, names: &[&str]) -> Option<&Obj> {
        self.keywords
            .iter()
            .find(|(key, _)| names.contains(&key.as_str()))
            .map(|(_, value)| value)
    }

    /// Argument `index` by position, else by any of `names`.
    #[must_use]
    pub fn get(&self, index: usize, names: &[&str]) -> Option<&Obj> {
        self.positional
            .get(index)
            .or_else(|| self.keyword(names))
    }

    /// Like [`Args::get`], treating an explicit `None` as absent.
    #[must_use]
    pub fn optional(&self, index: usize, names: &[&str]) -> Option<&Obj> {
        self.get(index, names)
            .filter(|value| !matches!(value, Obj::None))
    }

    pub fn required(&self, index: usize, names: &[&str], func: &str) -> ScriptResult<&Obj> {
        self.get(index, names).ok_or_else(|| {
            ScriptError::Type(format!(
                "{func}() missing required argument '{}' (pos {})",
                names.first().copied().unwrap_or("arg"),
                index + 1
            ))
        })
    }

    #[must_use]
    pub fn flag(&self, names: &[&str]) -> bool {
        self.keyword(names)
            .is_some_and(|value| value.truth().unwrap_or(false))
    }
}

fn ndarray_of(array: &Array) -> NdArray {
    NdArray::numeric(array.shape().to_vec(), array.data().to_vec(), array.text())
        .with_repr(array.repr())
}

/// Python scalar for one element of `dtype`.
#[must_use]
pub fn scalar_of(value: f64, dtype: DType) -> Obj {
    match dtype {
        DType::Bool => Obj::Bool(value != 0.0),
        DType::Int32 | DType::Int64 => Obj::Int(value as i64),
        DType::Float32 | DType::Float64 => Obj::Float(value),
    }
}

#[must_use]
pub fn range_len(start: i64, stop: i64, step: i64) -> i64 {
    if step > 0 && start < stop {
        (stop - start - 1) / step + 1
    } else if step < 0 && start > stop {
        (start - stop - 1) / (-step) + 1
    } else {
        0
    }
}

fn join_reprs(items: &[Obj]) -> String {
    items.iter().map(Obj::repr).collect::<Vec<_>>().join(", ")
}

fn ambiguous_truth(array: &Array) -> ScriptError {
    match array.flavor() {
        Flavor::Torch => ScriptError::Runtime(
            "Boolean value of Tensor with more than one value is ambiguous".to_string(),
        ),
        _ => ScriptError::Value(
            "The truth value of an array with more than one element is ambiguous. Use a.any() or a.all()"
                .to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use xeq_core::Value;

    use super::{Obj, range_len};
    use crate::array::{Array, DType, Flavor};

    #[test]
    fn numpy_zero_dim_results_become_scalars() {
        let scalar = Array::scalar(2.5, DType::Float64, Flavor::Numpy);
        assert_eq!(Obj::from_array(scalar), Obj::Float(2.5));
        let flag = Array::scalar(1.0, DType::Bool, Flavor::Numpy);
        assert_eq!(Obj::from_array(flag), Obj::Bool(true));
        let tensor = Array::scalar(2.5, DType::Float32, Flavor::Torch);
        assert!(matches!(Obj::from_array(tensor), Obj::Array(_)));
    }

    #[test]
    fn reprs_follow_python() {
        assert_eq!(Obj::Tuple(vec![Obj::Int(1)]).repr(), "(1,)");
        assert_eq!(
            Obj::List(vec![Obj::Float(1.0), Obj::Str("a".into()), Obj::None]).repr(),
            "[1.0, 'a', None]"
        );
        assert_eq!(
            Obj::Range {
                start: 0,
                stop: 5,
                step: 1
            }
            .repr(),
            "range(0, 5)"
        );
        assert_eq!(Obj::Str("a".into()).text(), "a");
    }

    #[test]
    fn truthiness_rejects_multi_element_arrays() {
        let array = Array::new(vec![2], vec![1.0, 2.0], DType::Float64, Flavor::Numpy);
        let err = Obj::Array(array).truth().expect_err("ambiguous");
        assert!(err.to_string().starts_with("The truth value of an array"));
        assert_eq!(Obj::Str(String::new()).truth(), Ok(false));
    }

    #[test]
    fn ranges_count_like_python() {
        assert_eq!(range_len(0, 10, 3), 4);
        assert_eq!(range_len(10, 0, -3), 4);
        assert_eq!(range_len(0, 0, 1), 0);
        let items = Obj::Range {
            start: 5,
            stop: 0,
            step: -2,
        }
        .iterate()
        .expect("iterate");
        assert_eq!(items, vec![Obj::Int(5), Obj::Int(3), Obj::Int(1)]);
    }

    #[test]
    fn tensors_carry_numpy_extraction() {
        let tensor = Array::new(vec![2], vec![1.0, 2.0], DType::Float32, Flavor::Torch);
        let Value::Tensor(value) = Obj::Array(tensor).to_value() else {
            panic!("torch arrays convert to tensors");
        };
        let extracted = value.extracted.expect("extracted");
        assert_eq!(extracted.values(), Some(&[1.0, 2.0][..]));
        assert!(value.repr.starts_with("tensor("));
    }
}
