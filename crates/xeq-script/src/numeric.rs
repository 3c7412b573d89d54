//! Array-library functions shared by the numpy, torch, tensorflow and mlx
//! modules. The libraries spell the same operation differently; each entry
//! point maps its names onto one kernel and keeps the library's default
//! dtypes and error wording.

use std::cmp::Ordering;

use xeq_core::pyfmt::parse_python_float;

use crate::ScriptResult;
use crate::array::{Array, DType, Flavor, broadcast_shapes, numel, python_tuple, total_cmp_nan_last};
use crate::builtins;
use crate::error::ScriptError;
use crate::modules::ModuleId;
use crate::object::{Args, Function, Obj, scalar_of};
use crate::ops::{ElementOp, elementwise, operands};

/// Arrays larger than this are refused instead of allocated.
pub const MAX_ELEMENTS: usize = 50_000_000;

pub fn ensure_size(shape: &[usize]) -> ScriptResult<()> {
    let count = shape
        .iter()
        .try_fold(1usize, |acc, dim| acc.checked_mul(*dim));
    match count {
        Some(count) if count <= MAX_ELEMENTS => Ok(()),
        _ => Err(ScriptError::unsupported(format!(
            "array of shape {} is too large",
            python_tuple(shape)
        ))),
    }
}

/// `obj` as an array; existing arrays keep their library.
pub fn as_array(obj: &Obj, flavor: Flavor) -> ScriptResult<Array> {
    match obj {
        Obj::Array(array) => Ok(array.clone()),
        other => construct(other, flavor, None),
    }
}

/// Builds an array of `flavor` from nested sequences, scalars or another
/// library's array.
pub fn construct(obj: &Obj, flavor: Flavor, dtype: Option<DType>) -> ScriptResult<Array> {
    let array = match obj {
        Obj::Array(array) => array.clone().with_flavor(flavor),
        other => {
            let mut builder = Builder::default();
            builder.gather(other, 0, flavor)?;
            builder.finish(flavor)
        }
    };
    Ok(match dtype {
        Some(dtype) if dtype != array.dtype() => array.cast(dtype),
        _ => array,
    })
}

#[derive(Default)]
struct Builder {
    shape: Vec<usize>,
    data: Vec<f64>,
    dtype: Option<DType>,
    leaf_depth: Option<usize>,
}

impl Builder {
    fn gather(&mut self, obj: &Obj, depth: usize, flavor: Flavor) -> ScriptResult<()> {
        match obj {
            Obj::List(items) | Obj::Tuple(items) => self.gather_all(items, depth, flavor),
            Obj::Range { .. } => self.gather_all(&obj.iterate()?, depth, flavor),
            Obj::Array(array) => {
                for (offset, dim) in array.shape().iter().enumerate() {
                    self.enter(depth + offset, *dim, flavor)?;
                }
                self.leaf(depth + array.ndim(), flavor)?;
                self.data.extend_from_slice(array.data());
                self.merge(array.dtype());
                ensure_size(&[self.data.len()])
            }
            scalar => {
                let (value, dtype) = scalar_element(scalar, flavor)?;
                self.leaf(depth, flavor)?;
                self.data.push(value);
                self.merge(dtype);
                Ok(())
            }
        }
    }

    fn gather_all(&mut self, items: &[Obj], depth: usize, flavor: Flavor) -> ScriptResult<()> {
        self.enter(depth, items.len(), flavor)?;
        items
            .iter()
            .try_for_each(|item| self.gather(item, depth + 1, flavor))
    }

    fn enter(&mut self, depth: usize, len: usize, flavor: Flavor) -> ScriptResult<()> {
        if self.leaf_depth.is_some_and(|leaf| depth >= leaf) {
            return Err(self.inhomogeneous(depth, flavor, None));
        }
        match self.shape.get(depth) {
            None => {
                self.shape.push(len);
                Ok(())
            }
            Some(expected) if *expected == len => Ok(()),
            Some(expected) => Err(self.inhomogeneous(depth, flavor, Some((*expected, len)))),
        }
    }

    fn leaf(&mut self, depth: usize, flavor: Flavor) -> ScriptResult<()> {
        match self.leaf_depth {
            Some(existing) if existing != depth => {
                Err(self.inhomogeneous(depth.min(existing), flavor, None))
            }
            Some(_) => Ok(()),
            None if depth < self.shape.len() => Err(self.inhomogeneous(depth, flavor, None)),
            None => {
                self.leaf_depth = Some(depth);
                Ok(())
            }
        }
    }

    fn merge(&mut self, dtype: DType) {
        self.dtype = Some(self.dtype.map_or(dtype, |current| current.promote(dtype)));
    }

    fn inhomogeneous(
        &self,
        depth: usize,
        flavor: Flavor,
        lengths: Option<(usize, usize)>,
    ) -> ScriptError {
        match (flavor, lengths) {
            (Flavor::Torch, Some((expected, got))) => ScriptError::value_error(format!(
                "expected sequence of length {expected} at dim {depth} (got {got})"
            )),
            _ => ScriptError::value_error(format!(
                "setting an array element with a sequence. The requested array has an inhomogeneous shape after {depth} dimensions. The detected shape was {} + inhomogeneous part.",
                python_tuple(&self.shape[..depth.min(self.shape.len())])
            )),
        }
    }

    fn finish(self, flavor: Flavor) -> Array {
        let dtype = self.dtype.unwrap_or(flavor.default_float());
        Array::new(self.shape, self.data, dtype, flavor)
    }
}

fn scalar_element(obj: &Obj, flavor: Flavor) -> ScriptResult<(f64, DType)> {
    match obj {
        Obj::Bool(value) => Ok((f64::from(u8::from(*value)), DType::Bool)),
        Obj::Int(value) => Ok((*value as f64, flavor.default_int())),
        Obj::Float(value) => Ok((*value, flavor.default_float())),
        Obj::Complex(_) => Err(ScriptError::unsupported(
            "complex arrays are not supported",
        )),
        other if flavor == Flavor::Torch => Err(ScriptError::Type(format!(
            "new(): invalid data type '{}'",
            other.type_name()
        ))),
        other => Err(ScriptError::unsupported(format!(
            "arrays of '{}' objects are not supported",
            other.type_name()
        ))),
    }
}

pub fn int_arg(obj: &Obj) -> ScriptResult<i64> {
    obj.as_index().ok_or_else(|| {
        ScriptError::Type(format!(
            "'{}' object cannot be interpreted as an integer",
            obj.type_name()
        ))
    })
}

pub fn float_arg(obj: &Obj) -> ScriptResult<f64> {
    match obj {
        Obj::Array(array) => array.item().ok_or_else(|| scalar_conversion_error(array)),
        other => other.as_f64().ok_or_else(|| {
            ScriptError::Type(format!(
                "must be real number, not {}",
                other.type_name()
            ))
        }),
    }
}

pub fn scalar_conversion_error(array: &Array) -> ScriptError {
    match array.flavor() {
        Flavor::Torch => ScriptError::Runtime(format!(
            "a Tensor with {} elements cannot be converted to Scalar",
            array.size()
        )),
        _ => ScriptError::type_error("only length-1 arrays can be converted to Python scalars"),
    }
}

fn shape_arg(obj: &Obj) -> ScriptResult<Vec<i64>> {
    match obj {
        Obj::List(_) | Obj::Tuple(_) => obj.iterate()?.iter().map(int_arg).collect(),
        Obj::Array(array) if array.ndim() == 1 => {
            Ok(array.data().iter().map(|dim| *dim as i64).collect())
        }
        other => Ok(vec![int_arg(other)?]),
    }
}

fn dims(request: &[i64]) -> ScriptResult<Vec<usize>> {
    let shape = request
        .iter()
        .map(|dim| {
            usize::try_from(*dim)
                .map_err(|_| ScriptError::value_error("negative dimensions are not allowed"))
        })
        .collect::<ScriptResult<Vec<_>>>()?;
    ensure_size(&shape)?;
    Ok(shape)
}

/// Resolves a dtype argument: a library dtype, a builtin type or a name.
pub fn dtype_arg(obj: &Obj) -> ScriptResult<Option<DType>> {
    let named = |name: &str| match name {
        "float32" | "f4" | "single" => Some(DType::Float32),
        "float64" | "f8" | "float" | "double" => Some(DType::Float64),
        "int32" | "i4" => Some(DType::Int32),
        "int64" | "i8" | "int" | "long" => Some(DType::Int64),
        "bool" | "bool_" | "?" => Some(DType::Bool),
        _ => None,
    };
    let resolved = match obj {
        Obj::None => return Ok(None),
        Obj::DType(dtype, _) => Some(*dtype),
        Obj::Function(Function { module: None, name }) => named(name),
        Obj::Str(name) => named(name),
        _ => None,
    };
    resolved.map(Some).ok_or_else(|| {
        ScriptError::Type(format!("Cannot interpret '{}' as a data type", obj.repr()))
    })
}

fn axis_list(obj: &Obj) -> ScriptResult<Option<Vec<i64>>> {
    match obj {
        Obj::None => Ok(None),
        Obj::List(_) | Obj::Tuple(_) => Ok(Some(obj.iterate()?.iter().map(int_arg).collect::<ScriptResult<_>>()?)),
        other => Ok(Some(vec![int_arg(other)?])),
    }
}

fn torch_dtype_title(dtype: DType) -> &'static str {
    match dtype {
        DType::Bool => "Bool",
        DType::Int32 => "Int",
        DType::Int64 => "Long",
        DType::Float32 => "Float",
        DType::Float64 => "Double",
    }
}

#[derive(Clone, Copy)]
enum Unary {
    ToFloat(fn(f64) -> f64),
    Keep(fn(f64) -> f64),
    Round(fn(f64) -> f64),
    Test(fn(f64) -> bool),
}

fn unary_kernel(name: &str) -> Option<Unary> {
    use Unary::{Keep, Round, Test, ToFloat};
    Some(match name {
        "sqrt" => ToFloat(f64::sqrt),
        "rsqrt" => ToFloat(|x| x.sqrt().recip()),
        "exp" => ToFloat(f64::exp),
        "exp2" => ToFloat(f64::exp2),
        "log" => ToFloat(f64::ln),
        "log2" => ToFloat(f64::log2),
        "log10" => ToFloat(f64::log10),
        "log1p" => ToFloat(f64::ln_1p),
        "expm1" => ToFloat(f64::exp_m1),
        "sin" => ToFloat(f64::sin),
        "cos" => ToFloat(f64::cos),
        "tan" => ToFloat(f64::tan),
        "arcsin" | "asin" => ToFloat(f64::asin),
        "arccos" | "acos" => ToFloat(f64::acos),
        "arctan" | "atan" => ToFloat(f64::atan),
        "sinh" => ToFloat(f64::sinh),
        "cosh" => ToFloat(f64::cosh),
        "tanh" => ToFloat(f64::tanh),
        "sigmoid" => ToFloat(|x| 1.0 / (1.0 + (-x).exp())),
        "softplus" => ToFloat(|x| if x > 20.0 { x } else { x.exp().ln_1p() }),
        "reciprocal" => ToFloat(f64::recip),
        "abs" | "absolute" => Keep(f64::abs),
        "negative" | "neg" => Keep(|x| -x),
        "square" => Keep(|x| x * x),
        "sign" => Keep(|x| {
            if x.is_nan() || x == 0.0 {
                x * 0.0
            } else {
                x.signum()
            }
        }),
        "relu" => Keep(|x| if x > 0.0 || x.is_nan() { x } else { 0.0 }),
        "floor" => Round(f64::floor),
        "ceil" => Round(f64::ceil),
        "trunc" => Round(f64::trunc),
        "round" | "around" | "rint" => Round(f64::round_ties_even),
        "isnan" | "is_nan" => Test(f64::is_nan),
        "isinf" | "is_inf" => Test(f64::is_infinite),
        "isfinite" | "is_finite" => Test(f64::is_finite),
        "logical_not" => Test(|x| x == 0.0),
        _ => return None,
    })
}

fn binary_kernel(name: &str, flavor: Flavor) -> Option<ElementOp> {
    Some(match name {
        "add" => ElementOp::Add,
        "subtract" | "sub" => ElementOp::Sub,
        "multiply" | "mul" => ElementOp::Mul,
        "divide" | "div" | "true_divide" | "truediv" => ElementOp::Div,
        "floor_divide" | "floordiv" => ElementOp::FloorDiv,
        "mod" | "remainder" | "floormod" => ElementOp::Mod,
        "fmod" => ElementOp::Fmod,
        "power" | "pow" => ElementOp::Pow,
        "maximum" => ElementOp::Maximum,
        "minimum" => ElementOp::Minimum,
        "arctan2" | "atan2" => ElementOp::Atan2,
        "equal" if flavor != Flavor::Torch => ElementOp::Eq,
        "eq" => ElementOp::Eq,
        "not_equal" | "ne" => ElementOp::Ne,
        "less" | "lt" => ElementOp::Lt,
        "less_equal" | "le" => ElementOp::Le,
        "greater" | "gt" => ElementOp::Gt,
        "greater_equal" | "ge" => ElementOp::Ge,
        "logical_and" => ElementOp::LogicalAnd,
        "logical_or" => ElementOp::LogicalOr,
        "logical_xor" => ElementOp::LogicalXor,
        _ => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reduction {
    Sum,
    Prod,
    Mean,
    Max,
    Min,
    All,
    Any,
    Std,
    Var,
    Median,
    ArgMax,
    ArgMin,
}

fn reduction_kind(name: &str) -> Option<Reduction> {
    Some(match name {
        "sum" | "reduce_sum" => Reduction::Sum,
        "prod" | "reduce_prod" => Reduction::Prod,
        "mean" | "reduce_mean" => Reduction::Mean,
        "max" | "amax" | "reduce_max" => Reduction::Max,
        "min" | "amin" | "reduce_min" => Reduction::Min,
        "all" | "reduce_all" => Reduction::All,
        "any" | "reduce_any" => Reduction::Any,
        "std" | "reduce_std" => Reduction::Std,
        "var" | "reduce_variance" => Reduction::Var,
        "median" => Reduction::Median,
        "argmax" => Reduction::ArgMax,
        "argmin" => Reduction::ArgMin,
        _ => return None,
    })
}

impl Reduction {
    fn needs_elements(self) -> bool {
        matches!(self, Self::Max | Self::Min | Self::ArgMax | Self::ArgMin)
    }

    fn empty_error(self, flavor: Flavor, name: &str) -> ScriptError {
        if flavor == Flavor::Torch {
            return ScriptError::Runtime(format!(
                "{name}(): Expected reduction dim to be specified for input.numel() == 0. Specify the reduction dim with the 'dim' argument."
            ));
        }
        match self {
            Self::ArgMax => ScriptError::value_error("attempt to get argmax of an empty sequence"),
            Self::ArgMin => ScriptError::value_error("attempt to get argmin of an empty sequence"),
            Self::Min => ScriptError::value_error(
                "zero-size array to reduction operation minimum which has no identity",
            ),
            _ => ScriptError::value_error(
                "zero-size array to reduction operation maximum which has no identity",
            ),
        }
    }
}

fn reduce_lane(kind: Reduction, lane: &[f64], ddof: f64, flavor: Flavor) -> f64 {
    let count = lane.len() as f64;
    match kind {
        Reduction::Sum => lane.iter().sum(),
        Reduction::Prod => lane.iter().product(),
        Reduction::Mean => lane.iter().sum::<f64>() / count,
        Reduction::Max => nan_fold(lane, f64::max),
        Reduction::Min => nan_fold(lane, f64::min),
        Reduction::All => f64::from(u8::from(lane.iter().all(|v| *v != 0.0))),
        Reduction::Any => f64::from(u8::from(lane.iter().any(|v| *v != 0.0))),
        Reduction::Std => variance(lane, ddof).sqrt(),
        Reduction::Var => variance(lane, ddof),
        Reduction::Median => median(lane, flavor),
        Reduction::ArgMax => arg_extreme(lane, Ordering::Greater) as f64,
        Reduction::ArgMin => arg_extreme(lane, Ordering::Less) as f64,
    }
}

fn nan_fold(lane: &[f64], pick: fn(f64, f64) -> f64) -> f64 {
    if lane.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    lane.iter().copied().reduce(pick).unwrap_or(f64::NAN)
}

fn variance(lane: &[f64], ddof: f64) -> f64 {
    let count = lane.len() as f64;
    let mean = lane.iter().sum::<f64>() / count;
    let squares: f64 = lane.iter().map(|v| (v - mean) * (v - mean)).sum();
    let denominator = count - ddof;
    if denominator <= 0.0 {
        f64::NAN
    } else {
        squares / denominator
    }
}

fn median(lane: &[f64], flavor: Flavor) -> f64 {
    if lane.is_empty() || lane.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let mut sorted = lane.to_vec();
    sorted.sort_by(|a, b| total_cmp_nan_last(*a, *b));
    let mid = sorted.len() / 2;
    if flavor == Flavor::Torch {
        sorted[(sorted.len() - 1) / 2]
    } else if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Index of the first maximum (or minimum); a NaN wins at its first position.
fn arg_extreme(lane: &[f64], want: Ordering) -> usize {
    if let Some(position) = lane.iter().position(|v| v.is_nan()) {
        return position;
    }
    let mut best = 0;
    for (index, value) in lane.iter().enumerate().skip(1) {
        if value.partial_cmp(&lane[best]) == Some(want) {
            best = index;
        }
    }
    best
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NormOrder {
    Euclidean,
    Manhattan,
    Max,
    Min,
    Zero,
    P(f64),
}

fn vector_norm(lane: &[f64], order: NormOrder) -> f64 {
    let magnitudes = lane.iter().map(|v| v.abs());
    match order {
        NormOrder::Euclidean => magnitudes.map(|v| v * v).sum::<f64>().sqrt(),
        NormOrder::Manhattan => magnitudes.sum(),
        NormOrder::Max => nan_fold(&magnitudes.collect::<Vec<_>>(), f64::max),
        NormOrder::Min => nan_fold(&magnitudes.collect::<Vec<_>>(), f64::min),
        NormOrder::Zero => lane.iter().filter(|v| **v != 0.0).count() as f64,
        NormOrder::P(p) => magnitudes.map(|v| v.powf(p)).sum::<f64>().powf(p.recip()),
    }
}

fn softmax_lane(lane: &[f64], log: bool) -> Vec<f64> {
    let peak = nan_fold(lane, f64::max);
    let shifted: Vec<f64> = lane.iter().map(|v| v - peak).collect();
    let total: f64 = shifted.iter().map(|v| v.exp()).sum();
    if log {
        shifted.iter().map(|v| v - total.ln()).collect()
    } else {
        shifted.iter().map(|v| v.exp() / total).collect()
    }
}

/// Calls `module.name(*args)`.
pub fn call(module: ModuleId, name: &str, args: &Args) -> ScriptResult<Obj> {
    if module == ModuleId::Math {
        return builtins::math_call(name, args);
    }
    let lib = Lib {
        flavor: module.flavor(),
        name,
    };
    if let Some(kind) = unary_kernel(name) {
        return lib.unary(kind, args);
    }
    if let Some(op) = binary_kernel(name, lib.flavor) {
        return lib.binary(op, args);
    }
    if let Some(kind) = reduction_kind(name) {
        return lib.reduce(kind, args);
    }
    match name {
        "array" | "asarray" | "tensor" | "as_tensor" | "constant" | "convert_to_tensor"
        | "Variable" => lib.array_constructor(args),
        "Tensor" => lib.float_tensor(args),
        "from_numpy" => match args.required(0, &["ndarray"], name)? {
            Obj::Array(array) if array.flavor() == Flavor::Numpy => {
                Ok(Obj::Array(array.clone().with_flavor(Flavor::Torch)))
            }
            other => Err(ScriptError::Type(format!(
                "expected np.ndarray (got {})",
                other.type_name()
            ))),
        },
        "zeros" => lib.filled(args, 0.0),
        "ones" => lib.filled(args, 1.0),
        "full" => lib.full(args),
        "fill" => {
            let shape = dims(&shape_arg(args.required(0, &["dims"], name)?)?)?;
            let value = args.required(1, &["value"], name)?;
            let dtype = scalar_element(value, lib.flavor)?.1;
            Ok(Obj::Array(Array::filled(shape, float_arg(value)?, dtype, lib.flavor)))
        }
        "zeros_like" | "ones_like" | "full_like" => lib.like(args),
        "arange" | "range" => lib.arange(args),
        "linspace" => lib.linspace(args),
        "eye" | "identity" => lib.eye(args),
        "cumsum" | "cumprod" => lib.cumulative(args),
        "reshape" => {
            let input = lib.input(args, 0, &["a", "input", "tensor", "x"])?;
            let shape = shape_arg(args.required(1, &["shape", "newshape"], name)?)?;
            Ok(Obj::Array(input.reshape(&shape)?))
        }
        "ravel" | "flatten" => lib.flatten(args),
        "transpose" | "t" => lib.transpose(args),
        "squeeze" => {
            let input = lib.input(args, 0, &["a", "input", "x"])?;
            let axis = match args.optional(1, &["axis", "dim"]) {
                Some(axis) => Some(input.normalize_axis(int_arg(axis)?)?),
                None => None,
            };
            Ok(Obj::Array(input.squeeze(axis)?))
        }
        "expand_dims" | "unsqueeze" => {
            let input = lib.input(args, 0, &["a", "input", "x"])?;
            let axis = int_arg(args.required(1, &["axis", "dim"], name)?)?;
            Ok(Obj::Array(input.expand_dims(axis)?))
        }
        "concatenate" | "cat" | "concat" | "stack" => lib.join(args),
        "where" => lib.select_where(args),
        "clip" | "clamp" | "clip_by_value" => lib.clip(args),
        "matmul" | "mm" | "dot" => lib.matmul(args),
        "norm" => lib.norm(args),
        "softmax" | "log_softmax" => lib.softmax(args),
        "leaky_relu" => {
            let input = lib.input(args, 0, &["input", "features", "x"])?;
            let default_slope = if lib.flavor == Flavor::Tensorflow { 0.2 } else { 0.01 };
            let slope = args
                .optional(1, &["negative_slope", "alpha"])
                .map(float_arg)
                .transpose()?
                .unwrap_or(default_slope);
            let dtype = lib.float_dtype(input.dtype());
            Ok(Obj::from_array(input.map(dtype, |x| {
                if x >= 0.0 || x.is_nan() { x } else { slope * x }
            })))
        }
        "nan_to_num" => lib.nan_to_num(args),
        "allclose" | "isclose" | "array_equal" | "equal" => lib.closeness(args),
        "cast" => {
            let input = lib.input(args, 0, &["x"])?;
            let dtype = dtype_arg(args.required(1, &["dtype"], name)?)?;
            Ok(Obj::Array(dtype.map_or(input.clone(), |dtype| input.cast(dtype))))
        }
        "sort" => lib.sort(args),
        "eval" => Ok(Obj::None),
        _ => Err(ScriptError::Attribute(format!(
            "module '{}' has no attribute '{name}'",
            module.name()
        ))),
    }
}

struct Lib<'a> {
    flavor: Flavor,
    name: &'a str,
}

impl Lib<'_> {
    fn input(&self, args: &Args, index: usize, names: &[&str]) -> ScriptResult<Array> {
        self.array(args.required(index, names, self.name)?, index)
    }

    /// Converts an argument into this library's array; torch only accepts
    /// tensors.
    fn array(&self, obj: &Obj, position: usize) -> ScriptResult<Array> {
        match obj {
            Obj::Array(array) if array.flavor() == self.flavor => Ok(array.clone()),
            other if self.flavor == Flavor::Torch => Err(ScriptError::Type(format!(
                "{}(): argument 'input' (position {}) must be Tensor, not {}",
                self.name,
                position + 1,
                other.type_name()
            ))),
            other => construct(other, self.flavor, None),
        }
    }

    fn adopt(&self, obj: &Obj) -> ScriptResult<Obj> {
        match obj {
            Obj::Array(array) if array.flavor() != self.flavor && self.flavor != Flavor::Torch => {
                Ok(Obj::Array(array.clone().with_flavor(self.flavor)))
            }
            other => Ok(other.clone()),
        }
    }

    fn float_dtype(&self, dtype: DType) -> DType {
        if dtype.is_float() {
            dtype
        } else {
            self.flavor.default_float()
        }
    }

    fn explicit_dtype(&self, args: &Args, index: usize) -> ScriptResult<Option<DType>> {
        let found = if self.flavor == Flavor::Torch || self.name == "Variable" {
            args.keyword(&["dtype"])
        } else {
            args.get(index, &["dtype"])
        };
        found.map_or(Ok(None), dtype_arg)
    }

    fn unary(&self, kind: Unary, args: &Args) -> ScriptResult<Obj> {
        let input = self.input(args, 0, &["x", "input", "a", "features"])?;
        let dtype = input.dtype();
        let result = match kind {
            Unary::ToFloat(f) => input.map(self.float_dtype(dtype), f),
            Unary::Keep(f) => input.map(dtype, f),
            Unary::Round(f) => {
                let decimals = args
                    .optional(1, &["decimals"])
                    .map(int_arg)
                    .transpose()?
                    .unwrap_or(0);
                if !dtype.is_float() {
                    input
                } else if decimals == 0 {
                    input.map(dtype, f)
                } else {
                    let scale = 10f64.powi(decimals.clamp(-300, 300) as i32);
                    input.map(dtype, |x| (x * scale).round_ties_even() / scale)
                }
            }
            Unary::Test(f) => input.map(DType::Bool, |x| f64::from(u8::from(f(x)))),
        };
        Ok(Obj::from_array(result))
    }

    fn binary(&self, op: ElementOp, args: &Args) -> ScriptResult<Obj> {
        let lhs = args.required(0, &["x1", "x", "input", "a"], self.name)?;
        let rhs = args.required(1, &["x2", "y", "other", "b", "exponent"], self.name)?;
        let lhs = if self.flavor == Flavor::Torch {
            Obj::Array(self.array(lhs, 0)?)
        } else {
            self.adopt(lhs)?
        };
        elementwise(op, &lhs, &self.adopt(rhs)?, self.flavor)
    }

    fn reduction_dtype(&self, kind: Reduction, dtype: DType) -> ScriptResult<DType> {
        let flavor = self.flavor;
        Ok(match kind {
            Reduction::Sum | Reduction::Prod if dtype.is_float() => dtype,
            Reduction::Sum | Reduction::Prod => match flavor {
                Flavor::Numpy | Flavor::Torch => DType::Int64,
                Flavor::Tensorflow | Flavor::Mlx if dtype == DType::Bool => DType::Int32,
                Flavor::Tensorflow | Flavor::Mlx => dtype,
            },
            Reduction::Mean | Reduction::Std | Reduction::Var if dtype.is_float() => dtype,
            Reduction::Mean if flavor == Flavor::Torch => {
                return Err(ScriptError::Runtime(format!(
                    "mean(): could not infer output dtype. Input dtype must be either a floating point or complex dtype. Got: {}",
                    torch_dtype_title(dtype)
                )));
            }
            Reduction::Std | Reduction::Var if flavor == Flavor::Torch => {
                return Err(ScriptError::Runtime(
                    "std and var only support floating point and complex dtypes".to_string(),
                ));
            }
            Reduction::Mean if flavor == Flavor::Tensorflow => dtype,
            Reduction::Mean | Reduction::Std | Reduction::Var => flavor.default_float(),
            Reduction::Median if flavor == Flavor::Numpy && !dtype.is_float() => DType::Float64,
            Reduction::Median | Reduction::Max | Reduction::Min => dtype,
            Reduction::All | Reduction::Any => DType::Bool,
            Reduction::ArgMax | Reduction::ArgMin if flavor == Flavor::Mlx => DType::Int32,
            Reduction::ArgMax | Reduction::ArgMin => DType::Int64,
        })
    }

    fn ddof(&self, args: &Args, legacy_unbiased: Option<bool>) -> ScriptResult<f64> {
        if self.flavor != Flavor::Torch {
            return Ok(args
                .keyword(&["ddof", "correction"])
                .map(float_arg)
                .transpose()?
                .unwrap_or(0.0));
        }
        if let Some(correction) = args.keyword(&["correction"]) {
            return float_arg(correction);
        }
        let unbiased = match legacy_unbiased {
            Some(flag) => flag,
            None => args
                .keyword(&["unbiased"])
                .map(Obj::truth)
                .transpose()?
                .unwrap_or(true),
        };
        Ok(if unbiased { 1.0 } else { 0.0 })
    }

    fn reduce(&self, kind: Reduction, args: &Args) -> ScriptResult<Obj> {
        let input = self.input(args, 0, &["a", "input", "input_tensor", "x"])?;
        if self.flavor == Flavor::Torch && matches!(kind, Reduction::Max | Reduction::Min) {
            if let Some(Obj::Array(other)) = args.get(1, &["other"]) {
                let op = if kind == Reduction::Max {
                    ElementOp::Maximum
                } else {
                    ElementOp::Minimum
                };
                return elementwise(op, &Obj::Array(input), &Obj::Array(other.clone()), self.flavor);
            }
        }

        let mut legacy_unbiased = None;
        let mut axes = match args.get(1, &["axis", "dim"]) {
            Some(Obj::Bool(flag))
                if self.flavor == Flavor::Torch && matches!(kind, Reduction::Std | Reduction::Var) =>
            {
                legacy_unbiased = Some(*flag);
                None
            }
            Some(obj) => axis_list(obj)?,
            None => None,
        };
        if self.flavor == Flavor::Tensorflow
            && matches!(kind, Reduction::ArgMax | Reduction::ArgMin)
            && axes.is_none()
        {
            axes = Some(vec![0]);
        }
        let keepdims = args.flag(&["keepdims", "keepdim"]);
        let dtype = self.reduction_dtype(kind, input.dtype())?;
        let ddof = self.ddof(args, legacy_unbiased)?;
        let flavor = self.flavor;
        let kernel = |lane: &[f64]| reduce_lane(kind, lane, ddof, flavor);

        let Some(axes) = axes else {
            if kind.needs_elements() && input.size() == 0 {
                return Err(kind.empty_error(flavor, self.name));
            }
            let source = if matches!(kind, Reduction::ArgMax | Reduction::ArgMin) {
                input.flatten()
            } else {
                input
            };
            return Ok(Obj::from_array(source.reduce(None, keepdims, dtype, kernel)));
        };

        let mut normalized = axes
            .iter()
            .map(|axis| input.normalize_axis(*axis))
            .collect::<ScriptResult<Vec<_>>>()?;
        normalized.sort_unstable();
        normalized.dedup();
        if kind.needs_elements() && normalized.iter().any(|axis| input.shape()[*axis] == 0) {
            return Err(kind.empty_error(flavor, self.name));
        }

        if let [axis] = normalized.as_slice() {
            let values = input.reduce(Some(*axis), keepdims, dtype, kernel);
            let paired = matches!(kind, Reduction::Max | Reduction::Min | Reduction::Median);
            if flavor == Flavor::Torch && paired {
                let want = if kind == Reduction::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let indices = input.reduce(Some(*axis), keepdims, DType::Int64, |lane| {
                    if kind == Reduction::Median {
                        let target = median(lane, flavor);
                        lane.iter()
                            .position(|v| *v == target || (v.is_nan() && target.is_nan()))
                            .unwrap_or(0) as f64
                    } else {
                        arg_extreme(lane, want) as f64
                    }
                });
                return Ok(Obj::Tuple(vec![Obj::Array(values), Obj::Array(indices)]));
            }
            return Ok(Obj::from_array(values));
        }

        let separable = matches!(
            kind,
            Reduction::Sum
                | Reduction::Prod
                | Reduction::Mean
                | Reduction::Max
                | Reduction::Min
                | Reduction::All
                | Reduction::Any
        );
        if !separable {
            return Err(ScriptError::unsupported(format!(
                "{}() over several axes is not supported",
                self.name
            )));
        }
        let mut current = input.clone();
        for axis in &normalized {
            current = current.reduce(Some(*axis), true, dtype, kernel);
        }
        if !keepdims {
            let shape: Vec<i64> = current
                .shape()
                .iter()
                .enumerate()
                .filter(|(axis, _)| !normalized.contains(axis))
                .map(|(_, dim)| *dim as i64)
                .collect();
            current = current.reshape(&shape)?;
        }
        Ok(Obj::from_array(current))
    }

    fn cumulative(&self, args: &Args) -> ScriptResult<Obj> {
        let input = self.input(args, 0, &["a", "input", "x"])?;
        let axis = args.optional(1, &["axis", "dim"]).map(int_arg).transpose()?;
        let (source, axis) = match (axis, self.flavor) {
            (Some(axis), _) => {
                let axis = input.normalize_axis(axis)?;
                (input, axis)
            }
            (None, Flavor::Torch) => {
                return Err(ScriptError::Type(format!(
                    "{}() missing 1 required positional arguments: \"dim\"",
                    self.name
                )));
            }
            (None, Flavor::Tensorflow) => {
                let axis = input.normalize_axis(0)?;
                (input, axis)
            }
            (None, _) => (input.flatten(), 0),
        };
        let dtype = self.reduction_dtype(Reduction::Sum, source.dtype())?;
        let product = self.name == "cumprod";
        Ok(Obj::Array(source.map_lanes(axis, dtype, |lane| {
            let mut running = if product { 1.0 } else { 0.0 };
            lane.iter()
                .map(|value| {
                    running = if product { running * value } else { running + value };
                    running
                })
                .collect()
        })))
    }

    fn array_constructor(&self, args: &Args) -> ScriptResult<Obj> {
        let data = args.required(0, &["object", "data", "value", "initial_value", "a"], self.name)?;
        let dtype = self.explicit_dtype(args, 1)?;
        let array = construct(data, self.flavor, dtype)?;
        let Some(shape) = args.keyword(&["shape"]).filter(|_| self.flavor == Flavor::Tensorflow)
        else {
            return Ok(Obj::Array(array));
        };
        let shape = shape_arg(shape)?;
        Ok(Obj::Array(match array.item() {
            Some(value) => Array::filled(dims(&shape)?, value, array.dtype(), self.flavor),
            None => array.reshape(&shape)?,
        }))
    }

    fn float_tensor(&self, args: &Args) -> ScriptResult<Obj> {
        let sizes = !args.positional.is_empty()
            && args.positional.iter().all(|arg| matches!(arg, Obj::Int(_)));
        if sizes {
            return Err(ScriptError::unsupported(
                "torch.Tensor(*sizes) returns uninitialized memory",
            ));
        }
        let data = args.get(0, &["data"]).cloned().unwrap_or(Obj::List(Vec::new()));
        Ok(Obj::Array(construct(&data, self.flavor, Some(DType::Float32))?))
    }

    fn shape_from(&self, args: &Args) -> ScriptResult<Vec<usize>> {
        let varargs = self.flavor == Flavor::Torch
            && args.positional.len() > 1
            && args.positional.iter().all(|arg| matches!(arg, Obj::Int(_)));
        let request = if varargs {
            args.positional.iter().map(int_arg).collect::<ScriptResult<Vec<_>>>()?
        } else {
            shape_arg(args.required(0, &["shape", "size", "dims"], self.name)?)?
        };
        dims(&request)
    }

    fn filled(&self, args: &Args, value: f64) -> ScriptResult<Obj> {
        let shape = self.shape_from(args)?;
        let dtype = self
            .explicit_dtype(args, 1)?
            .unwrap_or(self.flavor.default_float());
        Ok(Obj::Array(Array::filled(shape, value, dtype, self.flavor)))
    }

    fn full(&self, args: &Args) -> ScriptResult<Obj> {
        let shape = dims(&shape_arg(args.required(0, &["shape", "size"], self.name)?)?)?;
        let fill = args.required(1, &["fill_value", "vals"], self.name)?;
        let dtype = match self.explicit_dtype(args, 2)? {
            Some(dtype) => dtype,
            None => match fill {
                Obj::Array(array) => array.dtype(),
                other => scalar_element(other, self.flavor)?.1,
            },
        };
        Ok(Obj::Array(Array::filled(shape, float_arg(fill)?, dtype, self.flavor)))
    }

    fn like(&self, args: &Args) -> ScriptResult<Obj> {
        let input = self.input(args, 0, &["a", "input", "x", "tensor"])?;
        let (value, dtype_index) = match self.name {
            "zeros_like" => (0.0, 1),
            "ones_like" => (1.0, 1),
            _ => (float_arg(args.required(1, &["fill_value"], self.name)?)?, 2),
        };
        let dtype = self.explicit_dtype(args, dtype_index)?.unwrap_or(input.dtype());
        Ok(Obj::Array(Array::filled(
            input.shape().to_vec(),
            value,
            dtype,
            self.flavor,
        )))
    }

    fn arange(&self, args: &Args) -> ScriptResult<Obj> {
        let positional: Vec<&Obj> = args
            .positional
            .iter()
            .take(3)
            .filter(|arg| !matches!(arg, Obj::DType(..)))
            .collect();
        let zero = Obj::Int(0);
        let one = Obj::Int(1);
        let keyword_stop = args.keyword(&["stop", "end", "limit"]);
        let keyword_step = args.keyword(&["step", "delta"]);
        let (start, stop, step) = match positional.as_slice() {
            [] => (
                args.keyword(&["start"]).unwrap_or(&zero),
                keyword_stop.ok_or_else(|| {
                    ScriptError::type_error(format!("{}() requires stop", self.name))
                })?,
                keyword_step.unwrap_or(&one),
            ),
            [stop] => match keyword_stop {
                Some(keyword_stop) => (*stop, keyword_stop, keyword_step.unwrap_or(&one)),
                None => (&zero, *stop, keyword_step.unwrap_or(&one)),
            },
            [start, stop] => (*start, *stop, keyword_step.unwrap_or(&one)),
            [start, stop, step, ..] => (*start, *stop, *step),
        };
        let any_float = [start, stop, step]
            .iter()
            .any(|value| matches!(value, Obj::Float(_)) || matches!(value, Obj::Array(a) if a.dtype().is_float()));
        let dtype = match args.keyword(&["dtype"]).map(dtype_arg).transpose()?.flatten() {
            Some(dtype) => dtype,
            None if any_float => self.flavor.default_float(),
            None => self.flavor.default_int(),
        };
        let (start, stop, step) = (float_arg(start)?, float_arg(stop)?, float_arg(step)?);
        if step == 0.0 {
            return Err(match self.flavor {
                Flavor::Numpy => ScriptError::ZeroDivision("division by zero".to_string()),
                Flavor::Torch => ScriptError::Runtime("step must be nonzero".to_string()),
                Flavor::Tensorflow | Flavor::Mlx => ScriptError::value_error("Requires delta != 0"),
            });
        }
        let count = ((stop - start) / step).ceil().max(0.0);
        if !count.is_finite() || count > MAX_ELEMENTS as f64 {
            return Err(ScriptError::unsupported("arange is too large"));
        }
        let count = count as usize;
        let data = (0..count).map(|i| start + i as f64 * step).collect();
        Ok(Obj::Array(Array::new(vec![count], data, dtype, self.flavor)))
    }

    fn linspace(&self, args: &Args) -> ScriptResult<Obj> {
        let start = float_arg(args.required(0, &["start"], self.name)?)?;
        let stop = float_arg(args.required(1, &["stop", "end"], self.name)?)?;
        let num = match args.get(2, &["num", "steps"]) {
            Some(num) => int_arg(num)?,
            None if matches!(self.flavor, Flavor::Torch | Flavor::Tensorflow) => {
                return Err(ScriptError::type_error(format!(
                    "{}() missing required argument 'steps' (pos 3)",
                    self.name
                )));
            }
            None => 50,
        };
        let Ok(num) = usize::try_from(num) else {
            return Err(match self.flavor {
                Flavor::Torch => {
                    ScriptError::Runtime("number of steps must be non-negative".to_string())
                }
                _ => ScriptError::Value(format!(
                    "Number of samples, {num}, must be non-negative."
                )),
            });
        };
        ensure_size(&[num])?;
        let endpoint = args
            .keyword(&["endpoint"])
            .map(Obj::truth)
            .transpose()?
            .unwrap_or(true);
        let dtype = args
            .keyword(&["dtype"])
            .map(dtype_arg)
            .transpose()?
            .flatten()
            .unwrap_or(self.flavor.default_float());
        let divisions = if endpoint { num.saturating_sub(1) } else { num };
        let step = if divisions == 0 {
            0.0
        } else {
            (stop - start) / divisions as f64
        };
        let mut data: Vec<f64> = (0..num).map(|i| start + i as f64 * step).collect();
        if endpoint && num > 1 {
            data[num - 1] = stop;
        }
        Ok(Obj::Array(Array::new(vec![num], data, dtype, self.flavor)))
    }

    fn eye(&self, args: &Args) -> ScriptResult<Obj> {
        let rows = int_arg(args.required(0, &["N", "n", "num_rows"], self.name)?)?;
        let cols = match args.optional(1, &["M", "m", "num_columns"]) {
            Some(cols) if self.name == "eye" => int_arg(cols)?,
            _ => rows,
        };
        let shape = dims(&[rows, cols])?;
        let dtype = args
            .keyword(&["dtype"])
            .map(dtype_arg)
            .transpose()?
            .flatten()
            .unwrap_or(self.flavor.default_float());
        let (rows, cols) = (shape[0], shape[1]);
        let data = (0..rows * cols)
            .map(|flat| if flat / cols == flat % cols { 1.0 } else { 0.0 })
            .collect();
        Ok(Obj::Array(Array::new(shape, data, dtype, self.flavor)))
    }

    fn flatten(&self, args: &Args) -> ScriptResult<Obj> {
        let input = self.input(args, 0, &["a", "input", "x"])?;
        let start = args
            .get(1, &["start_dim"])
            .filter(|arg| matches!(arg, Obj::Int(_)))
            .map(int_arg)
            .transpose()?;
        let Some(start) = start.filter(|_| input.ndim() > 1) else {
            return Ok(Obj::Array(input.flatten()));
        };
        let end = args
            .get(2, &["end_dim"])
            .map(int_arg)
            .transpose()?
            .unwrap_or(-1);
        let (start, end) = (input.normalize_axis(start)?, input.normalize_axis(end)?);
        if start > end {
            return Err(ScriptError::Runtime(
                "flatten() has invalid args: start_dim cannot come after end_dim".to_string(),
            ));
        }
        let shape = input.shape();
        let mut request: Vec<i64> = shape[..start].iter().map(|d| *d as i64).collect();
        request.push(numel(&shape[start..=end]) as i64);
        request.extend(shape[end + 1..].iter().map(|d| *d as i64));
        Ok(Obj::Array(input.reshape(&request)?))
    }

    fn transpose(&self, args: &Args) -> ScriptResult<Obj> {
        let input = self.input(args, 0, &["a", "input", "x"])?;
        if self.name == "t" {
            if input.ndim() > 2 {
                return Err(ScriptError::Runtime(format!(
                    "t() expects a tensor with <= 2 dimensions, but self is {}D",
                    input.ndim()
                )));
            }
            return Ok(Obj::Array(input.transpose(None)?));
        }
        if self.flavor == Flavor::Torch {
            let first = input.normalize_axis(int_arg(args.required(1, &["dim0"], self.name)?)?)?;
            let second = input.normalize_axis(int_arg(args.required(2, &["dim1"], self.name)?)?)?;
            let mut order: Vec<usize> = (0..input.ndim()).collect();
            order.swap(first, second);
            return Ok(Obj::Array(input.transpose(Some(&order))?));
        }
        let axes = match args.optional(1, &["axes", "perm"]) {
            Some(axes) => Some(
                shape_arg(axes)?
                    .into_iter()
                    .map(|axis| input.normalize_axis(axis))
                    .collect::<ScriptResult<Vec<_>>>()?,
            ),
            None => None,
        };
        Ok(Obj::Array(input.transpose(axes.as_deref())?))
    }

    fn join(&self, args: &Args) -> ScriptResult<Obj> {
        let sequence = args.required(0, &["arrays", "tensors", "values", "seq"], self.name)?;
        let arrays = sequence
            .iterate()?
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Obj::Array(array) if self.flavor != Flavor::Torch || array.flavor() == Flavor::Torch => {
                    Ok(array.clone().with_flavor(self.flavor))
                }
                other if self.flavor == Flavor::Torch => Err(ScriptError::Type(format!(
                    "expected Tensor as element {index} in argument 0, but got {}",
                    other.type_name()
                ))),
                other => construct(other, self.flavor, None),
            })
            .collect::<ScriptResult<Vec<_>>>()?;
        let axis_arg = args.get(1, &["axis", "dim"]);
        if self.name == "stack" {
            let axis = axis_arg.map(int_arg).transpose()?.unwrap_or(0);
            return Ok(Obj::Array(Array::stack(&arrays, axis)?));
        }
        if matches!(axis_arg, Some(Obj::None)) {
            let flat: Vec<Array> = arrays.iter().map(Array::flatten).collect();
            return Ok(Obj::Array(Array::concatenate(&flat, 0)?));
        }
        let axis = axis_arg.map(int_arg).transpose()?.unwrap_or(0);
        Ok(Obj::Array(Array::concatenate(&arrays, axis)?))
    }

    fn select_where(&self, args: &Args) -> ScriptResult<Obj> {
        let condition = args.required(0, &["condition", "cond"], self.name)?;
        let (Some(on_true), Some(on_false)) = (
            args.get(1, &["x", "input"]),
            args.get(2, &["y", "other"]),
        ) else {
            return Err(ScriptError::unsupported(
                "where() with a single argument is not supported",
            ));
        };
        let mask = as_array(&self.adopt(condition)?, self.flavor)?;
        let (a, b) = operands(&self.adopt(on_true)?, &self.adopt(on_false)?, self.flavor)?;
        let flavor = a.flavor().combine(b.flavor());
        let shape = broadcast_shapes(mask.shape(), a.shape(), flavor)?;
        let shape = broadcast_shapes(&shape, b.shape(), flavor)?;
        ensure_size(&shape)?;
        let (mask, a, b) = (
            mask.broadcast_to(&shape)?,
            a.broadcast_to(&shape)?,
            b.broadcast_to(&shape)?,
        );
        let data = mask
            .data()
            .iter()
            .zip(a.data().iter().zip(b.data()))
            .map(|(keep, (x, y))| if *keep != 0.0 { *x } else { *y })
            .collect();
        let dtype = a.dtype().promote(b.dtype());
        Ok(Obj::Array(Array::new(shape, data, dtype, flavor)))
    }

    fn clip(&self, args: &Args) -> ScriptResult<Obj> {
        let input = self.input(args, 0, &["a", "input", "x", "t"])?;
        let low = args.optional(1, &["a_min", "min", "clip_value_min"]);
        let high = args.optional(2, &["a_max", "max", "clip_value_max"]);
        if low.is_none() && high.is_none() {
            return Err(match self.flavor {
                Flavor::Torch => ScriptError::Runtime(
                    "torch.clamp: At least one of 'min' or 'max' must not be None".to_string(),
                ),
                _ => ScriptError::value_error("One of max or min must be given"),
            });
        }
        let float_bound = [low, high]
            .iter()
            .flatten()
            .any(|bound| matches!(bound, Obj::Float(_)));
        let dtype = if float_bound {
            self.float_dtype(input.dtype())
        } else {
            input.dtype()
        };
        let low = low.map(float_arg).transpose()?;
        let high = high.map(float_arg).transpose()?;
        Ok(Obj::from_array(input.map(dtype, |x| {
            if x.is_nan() {
                return x;
            }
            let raised = low.map_or(x, |low| x.max(low));
            high.map_or(raised, |high| raised.min(high))
        })))
    }

    fn matmul(&self, args: &Args) -> ScriptResult<Obj> {
        let a = self.input(args, 0, &["a", "input", "x1"])?;
        let b = self.array(args.required(1, &["b", "other", "mat2", "x2", "tensor"], self.name)?, 1)?;
        match self.name {
            "dot" if self.flavor == Flavor::Torch && (a.ndim() != 1 || b.ndim() != 1) => {
                Err(ScriptError::Runtime(format!(
                    "1D tensors expected, but got {}D and {}D tensors",
                    a.ndim(),
                    b.ndim()
                )))
            }
            "mm" if a.ndim() != 2 || b.ndim() != 2 => {
                Err(ScriptError::Runtime("self must be a matrix".to_string()))
            }
            "dot" if a.ndim() == 0 || b.ndim() == 0 => {
                elementwise(ElementOp::Mul, &Obj::Array(a), &Obj::Array(b), self.flavor)
            }
            _ => Ok(Obj::from_array(Array::matmul(&a, &b)?)),
        }
    }

    fn norm(&self, args: &Args) -> ScriptResult<Obj> {
        let input = self.input(args, 0, &["x", "input", "tensor", "A"])?;
        let order = match args.optional(1, &["ord", "p"]) {
            None => None,
            Some(Obj::Str(name)) if name == "fro" || name == "euclidean" => None,
            Some(Obj::Str(name)) => {
                return Err(ScriptError::unsupported(format!(
                    "norm order '{name}' is not supported"
                )));
            }
            Some(other) => Some(float_arg(other)?),
        };
        let vector_order = match order {
            None => NormOrder::Euclidean,
            Some(p) if p == 2.0 => NormOrder::Euclidean,
            Some(p) if p == 1.0 => NormOrder::Manhattan,
            Some(p) if p == f64::INFINITY => NormOrder::Max,
            Some(p) if p == f64::NEG_INFINITY => NormOrder::Min,
            Some(p) if p == 0.0 => NormOrder::Zero,
            Some(p) => NormOrder::P(p),
        };
        let axes = args
            .optional(2, &["axis", "dim"])
            .map(axis_list)
            .transpose()?
            .flatten();
        let keepdims = args.flag(&["keepdims", "keepdim"]);
        let dtype = if input.dtype().is_float() {
            input.dtype()
        } else if self.flavor == Flavor::Torch {
            return Err(ScriptError::Runtime(format!(
                "linalg.vector_norm: Expected a floating point or complex tensor as input. Got {}",
                torch_dtype_title(input.dtype())
            )));
        } else {
            self.flavor.default_float()
        };

        match axes.as_deref() {
            None if self.flavor == Flavor::Numpy && input.ndim() == 2 && order.is_some() => {
                self.matrix_norm(&input, vector_order, keepdims, dtype)
            }
            None => Ok(Obj::from_array(input.reduce(None, keepdims, dtype, |lane| {
                vector_norm(lane, vector_order)
            }))),
            Some([axis]) => {
                let axis = input.normalize_axis(*axis)?;
                Ok(Obj::from_array(input.reduce(Some(axis), keepdims, dtype, |lane| {
                    vector_norm(lane, vector_order)
                })))
            }
            Some(_) => Err(ScriptError::unsupported(
                "norm over several axes is not supported",
            )),
        }
    }

    fn matrix_norm(
        &self,
        input: &Array,
        order: NormOrder,
        keepdims: bool,
        dtype: DType,
    ) -> ScriptResult<Obj> {
        let (reduce_first, pick): (usize, fn(f64, f64) -> f64) = match order {
            NormOrder::Manhattan => (0, f64::max),
            NormOrder::Max => (1, f64::max),
            _ => {
                return Err(ScriptError::unsupported(
                    "matrix norms other than Frobenius, 1 and inf are not supported",
                ));
            }
        };
        let sums = input.reduce(Some(reduce_first), true, dtype, |lane| {
            lane.iter().map(|v| v.abs()).sum()
        });
        Ok(Obj::from_array(sums.reduce(None, keepdims, dtype, |lane| {
            nan_fold(lane, pick)
        })))
    }

    fn softmax(&self, args: &Args) -> ScriptResult<Obj> {
        let input = self.input(args, 0, &["x", "input", "logits", "a"])?;
        let log = self.name == "log_softmax";
        let requested = args.optional(1, &["axis", "dim"]).map(int_arg).transpose()?;
        let axis = match (requested, self.flavor) {
            (Some(axis), _) => Some(input.normalize_axis(axis)?),
            (None, Flavor::Torch) if input.ndim() > 0 => {
                Some(if matches!(input.ndim(), 1 | 3) { 0 } else { 1 })
            }
            (None, Flavor::Tensorflow) if input.ndim() > 0 => Some(input.ndim() - 1),
            (None, _) => None,
        };
        let dtype = self.float_dtype(input.dtype());
        let result = match axis {
            Some(axis) => input.map_lanes(axis, dtype, |lane| softmax_lane(lane, log)),
            None => {
                let shape: Vec<i64> = input.shape().iter().map(|d| *d as i64).collect();
                input
                    .flatten()
                    .map_lanes(0, dtype, |lane| softmax_lane(lane, log))
                    .reshape(&shape)?
            }
        };
        Ok(Obj::from_array(result))
    }

    fn nan_to_num(&self, args: &Args) -> ScriptResult<Obj> {
        let input = self.input(args, 0, &["x", "input"])?;
        if !input.dtype().is_float() {
            return Ok(Obj::from_array(input));
        }
        let positional = |index: usize| {
            if self.flavor == Flavor::Torch {
                args.positional.get(index)
            } else {
                None
            }
        };
        let pick = |index: usize, name: &str| {
            positional(index)
                .or_else(|| args.keyword(&[name]))
                .filter(|value| !matches!(value, Obj::None))
                .map(float_arg)
                .transpose()
        };
        let largest = if input.dtype() == DType::Float32 {
            f64::from(f32::MAX)
        } else {
            f64::MAX
        };
        let nan = pick(1, "nan")?.unwrap_or(0.0);
        let posinf = pick(2, "posinf")?.unwrap_or(largest);
        let neginf = pick(3, "neginf")?.unwrap_or(-largest);
        Ok(Obj::from_array(input.map(input.dtype(), |x| {
            if x.is_nan() {
                nan
            } else if x == f64::INFINITY {
                posinf
            } else if x == f64::NEG_INFINITY {
                neginf
            } else {
                x
            }
        })))
    }

    fn closeness(&self, args: &Args) -> ScriptResult<Obj> {
        let a = self.input(args, 0, &["a", "input", "x1"])?;
        let b = self.array(args.required(1, &["b", "other", "x2"], self.name)?, 1)?;
        if matches!(self.name, "array_equal" | "equal") {
            return Ok(Obj::Bool(a.shape() == b.shape() && a.data() == b.data()));
        }
        let rtol = args.get(2, &["rtol"]).map(float_arg).transpose()?.unwrap_or(1e-05);
        let atol = args.get(3, &["atol"]).map(float_arg).transpose()?.unwrap_or(1e-08);
        let equal_nan = args
            .get(4, &["equal_nan"])
            .map(Obj::truth)
            .transpose()?
            .unwrap_or(false);
        let close = Array::isclose(&a, &b, rtol, atol, equal_nan)?;
        if self.name == "isclose" {
            return Ok(Obj::from_array(close));
        }
        Ok(Obj::Bool(close.data().iter().all(|v| *v != 0.0)))
    }

    fn sort(&self, args: &Args) -> ScriptResult<Obj> {
        let input = self.input(args, 0, &["a", "input", "values"])?;
        let (source, axis) = match args.get(1, &["axis", "dim"]) {
            Some(Obj::None) => (input.flatten(), 0),
            Some(axis) => {
                let axis = input.normalize_axis(int_arg(axis)?)?;
                (input, axis)
            }
            None => {
                let axis = input.normalize_axis(-1)?;
                (input, axis)
            }
        };
        let descending = args.flag(&["descending"])
            || matches!(args.keyword(&["direction"]), Some(Obj::Str(direction)) if direction == "DESCENDING");
        let order = |lane: &[f64]| {
            let mut positions: Vec<usize> = (0..lane.len()).collect();
            positions.sort_by(|a, b| total_cmp_nan_last(lane[*a], lane[*b]));
            if descending {
                positions.reverse();
            }
            positions
        };
        let values = source.map_lanes(axis, source.dtype(), |lane| {
            order(lane).into_iter().map(|position| lane[position]).collect()
        });
        if self.flavor != Flavor::Torch {
            return Ok(Obj::Array(values));
        }
        let indices = source.map_lanes(axis, DType::Int64, |lane| {
            order(lane).into_iter().map(|position| position as f64).collect()
        });
        Ok(Obj::Tuple(vec![Obj::Array(values), Obj::Array(indices)]))
    }
}

/// Calling a dtype object, e.g. `np.float32(1.5)`.
pub fn dtype_call(dtype: DType, flavor: Flavor, args: &Args) -> ScriptResult<Obj> {
    if flavor != Flavor::Numpy {
        let owner = match flavor {
            Flavor::Torch => "torch.dtype",
            Flavor::Tensorflow => "DType",
            Flavor::Numpy | Flavor::Mlx => "mlx.core.Dtype",
        };
        return Err(ScriptError::Type(format!("'{owner}' object is not callable")));
    }
    let Some(value) = args.positional.first() else {
        return Ok(scalar_of(0.0, dtype));
    };
    match value {
        Obj::List(_) | Obj::Tuple(_) | Obj::Array(_) => {
            Ok(Obj::from_array(construct(value, flavor, Some(dtype))?))
        }
        Obj::Str(text) => {
            let parsed = parse_python_float(text).ok_or_else(|| {
                ScriptError::Value(format!("could not convert string to float: '{text}'"))
            })?;
            Ok(scalar_of(dtype.coerce(parsed), dtype))
        }
        other => Ok(scalar_of(dtype.coerce(float_arg(other)?), dtype)),
    }
}

const NUMPY_METHODS: &[&str] = &[
    "sum", "mean", "max", "min", "prod", "std", "var", "argmax", "argmin", "all", "any", "cumsum",
    "cumprod", "reshape", "flatten", "ravel", "transpose", "squeeze", "astype", "tolist", "item",
    "copy", "clip", "round", "dot",
];

const TORCH_METHODS: &[&str] = &[
    "sum", "mean", "max", "min", "prod", "std", "var", "argmax", "argmin", "all", "any", "cumsum",
    "cumprod", "reshape", "view", "flatten", "transpose", "squeeze", "unsqueeze", "tolist", "item",
    "clone", "detach", "cpu", "numpy", "float", "double", "int", "long", "bool", "to", "abs",
    "sqrt", "exp", "log", "sin", "cos", "tanh", "sigmoid", "relu", "neg", "pow", "add", "sub",
    "mul", "div", "matmul", "size", "dim", "numel", "t", "clamp", "floor", "ceil", "round", "sign",
    "square", "reciprocal", "isnan", "softmax", "norm", "sort", "median", "contiguous",
];

const TF_METHODS: &[&str] = &["numpy"];

const MLX_METHODS: &[&str] = &[
    "sum", "mean", "max", "min", "prod", "std", "var", "argmax", "argmin", "all", "any", "cumsum",
    "reshape", "flatten", "transpose", "squeeze", "astype", "tolist", "item", "abs", "sqrt", "exp",
    "log", "square", "round",
];

fn qualified_type_name(flavor: Flavor) -> &'static str {
    match flavor {
        Flavor::Numpy => "numpy.ndarray",
        Flavor::Torch => "Tensor",
        Flavor::Tensorflow => "tensorflow.python.framework.ops.EagerTensor",
        Flavor::Mlx => "mlx.core.array",
    }
}

/// `array.name` for data attributes; methods come back bound.
pub fn array_attr(array: &Array, name: &str) -> ScriptResult<Obj> {
    let flavor = array.flavor();
    let methods = match flavor {
        Flavor::Numpy => NUMPY_METHODS,
        Flavor::Torch => TORCH_METHODS,
        Flavor::Tensorflow => TF_METHODS,
        Flavor::Mlx => MLX_METHODS,
    };
    match name {
        "shape" => Ok(Obj::Tuple(
            array.shape().iter().map(|dim| Obj::Int(*dim as i64)).collect(),
        )),
        "ndim" => Ok(Obj::Int(array.ndim() as i64)),
        "size" if flavor != Flavor::Torch => Ok(Obj::Int(array.size() as i64)),
        "dtype" => Ok(Obj::DType(array.dtype(), flavor)),
        "T" => Ok(Obj::Array(array.transpose(None)?)),
        _ if methods.contains(&name) => Ok(Obj::Method(
            Box::new(Obj::Array(array.clone())),
            name.to_string(),
        )),
        _ => Err(ScriptError::Attribute(format!(
            "'{}' object has no attribute '{name}'",
            qualified_type_name(flavor)
        ))),
    }
}

/// Nested Python lists with Python scalars at the leaves.
#[must_use]
pub fn to_list(array: &Array) -> Obj {
    fn nest(data: &[f64], shape: &[usize], dtype: DType) -> Obj {
        match shape.split_first() {
            None => scalar_of(data.first().copied().unwrap_or(0.0), dtype),
            Some((len, rest)) => {
                let chunk = numel(rest);
                Obj::List(
                    (0..*len)
                        .map(|i| nest(&data[i * chunk..(i + 1) * chunk], rest, dtype))
                        .collect(),
                )
            }
        }
    }
    nest(array.data(), array.shape(), array.dtype())
}

/// `array.item()`.
pub fn item(array: &Array) -> ScriptResult<Obj> {
    match array.item() {
        Some(value) => Ok(scalar_of(value, array.dtype())),
        None if array.flavor() == Flavor::Torch => Err(ScriptError::Runtime(format!(
            "a Tensor with {} elements cannot be converted to Scalar",
            array.size()
        ))),
        None => Err(ScriptError::value_error(
            "can only convert an array of size 1 to a Python scalar",
        )),
    }
}

/// Calls a bound array method.
pub fn call_method(array: &Array, name: &str, args: &Args) -> ScriptResult<Obj> {
    let flavor = array.flavor();
    let cast = |dtype: DType| -> ScriptResult<Obj> { Ok(Obj::Array(array.cast(dtype))) };
    match name {
        "tolist" => Ok(to_list(array)),
        "item" => item(array),
        "numpy" => Ok(Obj::Array(array.clone().with_flavor(Flavor::Numpy))),
        "detach" | "cpu" | "clone" | "copy" | "contiguous" => Ok(Obj::Array(array.clone())),
        "float" => cast(DType::Float32),
        "double" => cast(DType::Float64),
        "int" => cast(DType::Int32),
        "long" => cast(DType::Int64),
        "bool" => cast(DType::Bool),
        "to" if matches!(args.positional.first(), Some(Obj::Str(device)) if device == "cpu" || device.starts_with("cuda")) => {
            Ok(Obj::Array(array.clone()))
        }
        "astype" | "to" => {
            let dtype = dtype_arg(args.required(0, &["dtype"], name)?)?;
            Ok(Obj::Array(dtype.map_or(array.clone(), |dtype| array.cast(dtype))))
        }
        "size" => match args.optional(0, &["dim"]) {
            Some(dim) => {
                let axis = array.normalize_axis(int_arg(dim)?)?;
                Ok(Obj::Int(array.shape()[axis] as i64))
            }
            None => array_attr(array, "shape"),
        },
        "dim" => Ok(Obj::Int(array.ndim() as i64)),
        "numel" => Ok(Obj::Int(array.size() as i64)),
        "view" | "reshape" => {
            let request = match args.positional.as_slice() {
                [single] => shape_arg(single)?,
                [] => shape_arg(args.required(0, &["shape"], name)?)?,
                many => many.iter().map(int_arg).collect::<ScriptResult<Vec<_>>>()?,
            };
            Ok(Obj::Array(array.reshape(&request)?))
        }
        "transpose" if flavor != Flavor::Torch => {
            let request = match args.positional.as_slice() {
                [] => None,
                [Obj::None] => None,
                [single] => Some(shape_arg(single)?),
                many => Some(many.iter().map(int_arg).collect::<ScriptResult<Vec<_>>>()?),
            };
            let axes = request
                .map(|axes| {
                    axes.into_iter()
                        .map(|axis| array.normalize_axis(axis))
                        .collect::<ScriptResult<Vec<_>>>()
                })
                .transpose()?;
            Ok(Obj::Array(array.transpose(axes.as_deref())?))
        }
        _ => call(
            ModuleId::for_flavor(flavor),
            name,
            &args.with_receiver(Obj::Array(array.clone())),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{array_attr, call, call_method, construct, dtype_call, to_list};
    use crate::array::{Array, DType, Flavor};
    use crate::modules::ModuleId;
    use crate::object::{Args, Obj};

    fn floats(values: &[f64]) -> Obj {
        Obj::List(values.iter().map(|v| Obj::Float(*v)).collect())
    }

    fn array(module: ModuleId, values: &[f64]) -> Array {
        match call(module, "array", &Args::positional(vec![floats(values)])) {
            Ok(Obj::Array(array)) => array,
            other => panic!("expected array, got {other:?}"),
        }
    }

    fn tensor(values: &[f64]) -> Array {
        match call(ModuleId::Torch, "tensor", &Args::positional(vec![floats(values)])) {
            Ok(Obj::Array(array)) => array,
            other => panic!("expected tensor, got {other:?}"),
        }
    }

    fn run(module: ModuleId, name: &str, args: Vec<Obj>) -> Obj {
        call(module, name, &Args::positional(args)).expect("call should succeed")
    }

    #[test]
    fn construction_infers_shape_and_dtype() {
        let nested = Obj::List(vec![
            Obj::List(vec![Obj::Int(1), Obj::Int(2)]),
            Obj::List(vec![Obj::Int(3), Obj::Int(4)]),
        ]);
        let numpy = construct(&nested, Flavor::Numpy, None).expect("numpy");
        assert_eq!(numpy.shape(), &[2, 2]);
        assert_eq!(numpy.dtype(), DType::Int64);
        let tf = construct(&nested, Flavor::Tensorflow, None).expect("tf");
        assert_eq!(tf.dtype(), DType::Int32);
        let mixed = Obj::List(vec![Obj::Bool(true), Obj::Float(2.5)]);
        assert_eq!(
            construct(&mixed, Flavor::Torch, None).expect("torch").dtype(),
            DType::Float32
        );
        let empty = construct(&Obj::List(Vec::new()), Flavor::Numpy, None).expect("empty");
        assert_eq!(empty.shape(), &[0]);
        assert_eq!(empty.dtype(), DType::Float64);
    }

    #[test]
    fn ragged_input_is_rejected() {
        let ragged = Obj::List(vec![
            Obj::List(vec![Obj::Int(1), Obj::Int(2)]),
            Obj::List(vec![Obj::Int(3)]),
        ]);
        let err = construct(&ragged, Flavor::Numpy, None).expect_err("ragged");
        assert!(err.to_string().contains("inhomogeneous shape after 1 dimensions"));
        let err = construct(&ragged, Flavor::Torch, None).expect_err("ragged");
        assert_eq!(
            err.to_string(),
            "expected sequence of length 2 at dim 1 (got 1)"
        );
    }

    #[test]
    fn numpy_reductions_return_python_scalars() {
        let values = array(ModuleId::Numpy, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            run(ModuleId::Numpy, "sum", vec![Obj::Array(values.clone())]),
            Obj::Float(10.0)
        );
        assert_eq!(
            run(ModuleId::Numpy, "mean", vec![Obj::Array(values.clone())]),
            Obj::Float(2.5)
        );
        assert_eq!(
            run(ModuleId::Numpy, "argmax", vec![Obj::Array(values.clone())]),
            Obj::Int(3)
        );
        let Obj::Float(std) = run(ModuleId::Numpy, "std", vec![Obj::Array(values)]) else {
            panic!("std is a float");
        };
        assert!((std - 1.118_033_988_749_895).abs() < 1e-12);
    }

    #[test]
    fn torch_std_is_unbiased_and_max_with_dim_pairs_indices() {
        let values = tensor(&[1.0, 2.0, 3.0, 4.0]);
        let Obj::Array(std) = run(ModuleId::Torch, "std", vec![Obj::Array(values.clone())]) else {
            panic!("torch returns tensors");
        };
        let expected = (5.0f64 / 3.0).sqrt();
        assert!((std.data()[0] - f64::from(expected as f32)).abs() < 1e-6);

        let Obj::Tuple(pair) = run(
            ModuleId::Torch,
            "max",
            vec![Obj::Array(values), Obj::Int(0)],
        ) else {
            panic!("torch.max(x, dim) returns a pair");
        };
        let Obj::Array(indices) = &pair[1] else {
            panic!("indices are a tensor");
        };
        assert_eq!(indices.data(), &[3.0]);
    }

    #[test]
    fn torch_rejects_non_tensor_inputs() {
        let err = call(
            ModuleId::Torch,
            "sum",
            &Args::positional(vec![floats(&[1.0])]),
        )
        .expect_err("lists are not tensors");
        assert_eq!(
            err.to_string(),
            "sum(): argument 'input' (position 1) must be Tensor, not list"
        );
        let err = call(
            ModuleId::Torch,
            "mean",
            &Args::positional(vec![Obj::Array(
                tensor(&[1.0, 2.0]).cast(DType::Int64),
            )]),
        )
        .expect_err("integer mean");
        assert!(err.to_string().ends_with("Got: Long"));
    }

    #[test]
    fn reductions_over_axes_and_empty_inputs() {
        let matrix = construct(
            &Obj::List(vec![floats(&[1.0, 2.0]), floats(&[3.0, 4.0])]),
            Flavor::Numpy,
            None,
        )
        .expect("matrix");
        let Obj::Array(columns) = call(
            ModuleId::Numpy,
            "sum",
            &Args::new(
                vec![Obj::Array(matrix.clone())],
                vec![("axis".to_string(), Obj::Int(0))],
            ),
        )
        .expect("sum axis 0") else {
            panic!("axis sums are arrays");
        };
        assert_eq!(columns.data(), &[4.0, 6.0]);
        assert_eq!(
            run(
                ModuleId::Numpy,
                "max",
                vec![Obj::Array(matrix), Obj::Tuple(vec![Obj::Int(0), Obj::Int(1)])]
            ),
            Obj::Float(4.0)
        );
        let empty = array(ModuleId::Numpy, &[]);
        let err = call(ModuleId::Numpy, "max", &Args::positional(vec![Obj::Array(empty)]))
            .expect_err("empty max");
        assert_eq!(
            err.to_string(),
            "zero-size array to reduction operation maximum which has no identity"
        );
    }

    #[test]
    fn constructors_follow_library_defaults() {
        let Obj::Array(range) = run(ModuleId::Numpy, "arange", vec![Obj::Int(3)]) else {
            panic!("arange builds arrays");
        };
        assert_eq!(range.data(), &[0.0, 1.0, 2.0]);
        assert_eq!(range.dtype(), DType::Int64);
        let Obj::Array(points) = run(
            ModuleId::Torch,
            "linspace",
            vec![Obj::Float(0.0), Obj::Float(1.0), Obj::Int(5)],
        ) else {
            panic!("linspace builds arrays");
        };
        assert_eq!(points.data(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(points.dtype(), DType::Float32);
        let Obj::Array(zeros) = run(ModuleId::Torch, "zeros", vec![Obj::Int(2), Obj::Int(3)])
        else {
            panic!("zeros builds arrays");
        };
        assert_eq!(zeros.shape(), &[2, 3]);
        let Obj::Array(eye) = run(ModuleId::Numpy, "eye", vec![Obj::Int(2)]) else {
            panic!("eye builds arrays");
        };
        assert_eq!(eye.data(), &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn softmax_and_sort() {
        let logits = tensor(&[1.0, 2.0, 3.0]);
        let Obj::Array(probs) = run(
            ModuleId::TorchFunctional,
            "softmax",
            vec![Obj::Array(logits.clone()), Obj::Int(0)],
        ) else {
            panic!("softmax returns tensors");
        };
        let total: f64 = probs.data().iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(probs.data()[2] > probs.data()[1]);

        let unsorted = array(ModuleId::Numpy, &[3.0, f64::NAN, 1.0]);
        let Obj::Array(sorted) = run(ModuleId::Numpy, "sort", vec![Obj::Array(unsorted)]) else {
            panic!("sort returns arrays");
        };
        assert_eq!(sorted.data()[..2], [1.0, 3.0]);
        assert!(sorted.data()[2].is_nan());
    }

    #[test]
    fn clip_norm_and_closeness() {
        let values = array(ModuleId::Numpy, &[-2.0, 0.5, 3.0]);
        let Obj::Array(clipped) = run(
            ModuleId::Numpy,
            "clip",
            vec![Obj::Array(values.clone()), Obj::Int(0), Obj::Int(1)],
        ) else {
            panic!("clip returns arrays");
        };
        assert_eq!(clipped.data(), &[0.0, 0.5, 1.0]);
        let vector = array(ModuleId::Numpy, &[3.0, 4.0]);
        assert_eq!(
            run(ModuleId::NumpyLinalg, "norm", vec![Obj::Array(vector.clone())]),
            Obj::Float(5.0)
        );
        assert_eq!(
            run(
                ModuleId::Numpy,
                "allclose",
                vec![Obj::Array(vector.clone()), floats(&[3.0, 4.000_000_001])]
            ),
            Obj::Bool(true)
        );
    }

    #[test]
    fn methods_and_attributes() {
        let values = tensor(&[1.0, 2.0, 3.0, 4.0]);
        let Obj::Array(view) = call_method(
            &values,
            "view",
            &Args::positional(vec![Obj::Int(2), Obj::Int(2)]),
        )
        .expect("view") else {
            panic!("view returns tensors");
        };
        assert_eq!(view.shape(), &[2, 2]);
        assert_eq!(
            array_attr(&view, "shape").expect("shape"),
            Obj::Tuple(vec![Obj::Int(2), Obj::Int(2)])
        );
        let Obj::Array(numpy) = call_method(&values, "numpy", &Args::default()).expect("numpy")
        else {
            panic!("numpy() returns arrays");
        };
        assert_eq!(numpy.flavor(), Flavor::Numpy);
        assert_eq!(
            to_list(&view),
            Obj::List(vec![floats(&[1.0, 2.0]), floats(&[3.0, 4.0])])
        );
        let err = array_attr(&values, "frobnicate").expect_err("unknown attribute");
        assert_eq!(
            err.to_string(),
            "'Tensor' object has no attribute 'frobnicate'"
        );
    }

    #[test]
    fn numpy_dtype_objects_are_callable() {
        assert_eq!(
            dtype_call(DType::Int32, Flavor::Numpy, &Args::positional(vec![Obj::Float(2.7)])),
            Ok(Obj::Int(2))
        );
        assert!(dtype_call(DType::Float32, Flavor::Torch, &Args::default()).is_err());
    }
}
