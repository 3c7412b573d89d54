use std::cmp::Ordering;

use xeq_core::pyfmt::{float_repr, float32_repr, integral_repr};

use crate::ScriptResult;
use crate::error::ScriptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DType {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl DType {
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int32 | Self::Int64)
    }

    /// Rounds `value` into the representable set of this dtype, with the
    /// same saturating casts a C cast performs.
    #[must_use]
    pub fn coerce(self, value: f64) -> f64 {
        match self {
            Self::Bool => {
                if value != 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Int32 => f64::from(value as i32),
            Self::Int64 => value as i64 as f64,
            Self::Float32 => f64::from(value as f32),
            Self::Float64 => value,
        }
    }

    #[must_use]
    pub fn promote(self, other: Self) -> Self {
        self.max(other)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    #[must_use]
    pub fn display(self, flavor: Flavor) -> String {
        match flavor {
            Flavor::Numpy => self.name().to_string(),
            Flavor::Torch => format!("torch.{}", self.name()),
            Flavor::Tensorflow => format!("<dtype: '{}'>", self.name()),
            Flavor::Mlx => format!("mlx.core.{}", self.name()),
        }
    }
}

/// Which library an array belongs to; decides default dtypes, error wording
/// and printed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    Numpy,
    Torch,
    Tensorflow,
    Mlx,
}

impl Flavor {
    #[must_use]
    pub fn default_float(self) -> DType {
        match self {
            Self::Numpy => DType::Float64,
            Self::Torch | Self::Tensorflow | Self::Mlx => DType::Float32,
        }
    }

    #[must_use]
    pub fn default_int(self) -> DType {
        match self {
            Self::Numpy | Self::Torch => DType::Int64,
            Self::Tensorflow | Self::Mlx => DType::Int32,
        }
    }

    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Numpy => "numpy.ndarray",
            Self::Torch => "Tensor",
            Self::Tensorflow => "EagerTensor",
            Self::Mlx => "array",
        }
    }

    /// Result flavor of a binary operation: numpy operands adopt the other
    /// side's library.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        if self == Self::Numpy { other } else { self }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    shape: Vec<usize>,
    data: Vec<f64>,
    dtype: DType,
    flavor: Flavor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexSpec {
    At(i64),
    Range {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
    NewAxis,
}

impl Array {
    #[must_use]
    pub fn new(shape: Vec<usize>, data: Vec<f64>, dtype: DType, flavor: Flavor) -> Self {
        debug_assert_eq!(numel(&shape), data.len());
        let data = data.into_iter().map(|value| dtype.coerce(value)).collect();
        Self {
            shape,
            data,
            dtype,
            flavor,
        }
    }

    #[must_use]
    pub fn scalar(value: f64, dtype: DType, flavor: Flavor) -> Self {
        Self::new(Vec::new(), vec![value], dtype, flavor)
    }

    #[must_use]
    pub fn filled(shape: Vec<usize>, value: f64, dtype: DType, flavor: Flavor) -> Self {
        let count = numel(&shape);
        Self::new(shape, vec![value; count], dtype, flavor)
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[must_use]
    pub fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = flavor;
        self
    }

    #[must_use]
    pub fn cast(&self, dtype: DType) -> Self {
        Self::new(self.shape.clone(), self.data.clone(), dtype, self.flavor)
    }

    #[must_use]
    pub fn map(&self, dtype: DType, f: impl Fn(f64) -> f64) -> Self {
        Self::new(
            self.shape.clone(),
            self.data.iter().map(|value| f(*value)).collect(),
            dtype,
            self.flavor,
        )
    }

    /// The single element of a one-element array.
    #[must_use]
    pub fn item(&self) -> Option<f64> {
        match self.data.as_slice() {
            [value] => Some(*value),
            _ => None,
        }
    }

    pub fn zip(
        lhs: &Self,
        rhs: &Self,
        dtype: DType,
        f: impl Fn(f64, f64) -> f64,
    ) -> ScriptResult<Self> {
        let flavor = lhs.flavor.combine(rhs.flavor);
        let shape = broadcast_shapes(&lhs.shape, &rhs.shape, flavor)?;
        let count = numel(&shape);
        let mut data = Vec::with_capacity(count);
        if lhs.shape == shape && rhs.shape == shape {
            data.extend(lhs.data.iter().zip(&rhs.data).map(|(a, b)| f(*a, *b)));
        } else {
            for flat in 0..count {
                let a = lhs.data[broadcast_offset(flat, &shape, &lhs.shape)];
                let b = rhs.data[broadcast_offset(flat, &shape, &rhs.shape)];
                data.push(f(a, b));
            }
        }
        Ok(Self::new(shape, data, dtype, flavor))
    }

    pub fn broadcast_to(&self, shape: &[usize]) -> ScriptResult<Self> {
        let target = broadcast_shapes(&self.shape, shape, self.flavor)?;
        if target != shape {
            return Err(broadcast_error(self.flavor, &self.shape, shape));
        }
        let data = (0..numel(&target))
            .map(|flat| self.data[broadcast_offset(flat, &target, &self.shape)])
            .collect();
        Ok(Self::new(target, data, self.dtype, self.flavor))
    }

    pub fn normalize_axis(&self, axis: i64) -> ScriptResult<usize> {
        normalize_axis(axis, self.ndim(), self.flavor)
    }

    fn lanes(&self, axis: usize) -> (usize, usize, usize) {
        let outer = numel(&self.shape[..axis]);
        let len = self.shape[axis];
        let inner = numel(&self.shape[axis + 1..]);
        (outer, len, inner)
    }

    /// Reduces along `axis` (or over everything) with `f` applied to each
    /// lane.
    #[must_use]
    pub fn reduce(
        &self,
        axis: Option<usize>,
        keepdims: bool,
        dtype: DType,
        f: impl Fn(&[f64]) -> f64,
    ) -> Self {
        let Some(axis) = axis else {
            let shape = if keepdims {
                vec![1; self.ndim()]
            } else {
                Vec::new()
            };
            return Self::new(shape, vec![f(&self.data)], dtype, self.flavor);
        };

        let (outer, len, inner) = self.lanes(axis);
        let mut data = Vec::with_capacity(outer * inner);
        let mut lane = Vec::with_capacity(len);
        for o in 0..outer {
            for i in 0..inner {
                lane.clear();
                lane.extend((0..len).map(|j| self.data[(o * len + j) * inner + i]));
                data.push(f(&lane));
            }
        }
        let mut shape = self.shape.clone();
        if keepdims {
            shape[axis] = 1;
        } else {
            shape.remove(axis);
        }
        Self::new(shape, data, dtype, self.flavor)
    }

    /// Replaces every lane along `axis` by `f(lane)`, which must keep the
    /// lane length.
    #[must_use]
    pub fn map_lanes(&self, axis: usize, dtype: DType, f: impl Fn(&[f64]) -> Vec<f64>) -> Self {
        let (outer, len, inner) = self.lanes(axis);
        let mut data = vec![0.0; self.data.len()];
        let mut lane = Vec::with_capacity(len);
        for o in 0..outer {
            for i in 0..inner {
                lane.clear();
                lane.extend((0..len).map(|j| self.data[(o * len + j) * inner + i]));
                for (j, value) in f(&lane).into_iter().enumerate().take(len) {
                    data[(o * len + j) * inner + i] = value;
                }
            }
        }
        Self::new(self.shape.clone(), data, dtype, self.flavor)
    }

    #[must_use]
    pub fn flatten(&self) -> Self {
        Self::new(
            vec![self.data.len()],
            self.data.clone(),
            self.dtype,
            self.flavor,
        )
    }

    pub fn reshape(&self, request: &[i64]) -> ScriptResult<Self> {
        let total = self.data.len();
        let mut unknown = None;
        let mut known = 1usize;
        for (position, dim) in request.iter().enumerate() {
            match *dim {
                -1 if unknown.is_none() => unknown = Some(position),
                dim if dim >= 0 => known = known.saturating_mul(dim as usize),
                _ => return Err(self.reshape_error(request)),
            }
        }
        let mut shape: Vec<usize> = request.iter().map(|dim| (*dim).max(0) as usize).collect();
        if let Some(position) = unknown {
            if known == 0 || total % known != 0 {
                return Err(self.reshape_error(request));
            }
            shape[position] = total / known;
        } else if known != total {
            return Err(self.reshape_error(request));
        }
        Ok(Self::new(shape, self.data.clone(), self.dtype, self.flavor))
    }

    fn reshape_error(&self, request: &[i64]) -> ScriptError {
        let dims: Vec<String> = request.iter().map(ToString::to_string).collect();
        match self.flavor {
            Flavor::Torch => ScriptError::Runtime(format!(
                "shape '[{}]' is invalid for input of size {}",
                dims.join(", "),
                self.data.len()
            )),
            Flavor::Tensorflow => ScriptError::Value(format!(
                "Input to reshape is a tensor with {} values, but the requested shape has {}",
                self.data.len(),
                request.iter().product::<i64>().abs()
            )),
            Flavor::Numpy | Flavor::Mlx => ScriptError::Value(format!(
                "cannot reshape array of size {} into shape {}",
                self.data.len(),
                python_tuple(&dims)
            )),
        }
    }

    /// Permutes axes; `None` reverses them.
    pub fn transpose(&self, axes: Option<&[usize]>) -> ScriptResult<Self> {
        let ndim = self.ndim();
        let order: Vec<usize> = match axes {
            Some(axes) => axes.to_vec(),
            None => (0..ndim).rev().collect(),
        };
        let mut seen = vec![false; ndim];
        if order.len() != ndim || order.iter().any(|axis| *axis >= ndim) {
            return Err(ScriptError::value_error("axes don't match array"));
        }
        for axis in &order {
            if std::mem::replace(&mut seen[*axis], true) {
                return Err(ScriptError::value_error("repeated axis in transpose"));
            }
        }

        let shape: Vec<usize> = order.iter().map(|axis| self.shape[*axis]).collect();
        let in_strides = strides(&self.shape);
        let count = self.data.len();
        let mut data = Vec::with_capacity(count);
        let mut index = vec![0usize; ndim];
        for _ in 0..count {
            let offset: usize = index
                .iter()
                .zip(&order)
                .map(|(position, axis)| position * in_strides[*axis])
                .sum();
            data.push(self.data[offset]);
            increment(&mut index, &shape);
        }
        Ok(Self::new(shape, data, self.dtype, self.flavor))
    }

    /// Drops size-one axes (all of them, or the one named).
    pub fn squeeze(&self, axis: Option<usize>) -> ScriptResult<Self> {
        let shape = match axis {
            Some(axis) if self.shape[axis] != 1 => {
                if self.flavor == Flavor::Numpy {
                    return Err(ScriptError::value_error(
                        "cannot select an axis to squeeze out which has size not equal to one",
                    ));
                }
                self.shape.clone()
            }
            Some(axis) => {
                let mut shape = self.shape.clone();
                shape.remove(axis);
                shape
            }
            None => self.shape.iter().copied().filter(|dim| *dim != 1).collect(),
        };
        Ok(Self::new(shape, self.data.clone(), self.dtype, self.flavor))
    }

    pub fn expand_dims(&self, axis: i64) -> ScriptResult<Self> {
        let axis = normalize_axis(axis, self.ndim() + 1, self.flavor)?;
        let mut shape = self.shape.clone();
        shape.insert(axis, 1);
        Ok(Self::new(shape, self.data.clone(), self.dtype, self.flavor))
    }

    pub fn concatenate(arrays: &[Self], axis: i64) -> ScriptResult<Self> {
        let Some(first) = arrays.first() else {
            return Err(ScriptError::value_error(
                "need at least one array to concatenate",
            ));
        };
        if first.ndim() == 0 {
            return Err(ScriptError::value_error(
                "zero-dimensional arrays cannot be concatenated",
            ));
        }
        let axis = first.normalize_axis(axis)?;
        let mut dtype = first.dtype;
        let mut flavor = first.flavor;
        for array in &arrays[1..] {
            let compatible = array.ndim() == first.ndim()
                && array
                    .shape
                    .iter()
                    .zip(&first.shape)
                    .enumerate()
                    .all(|(dim, (a, b))| dim == axis || a == b);
            if !compatible {
                return Err(ScriptError::value_error(
                    "all the input array dimensions except for the concatenation axis must match exactly",
                ));
            }
            dtype = dtype.promote(array.dtype);
            flavor = flavor.combine(array.flavor);
        }

        let outer = numel(&first.shape[..axis]);
        let mut shape = first.shape.clone();
        shape[axis] = arrays.iter().map(|array| array.shape[axis]).sum();
        let mut data = Vec::with_capacity(numel(&shape));
        for o in 0..outer {
            for array in arrays {
                let chunk = numel(&array.shape[axis..]);
                data.extend_from_slice(&array.data[o * chunk..(o + 1) * chunk]);
            }
        }
        Ok(Self::new(shape, data, dtype, flavor))
    }

    pub fn stack(arrays: &[Self], axis: i64) -> ScriptResult<Self> {
        let Some(first) = arrays.first() else {
            return Err(ScriptError::value_error("need at least one array to stack"));
        };
        if arrays.iter().any(|array| array.shape != first.shape) {
            return Err(ScriptError::value_error(
                "all input arrays must have the same shape",
            ));
        }
        let axis = normalize_axis(axis, first.ndim() + 1, first.flavor)?;
        let expanded = arrays
            .iter()
            .map(|array| array.expand_dims(axis as i64))
            .collect::<ScriptResult<Vec<_>>>()?;
        Self::concatenate(&expanded, axis as i64)
    }

    pub fn matmul(lhs: &Self, rhs: &Self) -> ScriptResult<Self> {
        let flavor = lhs.flavor.combine(rhs.flavor);
        let dtype = lhs.dtype.promote(rhs.dtype);
        if lhs.ndim() == 0 || rhs.ndim() == 0 {
            return Err(ScriptError::value_error(
                "matmul: Input operand does not have enough dimensions",
            ));
        }
        if lhs.ndim() > 2 || rhs.ndim() > 2 {
            return Err(ScriptError::unsupported(
                "batched matrix multiplication is not supported",
            ));
        }

        let (m, k) = if lhs.ndim() == 1 {
            (1, lhs.shape[0])
        } else {
            (lhs.shape[0], lhs.shape[1])
        };
        let (k2, n) = if rhs.ndim() == 1 {
            (rhs.shape[0], 1)
        } else {
            (rhs.shape[0], rhs.shape[1])
        };
        if k != k2 {
            return Err(match flavor {
                Flavor::Torch => ScriptError::Runtime(format!(
                    "mat1 and mat2 shapes cannot be multiplied ({m}x{k} and {k2}x{n})"
                )),
                _ => ScriptError::Value(format!(
                    "matmul: Input operand 1 has a mismatch in its core dimension 0, with gufunc signature (n?,k),(k,m?)->(n?,m?) (size {k2} is different from {k})"
                )),
            });
        }

        let mut data = vec![0.0; m * n];
        for row in 0..m {
            for col in 0..n {
                data[row * n + col] = (0..k)
                    .map(|inner| lhs.data[row * k + inner] * rhs.data[inner * n + col])
                    .sum();
            }
        }
        let shape = match (lhs.ndim(), rhs.ndim()) {
            (1, 1) => Vec::new(),
            (1, _) => vec![n],
            (_, 1) => vec![m],
            _ => vec![m, n],
        };
        Ok(Self::new(shape, data, dtype, flavor))
    }

    /// Basic indexing: integers, slices and new axes.
    pub fn select(&self, specs: &[IndexSpec]) -> ScriptResult<Self> {
        let consumed = specs
            .iter()
            .filter(|spec| !matches!(spec, IndexSpec::NewAxis))
            .count();
        if consumed > self.ndim() {
            return Err(ScriptError::Index(match self.flavor {
                Flavor::Torch => format!(
                    "too many indices for tensor of dimension {}",
                    self.ndim()
                ),
                _ => format!(
                    "too many indices for array: array is {}-dimensional, but {consumed} were indexed",
                    self.ndim()
                ),
            }));
        }

        let mut picks: Vec<Vec<usize>> = Vec::with_capacity(self.ndim());
        let mut shape = Vec::new();
        let mut dim = 0;
        for spec in specs {
            match spec {
                IndexSpec::NewAxis => shape.push(1),
                IndexSpec::At(index) => {
                    picks.push(vec![self.resolve_index(*index, dim)?]);
                    dim += 1;
                }
                IndexSpec::Range { start, stop, step } => {
                    let indices = slice_indices(*start, *stop, *step, self.shape[dim])?;
                    shape.push(indices.len());
                    picks.push(indices);
                    dim += 1;
                }
            }
        }
        for rest in dim..self.ndim() {
            shape.push(self.shape[rest]);
            picks.push((0..self.shape[rest]).collect());
        }

        let in_strides = strides(&self.shape);
        let pick_shape: Vec<usize> = picks.iter().map(Vec::len).collect();
        let count = numel(&pick_shape);
        let mut data = Vec::with_capacity(count);
        let mut cursor = vec![0usize; picks.len()];
        for _ in 0..count {
            let offset: usize = cursor
                .iter()
                .enumerate()
                .map(|(axis, position)| picks[axis][*position] * in_strides[axis])
                .sum();
            data.push(self.data[offset]);
            increment(&mut cursor, &pick_shape);
        }
        Ok(Self::new(shape, data, self.dtype, self.flavor))
    }

    fn resolve_index(&self, index: i64, dim: usize) -> ScriptResult<usize> {
        let len = self.shape[dim];
        let resolved = if index < 0 { index + len as i64 } else { index };
        if resolved < 0 || resolved >= len as i64 {
            let noun = if self.flavor == Flavor::Torch {
                "dimension"
            } else {
                "axis"
            };
            return Err(ScriptError::Index(format!(
                "index {index} is out of bounds for {noun} {dim} with size {len}"
            )));
        }
        Ok(resolved as usize)
    }

    /// Boolean-mask selection into a flat array.
    pub fn mask_select(&self, mask: &Self) -> ScriptResult<Self> {
        if mask.shape != self.shape {
            return Err(ScriptError::Index(format!(
                "boolean index did not match indexed array; shapes {} and {}",
                python_tuple(&mask.shape),
                python_tuple(&self.shape)
            )));
        }
        let data: Vec<f64> = self
            .data
            .iter()
            .zip(&mask.data)
            .filter(|(_, keep)| **keep != 0.0)
            .map(|(value, _)| *value)
            .collect();
        Ok(Self::new(vec![data.len()], data, self.dtype, self.flavor))
    }

    /// Sub-arrays along the first axis, as iteration yields them.
    pub fn rows(&self) -> ScriptResult<Vec<Self>> {
        if self.ndim() == 0 {
            return Err(ScriptError::type_error("iteration over a 0-d array"));
        }
        (0..self.shape[0])
            .map(|row| self.select(&[IndexSpec::At(row as i64)]))
            .collect()
    }

    /// Element-wise closeness with numpy's `isclose` rule.
    pub fn isclose(
        lhs: &Self,
        rhs: &Self,
        rtol: f64,
        atol: f64,
        equal_nan: bool,
    ) -> ScriptResult<Self> {
        Self::zip(lhs, rhs, DType::Bool, |a, b| {
            let close = if a.is_nan() || b.is_nan() {
                equal_nan && a.is_nan() && b.is_nan()
            } else if a.is_infinite() || b.is_infinite() {
                a == b
            } else {
                (a - b).abs() <= atol + rtol * b.abs()
            };
            f64::from(u8::from(close))
        })
    }

    /// Python `str()` of this array.
    #[must_use]
    pub fn text(&self) -> String {
        match self.flavor {
            Flavor::Numpy => self.numpy_body(" "),
            Flavor::Torch => self.torch_repr(),
            Flavor::Tensorflow => format!(
                "tf.Tensor({}, shape={}, dtype={})",
                self.numpy_body(" "),
                python_tuple(&self.shape),
                self.dtype.name()
            ),
            Flavor::Mlx => self.mlx_repr(),
        }
    }

    /// Python `repr()` of this array.
    #[must_use]
    pub fn repr(&self) -> String {
        match self.flavor {
            Flavor::Numpy => self.numpy_repr(),
            Flavor::Torch => self.torch_repr(),
            Flavor::Tensorflow => format!(
                "<tf.Tensor: shape={}, dtype={}, numpy={}>",
                python_tuple(&self.shape),
                self.dtype.name(),
                self.numpy_repr()
            ),
            Flavor::Mlx => self.mlx_repr(),
        }
    }

    fn numpy_repr(&self) -> String {
        let body = if self.data.is_empty() {
            "[]".to_string()
        } else {
            self.nested(&self.numpy_elements(), ", ", "array(".len())
        };
        let explicit_dtype = self.data.is_empty()
            || matches!(self.dtype, DType::Int32 | DType::Float32);
        if explicit_dtype {
            format!("array({body}, dtype={})", self.dtype.name())
        } else {
            format!("array({body})")
        }
    }

    fn numpy_body(&self, sep: &str) -> String {
        if self.ndim() == 0 {
            return self.scalar_text();
        }
        self.nested(&self.numpy_elements(), sep, 0)
    }

    fn scalar_text(&self) -> String {
        let value = self.data.first().copied().unwrap_or(0.0);
        match self.dtype {
            DType::Bool => python_bool(value).to_string(),
            DType::Int32 | DType::Int64 => integral_repr(value),
            DType::Float32 => float32_repr(value as f32),
            DType::Float64 => float_repr(value),
        }
    }

    fn torch_repr(&self) -> String {
        let body = if self.data.is_empty() {
            "[]".to_string()
        } else {
            self.nested(&self.torch_elements(), ", ", "tensor(".len())
        };
        let suffix = match self.dtype {
            DType::Float64 | DType::Int32 => format!(", dtype=torch.{}", self.dtype.name()),
            _ if self.data.is_empty() && self.dtype != DType::Float32 => {
                format!(", dtype=torch.{}", self.dtype.name())
            }
            _ => String::new(),
        };
        format!("tensor({body}{suffix})")
    }

    fn mlx_repr(&self) -> String {
        let body = if self.data.is_empty() {
            "[]".to_string()
        } else {
            self.nested(&self.numpy_elements(), ", ", "array(".len())
        };
        format!("array({body}, dtype={})", self.dtype.name())
    }

    fn numpy_elements(&self) -> Vec<String> {
        match self.dtype {
            DType::Bool => pad_left(self.data.iter().map(|v| python_bool(*v).to_string())),
            DType::Int32 | DType::Int64 => pad_left(self.data.iter().map(|v| integral_repr(*v))),
            DType::Float32 | DType::Float64 => {
                let raw: Vec<String> = self
                    .data
                    .iter()
                    .map(|value| numpy_float(*value, self.dtype))
                    .collect();
                align_on_point(raw)
            }
        }
    }

    fn torch_elements(&self) -> Vec<String> {
        match self.dtype {
            DType::Bool => pad_left(self.data.iter().map(|v| python_bool(*v).to_string())),
            DType::Int32 | DType::Int64 => pad_left(self.data.iter().map(|v| integral_repr(*v))),
            DType::Float32 | DType::Float64 => {
                let finite: Vec<f64> =
                    self.data.iter().copied().filter(|v| v.is_finite()).collect();
                let integral = finite.iter().all(|v| v.fract() == 0.0);
                let max = finite.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
                let min = finite
                    .iter()
                    .filter(|v| **v != 0.0)
                    .fold(f64::INFINITY, |acc, v| acc.min(v.abs()));
                let scientific = max >= 1e8 || (min.is_finite() && min < 1e-4);
                pad_left(self.data.iter().map(|value| {
                    if !value.is_finite() {
                        float_repr(*value)
                    } else if scientific {
                        torch_scientific(*value)
                    } else if integral {
                        format!("{}.", integral_repr(*value))
                    } else {
                        format!("{value:.4}")
                    }
                }))
            }
        }
    }

    fn nested(&self, elements: &[String], sep: &str, indent: usize) -> String {
        if self.ndim() == 0 {
            return elements.first().cloned().unwrap_or_default();
        }
        let mut out = String::new();
        self.nest_into(&mut out, elements, 0, 0, sep, indent);
        out
    }

    fn nest_into(
        &self,
        out: &mut String,
        elements: &[String],
        depth: usize,
        offset: usize,
        sep: &str,
        indent: usize,
    ) {
        out.push('[');
        let len = self.shape[depth];
        if depth + 1 == self.ndim() {
            for j in 0..len {
                if j > 0 {
                    out.push_str(sep);
                }
                out.push_str(&elements[offset + j]);
            }
        } else {
            let chunk = numel(&self.shape[depth + 1..]);
            let newlines = self.ndim() - depth - 1;
            for j in 0..len {
                if j > 0 {
                    out.push_str(sep.trim_end());
                    out.extend(std::iter::repeat_n('\n', newlines));
                    out.extend(std::iter::repeat_n(' ', indent + depth + 1));
                }
                self.nest_into(out, elements, depth + 1, offset + j * chunk, sep, indent);
            }
        }
        out.push(']');
    }
}

#[must_use]
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

fn strides(shape: &[usize]) -> Vec<usize> {
    let mut out = vec![1usize; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        out[axis] = out[axis + 1] * shape[axis + 1];
    }
    out
}

fn increment(index: &mut [usize], shape: &[usize]) {
    for axis in (0..index.len()).rev() {
        index[axis] += 1;
        if index[axis] < shape[axis] {
            return;
        }
        index[axis] = 0;
    }
}

fn broadcast_offset(flat: usize, out_shape: &[usize], in_shape: &[usize]) -> usize {
    let lead = out_shape.len() - in_shape.len();
    let mut remaining = flat;
    let mut offset = 0;
    let mut stride = 1;
    for axis in (0..out_shape.len()).rev() {
        let coordinate = remaining % out_shape[axis];
        remaining /= out_shape[axis];
        if axis >= lead {
            let dim = in_shape[axis - lead];
            if dim != 1 {
                offset += coordinate * stride;
            }
            stride *= dim;
        }
    }
    offset
}

pub fn broadcast_shapes(lhs: &[usize], rhs: &[usize], flavor: Flavor) -> ScriptResult<Vec<usize>> {
    let ndim = lhs.len().max(rhs.len());
    let mut out = vec![0usize; ndim];
    for axis in 0..ndim {
        let a = axis
            .checked_sub(ndim - lhs.len())
            .map_or(1, |index| lhs[index]);
        let b = axis
            .checked_sub(ndim - rhs.len())
            .map_or(1, |index| rhs[index]);
        out[axis] = match (a, b) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            _ => return Err(broadcast_error(flavor, lhs, rhs)),
        };
    }
    Ok(out)
}

fn broadcast_error(flavor: Flavor, lhs: &[usize], rhs: &[usize]) -> ScriptError {
    match flavor {
        Flavor::Torch => {
            let ndim = lhs.len().max(rhs.len());
            let (dim, a, b) = (0..ndim)
                .rev()
                .map(|axis| {
                    let a = axis.checked_sub(ndim - lhs.len()).map_or(1, |i| lhs[i]);
                    let b = axis.checked_sub(ndim - rhs.len()).map_or(1, |i| rhs[i]);
                    (axis, a, b)
                })
                .find(|(_, a, b)| a != b && *a != 1 && *b != 1)
                .unwrap_or((0, 0, 0));
            ScriptError::Runtime(format!(
                "The size of tensor a ({a}) must match the size of tensor b ({b}) at non-singleton dimension {dim}"
            ))
        }
        Flavor::Tensorflow => ScriptError::Value(format!(
            "Incompatible shapes: {} vs. {}",
            bracket_list(lhs),
            bracket_list(rhs)
        )),
        Flavor::Numpy | Flavor::Mlx => ScriptError::Value(format!(
            "operands could not be broadcast together with shapes {} {} ",
            compact_tuple(lhs),
            compact_tuple(rhs)
        )),
    }
}

pub fn normalize_axis(axis: i64, ndim: usize, flavor: Flavor) -> ScriptResult<usize> {
    let bound = ndim as i64;
    let resolved = if axis < 0 { axis + bound } else { axis };
    if ndim > 0 && (0..bound).contains(&resolved) {
        return Ok(resolved as usize);
    }
    Err(match flavor {
        Flavor::Torch => ScriptError::Index(format!(
            "Dimension out of range (expected to be in range of [{}, {}], but got {axis})",
            -bound.max(1),
            bound.max(1) - 1
        )),
        _ => ScriptError::Value(format!(
            "axis {axis} is out of bounds for array of dimension {ndim}"
        )),
    })
}

/// Python `slice(start, stop, step).indices(len)` expanded to positions.
pub fn slice_indices(
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
    len: usize,
) -> ScriptResult<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(ScriptError::value_error("slice step cannot be zero"));
    }
    let len = len as i64;
    let clamp = |value: i64, low: i64, high: i64| value.max(low).min(high);
    let resolve = |value: Option<i64>, default: i64| match value {
        None => default,
        Some(v) if v < 0 => {
            if step > 0 {
                clamp(v + len, 0, len)
            } else {
                clamp(v + len, -1, len - 1)
            }
        }
        Some(v) => {
            if step > 0 {
                clamp(v, 0, len)
            } else {
                clamp(v, -1, len - 1)
            }
        }
    };
    let (start, stop) = if step > 0 {
        (resolve(start, 0), resolve(stop, len))
    } else {
        (resolve(start, len - 1), resolve(stop, -1))
    };

    let mut out = Vec::new();
    let mut position = start;
    while (step > 0 && position < stop) || (step < 0 && position > stop) {
        out.push(position as usize);
        position += step;
    }
    Ok(out)
}

/// Total order used by sort/max that places NaN last.
#[must_use]
pub fn total_cmp_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Python tuple text for a shape: `()`, `(3,)`, `(2, 3)`.
#[must_use]
pub fn python_tuple<T: ToString>(items: &[T]) -> String {
    match items {
        [] => "()".to_string(),
        [single] => format!("({},)", single.to_string()),
        _ => format!(
            "({})",
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn compact_tuple(shape: &[usize]) -> String {
    match shape {
        [single] => format!("({single},)"),
        _ => format!(
            "({})",
            shape
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        ),
    }
}

fn bracket_list(shape: &[usize]) -> String {
    format!(
        "[{}]",
        shape
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    )
}

fn python_bool(value: f64) -> &'static str {
    if value != 0.0 { "True" } else { "False" }
}

fn numpy_float(value: f64, dtype: DType) -> String {
    if !value.is_finite() {
        return float_repr(value);
    }
    let shortest = if dtype == DType::Float32 {
        float32_repr(value as f32)
    } else {
        float_repr(value)
    };
    if shortest.contains('e') {
        return shortest;
    }
    let shortest = match shortest.split_once('.') {
        Some((_, fraction)) if fraction.len() > 8 => {
            let fixed = format!("{value:.8}");
            fixed.trim_end_matches('0').to_string()
        }
        _ => shortest,
    };
    shortest
        .strip_suffix(".0")
        .map_or(shortest.clone(), |whole| format!("{whole}."))
}

fn torch_scientific(value: f64) -> String {
    let formatted = format!("{value:.4e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted,
    }
}

fn pad_left(items: impl Iterator<Item = String>) -> Vec<String> {
    let items: Vec<String> = items.collect();
    let width = items.iter().map(|item| item.chars().count()).max().unwrap_or(0);
    items
        .into_iter()
        .map(|item| format!("{item:>width$}"))
        .collect()
}

/// Right-aligns integer parts and left-aligns fractions, as numpy does for
/// float arrays.
fn align_on_point(items: Vec<String>) -> Vec<String> {
    let split: Vec<(String, Option<String>)> = items
        .iter()
        .map(|item| match item.split_once('.') {
            Some((whole, fraction)) if !item.contains('e') => {
                (whole.to_string(), Some(fraction.to_string()))
            }
            _ => (item.clone(), None),
        })
        .collect();
    let whole_width = split
        .iter()
        .filter(|(_, fraction)| fraction.is_some())
        .map(|(whole, _)| whole.len())
        .max()
        .unwrap_or(0);
    let fraction_width = split
        .iter()
        .filter_map(|(_, fraction)| fraction.as_ref().map(String::len))
        .max()
        .unwrap_or(0);
    let aligned: Vec<String> = split
        .into_iter()
        .map(|(whole, fraction)| match fraction {
            Some(fraction) => format!("{whole:>whole_width$}.{fraction:<fraction_width$}"),
            None => whole,
        })
        .collect();
    pad_left(aligned.into_iter())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{Array, DType, Flavor, IndexSpec, broadcast_shapes, slice_indices};

    fn numpy(shape: Vec<usize>, data: Vec<f64>) -> Array {
        Array::new(shape, data, DType::Float64, Flavor::Numpy)
    }

    #[test]
    fn dtype_coercion_matches_c_casts() {
        assert_eq!(DType::Int64.coerce(2.9), 2.0);
        assert_eq!(DType::Int32.coerce(-2.9), -2.0);
        assert_eq!(DType::Bool.coerce(0.5), 1.0);
        assert_eq!(DType::Float32.coerce(0.1), f64::from(0.1f32));
    }

    #[test]
    fn broadcasting_follows_trailing_dimensions() {
        assert_eq!(
            broadcast_shapes(&[2, 1], &[3], Flavor::Numpy).expect("compatible"),
            vec![2, 3]
        );
        let err = broadcast_shapes(&[2], &[3], Flavor::Numpy).expect_err("incompatible");
        assert_eq!(
            err.to_string(),
            "operands could not be broadcast together with shapes (2,) (3,) "
        );
        let err = broadcast_shapes(&[2], &[3], Flavor::Torch).expect_err("incompatible");
        assert_eq!(
            err.to_string(),
            "The size of tensor a (2) must match the size of tensor b (3) at non-singleton dimension 0"
        );

        let column = numpy(vec![2, 1], vec![1.0, 2.0]);
        let row = numpy(vec![3], vec![10.0, 20.0, 30.0]);
        let sum = Array::zip(&column, &row, DType::Float64, |a, b| a + b).expect("broadcast");
        assert_eq!(sum.shape(), &[2, 3]);
        assert_eq!(sum.data(), &[11.0, 21.0, 31.0, 12.0, 22.0, 32.0]);
    }

    #[test]
    fn reductions_along_axes() {
        let matrix = numpy(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let sum = |lane: &[f64]| lane.iter().sum::<f64>();
        assert_eq!(
            matrix.reduce(Some(0), false, DType::Float64, sum).data(),
            &[5.0, 7.0, 9.0]
        );
        let rows = matrix.reduce(Some(1), true, DType::Float64, sum);
        assert_eq!(rows.shape(), &[2, 1]);
        assert_eq!(rows.data(), &[6.0, 15.0]);
        assert_eq!(matrix.reduce(None, false, DType::Float64, sum).data(), &[21.0]);
    }

    #[test]
    fn slicing_and_indexing() {
        assert_eq!(slice_indices(None, None, Some(-1), 3).expect("slice"), vec![2, 1, 0]);
        assert_eq!(slice_indices(Some(-2), None, None, 5).expect("slice"), vec![3, 4]);
        assert_eq!(slice_indices(Some(1), Some(100), Some(2), 6).expect("slice"), vec![1, 3, 5]);

        let matrix = numpy(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let column = matrix
            .select(&[
                IndexSpec::Range {
                    start: None,
                    stop: None,
                    step: None,
                },
                IndexSpec::At(-1),
            ])
            .expect("select");
        assert_eq!(column.shape(), &[2]);
        assert_eq!(column.data(), &[3.0, 6.0]);

        let err = matrix.select(&[IndexSpec::At(2)]).expect_err("out of range");
        assert_eq!(err.to_string(), "index 2 is out of bounds for axis 0 with size 2");
    }

    #[test]
    fn reshape_transpose_and_matmul() {
        let flat = numpy(vec![6], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let matrix = flat.reshape(&[2, -1]).expect("reshape");
        assert_eq!(matrix.shape(), &[2, 3]);
        assert!(flat.reshape(&[4]).is_err());

        let transposed = matrix.transpose(None).expect("transpose");
        assert_eq!(transposed.shape(), &[3, 2]);
        assert_eq!(transposed.data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

        let product = Array::matmul(&matrix, &transposed).expect("matmul");
        assert_eq!(product.shape(), &[2, 2]);
        assert_eq!(product.data(), &[14.0, 32.0, 32.0, 77.0]);
    }

    #[test]
    fn concatenate_and_stack() {
        let a = numpy(vec![2], vec![1.0, 2.0]);
        let b = numpy(vec![2], vec![3.0, 4.0]);
        let joined = Array::concatenate(&[a.clone(), b.clone()], 0).expect("concat");
        assert_eq!(joined.data(), &[1.0, 2.0, 3.0, 4.0]);
        let stacked = Array::stack(&[a, b], 1).expect("stack");
        assert_eq!(stacked.shape(), &[2, 2]);
        assert_eq!(stacked.data(), &[1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn printed_forms_follow_each_library() {
        let floats = numpy(vec![3], vec![1.0, 2.5, 3.0]);
        assert_eq!(floats.text(), "[1.  2.5 3. ]");
        assert_eq!(floats.repr(), "array([1. , 2.5, 3. ])");

        let ints = Array::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0], DType::Int64, Flavor::Numpy);
        assert_eq!(ints.text(), "[[1 2]\n [3 4]]");
        assert_eq!(ints.repr(), "array([[1, 2],\n       [3, 4]])");

        let tensor = Array::new(vec![2], vec![1.0, 2.5], DType::Float32, Flavor::Torch);
        assert_eq!(tensor.text(), "tensor([1.0000, 2.5000])");
        let whole = Array::new(vec![2], vec![1.0, 2.0], DType::Float64, Flavor::Torch);
        assert_eq!(whole.text(), "tensor([1., 2.], dtype=torch.float64)");

        let tf = Array::new(vec![2], vec![1.0, 2.0], DType::Float32, Flavor::Tensorflow);
        assert_eq!(tf.text(), "tf.Tensor([1. 2.], shape=(2,), dtype=float32)");
        let mlx = Array::new(vec![2], vec![1.0, 2.0], DType::Int32, Flavor::Mlx);
        assert_eq!(mlx.text(), "array([1, 2], dtype=int32)");
    }

    proptest! {
        #[test]
        fn prop_transpose_twice_is_identity(rows in 1usize..5, cols in 1usize..5) {
            let data: Vec<f64> = (0..rows * cols).map(|v| v as f64).collect();
            let matrix = numpy(vec![rows, cols], data);
            let back = matrix
                .transpose(None)
                .and_then(|t| t.transpose(None))
                .expect("transpose");
            prop_assert_eq!(back, matrix);
        }

        #[test]
        fn prop_full_slice_keeps_everything(len in 0usize..20) {
            let all = slice_indices(None, None, None, len).expect("slice");
            prop_assert_eq!(all, (0..len).collect::<Vec<_>>());
        }
    }
}
