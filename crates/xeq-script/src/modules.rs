use std::fmt;
use std::str::FromStr;

use crate::ScriptResult;
use crate::array::{DType, Flavor};
use crate::error::ScriptError;
use crate::object::{Function, Obj};

/// A numeric library that a snippet may import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Framework {
    Numpy,
    Torch,
    Tensorflow,
    Mlx,
}

impl Framework {
    pub const ALL: [Self; 4] = [Self::Numpy, Self::Torch, Self::Tensorflow, Self::Mlx];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Numpy => "numpy",
            Self::Torch => "torch",
            Self::Tensorflow => "tensorflow",
            Self::Mlx => "mlx",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Framework {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "numpy" | "np" => Ok(Self::Numpy),
            "torch" | "pytorch" => Ok(Self::Torch),
            "tensorflow" | "tf" => Ok(Self::Tensorflow),
            "mlx" | "mx" => Ok(Self::Mlx),
            other => Err(format!(
                "unknown module '{other}' (expected numpy, torch, tensorflow or mlx)"
            )),
        }
    }
}

/// Which numeric libraries are importable. `math` and the builtins are
/// always available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleSet {
    enabled: [bool; 4],
}

impl Default for ModuleSet {
    fn default() -> Self {
        Self::all()
    }
}

impl ModuleSet {
    #[must_use]
    pub fn all() -> Self {
        Self { enabled: [true; 4] }
    }

    #[must_use]
    pub fn builtins_only() -> Self {
        Self {
            enabled: [false; 4],
        }
    }

    #[must_use]
    pub fn with(mut self, framework: Framework, enabled: bool) -> Self {
        self.enabled[framework as usize] = enabled;
        self
    }

    #[must_use]
    pub fn contains(self, framework: Framework) -> bool {
        self.enabled[framework as usize]
    }

    #[must_use]
    pub fn enabled(self) -> Vec<Framework> {
        Framework::ALL
            .into_iter()
            .filter(|framework| self.contains(*framework))
            .collect()
    }
}

impl FromIterator<Framework> for ModuleSet {
    fn from_iter<I: IntoIterator<Item = Framework>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::builtins_only(), |set, framework| set.with(framework, true))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleId {
    Math,
    Numpy,
    NumpyLinalg,
    Torch,
    TorchNn,
    TorchFunctional,
    TorchLinalg,
    Tensorflow,
    TfMath,
    TfNn,
    TfLinalg,
    Mlx,
    MlxCore,
}

const ALL_MODULES: [ModuleId; 13] = [
    ModuleId::Math,
    ModuleId::Numpy,
    ModuleId::NumpyLinalg,
    ModuleId::Torch,
    ModuleId::TorchNn,
    ModuleId::TorchFunctional,
    ModuleId::TorchLinalg,
    ModuleId::Tensorflow,
    ModuleId::TfMath,
    ModuleId::TfNn,
    ModuleId::TfLinalg,
    ModuleId::Mlx,
    ModuleId::MlxCore,
];

const MATH_FUNCTIONS: &[&str] = &[
    "sqrt", "exp", "log", "log2", "log10", "log1p", "expm1", "sin", "cos", "tan", "asin", "acos",
    "atan", "atan2", "sinh", "cosh", "tanh", "asinh", "acosh", "atanh", "floor", "ceil", "trunc",
    "fabs", "isnan", "isinf", "isfinite", "pow", "hypot", "degrees", "radians", "copysign", "fmod",
    "factorial", "gcd", "isclose", "prod", "fsum",
];

const NUMPY_FUNCTIONS: &[&str] = &[
    "array", "asarray", "zeros", "ones", "full", "zeros_like", "ones_like", "full_like", "arange",
    "linspace", "eye", "identity", "abs", "absolute", "sqrt", "exp", "exp2", "log", "log2",
    "log10", "log1p", "expm1", "sin", "cos", "tan", "arcsin", "arccos", "arctan", "sinh", "cosh",
    "tanh", "floor", "ceil", "round", "around", "rint", "trunc", "sign", "square", "negative",
    "reciprocal", "isnan", "isinf", "isfinite", "clip", "add", "subtract", "multiply", "divide",
    "true_divide", "floor_divide", "power", "mod", "remainder", "fmod", "maximum", "minimum",
    "arctan2", "equal", "not_equal", "greater", "greater_equal", "less", "less_equal",
    "logical_and", "logical_or", "logical_xor", "logical_not", "sum", "prod", "mean", "std", "var",
    "max", "min", "amax", "amin", "argmax", "argmin", "all", "any", "cumsum", "cumprod", "dot",
    "matmul", "transpose", "reshape", "ravel", "concatenate", "stack", "squeeze", "expand_dims",
    "where", "allclose", "isclose", "array_equal", "nan_to_num", "sort", "median",
];

const TORCH_FUNCTIONS: &[&str] = &[
    "tensor", "Tensor", "as_tensor", "from_numpy", "zeros", "ones", "full", "zeros_like",
    "ones_like", "full_like", "arange", "linspace", "eye", "abs", "absolute", "sqrt", "rsqrt",
    "exp", "exp2", "log", "log2", "log10", "log1p", "expm1", "sin", "cos", "tan", "asin", "acos",
    "atan", "arcsin", "arccos", "arctan", "sinh", "cosh", "tanh", "sigmoid", "relu", "floor",
    "ceil", "round", "trunc", "sign", "square", "neg", "negative", "reciprocal", "isnan", "isinf",
    "isfinite", "clamp", "clip", "add", "sub", "subtract", "mul", "multiply", "div", "divide",
    "true_divide", "floor_divide", "pow", "remainder", "fmod", "maximum", "minimum", "atan2",
    "eq", "ne", "gt", "ge", "lt", "le", "equal", "logical_and", "logical_or", "logical_xor",
    "logical_not", "sum", "prod", "mean", "std", "var", "max", "min", "amax", "amin", "argmax",
    "argmin", "all", "any", "cumsum", "cumprod", "dot", "matmul", "mm", "transpose", "t",
    "reshape", "flatten", "cat", "concat", "stack", "squeeze", "unsqueeze", "where", "allclose",
    "isclose", "softmax", "log_softmax", "nan_to_num", "norm", "sort", "median",
];

const TORCH_FUNCTIONAL: &[&str] = &[
    "relu", "sigmoid", "tanh", "softmax", "log_softmax", "leaky_relu", "softplus",
];

const TF_FUNCTIONS: &[&str] = &[
    "constant", "convert_to_tensor", "Variable", "zeros", "ones", "fill", "zeros_like",
    "ones_like", "range", "linspace", "eye", "abs", "sqrt", "rsqrt", "exp", "log", "log1p",
    "expm1", "sin", "cos", "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh", "sigmoid",
    "floor", "ceil", "round", "sign", "square", "negative", "reciprocal", "is_nan", "is_inf",
    "is_finite", "clip_by_value", "add", "subtract", "multiply", "divide", "truediv", "floordiv",
    "pow", "mod", "floormod", "maximum", "minimum", "atan2", "equal", "not_equal", "greater",
    "greater_equal", "less", "less_equal", "logical_and", "logical_or", "logical_xor",
    "logical_not", "reduce_sum", "reduce_prod", "reduce_mean", "reduce_std", "reduce_variance",
    "reduce_max", "reduce_min", "reduce_all", "reduce_any", "argmax", "argmin", "cumsum",
    "cumprod", "matmul", "transpose", "reshape", "concat", "stack", "squeeze", "expand_dims",
    "where", "cast", "softmax", "log_softmax", "norm", "sort",
];

const TF_NN: &[&str] = &[
    "relu", "sigmoid", "tanh", "softmax", "log_softmax", "leaky_relu", "softplus",
];

const MLX_FUNCTIONS: &[&str] = &[
    "array", "zeros", "ones", "full", "zeros_like", "ones_like", "arange", "linspace", "eye",
    "abs", "sqrt", "rsqrt", "exp", "log", "log2", "log10", "log1p", "expm1", "sin", "cos", "tan",
    "arcsin", "arccos", "arctan", "sinh", "cosh", "tanh", "sigmoid", "floor", "ceil", "round",
    "sign", "square", "negative", "reciprocal", "isnan", "isinf", "clip", "add", "subtract",
    "multiply", "divide", "floor_divide", "power", "remainder", "maximum", "minimum", "equal",
    "not_equal", "greater", "greater_equal", "less", "less_equal", "logical_and", "logical_or",
    "logical_not", "sum", "prod", "mean", "std", "var", "max", "min", "argmax", "argmin", "all",
    "any", "cumsum", "cumprod", "matmul", "transpose", "reshape", "flatten", "concatenate",
    "stack", "squeeze", "expand_dims", "where", "allclose", "isclose", "softmax", "sort", "eval",
];

const LINALG_FUNCTIONS: &[&str] = &["norm"];

impl ModuleId {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Math => "math",
            Self::Numpy => "numpy",
            Self::NumpyLinalg => "numpy.linalg",
            Self::Torch => "torch",
            Self::TorchNn => "torch.nn",
            Self::TorchFunctional => "torch.nn.functional",
            Self::TorchLinalg => "torch.linalg",
            Self::Tensorflow => "tensorflow",
            Self::TfMath => "tensorflow.math",
            Self::TfNn => "tensorflow.nn",
            Self::TfLinalg => "tensorflow.linalg",
            Self::Mlx => "mlx",
            Self::MlxCore => "mlx.core",
        }
    }

    #[must_use]
    pub fn framework(self) -> Option<Framework> {
        match self {
            Self::Math => None,
            Self::Numpy | Self::NumpyLinalg => Some(Framework::Numpy),
            Self::Torch | Self::TorchNn | Self::TorchFunctional | Self::TorchLinalg => {
                Some(Framework::Torch)
            }
            Self::Tensorflow | Self::TfMath | Self::TfNn | Self::TfLinalg => {
                Some(Framework::Tensorflow)
            }
            Self::Mlx | Self::MlxCore => Some(Framework::Mlx),
        }
    }

    #[must_use]
    pub fn flavor(self) -> Flavor {
        match self.framework() {
            Some(Framework::Torch) => Flavor::Torch,
            Some(Framework::Tensorflow) => Flavor::Tensorflow,
            Some(Framework::Mlx) => Flavor::Mlx,
            Some(Framework::Numpy) | None => Flavor::Numpy,
        }
    }

    /// The module that owns the free functions of arrays of `flavor`.
    #[must_use]
    pub fn for_flavor(flavor: Flavor) -> Self {
        match flavor {
            Flavor::Numpy => Self::Numpy,
            Flavor::Torch => Self::Torch,
            Flavor::Tensorflow => Self::Tensorflow,
            Flavor::Mlx => Self::MlxCore,
        }
    }

    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        ALL_MODULES.into_iter().find(|module| module.name() == path)
    }

    fn functions(self) -> &'static [&'static str] {
        match self {
            Self::Math => MATH_FUNCTIONS,
            Self::Numpy => NUMPY_FUNCTIONS,
            Self::NumpyLinalg | Self::TorchLinalg | Self::TfLinalg => LINALG_FUNCTIONS,
            Self::Torch => TORCH_FUNCTIONS,
            Self::TorchFunctional => TORCH_FUNCTIONAL,
            Self::Tensorflow | Self::TfMath => TF_FUNCTIONS,
            Self::TfNn => TF_NN,
            Self::MlxCore => MLX_FUNCTIONS,
            Self::TorchNn | Self::Mlx => &[],
        }
    }

    fn submodule(self, attr: &str) -> Option<Self> {
        Self::from_path(&format!("{}.{attr}", self.name()))
    }

    fn constant(self, attr: &str) -> Option<Obj> {
        let flavor = self.flavor();
        let number = match (self, attr) {
            (Self::Math | Self::Numpy | Self::Torch | Self::MlxCore, "pi") => {
                Some(std::f64::consts::PI)
            }
            (Self::Math | Self::Numpy | Self::Torch | Self::MlxCore, "e") => {
                Some(std::f64::consts::E)
            }
            (Self::Math, "tau") => Some(std::f64::consts::TAU),
            (Self::Math | Self::Numpy | Self::Torch | Self::MlxCore, "inf") => Some(f64::INFINITY),
            (Self::Math | Self::Numpy | Self::Torch | Self::MlxCore, "nan") => Some(f64::NAN),
            _ => None,
        };
        if let Some(number) = number {
            return Some(Obj::Float(number));
        }
        if self == Self::Numpy && attr == "newaxis" {
            return Some(Obj::None);
        }

        let dtype = match (flavor, attr) {
            (_, "float32") => DType::Float32,
            (_, "float64") => DType::Float64,
            (_, "int32") => DType::Int32,
            (_, "int64") => DType::Int64,
            (Flavor::Numpy | Flavor::Mlx, "bool_") => DType::Bool,
            (Flavor::Torch | Flavor::Tensorflow | Flavor::Mlx, "bool") => DType::Bool,
            (Flavor::Numpy | Flavor::Torch | Flavor::Tensorflow, "double") => DType::Float64,
            (Flavor::Numpy, "single") => DType::Float32,
            (Flavor::Torch, "float") => DType::Float32,
            (Flavor::Torch, "int") => DType::Int32,
            (Flavor::Torch, "long") => DType::Int64,
            _ => return None,
        };
        let owns_dtypes = matches!(
            self,
            Self::Numpy | Self::Torch | Self::Tensorflow | Self::MlxCore
        );
        owns_dtypes.then_some(Obj::DType(dtype, flavor))
    }
}

/// Resolves `module.attr`.
pub fn module_attr(module: ModuleId, attr: &str, modules: ModuleSet) -> ScriptResult<Obj> {
    if let Some(sub) = module.submodule(attr) {
        if sub.framework().is_none_or(|framework| modules.contains(framework)) {
            return Ok(Obj::Module(sub));
        }
    }
    if let Some(constant) = module.constant(attr) {
        return Ok(constant);
    }
    if module.functions().contains(&attr) {
        return Ok(Obj::Function(Function {
            module: Some(module),
            name: attr.to_string(),
        }));
    }
    if matches!(attr, "random" | "fft" | "distributions" | "keras" | "optim") {
        return Err(ScriptError::unsupported(format!(
            "{}.{attr} is not supported",
            module.name()
        )));
    }
    Err(ScriptError::Attribute(format!(
        "module '{}' has no attribute '{attr}'",
        module.name()
    )))
}

/// Resolves an `import a.b.c` path against the enabled libraries.
pub fn resolve_import(path: &[String], modules: ModuleSet) -> ScriptResult<ModuleId> {
    let joined = path.join(".");
    let top = path.first().map(String::as_str).unwrap_or_default();
    let Some(module) = ModuleId::from_path(&joined) else {
        return Err(ScriptError::ModuleNotFound(joined));
    };
    match module.framework() {
        Some(framework) if !modules.contains(framework) => {
            Err(ScriptError::ModuleNotFound(top.to_string()))
        }
        _ => Ok(module),
    }
}

#[cfg(test)]
mod tests {
    use super::{Framework, ModuleId, ModuleSet, module_attr, resolve_import};
    use crate::array::{DType, Flavor};
    use crate::object::Obj;

    fn path(text: &str) -> Vec<String> {
        text.split('.').map(str::to_string).collect()
    }

    #[test]
    fn imports_respect_module_set() {
        let only_numpy = ModuleSet::builtins_only().with(Framework::Numpy, true);
        assert_eq!(
            resolve_import(&path("numpy"), only_numpy),
            Ok(ModuleId::Numpy)
        );
        assert_eq!(
            resolve_import(&path("math"), ModuleSet::builtins_only()),
            Ok(ModuleId::Math)
        );
        let err = resolve_import(&path("mlx.core"), only_numpy).expect_err("disabled");
        assert_eq!(err.to_string(), "No module named 'mlx'");
        let err = resolve_import(&path("pandas"), ModuleSet::all()).expect_err("unknown");
        assert_eq!(err.to_string(), "No module named 'pandas'");
    }

    #[test]
    fn attributes_cover_submodules_constants_and_dtypes() {
        let modules = ModuleSet::all();
        assert_eq!(
            module_attr(ModuleId::Torch, "nn", modules),
            Ok(Obj::Module(ModuleId::TorchNn))
        );
        assert_eq!(
            module_attr(ModuleId::TorchNn, "functional", modules),
            Ok(Obj::Module(ModuleId::TorchFunctional))
        );
        assert_eq!(
            module_attr(ModuleId::Math, "pi", modules),
            Ok(Obj::Float(std::f64::consts::PI))
        );
        assert_eq!(
            module_attr(ModuleId::Torch, "long", modules),
            Ok(Obj::DType(DType::Int64, Flavor::Torch))
        );
        let err = module_attr(ModuleId::Numpy, "frobnicate", modules).expect_err("unknown");
        assert_eq!(err.to_string(), "module 'numpy' has no attribute 'frobnicate'");
    }

    #[test]
    fn framework_names_parse_with_aliases() {
        assert_eq!("PyTorch".parse::<Framework>(), Ok(Framework::Torch));
        assert_eq!("tf".parse::<Framework>(), Ok(Framework::Tensorflow));
        assert!("jax".parse::<Framework>().is_err());
        let set: ModuleSet = [Framework::Mlx].into_iter().collect();
        assert_eq!(set.enabled(), vec![Framework::Mlx]);
    }
}
