//! Tree-walking evaluation of parsed snippets.

use std::collections::HashMap;

use num_complex::Complex64;
use xeq_core::Value;

use crate::ScriptResult;
use crate::array::{Array, DType, Flavor, IndexSpec, slice_indices};
use crate::builtins;
use crate::error::ScriptError;
use crate::modules::{Framework, ModuleId, ModuleSet, module_attr, resolve_import};
use crate::numeric;
use crate::object::{Args, Function, Obj, range_len};
use crate::ops;
use crate::parser::{
    CmpOp, Expr, ImportName, Stmt, Subscript, Target, parse_expression, parse_program,
};

/// Every name a snippet bound, in first-binding order.
pub type Bindings = Vec<(String, Value)>;

/// Runs snippets against a fixed set of enabled array libraries.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter {
    modules: ModuleSet,
}

impl Interpreter {
    #[must_use]
    pub fn new(modules: ModuleSet) -> Self {
        Self { modules }
    }

    #[must_use]
    pub fn modules(&self) -> ModuleSet {
        self.modules
    }

    /// Executes `source` in a fresh local scope and returns its bindings.
    pub fn run(&self, source: &str) -> ScriptResult<Bindings> {
        let program = parse_program(source)?;
        let mut scope = Scope::new(self.modules);
        for stmt in &program {
            scope.exec(stmt)?;
        }
        Ok(scope.into_bindings())
    }

    /// Evaluates a single expression with only builtins and the enabled
    /// modules in scope.
    pub fn eval_expression(&self, source: &str) -> ScriptResult<Value> {
        let expr = parse_expression(source)?;
        let mut scope = Scope::new(self.modules);
        Ok(scope.eval(&expr)?.to_value())
    }
}

struct Scope {
    modules: ModuleSet,
    order: Vec<String>,
    locals: HashMap<String, Obj>,
}

impl Scope {
    fn new(modules: ModuleSet) -> Self {
        Self {
            modules,
            order: Vec::new(),
            locals: HashMap::new(),
        }
    }

    fn into_bindings(mut self) -> Bindings {
        self.order
            .into_iter()
            .filter_map(|name| {
                let value = self.locals.remove(&name)?;
                Some((name, value.to_value()))
            })
            .collect()
    }

    fn bind(&mut self, name: &str, value: Obj) {
        if self.locals.insert(name.to_string(), value).is_none() {
            self.order.push(name.to_string());
        }
    }

    fn global(&self, name: &str) -> Option<Obj> {
        let (framework, module) = match name {
            "math" => return Some(Obj::Module(ModuleId::Math)),
            "numpy" | "np" => (Framework::Numpy, ModuleId::Numpy),
            "torch" => (Framework::Torch, ModuleId::Torch),
            "tensorflow" | "tf" => (Framework::Tensorflow, ModuleId::Tensorflow),
            "mx" => (Framework::Mlx, ModuleId::MlxCore),
            _ => return None,
        };
        self.modules
            .contains(framework)
            .then_some(Obj::Module(module))
    }

    fn lookup(&self, name: &str) -> ScriptResult<Obj> {
        if let Some(value) = self.locals.get(name) {
            return Ok(value.clone());
        }
        if let Some(module) = self.global(name) {
            return Ok(module);
        }
        if builtins::is_builtin(name) {
            return Ok(Obj::builtin(name));
        }
        Err(ScriptError::Name(name.to_string()))
    }

    fn exec(&mut self, stmt: &Stmt) -> ScriptResult<()> {
        match stmt {
            Stmt::Import(names) => {
                for ImportName { path, alias } in names {
                    let module = resolve_import(path, self.modules)?;
                    match alias {
                        Some(alias) => self.bind(alias, Obj::Module(module)),
                        None => {
                            let top = resolve_import(&path[..1], self.modules)?;
                            self.bind(&path[0], Obj::Module(top));
                        }
                    }
                }
                Ok(())
            }
            Stmt::FromImport { module, names } => {
                let source = resolve_import(module, self.modules)?;
                for (name, alias) in names {
                    if name == "*" {
                        return Err(ScriptError::unsupported("wildcard imports are not supported"));
                    }
                    let value = module_attr(source, name, self.modules).map_err(|err| match err {
                        ScriptError::Attribute(_) => ScriptError::Import(format!(
                            "cannot import name '{name}' from '{}'",
                            source.name()
                        )),
                        other => other,
                    })?;
                    self.bind(alias.as_deref().unwrap_or(name), value);
                }
                Ok(())
            }
            Stmt::Assign { targets, value } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign(target, value.clone())?;
                }
                Ok(())
            }
            Stmt::AugAssign { target, op, value } => {
                let current = self.lookup(target)?;
                let rhs = self.eval(value)?;
                let updated = ops::binary(*op, &current, &rhs)?;
                self.bind(target, updated);
                Ok(())
            }
            Stmt::Expr(expr) => self.eval(expr).map(drop),
            Stmt::Pass => Ok(()),
        }
    }

    fn assign(&mut self, target: &Target, value: Obj) -> ScriptResult<()> {
        match target {
            Target::Name(name) => {
                self.bind(name, value);
                Ok(())
            }
            Target::Unpack(targets) => {
                let items = value.iterate().map_err(|err| match err {
                    ScriptError::Type(_) => ScriptError::Type(format!(
                        "cannot unpack non-iterable {} object",
                        value.type_name()
                    )),
                    other => other,
                })?;
                if items.len() > targets.len() {
                    return Err(ScriptError::Value(format!(
                        "too many values to unpack (expected {})",
                        targets.len()
                    )));
                }
                if items.len() < targets.len() {
                    return Err(ScriptError::Value(format!(
                        "not enough values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    )));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item)?;
                }
                Ok(())
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> ScriptResult<Obj> {
        match expr {
            Expr::Int(value) => Ok(Obj::Int(*value)),
            Expr::Float(value) => Ok(Obj::Float(*value)),
            Expr::Imaginary(value) => Ok(Obj::Complex(Complex64::new(0.0, *value))),
            Expr::Str(text) => Ok(Obj::Str(text.clone())),
            Expr::Bool(value) => Ok(Obj::Bool(*value)),
            Expr::None => Ok(Obj::None),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => Ok(Obj::List(self.eval_all(items)?)),
            Expr::Tuple(items) => Ok(Obj::Tuple(self.eval_all(items)?)),
            Expr::Unary(op, operand) => {
                let operand = self.eval(operand)?;
                ops::unary(*op, &operand)
            }
            Expr::Binary(lhs, op, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                ops::binary(*op, &lhs, &rhs)
            }
            Expr::And(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if lhs.truth()? { self.eval(rhs) } else { Ok(lhs) }
            }
            Expr::Or(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if lhs.truth()? { Ok(lhs) } else { self.eval(rhs) }
            }
            Expr::Compare(first, rest) => self.compare_chain(first, rest),
            Expr::Conditional { test, body, orelse } => {
                if self.eval(test)?.truth()? {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }
            Expr::Call { func, args, kwargs } => {
                let callee = self.eval(func)?;
                let positional = self.eval_all(args)?;
                let keywords = kwargs
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), self.eval(value)?)))
                    .collect::<ScriptResult<Vec<_>>>()?;
                call_object(&callee, &Args::new(positional, keywords))
            }
            Expr::Attribute(base, attr) => {
                let base = self.eval(base)?;
                attribute(&base, attr, self.modules)
            }
            Expr::Index(base, subscripts) => {
                let base = self.eval(base)?;
                self.subscript(&base, subscripts)
            }
        }
    }

    fn eval_all(&mut self, items: &[Expr]) -> ScriptResult<Vec<Obj>> {
        items.iter().map(|item| self.eval(item)).collect()
    }

    fn compare_chain(&mut self, first: &Expr, rest: &[(CmpOp, Expr)]) -> ScriptResult<Obj> {
        let mut left = self.eval(first)?;
        let mut outcome = Obj::Bool(true);
        for (index, (op, operand)) in rest.iter().enumerate() {
            let right = self.eval(operand)?;
            outcome = ops::compare(*op, &left, &right)?;
            let last = index + 1 == rest.len();
            if !last && !outcome.truth()? {
                return Ok(outcome);
            }
            left = right;
        }
        Ok(outcome)
    }

    fn slice_bound(&mut self, bound: Option<&Expr>) -> ScriptResult<Option<i64>> {
        let Some(bound) = bound else {
            return Ok(None);
        };
        match self.eval(bound)? {
            Obj::None => Ok(None),
            value => value.as_index().map(Some).ok_or_else(|| {
                ScriptError::type_error(
                    "slice indices must be integers or None or have an __index__ method",
                )
            }),
        }
    }

    fn slice_parts(
        &mut self,
        lower: Option<&Expr>,
        upper: Option<&Expr>,
        step: Option<&Expr>,
    ) -> ScriptResult<(Option<i64>, Option<i64>, Option<i64>)> {
        Ok((
            self.slice_bound(lower)?,
            self.slice_bound(upper)?,
            self.slice_bound(step)?,
        ))
    }

    fn subscript(&mut self, base: &Obj, subscripts: &[Subscript]) -> ScriptResult<Obj> {
        if let Obj::Array(array) = base {
            return self.index_array(array, subscripts);
        }
        let noun = match base {
            Obj::List(_) => "list",
            Obj::Tuple(_) => "tuple",
            Obj::Str(_) => "string",
            Obj::Range { .. } => "range object",
            other => {
                return Err(ScriptError::Type(format!(
                    "'{}' object is not subscriptable",
                    other.type_name()
                )));
            }
        };
        let [subscript] = subscripts else {
            return Err(ScriptError::Type(format!(
                "{} indices must be integers or slices, not tuple",
                base.type_name()
            )));
        };
        let len = match base {
            Obj::List(items) | Obj::Tuple(items) => items.len(),
            Obj::Str(text) => text.chars().count(),
            Obj::Range { start, stop, step } => range_len(*start, *stop, *step).max(0) as usize,
            _ => 0,
        };
        match subscript {
            Subscript::Index(expr) => {
                let key = self.eval(expr)?;
                let index = key.as_index().ok_or_else(|| {
                    ScriptError::Type(format!(
                        "{} indices must be integers or slices, not {}",
                        base.type_name(),
                        key.type_name()
                    ))
                })?;
                let resolved = if index < 0 { index + len as i64 } else { index };
                if resolved < 0 || resolved >= len as i64 {
                    return Err(ScriptError::Index(format!("{noun} index out of range")));
                }
                let position = resolved as usize;
                Ok(match base {
                    Obj::List(items) | Obj::Tuple(items) => items[position].clone(),
                    Obj::Str(text) => {
                        Obj::Str(text.chars().nth(position).map(String::from).unwrap_or_default())
                    }
                    Obj::Range { start, step, .. } => Obj::Int(start + resolved * step),
                    _ => Obj::None,
                })
            }
            Subscript::Slice { lower, upper, step } => {
                let (lower, upper, stride) =
                    self.slice_parts(lower.as_ref(), upper.as_ref(), step.as_ref())?;
                let positions = slice_indices(lower, upper, stride, len)?;
                Ok(match base {
                    Obj::List(items) => {
                        Obj::List(positions.iter().map(|p| items[*p].clone()).collect())
                    }
                    Obj::Tuple(items) => {
                        Obj::Tuple(positions.iter().map(|p| items[*p].clone()).collect())
                    }
                    Obj::Str(text) => {
                        let chars: Vec<char> = text.chars().collect();
                        Obj::Str(positions.iter().map(|p| chars[*p]).collect())
                    }
                    Obj::Range { start, step, .. } => {
                        let new_step = step * stride.unwrap_or(1);
                        let new_start = positions
                            .first()
                            .map_or(*start, |first| start + *first as i64 * step);
                        Obj::Range {
                            start: new_start,
                            stop: new_start + positions.len() as i64 * new_step,
                            step: new_step,
                        }
                    }
                    _ => Obj::None,
                })
            }
        }
    }

    fn index_array(&mut self, array: &Array, subscripts: &[Subscript]) -> ScriptResult<Obj> {
        let mut specs = Vec::with_capacity(subscripts.len());
        for subscript in subscripts {
            match subscript {
                Subscript::Slice { lower, upper, step } => {
                    let (start, stop, step) =
                        self.slice_parts(lower.as_ref(), upper.as_ref(), step.as_ref())?;
                    if array.flavor() == Flavor::Torch && step.is_some_and(|s| s < 0) {
                        return Err(ScriptError::value_error("step must be greater than zero"));
                    }
                    specs.push(IndexSpec::Range { start, stop, step });
                }
                Subscript::Index(expr) => match self.eval(expr)? {
                    Obj::None => specs.push(IndexSpec::NewAxis),
                    Obj::Int(index) => specs.push(IndexSpec::At(index)),
                    key @ (Obj::Array(_) | Obj::List(_)) if subscripts.len() == 1 => {
                        return advanced_index(array, &key);
                    }
                    key => match key.as_index() {
                        Some(index) if !matches!(key, Obj::Bool(_)) => {
                            specs.push(IndexSpec::At(index));
                        }
                        _ => {
                            return Err(ScriptError::Index(
                                "only integers, slices (`:`), ellipsis (`...`), numpy.newaxis (`None`) and integer or boolean arrays are valid indices".to_string(),
                            ));
                        }
                    },
                },
            }
        }
        Ok(Obj::from_array(array.select(&specs)?))
    }
}

/// Boolean-mask and integer-array indexing along the first axis.
fn advanced_index(array: &Array, key: &Obj) -> ScriptResult<Obj> {
    let key = numeric::as_array(key, array.flavor())?;
    if key.dtype() == DType::Bool {
        return Ok(Obj::Array(array.mask_select(&key)?));
    }
    if !key.dtype().is_integer() || key.ndim() > 1 {
        return Err(ScriptError::Index(
            "arrays used as indices must be of integer (or boolean) type".to_string(),
        ));
    }
    let rows = key
        .data()
        .iter()
        .map(|index| array.select(&[IndexSpec::At(*index as i64)]))
        .collect::<ScriptResult<Vec<_>>>()?;
    if rows.is_empty() {
        let mut shape = array.shape().to_vec();
        if let Some(first) = shape.first_mut() {
            *first = 0;
        }
        return Ok(Obj::Array(Array::new(shape, Vec::new(), array.dtype(), array.flavor())));
    }
    Ok(Obj::Array(Array::stack(&rows, 0)?))
}

fn attribute(base: &Obj, attr: &str, modules: ModuleSet) -> ScriptResult<Obj> {
    match base {
        Obj::Module(module) => module_attr(*module, attr, modules),
        Obj::Array(array) => numeric::array_attr(array, attr),
        other => builtins::scalar_attr(other, attr),
    }
}

/// Calls any callable object.
pub fn call_object(callee: &Obj, args: &Args) -> ScriptResult<Obj> {
    match callee {
        Obj::Function(Function { module: None, name }) => builtins::call(name, args),
        Obj::Function(Function {
            module: Some(module),
            name,
        }) => numeric::call(*module, name, args),
        Obj::Method(receiver, name) => match receiver.as_ref() {
            Obj::Array(array) => numeric::call_method(array, name, args),
            other => builtins::call_scalar_method(other, name, args),
        },
        Obj::DType(dtype, flavor) => numeric::dtype_call(*dtype, *flavor, args),
        other => Err(ScriptError::Type(format!(
            "'{}' object is not callable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use xeq_core::Value;

    use super::Interpreter;
    use crate::modules::{Framework, ModuleSet};

    fn run(source: &str) -> Vec<(String, Value)> {
        Interpreter::default().run(source).expect("snippet should run")
    }

    fn binding<'a>(bindings: &'a [(String, Value)], name: &str) -> &'a Value {
        &bindings
            .iter()
            .find(|(key, _)| key == name)
            .unwrap_or_else(|| panic!("missing binding {name}"))
            .1
    }

    fn error(source: &str) -> String {
        Interpreter::default()
            .run(source)
            .expect_err("snippet should fail")
            .to_string()
    }

    #[test]
    fn scalar_snippets() {
        let bindings = run("result = 1.0");
        assert_eq!(bindings, vec![("result".to_string(), Value::Real(1.0))]);
        let bindings = run("a, b = 1, 2\nc = a + b * 2\nc += 1\na = 10");
        let names: Vec<&str> = bindings.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(binding(&bindings, "a"), &Value::Int(10));
        assert_eq!(binding(&bindings, "c"), &Value::Int(6));
    }

    #[test]
    fn python_errors_surface_with_messages() {
        assert_eq!(error("x = y + 1"), "name 'y' is not defined");
        assert_eq!(error("x = 1 / 0"), "division by zero");
        assert_eq!(error("x = [1, 2][5]"), "list index out of range");
        assert_eq!(
            error("a, b = [1, 2, 3]"),
            "too many values to unpack (expected 2)"
        );
        assert_eq!(error("x += 1"), "name 'x' is not defined");
    }

    #[test]
    fn numpy_snippet_produces_arrays_and_scalars() {
        let bindings = run(
            "import numpy as np\nx = np.array([1.0, 2.0, 3.0])\ntotal = np.sum(x * 2)\nresult = x[1:]",
        );
        assert_eq!(binding(&bindings, "total"), &Value::Real(12.0));
        let Value::NdArray(array) = binding(&bindings, "result") else {
            panic!("slices stay arrays");
        };
        assert_eq!(array.values(), Some(&[2.0, 3.0][..]));
        assert_eq!(bindings[0].0, "np");
    }

    #[test]
    fn torch_snippet_produces_tensors() {
        let bindings = run(
            "import torch\nx = torch.tensor([[1.0, -2.0], [3.0, 4.0]])\nresult = torch.relu(x).sum(dim=0)",
        );
        let Value::Tensor(tensor) = binding(&bindings, "result") else {
            panic!("torch results are tensors");
        };
        let extracted = tensor.extracted.as_ref().expect("numeric tensor");
        assert_eq!(extracted.values(), Some(&[4.0, 4.0][..]));
        assert!(tensor.repr.starts_with("tensor("));
    }

    #[test]
    fn preloaded_modules_and_disabled_imports() {
        let bindings = run("result = np.mean([1, 2, 3, 4])");
        assert_eq!(binding(&bindings, "result"), &Value::Real(2.5));

        let only_numpy = ModuleSet::builtins_only().with(Framework::Numpy, true);
        let err = Interpreter::new(only_numpy)
            .run("import torch\nresult = 1")
            .expect_err("torch disabled");
        assert_eq!(err.to_string(), "No module named 'torch'");
        let err = Interpreter::new(only_numpy)
            .run("result = torch.zeros(2)")
            .expect_err("torch not preloaded");
        assert_eq!(err.to_string(), "name 'torch' is not defined");
    }

    #[test]
    fn comparisons_and_conditionals() {
        let bindings = run("a = 1 < 2 < 3\nb = 3 if a and not False else 4\nc = None or 'x'");
        assert_eq!(binding(&bindings, "a"), &Value::Bool(true));
        assert_eq!(binding(&bindings, "b"), &Value::Int(3));
        assert_eq!(binding(&bindings, "c"), &Value::Str("x".to_string()));
    }

    #[test]
    fn evaluates_literal_expressions() {
        let value = Interpreter::default()
            .eval_expression("[float('nan'), 1e308 * 10, (1, 'a'), [0, -1]]")
            .expect("literal list");
        let Value::List(items) = value else {
            panic!("list literal");
        };
        assert!(matches!(items[0], Value::Real(v) if v.is_nan()));
        assert_eq!(items[1], Value::Real(f64::INFINITY));
        assert_eq!(
            items[2],
            Value::Tuple(vec![Value::Int(1), Value::Str("a".to_string())])
        );
    }

    #[test]
    fn from_imports_and_masks() {
        let bindings = run(
            "from numpy import array as arr\nx = arr([1, 5, 2, 8])\nbig = x[x > 3]\nfirst = x[[0, 2]]",
        );
        let Value::NdArray(big) = binding(&bindings, "big") else {
            panic!("mask selection yields arrays");
        };
        assert_eq!(big.values(), Some(&[5.0, 8.0][..]));
        let Value::NdArray(first) = binding(&bindings, "first") else {
            panic!("fancy indexing yields arrays");
        };
        assert_eq!(first.values(), Some(&[1.0, 2.0][..]));
        assert_eq!(
            error("from numpy import frobnicate"),
            "cannot import name 'frobnicate' from 'numpy'"
        );
    }
}
