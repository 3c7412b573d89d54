#![forbid(unsafe_code)]

//! Running one implementation snippet and reducing everything it bound to
//! the single value that gets compared.

mod python;
mod wire;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::debug;
use xeq_core::{ExecutionResult, Value};
use xeq_script::Interpreter;

pub use python::{DEFAULT_PYTHON, HarnessError, PythonExecutor};
pub use xeq_script::{Bindings, Framework, ModuleSet};

/// Runs a snippet in isolation. Implementations never panic on snippet
/// faults; every failure is reported as `Err(message)`.
pub trait Executor {
    fn execute(&self, code: &str) -> ExecutionResult;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, code: &str) -> ExecutionResult {
        (**self).execute(code)
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn execute(&self, code: &str) -> ExecutionResult {
        (**self).execute(code)
    }
}

/// Picks the value to compare out of a snippet's bindings, which arrive in
/// first-binding order.
pub trait ResultSelector {
    fn select(&self, bindings: Bindings) -> Value;
}

/// `result`, else `output`, else the last binding not starting with `_`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedOrLastSelector;

impl ResultSelector for NamedOrLastSelector {
    fn select(&self, mut bindings: Bindings) -> Value {
        let position = ["result", "output"]
            .iter()
            .find_map(|wanted| bindings.iter().position(|(name, _)| name == wanted))
            .or_else(|| bindings.iter().rposition(|(name, _)| !name.starts_with('_')));
        match position {
            Some(index) => bindings.swap_remove(index).1,
            None => Value::None,
        }
    }
}

/// Executes snippets with the in-process interpreter.
#[derive(Debug, Clone, Default)]
pub struct ScriptExecutor<S = NamedOrLastSelector> {
    interpreter: Interpreter,
    selector: S,
}

impl ScriptExecutor {
    #[must_use]
    pub fn new(modules: ModuleSet) -> Self {
        Self {
            interpreter: Interpreter::new(modules),
            selector: NamedOrLastSelector,
        }
    }
}

impl<S> ScriptExecutor<S> {
    #[must_use]
    pub fn with_selector<T: ResultSelector>(self, selector: T) -> ScriptExecutor<T> {
        ScriptExecutor {
            interpreter: self.interpreter,
            selector,
        }
    }

    #[must_use]
    pub fn modules(&self) -> ModuleSet {
        self.interpreter.modules()
    }
}

impl<S: ResultSelector> Executor for ScriptExecutor<S> {
    fn execute(&self, code: &str) -> ExecutionResult {
        match self.interpreter.run(code) {
            Ok(bindings) => Ok(self.selector.select(bindings)),
            Err(error) => {
                debug!("snippet raised: {error}");
                Err(error.to_string())
            }
        }
    }
}

/// `Python` runs snippets against the installed libraries; `Native` is the
/// in-process interpreter, which only covers straight-line numpy, torch,
/// tensorflow and mlx code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorKind {
    Native,
    #[default]
    Python,
}

impl ExecutorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Python => "python",
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutorKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "native" | "script" => Ok(Self::Native),
            "python" | "python3" => Ok(Self::Python),
            other => Err(format!(
                "unknown executor '{other}' (expected native or python)"
            )),
        }
    }
}

/// Everything needed to construct either executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorSettings {
    pub kind: ExecutorKind,
    pub python: PathBuf,
    pub timeout: Option<Duration>,
    pub modules: ModuleSet,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            kind: ExecutorKind::Python,
            python: PathBuf::from(DEFAULT_PYTHON),
            timeout: None,
            modules: ModuleSet::all(),
        }
    }
}

impl ExecutorSettings {
    #[must_use]
    pub fn build(&self) -> Box<dyn Executor> {
        match self.kind {
            ExecutorKind::Native => Box::new(ScriptExecutor::new(self.modules)),
            ExecutorKind::Python => Box::new(
                PythonExecutor::new(self.python.clone())
                    .with_timeout(self.timeout)
                    .with_modules(self.modules),
            ),
        }
    }
}
