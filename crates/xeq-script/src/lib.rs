#![forbid(unsafe_code)]

//! A restricted interpreter for the straight-line numeric Python snippets
//! found in cross-framework code pairs: assignments, imports, expressions,
//! and a numpy/torch/tensorflow/mlx array model large enough to execute
//! typical API examples without a Python installation.

pub mod array;
pub mod builtins;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod modules;
pub mod numeric;
pub mod object;
pub mod ops;
pub mod parser;

pub use error::ScriptError;
pub use interp::{Bindings, Interpreter};
pub use modules::{Framework, ModuleSet};

pub type ScriptResult<T> = Result<T, ScriptError>;
