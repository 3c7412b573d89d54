#![forbid(unsafe_code)]

pub mod pyfmt;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use num_complex::Complex64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

pub const MAX_CORPUS_FILE_BYTES: u64 = 256 * 1_048_576;

pub const PAIRS_SUFFIX: &str = "_pairs.json";
pub const MUTATED_SUFFIX: &str = "_mutated.json";
pub const EQUIVALENT_SUFFIX: &str = "_equivalent.json";
pub const DEBUG_SUFFIX: &str = "_debug.json";
pub const VALUES_SUFFIX: &str = "_values.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImplTag {
    Original,
    Pytorch,
    Tensorflow,
}

impl ImplTag {
    pub const ALL: [Self; 3] = [Self::Original, Self::Pytorch, Self::Tensorflow];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Pytorch => "pytorch",
            Self::Tensorflow => "tensorflow",
        }
    }
}

impl fmt::Display for ImplTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImplTag {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == raw)
            .ok_or_else(|| format!("unknown implementation tag '{raw}'"))
    }
}

/// Key used for a pairwise distance between two implementation tags.
#[must_use]
pub fn pair_key(lhs: ImplTag, rhs: ImplTag) -> String {
    format!("{lhs}-{rhs}")
}

/// One operation written against several frameworks.
///
/// Keys outside [`ImplTag`] and non-string values are carried through
/// serialization untouched but never mutated or executed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, JsonValue>", into = "Map<String, JsonValue>")]
pub struct CodePair {
    implementations: BTreeMap<ImplTag, String>,
    extra: Map<String, JsonValue>,
}

impl CodePair {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, tag: ImplTag, code: impl Into<String>) -> Self {
        self.insert(tag, code);
        self
    }

    pub fn insert(&mut self, tag: ImplTag, code: impl Into<String>) {
        self.implementations.insert(tag, code.into());
    }

    #[must_use]
    pub fn get(&self, tag: ImplTag) -> Option<&str> {
        self.implementations.get(&tag).map(String::as_str)
    }

    /// Implementations in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (ImplTag, &str)> {
        self.implementations
            .iter()
            .map(|(tag, code)| (*tag, code.as_str()))
    }

    /// Tags whose code is non-empty after trimming whitespace, in tag order.
    #[must_use]
    pub fn runnable_tags(&self) -> Vec<ImplTag> {
        self.iter()
            .filter(|(_, code)| !code.trim().is_empty())
            .map(|(tag, _)| tag)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }

    #[must_use]
    pub fn extra(&self) -> &Map<String, JsonValue> {
        &self.extra
    }
}

impl From<Map<String, JsonValue>> for CodePair {
    fn from(raw: Map<String, JsonValue>) -> Self {
        let mut pair = Self::default();
        for (key, value) in raw {
            match (key.parse::<ImplTag>(), value) {
                (Ok(tag), JsonValue::String(code)) => {
                    pair.implementations.insert(tag, code);
                }
                (_, value) => {
                    pair.extra.insert(key, value);
                }
            }
        }
        pair
    }
}

impl From<CodePair> for Map<String, JsonValue> {
    fn from(pair: CodePair) -> Self {
        let mut out = pair.extra;
        for (tag, code) in pair.implementations {
            out.insert(tag.as_str().to_string(), JsonValue::String(code));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Numeric(Vec<f64>),
    /// The array exists but its elements cannot be cast to float.
    NonNumeric(String),
}

/// A native multi-dimensional numeric array, row-major. `text` and `repr`
/// hold the Python `str()` and `repr()` forms.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    pub shape: Vec<usize>,
    pub data: ArrayData,
    pub text: String,
    pub repr: String,
}

impl NdArray {
    #[must_use]
    pub fn numeric(shape: Vec<usize>, values: Vec<f64>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            shape,
            data: ArrayData::Numeric(values),
            repr: text.clone(),
            text,
        }
    }

    #[must_use]
    pub fn with_repr(mut self, repr: impl Into<String>) -> Self {
        self.repr = repr.into();
        self
    }

    #[must_use]
    pub fn values(&self) -> Option<&[f64]> {
        match &self.data {
            ArrayData::Numeric(values) => Some(values.as_slice()),
            ArrayData::NonNumeric(_) => None,
        }
    }
}

/// An array-like object whose numbers are only reachable through an
/// extraction call that may itself fail.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorValue {
    pub text: String,
    pub repr: String,
    pub extracted: Result<NdArray, String>,
}

/// The value an implementation produced, classified by runtime shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Real(f64),
    Complex(Complex64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    NdArray(NdArray),
    Tensor(TensorValue),
    /// Graph-mode tensor; `extracted` holds the forced evaluation.
    Deferred(TensorValue),
    Opaque(String),
}

impl Value {
    /// Python `str(value)`.
    #[must_use]
    pub fn python_str(&self) -> String {
        match self {
            Self::Str(text) => text.clone(),
            Self::NdArray(array) => array.text.clone(),
            Self::Tensor(tensor) | Self::Deferred(tensor) => tensor.text.clone(),
            other => other.python_repr(),
        }
    }

    /// Python `repr(value)`.
    #[must_use]
    pub fn python_repr(&self) -> String {
        match self {
            Self::None => "None".to_string(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Int(value) => value.to_string(),
            Self::Real(value) => pyfmt::float_repr(*value),
            Self::Complex(value) => pyfmt::complex_repr(*value),
            Self::Str(text) => pyfmt::str_repr(text),
            Self::List(items) => format!("[{}]", join_reprs(items)),
            Self::Tuple(items) if items.len() == 1 => format!("({},)", items[0].python_repr()),
            Self::Tuple(items) => format!("({})", join_reprs(items)),
            Self::NdArray(array) => array.repr.clone(),
            Self::Tensor(tensor) | Self::Deferred(tensor) => tensor.repr.clone(),
            Self::Opaque(repr) => repr.clone(),
        }
    }
}

fn join_reprs(items: &[Value]) -> String {
    items
        .iter()
        .map(Value::python_repr)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of running one implementation: the selected value or the
/// exception message.
pub type ExecutionResult = Result<Value, String>;

/// Truncates to at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((boundary, _)) => text[..boundary].to_string(),
        None => text.to_string(),
    }
}

/// Truncates to at most `max_len` bytes on a char boundary, marking the cut.
#[must_use]
pub fn bounded_diagnostic(input: &str, max_len: usize) -> String {
    if input.len() <= max_len {
        return input.to_string();
    }

    let mut boundary = max_len.min(input.len());
    while boundary > 0 && !input.is_char_boundary(boundary) {
        boundary -= 1;
    }
    format!("{}...", &input[..boundary])
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("input directory does not exist: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("failed reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} exceeds max bytes: actual={actual} max={max}", path.display())]
    TooLarge { path: PathBuf, actual: u64, max: u64 },
    #[error("failed parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed serializing {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Reads a UTF-8 corpus file, refusing anything over
/// [`MAX_CORPUS_FILE_BYTES`].
pub fn read_text(path: &Path) -> Result<String, CorpusError> {
    let metadata = fs::metadata(path).map_err(|source| CorpusError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let size = metadata.len();
    if size > MAX_CORPUS_FILE_BYTES {
        return Err(CorpusError::TooLarge {
            path: path.to_path_buf(),
            actual: size,
            max: MAX_CORPUS_FILE_BYTES,
        });
    }

    fs::read_to_string(path).map_err(|source| CorpusError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_json<T>(path: &Path) -> Result<T, CorpusError>
where
    T: DeserializeOwned,
{
    let raw = read_text(path)?;
    serde_json::from_str::<T>(&raw).map_err(|source| CorpusError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes pretty JSON with two-space indentation, creating parent
/// directories as needed.
pub fn write_json<T>(path: &Path, value: &T) -> Result<(), CorpusError>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string_pretty(value).map_err(|source| CorpusError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| CorpusError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, raw).map_err(|source| CorpusError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Per-framework subdirectories of a corpus root, sorted by name.
pub fn framework_dirs(root: &Path) -> Result<Vec<PathBuf>, CorpusError> {
    if !root.is_dir() {
        return Err(CorpusError::MissingInput(root.to_path_buf()));
    }
    Ok(read_dir_sorted(root)?
        .into_iter()
        .filter(|path| path.is_dir())
        .collect())
}

/// Files directly under `dir` whose name ends with `suffix`, sorted by name.
pub fn files_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, CorpusError> {
    Ok(read_dir_sorted(dir)?
        .into_iter()
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(suffix))
        })
        .collect())
}

/// File name with `suffix` removed, or the whole name when it does not end
/// with it.
#[must_use]
pub fn stem_without_suffix(path: &Path, suffix: &str) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(suffix).map_or(name.clone(), str::to_string)
}

/// Name of the last path component, used as the framework label.
#[must_use]
pub fn dir_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, CorpusError> {
    let entries = fs::read_dir(dir).map_err(|source| CorpusError::Read {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => paths.push(entry.path()),
            Err(error) => log::warn!("skipping unreadable entry in {}: {error}", dir.display()),
        }
    }
    paths.sort();
    Ok(paths)
}
