//! Layered configuration for `xeq`.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. A JSON file (`--config`, `XEQ_CONFIG`, or `./xeq.json`)
//! 3. Environment variables
//! 4. Command-line flags

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use xeq_eval::{DEFAULT_THRESHOLD, Threshold};
use xeq_exec::{DEFAULT_PYTHON, ExecutorKind, ExecutorSettings, Framework, ModuleSet};
use xeq_mutate::MutatorConfig;

pub const DEFAULT_CONFIG_FILE: &str = "xeq.json";
/// The command line asks for more mutants than the library default.
pub const DEFAULT_CLI_MUTATION_COUNT: usize = 100;

const MUTATION_COUNT_ENV: &str = "XEQ_MUTATION_COUNT";
const THRESHOLD_ENV: &str = "XEQ_THRESHOLD";
const EXECUTOR_ENV: &str = "XEQ_EXECUTOR";
const PYTHON_ENV: &str = "XEQ_PYTHON";
const TIMEOUT_ENV: &str = "XEQ_EXEC_TIMEOUT_SECS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XeqConfig {
    pub mutate: MutateSection,
    pub evaluate: EvaluateSection,
    pub executor: ExecutorSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutateSection {
    pub mutation_count: usize,
}

impl Default for MutateSection {
    fn default() -> Self {
        Self {
            mutation_count: DEFAULT_CLI_MUTATION_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateSection {
    pub threshold: f64,
}

impl Default for EvaluateSection {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    /// `python` runs the real libraries; `native` uses the built-in
    /// interpreter.
    pub kind: String,
    pub python: PathBuf,
    /// Wall-clock limit per snippet; only the Python executor enforces it.
    pub timeout_secs: Option<u64>,
    /// Importable numeric libraries.
    pub modules: Vec<String>,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            kind: ExecutorKind::Python.as_str().to_string(),
            python: PathBuf::from(DEFAULT_PYTHON),
            timeout_secs: None,
            modules: Framework::ALL
                .iter()
                .map(|framework| framework.name().to_string())
                .collect(),
        }
    }
}

/// Values given on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub mutation_count: Option<usize>,
    pub threshold: Option<f64>,
    pub executor: Option<String>,
    pub python: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub modules: Option<Vec<String>>,
}

impl XeqConfig {
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(count) = overrides.mutation_count {
            self.mutate.mutation_count = count;
        }
        if let Some(threshold) = overrides.threshold {
            self.evaluate.threshold = threshold;
        }
        if let Some(kind) = overrides.executor {
            self.executor.kind = kind;
        }
        if let Some(python) = overrides.python {
            self.executor.python = python;
        }
        if let Some(timeout) = overrides.timeout_secs {
            self.executor.timeout_secs = Some(timeout);
        }
        if let Some(modules) = overrides.modules {
            self.executor.modules = modules;
        }
    }

    #[must_use]
    pub fn mutator(&self) -> MutatorConfig {
        MutatorConfig {
            mutation_count: self.mutate.mutation_count,
        }
    }

    pub fn threshold(&self) -> Result<Threshold> {
        Threshold::new(self.evaluate.threshold).context("invalid evaluate.threshold")
    }

    pub fn executor_settings(&self) -> Result<ExecutorSettings> {
        let kind = self
            .executor
            .kind
            .parse::<ExecutorKind>()
            .map_err(|message| anyhow!(message))
            .context("invalid executor.kind")?;
        let modules = self
            .executor
            .modules
            .iter()
            .map(|name| name.parse::<Framework>().map_err(|message| anyhow!(message)))
            .collect::<Result<ModuleSet>>()
            .context("invalid executor.modules")?;
        Ok(ExecutorSettings {
            kind,
            python: self.executor.python.clone(),
            timeout: self
                .executor
                .timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            modules,
        })
    }
}

/// Configuration loader with file and environment support.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the config file, then the process environment.
    pub fn load(explicit: Option<&Path>) -> Result<XeqConfig> {
        Self::load_with(explicit, |key| env::var(key).ok())
    }

    /// Same as [`ConfigLoader::load`] with environment lookups routed through
    /// `lookup`.
    pub fn load_with<F>(explicit: Option<&Path>, lookup: F) -> Result<XeqConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load_from_file(&fallback)?
                } else {
                    debug!("No configuration file found, using defaults");
                    XeqConfig::default()
                }
            }
        };
        Self::apply_environment(&mut config, lookup)?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<XeqConfig> {
        info!("Loading configuration from: {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
    }

    fn apply_environment<F>(config: &mut XeqConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(count) = lookup(MUTATION_COUNT_ENV) {
            config.mutate.mutation_count = count
                .trim()
                .parse()
                .with_context(|| format!("{MUTATION_COUNT_ENV}={count} is not a count"))?;
        }
        if let Some(threshold) = lookup(THRESHOLD_ENV) {
            config.evaluate.threshold = threshold
                .trim()
                .parse()
                .with_context(|| format!("{THRESHOLD_ENV}={threshold} is not a number"))?;
        }
        if let Some(kind) = lookup(EXECUTOR_ENV) {
            config.executor.kind = kind;
        }
        if let Some(python) = lookup(PYTHON_ENV) {
            config.executor.python = PathBuf::from(python);
        }
        if let Some(timeout) = lookup(TIMEOUT_ENV) {
            config.executor.timeout_secs = Some(
                timeout
                    .trim()
                    .parse()
                    .with_context(|| format!("{TIMEOUT_ENV}={timeout} is not whole seconds"))?,
            );
        }
        Ok(())
    }
}
