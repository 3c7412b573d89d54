#![forbid(unsafe_code)]

pub mod normalize;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use thiserror::Error;
use xeq_core::{
    CodePair, CorpusError, DEBUG_SUFFIX, EQUIVALENT_SUFFIX, ImplTag, MUTATED_SUFFIX, Value,
    bounded_diagnostic, dir_label, files_with_suffix, framework_dirs, load_json, pair_key,
    stem_without_suffix, truncate_chars, write_json,
};
use xeq_exec::Executor;

pub use normalize::{INFINITY_SUBSTITUTE, NormalizeError, distance, normalize, vector_distance};

pub const DEFAULT_THRESHOLD: f64 = 0.01;
/// Leading pairs of every file that are logged even when equivalent.
pub const DEBUG_HEAD_PAIRS: usize = 5;
pub const RESULT_TEXT_CHARS: usize = 100;
pub const ERROR_TEXT_CHARS: usize = 200;
const MALFORMED_TRACE_BYTES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ThresholdError {
    #[error("threshold must not be NaN")]
    NotANumber,
    #[error("threshold must be non-negative, got {0}")]
    Negative(f64),
}

/// Maximum pairwise distance still classified as equivalent.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self, ThresholdError> {
        if value.is_nan() {
            return Err(ThresholdError::NotANumber);
        }
        if value < 0.0 {
            return Err(ThresholdError::Negative(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictReason {
    InsufficientImplementations,
    InsufficientSuccessfulExecutions,
}

impl VerdictReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientImplementations => "insufficient implementations",
            Self::InsufficientSuccessfulExecutions => "insufficient successful executions",
        }
    }
}

impl fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VerdictReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Outcome of comparing the implementations of one code pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquivalenceVerdict {
    pub is_equivalent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<VerdictReason>,
    /// `str()` of each successful result, truncated.
    pub results: BTreeMap<ImplTag, String>,
    /// Exception message of each failed execution, truncated.
    pub errors: BTreeMap<ImplTag, String>,
    /// Pairwise distances keyed `"<a>-<b>"`, in tag order.
    #[serde(serialize_with = "serialize_distances")]
    pub distances: Vec<(String, f64)>,
    #[serde(
        serialize_with = "serialize_max_distance",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_distance: Option<f64>,
}

impl EquivalenceVerdict {
    fn rejected(reason: VerdictReason) -> Self {
        Self {
            is_equivalent: false,
            reason: Some(reason),
            results: BTreeMap::new(),
            errors: BTreeMap::new(),
            distances: Vec::new(),
            max_distance: None,
        }
    }
}

/// Distances are JSON numbers when finite and the strings `inf`/`nan`
/// otherwise, since JSON has no literal for them.
struct DistanceJson(f64);

impl Serialize for DistanceJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_finite() {
            serializer.serialize_f64(self.0)
        } else if self.0.is_nan() {
            serializer.serialize_str("nan")
        } else if self.0 > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }
}

fn serialize_distances<S: Serializer>(
    distances: &[(String, f64)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(
        distances
            .iter()
            .map(|(key, value)| (key.as_str(), DistanceJson(*value))),
    )
}

fn serialize_max_distance<S: Serializer>(
    max_distance: &Option<f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match max_distance {
        Some(value) => DistanceJson(*value).serialize(serializer),
        None => serializer.serialize_none(),
    }
}

/// Executes each implementation of a pair and decides whether they agree.
#[derive(Debug, Clone)]
pub struct EquivalenceClassifier<E> {
    executor: E,
    threshold: Threshold,
}

impl<E: Executor> EquivalenceClassifier<E> {
    #[must_use]
    pub fn new(executor: E, threshold: Threshold) -> Self {
        Self {
            executor,
            threshold,
        }
    }

    #[must_use]
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    #[must_use]
    pub fn classify(&self, pair: &CodePair) -> EquivalenceVerdict {
        let tags = pair.runnable_tags();
        if tags.len() < 2 {
            return EquivalenceVerdict::rejected(VerdictReason::InsufficientImplementations);
        }

        let mut results = BTreeMap::new();
        let mut errors = BTreeMap::new();
        let mut values: Vec<(ImplTag, Value)> = Vec::with_capacity(tags.len());
        for tag in tags {
            let Some(code) = pair.get(tag) else {
                continue;
            };
            match self.executor.execute(code) {
                Ok(value) => {
                    results.insert(tag, truncate_chars(&value.python_str(), RESULT_TEXT_CHARS));
                    values.push((tag, value));
                }
                Err(message) => {
                    log::debug!("{tag} implementation failed: {message}");
                    errors.insert(tag, truncate_chars(&message, ERROR_TEXT_CHARS));
                }
            }
        }

        if values.len() < 2 {
            return EquivalenceVerdict {
                results,
                errors,
                ..EquivalenceVerdict::rejected(VerdictReason::InsufficientSuccessfulExecutions)
            };
        }

        let mut distances = Vec::new();
        for (index, (lhs_tag, lhs)) in values.iter().enumerate() {
            for (rhs_tag, rhs) in &values[index + 1..] {
                distances.push((pair_key(*lhs_tag, *rhs_tag), distance(lhs, rhs)));
            }
        }
        let max_distance = distances
            .iter()
            .map(|(_, value)| *value)
            .fold(f64::NEG_INFINITY, f64::max);

        EquivalenceVerdict {
            is_equivalent: max_distance <= self.threshold.get(),
            reason: None,
            results,
            errors,
            distances,
            max_distance: Some(max_distance),
        }
    }
}

/// Running pair counts for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total_pairs: usize,
    pub equivalent_pairs: usize,
    pub non_equivalent_pairs: usize,
}

impl BatchStats {
    pub fn record(&mut self, is_equivalent: bool) {
        self.total_pairs += 1;
        if is_equivalent {
            self.equivalent_pairs += 1;
        } else {
            self.non_equivalent_pairs += 1;
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.total_pairs += other.total_pairs;
        self.equivalent_pairs += other.equivalent_pairs;
        self.non_equivalent_pairs += other.non_equivalent_pairs;
    }

    /// Equivalent over total, or 0 for an empty batch.
    #[must_use]
    pub fn retention_rate(&self) -> f64 {
        if self.total_pairs == 0 {
            return 0.0;
        }
        self.equivalent_pairs as f64 / self.total_pairs as f64
    }
}

/// One entry of a `<api>_debug.json` file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DebugRecord {
    Evaluated {
        pair_index: usize,
        is_equivalent: bool,
        debug_info: EquivalenceVerdict,
    },
    Malformed {
        pair_index: usize,
        error: String,
        trace: String,
    },
}

/// Everything produced for one input file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEvaluation {
    pub equivalent: Vec<JsonValue>,
    pub debug: Vec<DebugRecord>,
    pub stats: BatchStats,
}

/// Classifies every element of a mutated file. Elements that are not code
/// pair objects count as non-equivalent and are recorded as malformed.
pub fn evaluate_pairs<E: Executor>(
    classifier: &EquivalenceClassifier<E>,
    elements: Vec<JsonValue>,
) -> FileEvaluation {
    let mut evaluation = FileEvaluation {
        equivalent: Vec::new(),
        debug: Vec::new(),
        stats: BatchStats::default(),
    };

    for (pair_index, element) in elements.into_iter().enumerate() {
        let pair = match serde_json::from_value::<CodePair>(element.clone()) {
            Ok(pair) => pair,
            Err(error) => {
                log::debug!("pair {pair_index} is malformed: {error}");
                evaluation.stats.record(false);
                evaluation.debug.push(DebugRecord::Malformed {
                    pair_index,
                    error: error.to_string(),
                    trace: format!(
                        "decoding element {pair_index}: {}",
                        bounded_diagnostic(&element.to_string(), MALFORMED_TRACE_BYTES)
                    ),
                });
                continue;
            }
        };

        let verdict = classifier.classify(&pair);
        let is_equivalent = verdict.is_equivalent;
        log::debug!(
            "pair {pair_index}: equivalent={is_equivalent} max_distance={:?}",
            verdict.max_distance
        );
        evaluation.stats.record(is_equivalent);
        if is_equivalent {
            evaluation.equivalent.push(element);
        }
        if pair_index < DEBUG_HEAD_PAIRS || !is_equivalent {
            evaluation.debug.push(DebugRecord::Evaluated {
                pair_index,
                is_equivalent,
                debug_info: verdict,
            });
        }
    }
    evaluation
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationFileSummary {
    pub framework: String,
    pub api: String,
    pub stats: BatchStats,
    pub equivalent_path: Option<PathBuf>,
    pub debug_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub files: Vec<EvaluationFileSummary>,
    pub skipped_files: Vec<PathBuf>,
    pub stats: BatchStats,
}

/// Evaluates every `<framework>/<api>_mutated.json` under `input_dir`,
/// writing `<api>_equivalent.json` (only when non-empty) and
/// `<api>_debug.json` under `<output_dir>/<framework>/`.
pub fn evaluate_corpus<E: Executor>(
    input_dir: &Path,
    output_dir: &Path,
    classifier: &EquivalenceClassifier<E>,
) -> Result<EvaluationReport, CorpusError> {
    log::info!(
        "starting equivalence evaluation with distance threshold {}",
        classifier.threshold().get()
    );
    let mut report = EvaluationReport::default();
    for framework_dir in framework_dirs(input_dir)? {
        let framework = dir_label(&framework_dir);
        log::info!("processing {framework} library");
        let files = match files_with_suffix(&framework_dir, MUTATED_SUFFIX) {
            Ok(files) => files,
            Err(error) => {
                log::error!("{error}");
                report.skipped_files.push(framework_dir);
                continue;
            }
        };
        for input_file in files {
            match evaluate_file(&input_file, &framework, output_dir, classifier) {
                Ok(Some(summary)) => {
                    report.stats.merge(&summary.stats);
                    report.files.push(summary);
                }
                Ok(None) => report.skipped_files.push(input_file),
                Err(error) => {
                    log::error!("{error}");
                    report.skipped_files.push(input_file);
                }
            }
        }
    }

    log::info!(
        "evaluated {} code pairs: {} equivalent, {} non-equivalent, retention {:.2}%",
        report.stats.total_pairs,
        report.stats.equivalent_pairs,
        report.stats.non_equivalent_pairs,
        report.stats.retention_rate() * 100.0
    );
    Ok(report)
}

fn evaluate_file<E: Executor>(
    input_file: &Path,
    framework: &str,
    output_dir: &Path,
    classifier: &EquivalenceClassifier<E>,
) -> Result<Option<EvaluationFileSummary>, CorpusError> {
    let elements: Vec<JsonValue> = load_json(input_file)?;
    if elements.is_empty() {
        log::warn!("no code pairs found in {}, skipping", input_file.display());
        return Ok(None);
    }

    let api = stem_without_suffix(input_file, MUTATED_SUFFIX);
    log::info!("evaluating {} code pairs for {api}", elements.len());
    let total = elements.len();
    let evaluation = evaluate_pairs(classifier, elements);

    let framework_out = output_dir.join(framework);
    let equivalent_path = if evaluation.equivalent.is_empty() {
        log::info!("no equivalent code pairs found for {api}");
        None
    } else {
        let path = framework_out.join(format!("{api}{EQUIVALENT_SUFFIX}"));
        write_json(&path, &evaluation.equivalent)?;
        log::info!(
            "saved {}/{total} equivalent code pairs for {api}",
            evaluation.equivalent.len()
        );
        Some(path)
    };

    let debug_path = framework_out.join(format!("{api}{DEBUG_SUFFIX}"));
    write_json(&debug_path, &evaluation.debug)?;

    Ok(Some(EvaluationFileSummary {
        framework: framework.to_string(),
        api,
        stats: evaluation.stats,
        equivalent_path,
        debug_path,
    }))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;
    use xeq_core::{ArrayData, CodePair, ExecutionResult, ImplTag, NdArray, Value};
    use xeq_exec::{Executor, ModuleSet, ScriptExecutor};

    use super::{
        BatchStats, DebugRecord, EquivalenceClassifier, RESULT_TEXT_CHARS, Threshold,
        ThresholdError, VerdictReason, evaluate_pairs,
    };

    fn classifier() -> EquivalenceClassifier<ScriptExecutor> {
        EquivalenceClassifier::new(
            ScriptExecutor::new(ModuleSet::all()),
            Threshold::default(),
        )
    }

    fn pair(original: &str, pytorch: &str, tensorflow: &str) -> CodePair {
        CodePair::new()
            .with(ImplTag::Original, original)
            .with(ImplTag::Pytorch, pytorch)
            .with(ImplTag::Tensorflow, tensorflow)
    }

    struct Recording {
        calls: RefCell<Vec<String>>,
    }

    impl Executor for Recording {
        fn execute(&self, code: &str) -> ExecutionResult {
            self.calls.borrow_mut().push(code.to_string());
            Ok(Value::None)
        }
    }

    #[test]
    fn equivalent_scalars_within_threshold() {
        let verdict = classifier().classify(&pair("result = 1.0", "result = 1.0000001", "result = 1.0"));
        assert!(verdict.is_equivalent);
        assert_eq!(verdict.reason, None);
        let keys: Vec<&str> = verdict.distances.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, ["original-pytorch", "original-tensorflow", "pytorch-tensorflow"]);
    }

    #[test]
    fn distant_scalars_are_not_equivalent() {
        let verdict = classifier().classify(&pair("result = 1.0", "result = 2.0", "result = 1.0"));
        assert!(!verdict.is_equivalent);
        assert_eq!(verdict.max_distance, Some(1.0));
        assert_eq!(verdict.results.get(&ImplTag::Pytorch).map(String::as_str), Some("2.0"));
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let classifier = EquivalenceClassifier::new(
            ScriptExecutor::new(ModuleSet::builtins_only()),
            Threshold::new(1.0).expect("valid threshold"),
        );
        let verdict = classifier.classify(
            &CodePair::new()
                .with(ImplTag::Original, "result = 1.0")
                .with(ImplTag::Pytorch, "result = 2.0"),
        );
        assert!(verdict.is_equivalent);
    }

    #[test]
    fn fewer_than_two_implementations_runs_nothing() {
        let executor = Recording {
            calls: RefCell::new(Vec::new()),
        };
        let classifier = EquivalenceClassifier::new(&executor, Threshold::default());
        let verdict = classifier.classify(
            &CodePair::new()
                .with(ImplTag::Original, "result = 1.0")
                .with(ImplTag::Pytorch, "   \n"),
        );
        assert!(!verdict.is_equivalent);
        assert_eq!(verdict.reason, Some(VerdictReason::InsufficientImplementations));
        assert!(executor.calls.borrow().is_empty());
    }

    #[test]
    fn failed_executions_are_recorded_and_truncated() {
        let long_name = "x".repeat(300);
        let verdict = classifier().classify(&pair(
            "result = 1.0",
            &format!("result = {long_name}"),
            "result = 1 / 0",
        ));
        assert!(!verdict.is_equivalent);
        assert_eq!(
            verdict.reason,
            Some(VerdictReason::InsufficientSuccessfulExecutions)
        );
        assert_eq!(verdict.errors.len(), 2);
        assert_eq!(verdict.errors[&ImplTag::Pytorch].chars().count(), 200);
        assert_eq!(verdict.errors[&ImplTag::Tensorflow], "division by zero");
        assert!(verdict.distances.is_empty());
    }

    #[test]
    fn result_text_is_truncated_to_a_hundred_chars() {
        struct Wordy;
        impl Executor for Wordy {
            fn execute(&self, code: &str) -> ExecutionResult {
                if code.contains("long") {
                    Ok(Value::Str("é".repeat(250)))
                } else {
                    Ok(Value::Str("short".to_string()))
                }
            }
        }

        let classifier = EquivalenceClassifier::new(Wordy, Threshold::default());
        let verdict = classifier.classify(
            &CodePair::new()
                .with(ImplTag::Original, "result = long")
                .with(ImplTag::Pytorch, "result = brief"),
        );
        assert_eq!(verdict.results[&ImplTag::Original], "é".repeat(RESULT_TEXT_CHARS));
        assert_eq!(verdict.results[&ImplTag::Pytorch], "short");
    }

    #[test]
    fn verdict_serializes_non_finite_distances_as_strings() {
        struct Words;
        impl Executor for Words {
            fn execute(&self, code: &str) -> ExecutionResult {
                if code.contains("words") {
                    Ok(Value::NdArray(NdArray {
                        shape: vec![2],
                        data: ArrayData::NonNumeric(
                            "could not convert string to float: 'a'".to_string(),
                        ),
                        text: "['a' 'b']".to_string(),
                        repr: "array(['a', 'b'], dtype='<U1')".to_string(),
                    }))
                } else {
                    Ok(Value::Real(1.0))
                }
            }
        }

        let classifier = EquivalenceClassifier::new(Words, Threshold::default());
        let verdict = classifier.classify(
            &CodePair::new()
                .with(ImplTag::Original, "result = words")
                .with(ImplTag::Pytorch, "result = 1.0"),
        );
        assert_eq!(verdict.max_distance, Some(f64::INFINITY));
        let encoded = serde_json::to_value(&verdict).expect("verdict serializes");
        assert_eq!(encoded["distances"]["original-pytorch"], json!("inf"));
        assert_eq!(encoded["max_distance"], json!("inf"));
        assert_eq!(encoded["results"]["original"], json!("['a' 'b']"));
        assert_eq!(encoded["is_equivalent"], json!(false));
        assert!(encoded.get("reason").is_none());
    }

    #[test]
    fn rejected_verdict_serializes_reason() {
        let verdict = classifier().classify(&CodePair::new().with(ImplTag::Original, "x = 1"));
        let encoded = serde_json::to_value(&verdict).expect("verdict serializes");
        assert_eq!(encoded["reason"], json!("insufficient implementations"));
        assert!(encoded.get("max_distance").is_none());
    }

    #[test]
    fn threshold_rejects_negative_and_nan() {
        assert_eq!(Threshold::new(-0.5), Err(ThresholdError::Negative(-0.5)));
        assert_eq!(Threshold::new(f64::NAN), Err(ThresholdError::NotANumber));
        assert_eq!(Threshold::new(0.0).map(Threshold::get), Ok(0.0));
    }

    #[test]
    fn batch_stats_merge_and_rate() {
        let mut first = BatchStats::default();
        assert_eq!(first.retention_rate(), 0.0);
        first.record(true);
        first.record(false);
        let mut second = BatchStats::default();
        second.record(true);
        second.record(true);
        first.merge(&second);
        assert_eq!(first.total_pairs, 4);
        assert_eq!(first.equivalent_pairs, 3);
        assert_eq!(first.non_equivalent_pairs, 1);
        assert_eq!(first.retention_rate(), 0.75);
    }

    #[test]
    fn debug_log_keeps_head_and_failures() {
        let mut elements = Vec::new();
        for _ in 0..7 {
            elements.push(json!({"original": "result = 1.0", "pytorch": "result = 1.0"}));
        }
        elements.push(json!({"original": "result = 1.0", "pytorch": "result = 3.0"}));
        elements.push(json!("not a pair"));

        let evaluation = evaluate_pairs(&classifier(), elements);
        assert_eq!(evaluation.stats.total_pairs, 9);
        assert_eq!(evaluation.stats.equivalent_pairs, 7);
        assert_eq!(evaluation.equivalent.len(), 7);

        let indices: Vec<usize> = evaluation
            .debug
            .iter()
            .map(|record| match record {
                DebugRecord::Evaluated { pair_index, .. }
                | DebugRecord::Malformed { pair_index, .. } => *pair_index,
            })
            .collect();
        assert_eq!(indices, [0, 1, 2, 3, 4, 7, 8]);
        assert!(matches!(
            &evaluation.debug[6],
            DebugRecord::Malformed { trace, .. } if trace.contains("not a pair")
        ));
    }

    #[test]
    fn equivalent_output_preserves_extra_keys() {
        let element = json!({
            "original": "result = 1.0",
            "pytorch": "result = 1.0",
            "source": "docs",
            "tensorflow": 3
        });
        let evaluation = evaluate_pairs(&classifier(), vec![element.clone()]);
        assert_eq!(evaluation.equivalent, vec![element]);
    }
}
