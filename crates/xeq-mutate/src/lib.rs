#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use xeq_core::pyfmt::{float_repr, integral_repr, is_integral, parse_python_float};
use xeq_core::{
    CodePair, CorpusError, ImplTag, dir_label, files_with_suffix, framework_dirs, load_json,
    stem_without_suffix, write_json,
};

pub use xeq_core::{MUTATED_SUFFIX, PAIRS_SUFFIX};

pub const DEFAULT_MUTATION_COUNT: usize = 10;
pub const STRATEGY_COUNT: u64 = 5;

const SPECIAL_VALUES: [f64; 3] = [f64::NAN, f64::INFINITY, f64::NEG_INFINITY];
const MAX_APPENDED_ITEMS: u64 = 3;
const APPENDED_NUMBER_OFFSET: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstructorKind {
    NumpyArray,
    TorchTensor,
    TfConstant,
    MlxArray,
}

impl ConstructorKind {
    pub const ALL: [Self; 4] = [
        Self::NumpyArray,
        Self::TorchTensor,
        Self::TfConstant,
        Self::MlxArray,
    ];

    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::NumpyArray => "np.array",
            Self::TorchTensor => "torch.tensor",
            Self::TfConstant => "tf.constant",
            Self::MlxArray => "mx.array",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Bare,
    Constructor(ConstructorKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Number(f64),
    /// An element that is not a float spelling, kept byte-for-byte.
    Token(String),
}

impl Item {
    fn parse(raw: &str) -> Self {
        match raw {
            "float('nan')" => Self::Number(f64::NAN),
            "float('inf')" => Self::Number(f64::INFINITY),
            "float('-inf')" => Self::Number(f64::NEG_INFINITY),
            _ => parse_python_float(raw).map_or_else(|| Self::Token(raw.to_string()), Self::Number),
        }
    }

    fn finite(&self) -> Option<f64> {
        match self {
            Self::Number(value) if value.is_finite() => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Token(text) => text.clone(),
            Self::Number(value) if value.is_nan() => "float('nan')".to_string(),
            Self::Number(value) if *value == f64::INFINITY => "float('inf')".to_string(),
            Self::Number(value) if *value == f64::NEG_INFINITY => "float('-inf')".to_string(),
            Self::Number(value) if is_integral(*value) => integral_repr(*value),
            Self::Number(value) => float_repr(*value),
        }
    }
}

/// A bracketed list found in source text. `start`/`end` are byte offsets of
/// the whole match, constructor call included.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLiteral {
    pub start: usize,
    pub end: usize,
    pub raw_text: String,
    pub kind: LiteralKind,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStrategy {
    ShiftOne,
    ScaleAll,
    OffsetAll,
    InjectSpecial,
    Extend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub index: u64,
    pub strategy: MutationStrategy,
}

impl MutationRecord {
    #[must_use]
    pub fn new(index: u64) -> Self {
        let strategy = match index % STRATEGY_COUNT {
            0 => MutationStrategy::ShiftOne,
            1 => MutationStrategy::ScaleAll,
            2 => MutationStrategy::OffsetAll,
            3 => MutationStrategy::InjectSpecial,
            _ => MutationStrategy::Extend,
        };
        Self { index, strategy }
    }
}

const LIST_BODY: &str = r"\[([-\w.'(), ]+)\]";

static LITERAL_PATTERNS: LazyLock<Vec<(LiteralKind, Regex)>> = LazyLock::new(|| {
    let mut patterns = vec![(LiteralKind::Bare, compile(LIST_BODY))];
    for kind in ConstructorKind::ALL {
        let pattern = format!(r"{}\({LIST_BODY}\)", regex::escape(kind.prefix()));
        patterns.push((LiteralKind::Constructor(kind), compile(&pattern)));
    }
    patterns
});

static SCALAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| compile(r"\b\d+(?:\.\d+)?\b"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("literal patterns are static and valid")
}

/// Every array literal in `code`, grouped by pattern kind (bare lists first,
/// then each constructor form) and in source order within a kind. A
/// constructor literal is therefore also reported as its bare inner list.
#[must_use]
pub fn scan_array_literals(code: &str) -> Vec<ArrayLiteral> {
    let mut literals = Vec::new();
    for (kind, pattern) in LITERAL_PATTERNS.iter() {
        for captures in pattern.captures_iter(code) {
            let (Some(whole), Some(body)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let items = body
                .as_str()
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(Item::parse)
                .collect::<Vec<_>>();
            if items.is_empty() {
                continue;
            }
            literals.push(ArrayLiteral {
                start: whole.start(),
                end: whole.end(),
                raw_text: whole.as_str().to_string(),
                kind: *kind,
                items,
            });
        }
    }
    literals
}

/// Applies the strategy selected by `index` to a copy of `items`.
#[must_use]
pub fn mutate_items(items: &[Item], index: u64) -> Vec<Item> {
    let mut out = items.to_vec();
    if out.is_empty() {
        return out;
    }
    let len = out.len() as u64;
    let position = (index % len) as usize;
    let bump = index as f64 + 1.0;

    match MutationRecord::new(index).strategy {
        MutationStrategy::ShiftOne => {
            if let Some(value) = out[position].finite() {
                out[position] = Item::Number(value + bump);
            }
        }
        MutationStrategy::ScaleAll => {
            let factor = ((index % STRATEGY_COUNT) + 2) as f64;
            for item in &mut out {
                if let Some(value) = item.finite() {
                    *item = Item::Number(value * factor);
                }
            }
        }
        MutationStrategy::OffsetAll => {
            for item in &mut out {
                if let Some(value) = item.finite() {
                    *item = Item::Number(value + bump);
                }
            }
        }
        MutationStrategy::InjectSpecial => {
            if matches!(out[position], Item::Number(_)) {
                let special = SPECIAL_VALUES[((index / len) % 3) as usize];
                out[position] = Item::Number(special);
            }
        }
        MutationStrategy::Extend => {
            let count = MAX_APPENDED_ITEMS.min(index % STRATEGY_COUNT + 1);
            for _ in 0..count {
                let all_numeric = out.iter().all(|item| matches!(item, Item::Number(_)));
                let appended = if all_numeric {
                    Item::Number(index as f64 + APPENDED_NUMBER_OFFSET)
                } else {
                    Item::Token(format!("'item{index}'"))
                };
                out.push(appended);
            }
        }
    }
    out
}

#[must_use]
pub fn render_literal(kind: LiteralKind, items: &[Item]) -> String {
    let list = format!(
        "[{}]",
        items.iter().map(Item::render).collect::<Vec<_>>().join(", ")
    );
    match kind {
        LiteralKind::Bare => list,
        LiteralKind::Constructor(constructor) => format!("{}({list})", constructor.prefix()),
    }
}

/// Rewrites exactly one literal of `code`; everything outside the replaced
/// span is unchanged. Falls back to the first standalone number when no
/// array literal exists and returns `code` unchanged when there is neither.
#[must_use]
pub fn mutate_code(code: &str, index: u64) -> String {
    let literals = scan_array_literals(code);
    if literals.is_empty() {
        return mutate_first_scalar(code, index);
    }

    let target = &literals[(index % literals.len() as u64) as usize];
    let replacement = render_literal(target.kind, &mutate_items(&target.items, index));
    splice(code, target.start, target.end, &replacement)
}

fn mutate_first_scalar(code: &str, index: u64) -> String {
    for found in SCALAR_PATTERN.find_iter(code) {
        let Some(value) = parse_python_float(found.as_str()).filter(|value| value.is_finite())
        else {
            continue;
        };
        let replacement = float_repr(value + index as f64 + 1.0);
        return splice(code, found.start(), found.end(), &replacement);
    }
    code.to_string()
}

fn splice(code: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(code.len() + replacement.len());
    out.push_str(&code[..start]);
    out.push_str(replacement);
    out.push_str(&code[end..]);
    out
}

/// Mutates every implementation of `pair` with the same index. Keys outside
/// the implementation tags are not carried over.
#[must_use]
pub fn mutate_code_pair(pair: &CodePair, index: u64) -> CodePair {
    let mut mutated = CodePair::new();
    for tag in ImplTag::ALL {
        if let Some(code) = pair.get(tag) {
            mutated.insert(tag, mutate_code(code, index));
        }
    }
    mutated
}

/// Originals followed by `mutation_count` passes over the batch; pass `i`
/// mutates item `j` with index `i * len + j`.
#[must_use]
pub fn expand_pairs(pairs: &[CodePair], mutation_count: usize) -> Vec<CodePair> {
    let batch = pairs.len();
    let mut out = Vec::with_capacity(batch * (mutation_count + 1));
    out.extend_from_slice(pairs);
    for pass in 0..mutation_count {
        for (offset, pair) in pairs.iter().enumerate() {
            let index = (pass * batch + offset) as u64;
            out.push(mutate_code_pair(pair, index));
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutatorConfig {
    pub mutation_count: usize,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            mutation_count: DEFAULT_MUTATION_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationFileSummary {
    pub framework: String,
    pub api: String,
    pub original_pairs: usize,
    pub mutated_pairs: usize,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    pub files: Vec<MutationFileSummary>,
    pub skipped_files: Vec<PathBuf>,
}

impl MutationReport {
    #[must_use]
    pub fn total_pairs_written(&self) -> usize {
        self.files
            .iter()
            .map(|file| file.original_pairs + file.mutated_pairs)
            .sum()
    }
}

/// Mutates every `<framework>/<api>_pairs.json` under `input_dir` into
/// `<output_dir>/<framework>/<api>_mutated.json`. Only a missing input root
/// is fatal; unreadable or empty files are logged and skipped.
pub fn mutate_corpus(
    input_dir: &Path,
    output_dir: &Path,
    config: MutatorConfig,
) -> Result<MutationReport, CorpusError> {
    let mut report = MutationReport::default();
    for framework_dir in framework_dirs(input_dir)? {
        let framework = dir_label(&framework_dir);
        log::info!("processing {framework} library");
        let files = match files_with_suffix(&framework_dir, PAIRS_SUFFIX) {
            Ok(files) => files,
            Err(error) => {
                log::error!("{error}");
                report.skipped_files.push(framework_dir);
                continue;
            }
        };
        for input_file in files {
            match mutate_file(&input_file, &framework, output_dir, config) {
                Ok(Some(summary)) => report.files.push(summary),
                Ok(None) => report.skipped_files.push(input_file),
                Err(error) => {
                    log::error!("{error}");
                    report.skipped_files.push(input_file);
                }
            }
        }
    }
    Ok(report)
}

fn mutate_file(
    input_file: &Path,
    framework: &str,
    output_dir: &Path,
    config: MutatorConfig,
) -> Result<Option<MutationFileSummary>, CorpusError> {
    let pairs: Vec<CodePair> = load_json(input_file)?;
    if pairs.is_empty() {
        log::warn!(
            "no code pairs found in {}, skipping",
            input_file.display()
        );
        return Ok(None);
    }

    let api = stem_without_suffix(input_file, PAIRS_SUFFIX);
    let expanded = expand_pairs(&pairs, config.mutation_count);
    let output_path = output_dir
        .join(framework)
        .join(format!("{api}{MUTATED_SUFFIX}"));
    write_json(&output_path, &expanded)?;

    let summary = MutationFileSummary {
        framework: framework.to_string(),
        api,
        original_pairs: pairs.len(),
        mutated_pairs: expanded.len() - pairs.len(),
        output_path,
    };
    log::info!(
        "created {} code pairs for {} (original: {}, mutated: {})",
        expanded.len(),
        summary.api,
        summary.original_pairs,
        summary.mutated_pairs
    );
    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use xeq_core::{CodePair, ImplTag, load_json, write_json};

    use super::{
        ConstructorKind, Item, LiteralKind, MutationRecord, MutationStrategy, MutatorConfig,
        expand_pairs, mutate_code, mutate_code_pair, mutate_corpus, mutate_items,
        scan_array_literals,
    };

    fn numbers(values: &[f64]) -> Vec<Item> {
        values.iter().copied().map(Item::Number).collect()
    }

    #[test]
    fn shift_strategy_touches_only_the_selected_element() {
        assert_eq!(mutate_code("x = [1, 2, 3]", 0), "x = [2, 2, 3]");
    }

    #[test]
    fn shift_strategy_skips_nan() {
        assert_eq!(
            mutate_code("x = [float('nan'), 2, 3]", 0),
            "x = [float('nan'), 2, 3]"
        );
    }

    #[test]
    fn strategy_is_index_mod_five() {
        assert_eq!(MutationRecord::new(0).strategy, MutationStrategy::ShiftOne);
        assert_eq!(MutationRecord::new(6).strategy, MutationStrategy::ScaleAll);
        assert_eq!(MutationRecord::new(12).strategy, MutationStrategy::OffsetAll);
        assert_eq!(MutationRecord::new(8).strategy, MutationStrategy::InjectSpecial);
        assert_eq!(MutationRecord::new(4).strategy, MutationStrategy::Extend);
    }

    #[test]
    fn scale_strategy_multiplies_finite_numbers_only() {
        let items = vec![
            Item::Number(1.5),
            Item::Number(f64::INFINITY),
            Item::Token("x".to_string()),
        ];
        let out = mutate_items(&items, 1);
        assert_eq!(out[0], Item::Number(4.5));
        assert_eq!(out[1], Item::Number(f64::INFINITY));
        assert_eq!(out[2], Item::Token("x".to_string()));
    }

    #[test]
    fn offset_strategy_adds_index_plus_one() {
        assert_eq!(mutate_code("a = [1, -2.5]", 2), "a = [4, 0.5]");
    }

    #[test]
    fn special_strategy_cycles_nan_inf_neg_inf() {
        // index 3, len 2: position 1, special (3 / 2) % 3 = 1 -> +inf
        assert_eq!(mutate_code("v = [1, 2]", 3), "v = [1, float('inf')]");
        // index 8, len 2: position 0, special (8 / 2) % 3 = 1 -> +inf
        assert_eq!(mutate_code("v = [1, 2]", 8), "v = [float('inf'), 2]");
        // index 18, len 1: position 0, special 18 % 3 = 0 -> nan
        assert_eq!(mutate_code("v = [7]", 18), "v = [float('nan')]");
    }

    #[test]
    fn special_strategy_leaves_tokens_alone() {
        let items = vec![Item::Token("x".to_string())];
        assert_eq!(mutate_items(&items, 3), items);
    }

    #[test]
    fn extend_strategy_appends_numbers_or_tokens() {
        assert_eq!(mutate_code("v = [1, 2]", 4), "v = [1, 2, 14, 14, 14]");
        assert_eq!(mutate_code("v = [a, 2]", 9), "v = [a, 2, 'item9', 'item9', 'item9']");
    }

    #[test]
    fn constructor_literals_are_rewrapped() {
        let code = "x = torch.tensor([1.5, 2.0])";
        let literals = scan_array_literals(code);
        assert_eq!(literals.len(), 2);
        assert_eq!(literals[0].kind, LiteralKind::Bare);
        assert_eq!(
            literals[1].kind,
            LiteralKind::Constructor(ConstructorKind::TorchTensor)
        );
        assert_eq!(literals[1].start, 4);
        // index 1 selects the constructor form and scales by 3
        assert_eq!(mutate_code(code, 1), "x = torch.tensor([4.5, 6])");
        // index 0 selects the bare inner list
        assert_eq!(mutate_code(code, 0), "x = torch.tensor([2.5, 2])");
    }

    #[test]
    fn every_constructor_form_is_rewrapped_with_its_own_prefix() {
        for (code, kind, expected) in [
            (
                "a = np.array([1.5, 2.0])",
                ConstructorKind::NumpyArray,
                "a = np.array([4.5, 6])",
            ),
            (
                "a = tf.constant([1.5, 2.0])",
                ConstructorKind::TfConstant,
                "a = tf.constant([4.5, 6])",
            ),
            (
                "a = mx.array([1.5, 2.0])",
                ConstructorKind::MlxArray,
                "a = mx.array([4.5, 6])",
            ),
        ] {
            let literals = scan_array_literals(code);
            assert_eq!(literals.len(), 2, "{code}");
            assert_eq!(literals[1].kind, LiteralKind::Constructor(kind));
            assert_eq!(mutate_code(code, 1), expected);
        }
    }

    #[test]
    fn nested_lists_expose_inner_rows() {
        let literals = scan_array_literals("m = np.array([[1, 2], [3, 4]])");
        assert_eq!(literals.len(), 2);
        assert!(literals.iter().all(|literal| literal.kind == LiteralKind::Bare));
        assert_eq!(literals[1].raw_text, "[3, 4]");
    }

    #[test]
    fn literal_items_parse_special_spellings_and_tokens() {
        let literals = scan_array_literals("x = [float('inf'), float('-inf'), 1e3, 'a', True]");
        assert_eq!(literals.len(), 1);
        let items = &literals[0].items;
        assert_eq!(items[0], Item::Number(f64::INFINITY));
        assert_eq!(items[1], Item::Number(f64::NEG_INFINITY));
        assert_eq!(items[2], Item::Number(1000.0));
        assert_eq!(items[3], Item::Token("'a'".to_string()));
        assert_eq!(items[4], Item::Token("True".to_string()));
    }

    #[test]
    fn empty_brackets_are_not_literals() {
        assert!(scan_array_literals("x = [ , ]").is_empty());
        assert!(scan_array_literals("x = []").is_empty());
    }

    #[test]
    fn scalar_fallback_rewrites_first_number_once() {
        assert_eq!(mutate_code("result = 2 + 2", 0), "result = 3.0 + 2");
        assert_eq!(mutate_code("y = x1 * 0.5", 3), "y = x1 * 4.5");
    }

    #[test]
    fn scalar_fallback_skips_numbers_that_overflow_to_infinity() {
        let huge = "9".repeat(400);
        assert_eq!(
            mutate_code(&format!("x = {huge} + 2"), 0),
            format!("x = {huge} + 3.0")
        );
        assert_eq!(mutate_code(&format!("x = {huge}"), 0), format!("x = {huge}"));
    }

    #[test]
    fn largest_indices_do_not_overflow() {
        assert_eq!(
            mutate_code("x = [1, 2]", u64::MAX - 1),
            "x = [1, 2, 18446744073709551616, 18446744073709551616, 18446744073709551616]"
        );
        assert_eq!(mutate_code("x = 1", u64::MAX), "x = 1.8446744073709552e+19");
    }

    #[test]
    fn code_without_numbers_is_unchanged() {
        assert_eq!(mutate_code("result = a + b", 7), "result = a + b");
    }

    #[test]
    fn pair_mutation_uses_same_index_and_drops_missing_tags() {
        let pair = CodePair::new()
            .with(ImplTag::Original, "r = [1, 2]")
            .with(ImplTag::Pytorch, "r = torch.tensor([1, 2])");
        let mutated = mutate_code_pair(&pair, 0);
        assert_eq!(mutated.get(ImplTag::Original), Some("r = [2, 2]"));
        assert_eq!(mutated.get(ImplTag::Pytorch), Some("r = torch.tensor([2, 2])"));
        assert_eq!(mutated.get(ImplTag::Tensorflow), None);
    }

    #[test]
    fn expand_assigns_pass_major_indices() {
        let pairs = vec![
            CodePair::new().with(ImplTag::Original, "x = [0]"),
            CodePair::new().with(ImplTag::Original, "x = [0, 0]"),
        ];
        let expanded = expand_pairs(&pairs, 3);
        assert_eq!(expanded.len(), 2 + 3 * 2);
        assert_eq!(&expanded[..2], pairs.as_slice());
        for pass in 0..3 {
            for (offset, pair) in pairs.iter().enumerate() {
                let index = (pass * 2 + offset) as u64;
                assert_eq!(expanded[2 + pass * 2 + offset], mutate_code_pair(pair, index));
            }
        }
    }

    #[test]
    fn corpus_driver_writes_mutated_files_and_skips_bad_input() {
        let input = tempfile::tempdir().expect("tempdir");
        let output = tempfile::tempdir().expect("tempdir");
        let pairs = vec![
            CodePair::new()
                .with(ImplTag::Original, "result = [1, 2]")
                .with(ImplTag::Pytorch, "result = torch.tensor([1, 2])"),
        ];
        write_json(&input.path().join("mlx").join("abs_pairs.json"), &pairs).expect("write");
        write_json(
            &input.path().join("mlx").join("empty_pairs.json"),
            &Vec::<CodePair>::new(),
        )
        .expect("write");
        std::fs::write(input.path().join("mlx").join("broken_pairs.json"), "{").expect("write");
        std::fs::write(input.path().join("mlx").join("notes.txt"), "ignored").expect("write");

        let report = mutate_corpus(
            input.path(),
            output.path(),
            MutatorConfig { mutation_count: 4 },
        )
        .expect("root exists");

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.skipped_files.len(), 2);
        assert_eq!(report.total_pairs_written(), 5);
        let written: Vec<CodePair> =
            load_json(&output.path().join("mlx").join("abs_mutated.json")).expect("written");
        assert_eq!(written, expand_pairs(&pairs, 4));
    }

    #[test]
    fn corpus_driver_fails_on_missing_root() {
        let output = tempfile::tempdir().expect("tempdir");
        let missing = output.path().join("absent");
        assert!(mutate_corpus(&missing, output.path(), MutatorConfig::default()).is_err());
    }

    proptest! {
        #[test]
        fn prop_mutation_is_deterministic(
            values in prop::collection::vec(-1_000i64..1_000, 1..6),
            index in 0u64..500,
        ) {
            let body = values.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
            let code = format!("import numpy as np\nx = np.array([{body}])\nresult = x * 2");
            prop_assert_eq!(mutate_code(&code, index), mutate_code(&code, index));
        }

        #[test]
        fn prop_mutation_preserves_text_outside_selected_literal(
            values in prop::collection::vec(-50.0f64..50.0, 1..6),
            index in 0u64..500,
        ) {
            let body = values.iter().map(|v| format!("{v:.3}")).collect::<Vec<_>>().join(", ");
            let code = format!("a = 1\nx = [{body}]\nb = 'tail'");
            let literals = scan_array_literals(&code);
            let target = &literals[(index % literals.len() as u64) as usize];
            let mutated = mutate_code(&code, index);
            prop_assert!(mutated.starts_with(&code[..target.start]));
            prop_assert!(mutated.ends_with(&code[target.end..]));
        }

        #[test]
        fn prop_extend_grows_and_others_keep_length(
            values in prop::collection::vec(-100.0f64..100.0, 1..8),
            index in 0u64..1_000,
        ) {
            let items = numbers(&values);
            let out = mutate_items(&items, index);
            if index % 5 == 4 {
                prop_assert_eq!(out.len(), items.len() + 3);
            } else {
                prop_assert_eq!(out.len(), items.len());
            }
        }
    }
}
