//! Pulling the bracketed list of bug-prone values out of an analysis
//! response.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use xeq_core::{
    CorpusError, VALUES_SUFFIX, Value, files_with_suffix, read_text, stem_without_suffix,
    write_json,
};
use xeq_script::{Interpreter, ModuleSet};

pub const COMBINED_VALUES_FILE: &str = "all_bug_prone_values.json";
pub const ANALYSIS_SUFFIX: &str = ".txt";

/// Tried in order; the first one whose capture is non-blank wins.
static VALUE_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        compile(r"(?is)\[(.*?)\]"),
        compile(r"(?is)bug-prone values:\s*\[(.*?)\]"),
        compile(r"(?is)values:\s*\[(.*?)\]"),
    ]
});

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("value patterns are static and valid")
}

/// The bug-prone values named in `response`, or an empty list when none of
/// the patterns match.
#[must_use]
pub fn extract_bug_prone_values(response: &str) -> Vec<JsonValue> {
    for pattern in VALUE_PATTERNS.iter() {
        let Some(captures) = pattern.captures(response) else {
            continue;
        };
        let body = captures.get(1).map_or("", |group| group.as_str()).trim();
        if body.is_empty() {
            continue;
        }
        return evaluate_list(body).unwrap_or_else(|| split_list(body));
    }
    log::warn!("could not extract bug-prone values from analysis response");
    Vec::new()
}

fn evaluate_list(body: &str) -> Option<Vec<JsonValue>> {
    let interpreter = Interpreter::new(ModuleSet::builtins_only());
    match interpreter.eval_expression(&format!("[{body}]")) {
        Ok(Value::List(items)) => Some(items.iter().map(value_to_json).collect()),
        Ok(other) => Some(vec![value_to_json(&other)]),
        Err(error) => {
            log::debug!("value list is not a literal expression ({error}), splitting instead");
            None
        }
    }
}

fn split_list(body: &str) -> Vec<JsonValue> {
    body.split(',')
        .map(|item| item.trim().trim_matches(|ch| ch == '\'' || ch == '"'))
        .filter(|item| !item.is_empty())
        .map(|item| JsonValue::String(item.to_string()))
        .collect()
}

/// JSON form of an evaluated value; non-finite floats become the strings
/// `nan`, `inf` and `-inf`, and anything without a JSON counterpart becomes
/// its Python `str()`.
#[must_use]
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::None => JsonValue::Null,
        Value::Bool(flag) => JsonValue::Bool(*flag),
        Value::Int(number) => JsonValue::from(*number),
        Value::Real(number) if number.is_nan() => JsonValue::String("nan".to_string()),
        Value::Real(number) if number.is_infinite() => {
            JsonValue::String(if *number > 0.0 { "inf" } else { "-inf" }.to_string())
        }
        Value::Real(number) => JsonValue::from(*number),
        Value::Str(text) => JsonValue::String(text.clone()),
        Value::List(items) | Value::Tuple(items) => {
            JsonValue::Array(items.iter().map(value_to_json).collect())
        }
        other => JsonValue::String(other.python_str()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValuesReport {
    /// Response file name to the values extracted from it.
    pub values: BTreeMap<String, Vec<JsonValue>>,
    pub skipped_files: Vec<PathBuf>,
    pub combined_path: Option<PathBuf>,
}

impl ValuesReport {
    #[must_use]
    pub fn total_values(&self) -> usize {
        self.values.values().map(Vec::len).sum()
    }
}

/// Extracts values from every `*.txt` analysis response directly under
/// `input_dir`, writing `<stem>_values.json` per response and
/// `all_bug_prone_values.json` into `output_dir`.
pub fn extract_values_corpus(
    input_dir: &Path,
    output_dir: &Path,
) -> Result<ValuesReport, CorpusError> {
    if !input_dir.is_dir() {
        return Err(CorpusError::MissingInput(input_dir.to_path_buf()));
    }
    let files = files_with_suffix(input_dir, ANALYSIS_SUFFIX)?;
    log::info!("found {} analysis responses to process", files.len());

    let mut report = ValuesReport::default();
    for input_file in files {
        let name = input_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!("processing {name}");
        let response = match read_text(&input_file) {
            Ok(response) => response,
            Err(error) => {
                log::error!("{error}");
                report.skipped_files.push(input_file);
                continue;
            }
        };

        let values = extract_bug_prone_values(&response);
        let stem = stem_without_suffix(&input_file, ANALYSIS_SUFFIX);
        let output_path = output_dir.join(format!("{stem}{VALUES_SUFFIX}"));
        if let Err(error) = write_json(&output_path, &values) {
            log::error!("{error}");
            report.skipped_files.push(input_file);
            continue;
        }
        report.values.insert(name, values);
    }

    let combined_path = output_dir.join(COMBINED_VALUES_FILE);
    write_json(&combined_path, &report.values)?;
    log::info!("combined results saved to {}", combined_path.display());
    report.combined_path = Some(combined_path);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::extract_bug_prone_values;

    #[test]
    fn literal_list_is_evaluated() {
        let values = extract_bug_prone_values(
            "Analysis:\nBug-prone values: [0, -1, 1e308, float('nan'), float('-inf'), 'abc', (1, 2), None, True]",
        );
        assert_eq!(
            values,
            vec![
                json!(0),
                json!(-1),
                json!(1e308),
                json!("nan"),
                json!("-inf"),
                json!("abc"),
                json!([1, 2]),
                json!(null),
                json!(true),
            ]
        );
    }

    #[test]
    fn first_bracket_wins_over_labelled_list() {
        let values = extract_bug_prone_values("see [1, 2]\nbug-prone values: [3]");
        assert_eq!(values, vec![json!(1), json!(2)]);
    }

    #[test]
    fn blank_first_capture_falls_through_to_later_patterns() {
        let values = extract_bug_prone_values("[ ]\nvalues: [7]");
        // The first bracket pair is blank, so the labelled pattern decides.
        assert_eq!(values, vec![json!(7)]);
    }

    #[test]
    fn non_literal_items_are_split_and_unquoted() {
        let values = extract_bug_prone_values("[np.inf, 'x', \"y\", , very large]");
        assert_eq!(
            values,
            vec![json!("np.inf"), json!("x"), json!("y"), json!("very large")]
        );
    }

    #[test]
    fn brackets_may_span_lines() {
        let values = extract_bug_prone_values("values: [\n  1,\n  2.5\n]");
        assert_eq!(values, vec![json!(1), json!(2.5)]);
    }

    #[test]
    fn no_brackets_yields_empty_list() {
        assert!(extract_bug_prone_values("nothing to see here").is_empty());
    }

    proptest! {
        #[test]
        fn integer_lists_round_trip(items in proptest::collection::vec(-1000i64..1000, 1..8)) {
            let body = items
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let values = extract_bug_prone_values(&format!("values: [{body}]"));
            let expected: Vec<_> = items.iter().map(|item| json!(item)).collect();
            prop_assert_eq!(values, expected);
        }
    }
}
