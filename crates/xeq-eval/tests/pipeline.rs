use std::fs;

use serde_json::{Value as JsonValue, json};
use xeq_core::{CorpusError, load_json, write_json};
use xeq_eval::{EquivalenceClassifier, Threshold, evaluate_corpus};
use xeq_exec::{ModuleSet, ScriptExecutor};
use xeq_mutate::{MutatorConfig, mutate_corpus};

fn classifier() -> EquivalenceClassifier<ScriptExecutor> {
    EquivalenceClassifier::new(
        ScriptExecutor::new(ModuleSet::all()),
        Threshold::default(),
    )
}

#[test]
fn mutate_then_evaluate_writes_equivalent_and_debug_files() {
    let root = tempfile::tempdir().expect("tempdir");
    let pairs_dir = root.path().join("pairs");
    let mutated_dir = root.path().join("mutated");
    let equivalent_dir = root.path().join("equivalent");

    write_json(
        &pairs_dir.join("torch").join("sum_pairs.json"),
        &json!([
            {
                "original": "x = [1.0, 2.0]\nresult = sum(x)",
                "pytorch": "values = [1.0, 2.0]\nresult = sum(values)",
                "tensorflow": ""
            },
            {
                "original": "result = 1.0",
                "pytorch": "result = 2.0"
            }
        ]),
    )
    .expect("write pairs");

    let mutation = mutate_corpus(&pairs_dir, &mutated_dir, MutatorConfig { mutation_count: 2 })
        .expect("mutation runs");
    assert_eq!(mutation.total_pairs_written(), 6);

    let report = evaluate_corpus(&mutated_dir, &equivalent_dir, &classifier())
        .expect("evaluation runs");
    assert_eq!(report.files.len(), 1);
    assert!(report.skipped_files.is_empty());
    assert_eq!(report.stats.total_pairs, 6);
    assert_eq!(report.stats.equivalent_pairs, 3);
    assert_eq!(report.stats.non_equivalent_pairs, 3);
    assert_eq!(report.stats.retention_rate(), 0.5);

    let equivalent: Vec<JsonValue> =
        load_json(&equivalent_dir.join("torch").join("sum_equivalent.json"))
            .expect("equivalent file");
    assert_eq!(equivalent.len(), 3);
    assert!(equivalent.iter().all(|pair| pair.get("tensorflow").is_some()));

    let debug: Vec<JsonValue> = load_json(&equivalent_dir.join("torch").join("sum_debug.json"))
        .expect("debug file");
    let indices: Vec<u64> = debug
        .iter()
        .filter_map(|record| record["pair_index"].as_u64())
        .collect();
    assert_eq!(indices, [0, 1, 2, 3, 4, 5]);
    assert_eq!(debug[1]["is_equivalent"], json!(false));
    assert_eq!(debug[1]["debug_info"]["distances"]["original-pytorch"], json!(1.0));
    assert_eq!(debug[1]["debug_info"]["results"]["pytorch"], json!("2.0"));
}

#[test]
fn non_equivalent_file_only_gets_debug_output() {
    let root = tempfile::tempdir().expect("tempdir");
    let input = root.path().join("in");
    let output = root.path().join("out");
    write_json(
        &input.join("tf").join("add_mutated.json"),
        &json!([{"original": "result = 1.0", "pytorch": "result = 2.0"}]),
    )
    .expect("write input");

    let report = evaluate_corpus(&input, &output, &classifier()).expect("evaluation runs");
    assert_eq!(report.stats.equivalent_pairs, 0);
    assert_eq!(report.files[0].equivalent_path, None);
    assert!(!output.join("tf").join("add_equivalent.json").exists());
    assert!(output.join("tf").join("add_debug.json").exists());
}

#[test]
fn unreadable_and_empty_files_are_skipped() {
    let root = tempfile::tempdir().expect("tempdir");
    let input = root.path().join("in");
    let framework = input.join("mlx");
    fs::create_dir_all(&framework).expect("mkdir");
    fs::write(framework.join("broken_mutated.json"), "{not json").expect("write broken");
    fs::write(framework.join("empty_mutated.json"), "[]").expect("write empty");
    fs::write(framework.join("notes.txt"), "ignored").expect("write notes");

    let report =
        evaluate_corpus(&input, &root.path().join("out"), &classifier()).expect("evaluation runs");
    assert!(report.files.is_empty());
    assert_eq!(report.skipped_files.len(), 2);
    assert_eq!(report.stats.total_pairs, 0);
}

#[test]
fn missing_input_directory_is_fatal() {
    let root = tempfile::tempdir().expect("tempdir");
    let error = evaluate_corpus(
        &root.path().join("absent"),
        &root.path().join("out"),
        &classifier(),
    )
    .expect_err("missing input should fail");
    assert!(matches!(error, CorpusError::MissingInput(_)));
}
