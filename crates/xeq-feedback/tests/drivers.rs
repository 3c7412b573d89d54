use std::collections::BTreeMap;
use std::fs;

use serde_json::{Value as JsonValue, json};
use xeq_core::{CodePair, CorpusError, ImplTag, load_json};
use xeq_feedback::{
    COMBINED_DATASET_FILE, COMBINED_VALUES_FILE, CONVERSION_DATASET_FILE, DEFAULT_DATASET_SUFFIX,
    DEFAULT_MAX_EXAMPLES, GENERATION_DATASET_FILE, build_datasets, extract_values_corpus,
    split_generation_corpus,
};

const RESPONSE: &str = "## Example 1
```python
# Original Implementation
import numpy as np
result = np.sum(np.array([1.0, 2.0]))

# PyTorch Implementation
import torch
result = torch.sum(torch.tensor([1.0, 2.0]))

# TensorFlow Implementation
import tensorflow as tf
result = tf.reduce_sum(tf.constant([1.0, 2.0]))
```
";

#[test]
fn generation_responses_become_pair_files() {
    let root = tempfile::tempdir().expect("tempdir");
    let input = root.path().join("responses");
    let output = root.path().join("pairs");
    fs::create_dir_all(input.join("numpy")).expect("mkdir");
    fs::write(input.join("numpy").join("numpy.sum.txt"), RESPONSE).expect("write response");
    fs::write(input.join("numpy").join("broken.txt"), "no examples here").expect("write broken");

    let report =
        split_generation_corpus(&input, &output, DEFAULT_MAX_EXAMPLES).expect("split runs");
    assert_eq!(report.total_pairs(), 1);
    assert_eq!(report.skipped_files.len(), 1);
    assert_eq!(report.files[0].api, "numpy.sum");

    let pairs: Vec<CodePair> =
        load_json(&output.join("numpy").join("numpy_sum_pairs.json")).expect("pairs file");
    assert_eq!(pairs.len(), 1);
    assert_eq!(
        pairs[0].get(ImplTag::Pytorch),
        Some("import torch\nresult = torch.sum(torch.tensor([1.0, 2.0]))")
    );
    assert!(!output.join("numpy").join("broken_pairs.json").exists());
}

#[test]
fn analysis_responses_become_value_files() {
    let root = tempfile::tempdir().expect("tempdir");
    let input = root.path().join("analysis");
    let output = root.path().join("values");
    fs::create_dir_all(&input).expect("mkdir");
    fs::write(
        input.join("conv.txt"),
        "Bug-prone values: [0, float('inf'), -1e-45]",
    )
    .expect("write conv");
    fs::write(input.join("empty.txt"), "The model found nothing.").expect("write empty");
    fs::write(input.join("ignored.md"), "[1]").expect("write ignored");

    let report = extract_values_corpus(&input, &output).expect("extraction runs");
    assert_eq!(report.total_values(), 3);

    let conv: Vec<JsonValue> = load_json(&output.join("conv_values.json")).expect("conv values");
    assert_eq!(conv, vec![json!(0), json!("inf"), json!(-1e-45)]);
    let empty: Vec<JsonValue> =
        load_json(&output.join("empty_values.json")).expect("empty values");
    assert!(empty.is_empty());

    let combined: BTreeMap<String, Vec<JsonValue>> =
        load_json(&output.join(COMBINED_VALUES_FILE)).expect("combined file");
    assert_eq!(combined.keys().collect::<Vec<_>>(), ["conv.txt", "empty.txt"]);
}

#[test]
fn missing_directories_are_fatal() {
    let root = tempfile::tempdir().expect("tempdir");
    let absent = root.path().join("absent");
    assert!(matches!(
        split_generation_corpus(&absent, root.path(), DEFAULT_MAX_EXAMPLES),
        Err(CorpusError::MissingInput(_))
    ));
    assert!(matches!(
        extract_values_corpus(&absent, root.path()),
        Err(CorpusError::MissingInput(_))
    ));
    assert!(matches!(
        build_datasets(&absent, root.path(), DEFAULT_DATASET_SUFFIX),
        Err(CorpusError::MissingInput(_))
    ));
}

#[test]
fn mutated_pairs_become_fine_tuning_datasets() {
    let root = tempfile::tempdir().expect("tempdir");
    let input = root.path().join("mutated");
    let output = root.path().join("datasets");
    fs::create_dir_all(input.join("mindspore")).expect("mkdir");
    fs::create_dir_all(input.join("jax")).expect("mkdir");
    fs::write(
        input.join("mindspore").join("mindspore_ops_abs_mutated.json"),
        json!([
            {"original": "import mindspore\nresult = 1",
             "pytorch": "import torch\nresult = 1",
             "tensorflow": "import tensorflow as tf\nresult = 1"},
            {"original": "import mindspore\nresult = 2", "pytorch": "result = 2"},
            "not a pair",
        ])
        .to_string(),
    )
    .expect("write mindspore pairs");
    fs::write(
        input.join("jax").join("jax_numpy_sum_mutated.json"),
        json!([{
            "original": "import jax\nresult = 3",
            "pytorch": "result = 3",
            "tensorflow": " ",
        }])
        .to_string(),
    )
    .expect("write jax pairs");
    fs::write(input.join("jax").join("broken_mutated.json"), "[").expect("write broken");
    fs::write(input.join("jax").join("jax_sum_pairs.json"), "[]").expect("write unrelated");

    let report = build_datasets(&input, &output, DEFAULT_DATASET_SUFFIX).expect("datasets build");
    assert_eq!(report.conversion_records, 3);
    assert_eq!(report.generation_records, 2);
    assert_eq!(report.combined_records(), 5);
    assert_eq!(report.skipped_files.len(), 1);
    assert_eq!(report.files.len(), 2);
    assert_eq!(report.files[0].api, "jax.numpy.sum");

    let conversion: Vec<JsonValue> =
        load_json(&output.join(CONVERSION_DATASET_FILE)).expect("conversion dataset");
    assert_eq!(
        conversion[0],
        json!({
            "seed": "result = 3",
            "problem": "Convert this code to code that uses the Jax framework",
            "solution": "import jax\nresult = 3",
        })
    );
    assert_eq!(conversion[2]["seed"], "import tensorflow as tf\nresult = 1");

    let generation: Vec<JsonValue> =
        load_json(&output.join(GENERATION_DATASET_FILE)).expect("generation dataset");
    assert_eq!(
        generation[1],
        json!({
            "INSTRUCTION": "Generate code that calls the 'mindspore.ops.abs' API",
            "RESPONSE": "import mindspore\nresult = 1",
        })
    );

    let combined: Vec<JsonValue> =
        load_json(&output.join(COMBINED_DATASET_FILE)).expect("combined dataset");
    assert_eq!(combined.len(), 5);
    assert_eq!(combined[..3], conversion[..]);
    assert_eq!(combined[3..], generation[..]);
}
