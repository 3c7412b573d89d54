use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value as JsonValue;

const PAIRS: &str = r#"[{"original": "x = [1.0, 2.0]\nresult = sum(x)",
                          "pytorch": "y = [1.0, 2.0]\nresult = sum(y)"}]"#;

fn run_xeq(dir: &Path, args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_xeq"));
    command.current_dir(dir).args(args).arg("--log-level").arg("error");
    for key in [
        "XEQ_CONFIG",
        "XEQ_MUTATION_COUNT",
        "XEQ_THRESHOLD",
        "XEQ_EXECUTOR",
        "XEQ_PYTHON",
        "XEQ_EXEC_TIMEOUT_SECS",
    ] {
        command.env_remove(key);
    }
    command.envs(envs.iter().copied());
    command.output().expect("failed to execute xeq binary")
}

fn summary(output: &Output) -> JsonValue {
    assert!(
        output.status.success(),
        "xeq failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("summary is JSON")
}

fn seed_pairs(dir: &Path) {
    let framework = dir.join("pairs").join("numpy");
    fs::create_dir_all(&framework).expect("mkdir");
    fs::write(framework.join("sum_pairs.json"), PAIRS).expect("write pairs");
}

#[test]
fn help_lists_subcommands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = Command::new(env!("CARGO_BIN_EXE_xeq"))
        .current_dir(dir.path())
        .arg("--help")
        .output()
        .expect("failed to execute xeq binary");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in [
        "mutate",
        "evaluate",
        "split-generations",
        "extract-values",
        "build-datasets",
    ] {
        assert!(stdout.contains(name), "missing {name} in help");
    }
}

#[test]
fn flag_beats_env_beats_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_pairs(dir.path());
    fs::write(
        dir.path().join("xeq.json"),
        r#"{"mutate": {"mutation_count": 4}}"#,
    )
    .expect("write config");
    let args = ["mutate", "--input", "pairs", "--output", "mutated"];

    let from_file = summary(&run_xeq(dir.path(), &args, &[]));
    assert_eq!(from_file["mutation_count"], 4);
    assert_eq!(from_file["total_pairs_written"], 5);

    let from_env = summary(&run_xeq(dir.path(), &args, &[("XEQ_MUTATION_COUNT", "2")]));
    assert_eq!(from_env["mutation_count"], 2);

    let mut with_flag = args.to_vec();
    with_flag.extend(["--count", "1"]);
    let from_flag = summary(&run_xeq(
        dir.path(),
        &with_flag,
        &[("XEQ_MUTATION_COUNT", "2")],
    ));
    assert_eq!(from_flag["mutation_count"], 1);
    assert_eq!(from_flag["total_pairs_written"], 2);
}

#[test]
fn mutate_then_evaluate_reports_retention() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_pairs(dir.path());
    summary(&run_xeq(
        dir.path(),
        &["mutate", "--input", "pairs", "--output", "mutated", "--count", "3"],
        &[],
    ));

    let report = summary(&run_xeq(
        dir.path(),
        &[
            "evaluate",
            "--input",
            "mutated",
            "--output",
            "equivalent",
            "--executor",
            "native",
        ],
        &[],
    ));
    assert_eq!(report["executor"], "native");
    assert_eq!(report["total_pairs"], 4);
    assert_eq!(report["equivalent_pairs"], 4);
    assert_eq!(report["retention_rate"], 1.0);
    assert!(
        dir.path()
            .join("equivalent")
            .join("numpy")
            .join("sum_equivalent.json")
            .is_file()
    );
}

#[test]
fn mutated_pairs_build_datasets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let framework = dir.path().join("mutated").join("mlx");
    fs::create_dir_all(&framework).expect("mkdir");
    fs::write(
        framework.join("mlx_core_abs_mutated.json"),
        r#"[{"original": "a = 1", "pytorch": "b = 1", "tensorflow": "c = 1"}]"#,
    )
    .expect("write pairs");

    let report = summary(&run_xeq(
        dir.path(),
        &["build-datasets", "--input", "mutated", "--output", "datasets"],
        &[],
    ));
    assert_eq!(report["conversion_records"], 2);
    assert_eq!(report["generation_records"], 1);
    assert_eq!(report["combined_records"], 3);
    assert_eq!(report["files"][0]["api"], "mlx.core.abs");

    let combined: JsonValue = serde_json::from_str(
        &fs::read_to_string(dir.path().join("datasets").join("combined_dataset.json"))
            .expect("combined dataset"),
    )
    .expect("combined dataset is JSON");
    assert_eq!(
        combined[0]["problem"],
        "Convert this code to code that uses the MLX framework"
    );
    assert_eq!(
        combined[2]["INSTRUCTION"],
        "Generate code that calls the 'mlx.core.abs' API"
    );
}

#[test]
fn invalid_threshold_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_pairs(dir.path());
    let output = run_xeq(
        dir.path(),
        &["evaluate", "--input", "pairs", "--output", "out"],
        &[("XEQ_THRESHOLD", "-0.5")],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("threshold"));
}

#[test]
fn missing_input_directory_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = run_xeq(
        dir.path(),
        &["mutate", "--input", "absent", "--output", "out"],
        &[],
    );
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
