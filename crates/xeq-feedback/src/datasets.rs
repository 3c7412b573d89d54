//! Building fine-tuning datasets from mutated code-pair files.
//!
//! Every complete pair yields up to two conversion records (PyTorch and
//! TensorFlow code as the seed, the original implementation as the solution)
//! and one generation record for the API the file is named after.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value as JsonValue;
use xeq_core::{
    CodePair, CorpusError, ImplTag, MUTATED_SUFFIX, dir_label, files_with_suffix, framework_dirs,
    load_json, stem_without_suffix, write_json,
};

pub const CONVERSION_DATASET_FILE: &str = "conversion_dataset.json";
pub const GENERATION_DATASET_FILE: &str = "generation_dataset.json";
pub const COMBINED_DATASET_FILE: &str = "combined_dataset.json";
/// Pair files read by default: the mutation stage's output.
pub const DEFAULT_DATASET_SUFFIX: &str = MUTATED_SUFFIX;

const FRAMEWORK_NAMES: [(&str, &str); 3] = [
    ("mindspore", "MindSpore"),
    ("oneflow", "OneFlow"),
    ("mlx", "MLX"),
];

/// Display name of a framework directory: the known spellings, otherwise
/// the directory name with its first letter upper-cased and the rest
/// lower-cased.
#[must_use]
pub fn framework_display_name(dir: &str) -> String {
    if let Some((_, name)) = FRAMEWORK_NAMES.iter().find(|(key, _)| *key == dir) {
        return (*name).to_string();
    }
    let mut chars = dir.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// API name encoded in a pair file name: the suffix stripped and every `_`
/// turned back into `.`.
#[must_use]
pub fn api_from_file_name(path: &Path, suffix: &str) -> String {
    stem_without_suffix(path, suffix).replace('_', ".")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionRecord {
    pub seed: String,
    pub problem: String,
    pub solution: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRecord {
    #[serde(rename = "INSTRUCTION")]
    pub instruction: String,
    #[serde(rename = "RESPONSE")]
    pub response: String,
}

/// Entry of the combined dataset, serialized without a discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DatasetRecord {
    Conversion(ConversionRecord),
    Generation(GenerationRecord),
}

/// Records derived from one pair. Pairs missing any of the three
/// implementations yield nothing; blank seeds or a blank original drop the
/// records that would use them.
#[must_use]
pub fn records_for_pair(
    pair: &CodePair,
    api: &str,
    framework_name: &str,
) -> (Vec<ConversionRecord>, Option<GenerationRecord>) {
    let (Some(original), Some(pytorch), Some(tensorflow)) = (
        pair.get(ImplTag::Original),
        pair.get(ImplTag::Pytorch),
        pair.get(ImplTag::Tensorflow),
    ) else {
        return (Vec::new(), None);
    };
    if original.trim().is_empty() {
        return (Vec::new(), None);
    }

    let conversions = [pytorch, tensorflow]
        .into_iter()
        .filter(|seed| !seed.trim().is_empty())
        .map(|seed| ConversionRecord {
            seed: seed.to_string(),
            problem: format!("Convert this code to code that uses the {framework_name} framework"),
            solution: original.to_string(),
        })
        .collect();
    let generation = GenerationRecord {
        instruction: format!("Generate code that calls the '{api}' API"),
        response: original.to_string(),
    };
    (conversions, Some(generation))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetFileSummary {
    pub framework: String,
    pub api: String,
    pub conversion_records: usize,
    pub generation_records: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetReport {
    pub files: Vec<DatasetFileSummary>,
    pub skipped_files: Vec<PathBuf>,
    pub conversion_records: usize,
    pub generation_records: usize,
}

impl DatasetReport {
    #[must_use]
    pub fn combined_records(&self) -> usize {
        self.conversion_records + self.generation_records
    }
}

/// Reads every `<framework>/<api><suffix>` file under `input_dir` and writes
/// the conversion, generation and combined datasets into `output_dir`.
pub fn build_datasets(
    input_dir: &Path,
    output_dir: &Path,
    suffix: &str,
) -> Result<DatasetReport, CorpusError> {
    let mut report = DatasetReport::default();
    let mut conversion = Vec::new();
    let mut generation = Vec::new();

    for framework_dir in framework_dirs(input_dir)? {
        let framework = dir_label(&framework_dir);
        let framework_name = framework_display_name(&framework);
        log::info!("processing {framework} library");
        let files = match files_with_suffix(&framework_dir, suffix) {
            Ok(files) => files,
            Err(error) => {
                log::error!("{error}");
                report.skipped_files.push(framework_dir);
                continue;
            }
        };
        for input_file in files {
            let api = api_from_file_name(&input_file, suffix);
            let entries = match load_json::<Vec<JsonValue>>(&input_file) {
                Ok(entries) => entries,
                Err(error) => {
                    log::error!("{error}");
                    report.skipped_files.push(input_file);
                    continue;
                }
            };

            let before = (conversion.len(), generation.len());
            for entry in entries {
                let JsonValue::Object(map) = entry else {
                    continue;
                };
                let (pair_conversions, pair_generation) =
                    records_for_pair(&CodePair::from(map), &api, &framework_name);
                conversion.extend(pair_conversions);
                generation.extend(pair_generation);
            }
            let summary = DatasetFileSummary {
                framework: framework.clone(),
                api,
                conversion_records: conversion.len() - before.0,
                generation_records: generation.len() - before.1,
            };
            log::info!(
                "processed {}: {} conversion examples, {} generation examples",
                input_file.display(),
                summary.conversion_records,
                summary.generation_records
            );
            report.files.push(summary);
        }
    }

    write_json(&output_dir.join(CONVERSION_DATASET_FILE), &conversion)?;
    write_json(&output_dir.join(GENERATION_DATASET_FILE), &generation)?;
    report.conversion_records = conversion.len();
    report.generation_records = generation.len();
    let combined: Vec<DatasetRecord> = conversion
        .into_iter()
        .map(DatasetRecord::Conversion)
        .chain(generation.into_iter().map(DatasetRecord::Generation))
        .collect();
    write_json(&output_dir.join(COMBINED_DATASET_FILE), &combined)?;
    log::info!(
        "datasets saved to {}: {} conversion, {} generation, {} combined",
        output_dir.display(),
        report.conversion_records,
        report.generation_records,
        report.combined_records()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde_json::json;
    use xeq_core::{CodePair, ImplTag, MUTATED_SUFFIX};

    use super::{
        DatasetRecord, GenerationRecord, api_from_file_name, framework_display_name,
        records_for_pair,
    };

    fn full_pair() -> CodePair {
        CodePair::new()
            .with(ImplTag::Original, "import mindspore\nresult = 1")
            .with(ImplTag::Pytorch, "import torch\nresult = 1")
            .with(ImplTag::Tensorflow, "import tensorflow as tf\nresult = 1")
    }

    #[test]
    fn known_frameworks_keep_their_spelling() {
        assert_eq!(framework_display_name("mindspore"), "MindSpore");
        assert_eq!(framework_display_name("oneflow"), "OneFlow");
        assert_eq!(framework_display_name("mlx"), "MLX");
        assert_eq!(framework_display_name("jAX"), "Jax");
        assert_eq!(framework_display_name(""), "");
    }

    #[test]
    fn api_name_restores_dots() {
        let path = Path::new("mindspore/mindspore_ops_abs_mutated.json");
        assert_eq!(api_from_file_name(path, MUTATED_SUFFIX), "mindspore.ops.abs");
    }

    #[test]
    fn complete_pair_yields_two_conversions_and_one_generation() {
        let (conversions, generation) =
            records_for_pair(&full_pair(), "mindspore.ops.abs", "MindSpore");
        assert_eq!(conversions.len(), 2);
        assert_eq!(conversions[0].seed, "import torch\nresult = 1");
        assert_eq!(conversions[1].seed, "import tensorflow as tf\nresult = 1");
        assert_eq!(
            conversions[0].problem,
            "Convert this code to code that uses the MindSpore framework"
        );
        assert_eq!(conversions[1].solution, "import mindspore\nresult = 1");
        assert_eq!(
            generation,
            Some(GenerationRecord {
                instruction: "Generate code that calls the 'mindspore.ops.abs' API".to_string(),
                response: "import mindspore\nresult = 1".to_string(),
            })
        );
    }

    #[test]
    fn blank_seed_drops_only_its_conversion() {
        let mut pair = full_pair();
        pair.insert(ImplTag::Tensorflow, "  \n");
        let (conversions, generation) = records_for_pair(&pair, "api", "MLX");
        assert_eq!(conversions.len(), 1);
        assert!(generation.is_some());
    }

    #[test]
    fn incomplete_or_blank_original_pair_yields_nothing() {
        let partial = CodePair::new()
            .with(ImplTag::Original, "x = 1")
            .with(ImplTag::Pytorch, "y = 1");
        assert_eq!(records_for_pair(&partial, "api", "MLX"), (Vec::new(), None));

        let mut blank = full_pair();
        blank.insert(ImplTag::Original, "   ");
        assert_eq!(records_for_pair(&blank, "api", "MLX"), (Vec::new(), None));
    }

    #[test]
    fn combined_records_have_no_discriminator() {
        let record = DatasetRecord::Generation(GenerationRecord {
            instruction: "i".to_string(),
            response: "r".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&record).expect("serialize"),
            json!({"INSTRUCTION": "i", "RESPONSE": "r"})
        );
    }
}
