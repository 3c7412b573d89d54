#![forbid(unsafe_code)]

//! Response-side parsers for the two model-facing interfaces (code-pair
//! generation and bug-prone value analysis), plus fine-tuning dataset
//! construction from the resulting pair files.

pub mod datasets;
pub mod generation;
pub mod values;

pub use datasets::{
    COMBINED_DATASET_FILE, CONVERSION_DATASET_FILE, ConversionRecord, DEFAULT_DATASET_SUFFIX,
    DatasetFileSummary, DatasetRecord, DatasetReport, GENERATION_DATASET_FILE, GenerationRecord,
    build_datasets, framework_display_name, records_for_pair,
};
pub use generation::{
    DEFAULT_MAX_EXAMPLES, GenerationFileSummary, GenerationReport, parse_generation_response,
    split_generation_corpus,
};
pub use values::{
    COMBINED_VALUES_FILE, ValuesReport, extract_bug_prone_values, extract_values_corpus,
    value_to_json,
};
