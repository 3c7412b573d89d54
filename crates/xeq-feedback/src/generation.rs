//! Splitting a code-pair generation response into [`CodePair`]s.
//!
//! A response is a sequence of `## Example` sections, each holding one
//! implementation after each of the `# Original Implementation`,
//! `# PyTorch Implementation` and `# TensorFlow Implementation` marker
//! lines. Code fences are dropped.

use std::path::{Path, PathBuf};

use serde::Serialize;
use xeq_core::{
    CodePair, CorpusError, ImplTag, PAIRS_SUFFIX, dir_label, files_with_suffix, framework_dirs,
    read_text, stem_without_suffix, write_json,
};

pub const DEFAULT_MAX_EXAMPLES: usize = 5;
pub const RESPONSE_SUFFIX: &str = ".txt";

const EXAMPLE_HEADER: &str = "## Example";
const CODE_FENCE: &str = "```";
const MARKERS: [(&str, ImplTag); 3] = [
    ("# Original Implementation", ImplTag::Original),
    ("# PyTorch Implementation", ImplTag::Pytorch),
    ("# TensorFlow Implementation", ImplTag::Tensorflow),
];

#[derive(Default)]
struct ResponseParser<'a> {
    pairs: Vec<CodePair>,
    example: CodePair,
    current: Option<ImplTag>,
    lines: Vec<&'a str>,
    in_example: bool,
}

impl<'a> ResponseParser<'a> {
    fn feed(&mut self, line: &'a str) {
        if line.trim().starts_with(EXAMPLE_HEADER) {
            self.close_example();
            self.in_example = true;
            return;
        }
        if !self.in_example {
            return;
        }

        if let Some((_, tag)) = MARKERS.iter().find(|(marker, _)| line.contains(marker)) {
            self.close_implementation();
            self.current = Some(*tag);
        } else if !line.trim().is_empty()
            && self.current.is_some()
            && !(line.starts_with(CODE_FENCE) || line.ends_with(CODE_FENCE))
        {
            self.lines.push(line);
        }
    }

    fn close_implementation(&mut self) {
        if let Some(tag) = self.current {
            if !self.lines.is_empty() {
                self.example.insert(tag, self.lines.join("\n").trim());
            }
        }
        self.lines.clear();
    }

    fn close_example(&mut self) {
        self.close_implementation();
        self.current = None;
        let example = std::mem::take(&mut self.example);
        if ImplTag::ALL.iter().all(|tag| example.get(*tag).is_some()) {
            self.pairs.push(example);
        }
    }

    fn finish(mut self) -> Vec<CodePair> {
        self.close_example();
        self.pairs
    }
}

/// Complete examples (all three implementations present) in response
/// order, at most `max_examples` of them.
#[must_use]
pub fn parse_generation_response(response: &str, max_examples: usize) -> Vec<CodePair> {
    let mut parser = ResponseParser::default();
    for line in response.split('\n') {
        parser.feed(line);
    }
    let mut pairs = parser.finish();
    pairs.truncate(max_examples);
    pairs
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationFileSummary {
    pub framework: String,
    pub api: String,
    pub pairs: usize,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub files: Vec<GenerationFileSummary>,
    pub skipped_files: Vec<PathBuf>,
}

impl GenerationReport {
    #[must_use]
    pub fn total_pairs(&self) -> usize {
        self.files.iter().map(|file| file.pairs).sum()
    }
}

/// Turns every `<framework>/<api>.txt` response under `input_dir` into
/// `<output_dir>/<framework>/<api>_pairs.json`, with dots in the API name
/// replaced by underscores.
pub fn split_generation_corpus(
    input_dir: &Path,
    output_dir: &Path,
    max_examples: usize,
) -> Result<GenerationReport, CorpusError> {
    let mut report = GenerationReport::default();
    for framework_dir in framework_dirs(input_dir)? {
        let framework = dir_label(&framework_dir);
        log::info!("processing {framework} responses");
        let files = match files_with_suffix(&framework_dir, RESPONSE_SUFFIX) {
            Ok(files) => files,
            Err(error) => {
                log::error!("{error}");
                report.skipped_files.push(framework_dir);
                continue;
            }
        };
        for input_file in files {
            match split_file(&input_file, &framework, output_dir, max_examples) {
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

fn split_file(
    input_file: &Path,
    framework: &str,
    output_dir: &Path,
    max_examples: usize,
) -> Result<Option<GenerationFileSummary>, CorpusError> {
    let response = read_text(input_file)?;
    let api = stem_without_suffix(input_file, RESPONSE_SUFFIX);
    let pairs = parse_generation_response(&response, max_examples);
    if pairs.is_empty() {
        log::warn!("failed to parse code pairs for {api}, skipping");
        return Ok(None);
    }

    let output_path = output_dir
        .join(framework)
        .join(format!("{}{PAIRS_SUFFIX}", api.replace('.', "_")));
    write_json(&output_path, &pairs)?;
    log::info!(
        "saved {} code pairs to {}",
        pairs.len(),
        output_path.display()
    );
    Ok(Some(GenerationFileSummary {
        framework: framework.to_string(),
        api,
        pairs: pairs.len(),
        output_path,
    }))
}
