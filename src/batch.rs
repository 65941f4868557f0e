use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{FileError, Result, ToolError};
use crate::extract::{aggregate, extract};
use crate::io::excel_read;
use crate::io::excel_write;
use crate::layout::build_layout;
use crate::model::{FileResult, SourceFile, SummaryTable};
use crate::schema::{ResolutionMap, normalize_label};

/// Everything a successful batch produces.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    /// The xlsx bytes of the assembled workbook.
    pub workbook: Vec<u8>,
    /// Per-file results in input order.
    pub results: Vec<FileResult>,
    pub summary: SummaryTable,
}

impl BatchOutput {
    /// Presentation view of the batch: the summary plus, per file, how its
    /// columns were resolved.
    pub fn report(&self) -> BatchReport<'_> {
        BatchReport {
            summary: &self.summary,
            files: self
                .results
                .iter()
                .map(|result| FileReport {
                    label: &result.label,
                    source_sheet: &result.source_sheet,
                    subtotal_rows: result.aggregate.row_count,
                    sums: &result.aggregate.sums,
                    coercion_losses: result.coercion_losses,
                    resolution: &result.resolution,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchReport<'a> {
    pub summary: &'a SummaryTable,
    pub files: Vec<FileReport<'a>>,
}

#[derive(Debug, Serialize)]
pub struct FileReport<'a> {
    pub label: &'a str,
    pub source_sheet: &'a str,
    pub subtotal_rows: usize,
    pub sums: &'a IndexMap<String, f64>,
    pub coercion_losses: usize,
    pub resolution: &'a ResolutionMap,
}

/// Runs the per-file pipeline for one source: sheet selection, resolution,
/// subtotal extraction and aggregation.
#[instrument(level = "info", skip_all, fields(file = %source.name))]
pub fn process_file(source: &SourceFile, config: &PipelineConfig) -> Result<FileResult> {
    let grouping_keys = grouping_keys(config);
    let loaded = excel_read::load_source(&source.bytes, &grouping_keys)?;
    let extraction = extract(&loaded.table, config)?;
    let aggregate = aggregate(&extraction.table, config.numeric_display_fields());

    if extraction.coercion_losses > 0 {
        warn!(
            losses = extraction.coercion_losses,
            "numeric cells defaulted to 0"
        );
    }
    info!(
        sheet = %loaded.sheet_name,
        subtotal_rows = aggregate.row_count,
        total = aggregate.sum(&config.primary_sum_field),
        "processed source file"
    );

    Ok(FileResult {
        label: source.label(),
        source_sheet: loaded.sheet_name,
        raw: loaded.table,
        resolution: extraction.resolution,
        subtotal: extraction.table,
        aggregate,
        coercion_losses: extraction.coercion_losses,
    })
}

/// Processes every file, then assembles the output workbook.
///
/// Files are processed in parallel and all of them are attempted. If any file
/// fails, no workbook is produced and every failure is returned in
/// [`ToolError::BatchFailed`].
#[instrument(level = "info", skip_all, fields(files = sources.len()))]
pub fn run_batch(sources: &[SourceFile], config: &PipelineConfig) -> Result<BatchOutput> {
    if sources.is_empty() {
        return Err(ToolError::NoInputs);
    }
    config.validate()?;

    let outcomes: Vec<Result<FileResult>> = sources
        .par_iter()
        .map(|source| process_file(source, config))
        .collect();

    let mut results = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for (source, outcome) in sources.iter().zip(outcomes) {
        match outcome {
            Ok(result) => results.push(result),
            Err(error) => {
                error!(file = %source.name, %error, "file failed");
                failures.push(FileError::new(source.name.clone(), error));
            }
        }
    }
    if !failures.is_empty() {
        return Err(ToolError::BatchFailed(failures));
    }

    let summary = SummaryTable::from_results(&results, &config.primary_sum_field);
    let workbook = assemble(&results, &summary, config)?;

    Ok(BatchOutput {
        workbook,
        results,
        summary,
    })
}

/// Lays out and serialises the output workbook. Runs on the calling thread
/// so every sheet name reservation sees the ones before it.
pub fn assemble(
    results: &[FileResult],
    summary: &SummaryTable,
    config: &PipelineConfig,
) -> Result<Vec<u8>> {
    let layout = build_layout(results, summary, config)?;
    let workbook = excel_write::write_workbook_bytes(&layout)?;
    info!(bytes = workbook.len(), sheets = layout.sheets.len(), "workbook assembled");
    Ok(workbook)
}

/// Reads the given files from disk, runs the batch and writes the workbook to
/// `output`.
#[instrument(level = "info", skip_all, fields(output = %output.display()))]
pub fn run_paths(inputs: &[PathBuf], output: &Path, config: &PipelineConfig) -> Result<BatchOutput> {
    let sources = inputs
        .iter()
        .map(|path| read_source(path))
        .collect::<Result<Vec<_>>>()?;
    let batch = run_batch(&sources, config)?;
    fs::write(output, &batch.workbook)?;
    Ok(batch)
}

fn read_source(path: &Path) -> Result<SourceFile> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceFile::new(name, fs::read(path)?))
}

fn grouping_keys(config: &PipelineConfig) -> Vec<String> {
    let mut keys = vec![normalize_label(&config.grouping_field)];
    if let Some(candidates) = config.aliases.candidates(&config.grouping_field) {
        keys.extend(candidates.iter().map(|candidate| normalize_label(candidate)));
    }
    keys
}
