//! Pipeline configuration.
//!
//! Every knob of the extraction and layout rules lives in [`PipelineConfig`],
//! which is passed explicitly to each stage instead of living in globals. The
//! defaults reproduce the billing report conventions the tool was built for;
//! a JSON file can override any subset of fields.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, ToolError};

/// Upper bound Excel places on sheet name length.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Canonical field name → acceptable raw header labels, in priority order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasDirectory {
    entries: IndexMap<String, Vec<String>>,
}

impl AliasDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the candidate list of `canonical`.
    pub fn with_field<I, S>(mut self, canonical: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(canonical, candidates);
        self
    }

    pub fn insert<I, S>(&mut self, canonical: impl Into<String>, candidates: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.insert(
            canonical.into(),
            candidates.into_iter().map(Into::into).collect(),
        );
    }

    pub fn candidates(&self, canonical: &str) -> Option<&[String]> {
        self.entries.get(canonical).map(Vec::as_slice)
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.entries.contains_key(canonical)
    }

    /// Iterates over the canonical fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(canonical, candidates)| (canonical.as_str(), candidates.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Column headers of the summary sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryHeaders {
    pub label: String,
    pub source_sheet: String,
    pub row_count: String,
    /// Appended to a numeric field name to form its sum column header.
    pub sum_suffix: String,
}

impl Default for SummaryHeaders {
    fn default() -> Self {
        Self {
            label: "시트(파일명)".to_string(),
            source_sheet: "원본시트".to_string(),
            row_count: "소계 행수".to_string(),
            sum_suffix: " 합계".to_string(),
        }
    }
}

impl SummaryHeaders {
    pub fn sum_header(&self, field: &str) -> String {
        format!("{field}{}", self.sum_suffix)
    }
}

/// All recognised options of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub aliases: AliasDirectory,
    /// Field whose value marks subtotal rows; also used to find the data
    /// sheet of a workbook.
    pub grouping_field: String,
    pub subtotal_marker: String,
    /// Ignore whitespace inside grouping values, so "소 계" matches "소계".
    pub collapse_marker_whitespace: bool,
    pub required_fields: Vec<String>,
    /// Never enforced as required; synthesised as a blank column when absent.
    pub optional_field: String,
    pub display_fields: Vec<String>,
    pub numeric_fields: Vec<String>,
    pub quantity_field: String,
    pub coerce_quantity: bool,
    /// Sort key of the summary sheet.
    pub primary_sum_field: String,
    pub summary_sheet_name: String,
    pub summary_headers: SummaryHeaders,
    pub sheet_name_limit: usize,
    pub forbidden_sheet_chars: Vec<char>,
    pub sheet_name_placeholder: String,
    pub blank_rows_between_blocks: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let aliases = AliasDirectory::new()
            .with_field("차트번호", ["차트번호", "차트 번호", "차트No", "환자번호", "등록번호"])
            .with_field("오더코드", ["오더코드", "오더 코드", "처방코드", "OrderCode"])
            .with_field("청구코드", ["청구코드", "청구 코드", "보험코드", "EDI코드"])
            .with_field("오더금액", ["오더금액", "오더 금액", "금액", "총금액", "Amount"])
            .with_field("단가", ["단가", "수가", "UnitPrice"])
            .with_field("계산", ["계산", "횟수", "수량", "Qty"])
            .with_field("일수", ["일수", "투여일수", "Days"])
            .with_field("오더명칭", ["오더명칭", "오더명", "명칭", "처방명", "OrderName"]);

        Self {
            aliases,
            grouping_field: "차트번호".to_string(),
            subtotal_marker: "소계".to_string(),
            collapse_marker_whitespace: true,
            required_fields: strings(["차트번호", "오더코드", "청구코드", "오더금액", "단가", "일수", "오더명칭"]),
            optional_field: "계산".to_string(),
            display_fields: strings(["오더코드", "청구코드", "오더금액", "단가", "계산", "일수", "오더명칭"]),
            numeric_fields: strings(["오더금액", "단가"]),
            quantity_field: "일수".to_string(),
            coerce_quantity: false,
            primary_sum_field: "오더금액".to_string(),
            summary_sheet_name: "요약".to_string(),
            summary_headers: SummaryHeaders::default(),
            sheet_name_limit: MAX_SHEET_NAME_LEN,
            forbidden_sheet_chars: vec!['\\', '/', '*', '?', ':', '[', ']'],
            sheet_name_placeholder: "Sheet".to_string(),
            blank_rows_between_blocks: 2,
        }
    }
}

impl PipelineConfig {
    /// Loads a configuration from a JSON file. Missing keys keep their
    /// defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Required fields with the optional field removed. The subtraction is
    /// applied even when the optional field was listed as required.
    pub fn effective_required_fields(&self) -> Vec<&str> {
        self.required_fields
            .iter()
            .map(String::as_str)
            .filter(|field| *field != self.optional_field)
            .collect()
    }

    /// Display fields that are coerced to numbers, in display order.
    pub fn numeric_display_fields(&self) -> Vec<&str> {
        self.display_fields
            .iter()
            .map(String::as_str)
            .filter(|field| {
                self.numeric_fields.iter().any(|numeric| numeric == field)
                    || (self.coerce_quantity && *field == self.quantity_field)
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.display_fields.is_empty() {
            return Err(ToolError::InvalidConfig("display fields are empty".into()));
        }

        if self.required_fields.contains(&self.optional_field) {
            warn!(
                field = %self.optional_field,
                "optional field listed as required; it will not be enforced"
            );
        }

        let referenced = std::iter::once(&self.grouping_field)
            .chain(&self.required_fields)
            .chain(&self.display_fields)
            .chain(&self.numeric_fields);
        for field in referenced {
            if !self.aliases.contains(field) {
                return Err(ToolError::InvalidConfig(format!(
                    "field '{field}' has no alias entry"
                )));
            }
        }

        if !self.numeric_fields.contains(&self.primary_sum_field) {
            return Err(ToolError::InvalidConfig(format!(
                "primary sum field '{}' is not a numeric field",
                self.primary_sum_field
            )));
        }

        if self.sheet_name_limit == 0 || self.sheet_name_limit > MAX_SHEET_NAME_LEN {
            return Err(ToolError::InvalidConfig(format!(
                "sheet name limit must be between 1 and {MAX_SHEET_NAME_LEN}"
            )));
        }

        Ok(())
    }
}

fn strings<const N: usize>(values: [&str; N]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
