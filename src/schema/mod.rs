//! Header normalisation and alias-based column resolution.
//!
//! Raw extracts label the same logical column in many ways ("오더금액",
//! "오더 금액", "금액" ...). [`resolve`] maps every canonical field of an
//! [`AliasDirectory`] onto at most one raw column and reports the outcome per
//! field in a [`ResolutionMap`]. Nothing is copied: the resulting
//! [`CanonicalTable`] is a renamed view over the borrowed [`RawTable`].

use std::collections::HashMap;
use std::fmt::Display;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::AliasDirectory;
use crate::model::{CellValue, RawTable};

/// Canonicalises a header label for matching: every whitespace character
/// (newlines included) is removed and the text is lower-cased.
pub fn normalize_label(label: impl Display) -> String {
    label
        .to_string()
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// How a canonical field was bound to the raw table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    /// Matched the raw header `label` at position `column`.
    Resolved { label: String, column: usize },
    /// Not present in the source; served as an all-blank column.
    Synthesized,
    /// Not present in the source.
    Unresolved,
}

impl Resolution {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Resolution::Unresolved)
    }
}

/// Resolution outcome for every canonical field, in directory order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolutionMap {
    fields: IndexMap<String, Resolution>,
}

impl ResolutionMap {
    pub fn get(&self, canonical: &str) -> Option<&Resolution> {
        self.fields.get(canonical)
    }

    /// Raw column index bound to `canonical`, if any.
    pub fn column(&self, canonical: &str) -> Option<usize> {
        match self.fields.get(canonical) {
            Some(Resolution::Resolved { column, .. }) => Some(*column),
            _ => None,
        }
    }

    pub fn is_resolved(&self, canonical: &str) -> bool {
        matches!(self.fields.get(canonical), Some(Resolution::Resolved { .. }))
    }

    /// Marks an unresolved (or unknown) field as synthesised. Resolved fields
    /// are left untouched.
    pub fn synthesize(&mut self, canonical: &str) {
        let entry = self
            .fields
            .entry(canonical.to_string())
            .or_insert(Resolution::Unresolved);
        if entry.is_unresolved() {
            *entry = Resolution::Synthesized;
        }
    }

    /// Fields among `fields` that are neither resolved nor synthesised.
    pub fn missing<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        fields
            .into_iter()
            .filter(|field| {
                !matches!(
                    self.fields.get(*field),
                    Some(Resolution::Resolved { .. } | Resolution::Synthesized)
                )
            })
            .map(str::to_string)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resolution)> {
        self.fields
            .iter()
            .map(|(canonical, resolution)| (canonical.as_str(), resolution))
    }
}

/// A raw table seen through canonical field names.
#[derive(Debug, Clone)]
pub struct CanonicalTable<'a> {
    raw: &'a RawTable,
    resolution: ResolutionMap,
}

impl<'a> CanonicalTable<'a> {
    pub fn resolution(&self) -> &ResolutionMap {
        &self.resolution
    }

    pub fn resolution_mut(&mut self) -> &mut ResolutionMap {
        &mut self.resolution
    }

    pub fn into_resolution(self) -> ResolutionMap {
        self.resolution
    }

    /// Raw headers with matched columns renamed to their canonical field,
    /// followed by every synthesised field.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = self.raw.header_labels();
        let mut synthesized = Vec::new();
        for (canonical, resolution) in self.resolution.iter() {
            match resolution {
                Resolution::Resolved { column, .. } => {
                    if let Some(header) = headers.get_mut(*column) {
                        *header = canonical.to_string();
                    }
                }
                Resolution::Synthesized => synthesized.push(canonical.to_string()),
                Resolution::Unresolved => {}
            }
        }
        headers.extend(synthesized);
        headers
    }

    /// Value of `canonical` in row `row`. Synthesised and unresolved fields
    /// read as blank.
    pub fn value(&self, row: usize, canonical: &str) -> &'a CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        match self.resolution.column(canonical) {
            Some(column) => self.raw.cell(row, column),
            None => &EMPTY,
        }
    }

    pub fn row_count(&self) -> usize {
        self.raw.row_count()
    }
}

/// Resolves the headers of `raw` against `aliases`.
///
/// The first raw header wins when several normalise to the same key. For each
/// canonical field the candidates are tried in declared order and the first
/// one present is taken, regardless of where the raw column sits.
#[instrument(level = "debug", skip_all, fields(columns = raw.headers.len()))]
pub fn resolve<'a>(raw: &'a RawTable, aliases: &AliasDirectory) -> CanonicalTable<'a> {
    let mut by_key: HashMap<String, usize> = HashMap::with_capacity(raw.headers.len());
    for (column, header) in raw.headers.iter().enumerate() {
        by_key.entry(normalize_label(header)).or_insert(column);
    }

    let mut fields = IndexMap::with_capacity(aliases.len());
    for (canonical, candidates) in aliases.iter() {
        let resolution = candidates
            .iter()
            .find_map(|candidate| by_key.get(&normalize_label(candidate)))
            .map(|&column| Resolution::Resolved {
                label: raw.headers[column].to_string(),
                column,
            })
            .unwrap_or(Resolution::Unresolved);
        debug!(field = canonical, ?resolution, "resolved canonical field");
        fields.insert(canonical.to_string(), resolution);
    }

    CanonicalTable {
        raw,
        resolution: ResolutionMap { fields },
    }
}
