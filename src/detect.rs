//! Layout detection for ledgers without a header contract.
//!
//! ## Column scoring
//!
//! Each column is summarised by a *blob*: the normalized, space-joined text of
//! its first few cells (headers usually sit there, often spread over merged
//! rows). A field scores `10 + alias length` on a column when one of its
//! aliases occurs in the blob, so longer, more specific aliases win over
//! generic ones. Suppressions subtract a penalty when a competing field's alias
//! is also present (`com` inside `com f/n`).
//!
//! ## Assignment
//!
//! Fields claim columns greedily in priority order; a claimed column is never
//! offered again. Only once every field with positive evidence has its column
//! do the remaining fields take their positional fallbacks, in priority order,
//! moving to the lowest free column when the fallback is already taken.
//!
//! ## Start row
//!
//! The first row whose identifier cell looks like an identifier and whose
//! customer cell holds a real name (not a header or sequence label).

use std::collections::HashSet;

use log::debug;

use crate::{
    field::{FIELD_COUNT, Field, FieldMap},
    grid::Grid,
    layout::{ColumnMapping, DetectionScores},
    normalize::{is_identifier_like, normalize_text},
    profile::Profile,
};

const ALIAS_BASE_SCORE: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub mapping: ColumnMapping,
    pub start_row: usize,
    pub scores: DetectionScores,
    /// False when no row qualified and the default start row was used.
    pub start_row_inferred: bool,
}

pub struct Detector<'a> {
    profile: &'a Profile,
}

impl<'a> Detector<'a> {
    pub fn new(profile: &'a Profile) -> Self {
        Self { profile }
    }

    pub fn detect(&self, grid: &Grid, fallback_columns: &[usize; FIELD_COUNT]) -> Detection {
        let settings = &self.profile.detection;
        let window = grid.window(settings.sample_rows, settings.sample_columns);
        let blobs = self.column_blobs(&window);
        let (mapping, scores) = self.assign_columns(&blobs, fallback_columns);
        let inferred = self.infer_start_row(&window, &mapping);
        debug!(
            "Detected columns {:?} with scores {:?}; start row {:?}",
            mapping.columns(),
            scores,
            inferred
        );
        Detection {
            mapping,
            start_row: inferred.unwrap_or(settings.default_start_row),
            scores,
            start_row_inferred: inferred.is_some(),
        }
    }

    /// One blob per column of the window.
    pub fn column_blobs(&self, window: &Grid) -> Vec<String> {
        let blob_rows = self.profile.detection.blob_rows.min(window.height());
        (0..window.width())
            .map(|column| {
                (0..blob_rows)
                    .map(|row| normalize_text(window.cell(row, column)))
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }

    /// Evidence that `blob` holds `field`. Zero or below means no evidence.
    pub fn score_column(&self, field: Field, blob: &str) -> i64 {
        let mut score = self
            .profile
            .aliases(field)
            .iter()
            .filter(|alias| blob.contains(alias.as_str()))
            .map(|alias| ALIAS_BASE_SCORE + alias.chars().count() as i64)
            .max()
            .unwrap_or(0);
        for suppression in self.profile.suppressions.iter().filter(|s| s.field == field) {
            let competing = self
                .profile
                .aliases(suppression.by)
                .iter()
                .any(|alias| blob.contains(alias.as_str()));
            if competing {
                score -= suppression.penalty;
            }
        }
        score
    }

    fn assign_columns(
        &self,
        blobs: &[String],
        fallback_columns: &[usize; FIELD_COUNT],
    ) -> (ColumnMapping, DetectionScores) {
        let mut claimed: HashSet<usize> = HashSet::with_capacity(FIELD_COUNT);
        let mut columns = [0usize; FIELD_COUNT];
        let mut scores = FieldMap::<u32>::default();

        let mut unplaced = Vec::new();
        for &field in &self.profile.priority {
            let mut best: Option<(usize, i64)> = None;
            for (column, blob) in blobs.iter().enumerate() {
                if claimed.contains(&column) {
                    continue;
                }
                let score = self.score_column(field, blob);
                if score > best.map_or(0, |(_, best_score)| best_score) {
                    best = Some((column, score));
                }
            }
            match best {
                Some((column, score)) => {
                    claimed.insert(column);
                    columns[field.index()] = column;
                    scores[field] = u32::try_from(score).unwrap_or(u32::MAX);
                }
                None => unplaced.push(field),
            }
        }

        // Fallbacks only take what evidence left over.
        for field in unplaced {
            let fallback = fallback_columns[field.index()];
            let column = if claimed.contains(&fallback) {
                (0..).find(|c| !claimed.contains(c)).unwrap_or(fallback)
            } else {
                fallback
            };
            claimed.insert(column);
            columns[field.index()] = column;
        }

        (
            ColumnMapping::from_assigned(columns),
            DetectionScores::new(scores),
        )
    }

    /// Index of the first data row within `window`, if any row qualifies.
    pub fn infer_start_row(&self, window: &Grid, mapping: &ColumnMapping) -> Option<usize> {
        let settings = &self.profile.detection;
        let identifier_column = mapping.column(Field::Identifier);
        let customer_column = mapping.column(Field::Customer);
        (0..window.height()).find(|&row| {
            let identifier = normalize_text(window.cell(row, identifier_column));
            let customer = normalize_text(window.cell(row, customer_column));
            is_identifier_like(&identifier, settings.min_identifier_len)
                && !customer.is_empty()
                && !settings
                    .header_markers
                    .iter()
                    .any(|marker| customer.contains(marker.as_str()))
        })
    }

    /// How strongly a sheet looks like a ledger, used to pick among sheets.
    pub fn score_sheet(&self, grid: &Grid) -> u32 {
        let settings = &self.profile.detection;
        grid.rows()
            .iter()
            .take(settings.sheet_scan_rows)
            .map(|row| {
                let text = row
                    .iter()
                    .take(settings.sample_columns)
                    .map(|cell| normalize_text(cell))
                    .collect::<Vec<_>>()
                    .join(" ");
                self.profile
                    .sheet_markers
                    .iter()
                    .filter(|marker| text.contains(marker.text.as_str()))
                    .map(|marker| marker.weight)
                    .sum::<u32>()
            })
            .sum()
    }
}
