//! Turns match verdicts into a report and renders it as a table, JSON or CSV.

use std::{fmt::Write as _, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;

use crate::{
    field::{Field, FieldMap},
    layout::Row,
    pipeline::{Reconciliation, SideLayout},
    profile::Profile,
    table::{self, Align},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub field: Field,
    pub label: String,
    pub primary_value: String,
    pub reference_value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Match,
    Mismatch,
    NotFound,
}

impl RowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RowStatus::Match => "match",
            RowStatus::Mismatch => "mismatch",
            RowStatus::NotFound => "not found",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_rows: usize,
    pub all_match: usize,
    /// Every row that is not a full match, including rows with no counterpart.
    pub has_mismatch: usize,
    pub found: usize,
    pub not_found: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub row: usize,
    /// 1-based row in the primary grid.
    pub source_row: usize,
    pub status: RowStatus,
    pub found: bool,
    pub all_match: bool,
    pub primary: Row,
    pub reference: Row,
    pub matched: FieldMap<bool>,
    pub compared: FieldMap<bool>,
    pub mismatches: Vec<Mismatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub column_labels: Vec<String>,
    pub key_field: Field,
    pub key_label: String,
    pub elapsed_ms: f64,
    pub retried: bool,
    pub primary: SideLayout,
    pub reference: SideLayout,
    pub reference_rows: usize,
    pub summary: Summary,
    pub rows: Vec<ReportRow>,
}

impl Report {
    pub fn build(
        reconciliation: &Reconciliation,
        profile: &Profile,
        key_field: Field,
        elapsed: Duration,
    ) -> Self {
        let rows: Vec<ReportRow> = reconciliation
            .verdicts
            .iter()
            .zip(&reconciliation.primary_rows)
            .map(|(verdict, source)| {
                let mismatches = verdict
                    .mismatched_fields()
                    .map(|field| Mismatch {
                        field,
                        label: profile.label(field).to_string(),
                        primary_value: verdict.primary[field].clone(),
                        reference_value: verdict.reference[field].clone(),
                    })
                    .collect();
                let status = if !verdict.found {
                    RowStatus::NotFound
                } else if verdict.all_match {
                    RowStatus::Match
                } else {
                    RowStatus::Mismatch
                };
                ReportRow {
                    row: verdict.row,
                    source_row: source.source_row,
                    status,
                    found: verdict.found,
                    all_match: verdict.all_match,
                    primary: verdict.primary.clone(),
                    reference: verdict.reference.clone(),
                    matched: verdict.matched.clone(),
                    compared: verdict.compared.clone(),
                    mismatches,
                }
            })
            .collect();

        let all_match = rows.iter().filter(|row| row.all_match).count();
        let found = rows.iter().filter(|row| row.found).count();
        let summary = Summary {
            total_rows: rows.len(),
            all_match,
            has_mismatch: rows.len() - all_match,
            found,
            not_found: rows.len() - found,
        };

        Self {
            generated_at: Utc::now(),
            column_labels: profile.labels(),
            key_field,
            key_label: profile.label(key_field).to_string(),
            elapsed_ms: (elapsed.as_secs_f64() * 100_000.0).round() / 100.0,
            retried: reconciliation.retried,
            primary: reconciliation.primary.clone(),
            reference: reconciliation.reference.clone(),
            reference_rows: reconciliation.reference_row_count,
            summary,
            rows,
        }
    }

    fn visible_rows(&self, mismatches_only: bool) -> impl Iterator<Item = &ReportRow> {
        self.rows
            .iter()
            .filter(move |row| !mismatches_only || !row.all_match)
    }

    pub fn render_table(&self, mismatches_only: bool) -> String {
        let mut output = String::new();
        for layout in [&self.primary, &self.reference] {
            let _ = writeln!(output, "{}", describe_layout(layout, &self.column_labels));
        }
        if self.retried {
            let _ = writeln!(output, "reference layout re-detected after an empty first pass");
        }
        let _ = writeln!(output);

        let headers = vec![
            "Row".to_string(),
            "Source Row".to_string(),
            self.key_label.clone(),
            "Status".to_string(),
            "Mismatches".to_string(),
        ];
        let rows = self
            .visible_rows(mismatches_only)
            .map(|row| {
                vec![
                    row.row.to_string(),
                    row.source_row.to_string(),
                    row.primary[self.key_field].clone(),
                    row.status.as_str().to_string(),
                    row.mismatches
                        .iter()
                        .map(|m| format!("{}: '{}' vs '{}'", m.label, m.primary_value, m.reference_value))
                        .join("; "),
                ]
            })
            .collect::<Vec<_>>();
        output.push_str(&table::render_aligned(
            &headers,
            &rows,
            &[Align::Right, Align::Right],
        ));

        let summary = &self.summary;
        let _ = writeln!(
            output,
            "\n{} row(s): {} all match, {} with mismatches ({} not found) in {} ms",
            summary.total_rows, summary.all_match, summary.has_mismatch, summary.not_found, self.elapsed_ms
        );
        output
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing report as JSON")
    }

    /// One record per primary row: status, both ledgers' values and the mismatched labels.
    pub fn to_csv(&self, delimiter: u8, mismatches_only: bool) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(Vec::new());

        let mut header = vec!["row".to_string(), "source_row".to_string(), "status".to_string()];
        for field in Field::ALL {
            header.push(format!("primary_{}", field.name()));
            header.push(format!("reference_{}", field.name()));
        }
        header.push("mismatched".to_string());
        writer.write_record(&header).context("Writing CSV header")?;

        for row in self.visible_rows(mismatches_only) {
            let mut record = vec![
                row.row.to_string(),
                row.source_row.to_string(),
                row.status.as_str().to_string(),
            ];
            for field in Field::ALL {
                record.push(row.primary[field].clone());
                record.push(row.reference[field].clone());
            }
            record.push(row.mismatches.iter().map(|m| m.label.as_str()).join("; "));
            writer
                .write_record(&record)
                .with_context(|| format!("Writing CSV row {}", row.row))?;
        }

        let bytes = writer.into_inner().context("Finishing CSV output")?;
        String::from_utf8(bytes).context("CSV output is not valid UTF-8")
    }
}

/// Spreadsheet-style column name for a 0-based index: 0 → A, 25 → Z, 26 → AA.
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index as u128 + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// One-line description of a ledger's layout, e.g. `primary sheet 'esg': Customer=B, ...`.
pub fn describe_layout(layout: &SideLayout, labels: &[String]) -> String {
    let columns = layout
        .columns
        .columns()
        .iter()
        .zip(labels)
        .map(|(column, label)| format!("{label}={}", column_letter(*column)))
        .join(", ");
    let origin = if layout.detected { "detected" } else { "given" };
    format!(
        "{} sheet '{}' ({origin}): {columns}; data from row {}",
        layout.side,
        layout.sheet,
        layout.start_row.saturating_add(1)
    )
}
