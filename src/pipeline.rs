//! End-to-end reconciliation: resolve both layouts, project, match, and
//! optionally retry the reference layout once.
//!
//! The retry exists for reference ledgers whose sheet hint pointed at the wrong
//! sheet or whose layout was misdetected: a batch where nothing was found is a
//! strong signal. The reference ledger is detected again from scratch (no sheet
//! hint, no column hints) and the new results replace the old ones only when
//! the [`RetryPolicy`] accepts them.

use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    detect::Detector,
    error::{ReconError, Side},
    layout::{ColumnMapping, DetectionScores, LedgerRow, Row, is_transaction_row, project},
    matcher::{MatchOptions, MatchVerdict, Matcher},
    profile::Profile,
    source::{self, GridSource, LoadedGrid},
};

/// One ledger to reconcile and the hints the caller has for it.
pub struct LedgerInput<'a> {
    pub source: &'a dyn GridSource,
    pub sheet_hint: Option<String>,
    /// Explicit field columns, in canonical field order. Skips detection.
    pub columns: Option<Vec<usize>>,
    pub start_row: Option<usize>,
}

impl<'a> LedgerInput<'a> {
    pub fn new(source: &'a dyn GridSource) -> Self {
        Self {
            source,
            sheet_hint: None,
            columns: None,
            start_row: None,
        }
    }

    pub fn sheet(mut self, hint: impl Into<String>) -> Self {
        self.sheet_hint = Some(hint.into());
        self
    }

    pub fn columns(mut self, columns: Vec<usize>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn start_row(mut self, row: usize) -> Self {
        self.start_row = Some(row);
        self
    }
}

/// The layout a ledger was read with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideLayout {
    pub side: Side,
    pub sheet: String,
    pub columns: ColumnMapping,
    /// 0-based grid row where data starts.
    pub start_row: usize,
    pub scores: DetectionScores,
    /// False when the columns came from explicit hints.
    pub detected: bool,
}

/// Decides whether a batch deserves a second attempt and whether to keep it.
pub trait RetryPolicy {
    fn should_retry(&self, found: usize, total: usize) -> bool;

    fn accept(&self, first_found: usize, retry_found: usize) -> bool {
        retry_found > first_found
    }
}

/// Retries when primary rows exist but none found a counterpart.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedetectWhenEmpty;

impl RetryPolicy for RedetectWhenEmpty {
    fn should_retry(&self, found: usize, total: usize) -> bool {
        found == 0 && total > 0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn should_retry(&self, _found: usize, _total: usize) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub verdicts: Vec<MatchVerdict>,
    /// Primary rows in verdict order.
    pub primary_rows: Vec<LedgerRow>,
    pub reference_row_count: usize,
    pub primary: SideLayout,
    pub reference: SideLayout,
    /// True when the retried reference layout replaced the first attempt.
    pub retried: bool,
}

impl Reconciliation {
    pub fn found_count(&self) -> usize {
        found_count(&self.verdicts)
    }
}

fn found_count(verdicts: &[MatchVerdict]) -> usize {
    verdicts.iter().filter(|verdict| verdict.found).count()
}

pub struct Reconciler<'p> {
    profile: &'p Profile,
    options: MatchOptions,
    retry: Box<dyn RetryPolicy + 'p>,
}

impl<'p> Reconciler<'p> {
    pub fn new(profile: &'p Profile) -> Self {
        Self {
            profile,
            options: MatchOptions::from(&profile.matching),
            retry: Box::new(RedetectWhenEmpty),
        }
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'p) -> Self {
        self.retry = Box::new(policy);
        self
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Loads the ledger's sheet and decides its columns and start row.
    pub fn resolve_layout(&self, side: Side, input: &LedgerInput<'_>) -> Result<(LoadedGrid, SideLayout)> {
        let detector = Detector::new(self.profile);
        let loaded = source::load(input.source, input.sheet_hint.as_deref(), &detector)?;
        let settings = self.profile.side(side);

        let layout = match &input.columns {
            Some(columns) => SideLayout {
                side,
                sheet: loaded.sheet.clone(),
                columns: ColumnMapping::from_hints(side, columns)?,
                start_row: input.start_row.unwrap_or(settings.start_row),
                scores: DetectionScores::default(),
                detected: false,
            },
            None => {
                let detection = detector.detect(&loaded.grid, &settings.fallback_columns);
                let missing = detection.scores.missing(&settings.required_fields);
                if !missing.is_empty() {
                    return Err(ReconError::UnresolvableLayout { side, missing }.into());
                }
                SideLayout {
                    side,
                    sheet: loaded.sheet.clone(),
                    columns: detection.mapping,
                    start_row: input.start_row.unwrap_or(detection.start_row),
                    scores: detection.scores,
                    detected: true,
                }
            }
        };
        info!(
            "{side} ledger: sheet '{}', columns {:?}, data from row {}",
            layout.sheet,
            layout.columns.columns(),
            layout.start_row.saturating_add(1)
        );
        Ok((loaded, layout))
    }

    fn reference_rows(&self, input: &LedgerInput<'_>) -> Result<(Vec<Row>, SideLayout)> {
        let (loaded, layout) = self.resolve_layout(Side::Reference, input)?;
        let rows = project(&loaded.grid, &layout.columns, layout.start_row)
            .into_iter()
            .map(|row| row.values)
            .collect();
        Ok((rows, layout))
    }

    pub fn run(&self, primary: &LedgerInput<'_>, reference: &LedgerInput<'_>) -> Result<Reconciliation> {
        let (primary_grid, primary_layout) = self.resolve_layout(Side::Primary, primary)?;
        let key_field = self.options.key_field;
        let primary_rows: Vec<LedgerRow> =
            project(&primary_grid.grid, &primary_layout.columns, primary_layout.start_row)
                .into_iter()
                .filter(|row| is_transaction_row(&row.values, key_field))
                .collect();
        let primary_values: Vec<Row> = primary_rows.iter().map(|row| row.values.clone()).collect();
        info!("Primary ledger: {} transaction row(s)", primary_values.len());

        let (reference_values, reference_layout) = self.reference_rows(reference)?;
        info!("Reference ledger: {} row(s)", reference_values.len());

        let mut reference_row_count = reference_values.len();
        let mut verdicts = Matcher::new(reference_values, self.options.clone()).match_all(&primary_values);
        let mut reference_layout = reference_layout;
        let mut retried = false;

        let found = found_count(&verdicts);
        if self.retry.should_retry(found, verdicts.len()) {
            warn!(
                "No primary row found a counterpart; detecting the reference layout again without hints"
            );
            let fresh = LedgerInput::new(reference.source);
            match self.reference_rows(&fresh) {
                Ok((rows, layout)) => {
                    let retry_count = rows.len();
                    let retry_verdicts = Matcher::new(rows, self.options.clone()).match_all(&primary_values);
                    let retry_found = found_count(&retry_verdicts);
                    if self.retry.accept(found, retry_found) {
                        info!("Retry found {retry_found} record(s); using sheet '{}'", layout.sheet);
                        verdicts = retry_verdicts;
                        reference_layout = layout;
                        reference_row_count = retry_count;
                        retried = true;
                    } else {
                        debug!("Retry found {retry_found} record(s); keeping the first attempt");
                    }
                }
                Err(err) if matches!(
                    err.downcast_ref::<ReconError>(),
                    Some(ReconError::UnresolvableLayout { .. })
                ) =>
                {
                    debug!("Retry skipped: {err}");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(Reconciliation {
            verdicts,
            primary_rows,
            reference_row_count,
            primary: primary_layout,
            reference: reference_layout,
            retried,
        })
    }
}
