use std::time::Instant;

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{OutputFormat, ReconcileArgs},
    io_utils, load_profile,
    matcher::MatchOptions,
    open_workbook,
    pipeline::{LedgerInput, NoRetry, Reconciler},
    profile::Profile,
    report::Report,
};

pub fn execute(args: &ReconcileArgs) -> Result<()> {
    let started = Instant::now();
    let profile = load_profile(args.input.profile.as_deref())?;
    let output_encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    let primary_book = open_workbook(&args.primary, &args.input)?;
    let reference_book = open_workbook(&args.reference, &args.input)?;

    let primary = LedgerInput {
        source: &primary_book,
        sheet_hint: args.primary_sheet.clone(),
        columns: args.primary_columns.clone(),
        start_row: args.primary_start_row,
    };
    let reference = LedgerInput {
        source: &reference_book,
        sheet_hint: args.reference_sheet.clone(),
        columns: args.reference_columns.clone(),
        start_row: args.reference_start_row,
    };

    let options = match_options(&profile, args);
    let key_field = options.key_field;
    info!(
        "Reconciling {:?} against {:?} on {}",
        args.primary,
        args.reference,
        profile.label(key_field)
    );
    let mut reconciler = Reconciler::new(&profile).with_options(options);
    if args.no_retry {
        reconciler = reconciler.with_retry_policy(NoRetry);
    }
    let reconciliation = reconciler
        .run(&primary, &reference)
        .context("Reconciling ledgers")?;

    let report = Report::build(&reconciliation, &profile, key_field, started.elapsed());
    info!(
        "{} row(s): {} all match, {} with mismatches, {} not found",
        report.summary.total_rows,
        report.summary.all_match,
        report.summary.has_mismatch,
        report.summary.not_found
    );

    let rendered = match args.format {
        OutputFormat::Table => report.render_table(args.mismatches_only),
        OutputFormat::Json => report.to_json()?,
        OutputFormat::Csv => {
            let delimiter =
                io_utils::resolve_output_delimiter(args.output.as_deref(), args.input.delimiter);
            report.to_csv(delimiter, args.mismatches_only)?
        }
    };
    io_utils::write_output(args.output.as_deref(), &rendered, output_encoding)
}

/// Profile matching options with command-line overrides applied.
fn match_options(profile: &Profile, args: &ReconcileArgs) -> MatchOptions {
    let mut options = MatchOptions::from(&profile.matching);
    if let Some(key) = args.key {
        options.key_field = key;
    }
    if let Some(fields) = &args.compare {
        options.compare_fields = fields.clone();
    }
    if args.case_insensitive {
        options.case_sensitive = false;
    }
    options
}
