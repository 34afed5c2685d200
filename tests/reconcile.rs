mod common;

use std::time::Duration;

use common::{TestWorkspace, ledger_csv};
use encoding_rs::UTF_8;
use ledger_recon::{
    error::Side,
    field::Field,
    pipeline::{LedgerInput, NoRetry, Reconciler},
    profile::Profile,
    report::{Report, RowStatus},
    source::CsvWorkbook,
};

fn workbook(path: &std::path::Path) -> CsvWorkbook {
    CsvWorkbook::open(path, None, UTF_8).expect("open workbook")
}

#[test]
fn formatted_prices_reconcile_as_equal() {
    let workspace = TestWorkspace::new();
    let primary = workspace.write(
        "esg.csv",
        &ledger_csv(&[
            "1,Somchai,ABC Finance,X100,MR0HA3CD100123,\"50,000.00\",F1,Y",
            ",Total,,,-,\"50,000.00\",,",
        ]),
    );
    let reference = workspace.write(
        "tax.csv",
        &ledger_csv(&["9,Somchai,ABC Finance,X100,mr0-ha3cd-100123,50000,F1,Y"]),
    );
    let profile = Profile::default();
    let primary_book = workbook(&primary);
    let reference_book = workbook(&reference);

    let result = Reconciler::new(&profile)
        .run(
            &LedgerInput::new(&primary_book),
            &LedgerInput::new(&reference_book),
        )
        .expect("reconcile");

    assert_eq!(result.verdicts.len(), 1);
    assert!(result.verdicts[0].found);
    assert!(result.verdicts[0].all_match);
    assert_eq!(result.primary.sheet, "esg");
    assert_eq!(result.primary.start_row, 2);
    assert_eq!(result.primary_rows[0].source_row, 3);
}

#[test]
fn empty_reference_reports_every_filled_compared_field() {
    let workspace = TestWorkspace::new();
    let primary = workspace.write(
        "esg.csv",
        &ledger_csv(&["1,Malee,XYZ Leasing,X200,MR0HA3CD100999,61000,,N"]),
    );
    let reference = workspace.write("tax.csv", &ledger_csv(&[]));
    let profile = Profile::default();
    let primary_book = workbook(&primary);
    let reference_book = workbook(&reference);

    let result = Reconciler::new(&profile)
        .run(
            &LedgerInput::new(&primary_book),
            &LedgerInput::new(&reference_book),
        )
        .expect("reconcile");
    assert!(!result.retried);
    assert_eq!(result.reference_row_count, 0);

    let report = Report::build(&result, &profile, Field::Identifier, Duration::ZERO);
    let row = &report.rows[0];
    assert_eq!(row.status, RowStatus::NotFound);
    assert!(!row.all_match);
    let fields: Vec<Field> = row.mismatches.iter().map(|m| m.field).collect();
    assert_eq!(
        fields,
        vec![Field::Identifier, Field::Price, Field::CrossRefFlag]
    );
    assert!(row.mismatches.iter().all(|m| m.reference_value.is_empty()));
}

#[test]
fn shared_identifier_picks_the_better_agreeing_row() {
    let workspace = TestWorkspace::new();
    let primary = workspace.write(
        "esg.csv",
        &ledger_csv(&["1,Ann,Bank,X1,MR0HA3CD100123,70000,F7,Y"]),
    );
    let reference = workspace.write(
        "tax.csv",
        &ledger_csv(&[
            "1,Ann,Bank,X1,MR0HA3CD100123,65000,F7,Y",
            "2,Ann,Bank,X1,MR0HA3CD100123,70000,F7,Y",
        ]),
    );
    let profile = Profile::default();
    let primary_book = workbook(&primary);
    let reference_book = workbook(&reference);

    let result = Reconciler::new(&profile)
        .run(
            &LedgerInput::new(&primary_book),
            &LedgerInput::new(&reference_book),
        )
        .expect("reconcile");
    let verdict = &result.verdicts[0];
    assert_eq!(verdict.reference_row, Some(1));
    assert!(verdict.all_match);
    assert_eq!(verdict.reference[Field::Price], "70000");
}

#[test]
fn wrong_reference_sheet_is_recovered_by_redetection() {
    let workspace = TestWorkspace::new();
    let primary = workspace.write(
        "esg.csv",
        &ledger_csv(&["1,Ann,Bank,X1,MR0HA3CD100123,70000,F7,Y"]),
    );
    workspace.write(
        "tax/2024.csv",
        &ledger_csv(&["1,Ann,Bank,X1,MR0HA3CD100123,70000,F7,Y"]),
    );
    workspace.write(
        "tax/archive.csv",
        &ledger_csv(&["1,Old,Bank,X1,MR0HA3CD100555,10,F1,N"]),
    );
    let profile = Profile::default();
    let primary_book = workbook(&primary);
    let reference_book = workbook(&workspace.path().join("tax"));

    let result = Reconciler::new(&profile)
        .run(
            &LedgerInput::new(&primary_book),
            &LedgerInput::new(&reference_book).sheet("archive"),
        )
        .expect("reconcile");
    assert!(result.retried);
    assert_eq!(result.reference.sheet, "2024");
    assert_eq!(result.found_count(), 1);

    let without_retry = Reconciler::new(&profile)
        .with_retry_policy(NoRetry)
        .run(
            &LedgerInput::new(&primary_book),
            &LedgerInput::new(&reference_book).sheet("archive"),
        )
        .expect("reconcile");
    assert_eq!(without_retry.reference.sheet, "archive");
    assert_eq!(without_retry.found_count(), 0);
}

#[test]
fn explicit_hints_read_headerless_ledgers() {
    let workspace = TestWorkspace::new();
    let primary = workspace.write(
        "esg.csv",
        "a,b,Ann,Bank,x,M1,VIN0000001A,y,100,z\n",
    );
    let reference = workspace.write("tax.csv", "Ann,Bank,M1,VIN0000001A,100,F,Y\n");
    let profile = Profile::default();
    let primary_book = workbook(&primary);
    let reference_book = workbook(&reference);

    let result = Reconciler::new(&profile)
        .run(
            &LedgerInput::new(&primary_book)
                .columns(vec![2, 3, 5, 6, 8, 0, 1])
                .start_row(0),
            &LedgerInput::new(&reference_book).columns(vec![0, 1, 2, 3, 4, 5, 6]),
        )
        .expect("reconcile");
    assert!(!result.primary.detected);
    assert!(!result.reference.detected);
    assert_eq!(result.verdicts.len(), 1);
    let verdict = &result.verdicts[0];
    assert!(verdict.found);
    // Cross-ref code and flag come from the primary's first two columns.
    assert_eq!(
        verdict.mismatched_fields().collect::<Vec<_>>(),
        vec![Field::CrossRefCode, Field::CrossRefFlag]
    );
}

#[test]
fn headerless_reference_without_hints_is_unresolvable() {
    let workspace = TestWorkspace::new();
    let primary = workspace.write(
        "esg.csv",
        &ledger_csv(&["1,Ann,Bank,X1,MR0HA3CD100123,70000,F7,Y"]),
    );
    let reference = workspace.write("tax.csv", "Ann,Bank,M1,VIN0000001A,100,F,Y\n");
    let profile = Profile::default();
    let primary_book = workbook(&primary);
    let reference_book = workbook(&reference);

    let err = Reconciler::new(&profile)
        .run(
            &LedgerInput::new(&primary_book),
            &LedgerInput::new(&reference_book),
        )
        .expect_err("layout cannot be detected");
    let recon = err
        .downcast_ref::<ledger_recon::error::ReconError>()
        .expect("typed error");
    assert!(matches!(
        recon,
        ledger_recon::error::ReconError::UnresolvableLayout {
            side: Side::Reference,
            ..
        }
    ));
}

#[test]
fn blank_spacer_lines_keep_source_rows_aligned_with_the_file() {
    let workspace = TestWorkspace::new();
    let rows = ["1,Ann,Bank,X1,MR0HA3CD100123,70000,F7,Y"];
    // Blank spacer lines around the title and under the header.
    let spaced = ledger_csv(&[]).replacen('\n', "\n\n", 2);
    let primary = workspace.write("esg.csv", &format!("\n\n{spaced}{}\n", rows[0]));
    let reference = workspace.write("tax.csv", &ledger_csv(&rows));
    let profile = Profile::default();
    let primary_book = workbook(&primary);
    let reference_book = workbook(&reference);

    let result = Reconciler::new(&profile)
        .run(
            &LedgerInput::new(&primary_book),
            &LedgerInput::new(&reference_book),
        )
        .expect("reconcile");
    assert_eq!(result.primary.start_row, 6);
    assert_eq!(result.primary_rows[0].source_row, 7);
    assert!(result.verdicts[0].all_match);

    let hinted = Reconciler::new(&profile)
        .run(
            &LedgerInput::new(&primary_book).start_row(6),
            &LedgerInput::new(&reference_book),
        )
        .expect("reconcile with a start row");
    assert_eq!(hinted.primary_rows.len(), 1);
    assert_eq!(hinted.primary_rows[0].source_row, 7);
}
