use anyhow::Result;
use log::info;

use crate::{
    cli::PreviewArgs,
    layout::project,
    load_profile, open_workbook,
    pipeline::{LedgerInput, Reconciler},
    report::describe_layout,
    table,
};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let profile = load_profile(args.input_options.profile.as_deref())?;
    let workbook = open_workbook(&args.input, &args.input_options)?;
    let input = LedgerInput {
        source: &workbook,
        sheet_hint: args.sheet.clone(),
        columns: args.columns.clone(),
        start_row: args.start_row,
    };
    let (loaded, layout) = Reconciler::new(&profile).resolve_layout(args.side.into(), &input)?;

    let mut headers = vec!["Row".to_string()];
    headers.extend(profile.labels());
    let rows = project(&loaded.grid, &layout.columns, layout.start_row)
        .into_iter()
        .take(args.rows)
        .map(|row| {
            let mut cells = vec![row.source_row.to_string()];
            cells.extend(row.values.values().iter().cloned());
            cells
        })
        .collect::<Vec<_>>();

    println!("{}", describe_layout(&layout, &profile.labels()));
    print!("{}", table::render_aligned(&headers, &rows, &[table::Align::Right]));
    info!("Displayed {} row(s) from {:?}", rows.len(), args.input);
    Ok(())
}
