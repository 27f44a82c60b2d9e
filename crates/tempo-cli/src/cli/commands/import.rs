//! `tempo import <file.csv>` – create one job per CSV row.

use std::path::Path;

use anyhow::Result;
use tempo_core::batch::parse_import_file;
use tempo_core::config::TempoConfig;
use tempo_core::ledger::Ledger;
use tempo_core::model::{ProductSelection, QualityFilters};

pub async fn run_import(
    ledger: &Ledger,
    cfg: &TempoConfig,
    path: &Path,
    products: &str,
    dry_run: bool,
) -> Result<()> {
    let selection = ProductSelection::parse(products, QualityFilters::default())?;
    let report = parse_import_file(path, cfg, selection.products())?;

    for w in &report.warnings {
        println!("warning: {w}");
    }
    for e in &report.rejected {
        println!("skipped {e}");
    }

    let mut created = 0usize;
    let mut skipped = report.rejected.len();
    for (row, request) in &report.jobs {
        if dry_run {
            println!(
                "row {row}: would create \"{}\" ({} day(s))",
                request.name,
                request.days().len()
            );
            continue;
        }
        // A ledger error on one row is reported like a bad row.
        match ledger.create_job(request).await {
            Ok(id) => {
                println!("row {row}: created job {id} \"{}\"", request.name);
                created += 1;
            }
            Err(e) => {
                println!("skipped row {row}: {:#}", e);
                skipped += 1;
            }
        }
    }

    println!(
        "Imported {created} job(s) from {}; {skipped} row(s) skipped",
        path.display()
    );
    Ok(())
}
