// Import a saint catalogue from the command line
//
// Usage: cargo run --bin import_saints -- <file.csv|file.xlsx> [database]
// The database defaults to DATABASE_PATH, then saintfest.db.

use anyhow::{bail, Context};
use saintfest::{import_saints, Config, ImportFormat, Store};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "saintfest=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(file) = args.next() else {
        bail!("usage: import_saints <file.csv|file.xlsx> [database]");
    };
    let database = args.next().unwrap_or_else(|| Config::from_env().database_path);

    let format = ImportFormat::from_extension(&file)
        .with_context(|| format!("cannot tell the format of {} from its extension", file))?;
    let bytes = std::fs::read(&file).with_context(|| format!("failed to read {}", file))?;

    let store = Store::open(&database)?;
    let report = import_saints(&store, format, &bytes)?;

    println!("Imported {} into {}", file, database);
    println!("  created: {}", report.created);
    println!("  updated: {}", report.updated);
    if !report.issues.is_empty() {
        println!("  issues:");
        for issue in &report.issues {
            println!("    line {}: {}", issue.row, issue.message);
        }
    }
    println!("  saints in catalogue: {}", store.saint_count()?);
    Ok(())
}
