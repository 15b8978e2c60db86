//! Dashboard, history and export command handlers. None of them change the ledger.

use crate::commands::{load_ledger, Out};
use crate::dates::{self, Month};
use crate::model::UnitName;
use crate::report::{self, CsvExport, HistoryItem, MonthReport, UnitHistory};
use crate::{utils, Config, Result};
use std::path::Path;

/// Handles `ledger dashboard`.
pub async fn dashboard(config: Config, month: Month) -> Result<Out<MonthReport>> {
    let ledger = load_ledger(&config).await?;
    let report = report::month_report(&ledger, month, dates::today());
    Ok(Out::new(report.to_string(), report))
}

/// Handles `ledger dashboard --unit`.
pub async fn unit_dashboard(config: Config, month: Month, unit: UnitName) -> Result<Out<UnitHistory>> {
    let ledger = load_ledger(&config).await?;
    let history = report::unit_history(&ledger, month, unit);
    Ok(Out::new(history.to_string(), history))
}

/// Handles `ledger history`.
pub async fn history(config: Config, month: Month) -> Result<Out<Vec<HistoryItem>>> {
    let ledger = load_ledger(&config).await?;
    let items = report::month_history(&ledger, month);
    let mut message = format!("{} records found for {month}", items.len());
    for item in &items {
        message.push('\n');
        message.push_str(item.to_string().trim_end());
    }
    Ok(Out::new(message, items))
}

/// Handles `ledger export`. Writes `Family_Cost_{month}.csv` into `out_dir`.
///
/// # Errors
/// - Returns an error if the month has no entries or the file cannot be written.
pub async fn export(config: Config, month: Month, out_dir: &Path) -> Result<Out<CsvExport>> {
    let ledger = load_ledger(&config).await?;
    let export = report::csv_export(&ledger, month)?;
    let path = out_dir.join(&export.file_name);
    utils::write(&path, &export.contents).await?;
    Ok(Out::new(
        format!("Wrote {} rows to {}", export.rows, path.display()),
        export,
    ))
}
