use crate::dates::Month;
use crate::report::history::month_history;
use crate::{Ledger, Result};
use anyhow::{anyhow, ensure, Context};
use serde::Serialize;

/// A month rendered as CSV, ready to be written to `file_name`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CsvExport {
    pub file_name: String,
    pub rows: usize,
    #[serde(skip)]
    pub contents: String,
}

#[derive(Serialize)]
struct Row<'a> {
    #[serde(rename = "Date")]
    date: &'a str,
    #[serde(rename = "Total Income")]
    total_income: i64,
    #[serde(rename = "Vehicle Cost")]
    vehicle_cost: i64,
    #[serde(rename = "Bazar Cost")]
    bazar_cost: i64,
    #[serde(rename = "Balance")]
    balance: i64,
}

/// Renders the live entries of `month` as CSV, newest date first.
///
/// # Errors
/// - Returns an error when the month has no entries.
pub fn csv_export(ledger: &Ledger, month: Month) -> Result<CsvExport> {
    let history = month_history(ledger, month);
    ensure!(!history.is_empty(), "No data to export for {month}");

    let mut writer = csv::Writer::from_writer(Vec::new());
    for item in &history {
        let e = &item.entry;
        writer
            .serialize(Row {
                date: &e.date,
                total_income: e.total_income,
                vehicle_cost: e.total_vehicle_cost,
                bazar_cost: e.bazar_costs,
                balance: e.available_balance,
            })
            .context("Failed to write CSV row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to finish CSV: {e}"))?;
    let contents = String::from_utf8(bytes).context("CSV output is not UTF-8")?;

    Ok(CsvExport {
        file_name: format!("Family_Cost_{month}.csv"),
        rows: history.len(),
        contents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UnitName;
    use crate::report::fixtures::entry;

    #[test]
    fn test_csv_export() {
        let mut ledger = Ledger::default();
        ledger.add(entry("2025-05-01", &[(UnitName::Car, 1000, 100)], &[("Rice", 300)]));
        ledger.add(entry("2025-05-07", &[(UnitName::Auto, 500, 0)], &[]));
        ledger.add(entry("2025-06-01", &[(UnitName::Auto, 1, 0)], &[]));

        let export = csv_export(&ledger, "2025-05".parse().unwrap()).unwrap();
        assert_eq!(export.file_name, "Family_Cost_2025-05.csv");
        assert_eq!(export.rows, 2);
        assert_eq!(
            export.contents,
            "Date,Total Income,Vehicle Cost,Bazar Cost,Balance\n\
             2025-05-07,500,0,0,500\n\
             2025-05-01,1000,100,300,600\n"
        );
    }

    #[test]
    fn test_empty_month_is_an_error() {
        let err = csv_export(&Ledger::default(), "2025-05".parse().unwrap()).unwrap_err();
        assert!(err.to_string().contains("No data to export"));
    }
}
