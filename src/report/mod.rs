//! Read-only views over the ledger: the monthly dashboard, the per-unit drill-down, the version
//! history and the CSV export. Every view looks only at live entries of one month.

mod dashboard;
mod export;
mod history;

use crate::dates::Month;
use crate::model::DailyEntry;
use crate::Ledger;

pub use dashboard::{
    month_report, unit_history, BazarDay, DailyPoint, DaySummary, MonthReport, UnitHistory,
    UnitHistoryRow, UnitStat,
};
pub use export::{csv_export, CsvExport};
pub use history::{history_trail, month_history, HistoryItem, UnitChange, Version, VersionDiff};

/// Live entries dated within `month`, oldest date first. Entries sharing a date keep the order
/// they were recorded in.
pub(crate) fn month_entries<'a>(ledger: &'a Ledger, month: Month) -> Vec<&'a DailyEntry> {
    let mut entries: Vec<&DailyEntry> = ledger.live().filter(|e| month.contains(&e.date)).collect();
    entries.sort_by(|a, b| a.date.cmp(&b.date));
    entries
}

/// Formats whole taka with thousands separators, e.g. `৳12,500`.
pub fn taka(amount: i64) -> String {
    let formatted = format_num::format_num!(",.0", amount.unsigned_abs() as f64);
    if amount < 0 {
        format!("-৳{formatted}")
    } else {
        format!("৳{formatted}")
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::{BazarItem, DailyEntry, UnitEntry, UnitName};
    use std::collections::BTreeMap;

    /// An entry with the given unit amounts and bazar items.
    pub(crate) fn entry(
        date: &str,
        units: &[(UnitName, i64, i64)],
        bazar: &[(&str, i64)],
    ) -> DailyEntry {
        let units: BTreeMap<UnitName, UnitEntry> = units
            .iter()
            .map(|(u, income, cost)| (*u, UnitEntry::new(*income, *cost)))
            .collect();
        let bazar = bazar
            .iter()
            .map(|(name, cost)| BazarItem::new(*name, *cost))
            .collect();
        DailyEntry::new(date, units, bazar, 1).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::entry;
    use super::*;
    use crate::model::UnitName;

    #[test]
    fn test_taka() {
        assert_eq!(taka(0), "৳0");
        assert_eq!(taka(950), "৳950");
        assert_eq!(taka(12_500), "৳12,500");
        assert_eq!(taka(-1_234_567), "-৳1,234,567");
    }

    #[test]
    fn test_month_entries_filters_and_sorts() {
        let mut ledger = Ledger::default();
        ledger.add(entry("2025-05-20", &[(UnitName::Car, 100, 0)], &[]));
        ledger.add(entry("2025-04-30", &[(UnitName::Car, 200, 0)], &[]));
        ledger.add(entry("2025-05-02", &[(UnitName::Car, 300, 0)], &[]));
        let superseded = ledger.entries()[2].id.clone();
        ledger
            .edit(&superseded, entry("2025-05-03", &[], &[]))
            .unwrap();

        let month: Month = "2025-05".parse().unwrap();
        let dates: Vec<&str> = month_entries(&ledger, month)
            .iter()
            .map(|e| e.date.as_str())
            .collect();
        assert_eq!(dates, vec!["2025-05-03", "2025-05-20"]);
    }
}
