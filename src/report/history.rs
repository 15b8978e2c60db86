use crate::dates::Month;
use crate::model::{DailyEntry, UnitName};
use crate::report::{month_entries, taka};
use crate::Ledger;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// How one unit differs between an old version and the live one.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct UnitChange {
    pub unit: UnitName,
    pub old_income: i64,
    pub new_income: i64,
    pub old_cost: i64,
    pub new_cost: i64,
}

/// The differences between an old version and the live version of an entry.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize)]
pub struct VersionDiff {
    pub units: Vec<UnitChange>,
    /// Old and new bazar totals, when they differ.
    pub bazar_costs: Option<(i64, i64)>,
    /// Old and new income totals, when they differ.
    pub total_income: Option<(i64, i64)>,
}

impl VersionDiff {
    pub fn between(old: &DailyEntry, current: &DailyEntry) -> Self {
        let units = UnitName::ALL
            .iter()
            .filter_map(|&unit| {
                let (old, new) = (old.unit(unit), current.unit(unit));
                (old != new).then_some(UnitChange {
                    unit,
                    old_income: old.income,
                    new_income: new.income,
                    old_cost: old.cost,
                    new_cost: new.cost,
                })
            })
            .collect();
        let changed = |a: i64, b: i64| (a != b).then_some((a, b));
        Self {
            units,
            bazar_costs: changed(old.bazar_costs, current.bazar_costs),
            total_income: changed(old.total_income, current.total_income),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.bazar_costs.is_none() && self.total_income.is_none()
    }
}

/// A superseded version of an entry.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Version {
    /// Versions count up from 1 for the oldest.
    pub number: usize,
    pub entry: DailyEntry,
    pub diff: VersionDiff,
}

/// A live entry and the versions it replaced.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct HistoryItem {
    pub entry: DailyEntry,
    /// Newest first.
    pub trail: Vec<Version>,
}

/// The superseded versions of `entry`: history entries in its chain, plus the entry its
/// `parent_id` names. Newest `updated_at` first.
pub fn history_trail<'a>(entries: &'a [DailyEntry], entry: &DailyEntry) -> Vec<&'a DailyEntry> {
    let root = entry.chain_root();
    let mut trail: Vec<&DailyEntry> = entries
        .iter()
        .filter(|e| e.is_history())
        .filter(|e| {
            e.parent_id.as_deref() == Some(root) || Some(e.id.as_str()) == entry.parent_id.as_deref()
        })
        .collect();
    trail.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    trail
}

/// The live entries of `month`, newest date first, each with its version trail.
pub fn month_history(ledger: &Ledger, month: Month) -> Vec<HistoryItem> {
    let mut entries = month_entries(ledger, month);
    // Stable, so same-day entries keep their recorded order.
    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries
        .into_iter()
        .map(|entry| {
            let trail = history_trail(ledger.entries(), entry);
            let count = trail.len();
            HistoryItem {
                entry: entry.clone(),
                trail: trail
                    .into_iter()
                    .enumerate()
                    .map(|(ix, old)| Version {
                        number: count - ix,
                        entry: old.clone(),
                        diff: VersionDiff::between(old, entry),
                    })
                    .collect(),
            }
        })
        .collect()
}

impl Display for HistoryItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let e = &self.entry;
        writeln!(
            f,
            "{}  in {:>10}  out {:>10}  balance {:>10}  [{}]",
            e.date,
            taka(e.total_income),
            taka(e.total_cost()),
            taka(e.available_balance),
            e.id
        )?;
        for version in &self.trail {
            write!(f, "    version {}", version.number)?;
            if version.diff.is_empty() {
                writeln!(f, ": no changes")?;
                continue;
            }
            writeln!(f)?;
            if let Some((old, new)) = version.diff.total_income {
                writeln!(f, "      income {} -> {}", taka(old), taka(new))?;
            }
            for change in &version.diff.units {
                writeln!(
                    f,
                    "      {}: income {} -> {}, cost {} -> {}",
                    change.unit,
                    taka(change.old_income),
                    taka(change.new_income),
                    taka(change.old_cost),
                    taka(change.new_cost)
                )?;
            }
            if let Some((old, new)) = version.diff.bazar_costs {
                writeln!(f, "      bazar {} -> {}", taka(old), taka(new))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::entry;

    fn with_updated_at(mut entry: DailyEntry, updated_at: i64) -> DailyEntry {
        entry.updated_at = updated_at;
        entry
    }

    #[test]
    fn test_month_history_newest_first_with_trail() {
        let mut ledger = Ledger::default();
        ledger.add(with_updated_at(
            entry("2025-05-01", &[(UnitName::Car, 100, 0)], &[("Rice", 50)]),
            10,
        ));
        ledger.add(entry("2025-05-09", &[], &[]));
        let first = ledger.entries()[0].id.clone();

        let second = ledger
            .edit(
                &first,
                with_updated_at(entry("2025-05-01", &[(UnitName::Car, 150, 0)], &[("Rice", 50)]), 20),
            )
            .unwrap()
            .id
            .clone();
        ledger
            .edit(
                &second,
                with_updated_at(entry("2025-05-01", &[(UnitName::Car, 150, 5)], &[("Rice", 80)]), 30),
            )
            .unwrap();

        let history = month_history(&ledger, "2025-05".parse().unwrap());
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].entry.date, "2025-05-09");
        assert!(history[0].trail.is_empty());

        let item = &history[1];
        assert_eq!(item.entry.updated_at, 30);
        let trail: Vec<(usize, i64)> = item
            .trail
            .iter()
            .map(|v| (v.number, v.entry.updated_at))
            .collect();
        assert_eq!(trail, vec![(2, 20), (1, 10)]);

        let newest = &item.trail[0].diff;
        assert_eq!(newest.total_income, None);
        assert_eq!(newest.bazar_costs, Some((50, 80)));
        assert_eq!(newest.units.len(), 1);
        assert_eq!(newest.units[0].unit, UnitName::Car);
        assert_eq!((newest.units[0].old_cost, newest.units[0].new_cost), (0, 5));

        let oldest = &item.trail[1].diff;
        assert_eq!(oldest.total_income, Some((100, 150)));
    }

    #[test]
    fn test_trail_includes_parent_entry() {
        // A version whose parent_id names an entry directly, as written by older clients.
        let mut old = with_updated_at(entry("2025-05-01", &[], &[]), 1);
        old.is_history = Some(true);
        let mut current = entry("2025-05-01", &[], &[]);
        current.parent_id = Some(old.id.clone());
        let mut unrelated = with_updated_at(entry("2025-05-01", &[], &[]), 2);
        unrelated.is_history = Some(true);
        let entries = vec![old.clone(), current.clone(), unrelated];

        let trail = history_trail(&entries, &current);
        assert_eq!(trail, vec![&old]);
    }

    #[test]
    fn test_diff_of_identical_versions_is_empty() {
        let a = entry("2025-05-01", &[(UnitName::Auto, 5, 1)], &[("Tea", 3)]);
        let b = a.clone();
        assert!(VersionDiff::between(&a, &b).is_empty());
    }
}
