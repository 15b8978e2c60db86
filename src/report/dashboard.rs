use crate::dates::{self, Month};
use crate::model::{sum_amounts, BazarItem, UnitName};
use crate::report::{month_entries, taka};
use crate::Ledger;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Income and cost of today's live entries.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct DaySummary {
    pub income: i64,
    pub cost: i64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct UnitStat {
    pub unit: UnitName,
    pub income: i64,
    pub cost: i64,
    pub net: i64,
}

/// The bazar spending of one day.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct BazarDay {
    pub date: String,
    pub total: i64,
    pub items: Vec<BazarItem>,
}

/// One point of the daily income and cost series.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct DailyPoint {
    pub day: u32,
    pub income: i64,
    pub cost: i64,
}

/// The monthly dashboard.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct MonthReport {
    pub month: String,
    pub entries: usize,
    pub income: i64,
    pub vehicle_cost: i64,
    pub bazar_cost: i64,
    pub total_cost: i64,
    pub balance: i64,
    /// Present only when the report is for the current month.
    pub today: Option<DaySummary>,
    pub units: Vec<UnitStat>,
    /// Newest date first; days without bazar spending are left out.
    pub bazar_by_date: Vec<BazarDay>,
    /// Ascending by day of month.
    pub daily: Vec<DailyPoint>,
}

/// Builds the dashboard of `month`. `today` decides whether the current-day summary is shown.
pub fn month_report(ledger: &Ledger, month: Month, today: NaiveDate) -> MonthReport {
    let entries = month_entries(ledger, month);

    let income = sum_amounts(entries.iter().map(|e| e.total_income));
    let vehicle_cost = sum_amounts(entries.iter().map(|e| e.total_vehicle_cost));
    let bazar_cost = sum_amounts(entries.iter().map(|e| e.bazar_costs));
    let total_cost = vehicle_cost.saturating_add(bazar_cost);

    let today = (Month::of(today) == month).then(|| {
        let today = dates::format_date(today);
        ledger
            .live()
            .filter(|e| e.date == today)
            .fold(DaySummary { income: 0, cost: 0 }, |acc, e| DaySummary {
                income: acc.income.saturating_add(e.total_income),
                cost: acc.cost.saturating_add(e.total_cost()),
            })
    });

    let units = UnitName::ALL
        .iter()
        .map(|&unit| {
            let income = sum_amounts(entries.iter().map(|e| e.unit(unit).income));
            let cost = sum_amounts(entries.iter().map(|e| e.unit(unit).cost));
            UnitStat {
                unit,
                income,
                cost,
                net: income.saturating_sub(cost),
            }
        })
        .collect();

    let mut bazar: BTreeMap<&str, BazarDay> = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.bazar_costs > 0) {
        let day = bazar.entry(&entry.date).or_insert_with(|| BazarDay {
            date: entry.date.clone(),
            total: 0,
            items: Vec::new(),
        });
        day.total = day.total.saturating_add(entry.bazar_costs);
        day.items.extend(entry.bazar_items.iter().cloned());
    }
    let bazar_by_date = bazar.into_values().rev().collect();

    let mut daily: BTreeMap<u32, DailyPoint> = BTreeMap::new();
    for entry in &entries {
        let Some(day) = dates::day_of_month(&entry.date) else {
            continue;
        };
        let point = daily.entry(day).or_insert(DailyPoint {
            day,
            income: 0,
            cost: 0,
        });
        point.income = point.income.saturating_add(entry.total_income);
        point.cost = point.cost.saturating_add(entry.total_cost());
    }

    MonthReport {
        month: month.to_string(),
        entries: entries.len(),
        income,
        vehicle_cost,
        bazar_cost,
        total_cost,
        balance: income.saturating_sub(total_cost),
        today,
        units,
        bazar_by_date,
        daily: daily.into_values().collect(),
    }
}

impl Display for MonthReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dashboard for {} ({} entries)", self.month, self.entries)?;
        if let Some(today) = &self.today {
            writeln!(
                f,
                "  Today          income {}  cost {}",
                taka(today.income),
                taka(today.cost)
            )?;
        }
        writeln!(f, "  Income         {}", taka(self.income))?;
        writeln!(f, "  Vehicle cost   {}", taka(self.vehicle_cost))?;
        writeln!(f, "  Bazar cost     {}", taka(self.bazar_cost))?;
        writeln!(f, "  Total cost     {}", taka(self.total_cost))?;
        writeln!(f, "  Balance        {}", taka(self.balance))?;

        writeln!(f, "Units")?;
        for stat in &self.units {
            writeln!(
                f,
                "  {:<16} income {:>10}  cost {:>10}  net {:>10}",
                stat.unit.to_string(),
                taka(stat.income),
                taka(stat.cost),
                taka(stat.net)
            )?;
        }

        if !self.bazar_by_date.is_empty() {
            writeln!(f, "Bazar")?;
            for day in &self.bazar_by_date {
                let names: Vec<&str> = day.items.iter().map(|i| i.name.as_str()).collect();
                writeln!(
                    f,
                    "  {}  {:>10}  {}",
                    day.date,
                    taka(day.total),
                    names.join(", ")
                )?;
            }
        }

        if !self.daily.is_empty() {
            writeln!(f, "Daily")?;
            for point in &self.daily {
                writeln!(
                    f,
                    "  {:>2}  income {:>10}  cost {:>10}",
                    point.day,
                    taka(point.income),
                    taka(point.cost)
                )?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct UnitHistoryRow {
    pub date: String,
    pub income: i64,
    pub cost: i64,
}

/// The entries of one unit in a month.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct UnitHistory {
    pub month: String,
    pub unit: UnitName,
    /// Newest date first.
    pub rows: Vec<UnitHistoryRow>,
    pub income: i64,
    pub cost: i64,
    pub net: i64,
}

/// Lists the live entries of `month` in which `unit` earned or spent anything.
pub fn unit_history(ledger: &Ledger, month: Month, unit: UnitName) -> UnitHistory {
    let mut entries = month_entries(ledger, month);
    entries.reverse();
    let rows: Vec<UnitHistoryRow> = entries
        .iter()
        .map(|e| (e, e.unit(unit)))
        .filter(|(_, u)| u.income > 0 || u.cost > 0)
        .map(|(e, u)| UnitHistoryRow {
            date: e.date.clone(),
            income: u.income,
            cost: u.cost,
        })
        .collect();
    let income = sum_amounts(rows.iter().map(|r| r.income));
    let cost = sum_amounts(rows.iter().map(|r| r.cost));
    UnitHistory {
        month: month.to_string(),
        unit,
        rows,
        income,
        cost,
        net: income.saturating_sub(cost),
    }
}

impl Display for UnitHistory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} in {}", self.unit, self.month)?;
        for row in &self.rows {
            writeln!(
                f,
                "  {}  income {:>10}  cost {:>10}",
                row.date,
                taka(row.income),
                taka(row.cost)
            )?;
        }
        writeln!(
            f,
            "  Total       income {:>10}  cost {:>10}  net {}",
            taka(self.income),
            taka(self.cost),
            taka(self.net)
        )
    }
}
