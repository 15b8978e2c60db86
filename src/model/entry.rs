use crate::{dates, Result};
use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// A tracked income/cost source, i.e. one vehicle of the fleet.
///
/// The serialized names are the ones stored in existing ledgers and must not change. The aliases
/// exist so that the units can be typed on the command line without quoting.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum UnitName {
    #[serde(rename = "Car", alias = "car")]
    Car,
    #[serde(rename = "Ris - Sharif-1", alias = "ris-sharif-1", alias = "sharif-1")]
    RisSharif1,
    #[serde(rename = "Ris - Sharif-2", alias = "ris-sharif-2", alias = "sharif-2")]
    RisSharif2,
    #[serde(rename = "Auto", alias = "auto")]
    Auto,
    #[serde(rename = "Ris - Roman-1", alias = "ris-roman-1", alias = "roman-1")]
    RisRoman1,
    #[serde(rename = "Ris - Roman-2", alias = "ris-roman-2", alias = "roman-2")]
    RisRoman2,
}

serde_plain::derive_display_from_serialize!(UnitName);
serde_plain::derive_fromstr_from_deserialize!(UnitName);

/// The largest amount a single income, cost or bazar item may hold.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Adds up amounts, pinning at the `i64` bounds. Entries loaded from the shared record are not
/// range checked, so totals over them must not overflow.
pub(crate) fn sum_amounts(amounts: impl IntoIterator<Item = i64>) -> i64 {
    amounts.into_iter().fold(0, i64::saturating_add)
}

impl UnitName {
    /// All units in display order.
    pub const ALL: [UnitName; 6] = [
        UnitName::Car,
        UnitName::RisSharif1,
        UnitName::RisSharif2,
        UnitName::Auto,
        UnitName::RisRoman1,
        UnitName::RisRoman2,
    ];
}

/// Income and cost booked against one unit on one day.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct UnitEntry {
    #[serde(default)]
    pub income: i64,
    #[serde(default)]
    pub cost: i64,
}

impl UnitEntry {
    pub fn new(income: i64, cost: i64) -> Self {
        Self { income, cost }
    }

    pub fn is_zero(&self) -> bool {
        self.income == 0 && self.cost == 0
    }
}

/// One grocery line item.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BazarItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cost: i64,
}

impl BazarItem {
    /// Creates an item with a freshly generated id.
    pub fn new(name: impl Into<String>, cost: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            cost,
        }
    }
}

/// The ledger record for one date.
///
/// Entries are never edited in place. Editing marks the old record `is_history` and appends a new
/// record whose `parent_id` points at the first record of the chain.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntry {
    pub id: String,
    pub date: String,
    #[serde(default)]
    pub units: BTreeMap<UnitName, UnitEntry>,
    #[serde(default)]
    pub bazar_items: Vec<BazarItem>,
    #[serde(default)]
    pub bazar_costs: i64,
    #[serde(default)]
    pub total_income: i64,
    #[serde(default)]
    pub total_vehicle_cost: i64,
    #[serde(default)]
    pub available_balance: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_history: Option<bool>,
    #[serde(default)]
    pub updated_at: i64,
}

impl DailyEntry {
    /// Builds a new entry with a fresh id and its derived totals computed. Units missing from
    /// `units` are recorded as zero.
    pub fn new(
        date: impl Into<String>,
        units: BTreeMap<UnitName, UnitEntry>,
        bazar_items: Vec<BazarItem>,
        updated_at: i64,
    ) -> Result<Self> {
        let date = date.into();
        dates::parse_date(&date)?;
        for (unit, entry) in &units {
            ensure!(
                entry.income >= 0 && entry.cost >= 0,
                "Income and cost for {unit} must not be negative"
            );
            ensure!(
                entry.income <= MAX_AMOUNT && entry.cost <= MAX_AMOUNT,
                "Income and cost for {unit} must not exceed {MAX_AMOUNT}"
            );
        }
        for item in &bazar_items {
            ensure!(
                item.cost >= 0,
                "Bazar item '{}' must not have a negative cost",
                item.name
            );
            ensure!(
                item.cost <= MAX_AMOUNT,
                "Bazar item '{}' must not cost more than {MAX_AMOUNT}",
                item.name
            );
            if item.name.trim().is_empty() {
                bail!("Bazar items need a name");
            }
        }

        let mut all_units = blank_units();
        all_units.extend(units);

        let mut entry = Self {
            id: Uuid::new_v4().to_string(),
            date,
            units: all_units,
            bazar_items,
            bazar_costs: 0,
            total_income: 0,
            total_vehicle_cost: 0,
            available_balance: 0,
            parent_id: None,
            is_history: None,
            updated_at,
        };
        entry.recompute_totals();
        Ok(entry)
    }

    /// Recomputes `bazar_costs`, `total_income`, `total_vehicle_cost` and `available_balance`
    /// from the unit and bazar data.
    pub fn recompute_totals(&mut self) {
        self.bazar_costs = sum_amounts(self.bazar_items.iter().map(|i| i.cost));
        self.total_income = sum_amounts(self.units.values().map(|u| u.income));
        self.total_vehicle_cost = sum_amounts(self.units.values().map(|u| u.cost));
        self.available_balance = self.total_income.saturating_sub(self.total_cost());
    }

    /// Returns `true` if this entry has been superseded by a newer version.
    pub fn is_history(&self) -> bool {
        self.is_history.unwrap_or(false)
    }

    /// The id of the first entry in this entry's version chain.
    pub fn chain_root(&self) -> &str {
        self.parent_id.as_deref().unwrap_or(&self.id)
    }

    /// The figures for `unit`, zero if the unit was not recorded.
    pub fn unit(&self, unit: UnitName) -> UnitEntry {
        self.units.get(&unit).copied().unwrap_or_default()
    }

    /// Total of vehicle costs and bazar costs.
    pub fn total_cost(&self) -> i64 {
        self.total_vehicle_cost.saturating_add(self.bazar_costs)
    }
}

/// A map with every unit set to zero.
pub fn blank_units() -> BTreeMap<UnitName, UnitEntry> {
    UnitName::ALL
        .iter()
        .map(|u| (*u, UnitEntry::default()))
        .collect()
}

/// A `unit=income:cost` value given on the command line, e.g. `car=1500:200`. The cost part is
/// optional.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct UnitAmount {
    pub unit: UnitName,
    pub entry: UnitEntry,
}

impl FromStr for UnitAmount {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, amounts) = s
            .rsplit_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected UNIT=INCOME[:COST], got '{s}'"))?;
        let unit = UnitName::from_str(name.trim())
            .map_err(|_| anyhow::anyhow!("Unknown unit '{}'", name.trim()))?;
        let (income, cost) = match amounts.split_once(':') {
            Some((income, cost)) => (parse_amount(income)?, parse_amount(cost)?),
            None => (parse_amount(amounts)?, 0),
        };
        Ok(Self {
            unit,
            entry: UnitEntry::new(income, cost),
        })
    }
}

/// A `name=cost` bazar item given on the command line, e.g. `rice=450`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BazarAmount {
    pub name: String,
    pub cost: i64,
}

impl FromStr for BazarAmount {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, cost) = s
            .rsplit_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected NAME=COST, got '{s}'"))?;
        let name = name.trim();
        ensure!(!name.is_empty(), "Bazar items need a name");
        Ok(Self {
            name: name.to_string(),
            cost: parse_amount(cost)?,
        })
    }
}

/// Amounts are whole taka. Blank means zero.
fn parse_amount(s: &str) -> Result<i64> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0);
    }
    let value: i64 = s
        .parse()
        .map_err(|_| anyhow::anyhow!("'{s}' is not a whole number"))?;
    ensure!(value >= 0, "Amounts must not be negative, got {value}");
    ensure!(
        value <= MAX_AMOUNT,
        "Amounts must not exceed {MAX_AMOUNT}, got {value}"
    );
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_computes_totals() {
        let mut units = BTreeMap::new();
        units.insert(UnitName::Car, UnitEntry::new(1500, 200));
        units.insert(UnitName::RisRoman1, UnitEntry::new(700, 50));
        let items = vec![BazarItem::new("Rice", 450), BazarItem::new("Fish", 300)];

        let entry = DailyEntry::new("2025-05-02", units, items, 42).unwrap();

        assert_eq!(entry.units.len(), 6);
        assert_eq!(entry.unit(UnitName::Auto), UnitEntry::default());
        assert_eq!(entry.total_income, 2200);
        assert_eq!(entry.total_vehicle_cost, 250);
        assert_eq!(entry.bazar_costs, 750);
        assert_eq!(entry.available_balance, 2200 - (250 + 750));
        assert_eq!(entry.total_cost(), 1000);
        assert_eq!(entry.updated_at, 42);
        assert!(!entry.is_history());
        assert_eq!(entry.chain_root(), entry.id);
    }

    #[test]
    fn test_new_entry_rejects_bad_input() {
        assert!(DailyEntry::new("2025-02-30", BTreeMap::new(), vec![], 0).is_err());

        let mut units = BTreeMap::new();
        units.insert(UnitName::Car, UnitEntry::new(-1, 0));
        assert!(DailyEntry::new("2025-02-01", units, vec![], 0).is_err());

        let items = vec![BazarItem::new("  ", 10)];
        assert!(DailyEntry::new("2025-02-01", BTreeMap::new(), items, 0).is_err());
    }

    #[test]
    fn test_wire_format() {
        let entry = DailyEntry::new("2025-05-02", BTreeMap::new(), vec![], 7).unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("bazarItems").is_some());
        assert!(json.get("availableBalance").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("parentId").is_none());
        assert!(json.get("isHistory").is_none());
        assert!(json["units"].get("Ris - Sharif-1").is_some());
    }

    #[test]
    fn test_deserialize_legacy_entry() {
        // Older devices wrote entries without the version fields.
        let json = r#"{
            "id": "abc",
            "date": "2024-12-01",
            "units": {"Car": {"income": 900, "cost": 100}},
            "bazarItems": [{"id": "b1", "name": "Oil", "cost": 250}],
            "bazarCosts": 250,
            "totalIncome": 900,
            "totalVehicleCost": 100,
            "availableBalance": 550
        }"#;
        let entry: DailyEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.updated_at, 0);
        assert_eq!(entry.parent_id, None);
        assert!(!entry.is_history());
        assert_eq!(entry.unit(UnitName::Car).income, 900);
    }

    #[test]
    fn test_unit_name_strings() {
        assert_eq!(UnitName::RisSharif2.to_string(), "Ris - Sharif-2");
        assert_eq!(
            UnitName::from_str("Ris - Roman-1").unwrap(),
            UnitName::RisRoman1
        );
        assert_eq!(UnitName::from_str("roman-2").unwrap(), UnitName::RisRoman2);
        assert!(UnitName::from_str("Truck").is_err());
    }

    #[test]
    fn test_unit_amount_parse() {
        let a = UnitAmount::from_str("car=1500:200").unwrap();
        assert_eq!(a.unit, UnitName::Car);
        assert_eq!(a.entry, UnitEntry::new(1500, 200));

        let a = UnitAmount::from_str("Ris - Sharif-1=800").unwrap();
        assert_eq!(a.unit, UnitName::RisSharif1);
        assert_eq!(a.entry, UnitEntry::new(800, 0));

        let a = UnitAmount::from_str("auto=:60").unwrap();
        assert_eq!(a.entry, UnitEntry::new(0, 60));

        assert!(UnitAmount::from_str("car").is_err());
        assert!(UnitAmount::from_str("car=12.5").is_err());
        assert!(UnitAmount::from_str("car=-3").is_err());
        assert!(UnitAmount::from_str("bus=10").is_err());
        assert!(UnitAmount::from_str("car=9223372036854775807").is_err());
        assert!(UnitAmount::from_str("car=1000000000001").is_err());
        assert!(BazarAmount::from_str("rice=1000000000001").is_err());
        let a = UnitAmount::from_str("car=1000000000000:1000000000000").unwrap();
        assert_eq!(a.entry, UnitEntry::new(MAX_AMOUNT, MAX_AMOUNT));
    }

    #[test]
    fn test_largest_amounts_add_up() {
        let units = UnitName::ALL
            .iter()
            .map(|u| (*u, UnitEntry::new(MAX_AMOUNT, MAX_AMOUNT)))
            .collect();
        let items = vec![BazarItem::new("Rice", MAX_AMOUNT)];
        let entry = DailyEntry::new("2025-05-02", units, items, 1).unwrap();
        assert_eq!(entry.total_income, 6 * MAX_AMOUNT);
        assert_eq!(entry.total_cost(), 7 * MAX_AMOUNT);
        assert_eq!(entry.available_balance, -MAX_AMOUNT);

        let mut units = BTreeMap::new();
        units.insert(UnitName::Car, UnitEntry::new(MAX_AMOUNT + 1, 0));
        assert!(DailyEntry::new("2025-05-02", units, vec![], 1).is_err());
    }

    #[test]
    fn test_totals_of_unchecked_entries_saturate() {
        let mut entry = DailyEntry::new("2025-05-02", BTreeMap::new(), vec![], 1).unwrap();
        entry.units.insert(UnitName::Car, UnitEntry::new(i64::MAX, i64::MAX));
        entry.units.insert(UnitName::Auto, UnitEntry::new(1, 1));
        entry.bazar_items = vec![BazarItem::new("Rice", i64::MAX)];
        entry.recompute_totals();
        assert_eq!(entry.total_income, i64::MAX);
        assert_eq!(entry.total_cost(), i64::MAX);
        assert_eq!(entry.available_balance, 0);
    }

    #[test]
    fn test_bazar_amount_parse() {
        let b = BazarAmount::from_str("Mustard oil=320").unwrap();
        assert_eq!(b.name, "Mustard oil");
        assert_eq!(b.cost, 320);
        assert!(BazarAmount::from_str("=320").is_err());
        assert!(BazarAmount::from_str("rice").is_err());
    }
}
