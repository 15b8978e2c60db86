//! Add, edit and delete command handlers.
//!
//! Each handler changes the local entries, saves them, and then pushes the whole ledger to the
//! shared record when `auto_push` is on.

use crate::args::{DeleteArgs, EditArgs, EntryArgs};
use crate::commands::{load_ledger, push_change, require_user, Out};
use crate::model::{BazarItem, DailyEntry, UnitEntry, UnitName};
use crate::remote::Mode;
use crate::{dates, utils, Config, Result};
use anyhow::Context;
use std::collections::BTreeMap;

fn unit_amounts(args: &EntryArgs) -> BTreeMap<UnitName, UnitEntry> {
    args.units().iter().map(|u| (u.unit, u.entry)).collect()
}

fn bazar_items(args: &EntryArgs) -> Vec<BazarItem> {
    args.bazar()
        .iter()
        .map(|b| BazarItem::new(b.name.clone(), b.cost))
        .collect()
}

/// Handles `ledger add`. The date defaults to today in Dhaka; units that are not given are
/// recorded as zero.
pub async fn add(config: Config, mode: Mode, args: &EntryArgs) -> Result<Out<DailyEntry>> {
    let user = require_user(&config).await?;
    let date = args
        .date()
        .map(str::to_string)
        .unwrap_or_else(dates::today_string);
    let entry = DailyEntry::new(
        date,
        unit_amounts(args),
        bazar_items(args),
        utils::now_millis(),
    )?;

    let mut ledger = load_ledger(&config).await?;
    ledger.add(entry.clone());
    config.db().save_entries(ledger.entries()).await?;

    let pushed = push_change(&config, mode, &user).await;
    Ok(Out::new(
        format!("Added entry {} for {}. {pushed}", entry.id, entry.date),
        entry,
    ))
}

/// Handles `ledger edit`. The replacement starts as a copy of the entry being edited with the
/// given values applied on top, and the old version is kept as history.
pub async fn edit(config: Config, mode: Mode, args: &EditArgs) -> Result<Out<DailyEntry>> {
    let user = require_user(&config).await?;
    let mut ledger = load_ledger(&config).await?;
    let target = ledger
        .get(args.id())
        .with_context(|| format!("No entry with id '{}'", args.id()))?
        .clone();

    let values = args.entry();
    let date = values.date().unwrap_or(&target.date).to_string();
    let mut units = target.units.clone();
    units.extend(unit_amounts(values));
    let bazar = if args.clear_bazar() {
        Vec::new()
    } else if values.bazar().is_empty() {
        target.bazar_items.clone()
    } else {
        bazar_items(values)
    };
    let replacement = DailyEntry::new(date, units, bazar, utils::now_millis())?;

    let stored = ledger.edit(args.id(), replacement)?.clone();
    config.db().save_entries(ledger.entries()).await?;

    let pushed = push_change(&config, mode, &user).await;
    Ok(Out::new(
        format!(
            "Replaced entry {} with {} for {}. {pushed}",
            target.id, stored.id, stored.date
        ),
        stored,
    ))
}

/// Handles `ledger delete`. Only the named entry is removed; other versions in its history stay.
pub async fn delete(config: Config, mode: Mode, args: &DeleteArgs) -> Result<Out<DailyEntry>> {
    let user = require_user(&config).await?;
    let mut ledger = load_ledger(&config).await?;
    let removed = ledger.delete(args.id())?;
    config.db().save_entries(ledger.entries()).await?;

    let pushed = push_change(&config, mode, &user).await;
    Ok(Out::new(
        format!("Deleted entry {} for {}. {pushed}", removed.id, removed.date),
        removed,
    ))
}
