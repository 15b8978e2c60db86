//! Types that represent the core data model, such as `DailyEntry` and `AuthUser`.
mod entry;
mod snapshot;
mod user;

pub(crate) use entry::sum_amounts;
pub use entry::{
    blank_units, BazarAmount, BazarItem, DailyEntry, UnitAmount, UnitEntry, UnitName, MAX_AMOUNT,
};
pub use snapshot::RemoteSnapshot;
pub use user::AuthUser;
