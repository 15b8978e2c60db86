//! fleet-ledger: a family ledger of vehicle income, vehicle costs and bazar spending that keeps
//! devices in step through a shared record on a public key-value store.

pub mod args;
pub mod backup;
pub mod commands;
mod config;
pub mod dates;
mod db;
mod error;
mod ledger;
pub mod model;
pub mod remote;
pub mod report;
pub mod sync;
pub mod token;
mod utils;


pub use config::{Config, InitSettings};
pub use error::Error;
pub use error::Result;
pub use ledger::Ledger;
pub use remote::Mode;
