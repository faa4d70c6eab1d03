//! Row-level operations over the spreadsheet tables.
//!
//! Every function loads the whole worksheet, scans it with normalized keys
//! and writes it back when something changed.

pub mod appointments;
pub mod finance;
pub mod masters;
pub mod services;
pub mod subscriptions;
pub mod users;
