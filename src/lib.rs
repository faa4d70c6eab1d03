//! Telegram bot for a beauty salon: clients book appointments, admins run the
//! catalogue, masters and finances, the owner manages admins. All data lives in
//! a Google Spreadsheet.

#[macro_use]
extern crate log;

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod keyboards;
pub mod models;
pub mod reminders;
pub mod repo;
pub mod roles;
pub mod session;
pub mod sheets;
pub mod telegram;
