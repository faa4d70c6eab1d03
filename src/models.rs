use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::sheets::{
    field, field_i64, field_number, field_or_default, format_amount, normalize_id, record,
    Record, Row,
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn field_date(record: &Record, key: &str) -> Option<NaiveDate> {
    field(record, key).and_then(|v| parse_date(&v))
}

fn field_count(record: &Record, key: &str) -> u32 {
    field_number(record, key).max(0.0) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Admin,
    Owner,
}

impl Role {
    pub fn parse(raw: &str) -> Role {
        match raw.trim().to_lowercase().as_str() {
            "admin" => Role::Admin,
            "owner" | "ceo" => Role::Owner,
            _ => Role::Client,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Owner)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

impl User {
    /// "@name" when a username is known, the full name otherwise
    pub fn display_name(&self) -> String {
        if self.username.is_empty() {
            self.full_name.clone()
        } else {
            format!("@{}", self.username)
        }
    }
}

impl Row for User {
    const SHEET: &'static str = "Clients";
    const HEADERS: &'static [&'static str] = &["user_id", "username", "full_name", "role"];

    fn from_record(record: &Record) -> Option<Self> {
        Some(User {
            user_id: field_i64(record, "user_id")?,
            username: field_or_default(record, "username"),
            full_name: field_or_default(record, "full_name"),
            role: Role::parse(&field_or_default(record, "role")),
        })
    }

    fn to_record(&self) -> Record {
        record([
            ("user_id", self.user_id.to_string()),
            ("username", self.username.clone()),
            ("full_name", self.full_name.clone()),
            ("role", self.role.as_str().to_string()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: String,
    pub name: String,
}

impl Row for Category {
    const SHEET: &'static str = "Categories";
    const HEADERS: &'static [&'static str] = &["id", "name"];

    fn from_record(record: &Record) -> Option<Self> {
        Some(Category {
            id: normalize_id(&field(record, "id")?),
            name: field_or_default(record, "name"),
        })
    }

    fn to_record(&self) -> Record {
        record([("id", self.id.clone()), ("name", self.name.clone())])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    /// Minutes
    pub duration: u32,
    pub category_id: Option<String>,
}

impl Row for Service {
    const SHEET: &'static str = "Services";
    const HEADERS: &'static [&'static str] =
        &["id", "name", "description", "price", "duration", "category_id"];

    fn from_record(record: &Record) -> Option<Self> {
        Some(Service {
            id: normalize_id(&field(record, "id")?),
            name: field_or_default(record, "name"),
            description: field_or_default(record, "description"),
            price: field_number(record, "price"),
            duration: field_count(record, "duration"),
            category_id: field(record, "category_id").map(|v| normalize_id(&v)),
        })
    }

    fn to_record(&self) -> Record {
        record([
            ("id", self.id.clone()),
            ("name", self.name.clone()),
            ("description", self.description.clone()),
            ("price", format_amount(self.price)),
            ("duration", self.duration.to_string()),
            ("category_id", self.category_id.clone().unwrap_or_default()),
        ])
    }
}

/// Special offer shown next to the regular price list.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub duration: u32,
}

impl Row for Offer {
    const SHEET: &'static str = "Offers";
    const HEADERS: &'static [&'static str] = &["id", "name", "description", "price", "duration"];

    fn from_record(record: &Record) -> Option<Self> {
        Some(Offer {
            id: normalize_id(&field(record, "id")?),
            name: field_or_default(record, "name"),
            description: field_or_default(record, "description"),
            price: field_number(record, "price"),
            duration: field_count(record, "duration"),
        })
    }

    fn to_record(&self) -> Record {
        record([
            ("id", self.id.clone()),
            ("name", self.name.clone()),
            ("description", self.description.clone()),
            ("price", format_amount(self.price)),
            ("duration", self.duration.to_string()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceTemplate {
    pub category_name: String,
    pub service_name: String,
    pub description: String,
    pub default_duration: u32,
}

impl Row for ServiceTemplate {
    const SHEET: &'static str = "ServiceTemplates";
    const HEADERS: &'static [&'static str] =
        &["category_name", "service_name", "description", "default_duration"];

    fn from_record(record: &Record) -> Option<Self> {
        Some(ServiceTemplate {
            category_name: field(record, "category_name")?,
            service_name: field(record, "service_name")?,
            description: field_or_default(record, "description"),
            default_duration: field_count(record, "default_duration"),
        })
    }

    fn to_record(&self) -> Record {
        record([
            ("category_name", self.category_name.clone()),
            ("service_name", self.service_name.clone()),
            ("description", self.description.clone()),
            ("default_duration", self.default_duration.to_string()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub start: String,
    pub end: String,
}

/// ISO weekday ("1" = Monday .. "7" = Sunday) to working interval.
pub type WorkingHours = BTreeMap<String, DayHours>;

/// Same interval on every day of the week.
pub fn uniform_working_hours(start: &str, end: &str) -> WorkingHours {
    (1..=7)
        .map(|day| {
            (
                day.to_string(),
                DayHours {
                    start: start.to_string(),
                    end: end.to_string(),
                },
            )
        })
        .collect()
}

pub fn default_working_hours() -> WorkingHours {
    uniform_working_hours("10:00", "19:00")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Master {
    pub id: String,
    pub name: String,
    pub telegram_id: Option<i64>,
    /// Telegram username without "@"
    pub telegram: String,
    pub phone: String,
    pub address: String,
    pub location: String,
    pub description: String,
    pub working_hours: WorkingHours,
    /// Service ids; empty means every service
    pub services: Vec<String>,
}

impl Master {
    pub fn new(id: String, name: String) -> Self {
        Master {
            id,
            name,
            telegram_id: None,
            telegram: String::new(),
            phone: String::new(),
            address: String::new(),
            location: String::new(),
            description: String::new(),
            working_hours: default_working_hours(),
            services: Vec::new(),
        }
    }
}

impl Row for Master {
    const SHEET: &'static str = "Masters";
    const HEADERS: &'static [&'static str] = &[
        "id",
        "name",
        "telegram_id",
        "telegram",
        "phone",
        "address",
        "location",
        "description",
        "working_hours",
        "services",
    ];

    fn from_record(record: &Record) -> Option<Self> {
        let id = normalize_id(&field(record, "id")?);
        // Broken JSON rejects the whole row so the cell is written back untouched.
        let working_hours = match field(record, "working_hours") {
            None => default_working_hours(),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(hours) => hours,
                Err(e) => {
                    warn!("Master {} has unreadable working hours: {}", id, e);
                    return None;
                }
            },
        };
        let services = match field(record, "services") {
            None => Vec::new(),
            Some(raw) => match parse_id_array(&raw) {
                Some(ids) => ids,
                None => {
                    warn!("Master {} has an unreadable service list", id);
                    return None;
                }
            },
        };

        Some(Master {
            name: field_or_default(record, "name"),
            telegram_id: field_i64(record, "telegram_id"),
            telegram: field_or_default(record, "telegram")
                .trim_start_matches('@')
                .to_string(),
            phone: field_or_default(record, "phone"),
            address: field_or_default(record, "address"),
            location: field_or_default(record, "location"),
            description: field_or_default(record, "description"),
            working_hours,
            services,
            id,
        })
    }

    fn to_record(&self) -> Record {
        record([
            ("id", self.id.clone()),
            ("name", self.name.clone()),
            (
                "telegram_id",
                self.telegram_id.map(|id| id.to_string()).unwrap_or_default(),
            ),
            ("telegram", self.telegram.clone()),
            ("phone", self.phone.clone()),
            ("address", self.address.clone()),
            ("location", self.location.clone()),
            ("description", self.description.clone()),
            (
                "working_hours",
                serde_json::to_string(&self.working_hours).unwrap_or_default(),
            ),
            (
                "services",
                serde_json::to_string(&self.services).unwrap_or_default(),
            ),
        ])
    }
}

/// Service lists are stored as a JSON array of ids; numbers and strings are both accepted.
fn parse_id_array(raw: &str) -> Option<Vec<String>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(raw).ok()?;
    Some(
        values
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => normalize_id(s),
                other => normalize_id(&other.to_string()),
            })
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Paid,
    Canceled,
}

impl AppointmentStatus {
    pub fn parse(raw: &str) -> AppointmentStatus {
        match raw.trim().to_lowercase().as_str() {
            "confirmed" => AppointmentStatus::Confirmed,
            "completed" => AppointmentStatus::Completed,
            "paid" => AppointmentStatus::Paid,
            "canceled" | "cancelled" => AppointmentStatus::Canceled,
            _ => AppointmentStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Paid => "paid",
            AppointmentStatus::Canceled => "canceled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "⏳ Ожидает подтверждения",
            AppointmentStatus::Confirmed => "✅ Подтверждена",
            AppointmentStatus::Completed => "✔️ Выполнена",
            AppointmentStatus::Paid => "💰 Оплачена",
            AppointmentStatus::Canceled => "❌ Отменена",
        }
    }

    /// Still expected to happen
    pub fn is_open(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub user_id: i64,
    pub service_id: String,
    pub master_id: String,
    pub date: NaiveDate,
    /// "HH:MM"
    pub time: String,
    pub status: AppointmentStatus,
    pub payment_method: String,
}

impl Row for Appointment {
    const SHEET: &'static str = "Appointments";
    const HEADERS: &'static [&'static str] = &[
        "id",
        "user_id",
        "service_id",
        "master_id",
        "date",
        "time",
        "status",
        "payment_method",
    ];

    fn from_record(record: &Record) -> Option<Self> {
        Some(Appointment {
            id: normalize_id(&field(record, "id")?),
            user_id: field_i64(record, "user_id")?,
            service_id: normalize_id(&field_or_default(record, "service_id")),
            master_id: normalize_id(&field_or_default(record, "master_id")),
            date: field_date(record, "date")?,
            time: field_or_default(record, "time"),
            status: AppointmentStatus::parse(&field_or_default(record, "status")),
            payment_method: field_or_default(record, "payment_method"),
        })
    }

    fn to_record(&self) -> Record {
        record([
            ("id", self.id.clone()),
            ("user_id", self.user_id.to_string()),
            ("service_id", self.service_id.clone()),
            ("master_id", self.master_id.clone()),
            ("date", format_date(self.date)),
            ("time", self.time.clone()),
            ("status", self.status.as_str().to_string()),
            ("payment_method", self.payment_method.clone()),
        ])
    }
}

/// Clients whose bookings skip manual confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedUser {
    pub user_id: i64,
}

impl Row for VerifiedUser {
    const SHEET: &'static str = "VerifiedUsers";
    const HEADERS: &'static [&'static str] = &["user_id"];

    fn from_record(record: &Record) -> Option<Self> {
        Some(VerifiedUser {
            user_id: field_i64(record, "user_id")?,
        })
    }

    fn to_record(&self) -> Record {
        record([("user_id", self.user_id.to_string())])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub user_id: i64,
    pub service_id: String,
    pub date: String,
    pub time: String,
    pub amount: f64,
}

impl Row for HistoryEntry {
    const SHEET: &'static str = "History";
    const HEADERS: &'static [&'static str] =
        &["timestamp", "user_id", "service_id", "date", "time", "amount"];

    fn from_record(record: &Record) -> Option<Self> {
        Some(HistoryEntry {
            timestamp: field_or_default(record, "timestamp"),
            user_id: field_i64(record, "user_id")?,
            service_id: normalize_id(&field_or_default(record, "service_id")),
            date: field_or_default(record, "date"),
            time: field_or_default(record, "time"),
            amount: field_number(record, "amount"),
        })
    }

    fn to_record(&self) -> Record {
        record([
            ("timestamp", self.timestamp.clone()),
            ("user_id", self.user_id.to_string()),
            ("service_id", self.service_id.clone()),
            ("date", self.date.clone()),
            ("time", self.time.clone()),
            ("amount", format_amount(self.amount)),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub user_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub trial: bool,
    pub referrer_id: Option<i64>,
}

impl Row for Subscription {
    const SHEET: &'static str = "Subscriptions";
    const HEADERS: &'static [&'static str] =
        &["user_id", "start_date", "end_date", "trial", "referrer_id"];

    fn from_record(record: &Record) -> Option<Self> {
        let end_date = field_date(record, "end_date")?;
        Some(Subscription {
            user_id: field_i64(record, "user_id")?,
            start_date: field_date(record, "start_date").unwrap_or(end_date),
            end_date,
            trial: matches!(
                field_or_default(record, "trial").to_lowercase().as_str(),
                "yes" | "true" | "1"
            ),
            referrer_id: field_i64(record, "referrer_id"),
        })
    }

    fn to_record(&self) -> Record {
        record([
            ("user_id", self.user_id.to_string()),
            ("start_date", format_date(self.start_date)),
            ("end_date", format_date(self.end_date)),
            ("trial", if self.trial { "yes" } else { "no" }.to_string()),
            (
                "referrer_id",
                self.referrer_id.map(|id| id.to_string()).unwrap_or_default(),
            ),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceCosts {
    pub service_id: String,
    pub materials_cost: f64,
    pub time_cost: f64,
    pub other_costs: f64,
    pub last_updated: String,
}

impl ServiceCosts {
    pub fn total(&self) -> f64 {
        self.materials_cost + self.time_cost + self.other_costs
    }
}

impl Row for ServiceCosts {
    const SHEET: &'static str = "ServiceCosts";
    const HEADERS: &'static [&'static str] =
        &["service_id", "materials_cost", "time_cost", "other_costs", "last_updated"];

    fn from_record(record: &Record) -> Option<Self> {
        Some(ServiceCosts {
            service_id: normalize_id(&field(record, "service_id")?),
            materials_cost: field_number(record, "materials_cost"),
            time_cost: field_number(record, "time_cost"),
            other_costs: field_number(record, "other_costs"),
            last_updated: field_or_default(record, "last_updated"),
        })
    }

    fn to_record(&self) -> Record {
        record([
            ("service_id", self.service_id.clone()),
            ("materials_cost", format_amount(self.materials_cost)),
            ("time_cost", format_amount(self.time_cost)),
            ("other_costs", format_amount(self.other_costs)),
            ("last_updated", self.last_updated.clone()),
        ])
    }
}

/// One admin's totals for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAnalytics {
    pub admin_id: i64,
    pub date: NaiveDate,
    pub total_income: f64,
    pub total_expenses: f64,
    pub profit: f64,
    pub appointments_count: u32,
}

impl Row for DailyAnalytics {
    const SHEET: &'static str = "FinanceAnalytics";
    const HEADERS: &'static [&'static str] = &[
        "admin_id",
        "date",
        "total_income",
        "total_expenses",
        "profit",
        "appointments_count",
    ];

    fn from_record(record: &Record) -> Option<Self> {
        Some(DailyAnalytics {
            admin_id: field_i64(record, "admin_id")?,
            date: field_date(record, "date")?,
            total_income: field_number(record, "total_income"),
            total_expenses: field_number(record, "total_expenses"),
            profit: field_number(record, "profit"),
            appointments_count: field_count(record, "appointments_count"),
        })
    }

    fn to_record(&self) -> Record {
        record([
            ("admin_id", self.admin_id.to_string()),
            ("date", format_date(self.date)),
            ("total_income", format_amount(self.total_income)),
            ("total_expenses", format_amount(self.total_expenses)),
            ("profit", format_amount(self.profit)),
            ("appointments_count", self.appointments_count.to_string()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientStats {
    pub client_id: i64,
    pub total_visits: u32,
    pub total_spent: f64,
    pub last_visit: Option<NaiveDate>,
    pub favorite_service: String,
    pub vip_status: bool,
    pub notes: String,
}

impl ClientStats {
    pub fn empty(client_id: i64) -> Self {
        ClientStats {
            client_id,
            total_visits: 0,
            total_spent: 0.0,
            last_visit: None,
            favorite_service: String::new(),
            vip_status: false,
            notes: String::new(),
        }
    }
}

impl Row for ClientStats {
    const SHEET: &'static str = "ClientStats";
    const HEADERS: &'static [&'static str] = &[
        "client_id",
        "total_visits",
        "total_spent",
        "last_visit",
        "favorite_service",
        "vip_status",
        "notes",
    ];

    fn from_record(record: &Record) -> Option<Self> {
        Some(ClientStats {
            client_id: field_i64(record, "client_id")?,
            total_visits: field_count(record, "total_visits"),
            total_spent: field_number(record, "total_spent"),
            last_visit: field_date(record, "last_visit"),
            favorite_service: field_or_default(record, "favorite_service"),
            vip_status: matches!(
                field_or_default(record, "vip_status").to_lowercase().as_str(),
                "yes" | "true" | "1"
            ),
            notes: field_or_default(record, "notes"),
        })
    }

    fn to_record(&self) -> Record {
        record([
            ("client_id", self.client_id.to_string()),
            ("total_visits", self.total_visits.to_string()),
            ("total_spent", format_amount(self.total_spent)),
            (
                "last_visit",
                self.last_visit.map(format_date).unwrap_or_default(),
            ),
            ("favorite_service", self.favorite_service.clone()),
            ("vip_status", if self.vip_status { "yes" } else { "no" }.to_string()),
            ("notes", self.notes.clone()),
        ])
    }
}

/// Monthly cost profile entered through the setup wizard.
#[derive(Debug, Clone, PartialEq)]
pub struct FinanceSettings {
    pub admin_id: i64,
    pub materials_cost: f64,
    pub rent_cost: f64,
    pub salary_percent: f64,
    pub other_costs: f64,
    pub updated: String,
}

impl Row for FinanceSettings {
    const SHEET: &'static str = "FinanceSettings";
    const HEADERS: &'static [&'static str] = &[
        "admin_id",
        "materials_cost",
        "rent_cost",
        "salary_percent",
        "other_costs",
        "updated",
    ];

    fn from_record(record: &Record) -> Option<Self> {
        Some(FinanceSettings {
            admin_id: field_i64(record, "admin_id")?,
            materials_cost: field_number(record, "materials_cost"),
            rent_cost: field_number(record, "rent_cost"),
            salary_percent: field_number(record, "salary_percent"),
            other_costs: field_number(record, "other_costs"),
            updated: field_or_default(record, "updated"),
        })
    }

    fn to_record(&self) -> Record {
        record([
            ("admin_id", self.admin_id.to_string()),
            ("materials_cost", format_amount(self.materials_cost)),
            ("rent_cost", format_amount(self.rent_cost)),
            ("salary_percent", format_amount(self.salary_percent)),
            ("other_costs", format_amount(self.other_costs)),
            ("updated", self.updated.clone()),
        ])
    }
}

/// Every worksheet the bot needs, with its header row.
pub const TABLES: &[(&str, &[&str])] = &[
    (User::SHEET, User::HEADERS),
    (Category::SHEET, Category::HEADERS),
    (Service::SHEET, Service::HEADERS),
    (Offer::SHEET, Offer::HEADERS),
    (ServiceTemplate::SHEET, ServiceTemplate::HEADERS),
    (Master::SHEET, Master::HEADERS),
    (Appointment::SHEET, Appointment::HEADERS),
    (VerifiedUser::SHEET, VerifiedUser::HEADERS),
    (HistoryEntry::SHEET, HistoryEntry::HEADERS),
    (Subscription::SHEET, Subscription::HEADERS),
    (ServiceCosts::SHEET, ServiceCosts::HEADERS),
    (DailyAnalytics::SHEET, DailyAnalytics::HEADERS),
    (ClientStats::SHEET, ClientStats::HEADERS),
    (FinanceSettings::SHEET, FinanceSettings::HEADERS),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_reads_ceo_as_owner() {
        assert_eq!(Role::parse("CEO"), Role::Owner);
        assert_eq!(Role::parse(" admin "), Role::Admin);
        assert_eq!(Role::parse(""), Role::Client);
        assert!(Role::Owner.is_staff());
        assert!(!Role::Client.is_staff());
    }

    #[test]
    fn test_status_accepts_both_spellings() {
        assert_eq!(AppointmentStatus::parse("cancelled"), AppointmentStatus::Canceled);
        assert_eq!(AppointmentStatus::parse("canceled"), AppointmentStatus::Canceled);
        assert_eq!(AppointmentStatus::parse("PAID"), AppointmentStatus::Paid);
        assert!(AppointmentStatus::Pending.is_open());
        assert!(!AppointmentStatus::Completed.is_open());
    }

    #[test]
    fn test_master_defaults_when_cells_blank() {
        let rec = record([("id", "3.0".to_string()), ("name", "Olga".to_string())]);
        let master = Master::from_record(&rec).unwrap();
        assert_eq!(master.id, "3");
        assert_eq!(master.working_hours, default_working_hours());
        assert!(master.services.is_empty());
    }

    #[test]
    fn test_master_services_accept_numbers_and_strings() {
        let rec = record([
            ("id", "1".to_string()),
            ("services", r#"[1, "2", 3.0]"#.to_string()),
            ("working_hours", r#"{"1":{"start":"09:00","end":"12:00"}}"#.to_string()),
            ("telegram", "@olga".to_string()),
        ]);
        let master = Master::from_record(&rec).unwrap();
        assert_eq!(master.services, vec!["1", "2", "3"]);
        assert_eq!(master.working_hours.len(), 1);
        assert_eq!(master.telegram, "olga");
    }

    #[test]
    fn test_master_with_broken_working_hours_is_rejected() {
        let rec = record([
            ("id", "2".to_string()),
            ("working_hours", "пн-пт 10-19".to_string()),
        ]);
        assert!(Master::from_record(&rec).is_none());
    }

    #[test]
    fn test_appointment_without_date_is_skipped() {
        let rec = record([
            ("id", "1".to_string()),
            ("user_id", "5".to_string()),
            ("date", "tomorrow".to_string()),
        ]);
        assert!(Appointment::from_record(&rec).is_none());
    }

    #[test]
    fn test_subscription_record_round_trip_keeps_trial_flag() {
        let sub = Subscription {
            user_id: 9,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            trial: true,
            referrer_id: None,
        };
        let rec = sub.to_record();
        assert_eq!(rec["trial"], "yes");
        assert_eq!(Subscription::from_record(&rec), Some(sub));
    }
}
