use chrono::{Datelike, Duration, NaiveDate};
use std::collections::HashMap;

use crate::db::Db;
use crate::error::Result;
use crate::models::{
    AppointmentStatus, ClientStats, DailyAnalytics, FinanceSettings, Service, ServiceCosts,
};
use crate::repo::{appointments, services, users};
use crate::sheets::{format_amount, same_id};

pub const VIP_VISITS: u32 = 10;
pub const VIP_SPENT: f64 = 15000.0;

/// Assumptions of the setup wizard
pub const SETUP_AVERAGE_PRICE: f64 = 1500.0;
pub const SETUP_WORKING_DAYS: f64 = 22.0;
pub const SETUP_SERVICES_PER_DAY: f64 = 8.0;

pub const WEEKDAYS: [&str; 7] = [
    "Понедельник",
    "Вторник",
    "Среда",
    "Четверг",
    "Пятница",
    "Суббота",
    "Воскресенье",
];

pub const MONTHS: [&str; 12] = [
    "Январь", "Февраль", "Март", "Апрель", "Май", "Июнь", "Июль", "Август", "Сентябрь",
    "Октябрь", "Ноябрь", "Декабрь",
];

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceProfit {
    pub service_id: String,
    pub service_name: String,
    pub price: f64,
    pub costs: ServiceCosts,
    pub total_cost: f64,
    pub profit: f64,
    pub margin_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodAnalytics {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total_income: f64,
    pub total_expenses: f64,
    pub total_profit: f64,
    pub total_appointments: u32,
    /// Ordered by date
    pub days: Vec<DailyAnalytics>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VipClient {
    pub client_id: i64,
    pub name: String,
    pub total_visits: u32,
    pub total_spent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServicePopularity {
    pub service_id: String,
    pub name: String,
    pub appointment_count: usize,
    pub total_revenue: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn label(&self) -> &'static str {
        match self {
            Confidence::Low => "низкая",
            Confidence::Medium => "средняя",
            Confidence::High => "высокая",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub days: i64,
    pub income: f64,
    pub expenses: f64,
    pub profit: f64,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeekdayActivity {
    /// Monday first
    pub weekdays: [usize; 7],
    pub months: [usize; 12],
}

impl WeekdayActivity {
    pub fn total(&self) -> usize {
        self.weekdays.iter().sum()
    }

    pub fn busiest_weekday(&self) -> usize {
        index_of_max(&self.weekdays)
    }

    /// Monday to Friday only
    pub fn quietest_workday(&self) -> usize {
        let mut best = 0;
        for (i, count) in self.weekdays[..5].iter().enumerate() {
            if *count < self.weekdays[best] {
                best = i;
            }
        }
        best
    }

    pub fn busiest_month(&self) -> usize {
        index_of_max(&self.months)
    }
}

/// First index holding the maximum.
fn index_of_max(counts: &[usize]) -> usize {
    let mut best = 0;
    for (i, count) in counts.iter().enumerate() {
        if *count > counts[best] {
            best = i;
        }
    }
    best
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginBand {
    Low,
    Normal,
    Good,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetupReport {
    pub average_price: f64,
    pub materials_cost: f64,
    pub salary_percent: f64,
    pub salary_cost: f64,
    pub rent_per_service: f64,
    pub other_per_service: f64,
    pub profit: f64,
    pub margin_percent: f64,
    pub band: MarginBand,
}

/// Inserts or replaces the cost breakdown of a service.
pub async fn add_service_costs(db: &Db, costs: ServiceCosts) -> Result<()> {
    let mut all = db.load::<ServiceCosts>().await?;
    match all.iter_mut().find(|c| same_id(&c.service_id, &costs.service_id)) {
        Some(existing) => *existing = costs,
        None => all.push(costs),
    }
    db.save(&all).await
}

/// Zero costs when none were entered yet.
pub async fn get_service_costs(db: &Db, service_id: &str) -> Result<ServiceCosts> {
    Ok(db
        .load::<ServiceCosts>()
        .await?
        .into_iter()
        .find(|c| same_id(&c.service_id, service_id))
        .unwrap_or_else(|| ServiceCosts {
            service_id: service_id.to_string(),
            ..Default::default()
        }))
}

pub fn service_profit(service: &Service, costs: ServiceCosts) -> ServiceProfit {
    let total_cost = costs.total();
    let profit = service.price - total_cost;
    let margin_percent = if service.price > 0.0 {
        round2(profit / service.price * 100.0)
    } else {
        0.0
    };
    ServiceProfit {
        service_id: service.id.clone(),
        service_name: service.name.clone(),
        price: service.price,
        costs,
        total_cost,
        profit,
        margin_percent,
    }
}

pub async fn calculate_service_profit(db: &Db, service_id: &str) -> Result<Option<ServiceProfit>> {
    let Some(service) = services::get_service(db, service_id).await? else {
        return Ok(None);
    };
    let costs = get_service_costs(db, service_id).await?;
    Ok(Some(service_profit(&service, costs)))
}

/// Overwrites the admin's totals for the day.
pub async fn add_daily_analytics(
    db: &Db,
    admin_id: i64,
    date: NaiveDate,
    total_income: f64,
    total_expenses: f64,
    appointments_count: u32,
) -> Result<()> {
    let entry = DailyAnalytics {
        admin_id,
        date,
        total_income,
        total_expenses,
        profit: total_income - total_expenses,
        appointments_count,
    };
    let mut all = db.load::<DailyAnalytics>().await?;
    match all.iter_mut().find(|a| a.admin_id == admin_id && a.date == date) {
        Some(existing) => *existing = entry,
        None => all.push(entry),
    }
    db.save(&all).await
}

/// Adds one paid visit to the admin's totals for the day.
pub async fn record_paid_visit(
    db: &Db,
    admin_id: i64,
    date: NaiveDate,
    income: f64,
    expenses: f64,
) -> Result<()> {
    let mut all = db.load::<DailyAnalytics>().await?;
    match all.iter_mut().find(|a| a.admin_id == admin_id && a.date == date) {
        Some(day) => {
            day.total_income += income;
            day.total_expenses += expenses;
            day.profit = day.total_income - day.total_expenses;
            day.appointments_count += 1;
        }
        None => all.push(DailyAnalytics {
            admin_id,
            date,
            total_income: income,
            total_expenses: expenses,
            profit: income - expenses,
            appointments_count: 1,
        }),
    }
    db.save(&all).await
}

/// Inclusive date range for one admin.
pub async fn get_analytics_period(
    db: &Db,
    admin_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PeriodAnalytics> {
    let mut days: Vec<DailyAnalytics> = db
        .load::<DailyAnalytics>()
        .await?
        .into_iter()
        .filter(|a| a.admin_id == admin_id && a.date >= start && a.date <= end)
        .collect();
    days.sort_by_key(|a| a.date);

    Ok(PeriodAnalytics {
        start,
        end,
        total_income: days.iter().map(|d| d.total_income).sum(),
        total_expenses: days.iter().map(|d| d.total_expenses).sum(),
        total_profit: days.iter().map(|d| d.profit).sum(),
        total_appointments: days.iter().map(|d| d.appointments_count).sum(),
        days,
    })
}

/// Recomputes visits, spending and favourite service from completed and paid appointments.
pub async fn update_client_stats(db: &Db, client_id: i64, today: NaiveDate) -> Result<ClientStats> {
    let all_services = services::get_all_services(db).await?;
    let visits: Vec<_> = appointments::get_all_appointments(db)
        .await?
        .into_iter()
        .filter(|a| {
            a.user_id == client_id
                && matches!(a.status, AppointmentStatus::Completed | AppointmentStatus::Paid)
        })
        .collect();

    let mut per_service: HashMap<String, usize> = HashMap::new();
    let mut total_spent = 0.0;
    for visit in &visits {
        if let Some(service) = all_services.iter().find(|s| same_id(&s.id, &visit.service_id)) {
            *per_service.entry(service.name.clone()).or_default() += 1;
            total_spent += service.price;
        }
    }
    let mut ranking: Vec<(String, usize)> = per_service.into_iter().collect();
    ranking.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let favorite_service = ranking.into_iter().next().map(|(name, _)| name).unwrap_or_default();

    let total_visits = visits.len() as u32;
    let mut all = db.load::<ClientStats>().await?;
    let notes = all
        .iter()
        .find(|s| s.client_id == client_id)
        .map(|s| s.notes.clone())
        .unwrap_or_default();
    let stats = ClientStats {
        client_id,
        total_visits,
        total_spent,
        last_visit: Some(today),
        favorite_service,
        vip_status: total_visits > VIP_VISITS || total_spent > VIP_SPENT,
        notes,
    };
    match all.iter_mut().find(|s| s.client_id == client_id) {
        Some(existing) => *existing = stats.clone(),
        None => all.push(stats.clone()),
    }
    db.save(&all).await?;
    Ok(stats)
}

pub async fn get_client_stats(db: &Db, client_id: i64) -> Result<ClientStats> {
    Ok(db
        .load::<ClientStats>()
        .await?
        .into_iter()
        .find(|s| s.client_id == client_id)
        .unwrap_or_else(|| ClientStats::empty(client_id)))
}

pub async fn update_client_note(db: &Db, client_id: i64, note: &str) -> Result<()> {
    let mut all = db.load::<ClientStats>().await?;
    match all.iter_mut().find(|s| s.client_id == client_id) {
        Some(stats) => stats.notes = note.to_string(),
        None => {
            let mut stats = ClientStats::empty(client_id);
            stats.notes = note.to_string();
            all.push(stats);
        }
    }
    db.save(&all).await
}

pub async fn get_vip_clients(db: &Db) -> Result<Vec<VipClient>> {
    let known = users::get_all_users(db).await?;
    Ok(db
        .load::<ClientStats>()
        .await?
        .into_iter()
        .filter(|s| s.vip_status)
        .map(|s| VipClient {
            name: known
                .iter()
                .find(|u| u.user_id == s.client_id)
                .map(|u| u.full_name.clone())
                .unwrap_or_else(|| s.client_id.to_string()),
            client_id: s.client_id,
            total_visits: s.total_visits,
            total_spent: s.total_spent,
        })
        .collect())
}

/// Every service with its non-canceled booking count, most booked first.
pub async fn get_service_popularity(db: &Db) -> Result<Vec<ServicePopularity>> {
    let booked = appointments::get_all_appointments(db).await?;
    let mut ranking: Vec<ServicePopularity> = services::get_all_services(db)
        .await?
        .into_iter()
        .map(|service| {
            let count = booked
                .iter()
                .filter(|a| {
                    same_id(&a.service_id, &service.id) && a.status != AppointmentStatus::Canceled
                })
                .count();
            ServicePopularity {
                appointment_count: count,
                total_revenue: service.price * count as f64,
                price: service.price,
                name: service.name,
                service_id: service.id,
            }
        })
        .collect();
    ranking.sort_by(|a, b| b.appointment_count.cmp(&a.appointment_count));
    Ok(ranking)
}

/// Daily averages of the last 30 days projected over `days`.
pub async fn calculate_profit_forecast(
    db: &Db,
    admin_id: i64,
    days: i64,
    today: NaiveDate,
) -> Result<Forecast> {
    let past = get_analytics_period(db, admin_id, today - Duration::days(30), today).await?;
    if past.total_appointments == 0 || past.days.is_empty() {
        return Ok(Forecast {
            days,
            income: 0.0,
            expenses: 0.0,
            profit: 0.0,
            confidence: Confidence::Low,
        });
    }

    let with_data = past.days.len();
    let per_day = |total: f64| total / with_data as f64 * days as f64;
    let confidence = if with_data < 7 {
        Confidence::Low
    } else if with_data > 21 {
        Confidence::High
    } else {
        Confidence::Medium
    };
    Ok(Forecast {
        days,
        income: round2(per_day(past.total_income)),
        expenses: round2(per_day(past.total_expenses)),
        profit: round2(per_day(past.total_profit)),
        confidence,
    })
}

pub async fn weekday_activity(db: &Db) -> Result<WeekdayActivity> {
    let mut activity = WeekdayActivity::default();
    for appointment in appointments::get_all_appointments(db).await? {
        activity.weekdays[appointment.date.weekday().num_days_from_monday() as usize] += 1;
        activity.months[appointment.date.month0() as usize] += 1;
    }
    Ok(activity)
}

pub async fn forecast_message(db: &Db, admin_id: i64, today: NaiveDate) -> Result<String> {
    let forecast = calculate_profit_forecast(db, admin_id, 30, today).await?;
    let popularity = get_service_popularity(db).await?;
    let activity = weekday_activity(db).await?;

    let mut message = String::from("📊 Финансовый прогноз на ближайшие 30 дней\n\n");
    message.push_str(&format!("Ожидаемый доход: {} руб.\n", format_amount(forecast.income)));
    message.push_str(&format!(
        "Ожидаемые расходы: {} руб.\n",
        format_amount(forecast.expenses)
    ));
    message.push_str(&format!(
        "Ожидаемая прибыль: {} руб.\n\n",
        format_amount(forecast.profit)
    ));
    if let Some(top) = popularity.first().filter(|p| p.appointment_count > 0) {
        message.push_str(&format!(
            "🏆 Самая популярная услуга: {} (заказов: {})\n\n",
            top.name, top.appointment_count
        ));
    }
    message.push_str(&format!(
        "💡 Меньше всего записей в день: {}. Попробуйте запустить акцию в этот день, чтобы привлечь больше клиентов.",
        WEEKDAYS[activity.quietest_workday()].to_lowercase()
    ));
    Ok(message)
}

/// Per-service economics from the wizard answers.
pub fn compute_setup_report(
    materials_cost: f64,
    rent_cost: f64,
    salary_percent: f64,
    other_costs: f64,
) -> SetupReport {
    let services_per_month = SETUP_WORKING_DAYS * SETUP_SERVICES_PER_DAY;
    let rent_per_service = rent_cost / services_per_month;
    let other_per_service = other_costs / services_per_month;
    let salary_cost = SETUP_AVERAGE_PRICE * salary_percent / 100.0;
    let cost = materials_cost + rent_per_service + salary_cost + other_per_service;
    let profit = SETUP_AVERAGE_PRICE - cost;
    let margin_percent = profit / SETUP_AVERAGE_PRICE * 100.0;
    let band = if margin_percent < 20.0 {
        MarginBand::Low
    } else if margin_percent < 40.0 {
        MarginBand::Normal
    } else {
        MarginBand::Good
    };

    SetupReport {
        average_price: SETUP_AVERAGE_PRICE,
        materials_cost,
        salary_percent,
        salary_cost: round2(salary_cost),
        rent_per_service: round2(rent_per_service),
        other_per_service: round2(other_per_service),
        profit: round2(profit),
        margin_percent: round2(margin_percent),
        band,
    }
}

/// One settings row per admin.
pub async fn save_finance_settings(db: &Db, settings: FinanceSettings) -> Result<()> {
    let mut all = db.load::<FinanceSettings>().await?;
    match all.iter_mut().find(|s| s.admin_id == settings.admin_id) {
        Some(existing) => *existing = settings,
        None => all.push(settings),
    }
    db.save(&all).await
}

pub async fn get_finance_settings(db: &Db, admin_id: i64) -> Result<Option<FinanceSettings>> {
    Ok(db
        .load::<FinanceSettings>()
        .await?
        .into_iter()
        .find(|s| s.admin_id == admin_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::repo::appointments::{add_appointment, update_appointment_status};
    use crate::repo::services::add_service;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 4, d).unwrap()
    }

    #[tokio::test]
    async fn test_profit_margin_and_zero_price() {
        let db = Db::memory();
        let paid = add_service(&db, "Cut", "", 1000.0, 60, None).await.unwrap();
        let free = add_service(&db, "Consult", "", 0.0, 15, None).await.unwrap();
        add_service_costs(
            &db,
            ServiceCosts {
                service_id: paid.id.clone(),
                materials_cost: 100.0,
                time_cost: 200.0,
                other_costs: 50.0,
                last_updated: String::new(),
            },
        )
        .await
        .unwrap();

        let profit = calculate_service_profit(&db, &paid.id).await.unwrap().unwrap();
        assert_eq!(profit.total_cost, 350.0);
        assert_eq!(profit.profit, 650.0);
        assert_eq!(profit.margin_percent, 65.0);

        let zero = calculate_service_profit(&db, &free.id).await.unwrap().unwrap();
        assert_eq!(zero.margin_percent, 0.0);
        assert!(calculate_service_profit(&db, "99").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_service_costs_upsert() {
        let db = Db::memory();
        assert_eq!(get_service_costs(&db, "4").await.unwrap().total(), 0.0);
        for materials in [10.0, 20.0] {
            add_service_costs(
                &db,
                ServiceCosts {
                    service_id: "4".into(),
                    materials_cost: materials,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        assert_eq!(db.load::<ServiceCosts>().await.unwrap().len(), 1);
        assert_eq!(get_service_costs(&db, "4").await.unwrap().materials_cost, 20.0);
    }

    #[tokio::test]
    async fn test_paid_visits_accumulate_per_admin_and_day() {
        let db = Db::memory();
        record_paid_visit(&db, 1, day(1), 1000.0, 300.0).await.unwrap();
        record_paid_visit(&db, 1, day(1), 500.0, 100.0).await.unwrap();
        record_paid_visit(&db, 2, day(1), 700.0, 0.0).await.unwrap();
        add_daily_analytics(&db, 1, day(3), 2000.0, 500.0, 2).await.unwrap();

        let period = get_analytics_period(&db, 1, day(1), day(3)).await.unwrap();
        assert_eq!(period.days.len(), 2);
        assert_eq!(period.total_income, 3500.0);
        assert_eq!(period.total_profit, 2600.0);
        assert_eq!(period.total_appointments, 4);

        let second_day_only = get_analytics_period(&db, 1, day(2), day(3)).await.unwrap();
        assert_eq!(second_day_only.total_income, 2000.0);
    }

    #[tokio::test]
    async fn test_forecast_confidence_levels() {
        let db = Db::memory();
        let today = day(30);
        let empty = calculate_profit_forecast(&db, 1, 30, today).await.unwrap();
        assert_eq!(empty.confidence, Confidence::Low);
        assert_eq!(empty.income, 0.0);

        for d in 1..=10 {
            add_daily_analytics(&db, 1, day(d), 1000.0, 400.0, 1).await.unwrap();
        }
        let medium = calculate_profit_forecast(&db, 1, 7, today).await.unwrap();
        assert_eq!(medium.confidence, Confidence::Medium);
        assert_eq!(medium.income, 7000.0);
        assert_eq!(medium.profit, 4200.0);

        for d in 11..=25 {
            add_daily_analytics(&db, 1, day(d), 1000.0, 400.0, 1).await.unwrap();
        }
        let high = calculate_profit_forecast(&db, 1, 30, today).await.unwrap();
        assert_eq!(high.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_client_stats_and_vip() {
        let db = Db::memory();
        users::add_user(&db, 5, "vip", "Vera", Role::Client).await.unwrap();
        let color = add_service(&db, "Color", "", 8000.0, 120, None).await.unwrap();
        let cut = add_service(&db, "Cut", "", 1000.0, 60, None).await.unwrap();
        for (service, status) in [
            (&color, AppointmentStatus::Paid),
            (&color, AppointmentStatus::Completed),
            (&cut, AppointmentStatus::Paid),
            (&cut, AppointmentStatus::Canceled),
        ] {
            let a = add_appointment(&db, 5, &service.id, "1", day(2), "10:00").await.unwrap();
            update_appointment_status(&db, &a.id, status).await.unwrap();
        }
        update_client_note(&db, 5, "prefers mornings").await.unwrap();

        let stats = update_client_stats(&db, 5, day(2)).await.unwrap();
        assert_eq!(stats.total_visits, 3);
        assert_eq!(stats.total_spent, 17000.0);
        assert_eq!(stats.favorite_service, "Color");
        assert!(stats.vip_status);
        assert_eq!(stats.notes, "prefers mornings");

        let vips = get_vip_clients(&db).await.unwrap();
        assert_eq!(vips.len(), 1);
        assert_eq!(vips[0].name, "Vera");
        assert!(!get_client_stats(&db, 6).await.unwrap().vip_status);
    }

    #[tokio::test]
    async fn test_popularity_and_activity() {
        let db = Db::memory();
        let cut = add_service(&db, "Cut", "", 1000.0, 60, None).await.unwrap();
        let color = add_service(&db, "Color", "", 3000.0, 60, None).await.unwrap();
        // 2030-04-01 is a Monday
        add_appointment(&db, 1, &color.id, "1", day(1), "10:00").await.unwrap();
        add_appointment(&db, 2, &color.id, "1", day(1), "11:00").await.unwrap();
        add_appointment(&db, 3, &cut.id, "1", day(2), "11:00").await.unwrap();

        let ranking = get_service_popularity(&db).await.unwrap();
        assert_eq!(ranking[0].name, "Color");
        assert_eq!(ranking[0].total_revenue, 6000.0);

        let activity = weekday_activity(&db).await.unwrap();
        assert_eq!(activity.weekdays[0], 2);
        assert_eq!(activity.busiest_weekday(), 0);
        assert_eq!(activity.quietest_workday(), 2);
        assert_eq!(activity.busiest_month(), 3);
        assert_eq!(activity.total(), 3);

        let message = forecast_message(&db, 1, day(2)).await.unwrap();
        assert!(message.contains("Color"));
        assert!(message.contains("среда"));
    }

    #[test]
    fn test_setup_report_bands() {
        let good = compute_setup_report(200.0, 17600.0, 20.0, 0.0);
        assert_eq!(good.rent_per_service, 100.0);
        assert_eq!(good.salary_cost, 300.0);
        assert_eq!(good.profit, 900.0);
        assert_eq!(good.margin_percent, 60.0);
        assert_eq!(good.band, MarginBand::Good);

        assert_eq!(compute_setup_report(600.0, 0.0, 30.0, 0.0).band, MarginBand::Normal);
        assert_eq!(compute_setup_report(900.0, 0.0, 40.0, 0.0).band, MarginBand::Low);
    }

    #[tokio::test]
    async fn test_finance_settings_one_row_per_admin() {
        let db = Db::memory();
        for rent in [1000.0, 2000.0] {
            save_finance_settings(
                &db,
                FinanceSettings {
                    admin_id: 1,
                    materials_cost: 0.0,
                    rent_cost: rent,
                    salary_percent: 40.0,
                    other_costs: 0.0,
                    updated: String::new(),
                },
            )
            .await
            .unwrap();
        }
        let settings = get_finance_settings(&db, 1).await.unwrap().unwrap();
        assert_eq!(settings.rent_cost, 2000.0);
        assert!(get_finance_settings(&db, 2).await.unwrap().is_none());
    }
}
