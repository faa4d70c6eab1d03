use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

use crate::db::Db;
use crate::error::Result;
use crate::models::{
    format_date, Appointment, AppointmentStatus, HistoryEntry, Master, Service, VerifiedUser,
};
use crate::sheets::same_id;

/// Appointment joined with the names the menus show.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentView {
    pub appointment: Appointment,
    pub service_name: String,
    pub service_price: f64,
    pub master_name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentStats {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub paid: usize,
    pub canceled: usize,
    /// Sum of service prices over completed and paid appointments
    pub revenue: f64,
}

pub async fn get_all_appointments(db: &Db) -> Result<Vec<Appointment>> {
    db.load::<Appointment>().await
}

pub async fn get_appointment(db: &Db, appointment_id: &str) -> Result<Option<Appointment>> {
    Ok(get_all_appointments(db)
        .await?
        .into_iter()
        .find(|a| same_id(&a.id, appointment_id)))
}

/// Attaches service and master names; unknown references show as "-".
pub async fn enrich(db: &Db, appointments: Vec<Appointment>) -> Result<Vec<AppointmentView>> {
    let services = db.load::<Service>().await?;
    let masters = db.load::<Master>().await?;
    Ok(appointments
        .into_iter()
        .map(|appointment| {
            let service = services.iter().find(|s| same_id(&s.id, &appointment.service_id));
            let master = masters.iter().find(|m| same_id(&m.id, &appointment.master_id));
            AppointmentView {
                service_name: service.map(|s| s.name.clone()).unwrap_or_else(|| "-".to_string()),
                service_price: service.map(|s| s.price).unwrap_or(0.0),
                master_name: master.map(|m| m.name.clone()).unwrap_or_else(|| "-".to_string()),
                appointment,
            }
        })
        .collect())
}

pub async fn get_user_appointments(db: &Db, user_id: i64) -> Result<Vec<AppointmentView>> {
    let mut own: Vec<Appointment> = get_all_appointments(db)
        .await?
        .into_iter()
        .filter(|a| a.user_id == user_id)
        .collect();
    own.sort_by(|a, b| (a.date, &a.time).cmp(&(b.date, &b.time)));
    enrich(db, own).await
}

pub async fn get_master_appointments(db: &Db, master_id: &str) -> Result<Vec<Appointment>> {
    Ok(get_all_appointments(db)
        .await?
        .into_iter()
        .filter(|a| same_id(&a.master_id, master_id))
        .collect())
}

/// Appointments of the day ordered by time.
pub async fn get_appointments_by_date(db: &Db, date: NaiveDate) -> Result<Vec<Appointment>> {
    let mut day: Vec<Appointment> = get_all_appointments(db)
        .await?
        .into_iter()
        .filter(|a| a.date == date)
        .collect();
    day.sort_by(|a, b| a.time.cmp(&b.time));
    Ok(day)
}

/// Dates from `today` on that still have non-canceled appointments, with counts.
pub async fn upcoming_dates(db: &Db, today: NaiveDate) -> Result<Vec<(NaiveDate, usize)>> {
    let mut dates: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for appointment in get_all_appointments(db).await? {
        if appointment.date >= today && appointment.status != AppointmentStatus::Canceled {
            *dates.entry(appointment.date).or_default() += 1;
        }
    }
    Ok(dates.into_iter().collect())
}

pub async fn is_user_verified(db: &Db, user_id: i64) -> Result<bool> {
    Ok(db
        .load::<VerifiedUser>()
        .await?
        .iter()
        .any(|v| v.user_id == user_id))
}

pub async fn verify_user(db: &Db, user_id: i64) -> Result<()> {
    if is_user_verified(db, user_id).await? {
        return Ok(());
    }
    db.append(VerifiedUser { user_id }).await
}

/// Verified clients are confirmed right away, everybody else waits for an admin.
pub async fn add_appointment(
    db: &Db,
    user_id: i64,
    service_id: &str,
    master_id: &str,
    date: NaiveDate,
    time: &str,
) -> Result<Appointment> {
    let status = if is_user_verified(db, user_id).await? {
        AppointmentStatus::Confirmed
    } else {
        AppointmentStatus::Pending
    };

    let mut appointments = get_all_appointments(db).await?;
    let appointment = Appointment {
        id: db.next_id::<Appointment>().await?,
        user_id,
        service_id: service_id.to_string(),
        master_id: master_id.to_string(),
        date,
        time: time.to_string(),
        status,
        payment_method: String::new(),
    };
    appointments.push(appointment.clone());
    db.save(&appointments).await?;
    info!(
        "Appointment {} for user {} on {} {} ({})",
        appointment.id,
        user_id,
        format_date(date),
        time,
        status.as_str()
    );
    Ok(appointment)
}

pub async fn update_appointment_status(
    db: &Db,
    appointment_id: &str,
    status: AppointmentStatus,
) -> Result<bool> {
    let mut appointments = get_all_appointments(db).await?;
    let Some(appointment) = appointments.iter_mut().find(|a| same_id(&a.id, appointment_id)) else {
        return Ok(false);
    };
    appointment.status = status;
    db.save(&appointments).await?;
    Ok(true)
}

pub async fn update_appointment_payment(
    db: &Db,
    appointment_id: &str,
    payment_method: &str,
) -> Result<bool> {
    let mut appointments = get_all_appointments(db).await?;
    let Some(appointment) = appointments.iter_mut().find(|a| same_id(&a.id, appointment_id)) else {
        return Ok(false);
    };
    appointment.payment_method = payment_method.to_string();
    db.save(&appointments).await?;
    Ok(true)
}

pub async fn cancel_appointment(db: &Db, appointment_id: &str) -> Result<bool> {
    update_appointment_status(db, appointment_id, AppointmentStatus::Canceled).await
}

pub async fn complete_appointment(db: &Db, appointment_id: &str) -> Result<bool> {
    update_appointment_status(db, appointment_id, AppointmentStatus::Completed).await
}

pub async fn get_appointments_statistics(
    db: &Db,
    master_id: Option<&str>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<AppointmentStats> {
    let services = db.load::<Service>().await?;
    let mut stats = AppointmentStats::default();

    let selected = get_all_appointments(db).await?.into_iter().filter(|a| {
        master_id.map_or(true, |m| same_id(&a.master_id, m))
            && start.map_or(true, |s| a.date >= s)
            && end.map_or(true, |e| a.date <= e)
    });
    for appointment in selected {
        stats.total += 1;
        match appointment.status {
            AppointmentStatus::Pending => stats.pending += 1,
            AppointmentStatus::Confirmed => stats.confirmed += 1,
            AppointmentStatus::Completed => stats.completed += 1,
            AppointmentStatus::Paid => stats.paid += 1,
            AppointmentStatus::Canceled => stats.canceled += 1,
        }
        if matches!(
            appointment.status,
            AppointmentStatus::Completed | AppointmentStatus::Paid
        ) {
            stats.revenue += services
                .iter()
                .find(|s| same_id(&s.id, &appointment.service_id))
                .map(|s| s.price)
                .unwrap_or(0.0);
        }
    }
    Ok(stats)
}

pub async fn record_history(
    db: &Db,
    appointment: &Appointment,
    amount: f64,
    at: NaiveDateTime,
) -> Result<()> {
    db.append(HistoryEntry {
        timestamp: at.format("%Y-%m-%d %H:%M:%S").to_string(),
        user_id: appointment.user_id,
        service_id: appointment.service_id.clone(),
        date: format_date(appointment.date),
        time: appointment.time.clone(),
        amount,
    })
    .await
}

pub async fn get_user_history(db: &Db, user_id: i64) -> Result<Vec<HistoryEntry>> {
    Ok(db
        .load::<HistoryEntry>()
        .await?
        .into_iter()
        .filter(|h| h.user_id == user_id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::services::add_service;
    use crate::sheets::Row;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, d).unwrap()
    }

    #[tokio::test]
    async fn test_new_appointment_status_depends_on_verification() {
        let db = Db::memory();
        let first = add_appointment(&db, 7, "1", "1", day(1), "10:00").await.unwrap();
        assert_eq!(first.status, AppointmentStatus::Pending);

        verify_user(&db, 7).await.unwrap();
        verify_user(&db, 7).await.unwrap();
        assert_eq!(db.load::<VerifiedUser>().await.unwrap().len(), 1);

        let second = add_appointment(&db, 7, "1", "1", day(2), "10:00").await.unwrap();
        assert_eq!(second.status, AppointmentStatus::Confirmed);
        assert_eq!(second.id, "2");
    }

    #[tokio::test]
    async fn test_hand_entered_row_survives_new_booking() {
        let sheets = std::sync::Arc::new(crate::sheets::MemorySheets::new());
        let header: Vec<String> = Appointment::HEADERS.iter().map(|h| h.to_string()).collect();
        let typed: Vec<String> = ["1", "5", "1", "1", "15.03.2030", "10:00", "pending", ""]
            .iter()
            .map(|c| c.to_string())
            .collect();
        sheets.insert_grid("Appointments", vec![header, typed.clone()]).await;
        let db = Db::new(sheets.clone());

        let added = add_appointment(&db, 6, "1", "1", day(16), "11:00").await.unwrap();
        assert_eq!(added.id, "2");
        update_appointment_status(&db, &added.id, AppointmentStatus::Confirmed)
            .await
            .unwrap();

        let grid = sheets.grid("Appointments").await.unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[2], typed);
    }

    #[tokio::test]
    async fn test_user_appointments_are_enriched_and_sorted() {
        let db = Db::memory();
        let service = add_service(&db, "Cut", "", 1000.0, 60, None).await.unwrap();
        add_appointment(&db, 7, &service.id, "9", day(5), "12:00").await.unwrap();
        add_appointment(&db, 7, &service.id, "9", day(3), "15:00").await.unwrap();
        add_appointment(&db, 8, &service.id, "9", day(3), "10:00").await.unwrap();

        let views = get_user_appointments(&db, 7).await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].appointment.date, day(3));
        assert_eq!(views[0].service_name, "Cut");
        assert_eq!(views[0].service_price, 1000.0);
        assert_eq!(views[0].master_name, "-");
    }

    #[tokio::test]
    async fn test_upcoming_dates_skip_past_and_canceled() {
        let db = Db::memory();
        add_appointment(&db, 1, "1", "1", day(1), "10:00").await.unwrap();
        add_appointment(&db, 1, "1", "1", day(4), "10:00").await.unwrap();
        add_appointment(&db, 2, "1", "1", day(4), "11:00").await.unwrap();
        let canceled = add_appointment(&db, 3, "1", "1", day(6), "10:00").await.unwrap();
        cancel_appointment(&db, &canceled.id).await.unwrap();

        assert_eq!(upcoming_dates(&db, day(2)).await.unwrap(), vec![(day(4), 2)]);
    }

    #[tokio::test]
    async fn test_statistics_revenue_counts_completed_and_paid() {
        let db = Db::memory();
        let cut = add_service(&db, "Cut", "", 1000.0, 60, None).await.unwrap();
        let a = add_appointment(&db, 1, &cut.id, "1", day(1), "10:00").await.unwrap();
        let b = add_appointment(&db, 2, &cut.id, "2", day(2), "10:00").await.unwrap();
        let c = add_appointment(&db, 3, &cut.id, "1", day(3), "10:00").await.unwrap();
        complete_appointment(&db, &a.id).await.unwrap();
        update_appointment_status(&db, &b.id, AppointmentStatus::Paid).await.unwrap();
        cancel_appointment(&db, &c.id).await.unwrap();

        let all = get_appointments_statistics(&db, None, None, None).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.canceled, 1);
        assert_eq!(all.revenue, 2000.0);

        let first_master = get_appointments_statistics(&db, Some("1"), None, Some(day(2)))
            .await
            .unwrap();
        assert_eq!(first_master.total, 1);
        assert_eq!(first_master.completed, 1);
    }

    #[tokio::test]
    async fn test_payment_method_and_unknown_id() {
        let db = Db::memory();
        let a = add_appointment(&db, 1, "1", "1", day(1), "10:00").await.unwrap();
        assert!(update_appointment_payment(&db, &a.id, "card").await.unwrap());
        assert!(!update_appointment_payment(&db, "77", "card").await.unwrap());
        assert_eq!(
            get_appointment(&db, &a.id).await.unwrap().unwrap().payment_method,
            "card"
        );
    }
}
