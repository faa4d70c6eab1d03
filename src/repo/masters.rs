use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

use crate::db::Db;
use crate::error::Result;
use crate::models::{AppointmentStatus, DayHours, Master, WorkingHours};
use crate::repo::appointments;
use crate::sheets::same_id;

pub const SLOT_MINUTES: u32 = 30;

#[derive(Debug, Clone, Default)]
pub struct MasterPatch {
    pub name: Option<String>,
    pub telegram: Option<String>,
    pub telegram_id: Option<i64>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

pub async fn get_all_masters(db: &Db) -> Result<Vec<Master>> {
    db.load::<Master>().await
}

pub async fn get_master(db: &Db, master_id: &str) -> Result<Option<Master>> {
    Ok(get_all_masters(db)
        .await?
        .into_iter()
        .find(|m| same_id(&m.id, master_id)))
}

pub async fn get_master_by_telegram_id(db: &Db, telegram_id: i64) -> Result<Option<Master>> {
    Ok(get_all_masters(db)
        .await?
        .into_iter()
        .find(|m| m.telegram_id == Some(telegram_id)))
}

pub async fn get_master_by_username(db: &Db, username: &str) -> Result<Option<Master>> {
    let wanted = username.trim().trim_start_matches('@').to_lowercase();
    if wanted.is_empty() {
        return Ok(None);
    }
    Ok(get_all_masters(db)
        .await?
        .into_iter()
        .find(|m| m.telegram.to_lowercase() == wanted))
}

pub async fn add_master(db: &Db, name: &str, patch: MasterPatch) -> Result<Master> {
    let mut masters = get_all_masters(db).await?;
    let mut master = Master::new(db.next_id::<Master>().await?, name.to_string());
    apply_patch(&mut master, patch);
    masters.push(master.clone());
    db.save(&masters).await?;
    info!("Added master {} ({})", master.name, master.id);
    Ok(master)
}

pub async fn update_master(db: &Db, master_id: &str, patch: MasterPatch) -> Result<bool> {
    let mut masters = get_all_masters(db).await?;
    let Some(master) = masters.iter_mut().find(|m| same_id(&m.id, master_id)) else {
        return Ok(false);
    };
    apply_patch(master, patch);
    db.save(&masters).await?;
    Ok(true)
}

fn apply_patch(master: &mut Master, patch: MasterPatch) {
    if let Some(name) = patch.name {
        master.name = name;
    }
    if let Some(telegram) = patch.telegram {
        master.telegram = telegram.trim().trim_start_matches('@').to_string();
    }
    if let Some(telegram_id) = patch.telegram_id {
        master.telegram_id = Some(telegram_id);
    }
    if let Some(phone) = patch.phone {
        master.phone = phone;
    }
    if let Some(address) = patch.address {
        master.address = address;
    }
    if let Some(location) = patch.location {
        master.location = location;
    }
    if let Some(description) = patch.description {
        master.description = description;
    }
}

pub async fn delete_master(db: &Db, master_id: &str) -> Result<bool> {
    let mut masters = get_all_masters(db).await?;
    let before = masters.len();
    masters.retain(|m| !same_id(&m.id, master_id));
    if masters.len() == before {
        return Ok(false);
    }
    db.save(&masters).await?;
    Ok(true)
}

pub async fn get_master_working_hours(db: &Db, master_id: &str) -> Result<Option<WorkingHours>> {
    Ok(get_master(db, master_id).await?.map(|m| m.working_hours))
}

pub async fn update_master_working_hours(
    db: &Db,
    master_id: &str,
    working_hours: WorkingHours,
) -> Result<bool> {
    let mut masters = get_all_masters(db).await?;
    let Some(master) = masters.iter_mut().find(|m| same_id(&m.id, master_id)) else {
        return Ok(false);
    };
    master.working_hours = working_hours;
    db.save(&masters).await?;
    Ok(true)
}

pub async fn get_master_services(db: &Db, master_id: &str) -> Result<Vec<String>> {
    Ok(get_master(db, master_id)
        .await?
        .map(|m| m.services)
        .unwrap_or_default())
}

/// Adds or removes the service; returns whether it is now assigned.
pub async fn toggle_master_service(db: &Db, master_id: &str, service_id: &str) -> Result<Option<bool>> {
    let mut masters = get_all_masters(db).await?;
    let Some(master) = masters.iter_mut().find(|m| same_id(&m.id, master_id)) else {
        return Ok(None);
    };
    let assigned = if master.services.iter().any(|s| same_id(s, service_id)) {
        master.services.retain(|s| !same_id(s, service_id));
        false
    } else {
        master.services.push(service_id.to_string());
        true
    };
    db.save(&masters).await?;
    Ok(Some(assigned))
}

/// Masters offering the service; an empty service list means the master does everything.
pub async fn masters_for_service(db: &Db, service_id: &str) -> Result<Vec<Master>> {
    Ok(get_all_masters(db)
        .await?
        .into_iter()
        .filter(|m| m.services.is_empty() || m.services.iter().any(|s| same_id(s, service_id)))
        .collect())
}

/// "HH:MM" as minutes after midnight.
pub fn parse_clock(raw: &str) -> Option<u32> {
    let time = NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()?;
    Some(time.hour() * 60 + time.minute())
}

fn format_clock(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Every 30-minute start from the day's opening time while before closing.
pub fn day_slots(hours: &DayHours) -> Vec<String> {
    let (Some(start), Some(end)) = (parse_clock(&hours.start), parse_clock(&hours.end)) else {
        return Vec::new();
    };
    (start..end)
        .step_by(SLOT_MINUTES as usize)
        .map(format_clock)
        .collect()
}

/// Free slots of the master on the date, booked times of live appointments removed.
pub async fn get_master_availability(db: &Db, master_id: &str, date: NaiveDate) -> Result<Vec<String>> {
    let Some(master) = get_master(db, master_id).await? else {
        return Ok(Vec::new());
    };
    let weekday = date.weekday().number_from_monday().to_string();
    let Some(hours) = master.working_hours.get(&weekday) else {
        return Ok(Vec::new());
    };

    let booked: Vec<String> = appointments::get_all_appointments(db)
        .await?
        .into_iter()
        .filter(|a| {
            same_id(&a.master_id, master_id)
                && a.date == date
                && a.status != AppointmentStatus::Canceled
        })
        .map(|a| a.time)
        .collect();

    Ok(day_slots(hours)
        .into_iter()
        .filter(|slot| !booked.contains(slot))
        .collect())
}
