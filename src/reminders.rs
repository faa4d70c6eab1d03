//! Background reminders: evening status checks for today's appointments and
//! the weekly expense reminder on Sundays.

use std::time::Duration as StdDuration;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use teloxide::prelude::*;
use teloxide::types::InlineKeyboardMarkup;

use crate::db::Db;
use crate::error::Result;
use crate::keyboards;
use crate::models::Role;
use crate::repo::{appointments, users};

/// First hour of the evening check window.
pub const EVENING_START: u32 = 19;
/// Last hour of the evening check window.
pub const EVENING_END: u32 = 23;

const SEND_PAUSE: StdDuration = StdDuration::from_millis(300);

pub const WEEKLY_REMINDER: &str = "📝 Еженедельное напоминание\n\n\
    Не забудьте записать расходы за прошедшую неделю. Это поможет вести точный \
    финансовый учет и получать корректную аналитику.\n\nХотите внести расходы прямо сейчас?";

pub fn in_evening_window(now: NaiveDateTime) -> bool {
    (EVENING_START..=EVENING_END).contains(&now.hour())
}

/// Sleep before the next check: hourly inside the window, otherwise until
/// 19:00 today or tomorrow.
pub fn next_check_delay(now: NaiveDateTime) -> Duration {
    let evening = NaiveTime::from_hms_opt(EVENING_START, 0, 0).unwrap_or_default();
    if now.hour() < EVENING_START {
        now.date().and_time(evening) - now
    } else if now.hour() < EVENING_END {
        Duration::hours(1)
    } else {
        (now.date() + Duration::days(1)).and_time(evening) - now
    }
}

/// The weekly reminder goes out once per Sunday.
pub fn weekly_due(today: NaiveDate, last_sent: Option<NaiveDate>) -> bool {
    today.weekday() == Weekday::Sun && last_sent != Some(today)
}

/// Reminder text and keyboard for every appointment of `today` whose status
/// was not closed yet.
pub async fn pending_reminders(db: &Db, today: NaiveDate) -> Result<Vec<(String, InlineKeyboardMarkup)>> {
    let open: Vec<_> = appointments::get_appointments_by_date(db, today)
        .await?
        .into_iter()
        .filter(|a| a.status.is_open())
        .collect();
    let views = appointments::enrich(db, open).await?;

    let mut reminders = Vec::with_capacity(views.len());
    for view in views {
        let a = &view.appointment;
        let client = users::get_user(db, a.user_id)
            .await?
            .map(|u| u.display_name())
            .unwrap_or_else(|| a.user_id.to_string());
        let text = format!(
            "📋 Статус записи не обновлен:\n\n🕒 Время: {}\n💇 Услуга: {}\n👤 Клиент: {}\n👨‍💼 Мастер: {}\n\nПожалуйста, обновите статус записи:",
            a.time, view.service_name, client, view.master_name
        );
        reminders.push((text, keyboards::reminder_actions(&a.id)));
    }
    Ok(reminders)
}

async fn send_evening_round(bot: &Bot, db: &Db, admin_ids: &[i64], today: NaiveDate) -> Result<()> {
    let reminders = pending_reminders(db, today).await?;
    if reminders.is_empty() {
        info!("No open appointments left for {}", today);
        return Ok(());
    }
    info!("Found {} open appointments for {}", reminders.len(), today);

    for admin_id in admin_ids {
        for (text, markup) in &reminders {
            if let Err(e) = bot
                .send_message(ChatId(*admin_id), text.clone())
                .reply_markup(markup.clone())
                .await
            {
                warn!("Could not remind admin {}: {}", admin_id, e);
            }
            tokio::time::sleep(SEND_PAUSE).await;
        }
    }
    Ok(())
}

async fn send_weekly_round(bot: &Bot, db: &Db) -> Result<()> {
    for admin in users::get_users_by_role(db, Role::Admin).await? {
        if let Err(e) = bot
            .send_message(ChatId(admin.user_id), WEEKLY_REMINDER)
            .reply_markup(keyboards::finance_menu())
            .await
        {
            warn!("Could not send the weekly reminder to {}: {}", admin.user_id, e);
        }
        tokio::time::sleep(SEND_PAUSE).await;
    }
    Ok(())
}

/// Runs forever; spawn it next to the dispatcher.
pub async fn run(bot: Bot, db: Db, admin_ids: Vec<i64>) {
    let mut weekly_sent: Option<NaiveDate> = None;
    loop {
        let now = Local::now().naive_local();
        let today = now.date();

        if in_evening_window(now) {
            info!("Running end-of-day appointment status check");
            if let Err(e) = send_evening_round(&bot, &db, &admin_ids, today).await {
                error!("Evening reminder round failed: {}", e);
            }
            if weekly_due(today, weekly_sent) {
                match send_weekly_round(&bot, &db).await {
                    Ok(()) => weekly_sent = Some(today),
                    Err(e) => error!("Weekly expense reminder failed: {}", e),
                }
            }
        }

        let delay = next_check_delay(now)
            .to_std()
            .unwrap_or(StdDuration::from_secs(3600));
        debug!("Next reminder check in {} s", delay.as_secs());
        tokio::time::sleep(delay).await;
    }
}
