use chrono::{Duration, NaiveDate};

use crate::db::Db;
use crate::error::Result;
use crate::models::{format_date, Role, Subscription};
use crate::repo::users;

pub const BASE_MONTHLY_PRICE: u32 = 1999;
pub const PLAN_MONTHS: [u32; 5] = [1, 2, 3, 6, 12];
pub const DAYS_PER_MONTH: i64 = 30;
pub const TRIAL_DAYS: i64 = 7;
pub const REFERRAL_BONUS_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionStatus {
    pub active: bool,
    pub days_left: i64,
    pub trial: bool,
    pub end_date: Option<NaiveDate>,
}

impl SubscriptionStatus {
    pub fn message(&self) -> String {
        match (self.active, self.end_date) {
            (true, Some(end)) => format!(
                "{} активна еще {} дн. (до {})",
                if self.trial { "Пробная подписка" } else { "Подписка" },
                self.days_left,
                format_date(end)
            ),
            (false, Some(_)) => "Ваша подписка истекла".to_string(),
            _ => "У вас нет активной подписки".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralOutcome {
    Applied,
    /// Unknown user or not an admin
    InvalidReferrer,
    SelfReferral,
    AlreadyUsed,
}

/// Discount in percent for a plan length.
pub fn plan_discount(months: u32) -> u32 {
    match months {
        m if m >= 12 => 20,
        m if m >= 6 => 10,
        m if m >= 3 => 5,
        _ => 0,
    }
}

/// Total price in roubles, rounded down.
pub fn plan_price(months: u32) -> u32 {
    BASE_MONTHLY_PRICE * months * (100 - plan_discount(months)) / 100
}

pub async fn get_subscription(db: &Db, user_id: i64) -> Result<Option<Subscription>> {
    Ok(db
        .load::<Subscription>()
        .await?
        .into_iter()
        .find(|s| s.user_id == user_id))
}

pub async fn check_subscription_status(
    db: &Db,
    user_id: i64,
    today: NaiveDate,
) -> Result<SubscriptionStatus> {
    let Some(subscription) = get_subscription(db, user_id).await? else {
        return Ok(SubscriptionStatus {
            active: false,
            days_left: 0,
            trial: false,
            end_date: None,
        });
    };
    let days_left = (subscription.end_date - today).num_days();
    let active = days_left >= 0;
    Ok(SubscriptionStatus {
        active,
        days_left: days_left.max(0),
        trial: active && subscription.trial,
        end_date: Some(subscription.end_date),
    })
}

pub async fn is_subscribed(db: &Db, user_id: i64, today: NaiveDate) -> Result<bool> {
    Ok(check_subscription_status(db, user_id, today).await?.active)
}

/// Adds days counting from the later of the current end and today; clears the trial flag.
pub async fn extend_subscription(
    db: &Db,
    user_id: i64,
    days: i64,
    today: NaiveDate,
) -> Result<Subscription> {
    let mut subscriptions = db.load::<Subscription>().await?;
    let subscription = match subscriptions.iter_mut().find(|s| s.user_id == user_id) {
        Some(existing) => {
            existing.end_date = existing.end_date.max(today) + Duration::days(days);
            existing.trial = false;
            existing.clone()
        }
        None => {
            let created = Subscription {
                user_id,
                start_date: today,
                end_date: today + Duration::days(days),
                trial: false,
                referrer_id: None,
            };
            subscriptions.push(created.clone());
            created
        }
    };
    db.save(&subscriptions).await?;
    info!(
        "Subscription of {} now ends {}",
        user_id,
        format_date(subscription.end_date)
    );
    Ok(subscription)
}

pub async fn create_subscription(
    db: &Db,
    user_id: i64,
    days: i64,
    today: NaiveDate,
) -> Result<Subscription> {
    extend_subscription(db, user_id, days, today).await
}

/// Starts a trial; `None` when a subscription is still active.
pub async fn create_trial(db: &Db, user_id: i64, today: NaiveDate) -> Result<Option<Subscription>> {
    if is_subscribed(db, user_id, today).await? {
        return Ok(None);
    }
    let mut subscriptions = db.load::<Subscription>().await?;
    let trial = match subscriptions.iter_mut().find(|s| s.user_id == user_id) {
        Some(expired) => {
            expired.start_date = today;
            expired.end_date = today + Duration::days(TRIAL_DAYS);
            expired.trial = true;
            expired.clone()
        }
        None => {
            let created = Subscription {
                user_id,
                start_date: today,
                end_date: today + Duration::days(TRIAL_DAYS),
                trial: true,
                referrer_id: None,
            };
            subscriptions.push(created.clone());
            created
        }
    };
    db.save(&subscriptions).await?;
    Ok(Some(trial))
}

/// Credits the referrer with a free month. A user can name a referrer only once.
pub async fn process_referral(
    db: &Db,
    user_id: i64,
    referrer_id: i64,
    today: NaiveDate,
) -> Result<ReferralOutcome> {
    if referrer_id == user_id {
        return Ok(ReferralOutcome::SelfReferral);
    }
    match users::get_user(db, referrer_id).await? {
        Some(referrer) if referrer.role == Role::Admin => {}
        _ => return Ok(ReferralOutcome::InvalidReferrer),
    }

    let mut subscriptions = db.load::<Subscription>().await?;
    match subscriptions.iter_mut().find(|s| s.user_id == user_id) {
        Some(own) if own.referrer_id.is_some() => return Ok(ReferralOutcome::AlreadyUsed),
        Some(own) => own.referrer_id = Some(referrer_id),
        // expired row that only remembers the referrer
        None => subscriptions.push(Subscription {
            user_id,
            start_date: today - Duration::days(1),
            end_date: today - Duration::days(1),
            trial: false,
            referrer_id: Some(referrer_id),
        }),
    }
    db.save(&subscriptions).await?;

    extend_subscription(db, referrer_id, REFERRAL_BONUS_DAYS, today).await?;
    Ok(ReferralOutcome::Applied)
}
