//! Role resolution and access checks done before any dialog code runs.

use chrono::NaiveDate;

use crate::db::Db;
use crate::error::Result;
use crate::models::{Role, User};
use crate::repo::{subscriptions, users};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Anyone,
    /// Admins and owners
    Staff,
    /// Admins only; the subscription area
    AdminOnly,
    Owner,
    /// Staff; admins also need an active subscription
    Finance,
}

/// Loads the user, registering unknown users as clients. Configured owner ids
/// are promoted to owner and persisted.
pub async fn resolve_user(
    db: &Db,
    owner_ids: &[i64],
    user_id: i64,
    username: &str,
    full_name: &str,
) -> Result<User> {
    let configured_owner = owner_ids.contains(&user_id);
    match users::get_user(db, user_id).await? {
        Some(mut user) => {
            if configured_owner && user.role != Role::Owner {
                users::update_user_role(db, user_id, Role::Owner).await?;
                info!("User {} promoted to owner from configuration", user_id);
                user.role = Role::Owner;
            }
            Ok(user)
        }
        None => {
            let role = if configured_owner { Role::Owner } else { Role::Client };
            users::add_user(db, user_id, username, full_name, role).await
        }
    }
}

pub fn callback_access(prefix: &str) -> Access {
    match prefix {
        "admin" | "adm" | "svc" | "tpl" | "cat" | "off" | "mst" | "apt" => Access::Staff,
        "owner" | "own" => Access::Owner,
        "fin" => Access::Finance,
        "sub" => Access::AdminOnly,
        _ => Access::Anyone,
    }
}

pub fn command_access(command: &str) -> Access {
    match command {
        "admin" => Access::Staff,
        "owner" => Access::Owner,
        "finance" => Access::Finance,
        "subscription" => Access::AdminOnly,
        _ => Access::Anyone,
    }
}

/// `None` when allowed, otherwise the refusal to show.
pub async fn check(
    db: &Db,
    user: &User,
    access: Access,
    today: NaiveDate,
) -> Result<Option<&'static str>> {
    let denied = match access {
        Access::Anyone => None,
        Access::Staff if user.role.is_staff() => None,
        Access::Staff => Some("⛔ Доступ запрещен. Это действие доступно только администраторам."),
        Access::AdminOnly if user.role == Role::Admin => None,
        Access::AdminOnly => Some("⛔ Этот раздел доступен только администраторам."),
        Access::Owner if user.role == Role::Owner => None,
        Access::Owner => Some("⛔ Доступ запрещен. Это действие доступно только владельцу."),
        Access::Finance => match user.role {
            Role::Owner => None,
            Role::Admin if subscriptions::is_subscribed(db, user.user_id, today).await? => None,
            Role::Admin => Some(
                "💳 Для доступа к финансам нужна активная подписка. Оформите её в разделе «Подписка».",
            ),
            Role::Client => Some("⛔ Доступ запрещен. Это действие доступно только администраторам."),
        },
    };
    if let Some(reason) = denied {
        warn!("User {} denied {:?}", user.user_id, access);
        return Ok(Some(reason));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_user_is_registered_as_client() {
        let db = Db::memory();
        let user = resolve_user(&db, &[], 5, "ann", "Ann").await.unwrap();
        assert_eq!(user.role, Role::Client);
        assert_eq!(users::get_all_users(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_configured_owner_is_promoted_and_persisted() {
        let db = Db::memory();
        users::add_user(&db, 7, "boss", "Boss", Role::Client).await.unwrap();
        let user = resolve_user(&db, &[7], 7, "boss", "Boss").await.unwrap();
        assert_eq!(user.role, Role::Owner);
        let stored = users::get_user(&db, 7).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Owner);
    }

    #[test]
    fn test_prefix_mapping() {
        assert_eq!(callback_access("svc"), Access::Staff);
        assert_eq!(callback_access("own"), Access::Owner);
        assert_eq!(callback_access("fin"), Access::Finance);
        assert_eq!(callback_access("sub"), Access::AdminOnly);
        assert_eq!(callback_access("book"), Access::Anyone);
        assert_eq!(command_access("finance"), Access::Finance);
        assert_eq!(command_access("start"), Access::Anyone);
    }

    #[tokio::test]
    async fn test_finance_needs_subscription_for_admins_only() {
        let db = Db::memory();
        let admin = users::add_user(&db, 1, "a", "A", Role::Admin).await.unwrap();
        let owner = users::add_user(&db, 2, "o", "O", Role::Owner).await.unwrap();
        let client = users::add_user(&db, 3, "c", "C", Role::Client).await.unwrap();

        assert!(check(&db, &admin, Access::Finance, day()).await.unwrap().is_some());
        assert!(check(&db, &owner, Access::Finance, day()).await.unwrap().is_none());
        assert!(check(&db, &client, Access::Finance, day()).await.unwrap().is_some());

        subscriptions::create_trial(&db, 1, day()).await.unwrap();
        assert!(check(&db, &admin, Access::Finance, day()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscription_area_is_admin_only() {
        let db = Db::memory();
        let owner = users::add_user(&db, 2, "o", "O", Role::Owner).await.unwrap();
        let admin = users::add_user(&db, 1, "a", "A", Role::Admin).await.unwrap();
        assert!(check(&db, &owner, Access::AdminOnly, day()).await.unwrap().is_some());
        assert!(check(&db, &admin, Access::AdminOnly, day()).await.unwrap().is_none());
        assert!(check(&db, &owner, Access::Staff, day()).await.unwrap().is_none());
    }
}
