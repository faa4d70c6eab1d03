use crate::db::Db;
use crate::error::Result;
use crate::models::{Role, User};

pub async fn get_all_users(db: &Db) -> Result<Vec<User>> {
    db.load::<User>().await
}

pub async fn get_user(db: &Db, user_id: i64) -> Result<Option<User>> {
    Ok(get_all_users(db)
        .await?
        .into_iter()
        .find(|u| u.user_id == user_id))
}

/// Registers the user unless already present; returns the stored row.
pub async fn add_user(
    db: &Db,
    user_id: i64,
    username: &str,
    full_name: &str,
    role: Role,
) -> Result<User> {
    let mut users = get_all_users(db).await?;
    if let Some(existing) = users.iter().find(|u| u.user_id == user_id) {
        return Ok(existing.clone());
    }

    let user = User {
        user_id,
        username: username.trim_start_matches('@').to_string(),
        full_name: full_name.to_string(),
        role,
    };
    users.push(user.clone());
    db.save(&users).await?;
    info!("Registered user {} as {}", user_id, role.as_str());
    Ok(user)
}

/// Returns false when the user is unknown.
pub async fn update_user_role(db: &Db, user_id: i64, role: Role) -> Result<bool> {
    let mut users = get_all_users(db).await?;
    let Some(user) = users.iter_mut().find(|u| u.user_id == user_id) else {
        return Ok(false);
    };
    user.role = role;
    db.save(&users).await?;
    Ok(true)
}

pub async fn get_users_by_role(db: &Db, role: Role) -> Result<Vec<User>> {
    Ok(get_all_users(db)
        .await?
        .into_iter()
        .filter(|u| u.role == role)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_user_is_idempotent() {
        let db = Db::memory();
        let first = add_user(&db, 1, "@anna", "Anna", Role::Client).await.unwrap();
        assert_eq!(first.username, "anna");
        let again = add_user(&db, 1, "other", "Other", Role::Admin).await.unwrap();
        assert_eq!(again.full_name, "Anna");
        assert_eq!(get_all_users(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_role_and_filter() {
        let db = Db::memory();
        add_user(&db, 1, "a", "A", Role::Client).await.unwrap();
        add_user(&db, 2, "b", "B", Role::Client).await.unwrap();
        assert!(update_user_role(&db, 2, Role::Admin).await.unwrap());
        assert!(!update_user_role(&db, 3, Role::Admin).await.unwrap());

        let admins = get_users_by_role(&db, Role::Admin).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].user_id, 2);
        assert_eq!(get_user(&db, 2).await.unwrap().unwrap().role, Role::Admin);
    }
}
