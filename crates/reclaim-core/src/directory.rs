//! Identity directory: user and administrator accounts.
//!
//! The directory is a leaf store. The counter columns it carries are mutated
//! only by the counter ledger (`crate::ledger`); `is_active` is mutated only
//! through the administrative toggle.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;

use crate::error::ReclaimError;
use crate::store::col;
use crate::types::{ActivityCounters, Administrator, NewUser, User, UserProfile};

impl User {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, ReclaimError> {
        Ok(Self {
            id: col(row, "id")?,
            username: col(row, "username")?,
            email: col(row, "email")?,
            credential_hash: col(row, "credential_hash")?,
            user_type: col(row, "user_type")?,
            profile: UserProfile {
                phone: col(row, "phone")?,
                full_name: col(row, "full_name")?,
                student_id: col(row, "student_id")?,
                department: col(row, "department")?,
                year: col(row, "year")?,
            },
            created_at: col(row, "created_at")?,
            last_login: col(row, "last_login")?,
            activity: ActivityCounters {
                total_items_posted: col(row, "total_items_posted")?,
                items_found: col(row, "items_found")?,
                items_lost: col(row, "items_lost")?,
                claims_made: col(row, "claims_made")?,
                claims_received: col(row, "claims_received")?,
            },
            is_active: col(row, "is_active")?,
        })
    }
}

impl Administrator {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, ReclaimError> {
        Ok(Self {
            id: col(row, "id")?,
            username: col(row, "username")?,
            credential_hash: col(row, "credential_hash")?,
            created_by: col(row, "created_by")?,
            created_at: col(row, "created_at")?,
        })
    }
}

pub(crate) async fn insert_user(
    conn: &mut SqliteConnection,
    new_user: &NewUser,
    created_at: DateTime<Utc>,
) -> Result<User, ReclaimError> {
    if user_by_username(conn, &new_user.username).await?.is_some() {
        return Err(ReclaimError::Conflict(format!(
            "username '{}' is already taken",
            new_user.username
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO users (
            username, email, credential_hash, phone, full_name,
            student_id, department, year, user_type, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.credential_hash)
    .bind(&new_user.profile.phone)
    .bind(&new_user.profile.full_name)
    .bind(&new_user.profile.student_id)
    .bind(&new_user.profile.department)
    .bind(&new_user.profile.year)
    .bind(&new_user.user_type)
    .bind(created_at)
    .execute(&mut *conn)
    .await?;

    require_user(conn, &new_user.username).await
}

pub(crate) async fn user_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<User>, ReclaimError> {
    let row = sqlx::query("SELECT * FROM users WHERE username = ?1")
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(User::from_row).transpose()
}

pub(crate) async fn require_user(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<User, ReclaimError> {
    user_by_username(conn, username)
        .await?
        .ok_or_else(|| ReclaimError::not_found(format!("user '{username}'")))
}

pub(crate) async fn list_users(conn: &mut SqliteConnection) -> Result<Vec<User>, ReclaimError> {
    let rows = sqlx::query("SELECT * FROM users ORDER BY created_at DESC, id DESC")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(User::from_row).collect()
}

pub(crate) async fn record_login(
    conn: &mut SqliteConnection,
    username: &str,
    at: DateTime<Utc>,
) -> Result<(), ReclaimError> {
    sqlx::query("UPDATE users SET last_login = ?1 WHERE username = ?2")
        .bind(at)
        .bind(username)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Flip `is_active` unconditionally; pending claims do not block
/// deactivation. Returns the new state.
pub(crate) async fn toggle_active(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<bool, ReclaimError> {
    let user = require_user(conn, username).await?;
    let next = !user.is_active;
    sqlx::query("UPDATE users SET is_active = ?1 WHERE username = ?2")
        .bind(next)
        .bind(username)
        .execute(&mut *conn)
        .await?;
    Ok(next)
}

/// Recount activity from the live registry and claim rows.
///
/// Unlike the stored counters this view shrinks when an administrator
/// hard-deletes items or claims. Claims received are joined through the
/// item's poster, so claims whose item has been deleted drop out here too.
pub(crate) async fn recompute_activity(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<ActivityCounters, ReclaimError> {
    let items_found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM found_items WHERE posted_by = ?1")
        .bind(username)
        .fetch_one(&mut *conn)
        .await?;
    let items_lost: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lost_items WHERE posted_by = ?1")
        .bind(username)
        .fetch_one(&mut *conn)
        .await?;
    let claims_made: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM claims WHERE claimant_username = ?1")
            .bind(username)
            .fetch_one(&mut *conn)
            .await?;
    let claims_received: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM claims c
        JOIN found_items f ON c.found_item_id = f.id
        WHERE f.posted_by = ?1
        "#,
    )
    .bind(username)
    .fetch_one(&mut *conn)
    .await?;

    Ok(ActivityCounters {
        total_items_posted: items_found + items_lost,
        items_found,
        items_lost,
        claims_made,
        claims_received,
    })
}

pub(crate) async fn insert_admin(
    conn: &mut SqliteConnection,
    username: &str,
    credential_hash: &str,
    created_by: Option<&str>,
    created_at: DateTime<Utc>,
) -> Result<Administrator, ReclaimError> {
    if admin_by_username(conn, username).await?.is_some() {
        return Err(ReclaimError::Conflict(format!(
            "administrator '{username}' already exists"
        )));
    }

    sqlx::query(
        "INSERT INTO administrators (username, credential_hash, created_by, created_at) \
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(username)
    .bind(credential_hash)
    .bind(created_by)
    .bind(created_at)
    .execute(&mut *conn)
    .await?;

    admin_by_username(conn, username)
        .await?
        .ok_or_else(|| ReclaimError::Storage("administrator insert not visible".to_string()))
}

pub(crate) async fn admin_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<Administrator>, ReclaimError> {
    let row = sqlx::query("SELECT * FROM administrators WHERE username = ?1")
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(Administrator::from_row).transpose()
}

pub(crate) async fn list_admins(
    conn: &mut SqliteConnection,
) -> Result<Vec<Administrator>, ReclaimError> {
    let rows = sqlx::query("SELECT * FROM administrators ORDER BY created_at DESC, id DESC")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(Administrator::from_row).collect()
}
