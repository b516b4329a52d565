//! Item registry: found-item and lost-item postings.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;

use crate::error::ReclaimError;
use crate::store::col;
use crate::types::{FoundItem, ItemKind, ItemStatus, LostItem, NewFoundItem, NewLostItem};

impl FoundItem {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, ReclaimError> {
        let status: String = col(row, "status")?;
        Ok(Self {
            id: col(row, "id")?,
            device_name: col(row, "device_name")?,
            description: col(row, "description")?,
            color: col(row, "color")?,
            location: col(row, "location")?,
            image_ref: col(row, "image_ref")?,
            posted_by: col(row, "posted_by")?,
            posted_date: col(row, "posted_date")?,
            status: ItemStatus::parse(&status),
        })
    }
}

impl LostItem {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, ReclaimError> {
        let status: String = col(row, "status")?;
        Ok(Self {
            id: col(row, "id")?,
            device_name: col(row, "device_name")?,
            description: col(row, "description")?,
            color: col(row, "color")?,
            location: col(row, "location")?,
            lost_date: col(row, "lost_date")?,
            image_ref: col(row, "image_ref")?,
            posted_by: col(row, "posted_by")?,
            posted_date: col(row, "posted_date")?,
            status: ItemStatus::parse(&status),
        })
    }
}

pub(crate) async fn insert_found(
    conn: &mut SqliteConnection,
    poster: &str,
    item: &NewFoundItem,
    posted_date: DateTime<Utc>,
) -> Result<FoundItem, ReclaimError> {
    let result = sqlx::query(
        r#"
        INSERT INTO found_items (
            device_name, description, color, location, image_ref,
            posted_by, posted_date, status
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active')
        "#,
    )
    .bind(&item.device_name)
    .bind(&item.description)
    .bind(&item.color)
    .bind(&item.location)
    .bind(&item.image_ref)
    .bind(poster)
    .bind(posted_date)
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    found_item(conn, id)
        .await?
        .ok_or_else(|| ReclaimError::Storage("found item insert not visible".to_string()))
}

pub(crate) async fn insert_lost(
    conn: &mut SqliteConnection,
    poster: &str,
    item: &NewLostItem,
    posted_date: DateTime<Utc>,
) -> Result<LostItem, ReclaimError> {
    let result = sqlx::query(
        r#"
        INSERT INTO lost_items (
            device_name, description, color, location, lost_date, image_ref,
            posted_by, posted_date, status
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active')
        "#,
    )
    .bind(&item.device_name)
    .bind(&item.description)
    .bind(&item.color)
    .bind(&item.location)
    .bind(item.lost_date)
    .bind(&item.image_ref)
    .bind(poster)
    .bind(posted_date)
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    lost_item(conn, id)
        .await?
        .ok_or_else(|| ReclaimError::Storage("lost item insert not visible".to_string()))
}

pub(crate) async fn found_item(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<FoundItem>, ReclaimError> {
    let row = sqlx::query("SELECT * FROM found_items WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(FoundItem::from_row).transpose()
}

pub(crate) async fn lost_item(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<LostItem>, ReclaimError> {
    let row = sqlx::query("SELECT * FROM lost_items WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(LostItem::from_row).transpose()
}

/// Active postings by everyone except `viewer`; the browse view.
pub(crate) async fn active_found_excluding(
    conn: &mut SqliteConnection,
    viewer: &str,
) -> Result<Vec<FoundItem>, ReclaimError> {
    let rows = sqlx::query(
        "SELECT * FROM found_items WHERE posted_by != ?1 AND status = 'active' \
         ORDER BY posted_date DESC, id DESC",
    )
    .bind(viewer)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(FoundItem::from_row).collect()
}

pub(crate) async fn active_lost_excluding(
    conn: &mut SqliteConnection,
    viewer: &str,
) -> Result<Vec<LostItem>, ReclaimError> {
    let rows = sqlx::query(
        "SELECT * FROM lost_items WHERE posted_by != ?1 AND status = 'active' \
         ORDER BY posted_date DESC, id DESC",
    )
    .bind(viewer)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(LostItem::from_row).collect()
}

pub(crate) async fn found_by_poster(
    conn: &mut SqliteConnection,
    poster: &str,
) -> Result<Vec<FoundItem>, ReclaimError> {
    let rows = sqlx::query(
        "SELECT * FROM found_items WHERE posted_by = ?1 ORDER BY posted_date DESC, id DESC",
    )
    .bind(poster)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(FoundItem::from_row).collect()
}

pub(crate) async fn lost_by_poster(
    conn: &mut SqliteConnection,
    poster: &str,
) -> Result<Vec<LostItem>, ReclaimError> {
    let rows = sqlx::query(
        "SELECT * FROM lost_items WHERE posted_by = ?1 ORDER BY posted_date DESC, id DESC",
    )
    .bind(poster)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(LostItem::from_row).collect()
}

pub(crate) async fn all_found(
    conn: &mut SqliteConnection,
) -> Result<Vec<FoundItem>, ReclaimError> {
    let rows = sqlx::query("SELECT * FROM found_items ORDER BY posted_date DESC, id DESC")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(FoundItem::from_row).collect()
}

pub(crate) async fn all_lost(conn: &mut SqliteConnection) -> Result<Vec<LostItem>, ReclaimError> {
    let rows = sqlx::query("SELECT * FROM lost_items ORDER BY posted_date DESC, id DESC")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(LostItem::from_row).collect()
}

/// Overwrite an item's status. The open `ItemStatus` set is accepted as-is:
/// the administrative mark-status override carries arbitrary strings.
pub(crate) async fn set_status(
    conn: &mut SqliteConnection,
    kind: ItemKind,
    id: i64,
    status: &ItemStatus,
) -> Result<bool, ReclaimError> {
    let sql = match kind {
        ItemKind::Found => "UPDATE found_items SET status = ?1 WHERE id = ?2",
        ItemKind::Lost => "UPDATE lost_items SET status = ?1 WHERE id = ?2",
    };
    let result = sqlx::query(sql)
        .bind(status.as_str())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Hard delete with no cascade: claims and messages that reference the item
/// keep their now-dangling ids.
pub(crate) async fn delete(
    conn: &mut SqliteConnection,
    kind: ItemKind,
    id: i64,
) -> Result<bool, ReclaimError> {
    let sql = match kind {
        ItemKind::Found => "DELETE FROM found_items WHERE id = ?1",
        ItemKind::Lost => "DELETE FROM lost_items WHERE id = ?1",
    };
    let result = sqlx::query(sql).bind(id).execute(&mut *conn).await?;
    Ok(result.rows_affected() > 0)
}
