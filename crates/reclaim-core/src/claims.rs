//! Claim store operations.
//!
//! The claim lifecycle is Pending -> Approved | Rejected, resolved exactly
//! once by the item's poster or an administrator in the intended flow. The
//! store layer deliberately does not guard transitions: `set_status` applies
//! whatever the engine decided, so two racing resolutions are last-write-wins
//! and a resolved claim can technically be re-resolved. The engine documents
//! and tests this permissiveness rather than hiding it.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;

use crate::error::ReclaimError;
use crate::store::col;
use crate::types::{Claim, ClaimStatus, ClaimSummary, ContactInfo, FoundItem, ProofInfo};

impl Claim {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, ReclaimError> {
        let status: String = col(row, "status")?;
        Ok(Self {
            id: col(row, "id")?,
            found_item_id: col(row, "found_item_id")?,
            claimant_username: col(row, "claimant_username")?,
            owner_username: col(row, "owner_username")?,
            phone_number: col(row, "phone_number")?,
            address: col(row, "address")?,
            contact_method: col(row, "contact_method")?,
            proof_description: col(row, "proof_description")?,
            proof_image_ref: col(row, "proof_image_ref")?,
            status: ClaimStatus::parse(&status)?,
            claim_date: col(row, "claim_date")?,
            admin_notified: col(row, "admin_notified")?,
        })
    }
}

pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    item: &FoundItem,
    claimant: &str,
    contact: &ContactInfo,
    proof: &ProofInfo,
    claim_date: DateTime<Utc>,
) -> Result<Claim, ReclaimError> {
    let result = sqlx::query(
        r#"
        INSERT INTO claims (
            found_item_id, claimant_username, owner_username, phone_number,
            address, contact_method, proof_description, proof_image_ref,
            status, claim_date
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9)
        "#,
    )
    .bind(item.id)
    .bind(claimant)
    .bind(&item.posted_by)
    .bind(&contact.phone_number)
    .bind(&contact.address)
    .bind(&contact.contact_method)
    .bind(&proof.description)
    .bind(&proof.image_ref)
    .bind(claim_date)
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    claim_by_id(conn, id)
        .await?
        .ok_or_else(|| ReclaimError::Storage("claim insert not visible".to_string()))
}

pub(crate) async fn claim_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Claim>, ReclaimError> {
    let row = sqlx::query("SELECT * FROM claims WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(Claim::from_row).transpose()
}

pub(crate) async fn require(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Claim, ReclaimError> {
    claim_by_id(conn, id)
        .await?
        .ok_or_else(|| ReclaimError::not_found(format!("claim {id}")))
}

pub(crate) async fn set_status(
    conn: &mut SqliteConnection,
    id: i64,
    status: ClaimStatus,
) -> Result<(), ReclaimError> {
    sqlx::query("UPDATE claims SET status = ?1 WHERE id = ?2")
        .bind(status.as_str())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn set_admin_notified(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<(), ReclaimError> {
    sqlx::query("UPDATE claims SET admin_notified = 1 WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Claims against a poster's items, joined through the live item row. The
/// join is on the item's poster, so claims whose item has been hard-deleted
/// do not appear here.
pub(crate) async fn received_by_owner(
    conn: &mut SqliteConnection,
    owner: &str,
) -> Result<Vec<ClaimSummary>, ReclaimError> {
    let rows = sqlx::query(
        r#"
        SELECT c.*, f.device_name AS item_device_name
        FROM claims c
        JOIN found_items f ON c.found_item_id = f.id
        WHERE f.posted_by = ?1
        ORDER BY c.claim_date DESC, c.id DESC
        "#,
    )
    .bind(owner)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ClaimSummary {
                claim: Claim::from_row(row)?,
                device_name: col(row, "item_device_name")?,
            })
        })
        .collect()
}

pub(crate) async fn for_item(
    conn: &mut SqliteConnection,
    found_item_id: i64,
) -> Result<Vec<Claim>, ReclaimError> {
    let rows = sqlx::query(
        "SELECT * FROM claims WHERE found_item_id = ?1 ORDER BY claim_date DESC, id DESC",
    )
    .bind(found_item_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(Claim::from_row).collect()
}

pub(crate) async fn all(conn: &mut SqliteConnection) -> Result<Vec<Claim>, ReclaimError> {
    let rows = sqlx::query("SELECT * FROM claims ORDER BY claim_date DESC, id DESC")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(Claim::from_row).collect()
}

/// Pending claims no administrator has looked at yet; the admin dashboard
/// badge.
pub(crate) async fn pending_unacknowledged_count(
    conn: &mut SqliteConnection,
) -> Result<i64, ReclaimError> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM claims WHERE status = 'pending' AND admin_notified = 0",
    )
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

/// Hard delete with no cascade; messages referencing the claim keep their
/// dangling `claim_id`.
pub(crate) async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool, ReclaimError> {
    let result = sqlx::query("DELETE FROM claims WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
