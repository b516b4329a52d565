//! Messaging log and notification dispatcher.
//!
//! Messages are append-only. Engine-triggered notifications are authored by
//! the reserved `"System"` sender and written inside the transaction of the
//! claim operation that produced them: if the append fails, the whole
//! operation rolls back rather than dropping the notification.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;

use crate::error::ReclaimError;
use crate::store::col;
use crate::types::{
    Claim, ClaimAction, Conversation, ConversationSummary, FoundItem, ItemKind, Message,
    NewMessage, SYSTEM_SENDER,
};

impl Message {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, ReclaimError> {
        let item_kind: Option<String> = col(row, "item_kind")?;
        Ok(Self {
            id: col(row, "id")?,
            sender: col(row, "sender")?,
            recipient: col(row, "recipient")?,
            subject: col(row, "subject")?,
            body: col(row, "body")?,
            item_id: col(row, "item_id")?,
            item_kind: item_kind.as_deref().map(ItemKind::parse).transpose()?,
            claim_id: col(row, "claim_id")?,
            timestamp: col(row, "timestamp")?,
            is_read: col(row, "is_read")?,
            from_admin: col(row, "from_admin")?,
        })
    }
}

/// Durable append. Every message starts unread.
pub(crate) async fn append(
    conn: &mut SqliteConnection,
    sender: &str,
    message: &NewMessage,
    from_admin: bool,
    timestamp: DateTime<Utc>,
) -> Result<Message, ReclaimError> {
    let result = sqlx::query(
        r#"
        INSERT INTO messages (
            sender, recipient, subject, body, item_id, item_kind, claim_id,
            timestamp, is_read, from_admin
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)
        "#,
    )
    .bind(sender)
    .bind(&message.recipient)
    .bind(&message.subject)
    .bind(&message.body)
    .bind(message.item_id)
    .bind(message.item_kind.map(ItemKind::as_str))
    .bind(message.claim_id)
    .bind(timestamp)
    .bind(from_admin)
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    let row = sqlx::query("SELECT * FROM messages WHERE id = ?1")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Message::from_row(&row)
}

/// Notify the item's poster that a new claim landed against their posting.
pub(crate) async fn notify_claim_submitted(
    conn: &mut SqliteConnection,
    item: &FoundItem,
    claim_id: i64,
    at: DateTime<Utc>,
) -> Result<Message, ReclaimError> {
    let body = format!(
        "New claim request for your found item '{}'. Please review the claim details.",
        item.device_name
    );
    let message = NewMessage::new(&item.posted_by, body)
        .about_item(item.id, ItemKind::Found)
        .about_claim(claim_id);
    append(conn, SYSTEM_SENDER, &message, false, at).await
}

/// Notify the parties of a resolution.
///
/// Owner-resolved claims message the claimant only. Administrator-resolved
/// claims message the claimant and additionally inform the owner of the
/// administrative action; those messages carry the `from_admin` marker even
/// though the sender stays `"System"`.
pub(crate) async fn notify_resolution(
    conn: &mut SqliteConnection,
    claim: &Claim,
    item_name: &str,
    action: ClaimAction,
    by_admin: bool,
    at: DateTime<Utc>,
) -> Result<(), ReclaimError> {
    let claimant_body = match (action, by_admin) {
        (ClaimAction::Approve, false) => format!(
            "Your claim for item '{item_name}' has been approved! Please contact the owner."
        ),
        (ClaimAction::Reject, false) => {
            format!("Your claim for item '{item_name}' has been rejected by the owner.")
        }
        (ClaimAction::Approve, true) => format!(
            "ADMIN ACTION: Your claim for item '{item_name}' has been approved by admin. \
             Please contact the owner."
        ),
        (ClaimAction::Reject, true) => {
            format!("ADMIN ACTION: Your claim for item '{item_name}' has been rejected by admin.")
        }
    };

    let to_claimant = NewMessage::new(&claim.claimant_username, claimant_body)
        .about_item(claim.found_item_id, ItemKind::Found)
        .about_claim(claim.id);
    append(conn, SYSTEM_SENDER, &to_claimant, by_admin, at).await?;

    if by_admin {
        let owner_body = match action {
            ClaimAction::Approve => format!(
                "ADMIN ACTION: The claim for your item '{item_name}' has been approved by admin."
            ),
            ClaimAction::Reject => format!(
                "ADMIN ACTION: The claim for your item '{item_name}' has been rejected by admin."
            ),
        };
        let to_owner = NewMessage::new(&claim.owner_username, owner_body)
            .about_item(claim.found_item_id, ItemKind::Found)
            .about_claim(claim.id);
        append(conn, SYSTEM_SENDER, &to_owner, true, at).await?;
    }

    Ok(())
}

/// The full two-party thread, ordered by timestamp then id ascending.
///
/// Viewing a conversation is deliberately not a pure read: every unread
/// message addressed to `viewer` from `other` is flipped to read, and the
/// number of flipped rows is reported back. The returned messages show their
/// state as of the read, before the flip.
pub(crate) async fn conversation(
    conn: &mut SqliteConnection,
    viewer: &str,
    other: &str,
) -> Result<Conversation, ReclaimError> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM messages
        WHERE (sender = ?1 AND recipient = ?2) OR (sender = ?2 AND recipient = ?1)
        ORDER BY timestamp ASC, id ASC
        "#,
    )
    .bind(viewer)
    .bind(other)
    .fetch_all(&mut *conn)
    .await?;
    let messages: Vec<Message> = rows.iter().map(Message::from_row).collect::<Result<_, _>>()?;

    let flipped = sqlx::query(
        "UPDATE messages SET is_read = 1 \
         WHERE recipient = ?1 AND sender = ?2 AND is_read = 0",
    )
    .bind(viewer)
    .bind(other)
    .execute(&mut *conn)
    .await?;

    Ok(Conversation {
        messages,
        newly_read: flipped.rows_affected(),
    })
}

/// One row per correspondent, most recent conversation first. Ties on the
/// last-message timestamp fall back to storage order.
pub(crate) async fn conversation_list(
    conn: &mut SqliteConnection,
    viewer: &str,
) -> Result<Vec<ConversationSummary>, ReclaimError> {
    let partner_rows = sqlx::query(
        r#"
        SELECT CASE WHEN sender = ?1 THEN recipient ELSE sender END AS other_user
        FROM messages
        WHERE sender = ?1 OR recipient = ?1
        GROUP BY other_user
        ORDER BY MAX(timestamp) DESC, MAX(id) DESC
        "#,
    )
    .bind(viewer)
    .fetch_all(&mut *conn)
    .await?;

    let mut summaries = Vec::with_capacity(partner_rows.len());
    for row in &partner_rows {
        let other_user: String = col(row, "other_user")?;
        if let Some(last) = latest_between(conn, viewer, &other_user).await? {
            summaries.push(ConversationSummary {
                other_user,
                last_message: last.body,
                last_message_time: last.timestamp,
            });
        }
    }
    Ok(summaries)
}

async fn latest_between(
    conn: &mut SqliteConnection,
    viewer: &str,
    other: &str,
) -> Result<Option<Message>, ReclaimError> {
    let row = sqlx::query(
        r#"
        SELECT * FROM messages
        WHERE (sender = ?1 AND recipient = ?2) OR (sender = ?2 AND recipient = ?1)
        ORDER BY timestamp DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(viewer)
    .bind(other)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(Message::from_row).transpose()
}

pub(crate) async fn unread_count(
    conn: &mut SqliteConnection,
    recipient: &str,
) -> Result<i64, ReclaimError> {
    let count =
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE recipient = ?1 AND is_read = 0")
            .bind(recipient)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count)
}
