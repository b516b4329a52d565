//! Counter ledger: per-user activity counters derived from registry and
//! claim events.
//!
//! The counters are cumulative. They are incremented inside the transaction
//! of the operation that produced the event and are never decremented, not
//! even when an administrator later hard-deletes the item or claim. They
//! record that the activity happened, not that its artifact still exists.
//! `directory::recompute_activity` is the live recount for callers that need
//! the other semantic.

use sqlx::SqliteConnection;

use crate::error::ReclaimError;

/// Registry and claim events the ledger reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterEvent {
    FoundItemPosted { poster: String },
    LostItemPosted { poster: String },
    ClaimSubmitted { claimant: String, owner: String },
}

/// Apply one event's increments.
///
/// Unknown usernames make the update a no-op rather than an error; the event
/// has already been validated by the operation that emitted it.
pub(crate) async fn apply(
    conn: &mut SqliteConnection,
    event: &CounterEvent,
) -> Result<(), ReclaimError> {
    match event {
        CounterEvent::FoundItemPosted { poster } => {
            sqlx::query(
                "UPDATE users SET items_found = items_found + 1, \
                 total_items_posted = total_items_posted + 1 WHERE username = ?1",
            )
            .bind(poster)
            .execute(&mut *conn)
            .await?;
        }
        CounterEvent::LostItemPosted { poster } => {
            sqlx::query(
                "UPDATE users SET items_lost = items_lost + 1, \
                 total_items_posted = total_items_posted + 1 WHERE username = ?1",
            )
            .bind(poster)
            .execute(&mut *conn)
            .await?;
        }
        CounterEvent::ClaimSubmitted { claimant, owner } => {
            sqlx::query("UPDATE users SET claims_made = claims_made + 1 WHERE username = ?1")
                .bind(claimant)
                .execute(&mut *conn)
                .await?;
            sqlx::query(
                "UPDATE users SET claims_received = claims_received + 1 WHERE username = ?1",
            )
            .bind(owner)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}
