//! The `ReclaimEngine` façade.
//!
//! Every externally-triggered operation runs as one unit of work: the engine
//! opens a transaction, applies the registry/claim mutation together with its
//! notification appends and counter increments, and commits, or rolls the
//! whole operation back on the first error. Callers hand in an explicit
//! [`Principal`]; the engine holds no ambient session state.

use tracing::debug;

use crate::error::ReclaimError;
use crate::ledger::{self, CounterEvent};
use crate::report::SystemSnapshot;
use crate::store::{StorageConfig, Store};
use crate::types::{
    now, ActivityCounters, Administrator, Claim, ClaimAction, ClaimStatus, ClaimSummary,
    ContactInfo, Conversation, ConversationSummary, FoundItem, ItemKind, ItemStatus, LostItem,
    Message, NewFoundItem, NewLostItem, NewMessage, NewUser, Principal, ProofInfo, User,
};
use crate::{claims, directory, messaging, registry, report};

/// Active postings visible to a browsing user (everyone else's items).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ItemListing {
    pub found_items: Vec<FoundItem>,
    pub lost_items: Vec<LostItem>,
}

/// Everything a user's dashboard shows about their own activity.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserDashboard {
    pub found_items: Vec<FoundItem>,
    pub lost_items: Vec<LostItem>,
    pub claims_received: Vec<ClaimSummary>,
    pub unread_messages: i64,
}

/// A claim together with its target item, if the item still exists.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClaimView {
    pub claim: Claim,
    pub item: Option<FoundItem>,
}

/// Administrator view of one user: stored ledger counters on the user row,
/// live recomputed activity alongside.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserDetails {
    pub user: User,
    pub found_items: Vec<FoundItem>,
    pub lost_items: Vec<LostItem>,
    pub live_activity: ActivityCounters,
}

/// Admin dashboard aggregate: the full snapshot plus the badge count of
/// pending claims no administrator has acknowledged yet.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AdminOverview {
    pub snapshot: SystemSnapshot,
    pub pending_unacknowledged_claims: i64,
}

/// Engine over the shared relational store.
#[derive(Debug, Clone)]
pub struct ReclaimEngine {
    store: Store,
}

impl ReclaimEngine {
    pub async fn bootstrap(config: StorageConfig) -> Result<Self, ReclaimError> {
        let store = Store::bootstrap(config).await?;
        Ok(Self { store })
    }

    pub fn backend_label(&self) -> &'static str {
        self.store.backend_label()
    }

    fn require_admin(actor: &Principal, operation: &str) -> Result<(), ReclaimError> {
        if actor.is_admin {
            Ok(())
        } else {
            Err(ReclaimError::unauthorized(format!(
                "{operation} requires an administrator"
            )))
        }
    }

    // ---- identity directory ------------------------------------------------

    pub async fn register_user(&self, new_user: NewUser) -> Result<User, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let user = directory::insert_user(&mut tx, &new_user, now()).await?;
        tx.commit().await?;
        debug!(username = %user.username, "registered user");
        Ok(user)
    }

    pub async fn user(&self, username: &str) -> Result<Option<User>, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let user = directory::user_by_username(&mut tx, username).await?;
        tx.commit().await?;
        Ok(user)
    }

    /// Stamp `last_login`; invoked by the session collaborator after it has
    /// verified credentials.
    pub async fn record_login(&self, username: &str) -> Result<(), ReclaimError> {
        let mut tx = self.store.begin().await?;
        directory::record_login(&mut tx, username, now()).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn administrator(
        &self,
        username: &str,
    ) -> Result<Option<Administrator>, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let admin = directory::admin_by_username(&mut tx, username).await?;
        tx.commit().await?;
        Ok(admin)
    }

    /// Create the bootstrap administrator if it does not exist yet. Used at
    /// service startup; a no-op when the account is already present.
    pub async fn seed_admin(
        &self,
        username: &str,
        credential_hash: &str,
    ) -> Result<Administrator, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let admin = match directory::admin_by_username(&mut tx, username).await? {
            Some(existing) => existing,
            None => {
                directory::insert_admin(&mut tx, username, credential_hash, Some("system"), now())
                    .await?
            }
        };
        tx.commit().await?;
        Ok(admin)
    }

    pub async fn register_admin(
        &self,
        actor: &Principal,
        username: &str,
        credential_hash: &str,
    ) -> Result<Administrator, ReclaimError> {
        Self::require_admin(actor, "creating administrators")?;
        let mut tx = self.store.begin().await?;
        let admin = directory::insert_admin(
            &mut tx,
            username,
            credential_hash,
            Some(actor.username.as_str()),
            now(),
        )
        .await?;
        tx.commit().await?;
        Ok(admin)
    }

    /// Unconditional activation toggle; pending claims do not block it.
    /// Returns the new `is_active` state.
    pub async fn toggle_user_active(
        &self,
        actor: &Principal,
        username: &str,
    ) -> Result<bool, ReclaimError> {
        Self::require_admin(actor, "toggling user activation")?;
        let mut tx = self.store.begin().await?;
        let active = directory::toggle_active(&mut tx, username).await?;
        tx.commit().await?;
        debug!(username, active, "toggled user activation");
        Ok(active)
    }

    pub async fn user_details(
        &self,
        actor: &Principal,
        username: &str,
    ) -> Result<UserDetails, ReclaimError> {
        Self::require_admin(actor, "inspecting user details")?;
        let mut tx = self.store.begin().await?;
        let user = directory::require_user(&mut tx, username).await?;
        let found_items = registry::found_by_poster(&mut tx, username).await?;
        let lost_items = registry::lost_by_poster(&mut tx, username).await?;
        let live_activity = directory::recompute_activity(&mut tx, username).await?;
        tx.commit().await?;
        Ok(UserDetails {
            user,
            found_items,
            lost_items,
            live_activity,
        })
    }

    // ---- item registry -----------------------------------------------------

    pub async fn post_found_item(
        &self,
        actor: &Principal,
        item: NewFoundItem,
    ) -> Result<FoundItem, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let posted = registry::insert_found(&mut tx, &actor.username, &item, now()).await?;
        ledger::apply(
            &mut tx,
            &CounterEvent::FoundItemPosted {
                poster: actor.username.clone(),
            },
        )
        .await?;
        tx.commit().await?;
        debug!(item = posted.id, poster = %actor.username, "posted found item");
        Ok(posted)
    }

    pub async fn post_lost_item(
        &self,
        actor: &Principal,
        item: NewLostItem,
    ) -> Result<LostItem, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let posted = registry::insert_lost(&mut tx, &actor.username, &item, now()).await?;
        ledger::apply(
            &mut tx,
            &CounterEvent::LostItemPosted {
                poster: actor.username.clone(),
            },
        )
        .await?;
        tx.commit().await?;
        debug!(item = posted.id, poster = %actor.username, "posted lost item");
        Ok(posted)
    }

    pub async fn browse_items(&self, actor: &Principal) -> Result<ItemListing, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let found_items = registry::active_found_excluding(&mut tx, &actor.username).await?;
        let lost_items = registry::active_lost_excluding(&mut tx, &actor.username).await?;
        tx.commit().await?;
        Ok(ItemListing {
            found_items,
            lost_items,
        })
    }

    pub async fn found_item(&self, id: i64) -> Result<Option<FoundItem>, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let item = registry::found_item(&mut tx, id).await?;
        tx.commit().await?;
        Ok(item)
    }

    pub async fn lost_item(&self, id: i64) -> Result<Option<LostItem>, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let item = registry::lost_item(&mut tx, id).await?;
        tx.commit().await?;
        Ok(item)
    }

    pub async fn dashboard(&self, actor: &Principal) -> Result<UserDashboard, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let found_items = registry::found_by_poster(&mut tx, &actor.username).await?;
        let lost_items = registry::lost_by_poster(&mut tx, &actor.username).await?;
        let claims_received = claims::received_by_owner(&mut tx, &actor.username).await?;
        let unread_messages = messaging::unread_count(&mut tx, &actor.username).await?;
        tx.commit().await?;
        Ok(UserDashboard {
            found_items,
            lost_items,
            claims_received,
            unread_messages,
        })
    }

    /// Force an item's status to an arbitrary string. No enum validation at
    /// this boundary: the administrator override is the documented open end
    /// of the status set.
    pub async fn mark_item_status(
        &self,
        actor: &Principal,
        kind: ItemKind,
        id: i64,
        status: &str,
    ) -> Result<(), ReclaimError> {
        Self::require_admin(actor, "marking item status")?;
        let mut tx = self.store.begin().await?;
        let updated = registry::set_status(&mut tx, kind, id, &ItemStatus::parse(status)).await?;
        if !updated {
            return Err(ReclaimError::not_found(format!("{kind} item {id}")));
        }
        tx.commit().await?;
        debug!(%kind, id, status, "marked item status");
        Ok(())
    }

    /// Hard delete. Claims pointing at the item are left dangling on purpose;
    /// stored activity counters are not decremented.
    pub async fn delete_item(
        &self,
        actor: &Principal,
        kind: ItemKind,
        id: i64,
    ) -> Result<(), ReclaimError> {
        Self::require_admin(actor, "deleting items")?;
        let mut tx = self.store.begin().await?;
        let deleted = registry::delete(&mut tx, kind, id).await?;
        if !deleted {
            return Err(ReclaimError::not_found(format!("{kind} item {id}")));
        }
        tx.commit().await?;
        debug!(%kind, id, "deleted item");
        Ok(())
    }

    // ---- claim engine ------------------------------------------------------

    /// Submit an ownership claim against an active found item.
    ///
    /// Creates the pending claim, notifies the item's poster, and increments
    /// both parties' claim counters in one transaction. The item's status is
    /// left untouched, so several pending claims may coexist against one
    /// item.
    pub async fn submit_claim(
        &self,
        actor: &Principal,
        found_item_id: i64,
        contact: ContactInfo,
        proof: ProofInfo,
    ) -> Result<Claim, ReclaimError> {
        let mut tx = self.store.begin().await?;

        let item = registry::found_item(&mut tx, found_item_id)
            .await?
            .filter(|item| item.status.is_active())
            .ok_or_else(|| {
                ReclaimError::not_found(format!(
                    "found item {found_item_id} does not exist or is no longer open to claims"
                ))
            })?;
        if item.posted_by == actor.username {
            return Err(ReclaimError::SelfClaimForbidden);
        }

        let submitted_at = now();
        let claim =
            claims::insert(&mut tx, &item, &actor.username, &contact, &proof, submitted_at)
                .await?;
        messaging::notify_claim_submitted(&mut tx, &item, claim.id, submitted_at).await?;
        ledger::apply(
            &mut tx,
            &CounterEvent::ClaimSubmitted {
                claimant: actor.username.clone(),
                owner: item.posted_by.clone(),
            },
        )
        .await?;

        tx.commit().await?;
        debug!(claim = claim.id, item = found_item_id, claimant = %actor.username, "submitted claim");
        Ok(claim)
    }

    /// Resolve a claim as its owning poster or as an administrator.
    ///
    /// Approval marks the target item claimed; rejection leaves it active and
    /// claimable by others. Administrator resolutions additionally notify the
    /// owner and set `admin_notified`.
    ///
    /// There is deliberately no pending-only guard here: resolving an
    /// already-resolved claim re-applies a terminal status, and two racing
    /// resolutions are last-write-wins. Known limitation, kept for parity
    /// with the established workflow.
    pub async fn resolve_claim(
        &self,
        actor: &Principal,
        claim_id: i64,
        action: ClaimAction,
    ) -> Result<Claim, ReclaimError> {
        let mut tx = self.store.begin().await?;

        let claim = claims::require(&mut tx, claim_id).await?;
        if !actor.is_admin && actor.username != claim.owner_username {
            return Err(ReclaimError::unauthorized(
                "only the item's poster or an administrator may resolve this claim",
            ));
        }

        let status = match action {
            ClaimAction::Approve => ClaimStatus::Approved,
            ClaimAction::Reject => ClaimStatus::Rejected,
        };
        claims::set_status(&mut tx, claim_id, status).await?;
        if action == ClaimAction::Approve {
            registry::set_status(
                &mut tx,
                ItemKind::Found,
                claim.found_item_id,
                &ItemStatus::Claimed,
            )
            .await?;
        }

        // The item may have been hard-deleted under the claim; notify with a
        // placeholder name instead of failing the resolution.
        let item_name = registry::found_item(&mut tx, claim.found_item_id)
            .await?
            .map(|item| item.device_name)
            .unwrap_or_else(|| "the item".to_string());
        messaging::notify_resolution(&mut tx, &claim, &item_name, action, actor.is_admin, now())
            .await?;
        if actor.is_admin {
            claims::set_admin_notified(&mut tx, claim_id).await?;
        }

        let resolved = claims::require(&mut tx, claim_id).await?;
        tx.commit().await?;
        debug!(claim = claim_id, ?action, admin = actor.is_admin, "resolved claim");
        Ok(resolved)
    }

    /// Fetch a claim with its target item. Visible to the claimant, the
    /// owner, and administrators.
    pub async fn claim(
        &self,
        actor: &Principal,
        claim_id: i64,
    ) -> Result<ClaimView, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let claim = claims::require(&mut tx, claim_id).await?;
        let authorized = actor.is_admin
            || actor.username == claim.owner_username
            || actor.username == claim.claimant_username;
        if !authorized {
            return Err(ReclaimError::unauthorized(
                "only the claimant, the item's poster, or an administrator may view this claim",
            ));
        }
        let item = registry::found_item(&mut tx, claim.found_item_id).await?;
        tx.commit().await?;
        Ok(ClaimView { claim, item })
    }

    /// Mark a claim as seen by an administrator without resolving it.
    pub async fn acknowledge_claim(
        &self,
        actor: &Principal,
        claim_id: i64,
    ) -> Result<Claim, ReclaimError> {
        Self::require_admin(actor, "acknowledging claims")?;
        let mut tx = self.store.begin().await?;
        claims::require(&mut tx, claim_id).await?;
        claims::set_admin_notified(&mut tx, claim_id).await?;
        let claim = claims::require(&mut tx, claim_id).await?;
        tx.commit().await?;
        Ok(claim)
    }

    pub async fn claims_for_item(
        &self,
        actor: &Principal,
        found_item_id: i64,
    ) -> Result<Vec<Claim>, ReclaimError> {
        Self::require_admin(actor, "listing an item's claims")?;
        let mut tx = self.store.begin().await?;
        let claims = claims::for_item(&mut tx, found_item_id).await?;
        tx.commit().await?;
        Ok(claims)
    }

    pub async fn pending_unacknowledged_claims(
        &self,
        actor: &Principal,
    ) -> Result<i64, ReclaimError> {
        Self::require_admin(actor, "counting pending claims")?;
        let mut tx = self.store.begin().await?;
        let count = claims::pending_unacknowledged_count(&mut tx).await?;
        tx.commit().await?;
        Ok(count)
    }

    pub async fn delete_claim(&self, actor: &Principal, claim_id: i64) -> Result<(), ReclaimError> {
        Self::require_admin(actor, "deleting claims")?;
        let mut tx = self.store.begin().await?;
        let deleted = claims::delete(&mut tx, claim_id).await?;
        if !deleted {
            return Err(ReclaimError::not_found(format!("claim {claim_id}")));
        }
        tx.commit().await?;
        debug!(claim = claim_id, "deleted claim");
        Ok(())
    }

    // ---- messaging ---------------------------------------------------------

    /// Send a direct message. Administrator senders are recorded under their
    /// own username with the `from_admin` marker.
    pub async fn send_message(
        &self,
        actor: &Principal,
        message: NewMessage,
    ) -> Result<Message, ReclaimError> {
        let mut tx = self.store.begin().await?;
        directory::require_user(&mut tx, &message.recipient).await?;
        let sent =
            messaging::append(&mut tx, &actor.username, &message, actor.is_admin, now()).await?;
        tx.commit().await?;
        Ok(sent)
    }

    /// Send the canned first-contact message about an item listing.
    pub async fn item_inquiry(
        &self,
        actor: &Principal,
        kind: ItemKind,
        item_id: i64,
        recipient: &str,
    ) -> Result<Message, ReclaimError> {
        let mut tx = self.store.begin().await?;

        let device_name = match kind {
            ItemKind::Found => registry::found_item(&mut tx, item_id)
                .await?
                .map(|item| item.device_name),
            ItemKind::Lost => registry::lost_item(&mut tx, item_id)
                .await?
                .map(|item| item.device_name),
        }
        .ok_or_else(|| ReclaimError::not_found(format!("{kind} item {item_id}")))?;
        directory::require_user(&mut tx, recipient).await?;

        let body = format!(
            "Hello, I'm interested in your {kind} item '{device_name}'. Can we discuss this?"
        );
        let message = NewMessage::new(recipient, body).about_item(item_id, kind);
        let sent =
            messaging::append(&mut tx, &actor.username, &message, actor.is_admin, now()).await?;
        tx.commit().await?;
        Ok(sent)
    }

    /// Load the thread with `other` and mark its unread messages to the
    /// caller as read (see [`Conversation::newly_read`]).
    pub async fn conversation(
        &self,
        actor: &Principal,
        other: &str,
    ) -> Result<Conversation, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let conversation = messaging::conversation(&mut tx, &actor.username, other).await?;
        tx.commit().await?;
        Ok(conversation)
    }

    pub async fn conversations(
        &self,
        actor: &Principal,
    ) -> Result<Vec<ConversationSummary>, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let summaries = messaging::conversation_list(&mut tx, &actor.username).await?;
        tx.commit().await?;
        Ok(summaries)
    }

    pub async fn unread_count(&self, actor: &Principal) -> Result<i64, ReclaimError> {
        let mut tx = self.store.begin().await?;
        let count = messaging::unread_count(&mut tx, &actor.username).await?;
        tx.commit().await?;
        Ok(count)
    }

    // ---- reporting ---------------------------------------------------------

    /// Consistent five-table snapshot for the reporting collaborator.
    pub async fn system_snapshot(&self, actor: &Principal) -> Result<SystemSnapshot, ReclaimError> {
        Self::require_admin(actor, "capturing a system snapshot")?;
        let mut tx = self.store.begin().await?;
        let snapshot = report::collect(&mut tx).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    pub async fn admin_overview(&self, actor: &Principal) -> Result<AdminOverview, ReclaimError> {
        Self::require_admin(actor, "loading the admin overview")?;
        let mut tx = self.store.begin().await?;
        let snapshot = report::collect(&mut tx).await?;
        let pending_unacknowledged_claims = claims::pending_unacknowledged_count(&mut tx).await?;
        tx.commit().await?;
        Ok(AdminOverview {
            snapshot,
            pending_unacknowledged_claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SYSTEM_SENDER;

    async fn engine() -> ReclaimEngine {
        ReclaimEngine::bootstrap(StorageConfig::memory())
            .await
            .unwrap()
    }

    async fn register(engine: &ReclaimEngine, username: &str) -> Principal {
        engine
            .register_user(NewUser::new(
                username,
                format!("{username}@campus.edu"),
                "$argon2id$stub",
            ))
            .await
            .unwrap();
        Principal::user(username)
    }

    fn contact(phone: &str) -> ContactInfo {
        ContactInfo {
            phone_number: phone.to_string(),
            address: "12 Dorm Lane".to_string(),
            contact_method: Some("phone".to_string()),
        }
    }

    #[tokio::test]
    async fn submit_creates_pending_claim_and_notifies_owner() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let bob = register(&engine, "bob").await;

        let item = engine
            .post_found_item(&alice, NewFoundItem::new("blue backpack", "library steps"))
            .await
            .unwrap();
        assert!(item.status.is_active());

        let claim = engine
            .submit_claim(&bob, item.id, contact("555-1234"), ProofInfo::default())
            .await
            .unwrap();
        assert_eq!(claim.status, ClaimStatus::Pending);
        assert_eq!(claim.claimant_username, "bob");
        assert_eq!(claim.owner_username, "alice");
        assert_eq!(claim.phone_number, "555-1234");
        assert!(!claim.admin_notified);

        // The item itself stays active so further claims remain possible.
        let item = engine.found_item(item.id).await.unwrap().unwrap();
        assert!(item.status.is_active());

        // Exactly one notification, from the system actor, wired to the
        // item and the claim.
        let thread = engine.conversation(&alice, SYSTEM_SENDER).await.unwrap();
        assert_eq!(thread.messages.len(), 1);
        let notice = &thread.messages[0];
        assert_eq!(notice.sender, SYSTEM_SENDER);
        assert_eq!(notice.recipient, "alice");
        assert_eq!(notice.item_id, Some(item.id));
        assert_eq!(notice.item_kind, Some(ItemKind::Found));
        assert_eq!(notice.claim_id, Some(claim.id));
        assert!(notice.body.contains("blue backpack"));

        let alice_row = engine.user("alice").await.unwrap().unwrap();
        let bob_row = engine.user("bob").await.unwrap().unwrap();
        assert_eq!(alice_row.activity.claims_received, 1);
        assert_eq!(alice_row.activity.items_found, 1);
        assert_eq!(alice_row.activity.total_items_posted, 1);
        assert_eq!(bob_row.activity.claims_made, 1);
    }

    #[tokio::test]
    async fn self_claim_fails_without_side_effects() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let item = engine
            .post_found_item(&alice, NewFoundItem::new("umbrella", "bus stop"))
            .await
            .unwrap();

        let err = engine
            .submit_claim(&alice, item.id, contact("555-0000"), ProofInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReclaimError::SelfClaimForbidden));

        let alice_row = engine.user("alice").await.unwrap().unwrap();
        assert_eq!(alice_row.activity.claims_made, 0);
        assert_eq!(alice_row.activity.claims_received, 0);
        assert_eq!(engine.unread_count(&alice).await.unwrap(), 0);
        let dashboard = engine.dashboard(&alice).await.unwrap();
        assert!(dashboard.claims_received.is_empty());
    }

    #[tokio::test]
    async fn submit_against_missing_or_inactive_item_is_not_found() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let bob = register(&engine, "bob").await;

        let err = engine
            .submit_claim(&bob, 999, contact("555-1111"), ProofInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReclaimError::NotFound(_)));

        let admin = Principal::admin("root");
        let item = engine
            .post_found_item(&alice, NewFoundItem::new("charger", "lab 3"))
            .await
            .unwrap();
        engine
            .mark_item_status(&admin, ItemKind::Found, item.id, "archived")
            .await
            .unwrap();
        let err = engine
            .submit_claim(&bob, item.id, contact("555-1111"), ProofInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReclaimError::NotFound(_)));
    }

    #[tokio::test]
    async fn owner_approval_claims_item_and_notifies_claimant() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let bob = register(&engine, "bob").await;

        let item = engine
            .post_found_item(&alice, NewFoundItem::new("blue backpack", "library steps"))
            .await
            .unwrap();
        let claim = engine
            .submit_claim(&bob, item.id, contact("555-1234"), ProofInfo::default())
            .await
            .unwrap();

        let resolved = engine
            .resolve_claim(&alice, claim.id, ClaimAction::Approve)
            .await
            .unwrap();
        assert_eq!(resolved.status, ClaimStatus::Approved);
        assert!(!resolved.admin_notified);

        let item = engine.found_item(item.id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Claimed);

        let thread = engine.conversation(&bob, SYSTEM_SENDER).await.unwrap();
        assert_eq!(thread.messages.len(), 1);
        assert!(thread.messages[0].body.contains("approved"));
        assert!(!thread.messages[0].from_admin);
    }

    #[tokio::test]
    async fn rejection_leaves_item_claimable() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let bob = register(&engine, "bob").await;
        let carol = register(&engine, "carol").await;

        let item = engine
            .post_found_item(&alice, NewFoundItem::new("scarf", "cafeteria"))
            .await
            .unwrap();
        let claim = engine
            .submit_claim(&bob, item.id, contact("555-1234"), ProofInfo::default())
            .await
            .unwrap();

        let resolved = engine
            .resolve_claim(&alice, claim.id, ClaimAction::Reject)
            .await
            .unwrap();
        assert_eq!(resolved.status, ClaimStatus::Rejected);

        let item = engine.found_item(item.id).await.unwrap().unwrap();
        assert!(item.status.is_active());

        let thread = engine.conversation(&bob, SYSTEM_SENDER).await.unwrap();
        assert!(thread.messages[0].body.contains("rejected"));

        // The rejected item is still open to a different claimant.
        engine
            .submit_claim(&carol, item.id, contact("555-9999"), ProofInfo::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn resolution_requires_owner_or_admin() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let bob = register(&engine, "bob").await;
        let carol = register(&engine, "carol").await;

        let item = engine
            .post_found_item(&alice, NewFoundItem::new("keys", "gym"))
            .await
            .unwrap();
        let claim = engine
            .submit_claim(&bob, item.id, contact("555-1234"), ProofInfo::default())
            .await
            .unwrap();

        let err = engine
            .resolve_claim(&carol, claim.id, ClaimAction::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, ReclaimError::Unauthorized(_)));

        // Even the claimant cannot resolve their own claim.
        let err = engine
            .resolve_claim(&bob, claim.id, ClaimAction::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, ReclaimError::Unauthorized(_)));

        let view = engine.claim(&alice, claim.id).await.unwrap();
        assert_eq!(view.claim.status, ClaimStatus::Pending);
    }

    #[tokio::test]
    async fn admin_resolution_messages_both_parties_and_flags_claim() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let bob = register(&engine, "bob").await;
        let admin = Principal::admin("root");

        let item = engine
            .post_found_item(&alice, NewFoundItem::new("laptop", "lecture hall"))
            .await
            .unwrap();
        let claim = engine
            .submit_claim(&bob, item.id, contact("555-1234"), ProofInfo::default())
            .await
            .unwrap();

        let resolved = engine
            .resolve_claim(&admin, claim.id, ClaimAction::Approve)
            .await
            .unwrap();
        assert_eq!(resolved.status, ClaimStatus::Approved);
        assert!(resolved.admin_notified);

        let bob_thread = engine.conversation(&bob, SYSTEM_SENDER).await.unwrap();
        assert_eq!(bob_thread.messages.len(), 1);
        assert!(bob_thread.messages[0].body.starts_with("ADMIN ACTION:"));
        assert!(bob_thread.messages[0].from_admin);

        // Owner gets the submit notice plus the administrative one.
        let alice_thread = engine.conversation(&alice, SYSTEM_SENDER).await.unwrap();
        assert_eq!(alice_thread.messages.len(), 2);
        assert!(alice_thread.messages[1].body.starts_with("ADMIN ACTION:"));
    }

    #[tokio::test]
    async fn claim_against_already_claimed_item_is_accepted() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let bob = register(&engine, "bob").await;
        let carol = register(&engine, "carol").await;

        let item = engine
            .post_found_item(&alice, NewFoundItem::new("blue backpack", "library steps"))
            .await
            .unwrap();
        let bobs = engine
            .submit_claim(&bob, item.id, contact("555-1234"), ProofInfo::default())
            .await
            .unwrap();
        // Nothing blocks a second pending claim against the same item.
        let carols = engine
            .submit_claim(&carol, item.id, contact("555-7777"), ProofInfo::default())
            .await
            .unwrap();
        assert_eq!(carols.status, ClaimStatus::Pending);

        engine
            .resolve_claim(&alice, bobs.id, ClaimAction::Approve)
            .await
            .unwrap();

        // Submit guards on the item's status, so a brand-new claim against
        // the claimed item is refused...
        let dave = register(&engine, "dave").await;
        let err = engine
            .submit_claim(&dave, item.id, contact("555-2222"), ProofInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReclaimError::NotFound(_)));

        // ...but resolve runs no such guard: carol's earlier claim on the
        // now-claimed item can still be approved, and the already-approved
        // claim can even be re-resolved, last write winning.
        let approved = engine
            .resolve_claim(&alice, carols.id, ClaimAction::Approve)
            .await
            .unwrap();
        assert_eq!(approved.status, ClaimStatus::Approved);

        let rerun = engine
            .resolve_claim(&alice, bobs.id, ClaimAction::Reject)
            .await
            .unwrap();
        assert_eq!(rerun.status, ClaimStatus::Rejected);
    }

    #[tokio::test]
    async fn conversation_orders_and_marks_read() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let bob = register(&engine, "bob").await;

        for i in 0..3 {
            engine
                .send_message(&alice, NewMessage::new("bob", format!("from alice {i}")))
                .await
                .unwrap();
            engine
                .send_message(&bob, NewMessage::new("alice", format!("from bob {i}")))
                .await
                .unwrap();
        }

        assert_eq!(engine.unread_count(&alice).await.unwrap(), 3);

        let thread = engine.conversation(&alice, "bob").await.unwrap();
        assert_eq!(thread.messages.len(), 6);
        assert!(thread
            .messages
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));
        assert_eq!(thread.newly_read, 3);

        // Second read has nothing left to flip.
        let again = engine.conversation(&alice, "bob").await.unwrap();
        assert_eq!(again.newly_read, 0);
        assert_eq!(engine.unread_count(&alice).await.unwrap(), 0);

        // Bob's side is untouched until he opens the thread himself.
        assert_eq!(engine.unread_count(&bob).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn conversation_list_orders_by_recency() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let bob = register(&engine, "bob").await;
        let carol = register(&engine, "carol").await;

        engine
            .send_message(&bob, NewMessage::new("alice", "hi from bob"))
            .await
            .unwrap();
        engine
            .send_message(&carol, NewMessage::new("alice", "hi from carol"))
            .await
            .unwrap();

        let list = engine.conversations(&alice).await.unwrap();
        assert_eq!(list.len(), 2);
        // carol's message landed last; equal-second ties fall back to
        // storage order, which still puts carol first.
        assert_eq!(list[0].other_user, "carol");
        assert_eq!(list[0].last_message, "hi from carol");
        assert_eq!(list[1].other_user, "bob");
    }

    #[tokio::test]
    async fn messages_to_unknown_recipients_are_rejected() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;

        let err = engine
            .send_message(&alice, NewMessage::new("nobody", "hello?"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReclaimError::NotFound(_)));
    }

    #[tokio::test]
    async fn item_inquiry_links_the_item() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let bob = register(&engine, "bob").await;

        let item = engine
            .post_lost_item(&alice, NewLostItem::new("red phone", "quad"))
            .await
            .unwrap();
        let sent = engine
            .item_inquiry(&bob, ItemKind::Lost, item.id, "alice")
            .await
            .unwrap();
        assert_eq!(sent.recipient, "alice");
        assert_eq!(sent.item_id, Some(item.id));
        assert_eq!(sent.item_kind, Some(ItemKind::Lost));
        assert!(sent.body.contains("red phone"));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let engine = engine().await;
        register(&engine, "alice").await;

        let err = engine
            .register_user(NewUser::new("alice", "other@campus.edu", "$argon2id$stub"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReclaimError::Conflict(_)));
    }

    #[tokio::test]
    async fn hard_delete_keeps_ledger_counters_but_shrinks_live_activity() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let bob = register(&engine, "bob").await;
        let admin = Principal::admin("root");

        let item = engine
            .post_found_item(&alice, NewFoundItem::new("watch", "track field"))
            .await
            .unwrap();
        engine
            .submit_claim(&bob, item.id, contact("555-1234"), ProofInfo::default())
            .await
            .unwrap();
        engine
            .delete_item(&admin, ItemKind::Found, item.id)
            .await
            .unwrap();

        // Stored counters are a cumulative ledger and keep the activity.
        let alice_row = engine.user("alice").await.unwrap().unwrap();
        assert_eq!(alice_row.activity.items_found, 1);
        assert_eq!(alice_row.activity.claims_received, 1);

        // The recomputed view reflects the delete; the claim drops out too
        // because its item join is gone.
        let details = engine.user_details(&admin, "alice").await.unwrap();
        assert_eq!(details.live_activity.items_found, 0);
        assert_eq!(details.live_activity.claims_received, 0);

        // The dangling claim is still readable on its own.
        let bob_details = engine.user_details(&admin, "bob").await.unwrap();
        assert_eq!(bob_details.live_activity.claims_made, 1);
    }

    #[tokio::test]
    async fn deactivation_toggle_is_unconditional() {
        let engine = engine().await;
        register(&engine, "alice").await;
        let admin = Principal::admin("root");

        assert!(!engine.toggle_user_active(&admin, "alice").await.unwrap());
        assert!(engine.toggle_user_active(&admin, "alice").await.unwrap());

        let user = Principal::user("alice");
        let err = engine.toggle_user_active(&user, "alice").await.unwrap_err();
        assert!(matches!(err, ReclaimError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn acknowledge_marks_claim_without_resolving() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let bob = register(&engine, "bob").await;
        let admin = Principal::admin("root");

        let item = engine
            .post_found_item(&alice, NewFoundItem::new("wallet", "bookstore"))
            .await
            .unwrap();
        let claim = engine
            .submit_claim(&bob, item.id, contact("555-1234"), ProofInfo::default())
            .await
            .unwrap();

        assert_eq!(engine.pending_unacknowledged_claims(&admin).await.unwrap(), 1);
        let acknowledged = engine.acknowledge_claim(&admin, claim.id).await.unwrap();
        assert!(acknowledged.admin_notified);
        assert_eq!(acknowledged.status, ClaimStatus::Pending);
        assert_eq!(engine.pending_unacknowledged_claims(&admin).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn snapshot_figures_match_fixtures() {
        let engine = engine().await;
        let alice = register(&engine, "alice").await;
        let bob = register(&engine, "bob").await;
        let admin = Principal::admin("root");
        engine.seed_admin("root", "$argon2id$stub").await.unwrap();

        let first = engine
            .post_found_item(&alice, NewFoundItem::new("backpack", "library"))
            .await
            .unwrap();
        engine
            .post_found_item(&alice, NewFoundItem::new("bottle", "gym"))
            .await
            .unwrap();
        engine
            .post_lost_item(&bob, NewLostItem::new("headphones", "bus"))
            .await
            .unwrap();

        let claim = engine
            .submit_claim(&bob, first.id, contact("555-1234"), ProofInfo::default())
            .await
            .unwrap();
        engine
            .resolve_claim(&alice, claim.id, ClaimAction::Approve)
            .await
            .unwrap();
        engine.toggle_user_active(&admin, "bob").await.unwrap();

        let overview = engine.admin_overview(&admin).await.unwrap();
        let summary = &overview.snapshot.summary;
        assert_eq!(summary.total_users, 2);
        assert_eq!(summary.active_users, 1);
        assert_eq!(summary.inactive_users, 1);
        assert_eq!(summary.administrators, 1);
        assert_eq!(summary.found_items, 2);
        assert_eq!(summary.lost_items, 1);
        assert_eq!(summary.total_claims, 1);
        assert_eq!(summary.approved_claims, 1);
        assert_eq!(summary.pending_claims, 0);
        assert_eq!(overview.pending_unacknowledged_claims, 0);

        let found_stats = &overview.snapshot.statistics[0];
        assert_eq!(found_stats.total, 2);
        assert_eq!(found_stats.resolved, 1);
        assert_eq!(found_stats.resolution_rate, 50.0);

        // Snapshots are an administrator surface.
        let err = engine.system_snapshot(&alice).await.unwrap_err();
        assert!(matches!(err, ReclaimError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn admin_account_management() {
        let engine = engine().await;
        let admin = Principal::admin("root");
        engine.seed_admin("root", "$argon2id$stub").await.unwrap();
        // Seeding twice is a no-op, not a conflict.
        engine.seed_admin("root", "$argon2id$other").await.unwrap();

        let second = engine
            .register_admin(&admin, "deputy", "$argon2id$stub")
            .await
            .unwrap();
        assert_eq!(second.created_by.as_deref(), Some("root"));

        let err = engine
            .register_admin(&admin, "deputy", "$argon2id$stub")
            .await
            .unwrap_err();
        assert!(matches!(err, ReclaimError::Conflict(_)));

        let user = Principal::user("alice");
        let err = engine
            .register_admin(&user, "intruder", "$argon2id$stub")
            .await
            .unwrap_err();
        assert!(matches!(err, ReclaimError::Unauthorized(_)));
    }
}
