use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ReclaimError;

/// Reserved sender identity for engine-generated notification messages.
pub const SYSTEM_SENDER: &str = "System";

/// Current time truncated to the second, the precision of every persisted
/// timestamp.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Authenticated actor threaded explicitly into every core call.
///
/// The session collaborator authenticates credentials once and hands the
/// engine this value; the core never re-validates them and holds no ambient
/// login state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub is_admin: bool,
}

impl Principal {
    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_admin: false,
        }
    }

    pub fn admin(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_admin: true,
        }
    }
}

/// Optional profile fields captured at registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub student_id: Option<String>,
    pub department: Option<String>,
    pub year: Option<String>,
}

/// Registration input for the identity directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    /// Opaque PHC hash produced by the credentials collaborator.
    pub credential_hash: String,
    pub user_type: String,
    pub profile: UserProfile,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        credential_hash: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            credential_hash: credential_hash.into(),
            user_type: "student".to_string(),
            profile: UserProfile::default(),
        }
    }

    pub fn with_user_type(mut self, user_type: impl Into<String>) -> Self {
        self.user_type = user_type.into();
        self
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = profile;
        self
    }
}

/// Cumulative per-user activity counters.
///
/// These are a ledger of increment events, not a live count: administrator
/// hard deletes never decrement them. `Directory::recompute_activity` gives
/// the live view when one is needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounters {
    pub total_items_posted: i64,
    pub items_found: i64,
    pub items_lost: i64,
    pub claims_made: i64,
    pub claims_received: i64,
}

/// A registered account. Never hard-deleted; deactivation is the only
/// destructive operation modeled.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub credential_hash: String,
    pub user_type: String,
    #[serde(flatten)]
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub activity: ActivityCounters,
    pub is_active: bool,
}

/// An administrator account, held apart from regular users.
#[derive(Debug, Clone, Serialize)]
pub struct Administrator {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub credential_hash: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Item status as a validated open set.
///
/// The engine only ever writes `Active` and `Claimed`; administrators may
/// force any other string through the mark-status override, which round-trips
/// through `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Active,
    Claimed,
    Other(String),
}

impl ItemStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "active" => Self::Active,
            "claimed" => Self::Claimed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Claimed => "claimed",
            Self::Other(status) => status,
        }
    }

    pub fn is_active(&self) -> bool {
        *self == Self::Active
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ItemStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

/// Which registry an item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Found,
    Lost,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::Lost => "lost",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ReclaimError> {
        match value {
            "found" => Ok(Self::Found),
            "lost" => Ok(Self::Lost),
            other => Err(ReclaimError::Storage(format!(
                "unknown item kind '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for posting a found item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFoundItem {
    pub device_name: String,
    pub location: String,
    pub description: Option<String>,
    pub color: Option<String>,
    /// Opaque reference returned by the file-storage collaborator.
    pub image_ref: Option<String>,
}

impl NewFoundItem {
    pub fn new(device_name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            location: location.into(),
            description: None,
            color: None,
            image_ref: None,
        }
    }

    pub fn with_details(
        mut self,
        description: Option<String>,
        color: Option<String>,
        image_ref: Option<String>,
    ) -> Self {
        self.description = description;
        self.color = color;
        self.image_ref = image_ref;
        self
    }
}

/// Input for posting a lost item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLostItem {
    pub device_name: String,
    pub location: String,
    pub lost_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub image_ref: Option<String>,
}

impl NewLostItem {
    pub fn new(device_name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            location: location.into(),
            lost_date: None,
            description: None,
            color: None,
            image_ref: None,
        }
    }

    pub fn with_lost_date(mut self, lost_date: NaiveDate) -> Self {
        self.lost_date = Some(lost_date);
        self
    }

    pub fn with_details(
        mut self,
        description: Option<String>,
        color: Option<String>,
        image_ref: Option<String>,
    ) -> Self {
        self.description = description;
        self.color = color;
        self.image_ref = image_ref;
        self
    }
}

/// A found-item posting.
#[derive(Debug, Clone, Serialize)]
pub struct FoundItem {
    pub id: i64,
    pub device_name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub location: String,
    pub image_ref: Option<String>,
    pub posted_by: String,
    pub posted_date: DateTime<Utc>,
    pub status: ItemStatus,
}

/// A lost-item posting. Informational only; never a claim target.
#[derive(Debug, Clone, Serialize)]
pub struct LostItem {
    pub id: i64,
    pub device_name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub location: String,
    pub lost_date: Option<NaiveDate>,
    pub image_ref: Option<String>,
    pub posted_by: String,
    pub posted_date: DateTime<Utc>,
    pub status: ItemStatus,
}

/// Claim lifecycle states.
///
/// Initial state is `Pending`; `Approved` and `Rejected` are terminal in the
/// intended design, though re-resolution is not guarded against (last write
/// wins; see the claim engine docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

impl ClaimStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ReclaimError> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(ReclaimError::Storage(format!(
                "unknown claim status '{other}'"
            ))),
        }
    }
}

/// Resolution verb applied to a pending claim by its owner or an
/// administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimAction {
    Approve,
    Reject,
}

/// How the claimant wants to be reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone_number: String,
    pub address: String,
    pub contact_method: Option<String>,
}

/// Evidence of ownership supplied with a claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofInfo {
    pub description: Option<String>,
    pub image_ref: Option<String>,
}

/// An ownership claim against a found item.
#[derive(Debug, Clone, Serialize)]
pub struct Claim {
    pub id: i64,
    pub found_item_id: i64,
    pub claimant_username: String,
    pub owner_username: String,
    pub phone_number: String,
    pub address: String,
    pub contact_method: Option<String>,
    pub proof_description: Option<String>,
    pub proof_image_ref: Option<String>,
    pub status: ClaimStatus,
    pub claim_date: DateTime<Utc>,
    pub admin_notified: bool,
}

/// A claim joined with the device name of the item it targets, for owner
/// dashboards. The name is `None` when the item was hard-deleted out from
/// under the claim.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimSummary {
    #[serde(flatten)]
    pub claim: Claim,
    pub device_name: Option<String>,
}

/// Input for a direct message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub recipient: String,
    pub body: String,
    pub subject: Option<String>,
    pub item_id: Option<i64>,
    pub item_kind: Option<ItemKind>,
    pub claim_id: Option<i64>,
}

impl NewMessage {
    pub fn new(recipient: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            body: body.into(),
            subject: None,
            item_id: None,
            item_kind: None,
            claim_id: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn about_item(mut self, item_id: i64, kind: ItemKind) -> Self {
        self.item_id = Some(item_id);
        self.item_kind = Some(kind);
        self
    }

    pub fn about_claim(mut self, claim_id: i64) -> Self {
        self.claim_id = Some(claim_id);
        self
    }
}

/// A persisted message. Append-only; only `is_read` flips after creation.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: i64,
    pub sender: String,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
    pub item_id: Option<i64>,
    pub item_kind: Option<ItemKind>,
    pub claim_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub from_admin: bool,
}

/// A full two-party thread, plus how many rows the read flipped to read.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub messages: Vec<Message>,
    pub newly_read: u64,
}

/// One row of the correspondent overview, newest conversation first.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub other_user: String,
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
}
