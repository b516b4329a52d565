//! Reclaim core: campus lost-and-found coordination.
//!
//! This crate owns the claim-resolution state machine, the messaging log and
//! its notification dispatcher, and the per-user counter ledger, all over one
//! shared relational store. Each externally-triggered operation is a single
//! transaction; registry, claim, message, and counter writes commit or roll
//! back together.

#![deny(unsafe_code)]

pub mod claims;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod messaging;
pub mod registry;
pub mod report;
pub mod runtime;
pub mod store;
pub mod types;

pub use error::ReclaimError;
pub use ledger::CounterEvent;
pub use report::{ReportSummary, ResolutionRow, SystemSnapshot};
pub use runtime::{
    AdminOverview, ClaimView, ItemListing, ReclaimEngine, UserDashboard, UserDetails,
};
pub use store::{StorageConfig, Store};
pub use types::{
    now, ActivityCounters, Administrator, Claim, ClaimAction, ClaimStatus, ClaimSummary,
    ContactInfo, Conversation, ConversationSummary, FoundItem, ItemKind, ItemStatus, LostItem,
    Message, NewFoundItem, NewLostItem, NewMessage, NewUser, Principal, ProofInfo, User,
    UserProfile, SYSTEM_SENDER,
};
