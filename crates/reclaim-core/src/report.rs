//! Consistent read snapshot for the reporting collaborator.
//!
//! The core's obligation ends at handing over consistent data; document
//! layout and formatting live outside the repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::error::ReclaimError;
use crate::types::{now, Administrator, Claim, ClaimStatus, FoundItem, ItemStatus, LostItem, User};
use crate::{claims, directory, registry};

/// Headline figures for the system summary section.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total_users: usize,
    pub active_users: usize,
    pub inactive_users: usize,
    pub administrators: usize,
    pub found_items: usize,
    pub lost_items: usize,
    pub total_claims: usize,
    pub pending_claims: usize,
    pub approved_claims: usize,
    pub rejected_claims: usize,
}

/// One line of the resolution statistics table.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionRow {
    pub category: &'static str,
    pub active: usize,
    pub resolved: usize,
    pub total: usize,
    /// Percent of the total that reached a resolved state, one decimal.
    pub resolution_rate: f64,
}

impl ResolutionRow {
    fn new(category: &'static str, active: usize, resolved: usize, total: usize) -> Self {
        let resolution_rate = if total > 0 {
            (resolved as f64 / total as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        Self {
            category,
            active,
            resolved,
            total,
            resolution_rate,
        }
    }
}

/// All five tables read in one transaction, plus the derived figures.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub captured_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub statistics: Vec<ResolutionRow>,
    pub users: Vec<User>,
    pub administrators: Vec<Administrator>,
    pub found_items: Vec<FoundItem>,
    pub lost_items: Vec<LostItem>,
    pub claims: Vec<Claim>,
}

pub(crate) async fn collect(conn: &mut SqliteConnection) -> Result<SystemSnapshot, ReclaimError> {
    let users = directory::list_users(conn).await?;
    let administrators = directory::list_admins(conn).await?;
    let found_items = registry::all_found(conn).await?;
    let lost_items = registry::all_lost(conn).await?;
    let claims = claims::all(conn).await?;

    let active_users = users.iter().filter(|u| u.is_active).count();
    let pending_claims = claims
        .iter()
        .filter(|c| c.status == ClaimStatus::Pending)
        .count();
    let approved_claims = claims
        .iter()
        .filter(|c| c.status == ClaimStatus::Approved)
        .count();
    let rejected_claims = claims
        .iter()
        .filter(|c| c.status == ClaimStatus::Rejected)
        .count();

    let summary = ReportSummary {
        total_users: users.len(),
        active_users,
        inactive_users: users.len() - active_users,
        administrators: administrators.len(),
        found_items: found_items.len(),
        lost_items: lost_items.len(),
        total_claims: claims.len(),
        pending_claims,
        approved_claims,
        rejected_claims,
    };

    let active_found = found_items.iter().filter(|i| i.status.is_active()).count();
    let claimed_found = found_items
        .iter()
        .filter(|i| i.status == ItemStatus::Claimed)
        .count();
    let active_lost = lost_items.iter().filter(|i| i.status.is_active()).count();
    // A lost item counts as resolved once an administrator marks it "found".
    let recovered_lost = lost_items
        .iter()
        .filter(|i| i.status.as_str() == "found")
        .count();
    let resolved_claims = approved_claims + rejected_claims;

    let statistics = vec![
        ResolutionRow::new("found_items", active_found, claimed_found, found_items.len()),
        ResolutionRow::new("lost_items", active_lost, recovered_lost, lost_items.len()),
        ResolutionRow::new("claims", pending_claims, resolved_claims, claims.len()),
    ];

    Ok(SystemSnapshot {
        captured_at: now(),
        summary,
        statistics,
        users,
        administrators,
        found_items,
        lost_items,
        claims,
    })
}
