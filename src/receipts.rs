//! Receipt workflow: `not_printed -> printed -> with_concierge -> delivered`,
//! tracked alongside (not instead of) payment status.

use serde::Serialize;
use tracing::{debug, warn};

use crate::contributions::ContributionRepository;
use crate::db::Store;
use crate::error::{HoaError, Result};
use crate::models::{Contribution, ContributionPatch, PaymentStatus, ReceiptStatus};
use crate::transactions::active_contributions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowBucket {
    ToPrint,
    ReadyForConcierge,
    WithConcierge,
    ToDeliver,
    Completed,
}

impl WorkflowBucket {
    pub const ALL: [WorkflowBucket; 5] = [
        WorkflowBucket::ToPrint,
        WorkflowBucket::ReadyForConcierge,
        WorkflowBucket::WithConcierge,
        WorkflowBucket::ToDeliver,
        WorkflowBucket::Completed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WorkflowBucket::ToPrint => "To print",
            WorkflowBucket::ReadyForConcierge => "Ready for concierge",
            WorkflowBucket::WithConcierge => "With concierge (collection)",
            WorkflowBucket::ToDeliver => "To deliver",
            WorkflowBucket::Completed => "Completed",
        }
    }

    /// A printed receipt for a paid contribution is both ready for the
    /// concierge and waiting to be delivered, so buckets can overlap.
    pub fn contains(&self, c: &Contribution) -> bool {
        let paid = c.payment_status == PaymentStatus::Paid;
        match self {
            WorkflowBucket::ToPrint => c.receipt_status == ReceiptStatus::NotPrinted && !paid,
            WorkflowBucket::ReadyForConcierge => c.receipt_status == ReceiptStatus::Printed,
            WorkflowBucket::WithConcierge => c.receipt_status == ReceiptStatus::WithConcierge && !paid,
            WorkflowBucket::ToDeliver => paid && !c.receipt_status.is_delivered(),
            WorkflowBucket::Completed => paid && c.receipt_status.is_delivered(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowBoard {
    pub to_print: Vec<Contribution>,
    pub ready_for_concierge: Vec<Contribution>,
    pub with_concierge: Vec<Contribution>,
    pub to_deliver: Vec<Contribution>,
    pub completed: Vec<Contribution>,
}

impl WorkflowBoard {
    pub fn from_contributions(contributions: &[Contribution]) -> Self {
        let pick = |bucket: WorkflowBucket| -> Vec<Contribution> {
            contributions.iter().filter(|c| bucket.contains(c)).cloned().collect()
        };
        Self {
            to_print: pick(WorkflowBucket::ToPrint),
            ready_for_concierge: pick(WorkflowBucket::ReadyForConcierge),
            with_concierge: pick(WorkflowBucket::WithConcierge),
            to_deliver: pick(WorkflowBucket::ToDeliver),
            completed: pick(WorkflowBucket::Completed),
        }
    }

    pub fn bucket(&self, bucket: WorkflowBucket) -> &[Contribution] {
        match bucket {
            WorkflowBucket::ToPrint => &self.to_print,
            WorkflowBucket::ReadyForConcierge => &self.ready_for_concierge,
            WorkflowBucket::WithConcierge => &self.with_concierge,
            WorkflowBucket::ToDeliver => &self.to_deliver,
            WorkflowBucket::Completed => &self.completed,
        }
    }
}

pub fn workflow_board(store: &Store, hoa_id: i64) -> Result<WorkflowBoard> {
    Ok(WorkflowBoard::from_contributions(&active_contributions(store, hoa_id)?))
}

/// Move a receipt one stage along the normal flow and return its new status.
pub fn advance_receipt(store: &Store, id: i64) -> Result<ReceiptStatus> {
    let repo = store.contributions();
    let current = repo.require(id)?.receipt_status;
    let next = current.next().ok_or(HoaError::InvalidTransition(current))?;
    repo.update(id, ContributionPatch { receipt_status: Some(next), ..Default::default() })?;
    Ok(next)
}

/// Result of a bulk status change. Ids with no matching record are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub updated: Vec<i64>,
    pub skipped: Vec<i64>,
}

fn bulk_update(store: &Store, ids: &[i64], patch: ContributionPatch) -> Result<BulkOutcome> {
    let outcome = store.atomic(|conn| {
        let repo = ContributionRepository::new(conn);
        let mut outcome = BulkOutcome::default();
        for &id in ids {
            if repo.get_by_id(id)?.is_none() {
                outcome.skipped.push(id);
                continue;
            }
            repo.update(id, patch.clone())?;
            outcome.updated.push(id);
        }
        Ok(outcome)
    })?;
    if !outcome.skipped.is_empty() {
        warn!(skipped = ?outcome.skipped, "bulk update skipped unknown contributions");
    }
    debug!(updated = outcome.updated.len(), "bulk update applied");
    Ok(outcome)
}

/// Set the receipt status on every listed contribution in one transaction.
pub fn bulk_update_receipt_workflow_status(
    store: &Store,
    ids: &[i64],
    status: ReceiptStatus,
) -> Result<BulkOutcome> {
    bulk_update(store, ids, ContributionPatch { receipt_status: Some(status), ..Default::default() })
}

/// Set the payment status on every listed contribution in one transaction.
pub fn bulk_set_payment_status(store: &Store, ids: &[i64], status: PaymentStatus) -> Result<BulkOutcome> {
    bulk_update(store, ids, ContributionPatch { payment_status: Some(status), ..Default::default() })
}
