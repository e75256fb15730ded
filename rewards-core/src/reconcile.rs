// rewards-core/src/reconcile.rs
use crate::error::StoreError;
use crate::ledger::{MergeReport, RewardLedger};
use crate::remote::{RewardsApi, StatusFeed};

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Merged(MergeReport),
    /// Remote unreachable; the ledger was loaded from local cache untouched
    LocalFallback,
    /// Remote answered with something unusable; local state was wiped
    Reset,
}

/// Pull the remote status feed for `user_id` and fold it into the ledger
pub async fn reconcile(
    api: &dyn RewardsApi,
    ledger: &RewardLedger,
    user_id: u64,
) -> Result<ReconcileOutcome, StoreError> {
    match api.fetch_status(user_id).await {
        Ok(StatusFeed::Actions(actions)) => Ok(ReconcileOutcome::Merged(ledger.merge_from_remote(&actions)?)),
        Ok(StatusFeed::Unrecognized) => {
            tracing::warn!("Garbled status feed for user {}, resetting ledger", user_id);
            ledger.reset()?;
            Ok(ReconcileOutcome::Reset)
        }
        Err(e) => {
            tracing::warn!("Status feed unavailable for user {}: {}", user_id, e);
            ledger.load();
            Ok(ReconcileOutcome::LocalFallback)
        }
    }
}
