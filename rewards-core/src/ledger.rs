// rewards-core/src/ledger.rs
//! Reward ledger: per-platform claimed flags plus an append-only earn history.
//!
//! Status is remote-authoritative and replaced wholesale on every merge.
//! History only ever grows (until an explicit reset), so points already paid
//! out are never clawed back. `total_points` is always the sum over history.

use chrono::Utc;
use common::models::{total_points, Platform, RewardHistoryRecord, RewardStatus};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::store::{load_json, save_json, Store, REWARD_HISTORY_KEY, REWARD_STATUS_KEY};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    status: RewardStatus,
    history: Vec<RewardHistoryRecord>,
}

/// Read model for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSnapshot {
    pub status: RewardStatus,
    pub history: Vec<RewardHistoryRecord>,
    pub total_points: u64,
}

impl From<&LedgerState> for LedgerSnapshot {
    fn from(state: &LedgerState) -> Self {
        Self {
            status: state.status.clone(),
            history: state.history.clone(),
            total_points: total_points(&state.history),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// A new history record was appended
    Claimed(RewardHistoryRecord),
    /// Status flipped back on; the platform was already paid out earlier
    Restored,
    /// Duplicate claim, nothing changed
    AlreadyClaimed,
}

/// What a merge changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub claimed: Vec<Platform>,
    pub new_records: Vec<RewardHistoryRecord>,
    /// Feed entries that matched no known platform
    pub ignored: Vec<String>,
}

pub struct RewardLedger {
    store: Arc<dyn Store>,
    // Guards every check-then-act against the store
    state: Mutex<LedgerState>,
}

impl RewardLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_persisted(&self) -> LedgerState {
        LedgerState {
            status: load_json(self.store.as_ref(), REWARD_STATUS_KEY).unwrap_or_default(),
            history: load_json(self.store.as_ref(), REWARD_HISTORY_KEY).unwrap_or_default(),
        }
    }

    fn persist(&self, next: &LedgerState, history_changed: bool) -> Result<(), StoreError> {
        // History first: a record without its flag is repaired by the next merge
        if history_changed {
            save_json(self.store.as_ref(), REWARD_HISTORY_KEY, &next.history)?;
        }
        save_json(self.store.as_ref(), REWARD_STATUS_KEY, &next.status)
    }

    /// Pure read from the store into memory
    pub fn load(&self) -> LedgerSnapshot {
        let mut state = self.lock();
        *state = self.read_persisted();
        tracing::debug!(
            "Loaded ledger from store: {} records, {} points",
            state.history.len(),
            total_points(&state.history)
        );
        LedgerSnapshot::from(&*state)
    }

    /// Rebuild status from the remote feed, appending history only for first-time platforms
    ///
    /// Idempotent: repeating the same feed leaves status, history and total unchanged.
    pub fn merge_from_remote<S: AsRef<str>>(&self, remote: &[S]) -> Result<MergeReport, StoreError> {
        let mut state = self.lock();
        let current = self.read_persisted();

        let mut followed = BTreeSet::new();
        let mut report = MergeReport::default();
        for name in remote {
            match name.as_ref().parse::<Platform>() {
                Ok(platform) => {
                    followed.insert(platform);
                }
                Err(_) => report.ignored.push(name.as_ref().to_string()),
            }
        }

        let mut next = LedgerState {
            status: RewardStatus::default(),
            history: current.history,
        };
        let now = Utc::now();
        for platform in followed {
            next.status.set(platform, true);
            report.claimed.push(platform);

            if !next.history.iter().any(|r| r.platform == platform) {
                let record = RewardHistoryRecord::new(platform, now);
                next.history.push(record.clone());
                report.new_records.push(record);
            }
        }

        if !report.ignored.is_empty() {
            tracing::warn!("Status feed named unknown platforms: {:?}", report.ignored);
        }

        self.persist(&next, !report.new_records.is_empty())?;
        *state = next;

        tracing::info!(
            "Merged remote status: {} claimed, {} new records, total {} points",
            report.claimed.len(),
            report.new_records.len(),
            total_points(&state.history)
        );
        Ok(report)
    }

    /// Manual claim after a successful verification
    pub fn claim(&self, platform: Platform) -> Result<ClaimOutcome, StoreError> {
        let mut state = self.lock();
        let mut next = self.read_persisted();

        // Re-checked under the lock so two verification flows cannot both pay out
        if next.status.is_claimed(platform) {
            tracing::info!("Ignoring duplicate claim for {}", platform);
            *state = next;
            return Ok(ClaimOutcome::AlreadyClaimed);
        }

        next.status.set(platform, true);
        let outcome = if next.history.iter().any(|r| r.platform == platform) {
            ClaimOutcome::Restored
        } else {
            let record = RewardHistoryRecord::new(platform, Utc::now());
            next.history.push(record.clone());
            ClaimOutcome::Claimed(record)
        };

        self.persist(&next, matches!(outcome, ClaimOutcome::Claimed(_)))?;
        *state = next;

        tracing::info!(
            "Claimed {} ({:?}), total {} points",
            platform,
            outcome,
            total_points(&state.history)
        );
        Ok(outcome)
    }

    /// Wipe status, history and the persisted records
    ///
    /// Memory is cleared even if the store refuses the delete.
    pub fn reset(&self) -> Result<(), StoreError> {
        let mut state = self.lock();
        *state = LedgerState::default();

        let status = self.store.remove(REWARD_STATUS_KEY);
        let history = self.store.remove(REWARD_HISTORY_KEY);
        tracing::info!("Reward ledger reset");
        status.and(history)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::from(&*self.lock())
    }

    pub fn is_claimed(&self, platform: Platform) -> bool {
        self.lock().status.is_claimed(platform)
    }

    pub fn total_points(&self) -> u64 {
        total_points(&self.lock().history)
    }
}

impl std::fmt::Debug for RewardLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("RewardLedger")
            .field("claimed", &state.status.claimed().collect::<Vec<_>>())
            .field("records", &state.history.len())
            .finish()
    }
}
