//! Reconciliation of local mutations with the remote collaborative backend.
//!
//! Every item carries a sync status tracked per id. Sync runs only on an
//! explicit trigger: a failed item falls back to `LocalPending` and waits
//! for the next trigger, it is never retried in the background. Conflicts
//! resolve whole-record by server-side timestamp: the losing local write is
//! discarded and replaced in full by the server's version.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use api_types::{
    budget::{BudgetPush, BudgetPushOutcome, BudgetView},
    collaboration::{JoinRequest, ShareRequest},
    entry::{EntryPush, EntryPushOutcome, EntryView},
};
use sea_orm::ActiveValue;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    Budget, Category, Engine, EngineError, Entry, EntryKind, MoneyCents, ResultEngine, budgets,
    entries,
};

/// Failures reported by the remote collaborative service.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid or expired collaboration code")]
    InvalidCode,
    #[error("unauthorized")]
    Unauthorized,
    #[error("remote unreachable: {0}")]
    Transport(String),
    #[error("server error: {0}")]
    Server(String),
}

/// The seam to the remote collaborative service.
///
/// The `client` crate implements this over HTTP; tests implement it
/// in-memory.
#[allow(async_fn_in_trait)]
pub trait RemoteService {
    async fn push_budget(&self, push: BudgetPush) -> Result<BudgetPushOutcome, RemoteError>;
    async fn push_entry(&self, push: EntryPush) -> Result<EntryPushOutcome, RemoteError>;
    async fn pull_entries(&self, budget: Uuid) -> Result<Vec<EntryView>, RemoteError>;
    async fn join(
        &self,
        request: JoinRequest,
    ) -> Result<api_types::collaboration::BudgetSnapshot, RemoteError>;
    async fn share(
        &self,
        request: ShareRequest,
    ) -> Result<api_types::collaboration::ShareResponse, RemoteError>;
}

/// Per-item reconciliation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// A local write waiting for an explicit sync trigger.
    LocalPending,
    /// An explicit trigger is in flight for this item.
    Syncing,
    /// The remote acknowledged the item.
    Synced,
    /// The server held a newer write; the local record is being replaced.
    Conflict,
}

/// Key of a tracked item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncKey {
    Budget(i64),
    Entry(i64),
}

/// Mutex-guarded per-item status map.
#[derive(Debug, Default)]
pub struct SyncTracker {
    states: Mutex<HashMap<SyncKey, SyncStatus>>,
}

fn lock(mutex: &Mutex<HashMap<SyncKey, SyncStatus>>) -> MutexGuard<'_, HashMap<SyncKey, SyncStatus>> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SyncTracker {
    pub fn get(&self, key: SyncKey) -> Option<SyncStatus> {
        lock(&self.states).get(&key).copied()
    }

    pub(crate) fn set(&self, key: SyncKey, status: SyncStatus) {
        lock(&self.states).insert(key, status);
    }

    pub(crate) fn remove(&self, key: SyncKey) {
        lock(&self.states).remove(&key);
    }
}

/// Outcome counters of one explicit sync trigger.
///
/// A failed item is not an error: it stays `LocalPending` until the next
/// trigger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub pushed: usize,
    pub pulled: usize,
    pub conflicts: usize,
    pub failed: usize,
}

fn entry_push(entry: &Entry, budget_remote: Uuid) -> EntryPush {
    EntryPush {
        remote_id: entry.remote_id,
        budget: budget_remote,
        amount_minor: entry.amount.cents(),
        description: entry.description.clone(),
        kind: entry.kind.into(),
        category: entry.category.into(),
        date: entry.date,
        invoice: entry.invoice.clone(),
        updated_at: entry.updated_at,
    }
}

fn budget_push(budget: &Budget) -> BudgetPush {
    BudgetPush {
        remote_id: budget.remote_id,
        name: budget.name.clone(),
        amount_minor: budget.amount.cents(),
        created_on: budget.created_on,
        updated_at: budget.updated_at,
    }
}

/// The local entry replaced in full by the server's version.
fn entry_from_view(local: &Entry, view: &EntryView) -> Entry {
    Entry {
        id: local.id,
        budget_id: local.budget_id,
        amount: MoneyCents::new(view.amount_minor),
        description: view.description.clone(),
        kind: EntryKind::from(view.kind),
        category: Category::from(view.category),
        date: view.date,
        invoice: view.invoice.clone(),
        is_synced: true,
        remote_id: Some(view.remote_id),
        created_by_email: view.created_by_email.clone(),
        updated_by_email: view.updated_by_email.clone(),
        updated_at: view.updated_at,
    }
}

/// A brand new local row for an entry that exists only remotely.
fn entry_row_from_view(budget_id: i64, view: &EntryView) -> entries::ActiveModel {
    entries::ActiveModel {
        id: ActiveValue::NotSet,
        budget_id: ActiveValue::Set(budget_id),
        amount_minor: ActiveValue::Set(view.amount_minor),
        description: ActiveValue::Set(view.description.clone()),
        kind: ActiveValue::Set(EntryKind::from(view.kind).as_str().to_string()),
        category: ActiveValue::Set(Category::from(view.category).as_str().to_string()),
        entry_date: ActiveValue::Set(view.date),
        invoice: ActiveValue::Set(view.invoice.clone()),
        is_synced: ActiveValue::Set(true),
        remote_id: ActiveValue::Set(Some(view.remote_id.to_string())),
        created_by_email: ActiveValue::Set(view.created_by_email.clone()),
        updated_by_email: ActiveValue::Set(view.updated_by_email.clone()),
        updated_at: ActiveValue::Set(view.updated_at),
    }
}

/// A brand new local row for a budget adopted from a collaboration snapshot.
fn budget_row_from_view(view: &BudgetView, code: &str) -> budgets::ActiveModel {
    budgets::ActiveModel {
        id: ActiveValue::NotSet,
        name: ActiveValue::Set(view.name.clone()),
        amount_minor: ActiveValue::Set(view.amount_minor),
        created_on: ActiveValue::Set(view.created_on),
        is_synced: ActiveValue::Set(true),
        remote_id: ActiveValue::Set(Some(view.remote_id.to_string())),
        collab_code: ActiveValue::Set(Some(code.to_string())),
        updated_at: ActiveValue::Set(view.updated_at),
    }
}

impl<R: RemoteService> Engine<R> {
    /// Pushes every pending entry of one budget, then pulls remote changes.
    ///
    /// Remote failures are captured per item (the item stays
    /// `LocalPending`), never raised; store failures still propagate.
    pub async fn sync_entries(&self, budget_id: i64) -> ResultEngine<SyncReport> {
        let mut report = SyncReport::default();
        let mut budget = self.store.find_budget(budget_id).await?;

        // Entries attach to the budget's server identity, so the budget goes
        // first when it has never been pushed or has pending changes.
        if budget.remote_id.is_none() || !budget.is_synced {
            if let Some(updated) = self.push_budget_record(&budget, &mut report).await? {
                budget = updated;
            }
        }
        let Some(budget_remote) = budget.remote_id else {
            return Ok(report);
        };

        let pending = self.store.load_pending_entries(budget_id).await?;
        for entry in pending {
            self.push_entry_record(&entry, budget_remote, &mut report)
                .await?;
        }

        match self.remote.pull_entries(budget_remote).await {
            Ok(views) => {
                self.apply_pulled_entries(budget_id, &views, &mut report)
                    .await?;
            }
            Err(err) => {
                warn!(budget_id, "entry pull failed: {err}");
                report.failed += 1;
            }
        }

        debug!(
            budget_id,
            pushed = report.pushed,
            pulled = report.pulled,
            conflicts = report.conflicts,
            failed = report.failed,
            "entry sync finished"
        );
        Ok(report)
    }

    /// Pushes every pending budget.
    pub async fn sync_budgets(&self) -> ResultEngine<SyncReport> {
        let mut report = SyncReport::default();
        for budget in self.store.load_pending_budgets().await? {
            self.push_budget_record(&budget, &mut report).await?;
        }
        Ok(report)
    }

    /// Joins a shared budget by collaboration code.
    ///
    /// An invalid or expired code leaves every local row and sync state
    /// unchanged and surfaces [`EngineError::Collaboration`]. A valid code
    /// performs the one-time initial merge: remote-only entries are pulled,
    /// local-only entries are pushed.
    pub async fn join_collaboration(&self, code: &str) -> ResultEngine<Budget> {
        let code = code.trim();
        if code.is_empty() {
            return Err(EngineError::Collaboration(
                "empty collaboration code".to_string(),
            ));
        }

        let snapshot = match self
            .remote
            .join(JoinRequest {
                code: code.to_string(),
            })
            .await
        {
            Ok(snapshot) => snapshot,
            Err(RemoteError::InvalidCode) => {
                return Err(EngineError::Collaboration(format!(
                    "invalid or expired code: {code}"
                )));
            }
            Err(err) => return Err(EngineError::Sync(err.to_string())),
        };

        let budget = match self
            .store
            .find_budget_by_remote(snapshot.budget.remote_id)
            .await?
        {
            Some(mut budget) => {
                // Already tracked locally: adopt the server's record and the
                // code, keep the local id.
                budget.name = snapshot.budget.name.clone();
                budget.amount = MoneyCents::new(snapshot.budget.amount_minor);
                budget.created_on = snapshot.budget.created_on;
                budget.is_synced = true;
                budget.collab_code = Some(snapshot.code.clone());
                budget.updated_at = snapshot.budget.updated_at;
                self.store.apply_budget(&budget).await?;
                budget
            }
            None => {
                self.store
                    .insert_budget_row(budget_row_from_view(&snapshot.budget, &snapshot.code))
                    .await?
            }
        };
        self.tracker.set(SyncKey::Budget(budget.id), SyncStatus::Synced);

        let mut report = SyncReport::default();
        let local_entries = self.store.load_entries(budget.id).await?;
        let known: HashSet<Uuid> = local_entries
            .iter()
            .filter_map(|entry| entry.remote_id)
            .collect();
        for view in &snapshot.entries {
            if !known.contains(&view.remote_id) {
                let pulled = self
                    .store
                    .insert_entry_row(budget.id, entry_row_from_view(budget.id, view))
                    .await?;
                self.tracker.set(SyncKey::Entry(pulled.id), SyncStatus::Synced);
                report.pulled += 1;
            }
        }
        let Some(budget_remote) = budget.remote_id else {
            return Ok(budget);
        };
        for entry in local_entries
            .iter()
            .filter(|entry| entry.remote_id.is_none())
        {
            self.push_entry_record(entry, budget_remote, &mut report)
                .await?;
        }

        debug!(
            budget_id = budget.id,
            pushed = report.pushed,
            pulled = report.pulled,
            "initial collaboration merge finished"
        );
        Ok(budget)
    }

    /// Obtains (or returns the recorded) shareable collaboration code for a
    /// budget, pushing the budget first when the server has never seen it.
    pub async fn share_budget(&self, budget_id: i64) -> ResultEngine<String> {
        let mut budget = self.store.find_budget(budget_id).await?;
        if let Some(code) = &budget.collab_code {
            return Ok(code.clone());
        }

        if budget.remote_id.is_none() {
            let mut report = SyncReport::default();
            match self.push_budget_record(&budget, &mut report).await? {
                Some(updated) => budget = updated,
                None => {
                    return Err(EngineError::Sync(
                        "budget push failed, cannot share".to_string(),
                    ));
                }
            }
        }
        let Some(remote_id) = budget.remote_id else {
            return Err(EngineError::Sync(
                "budget has no server identity".to_string(),
            ));
        };

        let response = self
            .remote
            .share(ShareRequest { budget: remote_id })
            .await
            .map_err(|err| EngineError::Sync(err.to_string()))?;
        budget.collab_code = Some(response.code.clone());
        self.store.apply_budget(&budget).await?;
        Ok(response.code)
    }

    async fn push_budget_record(
        &self,
        budget: &Budget,
        report: &mut SyncReport,
    ) -> ResultEngine<Option<Budget>> {
        let key = SyncKey::Budget(budget.id);
        self.tracker.set(key, SyncStatus::Syncing);
        match self.remote.push_budget(budget_push(budget)).await {
            Ok(BudgetPushOutcome::Accepted { ack }) => {
                let mut updated = budget.clone();
                updated.is_synced = true;
                updated.remote_id = Some(ack.remote_id);
                updated.updated_at = ack.server_updated_at;
                self.store.apply_budget(&updated).await?;
                self.tracker.set(key, SyncStatus::Synced);
                report.pushed += 1;
                Ok(Some(updated))
            }
            Ok(BudgetPushOutcome::Conflict { winner }) => {
                self.tracker.set(key, SyncStatus::Conflict);
                let mut replaced = budget.clone();
                replaced.name = winner.name;
                replaced.amount = MoneyCents::new(winner.amount_minor);
                replaced.created_on = winner.created_on;
                replaced.is_synced = true;
                replaced.remote_id = Some(winner.remote_id);
                replaced.updated_at = winner.updated_at;
                self.store.apply_budget(&replaced).await?;
                self.tracker.set(key, SyncStatus::Synced);
                report.conflicts += 1;
                Ok(Some(replaced))
            }
            Err(err) => {
                warn!(budget_id = budget.id, "budget push failed: {err}");
                self.tracker.set(key, SyncStatus::LocalPending);
                report.failed += 1;
                Ok(None)
            }
        }
    }

    async fn push_entry_record(
        &self,
        entry: &Entry,
        budget_remote: Uuid,
        report: &mut SyncReport,
    ) -> ResultEngine<()> {
        let key = SyncKey::Entry(entry.id);
        self.tracker.set(key, SyncStatus::Syncing);
        match self.remote.push_entry(entry_push(entry, budget_remote)).await {
            Ok(EntryPushOutcome::Accepted { ack }) => {
                let mut updated = entry.clone();
                updated.is_synced = true;
                updated.remote_id = Some(ack.remote_id);
                updated.created_by_email = ack.created_by_email;
                updated.updated_by_email = ack.updated_by_email;
                updated.updated_at = ack.server_updated_at;
                self.store.apply_entry(&updated).await?;
                self.tracker.set(key, SyncStatus::Synced);
                report.pushed += 1;
            }
            Ok(EntryPushOutcome::Conflict { winner }) => {
                self.tracker.set(key, SyncStatus::Conflict);
                let replaced = entry_from_view(entry, &winner);
                self.store.apply_entry(&replaced).await?;
                self.tracker.set(key, SyncStatus::Synced);
                report.conflicts += 1;
            }
            Err(err) => {
                warn!(entry_id = entry.id, "entry push failed: {err}");
                self.tracker.set(key, SyncStatus::LocalPending);
                report.failed += 1;
            }
        }
        Ok(())
    }

    async fn apply_pulled_entries(
        &self,
        budget_id: i64,
        views: &[EntryView],
        report: &mut SyncReport,
    ) -> ResultEngine<()> {
        let local = self.store.load_entries(budget_id).await?;
        let by_remote: HashMap<Uuid, &Entry> = local
            .iter()
            .filter_map(|entry| entry.remote_id.map(|remote| (remote, entry)))
            .collect();
        for view in views {
            match by_remote.get(&view.remote_id) {
                None => {
                    let pulled = self
                        .store
                        .insert_entry_row(budget_id, entry_row_from_view(budget_id, view))
                        .await?;
                    self.tracker.set(SyncKey::Entry(pulled.id), SyncStatus::Synced);
                    report.pulled += 1;
                }
                // A synced local copy loses to a newer server write; a
                // pending local copy keeps its changes for the next push.
                Some(existing) if existing.is_synced && view.updated_at > existing.updated_at => {
                    let replaced = entry_from_view(existing, view);
                    self.store.apply_entry(&replaced).await?;
                    self.tracker.set(SyncKey::Entry(existing.id), SyncStatus::Synced);
                    report.pulled += 1;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
