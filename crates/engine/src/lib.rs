//! Local-first reactive core for Borsello.
//!
//! The engine sits between the persistent sqlite store and a thin consumer:
//! it keeps concurrency-safe in-memory snapshots of budgets and entries
//! consistent with the store, composes budget+entries into one observable
//! detail, serves instant in-memory filtered queries, manages multi-select
//! batch deletion, and reconciles local mutations with a remote
//! collaborative backend.
//!
//! Every mutation persists to the store first, is reflected in the cache,
//! and is marked pending for the sync engine; remote reconciliation only
//! ever runs on an explicit trigger.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::DatabaseConnection;
use tokio::sync::watch;
use tracing::debug;

pub use budgets::{Budget, NewBudget};
pub use cache::SnapshotCache;
pub use detail::{BudgetDetail, DetailFeed};
pub use entries::{Category, Entry, EntryKind, NewEntry};
pub use error::EngineError;
pub use filter::{EntryFilter, filter_entries};
pub use money::MoneyCents;
pub use selection::Selection;
pub use sync::{RemoteError, RemoteService, SyncKey, SyncReport, SyncStatus, SyncTracker};

use store::Store;

mod budgets;
mod cache;
mod detail;
mod entries;
mod error;
mod filter;
mod money;
mod selection;
mod store;
mod sync;

pub type ResultEngine<T> = Result<T, EngineError>;

/// The local-first core: store adapter, caches and sync, behind one facade.
#[derive(Debug)]
pub struct Engine<R> {
    store: Arc<Store>,
    cache: Arc<SnapshotCache>,
    tracker: SyncTracker,
    remote: R,
}

impl<R: RemoteService> Engine<R> {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder<R> {
        EngineBuilder {
            database: DatabaseConnection::default(),
            remote: None,
        }
    }
}

impl<R> Engine<R> {
    /// Creates a budget from its form fields.
    ///
    /// The amount is parsed as a decimal string; an empty or non-numeric
    /// amount fails with [`EngineError::Validation`] before anything
    /// reaches the store.
    pub async fn create_budget(
        &self,
        name: &str,
        amount: &str,
        created_on: NaiveDate,
    ) -> ResultEngine<Budget> {
        let name = normalize_required_name(name, "budget")?;
        let amount: MoneyCents = amount.parse()?;
        let budget = self
            .store
            .insert_budget(&NewBudget {
                name,
                amount,
                created_on,
            })
            .await?;
        self.tracker
            .set(SyncKey::Budget(budget.id), SyncStatus::LocalPending);
        debug!(budget_id = budget.id, "budget created");
        Ok(budget)
    }

    /// Replaces the target amount of a budget.
    pub async fn update_budget_amount(&self, budget_id: i64, amount: &str) -> ResultEngine<Budget> {
        let amount: MoneyCents = amount.parse()?;
        let mut budget = self.store.find_budget(budget_id).await?;
        budget.amount = amount;
        budget.is_synced = false;
        budget.updated_at = Utc::now();
        self.store.apply_budget(&budget).await?;
        self.tracker
            .set(SyncKey::Budget(budget.id), SyncStatus::LocalPending);
        Ok(budget)
    }

    /// Deletes a budget and all of its entries.
    pub async fn delete_budget(&self, budget_id: i64) -> ResultEngine<()> {
        let entry_ids: Vec<i64> = self
            .cache
            .entries(budget_id)
            .iter()
            .map(|entry| entry.id)
            .collect();
        self.store.delete_budget(budget_id).await?;
        self.tracker.remove(SyncKey::Budget(budget_id));
        for id in entry_ids {
            self.tracker.remove(SyncKey::Entry(id));
        }
        Ok(())
    }

    /// Records an entry against a budget from its form fields.
    ///
    /// Fails with [`EngineError::Validation`] on a bad amount and with
    /// [`EngineError::ConstraintViolation`] when the budget has vanished
    /// (e.g. the insert raced a budget delete).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_entry(
        &self,
        budget_id: i64,
        amount: &str,
        description: &str,
        kind: EntryKind,
        category: Category,
        date: NaiveDate,
        invoice: Option<String>,
    ) -> ResultEngine<Entry> {
        let amount: MoneyCents = amount.parse()?;
        let entry = self
            .store
            .insert_entry(&NewEntry {
                budget_id,
                amount,
                description: description.trim().to_string(),
                kind,
                category,
                date,
                invoice,
            })
            .await?;
        self.tracker
            .set(SyncKey::Entry(entry.id), SyncStatus::LocalPending);
        debug!(entry_id = entry.id, budget_id, "entry created");
        Ok(entry)
    }

    /// Writes back an edited entry; the edit makes it pending again.
    pub async fn update_entry(&self, mut entry: Entry) -> ResultEngine<Entry> {
        entry.is_synced = false;
        entry.updated_at = Utc::now();
        self.store.apply_entry(&entry).await?;
        self.tracker
            .set(SyncKey::Entry(entry.id), SyncStatus::LocalPending);
        Ok(entry)
    }

    /// Deletes entries by id. Idempotent: `[]` and already-deleted ids are
    /// both no-ops.
    pub async fn delete_entries_by_ids(&self, ids: &[i64]) -> ResultEngine<()> {
        self.store.delete_entries_by_ids(ids).await?;
        for id in ids {
            self.tracker.remove(SyncKey::Entry(*id));
        }
        Ok(())
    }

    /// Deletes the entries selected at confirmation time, then exits
    /// selection mode.
    pub async fn delete_selected_entries(&self, selection: &mut Selection) -> ResultEngine<usize> {
        let ids = selection.selected_ids();
        self.delete_entries_by_ids(&ids).await?;
        selection.clear();
        Ok(ids.len())
    }

    /// The latest observed budget list. Never blocks, empty before the
    /// first emission.
    pub fn cached_budgets(&self) -> Arc<Vec<Budget>> {
        self.cache.budgets()
    }

    /// The latest observed entry list for a budget. Never blocks, empty
    /// before the first emission.
    pub fn cached_entries(&self, budget_id: i64) -> Arc<Vec<Entry>> {
        self.cache.entries(budget_id)
    }

    /// The latest composed detail for a budget, if one was emitted.
    pub fn cached_detail(&self, budget_id: i64) -> Option<Arc<BudgetDetail>> {
        self.cache.detail(budget_id)
    }

    /// Narrows the cached entry snapshot of a budget; a blank filter
    /// returns the snapshot unchanged.
    pub fn filtered_entries(&self, budget_id: i64, filter: &EntryFilter) -> Vec<Entry> {
        filter::filter_entries(&self.cache.entries(budget_id), filter)
    }

    /// The live budget-list stream.
    pub fn subscribe_budgets(&self) -> watch::Receiver<Vec<Budget>> {
        self.store.subscribe_budgets()
    }

    /// The live entry stream of one budget.
    pub async fn subscribe_entries(
        &self,
        budget_id: i64,
    ) -> ResultEngine<watch::Receiver<Vec<Entry>>> {
        self.store.subscribe_entries(budget_id).await
    }

    /// Spawns the combine feed for one budget: a live, deduplicated
    /// [`BudgetDetail`] stream. Dropping the feed cancels it.
    pub async fn watch_detail(&self, budget_id: i64) -> ResultEngine<DetailFeed> {
        let budgets_rx = self.store.subscribe_budgets();
        let entries_rx = self.store.subscribe_entries(budget_id).await?;
        Ok(detail::spawn_feed(
            budget_id,
            budgets_rx,
            entries_rx,
            Arc::clone(&self.cache),
        ))
    }

    /// The sync status rendered next to an entry.
    pub fn entry_status(&self, entry: &Entry) -> SyncStatus {
        self.tracker.get(SyncKey::Entry(entry.id)).unwrap_or(if entry.is_synced {
            SyncStatus::Synced
        } else {
            SyncStatus::LocalPending
        })
    }

    /// The sync status rendered next to a budget.
    pub fn budget_status(&self, budget: &Budget) -> SyncStatus {
        self.tracker
            .get(SyncKey::Budget(budget.id))
            .unwrap_or(if budget.is_synced {
                SyncStatus::Synced
            } else {
                SyncStatus::LocalPending
            })
    }
}

fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// The builder for `Engine`
pub struct EngineBuilder<R> {
    database: DatabaseConnection,
    remote: Option<R>,
}

impl<R: RemoteService> EngineBuilder<R> {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder<R> {
        self.database = db;
        self
    }

    /// Pass the required remote collaborative service
    pub fn remote(mut self, remote: R) -> EngineBuilder<R> {
        self.remote = Some(remote);
        self
    }

    /// Construct `Engine`, loading the initial budget snapshot.
    pub async fn build(self) -> ResultEngine<Engine<R>> {
        let remote = self.remote.ok_or_else(|| {
            EngineError::Validation("a remote service is required".to_string())
        })?;
        let cache = Arc::new(SnapshotCache::default());
        let store = Arc::new(Store::new(self.database, Arc::clone(&cache)));
        store.publish_budgets().await?;
        Ok(Engine {
            store,
            cache,
            tracker: SyncTracker::default(),
            remote,
        })
    }
}
