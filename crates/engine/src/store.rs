//! Persistent store adapter: CRUD over the two tables plus live,
//! re-emitting read streams.
//!
//! Every mutation follows the same discipline: persist inside a DB
//! transaction first, then re-query the affected aggregate and publish the
//! fresh snapshot — synchronously into the [`SnapshotCache`], then over the
//! `watch` channel for async consumers. `watch` gives buffer-latest,
//! drop-intermediate semantics, and emission order per key is preserved.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseConnection, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::{
    Budget, EngineError, Entry, EntryKind, MoneyCents, NewBudget, NewEntry, ResultEngine,
    budgets, cache::SnapshotCache, entries,
};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
pub(crate) struct Store {
    database: DatabaseConnection,
    cache: Arc<SnapshotCache>,
    budgets_tx: watch::Sender<Vec<Budget>>,
    entries_tx: Mutex<HashMap<i64, Arc<watch::Sender<Vec<Entry>>>>>,
}

impl Store {
    pub fn new(database: DatabaseConnection, cache: Arc<SnapshotCache>) -> Self {
        let (budgets_tx, _) = watch::channel(Vec::new());
        Self {
            database,
            cache,
            budgets_tx,
            entries_tx: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe_budgets(&self) -> watch::Receiver<Vec<Budget>> {
        self.budgets_tx.subscribe()
    }

    /// Subscribes to the live entry stream of one budget.
    ///
    /// The first subscription for a budget id triggers an initial emission so
    /// the receiver starts from the current store state.
    pub async fn subscribe_entries(&self, budget_id: i64) -> ResultEngine<watch::Receiver<Vec<Entry>>> {
        let (sender, created) = self.entries_sender(budget_id);
        if created {
            self.publish_entries(budget_id).await?;
        }
        Ok(sender.subscribe())
    }

    fn entries_sender(&self, budget_id: i64) -> (Arc<watch::Sender<Vec<Entry>>>, bool) {
        let mut senders = lock(&self.entries_tx);
        match senders.get(&budget_id) {
            Some(sender) => (Arc::clone(sender), false),
            None => {
                let (sender, _) = watch::channel(Vec::new());
                let sender = Arc::new(sender);
                senders.insert(budget_id, Arc::clone(&sender));
                (sender, true)
            }
        }
    }

    pub async fn insert_budget(&self, draft: &NewBudget) -> ResultEngine<Budget> {
        let row = budgets::ActiveModel {
            id: ActiveValue::NotSet,
            name: ActiveValue::Set(draft.name.clone()),
            amount_minor: ActiveValue::Set(draft.amount.cents()),
            created_on: ActiveValue::Set(draft.created_on),
            is_synced: ActiveValue::Set(false),
            remote_id: ActiveValue::Set(None),
            collab_code: ActiveValue::Set(None),
            updated_at: ActiveValue::Set(Utc::now()),
        };
        self.insert_budget_row(row).await
    }

    /// Inserts a budget row as given (used for locally created drafts and for
    /// budgets adopted from a collaboration snapshot).
    pub async fn insert_budget_row(&self, row: budgets::ActiveModel) -> ResultEngine<Budget> {
        let model = with_tx!(self, |tx| {
            let inserted: budgets::Model = row.insert(&tx).await?;
            Ok(inserted)
        })?;
        debug!(budget_id = model.id, "budget inserted");
        let budget = Budget::try_from(model)?;
        self.publish_budgets().await?;
        Ok(budget)
    }

    pub async fn insert_entry(&self, draft: &NewEntry) -> ResultEngine<Entry> {
        let row = entries::ActiveModel {
            id: ActiveValue::NotSet,
            budget_id: ActiveValue::Set(draft.budget_id),
            amount_minor: ActiveValue::Set(draft.amount.cents()),
            description: ActiveValue::Set(draft.description.clone()),
            kind: ActiveValue::Set(draft.kind.as_str().to_string()),
            category: ActiveValue::Set(draft.category.as_str().to_string()),
            entry_date: ActiveValue::Set(draft.date),
            invoice: ActiveValue::Set(draft.invoice.clone()),
            is_synced: ActiveValue::Set(false),
            remote_id: ActiveValue::Set(None),
            created_by_email: ActiveValue::Set(None),
            updated_by_email: ActiveValue::Set(None),
            updated_at: ActiveValue::Set(Utc::now()),
        };
        self.insert_entry_row(draft.budget_id, row).await
    }

    /// Inserts an entry row as given, verifying inside the same transaction
    /// that the referenced budget still exists.
    pub async fn insert_entry_row(
        &self,
        budget_id: i64,
        row: entries::ActiveModel,
    ) -> ResultEngine<Entry> {
        let model = with_tx!(self, |tx| {
            if budgets::Entity::find_by_id(budget_id).one(&tx).await?.is_none() {
                return Err(EngineError::ConstraintViolation(format!(
                    "budget {budget_id} does not exist"
                )));
            }
            let inserted: entries::Model = row.insert(&tx).await?;
            Ok(inserted)
        })?;
        debug!(entry_id = model.id, budget_id, "entry inserted");
        let entry = Entry::try_from(model)?;
        self.publish_entries(budget_id).await?;
        self.publish_budgets().await?;
        Ok(entry)
    }

    /// Writes a budget row in full. Fails with [`EngineError::NotFound`] if
    /// the row has vanished.
    pub async fn apply_budget(&self, budget: &Budget) -> ResultEngine<()> {
        with_tx!(self, |tx| {
            if budgets::Entity::find_by_id(budget.id).one(&tx).await?.is_none() {
                return Err(EngineError::NotFound(format!("budget {}", budget.id)));
            }
            budgets::ActiveModel::from(budget).update(&tx).await?;
            Ok(())
        })?;
        self.publish_budgets().await?;
        Ok(())
    }

    /// Writes an entry row in full. Fails with [`EngineError::NotFound`] if
    /// the row has vanished.
    pub async fn apply_entry(&self, entry: &Entry) -> ResultEngine<()> {
        with_tx!(self, |tx| {
            if entries::Entity::find_by_id(entry.id).one(&tx).await?.is_none() {
                return Err(EngineError::NotFound(format!("entry {}", entry.id)));
            }
            entries::ActiveModel::from(entry).update(&tx).await?;
            Ok(())
        })?;
        self.publish_entries(entry.budget_id).await?;
        self.publish_budgets().await?;
        Ok(())
    }

    /// Deletes entries by id. Idempotent: an empty list and ids already gone
    /// are both silently fine.
    pub async fn delete_entries_by_ids(&self, ids: &[i64]) -> ResultEngine<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let affected: Vec<i64> = with_tx!(self, |tx| {
            let rows = entries::Entity::find()
                .filter(entries::Column::Id.is_in(ids.to_vec()))
                .all(&tx)
                .await?;
            let mut budget_ids: Vec<i64> = rows.iter().map(|row| row.budget_id).collect();
            budget_ids.sort_unstable();
            budget_ids.dedup();
            entries::Entity::delete_many()
                .filter(entries::Column::Id.is_in(ids.to_vec()))
                .exec(&tx)
                .await?;
            Ok(budget_ids)
        })?;
        if affected.is_empty() {
            return Ok(());
        }
        debug!(count = ids.len(), "entries deleted");
        for budget_id in &affected {
            self.publish_entries(*budget_id).await?;
        }
        self.publish_budgets().await?;
        Ok(())
    }

    /// Deletes a budget and cascades all of its entries.
    pub async fn delete_budget(&self, budget_id: i64) -> ResultEngine<()> {
        with_tx!(self, |tx| {
            if budgets::Entity::find_by_id(budget_id).one(&tx).await?.is_none() {
                return Err(EngineError::NotFound(format!("budget {budget_id}")));
            }
            entries::Entity::delete_many()
                .filter(entries::Column::BudgetId.eq(budget_id))
                .exec(&tx)
                .await?;
            budgets::Entity::delete_by_id(budget_id).exec(&tx).await?;
            Ok(())
        })?;
        debug!(budget_id, "budget deleted");
        // Close the per-budget stream with a final empty emission, then drop
        // the cached snapshots for the dead id.
        let sender = lock(&self.entries_tx).remove(&budget_id);
        if let Some(sender) = sender {
            sender.send_replace(Vec::new());
        }
        self.cache.remove_budget(budget_id);
        self.publish_budgets().await?;
        Ok(())
    }

    pub async fn find_budget(&self, budget_id: i64) -> ResultEngine<Budget> {
        let model = budgets::Entity::find_by_id(budget_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("budget {budget_id}")))?;
        Budget::try_from(model)
    }

    pub async fn find_budget_by_remote(&self, remote_id: Uuid) -> ResultEngine<Option<Budget>> {
        let model = budgets::Entity::find()
            .filter(budgets::Column::RemoteId.eq(remote_id.to_string()))
            .one(&self.database)
            .await?;
        model.map(Budget::try_from).transpose()
    }

    pub async fn load_entries(&self, budget_id: i64) -> ResultEngine<Vec<Entry>> {
        let models = entries::Entity::find()
            .filter(entries::Column::BudgetId.eq(budget_id))
            .order_by_desc(entries::Column::EntryDate)
            .order_by_desc(entries::Column::Id)
            .all(&self.database)
            .await?;
        models.into_iter().map(Entry::try_from).collect()
    }

    pub async fn load_pending_entries(&self, budget_id: i64) -> ResultEngine<Vec<Entry>> {
        let models = entries::Entity::find()
            .filter(entries::Column::BudgetId.eq(budget_id))
            .filter(entries::Column::IsSynced.eq(false))
            .order_by_asc(entries::Column::Id)
            .all(&self.database)
            .await?;
        models.into_iter().map(Entry::try_from).collect()
    }

    pub async fn load_pending_budgets(&self) -> ResultEngine<Vec<Budget>> {
        let models = budgets::Entity::find()
            .filter(budgets::Column::IsSynced.eq(false))
            .order_by_asc(budgets::Column::Id)
            .all(&self.database)
            .await?;
        models.into_iter().map(Budget::try_from).collect()
    }

    async fn load_budgets(&self) -> ResultEngine<Vec<Budget>> {
        let models = budgets::Entity::find()
            .order_by_asc(budgets::Column::Id)
            .all(&self.database)
            .await?;
        let outcomes = entries::Entity::find()
            .filter(entries::Column::Kind.eq(EntryKind::Outcome.as_str()))
            .all(&self.database)
            .await?;
        let mut totals: HashMap<i64, i64> = HashMap::new();
        for row in outcomes {
            *totals.entry(row.budget_id).or_default() += row.amount_minor;
        }
        models
            .into_iter()
            .map(|model| {
                let total = totals.get(&model.id).copied().unwrap_or_default();
                let mut budget = Budget::try_from(model)?;
                budget.total_expenses = MoneyCents::new(total);
                Ok(budget)
            })
            .collect()
    }

    /// Re-reads the budget list and publishes it: cache first, stream second.
    pub async fn publish_budgets(&self) -> ResultEngine<Vec<Budget>> {
        let budgets = self.load_budgets().await?;
        self.cache.put_budgets(budgets.clone());
        self.budgets_tx.send_replace(budgets.clone());
        Ok(budgets)
    }

    /// Re-reads one budget's entries and publishes them: cache first, stream
    /// second.
    pub async fn publish_entries(&self, budget_id: i64) -> ResultEngine<Vec<Entry>> {
        let entries = self.load_entries(budget_id).await?;
        self.cache.put_entries(budget_id, entries.clone());
        let (sender, _) = self.entries_sender(budget_id);
        sender.send_replace(entries.clone());
        Ok(entries)
    }
}
