//! In-memory snapshots of the store aggregates.
//!
//! The cache holds the latest emission per aggregate (all budgets; entries
//! per budget id) plus the current composite detail per budget. Reads never
//! block on pending I/O and return an empty snapshot before the first
//! emission. Locks are held only for the swap or the `Arc` clone, never
//! across I/O.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tracing::trace;

use crate::{Budget, BudgetDetail, Entry};

#[derive(Debug, Default)]
pub struct SnapshotCache {
    budgets: RwLock<Arc<Vec<Budget>>>,
    entries: RwLock<HashMap<i64, Arc<Vec<Entry>>>>,
    details: RwLock<HashMap<i64, Arc<BudgetDetail>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SnapshotCache {
    /// The most recently observed budget list.
    pub fn budgets(&self) -> Arc<Vec<Budget>> {
        Arc::clone(&read(&self.budgets))
    }

    /// The most recently observed entry list for a budget.
    pub fn entries(&self, budget_id: i64) -> Arc<Vec<Entry>> {
        read(&self.entries)
            .get(&budget_id)
            .cloned()
            .unwrap_or_default()
    }

    /// The most recently composed detail for a budget, if any was emitted.
    pub fn detail(&self, budget_id: i64) -> Option<Arc<BudgetDetail>> {
        read(&self.details).get(&budget_id).cloned()
    }

    pub(crate) fn put_budgets(&self, budgets: Vec<Budget>) {
        trace!(count = budgets.len(), "budgets snapshot replaced");
        *write(&self.budgets) = Arc::new(budgets);
    }

    pub(crate) fn put_entries(&self, budget_id: i64, entries: Vec<Entry>) {
        trace!(
            budget_id,
            count = entries.len(),
            "entries snapshot replaced"
        );
        write(&self.entries).insert(budget_id, Arc::new(entries));
    }

    pub(crate) fn put_detail(&self, budget_id: i64, detail: BudgetDetail) {
        write(&self.details).insert(budget_id, Arc::new(detail));
    }

    pub(crate) fn remove_budget(&self, budget_id: i64) {
        write(&self.entries).remove(&budget_id);
        write(&self.details).remove(&budget_id);
    }

    pub(crate) fn remove_detail(&self, budget_id: i64) {
        write(&self.details).remove(&budget_id);
    }
}
