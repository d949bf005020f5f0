//! Budget + entries composition.
//!
//! The combine engine joins the budget-list stream with one budget's entry
//! stream into a single [`BudgetDetail`] composite, re-emitted whenever
//! either side changes and deduplicated by value equality.

use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};

use crate::{Budget, Entry, EntryKind, MoneyCents, SnapshotCache};

/// The composite the UI observes: one budget together with its entries.
///
/// Recomputed as a whole on every upstream emission, never patched in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BudgetDetail {
    pub budget: Budget,
    pub entries: Vec<Entry>,
}

impl BudgetDetail {
    pub fn total_incomes(&self) -> MoneyCents {
        self.entries
            .iter()
            .filter(|entry| entry.kind == EntryKind::Income)
            .map(|entry| entry.amount)
            .sum()
    }

    pub fn total_expenses(&self) -> MoneyCents {
        self.entries
            .iter()
            .filter(|entry| entry.kind == EntryKind::Outcome)
            .map(|entry| entry.amount)
            .sum()
    }

    /// Remaining balance: target amount plus incomes minus outcomes.
    pub fn balance(&self) -> MoneyCents {
        self.budget.amount + self.total_incomes() - self.total_expenses()
    }
}

/// A live feed of [`BudgetDetail`] composites for one budget.
///
/// Dropping the feed aborts the combining task: a torn-down feed never
/// writes to the cache again.
#[derive(Debug)]
pub struct DetailFeed {
    rx: watch::Receiver<Option<BudgetDetail>>,
    task: JoinHandle<()>,
}

impl DetailFeed {
    /// A receiver over the composite stream. `None` means the budget has
    /// been deleted (or was never observed).
    pub fn receiver(&self) -> watch::Receiver<Option<BudgetDetail>> {
        self.rx.clone()
    }

    /// The latest composite, without waiting.
    pub fn current(&self) -> Option<BudgetDetail> {
        self.rx.borrow().clone()
    }
}

impl Drop for DetailFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) fn spawn_feed(
    budget_id: i64,
    mut budgets_rx: watch::Receiver<Vec<Budget>>,
    mut entries_rx: watch::Receiver<Vec<Entry>>,
    cache: Arc<SnapshotCache>,
) -> DetailFeed {
    let (tx, rx) = watch::channel(None);
    let task = tokio::spawn(async move {
        let mut last: Option<BudgetDetail> = None;
        loop {
            let detail = {
                let budget = budgets_rx
                    .borrow_and_update()
                    .iter()
                    .find(|budget| budget.id == budget_id)
                    .cloned();
                let entries = entries_rx.borrow_and_update().clone();
                budget.map(|budget| BudgetDetail { budget, entries })
            };
            match detail {
                // Only a composite that differs by value from the last one
                // is re-emitted.
                Some(detail) if last.as_ref() != Some(&detail) => {
                    last = Some(detail.clone());
                    cache.put_detail(budget_id, detail.clone());
                    tx.send_replace(Some(detail));
                }
                None if last.is_some() => {
                    last = None;
                    cache.remove_detail(budget_id);
                    tx.send_replace(None);
                }
                _ => {}
            }
            tokio::select! {
                changed = budgets_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = entries_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    });
    DetailFeed { rx, task }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::Category;

    fn budget(amount: i64) -> Budget {
        Budget {
            id: 1,
            name: "Main".to_string(),
            amount: MoneyCents::new(amount),
            created_on: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            total_expenses: MoneyCents::ZERO,
            is_synced: false,
            remote_id: None,
            collab_code: None,
            updated_at: Utc::now(),
        }
    }

    fn entry(id: i64, kind: EntryKind, amount: i64) -> Entry {
        Entry {
            id,
            budget_id: 1,
            amount: MoneyCents::new(amount),
            description: String::new(),
            kind,
            category: Category::Other,
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            invoice: None,
            is_synced: false,
            remote_id: None,
            created_by_email: None,
            updated_by_email: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn balance_adds_incomes_and_subtracts_outcomes() {
        let detail = BudgetDetail {
            budget: budget(100_000),
            entries: vec![
                entry(1, EntryKind::Outcome, 20_000),
                entry(2, EntryKind::Outcome, 5_000),
                entry(3, EntryKind::Income, 5_000),
            ],
        };
        assert_eq!(detail.total_expenses(), MoneyCents::new(25_000));
        assert_eq!(detail.total_incomes(), MoneyCents::new(5_000));
        assert_eq!(detail.balance(), MoneyCents::new(80_000));
    }
}
