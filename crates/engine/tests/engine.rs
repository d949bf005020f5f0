use api_types::{
    budget::{BudgetPush, BudgetPushOutcome},
    collaboration::{BudgetSnapshot, JoinRequest, ShareRequest, ShareResponse},
    entry::{EntryPush, EntryPushOutcome, EntryView},
};
use chrono::NaiveDate;
use sea_orm::Database;
use uuid::Uuid;

use engine::{
    Category, Engine, EngineError, EntryFilter, EntryKind, MoneyCents, RemoteError, RemoteService,
    Selection, SyncStatus,
};
use migration::MigratorTrait;

/// A remote that is never reachable; store-level tests run fully offline.
#[derive(Debug)]
struct OfflineRemote;

impl RemoteService for OfflineRemote {
    async fn push_budget(&self, _push: BudgetPush) -> Result<BudgetPushOutcome, RemoteError> {
        Err(RemoteError::Transport("offline".to_string()))
    }

    async fn push_entry(&self, _push: EntryPush) -> Result<EntryPushOutcome, RemoteError> {
        Err(RemoteError::Transport("offline".to_string()))
    }

    async fn pull_entries(&self, _budget: Uuid) -> Result<Vec<EntryView>, RemoteError> {
        Err(RemoteError::Transport("offline".to_string()))
    }

    async fn join(&self, _request: JoinRequest) -> Result<BudgetSnapshot, RemoteError> {
        Err(RemoteError::Transport("offline".to_string()))
    }

    async fn share(&self, _request: ShareRequest) -> Result<ShareResponse, RemoteError> {
        Err(RemoteError::Transport("offline".to_string()))
    }
}

async fn test_engine() -> Engine<OfflineRemote> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder()
        .database(db)
        .remote(OfflineRemote)
        .build()
        .await
        .unwrap()
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[tokio::test]
async fn create_budget_appears_in_cache() {
    let engine = test_engine().await;

    let budget = engine
        .create_budget("Main", "1000", date("2025-01-01"))
        .await
        .unwrap();

    assert!(budget.id > 0);
    assert_eq!(budget.amount, MoneyCents::new(100_000));
    assert!(!budget.is_synced);

    let cached = engine.cached_budgets();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0], budget);
}

#[tokio::test]
async fn create_entry_round_trips_every_field() {
    let engine = test_engine().await;
    let budget = engine
        .create_budget("Main", "1000", date("2025-01-01"))
        .await
        .unwrap();

    let entry = engine
        .create_entry(
            budget.id,
            "42.50",
            "Weekly shop",
            EntryKind::Outcome,
            Category::Groceries,
            date("2025-01-15"),
            Some("invoices/shop.pdf".to_string()),
        )
        .await
        .unwrap();

    assert!(entry.id > 0);
    assert_eq!(entry.budget_id, budget.id);
    assert_eq!(entry.amount, MoneyCents::new(4250));
    assert_eq!(entry.amount.to_string(), "42.50");
    assert_eq!(entry.description, "Weekly shop");
    assert_eq!(entry.kind, EntryKind::Outcome);
    assert_eq!(entry.category, Category::Groceries);
    assert_eq!(entry.invoice.as_deref(), Some("invoices/shop.pdf"));
    assert!(!entry.is_synced);

    let cached = engine.cached_entries(budget.id);
    assert_eq!(cached.as_slice(), &[entry]);
}

#[tokio::test]
async fn validation_blocks_bad_amounts_before_the_store() {
    let engine = test_engine().await;

    for bad in ["", "  ", "abc", "1.234"] {
        let err = engine
            .create_budget("Main", bad, date("2025-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)), "{bad:?}: {err}");
    }

    let err = engine
        .create_budget("   ", "10", date("2025-01-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // nothing reached the store
    assert!(engine.cached_budgets().is_empty());
}

#[tokio::test]
async fn entry_for_missing_budget_is_a_constraint_violation() {
    let engine = test_engine().await;

    let err = engine
        .create_entry(
            999,
            "10",
            "orphan",
            EntryKind::Outcome,
            Category::Other,
            date("2025-01-15"),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConstraintViolation(_)));
    assert!(engine.cached_entries(999).is_empty());
}

#[tokio::test]
async fn updates_on_vanished_rows_are_not_found() {
    let engine = test_engine().await;

    let err = engine.update_budget_amount(404, "10").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let err = engine.delete_budget(404).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn delete_entries_by_ids_is_idempotent() {
    let engine = test_engine().await;
    let budget = engine
        .create_budget("Main", "1000", date("2025-01-01"))
        .await
        .unwrap();
    let entry = engine
        .create_entry(
            budget.id,
            "10",
            "one",
            EntryKind::Outcome,
            Category::Other,
            date("2025-01-15"),
            None,
        )
        .await
        .unwrap();

    engine.delete_entries_by_ids(&[]).await.unwrap();
    assert_eq!(engine.cached_entries(budget.id).len(), 1);

    engine.delete_entries_by_ids(&[entry.id]).await.unwrap();
    assert!(engine.cached_entries(budget.id).is_empty());

    // the same ids a second time: no error, store unchanged
    engine.delete_entries_by_ids(&[entry.id]).await.unwrap();
    assert!(engine.cached_entries(budget.id).is_empty());
}

#[tokio::test]
async fn budget_totals_derive_from_outcome_entries() {
    let engine = test_engine().await;
    let budget = engine
        .create_budget("Main", "1000", date("2025-01-01"))
        .await
        .unwrap();

    engine
        .create_entry(
            budget.id,
            "200",
            "rent",
            EntryKind::Outcome,
            Category::Housing,
            date("2025-01-02"),
            None,
        )
        .await
        .unwrap();
    engine
        .create_entry(
            budget.id,
            "50",
            "refund",
            EntryKind::Income,
            Category::Other,
            date("2025-01-03"),
            None,
        )
        .await
        .unwrap();
    engine
        .create_entry(
            budget.id,
            "50",
            "groceries",
            EntryKind::Outcome,
            Category::Groceries,
            date("2025-01-04"),
            None,
        )
        .await
        .unwrap();

    let cached = engine.cached_budgets();
    assert_eq!(cached[0].total_expenses, MoneyCents::new(25_000));
}

#[tokio::test]
async fn cache_reflects_each_mutation_exactly_once() {
    let engine = test_engine().await;
    let budget = engine
        .create_budget("Main", "1000", date("2025-01-01"))
        .await
        .unwrap();

    let entry = engine
        .create_entry(
            budget.id,
            "10",
            "one",
            EntryKind::Outcome,
            Category::Other,
            date("2025-01-15"),
            None,
        )
        .await
        .unwrap();

    // two concurrent readers observe the same snapshot value, with no stale
    // read in between
    let first = engine.cached_entries(budget.id);
    let second = engine.cached_entries(budget.id);
    assert_eq!(first, second);
    assert_eq!(first.as_slice(), &[entry.clone()]);

    let mut edited = entry;
    edited.description = "renamed".to_string();
    engine.update_entry(edited).await.unwrap();
    assert_eq!(engine.cached_entries(budget.id)[0].description, "renamed");
}

#[tokio::test]
async fn entry_stream_emits_on_every_mutation() {
    let engine = test_engine().await;
    let budget = engine
        .create_budget("Main", "1000", date("2025-01-01"))
        .await
        .unwrap();

    let mut rx = engine.subscribe_entries(budget.id).await.unwrap();
    assert!(rx.borrow_and_update().is_empty());

    engine
        .create_entry(
            budget.id,
            "10",
            "one",
            EntryKind::Outcome,
            Category::Other,
            date("2025-01-15"),
            None,
        )
        .await
        .unwrap();

    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().len(), 1);
}

#[tokio::test]
async fn detail_feed_composes_and_balances() {
    let engine = test_engine().await;
    let budget = engine
        .create_budget("Main", "1000", date("2025-01-01"))
        .await
        .unwrap();

    let feed = engine.watch_detail(budget.id).await.unwrap();
    let mut rx = feed.receiver();

    rx.changed().await.unwrap();
    let initial = rx.borrow_and_update().clone().unwrap();
    assert_eq!(initial.budget.id, budget.id);
    assert!(initial.entries.is_empty());

    engine
        .create_entry(
            budget.id,
            "250",
            "rent",
            EntryKind::Outcome,
            Category::Housing,
            date("2025-01-02"),
            None,
        )
        .await
        .unwrap();
    engine
        .create_entry(
            budget.id,
            "50",
            "refund",
            EntryKind::Income,
            Category::Other,
            date("2025-01-03"),
            None,
        )
        .await
        .unwrap();

    // the feed recomputes asynchronously; give it time to settle on the
    // final composite
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let detail = rx.borrow_and_update().clone().unwrap();
    assert_eq!(detail.entries.len(), 2);
    assert_eq!(detail.total_expenses(), MoneyCents::new(25_000));
    assert_eq!(detail.total_incomes(), MoneyCents::new(5_000));
    // 1000 + 50 - 250
    assert_eq!(detail.balance(), MoneyCents::new(80_000));

    // the non-reactive slot holds the same composite
    let cached = engine.cached_detail(budget.id).unwrap();
    assert_eq!(*cached, detail);
}

#[tokio::test]
async fn detail_feed_skips_value_equal_composites() {
    let engine = test_engine().await;
    let budget = engine
        .create_budget("Main", "1000", date("2025-01-01"))
        .await
        .unwrap();

    let feed = engine.watch_detail(budget.id).await.unwrap();
    let mut rx = feed.receiver();
    rx.changed().await.unwrap();
    let _ = rx.borrow_and_update();

    // an unrelated budget re-emits the budget list, but this budget's
    // composite is value-equal and must not be re-emitted
    engine
        .create_budget("Other", "500", date("2025-01-01"))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn deleting_the_budget_ends_the_detail() {
    let engine = test_engine().await;
    let budget = engine
        .create_budget("Main", "1000", date("2025-01-01"))
        .await
        .unwrap();
    engine
        .create_entry(
            budget.id,
            "10",
            "one",
            EntryKind::Outcome,
            Category::Other,
            date("2025-01-15"),
            None,
        )
        .await
        .unwrap();

    let feed = engine.watch_detail(budget.id).await.unwrap();
    let mut rx = feed.receiver();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_some());

    engine.delete_budget(budget.id).await.unwrap();

    // the deletion reaches the feed as an empty-entries emission followed by
    // the budget-list emission; wait for the terminal `None`
    loop {
        rx.changed().await.unwrap();
        if rx.borrow_and_update().is_none() {
            break;
        }
    }
    assert!(engine.cached_detail(budget.id).is_none());
    assert!(engine.cached_entries(budget.id).is_empty());
    assert!(engine.cached_budgets().is_empty());
}

#[tokio::test]
async fn filtered_entries_with_blank_filter_is_the_snapshot() {
    let engine = test_engine().await;
    let budget = engine
        .create_budget("Main", "1000", date("2025-01-01"))
        .await
        .unwrap();
    for (amount, description, kind, category) in [
        ("100.0", "shop", EntryKind::Outcome, Category::Groceries),
        ("200.0", "salary", EntryKind::Income, Category::Groceries),
    ] {
        engine
            .create_entry(
                budget.id,
                amount,
                description,
                kind,
                category,
                date("2025-01-15"),
                None,
            )
            .await
            .unwrap();
    }

    let snapshot = engine.cached_entries(budget.id);
    let unfiltered = engine.filtered_entries(budget.id, &EntryFilter::default());
    assert_eq!(unfiltered, *snapshot);

    let filtered = engine.filtered_entries(
        budget.id,
        &EntryFilter {
            kind: Some(EntryKind::Outcome),
            category: Some(Category::Groceries),
            ..Default::default()
        },
    );
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].description, "shop");
    assert_eq!(filtered[0].amount, MoneyCents::new(10_000));
}

#[tokio::test]
async fn batch_deletion_consumes_the_selection() {
    let engine = test_engine().await;
    let budget = engine
        .create_budget("Main", "1000", date("2025-01-01"))
        .await
        .unwrap();
    let mut ids = Vec::new();
    for description in ["one", "two", "three"] {
        let entry = engine
            .create_entry(
                budget.id,
                "10",
                description,
                EntryKind::Outcome,
                Category::Other,
                date("2025-01-15"),
                None,
            )
            .await
            .unwrap();
        ids.push(entry.id);
    }

    let mut selection = Selection::new();
    selection.begin(ids[0]);
    selection.toggle(ids[2], true);

    let deleted = engine.delete_selected_entries(&mut selection).await.unwrap();
    assert_eq!(deleted, 2);
    assert!(!selection.is_active());
    assert!(selection.is_empty());

    let remaining = engine.cached_entries(budget.id);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, ids[1]);
}

#[tokio::test]
async fn statuses_derive_from_rows_and_tracker() {
    let engine = test_engine().await;
    let budget = engine
        .create_budget("Main", "1000", date("2025-01-01"))
        .await
        .unwrap();
    let entry = engine
        .create_entry(
            budget.id,
            "10",
            "one",
            EntryKind::Outcome,
            Category::Other,
            date("2025-01-15"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(engine.budget_status(&budget), SyncStatus::LocalPending);
    assert_eq!(engine.entry_status(&entry), SyncStatus::LocalPending);
}
