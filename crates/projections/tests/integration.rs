//! Projections fed by real saga runs.

use domain::{AccountId, BalanceSet, ComposeRequest, ItemId, TokenMetadata};
use event_store::InMemoryEventStore;
use projections::{ItemHistoryView, Projection, ProjectionProcessor, UnresolvedOperationsView};
use saga::{
    BalanceLedger, Gas, HopCosts, InMemoryBalanceLedger, InMemoryMetadataStore, OracleRegistry,
    SagaCoordinator, SagaState,
};

type TestCoordinator =
    SagaCoordinator<InMemoryEventStore, InMemoryBalanceLedger, InMemoryMetadataStore>;

fn account(name: &str) -> AccountId {
    AccountId::parse(name).unwrap()
}

struct Setup {
    coordinator: TestCoordinator,
    ledger: InMemoryBalanceLedger,
    metadata: InMemoryMetadataStore,
    processor: ProjectionProcessor<InMemoryEventStore>,
    unresolved: UnresolvedOperationsView,
    history: ItemHistoryView,
}

async fn setup() -> Setup {
    let store = InMemoryEventStore::new();
    let orchestrator = account("composition.near");
    let ledger = InMemoryBalanceLedger::with_minter(orchestrator.clone());
    let metadata = InMemoryMetadataStore::with_minter(orchestrator.clone());

    ledger
        .mint(
            &orchestrator,
            &account("alice.near"),
            &BalanceSet::from_parallel("mint", &["1"], &["100"]).unwrap(),
        )
        .await
        .unwrap();
    for item in ["77", "78"] {
        metadata.insert_item(ItemId::parse(item).unwrap(), TokenMetadata::titled("v1"));
    }

    let coordinator = SagaCoordinator::new(
        store.clone(),
        ledger.clone(),
        metadata.clone(),
        OracleRegistry::new(account("owner.near")),
        orchestrator,
        HopCosts::default(),
    );

    let unresolved = UnresolvedOperationsView::new();
    let history = ItemHistoryView::new();
    let mut processor = ProjectionProcessor::new(store);
    processor.register(Box::new(unresolved.clone()) as Box<dyn Projection>);
    processor.register(Box::new(history.clone()) as Box<dyn Projection>);

    Setup {
        coordinator,
        ledger,
        metadata,
        processor,
        unresolved,
        history,
    }
}

fn compose(item: &str, amount: &str) -> ComposeRequest {
    ComposeRequest {
        item_id: item.to_string(),
        item_owner: "alice.near".to_string(),
        lock_token_ids: vec!["1".to_string()],
        lock_amounts: vec![amount.into()],
        unlock_token_ids: vec![],
        unlock_amounts: vec![],
        metadata: TokenMetadata::titled("v2"),
    }
}

async fn run(s: &Setup, item: &str, amount: &str) -> common::AggregateId {
    let saga_id = s
        .coordinator
        .start(&account("owner.near"), compose(item, amount), Gas::from_tgas(90))
        .await
        .unwrap();
    s.coordinator.run_until_idle().await.unwrap();
    saga_id
}

#[tokio::test]
async fn rollback_failure_lands_in_unresolved_queue() {
    let s = setup().await;
    let item = ItemId::parse("77").unwrap();

    let ok = run(&s, "77", "10").await;

    s.metadata.set_locked(&item, true);
    s.ledger.fail_swaps_after(1);
    let stuck = run(&s, "77", "5").await;

    s.processor.run_catch_up().await.unwrap();

    assert!(s.unresolved.get(ok).await.is_none());
    let op = s.unresolved.get(stuck).await.unwrap();
    assert_eq!(op.item_id, item);
    assert_eq!(op.lock_set, BalanceSet::from_parallel("lock", &["1"], &["5"]).unwrap());
    assert!(op.error.contains("Ledger unavailable"));

    let history = s.history.get_item(&item).await.unwrap();
    assert_eq!(history.sagas_started, 2);
    assert_eq!(history.count(SagaState::Completed), 1);
    assert_eq!(history.count(SagaState::FailedInconsistent), 1);
    assert_eq!(history.outcomes[1].saga_id, stuck);
}

#[tokio::test]
async fn histories_are_kept_per_item() {
    let s = setup().await;

    run(&s, "77", "10").await;
    run(&s, "78", "500").await; // more than the holder owns
    run(&s, "78", "1").await;

    s.processor.run_catch_up().await.unwrap();

    let a = s.history.get_item(&ItemId::parse("77").unwrap()).await.unwrap();
    assert_eq!(a.outcomes.len(), 1);

    let b = s.history.get_item(&ItemId::parse("78").unwrap()).await.unwrap();
    assert_eq!(
        b.outcomes.iter().map(|o| o.outcome).collect::<Vec<_>>(),
        vec![SagaState::FailedClean, SagaState::Completed]
    );
    assert!(s.unresolved.is_empty().await);
}

#[tokio::test]
async fn catch_up_mid_saga_then_finish() {
    let s = setup().await;

    s.coordinator
        .start(&account("owner.near"), compose("77", "1"), Gas::from_tgas(90))
        .await
        .unwrap();
    s.processor.run_catch_up().await.unwrap();
    assert_eq!(s.history.items_in_flight().await.len(), 1);

    s.coordinator.run_until_idle().await.unwrap();
    s.processor.run_catch_up().await.unwrap();
    assert!(s.history.items_in_flight().await.is_empty());
}

#[tokio::test]
async fn rebuild_reproduces_views() {
    let s = setup().await;
    s.metadata.set_locked(&ItemId::parse("77").unwrap(), true);
    s.ledger.fail_swaps_after(1);
    run(&s, "77", "3").await;

    s.processor.run_catch_up().await.unwrap();
    let before = s.unresolved.all().await;
    assert_eq!(before.len(), 1);

    s.processor.rebuild_all().await.unwrap();
    assert_eq!(s.unresolved.all().await, before);
    assert_eq!(s.unresolved.position().await.events_processed, 6);
}
