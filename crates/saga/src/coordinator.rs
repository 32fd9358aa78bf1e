//! Saga coordinator: the entry point, the continuations, and the loop that
//! delivers queued calls.

use chrono::Utc;
use common::AggregateId;
use domain::{AccountId, Aggregate, ComposeRequest, DomainEvent, SagaRequest};
use event_store::{AppendOptions, EventEnvelope, EventStore};

use crate::aggregate::SagaRecord;
use crate::budget::{BudgetValidator, Gas, HopCosts};
use crate::composition::{ITEM_ID_KEY, SAGA_TYPE, SAGA_TYPE_KEY};
use crate::context::{CallOutcome, Continuation, Dispatch, RemoteCall, SagaContext};
use crate::error::{Result, SagaError};
use crate::events::SagaEvent;
use crate::machine::{self, Transition};
use crate::oracles::OracleRegistry;
use crate::runtime::{Mailbox, StepOutcome};
use crate::services::ledger::BalanceLedger;
use crate::services::metadata::MetadataStore;
use crate::state::SagaState;

/// Orchestrates accessory composition sagas.
///
/// `start` validates a request and dispatches the forward swap. From then
/// on the saga advances only when the runtime delivers a queued call and
/// invokes the continuation named in the message; every piece of state the
/// continuation needs travels inside that message. Remote calls are made as
/// the orchestrator's own account.
pub struct SagaCoordinator<S, L, M>
where
    S: EventStore,
    L: BalanceLedger,
    M: MetadataStore,
{
    store: S,
    ledger: L,
    metadata: M,
    oracles: OracleRegistry,
    budget: BudgetValidator,
    orchestrator: AccountId,
    mailbox: Mailbox,
}

impl<S, L, M> SagaCoordinator<S, L, M>
where
    S: EventStore,
    L: BalanceLedger,
    M: MetadataStore,
{
    pub fn new(
        store: S,
        ledger: L,
        metadata: M,
        oracles: OracleRegistry,
        orchestrator: AccountId,
        costs: HopCosts,
    ) -> Self {
        Self {
            store,
            ledger,
            metadata,
            oracles,
            budget: BudgetValidator::new(costs),
            orchestrator,
            mailbox: Mailbox::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn oracles(&self) -> &OracleRegistry {
        &self.oracles
    }

    pub fn budget(&self) -> &BudgetValidator {
        &self.budget
    }

    pub fn orchestrator(&self) -> &AccountId {
        &self.orchestrator
    }

    /// Number of calls waiting for delivery.
    pub fn pending(&self) -> usize {
        self.mailbox.pending()
    }

    /// Starts a saga from a wire request.
    ///
    /// Checks, in order, that `caller` is an oracle, that the request is
    /// well-formed, and that `attached_gas` covers the worst-case path. Any
    /// failure is returned before a call is dispatched or a record written.
    /// On success the forward swap is queued and the new saga id returned;
    /// the outcome is only observable through the saga's records.
    #[tracing::instrument(skip(self, request), fields(item_id = %request.item_id))]
    pub async fn start(
        &self,
        caller: &AccountId,
        request: ComposeRequest,
        attached_gas: Gas,
    ) -> Result<AggregateId> {
        let admitted = self
            .authorize(caller)
            .and_then(|()| request.validate().map_err(SagaError::from));
        match admitted {
            Ok(request) => self.launch(caller, request, attached_gas).await,
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Starts a saga from an already parsed request.
    #[tracing::instrument(skip(self, request), fields(item_id = %request.item_id))]
    pub async fn start_request(
        &self,
        caller: &AccountId,
        request: SagaRequest,
        attached_gas: Gas,
    ) -> Result<AggregateId> {
        if let Err(e) = self.authorize(caller) {
            return Err(self.reject(e));
        }
        self.launch(caller, request, attached_gas).await
    }

    async fn launch(
        &self,
        caller: &AccountId,
        request: SagaRequest,
        attached_gas: Gas,
    ) -> Result<AggregateId> {
        if let Err(e) = self.budget.check(attached_gas) {
            return Err(self.reject(e));
        }

        let saga_id = AggregateId::new();
        let mut context = SagaContext::new(saga_id, request, Utc::now());

        let started = SagaEvent::saga_started(
            saga_id,
            caller.clone(),
            &context.request,
            attached_gas,
            context.started_at,
        );
        self.append_records(&mut context, vec![started]).await?;

        let Transition { next, call, .. } = machine::begin(&context.request);
        if let Some(call) = call {
            self.dispatch(call, next, context)?;
        }

        metrics::counter!("saga_started_total").increment(1);
        tracing::info!(%saga_id, %caller, "saga started");
        Ok(saga_id)
    }

    /// Continuation for the forward swap.
    #[tracing::instrument(
        skip(self, context, outcome),
        fields(saga_id = %context.saga_id, item_id = %context.item_id())
    )]
    pub async fn on_balances_swapped(
        &self,
        context: SagaContext,
        outcome: CallOutcome,
    ) -> Result<StepOutcome> {
        self.resume(SagaState::AwaitingMetadataResult, context, outcome)
            .await
    }

    /// Continuation for the metadata replacement.
    #[tracing::instrument(
        skip(self, context, outcome),
        fields(saga_id = %context.saga_id, item_id = %context.item_id())
    )]
    pub async fn on_metadata_replaced(
        &self,
        context: SagaContext,
        outcome: CallOutcome,
    ) -> Result<StepOutcome> {
        self.resume(SagaState::AwaitingRollbackDecision, context, outcome)
            .await
    }

    /// Continuation for the compensating swap.
    #[tracing::instrument(
        skip(self, context, outcome),
        fields(saga_id = %context.saga_id, item_id = %context.item_id())
    )]
    pub async fn on_rollback_settled(
        &self,
        context: SagaContext,
        outcome: CallOutcome,
    ) -> Result<StepOutcome> {
        self.resume(SagaState::AwaitingRollbackResult, context, outcome)
            .await
    }

    /// Performs a queued call and invokes the continuation it names.
    pub async fn deliver(&self, dispatch: Dispatch) -> Result<StepOutcome> {
        let Dispatch { call, then } = dispatch;
        let outcome = self.perform(&call).await;

        match then.state {
            SagaState::AwaitingMetadataResult => {
                self.on_balances_swapped(then.context, outcome).await
            }
            SagaState::AwaitingRollbackDecision => {
                self.on_metadata_replaced(then.context, outcome).await
            }
            SagaState::AwaitingRollbackResult => {
                self.on_rollback_settled(then.context, outcome).await
            }
            state => Err(SagaError::InvalidState {
                state,
                action: "resume from a dispatch",
            }),
        }
    }

    /// Delivers queued calls until the mailbox is empty, including calls
    /// queued along the way. Returns how many were delivered.
    pub async fn run_until_idle(&self) -> Result<usize> {
        let mut delivered = 0;
        while let Some(dispatch) = self.mailbox.try_next().await {
            self.deliver(dispatch).await?;
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Delivers calls as they are queued, forever.
    pub async fn run(&self) {
        tracing::info!(orchestrator = %self.orchestrator, "saga runtime started");
        while let Some(dispatch) = self.mailbox.next().await {
            let saga_id = dispatch.then.context.saga_id;
            if let Err(e) = self.deliver(dispatch).await {
                tracing::error!(%saga_id, error = %e, "failed to deliver saga call");
            }
        }
    }

    /// Loads a saga's record by replaying its stream.
    pub async fn get_saga(&self, saga_id: AggregateId) -> Result<Option<SagaRecord>> {
        let events = self.store.get_events_for_aggregate(saga_id).await?;
        Ok(domain::replay(events)?)
    }

    /// Returns a saga's raw records in order.
    pub async fn saga_records(&self, saga_id: AggregateId) -> Result<Vec<EventEnvelope>> {
        Ok(self.store.get_events_for_aggregate(saga_id).await?)
    }

    fn authorize(&self, caller: &AccountId) -> Result<()> {
        if !self.oracles.is_oracle(caller) {
            return Err(SagaError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    fn reject(&self, error: SagaError) -> SagaError {
        let reason = match &error {
            SagaError::Unauthorized { .. } => "unauthorized",
            SagaError::InvalidRequest(_) => "invalid_request",
            SagaError::InsufficientBudget { .. } | SagaError::BudgetOverflow => "budget",
            _ => error.kind().as_str(),
        };
        metrics::counter!("saga_rejected_total", "reason" => reason).increment(1);
        tracing::warn!(reason, error = %error, "saga rejected");
        error
    }

    async fn resume(
        &self,
        state: SagaState,
        mut context: SagaContext,
        outcome: CallOutcome,
    ) -> Result<StepOutcome> {
        let succeeded = outcome.is_success();
        let Transition {
            next,
            call,
            records,
        } = machine::transition(state, outcome, &context.request)?;

        self.append_records(&mut context, records).await?;

        match call {
            Some(call) => {
                tracing::info!(step = call.step_name(), %next, "saga step dispatched");
                self.dispatch(call, next, context)?;
                Ok(StepOutcome::Chained(next))
            }
            None => {
                self.finish(&context, next);
                Ok(StepOutcome::Finished {
                    terminal: next,
                    succeeded,
                })
            }
        }
    }

    async fn perform(&self, call: &RemoteCall) -> CallOutcome {
        let result = match call {
            RemoteCall::SwapBalances {
                item_id,
                holder,
                lock_set,
                unlock_set,
            } => {
                self.ledger
                    .swap_balances(&self.orchestrator, item_id, holder, lock_set, unlock_set)
                    .await
            }
            RemoteCall::ReplaceMetadata { item_id, metadata } => {
                self.metadata
                    .replace_metadata(&self.orchestrator, item_id, metadata)
                    .await
            }
            RemoteCall::RollbackBalances {
                item_id,
                holder,
                lock_set,
                unlock_set,
            } => self
                .ledger
                .swap_balances(&self.orchestrator, item_id, holder, lock_set, unlock_set)
                .await
                .map_err(|e| SagaError::RollbackRejected(e.to_string())),
        };

        if let Err(ref e) = result {
            tracing::warn!(step = call.step_name(), error = %e, "remote call failed");
        }
        CallOutcome::from(result)
    }

    fn dispatch(&self, call: RemoteCall, state: SagaState, context: SagaContext) -> Result<()> {
        self.mailbox.post(Dispatch {
            call,
            then: Continuation { state, context },
        })
    }

    fn finish(&self, context: &SagaContext, terminal: SagaState) {
        let saga_id = context.saga_id;
        let item_id = context.item_id();
        let elapsed = (Utc::now() - context.started_at).num_milliseconds() as f64 / 1000.0;
        metrics::histogram!("saga_duration_seconds").record(elapsed);

        match terminal {
            SagaState::Completed => {
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(%saga_id, %item_id, duration = elapsed, "saga completed");
            }
            SagaState::FailedClean => {
                metrics::counter!("saga_failed_clean").increment(1);
                tracing::warn!(%saga_id, %item_id, duration = elapsed, "saga failed cleanly");
            }
            _ => {
                metrics::counter!("saga_failed_inconsistent").increment(1);
                tracing::error!(
                    %saga_id,
                    %item_id,
                    lock_set = ?context.request.lock_set,
                    unlock_set = ?context.request.unlock_set,
                    "saga left unresolved; manual remediation required"
                );
            }
        }
    }

    /// Appends records to the saga's stream, advancing the version carried
    /// in `context`.
    async fn append_records(
        &self,
        context: &mut SagaContext,
        records: Vec<SagaEvent>,
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let item_id = serde_json::Value::from(context.item_id().as_str());
        let mut version = context.record_version;
        let envelopes = records
            .iter()
            .map(|record| -> Result<EventEnvelope> {
                version = version.next();
                let envelope = EventEnvelope::builder()
                    .event_type(record.event_type())
                    .aggregate_id(context.saga_id)
                    .aggregate_type(SagaRecord::aggregate_type())
                    .version(version)
                    .payload(record)?
                    .metadata(ITEM_ID_KEY, item_id.clone())
                    .metadata(SAGA_TYPE_KEY, serde_json::Value::from(SAGA_TYPE))
                    .build()?;
                Ok(envelope)
            })
            .collect::<Result<Vec<_>>>()?;

        context.record_version = self
            .store
            .append(
                envelopes,
                AppendOptions::expect_version(context.record_version),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ledger::InMemoryBalanceLedger;
    use crate::services::metadata::InMemoryMetadataStore;
    use domain::{Amount, ItemId, TokenMetadata, UnitId};
    use event_store::InMemoryEventStore;

    type TestCoordinator =
        SagaCoordinator<InMemoryEventStore, InMemoryBalanceLedger, InMemoryMetadataStore>;

    fn account(name: &str) -> AccountId {
        AccountId::parse(name).unwrap()
    }

    async fn setup() -> (TestCoordinator, InMemoryBalanceLedger, InMemoryMetadataStore) {
        let orchestrator = account("composition.near");
        let ledger = InMemoryBalanceLedger::with_minter(orchestrator.clone());
        let metadata = InMemoryMetadataStore::with_minter(orchestrator.clone());

        ledger
            .mint(
                &orchestrator,
                &account("alice.near"),
                &domain::BalanceSet::from_parallel("mint", &["1"], &["10"]).unwrap(),
            )
            .await
            .unwrap();
        metadata.insert_item(ItemId::parse("77").unwrap(), TokenMetadata::titled("v1"));

        let coordinator = SagaCoordinator::new(
            InMemoryEventStore::new(),
            ledger.clone(),
            metadata.clone(),
            OracleRegistry::new(account("owner.near")),
            orchestrator,
            HopCosts::default(),
        );
        (coordinator, ledger, metadata)
    }

    fn compose(lock: &[(&str, &str)]) -> ComposeRequest {
        ComposeRequest {
            item_id: "77".to_string(),
            item_owner: "alice.near".to_string(),
            lock_token_ids: lock.iter().map(|(id, _)| id.to_string()).collect(),
            lock_amounts: lock.iter().map(|(_, a)| a.to_string().into()).collect(),
            unlock_token_ids: vec![],
            unlock_amounts: vec![],
            metadata: TokenMetadata::titled("v2"),
        }
    }

    fn budget() -> Gas {
        Gas::from_tgas(90)
    }

    #[tokio::test]
    async fn start_only_queues_the_forward_swap() {
        let (coordinator, ledger, _) = setup().await;

        let saga_id = coordinator
            .start(&account("owner.near"), compose(&[("1", "10")]), budget())
            .await
            .unwrap();

        assert_eq!(coordinator.pending(), 1);
        assert_eq!(ledger.swap_count(), 0);
        let saga = coordinator.get_saga(saga_id).await.unwrap().unwrap();
        assert_eq!(saga.state(), SagaState::AwaitingMetadataResult);
    }

    #[tokio::test]
    async fn continuations_chain_to_completion() {
        let (coordinator, ledger, metadata) = setup().await;
        let saga_id = coordinator
            .start(&account("owner.near"), compose(&[("1", "10")]), budget())
            .await
            .unwrap();

        assert_eq!(coordinator.run_until_idle().await.unwrap(), 2);

        let saga = coordinator.get_saga(saga_id).await.unwrap().unwrap();
        assert_eq!(saga.state(), SagaState::Completed);
        assert_eq!(saga.version().as_i64(), 4);
        let item = ItemId::parse("77").unwrap();
        assert_eq!(
            ledger
                .locked_balance_of(&item, &UnitId::parse("1").unwrap())
                .await,
            Amount::new(10)
        );
        assert_eq!(
            metadata.metadata_of(&item).await,
            Some(TokenMetadata::titled("v2"))
        );
    }

    #[tokio::test]
    async fn continuation_reports_inspected_call() {
        let (coordinator, ledger, _) = setup().await;
        ledger.set_fail_on_swap(true);

        coordinator
            .start(&account("owner.near"), compose(&[("1", "10")]), budget())
            .await
            .unwrap();
        let dispatch = coordinator.mailbox.try_next().await.unwrap();
        let outcome = coordinator.deliver(dispatch).await.unwrap();

        assert_eq!(
            outcome,
            StepOutcome::Finished {
                terminal: SagaState::FailedClean,
                succeeded: false
            }
        );
    }

    #[tokio::test]
    async fn continuation_invoked_directly() {
        let (coordinator, _, _) = setup().await;
        let request = compose(&[("1", "10")]).validate().unwrap();
        let context = SagaContext::new(AggregateId::new(), request, Utc::now());

        let outcome = coordinator
            .on_balances_swapped(context, CallOutcome::Succeeded)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            StepOutcome::Chained(SagaState::AwaitingRollbackDecision)
        );
        assert_eq!(coordinator.pending(), 1);
    }

    #[tokio::test]
    async fn rejected_start_writes_nothing() {
        let (coordinator, _, _) = setup().await;

        let unauthorized = coordinator
            .start(&account("mallory.near"), compose(&[("1", "10")]), budget())
            .await;
        assert!(matches!(unauthorized, Err(SagaError::Unauthorized { .. })));

        let malformed = coordinator
            .start(&account("owner.near"), compose(&[("1", "-1")]), budget())
            .await;
        assert!(matches!(malformed, Err(SagaError::InvalidRequest(_))));

        let underfunded = coordinator
            .start(
                &account("owner.near"),
                compose(&[("1", "10")]),
                Gas::from_tgas(89),
            )
            .await;
        assert!(matches!(
            underfunded,
            Err(SagaError::InsufficientBudget { .. })
        ));

        assert_eq!(coordinator.pending(), 0);
        assert_eq!(coordinator.store().event_count().await, 0);
    }

    #[tokio::test]
    async fn nonexistent_saga() {
        let (coordinator, _, _) = setup().await;
        assert!(
            coordinator
                .get_saga(AggregateId::new())
                .await
                .unwrap()
                .is_none()
        );
    }
}
