//! Saga coordinator: drives each order from request to outcome.

use std::sync::Arc;
use std::time::Instant;

use common::{OrderId, RunId};
use domain::{
    CommandHandler, DomainError, DriverAssignment, MenuItem, Order, OrderError, OrderEvent,
    OrderRequest, OrderState, PlaceOrderResult,
};
use journal::{Journal, JournalEntry};
use projections::{OrderIndex, OrderIndexEntry};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::{Result, SagaError};
use crate::place_order::{
    CALL_RETRIEVE_MENU, STEP_AWAIT_DRIVER, STEP_LOOKUP_CUSTOMER, STEP_LOOKUP_PIZZA,
    unknown_customer_reason,
};
use crate::retry::{CallFailure, ErrorKind, StepPolicies};
use crate::services::{CustomerDirectory, MenuService};
use crate::slots::{OrderSlot, OrderSlots};

/// A submitted order and the task driving it.
#[derive(Debug)]
pub struct SagaHandle {
    pub order_id: OrderId,
    pub run_id: RunId,
    task: JoinHandle<Result<PlaceOrderResult>>,
}

impl SagaHandle {
    /// Waits for the saga to finish.
    ///
    /// A rejection is `Ok` with `success == false`; operational failure and
    /// cancellation are errors.
    pub async fn outcome(self) -> Result<PlaceOrderResult> {
        self.task
            .await
            .map_err(|e| SagaError::Aborted(e.to_string()))?
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

struct Inner<J, M, D>
where
    J: Journal,
{
    handler: CommandHandler<J, Order>,
    menu: M,
    directory: D,
    index: OrderIndex,
    policies: StepPolicies,
    slots: OrderSlots,
}

/// Runs place-order sagas.
///
/// Each submitted order gets its own task which looks up the pizza and the
/// customer through their retry policies, publishes the order to the
/// [`OrderIndex`] and then parks until a driver is assigned or the order is
/// cancelled. Every step is journaled before the next begins, so a task
/// restarted by [`SagaCoordinator::resume_pending`] picks up where the
/// journal left off.
///
/// Remote calls run outside the order's lock; the journal commit and the
/// index update that follow a step run under it.
pub struct SagaCoordinator<J, M, D>
where
    J: Journal,
{
    inner: Arc<Inner<J, M, D>>,
}

impl<J, M, D> Clone for SagaCoordinator<J, M, D>
where
    J: Journal,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<J, M, D> SagaCoordinator<J, M, D>
where
    J: Journal + Clone + 'static,
    M: MenuService + 'static,
    D: CustomerDirectory + 'static,
{
    pub fn new(journal: J, menu: M, directory: D, index: OrderIndex, policies: StepPolicies) -> Self {
        Self {
            inner: Arc::new(Inner {
                handler: CommandHandler::new(journal),
                menu,
                directory,
                index,
                policies,
                slots: OrderSlots::new(),
            }),
        }
    }

    pub fn journal(&self) -> &J {
        self.inner.handler.journal()
    }

    pub fn index(&self) -> &OrderIndex {
        &self.inner.index
    }

    pub fn policies(&self) -> &StepPolicies {
        &self.inner.policies
    }

    /// Records the request and starts its saga.
    #[tracing::instrument(
        skip(self, request),
        fields(customer = %request.customer_name, pizza = request.pizza_number)
    )]
    pub async fn submit(&self, request: OrderRequest) -> Result<SagaHandle> {
        let order_id = OrderId::new();
        let run_id = RunId::new();

        self.inner
            .handler
            .execute(order_id, |order| order.place(order_id, run_id, request))
            .await?;

        metrics::counter!("saga_submitted_total").increment(1);
        tracing::info!(order_id = %order_id, run_id = %run_id, "order submitted");

        let Some(slot) = self.inner.slots.claim(order_id).await else {
            return Err(SagaError::InvalidState {
                order_id,
                state: OrderState::Created,
                action: "start",
            });
        };
        let task = self.spawn_driver(order_id, slot);

        Ok(SagaHandle {
            order_id,
            run_id,
            task,
        })
    }

    /// Submits an order and waits for its outcome.
    pub async fn place_order(&self, request: OrderRequest) -> Result<PlaceOrderResult> {
        self.submit(request).await?.outcome().await
    }

    /// Delivers a driver to an order waiting for one.
    ///
    /// An order accepts exactly one assignment; later ones fail with
    /// [`SagaError::AlreadyAssigned`] and change nothing.
    #[tracing::instrument(
        skip(self, assignment),
        fields(order_id = %order_id, driver = %assignment.driver_id)
    )]
    pub async fn assign_driver(
        &self,
        order_id: OrderId,
        assignment: DriverAssignment,
    ) -> Result<PlaceOrderResult> {
        let slot = self.inner.slots.slot(order_id).await;
        let outcome = self.assign_locked(order_id, assignment, &slot).await;
        if outcome.is_ok() {
            slot.wake.notify_one();
        }
        self.inner.slots.release(order_id, slot).await;
        outcome
    }

    async fn assign_locked(
        &self,
        order_id: OrderId,
        assignment: DriverAssignment,
        slot: &OrderSlot,
    ) -> Result<PlaceOrderResult> {
        let _guard = slot.lock.lock().await;

        let order = self.existing(order_id).await?;
        if order.driver_assigned() {
            return Err(SagaError::AlreadyAssigned(order_id));
        }
        if !order.state().can_assign_driver() {
            return Err(SagaError::InvalidState {
                order_id,
                state: order.state(),
                action: "assign driver",
            });
        }

        let label = assignment.label.clone();
        let result = self
            .inner
            .handler
            .execute(order_id, |order| order.assign_driver(assignment))
            .await?;

        if let Err(e) = self.inner.index.mark_assigned(order_id, label).await {
            tracing::warn!(error = %e, "order index missed the assignment");
        }

        metrics::counter!("saga_completed").increment(1);
        tracing::info!("driver assigned, order completed");

        let order = result.aggregate;
        order.result().ok_or(SagaError::InvalidState {
            order_id,
            state: order.state(),
            action: "assign driver",
        })
    }

    /// Cancels an order that has not finished yet.
    ///
    /// Its index entry is removed and its saga task ends with
    /// [`SagaError::Cancelled`].
    #[tracing::instrument(skip(self, reason), fields(order_id = %order_id))]
    pub async fn cancel(&self, order_id: OrderId, reason: impl Into<String>) -> Result<Order> {
        let slot = self.inner.slots.slot(order_id).await;
        let outcome = self.cancel_locked(order_id, reason.into(), &slot).await;
        if outcome.is_ok() {
            slot.wake.notify_one();
        }
        self.inner.slots.release(order_id, slot).await;
        outcome
    }

    async fn cancel_locked(&self, order_id: OrderId, reason: String, slot: &OrderSlot) -> Result<Order> {
        let _guard = slot.lock.lock().await;

        let order = self.existing(order_id).await?;
        if !order.state().can_cancel() {
            return Err(SagaError::InvalidState {
                order_id,
                state: order.state(),
                action: "cancel",
            });
        }

        let result = self
            .inner
            .handler
            .execute(order_id, |order| order.cancel(reason))
            .await?;
        self.inner.index.remove(order_id).await;

        tracing::info!(from = %order.state(), "order cancelled");
        Ok(result.aggregate)
    }

    /// Restarts a saga task for every order the journal shows unfinished.
    ///
    /// Orders waiting for a driver are put back in the index first. Steps
    /// already journaled are not repeated.
    #[tracing::instrument(skip(self))]
    pub async fn resume_pending(&self) -> Result<Vec<SagaHandle>> {
        let mut handles = Vec::new();

        for order_id in self.journal().stream_ids().await? {
            let Some(order) = self.inner.handler.load_existing(order_id).await? else {
                continue;
            };
            if order.is_terminal() {
                continue;
            }

            let Some(slot) = self.inner.slots.claim(order_id).await else {
                continue;
            };

            {
                let _guard = slot.lock.lock().await;
                let order = self.existing(order_id).await?;
                if order.state() == OrderState::AwaitingDriver {
                    self.index_published(order_id, &order).await;
                }
            }

            tracing::debug!(order_id = %order_id, state = %order.state(), "resuming order");
            handles.push(SagaHandle {
                order_id,
                run_id: order.run_id().unwrap_or_default(),
                task: self.spawn_driver(order_id, slot),
            });
        }

        tracing::info!(resumed = handles.len(), "pending orders resumed");
        Ok(handles)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.handler.load_existing(order_id).await?)
    }

    /// The outcome of a finished order, or `None` while it is still running.
    pub async fn outcome(&self, order_id: OrderId) -> Result<Option<PlaceOrderResult>> {
        let order = self.existing(order_id).await?;
        if order.is_terminal() {
            settle(order_id, &order).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Every journal entry recorded for an order, oldest first.
    pub async fn history(&self, order_id: OrderId) -> Result<Vec<JournalEntry>> {
        let entries = self.journal().read_stream(order_id).await?;
        if entries.is_empty() {
            return Err(SagaError::OrderNotFound(order_id));
        }
        Ok(entries)
    }

    /// Fetches the menu through the menu policy.
    #[tracing::instrument(skip(self))]
    pub async fn get_menu(&self) -> Result<Vec<MenuItem>> {
        let menu = &self.inner.menu;
        let fetched = self
            .inner
            .policies
            .menu
            .execute(CALL_RETRIEVE_MENU, || menu.retrieve_menu())
            .await?;
        Ok(fetched.value)
    }

    fn spawn_driver(
        &self,
        order_id: OrderId,
        slot: Arc<OrderSlot>,
    ) -> JoinHandle<Result<PlaceOrderResult>> {
        let this = self.clone();
        let span = tracing::info_span!("place_order", order_id = %order_id);

        tokio::spawn(
            async move {
                let outcome = this.drive(order_id, &slot).await;
                slot.unclaim();
                this.inner.slots.release(order_id, slot).await;
                outcome
            }
            .instrument(span),
        )
    }

    /// Advances the order one journaled step at a time until it is terminal.
    async fn drive(&self, order_id: OrderId, slot: &OrderSlot) -> Result<PlaceOrderResult> {
        let started = Instant::now();

        loop {
            let order = self.existing(order_id).await?;

            match order.state() {
                OrderState::Created => self.verify_pizza(order_id, &order, slot).await?,
                OrderState::MenuVerified => self.verify_customer(order_id, &order, slot).await?,
                OrderState::CustomerVerified => self.publish(order_id, slot).await?,
                OrderState::AwaitingDriver => {
                    tracing::debug!(step = STEP_AWAIT_DRIVER, "waiting for a driver");
                    slot.wake.notified().await;
                }
                _ => {
                    metrics::histogram!("saga_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    return settle(order_id, &order);
                }
            }
        }
    }

    async fn verify_pizza(&self, order_id: OrderId, order: &Order, slot: &OrderSlot) -> Result<()> {
        tracing::info!(step = STEP_LOOKUP_PIZZA, "saga step started");
        let number = order.request().pizza_number;
        let menu = &self.inner.menu;
        let call = self
            .inner
            .policies
            .menu
            .execute(STEP_LOOKUP_PIZZA, || menu.lookup_pizza(number))
            .await;

        let _guard = slot.lock.lock().await;
        match call {
            Ok(found) => {
                self.commit(order_id, |order| {
                    order.verify_pizza(found.value, found.attempts)
                })
                .await?;
            }
            Err(CallFailure::NonRetryable { error, .. })
                if error.kind == ErrorKind::UnknownPizza =>
            {
                self.reject(order_id, error.message).await?;
            }
            Err(failure) => self.record_failure(order_id, STEP_LOOKUP_PIZZA, failure).await?,
        }
        Ok(())
    }

    async fn verify_customer(
        &self,
        order_id: OrderId,
        order: &Order,
        slot: &OrderSlot,
    ) -> Result<()> {
        tracing::info!(step = STEP_LOOKUP_CUSTOMER, "saga step started");
        let name = order.request().customer_name.clone();
        let directory = &self.inner.directory;
        let call = self
            .inner
            .policies
            .directory
            .execute(STEP_LOOKUP_CUSTOMER, || directory.lookup_customer(&name))
            .await;

        let _guard = slot.lock.lock().await;
        match call {
            Ok(found) if found.value.is_known() => {
                self.commit(order_id, |order| {
                    order.verify_customer(found.value, found.attempts)
                })
                .await?;
            }
            Ok(_) => self.reject(order_id, unknown_customer_reason(&name)).await?,
            Err(failure) if failure.kind() == ErrorKind::UnknownCustomer => {
                self.reject(order_id, unknown_customer_reason(&name)).await?;
            }
            Err(failure) => {
                self.record_failure(order_id, STEP_LOOKUP_CUSTOMER, failure)
                    .await?
            }
        }
        Ok(())
    }

    async fn publish(&self, order_id: OrderId, slot: &OrderSlot) -> Result<()> {
        let _guard = slot.lock.lock().await;
        let Some(order) = self.commit(order_id, |order| order.publish()).await? else {
            return Ok(());
        };
        self.index_published(order_id, &order).await;
        tracing::info!("order published, waiting for a driver");
        Ok(())
    }

    async fn reject(&self, order_id: OrderId, reason: String) -> Result<()> {
        if self.commit(order_id, |order| order.reject(reason)).await?.is_some() {
            metrics::counter!("saga_rejected").increment(1);
            tracing::info!("order rejected");
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        order_id: OrderId,
        step: &'static str,
        failure: CallFailure,
    ) -> Result<()> {
        let attempts = failure.attempts();
        let error = failure.error().to_string();
        let committed = self
            .commit(order_id, |order| order.fail(step, attempts, error.as_str()))
            .await?;

        if committed.is_some() {
            metrics::counter!("saga_failed").increment(1);
            tracing::error!(
                order_id = %order_id,
                step,
                attempts,
                error = %error,
                "remote step failed, order abandoned"
            );
        }
        Ok(())
    }

    /// Journals a step. Returns `None` when the order finished in the
    /// meantime (cancelled while the step's remote call ran).
    async fn commit<F>(&self, order_id: OrderId, command: F) -> Result<Option<Order>>
    where
        F: FnOnce(&Order) -> std::result::Result<Vec<OrderEvent>, OrderError>,
    {
        match self.inner.handler.execute(order_id, command).await {
            Ok(result) => Ok(Some(result.aggregate)),
            Err(DomainError::Order(OrderError::InvalidStateTransition {
                current_state,
                action,
            })) if current_state.is_terminal() => {
                tracing::debug!(state = %current_state, action, "order already finished, step dropped");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn index_published(&self, order_id: OrderId, order: &Order) {
        match (order.attributes(), order.published_at()) {
            (Some(attributes), Some(published_at)) => {
                self.inner
                    .index
                    .publish(OrderIndexEntry::published(order_id, attributes, published_at))
                    .await;
            }
            _ => tracing::warn!(order_id = %order_id, "published order lacks attributes"),
        }
    }

    async fn existing(&self, order_id: OrderId) -> Result<Order> {
        self.inner
            .handler
            .load_existing(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))
    }
}

/// Maps a terminal order to what its saga reports.
fn settle(order_id: OrderId, order: &Order) -> Result<PlaceOrderResult> {
    if let Some(result) = order.result() {
        return Ok(result);
    }

    match (order.state(), order.failure()) {
        (OrderState::Failed, Some(failure)) => Err(SagaError::OperationalFailure {
            order_id,
            step: failure.step.clone(),
            attempts: failure.attempts,
            reason: failure.error.clone(),
        }),
        (OrderState::Cancelled, _) => Err(SagaError::Cancelled(order_id)),
        (state, _) => Err(SagaError::InvalidState {
            order_id,
            state,
            action: "settle",
        }),
    }
}
