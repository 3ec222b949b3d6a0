//! Integration tests for the Order aggregate.
//!
//! These tests drive orders through the command handler so every transition
//! is written to and replayed from a journal.

use common::{OrderId, RunId};
use domain::{
    Aggregate, CommandHandler, DomainError, DomainEvent, Order, OrderError, OrderEvent,
    OrderRequest, OrderState, ReferenceData,
};
use journal::{InMemoryJournal, Journal, JournalError, Sequence};

fn handler() -> CommandHandler<InMemoryJournal, Order> {
    CommandHandler::new(InMemoryJournal::new())
}

async fn place(
    handler: &CommandHandler<InMemoryJournal, Order>,
    name: &str,
    pizza: i32,
) -> OrderId {
    let order_id = OrderId::new();
    handler
        .execute(order_id, |order| {
            order.place(order_id, RunId::new(), OrderRequest::new(name, pizza))
        })
        .await
        .unwrap();
    order_id
}

async fn publish(handler: &CommandHandler<InMemoryJournal, Order>, order_id: OrderId) {
    let data = ReferenceData::standard();
    let order = handler.load(order_id).await.unwrap();
    let item = data
        .catalog
        .lookup(order.request().pizza_number)
        .unwrap()
        .clone();
    let customer = data.directory.lookup(&order.request().customer_name);

    handler
        .execute(order_id, |order| order.verify_pizza(item, 1))
        .await
        .unwrap();
    handler
        .execute(order_id, |order| order.verify_customer(customer, 2))
        .await
        .unwrap();
    handler
        .execute(order_id, |order| order.publish())
        .await
        .unwrap();
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn complete_order_lifecycle() {
        let handler = handler();
        let roster = ReferenceData::standard().roster;

        let order_id = place(&handler, "Peter", 1).await;
        publish(&handler, order_id).await;

        let order = handler.load(order_id).await.unwrap();
        assert_eq!(order.state(), OrderState::AwaitingDriver);
        assert_eq!(order.sequence(), Sequence::new(4));

        let assignment = roster.find("walter").unwrap().assign("");
        let result = handler
            .execute(order_id, |order| order.assign_driver(assignment))
            .await
            .unwrap();

        assert_eq!(result.new_sequence, Sequence::new(6));
        assert_eq!(result.aggregate.state(), OrderState::Succeeded);
        let outcome = result.aggregate.result().unwrap();
        assert!(outcome.success);
        assert!(outcome.message.contains("Kebab Pizza"));
        assert!(outcome.message.contains("Mosstenabacken 1, 12432 Bandhagen"));
        assert!(outcome.message.contains("5m"));
        assert!(outcome.message.contains("👴 Walter Smith"));
    }

    #[tokio::test]
    async fn aggregate_reconstruction_from_journal() {
        let handler = handler();
        let order_id = place(&handler, "John Doe", 3).await;
        publish(&handler, order_id).await;

        let entries = handler.journal().read_stream(order_id).await.unwrap();
        let types: Vec<_> = entries.iter().map(|e| e.entry_type.as_str()).collect();
        assert_eq!(
            types,
            vec![
                "OrderRequested",
                "PizzaVerified",
                "CustomerVerified",
                "OrderPublished"
            ]
        );
        assert!(entries.iter().all(|e| e.stream_type == "PlaceOrder"));

        let rebuilt: Order = domain::replay(entries).unwrap();
        assert_eq!(rebuilt.id(), Some(order_id));
        assert_eq!(rebuilt.state(), OrderState::AwaitingDriver);
        assert_eq!(rebuilt.customer().unwrap().name, "John Doe");
        assert_eq!(rebuilt.item().unwrap().name, "Hawaiian");
    }

    #[tokio::test]
    async fn cancel_at_various_stages() {
        let handler = handler();

        let created = place(&handler, "Peter", 1).await;
        let published = place(&handler, "Peter", 2).await;
        publish(&handler, published).await;

        for order_id in [created, published] {
            let result = handler
                .execute(order_id, |order| order.cancel("operator"))
                .await
                .unwrap();
            assert_eq!(result.aggregate.state(), OrderState::Cancelled);
        }
    }
}

mod concurrency {
    use super::*;
    use journal::{AppendOptions, JournalEntry};

    #[tokio::test]
    async fn stale_writer_is_detected() {
        let journal = InMemoryJournal::new();
        let handler: CommandHandler<_, Order> = CommandHandler::new(journal.clone());
        let order_id = place(&handler, "Peter", 1).await;

        // A second writer still believes the stream is empty.
        let event = OrderEvent::order_rejected("stale");
        let entry = JournalEntry::builder()
            .stream_id(order_id)
            .stream_type("PlaceOrder")
            .entry_type(event.event_type())
            .sequence(Sequence::first())
            .payload(&event)
            .unwrap()
            .build()
            .unwrap();

        let result = journal.append(vec![entry], AppendOptions::expect_new()).await;
        assert!(matches!(
            result,
            Err(JournalError::ConcurrencyConflict { .. })
        ));

        let order = handler.load(order_id).await.unwrap();
        assert_eq!(order.state(), OrderState::Created);
    }

    #[tokio::test]
    async fn concurrent_assignments_resolve_once() {
        let handler = handler();
        let roster = ReferenceData::standard().roster;
        let order_id = place(&handler, "Peter", 1).await;
        publish(&handler, order_id).await;

        let tasks: Vec<_> = ["tommy", "walter", "james"]
            .into_iter()
            .map(|id| {
                let handler = handler.clone();
                let assignment = roster.find(id).unwrap().assign("");
                tokio::spawn(async move {
                    handler
                        .execute(order_id, |order| order.assign_driver(assignment))
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(DomainError::Order(OrderError::AlreadyAssigned))
                | Err(DomainError::Journal(JournalError::ConcurrencyConflict { .. })) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 1);
        let order = handler.load(order_id).await.unwrap();
        assert!(order.driver_assigned());
        assert_eq!(order.sequence(), Sequence::new(6));
    }
}

mod error_handling {
    use super::*;

    #[tokio::test]
    async fn cannot_publish_unverified_order() {
        let handler = handler();
        let order_id = place(&handler, "Peter", 1).await;

        let result = handler.execute(order_id, |order| order.publish()).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::InvalidStateTransition { .. }))
        ));
    }

    #[tokio::test]
    async fn cannot_place_same_order_twice() {
        let handler = handler();
        let order_id = place(&handler, "Peter", 1).await;

        let result = handler
            .execute(order_id, |order| {
                order.place(order_id, RunId::new(), OrderRequest::new("Peter", 1))
            })
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::AlreadyRequested))
        ));
    }

    #[tokio::test]
    async fn rejected_order_stays_rejected() {
        let handler = handler();
        let order_id = place(&handler, "Peter", 9).await;

        handler
            .execute(order_id, |order| {
                order.reject("You requested pizza 9, which is not on the menu")
            })
            .await
            .unwrap();

        let order = handler.load(order_id).await.unwrap();
        assert_eq!(order.state(), OrderState::Rejected);
        assert!(!order.result().unwrap().success);
        assert!(
            handler
                .execute(order_id, |order| order.cancel("late"))
                .await
                .is_err()
        );
    }
}
