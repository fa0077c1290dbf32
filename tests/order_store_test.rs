use grocery_dispatch::clients::OrderClient;
use grocery_dispatch::dispatch::{ConnectionRole, DispatchError, DispatchEvent, DispatchHub, HubClient};
use grocery_dispatch::earnings::EarningsPolicy;
use grocery_dispatch::model::{DeliveryAddress, LineItem, OrderCreate, OrderId, OrderStatus, PartnerId, PaymentMethod};
use grocery_dispatch::order_store::{CommitHooks, ConditionalTransition, OrderError, Transition};
use grocery_dispatch::tracking::{LocationTracker, SampleClient, SampleStore};
use tokio::task::JoinHandle;

fn params(customer: &str) -> OrderCreate {
    OrderCreate {
        customer_id: customer.into(),
        items: vec![LineItem::new("sku-1", "Bananas", 40.0, 1)],
        address: DeliveryAddress::default(),
        payment_method: PaymentMethod::CashOnDelivery,
        delivery_fee: 25.0,
    }
}

fn accept(partner: &str) -> ConditionalTransition {
    ConditionalTransition::new(
        OrderStatus::Placed,
        Transition::Accept {
            partner_id: PartnerId::new(partner),
        },
    )
}

/// Order store, sample store and hub wired the way `DispatchSystem` wires them.
fn start() -> (OrderClient, SampleClient, HubClient, JoinHandle<()>) {
    let (hub, hub_client) = DispatchHub::new(64, 64, EarningsPolicy::default());
    tokio::spawn(hub.run());
    let (sample_store, samples) = SampleStore::new(16);
    tokio::spawn(sample_store.run(hub_client.clone()));
    let (store, orders) = grocery_dispatch::order_store::new(16);
    let hooks = CommitHooks {
        hub: hub_client.clone(),
        samples: samples.clone(),
    };
    let handle = tokio::spawn(store.run(hooks));
    (orders, samples, hub_client, handle)
}

fn step(from: OrderStatus, transition: Transition) -> ConditionalTransition {
    ConditionalTransition::new(from, transition)
}

/// Real order store wired to a real hub. An admin connection on the hub observes the store's
/// change feed directly, without the broker in between.
#[tokio::test]
async fn test_order_store_publishes_every_commit_in_order() {
    let (orders, _samples, hub_client, handle) = start();
    let mut feed = hub_client.connect(ConnectionRole::Admin).await.unwrap();

    let id = orders.create_order(params("cust-1")).await.expect("Failed to create order");
    assert_eq!(id, OrderId(1));
    assert_eq!(orders.list_unassigned().await.unwrap().len(), 1);

    let confirmed = orders.apply(id, accept("p-1")).await.unwrap();
    assert_eq!(confirmed.version, 2);
    assert!(orders.list_unassigned().await.unwrap().is_empty());
    assert_eq!(orders.list_by_status(OrderStatus::Confirmed).await.unwrap().len(), 1);

    // A losing transition commits nothing and publishes nothing
    let lost = orders.apply(id, accept("p-2")).await.unwrap_err();
    assert!(matches!(lost, OrderError::StaleStateConflict { .. }));
    assert_eq!(orders.get_order(id).await.unwrap().assigned_partner_id, Some(PartnerId::new("p-1")));

    hub_client.stats().await.unwrap();
    let mut versions = Vec::new();
    while let Ok(event) = feed.events.try_recv() {
        match event {
            DispatchEvent::StatusChanged { order_id, version, .. } => {
                assert_eq!(order_id, id);
                versions.push(version);
            }
            other => panic!("Unexpected event {other:?}"),
        }
    }
    assert_eq!(versions, vec![1, 2]);

    drop(orders);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_rejected_checkout_does_not_consume_an_id() {
    let (orders, _samples, _hub, _handle) = start();

    let mut invalid = params("cust-1");
    invalid.delivery_fee = -1.0;
    assert!(matches!(orders.create_order(invalid).await, Err(OrderError::Validation(_))));

    let id = orders.create_order(params("cust-2")).await.unwrap();
    let order = orders.get_order(id).await.unwrap();
    assert_eq!(id, OrderId(1));
    assert!(order.order_number.ends_with("-000001"));
    assert_eq!(order.total, 65.0);
}

#[tokio::test]
async fn test_missing_order() {
    let (orders, _samples, _hub, _handle) = start();

    assert_eq!(orders.get_order(OrderId(7)).await, Err(OrderError::NotFound(OrderId(7))));
    assert_eq!(
        orders.apply(OrderId(7), accept("p-1")).await,
        Err(OrderError::NotFound(OrderId(7)))
    );
}

/// Drives a fresh order to OUT_FOR_DELIVERY for `partner`.
async fn out_for_delivery(orders: &OrderClient, partner: &str) -> OrderId {
    let id = orders.create_order(params("cust-race")).await.unwrap();
    let partner_id = PartnerId::new(partner);
    orders.apply(id, accept(partner)).await.unwrap();
    orders
        .apply(
            id,
            step(
                OrderStatus::Confirmed,
                Transition::MarkPreparing {
                    partner_id: partner_id.clone(),
                },
            ),
        )
        .await
        .unwrap();
    orders
        .apply(id, step(OrderStatus::Preparing, Transition::MarkPickedUp { partner_id }))
        .await
        .unwrap();
    id
}

/// Races a position report against a terminal transition many times over. Whichever wins,
/// no sample survives the order and no location is broadcast after its terminal status.
async fn race_reports_against(terminal: impl Fn(PartnerId) -> Transition) {
    let (orders, samples, hub_client, _handle) = start();
    let tracker = LocationTracker::new(orders.clone(), samples.clone(), 20.0);
    let mut feed = hub_client.connect(ConnectionRole::Admin).await.unwrap();
    let partner = PartnerId::new("p-race");

    for _ in 0..100 {
        let id = out_for_delivery(&orders, "p-race").await;

        let report = tokio::spawn({
            let tracker = tracker.clone();
            let partner = partner.clone();
            async move { tracker.report_location(id, partner, 12.93, 77.62).await }
        });
        let finish = tokio::spawn({
            let orders = orders.clone();
            let transition = step(OrderStatus::OutForDelivery, terminal(partner.clone()));
            async move { orders.apply(id, transition).await }
        });
        let reported = report.await.unwrap();
        let finished = finish.await.unwrap().unwrap();
        assert!(finished.status.is_terminal());

        match &reported {
            Ok(update) => assert_eq!(update.order_id, id),
            Err(DispatchError::InvalidState { status, .. }) => assert_eq!(*status, finished.status),
            Err(other) => panic!("Unexpected report failure {other:?}"),
        }
        assert_eq!(samples.latest(id, partner.clone()).await.unwrap(), None);

        hub_client.stats().await.unwrap();
        let mut located = false;
        let mut terminal_seen = false;
        while let Ok(event) = feed.events.try_recv() {
            match event {
                DispatchEvent::LocationUpdated(update) => {
                    assert_eq!(update.order_id, id);
                    assert!(!terminal_seen, "Location for {id} broadcast after its terminal status");
                    located = true;
                }
                DispatchEvent::StatusChanged { status, .. } if status.is_terminal() => terminal_seen = true,
                _ => {}
            }
        }
        assert!(terminal_seen);
        assert_eq!(located, reported.is_ok());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_location_reports_never_outlive_delivery() {
    race_reports_against(|partner_id| Transition::MarkDelivered { partner_id }).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_location_reports_never_outlive_cancellation() {
    race_reports_against(|_| Transition::Cancel {
        reason: "customer unreachable".into(),
    })
    .await;
}
