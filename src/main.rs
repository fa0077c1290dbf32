//! # Grocery Dispatch demo
//!
//! Runs one order end to end against the in-process core:
//! 1. Two partners register and receive the new order as an offer.
//! 2. Both accept at once; one wins, the other sees the order retracted.
//! 3. The winner prepares, picks up, reports a position and delivers, while a customer
//!    [`TrackingView`] follows along.
//!
//! Configuration is read from the environment after loading `.env`, if present.

use grocery_dispatch::config::DispatchConfig;
use grocery_dispatch::dispatch::{DispatchEvent, PartnerAction};
use grocery_dispatch::geo::GeoPoint;
use grocery_dispatch::lifecycle::{setup_tracing, DispatchSystem};
use grocery_dispatch::model::{DeliveryAddress, LineItem, PartnerId, PaymentMethod};
use grocery_dispatch::surfaces::{AcceptOutcome, PartnerFeed, TrackingView};
use tracing::{info, warn, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env is the normal case
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env file: {e}");
        }
    }
    setup_tracing();

    let system = DispatchSystem::new(DispatchConfig::from_env_or_default());
    let broker = system.broker.clone();

    let mut feeds = Vec::new();
    for partner in ["p-asha", "p-ravi"] {
        let session = broker
            .register_partner(PartnerId::new(partner))
            .await
            .map_err(|e| e.to_string())?;
        feeds.push(PartnerFeed::new(session));
    }

    let address = DeliveryAddress {
        name: "Meera".into(),
        phone: "+91 98450 00000".into(),
        line1: "12 MG Road".into(),
        city: "Bengaluru".into(),
        state: "KA".into(),
        zip: "560001".into(),
        location: Some(GeoPoint::new(12.9716, 77.5946)),
        ..Default::default()
    };
    let items = vec![
        LineItem::new("sku-milk", "Toned milk 1L", 54.0, 2),
        LineItem::new("sku-atta", "Whole wheat atta 5kg", 245.0, 1),
        LineItem::new("sku-eggs", "Eggs (12)", 84.0, 1),
    ];
    let order = broker
        .create_order("cust-meera", items, address, PaymentMethod::Upi)
        .await
        .map_err(|e| e.to_string())?;
    info!(order_id = %order.id, number = %order.order_number, total = order.total, "Order placed");

    let mut tracking = TrackingView::open(&broker, order.id).await.map_err(|e| e.to_string())?;

    for feed in &mut feeds {
        if let Some(DispatchEvent::OrderOffered { offer }) = feed.next_event().await {
            info!(partner_id = %feed.partner_id(), earnings = offer.earnings.total, "Offer received");
        }
    }

    // Both partners tap "accept" at the same moment
    let (mut asha, mut ravi) = match (feeds.pop(), feeds.pop()) {
        (Some(ravi), Some(asha)) => (asha, ravi),
        _ => return Err("partner feeds missing".into()),
    };
    let (first, second) = tokio::join!(asha.accept(&broker, order.id), ravi.accept(&broker, order.id));
    let outcomes = [(asha.partner_id().clone(), first), (ravi.partner_id().clone(), second)];

    let mut winner = None;
    for (partner_id, outcome) in outcomes {
        match outcome.map_err(|e| e.to_string())? {
            AcceptOutcome::Won(_) => {
                info!(%partner_id, "Won the order");
                winner = Some(partner_id);
            }
            AcceptOutcome::NoLongerAvailable => info!(%partner_id, "Order no longer available"),
        }
    }
    let winner = winner.ok_or("no partner won the order")?;

    let delivery = async {
        for action in [PartnerAction::Prepared, PartnerAction::PickedUp] {
            broker.advance_status(order.id, winner.clone(), action).await?;
        }
        // About 5 km north of the drop-off
        let update = broker.report_location(order.id, winner.clone(), 13.0166, 77.5946).await?;
        info!(
            distance_km = ?update.distance_remaining_km,
            eta = ?update.estimated_arrival,
            "Partner en route"
        );
        broker.advance_status(order.id, winner.clone(), PartnerAction::Delivered).await
    }
    .instrument(tracing::info_span!("delivery", partner_id = %winner))
    .await
    .map_err(|e| e.to_string())?;

    if let Some(earnings) = delivery.earnings {
        info!(total = earnings.total, "Earnings credited");
    }

    tracking.drain();
    info!(status = %tracking.status(), version = tracking.version(), "Customer view");

    for feed in [asha, ravi] {
        if let Err(e) = feed.disconnect(&broker).await {
            warn!(error = %e, "Disconnect failed");
        }
    }
    tracking.close(&broker).await.map_err(|e| e.to_string())?;
    drop(broker);

    system.shutdown().await?;
    info!("Demo complete");
    Ok(())
}
