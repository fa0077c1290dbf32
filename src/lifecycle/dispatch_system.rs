use crate::config::DispatchConfig;
use crate::dispatch::{DispatchBroker, DispatchHub, OpenDirectory, PartnerDirectory};
use crate::order_store::CommitHooks;
use crate::tracking::{LocationTracker, SampleStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Starts and stops the dispatch core.
///
/// `DispatchSystem` owns the three actors and wires them together:
/// - **Order store**: the orders, with the hub and sample store injected as its commit hooks
/// - **Dispatch hub**: sessions, subscriptions and event fan-out
/// - **Sample store**: the latest partner position per order, published to the hub
///
/// # Example
///
/// ```ignore
/// let system = DispatchSystem::new(DispatchConfig::from_env_or_default());
/// let session = system.broker.register_partner(PartnerId::new("p-1")).await?;
/// // ...
/// system.shutdown().await?;
/// ```
pub struct DispatchSystem {
    pub broker: DispatchBroker,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl DispatchSystem {
    /// Starts the core with every partner id treated as known.
    pub fn new(config: DispatchConfig) -> Self {
        Self::with_directory(config, Arc::new(OpenDirectory))
    }

    pub fn with_directory(config: DispatchConfig, directory: Arc<dyn PartnerDirectory>) -> Self {
        // 1. Create actors
        let (hub, hub_client) = DispatchHub::new(config.hub_buffer, config.session_buffer, config.earnings);
        let (order_store, orders) = crate::order_store::new(config.store_buffer);
        let (sample_store, samples) = SampleStore::new(config.hub_buffer);

        // 2. Start them, injecting the hub and the sample store into the order store's hooks
        let hooks = CommitHooks {
            hub: hub_client.clone(),
            samples: samples.clone(),
        };
        let store_handle = tokio::spawn(order_store.run(hooks));
        let sample_handle = tokio::spawn(sample_store.run(hub_client.clone()));
        let hub_handle = tokio::spawn(hub.run());

        let tracker = LocationTracker::new(orders.clone(), samples, config.average_speed_kmh);
        let broker = DispatchBroker::new(orders, hub_client, tracker, directory, &config);
        info!(?config, "Dispatch system started");

        Self {
            broker,
            handles: vec![
                ("order store", store_handle),
                ("sample store", sample_handle),
                ("dispatch hub", hub_handle),
            ],
        }
    }

    /// Drops the system's broker and waits for every actor to finish.
    ///
    /// Actors stop once the last client handle is gone, so clones of the broker held elsewhere
    /// must be dropped first or this waits for them. The order store holds the other two
    /// clients and the sample store holds the hub's, so they stop in that order.
    ///
    /// Every task is awaited even if one has failed; the first failure is returned.
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down dispatch system...");
        drop(self.broker);

        let mut first_failure = None;
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                error!(actor = name, "Actor task failed: {:?}", e);
                first_failure.get_or_insert_with(|| format!("{name} task failed: {e:?}"));
            }
        }

        match first_failure {
            Some(failure) => Err(failure),
            None => {
                info!("Dispatch system shutdown complete.");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_awaits_every_task_after_a_failure() {
        let mut system = DispatchSystem::new(DispatchConfig::default());
        let finished = Arc::new(AtomicBool::new(false));

        system.handles.insert(0, ("failing", tokio::spawn(async { panic!("boom"); })));
        let flag = finished.clone();
        system.handles.push((
            "slow",
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                flag.store(true, Ordering::SeqCst);
            }),
        ));

        let failure = system.shutdown().await.unwrap_err();
        assert!(failure.starts_with("failing task failed"), "{failure}");
        assert!(finished.load(Ordering::SeqCst));
    }
}
