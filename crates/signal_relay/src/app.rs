//! The relay process: owns the network and the background tasks driving it.

use crate::config::AppConfig;
use crate::world::LoggingWorld;
use anyhow::Context;
use signal_network::{spawn_sweeper, JsonNodeStore, SignalNetwork};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Main application struct.
pub struct Application {
    config: AppConfig,
    network: Arc<SignalNetwork>,
    world: Arc<LoggingWorld>,
    store: Option<JsonNodeStore>,
}

impl Application {
    /// Builds the network from a validated configuration and restores the
    /// saved sensors when persistence is on.
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;

        let world = Arc::new(LoggingWorld::new(config.relay.worlds.clone()));
        let network = Arc::new(SignalNetwork::new(
            config.network.clone(),
            world.clone(),
            world.clone(),
        )?);

        let store = config
            .storage
            .persist_network
            .then(|| JsonNodeStore::new(config.storage.data_file.clone()));
        if let Some(store) = &store {
            network
                .restore(store)
                .await
                .with_context(|| format!("Failed to load {}", store.path().display()))?;
        }

        Ok(Self {
            config,
            network,
            world,
            store,
        })
    }

    pub fn network(&self) -> &Arc<SignalNetwork> {
        &self.network
    }

    /// Runs until a termination signal arrives.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(async {
            match crate::signals::wait_for_shutdown_signal().await {
                Ok(signal) => info!(signal, "Termination signal received"),
                Err(e) => error!("Failed to listen for shutdown signals: {}", e),
            }
        })
        .await
    }

    /// Runs the tick driver and the sweeper until `shutdown` completes, then
    /// saves the sensors and releases every hot region.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        let tick_interval = self.config.relay.tick_interval();
        info!(
            tick_interval_ms = self.config.relay.tick_interval_ms,
            sweep_interval_secs = self.config.network.sweep_interval_secs,
            capacity = self.config.network.max_hot_regions,
            stats = %self.network.stats(),
            "Signal relay running"
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let ticker = spawn_tick_driver(self.network.clone(), tick_interval, stop_rx.clone());
        let sweeper = spawn_sweeper(
            self.network.regions().clone(),
            self.config.network.sweep_interval(),
            stop_rx,
        );

        shutdown.await;
        info!("Shutdown requested, stopping background tasks");

        let _ = stop_tx.send(true);
        for (name, handle) in [("tick driver", ticker), ("sweeper", sweeper)] {
            if let Err(e) = handle.await {
                warn!("{} task ended abnormally: {}", name, e);
            }
        }

        self.shutdown().await
    }

    /// Saves the sensors, then tears the network down. Teardown runs even
    /// when the save fails; the save error is returned afterwards.
    async fn shutdown(self) -> anyhow::Result<()> {
        let saved = match &self.store {
            Some(store) => self
                .network
                .persist(store)
                .await
                .map(Some)
                .with_context(|| format!("Failed to save {}", store.path().display())),
            None => Ok(None),
        };

        let released = self.network.shutdown();
        info!(
            saved = ?saved.as_ref().ok(),
            released,
            loaded_regions = self.world.loaded_regions(),
            "Signal relay stopped"
        );
        saved.map(|_| ())
    }
}

/// Spawns the task that advances the world tick every `period`.
fn spawn_tick_driver(
    network: Arc<SignalNetwork>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    network.advance_tick();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(tick = network.current_tick(), "Tick driver stopped");
    })
}
