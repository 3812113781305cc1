//! Hearsay rumor engine binary.
//!
//! Wires the rumor service, its collaborators and the HTTP API together
//! and runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`HEARSAY_CONFIG`, default `hearsay-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Load the rumor snapshot, if configured
//! 4. Connect the NATS notifier, if configured
//! 5. Build the content mutation backend and the rumor service
//! 6. Build the knowledge engine over world tables fed through the API
//! 7. Spawn the decay sweep and knowledge cache cleanup
//! 8. Serve the API until shutdown, then stop tasks and save the snapshot

mod error;
mod notifier;

use std::sync::Arc;

use hearsay_api::{AppState, WorldFeed};
use hearsay_core::{
    HearsayConfig, LoggingConfig, RumorService, spawn_cache_cleanup_task, spawn_decay_task,
};
use hearsay_mutator::MutationBackend;
use hearsay_rumor::{
    InMemoryPositions, InMemoryWorldEvents, KnowledgeAccuracyEngine, NoopNotifier,
    PropagationEngine, RumorNotifier,
};
use hearsay_store::RumorStore;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::notifier::NatsNotifier;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, snapshot loading, the mutation
/// backend or the API server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so failures surface
    //    through main's error return.
    let config_path = HearsayConfig::path_from_env();
    let config = HearsayConfig::load_or_default(&config_path).map_err(EngineError::from)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        config_path = %config_path.display(),
        port = config.server.port,
        mutator = ?config.mutator.backend,
        "hearsay-engine starting"
    );

    run(config).await?;
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn run(config: HearsayConfig) -> Result<(), EngineError> {
    let snapshot_path = config.storage.snapshot_path.clone();

    // 3. Rumor store.
    let store = match &snapshot_path {
        Some(path) => {
            let store = RumorStore::load_snapshot(path).await?;
            info!(
                path = %path.display(),
                rumors = store.len().await,
                "rumor snapshot loaded"
            );
            Arc::new(store)
        }
        None => {
            info!("no snapshot path configured, rumors are kept in memory only");
            Arc::new(RumorStore::new())
        }
    };

    // 4. Notifications. A missing NATS server degrades to no delivery.
    let notifier: Arc<dyn RumorNotifier> = match &config.notifications.nats_url {
        Some(url) => {
            match NatsNotifier::connect(url, &config.notifications.subject_prefix).await {
                Ok(nats) => Arc::new(nats),
                Err(e) => {
                    warn!(error = %e, "rumor notifications disabled");
                    Arc::new(NoopNotifier)
                }
            }
        }
        None => {
            info!("no NATS URL configured, rumor notifications disabled");
            Arc::new(NoopNotifier)
        }
    };

    // 5. Mutation backend and rumor service.
    let mutator = MutationBackend::from_config(&config.mutator)?;
    info!(backend = mutator.name(), "content mutation backend ready");
    let propagation = PropagationEngine::new(
        Arc::clone(&store),
        mutator,
        config.propagation.clone(),
    );
    let service = Arc::new(RumorService::new(Arc::clone(&store), propagation, notifier));

    // 6. Knowledge engine. The host simulation feeds positions and world
    //    events through the `/knowledge/positions` and `/knowledge/events`
    //    routes.
    let world = WorldFeed {
        positions: Arc::new(InMemoryPositions::new()),
        events: Arc::new(InMemoryWorldEvents::new()),
    };
    let knowledge = Arc::new(
        KnowledgeAccuracyEngine::new(Arc::<InMemoryPositions>::clone(&world.positions), &config.knowledge)
            .with_event_source(Arc::<InMemoryWorldEvents>::clone(&world.events)),
    );

    // 7. Background tasks.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let decay_task = spawn_decay_task(
        Arc::clone(&service),
        config.decay.clone(),
        snapshot_path.clone(),
        shutdown_rx.clone(),
    );
    let cleanup_task = spawn_cache_cleanup_task(
        Arc::clone(&knowledge),
        config.knowledge.cleanup_interval_secs,
        shutdown_rx,
    );

    // 8. Serve until Ctrl-C.
    let state = Arc::new(
        AppState::new(Arc::clone(&service))
            .with_knowledge(knowledge)
            .with_world_feed(world),
    );
    let served = hearsay_api::start_server(&config.server, state, shutdown_signal()).await;

    if shutdown_tx.send(true).is_err() {
        warn!("background tasks already stopped");
    }
    for (name, task) in [("decay", decay_task), ("cache cleanup", cleanup_task)] {
        if let Err(e) = task.await {
            error!(task = name, error = %e, "background task failed");
        }
    }

    if let Some(path) = &snapshot_path {
        let saved = store.save_snapshot(path).await?;
        info!(path = %path.display(), rumors = saved, "rumor snapshot saved");
    }

    served?;
    info!("hearsay-engine shutdown complete");
    Ok(())
}

/// Resolves on `Ctrl-C`.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            error!(error = %e, "failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
