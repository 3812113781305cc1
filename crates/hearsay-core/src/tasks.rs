//! Background tasks: the periodic decay sweep and knowledge cache cleanup.
//!
//! Both run on their own Tokio task and stop when the shutdown signal
//! flips to `true` (or its sender is dropped).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hearsay_rumor::{ContentMutationService, DecayConfig, KnowledgeAccuracyEngine};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::service::RumorService;

/// Spawn the periodic decay sweep.
///
/// Sweeps every `config.sweep_interval_secs` (the first sweep happens one
/// interval after start). When `snapshot_path` is set, the store is saved
/// after each sweep.
pub fn spawn_decay_task<M>(
    service: Arc<RumorService<M>>,
    config: DecayConfig,
    snapshot_path: Option<PathBuf>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    M: ContentMutationService + 'static,
{
    let period = Duration::from_secs(config.sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        info!(
            interval_secs = period.as_secs(),
            days_since_active = config.days_since_active,
            "decay task started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    service.decay_rumors(config.days_since_active).await;
                    if let Some(path) = &snapshot_path
                        && let Err(e) = service.store().save_snapshot(path).await
                    {
                        error!(error = %e, path = %path.display(), "failed to save rumor snapshot");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("decay task stopped");
    })
}

/// Spawn the periodic purge of expired knowledge cache entries.
pub fn spawn_cache_cleanup_task(
    engine: Arc<KnowledgeAccuracyEngine>,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = Duration::from_secs(interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    engine.purge_expired().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("knowledge cache cleanup task stopped");
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use hearsay_rumor::{
        InMemoryPositions, KnowledgeConfig, LocalGarbler, NoopNotifier, PropagationConfig,
        PropagationEngine,
    };
    use hearsay_store::RumorStore;
    use hearsay_types::{EntityId, Position, RumorCategory, Severity, WorldEvent, WorldEventId, WorldEventKind};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::service::NewRumor;

    #[tokio::test(start_paused = true)]
    async fn decay_task_stops_on_shutdown() {
        let store = Arc::new(RumorStore::new());
        let engine = PropagationEngine::with_rng(
            Arc::clone(&store),
            LocalGarbler,
            PropagationConfig::default(),
            SmallRng::seed_from_u64(1),
        );
        let service = Arc::new(RumorService::new(store, engine, Arc::new(NoopNotifier)));
        service
            .create_rumor(NewRumor {
                originator_id: EntityId::new(),
                content: String::from("Fresh news"),
                categories: BTreeSet::from([RumorCategory::Gossip]),
                severity: Severity::Minor,
                truth_value: 1.0,
            })
            .await
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = spawn_decay_task(
            Arc::clone(&service),
            DecayConfig {
                sweep_interval_secs: 1,
                days_since_active: 7,
            },
            None,
            rx,
        );
        tokio::time::advance(Duration::from_secs(3)).await;
        tx.send(true).unwrap();
        assert!(handle.await.is_ok());
        // A fresh rumor is untouched by the sweeps that ran.
        assert_eq!(service.statistics().await.total_rumors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_task_purges_expired_entries() {
        let positions = Arc::new(InMemoryPositions::new());
        let observer = EntityId::new();
        positions.set(observer, Position::new(0.0, 0.0));
        let config = KnowledgeConfig {
            cache_ttl_ms: 500,
            ..KnowledgeConfig::default()
        };
        let engine = Arc::new(KnowledgeAccuracyEngine::with_rng(
            positions,
            &config,
            SmallRng::seed_from_u64(1),
        ));
        let event = WorldEvent {
            id: WorldEventId::new(),
            location: Position::new(1.0, 1.0),
            involved_entities: Vec::new(),
            kind: WorldEventKind::Other {
                label: String::from("omen"),
            },
            description: String::from("A comet"),
        };
        engine.get_knowledge(observer, &event).await.unwrap();
        assert_eq!(engine.cached_len().await, 1);

        let (tx, rx) = watch::channel(false);
        let handle = spawn_cache_cleanup_task(Arc::clone(&engine), 1, rx);
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(engine.cached_len().await, 0);

        drop(tx);
        assert!(handle.await.is_ok());
    }
}
