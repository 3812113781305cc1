//! Service facade, configuration, and background sweeps for the Hearsay
//! rumor engine.
//!
//! # Modules
//!
//! - [`config`] -- `hearsay-config.yaml` loading ([`HearsayConfig`]).
//! - [`query`] -- Listing filters ([`RumorQuery`], [`EntityRumorFilter`]).
//! - [`service`] -- The [`RumorService`] facade.
//! - [`tasks`] -- Periodic decay sweep and knowledge cache cleanup.

pub mod config;
pub mod query;
pub mod service;
pub mod tasks;

pub use config::{
    ConfigError, HearsayConfig, LoggingConfig, MutatorBackendKind, MutatorConfig,
    NotificationConfig, ServerConfig, StorageConfig,
};
pub use query::{DEFAULT_LIST_LIMIT, EntityRumorFilter, RumorQuery};
pub use service::{EVENT_CHANNEL_CAPACITY, NewRumor, RumorService, RumorUpdate, impact_of};
pub use tasks::{spawn_cache_cleanup_task, spawn_decay_task};
