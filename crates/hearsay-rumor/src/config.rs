//! Tunables for propagation, decay and the knowledge model.
//!
//! These structs are the `propagation`, `decay` and `knowledge` sections of
//! `hearsay-config.yaml`. Every field has a default so a partial (or empty)
//! section deserializes cleanly.

use serde::Deserialize;

/// Propagation settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PropagationConfig {
    /// Deadline for one call to the content mutation service (default: 3000).
    #[serde(default = "default_mutation_timeout_ms")]
    pub mutation_timeout_ms: u64,

    /// Extra attempts after a failed mutation call before falling back
    /// to local garbling (default: 1).
    #[serde(default = "default_mutation_retries")]
    pub mutation_retries: u32,

    /// Seed for the mutation draw. `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Mutation chance used when a spread request omits one (default: 0.1).
    #[serde(default = "default_mutation_chance")]
    pub default_mutation_chance: f64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            mutation_timeout_ms: default_mutation_timeout_ms(),
            mutation_retries: default_mutation_retries(),
            seed: None,
            default_mutation_chance: default_mutation_chance(),
        }
    }
}

/// Decay sweep settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DecayConfig {
    /// Seconds between background sweeps (default: 3600).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Idle days before a rumor decays one step (default: 7).
    #[serde(default = "default_days_since_active")]
    pub days_since_active: u32,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            days_since_active: default_days_since_active(),
        }
    }
}

/// Spatial knowledge model settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KnowledgeConfig {
    /// Distance at which accuracy falls to `1/e` (default: 50.0).
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,

    /// How long a computed result stays cached, in ms (default: 5000).
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Upper bound on cached results (default: 10000).
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Seconds between expired-entry purges (default: 60).
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Seed for the per-detail reveal draws. `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            max_distance: default_max_distance(),
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_max_entries: default_cache_max_entries(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            seed: None,
        }
    }
}

const fn default_mutation_timeout_ms() -> u64 {
    3000
}

const fn default_mutation_retries() -> u32 {
    1
}

const fn default_mutation_chance() -> f64 {
    0.1
}

const fn default_sweep_interval_secs() -> u64 {
    3600
}

const fn default_days_since_active() -> u32 {
    7
}

const fn default_max_distance() -> f64 {
    50.0
}

const fn default_cache_ttl_ms() -> u64 {
    5000
}

const fn default_cache_max_entries() -> usize {
    10_000
}

const fn default_cleanup_interval_secs() -> u64 {
    60
}
