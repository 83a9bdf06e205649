#![allow(dead_code)]
//! Core configuration for armature-animation-core.

use serde::{Deserialize, Serialize};

/// Configuration for pool sizing and per-tick limits.
/// Everything here is a capacity hint; exceeding a hint only costs an allocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Animation states pre-reserved in the controller arena.
    pub initial_states: usize,
    /// Timeline slots reserved per state group on first resolve.
    pub initial_timelines_per_state: usize,
    /// Upper bound on idle timeline evaluators kept for reuse.
    pub max_pooled_timelines: usize,
    /// Blend accumulators reserved in the armature table.
    pub initial_blend_states: usize,

    /// Maximum events to retain per tick; later events are dropped with a warning.
    pub max_events_per_tick: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_states: 8,
            initial_timelines_per_state: 16,
            max_pooled_timelines: 512,
            initial_blend_states: 64,
            max_events_per_tick: 1024,
        }
    }
}
