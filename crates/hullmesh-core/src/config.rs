//! Render Settings
//!
//! LOD and resolution configuration consumed by the LOD workers and the
//! quick preview pass. Settings are owned by the scene and handed to each
//! worker when it is spawned.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Smallest number of LOD levels a worker generates
pub const MIN_LOD_COUNT: usize = 1;

/// Largest number of LOD levels a worker generates
pub const MAX_LOD_COUNT: usize = 20;

/// Mesh pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Requested number of LOD levels (clamped to 1..=20 on use)
    pub lod_count: i32,
    /// Skip background LOD generation entirely
    pub disable_lods: bool,
    /// Target triangle size of the finest LOD
    pub lod_quality: f32,
    /// Lower bound on the triangle size the generator may use
    pub min_resolution: f32,
    /// Target triangle size of the synchronous preview mesh
    pub preview_resolution: f32,
    /// Quiet period after the last edit before a snapshot is taken
    pub debounce_ms: u64,
    /// Worker sleep between polls of the pending slot
    pub poll_interval_ms: u64,
    /// Delay before a freshly spawned worker starts polling
    pub startup_delay_ms: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            lod_count: 6,
            disable_lods: false,
            lod_quality: 32.0,
            min_resolution: 0.01,
            preview_resolution: 32.0,
            debounce_ms: 500,
            poll_interval_ms: 50,
            startup_delay_ms: 0,
        }
    }
}

impl RenderSettings {
    /// Parse settings from a JSON document; missing fields keep their defaults
    pub fn from_json(text: &str) -> CoreResult<Self> {
        let settings: Self = serde_json::from_str(text)
            .map_err(|e| CoreError::InvalidSettings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject resolutions the generator cannot work with
    pub fn validate(&self) -> CoreResult<()> {
        let checks = [
            ("lod_quality", self.lod_quality),
            ("min_resolution", self.min_resolution),
            ("preview_resolution", self.preview_resolution),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(CoreError::InvalidSettings(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Number of LOD levels, clamped to the supported range
    pub fn lod_count(&self) -> usize {
        (self.lod_count.max(0) as usize).clamp(MIN_LOD_COUNT, MAX_LOD_COUNT)
    }

    /// Target resolution for a level counted from the finest one.
    ///
    /// Level 0 from the finest uses `lod_quality`; every coarser level adds
    /// another `lod_quality` to the target triangle size.
    pub fn lod_resolution(&self, level_from_finest: usize) -> f32 {
        self.lod_quality * (1 + level_from_finest) as f32
    }

    /// Debounce delay as a duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Worker poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Worker start-up delay as a duration
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}
