use crate::preload::manifest::Manifest;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_FRAMERATE: u32 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Frames per second for the tick loop.
    pub framerate: u32,
    /// Give up on preloading after this many frames.
    pub max_ticks: Option<u64>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            framerate: DEFAULT_FRAMERATE,
            max_ticks: None,
        }
    }
}

impl HostConfig {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let defaults = Self::default();
        Self {
            framerate: manifest.framerate.unwrap_or(defaults.framerate),
            max_ticks: manifest.max_ticks.or(defaults.max_ticks),
        }
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.framerate.max(1)))
    }
}
