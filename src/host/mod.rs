pub mod config;

use crate::host::config::HostConfig;
use crate::preload::{Fetcher, Preloader};
use crate::runtime::{DriveStats, TaskBody, TaskHandle, TaskScheduler};
use anyhow::{Result, anyhow};
use serde_json::Value;
use std::rc::Rc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

/// What one frame did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame {
    Loading { progress: f64 },
    Running(DriveStats),
}

/// Frame loop owner: preloads first, then drives game routines.
pub struct Host {
    config: HostConfig,
    preloader: Preloader,
    routines: TaskScheduler<Value>,
    frames: u64,
}

impl Host {
    pub fn new(config: HostConfig, fetcher: Rc<dyn Fetcher>) -> Self {
        Self {
            config,
            preloader: Preloader::new(fetcher),
            routines: TaskScheduler::new(),
            frames: 0,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn preloader(&self) -> &Preloader {
        &self.preloader
    }

    pub fn preloader_mut(&mut self) -> &mut Preloader {
        &mut self.preloader
    }

    pub fn run_coroutine(&self, body: impl TaskBody<Value> + 'static) -> TaskHandle<Value> {
        self.routines.submit(body)
    }

    pub fn clear_coroutines(&mut self) {
        self.routines.clear();
    }

    /// Live game routines.
    pub fn coroutines(&self) -> usize {
        self.routines.len()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// One frame. Routines wait until preloading is over.
    pub fn update(&mut self) -> Frame {
        self.frames += 1;
        if self.preloader.loading() {
            self.preloader.update();
            let progress = self.preloader.progress();
            debug!(frame = self.frames, progress, "preloading");
            Frame::Loading { progress }
        } else {
            Frame::Running(self.routines.drive())
        }
    }

    /// Tick at the configured framerate until the preloader settles.
    pub async fn run_until_loaded(&mut self) -> Result<u64> {
        let mut ticker = interval(self.config.frame_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let start = self.frames;

        while self.preloader.loading() {
            if let Some(max) = self.config.max_ticks {
                if self.frames - start >= max {
                    return Err(anyhow!(
                        "Preload did not settle after {} frames ({}/{} loaded)",
                        max,
                        self.preloader.loaded(),
                        self.preloader.started()
                    ));
                }
            }
            ticker.tick().await;
            self.update();
        }

        let used = self.frames - start;
        info!(frames = used, "preload settled");
        Ok(used)
    }

    /// Run a fixed number of frames at the configured framerate.
    pub async fn run_for(&mut self, frames: u64) {
        let mut ticker = interval(self.config.frame_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        for _ in 0..frames {
            ticker.tick().await;
            self.update();
        }
    }
}
