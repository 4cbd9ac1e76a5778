//! Fixed-timestep server loop.
//!
//! Each tick:
//!
//! 1. Drain the network with [`ViewSynchronizer::drain`].
//! 2. Advance the world by the fixed step.
//! 3. Flush the ops the tick produced.

use std::time::Duration;

use engine_net::NetworkAdapter;
use engine_view::{ViewCallbacks, ViewSynchronizer};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

pub struct TickLoop<A> {
    tick_id: u64,
    config: TickConfig,
    sync: ViewSynchronizer<A>,
}

impl<A: NetworkAdapter> TickLoop<A> {
    #[must_use]
    pub fn new(config: TickConfig, sync: ViewSynchronizer<A>) -> Self {
        Self {
            tick_id: 0,
            config,
            sync,
        }
    }

    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    pub fn sync(&self) -> &ViewSynchronizer<A> {
        &self.sync
    }

    /// Run one tick. Returns the number of network events handled.
    pub fn tick(&mut self, dt: f32, callbacks: &mut impl ViewCallbacks) -> usize {
        self.tick_id += 1;
        let events = self.sync.drain(&mut *callbacks);
        let sent = self.sync.tick(dt);
        debug!(tick_id = self.tick_id, events, sent, "tick");
        events
    }

    /// Tick at the configured rate until `max_ticks` is reached, or forever.
    pub async fn run(&mut self, callbacks: &mut impl ViewCallbacks) {
        let step = Duration::from_secs_f64(1.0 / self.config.tick_rate);
        let mut interval = tokio::time::interval(step);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        let mut tick_count = 0u64;
        loop {
            interval.tick().await;
            let start = Instant::now();
            self.tick(step.as_secs_f32(), &mut *callbacks);

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed > step {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = step.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}
