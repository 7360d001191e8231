//! Periodic update contract and tick source for Fieldlink.
//!
//! Every stateful entity implements [`Updateable`]; an external loop
//! invokes it once per entity per tick. The contract this crate
//! guarantees is per-entity serialization: for a given entity,
//! `on_update` calls never overlap. Different entities may be ticked
//! concurrently by different loops with no shared state between them.
//!
//! [`Ticker`] is the tick source, designed to sit in a server loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         info = ticker.wait_for_tick() => {
//!             for socket in registry.sockets() {
//!                 socket.on_update().await;
//!             }
//!         }
//!     }
//! }
//! ```

#![allow(async_fn_in_trait)]

use std::time::{Duration, SystemTime};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Updateable
// ---------------------------------------------------------------------------

/// A stateful entity that wants periodic updates.
///
/// `now` is wall-clock time, because the expirations driven through this
/// hook (timed stat effects) are stored as wall-clock instants.
/// Implementations own their error handling — a failed update must not
/// take the loop down.
pub trait Updateable: Send + Sync + 'static {
    /// Called once per tick. Never invoked concurrently for the same
    /// entity.
    async fn on_update(&self, now: SystemTime);
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tick source configuration.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Tick rate in Hz. 0 disables the ticker ([`Ticker::wait_for_tick`]
    /// pends forever), for event-driven deployments.
    pub rate_hz: u32,
    /// Random jitter (0–max µs) added before the first tick so loops
    /// created at the same instant don't fire in lockstep.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            rate_hz: 1,
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    /// Maximum supported tick rate.
    pub const MAX_RATE_HZ: u32 = 128;

    /// Config for a specific rate with default jitter.
    pub fn with_rate(rate_hz: u32) -> Self {
        Self {
            rate_hz,
            ..Default::default()
        }
    }

    fn validated(mut self) -> Self {
        if self.rate_hz > Self::MAX_RATE_HZ {
            warn!(
                rate = self.rate_hz,
                max = Self::MAX_RATE_HZ,
                "rate_hz exceeds maximum, clamping"
            );
            self.rate_hz = Self::MAX_RATE_HZ;
        }
        self
    }

    /// Duration of one tick, or `None` when disabled.
    pub fn tick_duration(&self) -> Option<Duration> {
        if self.rate_hz == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(1.0 / f64::from(self.rate_hz)))
        }
    }
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Information about a tick that just fired.
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// Fixed tick interval.
    pub dt: Duration,
    /// `true` if this tick fired noticeably late.
    pub overrun: bool,
}

/// Fixed-interval tick source.
///
/// Overruns are skipped, never caught up: after a late tick the next
/// deadline is rescheduled from now, so a stall produces one late tick
/// instead of a burst.
pub struct Ticker {
    tick_duration: Option<Duration>,
    tick_count: u64,
    next_tick: Option<TokioInstant>,
}

impl Ticker {
    /// Creates a ticker, scheduling the first tick with jitter.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();

        let next_tick = tick_duration.map(|d| {
            let jitter = if config.initial_jitter_us > 0 {
                let us = rand::rng().random_range(0..config.initial_jitter_us);
                Duration::from_micros(us)
            } else {
                Duration::ZERO
            };
            TokioInstant::now() + d + jitter
        });

        if tick_duration.is_none() {
            debug!("ticker created disabled (event-driven)");
        } else {
            debug!(rate_hz = config.rate_hz, "ticker created");
        }

        Self {
            tick_duration,
            tick_count: 0,
            next_tick,
        }
    }

    /// Creates a ticker for a specific rate with default settings.
    pub fn with_rate(rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(rate_hz))
    }

    /// Waits until the next tick is due.
    ///
    /// When disabled this pends forever; a surrounding `tokio::select!`
    /// still services its other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, dt) = match (self.next_tick, self.tick_duration) {
            (Some(next), Some(dt)) => (next, dt),
            _ => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(next).await;
        let now = TokioInstant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > dt / 10;
        if overrun {
            warn!(
                tick = self.tick_count,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun, skipping ahead"
            );
        }

        // Skip policy: schedule from now, never from the missed deadline.
        self.next_tick = Some(if overrun { now + dt } else { next + dt });

        trace!(tick = self.tick_count, "tick fired");
        TickInfo {
            tick: self.tick_count,
            dt,
            overrun,
        }
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// `true` when the ticker will never fire.
    pub fn is_disabled(&self) -> bool {
        self.tick_duration.is_none()
    }
}

// ---------------------------------------------------------------------------
// UpdateLoop
// ---------------------------------------------------------------------------

/// A set of entities updated together, serially, once per tick.
///
/// The sequential walk in [`run_once`](Self::run_once) is what provides
/// the per-entity serialization guarantee for entities registered here.
pub struct UpdateLoop<U: Updateable> {
    entities: std::sync::Mutex<Vec<std::sync::Arc<U>>>,
}

impl<U: Updateable> UpdateLoop<U> {
    /// Creates an empty loop.
    pub fn new() -> Self {
        Self {
            entities: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Adds an entity.
    pub fn add(&self, entity: std::sync::Arc<U>) {
        self.entities.lock().expect("update loop lock").push(entity);
    }

    /// Removes an entity by pointer identity.
    pub fn remove(&self, entity: &std::sync::Arc<U>) {
        self.entities
            .lock()
            .expect("update loop lock")
            .retain(|e| !std::sync::Arc::ptr_eq(e, entity));
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.lock().expect("update loop lock").len()
    }

    /// `true` when no entities are registered.
    pub fn is_empty(&self) -> bool {
        self.entities.lock().expect("update loop lock").is_empty()
    }

    /// Delivers one update round to every entity, in registration order.
    pub async fn run_once(&self, now: SystemTime) {
        let entities = self.entities.lock().expect("update loop lock").clone();
        for entity in entities {
            entity.on_update(now).await;
        }
    }
}

impl<U: Updateable> Default for UpdateLoop<U> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_config_zero_rate_has_no_duration() {
        assert!(TickConfig::with_rate(0).tick_duration().is_none());
    }

    #[test]
    fn test_tick_config_clamps_excess_rate() {
        let config = TickConfig::with_rate(10_000).validated();
        assert_eq!(config.rate_hz, TickConfig::MAX_RATE_HZ);
    }

    #[test]
    fn test_ticker_disabled_for_zero_rate() {
        let ticker = Ticker::with_rate(0);
        assert!(ticker.is_disabled());
    }
}
