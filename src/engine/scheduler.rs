//! Rendering tick scheduling

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Source of rendering opportunities for the recording loop.
///
/// Each `tick` resolves at the next opportunity to sample a frame. The
/// coordinator stops calling it once the run reaches a terminal condition.
#[async_trait]
pub trait TickScheduler: Send {
    async fn tick(&mut self);
}

/// Creates one independent scheduler per run
pub trait TickSource: Send + Sync {
    fn ticker(&self) -> Box<dyn TickScheduler>;
}

/// Timer-driven scheduler; late ticks are skipped rather than bunched
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl TickScheduler for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Ticks at a display refresh rate
#[derive(Debug, Clone, Copy)]
pub struct DisplayRefresh {
    hz: u32,
}

impl DisplayRefresh {
    pub fn new(hz: u32) -> Self {
        Self { hz: hz.max(1) }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.hz as f64)
    }
}

impl TickSource for DisplayRefresh {
    fn ticker(&self) -> Box<dyn TickScheduler> {
        Box::new(IntervalTicker::new(self.period()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_period() {
        assert_eq!(DisplayRefresh::new(50).period(), Duration::from_millis(20));
        assert_eq!(DisplayRefresh::new(0).period(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticker_paces_ticks() {
        let mut ticker = DisplayRefresh::new(10).ticker();
        let started = tokio::time::Instant::now();
        for _ in 0..5 {
            ticker.tick().await;
        }
        // first tick is immediate
        assert_eq!(started.elapsed(), Duration::from_millis(400));
    }
}
