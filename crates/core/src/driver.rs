//! Periodic tick that keeps the drill going while auto-advance is on.
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::model::{Range, SpeechRate};

/// Everything the periodic driver depends on. A change to any field restarts
/// the period so no tick runs against configuration it was not started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveConfig {
    pub auto_advance: bool,
    pub speech_rate: SpeechRate,
    pub range: Range,
}

pub struct PeriodicDriver {
    period: Duration,
    interval: Interval,
    current: Option<DriveConfig>,
}

impl PeriodicDriver {
    /// Creates a stopped driver. Call `sync` to start it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            period,
            interval,
            current: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some_and(|config| config.auto_advance)
    }

    /// Applies the latest configuration, restarting the period when it changed.
    /// Returns whether a restart happened.
    pub fn sync(&mut self, config: DriveConfig) -> bool {
        if self.current == Some(config) {
            return false;
        }
        self.interval.reset();
        self.current = Some(config);
        tracing::debug!(
            auto_advance = config.auto_advance,
            rate = %config.speech_rate,
            range = %config.range,
            "Periodic driver restarted"
        );
        true
    }

    /// Completes on the next tick. Never completes while auto-advance is off.
    pub async fn tick(&mut self) {
        if !self.is_running() {
            std::future::pending::<()>().await;
        }
        self.interval.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(5000);

    fn config(auto_advance: bool, max: i64) -> DriveConfig {
        DriveConfig {
            auto_advance,
            speech_rate: SpeechRate::NORMAL,
            range: Range::new(0, max).unwrap(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period_while_running() {
        let mut driver = PeriodicDriver::new(PERIOD);
        assert!(driver.sync(config(true, 100)));
        let started = Instant::now();

        driver.tick().await;
        assert_eq!(started.elapsed(), PERIOD);
        driver.tick().await;
        assert_eq!(started.elapsed(), PERIOD * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_driver_never_ticks() {
        let mut driver = PeriodicDriver::new(PERIOD);
        assert!(!driver.is_running());
        let waited = time::timeout(PERIOD * 4, driver.tick()).await;
        assert!(waited.is_err());

        driver.sync(config(false, 100));
        let waited = time::timeout(PERIOD * 4, driver.tick()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn configuration_change_restarts_the_period() {
        let mut driver = PeriodicDriver::new(PERIOD);
        driver.sync(config(true, 100));

        time::advance(Duration::from_millis(3000)).await;
        // Same configuration keeps the running period.
        assert!(!driver.sync(config(true, 100)));
        // A new range restarts it from now.
        assert!(driver.sync(config(true, 50)));

        let restarted = Instant::now();
        driver.tick().await;
        assert_eq!(restarted.elapsed(), PERIOD);
    }
}
