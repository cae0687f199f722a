//! Watch command: sync on start and then on every interval until interrupted.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{Instant, MissedTickBehavior};

use hs_core::{SyncNotices, SyncObserver, SyncScheduler, TickCallback, Ticker};

use super::sync::{LogObserver, build_engine};
use crate::Config;

/// How often pending notices are dispatched on the command's thread.
const DISPATCH_PERIOD: Duration = Duration::from_secs(1);

/// Ticker backed by a tokio interval.
///
/// The first tick fires one full period after [`IntervalTicker::run`] starts.
pub struct IntervalTicker {
    period: Duration,
    callbacks: Vec<TickCallback>,
}

impl IntervalTicker {
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            callbacks: Vec::new(),
        }
    }

    /// Fires callbacks on every period. Never returns.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            tracing::debug!(period_secs = self.period.as_secs(), "tick");
            for callback in &mut self.callbacks {
                callback();
            }
        }
    }
}

impl Ticker for IntervalTicker {
    fn on_tick(&mut self, callback: TickCallback) {
        self.callbacks.push(callback);
    }
}

pub fn run(config: &Config) -> Result<()> {
    anyhow::ensure!(
        config.sync_interval_secs > 0,
        "sync_interval_secs must be positive"
    );
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(watch(config))
}

async fn watch(config: &Config) -> Result<()> {
    let (scheduler, notices) = SyncScheduler::new(build_engine(config)?);
    let mut ticker = IntervalTicker::new(config.sync_interval());
    scheduler.attach(&mut ticker);

    tracing::info!(
        interval_secs = config.sync_interval_secs,
        database = %config.database_path.display(),
        "watching for activity"
    );
    scheduler.trigger_sync();

    let mut observer = LogObserver::default();
    tokio::select! {
        () = ticker.run() => {}
        () = pump(&notices, &mut observer) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    notices.dispatch(&mut observer);
    tracing::info!(passes = observer.passes, "watch stopped");
    Ok(())
}

/// Dispatches pending notices periodically. Never returns.
async fn pump<O: SyncObserver>(notices: &SyncNotices, observer: &mut O) {
    let mut interval = tokio::time::interval(DISPATCH_PERIOD);
    loop {
        interval.tick().await;
        notices.dispatch(observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn interval_ticker_fires_after_each_period() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut ticker = IntervalTicker::new(Duration::from_millis(20));
        let counter = Arc::clone(&count);
        ticker.on_tick(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let result = tokio::time::timeout(Duration::from_millis(110), ticker.run()).await;
        assert!(result.is_err());
        let fired = count.load(Ordering::SeqCst);
        assert!((2..=6).contains(&fired), "fired {fired} times");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = Config {
            sync_interval_secs: 0,
            ..Config::default()
        };
        let err = run(&config).unwrap_err();
        assert!(err.to_string().contains("must be positive"));
    }
}
