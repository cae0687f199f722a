//! Periodic wake-up capability.

use chrono::TimeDelta;

/// Callback invoked on every tick.
pub type TickCallback = Box<dyn FnMut() + Send + 'static>;

/// Something that fires registered callbacks periodically.
pub trait Ticker {
    /// Registers a callback to run on every tick.
    fn on_tick(&mut self, callback: TickCallback);
}

/// Ticker driven by a simulated clock.
pub struct ManualTicker {
    period: TimeDelta,
    elapsed: TimeDelta,
    callbacks: Vec<TickCallback>,
}

impl ManualTicker {
    pub const fn new(period: TimeDelta) -> Self {
        Self {
            period,
            elapsed: TimeDelta::zero(),
            callbacks: Vec::new(),
        }
    }

    /// Advances the simulated clock, firing once per elapsed period.
    ///
    /// Returns the number of ticks fired.
    pub fn advance(&mut self, by: TimeDelta) -> usize {
        if self.period <= TimeDelta::zero() {
            return 0;
        }
        self.elapsed += by;
        let mut fired = 0;
        while self.elapsed >= self.period {
            self.elapsed -= self.period;
            self.fire();
            fired += 1;
        }
        fired
    }

    /// Fires every callback once, regardless of the clock.
    pub fn fire(&mut self) {
        for callback in &mut self.callbacks {
            callback();
        }
    }
}

impl Ticker for ManualTicker {
    fn on_tick(&mut self, callback: TickCallback) {
        self.callbacks.push(callback);
    }
}
