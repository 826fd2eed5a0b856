// UI-observable conversion progress

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Published fractional progress of the current conversion.
///
/// The engine drives updates through a [`ProgressToken`] on its own
/// cadence; the UI side reads the last published value whenever it
/// renders. Updates are plain atomic stores so the engine thread is never
/// blocked. The value is not reset when a run finishes; the next run's
/// first tick overwrites it. Cancellation bumps the epoch, so ticks from
/// a discarded engine are detected and dropped instead of corrupting the
/// next run's state.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    // f64 ratio stored as raw bits
    value: AtomicU64,
    epoch: AtomicU64,
}

/// One run's handle for publishing progress, bound to the reporter epoch
/// that was current at subscription time.
#[derive(Debug, Clone)]
pub struct ProgressToken {
    inner: Arc<Inner>,
    epoch: u64,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a token to the current epoch. Call once per conversion,
    /// after the engine is ready.
    pub fn subscribe(&self) -> ProgressToken {
        ProgressToken {
            inner: self.inner.clone(),
            epoch: self.inner.epoch.load(Ordering::Acquire),
        }
    }

    /// Last published ratio, as reported by the engine. May stray
    /// slightly outside `[0, 1]`; clamp for display via [`percent`].
    ///
    /// [`percent`]: ProgressReporter::percent
    pub fn value(&self) -> f64 {
        f64::from_bits(self.inner.value.load(Ordering::Acquire))
    }

    /// Display value: ratio clamped to `[0, 1]`, scaled to percent.
    pub fn percent(&self) -> f64 {
        self.value().clamp(0.0, 1.0) * 100.0
    }

    /// Invalidate outstanding tokens and reset the published value.
    /// Called on cancellation so a stale tick from the torn-down engine
    /// cannot overwrite the reset state.
    pub fn invalidate(&self) {
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        self.inner.value.store(0f64.to_bits(), Ordering::Release);
    }
}

impl ProgressToken {
    /// Publish a progress tick. Dropped silently when the token's epoch
    /// is no longer current.
    pub fn update(&self, ratio: f64) {
        if self.inner.epoch.load(Ordering::Acquire) != self.epoch {
            tracing::debug!(ratio, "dropping stale progress tick");
            return;
        }
        self.inner.value.store(ratio.to_bits(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_publishes_last_value() {
        let reporter = ProgressReporter::new();
        let token = reporter.subscribe();

        token.update(0.25);
        assert_eq!(reporter.value(), 0.25);
        token.update(0.8);
        assert_eq!(reporter.value(), 0.8);
    }

    #[test]
    fn test_percent_clamps_out_of_range_ratios() {
        let reporter = ProgressReporter::new();
        let token = reporter.subscribe();

        token.update(1.07);
        assert_eq!(reporter.percent(), 100.0);
        token.update(-0.01);
        assert_eq!(reporter.percent(), 0.0);
    }

    #[test]
    fn test_stale_token_cannot_touch_new_epoch() {
        let reporter = ProgressReporter::new();
        let stale = reporter.subscribe();
        stale.update(0.4);

        reporter.invalidate();
        assert_eq!(reporter.value(), 0.0);

        // A tick that raced past cancellation must be dropped.
        stale.update(0.9);
        assert_eq!(reporter.value(), 0.0);

        // The next run subscribes under the new epoch and proceeds.
        let fresh = reporter.subscribe();
        fresh.update(0.1);
        assert_eq!(reporter.value(), 0.1);

        // Still dropped even after a fresh token published.
        stale.update(0.99);
        assert_eq!(reporter.value(), 0.1);
    }

    #[test]
    fn test_value_survives_run_completion() {
        let reporter = ProgressReporter::new();
        let token = reporter.subscribe();
        token.update(1.0);
        drop(token);
        assert_eq!(reporter.percent(), 100.0);
    }
}
