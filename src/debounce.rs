//! Debounced edge detection
//!
//! Raw lines bounce: a wire pulled from its socket may read
//! connected/disconnected several times before settling. Every phase runs
//! its samples through an [`EdgeDetector`], which only reports a new value
//! once two consecutive samples agree on it. A value that reverts within
//! one sampling interval is never reported.
//!
//! [`DebouncedInput`] wraps a detector, a sampling closure and a tokio
//! interval into an endless, non-restartable sequence of stable changes.

use std::time::Duration;

use futures_util::Stream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::trace;

/// Default sampling interval for input phases.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Turns a stream of noisy samples into stable change events.
#[derive(Debug, Clone)]
pub struct EdgeDetector<T> {
    /// Last value reported (or the baseline).
    stable: Option<T>,
    /// Value seen on the previous sample that differs from `stable`.
    pending: Option<T>,
}

impl<T> Default for EdgeDetector<T> {
    fn default() -> Self {
        Self {
            stable: None,
            pending: None,
        }
    }
}

impl<T: Clone + PartialEq> EdgeDetector<T> {
    /// Creates a detector with no baseline: the first stable reading is
    /// itself reported as a change.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stable: None,
            pending: None,
        }
    }

    /// Creates a detector that treats `value` as already reported.
    #[must_use]
    pub const fn with_baseline(value: T) -> Self {
        Self {
            stable: Some(value),
            pending: None,
        }
    }

    /// Returns the last stable value, if any.
    #[must_use]
    pub const fn stable(&self) -> Option<&T> {
        self.stable.as_ref()
    }

    /// Feeds one sample, returning the new stable value when it changes.
    pub fn feed(&mut self, sample: T) -> Option<T> {
        if self.stable.as_ref() == Some(&sample) {
            // bounce back to the stable value
            self.pending = None;
            return None;
        }
        if self.pending.as_ref() == Some(&sample) {
            self.pending = None;
            self.stable = Some(sample.clone());
            return Some(sample);
        }
        self.pending = Some(sample);
        None
    }
}

/// A sampled input that yields only debounced changes.
///
/// The sampling closure returns `None` for a failed read, which counts as
/// "no change" and leaves the detector untouched.
pub struct DebouncedInput<T, F> {
    read: F,
    detector: EdgeDetector<T>,
    interval: Interval,
}

impl<T, F> std::fmt::Debug for DebouncedInput<T, F>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncedInput")
            .field("detector", &self.detector)
            .field("period", &self.interval.period())
            .finish_non_exhaustive()
    }
}

impl<T, F> DebouncedInput<T, F>
where
    T: Clone + PartialEq,
    F: FnMut() -> Option<T>,
{
    /// Creates an input sampled every `period`, starting one period from now.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(period: Duration, detector: EdgeDetector<T>, read: F) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            read,
            detector,
            interval,
        }
    }

    /// Waits for the next stable change.
    ///
    /// Cancel-safe: dropping the future between samples loses nothing.
    pub async fn next_change(&mut self) -> T {
        loop {
            self.interval.tick().await;
            let Some(sample) = (self.read)() else {
                trace!("sample failed, treating as no change");
                continue;
            };
            if let Some(change) = self.detector.feed(sample) {
                return change;
            }
        }
    }

    /// Converts the input into a [`Stream`] of stable changes.
    pub fn into_stream(self) -> impl Stream<Item = T>
    where
        T: Send,
        F: Send,
    {
        futures_util::stream::unfold(self, |mut input| async move {
            let change = input.next_change().await;
            Some((change, input))
        })
    }
}
