use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::lock;
use crate::types::constants::{
    DEFAULT_RECONNECT_FALLBACK, RECONNECT_INITIAL_DELAY, RECONNECT_JITTER, RECONNECT_MAX_DELAY,
    REJOIN_INTERVALS,
};

type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Delay schedule between retry attempts. Attempts are 1-based.
#[derive(Clone)]
pub enum Backoff {
    /// Fixed table of delays; the last entry repeats once the table runs out
    Intervals(Vec<Duration>),
    /// `initial * 2^(attempt - 1)` capped at `max`, shortened by up to `jitter` (0.0..=1.0) of itself
    Exponential {
        initial: Duration,
        max: Duration,
        jitter: f64,
    },
    /// Caller-provided schedule
    Custom(DelayFn),
}

impl Backoff {
    pub fn intervals_ms(intervals: &[u64]) -> Self {
        Self::Intervals(intervals.iter().copied().map(Duration::from_millis).collect())
    }

    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self::Exponential {
            initial,
            max,
            jitter: 0.0,
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn with_jitter(self, fraction: f64) -> Self {
        match self {
            Self::Exponential { initial, max, .. } => Self::Exponential {
                initial,
                max,
                jitter: fraction.clamp(0.0, 1.0),
            },
            other => other,
        }
    }

    /// Delay before the given attempt
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self {
            Self::Intervals(intervals) => intervals
                .get(attempt as usize - 1)
                .or(intervals.last())
                .copied()
                .unwrap_or(Duration::from_millis(DEFAULT_RECONNECT_FALLBACK)),
            Self::Exponential {
                initial,
                max,
                jitter,
            } => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                let base = initial.saturating_mul(factor).min(*max);
                if *jitter <= 0.0 {
                    return base;
                }
                base.mul_f64(1.0 - jitter * rand::random::<f64>())
            }
            Self::Custom(f) => f(attempt),
        }
    }

    /// Default schedule for re-establishing the socket
    pub fn default_reconnect() -> Self {
        Self::exponential(
            Duration::from_millis(RECONNECT_INITIAL_DELAY),
            Duration::from_millis(RECONNECT_MAX_DELAY),
        )
        .with_jitter(RECONNECT_JITTER)
    }

    /// Default schedule for rejoining an errored channel
    pub fn default_rejoin() -> Self {
        Self::intervals_ms(&REJOIN_INTERVALS)
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intervals(intervals) => f.debug_tuple("Intervals").field(intervals).finish(),
            Self::Exponential {
                initial,
                max,
                jitter,
            } => f
                .debug_struct("Exponential")
                .field("initial", initial)
                .field("max", max)
                .field("jitter", jitter)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

struct TimerSlot {
    tries: u32,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

/// Cancellable retry timer with backoff.
///
/// Each `schedule_timeout` replaces any pending run, so at most one callback is
/// ever outstanding. `reset` cancels it and starts the attempt count over.
pub struct Timer {
    backoff: Backoff,
    callback: Arc<dyn Fn() + Send + Sync>,
    slot: Arc<Mutex<TimerSlot>>,
}

impl Timer {
    pub fn new<F>(backoff: Backoff, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            backoff,
            callback: Arc::new(callback),
            slot: Arc::new(Mutex::new(TimerSlot {
                tries: 0,
                generation: 0,
                handle: None,
            })),
        }
    }

    /// Number of attempts scheduled since the last reset
    pub fn tries(&self) -> u32 {
        lock(&self.slot).tries
    }

    /// Whether a callback is waiting to run
    pub fn is_scheduled(&self) -> bool {
        lock(&self.slot).handle.is_some()
    }

    /// Reset the timer
    pub fn reset(&self) {
        let mut slot = lock(&self.slot);
        slot.tries = 0;
        slot.generation += 1;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
    }

    /// Schedule the callback after the next backoff delay
    pub fn schedule_timeout(&self) {
        let mut slot = lock(&self.slot);
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
        slot.tries += 1;
        slot.generation += 1;

        let delay = self.backoff.delay(slot.tries);
        let generation = slot.generation;
        let callback = Arc::clone(&self.callback);
        let shared = Arc::clone(&self.slot);

        tracing::debug!(
            attempt = slot.tries,
            delay_ms = delay.as_millis() as u64,
            "timer scheduled"
        );

        slot.handle = Some(tokio::spawn(async move {
            sleep(delay).await;
            {
                let mut slot = lock(&shared);
                if slot.generation != generation {
                    return;
                }
                slot.handle = None;
            }
            callback();
        }));
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.slot).handle.take() {
            handle.abort();
        }
    }
}

/// One-shot cancellable action, aborted when dropped.
pub struct Deadline {
    handle: JoinHandle<()>,
}

impl Deadline {
    pub fn after<F>(duration: Duration, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            sleep(duration).await;
            f();
        });
        Self { handle }
    }

    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_intervals_repeat_last_entry() {
        let backoff = Backoff::default_rejoin();
        assert_eq!(backoff.delay(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay(4), Duration::from_millis(10000));
        assert_eq!(backoff.delay(12), Duration::from_millis(10000));
    }

    #[test]
    fn test_empty_intervals_fall_back() {
        let backoff = Backoff::Intervals(Vec::new());
        assert_eq!(
            backoff.delay(1),
            Duration::from_millis(DEFAULT_RECONNECT_FALLBACK)
        );
    }

    #[test]
    fn test_exponential_is_bounded() {
        let backoff = Backoff::exponential(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
        assert_eq!(backoff.delay(5), Duration::from_secs(1));
        assert_eq!(backoff.delay(40), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let backoff = Backoff::exponential(Duration::from_millis(1000), Duration::from_secs(8))
            .with_jitter(0.5);
        for attempt in 1..=10 {
            let base = Duration::from_millis(1000)
                .saturating_mul(1 << (attempt - 1).min(3))
                .min(Duration::from_secs(8));
            let delay = backoff.delay(attempt);
            assert!(delay <= base, "attempt {attempt}: {delay:?} > {base:?}");
            assert!(delay >= base / 2, "attempt {attempt}: {delay:?} < half of {base:?}");
        }
    }

    #[test]
    fn test_custom_backoff() {
        let backoff = Backoff::custom(|attempt| Duration::from_millis(u64::from(attempt) * 7));
        assert_eq!(backoff.delay(3), Duration::from_millis(21));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_fires_after_backoff_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let timer = Timer::new(Backoff::intervals_ms(&[100, 200]), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        timer.schedule_timeout();
        assert_eq!(timer.tries(), 1);
        assert!(timer.is_scheduled());

        sleep(Duration::from_millis(99)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_replaces_pending_run() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let timer = Timer::new(Backoff::intervals_ms(&[100, 200]), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        timer.schedule_timeout();
        timer.schedule_timeout();
        assert_eq!(timer.tries(), 2);

        sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_and_clears_tries() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let timer = Timer::new(Backoff::intervals_ms(&[100]), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        timer.schedule_timeout();
        timer.reset();
        assert_eq!(timer.tries(), 0);

        sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancel() {
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        let _kept = Deadline::after(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&fired);
        Deadline::after(Duration::from_millis(10), move || {
            counter.fetch_add(10, Ordering::SeqCst);
        })
        .cancel();

        sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
