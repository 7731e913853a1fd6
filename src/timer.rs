//! Epoch-guarded cancellable one-shot timers for aggregate decay.
//!
//! Each aggregate owns at most one [`DecayTimer`]. Arming implicitly cancels
//! whatever was armed before, so there is never more than one live timer per
//! aggregate. The epoch makes timer races detectable: a firing that was
//! already in flight when the timer got canceled or re-armed carries a stale
//! epoch, and its retirement request is ignored.
//!
//! Timers are backed by `tokio::spawn` + `tokio::time::sleep` and must be
//! armed from within a tokio runtime. Dropping the timer aborts any pending
//! sleep.

use std::time::Duration;

use tokio::task::JoinHandle;

/// A cancellable one-shot decay timer.
#[derive(Debug, Default)]
pub struct DecayTimer {
    epoch: u64,
    handle: Option<JoinHandle<()>>,
}

impl DecayTimer {
    /// Creates an unarmed timer at epoch 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer: after `delay`, `fire` runs with the epoch it was
    /// armed at. Any previously armed timer is canceled first.
    ///
    /// Returns the new epoch so callers can correlate a later firing.
    pub fn arm<F>(&mut self, delay: Duration, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        let epoch = self.epoch;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire(epoch);
        }));
        epoch
    }

    /// Cancels any pending firing and bumps the epoch, so a firing that
    /// already escaped the abort is recognizably stale.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.epoch += 1;
    }

    /// The epoch a live firing would have to carry to be current.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns `true` while a firing is still pending.
    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DecayTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn armed_timer_fires_with_its_epoch() {
        let fired = Arc::new(AtomicU64::new(u64::MAX));
        let mut timer = DecayTimer::new();

        let fired_clone = fired.clone();
        let epoch = timer.arm(Duration::from_millis(100), move |e| {
            fired_clone.store(e, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), epoch);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let fired = Arc::new(AtomicU64::new(0));
        let mut timer = DecayTimer::new();

        let fired_clone = fired.clone();
        timer.arm(Duration::from_millis(100), move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_cancels_previous_and_advances_epoch() {
        let fired = Arc::new(AtomicU64::new(u64::MAX));
        let mut timer = DecayTimer::new();

        let first = fired.clone();
        let epoch_one = timer.arm(Duration::from_millis(100), move |e| {
            first.store(e, Ordering::SeqCst);
        });
        let second = fired.clone();
        let epoch_two = timer.arm(Duration::from_millis(100), move |e| {
            second.store(e, Ordering::SeqCst);
        });
        assert!(epoch_two > epoch_one);

        tokio::time::sleep(Duration::from_millis(500)).await;
        // Only the second firing ran.
        assert_eq!(fired.load(Ordering::SeqCst), epoch_two);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_fire_marks_epoch_stale() {
        let mut timer = DecayTimer::new();
        let epoch = timer.arm(Duration::from_millis(10), |_| {});
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The firing already happened; a later cancel still bumps the epoch
        // so the fired value no longer matches.
        timer.cancel();
        assert_ne!(timer.epoch(), epoch);
    }
}
