//! Cooperative scheduler adapter
//!
//! The presentation loop never blocks between iterations; it hands control
//! back through a [`Scheduler`] so other tasks sharing the executor keep
//! running. With the `embassy` feature, [`EmbassyScheduler`] maps this onto
//! `embassy-futures` and `embassy-time`.

/// Cooperative scheduling hooks
///
/// `yield_once` must return after giving every other ready task a chance to
/// run. `sleep_ms` defaults to a single yield for schedulers without a timer.
#[allow(async_fn_in_trait)]
pub trait Scheduler {
    /// Give up the processor for one scheduling round
    async fn yield_once(&mut self);

    /// Wait at least `ms` milliseconds before resuming
    async fn sleep_ms(&mut self, ms: u32) {
        let _ = ms;
        self.yield_once().await;
    }
}

/// Scheduler backed by the Embassy executor and time driver
#[cfg(feature = "embassy")]
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbassyScheduler;

#[cfg(feature = "embassy")]
impl Scheduler for EmbassyScheduler {
    async fn yield_once(&mut self) {
        embassy_futures::yield_now().await;
    }

    async fn sleep_ms(&mut self, ms: u32) {
        embassy_time::Timer::after_millis(ms as u64).await;
    }
}
