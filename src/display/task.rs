//! Presentation loop
//!
//! Cooperative task that keeps a streaming bridge fed: poll, yield, repeat.
//! Frame cadence is whatever the scheduler gives it. On link loss the
//! configured [`LinkLossPolicy`] decides between restarting the bridge after
//! a backoff and terminating.
//!
//! The loop logic lives in the synchronous [`PresentationLoop::step`]; the
//! async runners only add the yield points, so tests can drive either.

use crate::core::scheduler::Scheduler;
use crate::devices::anx7625::bus::BridgeBus;
use crate::devices::anx7625::controller::BridgeState;
use crate::devices::anx7625::error::{BridgeError, FailureReason};
use crate::devices::anx7625::status::LinkStatus;
use crate::display::handle::BridgeHandle;
use core::cell::RefCell;

/// What to do when the bridge drops out of `Streaming`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkLossPolicy {
    /// Exit the loop
    Terminate,
    /// Wait `backoff_ms`, then `begin()` again, giving up after
    /// `max_attempts` restarts in a row that do not reach `Streaming`
    Restart { backoff_ms: u32, max_attempts: u32 },
}

/// Presentation loop configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoopConfig {
    pub policy: LinkLossPolicy,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            policy: LinkLossPolicy::Restart {
                backoff_ms: 1000,
                max_attempts: 3,
            },
        }
    }
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExitReason {
    /// `end()` was called
    Stopped,
    /// The bridge failed and the policy is `Terminate`
    Failed(FailureReason),
    /// Every restart attempt failed
    RestartsExhausted(FailureReason),
    /// The loop was started on a bridge that never began
    NotStarted(BridgeState),
}

/// Result of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepOutcome {
    /// Yield once, then step again
    Continue,
    /// Sleep for the given milliseconds, then step again
    Backoff(u32),
    Exit(ExitReason),
}

/// Loop notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopEvent {
    Polled(LinkStatus),
    PollFailed(BridgeError),
    /// Hot-plug detect dropped
    LinkLost,
    /// The bridge failed for another reason while streaming
    Faulted(FailureReason),
    Restarted,
    RestartFailed(BridgeError),
    Stopped,
}

/// Receiver of [`LoopEvent`]s
pub trait LoopObserver {
    fn on_event(&mut self, event: LoopEvent);
}

impl LoopObserver for () {
    fn on_event(&mut self, _event: LoopEvent) {}
}

/// Loop counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoopStats {
    pub iterations: u32,
    pub polls: u32,
    pub poll_errors: u32,
    /// Frames committed to the bridge
    pub frames: u32,
    /// Successful restarts
    pub restarts: u32,
}

/// Presentation loop state
#[derive(Debug, Default)]
pub struct PresentationLoop {
    config: LoopConfig,
    stats: LoopStats,
    /// Failure that triggered the pending restart
    restart_pending: Option<FailureReason>,
    failed_restarts: u32,
}

impl PresentationLoop {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Run one iteration against `handle`
    pub fn step<B: BridgeBus, O: LoopObserver>(
        &mut self,
        handle: &mut BridgeHandle<'_, B>,
        observer: &mut O,
    ) -> StepOutcome {
        self.stats.iterations = self.stats.iterations.wrapping_add(1);

        match handle.state() {
            BridgeState::Streaming => self.poll(handle, observer),
            BridgeState::Stopped => {
                crate::log_info!("Presentation loop stopped");
                observer.on_event(LoopEvent::Stopped);
                StepOutcome::Exit(ExitReason::Stopped)
            }
            BridgeState::Error(reason) => match self.restart_pending {
                Some(_) => self.restart(handle, observer),
                None => self.on_failure(reason),
            },
            state => StepOutcome::Exit(ExitReason::NotStarted(state)),
        }
    }

    fn poll<B: BridgeBus, O: LoopObserver>(
        &mut self,
        handle: &mut BridgeHandle<'_, B>,
        observer: &mut O,
    ) -> StepOutcome {
        match handle.poll() {
            Ok(report) => {
                self.stats.polls = self.stats.polls.wrapping_add(1);
                if report.frame_complete {
                    self.stats.frames = self.stats.frames.wrapping_add(1);
                }
                observer.on_event(LoopEvent::Polled(report.status));
            }
            Err(e) => {
                self.stats.poll_errors = self.stats.poll_errors.wrapping_add(1);
                observer.on_event(LoopEvent::PollFailed(e));
            }
        }

        match handle.state() {
            BridgeState::Error(reason) => {
                if reason == FailureReason::LinkLost {
                    crate::log_warn!("Link lost");
                    observer.on_event(LoopEvent::LinkLost);
                } else {
                    crate::log_error!("Bridge failed while streaming: {:?}", reason);
                    observer.on_event(LoopEvent::Faulted(reason));
                }
                self.on_failure(reason)
            }
            _ => StepOutcome::Continue,
        }
    }

    /// Apply the policy to a failure seen for the first time
    fn on_failure(&mut self, reason: FailureReason) -> StepOutcome {
        match self.config.policy {
            LinkLossPolicy::Terminate => StepOutcome::Exit(ExitReason::Failed(reason)),
            LinkLossPolicy::Restart { backoff_ms, .. } => {
                crate::log_info!("Restarting bridge in {} ms", backoff_ms);
                self.restart_pending = Some(reason);
                StepOutcome::Backoff(backoff_ms)
            }
        }
    }

    fn restart<B: BridgeBus, O: LoopObserver>(
        &mut self,
        handle: &mut BridgeHandle<'_, B>,
        observer: &mut O,
    ) -> StepOutcome {
        let LinkLossPolicy::Restart {
            backoff_ms,
            max_attempts,
        } = self.config.policy
        else {
            return StepOutcome::Exit(ExitReason::Failed(FailureReason::LinkLost));
        };
        let cause = self.restart_pending.unwrap_or(FailureReason::LinkLost);

        match handle.begin() {
            Ok(()) => {
                crate::log_info!("Bridge restarted");
                self.restart_pending = None;
                self.failed_restarts = 0;
                self.stats.restarts = self.stats.restarts.wrapping_add(1);
                observer.on_event(LoopEvent::Restarted);
                StepOutcome::Continue
            }
            Err(e) => {
                self.failed_restarts += 1;
                crate::log_warn!(
                    "Restart attempt {} of {} failed: {:?}",
                    self.failed_restarts,
                    max_attempts,
                    e
                );
                observer.on_event(LoopEvent::RestartFailed(e));
                if self.failed_restarts >= max_attempts {
                    self.restart_pending = None;
                    self.failed_restarts = 0;
                    StepOutcome::Exit(ExitReason::RestartsExhausted(cause))
                } else {
                    StepOutcome::Backoff(backoff_ms)
                }
            }
        }
    }

    /// Drive `handle` until the loop exits
    pub async fn run<B: BridgeBus, S: Scheduler, O: LoopObserver>(
        &mut self,
        handle: &mut BridgeHandle<'_, B>,
        scheduler: &mut S,
        observer: &mut O,
    ) -> ExitReason {
        loop {
            match self.step(handle, observer) {
                StepOutcome::Continue => scheduler.yield_once().await,
                StepOutcome::Backoff(ms) => scheduler.sleep_ms(ms).await,
                StepOutcome::Exit(reason) => return reason,
            }
        }
    }

    /// Like [`run`](Self::run), borrowing the handle only inside each step
    ///
    /// Other tasks may draw, present or call `end()` on the handle while the
    /// loop is suspended; the loop sees the new state on its next step.
    pub async fn run_shared<B: BridgeBus, S: Scheduler, O: LoopObserver>(
        &mut self,
        handle: &RefCell<BridgeHandle<'_, B>>,
        scheduler: &mut S,
        observer: &mut O,
    ) -> ExitReason {
        loop {
            let outcome = self.step(&mut handle.borrow_mut(), observer);
            match outcome {
                StepOutcome::Continue => scheduler.yield_once().await,
                StepOutcome::Backoff(ms) => scheduler.sleep_ms(ms).await,
                StepOutcome::Exit(reason) => return reason,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::anx7625::mock::{MockBridge, MockBus};
    use crate::display::handle::{BufferSet, HandleConfig};
    use crate::display::modes::ModeId;

    const LEN: usize = 640 * 480 * 2;

    #[derive(Default)]
    struct Recorder {
        events: Vec<LoopEvent>,
    }

    impl LoopObserver for Recorder {
        fn on_event(&mut self, event: LoopEvent) {
            self.events.push(event);
        }
    }

    /// Scheduler that unplugs and replugs the display at given yields
    struct ScriptedScheduler {
        chip: MockBridge,
        yields: u32,
        sleeps: Vec<u32>,
        unplug_at: Option<u32>,
        replug_after_sleeps: Option<usize>,
        stop_at: u32,
    }

    impl ScriptedScheduler {
        fn new(chip: &MockBridge) -> Self {
            Self {
                chip: chip.clone(),
                yields: 0,
                sleeps: Vec::new(),
                unplug_at: None,
                replug_after_sleeps: None,
                stop_at: 1000,
            }
        }
    }

    impl Scheduler for ScriptedScheduler {
        async fn yield_once(&mut self) {
            self.yields += 1;
            if self.unplug_at == Some(self.yields) {
                self.chip.set_hpd(false);
            }
            // Break runaway loops in a failing test
            assert!(self.yields < self.stop_at, "loop never exited");
        }

        async fn sleep_ms(&mut self, ms: u32) {
            self.sleeps.push(ms);
            if self.replug_after_sleeps == Some(self.sleeps.len()) {
                self.chip.set_hpd(true);
            }
        }
    }

    fn streaming_handle<'a>(chip: &MockBridge, buffer: &'a mut [u8]) -> BridgeHandle<'a, MockBus> {
        let mut handle = BridgeHandle::new(
            chip.bus().unwrap(),
            HandleConfig::new(ModeId::Mode640x480At60),
            BufferSet::Single(buffer),
        )
        .unwrap();
        handle.begin().unwrap();
        handle
    }

    #[test]
    fn test_step_requires_started_bridge() {
        let chip = MockBridge::healthy();
        let mut buffer = vec![0u8; LEN];
        let mut handle = BridgeHandle::new(
            chip.bus().unwrap(),
            HandleConfig::new(ModeId::Mode640x480At60),
            BufferSet::Single(&mut buffer),
        )
        .unwrap();

        let mut task = PresentationLoop::default();
        assert_eq!(
            task.step(&mut handle, &mut ()),
            StepOutcome::Exit(ExitReason::NotStarted(BridgeState::Uninitialized))
        );
        assert_eq!(chip.i2c.transaction_count(), 0);
    }

    #[test]
    fn test_step_polls_and_pushes() {
        let chip = MockBridge::healthy();
        let mut buffer = vec![0u8; LEN];
        let mut handle = streaming_handle(&chip, &mut buffer);
        let mut task = PresentationLoop::default();
        let mut recorder = Recorder::default();

        assert_eq!(task.step(&mut handle, &mut recorder), StepOutcome::Continue);
        assert_eq!(task.step(&mut handle, &mut recorder), StepOutcome::Continue);

        let stats = task.stats();
        assert_eq!((stats.iterations, stats.polls, stats.frames), (2, 2, 1));
        assert!(matches!(recorder.events[0], LoopEvent::Polled(s) if s.is_healthy()));
        assert_eq!(chip.window_bytes().len(), LEN);
    }

    #[test]
    fn test_terminate_policy_exits_on_link_loss() {
        let chip = MockBridge::healthy();
        let mut buffer = vec![0u8; LEN];
        let mut handle = streaming_handle(&chip, &mut buffer);
        let mut task = PresentationLoop::new(LoopConfig {
            policy: LinkLossPolicy::Terminate,
        });
        let mut recorder = Recorder::default();

        chip.set_hpd(false);
        assert_eq!(
            task.step(&mut handle, &mut recorder),
            StepOutcome::Exit(ExitReason::Failed(FailureReason::LinkLost))
        );
        assert_eq!(recorder.events.last(), Some(&LoopEvent::LinkLost));
    }

    #[test]
    fn test_bus_fault_is_reported() {
        let chip = MockBridge::healthy();
        let mut buffer = vec![0u8; LEN];
        let mut handle = streaming_handle(&chip, &mut buffer);
        let mut task = PresentationLoop::new(LoopConfig {
            policy: LinkLossPolicy::Terminate,
        });
        let mut recorder = Recorder::default();
        chip.i2c
            .fail_address(crate::devices::anx7625::registers::RX_P0_ADDR);

        assert_eq!(task.step(&mut handle, &mut recorder), StepOutcome::Continue);
        assert_eq!(task.step(&mut handle, &mut recorder), StepOutcome::Continue);
        assert_eq!(
            task.step(&mut handle, &mut recorder),
            StepOutcome::Exit(ExitReason::Failed(FailureReason::BusFault))
        );
        assert_eq!(task.stats().poll_errors, 3);
        assert!(recorder
            .events
            .contains(&LoopEvent::Faulted(FailureReason::BusFault)));
    }

    /// Observer that unplugs the display again once a restart succeeds
    struct UnplugAfterRestart {
        recorder: Recorder,
        chip: MockBridge,
    }

    impl LoopObserver for UnplugAfterRestart {
        fn on_event(&mut self, event: LoopEvent) {
            if event == LoopEvent::Restarted {
                self.chip.set_hpd(false);
            }
            self.recorder.on_event(event);
        }
    }

    #[tokio::test]
    async fn test_run_restarts_after_link_loss() {
        let chip = MockBridge::healthy();
        let mut buffer = vec![0u8; LEN];
        let mut handle = streaming_handle(&chip, &mut buffer);
        let mut task = PresentationLoop::new(LoopConfig {
            policy: LinkLossPolicy::Restart {
                backoff_ms: 250,
                max_attempts: 2,
            },
        });
        let mut scheduler = ScriptedScheduler::new(&chip);
        scheduler.unplug_at = Some(3);
        // First restart attempt finds no display, the second one does
        scheduler.replug_after_sleeps = Some(2);
        let mut observer = UnplugAfterRestart {
            recorder: Recorder::default(),
            chip: chip.clone(),
        };

        let exit = task.run(&mut handle, &mut scheduler, &mut observer).await;

        // Second loss: both restart attempts fail
        assert_eq!(exit, ExitReason::RestartsExhausted(FailureReason::LinkLost));
        assert_eq!(scheduler.sleeps, vec![250; 4]);
        assert_eq!(task.stats().restarts, 1);

        let events = &observer.recorder.events;
        assert_eq!(events.iter().filter(|e| **e == LoopEvent::LinkLost).count(), 2);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, LoopEvent::RestartFailed(_)))
                .count(),
            3
        );
        assert!(events.contains(&LoopEvent::Restarted));
        assert_eq!(handle.state(), BridgeState::Error(FailureReason::HpdTimeout));
    }

    #[tokio::test]
    async fn test_restarts_exhausted() {
        let chip = MockBridge::healthy();
        let mut buffer = vec![0u8; LEN];
        let mut handle = streaming_handle(&chip, &mut buffer);
        let mut task = PresentationLoop::new(LoopConfig {
            policy: LinkLossPolicy::Restart {
                backoff_ms: 10,
                max_attempts: 2,
            },
        });
        let mut scheduler = ScriptedScheduler::new(&chip);
        scheduler.unplug_at = Some(1);

        let exit = task.run(&mut handle, &mut scheduler, &mut ()).await;

        assert_eq!(exit, ExitReason::RestartsExhausted(FailureReason::LinkLost));
        assert_eq!(scheduler.sleeps, vec![10, 10]);
        assert_eq!(task.stats().restarts, 0);
        assert!(!chip.power.output_level());
    }

    /// Scheduler that calls `end()` on the shared handle after a few yields
    struct EndingScheduler<'h, 'a> {
        handle: &'h RefCell<BridgeHandle<'a, MockBus>>,
        yields: u32,
        end_at: u32,
    }

    impl Scheduler for EndingScheduler<'_, '_> {
        async fn yield_once(&mut self) {
            self.yields += 1;
            if self.yields == self.end_at {
                self.handle.borrow_mut().end().unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_run_shared_stops_on_external_end() {
        let chip = MockBridge::healthy();
        let mut buffer = vec![0u8; LEN];
        let handle = RefCell::new(streaming_handle(&chip, &mut buffer));
        let mut task = PresentationLoop::default();
        let mut recorder = Recorder::default();
        let mut scheduler = EndingScheduler {
            handle: &handle,
            yields: 0,
            end_at: 4,
        };

        let exit = task
            .run_shared(&handle, &mut scheduler, &mut recorder)
            .await;

        assert_eq!(exit, ExitReason::Stopped);
        assert_eq!(task.stats().polls, 4);
        assert_eq!(scheduler.yields, 4);
        assert_eq!(handle.borrow().state(), BridgeState::Stopped);
        assert!(!chip.reset.output_level());
    }
}
