//! Core-0 main scheduler and Core-1 task discovery.
//!
//! The loop is a fixed-order cooperative round-robin:
//! LEDs -> players -> storage -> outputs -> app -> inputs.
//! Outputs tick before inputs so output hardware is primed before inputs
//! enqueue events destined for it. Nothing in the loop blocks; the only
//! tolerated stalls are flash commits inside the storage step.
//!
//! Core-1 discovery happens once at startup: the first registered output
//! with a `core1_task` owns the second core, any further one is ignored
//! (there is only one spare core to give).

use crate::feedback::FeedbackPlane;
use crate::interface::{App, InputBackend, OutputBackend};
use crate::players::{LedService, PlayerManager};
use crate::router::Router;
use crate::storage::{SectorFlash, SettingsStore};

/// Step names reported to the trace hook, in execution order.
pub mod step {
    pub const LEDS: &str = "leds";
    pub const PLAYERS: &str = "players";
    pub const STORAGE: &str = "storage";
    pub const OUTPUT: &str = "output";
    pub const APP: &str = "app";
    pub const INPUT: &str = "input";
}

/// The services ticked at the head of every iteration.
pub struct Services<'d, F: SectorFlash> {
    pub players: PlayerManager,
    pub leds: LedService<'d>,
    pub storage: SettingsStore<F>,
    pub feedback: FeedbackPlane,
}

/// Find the Core-1 task among the registered outputs.
///
/// First output (by registration order) with a task wins; extras are
/// dropped.
#[must_use]
pub fn find_core1_task(outputs: &[&mut dyn OutputBackend]) -> Option<fn()> {
    outputs.iter().find_map(|output| output.core1_task())
}

/// One iteration of the Core-0 loop.
///
/// `trace` observes the step order; pass `None` outside tests.
#[allow(clippy::too_many_arguments)]
pub fn run_once<F: SectorFlash>(
    services: &mut Services<'_, F>,
    outputs: &mut [&mut dyn OutputBackend],
    inputs: &mut [&mut dyn InputBackend],
    app: &mut dyn App,
    router: &Router<'_>,
    now_ms: u32,
    mut trace: Option<&mut dyn FnMut(&'static str)>,
) {
    let mut step = |name| {
        if let Some(trace) = trace.as_deref_mut() {
            trace(name);
        }
    };

    step(step::LEDS);
    if let Some(active) = outputs.first_mut() {
        services
            .feedback
            .tick(&mut **active, inputs, &mut services.leds);
    }
    services.leds.task(now_ms);

    step(step::PLAYERS);
    services.players.task();

    step(step::STORAGE);
    services.storage.task(now_ms);

    for output in outputs.iter_mut() {
        step(step::OUTPUT);
        output.task(now_ms);
    }

    step(step::APP);
    app.task();

    for input in inputs.iter_mut() {
        step(step::INPUT);
        input.task(router, now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{NullApp, OutputTarget};
    use crate::storage::testing::MemoryFlash;

    struct TracingOutput {
        core1: Option<fn()>,
    }

    impl OutputBackend for TracingOutput {
        fn name(&self) -> &'static str {
            "tracing-output"
        }
        fn target(&self) -> OutputTarget {
            OutputTarget::UsbDevice
        }
        fn init(&mut self) {}
        fn task(&mut self, _now_ms: u32) {}
        fn core1_task(&self) -> Option<fn()> {
            self.core1
        }
    }

    struct TracingInput;

    impl InputBackend for TracingInput {
        fn name(&self) -> &'static str {
            "tracing-input"
        }
        fn init(&mut self) {}
        fn task(&mut self, _router: &Router<'_>, _now_ms: u32) {}
    }

    fn services() -> Services<'static, MemoryFlash> {
        let (storage, _) = SettingsStore::load(MemoryFlash::erased());
        Services {
            players: PlayerManager::new(),
            leds: LedService::new(),
            storage,
            feedback: FeedbackPlane::new(),
        }
    }

    #[test]
    fn test_loop_order_is_fixed() {
        let mut services = services();
        let mut out_a = TracingOutput { core1: None };
        let mut out_b = TracingOutput { core1: None };
        let mut in_a = TracingInput;
        let mut in_b = TracingInput;
        let mut app = NullApp;
        let router = Router::new();

        let mut seen: std::vec::Vec<&'static str> = std::vec::Vec::new();
        {
            let mut outputs: [&mut dyn OutputBackend; 2] = [&mut out_a, &mut out_b];
            let mut inputs: [&mut dyn InputBackend; 2] = [&mut in_a, &mut in_b];
            let mut record = |name: &'static str| seen.push(name);
            run_once(
                &mut services,
                &mut outputs,
                &mut inputs,
                &mut app,
                &router,
                0,
                Some(&mut record),
            );
        }

        assert_eq!(
            seen,
            [
                step::LEDS,
                step::PLAYERS,
                step::STORAGE,
                step::OUTPUT,
                step::OUTPUT,
                step::APP,
                step::INPUT,
                step::INPUT,
            ]
        );
    }

    fn task_one() {}
    fn task_two() {}

    #[test]
    fn test_first_core1_task_wins() {
        let mut out_a = TracingOutput { core1: None };
        let mut out_b = TracingOutput {
            core1: Some(task_one),
        };
        let mut out_c = TracingOutput {
            core1: Some(task_two),
        };

        let outputs: [&mut dyn OutputBackend; 3] = [&mut out_a, &mut out_b, &mut out_c];
        let found = find_core1_task(&outputs).unwrap();
        assert_eq!(found as usize, task_one as usize);
    }

    #[test]
    fn test_no_core1_task() {
        let mut out = TracingOutput { core1: None };
        let outputs: [&mut dyn OutputBackend; 1] = [&mut out];
        assert!(find_core1_task(&outputs).is_none());
    }
}
