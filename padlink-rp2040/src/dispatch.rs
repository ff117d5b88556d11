//! Core-1 dispatcher.
//!
//! Core 1 launches early — before any service touches flash — so it is
//! already parked in RAM-resident code whenever Core 0 needs to erase
//! the settings sector (embassy-rp's flash ops pause the remote core via
//! the intercore FIFO, which `spawn_core1` wires up).
//!
//! The wrapper then waits for Core 0 to finish interface enumeration and
//! assign the single timing-critical output task, or to signal that no
//! one claimed the core, in which case it idles in `wfi`.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cortex_m::asm;
use defmt::info;
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::peripherals::CORE1;

static mut CORE1_STACK: Stack<4096> = Stack::new();

/// The assigned task as a raw fn address; 0 = none.
static CORE1_TASK: AtomicUsize = AtomicUsize::new(0);
static CORE1_READY: AtomicBool = AtomicBool::new(false);

fn core1_wrapper() -> ! {
    while !CORE1_READY.load(Ordering::Acquire) {
        asm::wfe();
    }

    let raw = CORE1_TASK.load(Ordering::Acquire);
    if raw != 0 {
        // SAFETY: the only non-zero value ever stored is a `fn()` from
        // `assign_and_start`, on this same address space.
        let task: fn() = unsafe { core::mem::transmute(raw) };
        task();
    }

    loop {
        asm::wfi();
    }
}

/// Launch Core 1 into the wrapper. Call once, before storage init.
pub fn launch_core1(core1: CORE1) {
    // SAFETY: single call site at boot; nothing else touches the stack.
    let stack = unsafe { &mut *core::ptr::addr_of_mut!(CORE1_STACK) };
    spawn_core1(core1, stack, move || core1_wrapper());
}

/// Hand the discovered task (or none) to Core 1 and wake it.
pub fn assign_and_start(task: Option<fn()>) {
    if let Some(task) = task {
        CORE1_TASK.store(task as usize, Ordering::Release);
        info!("core1: task assigned");
    } else {
        info!("core1: no task, idling");
    }
    CORE1_READY.store(true, Ordering::Release);
    asm::sev();
}
