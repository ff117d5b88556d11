#![no_std]
#![no_main]

use defmt::{info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::flash::{Async, Flash};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::uart::{Config as UartConfig, Uart};
use embassy_rp::usb::Driver;
use embassy_time::{Instant, Ticker};
use padlink_core::{
    find_core1_task, run_once, FeedbackPlane, InputBackend, LedDriver, LedService, ModeRegistry,
    ModeStrings, NullApp, OutputBackend, OutputTarget, PendingEvents, PlayerManager, Router,
    Services, SettingsStore, UsbDeviceOutput, UsbdManager,
};
use padlink_core::usbd::modes::{HidMode, KbMouseMode, SwitchMode, XInputMode};
use padlink_proto::modes::hid::HID_IDENTITY;
use padlink_proto::modes::switch::SwitchIdentity;
use padlink_proto::serial_from_board_id;
use padlink_rp2040::chord::{ChordWatcher, MODE_CYCLE_HOLD_MS};
use padlink_rp2040::config::{FLASH_SIZE, LOOP_INTERVAL_US, UART_BAUD};
use padlink_rp2040::flash::SettingsFlash;
use padlink_rp2040::input::{uart_reader_task, UartInputBackend, UartPipe};
use padlink_rp2040::reset::WatchdogReset;
use padlink_rp2040::usb::{build_usb, report_pump_task, usb_task, UsbReportChannel};
use padlink_rp2040::{dispatch, Irqs};
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

static REPORT_CHANNEL: UsbReportChannel = UsbReportChannel::new();
static UART_PIPE: UartPipe = UartPipe::new();
static SERIAL_STR: StaticCell<[u8; 12]> = StaticCell::new();

/// On-board LED as the player-LED fallback; color is ignored.
struct OnboardLed {
    pin: Output<'static>,
}

impl LedDriver for OnboardLed {
    fn set_player_led(&mut self, _player: u8, on: bool) {
        if on {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }

    fn set_color(&mut self, _r: u8, _g: u8, _b: u8) {}
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    info!("padlink starting");

    // Core 1 goes up first so flash writes are safe from the first
    // service init onward. It parks until the task assignment below.
    dispatch::launch_core1(p.CORE1);

    // --- Settings ---
    let flash = Flash::<_, Async, FLASH_SIZE>::new(p.FLASH, p.DMA_CH0);
    let mut settings_flash = SettingsFlash::new(flash);
    let board_id = settings_flash.board_id();
    let (mut store, loaded) = SettingsStore::load(settings_flash);
    if !loaded {
        info!("settings: no valid record, writing defaults");
        if store.save_now().is_err() {
            warn!("settings: initial commit failed, running on defaults");
        }
    }

    // --- USB device modes ---
    let mut hid_mode = HidMode::new();
    let mut xinput_mode = XInputMode::new();
    let mut switch_mode = SwitchMode::new(SwitchIdentity::Pokken);
    let mut kbmouse_mode = KbMouseMode::new();
    let mut registry = ModeRegistry::new();
    registry.register(&mut hid_mode);
    registry.register(&mut xinput_mode);
    registry.register(&mut switch_mode);
    registry.register(&mut kbmouse_mode);

    let serial = serial_from_board_id(&board_id);
    let manager = UsbdManager::new(registry, serial);

    let pending = PendingEvents::new();
    let mut usb_output = UsbDeviceOutput::new(manager, &pending, REPORT_CHANNEL.sink());
    let mode = usb_output.bring_up(store.record());
    info!("usb mode: {:?}", mode);

    // A stale or unsupported persisted id resolved to the default mode;
    // schedule the overwrite.
    if store.record().usb_output_mode != mode.as_u8() {
        store.record_mut().usb_output_mode = mode.as_u8();
        store.mark_dirty(0);
    }

    // --- USB stack under the active mode's identity ---
    let identity = usb_output
        .manager()
        .device_identity()
        .unwrap_or(HID_IDENTITY);
    let strings = usb_output.manager().strings().unwrap_or(ModeStrings {
        manufacturer: "padlink",
        product: "padlink",
    });
    let serial_str: &'static str =
        core::str::from_utf8(SERIAL_STR.init(serial)).unwrap_or("000000000000");
    info!(
        "usb identity: {:04X}:{:04X} serial {}",
        identity.vid, identity.pid, serial_str
    );

    let driver = Driver::new(p.USB, Irqs);
    let (usb_device, hid) = build_usb(
        driver,
        identity,
        strings,
        serial_str,
        usb_output.manager().usb_speed(),
        usb_output.manager().report_descriptor(),
        &REPORT_CHANNEL,
    );
    spawner.spawn(usb_task(usb_device)).unwrap();
    spawner.spawn(report_pump_task(&REPORT_CHANNEL, hid)).unwrap();

    // --- UART input link ---
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = UART_BAUD;
    let uart = Uart::new(
        p.UART1,
        p.PIN_8, // TX
        p.PIN_9, // RX
        Irqs,
        p.DMA_CH1,
        p.DMA_CH2,
        uart_config,
    );
    let (_tx, rx) = uart.split();
    spawner.spawn(uart_reader_task(rx, &UART_PIPE)).unwrap();
    let mut uart_input = UartInputBackend::new(&UART_PIPE, OutputTarget::UsbDevice);

    // --- Router: the real tap goes in before any input can publish ---
    let chord_watcher = ChordWatcher::new(&pending);
    let mut router = Router::new();
    router.set_tap(OutputTarget::UsbDevice, &chord_watcher);

    // --- Services ---
    let mut led = OnboardLed {
        pin: Output::new(p.PIN_25, Level::Low),
    };
    let mut services = Services {
        players: PlayerManager::new(),
        leds: LedService::new(),
        storage: store,
        feedback: FeedbackPlane::new(),
    };
    services.leds.set_driver(&mut led);

    let mut app = NullApp;
    app_bring_up(&mut app, &mut uart_input, &mut usb_output);

    // --- Core-1 task assignment ---
    let core1_task = {
        let outputs: [&mut dyn OutputBackend; 1] = [&mut usb_output];
        find_core1_task(&outputs)
    };
    dispatch::assign_and_start(core1_task);

    let mut reset = WatchdogReset::new(p.WATCHDOG);
    let mut chord_since: Option<u32> = None;
    let mut ticker = Ticker::every(embassy_time::Duration::from_micros(LOOP_INTERVAL_US));

    info!("entering main loop");
    loop {
        let now_ms = Instant::now().as_millis() as u32;

        {
            let mut outputs: [&mut dyn OutputBackend; 1] = [&mut usb_output];
            let mut inputs: [&mut dyn InputBackend; 1] = [&mut uart_input];
            run_once(
                &mut services,
                &mut outputs,
                &mut inputs,
                &mut app,
                &router,
                now_ms,
                None,
            );
        }

        // Combo-driven profile switch: apply and persist deferred.
        if let Some(index) = usb_output.take_profile_switch() {
            info!("profile switch: {}", index);
            services.storage.record_mut().active_profile_index = index;
            services.storage.mark_dirty(now_ms);
            services.leds.indicate_profile(index, now_ms);
        }

        // Mode-cycle maintenance chord.
        if chord_watcher.is_held() {
            match chord_since {
                None => chord_since = Some(now_ms),
                Some(since) if now_ms.wrapping_sub(since) >= MODE_CYCLE_HOLD_MS => {
                    let target = usb_output.manager().next_registered_mode();
                    info!("mode cycle: {:?}", target);
                    if let Err(e) = usb_output.manager_mut().change_mode(
                        target,
                        &mut services.storage,
                        &mut reset,
                    ) {
                        warn!("mode change failed: {:?}", e);
                    }
                    chord_since = None;
                }
                Some(_) => {}
            }
        } else {
            chord_since = None;
        }

        services.leds.set_connected(REPORT_CHANNEL.is_ready());

        ticker.next().await;
    }
}

/// Init hooks in interface order: app, then inputs, then outputs.
fn app_bring_up(
    app: &mut dyn padlink_core::App,
    input: &mut dyn InputBackend,
    output: &mut dyn OutputBackend,
) {
    app.init();
    info!("input: {}", input.name());
    input.init();
    info!("output: {}", output.name());
    output.init();
}
