//! USB device wiring: embassy-usb stack plus the sink that bridges the
//! synchronous Core-0 loop to the async HID writer.
//!
//! The bridge is a latest-value signal in each direction of the report
//! plane: IN reports are snapshots (an overwritten frame was stale
//! anyway), OUT reports from the host queue shallowly and drain on the
//! next manager tick.

use core::sync::atomic::{AtomicBool, Ordering};

use defmt::{info, warn};
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_usb::class::hid::{
    Config as HidConfig, HidReaderWriter, ReportId, RequestHandler, State,
};
use embassy_usb::control::OutResponse;
use embassy_usb::{Builder, Config, UsbDevice};
use heapless::Vec;
use padlink_core::{ModeStrings, ReportSink, UsbSpeed};
use padlink_proto::DeviceIdentity;
use static_cell::StaticCell;

/// Largest wire report across the registered modes.
pub const MAX_REPORT_LEN: usize = 64;

/// One queued report with its id.
#[derive(Clone)]
pub struct ReportFrame {
    pub report_id: u8,
    pub data: Vec<u8, MAX_REPORT_LEN>,
}

/// Shared state between the sync report sink and the async USB tasks.
pub struct UsbReportChannel {
    inbound: Signal<CriticalSectionRawMutex, ReportFrame>,
    outbound: Channel<CriticalSectionRawMutex, ReportFrame, 4>,
    ready: AtomicBool,
}

impl UsbReportChannel {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inbound: Signal::new(),
            outbound: Channel::new(),
            ready: AtomicBool::new(false),
        }
    }

    /// The sink handed to the USB device output.
    #[must_use]
    pub fn sink(&self) -> ChannelReportSink<'_> {
        ChannelReportSink { channel: self }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn next_inbound(&self) -> ReportFrame {
        self.inbound.wait().await
    }

    fn push_outbound(&self, frame: ReportFrame) {
        // Oldest-dropped on overflow: the host will repeat itself.
        let _ = self.outbound.try_send(frame);
    }
}

impl Default for UsbReportChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// [`ReportSink`] over the report channel.
pub struct ChannelReportSink<'a> {
    channel: &'a UsbReportChannel,
}

impl ReportSink for ChannelReportSink<'_> {
    fn ready(&self) -> bool {
        self.channel.is_ready()
    }

    fn write(&mut self, report_id: u8, data: &[u8]) -> bool {
        if !self.channel.is_ready() {
            return false;
        }
        let Ok(data) = Vec::from_slice(data) else {
            return false;
        };
        self.channel.inbound.signal(ReportFrame { report_id, data });
        true
    }

    fn read_output(&mut self, buf: &mut [u8]) -> Option<(u8, usize)> {
        let frame = self.channel.outbound.try_receive().ok()?;
        let n = frame.data.len().min(buf.len());
        buf[..n].copy_from_slice(&frame.data[..n]);
        Some((frame.report_id, n))
    }
}

/// HID request handler forwarding host OUT/feature traffic into the
/// report channel.
struct HostReportHandler {
    channel: &'static UsbReportChannel,
}

impl RequestHandler for HostReportHandler {
    fn get_report(&mut self, _id: ReportId, _buf: &mut [u8]) -> Option<usize> {
        None
    }

    fn set_report(&mut self, id: ReportId, data: &[u8]) -> OutResponse {
        let report_id = match id {
            ReportId::Out(n) | ReportId::Feature(n) | ReportId::In(n) => n,
        };
        if let Ok(data) = Vec::from_slice(data) {
            self.channel.push_outbound(ReportFrame { report_id, data });
        }
        OutResponse::Accepted
    }
}

/// Build the USB device for the active mode's identity.
///
/// Descriptor memory is statically allocated; this runs once per boot
/// (a mode change reboots rather than re-enumerating).
pub fn build_usb(
    driver: Driver<'static, USB>,
    identity: DeviceIdentity,
    strings: ModeStrings,
    serial: &'static str,
    speed: UsbSpeed,
    report_descriptor: &'static [u8],
    channel: &'static UsbReportChannel,
) -> (
    UsbDevice<'static, Driver<'static, USB>>,
    HidReaderWriter<'static, Driver<'static, USB>, MAX_REPORT_LEN, MAX_REPORT_LEN>,
) {
    let mut config = Config::new(identity.vid, identity.pid);
    config.manufacturer = Some(strings.manufacturer);
    config.product = Some(strings.product);
    config.serial_number = Some(serial);
    config.device_release = identity.bcd_device;
    config.max_power = 100;
    config.max_packet_size_0 = 64;
    if speed == UsbSpeed::FullSpeed {
        // The RP2040 device controller is full-speed only, so USB 1.1
        // hosts enumerate it natively; nothing extra to negotiate.
        info!("usb: full-speed identity");
    }

    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static MSOS_DESCRIPTOR: StaticCell<[u8; 128]> = StaticCell::new();
    static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();
    static HID_STATE: StaticCell<State> = StaticCell::new();
    static REQUEST_HANDLER: StaticCell<HostReportHandler> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        MSOS_DESCRIPTOR.init([0; 128]),
        CONTROL_BUF.init([0; 64]),
    );

    let handler = REQUEST_HANDLER.init(HostReportHandler { channel });
    let hid_config = HidConfig {
        report_descriptor,
        request_handler: Some(handler),
        poll_ms: 1,
        max_packet_size: 64,
    };
    let hid = HidReaderWriter::new(&mut builder, HID_STATE.init(State::new()), hid_config);

    (builder.build(), hid)
}

/// Run the USB device stack.
#[embassy_executor::task]
pub async fn usb_task(mut device: UsbDevice<'static, Driver<'static, USB>>) {
    device.run().await;
}

/// Pump reports between the channel and the HID endpoints.
#[embassy_executor::task]
pub async fn report_pump_task(
    channel: &'static UsbReportChannel,
    hid: HidReaderWriter<'static, Driver<'static, USB>, MAX_REPORT_LEN, MAX_REPORT_LEN>,
) {
    let (mut reader, mut writer) = hid.split();

    let write_loop = async {
        writer.ready().await;
        channel.set_ready(true);
        info!("usb: enumerated, reports flowing");
        loop {
            let frame = channel.next_inbound().await;
            // Numbered reports carry their id as the first wire byte.
            let mut wire: Vec<u8, { MAX_REPORT_LEN + 1 }> = Vec::new();
            if frame.report_id != 0 {
                let _ = wire.push(frame.report_id);
            }
            let _ = wire.extend_from_slice(&frame.data);
            if let Err(e) = writer.write(&wire).await {
                warn!("usb: report write failed: {:?}", e);
            }
        }
    };

    let read_loop = async {
        let mut buf = [0u8; MAX_REPORT_LEN];
        loop {
            match reader.read(&mut buf).await {
                Ok(n) => {
                    if let Ok(data) = Vec::from_slice(&buf[..n]) {
                        channel.push_outbound(ReportFrame { report_id: 0, data });
                    }
                }
                Err(e) => warn!("usb: OUT read error: {:?}", e),
            }
        }
    };

    embassy_futures::join::join(write_loop, read_loop).await;
}
