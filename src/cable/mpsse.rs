//! Implement the `Transport` trait for FTDI chips with an MPSSE engine, such as the FT2232H and
//! FT4232H found on Bus Blaster, JTAGkey and Olimex style adapters.
use crate::cable::{PinBank, Transport, PIN_TMS, PIN_TRST};
use crate::config::JtagConfig;
use crate::error::TransportError;

use std::fmt::Debug;
use std::format;
use std::time::Duration;
use std::vec;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use ftdi_mpsse::MpsseCmdBuilder;
use libftd2xx::{Ft2232h, Ft4232h, FtStatus, Ftdi, FtdiCommon, FtdiMpsse, MpsseCmdExecutor};

// 60 MHz master clock, one TCK period takes two ticks of the divided clock
const MPSSE_BASE_CLOCK: u32 = 30_000_000;

fn status_err(e: FtStatus) -> TransportError {
    TransportError::Device(format!("FTDI D2XX error: {e}"))
}

fn debug_err<E: Debug>(e: E) -> TransportError {
    TransportError::Device(format!("FTDI D2XX error: {e:?}"))
}

/// Divisor for the MPSSE clock command and the TCK frequency it produces
fn clock_divisor(frequency: u32) -> (u32, u32) {
    let divisor = MPSSE_BASE_CLOCK
        .div_ceil(frequency.max(1))
        .saturating_sub(1)
        .min(0xffff);
    (divisor, MPSSE_BASE_CLOCK / (divisor + 1))
}

/// Serial number of the `interface`-th listed device with the configured ids.  D2XX lists every
/// channel of a multi-channel chip as a device of its own, in channel order.
fn select_serial<'a, I>(devices: I, config: &JtagConfig) -> Option<&'a str>
where
    I: IntoIterator<Item = (u16, u16, &'a str)>,
{
    devices
        .into_iter()
        .filter(|&(vendor, product, _)| vendor == config.vendor && product == config.product)
        .nth(config.interface.into())
        .map(|(_, _, serial)| serial)
}

pub struct MpsseTransport<T> {
    ft: Option<T>,
}

/// Transport for the dual channel FT2232H
pub type Ft2232hTransport = MpsseTransport<Ft2232h>;
/// Transport for the quad channel FT4232H
pub type Ft4232hTransport = MpsseTransport<Ft4232h>;

impl<T> Default for MpsseTransport<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MpsseTransport<T> {
    /// Create a closed transport; `Transport::open` attaches it to a device
    pub fn new() -> Self {
        Self { ft: None }
    }

    fn device(&mut self) -> Result<&mut T, TransportError> {
        self.ft.as_mut().ok_or(TransportError::NotOpen)
    }
}

impl<T> Transport for MpsseTransport<T>
where
    T: FtdiMpsse + MpsseCmdExecutor + FtdiCommon + TryFrom<Ftdi>,
    <T as TryFrom<Ftdi>>::Error: Debug,
    <T as MpsseCmdExecutor>::Error: Debug,
{
    fn open(&mut self, config: &JtagConfig, direction: u8) -> Result<u32, TransportError> {
        // D2XX on unix only accepts FTDI's stock ids unless told otherwise
        #[cfg(unix)]
        libftd2xx::set_vid_pid(config.vendor, config.product).map_err(status_err)?;

        let devices = libftd2xx::list_devices().map_err(status_err)?;
        let listed = devices
            .iter()
            .map(|d| (d.vendor_id, d.product_id, d.serial_number.as_str()));
        let serial = select_serial(listed, config).ok_or_else(|| {
            TransportError::NotFound(format!(
                "{:04x}:{:04x} interface {}",
                config.vendor, config.product, config.interface
            ))
        })?;
        if serial.is_empty() {
            return Err(TransportError::NotFound(format!(
                "{:04x}:{:04x} interface {} has no serial number",
                config.vendor, config.product, config.interface
            )));
        }
        let ft = Ftdi::with_serial_number(serial)
            .map_err(|e| TransportError::NotFound(format!("serial {serial}: {e}")))?;
        let mut ft = T::try_from(ft).map_err(debug_err)?;

        ft.initialize_mpsse_default().map_err(debug_err)?;
        ft.set_latency_timer(Duration::from_millis(1)).map_err(status_err)?;

        let (divisor, actual) = clock_divisor(config.frequency);
        let builder = MpsseCmdBuilder::new()
            .disable_3phase_data_clocking()
            .disable_adaptive_data_clocking()
            .set_clock(divisor, Some(false))
            .set_gpio_lower(PIN_TMS | PIN_TRST, direction);
        ft.send(builder.as_slice()).map_err(debug_err)?;

        log::debug!(
            "opened {:04x}:{:04x} interface {}, TCK divisor {}",
            config.vendor,
            config.product,
            config.interface,
            divisor
        );
        self.ft = Some(ft);
        Ok(actual)
    }

    fn set_pins(&mut self, bank: PinBank, value: u8, direction: u8) -> Result<(), TransportError> {
        let builder = match bank {
            PinBank::Low => MpsseCmdBuilder::new().set_gpio_lower(value, direction),
            PinBank::High => MpsseCmdBuilder::new().set_gpio_upper(value, direction),
        };
        self.device()?.send(builder.as_slice()).map_err(debug_err)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.device()?.send(data).map_err(debug_err)
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0; len];
        self.device()?.recv(&mut buf).map_err(debug_err)?;
        Ok(buf)
    }

    fn close(&mut self) {
        // The D2XX handle is released when the device is dropped
        if self.ft.take().is_some() {
            log::debug!("closed FTDI device");
        }
    }
}

/// `DelayNs` backed by `std::thread::sleep`, for the TRST settle time on a host
#[derive(Debug, Default, Clone, Copy)]
pub struct HostDelay;

impl DelayNs for HostDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns.into()));
    }
}
