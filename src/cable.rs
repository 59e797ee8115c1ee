//! The byte-stream link to the MPSSE interface chip.  `TapFraming` only ever talks to the
//! hardware through the `Transport` trait; the FTDI implementation lives in `mpsse`.
#[cfg(feature = "std")]
pub mod mpsse;

use alloc::vec::Vec;

use crate::config::JtagConfig;
use crate::error::TransportError;

// Lower GPIO byte, as wired on FT2232/FT4232 JTAG adapters
pub const PIN_TCK: u8 = 1;
pub const PIN_TDI: u8 = 1 << 1;
pub const PIN_TDO: u8 = 1 << 2;
pub const PIN_TMS: u8 = 1 << 3;
/// Active low TAP reset, not wired on every adapter
pub const PIN_TRST: u8 = 1 << 4;
/// Pins driven by the master.  TDO is the only input.
pub const JTAG_OUTPUT_PINS: u8 = PIN_TCK | PIN_TDI | PIN_TMS | PIN_TRST;

/// Which of the chip's two GPIO bytes a `set_pins` call addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinBank {
    Low,
    High,
}

pub trait Transport {
    /// Open the device described by `config` in MPSSE mode, with `direction` selecting the lower
    /// byte pins that are outputs.  Returns the TCK frequency actually configured.
    fn open(&mut self, config: &JtagConfig, direction: u8) -> Result<u32, TransportError>;
    /// Drive static levels on a GPIO byte.  `direction` has a bit set for every output pin.
    fn set_pins(&mut self, bank: PinBank, value: u8, direction: u8) -> Result<(), TransportError>;
    /// Send raw MPSSE command bytes
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;
    /// Receive exactly `len` bytes produced by previously written read commands
    fn read(&mut self, len: usize) -> Result<Vec<u8>, TransportError>;
    /// Release the device.  Further calls fail with `TransportError::NotOpen`.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn open(&mut self, config: &JtagConfig, direction: u8) -> Result<u32, TransportError> {
        (**self).open(config, direction)
    }

    fn set_pins(&mut self, bank: PinBank, value: u8, direction: u8) -> Result<(), TransportError> {
        (**self).set_pins(bank, value, direction)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(data)
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read(len)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

impl<T: Transport + ?Sized> Transport for alloc::boxed::Box<T> {
    fn open(&mut self, config: &JtagConfig, direction: u8) -> Result<u32, TransportError> {
        (**self).open(config, direction)
    }

    fn set_pins(&mut self, bank: PinBank, value: u8, direction: u8) -> Result<(), TransportError> {
        (**self).set_pins(bank, value, direction)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(data)
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read(len)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
