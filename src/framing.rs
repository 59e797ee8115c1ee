//! Packs bit sequences into MPSSE command frames.
//!
//! Every frame is an opcode, a length field holding `count - 1` (one byte for bit counts, two
//! little endian bytes for byte counts) and an optional payload.  Frames are collected in an
//! output buffer and sent to the transport in one write when the buffer would overflow 512 bytes,
//! when `flush` is called, or when a read needs the preceding commands to have reached the chip.
//!
//! JTAG latches the last bit of a register on the same TCK edge that raises TMS to leave the Shift
//! state.  `write` therefore holds back the final bit of every sequence, and the next `write_tms`
//! presents it on TDI while it clocks the first TMS edge.
use alloc::vec::Vec;

use bitvec::field::BitField;
use bitvec::prelude::*;

use crate::cable::{PinBank, Transport, JTAG_OUTPUT_PINS};
use crate::config::JtagConfig;
use crate::error::{Error, ProtocolError, TransportError};
use crate::{BitStr, Bits};

/// Size of the output buffer, and so the largest frame that can be queued
pub const MAX_FRAME: usize = 512;
/// Longest shift a single bit command can do
pub const MAX_BITS: usize = 8;
/// Largest read the chip's receive FIFO holds
pub const MAX_READ_BYTES: usize = 512;
/// Largest byte payload that fits in a frame next to its header
pub const MAX_WRITE_BYTES: usize = MAX_FRAME - 3;
/// TMS bits per write-TMS command; bit 7 of the payload is TDI
const MAX_TMS_BITS: usize = 7;

/// The MPSSE shift commands this driver emits: LSB first, TDI/TMS driven on the falling edge.
///
/// The read-only commands sample TDO on the falling edge too.  `ReadWriteBytes` samples on the
/// rising edge, since the MPSSE only pairs opposite edges in a combined write and read.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    WriteBits = 0x1b,
    WriteBytes = 0x19,
    WriteTms = 0x4b,
    ReadBits = 0x2e,
    ReadBytes = 0x2c,
    ReadWriteBytes = 0x39,
}

fn to_bytes(bits: &BitStr) -> Vec<u8> {
    bits.chunks(8).map(|byte| byte.load_le::<u8>()).collect()
}

fn bit_frame(opcode: Opcode, count: usize, payload: Option<u8>) -> Vec<u8> {
    let mut frame = alloc::vec![opcode as u8, (count - 1) as u8];
    frame.extend(payload);
    frame
}

fn byte_frame(opcode: Opcode, count: usize, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(3 + payload.len());
    frame.push(opcode as u8);
    frame.extend_from_slice(&((count - 1) as u16).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

pub struct TapFraming<T> {
    transport: Option<T>,
    // Frames waiting to be written
    buffer: Vec<u8>,
    // Final bit of the last `write`, to be sent with the next TMS change
    carry: Option<bool>,
    direction: u8,
}

impl<T: Transport> TapFraming<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Some(transport),
            buffer: Vec::with_capacity(MAX_FRAME),
            carry: None,
            direction: JTAG_OUTPUT_PINS,
        }
    }

    /// Lower byte pins driven by the master
    pub fn direction(&self) -> u8 {
        self.direction
    }

    /// Frames queued but not yet written
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// The deferred TDI bit, if a `write` is waiting for its TMS change
    pub fn carry(&self) -> Option<bool> {
        self.carry
    }

    /// The underlying transport, `None` once terminated
    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    fn link(&mut self) -> Result<&mut T, Error> {
        self.transport.as_mut().ok_or(Error::Terminated)
    }

    fn no_carry(&self) -> Result<(), ProtocolError> {
        match self.carry {
            Some(_) => Err(ProtocolError::CarryPending),
            None => Ok(()),
        }
    }

    /// Open the transport with this controller's pin directions.  Returns the TCK frequency.
    pub fn open(&mut self, config: &JtagConfig) -> Result<u32, Error> {
        let direction = self.direction;
        Ok(self.link()?.open(config, direction)?)
    }

    /// Flush whatever is queued and release the transport.  Any later call fails with
    /// `Error::Terminated`.
    pub fn terminate(&mut self) -> Result<(), Error> {
        if self.transport.is_none() {
            return Ok(());
        }
        if let Some(bit) = self.carry.take() {
            log::warn!("terminating with deferred TDI bit {} unsent", bit as u8);
        }
        let flushed = self.flush();
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.buffer.clear();
        flushed
    }

    /// Append a frame to the output buffer, flushing first if it would not fit
    pub fn queue(&mut self, frame: &[u8]) -> Result<(), Error> {
        self.link()?;
        if frame.len() > MAX_FRAME {
            return Err(ProtocolError::FrameTooLarge {
                len: frame.len(),
                max: MAX_FRAME,
            }
            .into());
        }
        if self.buffer.len() + frame.len() > MAX_FRAME {
            self.flush()?;
        }
        log::trace!("queue {:02x?}", frame);
        self.buffer.extend_from_slice(frame);
        Ok(())
    }

    /// Write the output buffer to the transport
    pub fn flush(&mut self) -> Result<(), Error> {
        let transport = self.transport.as_mut().ok_or(Error::Terminated)?;
        if self.buffer.is_empty() {
            return Ok(());
        }
        log::trace!("flush {} bytes", self.buffer.len());
        // A failed write is not retried, the device state is unknown from here on
        let written = transport.write(&self.buffer);
        self.buffer.clear();
        Ok(written?)
    }

    /// Drive static GPIO levels, after everything already queued
    pub fn set_pins(&mut self, bank: PinBank, value: u8, direction: u8) -> Result<(), Error> {
        self.flush()?;
        log::trace!("set {:?} pins {:02x} direction {:02x}", bank, value, direction);
        Ok(self.link()?.set_pins(bank, value, direction)?)
    }

    /// Shift out 1 to 8 bits on TDI
    pub fn write_bits(&mut self, bits: &BitStr) -> Result<(), Error> {
        if bits.is_empty() || bits.len() > MAX_BITS {
            return Err(ProtocolError::BitCount {
                requested: bits.len(),
                max: MAX_BITS,
            }
            .into());
        }
        let frame = bit_frame(Opcode::WriteBits, bits.len(), Some(bits.load_le::<u8>()));
        log::debug!("write TDI({}): {:02x?}", bits.len(), frame);
        self.queue(&frame)
    }

    /// Shift out a whole number of bytes on TDI
    pub fn write_bytes(&mut self, bits: &BitStr) -> Result<(), Error> {
        let bytes = aligned_bytes(bits)?;
        let frame = byte_frame(Opcode::WriteBytes, bytes.len(), &bytes);
        log::debug!("write TDI({}): {} byte frame", bits.len(), frame.len());
        self.queue(&frame)
    }

    /// Shift `bits` out on TDI, holding back the last one for the next `write_tms`
    pub fn write(&mut self, bits: &BitStr) -> Result<(), Error> {
        self.no_carry()?;
        let Some((last, body)) = bits.split_last() else {
            return Err(ProtocolError::EmptyShift.into());
        };

        let aligned = body.len() / 8 * 8;
        for chunk in body[..aligned].chunks(MAX_WRITE_BYTES * 8) {
            self.write_bytes(chunk)?;
        }
        if aligned < body.len() {
            self.write_bits(&body[aligned..])?;
        }
        self.carry = Some(*last);
        Ok(())
    }

    /// Clock out a TMS sequence.  TDI carries the bit deferred by `write` during the first edge,
    /// and is held high otherwise.
    pub fn write_tms(&mut self, events: &BitStr) -> Result<(), Error> {
        for (i, chunk) in events.chunks(MAX_TMS_BITS).enumerate() {
            let tdi = if i == 0 {
                self.carry.take().unwrap_or(true)
            } else {
                true
            };
            log::debug!("last bit: {}", tdi as u8);
            let payload = chunk.load_le::<u8>() | (tdi as u8) << 7;
            let frame = bit_frame(Opcode::WriteTms, chunk.len(), Some(payload));
            log::debug!("write TMS: {:02x?}", frame);
            self.queue(&frame)?;
        }
        Ok(())
    }

    fn receive(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        let data = self.link()?.read(len)?;
        log::trace!("read TDO({}): {:02x?}", data.len(), data);
        if data.len() != len {
            return Err(TransportError::ShortRead {
                expected: len,
                actual: data.len(),
            }
            .into());
        }
        Ok(data)
    }

    /// Shift in 1 to 8 bits from TDO
    pub fn read_bits(&mut self, count: usize) -> Result<Bits, Error> {
        if count == 0 || count > MAX_BITS {
            return Err(ProtocolError::BitCount {
                requested: count,
                max: MAX_BITS,
            }
            .into());
        }
        self.no_carry()?;
        self.queue(&bit_frame(Opcode::ReadBits, count, None))?;
        self.flush()?;

        // Bits enter at the top of the byte and shift down
        let byte = self.receive(1)?[0] >> (MAX_BITS - count);
        Ok(byte.view_bits::<Lsb0>()[..count].to_bitvec())
    }

    /// Shift in 1 to 512 bytes from TDO
    pub fn read_bytes(&mut self, count: usize) -> Result<Bits, Error> {
        if count == 0 || count > MAX_READ_BYTES {
            return Err(ProtocolError::ByteCount {
                requested: count,
                max: MAX_READ_BYTES,
            }
            .into());
        }
        self.no_carry()?;
        self.queue(&byte_frame(Opcode::ReadBytes, count, &[]))?;
        self.flush()?;
        Ok(Bits::from_vec(self.receive(count)?))
    }

    /// Shift a whole number of bytes out on TDI while shifting the same amount in from TDO
    pub fn read_write_bytes(&mut self, bits: &BitStr) -> Result<Bits, Error> {
        self.no_carry()?;
        let bytes = aligned_bytes(bits)?;
        self.queue(&byte_frame(Opcode::ReadWriteBytes, bytes.len(), &bytes))?;
        self.flush()?;
        Ok(Bits::from_vec(self.receive(bytes.len())?))
    }

    /// Shift in `count` bits from TDO
    pub fn read(&mut self, count: usize) -> Result<Bits, Error> {
        self.no_carry()?;
        let mut bits = Bits::with_capacity(count);
        let mut bytes = count / 8;
        while bytes > 0 {
            let chunk = bytes.min(MAX_READ_BYTES);
            bits.extend_from_bitslice(&self.read_bytes(chunk)?);
            bytes -= chunk;
        }
        if count % 8 > 0 {
            bits.extend_from_bitslice(&self.read_bits(count % 8)?);
        }
        Ok(bits)
    }
}

fn aligned_bytes(bits: &BitStr) -> Result<Vec<u8>, ProtocolError> {
    if bits.is_empty() {
        return Err(ProtocolError::EmptyShift);
    }
    if bits.len() % 8 != 0 {
        return Err(ProtocolError::Unaligned(bits.len()));
    }
    if bits.len() / 8 > MAX_WRITE_BYTES {
        return Err(ProtocolError::ByteCount {
            requested: bits.len() / 8,
            max: MAX_WRITE_BYTES,
        });
    }
    Ok(to_bytes(bits))
}
