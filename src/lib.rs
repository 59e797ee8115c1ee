//! This crate drives a single JTAG (IEEE 1149.1) TAP controller through an FTDI chip running its
//! MPSSE engine.  It is organized in layers.
//!
//! At the bottom is the `Transport` trait, a raw byte stream to the interface chip.  The FTDI
//! implementation is in `cable::mpsse` and needs the `std` feature; anything else that can carry
//! MPSSE commands, including a simulator, can implement the trait.
//!
//! `TapFraming` turns bit sequences into MPSSE shift commands.  It batches commands into 512 byte
//! writes and holds back the last bit of every shift, so that it goes out on the TMS edge that
//! leaves the Shift state as the standard requires.
//!
//! `TapGraph` models the 16 state TAP controller and finds the shortest TMS sequence between any
//! two states.
//!
//! `JtagEngine` ties the two together.  You ask for a state and it gets there; you read and write
//! the instruction and data registers; and it provides the boundary-scan facilities (IDCODE,
//! PRELOAD, SAMPLE, EXTEST) given a `BoundaryScan` description of the device.
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "std")]
//! # fn main() {
//! use jtag_engine::cable::mpsse::{Ft4232hTransport, HostDelay};
//! use jtag_engine::config::JtagConfig;
//! use jtag_engine::engine::JtagEngine;
//!
//! let mut jtag = JtagEngine::new(Ft4232hTransport::new(), HostDelay);
//! jtag.configure(&JtagConfig::default()).unwrap();
//! jtag.reset().unwrap();
//! println!("IDCODE {:08x}", jtag.idcode().unwrap());
//! jtag.terminate().unwrap();
//! # }
//! # #[cfg(not(feature = "std"))]
//! # fn main() {}
//! ```

#![no_std]

#[cfg(any(feature = "std", test))]
extern crate std;

extern crate alloc;

use bitvec::prelude::{BitSlice, BitVec, Lsb0};

pub mod cable;
pub mod config;
pub mod engine;
pub mod error;
pub mod framing;
pub mod statemachine;

/// An owned bit sequence.  Bit 0 is shifted first and is the LSB of the first byte.
pub type Bits = BitVec<u8, Lsb0>;
/// A borrowed bit sequence, see `Bits`
pub type BitStr = BitSlice<u8, Lsb0>;

pub use engine::{BoundaryScan, Facility, JtagEngine};
pub use error::{Error, ProtocolError, TransportError};
pub use statemachine::{TapGraph, TapState};
