//! A software TAP controller behind an MPSSE command decoder, for driving `JtagEngine` without
//! hardware.
#![allow(dead_code)]

use std::collections::VecDeque;

use bitvec::field::BitField;
use bitvec::prelude::*;
use embedded_hal::delay::DelayNs;
use jtag_engine::cable::{PinBank, Transport, PIN_TMS, PIN_TRST};
use jtag_engine::config::JtagConfig;
use jtag_engine::{BoundaryScan, Bits, Facility, TapState, TransportError};

pub const IR_LEN: usize = 4;
pub const EXTEST: u8 = 0b0000;
pub const IDCODE: u8 = 0b0001;
pub const SAMPLE_PRELOAD: u8 = 0b0010;
pub const USER: u8 = 0b1000;
pub const BYPASS: u8 = 0b1111;
pub const BOUNDARY_LEN: usize = 12;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn instruction(code: u8) -> Bits {
    code.view_bits::<Lsb0>()[..IR_LEN].to_bitvec()
}

pub fn pattern(len: usize, seed: usize) -> Bits {
    (0..len).map(|i| (i * 7 + i / 3 + seed) % 5 < 2).collect()
}

pub struct SimTap {
    pub state: TapState,
    pub instruction: u8,
    pub idcode: u32,
    /// Levels captured by SAMPLE and EXTEST
    pub pins: Bits,
    /// Output cells latched by Update-DR under PRELOAD or EXTEST
    pub boundary: Bits,
    /// A register that captures its own last update, so what is written reads back
    pub user: Bits,
    ir: Bits,
    dr: Bits,
    tms: bool,
    tdi: bool,
    responses: VecDeque<u8>,
    pub writes: usize,
    pub trst_pulses: usize,
    pub opened: Option<(JtagConfig, u8)>,
    pub high_pins: Option<(u8, u8)>,
    pub closed: bool,
}

impl SimTap {
    pub fn new(idcode: u32) -> Self {
        Self {
            state: TapState::Reset,
            instruction: IDCODE,
            idcode,
            pins: bitvec![u8, Lsb0; 0; BOUNDARY_LEN],
            boundary: bitvec![u8, Lsb0; 0; BOUNDARY_LEN],
            user: Bits::new(),
            ir: bitvec![u8, Lsb0; 0; IR_LEN],
            dr: Bits::new(),
            tms: true,
            tdi: true,
            responses: VecDeque::new(),
            writes: 0,
            trst_pulses: 0,
            opened: None,
            high_pins: None,
            closed: false,
        }
    }

    fn capture_dr(&self) -> Bits {
        match self.instruction {
            IDCODE => self.idcode.to_le_bytes().view_bits::<Lsb0>().to_bitvec(),
            SAMPLE_PRELOAD | EXTEST => self.pins.clone(),
            USER => self.user.clone(),
            _ => bitvec![u8, Lsb0; 0],
        }
    }

    fn update_dr(&mut self) {
        match self.instruction {
            SAMPLE_PRELOAD | EXTEST => self.boundary = self.dr.clone(),
            USER => self.user = self.dr.clone(),
            _ => {}
        }
    }

    fn shift(register: &mut Bits, tdi: bool) -> bool {
        if register.is_empty() {
            return tdi;
        }
        let tdo = register.remove(0);
        register.push(tdi);
        tdo
    }

    /// One TCK cycle: act on the current state, then follow TMS
    fn clock(&mut self, tms: bool, tdi: bool) -> bool {
        let mut tdo = false;
        match self.state {
            TapState::CaptureDR => self.dr = self.capture_dr(),
            TapState::ShiftDR => tdo = Self::shift(&mut self.dr, tdi),
            // IEEE 1149.1 requires the two low bits to capture as 01
            TapState::CaptureIR => self.ir = instruction(0b0001),
            TapState::ShiftIR => tdo = Self::shift(&mut self.ir, tdi),
            _ => {}
        }

        self.state = self.state.next(tms);
        match self.state {
            TapState::Reset => self.instruction = IDCODE,
            TapState::UpdateIR => self.instruction = self.ir.load_le::<u8>(),
            TapState::UpdateDR => self.update_dr(),
            _ => {}
        }
        tdo
    }

    fn clock_out(&mut self, bits: &BitSlice<u8, Lsb0>) -> Bits {
        let tms = self.tms;
        let mut tdo = Bits::with_capacity(bits.len());
        for tdi in bits.iter().by_vals() {
            self.tdi = tdi;
            tdo.push(self.clock(tms, tdi));
        }
        tdo
    }

    fn clock_in(&mut self, count: usize) -> Bits {
        let (tms, tdi) = (self.tms, self.tdi);
        (0..count).map(|_| self.clock(tms, tdi)).collect()
    }
}

impl Transport for SimTap {
    fn open(&mut self, config: &JtagConfig, direction: u8) -> Result<u32, TransportError> {
        self.opened = Some((*config, direction));
        Ok(config.frequency)
    }

    fn set_pins(&mut self, bank: PinBank, value: u8, direction: u8) -> Result<(), TransportError> {
        match bank {
            PinBank::Low => {
                self.tms = value & PIN_TMS != 0;
                if direction & PIN_TRST != 0 && value & PIN_TRST == 0 {
                    self.trst_pulses += 1;
                    self.state = TapState::Reset;
                    self.instruction = IDCODE;
                }
            }
            PinBank::High => self.high_pins = Some((value, direction)),
        }
        Ok(())
    }

    fn write(&mut self, mut data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::NotOpen);
        }
        self.writes += 1;
        while let [op, rest @ ..] = data {
            let long = || rest[0] as usize + ((rest[1] as usize) << 8) + 1;
            data = match *op {
                0x1b => {
                    let n = rest[0] as usize + 1;
                    self.clock_out(&rest[1].view_bits::<Lsb0>()[..n]);
                    &rest[2..]
                }
                0x19 => {
                    let n = long();
                    self.clock_out(rest[2..2 + n].view_bits::<Lsb0>());
                    &rest[2 + n..]
                }
                0x4b => {
                    let n = rest[0] as usize + 1;
                    let tdi = rest[1] & 0x80 != 0;
                    self.tdi = tdi;
                    for tms in rest[1].view_bits::<Lsb0>()[..n].iter().by_vals() {
                        self.tms = tms;
                        self.clock(tms, tdi);
                    }
                    &rest[2..]
                }
                0x2e => {
                    let n = rest[0] as usize + 1;
                    let byte = self.clock_in(n).load_le::<u8>();
                    self.responses.push_back(byte << (8 - n));
                    &rest[1..]
                }
                0x2c => {
                    let bits = self.clock_in(8 * long());
                    self.responses.extend(bits.into_vec());
                    &rest[2..]
                }
                0x39 => {
                    let n = long();
                    let bits = self.clock_out(rest[2..2 + n].view_bits::<Lsb0>());
                    self.responses.extend(bits.into_vec());
                    &rest[2 + n..]
                }
                other => panic!("unsupported MPSSE opcode {:02x}", other),
            };
        }
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        let n = len.min(self.responses.len());
        Ok(self.responses.drain(..n).collect())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Adds up requested delays instead of sleeping
#[derive(Default)]
pub struct Clock {
    pub ns: u64,
}

impl DelayNs for Clock {
    fn delay_ns(&mut self, ns: u32) {
        self.ns += u64::from(ns);
    }
}

/// Boundary-scan description of `SimTap`
pub struct SimBsdl;

impl BoundaryScan for SimBsdl {
    fn instruction(&self, facility: Facility) -> Bits {
        match facility {
            Facility::Preload | Facility::Sample => instruction(SAMPLE_PRELOAD),
            Facility::Extest => instruction(EXTEST),
        }
    }

    fn boundary_length(&self) -> usize {
        BOUNDARY_LEN
    }
}
