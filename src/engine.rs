//! `JtagEngine` is the interface most applications want.  It keeps the tracked TAP state and the
//! cable in step, so that callers can think in terms of instruction and data registers instead of
//! TMS sequences, and it implements the boundary-scan facilities on top of that.
use bitvec::field::BitField;
use bitvec::prelude::*;
use embedded_hal::delay::DelayNs;

use crate::cable::{PinBank, Transport, PIN_TRST};
use crate::config::JtagConfig;
use crate::error::Error;
use crate::framing::TapFraming;
use crate::statemachine::{TapGraph, TapState};
use crate::{BitStr, Bits};

/// Boundary-scan instructions the engine knows how to sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facility {
    Preload,
    Sample,
    Extest,
}

impl Facility {
    pub const fn name(self) -> &'static str {
        match self {
            Facility::Preload => "preload",
            Facility::Sample => "sample",
            Facility::Extest => "extest",
        }
    }
}

/// What the engine needs to know about the device's boundary-scan description
pub trait BoundaryScan {
    /// The instruction register pattern that selects `facility`
    fn instruction(&self, facility: Facility) -> Bits;
    /// Length of the boundary register in bits
    fn boundary_length(&self) -> usize;
}

pub struct JtagEngine<T, D> {
    graph: TapGraph,
    framing: TapFraming<T>,
    delay: D,
    reset_settle_ms: u32,
}

impl<T: Transport, D: DelayNs> JtagEngine<T, D> {
    /// Create an engine driving `transport`.  `delay` times the TRST pulse in `reset`.
    pub fn new(transport: T, delay: D) -> Self {
        Self {
            graph: TapGraph::new(),
            framing: TapFraming::new(transport),
            delay,
            reset_settle_ms: JtagConfig::default().reset_settle_ms,
        }
    }

    /// Open the cable.  Returns the TCK frequency actually in use.
    pub fn configure(&mut self, config: &JtagConfig) -> Result<u32, Error> {
        let actual = self.framing.open(config)?;
        log::debug!(
            "JTAG freq req. {} Hz, real freq. {} Hz",
            config.frequency,
            actual
        );
        if config.high_reset {
            self.framing.set_pins(PinBank::High, 0x01, 0x01)?;
        }
        self.reset_settle_ms = config.reset_settle_ms;
        Ok(actual)
    }

    /// End the session, flushing anything still queued
    pub fn terminate(&mut self) -> Result<(), Error> {
        self.framing.terminate()
    }

    /// The state the TAP is believed to be in
    pub fn state(&self) -> TapState {
        self.graph.current_state()
    }

    /// Names of every state `change_state` can reach
    pub fn state_names() -> impl Iterator<Item = &'static str> {
        TapState::ALL.into_iter().map(TapState::name)
    }

    /// The command layer, for inspecting what is queued
    pub fn framing(&self) -> &TapFraming<T> {
        &self.framing
    }

    /// Reset the TAP controller, both with a TRST pulse and with five TMS=1 clocks, since not
    /// every adapter wires TRST.
    pub fn reset(&mut self) -> Result<(), Error> {
        let direction = self.framing.direction();
        log::debug!("HW (TRST) reset");
        self.framing.set_pins(PinBank::Low, 0, direction)?;
        self.delay.delay_ms(self.reset_settle_ms);
        self.framing.set_pins(PinBank::Low, PIN_TRST, direction)?;
        self.delay.delay_ms(self.reset_settle_ms);

        log::debug!("SW (TMS) reset");
        self.framing.write_tms(bits![u8, Lsb0; 1, 1, 1, 1, 1])?;
        self.framing.flush()?;
        self.graph.reset();
        Ok(())
    }

    /// Move the TAP to `target` by the shortest TMS sequence
    pub fn change_state(&mut self, target: TapState) -> Result<(), Error> {
        let path = self.graph.find_path(target)?;
        let events = self.graph.path_to_events(&path)?;
        log::debug!("{} -> {} via {:?}", self.graph.current_state(), target, path);
        self.framing.write_tms(&events)?;
        self.graph.apply_events(&events);
        Ok(())
    }

    pub fn go_idle(&mut self) -> Result<(), Error> {
        self.change_state(TapState::Idle)
    }

    /// Clock out an arbitrary TMS sequence, following it in the tracked state
    pub fn write_tms(&mut self, events: &BitStr) -> Result<(), Error> {
        self.framing.write_tms(events)?;
        self.graph.apply_events(events);
        Ok(())
    }

    /// Shift `bits` into the current register without changing state.  The last bit goes out
    /// with the next state change.
    pub fn write(&mut self, bits: &BitStr) -> Result<(), Error> {
        self.framing.write(bits)
    }

    /// Shift `count` bits out of the current register without changing state
    pub fn read(&mut self, count: usize) -> Result<Bits, Error> {
        self.framing.read(count)
    }

    /// Send everything queued to the cable
    pub fn sync(&mut self) -> Result<(), Error> {
        self.framing.flush()
    }

    /// Load `instruction` into the instruction register
    pub fn write_ir(&mut self, instruction: &BitStr) -> Result<(), Error> {
        self.change_state(TapState::ShiftIR)?;
        self.framing.write(instruction)?;
        self.change_state(TapState::UpdateIR)
    }

    /// Load `data` into the data register selected by the current instruction
    pub fn write_dr(&mut self, data: &BitStr) -> Result<(), Error> {
        self.change_state(TapState::ShiftDR)?;
        self.framing.write(data)?;
        self.change_state(TapState::UpdateDR)
    }

    /// Capture and read `count` bits of the data register selected by the current instruction
    pub fn read_dr(&mut self, count: usize) -> Result<Bits, Error> {
        self.change_state(TapState::ShiftDR)?;
        let data = self.framing.read(count)?;
        self.change_state(TapState::UpdateDR)?;
        Ok(data)
    }

    /// Read the 32 bit device identification register.  Relies on IDCODE being the instruction
    /// selected by Test-Logic-Reset, so call `reset` first.
    pub fn idcode(&mut self) -> Result<u32, Error> {
        let idcode = self.read_dr(32)?;
        self.go_idle()?;
        Ok(idcode.load_le::<u32>())
    }

    /// Select PRELOAD and load `data` into the boundary register
    pub fn preload<B>(&mut self, bsdl: &B, data: &BitStr) -> Result<(), Error>
    where
        B: BoundaryScan + ?Sized,
    {
        self.write_ir(&bsdl.instruction(Facility::Preload))?;
        self.write_dr(data)?;
        self.go_idle()
    }

    /// Select SAMPLE and capture the device pins through the boundary register
    pub fn sample<B>(&mut self, bsdl: &B) -> Result<Bits, Error>
    where
        B: BoundaryScan + ?Sized,
    {
        self.write_ir(&bsdl.instruction(Facility::Sample))?;
        let data = self.read_dr(bsdl.boundary_length())?;
        self.go_idle()?;
        Ok(data)
    }

    /// Select EXTEST, so the boundary register drives the device pins
    pub fn extest<B>(&mut self, bsdl: &B) -> Result<(), Error>
    where
        B: BoundaryScan + ?Sized,
    {
        self.write_ir(&bsdl.instruction(Facility::Extest))?;
        self.go_idle()
    }

    /// Read the boundary register again under whichever instruction is loaded
    pub fn readback<B>(&mut self, bsdl: &B) -> Result<Bits, Error>
    where
        B: BoundaryScan + ?Sized,
    {
        let data = self.read_dr(bsdl.boundary_length())?;
        self.go_idle()?;
        Ok(data)
    }
}
