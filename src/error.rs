//! Error types.  Transport failures and protocol invariant violations are kept apart so that a
//! caller can tell a flaky cable from a bug in how the engine is being driven.  Neither is retried:
//! the only safe recovery from a partially executed scan is a full reset of the TAP.
use alloc::string::String;

use crate::statemachine::TapState;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The cable could not complete an I/O operation
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A request broke one of the framing or state graph rules
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The session was terminated and the transport released
    #[error("JTAG session has been terminated")]
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("no device is open")]
    NotOpen,
    #[error("device not found: {0}")]
    NotFound(String),
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
    #[error("device error: {0}")]
    Device(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid path: {states} states produced {events} events")]
    InvalidPath { states: usize, events: usize },
    #[error("no path from {from} to {to}")]
    NoPath { from: TapState, to: TapState },
    #[error("cannot shift {requested} bits in one command (1 to {max})")]
    BitCount { requested: usize, max: usize },
    #[error("cannot shift {requested} bytes in one command (1 to {max})")]
    ByteCount { requested: usize, max: usize },
    #[error("frame of {len} bytes exceeds the {max} byte buffer")]
    FrameTooLarge { len: usize, max: usize },
    #[error("{0} bits is not a whole number of bytes")]
    Unaligned(usize),
    #[error("a deferred TDI bit is waiting for a TMS change")]
    CarryPending,
    #[error("cannot shift an empty bit sequence")]
    EmptyShift,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown TAP state name {0:?}")]
pub struct UnknownState(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid cable configuration {0:?}")]
pub struct InvalidConfig(pub String);
