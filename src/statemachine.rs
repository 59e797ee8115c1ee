//! The IEEE 1149.1 TAP controller state machine.  `TapGraph` keeps track of the state the remote
//! TAP is believed to be in, and computes the TMS sequence that moves it to any other state by the
//! shortest path through the graph.  Nothing in here performs I/O.
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::error::{ProtocolError, UnknownState};
use crate::{BitStr, Bits};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TapState {
    Reset = 0,
    Idle = 1,
    SelectDR = 2,
    CaptureDR = 3,
    ShiftDR = 4,
    Exit1DR = 5,
    PauseDR = 6,
    Exit2DR = 7,
    UpdateDR = 8,
    SelectIR = 9,
    CaptureIR = 10,
    ShiftIR = 11,
    Exit1IR = 12,
    PauseIR = 13,
    Exit2IR = 14,
    UpdateIR = 15,
}

use TapState::*;

// Successor of each state, indexed by [state][tms]
const TRANSITIONS: [[TapState; 2]; 16] = [
    /* Reset     */ [Idle, Reset],
    /* Idle      */ [Idle, SelectDR],
    /* SelectDR  */ [CaptureDR, SelectIR],
    /* CaptureDR */ [ShiftDR, Exit1DR],
    /* ShiftDR   */ [ShiftDR, Exit1DR],
    /* Exit1DR   */ [PauseDR, UpdateDR],
    /* PauseDR   */ [PauseDR, Exit2DR],
    /* Exit2DR   */ [ShiftDR, UpdateDR],
    /* UpdateDR  */ [Idle, SelectDR],
    /* SelectIR  */ [CaptureIR, Reset],
    /* CaptureIR */ [ShiftIR, Exit1IR],
    /* ShiftIR   */ [ShiftIR, Exit1IR],
    /* Exit1IR   */ [PauseIR, UpdateIR],
    /* PauseIR   */ [PauseIR, Exit2IR],
    /* Exit2IR   */ [ShiftIR, UpdateIR],
    /* UpdateIR  */ [Idle, SelectDR],
];

impl TapState {
    /// Every TAP state, in the order of their discriminants
    pub const ALL: [TapState; 16] = [
        Reset, Idle, SelectDR, CaptureDR, ShiftDR, Exit1DR, PauseDR, Exit2DR, UpdateDR,
        SelectIR, CaptureIR, ShiftIR, Exit1IR, PauseIR, Exit2IR, UpdateIR,
    ];

    /// The state reached from `self` after one TCK edge with TMS at `tms`
    pub const fn next(self, tms: bool) -> TapState {
        TRANSITIONS[self as usize][tms as usize]
    }

    /// Both successors, indexed by the TMS value that selects them
    pub const fn exits(self) -> [TapState; 2] {
        TRANSITIONS[self as usize]
    }

    /// The state name as printed in IEEE 1149.1
    pub const fn name(self) -> &'static str {
        match self {
            Reset => "Test-Logic-Reset",
            Idle => "Run-Test/Idle",
            SelectDR => "Select-DR-Scan",
            CaptureDR => "Capture-DR",
            ShiftDR => "Shift-DR",
            Exit1DR => "Exit1-DR",
            PauseDR => "Pause-DR",
            Exit2DR => "Exit2-DR",
            UpdateDR => "Update-DR",
            SelectIR => "Select-IR-Scan",
            CaptureIR => "Capture-IR",
            ShiftIR => "Shift-IR",
            Exit1IR => "Exit1-IR",
            PauseIR => "Pause-IR",
            Exit2IR => "Exit2-IR",
            UpdateIR => "Update-IR",
        }
    }
}

impl fmt::Display for TapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compare two state names ignoring case and punctuation, so "Run-Test/Idle", "run_test_idle"
/// and "RunTestIdle" are all the same state.
fn same_name(a: &str, b: &str) -> bool {
    a.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .eq(b.chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase()))
}

impl FromStr for TapState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TapState::ALL
            .iter()
            .copied()
            .find(|state| same_name(state.name(), s))
            .ok_or_else(|| UnknownState(s.into()))
    }
}

/// Tracks the state of the remote TAP controller
#[derive(Debug, Clone)]
pub struct TapGraph {
    current: TapState,
}

impl Default for TapGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TapGraph {
    /// Create a graph whose current state is Test-Logic-Reset
    pub fn new() -> Self {
        Self {
            current: TapState::Reset,
        }
    }

    pub fn current_state(&self) -> TapState {
        self.current
    }

    /// Forget the tracked state and assume Test-Logic-Reset.  Nothing is sent to the device.
    pub fn reset(&mut self) {
        self.current = TapState::Reset;
    }

    /// Shortest path from the current state to `target`, see `find_path_from`
    pub fn find_path(&self, target: TapState) -> Result<Vec<TapState>, ProtocolError> {
        self.find_path_from(self.current, target)
    }

    /// Find the shortest sequence of states leading from `source` to `target`, both included.
    ///
    /// The graph is walked depth first, TMS=0 edges before TMS=1 edges.  Self loops and edges
    /// leading back into the path being built are never followed.  When several paths share the
    /// minimal length, the first one discovered is returned.
    pub fn find_path_from(
        &self,
        source: TapState,
        target: TapState,
    ) -> Result<Vec<TapState>, ProtocolError> {
        if source == target {
            return Ok(vec![target]);
        }

        let mut best: Option<Vec<TapState>> = None;
        let mut path = vec![source];
        // Next edge to try for each state of `path`
        let mut cursor = vec![0usize];

        while let Some(edge) = cursor.last_mut() {
            let state = path[path.len() - 1];
            if *edge > 1 {
                cursor.pop();
                path.pop();
                continue;
            }
            let next = state.next(*edge == 1);
            *edge += 1;

            if next == state || path.contains(&next) {
                continue;
            }

            // Anything found below `next` is at least this long
            let shortest = path.len() + 1;
            if best.as_ref().is_some_and(|b| b.len() <= shortest) {
                continue;
            }

            if next == target {
                let mut found = path.clone();
                found.push(next);
                best = Some(found);
                continue;
            }

            path.push(next);
            cursor.push(0);
        }

        best.ok_or(ProtocolError::NoPath {
            from: source,
            to: target,
        })
    }

    /// Convert a path of states into the TMS values that walk it
    pub fn path_to_events(&self, path: &[TapState]) -> Result<Bits, ProtocolError> {
        let mut events = Bits::with_capacity(path.len());
        for pair in path.windows(2) {
            if let Some(tms) = pair[0].exits().iter().position(|x| *x == pair[1]) {
                events.push(tms == 1);
            }
        }

        if path.is_empty() || events.len() != path.len() - 1 {
            return Err(ProtocolError::InvalidPath {
                states: path.len(),
                events: events.len(),
            });
        }
        Ok(events)
    }

    /// Advance the tracked state through `events`, one TCK edge per bit
    pub fn apply_events(&mut self, events: &BitStr) {
        for tms in events.iter().by_vals() {
            self.current = self.current.next(tms);
        }
    }
}
