//! Core types for circuit representation.

use std::fmt;

/// Index of an unknown in the solution vector, `None` for ground.
///
/// Ground is never stored as an unknown; stamps touching it are dropped.
pub type Node = Option<usize>;

/// The ground reference.
pub const GROUND: Node = None;

/// What an unknown in the solution vector represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnknownKind {
    /// Node voltage
    Voltage,
    /// Branch current (inductor, voltage source, op-amp, ammeter)
    Current,
}

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownKind::Voltage => write!(f, "voltage"),
            UnknownKind::Current => write!(f, "current"),
        }
    }
}
