//! Circuit representation and validation.
//!
//! This module provides the internal representation of a circuit after
//! netlist loading. The [`Circuit`] struct owns the node numbering, the
//! devices and, once finalized, the assembled MNA system.

mod graph;
mod types;
mod validate;

pub use graph::Circuit;
pub use types::*;
pub use validate::check_voltage_source_loops;
