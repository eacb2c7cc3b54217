//! # Cktsim Core
//!
//! The analog circuit simulator behind the circuit sandbox.
//!
//! This library provides:
//! - Loading of the schematic editor's JSON netlists
//! - Modified Nodal Analysis (MNA) assembly of the circuit equations
//! - Linear devices (R, C, L, op-amp), independent sources with waveforms,
//!   and nonlinear diodes and MOSFETs
//! - DC operating point, AC small-signal sweep and transient analyses
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`netlist`] - Netlist JSON and engineering-notation number parsing
//! - [`waveform`] - Independent source waveforms (`step`, `sin`, `pwl`, ...)
//! - [`circuit`] - Node numbering, device construction and topology checks
//! - [`components`] - Device models and their MNA stamps
//! - [`solver`] - Matrices, Newton-Raphson and the three analyses
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! cktsim divider.json dc
//! cktsim filter.json ac --npts 20 --fstart 10 --fstop 100k --source VIN
//! cktsim rc.json tran --tstop 5m --probe out
//! ```
//!
//! ### Library
//!
//! ```no_run
//! use cktsim_core::Circuit;
//!
//! let netlist = std::fs::read_to_string("divider.json").unwrap();
//! let mut circuit = Circuit::from_json(&netlist).unwrap();
//! let op = circuit.dc().unwrap();
//! println!("V(out) = {:?}", op.voltage("out"));
//! ```
//!
//! ### WASM
//!
//! ```javascript
//! import { WasmCircuit } from 'cktsim_core';
//!
//! const ckt = new WasmCircuit(netlistJson);
//! const op = JSON.parse(ckt.dc());
//! ```
//!
//! ## Circuit Simulation Method
//!
//! The unknowns are node voltages plus one branch current per voltage
//! source, inductor and op-amp. Each analysis solves `f(x) = 0` with
//! Newton-Raphson:
//!
//! 1. Load the residual `-f(x)` and the Jacobian from every device
//! 2. Solve for the update and apply it, limiting voltage steps when the
//!    residual grows
//! 3. Repeat until both the update and the residual are small
//!
//! Transient analysis discretizes the storage elements with the
//! trapezoidal rule and controls the step from a truncation error estimate.

pub mod circuit;
pub mod components;
pub mod error;
pub mod netlist;
pub mod solver;
pub mod waveform;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{Result, SimError};
pub use netlist::{parse_netlist, parse_number, Netlist};
pub use solver::{AcResult, DcResult, SolverConfig, TranResult};
pub use waveform::{parse_source, Source};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmCircuit;

/// Thermal voltage at room temperature (approximately 26mV)
pub const THERMAL_VOLTAGE: f64 = 0.0258;
