//! WASM bindings for Cktsim Core.
//!
//! This module provides JavaScript-friendly bindings for running the
//! analyses from the circuit sandbox page. Results come back as JSON text
//! in the same flat dictionary shape the native API serializes to.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmCircuit } from 'cktsim_core';
//!
//! await init();
//!
//! const ckt = new WasmCircuit(JSON.stringify(netlist));
//! const op = JSON.parse(ckt.dc());
//! const bode = JSON.parse(ckt.ac(50, 10, 1e9, "Vin"));
//! const wave = JSON.parse(ckt.tran(100, 0, 0.01, "out,in"));
//! ```

use wasm_bindgen::prelude::*;

use crate::circuit::Circuit;
use crate::error::{Result, SimError};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn js_error(err: SimError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| SimError::WasmError {
        message: e.to_string(),
    })
}

/// WASM-compatible circuit.
///
/// Wraps a native [`Circuit`] built from a netlist. Analyses on the same
/// circuit share its operating point, so an AC or transient run after
/// `dc()` starts from the solution already found.
#[wasm_bindgen]
pub struct WasmCircuit {
    circuit: Circuit,
}

#[wasm_bindgen]
impl WasmCircuit {
    /// Build a circuit from netlist JSON.
    ///
    /// # Arguments
    /// * `netlist_json` - The netlist as produced by the schematic editor
    ///
    /// # Example
    /// ```javascript
    /// const ckt = new WasmCircuit(JSON.stringify(netlist));
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(netlist_json: &str) -> std::result::Result<WasmCircuit, JsValue> {
        let circuit = Circuit::from_json(netlist_json).map_err(js_error)?;
        Ok(WasmCircuit { circuit })
    }

    /// Run a DC analysis and return `{node: volts, "I(src)": amps}`.
    #[wasm_bindgen]
    pub fn dc(&mut self) -> std::result::Result<String, JsValue> {
        let result = self.circuit.dc().map_err(js_error)?;
        to_json(&result).map_err(js_error)
    }

    /// Run an AC sweep driven by `source`.
    ///
    /// # Arguments
    /// * `npts` - Points per decade
    /// * `fstart` - Start frequency (Hz)
    /// * `fstop` - Stop frequency (Hz)
    /// * `source` - Name of the excitation source
    #[wasm_bindgen]
    pub fn ac(&mut self, npts: usize, fstart: f64, fstop: f64, source: &str) -> std::result::Result<String, JsValue> {
        let result = self.circuit.ac(npts, fstart, fstop, source).map_err(js_error)?;
        to_json(&result).map_err(js_error)
    }

    /// Run a transient analysis.
    ///
    /// # Arguments
    /// * `npts` - Minimum points per period
    /// * `tstart` - Start time (s)
    /// * `tstop` - Stop time (s)
    /// * `probes` - Comma-separated names of probed nodes
    #[wasm_bindgen]
    pub fn tran(&mut self, npts: usize, tstart: f64, tstop: f64, probes: &str) -> std::result::Result<String, JsValue> {
        let probes: Vec<&str> = probes
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        let result = self
            .circuit
            .tran(npts, tstart, tstop, probes.as_slice(), false)
            .map_err(js_error)?;
        to_json(&result).map_err(js_error)
    }

    /// Number of unknowns in the circuit.
    #[wasm_bindgen(getter)]
    pub fn size(&self) -> usize {
        self.circuit.size()
    }

    /// Drop the computed operating point so the next analysis starts over.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.circuit.reset();
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
