//! Error types for the circuit simulator.
//!
//! This module provides a unified error type [`SimError`] that covers
//! all error conditions that can occur during netlist loading, circuit
//! assembly and analysis. Every analysis entry point returns a typed
//! [`Result`] so a front end can show the message and let the user retry.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Unified error type for all simulator operations.
#[derive(Error, Debug)]
pub enum SimError {
    // ============ Netlist Errors ============
    /// A numeric property could not be interpreted
    #[error("Value '{text}' for {context} could not be interpreted as a number")]
    InvalidNumber { text: String, context: String },

    /// A source specification argument could not be interpreted
    #[error("Invalid source specification '{spec}': {message}")]
    InvalidSource { spec: String, message: String },

    /// Source specification names an unknown waveform
    #[error("Unknown source function '{function}' in '{spec}'")]
    UnknownSourceFunction { function: String, spec: String },

    /// Required device property is absent
    #[error("Component '{component}' is missing property '{property}'")]
    MissingProperty { component: String, property: String },

    /// Invalid component definition
    #[error("Invalid component '{name}': {message}")]
    InvalidComponent { name: String, message: String },

    /// Netlist entry does not have the expected shape
    #[error("Malformed netlist entry {index}: {message}")]
    MalformedNetlist { index: usize, message: String },

    /// Netlist text is not valid JSON
    #[error("Netlist is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    // ============ Topology Errors ============
    /// No component connects to ground
    #[error("Circuit has no ground connection; connect at least one node to ground")]
    MissingGround,

    /// Voltage sources form a loop or a source is shorted
    #[error(
        "Circuit has a voltage source loop or a source or current probe shorted by a wire \
         ({independent} of {sources} voltage sources independent)"
    )]
    VoltageSourceLoop { sources: usize, independent: usize },

    // ============ Simulation Errors ============
    /// Newton-Raphson iteration did not converge
    #[error("Newton method failed after {iterations} iterations, it may be your circuit or it may be the simulator")]
    ConvergenceFailure { iterations: usize },

    /// Newton-Raphson failed in a circuit with current sources
    #[error("Newton method failed after {iterations} iterations, do your current sources have a conductive path to ground?")]
    FloatingCurrentSource { iterations: usize },

    /// AC analysis refers to a device that does not exist
    #[error("AC analysis refers to unknown source '{name}'")]
    UnknownSource { name: String },

    /// Transient step shrank below the minimum without converging
    #[error("Transient analysis failed to converge at t = {time:.4e}s (step {step:.3e}s below minimum)")]
    TimestepTooSmall { time: f64, step: f64 },

    /// Transient analysis hit its step ceiling before reaching the stop time
    #[error("Transient analysis stopped after {steps} steps at t = {time:.4e}s")]
    StepLimitExceeded { steps: usize, time: f64 },

    /// Matrix or vector dimensions disagree
    #[error("Dimension mismatch in {operation}: expected {expected}, got {actual}")]
    DimensionMismatch {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ I/O Errors ============
    /// Error reading netlist file
    #[error("Failed to read netlist file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ============ WASM Errors ============
    /// WASM-specific error
    #[cfg(feature = "wasm")]
    #[error("WASM error: {message}")]
    WasmError { message: String },
}

impl SimError {
    /// Create an invalid number error
    pub fn invalid_number(text: impl Into<String>, context: impl Into<String>) -> Self {
        Self::InvalidNumber {
            text: text.into(),
            context: context.into(),
        }
    }

    /// Create an invalid source error
    pub fn invalid_source(spec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSource {
            spec: spec.into(),
            message: message.into(),
        }
    }

    /// Create an invalid component error
    pub fn invalid_component(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidComponent {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a malformed netlist error
    pub fn malformed(index: usize, message: impl Into<String>) -> Self {
        Self::MalformedNetlist {
            index,
            message: message.into(),
        }
    }

    /// Create an invalid simulation parameter error
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }

    /// True for Newton non-convergence, which callers may recover from.
    pub fn is_convergence_failure(&self) -> bool {
        matches!(
            self,
            Self::ConvergenceFailure { .. } | Self::FloatingCurrentSource { .. }
        )
    }

    /// True for errors caused by the circuit's connectivity.
    pub fn is_topology_error(&self) -> bool {
        matches!(self, Self::MissingGround | Self::VoltageSourceLoop { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convergence_messages_differ() {
        let floating = SimError::FloatingCurrentSource { iterations: 1000 };
        let generic = SimError::ConvergenceFailure { iterations: 1000 };
        assert!(floating.to_string().contains("current sources"));
        assert!(!generic.to_string().contains("current sources"));
        assert!(floating.is_convergence_failure());
        assert!(generic.is_convergence_failure());
        assert!(!floating.is_topology_error());
    }

    #[test]
    fn test_topology_classification() {
        assert!(SimError::MissingGround.is_topology_error());
        let looped = SimError::VoltageSourceLoop {
            sources: 2,
            independent: 1,
        };
        assert!(looped.is_topology_error());
        assert!(looped.to_string().contains("voltage source loop"));
    }
}
