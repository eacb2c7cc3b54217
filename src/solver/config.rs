//! Solver configuration.

use crate::netlist::ViewSettings;

use super::{DC_MAX_ITERS, MAX_TRAN_ITERS};

/// Configuration for the analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverConfig {
    /// Newton iteration limit for the DC operating point.
    pub dc_max_iters: usize,
    /// Newton iteration limit per transient timestep.
    pub max_tran_iters: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            dc_max_iters: DC_MAX_ITERS,
            max_tran_iters: MAX_TRAN_ITERS,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the DC Newton iteration limit.
    pub fn with_dc_max_iters(mut self, iters: usize) -> Self {
        self.dc_max_iters = iters.max(1);
        self
    }

    /// Set the per-step transient Newton iteration limit.
    ///
    /// Low limits make the integrator shrink the step more often; high
    /// limits spend more time on steps that will be rejected anyway.
    pub fn with_max_tran_iters(mut self, iters: usize) -> Self {
        self.max_tran_iters = iters.max(1);
        self
    }

    /// Apply the iteration limit stored with a schematic, if present.
    pub fn with_view(self, view: &ViewSettings) -> Self {
        match view.dc_max_iters {
            Some(iters) if iters >= 1.0 => self.with_dc_max_iters(iters as usize),
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = SolverConfig::new()
            .with_dc_max_iters(50)
            .with_max_tran_iters(0);
        assert_eq!(config.dc_max_iters, 50);
        assert_eq!(config.max_tran_iters, 1);
        assert_eq!(SolverConfig::default().dc_max_iters, 1000);
    }

    #[test]
    fn test_view_override() {
        let view = ViewSettings {
            dc_max_iters: Some(200.0),
            ..Default::default()
        };
        assert_eq!(SolverConfig::new().with_view(&view).dc_max_iters, 200);
        let empty = ViewSettings::default();
        assert_eq!(SolverConfig::new().with_view(&empty).dc_max_iters, 1000);
    }
}
