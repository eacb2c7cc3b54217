//! JSON netlist input.
//!
//! The schematic editor hands the simulator a JSON array of entries:
//!
//! ```text
//! netlist = '[' entry { ',' entry } ']'
//! entry   = '[' type ',' coords ',' properties ',' connections [',' is_const] ']'
//!         | '[' "view" ',' origin_x ',' origin_y ',' scale ',' ac_npts ',' ac_fstart
//!               ',' ac_fstop ',' ac_source_name ',' tran_npts ',' tran_tstop
//!               ',' dc_max_iters ']'
//! ```
//!
//! Property values are strings in engineering notation (`"1.5k"`, `"10u"`)
//! or source specifications (`"sin(0,1,1k)"`); bare JSON numbers are
//! accepted as well.
//!
//! # Entry Types
//!
//! | Type | Description | Connections | Properties |
//! |------|-------------|-------------|------------|
//! | r | Resistor | n1 n2 | `r` |
//! | c | Capacitor | n1 n2 | `c` |
//! | l | Inductor | n1 n2 | `l` |
//! | d | Diode | anode cathode | `area`, `type` |
//! | v | Voltage source | n+ n- | `value` |
//! | i | Current source | n+ n- | `value` |
//! | o | Op-amp | in+ in- out gnd | `A` |
//! | n / p | MOSFET | drain gate source | `WL` |
//! | a | Ammeter | n+ n- | |
//! | g | Ground | node | |
//! | s, L, w | Probe, label, wire | | |
//!
//! # Example
//!
//! ```text
//! [["v", [0,0,0], {"name":"V1", "value":"dc(5)"}, ["a", "gnd"]],
//!  ["r", [0,0,0], {"name":"R1", "r":"10"}, ["a", "gnd"]],
//!  ["g", [0,0,0], {}, ["gnd"]]]
//! ```

mod number;
mod parser;
mod types;

pub use number::{parse_number, parse_value};
pub use types::{
    EntryKind, Netlist, NetlistEntry, ViewSettings, DEFAULT_AC_FSTART, DEFAULT_AC_FSTOP,
    DEFAULT_AC_NPTS, DEFAULT_TRAN_NPTS, DEFAULT_TRAN_TSTOP,
};

use crate::error::Result;

/// Parse netlist JSON text.
pub fn parse_netlist(json: &str) -> Result<Netlist> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    Netlist::from_value(&value)
}

/// Parse a netlist from a JSON file.
#[cfg(feature = "cli")]
pub fn parse_file(path: &std::path::Path) -> Result<Netlist> {
    let text = std::fs::read_to_string(path).map_err(|e| crate::error::SimError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_netlist(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    #[test]
    fn test_parse_netlist_text() {
        let json = r#"[["r", [0,0,0], {"name":"R1", "r":"1k"}, ["a", "gnd"]],
                       ["g", [0,0,0], {}, ["gnd"]]]"#;
        let netlist = parse_netlist(json).unwrap();
        assert_eq!(netlist.entries.len(), 2);
        assert_eq!(netlist.entries[0].name(), "R1");
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_netlist("[[\"r\", ").unwrap_err();
        assert!(matches!(err, SimError::Json(_)));
    }
}
