//! Netlist entry types.

use std::collections::HashMap;

use crate::netlist::number::parse_number;

/// AC points per decade when the view gives none.
pub const DEFAULT_AC_NPTS: usize = 50;

/// AC start frequency when the view gives none (Hz).
pub const DEFAULT_AC_FSTART: f64 = 10.0;

/// AC stop frequency when the view gives none (Hz).
pub const DEFAULT_AC_FSTOP: f64 = 1e9;

/// Transient points per period when the view gives none.
pub const DEFAULT_TRAN_NPTS: usize = 100;

/// Transient stop time when the view gives none (s).
pub const DEFAULT_TRAN_TSTOP: f64 = 0.01;

/// A complete netlist as produced by the schematic editor.
#[derive(Debug, Clone, Default)]
pub struct Netlist {
    /// Component entries in netlist order
    pub entries: Vec<NetlistEntry>,
    /// Analysis settings from the `view` entry, if any
    pub view: Option<ViewSettings>,
}

impl Netlist {
    /// Create a new empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries that become devices in the circuit.
    pub fn devices(&self) -> impl Iterator<Item = &NetlistEntry> {
        self.entries.iter().filter(|e| e.kind.is_device())
    }
}

/// One `[type, coords, properties, connections]` entry.
#[derive(Debug, Clone)]
pub struct NetlistEntry {
    /// Position in the JSON array, used for naming and error reporting
    pub index: usize,
    /// Component kind from the type tag
    pub kind: EntryKind,
    /// Schematic coordinates `[x, y, rotation]`
    pub coords: Vec<f64>,
    /// Named properties, numeric values kept as text
    pub properties: HashMap<String, String>,
    /// Connected node names in terminal order
    pub connections: Vec<String>,
}

impl NetlistEntry {
    /// Look up a property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The device name, or `_<index>` when the entry is unnamed.
    pub fn name(&self) -> String {
        match self.property("name") {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("_{}", self.index),
        }
    }
}

/// Component kinds recognized in a netlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// `r`
    Resistor,
    /// `c`
    Capacitor,
    /// `l`
    Inductor,
    /// `d`
    Diode,
    /// `v`
    VoltageSource,
    /// `i`
    CurrentSource,
    /// `o`
    OpAmp,
    /// `n`
    NFet,
    /// `p`
    PFet,
    /// `a`, a zero-volt source whose branch current is reported
    Ammeter,
    /// `g`, ties its connection to ground
    Ground,
    /// `w`
    Wire,
    /// `s`
    Probe,
    /// `L`
    Label,
    /// `dc`, `ac` or `transient` results saved with the schematic
    SavedResults,
    /// Anything else
    Unknown(String),
}

impl EntryKind {
    /// Map a netlist type tag to its kind.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "r" => Self::Resistor,
            "c" => Self::Capacitor,
            "l" => Self::Inductor,
            "d" => Self::Diode,
            "v" => Self::VoltageSource,
            "i" => Self::CurrentSource,
            "o" => Self::OpAmp,
            "n" => Self::NFet,
            "p" => Self::PFet,
            "a" => Self::Ammeter,
            "g" => Self::Ground,
            "w" => Self::Wire,
            "s" => Self::Probe,
            "L" => Self::Label,
            "dc" | "ac" | "transient" => Self::SavedResults,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Number of connections the device needs.
    pub fn terminal_count(&self) -> usize {
        match self {
            Self::OpAmp => 4,
            Self::NFet | Self::PFet => 3,
            Self::Ground | Self::Probe | Self::Label => 1,
            Self::Wire | Self::SavedResults | Self::Unknown(_) => 0,
            _ => 2,
        }
    }

    /// True for kinds that stamp into the MNA system.
    pub fn is_device(&self) -> bool {
        !matches!(
            self,
            Self::Ground
                | Self::Wire
                | Self::Probe
                | Self::Label
                | Self::SavedResults
                | Self::Unknown(_)
        )
    }
}

/// Analysis parameters stored in the `view` entry.
///
/// Layout: `["view", origin_x, origin_y, scale, ac_npts, ac_fstart,
/// ac_fstop, ac_source_name, tran_npts, tran_tstop, dc_max_iters]`.
/// Fields that are absent or not numeric are left as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewSettings {
    /// AC points per decade
    pub ac_npts: Option<f64>,
    /// AC start frequency (Hz)
    pub ac_fstart: Option<f64>,
    /// AC stop frequency (Hz)
    pub ac_fstop: Option<f64>,
    /// Name of the AC excitation source
    pub ac_source_name: Option<String>,
    /// Minimum transient points per period
    pub tran_npts: Option<f64>,
    /// Transient stop time (s)
    pub tran_tstop: Option<f64>,
    /// DC Newton iteration limit
    pub dc_max_iters: Option<f64>,
}

impl ViewSettings {
    /// Build settings from the raw text of each `view` slot.
    pub fn from_slots(slots: &[Option<String>]) -> Self {
        let text = |i: usize| slots.get(i).cloned().flatten();
        let number = |i: usize| text(i).as_deref().and_then(parse_number);
        Self {
            ac_npts: number(4),
            ac_fstart: number(5),
            ac_fstop: number(6),
            ac_source_name: text(7).filter(|s| !s.is_empty()),
            tran_npts: number(8),
            tran_tstop: number(9),
            dc_max_iters: number(10),
        }
    }

    /// AC points per decade, start and stop frequency, falling back to
    /// the editor's defaults.
    pub fn ac_sweep(&self) -> (usize, f64, f64) {
        (
            self.ac_npts.map_or(DEFAULT_AC_NPTS, |n| n.max(1.0) as usize),
            self.ac_fstart.unwrap_or(DEFAULT_AC_FSTART),
            self.ac_fstop.unwrap_or(DEFAULT_AC_FSTOP),
        )
    }

    /// Transient minimum points and stop time, falling back to the
    /// editor's defaults.
    pub fn tran_window(&self) -> (usize, f64) {
        (
            self.tran_npts.map_or(DEFAULT_TRAN_NPTS, |n| n.max(1.0) as usize),
            self.tran_tstop.unwrap_or(DEFAULT_TRAN_TSTOP),
        )
    }
}
