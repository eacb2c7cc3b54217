//! Circuit assembly: node numbering, device construction and finalization.

use std::collections::HashMap;

use crate::components::{
    Capacitor, Channel, CurrentSource, Device, Diode, DiodeKind, Inductor, Mosfet, OpAmp, Resistor,
    Stamp, VoltageSource,
};
use crate::error::{Result, SimError};
use crate::netlist::{parse_netlist, parse_value, EntryKind, Netlist, NetlistEntry};
use crate::solver::{MnaState, SolverConfig};
use crate::waveform::{parse_source, Source};

use super::types::{Node, UnknownKind};
use super::validate::check_voltage_source_loops;

/// Default diode area when the netlist gives none.
const DEFAULT_DIODE_AREA: f64 = 1.0;

/// Default op-amp open-loop gain.
const DEFAULT_OPAMP_GAIN: f64 = 30000.0;

/// Default MOSFET W/L.
const DEFAULT_FET_RATIO: f64 = 2.0;

/// A circuit ready for analysis.
///
/// Nodes are numbered in the order they are first seen. Once any analysis
/// runs, the circuit is finalized: the linear stamps are loaded and the
/// voltage sources checked for loops. Adding devices afterwards discards
/// the finalized system. One analysis may run on a circuit at a time.
#[derive(Debug, Clone)]
pub struct Circuit {
    /// Node names to unknown indices, `None` for ground
    pub(crate) node_map: HashMap<String, Node>,
    /// Kind of each unknown
    pub(crate) kinds: Vec<UnknownKind>,
    /// All devices in insertion order
    pub(crate) devices: Vec<Device>,
    /// Device names to positions in `devices`
    pub(crate) device_map: HashMap<String, usize>,
    /// Positions of voltage sources (including ammeters)
    pub(crate) voltage_sources: Vec<usize>,
    /// Positions of current sources
    pub(crate) current_sources: Vec<usize>,
    pub(crate) config: SolverConfig,
    /// Assembled system, present once finalized
    pub(crate) state: Option<MnaState>,
    /// Whether `solution` holds a DC operating point
    pub(crate) did_dc: bool,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    /// Create an empty circuit with the default solver configuration.
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    /// Create an empty circuit with a custom solver configuration.
    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            node_map: HashMap::new(),
            kinds: Vec::new(),
            devices: Vec::new(),
            device_map: HashMap::new(),
            voltage_sources: Vec::new(),
            current_sources: Vec::new(),
            config,
            state: None,
            did_dc: false,
        }
    }

    /// Build a circuit from a parsed netlist.
    ///
    /// The iteration limit stored in the netlist's `view` entry, if any,
    /// overrides the default DC limit.
    pub fn from_netlist(netlist: &Netlist) -> Result<Self> {
        let config = match &netlist.view {
            Some(view) => SolverConfig::default().with_view(view),
            None => SolverConfig::default(),
        };
        let mut circuit = Self::with_config(config);
        circuit.load_netlist(netlist)?;
        Ok(circuit)
    }

    /// Parse netlist JSON and build a circuit from it.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_netlist(&parse_netlist(json)?)
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
    }

    fn invalidate(&mut self) {
        self.state = None;
        self.did_dc = false;
    }

    /// Allocate a new unknown, optionally naming it.
    pub fn node(&mut self, name: Option<&str>, kind: UnknownKind) -> usize {
        let index = self.kinds.len();
        self.kinds.push(kind);
        if let Some(name) = name {
            self.node_map.insert(name.to_string(), Some(index));
        }
        self.invalidate();
        index
    }

    /// Tie a node name to ground.
    pub fn connect_ground(&mut self, name: &str) {
        self.node_map.insert(name.to_string(), None);
    }

    /// Look up a node by name, allocating a voltage unknown if unseen.
    pub fn voltage_node(&mut self, name: &str) -> Node {
        match self.node_map.get(name) {
            Some(&node) => node,
            None => Some(self.node(Some(name), UnknownKind::Voltage)),
        }
    }

    fn add_device(&mut self, device: Device) -> usize {
        let index = self.devices.len();
        let name = device.name().to_string();
        if self.device_map.insert(name.clone(), index).is_some() {
            log::warn!("Duplicate device name '{}', the later device wins", name);
        }
        match device {
            Device::VoltageSource(_) => self.voltage_sources.push(index),
            Device::CurrentSource(_) => self.current_sources.push(index),
            _ => {}
        }
        self.devices.push(device);
        self.invalidate();
        index
    }

    /// Add a resistor. A zero resistance becomes a 0 V source.
    pub fn add_resistor(&mut self, n1: Node, n2: Node, resistance: f64, name: &str) -> Result<usize> {
        if !resistance.is_finite() {
            return Err(SimError::invalid_component(name, "resistance must be finite"));
        }
        if resistance == 0.0 {
            return Ok(self.add_voltage_source(n1, n2, Source::constant(0.0), name));
        }
        Ok(self.add_device(Device::Resistor(Resistor::new(name.to_string(), [n1, n2], resistance))))
    }

    /// Add a capacitor.
    pub fn add_capacitor(&mut self, n1: Node, n2: Node, capacitance: f64, name: &str) -> usize {
        self.add_device(Device::Capacitor(Capacitor::new(name.to_string(), [n1, n2], capacitance)))
    }

    /// Add an inductor with its own branch current unknown.
    pub fn add_inductor(&mut self, n1: Node, n2: Node, inductance: f64, name: &str) -> usize {
        let branch = self.node(None, UnknownKind::Current);
        self.add_device(Device::Inductor(Inductor::new(
            name.to_string(),
            [n1, n2],
            inductance,
            branch,
        )))
    }

    /// Add a diode. Zero-area diodes are dropped and return `None`.
    pub fn add_diode(&mut self, anode: Node, cathode: Node, area: f64, kind: DiodeKind, name: &str) -> Option<usize> {
        if area == 0.0 {
            log::debug!("Dropping zero-area diode '{}'", name);
            return None;
        }
        Some(self.add_device(Device::Diode(Diode::new(
            name.to_string(),
            [anode, cathode],
            area,
            kind,
        ))))
    }

    /// Add an independent voltage source with its own branch current unknown.
    pub fn add_voltage_source(&mut self, npos: Node, nneg: Node, source: Source, name: &str) -> usize {
        let branch = self.node(None, UnknownKind::Current);
        self.add_device(Device::VoltageSource(VoltageSource::new(
            name.to_string(),
            [npos, nneg],
            branch,
            source,
        )))
    }

    /// Add an independent current source.
    pub fn add_current_source(&mut self, npos: Node, nneg: Node, source: Source, name: &str) -> usize {
        self.add_device(Device::CurrentSource(CurrentSource::new(
            name.to_string(),
            [npos, nneg],
            source,
        )))
    }

    /// Add an ammeter: a 0 V source whose branch current is reported.
    pub fn add_ammeter(&mut self, npos: Node, nneg: Node, name: &str) -> usize {
        self.add_voltage_source(npos, nneg, Source::constant(0.0), name)
    }

    /// Add an op-amp with pins `[in+, in-, out, gnd]`.
    pub fn add_opamp(&mut self, np: Node, nn: Node, no: Node, ng: Node, gain: f64, name: &str) -> Result<usize> {
        if gain == 0.0 || !gain.is_finite() {
            return Err(SimError::invalid_component(name, "op-amp gain must be finite and nonzero"));
        }
        let branch = self.node(None, UnknownKind::Current);
        Ok(self.add_device(Device::OpAmp(OpAmp::new(
            name.to_string(),
            [np, nn, no, ng],
            gain,
            branch,
        ))))
    }

    /// Add a MOSFET with pins `[drain, gate, source]`.
    pub fn add_mosfet(&mut self, d: Node, g: Node, s: Node, channel: Channel, ratio: f64, name: &str) -> usize {
        self.add_device(Device::Mosfet(Mosfet::new(
            name.to_string(),
            [d, g, s],
            channel,
            ratio,
        )))
    }

    /// Add every device in a netlist.
    ///
    /// Ground entries are resolved first so any net touching one maps to
    /// ground. Fails with [`SimError::MissingGround`] when no device
    /// connects to ground.
    pub fn load_netlist(&mut self, netlist: &Netlist) -> Result<()> {
        for entry in &netlist.entries {
            if entry.kind == EntryKind::Ground {
                if let Some(name) = entry.connections.first() {
                    self.connect_ground(name);
                }
            }
        }

        let mut found_ground = false;
        for entry in &netlist.entries {
            if let EntryKind::Unknown(tag) = &entry.kind {
                log::warn!("Skipping entry {} with unknown type '{}'", entry.index, tag);
                continue;
            }
            if !entry.kind.is_device() {
                continue;
            }
            let nodes: Vec<Node> = entry
                .connections
                .iter()
                .map(|name| self.voltage_node(name))
                .collect();
            if nodes.iter().any(Option::is_none) {
                found_ground = true;
            }
            self.add_entry(entry, &nodes)?;
        }

        if !found_ground {
            return Err(SimError::MissingGround);
        }
        log::info!(
            "Loaded circuit: {} devices, {} unknowns",
            self.devices.len(),
            self.kinds.len()
        );
        Ok(())
    }

    fn add_entry(&mut self, entry: &NetlistEntry, nodes: &[Node]) -> Result<()> {
        let name = entry.name();
        let required = |key: &str| {
            entry.property(key).ok_or_else(|| SimError::MissingProperty {
                component: name.clone(),
                property: key.to_string(),
            })
        };
        let number = |key: &str, default: Option<f64>| -> Result<f64> {
            match (entry.property(key), default) {
                (Some(text), _) => parse_value(text, &format!("{} of {}", key, name)),
                (None, Some(value)) => Ok(value),
                (None, None) => Err(SimError::MissingProperty {
                    component: name.clone(),
                    property: key.to_string(),
                }),
            }
        };

        match entry.kind {
            EntryKind::Resistor => {
                let r = number("r", None)?;
                self.add_resistor(nodes[0], nodes[1], r, &name)?;
            }
            EntryKind::Capacitor => {
                let c = number("c", None)?;
                self.add_capacitor(nodes[0], nodes[1], c, &name);
            }
            EntryKind::Inductor => {
                let l = number("l", None)?;
                self.add_inductor(nodes[0], nodes[1], l, &name);
            }
            EntryKind::Diode => {
                let area = number("area", Some(DEFAULT_DIODE_AREA))?;
                let kind = entry.property("type").map(DiodeKind::from_name).unwrap_or_default();
                self.add_diode(nodes[0], nodes[1], area, kind, &name);
            }
            EntryKind::VoltageSource => {
                let source = parse_source(required("value")?)?;
                self.add_voltage_source(nodes[0], nodes[1], source, &name);
            }
            EntryKind::CurrentSource => {
                let source = parse_source(required("value")?)?;
                self.add_current_source(nodes[0], nodes[1], source, &name);
            }
            EntryKind::OpAmp => {
                let gain = number("A", Some(DEFAULT_OPAMP_GAIN))?;
                self.add_opamp(nodes[0], nodes[1], nodes[2], nodes[3], gain, &name)?;
            }
            EntryKind::NFet | EntryKind::PFet => {
                let ratio = number("WL", Some(DEFAULT_FET_RATIO))?;
                let channel = if entry.kind == EntryKind::NFet {
                    Channel::N
                } else {
                    Channel::P
                };
                self.add_mosfet(nodes[0], nodes[1], nodes[2], channel, ratio, &name);
            }
            EntryKind::Ammeter => {
                self.add_ammeter(nodes[0], nodes[1], &name);
            }
            _ => {}
        }
        Ok(())
    }

    /// Allocate the system matrices, load the linear stamps and check the
    /// voltage sources for loops. Does nothing if already finalized.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }
        let mut state = MnaState::new(&self.kinds);
        for device in &self.devices {
            device.load_linear(&mut state.system);
        }
        check_voltage_source_loops(&state.system, &self.source_branches())?;

        log::debug!(
            "Finalized circuit with {} unknowns ({} voltage sources)",
            state.size(),
            self.voltage_sources.len()
        );
        self.state = Some(state);
        Ok(())
    }

    /// Finalize if needed and hand out the devices with the system.
    pub(crate) fn prepare(&mut self) -> Result<(&[Device], &mut MnaState)> {
        self.finalize()?;
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| SimError::invalid_param("circuit has no assembled system"))?;
        Ok((&self.devices, state))
    }

    /// Drop the finalized system so the next analysis starts from zero.
    pub fn reset(&mut self) {
        self.invalidate();
    }

    pub fn is_finalized(&self) -> bool {
        self.state.is_some()
    }

    /// Number of unknowns.
    pub fn size(&self) -> usize {
        self.kinds.len()
    }

    /// Unknown index of a named node: `Some(None)` for ground, `None` when
    /// the name is unknown.
    pub fn node_index(&self, name: &str) -> Option<Node> {
        self.node_map.get(name).copied()
    }

    /// Look up a device by name.
    pub fn device(&self, name: &str) -> Option<&Device> {
        self.device_map.get(name).map(|&i| &self.devices[i])
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Current solution vector, once finalized.
    pub fn solution(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.solution.as_slice())
    }

    /// Named nodes with their unknown indices.
    pub(crate) fn named_nodes(&self) -> impl Iterator<Item = (&str, Node)> {
        self.node_map.iter().map(|(name, &node)| (name.as_str(), node))
    }

    /// Voltage sources by name with their branch current unknowns.
    pub(crate) fn named_source_branches(&self) -> impl Iterator<Item = (&str, usize)> {
        self.voltage_sources.iter().filter_map(|&i| match &self.devices[i] {
            Device::VoltageSource(v) => Some((v.name.as_str(), v.branch)),
            _ => None,
        })
    }

    fn source_branches(&self) -> Vec<usize> {
        self.named_source_branches().map(|(_, br)| br).collect()
    }
}
