//! JSON netlist reader.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{Result, SimError};
use crate::netlist::types::{EntryKind, Netlist, NetlistEntry, ViewSettings};

/// Text form of a scalar JSON value. Numbers keep their JSON spelling so
/// they go through the same number grammar as typed-in strings.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl Netlist {
    /// Build a netlist from parsed JSON.
    pub fn from_value(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| SimError::malformed(0, "netlist must be a JSON array"))?;

        let mut netlist = Netlist::new();
        for (index, item) in items.iter().enumerate() {
            let fields = item
                .as_array()
                .ok_or_else(|| SimError::malformed(index, "entry must be an array"))?;
            let tag = fields
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| SimError::malformed(index, "entry has no type tag"))?;

            if tag == "view" {
                let slots: Vec<Option<String>> = fields.iter().map(scalar_text).collect();
                netlist.view = Some(ViewSettings::from_slots(&slots));
                continue;
            }

            let kind = EntryKind::from_tag(tag);
            if matches!(kind, EntryKind::SavedResults | EntryKind::Wire) {
                continue;
            }
            netlist.entries.push(parse_entry(index, kind, fields)?);
        }

        log::debug!(
            "Parsed netlist with {} entries ({} devices)",
            netlist.entries.len(),
            netlist.devices().count()
        );
        Ok(netlist)
    }
}

fn parse_entry(index: usize, kind: EntryKind, fields: &[Value]) -> Result<NetlistEntry> {
    let coords = match fields.get(1) {
        Some(Value::Array(values)) => values.iter().filter_map(Value::as_f64).collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => return Err(SimError::malformed(index, "coordinates must be an array")),
    };

    let mut properties = HashMap::new();
    match fields.get(2) {
        Some(Value::Object(map)) => {
            for (key, value) in map {
                if let Some(text) = scalar_text(value) {
                    properties.insert(key.clone(), text);
                }
            }
        }
        Some(Value::Null) | None => {}
        Some(_) => return Err(SimError::malformed(index, "properties must be an object")),
    }

    let connections = match fields.get(3) {
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| {
                scalar_text(v)
                    .ok_or_else(|| SimError::malformed(index, "connection must be a node name"))
            })
            .collect::<Result<Vec<_>>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(_) => return Err(SimError::malformed(index, "connections must be an array")),
    };

    let needed = kind.terminal_count();
    if connections.len() < needed {
        return Err(SimError::malformed(
            index,
            format!(
                "expected {} connections, found {}",
                needed,
                connections.len()
            ),
        ));
    }

    Ok(NetlistEntry {
        index,
        kind,
        coords,
        properties,
        connections,
    })
}
