//! Analysis results.
//!
//! Each result serializes to the flat name-keyed dictionary the schematic
//! layer consumes: node names map to values or series, voltage source
//! branch currents appear as `I(name)`, AC phases as `name_phase`, and the
//! sweep axis as `_frequencies_` or `_time_`.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Key of the frequency axis in a serialized AC result.
pub const FREQUENCIES_KEY: &str = "_frequencies_";

/// Key of the time axis in a serialized transient result.
pub const TIME_KEY: &str = "_time_";

/// Result key for the branch current of a voltage source.
pub(crate) fn current_key(source: &str) -> String {
    format!("I({})", source)
}

/// DC operating point.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct DcResult {
    /// Node voltages and `I(name)` branch currents
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
    /// Newton iterations used
    #[serde(skip)]
    pub iterations: usize,
}

impl DcResult {
    /// Voltage of a named node.
    pub fn voltage(&self, node: &str) -> Option<f64> {
        self.values.get(node).copied()
    }

    /// Branch current of a named voltage source.
    pub fn current(&self, source: &str) -> Option<f64> {
        self.values.get(&current_key(source)).copied()
    }
}

/// Small-signal frequency response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcResult {
    /// Swept frequencies (Hz)
    pub frequencies: Vec<f64>,
    /// Response magnitude per node
    pub magnitude: BTreeMap<String, Vec<f64>>,
    /// Unwrapped response phase per node (degrees)
    pub phase: BTreeMap<String, Vec<f64>>,
}

impl AcResult {
    pub fn magnitude(&self, node: &str) -> Option<&[f64]> {
        self.magnitude.get(node).map(Vec::as_slice)
    }

    pub fn phase(&self, node: &str) -> Option<&[f64]> {
        self.phase.get(node).map(Vec::as_slice)
    }

    /// Magnitude in dB at each requested frequency, interpolated on a
    /// log10 frequency axis. Frequencies outside the sweep give `None`.
    pub fn sample_db(&self, node: &str, freqs: &[f64]) -> Option<Vec<Option<f64>>> {
        let mags = self.magnitude.get(node)?;
        let log_f: Vec<f64> = self.frequencies.iter().map(|f| f.log10()).collect();
        let db: Vec<f64> = mags.iter().map(|m| 20.0 * m.log10()).collect();
        Some(freqs.iter().map(|f| interpolate(f.log10(), &log_f, &db)).collect())
    }
}

impl Serialize for AcResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 * self.magnitude.len() + 1))?;
        for (name, mags) in &self.magnitude {
            map.serialize_entry(name, mags)?;
        }
        for (name, phases) in &self.phase {
            map.serialize_entry(&format!("{}_phase", name), phases)?;
        }
        map.serialize_entry(FREQUENCIES_KEY, &self.frequencies)?;
        map.end()
    }
}

/// Time-domain response.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct TranResult {
    /// Accepted time points
    #[serde(rename = "_time_")]
    pub times: Vec<f64>,
    /// Node voltages and `I(name)` branch currents, aligned with `times`
    #[serde(flatten)]
    pub series: BTreeMap<String, Vec<f64>>,
}

impl TranResult {
    /// Series for a node or `I(name)` key.
    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.series.get(key).map(Vec::as_slice)
    }

    /// Value at time `t` by linear interpolation.
    pub fn value_at(&self, key: &str, t: f64) -> Option<f64> {
        interpolate(t, &self.times, self.series.get(key)?)
    }

    /// Values at each requested time. Times past the last sample give
    /// `None`.
    pub fn sample(&self, key: &str, times: &[f64]) -> Option<Vec<Option<f64>>> {
        let values = self.series.get(key)?;
        Some(times.iter().map(|&t| interpolate(t, &self.times, values)).collect())
    }
}

/// Linearly interpolate `ys` over ascending `xs` at `x`.
///
/// Points before the first sample take the first value. Points at or past
/// the last sample give `None`, except an exact hit on it.
pub fn interpolate(x: f64, xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n == 0 || x.is_nan() {
        return None;
    }
    if x < xs[0] {
        return Some(ys[0]);
    }
    if x == xs[n - 1] {
        return Some(ys[n - 1]);
    }
    let i = xs[..n].iter().position(|&xi| x < xi)?;
    let (x1, x2) = (xs[i - 1], xs[i]);
    let (y1, y2) = (ys[i - 1], ys[i]);
    if x == x1 {
        return Some(y1);
    }
    Some(y1 + (x - x1) * (y2 - y1) / (x2 - x1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interpolate() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [0.0, 10.0, 30.0];
        assert_eq!(interpolate(-1.0, &xs, &ys), Some(0.0));
        assert_eq!(interpolate(0.5, &xs, &ys), Some(5.0));
        assert_eq!(interpolate(1.0, &xs, &ys), Some(10.0));
        assert_eq!(interpolate(1.5, &xs, &ys), Some(20.0));
        assert_eq!(interpolate(2.0, &xs, &ys), Some(30.0));
        assert_eq!(interpolate(2.5, &xs, &ys), None);
        assert_eq!(interpolate(0.5, &[], &[]), None);
    }

    #[test]
    fn test_dc_serializes_flat() {
        let mut result = DcResult::default();
        result.values.insert("out".into(), 2.5);
        result.values.insert(current_key("V1"), -0.25);
        result.iterations = 3;
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"out": 2.5, "I(V1)": -0.25}));
        assert_eq!(result.current("V1"), Some(-0.25));
        assert_eq!(result.voltage("missing"), None);
    }

    #[test]
    fn test_ac_serializes_phase_keys() {
        let mut result = AcResult {
            frequencies: vec![1.0, 10.0],
            ..Default::default()
        };
        result.magnitude.insert("out".into(), vec![1.0, 0.1]);
        result.phase.insert("out".into(), vec![0.0, -45.0]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["out"], serde_json::json!([1.0, 0.1]));
        assert_eq!(json["out_phase"], serde_json::json!([0.0, -45.0]));
        assert_eq!(json[FREQUENCIES_KEY], serde_json::json!([1.0, 10.0]));
    }

    #[test]
    fn test_ac_sample_db() {
        let mut result = AcResult {
            frequencies: vec![1.0, 100.0],
            ..Default::default()
        };
        result.magnitude.insert("out".into(), vec![1.0, 0.01]);
        let db = result.sample_db("out", &[10.0, 1000.0]).unwrap();
        assert_relative_eq!(db[0].unwrap(), -20.0, epsilon = 1e-9);
        assert_eq!(db[1], None);
        assert!(result.sample_db("nope", &[1.0]).is_none());
    }

    #[test]
    fn test_tran_sample() {
        let mut result = TranResult {
            times: vec![0.0, 1.0, 2.0],
            ..Default::default()
        };
        result.series.insert("a".into(), vec![0.0, 1.0, 0.0]);
        let samples = result.sample("a", &[0.5, 1.5, 3.0]).unwrap();
        assert_eq!(samples, vec![Some(0.5), Some(0.5), None]);
        assert_eq!(result.value_at("a", 1.0), Some(1.0));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json[TIME_KEY], serde_json::json!([0.0, 1.0, 2.0]));
        assert_eq!(json["a"], serde_json::json!([0.0, 1.0, 0.0]));
    }
}
