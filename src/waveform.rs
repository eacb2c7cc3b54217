//! Independent source waveforms.
//!
//! A source specification is either a bare number (a DC value) or a
//! function call `name(arg, arg, ...)`. Omitted arguments take defaults.
//!
//! | Function | Arguments (defaults) |
//! |----------|----------------------|
//! | `dc` | v (0) |
//! | `impulse` | height (1), width (1ns) |
//! | `step` | v1 (0), v2 (1), delay (0), rise (1ns) |
//! | `square` | v1 (0), v2 (1), freq (1Hz), duty % (50) |
//! | `triangle` | v1 (0), v2 (1), freq (1Hz) |
//! | `pulse` | v1 (0), v2 (1), delay (0), rise (1ns), fall (1ns), width (1e9s), period (1e9s) |
//! | `sin` | offset (0), amplitude (1), freq (1Hz), delay (0), phase degrees (0) |
//! | `pwl` | t1, v1, t2, v2, ... |
//! | `pwl_repeating` | t1, v1, t2, v2, ... repeated with period of the last time |
//!
//! Every source can be evaluated at any time, reports its DC value
//! (the value at t = 0), its period (0 when not periodic) and the next
//! breakpoint after a given time.

use std::f64::consts::PI;

use crate::error::{Result, SimError};
use crate::netlist::parse_number;

/// Waveform family of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Dc,
    Impulse,
    Step,
    Square,
    Triangle,
    Pulse,
    Sin,
    Pwl,
    PwlRepeating,
}

impl SourceKind {
    /// Look up a waveform by its function name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "dc" => Some(Self::Dc),
            "impulse" => Some(Self::Impulse),
            "step" => Some(Self::Step),
            "square" => Some(Self::Square),
            "triangle" => Some(Self::Triangle),
            "pulse" => Some(Self::Pulse),
            "sin" => Some(Self::Sin),
            "pwl" => Some(Self::Pwl),
            "pwl_repeating" => Some(Self::PwlRepeating),
            _ => None,
        }
    }

    /// Function name as written in a source specification.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dc => "dc",
            Self::Impulse => "impulse",
            Self::Step => "step",
            Self::Square => "square",
            Self::Triangle => "triangle",
            Self::Pulse => "pulse",
            Self::Sin => "sin",
            Self::Pwl => "pwl",
            Self::PwlRepeating => "pwl_repeating",
        }
    }
}

/// Piecewise-linear table of `(time, value)` knots.
#[derive(Debug, Clone)]
struct PwlTable {
    knots: Vec<(f64, f64)>,
    repeat: bool,
    period: f64,
}

impl PwlTable {
    fn new(values: &[f64], repeat: bool) -> Self {
        let knots: Vec<(f64, f64)> = values.chunks_exact(2).map(|p| (p[0], p[1])).collect();
        let period = match (repeat, knots.last()) {
            (true, Some(&(t, _))) => t,
            _ => 0.0,
        };
        Self {
            knots,
            repeat,
            period,
        }
    }

    /// Fold `t` into the first period when repeating.
    fn fold(&self, t: f64) -> f64 {
        if self.repeat && self.period > 0.0 && self.period.is_finite() {
            t - (t / self.period).floor() * self.period
        } else {
            t
        }
    }

    fn value(&self, t: f64) -> f64 {
        match self.knots.as_slice() {
            [] => 0.0,
            [(_, v)] => *v,
            [(t0, v0), rest @ ..] => {
                let t = self.fold(t);
                let (mut last_t, mut last_v) = (*t0, *v0);
                if t > last_t {
                    for &(next_t, next_v) in rest {
                        // Knots that do not advance in time are skipped
                        if next_t > last_t && t < next_t {
                            return last_v + (next_v - last_v) * (t - last_t) / (next_t - last_t);
                        }
                        last_t = next_t;
                        last_v = next_v;
                    }
                }
                last_v
            }
        }
    }

    fn next_breakpoint(&self, t: f64) -> Option<f64> {
        if self.knots.len() < 2 {
            return None;
        }
        let folded = self.fold(t);
        let base = t - folded;
        if let Some(&(knot_t, _)) = self.knots.iter().find(|(kt, _)| folded < *kt) {
            return Some(base + knot_t);
        }
        if self.repeat && self.period > 0.0 && self.period.is_finite() {
            Some(base + self.period + self.knots[0].0)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
enum Shape {
    Constant(f64),
    Pwl(PwlTable),
    Sine {
        offset: f64,
        amplitude: f64,
        freq: f64,
        delay: f64,
        phase: f64,
    },
}

/// A parsed independent source waveform.
#[derive(Debug, Clone)]
pub struct Source {
    kind: SourceKind,
    args: Vec<f64>,
    shape: Shape,
    period: f64,
    dc: f64,
}

impl Source {
    /// A constant source.
    pub fn constant(value: f64) -> Self {
        Self::build(SourceKind::Dc, vec![value], Shape::Constant(value), 0.0)
    }

    fn build(kind: SourceKind, args: Vec<f64>, shape: Shape, period: f64) -> Self {
        let mut source = Self {
            kind,
            args,
            shape,
            period,
            dc: 0.0,
        };
        source.dc = source.value(0.0);
        source
    }

    fn pwl(kind: SourceKind, args: Vec<f64>, knots: &[f64], repeat: bool) -> Self {
        let table = PwlTable::new(knots, repeat);
        let period = table.period;
        Self::build(kind, args, Shape::Pwl(table), period)
    }

    /// Waveform family.
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Arguments after defaults were filled in.
    pub fn args(&self) -> &[f64] {
        &self.args
    }

    /// Repeat period in seconds, 0 when the source is not periodic.
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Value at t = 0, used for DC analysis.
    pub fn dc(&self) -> f64 {
        self.dc
    }

    /// Value at time `t`.
    pub fn value(&self, t: f64) -> f64 {
        match &self.shape {
            Shape::Constant(v) => *v,
            Shape::Pwl(table) => table.value(t),
            Shape::Sine {
                offset,
                amplitude,
                freq,
                delay,
                phase,
            } => {
                if t < *delay {
                    offset + amplitude * (2.0 * PI * phase).sin()
                } else {
                    offset + amplitude * (2.0 * PI * (freq * (t - delay) + phase)).sin()
                }
            }
        }
    }

    /// Next time after `t` where the waveform has a corner.
    pub fn next_discontinuity(&self, t: f64) -> Option<f64> {
        match &self.shape {
            Shape::Constant(_) => None,
            Shape::Pwl(table) => table.next_breakpoint(t),
            Shape::Sine { delay, .. } => (t < *delay).then_some(*delay),
        }
    }
}

/// Parse the argument list between the parentheses. Empty arguments are
/// `None`; anything else must be a number.
fn parse_args(spec: &str, body: &str) -> Result<Vec<Option<f64>>> {
    let mut args = Vec::new();
    let mut rest = body;
    loop {
        rest = rest.trim_start_matches(|c: char| c <= ' ');
        if rest.is_empty() {
            break;
        }
        let (arg, tail) = match rest.find(',') {
            Some(comma) => (&rest[..comma], Some(&rest[comma + 1..])),
            None => (rest, None),
        };
        if arg.trim().is_empty() {
            args.push(None);
        } else {
            let value = parse_number(arg).ok_or_else(|| {
                SimError::invalid_source(spec, format!("argument '{}' is not a number", arg.trim()))
            })?;
            args.push(Some(value));
        }
        match tail {
            Some(tail) => rest = tail,
            None => break,
        }
    }
    Ok(args)
}

/// Parse a source specification such as `"5"`, `"dc(5)"` or
/// `"sin(0,1,1k)"`.
pub fn parse_source(spec: &str) -> Result<Source> {
    let Some(open) = spec.find('(') else {
        let text = spec.trim();
        if text.is_empty() {
            return Ok(Source::constant(0.0));
        }
        let value = parse_number(text)
            .ok_or_else(|| SimError::invalid_source(spec, "value is not a number"))?;
        return Ok(Source::constant(value));
    };

    let function = spec[..open].trim();
    let kind = SourceKind::from_name(function).ok_or_else(|| SimError::UnknownSourceFunction {
        function: function.to_string(),
        spec: spec.to_string(),
    })?;

    let close = spec[open..].find(')').map_or(spec.len(), |i| open + i);
    let raw = parse_args(spec, &spec[open + 1..close])?;
    let arg = |i: usize, default: f64| raw.get(i).copied().flatten().unwrap_or(default);
    let period_of = |freq: f64| if freq == 0.0 { f64::INFINITY } else { 1.0 / freq };

    let source = match kind {
        SourceKind::Dc => Source::constant(arg(0, 0.0)),
        SourceKind::Impulse => {
            let h = arg(0, 1.0);
            let w = arg(1, 1e-9).abs();
            Source::pwl(kind, vec![h, w], &[0.0, 0.0, w / 2.0, h, w, 0.0], false)
        }
        SourceKind::Step => {
            let v1 = arg(0, 0.0);
            let v2 = arg(1, 1.0);
            let td = arg(2, 0.0).max(0.0);
            let tr = arg(3, 1e-9).abs();
            Source::pwl(kind, vec![v1, v2, td, tr], &[td, v1, td + tr, v2], false)
        }
        SourceKind::Square => {
            let v1 = arg(0, 0.0);
            let v2 = arg(1, 1.0);
            let freq = arg(2, 1.0).abs();
            let duty = arg(3, 50.0).abs().min(100.0);
            let per = period_of(freq);
            // 1% of the period for each edge
            let t_change = 0.01 * per;
            let t_pw = 0.01 * duty * 0.98 * per;
            let knots = [
                0.0,
                v1,
                t_change,
                v2,
                t_change + t_pw,
                v2,
                2.0 * t_change + t_pw,
                v1,
                per,
                v1,
            ];
            Source::pwl(kind, vec![v1, v2, freq, duty], &knots, true)
        }
        SourceKind::Triangle => {
            let v1 = arg(0, 0.0);
            let v2 = arg(1, 1.0);
            let freq = arg(2, 1.0).abs();
            let per = period_of(freq);
            Source::pwl(
                kind,
                vec![v1, v2, freq],
                &[0.0, v1, per / 2.0, v2, per, v1],
                true,
            )
        }
        SourceKind::Pwl | SourceKind::PwlRepeating => {
            let values = raw
                .iter()
                .map(|v| v.ok_or_else(|| SimError::invalid_source(spec, "empty breakpoint value")))
                .collect::<Result<Vec<f64>>>()?;
            let mut knots = values.clone();
            if knots.len() % 2 == 1 {
                knots.pop();
            }
            Source::pwl(kind, values, &knots, kind == SourceKind::PwlRepeating)
        }
        SourceKind::Pulse => {
            let v1 = arg(0, 0.0);
            let v2 = arg(1, 1.0);
            let td = arg(2, 0.0).max(0.0);
            let tr = arg(3, 1e-9).abs();
            let tf = arg(4, 1e-9).abs();
            let pw = arg(5, 1e9).abs();
            let per = arg(6, 1e9).abs();
            let t2 = td + tr;
            let t3 = t2 + pw;
            let t4 = t3 + tf;
            Source::pwl(
                kind,
                vec![v1, v2, td, tr, tf, pw, per],
                &[td, v1, t2, v2, t3, v2, t4, v1, per, v1],
                true,
            )
        }
        SourceKind::Sin => {
            let offset = arg(0, 0.0);
            let amplitude = arg(1, 1.0);
            let freq = arg(2, 1.0).abs();
            let delay = arg(3, 0.0).max(0.0);
            let phase = arg(4, 0.0);
            let shape = Shape::Sine {
                offset,
                amplitude,
                freq,
                delay,
                phase: phase / 360.0,
            };
            Source::build(
                kind,
                vec![offset, amplitude, freq, delay, phase],
                shape,
                period_of(freq),
            )
        }
    };

    log::trace!(
        "Parsed source '{}' as {} (dc = {}, period = {})",
        spec,
        source.kind.name(),
        source.dc,
        source.period
    );
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bare_number_is_dc() {
        let src = parse_source("1.5k").unwrap();
        assert_eq!(src.kind(), SourceKind::Dc);
        assert_relative_eq!(src.dc(), 1500.0);
        assert_relative_eq!(src.value(3.0), 1500.0);
        assert_eq!(src.period(), 0.0);
        assert_eq!(src.next_discontinuity(0.0), None);
    }

    #[test]
    fn test_dc_function() {
        let src = parse_source("dc(5)").unwrap();
        assert_relative_eq!(src.dc(), 5.0);
        assert_relative_eq!(src.value(1.0), 5.0);
        assert_relative_eq!(parse_source("dc()").unwrap().dc(), 0.0);
    }

    #[test]
    fn test_step_defaults_and_ramp() {
        let src = parse_source("step(0,,1m)").unwrap();
        assert_eq!(src.args(), &[0.0, 1.0, 1e-3, 1e-9]);
        assert_relative_eq!(src.value(0.5e-3), 0.0);
        assert_relative_eq!(src.value(1e-3 + 0.5e-9), 0.5, epsilon = 1e-9);
        assert_relative_eq!(src.value(1.0), 1.0);
        assert_relative_eq!(src.next_discontinuity(0.0).unwrap(), 1e-3);
        assert_eq!(src.next_discontinuity(1.0), None);
    }

    #[test]
    fn test_impulse_width_argument() {
        let src = parse_source("impulse(2,1u)").unwrap();
        assert_eq!(src.args(), &[2.0, 1e-6]);
        assert_relative_eq!(src.value(0.5e-6), 2.0);
        assert_relative_eq!(src.value(2e-6), 0.0);
    }

    #[test]
    fn test_square_wave() {
        let src = parse_source("square(0,5,1k)").unwrap();
        assert_relative_eq!(src.period(), 1e-3);
        assert_relative_eq!(src.value(0.25e-3), 5.0);
        assert_relative_eq!(src.value(0.75e-3), 0.0);
        // Repeats in the next period
        assert_relative_eq!(src.value(1.25e-3), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_triangle_wave() {
        let src = parse_source("triangle(-1,1,1)").unwrap();
        assert_relative_eq!(src.value(0.0), -1.0);
        assert_relative_eq!(src.value(0.25), 0.0);
        assert_relative_eq!(src.value(0.5), 1.0);
        assert_relative_eq!(src.value(1.25), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pulse_breakpoints() {
        let src = parse_source("pulse(0,1,1u,1n,1n,1u,4u)").unwrap();
        assert_relative_eq!(src.period(), 4e-6);
        assert_relative_eq!(src.value(1.5e-6), 1.0);
        assert_relative_eq!(src.value(3.5e-6), 0.0);
        assert_relative_eq!(src.next_discontinuity(0.0).unwrap(), 1e-6);
        // Breakpoints in later periods are reported in absolute time
        let next = src.next_discontinuity(4.5e-6).unwrap();
        assert_relative_eq!(next, 5e-6, epsilon = 1e-15);
    }

    #[test]
    fn test_sin_source() {
        let src = parse_source("sin(1,2,50,10m,90)").unwrap();
        assert_relative_eq!(src.period(), 0.02);
        // Before the delay the phase offset holds
        assert_relative_eq!(src.value(0.0), 3.0);
        assert_relative_eq!(src.dc(), 3.0);
        assert_relative_eq!(src.value(0.01 + 0.005), 1.0, epsilon = 1e-9);
        assert_relative_eq!(src.next_discontinuity(0.0).unwrap(), 0.01);
        assert_eq!(src.next_discontinuity(0.02), None);
    }

    #[test]
    fn test_pwl_sources() {
        let src = parse_source("pwl(0,0,1,2,2,0)").unwrap();
        assert_relative_eq!(src.value(0.5), 1.0);
        assert_relative_eq!(src.value(5.0), 0.0);
        assert_eq!(src.period(), 0.0);

        let rep = parse_source("pwl_repeating(0,0,1,2,2,0)").unwrap();
        assert_relative_eq!(rep.period(), 2.0);
        assert_relative_eq!(rep.value(2.5), 1.0);

        // A trailing unpaired value is dropped
        let odd = parse_source("pwl(0,1,1,3,7)").unwrap();
        assert_relative_eq!(odd.value(0.5), 2.0);

        let single = parse_source("pwl(0,4)").unwrap();
        assert_relative_eq!(single.value(10.0), 4.0);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_source("cosine(1)"),
            Err(SimError::UnknownSourceFunction { .. })
        ));
        assert!(matches!(
            parse_source("sin(0,abc)"),
            Err(SimError::InvalidSource { .. })
        ));
        assert!(matches!(parse_source("volts"), Err(SimError::InvalidSource { .. })));
    }
}
