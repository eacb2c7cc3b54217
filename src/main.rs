//! Cktsim - Analog Circuit Simulator
//!
//! Runs one analysis on a circuit sandbox netlist and prints the result
//! dictionary as JSON.
//!
//! # Usage
//!
//! ```bash
//! cktsim divider.json dc
//! cktsim filter.json ac --npts 20 --fstart 10 --fstop 100k --source VIN
//! cktsim rc.json tran --tstop 5m --probe out
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use cktsim_core::{
    circuit::Circuit,
    error::{Result, SimError},
    netlist::{self, ViewSettings},
    parse_number,
};

/// Analysis to run
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Analysis {
    /// DC operating point
    Dc,
    /// Small-signal frequency sweep
    Ac,
    /// Time-domain simulation
    Tran,
}

/// Analog circuit simulator for circuit sandbox netlists
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the netlist file (.json)
    #[arg(value_name = "NETLIST_FILE")]
    netlist_file: PathBuf,

    /// Analysis to run
    #[arg(value_enum)]
    analysis: Analysis,

    /// AC points per decade, or transient minimum points per period
    #[arg(long)]
    npts: Option<usize>,

    /// AC start frequency in Hz (engineering notation allowed)
    #[arg(long, value_parser = parse_engineering)]
    fstart: Option<f64>,

    /// AC stop frequency in Hz
    #[arg(long, value_parser = parse_engineering)]
    fstop: Option<f64>,

    /// Name of the AC excitation source
    #[arg(long)]
    source: Option<String>,

    /// Transient start time in seconds
    #[arg(long, value_parser = parse_engineering, default_value = "0")]
    tstart: f64,

    /// Transient stop time in seconds
    #[arg(long, value_parser = parse_engineering)]
    tstop: Option<f64>,

    /// Node whose accuracy drives transient step control (repeatable)
    #[arg(long = "probe", value_name = "NODE")]
    probes: Vec<String>,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,
}

fn parse_engineering(text: &str) -> std::result::Result<f64, String> {
    parse_number(text).ok_or_else(|| format!("'{}' is not a number", text))
}

/// Send library logs to stderr. Warnings such as the transient DC fallback
/// show by default; `RUST_LOG` overrides the filter.
fn init_logger() {
    let env = env_logger::Env::default().default_filter_or("warn");
    // A second call keeps the logger already installed
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}

fn main() -> Result<()> {
    init_logger();

    let args = Args::parse();

    // Parse the netlist file
    let netlist = netlist::parse_file(&args.netlist_file)?;
    let view = netlist.view.clone().unwrap_or_default();

    // Build the circuit
    let mut circuit = Circuit::from_netlist(&netlist)?;

    let output = match args.analysis {
        Analysis::Dc => to_json(&circuit.dc()?, args.pretty)?,
        Analysis::Ac => {
            let (npts, fstart, fstop) = ac_settings(&args, &view);
            let source = args
                .source
                .clone()
                .or_else(|| view.ac_source_name.clone())
                .ok_or_else(|| SimError::invalid_param("AC analysis needs --source"))?;
            to_json(&circuit.ac(npts, fstart, fstop, &source)?, args.pretty)?
        }
        Analysis::Tran => {
            let (npts, tstop) = view.tran_window();
            let npts = args.npts.unwrap_or(npts);
            let tstop = args.tstop.unwrap_or(tstop);
            let result = circuit.tran(npts, args.tstart, tstop, args.probes.as_slice(), false)?;
            to_json(&result, args.pretty)?
        }
    };

    println!("{}", output);
    Ok(())
}

fn ac_settings(args: &Args, view: &ViewSettings) -> (usize, f64, f64) {
    let (npts, fstart, fstop) = view.ac_sweep();
    (
        args.npts.unwrap_or(npts),
        args.fstart.unwrap_or(fstart),
        args.fstop.unwrap_or(fstop),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_shows_warnings() {
        init_logger();
        init_logger();
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(log::log_enabled!(log::Level::Warn));
            assert!(!log::log_enabled!(log::Level::Info));
        }
    }

    #[test]
    fn test_parse_engineering() {
        assert_eq!(parse_engineering("100k"), Ok(100e3));
        assert!(parse_engineering("fast").is_err());
    }
}
