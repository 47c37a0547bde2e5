mod error;

use clap::{Parser, Subcommand};
use error::{CliError, CliResult};
use mf_core::units::{as_kelvin, as_lpm};
use mf_gas::{
    Amount, Composition, ConversionFactors, RawComposition, SweepSpec, SweepValues, UnitRegistry,
    generate,
};
use mf_project::{Config, LineSelection, Setup};
use mf_solver::{MixtureRequest, ResolutionResult, balance_target, resolve_mixture};
use std::path::{Path, PathBuf};
use tracing::{Level, info, warn};

#[derive(Parser)]
#[command(name = "mf-cli")]
#[command(about = "mixflow CLI - gas mixture setpoints for mass-flow controllers", long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and build a configuration file
    Validate {
        /// Path to the YAML or JSON configuration
        config: PathBuf,
    },
    /// List the gas lines of a configuration
    Lines {
        /// Path to the YAML or JSON configuration
        config: PathBuf,
    },
    /// Resolve a composition such as "NH3=1%, He=*"
    Resolve {
        /// Composition text
        composition: String,
    },
    /// Compute line flows and setpoints for a target mixture
    Mix {
        /// Path to the YAML or JSON configuration
        config: PathBuf,
        /// Target composition, e.g. "NH3=1000ppm, O2=10%, N2=*"
        composition: String,
        /// Total flow
        #[arg(long, default_value = "1L/min")]
        flow: String,
        /// Operating temperature (defaults to each calibration's reference)
        #[arg(long)]
        temperature: Option<String>,
        /// Comma-separated line names (default: all lines)
        #[arg(long, default_value = "")]
        lines: String,
    },
    /// Setpoints for a sweep of one gas fraction
    Sweep {
        /// Path to the YAML or JSON configuration
        config: PathBuf,
        /// Base composition; its balance gas absorbs the swept fraction
        #[arg(long)]
        base: String,
        /// Swept gas
        #[arg(long)]
        gas: String,
        /// First fraction (e.g. 0, 0.5%, 100ppm)
        #[arg(long)]
        start: String,
        /// Last fraction, inclusive
        #[arg(long)]
        stop: String,
        /// Fraction step
        #[arg(long)]
        step: String,
        /// Total flow
        #[arg(long, default_value = "1L/min")]
        flow: String,
        /// Comma-separated line names (default: all lines)
        #[arg(long, default_value = "")]
        lines: String,
    },
}

fn main() -> CliResult<()> {
    let Cli { log_level, command } = Cli::parse();
    let flag = log_level.as_deref();
    let units = UnitRegistry::standard();

    match command {
        Commands::Resolve { composition } => {
            init_logging(flag, None)?;
            cmd_resolve(&composition, &units)
        }
        Commands::Validate { config: path } => {
            let config = load_config(&path, flag)?;
            cmd_validate(&path, &config)
        }
        Commands::Lines { config: path } => {
            let config = load_config(&path, flag)?;
            cmd_lines(&config)
        }
        Commands::Mix {
            config: path,
            composition,
            flow,
            temperature,
            lines,
        } => {
            let config = load_config(&path, flag)?;
            cmd_mix(
                &config,
                &units,
                &composition,
                &flow,
                temperature.as_deref(),
                &lines,
            )
        }
        Commands::Sweep {
            config: path,
            base,
            gas,
            start,
            stop,
            step,
            flow,
            lines,
        } => {
            let config = load_config(&path, flag)?;
            let values = SweepValues::Range {
                start: parse_fraction(&units, "start", &start)?,
                stop: parse_fraction(&units, "stop", &stop)?,
                step: parse_fraction(&units, "step", &step)?,
            };
            cmd_sweep(&config, &units, &base, &gas, values, &flow, &lines)
        }
    }
}

/// Load a configuration, then start logging at the level it asks for unless
/// `--log-level` overrides it.
fn load_config(path: &Path, flag: Option<&str>) -> CliResult<Config> {
    let config = mf_project::load(path)?;
    init_logging(flag, Some(&config))?;
    Ok(config)
}

fn init_logging(flag: Option<&str>, config: Option<&Config>) -> CliResult<()> {
    let level = log_level(flag, config)?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn log_level(flag: Option<&str>, config: Option<&Config>) -> CliResult<Level> {
    let text = flag
        .or_else(|| config.and_then(Config::log_level))
        .unwrap_or("warn");
    text.parse::<Level>().map_err(|e| CliError::InvalidArgument {
        name: "log-level",
        reason: format!("'{text}': {e}"),
    })
}

fn parse_fraction(units: &UnitRegistry, name: &'static str, text: &str) -> CliResult<f64> {
    units
        .parse_fraction(text)
        .map_err(|source| CliError::InvalidArgument {
            name,
            reason: source.to_string(),
        })
}

fn cmd_validate(path: &Path, config: &Config) -> CliResult<()> {
    println!("Validating configuration: {}", path.display());
    let setup = config.build()?;
    let calibrations: usize = setup
        .controllers
        .iter()
        .map(|c| c.calibrations().len())
        .sum();
    println!("✓ Configuration is valid");
    println!("  Controllers: {}", setup.controllers.len());
    println!("  Calibrations: {calibrations}");
    println!("  Lines: {}", setup.lines.len());
    Ok(())
}

fn cmd_lines(config: &Config) -> CliResult<()> {
    let setup = config.build()?;
    if setup.lines.is_empty() {
        println!("No lines in configuration");
        return Ok(());
    }
    println!("Lines:");
    for line in &setup.lines {
        match (line.controller_name(), line.calibration()) {
            (Some(controller), Some(cal)) => println!(
                "  {:<16} {:<28} {} (calibrated {}, {} at {:.2} K)",
                line.name(),
                line.gas().to_string(),
                controller,
                cal.date(),
                cal.method(),
                as_kelvin(cal.temperature())
            ),
            _ => println!(
                "  {:<16} {:<28} (no controller)",
                line.name(),
                line.gas().to_string()
            ),
        }
    }
    Ok(())
}

fn cmd_resolve(text: &str, units: &UnitRegistry) -> CliResult<()> {
    let composition = RawComposition::parse(text, units)?.resolve()?;
    for (gas, x) in composition.iter() {
        println!("  {:<8} {:.9}", gas.to_string(), x);
    }
    match composition.conversion_factor(&ConversionFactors::standard()) {
        Ok(cf) => println!("  Conversion factor (N2 = 1): {cf:.4}"),
        Err(e) => println!("  Conversion factor unavailable: {e}"),
    }
    Ok(())
}

fn cmd_mix(
    config: &Config,
    units: &UnitRegistry,
    text: &str,
    flow: &str,
    temperature: Option<&str>,
    lines: &str,
) -> CliResult<()> {
    let setup = config.build()?;
    let lines = setup.select_lines(&LineSelection::parse(lines))?;
    let raw = RawComposition::parse(text, units)?;
    let target = balance_target(&raw, &lines)?;

    let mut request = MixtureRequest::new(target, parse_flow(units, flow)?);
    if let Some(t) = temperature {
        let t = units
            .parse_temperature(t)
            .map_err(|source| CliError::Unit {
                context: "--temperature",
                source,
            })?;
        request = request.with_temperature(t);
    }
    let result = resolve_mixture(&request, &lines)?;
    info!(lines = lines.len(), residual = result.residual, "mixture resolved");

    print_allocations(&result);
    println!();
    print_comparison(&request.target, &result.achieved);
    Ok(())
}

fn cmd_sweep(
    config: &Config,
    units: &UnitRegistry,
    base: &str,
    gas: &str,
    values: SweepValues,
    flow: &str,
    lines: &str,
) -> CliResult<()> {
    let setup: Setup = config.build()?;
    let lines = setup.select_lines(&LineSelection::parse(lines))?;
    let total_flow = parse_flow(units, flow)?;
    let base = RawComposition::parse(base, units)?;
    let balance = base.balance_gas()?.cloned();
    let spec = SweepSpec::single(base, gas, values)?;
    println!("{spec}");

    print!("{:>12}", gas);
    for line in &lines {
        print!(" {:>12}", line.name());
    }
    println!();

    let mut skipped = 0usize;
    for (i, point) in generate(&spec).enumerate() {
        let outcome = point.map_err(CliError::from).and_then(|composition| {
            // let the balance gas absorb what the lines carry along
            let mut raw = composition.to_raw();
            if let Some(balance) = &balance {
                raw.set(balance, Amount::Balance);
            }
            let target = balance_target(&raw, &lines)?;
            let fraction = target.fraction(gas);
            let result = resolve_mixture(&MixtureRequest::new(target, total_flow), &lines)?;
            Ok((fraction, result))
        });
        match outcome {
            Ok((fraction, result)) => {
                print!("{fraction:>12.6}");
                for alloc in &result.allocations {
                    match alloc.setpoint {
                        Some(s) => print!(" {s:>12.6}"),
                        None => print!(" {:>12}", "-"),
                    }
                }
                println!();
            }
            Err(e) => {
                skipped += 1;
                warn!(point = i, error = %e, "sweep point skipped");
                println!("{:>12} skipped: {e}", format!("#{i}"));
            }
        }
    }
    if skipped > 0 {
        println!("{skipped} of {} points skipped", spec.len());
    }
    Ok(())
}

fn parse_flow(units: &UnitRegistry, text: &str) -> CliResult<mf_core::units::FlowRate> {
    units.parse_flow(text).map_err(|source| CliError::Unit {
        context: "--flow",
        source,
    })
}

fn print_allocations(result: &ResolutionResult) {
    println!(
        "{:<16} {:<16} {:>10} {:>14} {:>10}",
        "line", "controller", "weight", "flow [L/min]", "setpoint"
    );
    for alloc in &result.allocations {
        let setpoint = alloc
            .setpoint
            .map(|s| format!("{s:.6}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<16} {:>10.6} {:>14.6} {:>10}",
            alloc.line,
            alloc.controller.as_deref().unwrap_or("-"),
            alloc.weight,
            as_lpm(alloc.flow),
            setpoint
        );
    }
    println!("Total flow: {:.6} L/min", as_lpm(result.total_flow()));
}

fn print_comparison(target: &Composition, achieved: &Composition) {
    println!("{:<8} {:>12} {:>12}", "gas", "target", "achieved");
    let extra = achieved.gases().filter(|g| !target.contains(g.as_str()));
    for gas in target.gases().chain(extra) {
        println!(
            "{:<8} {:>12.9} {:>12.9}",
            gas.to_string(),
            target.fraction(gas.as_str()),
            achieved.fraction(gas.as_str())
        );
    }
    println!(
        "Max deviation: {:.3e}",
        target.max_deviation(achieved)
    );
}
