//! AduPlan CLI - evaluate and export ADU lot configurations from the command line.

use aduplan::config::AduModule;
use aduplan::units::{parse_length, to_display, to_feet_and_inches};
use aduplan::validator::RulesEngine;
use aduplan::{
    Evaluation, MunicipalityTable, ObstacleKind, PlacementConflict, PlannerCore, PlannerOptions,
    Scenario, UnitSystem,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aduplan")]
#[command(about = "ADU lot configuration and bylaw compliance tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Municipality list (JSON array of {id, name, bylaw_data})
    #[arg(long, global = true, value_name = "FILE")]
    municipalities: Option<PathBuf>,

    /// Engine options (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a scenario file
    Check {
        /// Path to scenario JSON
        #[arg(value_name = "SCENARIO")]
        scenario: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if the placement or bylaw checks fail
        #[arg(long)]
        fail_on_violation: bool,
    },

    /// Write the export report for a scenario
    Export {
        /// Path to scenario JSON
        #[arg(value_name = "SCENARIO")]
        scenario: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List ADU module presets and obstacle types
    Presets,

    /// List the bylaw rules applied during validation
    Rules,

    /// Convert a typed length to feet and display units
    Convert {
        /// Length such as 12' 6", 12.5 or 3.8 (metric)
        #[arg(value_name = "VALUE")]
        value: String,

        /// Unit system the value is typed in
        #[arg(short, long, value_enum, default_value = "imperial")]
        units: Units,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for scripts
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Units {
    Imperial,
    Metric,
}

impl From<Units> for UnitSystem {
    fn from(units: Units) -> Self {
        match units {
            Units::Imperial => UnitSystem::Imperial,
            Units::Metric => UnitSystem::Metric,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Check {
            scenario,
            format,
            fail_on_violation,
        } => {
            let (table, options) =
                load_context(cli.municipalities.as_deref(), cli.options.as_deref())?;
            handle_check(&scenario, &table, &options, format, fail_on_violation)
        }
        Commands::Export { scenario, output } => {
            let (table, options) =
                load_context(cli.municipalities.as_deref(), cli.options.as_deref())?;
            handle_export(&scenario, &table, &options, output.as_deref())?;
            Ok(0)
        }
        Commands::Presets => {
            handle_presets();
            Ok(0)
        }
        Commands::Rules => {
            handle_rules();
            Ok(0)
        }
        Commands::Convert { value, units } => handle_convert(&value, units.into()),
    }
}

fn load_context(
    municipalities: Option<&Path>,
    options: Option<&Path>,
) -> Result<(MunicipalityTable, PlannerOptions)> {
    let table = match municipalities {
        Some(path) => MunicipalityTable::from_path(path)
            .with_context(|| format!("failed to load municipalities from {}", path.display()))?,
        None => MunicipalityTable::default(),
    };
    let options = match options {
        Some(path) => PlannerOptions::from_path(path)
            .with_context(|| format!("failed to load options from {}", path.display()))?,
        None => PlannerOptions::default(),
    };
    Ok((table, options))
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    Scenario::from_path(path).with_context(|| format!("failed to read scenario {}", path.display()))
}

fn handle_check(
    path: &Path,
    table: &MunicipalityTable,
    options: &PlannerOptions,
    format: OutputFormat,
    fail_on_violation: bool,
) -> Result<i32> {
    let scenario = load_scenario(path)?;
    let evaluation = PlannerCore::evaluate(&scenario, table, options)?;

    match format {
        OutputFormat::Human => output_human(path, &scenario, table, &evaluation),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&evaluation)?),
    }

    if fail_on_violation && !evaluation.is_valid() {
        return Ok(1);
    }
    Ok(0)
}

fn output_human(
    path: &Path,
    scenario: &Scenario,
    table: &MunicipalityTable,
    evaluation: &Evaluation,
) {
    let config = &evaluation.config;
    let units = config.units;
    let len = |ft: f64| format!("{} {}", to_display(ft, false, units), units.length_suffix());
    let area = |sqft: f64| format!("{} {}", to_display(sqft, true, units), units.area_suffix());

    println!("\nScenario: {}", path.display());
    println!("{}", "─".repeat(60));

    let municipality = scenario
        .municipality_id
        .as_deref()
        .and_then(|id| table.get(id))
        .map(|m| m.name.as_str())
        .unwrap_or("none");
    println!("  Municipality: {}", municipality);
    println!("  Lot:          {} x {}", len(config.lot_width), len(config.lot_depth));
    println!(
        "  Setbacks:     front {}, rear {}, side {}",
        len(config.front_setback),
        len(config.rear_setback),
        len(config.side_setback)
    );
    println!(
        "  ADU:          {} x {} {} ({} stor{}) at ({}, {})",
        len(config.adu_width),
        len(config.adu_depth),
        config.adu_type.label(),
        config.adu_stories,
        if config.adu_stories == 1 { "y" } else { "ies" },
        len(evaluation.adu_position.x),
        len(evaluation.adu_position.y)
    );
    println!("  Buildable:    {}", area(evaluation.metrics.buildable_area_size));
    println!("  Coverage:     {:.2}%", evaluation.metrics.coverage_percent);

    if !evaluation.adjustments.is_empty() {
        println!("\n  ADJUSTMENTS:");
        for adjustment in &evaluation.adjustments {
            println!("    - {:?}", adjustment);
        }
    }

    if !evaluation.conflicts.is_empty() {
        println!("\n  PLACEMENT:");
        for conflict in &evaluation.conflicts {
            println!("    - {}", describe_conflict(conflict));
        }
    }

    if !evaluation.validation.violations.is_empty() {
        println!("\n  VIOLATIONS:");
        for violation in &evaluation.validation.violations {
            println!("    - {}", violation.message);
        }
    }

    if !evaluation.validation.warnings.is_empty() {
        println!("\n  WARNINGS:");
        for warning in &evaluation.validation.warnings {
            println!("    - {}", warning.message);
            println!("      {}", warning.details);
        }
    }

    println!(
        "\n  Result: {}",
        if evaluation.is_valid() { "COMPLIANT" } else { "NOT COMPLIANT" }
    );
}

fn describe_conflict(conflict: &PlacementConflict) -> String {
    match conflict {
        PlacementConflict::OutsideBuildableArea => {
            "ADU extends outside the buildable area".to_string()
        }
        PlacementConflict::ObstacleOverlap { obstacle_id } => {
            format!("ADU overlaps obstacle {}", obstacle_id)
        }
        PlacementConflict::TooCloseToResidence {
            obstacle_id,
            separation_ft,
        } => format!(
            "ADU is within {} of main residence {}",
            to_feet_and_inches(*separation_ft),
            obstacle_id
        ),
    }
}

fn handle_export(
    path: &Path,
    table: &MunicipalityTable,
    options: &PlannerOptions,
    output: Option<&Path>,
) -> Result<()> {
    let scenario = load_scenario(path)?;
    let report = PlannerCore::export(&scenario, table, options, chrono::Utc::now())?;
    let json = report.to_json_pretty()?;

    match output {
        Some(out) => {
            std::fs::write(out, json)
                .with_context(|| format!("failed to write {}", out.display()))?;
            tracing::info!("Wrote export to {}", out.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn handle_presets() {
    println!("ADU modules:\n");
    for module in AduModule::ALL {
        match module.dimensions() {
            Some((w, d)) => println!("  {:<14} {}' x {}' ({} sq ft)", module.label(), w, d, w * d),
            None => println!("  {:<14} any size", module.label()),
        }
    }

    println!("\nObstacle types:\n");
    for kind in ObstacleKind::ALL {
        let (w, d) = kind.default_size();
        println!("  {:<14} {}' x {}'", kind.label(), w, d);
    }
}

fn handle_rules() {
    println!("Bylaw rules:\n");
    for rule in RulesEngine::with_default_rules().rules() {
        println!("  {}", rule.id());
        println!("    {}", rule.name());
        println!();
    }
}

fn handle_convert(value: &str, units: UnitSystem) -> Result<i32> {
    let feet = parse_length(value, units).with_context(|| format!("cannot convert {:?}", value))?;
    println!("Feet:     {}", (feet * 1000.0).round() / 1000.0);
    println!("Imperial: {}", to_feet_and_inches(feet));
    println!(
        "Metric:   {} {}",
        to_display(feet, false, UnitSystem::Metric),
        UnitSystem::Metric.length_suffix()
    );
    Ok(0)
}
