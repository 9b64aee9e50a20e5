use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use sf_app::{
    AppError, AppResult, DemoExecutionService, RunOutcome, RunProgressEvent, RunResponse,
    RunStage, SessionParts, SimflowConfig, SimulationRepository, SimulationSession,
    project_service, query, repository,
};
use sf_exec::{ExecutionService, HttpExecutionService};
use sf_project::{DEMO_SIMULATION_ID, Simulation, demo_simulation};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(about = "simflow CLI - run workflow-backed simulations", long_about = None)]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the execution service base URL
    #[arg(long, global = true)]
    service_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a simulation file
    Validate {
        /// Path to the simulation YAML or JSON file
        path: PathBuf,
    },
    /// List the parameters of a simulation
    Params {
        /// Simulation file, stored simulation id, or "demo"
        source: String,
    },
    /// Store a simulation file in the configured repository
    Import {
        /// Path to the simulation YAML or JSON file
        path: PathBuf,
    },
    /// Write a stored simulation to a YAML or JSON file
    Export {
        /// Stored simulation id, or "demo"
        simulation: String,
        /// Output path; `.json` writes JSON, anything else YAML
        path: PathBuf,
    },
    /// Execute a simulation once
    Run(RunArgs),
    /// Run the built-in demo model in-process
    Demo {
        /// Answer as a background job completing after this many status checks
        #[arg(long)]
        background_checks: Option<u32>,
        /// Parameter assignment, e.g. --set price=120
        #[arg(long = "set", value_name = "ID=VALUE")]
        assignments: Vec<String>,
    },
    /// Manage saved scenarios
    #[command(subcommand)]
    Scenario(ScenarioCommands),
}

#[derive(Args)]
struct RunArgs {
    /// Simulation file, stored simulation id, or "demo"
    source: String,
    /// Parameter assignment, e.g. --set price=120
    #[arg(long = "set", value_name = "ID=VALUE")]
    assignments: Vec<String>,
    /// Load a saved scenario before applying assignments
    #[arg(long)]
    scenario: Option<String>,
    /// Require a synchronous answer from the service
    #[arg(long)]
    no_background: bool,
}

#[derive(Subcommand)]
enum ScenarioCommands {
    /// Save the given parameter values as a scenario
    Save {
        /// Stored simulation id, or "demo"
        simulation: String,
        /// Scenario name
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Parameter assignment, e.g. --set price=120
        #[arg(long = "set", value_name = "ID=VALUE")]
        assignments: Vec<String>,
    },
    /// List saved scenarios
    List {
        /// Stored simulation id, or "demo"
        simulation: String,
    },
    /// Delete a scenario
    Delete {
        /// Stored simulation id, or "demo"
        simulation: String,
        /// Scenario id
        scenario_id: String,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = SimflowConfig::load_or_default(cli.config.as_deref())?;
    if let Some(url) = cli.service_url {
        config.service.base_url = url;
    }
    debug!(service = config.service.base_url.as_str(), "configuration loaded");

    match cli.command {
        Commands::Validate { path } => cmd_validate(&path),
        Commands::Params { source } => cmd_params(&config, &source),
        Commands::Import { path } => cmd_import(&config, &path),
        Commands::Export { simulation, path } => cmd_export(&config, &simulation, &path),
        Commands::Run(args) => cmd_run(config, &args),
        Commands::Demo {
            background_checks,
            assignments,
        } => cmd_demo(&config, background_checks, &assignments),
        Commands::Scenario(scenario_cmd) => match scenario_cmd {
            ScenarioCommands::Save {
                simulation,
                name,
                description,
                assignments,
            } => cmd_scenario_save(&config, &simulation, &name, description, &assignments),
            ScenarioCommands::List { simulation } => cmd_scenario_list(&config, &simulation),
            ScenarioCommands::Delete {
                simulation,
                scenario_id,
            } => cmd_scenario_delete(&config, &simulation, &scenario_id),
        },
    }
}

fn open_repository(config: &SimflowConfig) -> AppResult<Arc<dyn SimulationRepository>> {
    repository::from_config(&config.repository, config.service.request_timeout())
}

/// A file on disk, the demo, or an id in the configured repository.
fn resolve_source(config: &SimflowConfig, source: &str) -> AppResult<Simulation> {
    if source == DEMO_SIMULATION_ID || Path::new(source).exists() {
        return project_service::open_simulation(source);
    }
    open_repository(config)?.get(source)
}

fn execution_service(
    config: &SimflowConfig,
    simulation: &Simulation,
) -> AppResult<Arc<dyn ExecutionService>> {
    if simulation.is_demo() {
        return Ok(Arc::new(DemoExecutionService::for_simulation(simulation)?));
    }
    Ok(Arc::new(HttpExecutionService::new(
        config.service.base_url.clone(),
        config.service.request_timeout(),
    )?))
}

fn open_session(
    config: &SimflowConfig,
    simulation: Simulation,
    service: Arc<dyn ExecutionService>,
) -> AppResult<SimulationSession> {
    let parts = SessionParts::new(service, open_repository(config)?);
    Ok(SimulationSession::open(simulation, parts, config))
}

fn apply_assignments(session: &SimulationSession, assignments: &[String]) -> AppResult<()> {
    for raw in assignments {
        let (id, value) = project_service::parse_assignment(raw)?;
        let stored = session.set_parameter(&id, &value)?;
        println!("  {} = {}", id, stored);
    }
    Ok(())
}

fn cmd_validate(path: &Path) -> AppResult<()> {
    println!("Validating simulation: {}", path.display());
    let simulation = project_service::load_simulation(path)?;
    println!(
        "✓ Simulation '{}' is valid ({} parameters, {} visualizations, {} scenarios)",
        simulation.id,
        simulation.parameters.len(),
        simulation.visualizations.len(),
        simulation.scenarios.len()
    );
    Ok(())
}

fn cmd_params(config: &SimflowConfig, source: &str) -> AppResult<()> {
    let simulation = resolve_source(config, source)?;
    let params = project_service::list_parameters(&simulation);

    if params.is_empty() {
        println!("No parameters defined for simulation '{}'", simulation.id);
        return Ok(());
    }

    println!("Parameters of '{}':", simulation.name);
    let mut current_group: Option<&str> = None;
    for p in &params {
        if p.group.as_deref() != current_group {
            current_group = p.group.as_deref();
            println!("  [{}]", current_group.unwrap_or("ungrouped"));
        }
        let bounds = match p.bounds {
            (Some(min), Some(max)) => format!(" [{}, {}]", min, max),
            (Some(min), None) => format!(" [>= {}]", min),
            (None, Some(max)) => format!(" [<= {}]", max),
            (None, None) => String::new(),
        };
        println!(
            "    {} - {} ({}{}) default={}{}  -> node {}",
            p.id,
            p.label,
            p.control,
            bounds,
            p.default_value,
            p.unit.as_deref().map(|u| format!(" {}", u)).unwrap_or_default(),
            p.bound_node_id
        );
    }
    Ok(())
}

fn cmd_import(config: &SimflowConfig, path: &Path) -> AppResult<()> {
    let simulation = project_service::load_simulation(path)?;
    if simulation.is_demo() {
        return Err(AppError::InvalidInput(
            "the demo simulation id is reserved".to_string(),
        ));
    }
    open_repository(config)?.create(&simulation)?;
    println!("✓ Imported simulation '{}'", simulation.id);
    Ok(())
}

fn cmd_export(config: &SimflowConfig, simulation_id: &str, path: &Path) -> AppResult<()> {
    let simulation = resolve_stored(config, simulation_id)?;
    project_service::save_simulation(path, &simulation)?;
    println!("✓ Exported '{}' to {}", simulation.id, path.display());
    Ok(())
}

fn cmd_run(mut config: SimflowConfig, args: &RunArgs) -> AppResult<()> {
    if args.no_background {
        config.service.background_allowed = false;
    }
    let simulation = resolve_source(&config, &args.source)?;
    println!("Running simulation: {}", simulation.name);

    let service = execution_service(&config, &simulation)?;
    let session = open_session(&config, simulation, service)?;
    if let Some(scenario_id) = &args.scenario {
        session.load_scenario(scenario_id)?;
        println!("  Loaded scenario {}", scenario_id);
    }
    apply_assignments(&session, &args.assignments)?;

    let response = execute_with_cli_progress(&session)?;
    print_run_summary(&session, &response);
    Ok(())
}

fn cmd_demo(
    config: &SimflowConfig,
    background_checks: Option<u32>,
    assignments: &[String],
) -> AppResult<()> {
    let simulation = demo_simulation();
    println!("Running demo: {}", simulation.name);

    let mut service = DemoExecutionService::for_simulation(&simulation)?;
    if let Some(checks) = background_checks {
        service = service.in_background(checks);
    }
    let mut config = config.clone();
    // Demo jobs answer instantly; keep polling snappy.
    config.polling.interval_ms = config.polling.interval_ms.min(100);

    let session = open_session(&config, simulation, Arc::new(service))?;
    apply_assignments(&session, assignments)?;

    let response = execute_with_cli_progress(&session)?;
    print_run_summary(&session, &response);
    Ok(())
}

fn cmd_scenario_save(
    config: &SimflowConfig,
    simulation_id: &str,
    name: &str,
    description: Option<String>,
    assignments: &[String],
) -> AppResult<()> {
    let simulation = resolve_stored(config, simulation_id)?;
    let service = execution_service(config, &simulation)?;
    let session = open_session(config, simulation, service)?;
    apply_assignments(&session, assignments)?;

    let scenario = session.save_scenario(name, description)?;
    println!("✓ Saved scenario '{}' ({})", scenario.name, scenario.id);
    Ok(())
}

fn cmd_scenario_list(config: &SimflowConfig, simulation_id: &str) -> AppResult<()> {
    let simulation = resolve_stored(config, simulation_id)?;
    if simulation.scenarios.is_empty() {
        println!("No scenarios saved for simulation: {}", simulation.id);
    } else {
        println!("Scenarios for '{}':", simulation.id);
        for scenario in &simulation.scenarios {
            println!(
                "  {} - {} ({} values, {})",
                scenario.id,
                scenario.name,
                scenario.parameter_values.len(),
                scenario.created_at
            );
        }
    }
    Ok(())
}

fn cmd_scenario_delete(
    config: &SimflowConfig,
    simulation_id: &str,
    scenario_id: &str,
) -> AppResult<()> {
    let simulation = resolve_stored(config, simulation_id)?;
    let service = execution_service(config, &simulation)?;
    let session = open_session(config, simulation, service)?;
    let removed = session.delete_scenario(scenario_id)?;
    println!("✓ Deleted scenario '{}'", removed.name);
    Ok(())
}

/// The demo, or a simulation from the configured repository.
fn resolve_stored(config: &SimflowConfig, simulation_id: &str) -> AppResult<Simulation> {
    if simulation_id == DEMO_SIMULATION_ID {
        return Ok(demo_simulation());
    }
    open_repository(config)?.get(simulation_id)
}

fn execute_with_cli_progress(session: &SimulationSession) -> AppResult<RunResponse> {
    let mut last_emit = Instant::now();
    let mut last_stage = None;
    let outcome = session.execute_with_progress(Some(&mut |event: RunProgressEvent| {
        let emit_now = last_stage != Some(event.stage)
            || event.poll.is_some()
            || last_emit.elapsed().as_millis() >= 100;
        if emit_now {
            render_cli_progress(&event);
            last_stage = Some(event.stage);
            last_emit = Instant::now();
        }
    }));
    clear_progress_line();

    match outcome? {
        RunOutcome::Completed(response) => Ok(response),
        RunOutcome::Skipped => Err(AppError::InvalidInput(
            "an execution is already in flight".to_string(),
        )),
    }
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    match (&event.stage, &event.poll) {
        (RunStage::Polling, Some(poll)) => {
            let width = 28usize;
            let fraction = match &poll.nodes {
                Some(nodes) => f64::from(nodes.percentage.min(100)) / 100.0,
                None => f64::from(poll.attempt) / f64::from(poll.max_attempts.max(1)),
            };
            let filled = ((fraction * width as f64).round() as usize).min(width);
            let bar = format!(
                "{}{}",
                "#".repeat(filled),
                "-".repeat(width.saturating_sub(filled))
            );
            let status = poll.status.map(|s| s.as_str()).unwrap_or("check failed");
            print!(
                "\r[{}] {:>6.2}%  check={}/{}  status={}  elapsed={:.1}s",
                bar,
                fraction * 100.0,
                poll.attempt,
                poll.max_attempts,
                status,
                event.elapsed_wall_s
            );
            let _ = io::stdout().flush();
        }
        _ => {
            let spinner = ['|', '/', '-', '\\'];
            let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
            let mut line = format!(
                "\r{} {}  elapsed={:.2}s",
                spinner[spin_idx],
                event.stage.label(),
                event.elapsed_wall_s
            );
            if let Some(msg) = &event.message {
                line.push_str(&format!("  {}", msg));
            }
            print!("{}", line);
            let _ = io::stdout().flush();
        }
    }
}

fn print_run_summary(session: &SimulationSession, response: &RunResponse) {
    let run = &response.run;
    println!("✓ Run completed: {}", run.id);
    match &run.execution_id {
        Some(execution_id) => println!(
            "  Background execution {} ({} status checks)",
            execution_id, response.status_checks
        ),
        None => println!("  Synchronous execution"),
    }
    println!("  Duration: {} ms", run.duration_ms);
    for field in &response.collisions {
        println!("  ! Output '{}' was written by several nodes", field);
    }

    let simulation = session.simulation();
    let dashboard = query::dashboard(&simulation, &run.result);
    if !dashboard.is_empty() {
        println!("\nVisualizations:");
        for item in dashboard {
            println!("  {}", item.title);
            for (field, value) in item.values {
                println!("    {} = {}", field, format_value(value.as_ref()));
            }
        }
    }

    let fields = query::list_fields(&run.result);
    if !fields.is_empty() {
        println!("\nResult fields:");
        for field in fields {
            println!("  {} = {}", field, format_value(run.result.get(&field)));
        }
    } else {
        println!("\nResult: {}", run.result);
    }
}

fn format_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            Some(f) => format!("{:.4}", f),
            None => n.to_string(),
        },
        Some(other) => other.to_string(),
        None => "-".to_string(),
    }
}
