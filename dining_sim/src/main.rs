//! Dining Philosophers CLI
//!
//! Run a table of philosophers for a while, drive it interactively, or run
//! the verification scenarios.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use dining_core::{DiningError, SimulationConfig, Strategy, Supervisor};
use dining_env::{ConfigError, DiningContext, Observer, PhilosopherId, SystemContext};
use dining_sim::scenarios::ScenarioId;
use dining_sim::{ScenarioResult, ScenarioRunner, SeededContext, SimExport, TableMonitor};
use std::io::BufRead;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long a stop may take before the run is reported as stuck.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Dining Philosophers simulation
#[derive(Parser, Debug)]
#[command(name = "dining-sim")]
#[command(about = "Run the dining philosophers simulation", long_about = None)]
struct Args {
    /// Number of philosophers (at least 2)
    #[arg(required_unless_present_any = ["config", "scenario"])]
    philosophers: Option<usize>,

    /// Run length in seconds (runs until `quit` when omitted)
    seconds: Option<f64>,

    /// Fork arbitration strategy (independent, paired, fair)
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Minimum thinking time in ms
    #[arg(long)]
    think_min: Option<u64>,

    /// Maximum thinking time in ms
    #[arg(long)]
    think_max: Option<u64>,

    /// Minimum eating time in ms
    #[arg(long)]
    eat_min: Option<u64>,

    /// Maximum eating time in ms
    #[arg(long)]
    eat_max: Option<u64>,

    /// JSON configuration file; flags override its fields
    #[arg(short, long)]
    config: Option<String>,

    /// Seed for think/eat durations (entropy when omitted)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Scenario to run (paired, fair, deadlock, pause_resume, all)
    #[arg(short = 'S', long)]
    scenario: Option<String>,

    /// Read pause/resume/status/quit commands from stdin
    #[arg(short, long)]
    interactive: bool,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    /// Export the finished run to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Command typed at the interactive prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Pause(Option<PhilosopherId>),
    Resume(Option<PhilosopherId>),
    Status,
    Quit,
}

impl std::str::FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let verb = words.next().unwrap_or_default().to_lowercase();
        let target = match words.next() {
            Some(w) => Some(PhilosopherId(
                w.trim_start_matches('#')
                    .parse()
                    .map_err(|_| format!("Not a philosopher: {}", w))?,
            )),
            None => None,
        };
        match (verb.as_str(), target) {
            ("pause" | "p", t) => Ok(Command::Pause(t)),
            ("resume" | "r" | "run", t) => Ok(Command::Resume(t)),
            ("status" | "s", None) => Ok(Command::Status),
            ("quit" | "q" | "exit", None) => Ok(Command::Quit),
            _ => Err(format!("Unknown command: {}", s.trim())),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr so --json output stays parseable
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(scenario) = args.scenario.as_deref() {
        return run_scenarios(&args, scenario);
    }

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => usage_error(e),
    };

    let outcome = match args.seed {
        Some(seed) => run_table(&args, config, SeededContext::shared(seed)),
        None => run_table(&args, config, SystemContext::shared()),
    };
    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Prints the usage with `err` and exits non-zero.
fn usage_error(err: impl std::fmt::Display) -> ! {
    Args::command()
        .error(ErrorKind::ValueValidation, err)
        .exit()
}

/// Merges the config file, positional arguments and flags, then validates.
fn build_config(args: &Args) -> Result<SimulationConfig, DiningError> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::default(),
    };

    if let Some(n) = args.philosophers {
        config.num_philosophers = n;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(ms) = args.think_min {
        config.think.min_ms = ms;
    }
    if let Some(ms) = args.think_max {
        config.think.max_ms = ms;
    }
    if let Some(ms) = args.eat_min {
        config.eat.min_ms = ms;
    }
    if let Some(ms) = args.eat_max {
        config.eat.max_ms = ms;
    }
    if let Some(secs) = args.seconds {
        let duration = Duration::try_from_secs_f64(secs)
            .map_err(|e| ConfigError::InvalidDuration(e.to_string()))?;
        config = config.with_run_duration(duration);
    }

    config.validate()?;
    Ok(config)
}

/// Runs one table until its duration elapses or `quit` is typed.
///
/// Returns `Ok(false)` when the monitor saw an invariant violation.
fn run_table<Ctx: DiningContext>(
    args: &Args,
    config: SimulationConfig,
    context: Arc<Ctx>,
) -> Result<bool, DiningError> {
    let seed = context.seed();
    let started = Instant::now();
    let monitor = Arc::new(TableMonitor::new(config.num_philosophers));
    let observer: Arc<dyn Observer> = monitor.clone();

    if !args.json {
        info!("Dining Philosophers v{}", env!("CARGO_PKG_VERSION"));
        info!(
            "{} philosophers, {} strategy ({})",
            config.num_philosophers,
            config.strategy,
            config.strategy.description()
        );
    }

    let supervisor = Supervisor::start(config.clone(), observer, context)?;
    let interactive = args.interactive || config.run_duration().is_none();
    let deadline = config.run_duration().map(|d| started + d);

    if interactive {
        if !args.json {
            info!("Commands: pause [n], resume [n], status, quit");
        }
        drive(&supervisor, spawn_stdin_reader(), deadline);
    } else if let Some(deadline) = deadline {
        std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
    }

    let report = supervisor.stop(Some(STOP_TIMEOUT))?;
    let summary = monitor.summary();

    if args.json {
        let output = serde_json::json!({
            "seed": seed,
            "config": config,
            "report": report,
            "monitor": summary,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("failed to encode report: {}", e),
        }
    } else {
        println!("{}", report);
        for violation in &summary.violations {
            error!("invariant violated: {}", violation);
        }
    }

    if let Some(path) = &args.export {
        let mut export = SimExport::new("run", seed, config);
        export.capture(&monitor);
        export.finalize(started.elapsed().as_secs_f64(), Some(report));
        match export.write_to_file(path) {
            Ok(()) => info!("Exported {} events to {}", export.events.len(), path),
            Err(e) => error!("Failed to write export: {:?}", e),
        }
    }

    Ok(summary.violations.is_empty())
}

/// Reads stdin on its own thread; the channel closes at EOF.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let spawned = std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!("interactive input unavailable: {}", e);
    }
    rx
}

/// Applies typed commands until `quit`, EOF or the deadline.
fn drive(supervisor: &Supervisor, commands: Receiver<String>, deadline: Option<Instant>) {
    loop {
        let line = match deadline {
            Some(deadline) => commands.recv_deadline(deadline),
            None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        let line = match line {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => return,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("stdin closed");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        let applied = match command {
            Command::Pause(None) => {
                supervisor.pause();
                Ok(())
            }
            Command::Resume(None) => {
                supervisor.resume();
                Ok(())
            }
            Command::Pause(Some(id)) => supervisor.pause_philosopher(id),
            Command::Resume(Some(id)) => supervisor.resume_philosopher(id),
            Command::Status => {
                print_status(supervisor);
                Ok(())
            }
            Command::Quit => return,
        };
        if let Err(e) = applied {
            warn!("{}", e);
        }
    }
}

fn print_status(supervisor: &Supervisor) {
    println!(
        "t={:.1}s strategy={} forks held={}",
        supervisor.elapsed().as_secs_f64(),
        supervisor.strategy(),
        supervisor.snapshot().held_count()
    );
    for status in supervisor.status() {
        println!(
            "Philosopher {}: {}{} hungry {:.3} sec, {} meals",
            status.id,
            status.state,
            if status.paused { " (paused)" } else { "" },
            status.hungry_time.as_secs_f64(),
            status.meals
        );
    }
}

/// Runs one scenario or all of them and reports pass/fail.
fn run_scenarios(args: &Args, name: &str) -> ExitCode {
    if args.export.is_some() {
        usage_error("--export only supports a plain run, not --scenario");
    }

    let scenarios: Vec<ScenarioId> = if name == "all" {
        ScenarioId::all()
    } else {
        match name.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => usage_error(format!(
                "{}; available: paired, fair, deadlock, pause_resume, all",
                e
            )),
        }
    };

    let seed = args.seed.unwrap_or(42);
    let mut runner = ScenarioRunner::new(seed, args.philosophers.unwrap_or(5));
    if let Some(secs) = args.seconds {
        match Duration::try_from_secs_f64(secs) {
            Ok(duration) => runner = runner.with_duration(duration),
            Err(e) => usage_error(e),
        }
    }
    if let (Some(min), Some(max)) = (args.think_min, args.think_max) {
        match dining_core::TimingRange::new("think", min, max) {
            Ok(range) => runner = runner.with_think(range),
            Err(e) => usage_error(e),
        }
    }
    if let (Some(min), Some(max)) = (args.eat_min, args.eat_max) {
        match dining_core::TimingRange::new("eat", min, max) {
            Ok(range) => runner = runner.with_eat(range),
            Err(e) => usage_error(e),
        }
    }

    let mut results: Vec<ScenarioResult> = Vec::new();
    for scenario in scenarios {
        if !args.json {
            info!("{}: {}", scenario.name(), scenario.description());
        }
        let result = runner.run(scenario);
        if !args.json {
            if result.passed {
                info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    scenario.name(),
                    seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        results.push(result);
    }

    let failed = results.iter().filter(|r| !r.passed).count();
    if args.json {
        let summary = serde_json::json!({
            "total": results.len(),
            "passed": results.len() - failed,
            "failed": failed,
            "results": results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("failed to encode results: {}", e),
        }
    } else if failed == 0 {
        info!("All {} scenario runs passed", results.len());
    } else {
        error!("{}/{} scenario runs failed", failed, results.len());
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
