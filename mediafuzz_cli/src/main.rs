use mediafuzz_core::config::{ConfigInputDelivery, MediafuzzConfig};
use mediafuzz_core::error::fatal_setup_error;
use mediafuzz_core::executor::{CommandExecutor, CommandExecutorConfig, InputDelivery};
use mediafuzz_core::oracle::CrashOracle;
use mediafuzz_core::triage::{Triage, collect_inputs};
use mediafuzz_core::{HarnessConfig, HarnessError};

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const DEFAULT_CONFIG_FILE: &str = "mediafuzz.toml";

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long = "config", value_parser)]
    config_file: Option<PathBuf>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Feed inputs to an entry point in this process, like a fuzzer reproducer.
    Run {
        #[clap(short, long, value_enum)]
        target: Target,
        /// Input files; stdin when none is given or for `-`.
        inputs: Vec<PathBuf>,
    },
    /// Replay saved inputs in child processes and keep the crashing ones.
    Triage {
        #[clap(short, long, value_enum)]
        target: Target,
        #[clap(long)]
        artifact_dir: Option<PathBuf>,
        #[clap(long)]
        timeout_ms: Option<u64>,
        /// Input files or directories of inputs.
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Typefind,
    Discoverer,
}

impl Target {
    fn as_arg(self) -> &'static str {
        match self {
            Target::Typefind => "typefind",
            Target::Discoverer => "discoverer",
        }
    }
}

/// The explicit path, else `mediafuzz.toml` when present, else nothing.
fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let default_config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        default_config_path.exists().then_some(default_config_path)
    })
}

fn load_config(path: Option<&Path>) -> Result<MediafuzzConfig, anyhow::Error> {
    match path {
        Some(path) => MediafuzzConfig::load_from_file(path),
        None => Ok(MediafuzzConfig::default()),
    }
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config_file);

    match cli.command {
        Commands::Run { target, inputs } => {
            // The harness installs its own log sink; a config error here is a
            // setup failure like any other.
            let config = match load_config(config_path.as_deref()) {
                Ok(config) => config,
                Err(e) => fatal_setup_error(&HarnessError::Config(format!("{e:#}"))),
            };
            run(target, config.harness, &inputs)
        }
        Commands::Triage {
            target,
            artifact_dir,
            timeout_ms,
            paths,
        } => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .init();
            let mut config = load_config(config_path.as_deref())?;
            if let Some(timeout_ms) = timeout_ms {
                config.triage.timeout_ms = timeout_ms;
            }
            if artifact_dir.is_some() {
                config.triage.artifact_dir = artifact_dir;
            }
            match &config_path {
                Some(path) => info!("Loaded configuration from {path:?}"),
                None => info!("No config file found, using built-in defaults"),
            }
            triage(target, config, config_path.as_deref(), &paths)
        }
    }
}

fn read_run_inputs(inputs: &[PathBuf]) -> Result<Vec<Vec<u8>>, anyhow::Error> {
    let read_stdin = || -> Result<Vec<u8>, anyhow::Error> {
        let mut data = Vec::new();
        std::io::stdin().read_to_end(&mut data)?;
        Ok(data)
    };
    if inputs.is_empty() {
        return Ok(vec![read_stdin()?]);
    }
    inputs
        .iter()
        .map(|path| {
            if path.as_os_str() == "-" {
                read_stdin()
            } else {
                std::fs::read(path)
                    .map_err(|e| anyhow::anyhow!("Failed to read input {:?}: {}", path, e))
            }
        })
        .collect()
}

#[cfg(feature = "gstreamer")]
fn run(target: Target, config: HarnessConfig, inputs: &[PathBuf]) -> Result<(), anyhow::Error> {
    use mediafuzz_core::gstreamer::GstFramework;
    use mediafuzz_core::{DiscovererHarness, FuzzTarget, TypefindHarness};

    let inputs = read_run_inputs(inputs)?;
    let harness: Box<dyn FuzzTarget> = match target {
        Target::Typefind => Box::new(TypefindHarness::new(GstFramework::new(), config)),
        Target::Discoverer => Box::new(DiscovererHarness::new(GstFramework::new(), config)),
    };
    for data in &inputs {
        let started = Instant::now();
        harness.test_one_input(data);
        eprintln!(
            "Executed {} bytes through {} in {:.2?}",
            data.len(),
            harness.name(),
            started.elapsed()
        );
    }
    Ok(())
}

#[cfg(not(feature = "gstreamer"))]
fn run(target: Target, _config: HarnessConfig, inputs: &[PathBuf]) -> Result<(), anyhow::Error> {
    read_run_inputs(inputs)?;
    anyhow::bail!(
        "cannot run the {} entry point: mediafuzz was built without the gstreamer feature",
        target.as_arg()
    )
}

/// The child command replaying one input through `run`.
fn child_command(
    exe: &Path,
    target: Target,
    config_path: Option<&Path>,
) -> Result<Vec<String>, anyhow::Error> {
    let path_arg = |path: &Path| {
        path.to_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Path {path:?} is not valid UTF-8"))
    };
    let mut command = vec![path_arg(exe)?];
    if let Some(config_path) = config_path {
        command.push("--config".to_string());
        command.push(path_arg(config_path)?);
    }
    command.extend(["run", "--target", target.as_arg()].map(str::to_string));
    Ok(command)
}

fn triage(
    target: Target,
    config: MediafuzzConfig,
    config_path: Option<&Path>,
    paths: &[PathBuf],
) -> Result<(), anyhow::Error> {
    let exe = std::env::current_exe()?;
    // The child may run from another working directory.
    let config_path = config_path.map(std::fs::canonicalize).transpose()?;
    let config_path = config_path.as_deref();
    let input_delivery = match config.triage.input_delivery {
        ConfigInputDelivery::StdIn => InputDelivery::StdIn,
        ConfigInputDelivery::File { template } => InputDelivery::File(template),
    };
    let executor = CommandExecutor::new(CommandExecutorConfig {
        command: child_command(&exe, target, config_path)?,
        input_delivery,
        timeout: Duration::from_millis(config.triage.timeout_ms),
        working_dir: config.triage.working_dir,
    });

    let mut triage = Triage::new(executor, CrashOracle::new());
    if let Some(dir) = config.triage.artifact_dir {
        triage = triage.with_artifact_dir(dir);
    }

    let inputs = collect_inputs(paths)?;
    info!("Replaying {} inputs through {}", inputs.len(), target.as_arg());
    let start_time = Instant::now();
    let summary = triage.run(inputs.into_iter().map(|(_, data)| data))?;

    for report in &summary.findings {
        println!("\n!!! {:?} FOUND (severity {}) !!!", report.kind, report.severity);
        println!("  Artifact: {}", report.artifact_name());
        println!("  Description: {}", report.description);
        println!("  Size: {} bytes", report.input.len());
    }
    println!("\nTriage finished in {:.2?}.", start_time.elapsed());
    println!(
        "Executed: {}, Duplicates: {}, Clean: {}, Findings: {}",
        summary.executed,
        summary.duplicates,
        summary.clean,
        summary.findings.len()
    );
    Ok(())
}
