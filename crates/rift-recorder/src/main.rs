//! Rift recorder CLI
//!
//! Usage:
//!   rift-recorder plan <SPEC>
//!   rift-recorder name <STUB>
//!   rift-recorder record --spec <SPEC> --interactions <FILE> --root <DIR> [--transformer <SCRIPT>...]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rift_recorder::recording::{file_stores, CapturedInteraction};
use rift_recorder::{
    body_file_name, stub_file_name, ExtensionRegistry, ExtensionSpec, RecordSpec, Recorder,
    StubArtifact,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rift-recorder")]
#[command(
    author,
    version,
    about = "Resolve recording specs and persist captured traffic as stubs"
)]
struct Args {
    /// Log filter, e.g. `info` or `rift_recorder=debug`
    #[arg(long, global = true, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a recording spec and print the plan as JSON
    Plan {
        /// Recording spec (YAML or JSON)
        spec: PathBuf,
    },
    /// Print the file names a stub is stored under
    Name {
        /// Stub file (JSON)
        stub: PathBuf,
    },
    /// Record captured interactions as stub files
    Record {
        /// Recording spec (YAML or JSON)
        #[arg(long)]
        spec: PathBuf,
        /// Captured interactions (JSON or YAML array)
        #[arg(long)]
        interactions: PathBuf,
        /// Output root; stubs go to `mappings/`, bodies to `__files/`
        #[arg(long)]
        root: PathBuf,
        /// Transformer script, registered under its file stem
        #[arg(long = "transformer")]
        transformers: Vec<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format)?;

    match args.command {
        Command::Plan { spec } => plan(&spec),
        Command::Name { stub } => name(&stub),
        Command::Record {
            spec,
            interactions,
            root,
            transformers,
        } => record(&spec, &interactions, &root, &transformers),
    }
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("Invalid log filter '{level}'"))?;
    // stdout carries command output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn plan(spec_path: &Path) -> Result<()> {
    let plan = RecordSpec::from_file(spec_path)?
        .resolve()
        .with_context(|| format!("Failed to resolve {spec_path:?}"))?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn name(stub_path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(stub_path)
        .with_context(|| format!("Failed to read stub {stub_path:?}"))?;
    let stub: StubArtifact = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse stub {stub_path:?}"))?;

    println!("{}", stub_file_name(&stub));
    if stub.response.specifies_body_content() {
        println!("{}", body_file_name(&stub));
    }
    Ok(())
}

fn record(
    spec_path: &Path,
    interactions_path: &Path,
    root: &Path,
    transformer_paths: &[PathBuf],
) -> Result<()> {
    let plan = RecordSpec::from_file(spec_path)?
        .resolve()
        .with_context(|| format!("Failed to resolve {spec_path:?}"))?;

    let registry = ExtensionRegistry::new();
    for path in transformer_paths {
        let script = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transformer {path:?}"))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        registry
            .register(ExtensionSpec::new(&stem, &script))
            .with_context(|| format!("Failed to load transformer {path:?}"))?;
    }

    let interactions = load_interactions(interactions_path)?;
    let (mappings, files) = file_stores(root);
    let result = Recorder::new(&plan, &registry, &mappings, &files)
        .record(&interactions)
        .context("Recording failed")?;

    info!("Recorded {} stubs into {:?}", result.len(), root);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn load_interactions(path: &Path) -> Result<Vec<CapturedInteraction>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read interactions {path:?}"))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_str(&contents).map_err(anyhow::Error::from)
    } else {
        serde_yaml::from_str(&contents).map_err(anyhow::Error::from)
    };
    parsed.with_context(|| format!("Failed to parse interactions {path:?}"))
}
