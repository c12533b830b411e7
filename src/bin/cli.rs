// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe Features CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use polyframe_features::cli::Reporter;
use polyframe_features::geometry::MeshAdjacency;
use polyframe_features::{
    io, AnalysisConfig, AnalysisMode, AnalysisReport, CancellationToken, FeatureRecognizer, Mesh,
    Part,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "polyframe-features")]
#[command(about = "Polyframe Features - machining feature recognition for STL meshes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize features in one or more STL files
    Analyze {
        /// Input STL file(s)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        options: AnalysisOptions,

        /// Write the report as JSON (one input only)
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,
    },

    /// Print mesh statistics without running detection
    Inspect {
        /// Input STL file
        input: PathBuf,
    },

    /// Analyze a built-in reference part
    Demo {
        /// Part name, or "list"
        part: String,

        #[command(flatten)]
        options: AnalysisOptions,

        /// Also write the part as STL
        #[arg(long, value_name = "FILE")]
        stl: Option<PathBuf>,
    },

    /// Print the effective configuration, or save it
    Config {
        /// Config file to read
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the configuration here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

#[derive(clap::Args)]
struct AnalysisOptions {
    /// Config file (defaults to polyframe-features.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Analysis mode (fast, balanced, thorough)
    #[arg(short, long)]
    mode: Option<AnalysisMode>,

    /// Confidence threshold override
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Disable compound feature merging
    #[arg(long)]
    no_compound: bool,

    /// Abort after this many milliseconds (shared by every input)
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,
}

impl AnalysisOptions {
    fn recognizer(&self) -> Result<FeatureRecognizer> {
        let mut config = AnalysisConfig::load(self.config.as_deref())?;
        if let Some(mode) = self.mode {
            config = config.with_mode(mode);
        }
        if let Some(threshold) = self.threshold {
            config = config.with_threshold(threshold);
        }
        if self.no_compound {
            config = config.with_compound_features(false);
        }

        let recognizer = FeatureRecognizer::new(config).context("Invalid configuration")?;
        Ok(match self.timeout {
            Some(ms) => recognizer
                .with_cancellation(CancellationToken::with_timeout(Duration::from_millis(ms))),
            None => recognizer,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    // RUST_LOG directives refine the --log-level default
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let outcome = match cli.command {
        Commands::Analyze {
            inputs,
            options,
            json,
        } => analyze_command(&inputs, &options, json.as_deref()),
        Commands::Inspect { input } => inspect_command(&input),
        Commands::Demo { part, options, stl } => demo_command(&part, &options, stl.as_deref()),
        Commands::Config { config, output } => config_command(config.as_deref(), output.as_deref()),
        Commands::Version => {
            println!("Polyframe Features v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(err) = &outcome {
        Reporter::report_error(&format!("{:#}", err));
        std::process::exit(1);
    }
    Ok(())
}

fn analyze_command(inputs: &[PathBuf], options: &AnalysisOptions, json: Option<&Path>) -> Result<()> {
    if json.is_some() && inputs.len() > 1 {
        bail!("--json takes a single input");
    }
    let recognizer = options.recognizer()?;

    let progress = (inputs.len() > 1).then(|| {
        let pb = ProgressBar::new(inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    });

    let mut results: Vec<(String, Result<AnalysisReport>)> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let name = input.display().to_string();
        if let Some(pb) = &progress {
            pb.set_message(name.clone());
        }
        let outcome = io::load_stl(input).and_then(|buffers| {
            recognizer
                .analyze(&buffers)
                .with_context(|| format!("Analysis of {} failed", name))
        });
        results.push((name, outcome));
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let mut failures = 0;
    for (name, outcome) in &results {
        match outcome {
            Ok(report) => {
                Reporter::report_analysis(name, report);
                if let Some(path) = json {
                    io::export_report_json(report, path)?;
                    Reporter::success(&format!("Report written to {}", path.display()));
                }
            }
            Err(err) => {
                failures += 1;
                Reporter::report_error(&format!("{}: {:#}", name, err));
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} analyses failed", failures, results.len());
    }
    Ok(())
}

fn inspect_command(input: &Path) -> Result<()> {
    let start = Instant::now();
    let buffers = io::load_stl(input)?;
    let mesh = Mesh::ingest(&buffers).with_context(|| format!("Invalid mesh: {:?}", input))?;
    let adjacency = MeshAdjacency::build(&mesh);
    let boundary = adjacency.boundary_edge_count();
    Reporter::report_mesh(&input.display().to_string(), &mesh, boundary, start.elapsed());
    if boundary > 0 {
        Reporter::report_warning("Mesh is not closed; wall and floor tests may be unreliable");
    }
    Ok(())
}

fn demo_command(name: &str, options: &AnalysisOptions, stl: Option<&Path>) -> Result<()> {
    if name == "list" {
        for name in Part::names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let part = match Part::named(name) {
        Some(part) => part,
        None => bail!("Unknown part '{}', expected one of: {}", name, Part::names().join(", ")),
    };
    let buffers = part.to_buffers();
    if let Some(path) = stl {
        io::write_stl(&buffers, path)?;
        Reporter::report_info(&format!("Wrote {} to {}", name, path.display()));
    }

    let report = options.recognizer()?.analyze(&buffers)?;
    Reporter::report_analysis(name, &report);
    Ok(())
}

fn config_command(config: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let config = AnalysisConfig::load(config)?;
    match output {
        Some(path) => {
            config.save(path)?;
            Reporter::success(&format!("Configuration saved to {}", path.display()));
        }
        None => print!("{}", toml::to_string_pretty(&config)?),
    }
    Ok(())
}
