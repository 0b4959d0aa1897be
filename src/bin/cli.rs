use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use threatlens::artifact::{CodeArtifact, DependencyGraph};
use threatlens::config::Config;
use threatlens::detectors::DetectorSet;
use threatlens::error::ThreatError;
use threatlens::output::OutputFormat;
use threatlens::AnalyzeOptions;

#[derive(Parser)]
#[command(
    name = "threatlens",
    about = "Threat-graph construction and risk-propagation engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze pre-parsed artifacts and emit findings plus threat graph
    Analyze {
        /// Path to the artifacts JSON file (array of CodeArtifact)
        artifacts: PathBuf,

        /// Path to the dependency graph JSON file
        #[arg(long, short = 'd')]
        deps: Option<PathBuf>,

        /// Config file path
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output format (console, json)
        #[arg(long, short = 'f', default_value = "console")]
        format: String,

        /// Write output to file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// List all registered detectors
    ListDetectors {
        /// Output format (table, json)
        #[arg(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// Generate a starter .threatlens.toml config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            artifacts,
            deps,
            config,
            format,
            output,
        } => cmd_analyze(artifacts, deps, config, format, output),
        Commands::ListDetectors { format } => cmd_list_detectors(format),
        Commands::Init { force } => cmd_init(force),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn cmd_analyze(
    artifacts_path: PathBuf,
    deps_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    format_str: String,
    output_path: Option<PathBuf>,
) -> Result<i32, ThreatError> {
    let format = OutputFormat::from_str_lenient(&format_str).unwrap_or_else(|| {
        eprintln!("Warning: unknown format '{}', using console", format_str);
        OutputFormat::Console
    });

    let artifacts: Vec<CodeArtifact> = read_json(&artifacts_path)?;
    let deps: DependencyGraph = match deps_path {
        Some(path) => read_json(&path)?,
        None => DependencyGraph::default(),
    };

    let target_name = artifacts_path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".into());

    let options = AnalyzeOptions {
        config_path,
        target_name,
    };

    let report = threatlens::analyze(&artifacts, &deps, &options)?;
    let rendered = threatlens::render_report(&report, format)?;

    match output_path {
        Some(out) => std::fs::write(&out, &rendered)?,
        None => print!("{}", rendered),
    }

    // Exit code: 0 = clean, 1 = critical findings present
    let has_critical = report
        .findings
        .iter()
        .any(|f| f.severity == threatlens::detectors::Severity::Critical);
    Ok(if has_critical { 1 } else { 0 })
}

fn cmd_list_detectors(format_str: String) -> Result<i32, ThreatError> {
    let set = DetectorSet::new();
    let detectors = set.list();

    match format_str.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&detectors)?;
            println!("{}", json);
        }
        _ => {
            println!(
                "{:<10} {:<28} {:<10} {:<10} FAMILY",
                "ID", "NAME", "SEVERITY", "CWE"
            );
            println!("{}", "-".repeat(80));
            for detector in &detectors {
                println!(
                    "{:<10} {:<28} {:<10} {:<10} {}",
                    detector.id,
                    detector.name,
                    detector.default_severity.to_string(),
                    detector.cwe_id.as_deref().unwrap_or("-"),
                    detector.detector_type,
                );
            }
        }
    }

    Ok(0)
}

fn cmd_init(force: bool) -> Result<i32, ThreatError> {
    let path = PathBuf::from(".threatlens.toml");

    if path.exists() && !force {
        eprintln!(".threatlens.toml already exists. Use --force to overwrite.");
        return Ok(1);
    }

    std::fs::write(&path, Config::starter_toml())?;
    println!("Created .threatlens.toml");

    Ok(0)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T, ThreatError> {
    let content = std::fs::read_to_string(path).map_err(|e| ThreatError::ArtifactUnreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(serde_json::from_str(&content)?)
}
