use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use llmscan::config;
use llmscan::error::{Result, ScanError};
use llmscan::observability;
use llmscan::report::{self, EngineReport};

#[derive(Parser)]
#[command(name = "llmscan")]
#[command(version, about = "Static scanner for LLM integration risks — leaked keys, unsanitized prompts, missing rate limits")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory tree against the LLM integration policies
    Scan {
        /// Directory to scan (default: current dir)
        #[arg(default_value = ".")]
        directory: String,
        /// Config file (default: <directory>/llm-policy.yml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Emit the full report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    observability::init_logging();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Scan {
            directory,
            config,
            json,
        } => run_scan(&directory, config.as_deref(), json),
    };

    // Findings are advisory: only operational errors fail the process.
    if let Err(e) = outcome {
        eprintln!("llmscan: {e}");
        process::exit(1);
    }
}

fn run_scan(directory: &str, config_path: Option<&std::path::Path>, json: bool) -> Result<()> {
    let root = PathBuf::from(directory);
    if !root.is_dir() {
        return Err(ScanError::Other(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let cfg = config::load_config(&root, config_path);
    let report = report::aggregate(&root, &cfg);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_engine("api-key-security", report.api_key_security.as_ref());
    print_engine("rate-limit", report.rate_limit.as_ref());
    print_engine("input-sanitize", report.input_sanitize.as_ref());

    let total = report.total_findings();
    if total == 0 {
        println!("all checks passed");
    } else {
        println!("{total} finding(s) — advisory only, see details above");
    }
    Ok(())
}

fn print_engine(name: &str, engine: Option<&EngineReport>) {
    let Some(engine) = engine else {
        return;
    };
    println!("[{name}] {} finding(s)", engine.total);
    for detail in &engine.details {
        println!("  warning: {detail}");
    }
    if engine.total > engine.details.len() {
        println!(
            "  ... and {} more (truncated)",
            engine.total - engine.details.len()
        );
    }
}
