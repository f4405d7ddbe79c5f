use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use diffapply::{apply_diff, ApplicationStatus, Config};
use env_logger::Builder;
use log::{error, info, Level, LevelFilter};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Apply a unified diff to a file, using fuzzy matching when exact context fails.",
    long_about = "Reads a unified diff (optionally inside a ```diff markdown block) and applies it to a single file within a codebase root, trying an external patch tool, git apply, and an in-process fuzzy applicator in turn."
)]
struct Args {
    /// Path to the file containing the diff (optionally fenced in ```diff).
    diff_file: PathBuf,

    /// Path (relative to `codebase_dir`) of the file the diff targets.
    target_file: PathBuf,

    /// Root directory patches are resolved and applied against.
    #[arg(short = 'c', long)]
    codebase_dir: PathBuf,

    #[arg(
        long,
        help = "Skip the external patch/git-apply stages and go straight to the fuzzy applicator."
    )]
    force_fuzzy: bool,

    #[arg(
        long,
        default_value_t = diffapply::DEFAULT_MIN_CONFIDENCE,
        help = "Confidence floor for the fuzzy locator (0.0 to 1.0)."
    )]
    min_confidence: f64,

    #[arg(
        long,
        default_value_t = diffapply::DEFAULT_TOOL_TIMEOUT.as_secs(),
        help = "Timeout, in seconds, for each external patch/git-apply invocation."
    )]
    tool_timeout_secs: u64,

    /// Increase logging verbosity. Can be used multiple times (e.g., -v, -vv).
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        long_help = "Increase logging verbosity.\n-v for info, -vv for debug, -vvv for trace.\nBy default, only warnings and errors are shown."
    )]
    verbose: u8,

    #[arg(long, help = "Print the result as JSON instead of a human-readable summary.")]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| match record.level() {
            Level::Error => writeln!(buf, "{} {}", "error:".red().bold(), record.args()),
            Level::Warn => writeln!(buf, "{} {}", "warning:".yellow().bold(), record.args()),
            Level::Info => writeln!(buf, "{}", record.args()),
            Level::Debug => writeln!(buf, "{} {}", "debug:".blue().bold(), record.args()),
            Level::Trace => writeln!(buf, "{} {}", "trace:".cyan().bold(), record.args()),
        })
        .init();

    if !args.codebase_dir.is_dir() {
        anyhow::bail!(
            "Codebase directory '{}' not found or is not a directory.",
            args.codebase_dir.display()
        );
    }

    if !(0.0..=1.0).contains(&args.min_confidence) {
        anyhow::bail!("Minimum confidence must be between 0.0 and 1.0.");
    }

    let diff_text = fs::read_to_string(&args.diff_file)
        .with_context(|| format!("Failed to read diff file '{}'", args.diff_file.display()))?;

    let mut config = Config::new(&args.codebase_dir);
    config.force_fuzzy = args.force_fuzzy;
    config.min_confidence = args.min_confidence;
    config.tool_timeout = Duration::from_secs(args.tool_timeout_secs);

    info!(
        "Applying diff from '{}' to '{}'",
        args.diff_file.display(),
        args.target_file.display()
    );

    let result = apply_diff(&diff_text, &args.target_file, &config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    if result.status == ApplicationStatus::Error {
        std::process::exit(1);
    }

    Ok(())
}

fn print_summary(result: &diffapply::ApplicationResult) {
    let status_label = match result.status {
        ApplicationStatus::Success => "SUCCESS".green().bold(),
        ApplicationStatus::Partial => "PARTIAL".yellow().bold(),
        ApplicationStatus::Error => "ERROR".red().bold(),
    };

    println!("\n--- Result: {status_label} ---");
    println!("Succeeded:       {:?}", result.details.succeeded);
    println!("Failed:          {:?}", result.details.failed);
    println!("Already applied: {:?}", result.details.already_applied);
    println!("Changes written: {}", result.details.changes_written);

    if let Some(error) = &result.details.error {
        error!(
            "error: {}{}",
            error.kind,
            error
                .hunk
                .map(|h| format!(" (hunk #{h})"))
                .unwrap_or_default()
        );
    }
}
