use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tonnetz::config::AppConfig;
use tonnetz::events::Mode;
use tonnetz::report::{AnalysisOptions, AnalysisReport, ReportSummary};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "tonnetz", version, about = "Note-transition graphs and statistics from MIDI")]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    #[value(alias = "monophonic")]
    Mono,
    #[value(alias = "polyphonic")]
    Poly,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Mono => Mode::Monophonic,
            ModeArg::Poly => Mode::Polyphonic,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the transition matrix for one channel and report statistics and centralities
    Analyze {
        /// MIDI file to analyze
        file: PathBuf,

        /// MIDI channel (0-15); falls back to the config file
        #[arg(short, long, allow_negative_numbers = true)]
        channel: Option<i32>,

        /// Transition counting mode
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Keep notes with no transitions in the graph output
        #[arg(long)]
        show_isolated: bool,

        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyze every MIDI file under the given directories (one JSON line per file)
    Scan {
        /// Directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// MIDI channel (0-15); falls back to the config file
        #[arg(short, long, allow_negative_numbers = true)]
        channel: Option<i32>,

        /// Transition counting mode
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Print the note index → name table
    Labels,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    match cli.command {
        Commands::Analyze {
            file,
            channel,
            mode,
            show_isolated,
            output,
        } => {
            let options = resolve_options(&config, channel, mode, show_isolated)?;
            let report = AnalysisReport::from_file(&file, options)
                .with_context(|| format!("Failed to analyze {}", file.display()))?;
            let json = serde_json::to_string_pretty(&report)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    log::info!("Report written to {}", path.display());
                }
                None => println!("{}", json),
            }
        }

        Commands::Scan {
            paths,
            channel,
            mode,
            jobs,
        } => {
            let options = resolve_options(&config, channel, mode, false)?;
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let files = collect_midi_files(&paths);
            if files.is_empty() {
                anyhow::bail!("No MIDI files found under the given paths");
            }

            let summaries = scan_files(&files, options, workers)?;
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for summary in &summaries {
                writeln!(out, "{}", serde_json::to_string(summary)?)?;
            }
            log::info!(
                "Scan complete: {} analyzed, {} failed",
                summaries.len(),
                files.len() - summaries.len()
            );
        }

        Commands::Labels => {
            let labels: std::collections::BTreeMap<usize, String> =
                tonnetz::matrix::note_labels().into_iter().collect();
            println!("{}", serde_json::to_string_pretty(&labels)?);
        }
    }

    Ok(())
}

fn resolve_options(
    config: &AppConfig,
    channel: Option<i32>,
    mode: Option<ModeArg>,
    show_isolated: bool,
) -> Result<AnalysisOptions> {
    config
        .analysis_options(channel, mode.map(Mode::from), show_isolated)
        .context("No channel given. Pass --channel or set `channel` in the config file.")
}

/// Walk directories for files with a supported MIDI extension.
fn collect_midi_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() && has_midi_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files
}

fn has_midi_extension(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    tonnetz::SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Analyze files in parallel. Failures are logged and skipped.
fn scan_files(
    files: &[PathBuf],
    options: AnalysisOptions,
    workers: usize,
) -> Result<Vec<ReportSummary>> {
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("Failed to build worker pool")?;

    let summaries: Vec<ReportSummary> = pool.install(|| {
        files
            .par_iter()
            .filter_map(|file| {
                let result = AnalysisReport::from_file(file, options);
                pb.inc(1);
                match result {
                    Ok(report) => Some(report.summary(&file.to_string_lossy())),
                    Err(e) => {
                        log::warn!("Skipping {}: {}", file.display(), e);
                        None
                    }
                }
            })
            .collect()
    });

    pb.finish_with_message("done");
    Ok(summaries)
}
