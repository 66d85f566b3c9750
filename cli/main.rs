#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process;

use cardguard::config::Settings;
use cardguard::error::PredictionError;
use cardguard::variant::{RawVariant, ReconstructedVariant};

mod render;
mod session;

use render::{OutputFormat, render_raw, render_reconstructed, render_result, render_vector};
use session::{SessionHandles, SessionState};

#[derive(Args)]
pub struct PredictArgs {
    /// Hour of the transaction (0-23); defaults to the configured value
    #[arg(long)]
    pub hour: Option<u32>,

    /// Transaction amount (non-negative); defaults to the configured value
    #[arg(long, allow_negative_numbers = true)]
    pub amount: Option<f64>,

    /// Path to the trained model file (.toml)
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Path to the reference dataset (.csv, .csv.gz or .csv.zip)
    #[arg(long)]
    pub data: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct RawArgs {
    /// Exactly 29 comma-separated numeric values
    #[arg(value_name = "VALUES", allow_hyphen_values = true)]
    pub values: String,

    /// Path to the trained raw-vector model file (.toml)
    #[arg(long)]
    pub model: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct ReconstructArgs {
    #[arg(long)]
    pub hour: Option<u32>,

    #[arg(long, allow_negative_numbers = true)]
    pub amount: Option<f64>,

    /// Path to the reference dataset (.csv, .csv.gz or .csv.zip)
    #[arg(long)]
    pub data: Option<PathBuf>,
}

#[derive(Args)]
pub struct SessionArgs {
    /// Model for hour/amount predictions
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Model for raw 29-value predictions
    #[arg(long)]
    pub raw_model: Option<PathBuf>,

    /// Path to the reference dataset (.csv, .csv.gz or .csv.zip)
    #[arg(long)]
    pub data: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "cardguard",
    about = "Credit card fraud verdicts from a pre-trained model",
    long_about = "Scores a transaction either from its hour and amount, with every other \
                 feature imputed from reference dataset medians, or from a raw vector of \
                 29 feature values."
)]
struct Cli {
    /// Settings file (defaults to ./cardguard.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a transaction from its hour and amount
    #[command(about = "Predict fraud from hour and amount")]
    Predict(PredictArgs),

    /// Score a raw 29-value feature vector
    #[command(about = "Predict fraud from 29 raw feature values")]
    Raw(RawArgs),

    /// Print the feature vector built for an hour and amount
    #[command(about = "Show the reconstructed feature vector")]
    Reconstruct(ReconstructArgs),

    /// Interactive session with both input forms
    #[command(about = "Start an interactive session on stdin")]
    Session(SessionArgs),

    /// Display version and build information
    #[command(about = "Display version and build information")]
    Version,
}

fn predict(settings: Settings, args: PredictArgs) -> Result<(), Box<dyn std::error::Error>> {
    let model = args.model.unwrap_or(settings.model_path);
    let data = args.data.unwrap_or(settings.dataset_path);
    let hour = args.hour.unwrap_or(settings.defaults.hour);
    let amount = args.amount.unwrap_or(settings.defaults.amount);

    let variant = ReconstructedVariant::initialize(&model, &data).map_err(user_error)?;
    let result = variant.predict(hour, amount).map_err(user_error)?;
    println!("{}", render_result(&result, args.format, render_reconstructed)?);
    Ok(())
}

fn raw(settings: Settings, args: RawArgs) -> Result<(), Box<dyn std::error::Error>> {
    let model = args.model.unwrap_or(settings.raw_model_path);

    let variant = RawVariant::initialize(&model).map_err(user_error)?;
    let result = variant.predict(&args.values).map_err(user_error)?;
    println!("{}", render_result(&result, args.format, render_raw)?);
    Ok(())
}

fn reconstruct(settings: Settings, args: ReconstructArgs) -> Result<(), Box<dyn std::error::Error>> {
    let data = args.data.unwrap_or(settings.dataset_path);
    let hour = args.hour.unwrap_or(settings.defaults.hour);
    let amount = args.amount.unwrap_or(settings.defaults.amount);

    let dataset = cardguard::data::ReferenceDataset::load(&data)
        .map_err(|err| user_error(err.into()))?;
    println!(
        "Reference dataset: {} unique rows, {} malformed rows skipped, {} duplicates removed",
        dataset.n_rows(),
        dataset.skipped_rows(),
        dataset.duplicate_rows()
    );
    let reconstructor = cardguard::features::FeatureReconstructor::from_dataset(&dataset);
    let vector = reconstructor
        .reconstruct(hour, amount)
        .map_err(|err| user_error(err.into()))?;
    println!("{}", render_vector(&vector));
    Ok(())
}

fn run_session(settings: Settings, args: SessionArgs) -> Result<(), Box<dyn std::error::Error>> {
    let model = args.model.unwrap_or(settings.model_path);
    let raw_model = args.raw_model.unwrap_or(settings.raw_model_path);
    let data = args.data.unwrap_or(settings.dataset_path);

    let handles = SessionHandles {
        reconstructed: ReconstructedVariant::initialize(&model, &data),
        raw: RawVariant::initialize(&raw_model),
    };
    for (name, failure) in [
        ("hour/amount", handles.reconstructed.as_ref().err()),
        ("raw vector", handles.raw.as_ref().err()),
    ] {
        if let Some(err) = failure {
            log::warn!("The {name} form is unavailable: {err}");
        }
    }

    let mut state = SessionState::new(settings.defaults);
    session::run(io::stdin().lock(), io::stdout().lock(), &mut state, &handles)?;
    Ok(())
}

/// Converts a request failure into the message shown on stderr.
fn user_error(err: PredictionError) -> Box<dyn std::error::Error> {
    err.user_message().into()
}

/// Format seconds into a duration like "2.4 hours ago"
fn format_duration_ago(seconds: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;
    const WEEK: u64 = 7 * DAY;

    if seconds < MINUTE {
        format!("{} seconds ago", seconds)
    } else if seconds < HOUR {
        format!("{:.1} minutes ago", seconds as f64 / MINUTE as f64)
    } else if seconds < DAY {
        format!("{:.1} hours ago", seconds as f64 / HOUR as f64)
    } else if seconds < WEEK {
        format!("{:.1} days ago", seconds as f64 / DAY as f64)
    } else {
        format!("{:.1} weeks ago", seconds as f64 / WEEK as f64)
    }
}

fn print_version_info() {
    let version = env!("CARGO_PKG_VERSION");
    let build_timestamp: u64 = env!("CARDGUARD_BUILD_TIMESTAMP").parse().unwrap_or(0);

    println!("cardguard {}", version);

    if build_timestamp > 0 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        if now > build_timestamp {
            println!("Built: {}", format_duration_ago(now - build_timestamp));
        } else {
            println!("Built: just now");
        }
    } else {
        println!("Built: development build");
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let Cli { config, command } = cli;

    let settings = match Settings::discover(config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let result = match command {
        Some(Commands::Predict(args)) => predict(settings, args),
        Some(Commands::Raw(args)) => raw(settings, args),
        Some(Commands::Reconstruct(args)) => reconstruct(settings, args),
        Some(Commands::Session(args)) => run_session(settings, args),
        Some(Commands::Version) => {
            print_version_info();
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
