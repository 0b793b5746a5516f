//! SourceTrace CLI: provenance triage for user-generated media.
//!
//! Two subcommands: `analyze` runs the full signal-collection and synthesis
//! pipeline over a local file or remote URL; `outreach` drafts a
//! rights-clearance message for a content owner. Both print a JSON report
//! to stdout so the output can be piped into other tools.

use clap::Parser;
use sourcetrace_core::error::ValidationError;
use sourcetrace_core::types::{AnalysisInput, LicenseParams, OwnerInfo};
use sourcetrace_core::TriagePipeline;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// SourceTrace: provenance triage for user-generated media
#[derive(Parser, Debug)]
#[command(name = "sourcetrace", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (for `.sourcetrace/config.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Backend model override
    #[arg(short, long)]
    model: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Analyze a media item and print the verdict report
    Analyze {
        /// Path to a local media file
        path: Option<PathBuf>,

        /// Analyze a remote URL instead of a local file
        #[arg(long, conflicts_with = "path")]
        url: Option<String>,

        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,
    },
    /// Draft a rights-clearance outreach message
    Outreach {
        /// Owner handle (e.g. "@stormchaser99")
        #[arg(long)]
        handle: String,

        /// Platform the content was found on (e.g. "Twitter/X")
        #[arg(long)]
        platform: String,

        /// Intended use: breaking_news, feature_story, documentary,
        /// social_media, archive
        #[arg(long, default_value = "breaking_news")]
        use_case: String,

        /// License scope: single_use, multiple_use, exclusive
        #[arg(long, default_value = "single_use")]
        scope: String,

        /// Territory: worldwide, regional, local
        #[arg(long, default_value = "worldwide")]
        territory: String,

        /// Compensation: standard_rate, premium, negotiable, attribution
        #[arg(long, default_value = "standard_rate")]
        compensation: String,

        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "sourcetrace", "sourcetrace")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "sourcetrace.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| cli.workspace.clone());
    debug!(workspace = %workspace.display(), "Resolved workspace");

    let mut config = sourcetrace_core::load_config(Some(&workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if let Some(model) = &cli.model {
        config.backend.model = model.clone();
    }
    info!(
        provider = config.backend.provider.as_str(),
        model = config.backend.model.as_str(),
        "Configuration loaded"
    );

    let pipeline = TriagePipeline::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize pipeline: {}", e))?;

    match cli.command {
        Commands::Analyze { path, url, pretty } => {
            let input = match (path, url) {
                (Some(path), None) => AnalysisInput::File(path),
                (None, Some(url)) => AnalysisInput::Url(url),
                _ => {
                    return Err(ValidationError::MissingField {
                        field: "media path or --url".into(),
                    }
                    .into());
                }
            };
            let report = pipeline.analyze(input).await?;
            print_json(&report, pretty)?;
        }
        Commands::Outreach {
            handle,
            platform,
            use_case,
            scope,
            territory,
            compensation,
            pretty,
        } => {
            let owner = OwnerInfo { handle, platform };
            let params = LicenseParams::from_raw(&use_case, &scope, &territory, &compensation)?;
            let report = pipeline.outreach(&owner, &params).await?;
            print_json(&report, pretty)?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}
