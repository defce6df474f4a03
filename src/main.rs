use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use magpie::config::Config;
use magpie::monitor::{self, RunMode};

/// Magpie: receipt collection from Facebook post comments.
///
/// Watches a post for comments carrying receipt photos, archives them
/// locally, and uploads deduplicated rows to a Google Sheets spreadsheet.
#[derive(Parser)]
#[command(name = "magpie", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor the post continuously, sweeping every INTERVAL seconds
    Monitor {
        /// Post id to monitor (default: TARGET_POST_ID from the environment)
        #[arg(long)]
        post_id: Option<String>,

        /// Spreadsheet id to upload to (default: SPREADSHEET_ID)
        #[arg(long)]
        spreadsheet: Option<String>,

        /// Worksheet title (default: WORKSHEET_NAME)
        #[arg(long)]
        worksheet: Option<String>,
    },

    /// Run exactly one sweep of the post, then exit
    Scan {
        /// Post id to sweep (default: TARGET_POST_ID from the environment)
        #[arg(long)]
        post_id: Option<String>,

        /// Spreadsheet id to upload to (default: SPREADSHEET_ID)
        #[arg(long)]
        spreadsheet: Option<String>,

        /// Worksheet title (default: WORKSHEET_NAME)
        #[arg(long)]
        worksheet: Option<String>,
    },

    /// Extract structured fields from a receipt image URL
    Extract {
        /// URL of the receipt image (e.g. a comment attachment URL)
        image_url: String,
    },

    /// Show system status (archive stats, snapshot, upload target)
    Status,

    /// Serve the HTTP trigger API
    #[cfg(feature = "web")]
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8000")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("magpie=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor {
            post_id,
            spreadsheet,
            worksheet,
        } => {
            run_and_report(post_id, spreadsheet, worksheet, RunMode::Continuous).await?;
        }

        Commands::Scan {
            post_id,
            spreadsheet,
            worksheet,
        } => {
            run_and_report(post_id, spreadsheet, worksheet, RunMode::OneClick).await?;
        }

        Commands::Extract { image_url } => {
            let config = Config::load()?;
            config.require_gemini()?;

            println!("Downloading receipt image...");
            let image = magpie::receipt::fetch_image(&image_url).await?;

            println!("Extracting fields ({} bytes)...", image.len());
            let extractor = magpie::receipt::gemini::GeminiExtractor::new(
                &config.gemini_api_key,
                &config.gemini_model,
            );

            use magpie::receipt::traits::ReceiptExtractor;
            let receipt = extractor.extract(&image).await?;

            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }

        Commands::Status => {
            let config = Config::load()?;
            magpie::status::show(&config)?;
        }

        #[cfg(feature = "web")]
        Commands::Serve { port, bind } => {
            let config = Config::load()?;
            magpie::web::run_server(config, port, &bind).await?;
        }
    }

    Ok(())
}

/// Resolve CLI overrides against the environment config, run the pipeline,
/// and print the terminal status string.
async fn run_and_report(
    post_id: Option<String>,
    spreadsheet: Option<String>,
    worksheet: Option<String>,
    mode: RunMode,
) -> Result<()> {
    let config = Config::load()?;
    config.require_graph()?;

    let target_post = post_id.unwrap_or_else(|| config.target_post_id.clone());
    if target_post.is_empty() {
        anyhow::bail!("No post id. Set TARGET_POST_ID or pass --post-id.");
    }

    let spreadsheet_id = spreadsheet.unwrap_or_else(|| config.spreadsheet_id.clone());
    if spreadsheet_id.is_empty() {
        config.require_sheets()?;
    }
    let worksheet = worksheet.unwrap_or_else(|| config.worksheet_name.clone());

    match monitor::run_pipeline(&config, &target_post, &spreadsheet_id, &worksheet, mode).await {
        Ok(status) => {
            println!("\n{}", status.bold());
            Ok(())
        }
        Err(e) => {
            eprintln!("\n{}", format!("Monitor failed: {e:#}").red());
            Err(e)
        }
    }
}
