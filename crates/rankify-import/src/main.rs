//! Rankify Import - bulk CSV import tool

use anyhow::{Context, Result};
use clap::Parser;
use rankify_common::logging::{init_logging, LogConfig, LogLevel};
use rankify_import::console::{format_count, preview_table, ConsoleObserver};
use rankify_import::decoder::{FileSource, ImportSource, ReaderSource};
use rankify_import::sample::{write_sample, SAMPLE_FILE_NAME};
use rankify_import::{
    ApiClient, CategoryId, DryRunSink, ImportConfig, ImportMode, Importer, UploadSink,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Preview rows printed after a run
const PREVIEW_PRINT_LIMIT: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "rankify-import")]
#[command(author, version, about = "Bulk import businesses and providers into Rankify")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Import a CSV file
    Run {
        /// CSV file to import, or '-' for stdin
        #[arg(short, long)]
        input: PathBuf,

        /// Record type: business or provider
        #[arg(short, long, default_value = "business")]
        mode: ImportMode,

        /// Category id, name or slug applied to every record
        #[arg(short, long)]
        category: String,

        /// Records per uploaded batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Read window in bytes
        #[arg(long)]
        window_bytes: Option<usize>,

        /// Parse and map the file without uploading anything
        #[arg(long)]
        dry_run: bool,

        /// Rankify API root URL
        #[arg(long, env = "RANKIFY_API_URL")]
        server_url: Option<String>,

        /// Admin session token
        #[arg(long, env = "RANKIFY_API_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Write a sample CSV showing the supported columns
    Sample {
        /// Output file
        #[arg(short, long, default_value = SAMPLE_FILE_NAME)]
        output: PathBuf,
    },

    /// List categories available for imports
    Categories {
        /// Rankify API root URL
        #[arg(long, env = "RANKIFY_API_URL")]
        server_url: Option<String>,
    },
}

fn open_source(input: &Path) -> Result<Arc<dyn ImportSource>> {
    if input.as_os_str() == "-" {
        return Ok(Arc::new(ReaderSource::stdin()));
    }

    let is_csv = input
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        anyhow::bail!(
            "Input must be a .csv file, got '{}'. Use 'rankify-import sample' for an example.",
            input.display()
        );
    }
    if !input.is_file() {
        anyhow::bail!("Input file not found: '{}'", input.display());
    }
    Ok(Arc::new(FileSource::new(input)))
}

#[allow(clippy::too_many_arguments)]
async fn run_import(
    mut config: ImportConfig,
    input: PathBuf,
    mode: ImportMode,
    category: String,
    batch_size: Option<usize>,
    window_bytes: Option<usize>,
    dry_run: bool,
    server_url: Option<String>,
    token: Option<String>,
) -> Result<()> {
    if let Some(batch_size) = batch_size {
        config.pipeline = config.pipeline.with_batch_size(batch_size);
    }
    if let Some(window_bytes) = window_bytes {
        config.pipeline.decoder.window_bytes = window_bytes;
        config.pipeline.decoder.min_window_bytes =
            config.pipeline.decoder.min_window_bytes.min(window_bytes);
    }
    if let Some(url) = server_url {
        config.api.base_url = url;
    }
    if token.is_some() {
        config.api.token = token;
    }
    config.validate()?;

    let source = open_source(&input)?;

    let sink: Arc<dyn UploadSink>;
    let category_id: CategoryId;
    if dry_run {
        category_id = category
            .trim()
            .parse()
            .context("--dry-run needs a numeric --category since categories are not looked up")?;
        sink = Arc::new(DryRunSink);
    } else {
        let client = ApiClient::new(&config.api)?;
        category_id = client.resolve_category(&category).await?;
        sink = Arc::new(client);
    }

    info!(
        input = %input.display(),
        mode = %mode,
        category_id,
        dry_run,
        "Starting import"
    );

    let observer = Arc::new(ConsoleObserver::new(&source.name()));
    let importer = Importer::new(config.pipeline, sink).with_observer(observer.clone());
    let job = importer.start(source, mode, category_id);

    let cancel = job.abort_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling after the current row");
            cancel.cancel();
        }
    });

    match job.wait().await {
        Ok(summary) => {
            observer.finish(format!(
                "Imported {} of {} rows ({} skipped without a name) in {} batches",
                format_count(summary.uploaded),
                format_count(summary.processed),
                summary.skipped,
                summary.batches
            ));
            if !summary.preview.is_empty() {
                let shown = summary.preview.len().min(PREVIEW_PRINT_LIMIT);
                println!(
                    "\nPreview (first {} rows):\n{}",
                    shown,
                    preview_table(&summary.preview[..shown])
                );
            }
            Ok(())
        }
        Err(failure) => {
            observer.abandon("Import failed");
            Err(failure.into())
        }
    }
}

async fn list_categories(mut config: ImportConfig, server_url: Option<String>) -> Result<()> {
    if let Some(url) = server_url {
        config.api.base_url = url;
    }
    let client = ApiClient::new(&config.api)?;
    let categories = client.list_categories().await?;

    for category in &categories {
        println!(
            "{:>6}  {}  {}",
            category.id,
            category.name,
            category.full_slug.as_deref().or(category.slug.as_deref()).unwrap_or("")
        );
    }
    info!(count = categories.len(), "Listed categories");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut log_config = LogConfig::for_binary("rankify-import").with_env()?;
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    let _log_guard = init_logging(&log_config)?;

    let config = ImportConfig::from_env()?;

    match cli.command {
        Command::Run {
            input,
            mode,
            category,
            batch_size,
            window_bytes,
            dry_run,
            server_url,
            token,
        } => {
            run_import(
                config,
                input,
                mode,
                category,
                batch_size,
                window_bytes,
                dry_run,
                server_url,
                token,
            )
            .await?;
        },
        Command::Sample { output } => {
            let file = std::fs::File::create(&output)
                .with_context(|| format!("Failed to create '{}'", output.display()))?;
            write_sample(file)?;
            info!(output = %output.display(), "Sample CSV written");
        },
        Command::Categories { server_url } => {
            list_categories(config, server_url).await?;
        },
    }

    Ok(())
}
