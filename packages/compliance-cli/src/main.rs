use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use compliance_extraction::{
    security::CompletionCredentials, CompletionService, CompletionServiceExt, DisabledCompletion,
    OpenAICompletion, Pipeline, PipelineConfig, RateLimitedCompletion, SegmentMode, TextLoader,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

/// Extract a compliance matrix from solicitation text files.
///
/// Each FILE is UTF-8 text with pages separated by form feeds
/// (`pdftotext` output). The run report is printed as JSON.
#[derive(Parser, Debug)]
#[command(name = "compliance", version)]
struct Cli {
    /// JSON pipeline configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Segmentation mode: heading, page or group:N
    #[arg(long, value_parser = config::parse_mode)]
    mode: Option<SegmentMode>,

    /// Skip the LLM stages and run the regex fast path only
    #[arg(long)]
    regex_only: bool,

    /// Completion model (overrides OPENAI_MODEL)
    #[arg(long, value_name = "NAME")]
    model: Option<String>,

    /// Write the report here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Documents to process, in order
    #[arg(required = true, value_name = "FILES")]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,compliance_extraction=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(mode) = cli.mode {
        config.segmenter.mode = mode;
    }
    if cli.regex_only {
        config.extraction.enable_llm = false;
    }

    let service = build_service(&config, cli.model.as_deref())?;
    let pipeline = Pipeline::with_config(service, config);

    tracing::info!(documents = cli.files.len(), "Starting extraction run");
    let report = pipeline.run(&TextLoader::new(), &cli.files).await;

    if !report.failures.is_empty() {
        tracing::warn!(failed = report.failures.len(), "Some documents failed; see report");
    }

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            tracing::info!(path = %path.display(), "Report written");
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn build_service(config: &PipelineConfig, model: Option<&str>) -> Result<Arc<dyn CompletionService>> {
    if !config.extraction.enable_llm {
        tracing::info!("LLM stages disabled, running regex fast path only");
        return Ok(Arc::new(DisabledCompletion));
    }

    let mut credentials =
        CompletionCredentials::from_env().context("Failed to load completion credentials")?;
    if let Some(model) = model {
        credentials = credentials.with_model(model);
    }

    let service = OpenAICompletion::new(credentials);
    tracing::info!(model = service.model(), "Using OpenAI-compatible completion service");

    let service: Arc<dyn CompletionService> =
        match (config::requests_per_second()?, config::requests_burst()?) {
            (Some(rate), Some(burst)) => {
                tracing::info!(requests_per_second = rate, burst, "Rate limiting completion calls");
                Arc::new(RateLimitedCompletion::with_burst(service, rate, burst))
            }
            (Some(rate), None) => {
                tracing::info!(requests_per_second = rate, "Rate limiting completion calls");
                Arc::new(service.rate_limited(rate))
            }
            (None, burst) => {
                if burst.is_some() {
                    tracing::warn!(
                        "{} ignored without {}",
                        config::REQUESTS_BURST_VAR,
                        config::REQUESTS_PER_SECOND_VAR
                    );
                }
                Arc::new(service)
            }
        };
    Ok(service)
}
