//! # `seogen` Library Crate
//!
//! Command handling for the `seogen` CLI: argument parsing, wiring of the
//! configured providers into per-credential workers, and the subcommands.

pub mod config;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crate::config::AppConfig;
use seogen::{
    batch::{BatchRunner, BatchSettings, OptionCollector},
    data::{CityCatalog, SortColumn},
    links::LinkValidator,
    normalize::{parse, repair},
    pipeline::{ImageStage, ItemPipeline},
    prompts::{PromptTemplates, CITY_TEMPLATE, CONTENT_TEMPLATE, IMAGE_TEMPLATE, OPTIONS_TEMPLATE},
    providers::{create_ai_provider, create_image_provider},
    rate_limit::RateLimiter,
    storage::{to_json_pretty, ImageStore},
    types::{format_elapsed, BatchSummary},
    ItemError,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

// --- CLI Argument Structs ---

#[derive(Parser, Debug)]
#[command(author, version, about = "Rate-governed SEO content generation", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file. Defaults to `./seogen.yml` when present.
    #[arg(long, short, global = true, env = "SEOGEN_CONFIG")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate content for every option of every city in a category
    Generate(GenerateArgs),
    /// Ask the model for each city's option list in a category
    CollectOptions(CollectOptionsArgs),
    /// Check whether URLs answer a HEAD request with a success status
    CheckLinks(CheckLinksArgs),
    /// Repair a model response and print it as JSON
    Repair(RepairArgs),
}

impl Commands {
    /// The subcommand name, used in log file names.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Generate(_) => "generate",
            Commands::CollectOptions(_) => "collect-options",
            Commands::CheckLinks(_) => "check-links",
            Commands::Repair(_) => "repair",
        }
    }
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// The content category, e.g. `cheap_eats`. Selects the prompt file and
    /// the option, output and image directories.
    pub category: String,
    /// Index of the first city to process in the sorted catalog.
    #[arg(long)]
    pub from: Option<usize>,
    /// Index one past the last city to process.
    #[arg(long)]
    pub to: Option<usize>,
    /// Only process the named cities.
    #[arg(long, value_delimiter = ',')]
    pub cities: Option<Vec<String>>,
    /// Only generate items missing from existing city documents.
    #[arg(long)]
    pub resume: bool,
    /// Skip the image stage even when it is enabled in the configuration.
    #[arg(long)]
    pub no_images: bool,
    /// Send one `city` prompt per city and store the answer as the city's
    /// document, for categories without option lists.
    #[arg(long)]
    pub per_city: bool,
    /// The catalog column cities are ordered by before slicing: `city` or `country`.
    #[arg(long, default_value = "city")]
    pub sort: SortColumn,
}

#[derive(Args, Debug)]
pub struct CollectOptionsArgs {
    pub category: String,
    /// The catalog column cities are ordered by: `city` or `country`.
    #[arg(long, default_value = "city")]
    pub sort: SortColumn,
    /// Leave cities that already have an option file untouched.
    #[arg(long)]
    pub skip_existing: bool,
}

#[derive(Args, Debug)]
pub struct CheckLinksArgs {
    #[arg(required = true)]
    pub urls: Vec<String>,
}

#[derive(Args, Debug)]
pub struct RepairArgs {
    /// File holding the raw response. Reads standard input when omitted.
    pub file: Option<PathBuf>,
}

// --- Logging ---

/// The filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_DIRECTIVE: &str = "seogen=info";

/// Builds the log filter from `RUST_LOG`, falling back to [`DEFAULT_LOG_DIRECTIVE`].
pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
}

/// Installs the global tracing subscriber.
///
/// Logs go to stderr unless `log_dir` is set, in which case they are written to
/// `<log_dir>/seogen_<command>_<YYYYmmddHHMMSS>.log`, whose path is returned.
pub fn init_tracing(log_dir: Option<&Path>, command: &str) -> Result<Option<PathBuf>> {
    let builder = fmt::Subscriber::builder().with_env_filter(log_filter());

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
            let path = dir.join(format!("seogen_{}_{stamp}.log", command.replace('-', "_")));
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let subscriber = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
            Ok(Some(path))
        }
        None => {
            let subscriber = builder.with_writer(std::io::stderr).finish();
            tracing::subscriber::set_global_default(subscriber)?;
            Ok(None)
        }
    }
}

// --- Core Logic ---

/// Runs a parsed command against the loaded configuration.
pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command {
        Commands::Generate(args) => {
            let summary = generate(&config, &args).await?;
            print_summary(&args.category, &summary);
        }
        Commands::CollectOptions(args) => {
            let summary = collect_options(&config, &args).await?;
            print_summary(&args.category, &summary);
        }
        Commands::CheckLinks(args) => {
            for (url, valid) in check_links(&config, &args.urls).await? {
                println!("{}\t{url}", if valid { "ok" } else { "invalid" });
            }
        }
        Commands::Repair(args) => {
            let raw = match &args.file {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut raw = String::new();
                    std::io::stdin()
                        .read_to_string(&mut raw)
                        .context("Failed to read standard input")?;
                    raw
                }
            };
            println!("{}", repair_response(&raw)?);
        }
    }
    Ok(())
}

pub async fn generate(config: &AppConfig, args: &GenerateArgs) -> Result<BatchSummary> {
    let required = if args.per_city {
        CITY_TEMPLATE
    } else {
        CONTENT_TEMPLATE
    };
    let templates = load_templates(config, &args.category, required)?;
    let mut catalog = load_catalog(config, args.sort)?.slice(args.from, args.to);
    if let Some(cities) = &args.cities {
        catalog = catalog.only(cities);
    }

    if args.per_city && config.images.enabled && !args.no_images {
        warn!(category = %args.category, "Images are not generated for city-level prompts");
    }
    let with_images = config.images.enabled && !args.no_images && !args.per_city;
    if with_images && !templates.contains(IMAGE_TEMPLATE) {
        bail!(
            "Images are enabled but the '{}' template is missing for category '{}'",
            IMAGE_TEMPLATE,
            args.category
        );
    }
    let workers = build_workers(config, &args.category, templates, with_images)?;

    let settings = BatchSettings::new(
        &args.category,
        config.paths.options_for(&args.category),
        config.paths.output_for(&args.category),
    )
    .with_resume(args.resume)
    .with_per_city(args.per_city);

    Ok(BatchRunner::new(catalog, settings, workers).run().await?)
}

pub async fn collect_options(
    config: &AppConfig,
    args: &CollectOptionsArgs,
) -> Result<BatchSummary> {
    let templates = load_templates(config, &args.category, OPTIONS_TEMPLATE)?;
    let catalog = load_catalog(config, args.sort)?;
    let workers = build_workers(config, &args.category, templates, false)?;

    let collector = OptionCollector::new(catalog, config.paths.options_for(&args.category), workers)
        .skip_existing(args.skip_existing);
    Ok(collector.run().await?)
}

pub async fn check_links(config: &AppConfig, urls: &[String]) -> Result<Vec<(String, bool)>> {
    let validator = LinkValidator::new(config.links.timeout())?;
    let mut verdicts = Vec::with_capacity(urls.len());
    for url in urls {
        verdicts.push((url.clone(), validator.is_valid(url).await));
    }
    Ok(verdicts)
}

/// Repairs a raw response and pretty-prints it, or reports where it is malformed.
pub fn repair_response(raw: &str) -> Result<String> {
    let repaired = repair(raw);
    if !repaired.applied.is_empty() {
        info!(rules = ?repaired.applied, "Applied repair rules");
    }
    match parse(&repaired.text) {
        Ok(payload) => Ok(String::from_utf8(to_json_pretty(&payload)?)?),
        Err(ItemError::MalformedResponse {
            line,
            column,
            found,
            message,
        }) => {
            let found = found.map(|c| format!(" near '{c}'")).unwrap_or_default();
            bail!("Malformed response at line {line}, column {column}{found}: {message}")
        }
        Err(e) => Err(e.into()),
    }
}

fn load_templates(config: &AppConfig, category: &str, required: &str) -> Result<PromptTemplates> {
    let path = config.paths.prompts_for(category);
    let templates = PromptTemplates::from_path(&path)
        .with_context(|| format!("Failed to load prompt templates for '{category}'"))?;
    templates
        .get(required)
        .with_context(|| format!("{} has no '{required}' template", path.display()))?;
    Ok(templates)
}

fn load_catalog(config: &AppConfig, sort: SortColumn) -> Result<CityCatalog> {
    Ok(CityCatalog::from_path(&config.paths.cities_csv)
        .context("Failed to load the city catalog")?
        .sorted_by(sort))
}

/// Builds one pipeline per credential. Each owns its provider and rate
/// limiters; the link validator is shared.
fn build_workers(
    config: &AppConfig,
    category: &str,
    templates: PromptTemplates,
    with_images: bool,
) -> Result<Vec<Arc<ItemPipeline>>> {
    let credentials = config.provider.credentials();
    if credentials.is_empty() {
        bail!("No API keys configured: set provider.api_keys in the config or SEOGEN__PROVIDER__API_KEYS");
    }
    if credentials.len() < config.provider.api_keys.len() {
        warn!(
            configured = config.provider.api_keys.len(),
            usable = credentials.len(),
            "Ignoring empty API keys"
        );
    }

    let templates = Arc::new(templates);
    let mut links = LinkValidator::new(config.links.timeout())?;
    if config.links.memoize {
        links = links.with_memoization();
    }
    let links = Arc::new(links);
    let settings = config.provider.settings();
    let download_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.provider.timeout_secs))
        .build()?;

    let mut workers = Vec::with_capacity(credentials.len());
    for key in &credentials {
        let provider = create_ai_provider(&settings, key)?;
        let limiter = Arc::new(RateLimiter::per_minute(config.rate_limit.calls_per_minute));
        let mut pipeline =
            ItemPipeline::new(provider, limiter, Arc::clone(&links), Arc::clone(&templates));
        if let Some(system_prompt) = &config.system_prompt {
            pipeline = pipeline.with_system_prompt(system_prompt);
        }
        if with_images {
            let image_provider = create_image_provider(
                config.images.api_url.as_deref(),
                key,
                config.images.model.clone(),
                settings.timeout(),
            )?;
            let stage = ImageStage::new(
                image_provider,
                Arc::new(RateLimiter::per_minute(config.rate_limit.image_calls_per_minute)),
                ImageStore::new(config.paths.images_for(category), download_client.clone()),
                format!(
                    "{}/{category}",
                    config.images.public_url.trim_end_matches('/')
                ),
            )
            .with_size(&config.images.size);
            pipeline = pipeline.with_images(stage);
        }
        workers.push(Arc::new(pipeline));
    }
    info!(workers = workers.len(), category, "Workers ready");
    Ok(workers)
}

fn print_summary(category: &str, summary: &BatchSummary) {
    println!(
        "{category}: {} cities processed, {} skipped, {} items saved, {} discarded, {} already present ({})",
        summary.cities_processed,
        summary.cities_skipped,
        summary.items_persisted,
        summary.items_discarded,
        summary.items_already_present,
        format_elapsed(summary.elapsed)
    );
}
