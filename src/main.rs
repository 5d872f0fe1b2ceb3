//! rustpubcat - Publication identity resolution and categorization
//!
//! Reads member publication artifacts, resolves one identity per publication,
//! assigns research categories and writes the tables the website reads.
//!
//! ## Usage
//!
//! ### Classify
//! ```bash
//! rustpubcat classify --root . --scorer zero-shot
//! ```
//!
//! ### Refresh member snapshots
//! ```bash
//! rustpubcat fetch --root .
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rustpubcat::config::{ClassifierConfig, RunPaths};
use rustpubcat::dedup::DedupPolicy;
use rustpubcat::pipeline;
use rustpubcat::scorer::llm::{LlmConfig, LlmScorer};
use rustpubcat::scorer::zero_shot::{self, ZeroShotClient};
use rustpubcat::scorer::Scorer;
use rustpubcat::semanticscholar::SemanticScholarClient;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Publication identity resolution and categorization pipeline
#[derive(Parser)]
#[command(name = "rustpubcat")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every member publication and write the category tables
    Classify {
        /// Site root holding members/ and data/
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Members directory (default: <root>/members)
        #[arg(long)]
        members: Option<PathBuf>,

        /// Artifact file name inside each member directory
        #[arg(long, default_value = "publications.json")]
        input_name: String,

        /// Manual overrides file (default: <root>/data/categories.overrides.json)
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Candidate label file (default: built-in label set)
        #[arg(long)]
        labels: Option<PathBuf>,

        /// Compact table output (default: <root>/data/publication_categories.json)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Verbose table output (default: <root>/data/publication_categories_verbose.json)
        #[arg(long)]
        verbose_out: Option<PathBuf>,

        /// Classifier config JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        // === Overrides for config values ===
        /// Statistical score threshold
        #[arg(long)]
        threshold: Option<f64>,

        /// Maximum statistical labels per publication
        #[arg(long)]
        top_k: Option<usize>,

        /// Texts per scorer call
        #[arg(long)]
        batch_size: Option<usize>,

        /// Which record represents a duplicated identity
        #[arg(long, value_enum)]
        dedup_policy: Option<DedupPolicy>,

        // === Statistical scorer ===
        /// Scorer backend for publications the cheap layers leave unclassified
        #[arg(long, value_enum, default_value = "zero-shot")]
        scorer: ScorerKind,

        /// Scorer API base URL
        #[arg(long)]
        scorer_url: Option<String>,

        /// Scorer model name
        #[arg(long)]
        scorer_model: Option<String>,

        /// Scorer API key
        #[arg(long)]
        scorer_key: Option<String>,
    },
    /// Refresh members/*/publications.json from Semantic Scholar
    Fetch {
        /// Site root holding members/
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Artifact file name written inside each member directory
        #[arg(long, default_value = "publications.json")]
        output_name: String,

        /// Semantic Scholar API key
        #[arg(long)]
        s2_key: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScorerKind {
    /// No statistical layer; residual publications get the default category
    None,
    /// Hosted zero-shot classification endpoint
    ZeroShot,
    /// OpenAI-compatible chat completion endpoint
    Llm,
}

const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Classify {
            root,
            members,
            input_name,
            overrides,
            labels,
            out,
            verbose_out,
            config,
            threshold,
            top_k,
            batch_size,
            dedup_policy,
            scorer,
            scorer_url,
            scorer_model,
            scorer_key,
        } => {
            let mut paths = RunPaths::from_root(&root);
            paths.input_file_name = input_name;
            if let Some(members) = members {
                paths.members_dir = members;
            }
            if let Some(overrides) = overrides {
                paths.overrides = overrides;
            }
            if labels.is_some() {
                paths.labels = labels;
            }
            if let Some(out) = out {
                paths.compact_out = out;
            }
            if let Some(verbose_out) = verbose_out {
                paths.verbose_out = verbose_out;
            }

            let mut config = match config {
                Some(path) => ClassifierConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => ClassifierConfig::default(),
            };
            if let Some(threshold) = threshold {
                config.threshold = threshold;
            }
            if let Some(top_k) = top_k {
                config.top_k = top_k;
            }
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            if let Some(policy) = dedup_policy {
                config.dedup_policy = policy;
            }

            run_classify(paths, config, scorer, scorer_url, scorer_model, scorer_key).await
        }
        Commands::Fetch {
            root,
            output_name,
            s2_key,
        } => run_fetch(root, output_name, s2_key).await,
    }
}

// ============================================================================
// Classification
// ============================================================================

async fn run_classify(
    paths: RunPaths,
    config: ClassifierConfig,
    kind: ScorerKind,
    scorer_url: Option<String>,
    scorer_model: Option<String>,
    scorer_key: Option<String>,
) -> Result<()> {
    let started = Instant::now();

    let zero_shot = match kind {
        ScorerKind::ZeroShot => Some(
            ZeroShotClient::new(
                scorer_url.as_deref().unwrap_or(zero_shot::DEFAULT_BASE_URL),
                scorer_model.as_deref().unwrap_or(zero_shot::DEFAULT_MODEL),
                scorer_key.clone(),
            )
            .context("Failed to create zero-shot client")?,
        ),
        _ => None,
    };

    let llm = match kind {
        ScorerKind::Llm => {
            let Some(api_key) = scorer_key else {
                bail!("--scorer-key is required for the llm scorer");
            };
            Some(
                LlmScorer::new(LlmConfig {
                    base_url: scorer_url.unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
                    api_key,
                    model: scorer_model.unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
                })
                .context("Failed to create LLM scorer")?,
            )
        }
        _ => None,
    };

    let scorer: Option<&dyn Scorer> = match (&zero_shot, &llm) {
        (Some(s), _) => Some(s as &dyn Scorer),
        (_, Some(s)) => Some(s as &dyn Scorer),
        _ => None,
    };

    println!("\n--- Classifying publications ---");
    println!("Members:  {}", paths.members_dir.display());
    println!("Scorer:   {}", scorer.map(|s| s.name()).unwrap_or("none"));
    info!(threshold = config.threshold, top_k = config.top_k, batch_size = config.batch_size, "Classifier config");

    let summary = pipeline::run(&paths, &config, scorer)
        .await
        .context("Classification run failed")?;

    println!("\n--- Done ---");
    println!("{}", summary);
    println!("Compact:  {}", paths.compact_out.display());
    println!("Verbose:  {}", paths.verbose_out.display());
    if let Some(llm) = &llm {
        let usage = llm.usage();
        println!(
            "LLM tokens: {} prompt + {} completion = {} total",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        );
    }
    println!("Elapsed:  {:.1}s", started.elapsed().as_secs_f64());

    Ok(())
}

// ============================================================================
// Snapshot Fetch
// ============================================================================

async fn run_fetch(root: PathBuf, output_name: String, s2_key: Option<String>) -> Result<()> {
    let members_dir = root.join("members");
    println!("\n--- Fetching member snapshots from Semantic Scholar ---");

    let client = SemanticScholarClient::new(s2_key).context("Failed to create Semantic Scholar client")?;
    let summary = client
        .fetch_members(&members_dir, &output_name)
        .await
        .with_context(|| format!("Fetch failed for {}", members_dir.display()))?;

    println!(
        "Wrote {} of {} member snapshots ({} skipped, {} papers)",
        summary.written, summary.members, summary.skipped, summary.papers
    );
    Ok(())
}
