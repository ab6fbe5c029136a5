//! # Evidence Harness CLI (`evh`)
//!
//! ## Usage
//!
//! ```bash
//! evh --config ./config/evh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `evh facets` | Show facet options with counts and the matching documents |
//! | `evh docs` | List details of the matching documents |
//! | `evh sample` | List the most complete documents in the corpus |
//! | `evh extract --topic <slot>` | Print a topic's extracted context without generating |
//! | `evh insights` | Run every configured topic over the matching documents |
//! | `evh search "<query>"` | Top passages from the vector index |
//! | `evh ask "<question>"` | Retrieval-grounded answer |
//! | `evh trending` | Digest of the most recent research |
//! | `evh serve` | Start the JSON HTTP server |
//!
//! Facet flags (`--year-from`, `--publication-type`, ...) are accepted by
//! every command that works on the filtered document set.
//!
//! ## Examples
//!
//! ```bash
//! evh facets --year-from 2018 --year-to 2024 --funding-source Government
//! evh extract --topic key_findings --study-design Cohort
//! evh ask "Which flavouring chemicals were detected most often?"
//! ```

use clap::{Args, Parser, Subcommand};
use evidence_harness::app::App;
use evidence_harness::facets::FacetRequest;
use evidence_harness::{ask, config, facets, insights, server, trending};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Evidence Harness CLI: faceted exploration and evidence synthesis over a
/// research corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/evh.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "evh",
    about = "Evidence Harness: faceted exploration and evidence synthesis over a research corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/evh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the facet cascade for the given filters.
    ///
    /// Prints the options (with counts) each facet offers given the facets
    /// picked before it, and the documents that pass every facet.
    Facets {
        #[command(flatten)]
        filters: FacetArgs,
    },

    /// List title, authors, journal, and year of the matching documents.
    Docs {
        #[command(flatten)]
        filters: FacetArgs,
    },

    /// List the documents with the most populated fields.
    Sample {
        #[arg(long, default_value_t = 10)]
        count: usize,
    },

    /// Print the context block a topic would send to the generator.
    Extract {
        /// Topic slot (see `[[topics]]` in the config).
        #[arg(long)]
        topic: String,

        #[command(flatten)]
        filters: FacetArgs,
    },

    /// Run every configured topic over the matching documents.
    ///
    /// Topics run concurrently; a topic that fails reports its error in its
    /// own slot without affecting the others.
    Insights {
        #[command(flatten)]
        filters: FacetArgs,
    },

    /// Search the passage index.
    Search {
        query: String,

        /// Overrides `retrieval.top_k`.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question from the most relevant passages.
    Ask { question: String },

    /// Summarize the papers from the latest publication years.
    ///
    /// Lists each recent paper with its tags, the harmful ingredients no
    /// older paper reports, and health findings by effect category.
    Trending {
        /// Overrides `trending.recent_years`.
        #[arg(long)]
        years: Option<usize>,
    },

    /// Start the JSON HTTP server on `[server].bind`.
    Serve,
}

/// Facet filters shared by the document-set commands.
#[derive(Args, Default)]
struct FacetArgs {
    /// Earliest publication year.
    #[arg(long)]
    year_from: Option<i64>,

    /// Latest publication year.
    #[arg(long)]
    year_to: Option<i64>,

    /// Smallest sample size. Enables the sample-size facet.
    #[arg(long)]
    sample_min: Option<i64>,

    /// Largest sample size; values at the ceiling mean "and above".
    #[arg(long)]
    sample_max: Option<i64>,

    /// Repeatable.
    #[arg(long)]
    publication_type: Vec<String>,

    /// Repeatable.
    #[arg(long)]
    funding_source: Vec<String>,

    /// Repeatable.
    #[arg(long)]
    study_design: Vec<String>,
}

impl FacetArgs {
    /// Open bounds fall back to the limits of the corpus.
    fn to_request(&self, app: &App) -> FacetRequest {
        let engine = app.facet_engine();
        let year_range = match (self.year_from, self.year_to) {
            (None, None) => None,
            (from, to) => {
                let (low, high) = engine.year_bounds();
                Some([from.unwrap_or(low), to.unwrap_or(high)])
            }
        };
        let sample_size_range = match (self.sample_min, self.sample_max) {
            (None, None) => None,
            (min, max) => {
                let bounds = engine.sample_size_bounds(app.store.documents());
                Some([min.unwrap_or(bounds.min), max.unwrap_or(bounds.slider_max)])
            }
        };
        FacetRequest {
            year_range,
            sample_size_range,
            sample_size_enabled: None,
            publication_type: self.publication_type.clone(),
            funding_source: self.funding_source.clone(),
            study_design: self.study_design.clone(),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;
    let app = App::load(cfg)?;

    match cli.command {
        Commands::Facets { filters } => {
            let mut session = filters.to_request(&app).session(&app)?;
            facets::run_facets(&app, &mut session)?;
        }
        Commands::Docs { filters } => {
            let mut session = filters.to_request(&app).session(&app)?;
            facets::run_docs(&app, &mut session)?;
        }
        Commands::Sample { count } => {
            facets::run_sample(&app, count)?;
        }
        Commands::Extract { topic, filters } => {
            let mut session = filters.to_request(&app).session(&app)?;
            insights::run_extract(&app, &mut session, &topic)?;
        }
        Commands::Insights { filters } => {
            let mut session = filters.to_request(&app).session(&app)?;
            insights::run_insights(&app, &mut session).await?;
        }
        Commands::Search { query, limit } => {
            ask::run_search(&app, &query, limit).await?;
        }
        Commands::Ask { question } => {
            ask::run_ask(&app, &question).await?;
        }
        Commands::Trending { years } => {
            trending::run_trending(&app, years)?;
        }
        Commands::Serve => {
            server::run_server(app).await?;
        }
    }

    Ok(())
}
