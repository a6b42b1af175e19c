//! `dataset-scout`: search public dataset catalogs from the command line.
//!
//! Prints the search outcome as pretty JSON on stdout; logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dataset_scout::scout_search::{Lookup, Recommendation, SourceId};
use dataset_scout::{Scout, ScoutConfig, SearchOutcome, SearchRequest};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(version, about, rename_all = "kebab")]
struct Args {
    /// What you are looking for, in plain language.
    #[arg(
        value_name = "REQUEST",
        required_unless_present_any = ["write_config", "dataset"]
    )]
    request: Vec<String>,
    /// Config file (default: <config_dir>/dataset-scout/config.toml).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Only search these catalogs (kaggle, huggingface, google_dataset).
    #[arg(long = "source", short = 's', value_name = "SOURCE")]
    sources: Vec<SourceId>,
    /// Ignore any cached result and search again.
    #[arg(long, conflicts_with = "refresh_degraded")]
    refresh: bool,
    /// Search again only if the cached result had failed catalogs.
    #[arg(long)]
    refresh_degraded: bool,
    /// Also recommend the best-fitting datasets from the results.
    #[arg(long)]
    recommend: bool,
    /// Show one dataset by id from the single catalog given with --source.
    #[arg(long, value_name = "ID", conflicts_with = "recommend")]
    dataset: Option<String>,
    /// Write the default config to --config (or the default path) and exit.
    #[arg(long)]
    write_config: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    outcome: &'a SearchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    recommendation: Option<Recommendation>,
}

impl Args {
    fn lookup(&self) -> Lookup {
        if self.refresh {
            Lookup::Bypass
        } else if self.refresh_degraded {
            Lookup::RefreshDegraded
        } else {
            Lookup::Cached
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("dataset_scout=info,scout_search=info")
            }),
        )
        .init();

    let args = Args::parse();

    if args.write_config {
        let path = args
            .config
            .clone()
            .unwrap_or_else(ScoutConfig::default_config_path);
        ScoutConfig::default()
            .save_to_file(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = ScoutConfig::load(args.config.as_deref()).context("loading config")?;
    let scout = Scout::from_config(&config)?;

    if let Some(id) = &args.dataset {
        let [source] = args.sources.as_slice() else {
            anyhow::bail!("--dataset needs exactly one --source");
        };
        let record = scout.get_dataset(*source, id).await?;
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let request = SearchRequest::new(args.request.join(" "))
        .with_sources(args.sources.iter().copied())
        .with_lookup(args.lookup());
    let outcome = scout.search(&request).await?;

    let recommendation = if args.recommend {
        Some(scout.recommend(&request.text, &outcome).await?)
    } else {
        None
    };
    let report = Report {
        outcome: &outcome,
        recommendation,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
