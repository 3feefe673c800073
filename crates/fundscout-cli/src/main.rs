use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use fundscout_engine::{
    parse_profile_text, Discovery, DiscoveryConfig, MatchEngine, ProgressEvent, SourceRegistry,
};
use fundscout_storage::{
    InMemoryRepository, OpportunityFilter, PlainTextExtractor, Repository, TextExtractor,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "fundscout")]
#[command(about = "Funding opportunity discovery and matching")]
struct Cli {
    /// Source registry file.
    #[arg(long, default_value = "sources.yaml", global = true)]
    registry: PathBuf,

    /// Corpus snapshot file; created on first run.
    #[arg(long, default_value = "fundscout.json", global = true)]
    snapshot: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one discovery pass over the configured sources.
    Discover {
        /// Restrict the run to these sources (repeatable).
        #[arg(long = "source")]
        sources: Vec<String>,
        /// Only keep records mentioning one of these terms (repeatable).
        #[arg(long = "keyword")]
        keywords: Vec<String>,
        #[arg(long)]
        max_per_source: Option<usize>,
    },
    /// Rank the corpus against a profile document (resume or bio).
    MatchProfile {
        file: PathBuf,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Rank the corpus against a free-text proposal.
    MatchProposal {
        file: PathBuf,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// List the configured sources.
    Sources,
    /// Archive opportunities whose deadline has passed.
    Archive,
    /// Run discovery on the configured cron schedule until interrupted.
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fundscout=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Discover {
            sources,
            keywords,
            max_per_source,
        } => discover(&cli.registry, &cli.snapshot, sources, keywords, max_per_source).await,
        Commands::MatchProfile { file, top } => match_profile(&cli.snapshot, &file, top).await,
        Commands::MatchProposal { file, top } => match_proposal(&cli.snapshot, &file, top).await,
        Commands::Sources => list_sources(&cli.registry),
        Commands::Archive => archive(&cli.snapshot).await,
        Commands::Schedule => schedule(&cli.registry, &cli.snapshot).await,
    }
}

async fn open_repository(snapshot: &Path) -> Result<Arc<InMemoryRepository>> {
    let repo = if snapshot.exists() {
        InMemoryRepository::load_from(snapshot)
            .await
            .with_context(|| format!("loading snapshot {}", snapshot.display()))?
    } else {
        InMemoryRepository::new()
    };
    Ok(Arc::new(repo))
}

fn build_config(
    sources: Vec<String>,
    keywords: Vec<String>,
    max_per_source: Option<usize>,
) -> DiscoveryConfig {
    let defaults = DiscoveryConfig::from_env();
    DiscoveryConfig {
        sources: if sources.is_empty() {
            None
        } else {
            Some(sources.into_iter().collect())
        },
        keywords: keywords.into_iter().collect::<BTreeSet<_>>(),
        max_per_source: max_per_source.unwrap_or(defaults.max_per_source),
        ..defaults
    }
}

async fn discover(
    registry_path: &Path,
    snapshot: &Path,
    sources: Vec<String>,
    keywords: Vec<String>,
    max_per_source: Option<usize>,
) -> Result<()> {
    let registry = SourceRegistry::from_path(registry_path)?;
    let repository = open_repository(snapshot).await?;
    let config = build_config(sources, keywords, max_per_source);
    let discovery = Arc::new(Discovery::new(config, repository.clone())?);

    let mut session = discovery.start(&registry);
    let cancel = session.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    while let Some(event) = session.next_event().await {
        match event {
            ProgressEvent::SourceStarted { source_name } => {
                println!("fetching {source_name}...");
            }
            ProgressEvent::SourceFinished { outcome } => {
                println!(
                    "  {}: {:?} fetched={} persisted={} deduplicated={} dropped={}",
                    outcome.source_name,
                    outcome.state,
                    outcome.fetched,
                    outcome.persisted,
                    outcome.deduplicated,
                    outcome.dropped
                );
            }
            ProgressEvent::RunFinished { .. } => {}
        }
    }
    let summary = session.wait().await?;
    repository
        .flush_to(snapshot)
        .await
        .with_context(|| format!("writing snapshot {}", snapshot.display()))?;

    println!(
        "discovery {:?}: run_id={} persisted={} report={}",
        summary.state,
        summary.run_id,
        summary.persisted_total,
        summary
            .report_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    Ok(())
}

/// Read a document and extract its text, keyed off the file extension.
/// Unsupported formats fail with the extractor's error naming the format.
fn read_document_text(file: &Path) -> Result<String> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let mime = match file.extension().and_then(|e| e.to_str()) {
        Some("md") | Some("markdown") => "text/markdown".to_string(),
        None | Some("txt") | Some("text") => "text/plain".to_string(),
        Some(other) => format!("application/{other}"),
    };
    PlainTextExtractor
        .extract_text(&bytes, &mime)
        .with_context(|| format!("extracting text from {}", file.display()))
}

async fn match_profile(snapshot: &Path, file: &Path, top: usize) -> Result<()> {
    let text = read_document_text(file)?;
    let profile = parse_profile_text(&text);
    let repository = open_repository(snapshot).await?;
    let profile_id = repository.save_profile(profile.clone()).await?;
    repository.flush_to(snapshot).await?;
    println!(
        "profile {profile_id} v{} ({} skills, {} positions)",
        profile.version,
        profile.skills.len(),
        profile.experience.len()
    );

    rank_and_print(&*repository, profile_id, &profile.matching_text(), top).await
}

async fn match_proposal(snapshot: &Path, file: &Path, top: usize) -> Result<()> {
    let text = read_document_text(file)?;
    let repository = open_repository(snapshot).await?;
    rank_and_print(&*repository, Uuid::new_v4(), &text, top).await
}

async fn rank_and_print(
    repository: &dyn Repository,
    query_id: Uuid,
    query_text: &str,
    top: usize,
) -> Result<()> {
    let corpus = repository
        .query_opportunities(&OpportunityFilter::default())
        .await?;
    if corpus.is_empty() {
        println!("corpus is empty; run `fundscout discover` first");
        return Ok(());
    }

    let engine = MatchEngine::builtin();
    let matches = engine.rank(query_id, query_text, &corpus, top);
    let by_fingerprint: HashMap<_, _> = corpus.iter().map(|o| (o.fingerprint(), o)).collect();

    for (rank, m) in matches.iter().enumerate() {
        let opp = &by_fingerprint[&m.fingerprint];
        println!(
            "{:>2}. [{:.3}] {} - {} ({}; text={:.2} keywords={:.2} category={:.0})",
            rank + 1,
            m.score,
            opp.title,
            opp.organization,
            opp.category.as_str(),
            m.components.text_similarity,
            m.components.keyword_overlap,
            m.components.category_match
        );
        println!("      {}", opp.url);
    }
    Ok(())
}

fn list_sources(registry_path: &Path) -> Result<()> {
    let registry = SourceRegistry::from_path(registry_path)?;
    for source in &registry.sources {
        println!(
            "{} [{}] {:?} {}",
            source.source_name,
            if source.enabled { "enabled" } else { "disabled" },
            source.kind,
            source.endpoint
        );
    }
    Ok(())
}

async fn archive(snapshot: &Path) -> Result<()> {
    let repository = open_repository(snapshot).await?;
    let archived = repository.archive_expired(Utc::now().date_naive()).await?;
    repository.flush_to(snapshot).await?;
    println!("archived {archived} expired opportunities");
    Ok(())
}

async fn schedule(registry_path: &Path, snapshot: &Path) -> Result<()> {
    let registry = Arc::new(SourceRegistry::from_path(registry_path)?);
    let repository = open_repository(snapshot).await?;
    let config = DiscoveryConfig {
        scheduler_enabled: true,
        ..DiscoveryConfig::from_env()
    };
    let discovery = Arc::new(Discovery::new(config, repository.clone())?);

    let scheduler = fundscout_engine::scheduler::build_scheduler(discovery, registry)
        .await?
        .context("scheduler was not built")?;
    scheduler.start().await.context("starting scheduler")?;
    println!("scheduler running; press ctrl-c to stop");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;

    repository
        .flush_to(snapshot)
        .await
        .with_context(|| format!("writing snapshot {}", snapshot.display()))?;
    Ok(())
}
