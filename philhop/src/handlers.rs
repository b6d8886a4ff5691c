use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use philhop_core::config::{DEFAULT_MAX_HOPS, DEFAULT_N_LINKS, HopConfig, HopLimitPolicy, Strategy};
use philhop_core::engine::{HopEngine, HopOutcome, TerminalReason};
use philhop_core::record::{CsvRecord, Database, TraversalRecord};
use philhop_core::report::{
    ReportFormat, gather_stats, generate_json_report, generate_text_report, save_report,
};
use philhop_core::scorer::{
    EmbeddingTable, LexicalGraph, OovPolicy, ScorerAssets, SimilarityBackend, build_scorer,
};
use philhop_core::CancellationToken;
use philhop_wiki::{LinkSource, PageRef, WikiClient, WikiConfig};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info, warn};
use url::Url;

pub const DB_FILE_NAME: &str = "philhop.db";

/// Install the fmt subscriber. Logs go to stderr so printed paths stay clean.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Expand `~` and point directories at the database file inside them.
pub fn resolve_db_path(input: &str) -> PathBuf {
    let expanded = shellexpand::tilde(input);
    let path = PathBuf::from(expanded.as_ref());
    if input.ends_with('/') || path.is_dir() {
        path.join(DB_FILE_NAME)
    } else {
        path
    }
}

/// Everything a traversal command needs, read once from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub db_path: PathBuf,
    pub csv_path: Option<PathBuf>,
    pub hop_config: HopConfig,
    pub wiki_config: WikiConfig,
    pub graph_path: Option<PathBuf>,
    pub vectors_path: Option<PathBuf>,
    pub backend_url: Option<Url>,
    pub target_sense: String,
    pub oov_policy: OovPolicy,
    pub seed: Option<u64>,
    pub timeout: Duration,
}

impl RunOptions {
    pub fn from_matches(args: &ArgMatches) -> Result<Self> {
        let db = args.get_one::<String>("db").context("missing --db")?;
        let max_hops = *args.get_one::<usize>("max-hops").unwrap_or(&DEFAULT_MAX_HOPS);
        let n_links = *args.get_one::<usize>("links").unwrap_or(&DEFAULT_N_LINKS);
        if n_links == 0 {
            bail!("--links must be at least 1");
        }
        let timeout_secs = *args.get_one::<u64>("timeout").unwrap_or(&10);

        let mut hop_config = HopConfig::default()
            .with_max_hops(max_hops)
            .with_n_links(n_links);
        if args.get_flag("strict-limit") {
            hop_config = hop_config.with_hop_limit_policy(HopLimitPolicy::Fail);
        }
        if let Some(secs) = args.get_one::<u64>("deadline") {
            hop_config = hop_config.with_deadline(Duration::from_secs(*secs));
        }

        let mut wiki_config = WikiConfig::default().with_timeout(timeout_secs);
        if let Some(url) = args.get_one::<Url>("wiki-url") {
            wiki_config = wiki_config.with_base_url(url.as_str());
        }

        let oov_policy = if args.get_flag("legacy-oov") {
            OovPolicy::ZeroFill
        } else {
            OovPolicy::Skip
        };

        Ok(Self {
            db_path: resolve_db_path(db),
            csv_path: args.get_one::<PathBuf>("csv").cloned(),
            hop_config,
            wiki_config,
            graph_path: args.get_one::<PathBuf>("graph").cloned(),
            vectors_path: args.get_one::<PathBuf>("vectors").cloned(),
            backend_url: args.get_one::<Url>("backend").cloned(),
            target_sense: args
                .get_one::<String>("target-sense")
                .cloned()
                .unwrap_or_else(|| ScorerAssets::default().target_sense),
            oov_policy,
            seed: args.get_one::<u64>("seed").copied(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Load the shared resources the chosen strategies need. Resources no
/// strategy uses are left unloaded.
pub fn load_assets(opts: &RunOptions, strategies: &[Strategy]) -> Result<ScorerAssets> {
    let mut assets = ScorerAssets {
        target_sense: opts.target_sense.clone(),
        oov_policy: opts.oov_policy,
        seed: opts.seed,
        ..ScorerAssets::default()
    };

    if strategies.contains(&Strategy::Wordnet) {
        if let Some(path) = &opts.graph_path {
            let graph = LexicalGraph::load(path)
                .with_context(|| format!("Failed to load lexical graph {}", path.display()))?;
            assets.lexical_graph = Some(Arc::new(graph));
        }
    }

    if strategies.contains(&Strategy::Word2vec) {
        if let Some(path) = &opts.vectors_path {
            let table = EmbeddingTable::load(path)
                .with_context(|| format!("Failed to load word vectors {}", path.display()))?;
            assets.embeddings = Some(Arc::new(table));
        }
    }

    if strategies.contains(&Strategy::Bert) {
        if let Some(url) = &opts.backend_url {
            let backend = SimilarityBackend::new(url.as_str(), opts.timeout)
                .context("Failed to build similarity backend client")?;
            assets.backend = Some(backend);
        }
    }

    Ok(assets)
}

pub fn build_engine(
    opts: &RunOptions,
    strategy: Strategy,
    assets: &ScorerAssets,
    source: Arc<dyn LinkSource>,
) -> Result<HopEngine> {
    let scorer = build_scorer(strategy, assets)?;
    Ok(HopEngine::new(source, scorer, opts.hop_config.clone()))
}

/// Persist one outcome. Usable paths go to the tree and the CSV file,
/// every other outcome is still kept as an attempt.
pub fn record_outcome(db: &Database, csv: Option<&CsvRecord>, outcome: &HopOutcome) -> Result<()> {
    if outcome.usable_path().is_some_and(|path| !path.is_empty()) {
        db.record(outcome)?;
    } else {
        db.record_attempt(outcome)?;
    }
    if let Some(csv) = csv {
        csv.record(outcome)?;
    }
    Ok(())
}

pub fn format_path(outcome: &HopOutcome) -> String {
    std::iter::once(&outcome.start)
        .chain(outcome.path.iter())
        .map(|page| page.display_title.as_str())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Running totals of a sampling run.
#[derive(Debug, Default, Clone)]
pub struct SampleTally {
    pub total: usize,
    pub reached: usize,
    pub hops_to_target: usize,
    pub by_reason: BTreeMap<&'static str, usize>,
}

impl SampleTally {
    pub fn add(&mut self, outcome: &HopOutcome) {
        self.total += 1;
        if outcome.reached_target() {
            self.reached += 1;
            self.hops_to_target += outcome.hops_taken;
        }
        *self.by_reason.entry(outcome.reason.as_str()).or_insert(0) += 1;
    }

    pub fn mean_hops(&self) -> Option<f64> {
        (self.reached > 0).then(|| self.hops_to_target as f64 / self.reached as f64)
    }
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> io::Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Database::new(path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn open_csv(opts: &RunOptions) -> Option<CsvRecord> {
    opts.csv_path.as_ref().map(CsvRecord::new)
}

/// Token cancelled on Ctrl-C. Running traversals stop at their next hop.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping traversals");
            handle.cancel();
        }
    });
    token
}

fn print_outcome(outcome: &HopOutcome) {
    let reason = outcome.reason.as_str();
    let reason = match outcome.reason {
        TerminalReason::ReachedTarget => reason.green().bold(),
        TerminalReason::HopLimitExceeded | TerminalReason::Cancelled => reason.yellow().bold(),
        _ => reason.red().bold(),
    };

    println!("{} {}", "Strategy:".blue(), outcome.strategy.tag().bright_white());
    println!("{} {}", "Outcome:".blue(), reason);
    println!("{} {}", "Hops:".blue(), outcome.hops_taken.to_string().cyan());
    if outcome.cycle_eliminated {
        println!("{} one cycle eliminated", "↺".yellow());
    }
    println!();
    println!("{}", format_path(outcome));
    println!();
    if let Some(error) = &outcome.error {
        println!("{} {}", "✗".red().bold(), error);
    }
    println!(
        "{} Finished in {} ms",
        "ℹ".blue(),
        outcome.elapsed_ms.to_string().cyan()
    );
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  PHILHOP INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let config_dir = args.get_one::<String>("PATH").context("missing PATH")?;
    let force = args.get_flag("force");
    let expanded_config_dir = shellexpand::tilde(config_dir);
    let philhop_config_dir = Path::new(expanded_config_dir.as_ref());
    let db_loc = philhop_config_dir.join(DB_FILE_NAME);
    let db_path = db_loc.as_path();

    println!(
        "{} Target: {}",
        "→".blue(),
        philhop_config_dir.display().to_string().bright_white()
    );
    println!();

    if Database::exists(db_path) {
        if !force {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!("Database already exists at:");
            println!(
                "  {} {}",
                "•".yellow(),
                db_path.display().to_string().bright_white()
            );
            println!();
            println!("{}", "Overwriting discards every recorded traversal.".yellow());

            let response = print_prompt("Do you want to continue? [y/N]:")?;
            println!();

            if response != "y" && response != "yes" {
                println!("{} Initialization cancelled.", "✗".red().bold());
                return Ok(());
            }
        }

        Database::drop(db_path)
            .with_context(|| format!("Failed to remove {}", db_path.display()))?;
        println!("{} Existing database removed", "✓".green().bold());
    }

    println!("{} Creating database...", "→".blue());
    open_database(db_path)?;

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!(
        "{} Try: philhop hop -u Cat --db {}",
        "ℹ".blue(),
        db_path.display()
    );
    println!();
    Ok(())
}

pub async fn handle_hop(args: &ArgMatches) -> Result<()> {
    let opts = RunOptions::from_matches(args)?;
    let strategy = *args.get_one::<Strategy>("strategy").context("missing --strategy")?;
    let input = args.get_one::<String>("url").context("missing --url")?;

    let client = Arc::new(WikiClient::new(opts.wiki_config.clone())?);
    let start = client.page(input)?;
    let assets = load_assets(&opts, &[strategy])?;
    let engine = build_engine(&opts, strategy, &assets, client)?
        .with_cancellation(cancel_on_ctrl_c());
    let db = open_database(&opts.db_path)?;
    let csv = open_csv(&opts);

    print_divider();
    println!(
        "{} {}",
        "  HOP FROM".bright_white().bold(),
        start.display_title.bright_white().bold()
    );
    print_divider();
    println!();

    let progress = spinner();
    progress.set_message(format!("Hopping from {} using {}", start, strategy));
    let outcome = engine.hop(start).await;
    progress.finish_and_clear();

    record_outcome(&db, csv.as_ref(), &outcome)?;
    print_outcome(&outcome);
    Ok(())
}

pub async fn handle_sample(args: &ArgMatches) -> Result<()> {
    let opts = RunOptions::from_matches(args)?;
    let count = *args.get_one::<usize>("count").unwrap_or(&20);
    let rounds = *args.get_one::<usize>("rounds").unwrap_or(&1);
    let concurrency = (*args.get_one::<usize>("concurrency").unwrap_or(&4)).max(1);

    let mut strategies: Vec<Strategy> = Vec::new();
    for strategy in args.get_many::<Strategy>("strategy").into_iter().flatten() {
        if !strategies.contains(strategy) {
            strategies.push(*strategy);
        }
    }
    if strategies.is_empty() {
        bail!("At least one strategy is required");
    }

    let client = Arc::new(WikiClient::new(opts.wiki_config.clone())?);
    let source: Arc<dyn LinkSource> = client.clone();
    let assets = load_assets(&opts, &strategies)?;
    let cancel = cancel_on_ctrl_c();
    let engines = strategies
        .iter()
        .map(|&strategy| {
            build_engine(&opts, strategy, &assets, source.clone())
                .map(|engine| engine.with_cancellation(cancel.clone()))
        })
        .collect::<Result<Vec<_>>>()?;
    let db = open_database(&opts.db_path)?;
    let csv = open_csv(&opts);

    print_divider();
    println!("{}", "  PHILHOP SAMPLING".bright_white().bold());
    print_divider();
    println!();
    let tags: Vec<String> = strategies.iter().map(Strategy::tag).collect();
    println!("{} {}", "Strategies:".blue(), tags.join(", ").bright_white());
    println!(
        "{} {} pages x {} rounds, {} at a time",
        "Sample:".blue(),
        count.to_string().cyan(),
        rounds.to_string().cyan(),
        concurrency.to_string().cyan()
    );
    println!();

    let progress = spinner();
    let mut tally = SampleTally::default();

    for round in 1..=rounds {
        if cancel.is_cancelled() {
            break;
        }
        progress.set_message(format!("Round {}/{}: drawing {} random pages", round, rounds, count));

        let pages: Vec<PageRef> = match client.random_pages(count).await {
            Ok(pages) => pages,
            Err(e) => {
                warn!("Round {} skipped, no random pages: {}", round, e);
                progress.println(format!("{} Round {} skipped: {}", "✗".red().bold(), round, e));
                continue;
            }
        };

        let jobs: Vec<(HopEngine, PageRef)> = pages
            .iter()
            .flat_map(|page| engines.iter().map(move |engine| (engine.clone(), page.clone())))
            .collect();
        let total = jobs.len();

        let mut outcomes = futures::stream::iter(jobs)
            .map(|(engine, page)| async move { engine.hop(page).await })
            .buffer_unordered(concurrency);

        let mut done = 0;
        while let Some(outcome) = outcomes.next().await {
            done += 1;
            if let Err(e) = record_outcome(&db, csv.as_ref(), &outcome) {
                warn!("Failed to record traversal from {}: {:#}", outcome.start, e);
            }
            tally.add(&outcome);
            progress.set_message(format!(
                "Round {}/{}: {}/{} traversals, {} reached Philosophy",
                round, rounds, done, total, tally.reached
            ));
        }
        info!("Round {} finished: {} traversals", round, total);
    }

    progress.finish_and_clear();

    println!(
        "{} {} of {} traversals reached Philosophy",
        "✓".green().bold(),
        tally.reached.to_string().green().bold(),
        tally.total
    );
    if let Some(mean) = tally.mean_hops() {
        println!("{} Mean hops: {:.2}", "ℹ".blue(), mean);
    }
    for (reason, n) in &tally.by_reason {
        println!("  {} {}: {}", "•".blue(), reason, n);
    }
    println!();

    let stats = gather_stats(&db, None)?;
    print!("{}", generate_text_report(&stats));
    Ok(())
}

pub fn handle_stats(args: &ArgMatches) -> Result<()> {
    let db = args.get_one::<String>("db").context("missing --db")?;
    let db_path = resolve_db_path(db);
    if !Database::exists(&db_path) {
        bail!(
            "No database at {}, run `philhop init` first",
            db_path.display()
        );
    }
    let db = Database::new(&db_path)?;

    let format = args.get_one::<String>("format").map(String::as_str).unwrap_or("text");
    let format = ReportFormat::from_str(format).with_context(|| format!("Unknown format {}", format))?;
    let strategy = args.get_one::<Strategy>("strategy").map(Strategy::tag);

    let stats = gather_stats(&db, strategy.as_deref())?;
    let content = match format {
        ReportFormat::Text => generate_text_report(&stats),
        ReportFormat::Json => generate_json_report(&stats)?,
    };

    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            save_report(&content, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}
