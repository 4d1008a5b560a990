use anyhow::{bail, Context, Result};
use bughunt_explain::{build_explainer, ClientSettings};
use bughunt_knowledge::ingest_samples;
use clap::{Args, Parser, Subcommand};
use config::{ConfigOverrides, ScanConfig};
use pipeline::Pipeline;
use std::path::PathBuf;

mod config;
mod pipeline;
mod report;

#[derive(Parser)]
#[command(name = "bughunt")]
#[command(about = "Find known bug patterns in test-program source files", long_about = None)]
#[command(version)]
#[command(subcommand_negates_reqs = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    scan: ScanArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a knowledge file from a samples CSV (ID, Explanation, Context, Code, Correct Code)
    Ingest(IngestArgs),
}

#[derive(Args)]
struct IngestArgs {
    /// Samples CSV
    samples: PathBuf,

    /// Knowledge file to write
    #[arg(short, long, default_value = "knowledge.json")]
    out: PathBuf,
}

#[derive(Args)]
struct ScanArgs {
    /// Source file to scan
    #[arg(required = true)]
    file: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// TOML config file (default: ./bughunt.toml when present)
    #[arg(long, env = "BUGHUNT_CONFIG")]
    config: Option<PathBuf>,

    /// Persisted bug table (CSV)
    #[arg(long, env = "BUGHUNT_TABLE")]
    table: Option<PathBuf>,

    /// Local knowledge file
    #[arg(long, env = "BUGHUNT_KNOWLEDGE")]
    knowledge: Option<PathBuf>,

    /// Remote knowledge search endpoint (overrides --knowledge)
    #[arg(long, env = "BUGHUNT_KNOWLEDGE_URL")]
    knowledge_url: Option<String>,

    /// Relevance floor for knowledge matches
    #[arg(long, env = "BUGHUNT_MIN_SCORE")]
    min_score: Option<f64>,

    /// Knowledge matches kept per candidate line
    #[arg(long, env = "BUGHUNT_TOP_K")]
    top_k: Option<usize>,

    /// Knowledge queries in flight at once
    #[arg(long, env = "BUGHUNT_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Per-query timeout in milliseconds
    #[arg(long, env = "BUGHUNT_QUERY_TIMEOUT_MS")]
    query_timeout_ms: Option<u64>,

    /// Trigger tokens that flag a line (comma-separated)
    #[arg(long, env = "BUGHUNT_TRIGGERS", value_delimiter = ',')]
    triggers: Vec<String>,

    /// Lines of code context kept around the bug
    #[arg(long, env = "BUGHUNT_CONTEXT_WINDOW")]
    context_window: Option<usize>,

    /// Skip the generative explanation and use knowledge-base text
    #[arg(long, env = "BUGHUNT_NO_EXPLAIN")]
    no_explain: bool,
}

impl ScanArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            table: self.table.clone(),
            knowledge: self.knowledge.clone(),
            knowledge_url: self.knowledge_url.clone(),
            min_score: self.min_score,
            top_k: self.top_k,
            concurrency: self.concurrency,
            query_timeout_ms: self.query_timeout_ms,
            triggers: self
                .triggers
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            context_window: self.context_window,
            no_explain: self.no_explain,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // stdout is reserved for the JSON report
    if cli.scan.json {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Some(Commands::Ingest(args)) => run_ingest(args).await,
        None => run_scan(cli.scan).await,
    }
}

async fn run_ingest(args: IngestArgs) -> Result<()> {
    let corpus = ingest_samples(&args.samples)
        .with_context(|| format!("Failed to read samples {}", args.samples.display()))?;
    corpus
        .save(&args.out)
        .await
        .with_context(|| format!("Failed to write {}", args.out.display()))?;
    println!(
        "Wrote {} knowledge documents to {}",
        corpus.len(),
        args.out.display()
    );
    Ok(())
}

async fn run_scan(args: ScanArgs) -> Result<()> {
    let Some(file) = args.file.clone() else {
        bail!("No source file given");
    };
    let config = ScanConfig::load(args.config.as_deref())?
        .with_overrides(args.overrides())
        .validate()?;
    log::debug!("Effective config: {config:?}");

    if !file.is_file() {
        bail!("Cannot read {}: not a file", file.display());
    }

    let source = pipeline::open_source(&config).await?;
    let explainer = build_explainer(config.explain, &ClientSettings::from_env());
    let pipeline = Pipeline::new(config, source, explainer);

    let analysis = tokio::select! {
        analysis = pipeline.analyze(&file) => analysis?,
        _ = tokio::signal::ctrl_c() => bail!("Scan cancelled; nothing was written"),
    };
    let scan_report = pipeline.persist(analysis).await?;

    if args.json {
        println!("{}", report::render_json(&scan_report)?);
    } else {
        print!("{}", report::render_text(&scan_report));
    }
    Ok(())
}
