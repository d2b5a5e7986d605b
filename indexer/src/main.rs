use anyhow::{Context, Result};
use bsbi_core::eval::{evaluate, parse_queries, Qrels};
use bsbi_core::{BsbiIndex, Encoding, EnglishNormalizer, IndexConfig, Scoring, Searcher};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a BSBI inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct IndexLocation {
    /// Index output directory
    #[arg(long, default_value = "./index")]
    index: String,
    /// Collection directory (one subdirectory per block)
    #[arg(long, default_value = "./collection")]
    data: String,
    /// Name of the merged index file, without extension
    #[arg(long, default_value = "main_index")]
    index_name: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Invert every block and merge the intermediate indices
    Build {
        #[command(flatten)]
        location: IndexLocation,
        /// Postings encoding: vbe or standard
        #[arg(long, default_value_t = Encoding::VariableByte)]
        encoding: Encoding,
        /// Keep the per-block intermediate index files
        #[arg(long, default_value_t = false)]
        keep_intermediate: bool,
    },
    /// Run one ranked query
    Search {
        #[command(flatten)]
        location: IndexLocation,
        /// Query text
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 10)]
        k: usize,
        /// Scoring: bm25 or tfidf
        #[arg(long, default_value_t = Scoring::Bm25)]
        mode: Scoring,
    },
    /// Evaluate RBP, DCG and AP over a query set
    Eval {
        #[command(flatten)]
        location: IndexLocation,
        /// Lines of `query_id query text`
        #[arg(long, default_value = "queries.txt")]
        queries: String,
        /// Lines of `query_id doc_number`
        #[arg(long, default_value = "qrels.txt")]
        qrels: String,
        #[arg(long, default_value_t = 1000)]
        k: usize,
        #[arg(long, default_value_t = Scoring::Bm25)]
        mode: Scoring,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { location, encoding, keep_intermediate } => build_index(&location, encoding, keep_intermediate),
        Commands::Search { location, query, k, mode } => search(&location, &query, k, mode),
        Commands::Eval { location, queries, qrels, k, mode } => run_eval(&location, &queries, &qrels, k, mode),
    }
}

fn open_searcher(location: &IndexLocation) -> Result<Searcher> {
    Searcher::open(&location.index, &location.index_name, &location.data, Arc::new(EnglishNormalizer))
        .with_context(|| format!("opening index in {}", location.index))
}

fn build_index(location: &IndexLocation, encoding: Encoding, keep_intermediate: bool) -> Result<()> {
    let mut config = IndexConfig::new(&location.data, &location.index);
    config.index_name = location.index_name.clone();
    config.encoding = encoding;
    config.keep_intermediate = keep_intermediate;
    let mut index = BsbiIndex::new(config);
    let meta = index.index().with_context(|| format!("indexing {}", location.data))?;
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}

fn search(location: &IndexLocation, query: &str, k: usize, mode: Scoring) -> Result<()> {
    let searcher = open_searcher(location)?;
    println!("Query  : {query}");
    println!("{} results:", mode.to_string().to_uppercase());
    for (score, doc) in searcher.retrieve(query, k, mode)? {
        println!("{doc:30} {score:>.3}");
    }
    Ok(())
}

fn run_eval(location: &IndexLocation, queries: &str, qrels: &str, k: usize, mode: Scoring) -> Result<()> {
    let searcher = open_searcher(location)?;
    let queries = parse_queries(&fs::read_to_string(queries).with_context(|| format!("reading {queries}"))?);
    let qrels = Qrels::load(qrels).with_context(|| format!("reading {qrels}"))?;
    tracing::info!(queries = queries.len(), judged = qrels.query_count(), %mode, k, "evaluating");
    let summary = evaluate(&searcher, &queries, &qrels, k, mode)?;
    println!("Evaluation of {mode} over {} queries", summary.queries);
    println!("RBP score = {}", summary.rbp);
    println!("DCG score = {}", summary.dcg);
    println!("AP score  = {}", summary.ap);
    Ok(())
}
