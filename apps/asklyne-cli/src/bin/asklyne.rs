use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{env, fs};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use asklyne_core::config::{expand_path, Config, Settings};
use asklyne_core::{Mode, Session, Tier, TierPolicy};
use asklyne_embed::{HashingLoader, ModelHub};
use asklyne_hybrid::{Answer, Assistant, InferenceClient, Ingestor, QueryRequest, Reranker, Retriever};
use asklyne_text::TantivyKeywordStore;
use asklyne_vector::LanceVectorStore;

const USAGE: &str = "Usage: asklyne <ingest|search|ask> <path|query> --session <id> [--tier free|plus|pro] [--mode text|code|notes] [--exchanges N]";

struct Args {
    cmd: String,
    target: String,
    session: Session,
    tier: Tier,
    mode: Mode,
    exchanges_used: usize,
}

fn usage_exit(msg: &str) -> ! {
    eprintln!("Error: {msg}\n{USAGE}");
    std::process::exit(2)
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 2 { usage_exit("missing command or target"); }
    let (mut session, mut tier, mut mode, mut exchanges_used) = (None, Tier::Free, Mode::Text, 0usize);
    let mut i = 2;
    while i < args.len() {
        let value = args.get(i + 1).cloned().unwrap_or_else(|| usage_exit(&format!("{} requires a value", args[i])));
        match args[i].as_str() {
            "--session" | "-s" => session = Some(Session::new(value)?),
            "--tier" | "-t" => tier = value.parse()?,
            "--mode" | "-m" => mode = value.parse()?,
            "--exchanges" => exchanges_used = value.parse()?,
            other => usage_exit(&format!("unknown flag {other}")),
        }
        i += 2;
    }
    let session = session.unwrap_or_else(|| usage_exit("--session is required"));
    Ok(Args { cmd: args[0].clone(), target: args[1].clone(), session, tier, mode, exchanges_used })
}

struct Stack {
    settings: Settings,
    policy: Arc<TierPolicy>,
    models: Arc<ModelHub>,
    vector: Arc<LanceVectorStore>,
    keyword: Arc<TantivyKeywordStore>,
}

impl Stack {
    async fn open(settings: Settings) -> anyhow::Result<Self> {
        let policy = Arc::new(settings.tier_policy()?);
        let models = Arc::new(ModelHub::new(Arc::new(HashingLoader)));
        let keyword = Arc::new(TantivyKeywordStore::open(expand_path(&settings.data.tantivy_dir))?);
        let vector = Arc::new(LanceVectorStore::open(&expand_path(&settings.data.lancedb_dir)).await?);
        Ok(Self { settings, policy, models, vector, keyword })
    }

    fn retriever(&self) -> Retriever {
        Retriever::new(Arc::clone(&self.policy), Arc::clone(&self.models), self.vector.clone(), self.keyword.clone())
            .with_deadline(std::time::Duration::from_millis(self.settings.retrieval.deadline_ms))
            .with_fusion(self.settings.retrieval.fusion)
    }
}

fn collect_files(target: &Path) -> Vec<PathBuf> {
    if target.is_file() { return vec![target.to_path_buf()]; }
    WalkDir::new(target)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.into_path())
        .collect()
}

async fn ingest(stack: &Stack, args: &Args) -> anyhow::Result<()> {
    let ingestor = Ingestor::new(Arc::clone(&stack.policy), Arc::clone(&stack.models), stack.vector.clone(), stack.keyword.clone())
        .with_chunking(stack.settings.chunking);
    let files = collect_files(Path::new(&args.target));
    if files.is_empty() { anyhow::bail!("no files found under {}", args.target); }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?.progress_chars("#>-"));
    let (mut total_chunks, mut skipped) = (0usize, 0usize);
    for path in &files {
        pb.set_message(path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default());
        let content = String::from_utf8_lossy(&fs::read(path)?).into_owned();
        match ingestor.ingest(&content, &args.session, args.tier, args.mode).await {
            Ok(report) => total_chunks += report.chunks,
            Err(asklyne_core::Error::LimitExceeded(reason)) => {
                warn!(path = %path.display(), %reason, "skipped");
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");
    info!(files = files.len(), skipped, chunks = total_chunks, "ingest complete");
    println!("Ingested {} chunks from {} files ({} skipped)", total_chunks, files.len() - skipped, skipped);
    Ok(())
}

async fn search(stack: &Stack, args: &Args) -> anyhow::Result<()> {
    let hits = stack.retriever().retrieve(&args.target, &args.session, args.tier, args.mode, stack.settings.retrieval.top_k).await?;
    let profile = stack.policy.resolve(args.tier, args.mode);
    let reranked = Reranker::new(Arc::clone(&stack.models)).rerank(&args.target, hits, profile).await;
    if let Some(w) = &reranked.warning { eprintln!("warning: {w}"); }
    if reranked.hits.is_empty() { println!("No results."); }
    for (rank, hit) in reranked.hits.iter().enumerate() {
        let preview: String = hit.text.chars().take(160).collect();
        println!("{:>2}. [{:?} {:.3}] {}", rank + 1, hit.source, hit.score, preview.replace('\n', " "));
    }
    Ok(())
}

async fn ask(stack: &Stack, args: &Args) -> anyhow::Result<()> {
    let completion = Arc::new(InferenceClient::new(&stack.settings.completion)?);
    let assistant = Assistant::new(Arc::clone(&stack.policy), stack.retriever(), Reranker::new(Arc::clone(&stack.models)), completion)
        .with_top_k(stack.settings.retrieval.top_k);
    let request = QueryRequest {
        session: args.session.clone(),
        query: args.target.clone(),
        tier: args.tier,
        mode: args.mode,
        exchanges_used: args.exchanges_used,
    };
    match assistant.answer(&request).await? {
        Answer::NoRelevantContent => println!("No relevant content found for this session."),
        Answer::Generated { text, context_tokens, chunks_used, warnings } => {
            for w in warnings { eprintln!("warning: {w}"); }
            println!("{text}");
            info!(context_tokens, chunks_used, "answered");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let settings = Config::load()
        .map_err(|e| { eprintln!("Error loading config: {}", e); e })?
        .settings()?;
    let args = parse_args()?;
    let stack = Stack::open(settings).await?;
    match args.cmd.as_str() {
        "ingest" => ingest(&stack, &args).await,
        "search" => search(&stack, &args).await,
        "ask" => ask(&stack, &args).await,
        other => usage_exit(&format!("unknown command {other}")),
    }
}
