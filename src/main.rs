use infra_investigator::agent::{InvestigationAgent, InvestigationRequest, InvestigationResult};
use infra_investigator::config::AgentConfig;
use infra_investigator::learning::{AgentMemory, MemoryHandle};
use infra_investigator::provider::CloudProvider;
use infra_investigator::query::{CallContext, QueryTool, SteampipeExecutor, ToolResponse};
use infra_investigator::tables::resolve_tables;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "investigator")]
#[command(about = "Investigate cloud infrastructure with natural-language questions")]
#[command(version)]
struct Args {
    /// Agent memory snapshot (or set INVESTIGATOR_MEMORY_PATH)
    #[arg(long, global = true)]
    memory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan and run an investigation
    Investigate {
        /// The question in natural language
        prompt: String,

        /// Cloud provider: aws, azure or gcp
        #[arg(short, long, default_value = "aws")]
        provider: String,

        #[arg(short, long)]
        region: Option<String>,

        /// OpenAI API key (or set OPENAI_API_KEY env var)
        #[arg(long)]
        api_key: Option<String>,

        /// Maximum planned steps to run
        #[arg(long)]
        max_steps: Option<usize>,

        /// Discover table schemas before planning
        #[arg(long)]
        learn_schemas: bool,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a single query through the query tool
    Query {
        query: String,

        #[arg(short, long, default_value = "aws")]
        provider: CloudProvider,

        #[arg(long)]
        json: bool,
    },
    /// Show the candidate tables for a question
    Tables {
        prompt: String,

        #[arg(short, long, default_value = "aws")]
        provider: CloudProvider,
    },
    /// List lessons learned from past failures
    Lessons {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = AgentConfig::from_env().context("invalid configuration")?;
    if args.memory.is_some() {
        config.memory_path = args.memory;
    }

    match args.command {
        Commands::Investigate {
            prompt,
            provider,
            region,
            api_key,
            max_steps,
            learn_schemas,
            timeout,
            json,
        } => {
            if let Some(key) = api_key {
                config.openai_api_key = key;
            }
            if let Some(n) = max_steps {
                config.max_steps = n;
            }
            config.learn_schemas |= learn_schemas;

            let mut request = InvestigationRequest::new(prompt, provider);
            if let Some(region) = region {
                request = request.with_region(region);
            }
            run_investigation(&config, request, timeout, json).await
        }
        Commands::Query { query, provider, json } => run_query(&config, provider, &query, json).await,
        Commands::Tables { prompt, provider } => {
            for table in resolve_tables(&prompt, provider) {
                println!("{}", table);
            }
            Ok(())
        }
        Commands::Lessons { limit } => {
            let memory = load_memory(&config)?;
            let lessons = memory.recent_lessons(limit);
            if lessons.is_empty() {
                println!("No lessons recorded yet.");
            }
            for (i, lesson) in lessons.iter().enumerate() {
                println!("{}. {}", i + 1, lesson);
            }
            Ok(())
        }
    }
}

fn load_memory(config: &AgentConfig) -> Result<AgentMemory> {
    match &config.memory_path {
        Some(path) => AgentMemory::load(path)
            .with_context(|| format!("failed to load memory from {}", path.display())),
        None => Ok(AgentMemory::default()),
    }
}

fn save_memory(config: &AgentConfig, memory: &MemoryHandle) {
    if let Some(path) = &config.memory_path {
        if let Err(e) = memory.save(path) {
            warn!("Failed to save memory to {}: {}", path.display(), e);
        }
    }
}

/// Cancels the returned context on Ctrl-C.
fn interruptible_context(timeout: Option<u64>) -> CallContext {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, cancelling");
            on_signal.cancel();
        }
    });

    let ctx = CallContext::new().with_cancellation(token);
    match timeout {
        Some(secs) => ctx.with_timeout(Duration::from_secs(secs)),
        None => ctx,
    }
}

async fn run_investigation(
    config: &AgentConfig,
    request: InvestigationRequest,
    timeout: Option<u64>,
    json: bool,
) -> Result<()> {
    let memory = MemoryHandle::new(load_memory(config)?);
    let agent = InvestigationAgent::from_config(config, memory.clone());
    let ctx = interruptible_context(timeout);

    let result = agent.investigate(&request, &ctx).await;
    save_memory(config, &memory);
    let result = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

async fn run_query(config: &AgentConfig, provider: CloudProvider, query: &str, json: bool) -> Result<()> {
    let memory = MemoryHandle::new(load_memory(config)?);
    let executor = Arc::new(SteampipeExecutor::new(config.steampipe_bin.clone()));
    let tool = QueryTool::new(executor, memory.clone()).with_query_timeout(config.query_timeout);
    let credentials = infra_investigator::agent::EnvCredentialProvider::collect(provider, |k| {
        std::env::var(k).ok()
    });

    let ctx = interruptible_context(None);
    let response = tool.execute(provider, query, &credentials, &ctx).await;
    save_memory(config, &memory);
    let response = response?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response)?;
    }
    Ok(())
}

fn print_response(response: &ToolResponse) -> Result<()> {
    println!("Query: {}", response.query);
    match &response.error {
        Some(error) => println!("Failed: {}", error),
        None => {
            println!("{} row(s) in {}ms", response.row_count, response.execution_time_ms);
            println!("{}", serde_json::to_string_pretty(&response.results)?);
        }
    }
    for insight in &response.insights {
        println!("  [{:?}] {}", insight.severity, insight.title);
    }
    Ok(())
}

fn print_result(result: &InvestigationResult) {
    println!("\n{}", "=".repeat(80));
    println!(" INVESTIGATION {}", result.id);
    println!("{}", "=".repeat(80));

    for step in &result.steps {
        let status = if step.success { "ok" } else { "FAILED" };
        println!("\nStep {} [{}] {}", step.step_number, status, step.description);
        println!("  {}", step.query);
        match &step.error {
            Some(error) => println!("  error: {}", error),
            None => println!("  {} row(s) in {}ms", step.results.len(), step.execution_time_ms),
        }
    }

    if !result.insights.is_empty() {
        println!("\nInsights:");
        for insight in &result.insights {
            println!("  [{:?}/{:?}] {}", insight.kind, insight.severity, insight.title);
            if !insight.recommendation.is_empty() {
                println!("      -> {}", insight.recommendation);
            }
        }
    }

    println!("\n{}", result.summary);
    println!(
        "Queries: {}  Confidence: {:.0}%  Duration: {}ms",
        result.query_count,
        result.confidence * 100.0,
        result.duration_ms
    );
}
