use clap::{Parser, Subcommand};
use evaluator::{
    analyze, Category, Dialect, EvalConfig, EvalResult, EvaluationPipeline, EvaluationRequest,
    StreamRequest, StreamSession,
};
use model::{AdapterTable, ModelRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "harness")]
#[command(about = "Compare language models on Arabic prompts")]
struct Cli {
    /// TOML configuration file (environment variables take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a prompt against several models, score the answers and pick a winner
    Evaluate {
        /// The prompt to evaluate
        #[arg(short, long)]
        prompt: String,
        /// Comma-separated model ids (2 to 6)
        #[arg(short, long, value_delimiter = ',', required = true)]
        models: Vec<String>,
        #[arg(short, long, default_value = "msa")]
        dialect: Dialect,
        #[arg(short, long, default_value = "dialect_understanding")]
        category: Category,
        /// Defaults to the configured default_max_tokens
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Reference answer handed to the judge
        #[arg(long)]
        reference: Option<String>,
    },
    /// Stream model output token by token, one JSON event per line
    Stream {
        #[arg(short, long)]
        prompt: String,
        #[arg(short, long, value_delimiter = ',', default_value = "gpt-4o")]
        models: Vec<String>,
        #[arg(short, long, default_value = "msa")]
        dialect: Dialect,
        #[arg(long)]
        max_tokens: Option<u32>,
    },
    /// Print linguistic metrics for a piece of text
    Analyze {
        #[arg(short, long)]
        text: String,
        #[arg(short, long, default_value = "msa")]
        dialect: Dialect,
    },
    /// List supported models and whether their provider is configured
    Models,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            prompt,
            models,
            dialect,
            category,
            max_tokens,
            reference,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let mut request = EvaluationRequest::new(prompt, models)
                .with_dialect(dialect)
                .with_category(category)
                .with_max_tokens(max_tokens.unwrap_or(config.default_max_tokens));
            if let Some(reference) = reference {
                request = request.with_reference_answer(reference);
            }
            run_evaluation(&config, &request).await?;
        }
        Commands::Stream {
            prompt,
            models,
            dialect,
            max_tokens,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let mut request = StreamRequest::new(prompt, models);
            request.dialect = dialect;
            request.max_tokens = max_tokens.unwrap_or(config.default_max_tokens);
            run_stream(&config, request).await?;
        }
        Commands::Analyze { text, dialect } => {
            let metrics = analyze(&text, dialect);
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
        Commands::Models => {
            let config = load_config(cli.config.as_deref())?;
            let registry = ModelRegistry::builtin();
            let table = AdapterTable::from_registry(&registry, &config.provider)?;
            println!("Available models:");
            for row in model_rows(&registry, &table) {
                println!("  {}", row);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> EvalResult<EvalConfig> {
    let config = match path {
        Some(path) => EvalConfig::load(path)?,
        None => EvalConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

async fn run_evaluation(
    config: &EvalConfig,
    request: &EvaluationRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = EvaluationPipeline::from_config(config)?;
    let outcome = pipeline.run(request).await?;
    info!(
        "Evaluation {} finished, winner: {}",
        outcome.evaluation_id,
        outcome.winner_model_id.as_deref().unwrap_or("none")
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run_stream(
    config: &EvalConfig,
    request: StreamRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ModelRegistry::builtin();
    let adapters = AdapterTable::from_registry(&registry, &config.provider)?;
    let session = StreamSession::new(Arc::new(adapters), config.dispatch_config());

    let (tx, mut rx) = mpsc::channel(64);
    let run = tokio::spawn(async move { session.run(request, tx).await });

    while let Some(event) = rx.recv().await {
        println!("{}", serde_json::to_string(&event)?);
    }

    match run.await? {
        Ok(evaluation_id) => info!("Stream {} finished", evaluation_id),
        Err(e) => {
            error!("Stream rejected: {}", e);
            return Err(e.into());
        }
    }
    Ok(())
}

fn model_rows(registry: &ModelRegistry, table: &AdapterTable) -> Vec<String> {
    registry
        .iter()
        .map(|info| {
            let status = if table.is_available(&info.id) {
                "ready".to_string()
            } else {
                format!("missing {}", info.family.credential_env())
            };
            format!(
                "{:<20} {:<20} {:<12} ${:.4}/1k out  {}",
                info.id, info.name, info.provider, info.cost_per_1k_output_usd, status
            )
        })
        .collect()
}
