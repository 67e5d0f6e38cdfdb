use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use vacuum_assist::chat::{ChatService, Conversation, QUICK_OPTIONS};
use vacuum_assist::knowledge::{self, KnowledgeItem};
use vacuum_assist::llm::{LLMConfig, OpenAiCompatibleClient};
use vacuum_assist::retriever::Retriever;

#[derive(Parser)]
#[command(name = "vacuum-assist")]
#[command(about = "Vacuum pump diagnostics assistant backed by a curated knowledge base")]
#[command(version)]
struct Cli {
    /// Knowledge corpus: a JSON file or a directory of JSON files (defaults to the bundled corpus)
    #[arg(long, env = "KNOWLEDGE_PATH")]
    knowledge: Option<PathBuf>,

    /// Number of knowledge entries injected into each prompt
    #[arg(long, default_value = "2")]
    top_k: NonZeroUsize,

    /// Completion model name
    #[arg(long, env = "LLM_MODEL", default_value = "llama-3.3-70b-versatile")]
    model: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "LLM_BASE_URL", default_value = "https://api.groq.com/openai/v1")]
    base_url: String,

    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Upper bound on a single completion call
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    #[arg(long, default_value_t = 0.3)]
    temperature: f32,

    #[arg(long, default_value_t = 600)]
    max_tokens: usize,

    #[arg(long, default_value_t = 0.9)]
    top_p: f32,

    /// Answer a single question and exit
    #[arg(long)]
    query: Option<String>,

    /// Print the retrieved knowledge instead of calling the model
    #[arg(long)]
    retrieve_only: bool,
}

impl Cli {
    fn llm_config(&self) -> LLMConfig {
        LLMConfig {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    fn load_corpus(&self) -> Result<Vec<KnowledgeItem>> {
        match &self.knowledge {
            Some(path) => knowledge::load_corpus(path)
                .with_context(|| format!("Failed to load knowledge corpus from {}", path.display())),
            None => knowledge::bundled_corpus().context("Bundled knowledge corpus is invalid"),
        }
    }
}

/// Reads one trimmed line from stdin; `None` on EOF.
fn prompt_line() -> Result<Option<String>> {
    print!("> ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    if std::io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn print_options() {
    println!("Quick options (enter a number):");
    for (i, option) in QUICK_OPTIONS.iter().enumerate() {
        println!("  {}. {}", i + 1, option);
    }
}

/// Maps a bare option number to its quick option text.
fn resolve_input(input: &str) -> &str {
    input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| QUICK_OPTIONS.get(i).copied())
        .unwrap_or(input)
}

fn run_retrieve_only(retriever: &Retriever, cli: &Cli) -> Result<()> {
    let print_hits = |query: &str| {
        for hit in retriever.retrieve_scored(query, cli.top_k.get()) {
            println!("[{:.3}]\n{}", hit.score, hit.text);
        }
    };

    if let Some(query) = &cli.query {
        print_hits(query);
        return Ok(());
    }

    while let Some(line) = prompt_line()? {
        if !line.is_empty() {
            print_hits(resolve_input(&line));
        }
    }
    Ok(())
}

async fn run_chat(retriever: Arc<Retriever>, cli: &Cli) -> Result<()> {
    let client = OpenAiCompatibleClient::new(cli.llm_config())
        .context("Failed to create completion client (set GROQ_API_KEY or --api-key)")?;
    let service = ChatService::new(retriever, client).with_top_k(cli.top_k.get());
    let mut conversation = Conversation::new();

    if let Some(query) = &cli.query {
        println!("{}", conversation.ask(&service, query).await);
        return Ok(());
    }

    println!("Vacuum pump diagnostics assistant. Describe the issue (Ctrl+D to exit).");
    println!("Commands: /options, /reset");
    print_options();

    while let Some(line) = prompt_line()? {
        match line.as_str() {
            "" => continue,
            "/options" => print_options(),
            "/reset" => {
                conversation.clear();
                println!("Conversation cleared.");
            }
            input => {
                let message = resolve_input(input);
                print!("\nThinking...");
                std::io::stdout().flush()?;
                let reply = conversation.ask(&service, message).await;
                println!("\r{}\n", reply);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let corpus = cli.load_corpus()?;
    let retriever = Arc::new(Retriever::new(corpus));
    // Build up front so the first question does not pay for it
    retriever.initialize();
    info!("Knowledge base ready");

    if cli.retrieve_only {
        run_retrieve_only(&retriever, &cli)
    } else {
        run_chat(retriever, &cli).await
    }
}
