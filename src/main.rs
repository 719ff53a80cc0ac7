mod adapters;
mod config;
mod core;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::adapters::llm::{self, ReviewRequest};
use crate::core::prompt::PromptConfig;
use crate::core::{ChangeExtractor, ReviewPromptBuilder};

#[derive(Parser)]
#[command(name = "critique")]
#[command(about = "Streams LLM review commentary for a git commit", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(required_unless_present = "diff", help = "Path to the git working directory")]
    repo: Option<PathBuf>,

    #[arg(required_unless_present = "diff", help = "Commit to review (any resolvable revision)")]
    commit: Option<String>,

    #[arg(long, help = "Maximum lines of pre-change content kept per file")]
    max_lines: Option<usize>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long, help = "Override the system prompt")]
    prompt: Option<String>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    max_tokens: Option<usize>,

    #[arg(long, help = "Review a unified diff read from a file instead of a commit")]
    diff: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr; stdout carries nothing but the review text.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = config::Config::load().unwrap_or_default();
    config.merge_with_cli(cli.model.clone(), cli.prompt.clone());
    if let Some(temperature) = cli.temperature {
        config.temperature = temperature;
    }
    if let Some(max_tokens) = cli.max_tokens {
        config.max_tokens = max_tokens;
    }
    if let Some(max_lines) = cli.max_lines {
        config.max_lines = max_lines;
    }

    let (original_code, diff) = if let Some(path) = cli.diff {
        let diff = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read diff from {}", path.display()))?;
        (String::new(), diff)
    } else {
        let repo = cli.repo.context("repository path is required")?;
        let commit = cli.commit.context("commit is required")?;

        info!("Extracting changes for {} in {}", commit, repo.display());
        let extractor = ChangeExtractor::new(&repo, config.max_lines)?;
        let changes = extractor.extract(&commit)?;
        (changes.original_code, changes.diff)
    };

    if original_code.is_empty() && diff.is_empty() {
        println!("No changes found");
        return Ok(());
    }

    let mut prompt_config = PromptConfig::default();
    if let Some(system_prompt) = config.system_prompt.clone() {
        prompt_config.system_prompt = system_prompt;
    }
    let builder = ReviewPromptBuilder::new(prompt_config);
    let (system_prompt, user_prompt) = builder.build_prompt(&original_code, &diff);

    let model_config = llm::ModelConfig {
        model_name: config.model.clone(),
        api_key: config.api_key.clone(),
        base_url: config.base_url.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };
    let adapter = llm::create_adapter(&model_config)?;
    info!("Requesting review from {}", adapter.model_name());

    let request = ReviewRequest {
        system_prompt,
        user_prompt,
        temperature: None,
        max_tokens: None,
    };
    let mut tokens = adapter.stream_review(request).await?;

    let mut stdout = std::io::stdout();
    while let Some(token) = tokens.next().await {
        let token = token?;
        stdout.write_all(token.as_bytes())?;
        stdout.flush()?;
    }
    println!();

    Ok(())
}
