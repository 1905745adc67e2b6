//! fusionrag - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::sync::Arc;

use fusionrag::{
    cli::{Args, Commands},
    config::Config,
    rag::RagPipeline,
    server::{self, AppState},
    telemetry,
    types::{GroundednessLabel, QueryResult},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    if let Commands::Config { init } = &args.command {
        return show_config(&args, *init);
    }

    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    telemetry::init_logging(&config.logging, args.verbose)?;

    match &args.command {
        Commands::Serve { host, port } => serve(config, host.clone(), *port).await,
        Commands::Ask { question, json } => ask(&config, question, *json).await,
        Commands::Config { .. } => Ok(()),
    }
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let pipeline = RagPipeline::build(&config)
        .await
        .context("Failed to build pipeline")?;

    let address = config.bind_address();
    println!(
        "{} {} passages indexed, serving on {}",
        "✓".green().bold(),
        pipeline.corpus_size(),
        format!("http://{}", address).cyan()
    );

    server::serve(AppState::new(Arc::new(pipeline)), &address).await?;
    Ok(())
}

async fn ask(config: &Config, question: &str, json: bool) -> Result<()> {
    let pipeline = RagPipeline::build(config)
        .await
        .context("Failed to build pipeline")?;

    let result = pipeline.answer(question).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &QueryResult) {
    println!("\n{}", "Answer".bold().underline());
    println!("{}\n", result.answer);

    if let Some(label) = result.hallucination_score {
        let verdict = match label {
            GroundednessLabel::Grounded => "yes".green(),
            GroundednessLabel::NotGrounded => "no".red(),
        };
        println!("{} {}", "Grounded:".bold(), verdict);
    }

    println!("{}", "Sources:".bold());
    for passage in &result.documents_used {
        let score = passage
            .relevance_score
            .map(|s| format!("{:.3}", s))
            .unwrap_or_else(|| "-".to_string());
        println!("  [{}] {} ({})", score.dimmed(), passage.title(), passage.identifier.dimmed());
    }

    if let Some(highlights) = &result.highlights {
        if !highlights.is_empty() {
            println!("{}", "Highlights:".bold());
            for highlight in highlights {
                println!("  {} \"{}\"", highlight.id.dimmed(), highlight.segment.yellow());
            }
        }
    }
    println!();
}

fn show_config(args: &Args, init: bool) -> Result<()> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_path().context("Could not determine home directory")?,
    };

    if init && !path.exists() {
        let mut starter = Config::default();
        starter.data.sources = vec!["./data".to_string()];
        starter.save(&path)?;
        println!("{} Wrote starter configuration to {}", "✓".green().bold(), path.display());
    }

    let config = Config::load_from_file(&path)?;

    println!("{} {}", "Configuration:".bold(), path.display());
    println!("  Sources:      {}", config.data.sources.join(", "));
    println!(
        "  Chunking:     {} chars, {} overlap",
        config.data.chunk_size, config.data.chunk_overlap
    );
    println!(
        "  Embeddings:   {}:{} ({:?} store)",
        config.embeddings.provider, config.embeddings.model, config.vector_store.backend
    );
    println!(
        "  Fusion:       vector {} / keyword {}, top_k {}, queries {}",
        config.retriever.vector_weight,
        config.retriever.keyword_weight,
        config.retriever.top_k,
        config.retriever.num_queries
    );
    println!(
        "  Generator:    {}:{} (t={})",
        config.llms.generator.provider, config.llms.generator.model, config.llms.generator.temperature
    );
    println!(
        "  Grader:       {}:{} (t={})",
        config.llms.grader.provider, config.llms.grader.model, config.llms.grader.temperature
    );
    println!(
        "  Checks:       groundedness {}, highlights {}",
        on_off(config.evaluation.hallucination_check),
        on_off(config.evaluation.highlight_segments)
    );
    println!("  Server:       {}", config.bind_address());
    println!("{} configuration is valid", "✓".green().bold());
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}
