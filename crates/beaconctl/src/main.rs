//! Beacon CLI - ask cited questions about Boston government processes.

mod client;

use anyhow::Result;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;

use client::BeacondClient;

const DEFAULT_URL: &str = "http://127.0.0.1:7868";

#[derive(Parser)]
#[command(name = "beaconctl", version, about = "Client for the Beacon assistant daemon")]
struct Cli {
    /// Daemon base URL (also read from BEACOND_URL)
    #[arg(long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question and get a cited answer
    Ask {
        /// The question, e.g. "Am I eligible for a resident parking permit?"
        question: Vec<String>,
    },
    /// Look up a single fact by id
    Fact { fact_id: String },
    /// List facts matching an id prefix
    Facts {
        #[arg(long, default_value = "rpp.")]
        prefix: String,
    },
    /// Show the ordered steps of a process
    Steps {
        #[arg(default_value = "boston_resident_parking_permit")]
        process_id: String,
    },
    /// Check daemon health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let url = cli
        .url
        .or_else(|| std::env::var("BEACOND_URL").ok())
        .unwrap_or_else(|| DEFAULT_URL.to_string());
    let client = BeacondClient::new(&url)?;

    match cli.command {
        Commands::Ask { question } => {
            let question = question.join(" ");
            if question.trim().is_empty() {
                anyhow::bail!("Question cannot be empty");
            }
            let response = client.ask(&question).await?;

            println!("{}", response.answer);
            if !response.citations.is_empty() {
                println!();
                println!("{}", "Sources:".bold());
                for (index, citation) in response.citations.iter().enumerate() {
                    println!("  {}. {}", index + 1, citation.text);
                    match &citation.fact_id {
                        Some(fact_id) => println!(
                            "     {} ({})",
                            citation.url.blue(),
                            fact_id.dimmed()
                        ),
                        None => println!("     {}", citation.url.blue()),
                    }
                }
            }
        }

        Commands::Fact { fact_id } => {
            let fact = client.fact(&fact_id).await?;
            println!("{}", fact.id.bold());
            println!("  {}", fact.text);
            println!("  {}", fact.source_url.blue());
            println!(
                "  verified {} ({:?} confidence)",
                fact.last_verified,
                fact.confidence
            );
            if let Some(note) = &fact.note {
                println!("  note: {}", note.dimmed());
            }
        }

        Commands::Facts { prefix } => {
            let facts = client.search_facts(&prefix).await?;
            if facts.is_empty() {
                println!("No facts match prefix '{prefix}'");
            }
            for fact in facts {
                println!("{}  {}", fact.id.bold(), fact.text);
            }
        }

        Commands::Steps { process_id } => {
            let steps = client.process_steps(&process_id).await?;
            if steps.is_empty() {
                println!("No steps found for process '{process_id}'");
            }
            for step in steps {
                println!("{}. {}", step.order, step.name.bold());
                println!("   {}", step.description);
            }
        }

        Commands::Health => {
            let health = client.health().await?;
            println!("status:     {}", health.status.bold());
            println!("version:    {}", health.version);
            println!("uptime:     {}s", health.uptime_seconds);
            println!("registries: {}", health.registries_loaded.join(", "));
            println!("processes:  {}", health.processes_available);
        }
    }

    Ok(())
}
