use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use isa_scraper::config::{Settings, DEFAULT_OUTPUT};
use isa_scraper::fetch::Fetcher;
use isa_scraper::store::{self, Dataset};
use isa_scraper::{jvm, pipeline};
use tracing::info;

#[derive(Parser)]
#[command(name = "isa_scraper", about = "Instruction reference scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape new and previously failed x86 instruction pages
    Run {
        /// TOML settings file (ISA_* env vars override it)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Dataset file, read for resume and rewritten at the end
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Max concurrent workers
        #[arg(short = 'w', long)]
        workers: Option<usize>,
        /// Index page listing the instruction pages
        #[arg(long)]
        index_url: Option<String>,
    },
    /// Scrape the JVM bytecode table into flat records
    Jvm {
        #[arg(short, long, default_value = jvm::OUTPUT)]
        output: PathBuf,
        #[arg(long, default_value = jvm::SOURCE_URL)]
        source_url: String,
    },
    /// Show dataset statistics
    Stats {
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            output,
            workers,
            index_url,
        } => {
            let mut settings = Settings::load(config.as_deref())?;
            if let Some(output) = output {
                settings.output = output;
            }
            if let Some(workers) = workers {
                settings.workers = workers.max(1);
            }
            if let Some(index_url) = index_url {
                settings.index_url = index_url;
            }

            let summary = pipeline::run(&settings).await?;
            println!(
                "{} links on index, {} already scraped.",
                summary.discovered, summary.skipped
            );
            println!(
                "Done: {} scraped ({} ok, {} errors).",
                summary.scraped.total, summary.scraped.ok, summary.scraped.errors
            );
            println!(
                "Dataset {:?}: {} records, {} with errors.",
                settings.output, summary.dataset_total, summary.dataset_errors
            );
            Ok(())
        }
        Commands::Jvm { output, source_url } => {
            info!("Starting JVM instruction scraper");
            let fetcher = Fetcher::new(jvm::USER_AGENT, Duration::from_secs(jvm::TIMEOUT_SECS))?;
            let instructions = jvm::fetch_instructions(&fetcher, &source_url).await?;
            info!("Parsed {} instructions", instructions.len());
            store::write_json(&output, &instructions)?;
            println!("Saved {} instructions to {:?}", instructions.len(), output);
            Ok(())
        }
        Commands::Stats { output } => {
            let dataset = Dataset::load(&output);
            if dataset.is_empty() {
                println!("No records in {:?}.", output);
                return Ok(());
            }
            let errors = dataset.error_count();
            println!("Total:  {}", dataset.len());
            println!("OK:     {}", dataset.len() - errors);
            println!("Errors: {}", errors);

            let mut by_category: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
            for record in dataset.records() {
                let entry = by_category.entry(record.category.as_str()).or_default();
                entry.0 += 1;
                if !record.is_ok() {
                    entry.1 += 1;
                }
            }
            println!("\n--- Categories ---");
            for (category, (total, errors)) in &by_category {
                println!("  {:<32} {:>5} ({} errors)", truncate(category, 32), total, errors);
            }

            let failed: Vec<_> = dataset.records().filter(|r| !r.is_ok()).collect();
            if !failed.is_empty() {
                println!("\n--- Errors ---");
                for r in failed {
                    println!("  {}: {}", r.identifier, r.error.as_deref().unwrap_or_default());
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
