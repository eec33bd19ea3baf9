use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use skin_merge::app::merge_files_use_case::MergeFilesUseCase;
use skin_merge::config::Config;
use skin_merge::constants;
use skin_merge::infra::http_client::ReqwestHttp;
use skin_merge::infra::line_files::{FileLineSink, FileLineSource};
use skin_merge::logging;
use skin_merge::metrics;
use skin_merge::pipeline::processing::enrich::{resolve_token, RemoteSkinResolver};
use skin_merge::pipeline::processing::normalize::normalize;
use skin_merge::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "skin_merge")]
#[command(about = "Merge account records with skin data and normalize the result")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = constants::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the primary file with the secondary file and write the enriched output
    Run {
        /// Primary file (user:skins...:ea:el:tag)
        #[arg(long)]
        primary: PathBuf,
        /// Secondary file (user:password:server:email:birth:creation:country)
        #[arg(long)]
        secondary: PathBuf,
        /// Number of parallel workers
        #[arg(long)]
        threads: Option<usize>,
        /// Output file; defaults to <output.dir>/<output.prefix>_<uuid>.txt
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply the normalization table to a line of text
    Normalize {
        text: String,
    },
    /// Look up a single skin code (digits only, or the full CHAMPION_SKIN_RENTAL_ token)
    Resolve {
        code: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    match cli.command {
        Commands::Run {
            primary,
            secondary,
            threads,
            output,
            json,
        } => {
            let threads = threads.unwrap_or(config.pipeline.threads);
            let sink = match output {
                Some(path) => FileLineSink::new(path),
                None => FileLineSink::with_generated_name(&config.output.dir, &config.output.prefix),
            };

            let pipeline = Pipeline::from_config(&config)?;
            let stop = pipeline.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Stop requested; finishing records already in progress");
                    stop.stop();
                }
            });

            let use_case = MergeFilesUseCase::new(Box::new(FileLineSource), Box::new(sink), pipeline);

            println!("🔄 Running merge with {} worker(s)...", threads);
            let summary = match use_case
                .execute(
                    &primary.to_string_lossy(),
                    &secondary.to_string_lossy(),
                    threads,
                )
                .await
            {
                Ok(summary) => summary,
                Err(e) => {
                    error!("Run failed: {}", e);
                    println!("❌ Run failed: {}", e);
                    return Err(e.into());
                }
            };

            let report = &summary.report;
            if json {
                println!("{}", serde_json::to_string_pretty(report)?);
            } else {
                println!("\n📊 Run Results:");
                println!("   Records: {}", report.total_records);
                println!("   Merged: {}", report.merged);
                println!("   Without account data: {}", report.fallback);
                println!("   Skipped: {}", report.skipped);
                println!("   Failed: {}", report.failures.len());
                println!(
                    "   Skin codes: {} resolved, {} unresolved",
                    report.codes_resolved, report.codes_unresolved
                );
                println!("   Output file: {}", summary.output_location);

                if !report.failures.is_empty() {
                    println!("\n⚠️  Dropped records:");
                    for failure in &report.failures {
                        println!(
                            "   - line {} ({}): {}",
                            failure.line_number, failure.user, failure.reason
                        );
                    }
                }
            }
            if report.stopped_early {
                println!("⏹️  Stopped before all records were processed");
            } else {
                println!("✅ Output saved to {}", summary.output_location);
            }
        }
        Commands::Normalize { text } => {
            println!("{}", normalize(&text));
        }
        Commands::Resolve { code } => {
            let http = ReqwestHttp::new(config.resolver.timeout())?;
            let resolver = RemoteSkinResolver::new(Arc::new(http), config.resolver.url.clone());
            info!("Resolving skin code {}", code.trim());
            match resolve_token(&resolver, &code).await {
                Ok(details) => println!("{}", details),
                Err(e) => {
                    println!("❌ {}", e);
                    return Err(e.into());
                }
            }
        }
    }
    Ok(())
}
