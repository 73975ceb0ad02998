use anyhow::Context;
use clap::{Parser, Subcommand};
use database::Database;
use llm_interface::OpenAiProvider;
use logipost_core::{
    load_post_ids, load_posts, openai_api_key_from_env, CoreError, ErrorExt, ErrorReporter,
    PipelineConfig,
    RedditCredentials, ShutdownState, TieBreak,
};
use pipeline::{dedupe_file, merge_files, spawn_signal_listener, Pipeline};
use reddit_client::{RedditClient, RedditOAuth2Config};
use sink_client::{BatchReport, HttpSink, Uploader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "logipost")]
#[command(about = "Collect, clean, paraphrase and publish logistics posts from Reddit")]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect unique posts and save the scraped file
    Scrape {
        #[arg(long)]
        target: Option<usize>,
    },
    /// Collect, filter, classify, paraphrase and save every stage
    Run {
        #[arg(long)]
        target: Option<usize>,
    },
    /// Normalize and paraphrase the posts of an existing file
    Rewrite {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Collapse posts sharing a title, keeping the most upvoted
    Dedupe {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Break upvote ties by the earliest creation time
        #[arg(long)]
        prefer_earliest: bool,
    },
    /// Drop posts already published in a previous file and strip ids
    Merge {
        #[arg(long)]
        current: PathBuf,
        #[arg(long)]
        previous: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Upload posts and their comments to the backend
    Upload {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Delete the posts whose ids are listed in a file
    Delete {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Apply or revert the backend schema migrations
    Migrate {
        #[command(subcommand)]
        direction: MigrateDirection,
        #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/posts.db")]
        database_url: String,
    },
}

#[derive(Subcommand)]
enum MigrateDirection {
    Up,
    Down,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("logipost=info,pipeline=info,reddit_client=info,llm_interface=info,sink_client=info,database=info,logipost_core=info")
            }),
        )
        .init();

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<CoreError>() {
                Some(core) => ErrorReporter::new().report_error(core),
                None => error!("{:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Scrape { target } => {
            let config = apply_target(config, target);
            let shutdown = ShutdownState::new();
            spawn_signal_listener(shutdown.clone());

            let source = reddit_client(&config)?.with_shutdown(shutdown.clone());
            let pipeline = Pipeline::new(config, source, ()).with_shutdown(shutdown);
            let outcome = pipeline.scrape().await?;
            info!(
                status = ?outcome.report.status,
                collected = outcome.posts.len(),
                rounds = outcome.report.rounds,
                "Scrape finished"
            );
            log_api_usage(pipeline.source()).await;
        }
        Commands::Run { target } => {
            let config = apply_target(config, target);
            let shutdown = ShutdownState::new();
            spawn_signal_listener(shutdown.clone());

            let source = reddit_client(&config)?.with_shutdown(shutdown.clone());
            let paraphraser = openai_provider(&config)?;
            let pipeline = Pipeline::new(config, source, paraphraser).with_shutdown(shutdown);
            let summary = pipeline.run().await?;
            info!(
                status = ?summary.collect.status,
                scraped = summary.scraped,
                filtered = summary.filtered,
                "Run finished"
            );
            log_api_usage(pipeline.source()).await;
        }
        Commands::Rewrite { input, output } => {
            let shutdown = ShutdownState::new();
            spawn_signal_listener(shutdown.clone());

            let paraphraser = openai_provider(&config)?;
            let pipeline = Pipeline::new(config, (), paraphraser).with_shutdown(shutdown);
            let report = pipeline.rewrite_file(&input, &output).await?;
            info!(
                paraphrased = report.paraphrased,
                fallbacks = report.fallbacks,
                skipped = report.skipped,
                interrupted = report.interrupted,
                "Rewrite finished"
            );
        }
        Commands::Dedupe {
            input,
            output,
            prefer_earliest,
        } => {
            let tie_break = if prefer_earliest {
                TieBreak::UpvotesThenEarliest
            } else {
                config.tie_break()
            };
            let kept = dedupe_file(&input, &output, tie_break)?;
            info!(kept, output = %output.display(), "Duplicates removed");
        }
        Commands::Merge {
            current,
            previous,
            output,
        } => {
            let kept = merge_files(&current, &previous, &output)?;
            info!(kept, output = %output.display(), "Merge finished");
        }
        Commands::Upload { input, base_url } => {
            let posts = load_posts(&input);
            if posts.is_empty() {
                info!("No valid posts found in the input file");
                return Ok(ExitCode::SUCCESS);
            }
            let uploader = uploader(&config, base_url)?;
            return Ok(exit_code(uploader.upload_posts(&posts).await));
        }
        Commands::Delete { input, base_url } => {
            let ids = load_post_ids(&input);
            if ids.is_empty() {
                info!("No valid post ids found in the input file");
                return Ok(ExitCode::SUCCESS);
            }
            let uploader = uploader(&config, base_url)?;
            return Ok(exit_code(uploader.delete_posts(&ids).await));
        }
        Commands::Migrate {
            direction,
            database_url,
        } => {
            let mut db = Database::new(database_url);
            db.connect().await?;
            match direction {
                MigrateDirection::Up => db.run_migrations().await?,
                MigrateDirection::Down => match db.revert_last().await? {
                    Some(version) => info!(version, "Reverted migration"),
                    None => info!("No applied migrations to revert"),
                },
            }
            db.close().await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn apply_target(config: PipelineConfig, target: Option<usize>) -> PipelineConfig {
    match target {
        Some(target) => config.with_target(target),
        None => config,
    }
}

fn reddit_client(config: &PipelineConfig) -> anyhow::Result<RedditClient> {
    let credentials = RedditCredentials::from_env()?;
    let client = RedditClient::new(RedditOAuth2Config::from(credentials))?
        .with_max_comments(config.collect.max_comments);
    Ok(client)
}

fn openai_provider(config: &PipelineConfig) -> anyhow::Result<OpenAiProvider> {
    let api_key = openai_api_key_from_env()?;
    Ok(OpenAiProvider::new(api_key, &config.rewrite)?)
}

fn uploader(config: &PipelineConfig, base_url: Option<String>) -> anyhow::Result<Uploader<HttpSink>> {
    let base_url = base_url.unwrap_or_else(|| config.sink.base_url.clone());
    let sink = HttpSink::new(&base_url)?;
    Ok(Uploader::new(sink)
        .with_delay(config.sink.delay())
        .with_default_category(config.sink.default_category.clone()))
}

async fn log_api_usage(client: &RedditClient) {
    let metrics = client.api().get_metrics().await;
    info!(
        requests = metrics.total_requests,
        failed = metrics.failed_requests,
        rate_limited = metrics.rate_limited_requests,
        average_ms = metrics.average_response_time().as_millis() as u64,
        "Reddit API usage"
    );
}

/// A batch stopped by an unreachable sink exits with status 1.
fn exit_code(report: BatchReport) -> ExitCode {
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        not_found = report.not_found,
        "Batch finished"
    );
    match report.aborted {
        Some(e) => {
            error!("{}", e.user_friendly_message());
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}
