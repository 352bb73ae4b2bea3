use clap::Parser;
use croplisten_core::{AppConfig, CoreError, Platform, SearchSpec};
use platform_clients::{
    build_bluesky_query, build_reddit_query, build_twitter_query, walk, BlueskyClient,
    FetchClient, PacingConfig, RedditClient, TwitterClient, WalkConfig, WalkOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use storage::{CsvAppender, DedupSink, MongoStore};
use tracing::{error, info, warn};

/// Collect agricultural social media posts from one platform.
#[derive(Debug, Parser)]
#[command(name = "croplisten", version)]
struct Cli {
    /// Platform to collect from: reddit, twitter or bluesky
    platform: Platform,

    /// Search criteria TOML file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Raw query string, bypassing the config-built query
    #[arg(long)]
    query: Option<String>,

    /// Stop after this many saved posts (overrides the config value)
    #[arg(long)]
    max_posts: Option<usize>,

    /// Append collected posts to this CSV file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Collect without writing to the document store
    #[arg(long)]
    no_store: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "croplisten=debug,platform_clients=debug,storage=debug,info".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(error = %e, "collection run failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CoreError> {
    let config = AppConfig::from_env()?;
    let spec = match &cli.config {
        Some(path) => SearchSpec::load(path)?,
        None => SearchSpec::default(),
    };
    let max_posts = cli.max_posts.unwrap_or(spec.max_posts);

    let (mut client, built_query, pacing): (Box<dyn FetchClient>, String, PacingConfig) =
        match cli.platform {
            Platform::Reddit => {
                let mut client = RedditClient::new(config.require_reddit()?.clone())?;
                client.sort_by = spec.sort_by.clone();
                client.time_filter = spec.time_filter.clone();
                client.subreddits = spec.subreddits.clone();
                (
                    Box::new(client),
                    build_reddit_query(&spec),
                    PacingConfig::reddit(),
                )
            }
            Platform::Bluesky => (
                Box::new(BlueskyClient::new(config.require_bluesky()?.clone())?),
                build_bluesky_query(&spec),
                PacingConfig::bluesky(),
            ),
            Platform::Twitter => (
                Box::new(TwitterClient::new(config.require_twitter()?.clone())?),
                build_twitter_query(&spec),
                PacingConfig::twitter(),
            ),
        };
    let query = cli.query.unwrap_or(built_query);

    let mut sink = DedupSink::new(cli.platform);
    if let Some(path) = &cli.output {
        sink = sink.with_csv(CsvAppender::new(path.clone()));
    }
    if !cli.no_store {
        let store = MongoStore::connect(&config.store.mongo_uri, &config.store.db_name).await?;
        sink = sink.with_store(Arc::new(store));
    }

    let report = walk(
        client.as_mut(),
        &mut sink,
        &query,
        &WalkConfig { max_posts, pacing },
    )
    .await;

    info!(
        platform = %cli.platform,
        saved = report.saved,
        pages = report.pages_fetched,
        "collection finished"
    );

    match report.outcome {
        WalkOutcome::Exhausted | WalkOutcome::CeilingReached => {
            // Zero results is still a successful run
            if report.saved < spec.min_posts {
                warn!(
                    saved = report.saved,
                    wanted = spec.min_posts,
                    "collected fewer posts than requested minimum"
                );
            }
            Ok(())
        }
        WalkOutcome::Failed(reason) => Err(CoreError::Internal {
            message: format!("collection aborted: {reason}"),
        }),
    }
}
