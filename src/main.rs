//! `aggregator` — runs the feed poller and manages users, feeds and posts.
//!
//! ```text
//! aggregator run [--interval SECS] [--batch-size N]
//! aggregator add-user <NAME>
//! aggregator add-feed --user <NAME> <FEED_NAME> <URL>
//! aggregator feeds
//! aggregator follow --user <NAME> <FEED_ID>
//! aggregator unfollow --user <NAME> <FOLLOW_ID>
//! aggregator follows --user <NAME>
//! aggregator posts --user <NAME> [--limit N]
//! aggregator whoami --api-key <KEY>
//! ```
//!
//! Configuration comes from the environment (a `.env` file is honoured);
//! see [`feed_aggregator::config::Config`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use feed_aggregator::config::Config;
use feed_aggregator::scheduler::Scheduler;
use feed_aggregator::source::RssFetcher;
use feed_aggregator::store::{SqliteStore, User};

#[derive(Parser)]
#[command(name = "aggregator")]
#[command(about = "Polls RSS feeds and stores their posts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start polling feeds until interrupted
    Run {
        /// Seconds between cycles (overrides POLL_INTERVAL_SECS)
        #[arg(long)]
        interval: Option<u64>,

        /// Feeds per cycle (overrides BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Create a user and print its API key
    AddUser { name: String },
    /// Register a feed for a user
    AddFeed {
        #[arg(long)]
        user: String,
        name: String,
        url: String,
    },
    /// List feeds in polling order
    Feeds,
    /// Follow an existing feed
    Follow {
        #[arg(long)]
        user: String,
        feed_id: Uuid,
    },
    /// Drop one of a user's follows
    Unfollow {
        #[arg(long)]
        user: String,
        follow_id: Uuid,
    },
    /// List the feeds a user follows
    Follows {
        #[arg(long)]
        user: String,
    },
    /// Show the newest posts from the feeds a user follows
    Posts {
        #[arg(long)]
        user: String,

        #[arg(short, long, default_value = "10")]
        limit: i64,
    },
    /// Print the user an API key belongs to
    Whoami {
        #[arg(long)]
        api_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    let store = SqliteStore::connect(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("opening database {}", config.database_url))?;

    let result = match cli.command {
        Command::Run {
            interval,
            batch_size,
        } => {
            if let Some(secs) = interval {
                config.poll_interval = Duration::from_secs(secs);
            }
            if let Some(n) = batch_size {
                config.batch_size = n;
            }
            config.validate()?;
            run(store.clone(), &config).await
        }
        Command::AddUser { name } => {
            let user = store.create_user(&name).await?;
            println!("{}\t{}\t{}", user.id, user.name, user.api_key);
            Ok(())
        }
        Command::AddFeed { user, name, url } => {
            let owner = find_user(&store, &user).await?;
            let feed = store.create_feed(owner.id, &name, &url).await?;
            println!("{}\t{}\t{}", feed.id, feed.name, feed.url);
            Ok(())
        }
        Command::Feeds => {
            for feed in store.list_feeds().await? {
                let fetched = feed
                    .last_fetched_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("{}\t{}\t{}\t{}", feed.id, feed.name, feed.url, fetched);
            }
            Ok(())
        }
        Command::Follow { user, feed_id } => {
            let follower = find_user(&store, &user).await?;
            let follow = store
                .create_feed_follow(follower.id, feed_id)
                .await
                .with_context(|| format!("following feed {feed_id}"))?;
            println!("{}\t{}", follow.id, follow.feed_id);
            Ok(())
        }
        Command::Unfollow { user, follow_id } => {
            let follower = find_user(&store, &user).await?;
            if !store.delete_feed_follow(follow_id, follower.id).await? {
                bail!("{user:?} has no follow {follow_id}");
            }
            Ok(())
        }
        Command::Follows { user } => {
            let follower = find_user(&store, &user).await?;
            for follow in store.feed_follows_for_user(follower.id).await? {
                println!("{}\t{}", follow.id, follow.feed_id);
            }
            Ok(())
        }
        Command::Whoami { api_key } => match store.user_by_api_key(&api_key).await? {
            Some(user) => {
                println!("{}\t{}", user.id, user.name);
                Ok(())
            }
            None => bail!("no user has that API key"),
        },
        Command::Posts { user, limit } => {
            let owner = find_user(&store, &user).await?;
            for post in store.posts_for_user(owner.id, limit).await? {
                let published = post
                    .published_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                println!("{}\t{}\t{}", published, post.title, post.url);
            }
            Ok(())
        }
    };

    store.close().await;
    result
}

/// Compose the store, fetcher and scheduler, then poll until Ctrl-C.
async fn run(store: SqliteStore, config: &Config) -> Result<()> {
    let fetcher = RssFetcher::new(config.fetch_timeout)?;
    let scheduler = Scheduler::new(Arc::new(store), Arc::new(fetcher), config.scheduler());
    let handle = scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    info!("Shutdown requested, draining in-flight feeds");
    handle.stop().await;
    Ok(())
}

async fn find_user(store: &SqliteStore, name: &str) -> Result<User> {
    match store.user_by_name(name).await? {
        Some(user) => Ok(user),
        None => bail!("no user named {name:?}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
