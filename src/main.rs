//! Roost - Offline-first Mastodon timelines in your terminal
#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use roost::api::PageFetcher;
use roost::api::mastodon::{MastodonClient, MastodonTimeline};
use roost::cache::{LocalCache, MemoryCache};
use roost::demo::DemoFetcher;
use roost::models::{Post, PostId, ReplyChainType, TimelineKey, TimelineKind};
use roost::sync::SyncManager;
use roost::timeline::{LoadOutcome, LoadState, Paginator, TimelineRegistry};
use roost::{Config, Database};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG=debug for verbose output)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Parse CLI arguments
    match parse_args()? {
        Command::Timeline { kind, limit } => timeline_cli(kind, limit).await,
        Command::More { kind } => more_cli(kind).await,
        Command::Gap { post_id, kind } => gap_cli(post_id, kind).await,
        Command::Clear { kind, all } => clear_cli(kind, all),
        Command::Demo => run_demo().await,
        Command::Sync => sync_cli().await,
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            print_version();
            Ok(())
        }
    }
}

/// CLI commands
enum Command {
    Timeline {
        kind: Option<TimelineKind>,
        limit: Option<usize>,
    },
    More {
        kind: Option<TimelineKind>,
    },
    Gap {
        post_id: PostId,
        kind: Option<TimelineKind>,
    },
    Clear {
        kind: Option<TimelineKind>,
        all: bool,
    },
    Demo,
    Sync,
    Help,
    Version,
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() == 1 {
        return Ok(Command::Timeline {
            kind: None,
            limit: None,
        });
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),
        "--demo" | "demo" => Ok(Command::Demo),
        "sync" => Ok(Command::Sync),

        "timeline" | "tl" => {
            let kind = parse_kind(args.get(2))?;
            let limit = args
                .iter()
                .position(|a| a == "--limit" || a == "-l")
                .and_then(|i| args.get(i + 1))
                .map(|s| s.parse().context("Invalid --limit value"))
                .transpose()?;
            Ok(Command::Timeline { kind, limit })
        }

        "more" => Ok(Command::More {
            kind: parse_kind(args.get(2))?,
        }),

        "gap" => {
            let post_id = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Missing post id (shown next to the gap marker)"))?;
            Ok(Command::Gap {
                post_id: PostId::new(post_id.as_str()),
                kind: parse_kind(args.get(3))?,
            })
        }

        "clear" => {
            let all = args.iter().any(|a| a == "--all" || a == "-a");
            Ok(Command::Clear {
                kind: parse_kind(args.get(2))?,
                all,
            })
        }

        other => Err(anyhow::anyhow!(
            "Unknown command: {other}\nRun 'roost --help' for usage"
        )),
    }
}

/// Parse an optional positional timeline argument; flags are not timelines
fn parse_kind(arg: Option<&String>) -> Result<Option<TimelineKind>> {
    match arg {
        Some(arg) if !arg.starts_with('-') => TimelineKind::from_str(arg)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("Unknown timeline: {arg}\nUse home, local, federated, #tag or @account-id")),
        _ => Ok(None),
    }
}

fn print_help() {
    let config_path = roost::paths::config_path()
        .map_or_else(|_| "Unknown".to_string(), |p| p.display().to_string());

    println!(
        r#"{}
Roost - Offline-first Mastodon timelines

USAGE:
    roost                              Refresh and show the default timeline
    roost [COMMAND]

COMMANDS:
    timeline [timeline] [OPTIONS]      Refresh and show a timeline
      Options:
        -l, --limit <n>                Page size (default: from config)
      Examples:
        roost timeline
        roost timeline local --limit 40
        roost timeline #rust

    more [timeline]                    Load older posts below the cached list
    gap <post-id> [timeline]           Load the posts missing below a gap marker
    clear [timeline | --all]           Drop the cached list
    sync                               Refresh every cached timeline
                                       (repeats when refresh_interval_secs > 0)
    demo                               Run against a built-in offline feed

TIMELINES:
    home, local, federated, #tag, @account-id

OPTIONS:
    -h, --help                         Show this help message
    -v, --version                      Show version information

ENVIRONMENT:
    {}                 Access token (overrides config)
    RUST_LOG                           Log filter (default: warn)

CONFIG:
    {}
"#,
        roost::LOGO,
        roost::config::ACCESS_TOKEN_ENV,
        config_path
    );
}

fn print_version() {
    println!("roost {}", roost::VERSION);
}

/// Config, cache and the paginator for one timeline
fn open_timeline(
    kind: Option<TimelineKind>,
    limit: Option<usize>,
) -> Result<Paginator<MastodonTimeline, Database>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let kind = kind.unwrap_or_else(|| config.default_kind());

    if kind == TimelineKind::Home && config.access_token().is_none() {
        anyhow::bail!(
            "The home timeline needs an access token.\nSet access_token in the config file or {}",
            roost::config::ACCESS_TOKEN_ENV
        );
    }

    let client = MastodonClient::new(&config.instance, config.access_token());
    let key = TimelineKey::new(&config.instance, kind.clone());
    let page_size = limit.unwrap_or_else(|| config.page_size()).max(1);

    Ok(Paginator::new(key, client.timeline(kind), Arc::new(db), page_size))
}

async fn timeline_cli(kind: Option<TimelineKind>, limit: Option<usize>) -> Result<()> {
    let paginator = open_timeline(kind, limit)?;

    paginator.restore().await;
    let outcome = paginator.refresh().await;
    print_timeline(&paginator);
    report(&paginator, outcome)
}

async fn more_cli(kind: Option<TimelineKind>) -> Result<()> {
    let paginator = open_timeline(kind, None)?;

    if paginator.restore().await == LoadOutcome::Skipped {
        println!("Nothing cached yet. Run 'roost timeline' first.");
        return Ok(());
    }

    let outcome = paginator.append().await;
    print_timeline(&paginator);
    report(&paginator, outcome)
}

async fn gap_cli(post_id: PostId, kind: Option<TimelineKind>) -> Result<()> {
    let paginator = open_timeline(kind, None)?;
    paginator.restore().await;

    let outcome = paginator.load_gap(&post_id).await;
    if outcome == LoadOutcome::Skipped {
        println!("No gap below post {post_id}.");
        return Ok(());
    }

    print_timeline(&paginator);
    report(&paginator, outcome)
}

fn clear_cli(kind: Option<TimelineKind>, all: bool) -> Result<()> {
    let db = Database::open()?;

    if all {
        let count = db.clear_all()?;
        println!("✓ Cleared {} timelines", count);
        return Ok(());
    }

    let config = Config::load()?;
    let kind = kind.unwrap_or_else(|| config.default_kind());
    let key = TimelineKey::new(&config.instance, kind);
    db.clear(&key)?;
    println!("✓ Cleared {}", key);

    Ok(())
}

async fn sync_cli() -> Result<()> {
    let config = Config::load()?;
    let db = Arc::new(Database::open()?);

    let mut keys = db.timeline_keys()?;
    if keys.is_empty() {
        keys.push(TimelineKey::new(&config.instance, config.default_kind()));
    }

    let registry = Arc::new(TimelineRegistry::new(db, config.page_size()));
    for key in &keys {
        let token = (key.instance == config.instance)
            .then(|| config.access_token())
            .flatten();
        registry.get_or_insert_with(key, || {
            MastodonClient::new(&key.instance, token).timeline(key.kind.clone())
        });
    }

    let manager = Arc::new(SyncManager::new(registry));
    for (key, outcome) in manager.refresh_all().await {
        let status = match outcome {
            LoadOutcome::Loaded(kind) => format!("✓ {kind:?}"),
            LoadOutcome::Skipped => "– skipped".to_string(),
            LoadOutcome::Failed => "✗ failed".to_string(),
        };
        println!("{key:<40} {status}");
    }

    if config.refresh_interval_secs > 0 {
        println!(
            "\nRefreshing every {}s, press Ctrl-C to stop",
            config.refresh_interval_secs
        );
        tokio::select! {
            () = Arc::clone(&manager).start_background_refresh(config.refresh_interval_secs) => {}
            result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl-C")?,
        }
    }

    Ok(())
}

async fn run_demo() -> Result<()> {
    let key = TimelineKey::new("demo.local", TimelineKind::Home);
    let paginator = Paginator::new(key, DemoFetcher::new(24), Arc::new(MemoryCache::new()), 8);

    println!("▶ refresh");
    paginator.refresh().await;
    print_timeline(&paginator);

    println!("\n▶ append");
    paginator.append().await;
    print_timeline(&paginator);

    let added = paginator.fetcher().publish(12);
    println!("\n▶ {} new posts arrive, refresh", added.len());
    paginator.refresh().await;
    print_timeline(&paginator);

    while let Some(anchor) = first_gap(&paginator) {
        println!("\n▶ load gap below {anchor}");
        let outcome = paginator.load_gap(&anchor).await;
        print_timeline(&paginator);
        if !matches!(outcome, LoadOutcome::Loaded(_)) {
            break;
        }
    }

    Ok(())
}

fn first_gap<F: PageFetcher, C: LocalCache>(paginator: &Paginator<F, C>) -> Option<PostId> {
    paginator
        .posts()
        .iter()
        .find(|post| post.has_gap_below())
        .map(|post| post.id.clone())
}

/// Turn the outcome of a load into the process result
fn report<F: PageFetcher, C: LocalCache>(
    paginator: &Paginator<F, C>,
    outcome: LoadOutcome,
) -> Result<()> {
    match paginator.load_state() {
        LoadState::Error(error) if outcome == LoadOutcome::Failed => {
            if paginator.posts().is_empty() {
                Err(anyhow::anyhow!("{error}"))
            } else {
                eprintln!("\n⚠ {error} (showing cached posts)");
                Ok(())
            }
        }
        LoadState::NotLoading { end_reached: true } => {
            println!("\n(end of timeline)");
            Ok(())
        }
        _ => Ok(()),
    }
}

fn print_timeline<F: PageFetcher, C: LocalCache>(paginator: &Paginator<F, C>) {
    let posts = paginator.posts();

    println!("\n{} ({} posts)", paginator.key(), posts.len());
    println!("{}", "─".repeat(60));

    for post in posts.iter() {
        print_post(post);
    }
}

fn print_post(post: &Post) {
    let annotations = &post.annotations;
    let glyph = match annotations.reply_chain_type {
        _ if annotations.is_orphan_reply() => "↳",
        ReplyChainType::Null => " ",
        ReplyChainType::Start => "┌",
        ReplyChainType::Continue => "│",
        ReplyChainType::End => "└",
    };

    if !annotations.should_show {
        return;
    }

    if annotations.has_unloaded_reply_status {
        println!("{glyph} ↑ in reply to a post that is not loaded");
    }

    let repost = post
        .repost_author
        .as_ref()
        .map(|author| format!(" (boosted by {author})"))
        .unwrap_or_default();
    println!(
        "{glyph} @{} · {} · {}{}",
        post.author_handle,
        post.relative_time(),
        post.id,
        repost
    );
    println!("{glyph}   {}", post.preview(120));

    if annotations.has_multi_reply_status {
        println!("│ ⋯ more replies in this thread");
    }
    if post.has_gap_below() {
        println!("╌╌╌ missing posts: roost gap {} ╌╌╌", post.id);
    }
}
