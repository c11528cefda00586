use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use news_sync::config::Config;
use news_sync::db::{normalize_topic, Repository};
use news_sync::feed::NewsApiClient;
use news_sync::models::Settings;
use news_sync::services::{LogNotificationSink, TokioHostScheduler};
use news_sync::{Engine, EngineHandle};

mod console;

use console::{
    parse_command, print_articles, print_topics, run_interruptible, ConsoleCommand, ReloadSignal,
    HELP,
};

#[derive(Parser)]
#[command(name = "news-sync", version, about = "Subscribe to news topics and keep a local article cache fresh")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, env = "NEWS_SYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Subscribe to a topic and fetch its articles
    Subscribe { topic: String },
    /// Unsubscribe from a topic and drop its cached articles
    Unsubscribe { topic: String },
    /// List subscribed topics
    Topics,
    /// Show cached articles, newest first (all topics by default)
    Articles { topics: Vec<String> },
    /// Sync every subscription once
    Refresh,
    /// Drop cached articles but keep the subscriptions (all topics by default)
    Clear { topics: Vec<String> },
    /// Keep syncing in the background and accept commands on stdin
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (warnings by default, plus this crate's info events)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,news_sync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let repository = Repository::new(&config.db_path).await?;
    let source = Arc::new(NewsApiClient::new(
        &config.api_base_url,
        config.api_key.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?);
    let host = Arc::new(TokioHostScheduler::new());
    let engine = Engine::new(
        repository,
        source,
        host.clone(),
        Arc::new(LogNotificationSink),
        config.max_concurrent_fetches,
    );

    let language = config.settings.language;
    let cancel = CancellationToken::new();

    match cli.command {
        Command::Subscribe { topic } => {
            let topic = normalize_topic(&topic)?;
            engine.subscriptions().add(&topic).await?;
            let inserted = engine.sync().sync_topic(&topic, language, &cancel).await?;
            println!("Subscribed to {} ({} new articles)", topic, inserted);
        }
        Command::Unsubscribe { topic } => {
            if engine.subscriptions().remove(&topic).await? {
                println!("Unsubscribed from {}", topic.trim());
            } else {
                println!("Not subscribed to {}", topic.trim());
            }
        }
        Command::Topics => {
            print_topics(&engine.subscriptions().snapshot().await?);
        }
        Command::Articles { topics } => {
            let topics = topics_or_all(&engine, topics).await?;
            print_articles(&engine.cache().articles(&topics).await?);
        }
        Command::Refresh => {
            let updated = engine.sync().sync_all(language, &cancel).await?;
            report_refresh(&updated);
        }
        Command::Clear { topics } => {
            let topics = topics_or_all(&engine, topics).await?;
            let deleted = engine.cache().evict(&topics).await?;
            println!("Deleted {} cached articles", deleted);
        }
        Command::Run => {
            run_console(&engine, config.settings, cli.config.as_deref()).await?;
            host.shutdown().await;
        }
    }

    Ok(())
}

async fn topics_or_all(engine: &Engine, topics: Vec<String>) -> news_sync::Result<Vec<String>> {
    if topics.is_empty() {
        engine.subscriptions().snapshot().await
    } else {
        Ok(topics)
    }
}

fn report_refresh(updated: &std::collections::BTreeSet<String>) {
    if updated.is_empty() {
        println!("No new articles");
    } else {
        let topics: Vec<&str> = updated.iter().map(String::as_str).collect();
        println!("New articles in: {}", topics.join(", "));
    }
}

async fn run_console(engine: &Engine, settings: Settings, config_path: Option<&Path>) -> anyhow::Result<()> {
    let (settings_tx, settings_rx) = watch::channel(settings);
    let handle = engine.start(settings_rx);
    let mut reload = ReloadSignal::new()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", HELP);

    loop {
        tokio::select! {
            _ = ctrl_c() => break,
            _ = reload.recv() => reload_settings(&settings_tx, config_path),
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let command = match parse_command(&line) {
                    Some(ConsoleCommand::Quit) => break,
                    Some(command) => command,
                    None if line.trim().is_empty() => continue,
                    None => {
                        eprintln!("Unknown command, type 'help'");
                        continue;
                    }
                };

                // Signals stay live while a command runs.
                let outcome = run_interruptible(
                    execute(&handle, command),
                    ctrl_c(),
                    &mut reload,
                    || reload_settings(&settings_tx, config_path),
                )
                .await;
                match outcome {
                    Some(Ok(())) => {}
                    Some(Err(e)) => eprintln!("Error: {}", e),
                    None => break,
                }
            }
        }
    }

    handle.stop().await;
    Ok(())
}

async fn execute(handle: &EngineHandle, command: ConsoleCommand) -> news_sync::Result<()> {
    match command {
        ConsoleCommand::Subscribe(topic) => {
            handle.subscribe(&topic).await?;
            println!("Subscribed to {}, fetching articles", topic.trim());
        }
        ConsoleCommand::Unsubscribe(topic) => {
            if handle.unsubscribe(&topic).await? {
                println!("Unsubscribed from {}", topic.trim());
            } else {
                println!("Not subscribed to {}", topic.trim());
            }
        }
        ConsoleCommand::Refresh => {
            report_refresh(&handle.refresh().await?);
        }
        ConsoleCommand::Topics => {
            print_topics(&current_topics(handle).await?);
        }
        ConsoleCommand::Articles(topics) => {
            let topics = if topics.is_empty() {
                current_topics(handle).await?
            } else {
                topics
            };
            let mut view = Box::pin(handle.articles(topics));
            if let Some(articles) = view.next().await {
                print_articles(&articles?);
            }
        }
        ConsoleCommand::Clear(topics) => {
            let topics = if topics.is_empty() {
                current_topics(handle).await?
            } else {
                topics
            };
            let deleted = handle.clear_articles(&topics).await?;
            println!("Deleted {} cached articles", deleted);
        }
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

/// First emission of the live topic view is the current list.
async fn current_topics(handle: &EngineHandle) -> news_sync::Result<Vec<String>> {
    let mut view = Box::pin(handle.subscriptions());
    view.next().await.unwrap_or_else(|| Ok(Vec::new()))
}

/// Ctrl-C; a listener that cannot be installed never fires.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn reload_settings(settings_tx: &watch::Sender<Settings>, config_path: Option<&Path>) {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);

    match Config::read(&path) {
        Ok(config) => {
            let changed = settings_tx.send_if_modified(|current| {
                if *current == config.settings {
                    false
                } else {
                    *current = config.settings;
                    true
                }
            });
            tracing::info!(changed, "Reloaded settings from {}", path.display());
        }
        Err(e) => tracing::warn!(error = %e, "Failed to reload settings"),
    }
}
