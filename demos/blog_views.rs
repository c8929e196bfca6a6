//! Simulated blog traffic against an in-memory post table.
//!
//! Readers record views concurrently while the tracker flushes in the
//! background. Midway one post is deleted and another has its writes fail,
//! so the log shows removal and re-credit. At the end the tracker is shut
//! down, the persisted totals are checked against the views recorded, and
//! the statistics are printed.
//!
//! Run with:
//! ```bash
//! cargo run --example blog_views --features demo -- --help
//! ```

use clap::{Parser, ValueEnum};
use flexi_logger::Logger;
use log::info;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use visite::observers::json::JsonObserver;
use visite::observers::prometheus::PrometheusObserver;
use visite::{FlushConfig, InMemoryStorage, StatsSnapshot, ViewTracker};

/// Output format for the final statistics.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One `name = value` line per metric
    Text,
    /// JSON format
    Json,
    /// Prometheus exposition format
    Prometheus,
}

/// Simulated blog traffic for the visite view tracker.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of posts
    #[arg(short, long, default_value = "20")]
    posts: u64,

    /// Number of concurrent readers
    #[arg(short, long, default_value = "8")]
    readers: usize,

    /// Views recorded by each reader
    #[arg(short, long, default_value = "5000")]
    views: usize,

    /// Flush interval in milliseconds
    #[arg(short, long, default_value = "50")]
    interval_ms: u64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log level spec, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn render_output(format: OutputFormat, snapshot: &StatsSnapshot) -> String {
    match format {
        OutputFormat::Text => snapshot
            .metrics()
            .into_iter()
            .map(|(name, value, _)| format!("{:<20} = {}", name, value))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Json => JsonObserver::new()
            .pretty(true)
            .to_json(snapshot)
            .unwrap_or_else(|e| format!("Error: {}", e)),
        OutputFormat::Prometheus => PrometheusObserver::new()
            .with_namespace("blog")
            .render(snapshot)
            .unwrap_or_else(|e| format!("Error: {}", e)),
    }
}

async fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let storage = Arc::new(InMemoryStorage::new());
    for post in 0..args.posts {
        storage.insert(post, 0);
    }

    let config = FlushConfig::default().with_interval(Duration::from_millis(args.interval_ms));
    let tracker = ViewTracker::new(Arc::clone(&storage), config)?;
    let handle = tracker.start();

    // Post 1 refuses its next few writes; its views must survive.
    let flaky = 1 % args.posts.max(1);
    storage.fail_next_writes(flaky, 3);

    let readers: Vec<_> = (0..args.readers)
        .map(|reader| {
            let tracker = tracker.clone();
            let posts = args.posts.max(1);
            let views = args.views;
            tokio::spawn(async move {
                let mut on_deleted = 0u64;
                for i in 0..views {
                    let post = ((reader * 31 + i * 7) as u64) % posts;
                    tracker.record_view(&post);
                    if post == 0 {
                        on_deleted += 1;
                    }
                    if i % 500 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
                on_deleted
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
    if let Some(lost) = storage.delete(&0) {
        info!("event=post_deleted module=demo post_id=0 persisted={}", lost);
    }

    let mut on_deleted = 0;
    for reader in readers {
        on_deleted += reader.await?;
    }

    if let Some(report) = handle.shutdown().await {
        info!(
            "event=final_flush module=demo views_persisted={} failed={}",
            report.views_persisted, report.failed
        );
    }

    // Post 0 was deleted; its views went with it.
    let expected = (args.readers * args.views) as u64 - on_deleted;
    let persisted: u64 = (1..args.posts).filter_map(|post| storage.count(&post)).sum();
    let pending = tracker.stats().pending_views;
    info!(
        "event=demo_done module=demo persisted={} pending={} expected={}",
        persisted, pending, expected
    );
    if persisted + pending != expected {
        return Err(format!(
            "lost views: persisted={} pending={} expected={}",
            persisted, pending, expected
        )
        .into());
    }

    println!("{}", render_output(args.format, &tracker.stats()));
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let _logger = Logger::try_with_env_or_str(&args.log_level)?
        .log_to_stderr()
        .format(flexi_logger::detailed_format)
        .start()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(&args))
}
