//! Keyed Cache demo
//!
//! Shares a concurrent cache between worker threads: word counts through
//! `add_or_update`, memoised lengths through `get_or_add_with`.

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keyed_cache::{Config, ConcurrentCache};

const CORPUS: &str = "the quick brown fox jumps over the lazy dog while the cat naps \
                      and the dog dreams of the quick fox";

const WORKERS: usize = 4;

fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyed_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: name={}, initial_capacity={}, default_sliding={}s",
        config.name, config.initial_capacity, config.default_sliding_secs
    );

    let counts: Arc<ConcurrentCache<String, usize>> = Arc::new(
        ConcurrentCache::from_config(&config).context("invalid cache configuration")?,
    );
    let lengths: Arc<ConcurrentCache<String, usize>> =
        Arc::new(ConcurrentCache::with_name("word-lengths"));

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let counts = Arc::clone(&counts);
            let lengths = Arc::clone(&lengths);
            thread::spawn(move || -> keyed_cache::Result<()> {
                for word in CORPUS.split_whitespace().skip(worker).step_by(WORKERS) {
                    counts.add_or_update(word.to_string(), |_| 1, |_, n| n + 1, None)?;
                    lengths.get_or_add_with(word.to_string(), |w| w.chars().count(), None)?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
    }

    let mut words: Vec<(String, usize)> = counts
        .iter()?
        .map(|(word, entry)| (word, *entry.value()))
        .collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    for (word, count) in words.iter().take(5) {
        let length = lengths.get(word.as_str())?;
        info!("{word:>8}: count={count} length={length}");
    }

    info!(
        "counts stats: {}",
        serde_json::to_string(&counts.stats().snapshot())?
    );
    info!(
        "lengths stats: {}",
        serde_json::to_string(&lengths.stats().snapshot())?
    );

    counts.dispose();
    lengths.dispose();
    info!("Caches disposed");

    Ok(())
}
