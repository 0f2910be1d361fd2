//! Live frame loop fed by an asynchronous provider.
//!
//! The provider task pushes batches through a channel whenever it likes.
//! The frame loop only drains that channel between frames and hands the
//! batches to the engine queue, so reconciliation always lands on a frame
//! boundary.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use tagcube_core::{Mutation, TagCluster, TokenRecord};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

pub struct WatchOptions {
    pub fps: f64,
    /// `None` runs until Ctrl-C.
    pub frames: Option<u64>,
    pub batch_interval: Duration,
}

/// Stand-in for a market-data feed: replays batches on a fixed cadence.
async fn provide(batches: Vec<Vec<TokenRecord>>, interval: Duration, tx: mpsc::Sender<Vec<TokenRecord>>) {
    for (i, batch) in batches.into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(interval).await;
        }
        if tx.send(batch).await.is_err() {
            tracing::debug!("frame loop gone, provider stopping after {i} batches");
            return;
        }
    }
}

pub async fn run(mut engine: TagCluster, batches: Vec<Vec<TokenRecord>>, opts: WatchOptions) -> Result<TagCluster> {
    let period = Duration::try_from_secs_f64(1.0 / opts.fps).context("--fps too small for a frame period")?;
    let (tx, mut rx) = mpsc::channel(8);
    let provider = tokio::spawn(provide(batches, opts.batch_interval, tx));

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    let mut out = std::io::stdout();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        if opts.frames.is_some_and(|n| engine.frame() >= n) {
            break;
        }
        let now = tokio::select! {
            now = ticker.tick() => now,
            _ = &mut shutdown => {
                tracing::info!("interrupted at frame {}", engine.frame());
                break;
            }
        };

        while let Ok(batch) = rx.try_recv() {
            engine.enqueue(Mutation::Reconcile(batch));
        }

        let dt = now.duration_since(last).as_secs_f64();
        last = now;
        // first tick fires immediately with a zero delta
        let dt = if dt > 0.0 { dt } else { 1.0 / opts.fps };

        let report = engine.step(dt);
        for event in &report.events {
            let line = serde_json::to_string(event).context("failed to serialize event")?;
            writeln!(out, "{line}").context("failed to write event")?;
        }
        if report.physics.recovered > 0 {
            tracing::warn!(
                "frame {}: recovered {} tags from non-finite state",
                report.frame,
                report.physics.recovered
            );
        }
    }
    out.flush().context("failed to flush stdout")?;

    provider.abort();
    Ok(engine)
}
