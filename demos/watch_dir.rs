//! Watches a directory and prints every change.
//!
//! ```text
//! cargo run --example watch_dir -- /path/to/dir
//! RUST_LOG=watchvisor=debug cargo run --example watch_dir -- .
//! ```
//!
//! Every tenth event the demo drops its subscription and resumes from the last
//! version it saw, the way a reconnecting client would. Ctrl-C shuts down.

use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use watchvisor::{
    Dispatcher, DispatcherConfig, EventKind, FileChange, FileObserver, Jitter, PollConfig,
    ResourceKey, ResourceVersion, Subscription,
};

const RESUME_EVERY: usize = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("watchvisor=info")),
        )
        .init();

    let root = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    let key = ResourceKey::new("fs", "v1", "directories", "local", root.clone());

    let dispatcher = Dispatcher::new(DispatcherConfig {
        log_capacity: 500,
        ..DispatcherConfig::default()
    });
    let poll = PollConfig {
        jitter: Jitter::Equal,
        ..PollConfig::every(Duration::from_secs(1))
    };
    dispatcher
        .register(key.clone(), FileObserver::new(&root, poll))
        .await?;

    let mut sub = dispatcher.subscribe(&key, None).await?;
    let mut last: Option<ResourceVersion> = None;
    let mut seen = 0usize;

    let stop = dispatcher.run_until_signal();
    tokio::pin!(stop);
    loop {
        tokio::select! {
            res = &mut stop => {
                res?;
                break;
            }
            ev = sub.recv() => {
                let Some(ev) = ev else { break };
                print_event(ev.kind(), ev.payload(), ev.reason(), ev.resource_version());
                seen += 1;
                match ev.resource_version() {
                    Some(rv) => last = Some(rv),
                    // replay refused (checkpoint evicted): resync from a fresh snapshot
                    None if ev.kind() == EventKind::Error => {
                        last = None;
                        sub = resume(&dispatcher, &key, sub, None).await?;
                        continue;
                    }
                    None => {}
                }
                if seen % RESUME_EVERY == 0 {
                    sub = resume(&dispatcher, &key, sub, last).await?;
                }
            }
        }
    }
    info!(events = seen, "bye");
    Ok(())
}

/// Drops `sub` and subscribes again after `last` (or from a snapshot without one).
async fn resume(
    dispatcher: &Dispatcher<FileChange>,
    key: &ResourceKey,
    sub: Subscription<FileChange>,
    last: Option<ResourceVersion>,
) -> Result<Subscription<FileChange>, watchvisor::WatchError> {
    dispatcher.unsubscribe(key, sub.handle()).await;
    info!(from = ?last.map(|rv| rv.to_string()), "resuming");
    dispatcher.subscribe(key, last).await
}

fn print_event(
    kind: EventKind,
    change: Option<&FileChange>,
    reason: Option<&str>,
    rv: Option<ResourceVersion>,
) {
    let rv = rv.map(|rv| rv.to_string()).unwrap_or_else(|| "-".to_string());
    match (kind, change) {
        (EventKind::Error, _) => warn!(rv = %rv, reason = reason.unwrap_or_default(), "error event"),
        (_, Some(change)) => println!(
            "{rv:>24}  {:<8}  {:>10}  {}  {}",
            kind.as_str(),
            change.size,
            &change.checksum[..12.min(change.checksum.len())],
            change.path.display()
        ),
        (_, None) => println!("{rv:>24}  {}", kind.as_str()),
    }
}
