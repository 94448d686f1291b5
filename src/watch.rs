//! File Watcher: debounced filesystem events feeding incremental
//! reindexing, per spec §4.8.
//!
//! The debouncer setup (`notify_debouncer_full::new_debouncer` over an
//! mpsc channel) is lifted from `cli::watch::run`. A second, app-level
//! accumulation window sits on top: raw debounced events are held in
//! `pending` and flushed once a path has been quiet for `debounce`, or
//! once `max_hold` has elapsed since its first event — whichever comes
//! first — so a file under constant modification still gets reindexed
//! eventually instead of starving.

use notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, DebounceEventResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::coordinator::Coordinator;
use crate::error::IndexResult;
use crate::exclude::ExclusionFilter;
use crate::walker::relative_path_str;

pub struct WatchOptions {
    pub debounce: Duration,
    pub max_hold: Duration,
}

impl From<&crate::config::IndexConfig> for WatchOptions {
    fn from(config: &crate::config::IndexConfig) -> Self {
        Self { debounce: Duration::from_millis(config.watcher_debounce_ms), max_hold: Duration::from_millis(config.watcher_max_hold_ms) }
    }
}

/// Runs the watch loop until the channel closes (e.g. the debouncer is
/// dropped) or `should_stop` returns true. Each batch of changed files is
/// deduped, filtered, and reindexed through `coordinator`.
pub fn run(coordinator: &Coordinator, options: WatchOptions, mut should_stop: impl FnMut() -> bool) -> IndexResult<()> {
    let root = coordinator.root.clone();
    let filter = ExclusionFilter::new(&coordinator.config.effective_exclude_patterns());

    let (tx, rx) = mpsc::channel();
    let mut debouncer = new_debouncer(options.debounce, None, move |result: DebounceEventResult| {
        if let Ok(events) = result {
            let _ = tx.send(events);
        }
    })
    .map_err(|e| crate::error::IndexError::Store(e.to_string()))?;

    debouncer.watch(&root, RecursiveMode::Recursive).map_err(|e| crate::error::IndexError::Store(e.to_string()))?;

    let mut pending: HashMap<PathBuf, PendingPath> = HashMap::new();

    loop {
        if should_stop() {
            break;
        }

        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(events) => {
                let now = Instant::now();
                for event in &events {
                    for path in &event.paths {
                        let entry = pending.entry(path.clone()).or_insert(PendingPath { first_seen: now, last_seen: now });
                        entry.last_seen = now;
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        flush_ready(coordinator, &root, &filter, &mut pending, options.debounce, options.max_hold);
    }

    flush_ready(coordinator, &root, &filter, &mut pending, Duration::ZERO, Duration::ZERO);
    Ok(())
}

struct PendingPath {
    first_seen: Instant,
    last_seen: Instant,
}

/// Flushes a path once it has been quiet for `debounce` since its last
/// event, or once `max_hold` has elapsed since its first event, whichever
/// comes first — per spec §4.8's two flush triggers.
fn flush_ready(
    coordinator: &Coordinator,
    root: &Path,
    filter: &ExclusionFilter,
    pending: &mut HashMap<PathBuf, PendingPath>,
    debounce: Duration,
    max_hold: Duration,
) {
    let now = Instant::now();
    let ready: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, p)| {
            (debounce.is_zero() || now.duration_since(p.last_seen) >= debounce) || (max_hold.is_zero() || now.duration_since(p.first_seen) >= max_hold)
        })
        .map(|(path, _)| path.clone())
        .collect();

    for path in ready {
        pending.remove(&path);
        let relative_path = relative_path_str(root, &path);
        if filter.should_exclude(Path::new(&relative_path)) {
            continue;
        }

        let content = std::fs::read_to_string(&path).ok();
        debug!("reindexing {} (deleted={})", relative_path, content.is_none());
        if let Err(e) = coordinator.reindex_file(&relative_path, content.as_deref()) {
            warn!("failed to reindex {}: {}", relative_path, e);
        }
    }
}
