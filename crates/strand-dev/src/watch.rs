//! File watching and the rebuild loop.
//!
//! A notify watcher runs on its own thread, filters events down to
//! files that belong to the current module graph, and feeds a bounded
//! channel. The rebuild task debounces bursts and drains the channel
//! before each build, so any number of changes that land while a build
//! is in flight collapse into exactly one follow-up rebuild.

use crate::state::DevState;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Quiet period after the last event before rebuilding.
pub const DEBOUNCE: Duration = Duration::from_millis(50);

/// Paths the watcher never reports, regardless of the graph.
fn is_ignored(path: &Path) -> bool {
    let text = path.to_string_lossy();
    if text.contains("/node_modules/") || text.contains("/.git/") || text.contains("/target/") {
        return true;
    }
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Start the watcher thread and the rebuild task.
///
/// The watcher observes `root` recursively; events are filtered against
/// the graph's module set so edits to unrelated files do not trigger
/// rebuilds. The returned handles keep both alive for the server's
/// lifetime.
pub fn spawn(root: PathBuf, state: Arc<DevState>) -> std::thread::JoinHandle<()> {
    let (change_tx, change_rx) = mpsc::channel::<PathBuf>(64);

    let watcher_state = state.clone();
    let handle = std::thread::spawn(move || {
        if let Err(err) = watch_loop(&root, &watcher_state, &change_tx) {
            warn!(error = %err, "file watcher stopped");
        }
    });

    tokio::spawn(rebuild_loop(change_rx, state));
    handle
}

fn watch_loop(
    root: &Path,
    state: &DevState,
    change_tx: &mpsc::Sender<PathBuf>,
) -> notify::Result<()> {
    let (tx, rx) = std::sync::mpsc::channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(tx, Config::default())?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    info!(root = %root.display(), "watching for changes");

    while let Ok(event) = rx.recv() {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "watch event error");
                continue;
            }
        };
        for path in event.paths {
            if is_ignored(&path) {
                continue;
            }
            let canonical = dunce_canonicalize(&path);
            if !state.is_watched(&canonical) {
                continue;
            }
            debug!(path = %canonical.display(), "module changed");
            if change_tx.blocking_send(canonical).is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Canonicalize for watch-set membership; deleted files fall back to the
/// raw path so removals still match what the graph recorded.
fn dunce_canonicalize(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Debounce changes and rebuild. Events arriving during a build queue in
/// the channel and are drained into the next single rebuild.
async fn rebuild_loop(mut change_rx: mpsc::Receiver<PathBuf>, state: Arc<DevState>) {
    while let Some(first) = change_rx.recv().await {
        let mut changed = vec![first];

        // Debounce: keep absorbing events until the burst goes quiet.
        let mut closed = false;
        loop {
            match tokio::time::timeout(DEBOUNCE, change_rx.recv()).await {
                Ok(Some(path)) => changed.push(path),
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }

        // Coalesce anything else that is already queued.
        while let Ok(path) = change_rx.try_recv() {
            changed.push(path);
        }

        changed.sort();
        changed.dedup();
        info!(files = changed.len(), "change detected, rebuilding");

        let build_state = state.clone();
        // The build is CPU- and IO-bound; keep it off the async runtime.
        let result =
            tokio::task::spawn_blocking(move || build_state.rebuild_changed(&changed)).await;
        if let Err(join_err) = result {
            warn!(error = %join_err, "rebuild task panicked");
        }
        if closed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::{compose, Mode, Overrides, TransformRegistry};

    #[tokio::test]
    async fn burst_of_changes_coalesces_into_one_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.js"), "console.log(1);\n").unwrap();
        let overrides = Overrides {
            entry: Some(dir.path().join("main.js")),
            output_dir: Some(dir.path().join("public")),
            ..Overrides::default()
        };
        let config = compose(Mode::Development, dir.path(), None, &overrides);
        let state = Arc::new(DevState::new(config, TransformRegistry::new()));

        let (tx, rx) = mpsc::channel::<PathBuf>(64);
        let entry = dir.path().join("main.js");
        for _ in 0..10 {
            tx.send(entry.clone()).await.unwrap();
        }
        drop(tx);

        rebuild_loop(rx, state.clone()).await;
        assert_eq!(state.build_count(), 1);
        assert!(state.bundle().is_some());
    }

    #[test]
    fn ignores_vcs_and_dependency_directories() {
        assert!(is_ignored(Path::new("/app/node_modules/react/index.js")));
        assert!(is_ignored(Path::new("/app/.git/HEAD")));
        assert!(is_ignored(Path::new("/app/src/.main.js.1234.tmp")));
        assert!(!is_ignored(Path::new("/app/src/main.js")));
    }
}
