//! Shared development server state.

use crate::live::LiveMessage;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use strand_core::{
    emit, Bundle, BuildConfig, BuildError, EmitOptions, GraphBuilder, TransformRegistry,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Shared server state.
///
/// The bundle is rebuilt off the request path and swapped in atomically,
/// so requests always see either the previous complete bundle or the new
/// one, never a partial write. A failed rebuild keeps the last good
/// bundle in place.
pub struct DevState {
    /// Resolved build configuration (immutable for the server lifetime).
    pub config: BuildConfig,
    /// Transform registry shared across rebuilds.
    pub registry: TransformRegistry,
    /// Current bundle. `None` only before the first successful build.
    bundle: RwLock<Option<Arc<Bundle>>>,
    /// Most recent build failure, cleared on the next success.
    last_error: RwLock<Option<String>>,
    /// Module paths of the current graph; the watcher filters events
    /// against this set.
    watched: RwLock<HashSet<PathBuf>>,
    /// Number of rebuild attempts, successful or not.
    builds: std::sync::atomic::AtomicU64,
    /// Live-update broadcast channel.
    pub live_tx: broadcast::Sender<LiveMessage>,
    /// Shared HTTP client for proxied requests.
    pub http: reqwest::Client,
}

impl DevState {
    pub fn new(config: BuildConfig, registry: TransformRegistry) -> Self {
        let (live_tx, _) = broadcast::channel(16);
        Self {
            config,
            registry,
            bundle: RwLock::new(None),
            last_error: RwLock::new(None),
            watched: RwLock::new(HashSet::new()),
            builds: std::sync::atomic::AtomicU64::new(0),
            live_tx,
            http: reqwest::Client::new(),
        }
    }

    /// Current bundle snapshot, if any build has succeeded.
    pub fn bundle(&self) -> Option<Arc<Bundle>> {
        self.bundle.read().ok().and_then(|guard| guard.clone())
    }

    /// Most recent build error, if the last rebuild failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().ok().and_then(|guard| guard.clone())
    }

    /// Total rebuild attempts so far.
    pub fn build_count(&self) -> u64 {
        self.builds.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Whether a changed path belongs to the current module graph.
    pub fn is_watched(&self, path: &std::path::Path) -> bool {
        self.watched
            .read()
            .map(|set| set.contains(path))
            .unwrap_or(false)
    }

    /// Rebuild with no specific trigger (startup, tests).
    pub fn rebuild(&self) -> Result<Arc<Bundle>, BuildError> {
        self.rebuild_changed(&[])
    }

    /// Build the graph and emit a fresh bundle, swapping it in on success.
    ///
    /// `changed` names the files that triggered this rebuild and is
    /// reported to live-update clients; empty means "everything". On
    /// failure the previous bundle stays active; the error is recorded
    /// and broadcast to connected clients.
    pub fn rebuild_changed(&self, changed: &[PathBuf]) -> Result<Arc<Bundle>, BuildError> {
        self.builds
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let started = std::time::Instant::now();
        let builder = GraphBuilder::new(&self.registry, &self.config);

        let result = builder.build(&self.config.entry_path).and_then(|graph| {
            let options = EmitOptions {
                filename: self.config.output_filename.clone(),
                source_maps: self.config.source_maps(),
            };
            let bundle = emit(&graph, &options)?;
            Ok((graph, bundle))
        });

        match result {
            Ok((graph, bundle)) => {
                let bundle = Arc::new(bundle);
                let hash_changed = self
                    .bundle()
                    .map_or(true, |previous| previous.hash != bundle.hash);

                if let Ok(mut guard) = self.watched.write() {
                    *guard = graph.paths().map(std::path::Path::to_path_buf).collect();
                }
                if let Ok(mut guard) = self.bundle.write() {
                    *guard = Some(bundle.clone());
                }
                if let Ok(mut guard) = self.last_error.write() {
                    *guard = None;
                }

                info!(
                    modules = bundle.modules.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    hash = %bundle.hash,
                    "build complete"
                );

                if hash_changed {
                    let changed_modules = if changed.is_empty() {
                        bundle.modules.iter().map(|p| p.display().to_string()).collect()
                    } else {
                        changed.iter().map(|p| p.display().to_string()).collect()
                    };
                    let timestamp = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_millis() as u64;
                    let _ = self.live_tx.send(LiveMessage::Update {
                        changed_modules,
                        timestamp,
                    });
                }
                Ok(bundle)
            }
            Err(err) => {
                warn!(code = err.code(), error = %err, "build failed");
                if let Ok(mut guard) = self.last_error.write() {
                    *guard = Some(err.to_string());
                }
                let _ = self.live_tx.send(LiveMessage::Error {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use strand_core::{compose, Mode, Overrides};

    fn state_for(dir: &std::path::Path) -> DevState {
        let overrides = Overrides {
            entry: Some(dir.join("main.js")),
            output_dir: Some(dir.join("public")),
            ..Overrides::default()
        };
        let config = compose(Mode::Development, dir, None, &overrides);
        DevState::new(config, TransformRegistry::new())
    }

    #[test]
    fn successful_rebuild_swaps_bundle_and_clears_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.js"), "console.log(1);\n").unwrap();
        let state = state_for(dir.path());

        assert!(state.bundle().is_none());
        let bundle = state.rebuild().unwrap();
        assert_eq!(state.bundle().unwrap().hash, bundle.hash);
        assert!(state.last_error().is_none());
        assert!(state.is_watched(&dir.path().join("main.js").canonicalize().unwrap()));
    }

    #[test]
    fn failed_rebuild_keeps_last_good_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("main.js");
        fs::write(&entry, "import { x } from \"./util\";\n").unwrap();
        fs::write(dir.path().join("util.js"), "export const x = 1;\n").unwrap();
        let state = state_for(dir.path());

        let good = state.rebuild().unwrap();

        // Break the graph: the import no longer resolves.
        fs::remove_file(dir.path().join("util.js")).unwrap();
        let err = state.rebuild().unwrap_err();
        assert_eq!(err.code(), "RESOLUTION_ERROR");

        // Old bundle still served, error recorded.
        assert_eq!(state.bundle().unwrap().hash, good.hash);
        assert!(state.last_error().is_some());
    }

    #[test]
    fn unchanged_rebuild_does_not_announce_update() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.js"), "console.log(1);\n").unwrap();
        let state = state_for(dir.path());
        let mut rx = state.live_tx.subscribe();

        state.rebuild().unwrap();
        assert!(matches!(rx.try_recv(), Ok(LiveMessage::Update { .. })));

        state.rebuild().unwrap();
        assert!(rx.try_recv().is_err());
    }
}
