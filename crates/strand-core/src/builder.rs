//! Module graph construction.
//!
//! Breadth-first traversal from the entry module. A visited set keyed by
//! canonical path guarantees termination on import cycles and that each
//! module is read and transformed exactly once, no matter how many
//! importers reference it.

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::graph::{ModuleGraph, ModuleNode};
use crate::resolve::Resolver;
use crate::scan::{DependencyScanner, ImportScanner};
use crate::transform::TransformRegistry;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds a [`ModuleGraph`] from an entry path.
pub struct GraphBuilder<'a> {
    registry: &'a TransformRegistry,
    resolver: Resolver,
    scanner: Arc<dyn DependencyScanner>,
    max_depth: usize,
}

impl<'a> GraphBuilder<'a> {
    /// Builder with the config's extension list and depth limit.
    #[must_use]
    pub fn new(registry: &'a TransformRegistry, config: &BuildConfig) -> Self {
        Self {
            registry,
            resolver: Resolver::new(config.resolve_extensions.clone()),
            scanner: Arc::new(ImportScanner),
            max_depth: config.max_depth,
        }
    }

    /// Replace the default import scanner, for native formats with a
    /// different dependency syntax.
    #[must_use]
    pub fn with_scanner(mut self, scanner: Arc<dyn DependencyScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    /// Traverse from `entry` and build the graph.
    ///
    /// Fails with [`BuildError::Resolution`] when a declared dependency
    /// has no file, [`BuildError::Transform`] when a source is malformed,
    /// and [`BuildError::CycleDepth`] when the traversal depth exceeds
    /// the configured limit.
    pub fn build(&self, entry: &Path) -> Result<ModuleGraph, BuildError> {
        let entry = dunce::canonicalize(entry).map_err(|source| BuildError::Read {
            path: entry.to_path_buf(),
            source,
        })?;

        let mut graph = ModuleGraph::new();
        let mut dep_info: HashMap<PathBuf, Vec<(String, PathBuf)>> = HashMap::new();
        let mut queue: VecDeque<(PathBuf, usize)> = VecDeque::new();
        queue.push_back((entry, 0));

        while let Some((path, depth)) = queue.pop_front() {
            if graph.id_by_path(&path).is_some() {
                continue;
            }
            if depth > self.max_depth {
                return Err(BuildError::CycleDepth {
                    path,
                    max_depth: self.max_depth,
                });
            }

            let raw = strand_util::fs::read_to_string_lossy(&path).map_err(|source| {
                BuildError::Read {
                    path: path.clone(),
                    source,
                }
            })?;
            let source = self.registry.resolve(&path).apply(&raw, &path)?;
            let imports = self.scanner.scan(&source);

            let mut deps: Vec<(String, PathBuf)> = Vec::new();
            for import in &imports {
                let dep_path = self.resolver.resolve(&import.specifier, &path)?;
                let pending = graph.id_by_path(&dep_path).is_none()
                    && !queue.iter().any(|(p, _)| p == &dep_path);
                if pending {
                    queue.push_back((dep_path.clone(), depth + 1));
                }
                deps.push((import.specifier.clone(), dep_path));
            }

            dep_info.insert(path.clone(), deps);
            graph.add(ModuleNode {
                path,
                source,
                imports,
                dependencies: Vec::new(),
            });
        }

        graph.set_dependencies(&dep_info);
        Ok(graph)
    }
}
