//! Module dependency graph.
//!
//! One graph per build. Nodes are created in discovery order and the
//! graph is discarded wholesale on rebuild; nothing mutates nodes after
//! the build finishes.

use crate::scan::ImportSpec;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// Unique identifier for a module in the graph. Ids are assigned in
/// discovery order, so id 0 is always the entry module.
pub type ModuleId = usize;

/// A module in the dependency graph.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    /// Canonical path to the source file.
    pub path: PathBuf,
    /// Post-transform native source.
    pub source: String,
    /// Imports found in the native source, in appearance order.
    pub imports: Vec<ImportSpec>,
    /// Resolved dependencies, import order preserved.
    pub dependencies: Vec<ModuleId>,
}

/// Directed graph over [`ModuleNode`], keyed by canonical path.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<ModuleNode>,
    path_to_id: HashMap<PathBuf, ModuleId>,
    /// (importer id, specifier) → target id, used to rewrite imports at emit.
    specifier_map: HashMap<(ModuleId, String), ModuleId>,
}

impl ModuleGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, returning its id.
    pub fn add(&mut self, module: ModuleNode) -> ModuleId {
        let id = self.modules.len();
        self.path_to_id.insert(module.path.clone(), id);
        self.modules.push(module);
        id
    }

    #[must_use]
    pub fn get(&self, id: ModuleId) -> Option<&ModuleNode> {
        self.modules.get(id)
    }

    #[must_use]
    pub fn id_by_path(&self, path: &Path) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    /// The designated root: the entry module the traversal started from.
    #[must_use]
    pub fn entry(&self) -> Option<ModuleId> {
        if self.modules.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Iterate over modules in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &ModuleNode)> {
        self.modules.iter().enumerate()
    }

    /// Canonical paths of every module, for the dev server's watch set.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.modules.iter().map(|m| m.path.as_path())
    }

    /// Second pass after traversal: wire dependency ids and the specifier
    /// map from resolved (specifier, path) pairs per module.
    pub fn set_dependencies(&mut self, dep_info: &HashMap<PathBuf, Vec<(String, PathBuf)>>) {
        for id in 0..self.modules.len() {
            let Some(deps) = dep_info.get(&self.modules[id].path) else {
                continue;
            };
            let resolved: Vec<(String, ModuleId)> = deps
                .iter()
                .filter_map(|(spec, path)| {
                    self.path_to_id.get(path).map(|&dep| (spec.clone(), dep))
                })
                .collect();

            self.modules[id].dependencies = resolved.iter().map(|(_, dep)| *dep).collect();
            for (spec, dep) in resolved {
                self.specifier_map.insert((id, spec), dep);
            }
        }
    }

    /// Target module for a specifier written in the module `from`.
    #[must_use]
    pub fn resolve_specifier(&self, from: ModuleId, specifier: &str) -> Option<ModuleId> {
        self.specifier_map
            .get(&(from, specifier.to_string()))
            .copied()
    }

    /// Modules in emission order: topological (dependencies before
    /// dependents) where acyclic; members of cyclic components are
    /// appended in first-discovery order, which keeps the result
    /// deterministic for any given source tree.
    #[must_use]
    pub fn toposort(&self) -> Vec<ModuleId> {
        let n = self.modules.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<ModuleId>> = vec![Vec::new(); n];

        for (id, module) in self.modules.iter().enumerate() {
            for &dep in &module.dependencies {
                dependents[dep].push(id);
                in_degree[id] += 1;
            }
        }

        let mut queue: VecDeque<ModuleId> = (0..n).filter(|&id| in_degree[id] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut placed = vec![false; n];

        while let Some(id) = queue.pop_front() {
            order.push(id);
            placed[id] = true;
            for &next in &dependents[id] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        // Cycle members never reach in-degree zero; append them in
        // discovery order.
        if order.len() < n {
            for id in 0..n {
                if !placed[id] {
                    order.push(id);
                }
            }
        }

        order
    }
}
