//! Pluggable source transforms.
//!
//! A [`TransformRegistry`] maps file patterns to transforms that turn
//! foreign sources into the native module format. The registry is the
//! seam that keeps the graph builder decoupled from any specific
//! foreign toolchain: a loader integration registers its transform
//! under an id and wires it up through config `transformRules`.

use crate::config::TransformRule;
use crate::error::BuildError;
use regex_lite::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A source transform from a foreign format to the native module format.
///
/// Transforms must be pure with respect to their inputs: the same source
/// and path always produce the same output, which keeps builds idempotent.
pub trait Transform: Send + Sync {
    /// Transform `source` read from `path`.
    ///
    /// A malformed foreign source fails with [`BuildError::Transform`],
    /// which aborts the current build; failures are never skipped.
    fn apply(&self, source: &str, path: &Path) -> Result<String, BuildError>;

    /// Registry id, used by config `transformRules`.
    fn id(&self) -> &'static str;
}

/// Pass-through transform for sources already in the native format.
pub struct IdentityTransform;

impl Transform for IdentityTransform {
    fn apply(&self, source: &str, _path: &Path) -> Result<String, BuildError> {
        Ok(source.to_string())
    }

    fn id(&self) -> &'static str {
        "identity"
    }
}

/// Wraps a JSON file as a module exporting the parsed value.
pub struct JsonTransform;

impl Transform for JsonTransform {
    fn apply(&self, source: &str, path: &Path) -> Result<String, BuildError> {
        // Validate and re-serialize so the emitted module is canonical.
        let value: serde_json::Value =
            serde_json::from_str(source).map_err(|e| BuildError::Transform {
                path: path.to_path_buf(),
                message: format!("invalid JSON: {e}"),
            })?;
        Ok(format!("export default {value};\n"))
    }

    fn id(&self) -> &'static str {
        "json"
    }
}

/// Ordered pattern → transform mapping. First matching rule wins; files
/// matching no rule get the identity transform.
pub struct TransformRegistry {
    rules: Vec<(Regex, Arc<dyn Transform>)>,
    identity: Arc<dyn Transform>,
}

impl TransformRegistry {
    /// Create an empty registry; every file resolves to identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            identity: Arc::new(IdentityTransform),
        }
    }

    /// Append a rule. Registration order determines match precedence.
    pub fn register(&mut self, pattern: &str, transform: Arc<dyn Transform>) -> Result<(), BuildError> {
        let regex = Regex::new(pattern).map_err(|e| {
            BuildError::Config(format!("invalid transform pattern '{pattern}': {e}"))
        })?;
        self.rules.push((regex, transform));
        Ok(())
    }

    /// Assemble a registry from config rules and a set of available
    /// transforms keyed by id. Unknown ids are a configuration error.
    pub fn from_rules(
        rules: &[TransformRule],
        available: &[Arc<dyn Transform>],
    ) -> Result<Self, BuildError> {
        let by_id: HashMap<&str, &Arc<dyn Transform>> =
            available.iter().map(|t| (t.id(), t)).collect();

        let mut registry = Self::new();
        for rule in rules {
            let transform = by_id.get(rule.transform_id.as_str()).ok_or_else(|| {
                BuildError::Config(format!("unknown transform id '{}'", rule.transform_id))
            })?;
            registry.register(&rule.pattern, Arc::clone(transform))?;
        }
        Ok(registry)
    }

    /// Registry for a composed configuration: config rules take
    /// precedence, then the built-in JSON rule, then identity.
    pub fn for_config(rules: &[TransformRule]) -> Result<Self, BuildError> {
        let mut registry = Self::from_rules(rules, &built_in_transforms())?;
        registry.register(r"\.json$", Arc::new(JsonTransform))?;
        Ok(registry)
    }

    /// Resolve the transform for a file path: first matching rule in
    /// registration order, or identity when nothing matches.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> Arc<dyn Transform> {
        let haystack = path.to_string_lossy();
        for (regex, transform) in &self.rules {
            if regex.is_match(&haystack) {
                return Arc::clone(transform);
            }
        }
        Arc::clone(&self.identity)
    }
}

/// Transforms shipped with the bundler, available to config rules by id.
#[must_use]
pub fn built_in_transforms() -> Vec<Arc<dyn Transform>> {
    vec![Arc::new(IdentityTransform), Arc::new(JsonTransform)]
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rules: Vec<(&str, &str)> = self
            .rules
            .iter()
            .map(|(pattern, transform)| (pattern.as_str(), transform.id()))
            .collect();
        f.debug_struct("TransformRegistry")
            .field("rules", &rules)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Upper;
    impl Transform for Upper {
        fn apply(&self, source: &str, _path: &Path) -> Result<String, BuildError> {
            Ok(source.to_uppercase())
        }
        fn id(&self) -> &'static str {
            "upper"
        }
    }

    struct Failing;
    impl Transform for Failing {
        fn apply(&self, _source: &str, path: &Path) -> Result<String, BuildError> {
            Err(BuildError::Transform {
                path: path.to_path_buf(),
                message: "syntax error".to_string(),
            })
        }
        fn id(&self) -> &'static str {
            "failing"
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        let mut registry = TransformRegistry::new();
        registry.register(r"\.fs$", Arc::new(Upper)).unwrap();
        registry.register(r"\.fs$", Arc::new(Failing)).unwrap();

        let t = registry.resolve(Path::new("/app/src/App.fs"));
        assert_eq!(t.id(), "upper");
    }

    #[test]
    fn unmatched_path_gets_identity() {
        let mut registry = TransformRegistry::new();
        registry.register(r"\.fs$", Arc::new(Upper)).unwrap();

        let t = registry.resolve(Path::new("/app/src/main.js"));
        assert_eq!(t.id(), "identity");
        assert_eq!(
            t.apply("const x = 1;", Path::new("/app/src/main.js")).unwrap(),
            "const x = 1;"
        );
    }

    #[test]
    fn json_transform_rejects_malformed_source() {
        let err = JsonTransform
            .apply("{ nope", Path::new("/data.json"))
            .unwrap_err();
        assert_eq!(err.code(), "TRANSFORM_ERROR");
    }

    #[test]
    fn json_transform_emits_default_export() {
        let out = JsonTransform
            .apply(r#"{"id": 1}"#, Path::new("/data.json"))
            .unwrap();
        assert_eq!(out, "export default {\"id\":1};\n");
    }

    #[test]
    fn from_rules_rejects_unknown_id() {
        let rules = vec![TransformRule {
            pattern: r"\.fs$".to_string(),
            transform_id: "fable".to_string(),
        }];
        let available: Vec<Arc<dyn Transform>> = vec![Arc::new(IdentityTransform)];

        let err = TransformRegistry::from_rules(&rules, &available).unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn registry_debug_lists_patterns_and_ids() {
        let registry = TransformRegistry::for_config(&[]).unwrap();
        let debug = format!("{registry:?}");
        assert!(debug.contains(r"\.json$"));
        assert!(debug.contains("json"));
    }

    #[test]
    fn for_config_keeps_json_built_in() {
        let registry = TransformRegistry::for_config(&[]).unwrap();
        assert_eq!(registry.resolve(Path::new("/data.json")).id(), "json");
        assert_eq!(registry.resolve(Path::new("/main.js")).id(), "identity");
    }

    #[test]
    fn from_rules_wires_by_id() {
        let rules = vec![TransformRule {
            pattern: r"\.json$".to_string(),
            transform_id: "json".to_string(),
        }];
        let available: Vec<Arc<dyn Transform>> =
            vec![Arc::new(IdentityTransform), Arc::new(JsonTransform)];

        let registry = TransformRegistry::from_rules(&rules, &available).unwrap();
        assert_eq!(registry.resolve(&PathBuf::from("/a/pkg.json")).id(), "json");
    }
}
