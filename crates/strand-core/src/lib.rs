#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]

//! Core bundling library for strand.
//!
//! ## Pipeline
//!
//! 1. **Config** — an immutable, validated [`BuildConfig`] with mode
//!    defaults resolved up front
//! 2. **Transform** — foreign sources run through the first matching
//!    rule in the [`TransformRegistry`]
//! 3. **Graph** — [`GraphBuilder`] walks imports from the entry into a
//!    [`ModuleGraph`]
//! 4. **Emit** — [`emit`] serializes the graph into a single wrapped-
//!    module [`Bundle`], written atomically

pub mod builder;
pub mod config;
pub mod emit;
pub mod error;
pub mod graph;
pub mod resolve;
pub mod scan;
pub mod transform;

pub use builder::GraphBuilder;
pub use config::{compose, BuildConfig, ConfigFile, DevServerConfig, Mode, Overrides, ProxyRule, TransformRule};
pub use emit::{emit, write_bundle, Bundle, EmitOptions};
pub use error::BuildError;
pub use graph::{ModuleGraph, ModuleId, ModuleNode};
pub use scan::{scan_imports, DependencyScanner, ImportScanner, ImportSpec};
pub use transform::{
    built_in_transforms, IdentityTransform, JsonTransform, Transform, TransformRegistry,
};

/// Crate version, reported by `strand version` and the bundle header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
