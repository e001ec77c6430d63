use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the build pipeline.
///
/// In production mode `Transform`, `Resolution` and `CycleDepth` are fatal;
/// in development the server reports them and keeps serving the last
/// successful bundle.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("failed to transform {path}: {message}")]
    Transform { path: PathBuf, message: String },

    #[error("cannot resolve '{specifier}' from {from}: {message}")]
    Resolution {
        specifier: String,
        from: PathBuf,
        message: String,
    },

    #[error("import depth exceeded {max_depth} at {path}")]
    CycleDepth { path: PathBuf, max_depth: usize },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BuildError {
    /// Machine-readable error code, stable across releases.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transform { .. } => "TRANSFORM_ERROR",
            Self::Resolution { .. } => "RESOLUTION_ERROR",
            Self::CycleDepth { .. } => "CYCLE_DEPTH_ERROR",
            Self::Read { .. } => "READ_ERROR",
            Self::Write { .. } => "WRITE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}
