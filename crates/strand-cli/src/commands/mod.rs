//! Command implementations.

pub mod build;
pub mod dev;

use miette::{IntoDiagnostic, Result};
use std::path::Path;
use strand_core::{compose, BuildConfig, ConfigFile, Mode, Overrides, TransformRegistry};

/// Load, compose, and validate the configuration shared by all commands.
pub fn load_config(
    mode: Mode,
    cwd: &Path,
    config_path: Option<&Path>,
    flags: &Overrides,
) -> Result<BuildConfig> {
    let file = ConfigFile::load(cwd, config_path).into_diagnostic()?;
    let config = compose(mode, cwd, file, flags);
    config.validate().into_diagnostic()?;
    Ok(config)
}

/// Registry from the config's transform rules plus built-ins.
pub fn registry_for(config: &BuildConfig) -> Result<TransformRegistry> {
    TransformRegistry::for_config(&config.transform_rules).into_diagnostic()
}
