//! `strand build` command implementation.

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use strand_core::{emit, write_bundle, BuildConfig, EmitOptions, GraphBuilder};
use tracing::info;

/// Build command action.
#[derive(Debug, Clone)]
pub struct BuildAction {
    pub cwd: PathBuf,
    pub mode: strand_core::Mode,
    pub config_path: Option<PathBuf>,
    pub flags: strand_core::Overrides,
    pub json: bool,
}

/// Build result for JSON output.
#[derive(Serialize)]
struct BuildResultJson {
    ok: bool,
    mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_path: Option<String>,
    modules: usize,
    hash: Option<String>,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

#[derive(Serialize)]
struct ErrorJson {
    code: String,
    message: String,
}

pub fn run(action: &BuildAction) -> Result<()> {
    let config = super::load_config(
        action.mode,
        &action.cwd,
        action.config_path.as_deref(),
        &action.flags,
    )?;
    let registry = super::registry_for(&config)?;

    let started = Instant::now();
    let result = run_pipeline(&config, &registry);
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok((output_path, modules, hash)) => {
            if action.json {
                let result = BuildResultJson {
                    ok: true,
                    mode: config.mode.to_string(),
                    output_path: Some(output_path.display().to_string()),
                    modules,
                    hash: Some(hash),
                    elapsed_ms,
                    error: None,
                };
                println!("{}", serde_json::to_string(&result).into_diagnostic()?);
            } else {
                println!(
                    "  Built {} modules -> {} in {}ms",
                    modules,
                    output_path.display(),
                    elapsed_ms
                );
            }
            Ok(())
        }
        Err(err) => {
            if action.json {
                let result = BuildResultJson {
                    ok: false,
                    mode: config.mode.to_string(),
                    output_path: None,
                    modules: 0,
                    hash: None,
                    elapsed_ms,
                    error: Some(ErrorJson {
                        code: err.code().to_string(),
                        message: err.to_string(),
                    }),
                };
                println!("{}", serde_json::to_string(&result).into_diagnostic()?);
                // A failed production build must exit non-zero even with
                // the error already reported on stdout.
                std::process::exit(1);
            }
            Err(err).into_diagnostic()
        }
    }
}

fn run_pipeline(
    config: &BuildConfig,
    registry: &strand_core::TransformRegistry,
) -> Result<(PathBuf, usize, String), strand_core::BuildError> {
    let builder = GraphBuilder::new(registry, config);
    let graph = builder.build(&config.entry_path)?;

    let options = EmitOptions {
        filename: config.output_filename.clone(),
        source_maps: config.source_maps(),
    };
    let bundle = emit(&graph, &options)?;
    let output_path = write_bundle(&bundle, &config.output_dir, &config.output_filename)?;

    info!(
        modules = bundle.modules.len(),
        output = %output_path.display(),
        hash = %bundle.hash,
        "bundle written"
    );
    Ok((output_path, bundle.modules.len(), bundle.hash))
}
