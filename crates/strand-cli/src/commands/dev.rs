//! `strand dev` command implementation.
//!
//! Starts the development server: an initial build, a file watcher over
//! the module graph, live updates over WebSocket, and proxying per the
//! config's `devServer.proxy` rules. The bundle is served from memory;
//! nothing is written to disk in this mode.

use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::sync::Arc;
use strand_dev::{run_server, DevState};

/// Dev command action.
#[derive(Debug, Clone)]
pub struct DevAction {
    pub cwd: PathBuf,
    pub config_path: Option<PathBuf>,
    pub flags: strand_core::Overrides,
    pub open: bool,
}

pub fn run(action: &DevAction) -> Result<()> {
    let config = super::load_config(
        strand_core::Mode::Development,
        &action.cwd,
        action.config_path.as_deref(),
        &action.flags,
    )?;
    let registry = super::registry_for(&config)?;

    let (host, port) = config
        .dev_server
        .as_ref()
        .map_or(("127.0.0.1".to_string(), 8080), |dev| {
            (dev.host.clone(), dev.port)
        });

    println!();
    println!("  strand dev server");
    println!("  http://{host}:{port}");
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    if action.open {
        let _ = open_browser(&format!("http://{host}:{port}"));
    }

    let state = Arc::new(DevState::new(config, registry));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    runtime
        .block_on(run_server(state, action.cwd.clone()))
        .into_diagnostic()
}

/// Open a URL in the default browser.
fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()?;
    }
    Ok(())
}
