#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::too_many_lines)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;
use strand_core::{Mode, Overrides};

#[derive(Parser, Debug)]
#[command(name = "strand")]
#[command(author, version, about = "A config-driven module bundler with a development server", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Explicit config file path (defaults to strand.config.json discovery)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Bundle the entry module and its import graph to disk
    Build {
        /// Entry module (default: src/main.js)
        #[arg(short, long, value_name = "PATH")]
        entry: Option<PathBuf>,

        /// Output directory (default: public)
        #[arg(short, long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Output filename (default: bundle.js)
        #[arg(long, value_name = "NAME")]
        out_file: Option<String>,

        /// Build mode (default: production)
        #[arg(short, long, default_value = "production")]
        mode: Mode,

        /// Emit source maps (overrides the mode default)
        #[arg(long)]
        source_maps: bool,

        /// Disable source maps (overrides the mode default)
        #[arg(long, conflicts_with = "source_maps")]
        no_source_maps: bool,
    },

    /// Serve the bundle from memory, rebuilding on change
    Dev {
        /// Entry module (default: src/main.js)
        #[arg(short, long, value_name = "PATH")]
        entry: Option<PathBuf>,

        /// Host to bind (default: 127.0.0.1)
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Port to listen on (default: 8080)
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,

        /// Static file directory (default: the output directory)
        #[arg(long, value_name = "DIR")]
        static_dir: Option<PathBuf>,

        /// Open the browser once the server is up
        #[arg(long)]
        open: bool,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Commands::Build {
            entry,
            out_dir,
            out_file,
            mode,
            source_maps,
            no_source_maps,
        } => {
            let flags = Overrides {
                entry,
                output_dir: out_dir,
                output_filename: out_file,
                source_maps: if source_maps {
                    Some(true)
                } else if no_source_maps {
                    Some(false)
                } else {
                    None
                },
                ..Overrides::default()
            };
            commands::build::run(&commands::build::BuildAction {
                cwd,
                mode,
                config_path: cli.config,
                flags,
                json: cli.json,
            })
        }
        Commands::Dev {
            entry,
            host,
            port,
            static_dir,
            open,
        } => {
            let flags = Overrides {
                entry,
                host,
                port,
                static_dir,
                ..Overrides::default()
            };
            commands::dev::run(&commands::dev::DevAction {
                cwd,
                config_path: cli.config,
                flags,
                open,
            })
        }
        Commands::Version => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "name": "strand", "version": strand_core::VERSION })
                );
            } else {
                println!("strand {}", strand_core::VERSION);
            }
            Ok(())
        }
    }
}
