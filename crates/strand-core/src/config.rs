//! Build and dev-server configuration.
//!
//! Configuration is composed once at startup: optional `strand.config.json`
//! values, then CLI flag overrides, then mode-dependent defaults, producing
//! an immutable [`BuildConfig`]. Nothing is mutated after [`BuildConfig`]
//! is constructed; development and production get two independent values
//! instead of one object patched per mode.
//!
//! ## Config file format
//!
//! ```json
//! {
//!   "entry": "./src/main.js",
//!   "outputDir": "./public",
//!   "outputFilename": "bundle.js",
//!   "transformRules": [{ "pattern": "\\.json$", "transformId": "json" }],
//!   "devServer": {
//!     "port": 8080,
//!     "staticDir": "./public",
//!     "proxy": [{ "pathPrefix": "/api", "target": "http://localhost:8090" }]
//!   }
//! }
//! ```

use crate::error::BuildError;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Config file name, discovered in the working directory.
pub const CONFIG_FILE: &str = "strand.config.json";

/// Default source extensions tried during specifier resolution.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".mjs", ".cjs", ".json"];

/// Safety limit on import depth; legitimate cycles are handled by the
/// visited set, this only guards pathological trees.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Build mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    /// Source maps default on in development, off in production.
    #[must_use]
    pub fn default_source_maps(self) -> bool {
        self == Mode::Development
    }

    /// Live update defaults on in development, off in production.
    #[must_use]
    pub fn default_live_update(self) -> bool {
        self == Mode::Development
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(format!(
                "invalid mode '{other}' (expected 'development' or 'production')"
            )),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transform rule: files matching `pattern` go through the transform
/// registered under `transform_id`. Declared order is match order.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformRule {
    pub pattern: String,
    #[serde(rename = "transformId")]
    pub transform_id: String,
}

/// One proxy rule: requests whose path starts with `path_prefix` are
/// forwarded to `target`. Declared order is match order.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyRule {
    #[serde(rename = "pathPrefix")]
    pub path_prefix: String,
    pub target: Url,
}

/// Dev server settings with mode defaults already applied.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub proxy_rules: Vec<ProxyRule>,
    pub live_update: bool,
    pub source_maps: bool,
}

/// Immutable build configuration.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub mode: Mode,
    pub entry_path: PathBuf,
    pub output_dir: PathBuf,
    pub output_filename: String,
    pub transform_rules: Vec<TransformRule>,
    pub resolve_extensions: Vec<String>,
    pub max_depth: usize,
    pub dev_server: Option<DevServerConfig>,
}

impl BuildConfig {
    /// Absolute path of the emitted artifact.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_filename)
    }

    /// Whether source maps are enabled for this build.
    #[must_use]
    pub fn source_maps(&self) -> bool {
        self.dev_server
            .as_ref()
            .map_or_else(|| self.mode.default_source_maps(), |d| d.source_maps)
    }

    /// Validate the composed configuration.
    ///
    /// Checks that the entry resolves to an existing file, every transform
    /// pattern compiles, and every proxy prefix is non-empty.
    pub fn validate(&self) -> Result<(), BuildError> {
        if !self.entry_path.is_file() {
            return Err(BuildError::Config(format!(
                "entry '{}' does not exist",
                self.entry_path.display()
            )));
        }
        for rule in &self.transform_rules {
            Regex::new(&rule.pattern).map_err(|e| {
                BuildError::Config(format!("invalid transform pattern '{}': {e}", rule.pattern))
            })?;
        }
        if let Some(dev) = &self.dev_server {
            for rule in &dev.proxy_rules {
                if rule.path_prefix.is_empty() {
                    return Err(BuildError::Config(format!(
                        "proxy rule for '{}' has an empty path prefix",
                        rule.target
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Raw config file contents; every field optional so flags and mode
/// defaults can fill the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    pub entry: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub output_filename: Option<String>,
    #[serde(default)]
    pub transform_rules: Vec<TransformRule>,
    pub resolve_extensions: Option<Vec<String>>,
    pub max_depth: Option<usize>,
    pub dev_server: Option<DevServerFile>,
}

/// Dev server section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DevServerFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub static_dir: Option<PathBuf>,
    #[serde(default)]
    pub proxy: Vec<ProxyRule>,
    pub live_update: Option<bool>,
    pub source_maps: Option<bool>,
}

impl ConfigFile {
    /// Load `strand.config.json` from `root`, or the explicit path if given.
    ///
    /// Returns `Ok(None)` when no explicit path is given and no file exists.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Option<Self>, BuildError> {
        let path = match explicit {
            Some(p) => {
                let abs = if p.is_absolute() { p.to_path_buf() } else { root.join(p) };
                if !abs.is_file() {
                    return Err(BuildError::Config(format!(
                        "config file not found: {}",
                        abs.display()
                    )));
                }
                abs
            }
            None => {
                let discovered = root.join(CONFIG_FILE);
                if !discovered.is_file() {
                    return Ok(None);
                }
                discovered
            }
        };

        let source = std::fs::read_to_string(&path).map_err(|source| BuildError::Read {
            path: path.clone(),
            source,
        })?;
        let file: ConfigFile = serde_json::from_str(&source).map_err(|e| {
            BuildError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        Ok(Some(file))
    }
}

/// CLI flag overrides. `None` means the flag was not passed; file values
/// and then defaults apply.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub entry: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub output_filename: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub static_dir: Option<PathBuf>,
    pub source_maps: Option<bool>,
}

/// Compose the final configuration: CLI flags win over the config file,
/// the config file wins over defaults, mode defaults fill the rest.
/// Relative paths are resolved against `cwd`.
#[must_use]
pub fn compose(mode: Mode, cwd: &Path, file: Option<ConfigFile>, flags: &Overrides) -> BuildConfig {
    let file = file.unwrap_or_default();
    let dev_file = file.dev_server.unwrap_or_default();

    let abs = |p: PathBuf| if p.is_absolute() { p } else { cwd.join(p) };

    let entry_path = abs(flags
        .entry
        .clone()
        .or(file.entry)
        .unwrap_or_else(|| PathBuf::from("src/main.js")));
    let output_dir = abs(flags
        .output_dir
        .clone()
        .or(file.output_dir)
        .unwrap_or_else(|| PathBuf::from("public")));
    let static_dir = abs(flags
        .static_dir
        .clone()
        .or(dev_file.static_dir)
        .unwrap_or_else(|| output_dir.clone()));

    let source_maps = flags
        .source_maps
        .or(dev_file.source_maps)
        .unwrap_or_else(|| mode.default_source_maps());

    let dev_server = DevServerConfig {
        host: flags
            .host
            .clone()
            .or(dev_file.host)
            .unwrap_or_else(|| "127.0.0.1".to_string()),
        port: flags.port.or(dev_file.port).unwrap_or(8080),
        static_dir,
        proxy_rules: dev_file.proxy,
        live_update: dev_file
            .live_update
            .unwrap_or_else(|| mode.default_live_update()),
        source_maps,
    };

    BuildConfig {
        mode,
        entry_path,
        output_dir,
        output_filename: flags
            .output_filename
            .clone()
            .or(file.output_filename)
            .unwrap_or_else(|| "bundle.js".to_string()),
        transform_rules: file.transform_rules,
        resolve_extensions: file.resolve_extensions.unwrap_or_else(|| {
            DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect()
        }),
        max_depth: file.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
        dev_server: Some(dev_server),
    }
}
