//! Logging System
//!
//! One global `tracing` subscriber. `LoggingConfig` supplies the level, format
//! and destinations; each can be overridden from the environment:
//!
//! - `STUDYHUB_LOG`: full filter directive (replaces level and modules)
//! - `STUDYHUB_LOG_FORMAT`: `text` or `json`
//! - `STUDYHUB_LOG_OUTPUT`: `stdout`, `stderr`, `file`, `file+stderr` or `both`
//! - `STUDYHUB_LOG_FILE`: log file path
//! - `STUDYHUB_LOG_MODULES`: extra `target=level` pairs, comma separated

use crate::error::StartupError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_FILTER: &str = "STUDYHUB_LOG";
const ENV_FORMAT: &str = "STUDYHUB_LOG_FORMAT";
const ENV_OUTPUT: &str = "STUDYHUB_LOG_OUTPUT";
const ENV_FILE: &str = "STUDYHUB_LOG_FILE";
const ENV_MODULES: &str = "STUDYHUB_LOG_MODULES";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,

    /// trace, debug, info, warn, error or off
    pub level: String,

    /// text or json
    pub format: String,

    /// stdout, stderr, file, file+stderr or both
    pub output: String,

    /// Log file when output includes a file; None means the platform state dir
    pub file: Option<PathBuf>,

    /// ANSI colors for text written to a terminal stream
    pub color: bool,

    /// Per-target levels, e.g. `studyhub::cache = "debug"`
    pub modules: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: "text".to_string(),
            output: "stderr".to_string(),
            file: None,
            color: true,
            modules: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = StartupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(StartupError::Logging(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LogOutput {
    stdout: bool,
    stderr: bool,
    file: bool,
}

impl FromStr for LogOutput {
    type Err = StartupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (stdout, stderr, file) = match s {
            "stdout" => (true, false, false),
            "stderr" => (false, true, false),
            "file" => (false, false, true),
            "file+stderr" => (false, true, true),
            "both" => (true, true, false),
            other => {
                return Err(StartupError::Logging(format!(
                    "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                    other
                )))
            }
        };
        Ok(LogOutput {
            stdout,
            stderr,
            file,
        })
    }
}

/// Settings after environment overrides are applied
struct Resolved {
    filter: EnvFilter,
    format: LogFormat,
    output: LogOutput,
    color: bool,
    file: Option<PathBuf>,
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn resolve(config: &LoggingConfig) -> Result<Resolved, StartupError> {
    let format = match env_value(ENV_FORMAT) {
        // a bad override falls back to the configured format
        Some(value) => value.parse().or_else(|_| config.format.parse())?,
        None => config.format.parse()?,
    };
    let output: LogOutput = env_value(ENV_OUTPUT)
        .as_deref()
        .unwrap_or(&config.output)
        .parse()?;
    Ok(Resolved {
        filter: build_filter(config)?,
        format,
        color: config.color && !output.file,
        output,
        file: config.file.clone(),
    })
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, StartupError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let from_env = env_value(ENV_MODULES).unwrap_or_default();
    let env_pairs = from_env.split(',').filter_map(|pair| {
        let (target, level) = pair.split_once('=')?;
        Some((target.trim().to_string(), level.trim().to_string()))
    });
    let pairs = config
        .modules
        .iter()
        .map(|(t, l)| (t.clone(), l.clone()))
        .chain(env_pairs);

    let mut filter = EnvFilter::new(&config.level);
    for (target, level) in pairs {
        let directive = format!("{}={}", target, level)
            .parse()
            .map_err(|e| StartupError::Logging(format!("Invalid log directive: {}", e)))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Log file path: explicit path, then `STUDYHUB_LOG_FILE`, then the platform
/// state directory
pub fn resolve_log_file_path(explicit: Option<PathBuf>) -> Result<PathBuf, StartupError> {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path);
    }
    if let Some(path) = env_value(ENV_FILE) {
        return Ok(PathBuf::from(path));
    }
    let dirs = directories::ProjectDirs::from("", "studyhub", "studyhub").ok_or_else(|| {
        StartupError::Logging("Could not determine platform state directory for log file".to_string())
    })?;
    let dir = dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir());
    Ok(dir.join("studyhub.log"))
}

fn open_log_file(explicit: Option<PathBuf>) -> Result<File, StartupError> {
    let path = resolve_log_file_path(explicit)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| StartupError::Logging(format!("Failed to create log directory: {}", e)))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| StartupError::Logging(format!("Failed to open log file {:?}: {}", path, e)))
}

fn make_writer(output: LogOutput, file: Option<PathBuf>) -> Result<BoxMakeWriter, StartupError> {
    Ok(match (output.file, output.stdout, output.stderr) {
        (true, _, true) => BoxMakeWriter::new(open_log_file(file)?.and(std::io::stderr)),
        (true, _, false) => BoxMakeWriter::new(open_log_file(file)?),
        (false, true, true) => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
        (false, true, false) => BoxMakeWriter::new(std::io::stdout),
        (false, false, _) => BoxMakeWriter::new(std::io::stderr),
    })
}

/// Install the global subscriber. `None` means defaults.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), StartupError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);
    let installed = if !config.enabled {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .try_init()
    } else {
        let resolved = resolve(config)?;
        let writer = make_writer(resolved.output, resolved.file)?;
        let registry = Registry::default().with(resolved.filter);
        match resolved.format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_writer(writer),
                )
                .try_init(),
            LogFormat::Text => registry
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_ansi(resolved.color)
                        .with_writer(writer),
                )
                .try_init(),
        }
    };
    installed.map_err(|e| StartupError::Logging(format!("Logging already initialized: {}", e)))
}
