//! CLI argument definitions for the Xodiac binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::Parser;
use xodiac_chat::ModeToggles;

/// Xodiac: ask questions, get streamed, cited answers.
#[derive(Parser, Debug)]
#[command(name = "xodiac", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Research-oriented answers with citations.
    #[arg(long = "deep-think")]
    pub deep_think: bool,

    /// Generate an image for every query.
    #[arg(long = "image")]
    pub image: bool,

    /// Use the reasoning model.
    #[arg(long = "reasoning")]
    pub reasoning: bool,

    /// Write the resolved configuration file (defaults plus any existing
    /// values) and exit.
    #[arg(long = "init-config")]
    pub init_config: bool,

    /// Query to answer once. Starts an interactive session when omitted.
    pub query: Vec<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > XODIAC_CONFIG env var > ~/.xodiac/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("XODIAC_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level: --log-level flag, else the config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    pub fn toggles(&self) -> ModeToggles {
        ModeToggles {
            deep_think: self.deep_think,
            image_generation: self.image,
            reasoning: self.reasoning,
        }
    }

    /// The one-shot query, if any words were given.
    pub fn query(&self) -> Option<String> {
        let joined = self.query.join(" ");
        let trimmed = joined.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".xodiac").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".xodiac").join("config.toml");
    }
    PathBuf::from("config.toml")
}
