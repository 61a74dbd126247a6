//! `tracing-subscriber` setup for the binary.
//!
//! `RUST_LOG`, when set, takes precedence over the configured level and
//! component directives.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default level for every target (`trace` .. `error`).
    pub level: String,
    /// Extra `target=level` directives, e.g. `tokenindex_rpc=debug`.
    pub components: Vec<String>,
    /// Emit newline-delimited JSON instead of the human format.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            components: Vec::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Filter directives in `EnvFilter` syntax.
    pub fn directives(&self) -> String {
        std::iter::once(self.level.trim())
            .chain(self.components.iter().map(|c| c.trim()))
            .filter(|d| !d.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn filter(&self) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let directives = self.directives();
        EnvFilter::try_new(&directives)
            .with_context(|| format!("invalid log directives '{directives}'"))
    }
}

pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let filter = config.filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    }
    .context("failed to install tracing subscriber")
}
