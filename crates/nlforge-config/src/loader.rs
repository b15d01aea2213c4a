//! TOML loading for `PipelineConfig`.

use std::path::Path;

use tracing::debug;

use nlforge_contracts::error::{PipelineError, PipelineResult};

use crate::schema::PipelineConfig;

impl PipelineConfig {
    /// Parse `s` as TOML and build a `PipelineConfig`.
    ///
    /// Returns `PipelineError::ConfigError` if the TOML is malformed or does
    /// not match the expected schema.
    pub fn from_toml_str(s: &str) -> PipelineResult<Self> {
        let config: PipelineConfig = toml::from_str(s).map_err(|e| PipelineError::ConfigError {
            reason: format!("failed to parse pipeline config TOML: {}", e),
        })?;
        debug!(
            tier4_enabled = config.tier4_enabled,
            cost_ceiling = config.per_request_cost_ceiling,
            "pipeline config loaded"
        );
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML pipeline configuration.
    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| PipelineError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
