//! Configuration loaded from `crucible.toml`.
//!
//! The [`CrucibleConfig`] struct holds every tunable threshold of the
//! iteration engine. Values missing from the file fall back to sensible
//! defaults. The `OLLAMA_HOST` environment variable takes precedence over
//! the file for the model endpoint.

use serde::Deserialize;
use std::path::Path;

use crate::error::CrucibleError;

/// Top-level configuration loaded from `crucible.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CrucibleConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Model identifier used when the request does not name one.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum generate-extract-compile iterations per job.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Wall-clock budget for a whole job, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for a single compile-and-test attempt, in seconds.
    #[serde(default = "default_compile_timeout_secs")]
    pub compile_timeout_secs: u64,

    /// Maximum composed prompt size in bytes.
    #[serde(default = "default_max_prompt_bytes")]
    pub max_prompt_bytes: usize,

    /// Consecutive identical error kinds before the job is declared stuck.
    #[serde(default = "default_same_error_threshold")]
    pub same_error_threshold: usize,

    /// Character budget for the error message fed back to the model.
    #[serde(default = "default_feedback_char_budget")]
    pub feedback_char_budget: usize,
}

// Default Ollama endpoint: local server.
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

// Default model identifier.
fn default_model() -> String {
    "llama3.1".to_string()
}

// Default iteration cap: 10.
fn default_max_iterations() -> u32 {
    10
}

// Default job budget: 5 minutes.
fn default_timeout_secs() -> u64 {
    300
}

// Default per-attempt compile timeout: 30 seconds.
fn default_compile_timeout_secs() -> u64 {
    30
}

// Default prompt cap: 50 KiB.
fn default_max_prompt_bytes() -> usize {
    50 * 1024
}

// Default stuck-loop threshold: 3 identical errors.
fn default_same_error_threshold() -> usize {
    3
}

// Default feedback truncation: 500 characters.
fn default_feedback_char_budget() -> usize {
    500
}

impl Default for CrucibleConfig {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            default_model: default_model(),
            max_iterations: default_max_iterations(),
            timeout_secs: default_timeout_secs(),
            compile_timeout_secs: default_compile_timeout_secs(),
            max_prompt_bytes: default_max_prompt_bytes(),
            same_error_threshold: default_same_error_threshold(),
            feedback_char_budget: default_feedback_char_budget(),
        }
    }
}

impl CrucibleConfig {
    /// Load configuration from `crucible.toml` in the current directory.
    /// Falls back to defaults when the file does not exist.
    pub fn load() -> Result<Self, CrucibleError> {
        let path = Path::new("crucible.toml");
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<CrucibleConfig>(&contents)?
        } else {
            Self::default()
        };

        // Environment variable takes precedence over the file for the endpoint.
        if let Ok(host) = std::env::var("OLLAMA_HOST")
            && !host.is_empty()
        {
            config.ollama_url = host;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make the engine loop degenerate.
    fn validate(&self) -> Result<(), CrucibleError> {
        if self.max_iterations == 0 {
            return Err(CrucibleError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.same_error_threshold < 2 {
            return Err(CrucibleError::Config(
                "same_error_threshold must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}
