//! Error types for Parley

use thiserror::Error;

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Parley
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (bad or missing provider configuration)
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider error (upstream call failed, timed out, or returned malformed data)
    #[error("provider error: {0}")]
    Provider(String),

    /// Dialogue error (unknown session referenced)
    #[error("dialogue error: {0}")]
    Dialogue(String),

    /// Speech recognition error (service-side failure)
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Audio device error (capture-side hardware failure)
    #[error("audio device error: {0}")]
    AudioDevice(String),

    /// Speech synthesis error (playback-side failure)
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Network error (connectivity precheck failed)
    #[error("network error: {0}")]
    Network(String),

    /// Assistant error (collaborator failure surfaced at the orchestrator boundary)
    #[error("assistant error: {0}")]
    Assistant(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
