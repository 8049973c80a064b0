//! Voice collaborator contracts
//!
//! Audio capture and playback are host concerns. The orchestrator only sees
//! these two traits; anything that can listen and speak can drive a
//! conversation, including the line-oriented [`console`] adapters.

pub mod console;

use std::path::Path;

use async_trait::async_trait;

use crate::Result;

/// Turns audio (or any input) into text
#[async_trait]
pub trait Recognizer: Send {
    /// Listen for one utterance.
    ///
    /// Returns `Ok(None)` for a recoverable miss: listen-window timeout,
    /// unintelligible speech, or below-threshold volume.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Recognition`] for service-side failures and
    /// [`crate::Error::AudioDevice`] for capture hardware failures.
    async fn listen(&mut self) -> Result<Option<String>>;

    /// Recalibrate for ambient noise before a listening run.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AudioDevice`] if calibration fails.
    async fn adjust_for_ambient_noise(&mut self) -> Result<()>;
}

/// Turns text into speech (or any output)
#[async_trait]
pub trait Synthesizer: Send {
    /// Render text aloud.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Synthesis`] if rendering fails.
    async fn speak(&mut self, text: &str) -> Result<()>;

    /// Render text into a file instead of playing it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Synthesis`] if rendering or the write fails.
    async fn save_to_file(&mut self, text: &str, path: &Path) -> Result<()>;

    /// Interrupt any in-progress output
    fn stop(&mut self);
}
