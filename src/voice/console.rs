//! Line-oriented console adapters
//!
//! Text-mode stand-ins for the audio collaborators: the recognizer reads one
//! line from stdin per listen window, the synthesizer prints to stdout. They
//! drive the exact same orchestrator loop as real audio hardware would.

use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use super::{Recognizer, Synthesizer};
use crate::{Error, Result};

/// Reads utterances from stdin, one line per listen attempt
pub struct ConsoleRecognizer {
    lines: Lines<BufReader<Stdin>>,
    listen_timeout: Duration,
}

impl ConsoleRecognizer {
    #[must_use]
    pub fn new(listen_timeout: Duration) -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            listen_timeout,
        }
    }
}

#[async_trait]
impl Recognizer for ConsoleRecognizer {
    async fn listen(&mut self) -> Result<Option<String>> {
        print!("you: ");
        let _ = std::io::stdout().flush();

        match tokio::time::timeout(self.listen_timeout, self.lines.next_line()).await {
            // Listen window elapsed: a recoverable miss
            Err(_) => {
                println!();
                Ok(None)
            }
            Ok(Ok(Some(line))) => {
                let text = line.trim();
                if text.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(text.to_string()))
                }
            }
            // Stdin closed: there is nothing left to listen to
            Ok(Ok(None)) => Err(Error::Recognition("input stream closed".to_string())),
            Ok(Err(e)) => Err(Error::Recognition(e.to_string())),
        }
    }

    async fn adjust_for_ambient_noise(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Prints replies to stdout under the assistant's name
pub struct ConsoleSynthesizer {
    name: String,
}

impl ConsoleSynthesizer {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Synthesizer for ConsoleSynthesizer {
    async fn speak(&mut self, text: &str) -> Result<()> {
        println!("{}: {text}", self.name);
        Ok(())
    }

    async fn save_to_file(&mut self, text: &str, path: &Path) -> Result<()> {
        tokio::fs::write(path, text)
            .await
            .map_err(|e| Error::Synthesis(format!("failed to write {}: {e}", path.display())))
    }

    fn stop(&mut self) {}
}
