//! Turn-level performance monitoring
//!
//! The orchestrator wraps the provider call explicitly and records timing
//! here; the provider itself stays independently testable with no monitoring
//! attached.

use std::time::{Duration, Instant};

use serde::Serialize;

/// One recorded assistant turn
#[derive(Debug, Clone)]
struct TurnSample {
    latency: Duration,
    prompt_chars: usize,
    reply_chars: usize,
}

/// Aggregated performance report
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSnapshot {
    pub uptime_secs: u64,
    pub turns: usize,
    pub avg_latency_ms: u64,
    pub max_latency_ms: u64,
    pub total_prompt_chars: usize,
    pub total_reply_chars: usize,
}

/// Collects per-turn metrics for one assistant instance
#[derive(Debug)]
pub struct PerformanceMonitor {
    started: Instant,
    samples: Vec<TurnSample>,
}

impl PerformanceMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            samples: Vec::new(),
        }
    }

    /// Record one provider round-trip
    pub fn record_turn(&mut self, latency: Duration, prompt_chars: usize, reply_chars: usize) {
        tracing::debug!(
            latency_ms = %latency.as_millis(),
            prompt_chars,
            reply_chars,
            "turn recorded"
        );
        self.samples.push(TurnSample {
            latency,
            prompt_chars,
            reply_chars,
        });
    }

    /// Aggregate everything recorded so far
    #[must_use]
    pub fn snapshot(&self) -> PerformanceSnapshot {
        #[allow(clippy::cast_possible_truncation)]
        let latencies_ms: Vec<u64> = self
            .samples
            .iter()
            .map(|s| s.latency.as_millis() as u64)
            .collect();

        let turns = self.samples.len();
        let total_ms: u64 = latencies_ms.iter().sum();

        PerformanceSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            turns,
            avg_latency_ms: if turns == 0 {
                0
            } else {
                total_ms / turns as u64
            },
            max_latency_ms: latencies_ms.iter().copied().max().unwrap_or(0),
            total_prompt_chars: self.samples.iter().map(|s| s.prompt_chars).sum(),
            total_reply_chars: self.samples.iter().map(|s| s.reply_chars).sum(),
        }
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}
