//! # Parley
//!
//! Conversation engine for voice and text assistants: pluggable language
//! model providers behind a two-tier response cache, bounded per-session
//! dialogue history, and an orchestrator that drives the
//! listen → process → speak loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   utterance   ┌─────────────┐   prompt+context   ┌──────────┐
//! │ Recognizer │ ────────────▶ │  Assistant  │ ─────────────────▶ │  Cached  │
//! └────────────┘               │ orchestrator│ ◀───────────────── │ Provider │
//! ┌────────────┐    reply      │             │       reply        └────┬─────┘
//! │Synthesizer │ ◀──────────── └──────┬──────┘                         │ miss
//! └────────────┘                      │                           ┌────▼─────┐
//!                               ┌─────▼──────┐                    │ Provider │
//!                               │  Dialogue  │                    │ registry │
//!                               │  manager   │                    │ (OpenAI, │
//!                               └────────────┘                    │  Azure)  │
//!                                                                 └──────────┘
//! ```
//!
//! The orchestrator owns one session and runs strictly sequential turns:
//! recognized text is answered from the cache when possible, otherwise by
//! the configured provider with the session's recent history as context.

pub mod assistant;
pub mod cache;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod monitor;
pub mod network;
pub mod providers;
pub mod voice;

pub use assistant::{Assistant, AssistantState, AssistantStatus};
pub use cache::{CachedProvider, ResponseCache};
pub use config::{CacheConfig, Config};
pub use dialogue::{DialogueManager, Message, MessageRole, Session};
pub use error::{Error, Result};
pub use monitor::{PerformanceMonitor, PerformanceSnapshot};
pub use providers::{
    GenerateOptions, Provider, ProviderConfig, ProviderFactory, ProviderRegistry, SettingValue,
};
