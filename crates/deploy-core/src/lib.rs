//! deploy-core: Shared library for the deployment agent
//!
//! Provides:
//! - Configuration loading (deploy-agent.toml + environment)
//! - The decision oracle seam and its Ollama-backed client
//! - Search-augmented generation for `websearch:` actions
//! - Cloud credential/region discovery

pub mod cloud;
pub mod config;
pub mod oracle;
pub mod search;
pub mod text;

pub use cloud::{CloudStatus, ProbeInputs};
pub use config::{Config, LoopConfig, OracleConfig, SearchConfig};
pub use oracle::{OllamaClient, Oracle};
pub use search::{Citation, Searcher, WebSearchClient};
pub use text::truncate_chars;
