//! StockPulse Runner: configuration, the per-symbol Pipeline, commentary, run reports.
//!
//! This crate builds on `stockpulse-core` to provide:
//! - TOML configuration with defaults and environment credentials
//! - Pipeline: Fetch → Compute alongside News Search → Commentary, on a bounded worker pool
//! - The AI-commentary seam and its prompt assembly
//! - RunReport with per-symbol outcomes and JSON / CSV export

pub mod commentary;
pub mod config;
pub mod export;
pub mod pipeline;
pub mod report;

pub use commentary::{build_context, parse_completion, CommentaryError, CommentaryProvider, OpenAiCommentary};
pub use config::{ConfigError, Credentials, StockPulseConfig};
pub use export::{export_csv, export_json, save_artifacts};
pub use pipeline::{Pipeline, SymbolRequest, SymbolState};
pub use report::{RunReport, RunStatus, SymbolOutcome, SymbolReport};
