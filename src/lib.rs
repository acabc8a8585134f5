//! Dunder - Dunder Mifflin themed multi-agent chat assistant
//!
//! This library routes free-text requests to office persona agents through an
//! LLM intent classifier, and serves them over HTTP and an interactive terminal.

pub mod agents;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod metrics;
pub mod middleware;
pub mod repl;
pub mod router;
pub mod telemetry;
