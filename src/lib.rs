//! askql - Ask questions in plain language about uploaded CSV datasets.
//!
//! This library exposes the core modules for use by the binary and by
//! integration tests.

pub mod cli;
pub mod config;
pub mod dataset;
pub mod db;
pub mod error;
pub mod evaluation;
pub mod llm;
pub mod logging;
pub mod monitoring;
pub mod safety;
pub mod server;
pub mod service;
