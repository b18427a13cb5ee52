//! Unified inbox: email and chat aggregation, embedding-based subject
//! categorization, and bounded JSON views for language-model context.

pub mod classifier;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod model;
pub mod providers;
pub mod server;
pub mod store;
pub mod taxonomy;
pub mod tools;
pub mod views;
