//! Email triage: hybrid productive/unproductive email classifier.

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod sentiment;
