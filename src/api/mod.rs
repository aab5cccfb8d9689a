//! HTTP surface: analysis endpoints and upload text extraction.

pub mod extract;
pub mod routes;

pub use extract::extract_text;
pub use routes::{AnalysisResponse, AppState, analysis_routes};
