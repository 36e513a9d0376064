pub mod analyzer;
pub mod response_parser;
pub mod validation_service;

pub use analyzer::{build_prompt, DocumentAnalyzer, FileAnalysisApi, GatewayAnalyzer};
pub use response_parser::parse_ai_response;
pub use validation_service::{DocumentValidation, ValidationService};
