pub mod openai_client;
pub mod validate_client;

pub use openai_client::{ApiFailure, OpenAiClient};
pub use validate_client::ValidateClient;
