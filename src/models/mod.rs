pub mod answers;
pub mod document;
pub mod loaders;
pub mod question;

pub use answers::{AiAnswer, AiResponse, ErrorBody, UserAnswers, ValidationResult};
pub use document::{PdfDocument, PDF_CONTENT_TYPE};
pub use loaders::{load_catalog, load_catalog_from_toml};
pub use question::{Answer, Question, QuestionCatalog, DEFAULT_QUESTIONS};
