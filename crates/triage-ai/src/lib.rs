//! Model clients for ticket classification and report generation

pub mod gemini;
pub mod generator;

pub use gemini::{DEFAULT_BASE_URL, GeminiClient, GeminiSettings, ModelInfo};
pub use generator::{
    AiError, ContentGenerator, GenerateRequest, Generation, Result, TOKEN_LIMIT_PHRASE,
    UploadedFile,
};
