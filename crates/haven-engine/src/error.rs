use thiserror::Error;

use haven_llm::LlmError;
use haven_vault::VaultError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// The model's extraction response was not the required JSON shape.
    #[error("Extraction response failed validation")]
    MalformedExtraction,
}

pub type Result<T> = std::result::Result<T, EngineError>;
