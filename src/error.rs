use thiserror::Error;

// User-visible failures recorded in the generation state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Please enter a topic or some terms and definitions.")]
    MissingTopic,

    #[error("Please enter your Gemini API key.")]
    MissingCredential,

    #[error("Failed to generate flashcards or received an empty response. Please try again.")]
    EmptyResponse,

    #[error("No valid flashcards could be generated from the response. Please check the format.")]
    NoValidFlashcards,

    #[error("An error occurred: {0}")]
    RequestError(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
