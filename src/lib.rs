pub mod api;
pub mod archive;
pub mod auth;
pub mod completion;
pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod generator;
pub mod models;
pub mod parser;
pub mod preferences;

pub use config::Config;
pub use error::GenerationError;
pub use generator::FlashcardGenerator;
pub use models::*;
pub use parser::parse_flashcards;
