use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

// A single term/definition pair parsed from a generation response
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct Flashcard {
    pub term: String,
    pub definition: String,
}

impl Flashcard {
    pub fn new(term: impl Into<String>, definition: impl Into<String>) -> Self {
        Flashcard {
            term: term.into(),
            definition: definition.into(),
        }
    }

    pub fn identity(&self) -> FlashcardIdentity {
        FlashcardIdentity::of(self)
    }
}

// Completion key: term + ":" + definition
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct FlashcardIdentity(String);

impl FlashcardIdentity {
    pub fn of(flashcard: &Flashcard) -> Self {
        FlashcardIdentity(format!("{}:{}", flashcard.term, flashcard.definition))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Saved snapshot metadata; the cards themselves live in a side table keyed by id
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub flashcard_count: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub topics_explored: usize,
    pub total_flashcards: usize,
}

// Signed-in identity as handed out by an IdentityProvider
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationStatus {
    #[default]
    Idle,
    Validating,
    InFlight,
    Succeeded,
    Failed,
}

// Cards only when Succeeded, error only when Failed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationState {
    pub status: GenerationStatus,
    pub flashcards: Vec<Flashcard>,
    pub error: Option<GenerationError>,
}

impl GenerationState {
    pub fn is_generating(&self) -> bool {
        self.status == GenerationStatus::InFlight
    }

    pub fn error_message(&self) -> String {
        self.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
    }
}
