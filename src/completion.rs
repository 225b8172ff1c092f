use std::collections::BTreeSet;
use std::sync::Arc;

use crate::database::{COMPLETED_KEY, Storage, get_json, set_json};
use crate::error::StorageResult;
use crate::models::{Flashcard, FlashcardIdentity};

// Reviewed flashcards, written back to storage on every change
pub struct CompletionTracker {
    storage: Arc<dyn Storage>,
    completed: BTreeSet<FlashcardIdentity>,
}

impl CompletionTracker {
    pub async fn load(storage: Arc<dyn Storage>) -> StorageResult<Self> {
        let completed: BTreeSet<FlashcardIdentity> = get_json(storage.as_ref(), COMPLETED_KEY)
            .await?
            .unwrap_or_default();

        tracing::debug!("loaded {} completed flashcards", completed.len());
        Ok(CompletionTracker { storage, completed })
    }

    // No-op when already present; the set only grows once the write has landed
    pub async fn mark_completed(&mut self, flashcard: &Flashcard) -> StorageResult<bool> {
        let identity = flashcard.identity();
        if self.completed.contains(&identity) {
            return Ok(false);
        }

        let mut updated = self.completed.clone();
        updated.insert(identity);
        set_json(self.storage.as_ref(), COMPLETED_KEY, &updated).await?;

        self.completed = updated;
        Ok(true)
    }

    pub fn is_completed(&self, flashcard: &Flashcard) -> bool {
        self.completed.contains(&flashcard.identity())
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}
