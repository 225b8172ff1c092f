use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::{Storage, get_json, set_json, user_key};
use crate::error::StorageResult;
use crate::models::{Flashcard, Topic, User, UserStats};

const TOPICS_SUFFIX: &str = "topics";
const FLASHCARDS_SUFFIX: &str = "flashcards";

// Saved topics of the signed-in user; empty and read-only with nobody signed in
pub struct TopicArchive {
    storage: Arc<dyn Storage>,
    user: Option<User>,
    topics: Vec<Topic>,
    flashcards_by_topic: HashMap<String, Vec<Flashcard>>,
}

impl TopicArchive {
    pub async fn load(storage: Arc<dyn Storage>, user: Option<User>) -> StorageResult<Self> {
        let mut archive = TopicArchive {
            storage,
            user: None,
            topics: Vec::new(),
            flashcards_by_topic: HashMap::new(),
        };
        archive.set_user(user).await?;
        Ok(archive)
    }

    // Swap the visible set for another user's (or none)
    pub async fn set_user(&mut self, user: Option<User>) -> StorageResult<()> {
        self.user = user;
        self.topics.clear();
        self.flashcards_by_topic.clear();

        if let Some(user) = &self.user {
            let storage = self.storage.as_ref();
            self.topics = get_json(storage, &user_key(&user.user_id, TOPICS_SUFFIX))
                .await?
                .unwrap_or_default();
            self.flashcards_by_topic =
                get_json(storage, &user_key(&user.user_id, FLASHCARDS_SUFFIX))
                    .await?
                    .unwrap_or_default();
            tracing::debug!("loaded {} topics for {}", self.topics.len(), user.user_id);
        }
        Ok(())
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    // Newest first
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn has_topics(&self) -> bool {
        !self.topics.is_empty()
    }

    pub fn topic(&self, topic_id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == topic_id)
    }

    // Same-named topic (ignoring case) is replaced; the new one goes first.
    // None when nobody is signed in or the name is blank.
    pub async fn add_topic(
        &mut self,
        name: &str,
        flashcards: &[Flashcard],
    ) -> StorageResult<Option<String>> {
        let name = name.trim();
        if self.user.is_none() || name.is_empty() {
            return Ok(None);
        }

        let topic = Topic {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
            flashcard_count: flashcards.len(),
        };
        let id = topic.id.clone();

        let lowered = name.to_lowercase();
        let mut flashcards_by_topic = self.flashcards_by_topic.clone();
        let mut topics = vec![topic];
        for existing in &self.topics {
            if existing.name.to_lowercase() == lowered {
                flashcards_by_topic.remove(&existing.id);
            } else {
                topics.push(existing.clone());
            }
        }
        flashcards_by_topic.insert(id.clone(), flashcards.to_vec());

        self.commit(topics, flashcards_by_topic).await?;

        tracing::info!("saved topic {:?} with {} flashcards", name, flashcards.len());
        Ok(Some(id))
    }

    pub fn topic_flashcards(&self, topic_id: &str) -> Vec<Flashcard> {
        self.flashcards_by_topic
            .get(topic_id)
            .cloned()
            .unwrap_or_default()
    }

    // Unknown ids are ignored
    pub async fn delete_topic(&mut self, topic_id: &str) -> StorageResult<()> {
        if self.user.is_none() {
            return Ok(());
        }

        let topics = self
            .topics
            .iter()
            .filter(|t| t.id != topic_id)
            .cloned()
            .collect();
        let mut flashcards_by_topic = self.flashcards_by_topic.clone();
        flashcards_by_topic.remove(topic_id);
        self.commit(topics, flashcards_by_topic).await
    }

    pub fn user_stats(&self) -> UserStats {
        if self.user.is_none() {
            return UserStats::default();
        }

        UserStats {
            topics_explored: self.topics.len(),
            total_flashcards: self.flashcards_by_topic.values().map(Vec::len).sum(),
        }
    }

    // In-memory state only changes after both keys are written
    async fn commit(
        &mut self,
        topics: Vec<Topic>,
        flashcards_by_topic: HashMap<String, Vec<Flashcard>>,
    ) -> StorageResult<()> {
        let Some(user) = &self.user else {
            return Ok(());
        };

        let storage = self.storage.as_ref();
        set_json(
            storage,
            &user_key(&user.user_id, FLASHCARDS_SUFFIX),
            &flashcards_by_topic,
        )
        .await?;
        set_json(storage, &user_key(&user.user_id, TOPICS_SUFFIX), &topics).await?;

        self.topics = topics;
        self.flashcards_by_topic = flashcards_by_topic;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStorage;
    use crate::database::testing::FlakyStorage;

    fn user(id: &str) -> User {
        User {
            user_id: id.to_string(),
            username: id.to_string(),
            email: format!("{}@example.com", id),
        }
    }

    fn cards(pairs: &[(&str, &str)]) -> Vec<Flashcard> {
        pairs.iter().map(|(t, d)| Flashcard::new(*t, *d)).collect()
    }

    async fn archive_for(id: &str) -> (TopicArchive, Arc<dyn Storage>) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let archive = TopicArchive::load(storage.clone(), Some(user(id)))
            .await
            .unwrap();
        (archive, storage)
    }

    #[tokio::test]
    async fn same_name_replaces_existing_topic() {
        let (mut archive, _) = archive_for("alice").await;
        let first = archive
            .add_topic("Rome", &cards(&[("Colosseum", "Amphitheatre")]))
            .await
            .unwrap()
            .unwrap();
        archive
            .add_topic("Paris", &cards(&[("Louvre", "Museum")]))
            .await
            .unwrap();
        let latest = cards(&[("Forum", "Plaza"), ("Tiber", "River")]);
        let second = archive.add_topic("rome", &latest).await.unwrap().unwrap();

        assert_ne!(first, second);
        let names: Vec<&str> = archive.topics().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["rome", "Paris"]);
        assert_eq!(archive.topics()[0].flashcard_count, 2);
        assert_eq!(archive.topic_flashcards(&second), latest);
        assert!(archive.topic_flashcards(&first).is_empty());
    }

    #[tokio::test]
    async fn rome_twice_keeps_one_entry_first() {
        let (mut archive, _) = archive_for("alice").await;
        archive.add_topic("Rome", &cards(&[("A", "1")])).await.unwrap();
        archive.add_topic("Rome", &cards(&[("B", "2")])).await.unwrap();

        let romes: Vec<&Topic> = archive
            .topics()
            .iter()
            .filter(|t| t.name == "Rome")
            .collect();
        assert_eq!(romes.len(), 1);
        assert_eq!(archive.topics()[0].name, "Rome");
        assert_eq!(
            archive.topic_flashcards(&romes[0].id),
            cards(&[("B", "2")])
        );
    }

    #[tokio::test]
    async fn rapid_saves_get_distinct_ids() {
        let (mut archive, _) = archive_for("alice").await;
        let a = archive.add_topic("One", &[]).await.unwrap().unwrap();
        let b = archive.add_topic("Two", &[]).await.unwrap().unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn blank_name_or_no_user_is_ignored() {
        let (mut archive, _) = archive_for("alice").await;
        assert_eq!(archive.add_topic("   ", &[]).await.unwrap(), None);

        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut anonymous = TopicArchive::load(storage, None).await.unwrap();
        assert_eq!(anonymous.add_topic("Rome", &[]).await.unwrap(), None);
        assert!(!anonymous.has_topics());
        assert_eq!(anonymous.user_stats(), UserStats::default());
    }

    #[tokio::test]
    async fn delete_removes_topic_and_cards() {
        let (mut archive, _) = archive_for("alice").await;
        let id = archive
            .add_topic("Rome", &cards(&[("A", "1")]))
            .await
            .unwrap()
            .unwrap();
        archive.delete_topic(&id).await.unwrap();
        archive.delete_topic("missing").await.unwrap();

        assert!(!archive.has_topics());
        assert!(archive.topic_flashcards(&id).is_empty());
        assert_eq!(archive.user_stats().total_flashcards, 0);
    }

    #[tokio::test]
    async fn topics_are_namespaced_per_user() {
        let (mut archive, storage) = archive_for("alice").await;
        archive
            .add_topic("Rome", &cards(&[("A", "1")]))
            .await
            .unwrap();

        archive.set_user(Some(user("bob"))).await.unwrap();
        assert!(!archive.has_topics());
        archive
            .add_topic("Paris", &cards(&[("B", "2"), ("C", "3")]))
            .await
            .unwrap();

        archive.set_user(Some(user("alice"))).await.unwrap();
        assert_eq!(archive.topics()[0].name, "Rome");
        assert_eq!(archive.topics().len(), 1);

        assert!(storage.get("user_alice_topics").await.unwrap().is_some());
        assert!(storage.get("user_bob_flashcards").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stats_and_reload() {
        let (mut archive, storage) = archive_for("alice").await;
        archive
            .add_topic("Rome", &cards(&[("A", "1"), ("B", "2")]))
            .await
            .unwrap();
        archive
            .add_topic("Paris", &cards(&[("C", "3")]))
            .await
            .unwrap();

        let reloaded = TopicArchive::load(storage, Some(user("alice")))
            .await
            .unwrap();
        assert_eq!(
            reloaded.user_stats(),
            UserStats {
                topics_explored: 2,
                total_flashcards: 3,
            }
        );
        assert_eq!(reloaded.topics()[0].name, "Paris");
    }

    #[tokio::test]
    async fn failed_write_leaves_archive_unchanged() {
        let flaky = Arc::new(FlakyStorage::new());
        let storage: Arc<dyn Storage> = flaky.clone();
        let mut archive = TopicArchive::load(storage.clone(), Some(user("alice")))
            .await
            .unwrap();
        let id = archive
            .add_topic("Rome", &cards(&[("A", "1")]))
            .await
            .unwrap()
            .unwrap();

        flaky.fail_writes(true);
        assert!(archive.add_topic("Paris", &cards(&[("B", "2")])).await.is_err());
        assert!(archive.add_topic("rome", &cards(&[("C", "3")])).await.is_err());
        assert!(archive.delete_topic(&id).await.is_err());

        let names: Vec<&str> = archive.topics().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Rome"]);
        assert_eq!(archive.topic_flashcards(&id), cards(&[("A", "1")]));
        assert_eq!(archive.user_stats().total_flashcards, 1);

        flaky.fail_writes(false);
        archive.delete_topic(&id).await.unwrap();
        let reloaded = TopicArchive::load(storage, Some(user("alice")))
            .await
            .unwrap();
        assert!(!reloaded.has_topics());
    }
}
