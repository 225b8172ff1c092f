use std::sync::Arc;

use crate::database::{API_KEY_KEY, DARK_MODE_KEY, Storage, get_json, set_json};
use crate::error::StorageResult;

// Saved API credential shared by every user of this store
pub struct ApiKeyStore {
    storage: Arc<dyn Storage>,
}

impl ApiKeyStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        ApiKeyStore { storage }
    }

    pub async fn stored(&self) -> StorageResult<Option<String>> {
        self.storage.get(API_KEY_KEY).await
    }

    // Blank input forgets the saved key
    pub async fn save(&self, api_key: &str) -> StorageResult<()> {
        let trimmed = api_key.trim();
        if trimmed.is_empty() {
            self.storage.remove(API_KEY_KEY).await
        } else {
            self.storage.set(API_KEY_KEY, trimmed).await
        }
    }

    // Typed-in key, else the saved one, else empty
    pub async fn resolve(&self, input: &str) -> StorageResult<String> {
        let trimmed = input.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
        Ok(self.stored().await?.unwrap_or_default())
    }

    pub async fn has_key(&self, input: &str) -> StorageResult<bool> {
        Ok(!self.resolve(input).await?.is_empty())
    }
}

// Hidden rendering of a key, keeping the last four characters visible
pub fn mask(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    if chars.len() <= 4 {
        return "•".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "•".repeat(chars.len() - 4), visible)
}

pub struct ThemePreference {
    storage: Arc<dyn Storage>,
}

impl ThemePreference {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        ThemePreference { storage }
    }

    // Light unless a preference was saved
    pub async fn is_dark(&self) -> StorageResult<bool> {
        Ok(get_json::<bool>(self.storage.as_ref(), DARK_MODE_KEY)
            .await?
            .unwrap_or(false))
    }

    pub async fn set_dark(&self, dark: bool) -> StorageResult<()> {
        set_json(self.storage.as_ref(), DARK_MODE_KEY, &dark).await
    }

    pub async fn toggle(&self) -> StorageResult<bool> {
        let dark = !self.is_dark().await?;
        self.set_dark(dark).await?;
        Ok(dark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStorage;

    fn storage() -> Arc<dyn Storage> {
        Arc::new(MemoryStorage::new())
    }

    #[tokio::test]
    async fn saves_trimmed_key() {
        let store = ApiKeyStore::new(storage());
        store.save("  abc123  ").await.unwrap();
        assert_eq!(store.stored().await.unwrap().as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn blank_save_removes_key() {
        let store = ApiKeyStore::new(storage());
        store.save("abc123").await.unwrap();
        store.save("   ").await.unwrap();
        assert_eq!(store.stored().await.unwrap(), None);
        assert!(!store.has_key("").await.unwrap());
    }

    #[tokio::test]
    async fn typed_key_wins_over_saved_key() {
        let store = ApiKeyStore::new(storage());
        store.save("saved").await.unwrap();
        assert_eq!(store.resolve(" typed ").await.unwrap(), "typed");
        assert_eq!(store.resolve("  ").await.unwrap(), "saved");
    }

    #[test]
    fn mask_hides_all_but_tail() {
        assert_eq!(mask("abcdefgh"), "••••efgh");
        assert_eq!(mask("abc"), "•••");
        assert_eq!(mask(""), "");
    }

    #[tokio::test]
    async fn theme_defaults_light_and_toggles() {
        let shared = storage();
        let theme = ThemePreference::new(shared.clone());
        assert!(!theme.is_dark().await.unwrap());
        assert!(theme.toggle().await.unwrap());
        assert_eq!(
            shared.get(DARK_MODE_KEY).await.unwrap().as_deref(),
            Some("true")
        );
        assert!(!theme.toggle().await.unwrap());
    }
}
