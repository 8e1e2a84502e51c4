//! Template and deck persistence used by the processors.
//!
//! Versions are inserted with whatever id they carry: processors create
//! them with generated ids, tests seed well-known ones.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use super::models::{Deck, DeckVersion, Template, TemplateVersion};

#[derive(Debug, Error)]
pub enum PresentationStoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn insert(&self, template: Template) -> Result<Template, PresentationStoreError>;
    async fn get(&self, tenant_id: &str, id: &str)
        -> Result<Option<Template>, PresentationStoreError>;

    /// Advance the template's current-version pointer.
    async fn set_current_version(
        &self,
        tenant_id: &str,
        template_id: &str,
        version_id: &str,
    ) -> Result<(), PresentationStoreError>;

    async fn insert_version(
        &self,
        version: TemplateVersion,
    ) -> Result<TemplateVersion, PresentationStoreError>;

    async fn get_version(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<TemplateVersion>, PresentationStoreError>;

    /// Highest version number recorded for a template; zero when none.
    async fn latest_version_number(
        &self,
        tenant_id: &str,
        template_id: &str,
    ) -> Result<i32, PresentationStoreError>;
}

#[async_trait]
pub trait DeckStore: Send + Sync {
    async fn insert(&self, deck: Deck) -> Result<Deck, PresentationStoreError>;
    async fn get(&self, tenant_id: &str, id: &str) -> Result<Option<Deck>, PresentationStoreError>;

    async fn set_current_version(
        &self,
        tenant_id: &str,
        deck_id: &str,
        version_id: &str,
    ) -> Result<(), PresentationStoreError>;

    async fn insert_version(
        &self,
        version: DeckVersion,
    ) -> Result<DeckVersion, PresentationStoreError>;

    async fn get_version(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<DeckVersion>, PresentationStoreError>;

    async fn latest_version_number(
        &self,
        tenant_id: &str,
        deck_id: &str,
    ) -> Result<i32, PresentationStoreError>;
}

// ============================================================================
// In-memory implementations
// ============================================================================

#[derive(Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<HashMap<String, Template>>,
    versions: RwLock<HashMap<String, TemplateVersion>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> PresentationStoreError {
    PresentationStoreError::Storage("presentation store lock poisoned".to_string())
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn insert(&self, template: Template) -> Result<Template, PresentationStoreError> {
        let mut templates = self.templates.write().map_err(poisoned)?;
        templates.insert(template.id.clone(), template.clone());
        Ok(template)
    }

    async fn get(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Template>, PresentationStoreError> {
        let templates = self.templates.read().map_err(poisoned)?;
        Ok(templates
            .get(id)
            .filter(|t| t.tenant_id == tenant_id)
            .cloned())
    }

    async fn set_current_version(
        &self,
        tenant_id: &str,
        template_id: &str,
        version_id: &str,
    ) -> Result<(), PresentationStoreError> {
        let mut templates = self.templates.write().map_err(poisoned)?;
        let template = templates
            .get_mut(template_id)
            .filter(|t| t.tenant_id == tenant_id)
            .ok_or_else(|| PresentationStoreError::NotFound(template_id.to_string()))?;
        template.current_version_id = Some(version_id.to_string());
        Ok(())
    }

    async fn insert_version(
        &self,
        version: TemplateVersion,
    ) -> Result<TemplateVersion, PresentationStoreError> {
        let mut versions = self.versions.write().map_err(poisoned)?;
        versions.insert(version.id.clone(), version.clone());
        Ok(version)
    }

    async fn get_version(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<TemplateVersion>, PresentationStoreError> {
        let versions = self.versions.read().map_err(poisoned)?;
        Ok(versions
            .get(id)
            .filter(|v| v.tenant_id == tenant_id)
            .cloned())
    }

    async fn latest_version_number(
        &self,
        tenant_id: &str,
        template_id: &str,
    ) -> Result<i32, PresentationStoreError> {
        let versions = self.versions.read().map_err(poisoned)?;
        Ok(versions
            .values()
            .filter(|v| v.tenant_id == tenant_id && v.template_id == template_id)
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0))
    }
}

#[derive(Default)]
pub struct InMemoryDeckStore {
    decks: RwLock<HashMap<String, Deck>>,
    versions: RwLock<HashMap<String, DeckVersion>>,
}

impl InMemoryDeckStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeckStore for InMemoryDeckStore {
    async fn insert(&self, deck: Deck) -> Result<Deck, PresentationStoreError> {
        let mut decks = self.decks.write().map_err(poisoned)?;
        decks.insert(deck.id.clone(), deck.clone());
        Ok(deck)
    }

    async fn get(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<Deck>, PresentationStoreError> {
        let decks = self.decks.read().map_err(poisoned)?;
        Ok(decks.get(id).filter(|d| d.tenant_id == tenant_id).cloned())
    }

    async fn set_current_version(
        &self,
        tenant_id: &str,
        deck_id: &str,
        version_id: &str,
    ) -> Result<(), PresentationStoreError> {
        let mut decks = self.decks.write().map_err(poisoned)?;
        let deck = decks
            .get_mut(deck_id)
            .filter(|d| d.tenant_id == tenant_id)
            .ok_or_else(|| PresentationStoreError::NotFound(deck_id.to_string()))?;
        deck.current_version_id = Some(version_id.to_string());
        Ok(())
    }

    async fn insert_version(
        &self,
        version: DeckVersion,
    ) -> Result<DeckVersion, PresentationStoreError> {
        let mut versions = self.versions.write().map_err(poisoned)?;
        versions.insert(version.id.clone(), version.clone());
        Ok(version)
    }

    async fn get_version(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<DeckVersion>, PresentationStoreError> {
        let versions = self.versions.read().map_err(poisoned)?;
        Ok(versions
            .get(id)
            .filter(|v| v.tenant_id == tenant_id)
            .cloned())
    }

    async fn latest_version_number(
        &self,
        tenant_id: &str,
        deck_id: &str,
    ) -> Result<i32, PresentationStoreError> {
        let versions = self.versions.read().map_err(poisoned)?;
        Ok(versions
            .values()
            .filter(|v| v.tenant_id == tenant_id && v.deck_id == deck_id)
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn template_version_lookup_is_tenant_scoped() {
        let store = InMemoryTemplateStore::new();
        let version =
            TemplateVersion::new("acme", "tpl-1", 1, json!({"layouts": []}), "user-1");
        let id = version.id.clone();
        store.insert_version(version).await.unwrap();

        assert!(store.get_version("acme", &id).await.unwrap().is_some());
        assert!(store.get_version("globex", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn current_version_pointer_advances() {
        let store = InMemoryTemplateStore::new();
        let template = store.insert(Template::new("acme", "Pitch")).await.unwrap();
        assert!(template.current_version_id.is_none());

        store
            .set_current_version("acme", &template.id, "tv-9")
            .await
            .unwrap();
        let read = store.get("acme", &template.id).await.unwrap().unwrap();
        assert_eq!(read.current_version_id.as_deref(), Some("tv-9"));
    }

    #[tokio::test]
    async fn latest_version_number_counts_per_parent() {
        let store = InMemoryDeckStore::new();
        assert_eq!(store.latest_version_number("acme", "d1").await.unwrap(), 0);

        store
            .insert_version(DeckVersion::new("acme", "d1", 1, json!({}), "u"))
            .await
            .unwrap();
        store
            .insert_version(DeckVersion::new("acme", "d1", 2, json!({}), "u"))
            .await
            .unwrap();
        store
            .insert_version(DeckVersion::new("acme", "d2", 7, json!({}), "u"))
            .await
            .unwrap();

        assert_eq!(store.latest_version_number("acme", "d1").await.unwrap(), 2);
    }
}
