//! Home-page hero content repository.

use boardquest_core::{MainContent, MainContentDraft};

use super::{RepositoryError, decode, encode};
use crate::backend::{Caller, Query, TableStore, tables::MAIN_CONTENT};

/// Repository for the single `main_content` row.
pub struct MainContentRepository<'a> {
    tables: &'a dyn TableStore,
}

impl<'a> MainContentRepository<'a> {
    #[must_use]
    pub const fn new(tables: &'a dyn TableStore) -> Self {
        Self { tables }
    }

    /// The current hero content, if any has been saved.
    ///
    /// If several rows exist the oldest one wins.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the query fails.
    pub async fn load(&self, caller: &Caller) -> Result<Option<MainContent>, RepositoryError> {
        let query = Query::new().order_by("created_at", true).limit(1);
        let rows = self.tables.select(caller, MAIN_CONTENT, &query).await?;
        rows.into_iter()
            .next()
            .map(|row| decode(MAIN_CONTENT, row))
            .transpose()
    }

    /// Insert or overwrite the hero content.
    ///
    /// A draft carrying the existing id updates that row in place.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the upsert is rejected.
    pub async fn save(
        &self,
        caller: &Caller,
        draft: &MainContentDraft,
    ) -> Result<MainContent, RepositoryError> {
        let row = self
            .tables
            .upsert(caller, MAIN_CONTENT, encode(MAIN_CONTENT, draft)?)
            .await?;
        let content: MainContent = decode(MAIN_CONTENT, row)?;
        tracing::info!(content_id = %content.id, "Main content saved");
        Ok(content)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[tokio::test]
    async fn test_load_empty() {
        let backend = MemoryBackend::new();
        let repo = MainContentRepository::new(&backend);
        assert!(repo.load(&Caller::Anonymous).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_overwrite_in_place() {
        let backend = MemoryBackend::new();
        let repo = MainContentRepository::new(&backend);
        let caller = Caller::Anonymous;

        let draft = MainContentDraft::parse("Play more", "Games for all", "Shop").unwrap();
        let first = repo.save(&caller, &draft).await.unwrap();

        let edit = MainContentDraft::parse("Play harder", "Games for all", "Shop")
            .unwrap()
            .for_existing(Some(first.id))
            .with_hero_image(Some("http://img/hero.png".to_string()));
        let second = repo.save(&caller, &edit).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.title, "Play harder");
        assert_eq!(backend.rows(MAIN_CONTENT).unwrap().len(), 1);

        let loaded = repo.load(&caller).await.unwrap().unwrap();
        assert_eq!(loaded.hero_image.as_deref(), Some("http://img/hero.png"));
    }
}
