//! Document store abstraction and the repository-backed implementation.
//!
//! The [`DocumentStore`] trait is what the HTTP layer talks to. Two
//! backends implement it:
//!
//! - [`RemoteDocumentStore`] reads and commits through a [`GitDataApi`].
//!   Holds no state between calls: every operation re-reads the collection
//!   from the branch head before changing it.
//! - [`MirrorStore`](crate::mirror::MirrorStore) is the local development
//!   variant over two directories.
//!
//! Every mutation writes both files of the mirrored pair (public and
//! canonical) with identical content in one commit.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::commit::commit_files;
use crate::config::LayoutConfig;
use crate::documents;
use crate::error::StoreError;
use crate::models::{Collection, Document, FileChange};
use crate::remote::GitDataApi;

/// Collection and settings operations, independent of where data lives.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_collection`](DocumentStore::list_collection) | All documents of a collection |
/// | [`get_document`](DocumentStore::get_document) | One document by id |
/// | [`append_document`](DocumentStore::append_document) | Add with a generated id |
/// | [`replace_document`](DocumentStore::replace_document) | Full replace, id preserved |
/// | [`remove_document`](DocumentStore::remove_document) | Delete by id |
/// | [`get_settings`](DocumentStore::get_settings) | Read the settings object |
/// | [`update_settings`](DocumentStore::update_settings) | Replace the settings object |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_collection(&self, collection: Collection) -> Result<Vec<Document>, StoreError>;

    /// Fails with [`StoreError::NotFound`] when no document has `id`.
    async fn get_document(&self, collection: Collection, id: &str)
        -> Result<Document, StoreError>;

    /// Stores `body` under the next free id and returns it with that id.
    async fn append_document(
        &self,
        collection: Collection,
        body: Document,
    ) -> Result<Document, StoreError>;

    /// Replaces the document with `id`; any `id` in `body` is ignored.
    async fn replace_document(
        &self,
        collection: Collection,
        id: &str,
        body: Document,
    ) -> Result<Document, StoreError>;

    async fn remove_document(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    async fn get_settings(&self) -> Result<Document, StoreError>;

    async fn update_settings(&self, body: Document) -> Result<Document, StoreError>;
}

/// Document store persisted as files on a branch of a hosted repository.
pub struct RemoteDocumentStore {
    api: Arc<dyn GitDataApi>,
    layout: LayoutConfig,
}

impl RemoteDocumentStore {
    pub fn new(api: Arc<dyn GitDataApi>, layout: LayoutConfig) -> Self {
        Self { api, layout }
    }

    async fn read_items(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let path = self.layout.public_path(collection);
        let file = self.api.read_file(&path).await?;
        documents::into_items(file.content, &path)
    }

    /// Commits `items` to both paths of the collection's mirrored pair.
    async fn commit_items(
        &self,
        collection: Collection,
        items: Vec<Document>,
        message: &str,
    ) -> Result<(), StoreError> {
        let content = Document::Array(items);
        let files = [
            FileChange::new(self.layout.public_path(collection), content.clone()),
            FileChange::new(self.layout.canonical_path(collection), content),
        ];
        commit_files(self.api.as_ref(), &files, message).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RemoteDocumentStore {
    async fn list_collection(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        self.read_items(collection).await
    }

    async fn get_document(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Document, StoreError> {
        let items = self.read_items(collection).await?;
        documents::find(&items, id)
            .cloned()
            .ok_or_else(StoreError::item_not_found)
    }

    async fn append_document(
        &self,
        collection: Collection,
        body: Document,
    ) -> Result<Document, StoreError> {
        let mut items = self.read_items(collection).await?;
        let doc = documents::append(&mut items, body)?;
        let message = format!("Add new {} via admin panel", collection.singular());
        self.commit_items(collection, items, &message).await?;
        info!(target: "docstore::store", "{}: added id {}", collection, doc["id"]);
        Ok(doc)
    }

    async fn replace_document(
        &self,
        collection: Collection,
        id: &str,
        body: Document,
    ) -> Result<Document, StoreError> {
        let mut items = self.read_items(collection).await?;
        let doc = documents::replace(&mut items, id, body)?;
        let message = format!("Update {}/{} via admin panel", collection, id);
        self.commit_items(collection, items, &message).await?;
        Ok(doc)
    }

    async fn remove_document(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut items = self.read_items(collection).await?;
        documents::remove(&mut items, id)?;
        let message = format!("Delete {}/{} via admin panel", collection, id);
        self.commit_items(collection, items, &message).await
    }

    async fn get_settings(&self) -> Result<Document, StoreError> {
        let file = self
            .api
            .read_file(&self.layout.public_settings_path())
            .await?;
        Ok(file.content)
    }

    async fn update_settings(&self, body: Document) -> Result<Document, StoreError> {
        let settings = documents::settings_body(body)?;
        let files = [
            FileChange::new(self.layout.public_settings_path(), settings.clone()),
            FileChange::new(self.layout.canonical_settings_path(), settings.clone()),
        ];
        commit_files(self.api.as_ref(), &files, "Update settings via admin panel").await?;
        Ok(settings)
    }
}
