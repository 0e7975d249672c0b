//! Local development store over two mirrored directories.
//!
//! Every collection and the settings file are loaded from the canonical
//! directory into memory when the store is opened. After each mutation the
//! whole working set is written back: every file, not only the one that
//! changed, into both the canonical and the public directory.
//!
//! Intended for one developer on one machine. A failed rewrite is logged and
//! the mutation still answers with its result; the in-memory working set
//! stays authoritative until the next successful write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::documents;
use crate::error::StoreError;
use crate::models::{parse_file_text, to_file_text, Collection, Document, SETTINGS_NAME};
use crate::store::DocumentStore;

struct WorkingSet {
    collections: HashMap<Collection, Vec<Document>>,
    settings: Document,
}

impl WorkingSet {
    fn items(&self, collection: Collection) -> &[Document] {
        self.collections
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn items_mut(&mut self, collection: Collection) -> &mut Vec<Document> {
        self.collections.entry(collection).or_default()
    }
}

/// Store backed by a canonical directory and a served copy of it.
pub struct MirrorStore {
    canonical_dir: PathBuf,
    public_dir: PathBuf,
    state: Mutex<WorkingSet>,
}

impl MirrorStore {
    /// Loads every collection and the settings from `canonical_dir`.
    ///
    /// Missing or malformed files are an error: the local variant never
    /// creates collections on the fly.
    pub fn open(canonical_dir: &Path, public_dir: &Path) -> Result<Self, StoreError> {
        let mut collections = HashMap::new();
        for collection in Collection::ALL {
            let path = canonical_dir.join(collection.file_name());
            let content = read_json(&path)?;
            let items = documents::into_items(content, &path.display().to_string())?;
            collections.insert(collection, items);
        }
        let settings = read_json(&canonical_dir.join(format!("{}.json", SETTINGS_NAME)))?;

        info!(
            target: "docstore::mirror",
            "loaded {} collections from {}",
            collections.len(),
            canonical_dir.display()
        );
        Ok(Self {
            canonical_dir: canonical_dir.to_path_buf(),
            public_dir: public_dir.to_path_buf(),
            state: Mutex::new(WorkingSet {
                collections,
                settings,
            }),
        })
    }

    /// Rewrites the full working set into both directories.
    async fn write_all(&self, state: &WorkingSet) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.canonical_dir).await?;
        tokio::fs::create_dir_all(&self.public_dir).await?;

        for collection in Collection::ALL {
            let content = Document::Array(state.items(collection).to_vec());
            self.write_pair(&collection.file_name(), &content).await?;
        }
        self.write_pair(&format!("{}.json", SETTINGS_NAME), &state.settings)
            .await
    }

    async fn write_pair(&self, file_name: &str, content: &Document) -> Result<(), StoreError> {
        let text = to_file_text(content)?;
        tokio::fs::write(self.canonical_dir.join(file_name), &text).await?;
        tokio::fs::write(self.public_dir.join(file_name), &text).await?;
        Ok(())
    }

    /// The lock stays held for the whole rewrite so two mutations never
    /// interleave their files.
    async fn persist(&self, state: &WorkingSet) {
        if let Err(e) = self.write_all(state).await {
            error!(target: "docstore::mirror", "Failed to write data files: {}", e);
        }
    }
}

fn read_json(path: &Path) -> Result<Document, StoreError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;
    parse_file_text(&text)
}

#[async_trait]
impl DocumentStore for MirrorStore {
    async fn list_collection(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        Ok(self.state.lock().await.items(collection).to_vec())
    }

    async fn get_document(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Document, StoreError> {
        let state = self.state.lock().await;
        documents::find(state.items(collection), id)
            .cloned()
            .ok_or_else(StoreError::item_not_found)
    }

    async fn append_document(
        &self,
        collection: Collection,
        body: Document,
    ) -> Result<Document, StoreError> {
        let mut state = self.state.lock().await;
        let doc = documents::append(state.items_mut(collection), body)?;
        self.persist(&state).await;
        Ok(doc)
    }

    async fn replace_document(
        &self,
        collection: Collection,
        id: &str,
        body: Document,
    ) -> Result<Document, StoreError> {
        let mut state = self.state.lock().await;
        let doc = documents::replace(state.items_mut(collection), id, body)?;
        self.persist(&state).await;
        Ok(doc)
    }

    async fn remove_document(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        documents::remove(state.items_mut(collection), id)?;
        self.persist(&state).await;
        Ok(())
    }

    async fn get_settings(&self) -> Result<Document, StoreError> {
        Ok(self.state.lock().await.settings.clone())
    }

    async fn update_settings(&self, body: Document) -> Result<Document, StoreError> {
        let settings = documents::settings_body(body)?;
        let mut state = self.state.lock().await;
        state.settings = settings.clone();
        self.persist(&state).await;
        Ok(settings)
    }
}
