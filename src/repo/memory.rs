use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Collection, Record, RepoError, RepoResult};

/// Process-local collection. Contents are lost on restart.
pub struct MemoryCollection<T> {
    docs: RwLock<HashMap<Uuid, T>>,
}

impl<T> MemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> Collection<T> for MemoryCollection<T> {
    async fn list(&self) -> RepoResult<Vec<T>> {
        let mut docs: Vec<T> = self.docs.read().await.values().cloned().collect();
        docs.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then(a.id().cmp(&b.id())));
        Ok(docs)
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<T>> {
        Ok(self.docs.read().await.get(&id).cloned())
    }

    async fn insert(&self, doc: &T) -> RepoResult<()> {
        let mut docs = self.docs.write().await;
        if docs.contains_key(&doc.id()) {
            return Err(RepoError::Duplicate {
                collection: T::COLLECTION,
                id: doc.id(),
            });
        }
        docs.insert(doc.id(), doc.clone());
        Ok(())
    }

    async fn update(&self, doc: &T) -> RepoResult<()> {
        let mut docs = self.docs.write().await;
        match docs.get_mut(&doc.id()) {
            Some(slot) => {
                *slot = doc.clone();
                Ok(())
            }
            None => Err(RepoError::NotFound {
                collection: T::COLLECTION,
                id: doc.id(),
            }),
        }
    }

    async fn put(&self, doc: &T) -> RepoResult<()> {
        self.docs.write().await.insert(doc.id(), doc.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.docs.write().await.remove(&id).is_some())
    }
}
