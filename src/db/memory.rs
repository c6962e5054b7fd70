use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{PhotoStore, StoreResult};
use crate::card::{ImageRef, PhotoMap, SlotIndex};

#[derive(Debug, Default)]
struct MemoryState {
    photos: PhotoMap,
    meta: HashMap<String, String>,
}

/// Process-local photo store, used for tests and ephemeral cards.
#[derive(Debug, Clone, Default)]
pub struct MemoryPhotoStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| std::io::Error::other("Failed to acquire store lock").into())
    }
}

#[async_trait]
impl PhotoStore for MemoryPhotoStore {
    async fn get(&self, slot: SlotIndex) -> StoreResult<Option<ImageRef>> {
        Ok(self.lock()?.photos.get(slot).cloned())
    }

    async fn get_all(&self) -> StoreResult<PhotoMap> {
        Ok(self.lock()?.photos.clone())
    }

    async fn put(&self, slot: SlotIndex, image: ImageRef) -> StoreResult<()> {
        self.lock()?.photos.insert(slot, image);
        Ok(())
    }

    async fn delete(&self, slot: SlotIndex) -> StoreResult<bool> {
        Ok(self.lock()?.photos.remove(slot).is_some())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.lock()?.photos = PhotoMap::new();
        Ok(())
    }

    async fn get_meta(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.lock()?.meta.get(key).cloned())
    }

    async fn set_meta(&self, key: &str, value: &str) -> StoreResult<()> {
        self.lock()?.meta.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_or_insert_meta(&self, key: &str, value: &str) -> StoreResult<String> {
        Ok(self
            .lock()?
            .meta
            .entry(key.to_string())
            .or_insert_with(|| value.to_string())
            .clone())
    }
}
