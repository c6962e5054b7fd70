//! Photo persistence
//!
//! The card's photos live in a key-value store keyed by slot. The renderer
//! only ever sees a [`PhotoMap`] snapshot taken with [`PhotoStore::get_all`].

pub mod connection;
pub mod memory;
pub mod schema;
pub mod store;

use async_trait::async_trait;

use crate::card::{ImageRef, PhotoMap, SlotIndex};

pub use connection::{create_db_pool, create_in_memory_pool, DbPool};
pub use memory::MemoryPhotoStore;
pub use store::SqlitePhotoStore;

const CARD_ID_KEY: &str = "card_id";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn get(&self, slot: SlotIndex) -> StoreResult<Option<ImageRef>>;

    async fn get_all(&self) -> StoreResult<PhotoMap>;

    /// Inserts or replaces the photo in `slot`.
    async fn put(&self, slot: SlotIndex, image: ImageRef) -> StoreResult<()>;

    /// Returns whether a photo was removed.
    async fn delete(&self, slot: SlotIndex) -> StoreResult<bool>;

    async fn clear(&self) -> StoreResult<()>;

    async fn get_meta(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set_meta(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Stores `value` unless `key` already has one; returns the stored value.
    async fn get_or_insert_meta(&self, key: &str, value: &str) -> StoreResult<String>;
}

/// Stable random identifier of this card, created on first use.
pub async fn card_id(store: &dyn PhotoStore) -> StoreResult<String> {
    if let Some(id) = store.get_meta(CARD_ID_KEY).await? {
        return Ok(id);
    }
    let candidate = format!("{:032x}", rand::random::<u128>());
    store.get_or_insert_meta(CARD_ID_KEY, &candidate).await
}
