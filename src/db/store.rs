use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};

use super::connection::DbPool;
use super::{PhotoStore, StoreResult};
use crate::card::{ImageRef, PhotoMap, SlotIndex};

/// SQLite-backed photo store.
#[derive(Debug, Clone)]
pub struct SqlitePhotoStore {
    pool: DbPool,
}

impl SqlitePhotoStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl PhotoStore for SqlitePhotoStore {
    async fn get(&self, slot: SlotIndex) -> StoreResult<Option<ImageRef>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT image_ref FROM photos WHERE slot = ?")
            .bind(slot.get() as i64)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|(value,)| ImageRef::parse(&value)))
    }

    async fn get_all(&self) -> StoreResult<PhotoMap> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT slot, image_ref FROM photos ORDER BY slot")
                .fetch_all(&self.pool)
                .await?;

        let mut photos = PhotoMap::new();
        for (slot, value) in rows {
            let slot = match SlotIndex::try_from(slot) {
                Ok(slot) => slot,
                Err(e) => {
                    warn!("Skipping stored photo with invalid slot {}: {}", slot, e);
                    continue;
                }
            };
            match ImageRef::parse(&value) {
                Some(image) => {
                    photos.insert(slot, image);
                }
                None => warn!("Skipping empty image reference in slot {}", slot),
            }
        }

        Ok(photos)
    }

    async fn put(&self, slot: SlotIndex, image: ImageRef) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO photos (slot, image_ref, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(slot) DO UPDATE SET
                image_ref = excluded.image_ref,
                updated_at = excluded.updated_at",
        )
        .bind(slot.get() as i64)
        .bind(image.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Stored photo in slot {}", slot);
        Ok(())
    }

    async fn delete(&self, slot: SlotIndex) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM photos WHERE slot = ?")
            .bind(slot.get() as i64)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM photos")
            .execute(&self.pool)
            .await?;
        debug!("Cleared {} photos", result.rows_affected());
        Ok(())
    }

    async fn get_meta(&self, key: &str) -> StoreResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM meta WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set_meta(&self, key: &str, value: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_or_insert_meta(&self, key: &str, value: &str) -> StoreResult<String> {
        sqlx::query("INSERT OR IGNORE INTO meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        let (stored,): (String,) = sqlx::query_as("SELECT value FROM meta WHERE key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_in_memory_pool;

    async fn store() -> SqlitePhotoStore {
        SqlitePhotoStore::new(create_in_memory_pool().await.unwrap())
    }

    fn slot(i: usize) -> SlotIndex {
        SlotIndex::new(i).unwrap()
    }

    #[tokio::test]
    async fn test_put_get_replace() {
        let store = store().await;
        assert_eq!(store.get(slot(0)).await.unwrap(), None);

        store
            .put(slot(0), ImageRef::parse("first.png").unwrap())
            .await
            .unwrap();
        store
            .put(slot(0), ImageRef::parse("second.png").unwrap())
            .await
            .unwrap();

        assert_eq!(
            store.get(slot(0)).await.unwrap(),
            ImageRef::parse("second.png")
        );
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let store = store().await;
        for i in [1, 2, 8] {
            store
                .put(slot(i), ImageRef::parse(&format!("{}.png", i)).unwrap())
                .await
                .unwrap();
        }

        assert!(store.delete(slot(2)).await.unwrap());
        assert!(!store.delete(slot(2)).await.unwrap());
        let photos = store.get_all().await.unwrap();
        let slots: Vec<usize> = photos.slots().map(SlotIndex::get).collect();
        assert_eq!(slots, vec![1, 8]);

        store.clear().await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schema_rejects_logo_slot() {
        let store = store().await;
        let result = sqlx::query("INSERT INTO photos (slot, image_ref) VALUES (4, 'x.png')")
            .execute(store.pool())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_meta() {
        let store = store().await;
        assert_eq!(store.get_meta("theme").await.unwrap(), None);
        store.set_meta("theme", "dark").await.unwrap();
        store.set_meta("theme", "light").await.unwrap();
        assert_eq!(store.get_meta("theme").await.unwrap().as_deref(), Some("light"));

        let first = store.get_or_insert_meta("card_id", "abc").await.unwrap();
        let second = store.get_or_insert_meta("card_id", "xyz").await.unwrap();
        assert_eq!(first, "abc");
        assert_eq!(second, "abc");
    }
}
