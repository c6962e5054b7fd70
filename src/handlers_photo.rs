use bytes::Bytes;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use warp::{reject, Filter, Rejection, Reply};

use crate::card::{CardProgress, PhotoMap, PromptList, SlotIndex};
use crate::db::{self, StoreError};
use crate::export::CollageExporter;
use crate::photo_encoder::{self, SquareCropOptions};
use crate::warp_helpers::{
    with_exporter, with_store, ConflictError, DatabaseError, NotFoundError, SharedStore,
    ValidationError,
};

const CONFIRM_REMOVAL: &str = "Confirm removal with ?confirm=true";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    pub card_id: String,
    pub prompts: PromptList,
    pub filled_slots: Vec<SlotIndex>,
    #[serde(flatten)]
    pub progress: CardProgress,
}

/// Removals are destructive and must be confirmed explicitly.
#[derive(Debug, Default, Deserialize)]
pub struct RemoveQuery {
    pub confirm: Option<bool>,
}

impl RemoveQuery {
    fn require_confirmation(&self) -> Result<(), Rejection> {
        if self.confirm.unwrap_or(false) {
            Ok(())
        } else {
            Err(reject::custom(ConflictError {
                message: CONFIRM_REMOVAL.to_string(),
            }))
        }
    }
}

fn parse_slot(slot: &str) -> Result<SlotIndex, Rejection> {
    slot.parse::<SlotIndex>().map_err(|e| {
        reject::custom(ValidationError {
            message: e.to_string(),
        })
    })
}

fn database_rejection(e: StoreError) -> Rejection {
    log::error!("Database error: {}", e);
    reject::custom(DatabaseError {
        message: format!("Database error: {}", e),
    })
}

pub async fn card_summary(
    store: &dyn db::PhotoStore,
    prompts: &PromptList,
) -> Result<CardResponse, StoreError> {
    let card_id = db::card_id(store).await?;
    let photos = store.get_all().await?;

    Ok(CardResponse {
        card_id,
        prompts: prompts.clone(),
        filled_slots: photos.slots().collect(),
        progress: photos.progress(),
    })
}

pub async fn get_card(
    store: SharedStore,
    exporter: Arc<CollageExporter>,
) -> Result<impl Reply, Rejection> {
    card_summary(store.as_ref(), exporter.prompts())
        .await
        .map(|card| warp::reply::json(&card))
        .map_err(database_rejection)
}

pub async fn list_photos(store: SharedStore) -> Result<impl Reply, Rejection> {
    let photos: PhotoMap = store.get_all().await.map_err(database_rejection)?;
    Ok(warp::reply::json(&photos))
}

pub async fn get_photo(slot: String, store: SharedStore) -> Result<impl Reply, Rejection> {
    let slot = parse_slot(&slot)?;
    match store.get(slot).await {
        Ok(Some(image)) => Ok(warp::reply::json(&json!({
            "slot": slot,
            "image": image,
        }))),
        Ok(None) => Err(reject::custom(NotFoundError)),
        Err(e) => Err(database_rejection(e)),
    }
}

/// Crops the uploaded bytes to a square and stores them in `slot`,
/// replacing any previous photo.
pub async fn upload_photo(
    slot: String,
    body: Bytes,
    store: SharedStore,
    crop: SquareCropOptions,
) -> Result<impl Reply, Rejection> {
    let slot = parse_slot(&slot)?;

    let encoded =
        tokio::task::spawn_blocking(move || photo_encoder::square_data_url(&body, crop))
            .await
            .map_err(|e| {
                log::error!("Photo encoding task failed: {}", e);
                reject::custom(DatabaseError {
                    message: "Photo processing failed".to_string(),
                })
            })?;

    let image = match encoded {
        Ok(image) => image,
        Err(e) => {
            log::warn!("Rejected upload for slot {}: {}", slot, e);
            return Err(reject::custom(ValidationError {
                message: e.to_string(),
            }));
        }
    };

    store.put(slot, image).await.map_err(database_rejection)?;
    info!("Photo stored in slot {}", slot);

    let photos = store.get_all().await.map_err(database_rejection)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({
            "slot": slot,
            "progress": photos.progress(),
        })),
        warp::http::StatusCode::CREATED,
    ))
}

pub async fn delete_photo(
    slot: String,
    query: RemoveQuery,
    store: SharedStore,
) -> Result<impl Reply, Rejection> {
    let slot = parse_slot(&slot)?;
    query.require_confirmation()?;
    match store.delete(slot).await {
        Ok(true) => {
            info!("Photo removed from slot {}", slot);
            Ok(warp::reply::json(&json!({
                "success": true,
                "slot": slot,
            })))
        }
        Ok(false) => Err(reject::custom(NotFoundError)),
        Err(e) => Err(database_rejection(e)),
    }
}

pub async fn clear_photos(query: RemoveQuery, store: SharedStore) -> Result<impl Reply, Rejection> {
    query.require_confirmation()?;
    store.clear().await.map_err(database_rejection)?;
    info!("All photos cleared");
    Ok(warp::reply::json(&json!({ "success": true })))
}

pub fn build_photo_routes(
    store: SharedStore,
    exporter: Arc<CollageExporter>,
    crop: SquareCropOptions,
    max_upload_bytes: u64,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let card = warp::path!("api" / "card")
        .and(warp::get())
        .and(with_store(store.clone()))
        .and(with_exporter(exporter))
        .and_then(get_card);

    let list = warp::path!("api" / "photos")
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(list_photos);

    let clear = warp::path!("api" / "photos")
        .and(warp::delete())
        .and(warp::query::<RemoveQuery>())
        .and(with_store(store.clone()))
        .and_then(clear_photos);

    let get = warp::path!("api" / "photos" / String)
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(get_photo);

    let upload = warp::path!("api" / "photos" / String)
        .and(warp::put())
        .and(warp::body::content_length_limit(max_upload_bytes))
        .and(warp::body::bytes())
        .and(with_store(store.clone()))
        .and(warp::any().map(move || crop))
        .and_then(upload_photo);

    let delete = warp::path!("api" / "photos" / String)
        .and(warp::delete())
        .and(warp::query::<RemoveQuery>())
        .and(with_store(store))
        .and_then(delete_photo);

    card.or(list).or(clear).or(get).or(upload).or(delete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::ImageRef;
    use crate::db::{MemoryPhotoStore, PhotoStore};

    #[tokio::test]
    async fn test_card_summary() {
        let store = MemoryPhotoStore::new();
        for i in [0, 3, 8] {
            store
                .put(
                    SlotIndex::new(i).unwrap(),
                    ImageRef::parse("photo.png").unwrap(),
                )
                .await
                .unwrap();
        }

        let card = card_summary(&store, &PromptList::default()).await.unwrap();
        assert_eq!(card.card_id.len(), 32);
        assert_eq!(card.progress.filled, 3);
        assert_eq!(card.progress.remaining, 5);
        assert!(!card.progress.complete);

        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["filledSlots"], json!([0, 3, 8]));
        assert_eq!(value["remaining"], json!(5));
    }

    #[test]
    fn test_parse_slot_rejects_logo_cell() {
        assert!(parse_slot("0").is_ok());
        assert!(parse_slot("4").is_err());
        assert!(parse_slot("9").is_err());
        assert!(parse_slot("x").is_err());
    }

    #[tokio::test]
    async fn test_removal_requires_confirmation() {
        let store: SharedStore = Arc::new(MemoryPhotoStore::new());
        let slot = SlotIndex::new(2).unwrap();
        store
            .put(slot, ImageRef::parse("photo.png").unwrap())
            .await
            .unwrap();

        let unconfirmed = delete_photo("2".to_string(), RemoveQuery::default(), store.clone()).await;
        assert!(unconfirmed.is_err());
        assert!(clear_photos(RemoveQuery::default(), store.clone()).await.is_err());
        assert_eq!(store.get_all().await.unwrap().len(), 1);

        let confirmed = RemoveQuery {
            confirm: Some(true),
        };
        assert!(delete_photo("2".to_string(), confirmed, store.clone()).await.is_ok());
        assert!(store.get(slot).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upload_rejects_garbage() {
        let store: SharedStore = Arc::new(MemoryPhotoStore::new());
        let result = upload_photo(
            "1".to_string(),
            Bytes::from_static(b"not an image"),
            store.clone(),
            SquareCropOptions::default(),
        )
        .await;
        assert!(result.is_err());
        assert!(store.get_all().await.unwrap().is_empty());
    }
}
