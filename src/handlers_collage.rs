use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::{reject, Filter, Rejection, Reply};

use crate::collage::RenderResult;
use crate::export::{
    Artifact, CollageExporter, ExportError, COLLAGE_FILE_NAME, EXPORT_FAILED_MESSAGE, SHARE_TITLE,
};
use crate::warp_helpers::{
    with_exporter, with_store, ConflictError, DatabaseError, RenderError, SharedStore,
};

#[derive(Debug, Default, Deserialize)]
pub struct CollageQuery {
    pub labels: Option<bool>,
}

/// What a client needs to hand the collage to a platform share sheet.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePayload {
    pub file_name: String,
    pub content_type: String,
    pub title: String,
    pub caption: String,
    pub data_url: String,
    pub sha256: String,
}

impl SharePayload {
    pub fn new(artifact: &Artifact, caption: &str, digest: String) -> Self {
        SharePayload {
            file_name: artifact.file_name.clone(),
            content_type: artifact.content_type.clone(),
            title: SHARE_TITLE.to_string(),
            caption: caption.to_string(),
            data_url: artifact.data_url(),
            sha256: digest,
        }
    }
}

fn export_rejection(e: ExportError) -> Rejection {
    match e {
        ExportError::Incomplete { .. } => reject::custom(ConflictError {
            message: e.to_string(),
        }),
        ExportError::Store(e) => {
            log::error!("Database error during export: {}", e);
            reject::custom(DatabaseError {
                message: format!("Database error: {}", e),
            })
        }
        other => {
            log::error!("Collage export failed: {}", other);
            reject::custom(RenderError {
                message: EXPORT_FAILED_MESSAGE.to_string(),
            })
        }
    }
}

async fn render(
    query: &CollageQuery,
    store: &SharedStore,
    exporter: &CollageExporter,
) -> Result<RenderResult, Rejection> {
    let options = exporter.options(query.labels);
    exporter
        .export(store.as_ref(), &options)
        .await
        .map_err(export_rejection)
}

pub async fn download_collage(
    query: CollageQuery,
    store: SharedStore,
    exporter: Arc<CollageExporter>,
) -> Result<impl Reply, Rejection> {
    let result = render(&query, &store, &exporter).await?;
    let etag = format!("\"{}\"", result.digest());
    let artifact = Artifact::collage(&result);

    let reply = warp::reply::with_header(artifact.bytes, "content-type", artifact.content_type);
    let reply = warp::reply::with_header(
        reply,
        "content-disposition",
        format!("attachment; filename=\"{}\"", COLLAGE_FILE_NAME),
    );
    let reply = warp::reply::with_header(reply, "etag", etag);
    let reply = warp::reply::with_header(reply, "cache-control", "no-store");

    Ok(reply)
}

pub async fn share_collage(
    query: CollageQuery,
    store: SharedStore,
    exporter: Arc<CollageExporter>,
) -> Result<impl Reply, Rejection> {
    let result = render(&query, &store, &exporter).await?;
    let payload = SharePayload::new(
        &Artifact::collage(&result),
        exporter.caption(),
        result.digest(),
    );
    Ok(warp::reply::json(&payload))
}

pub fn build_collage_routes(
    store: SharedStore,
    exporter: Arc<CollageExporter>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let download = warp::path!("api" / "collage")
        .and(warp::get())
        .and(warp::query::<CollageQuery>())
        .and(with_store(store.clone()))
        .and(with_exporter(exporter.clone()))
        .and_then(download_collage);

    let share = warp::path!("api" / "collage" / "share")
        .and(warp::get())
        .and(warp::query::<CollageQuery>())
        .and(with_store(store))
        .and(with_exporter(exporter))
        .and_then(share_collage);

    download.or(share)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{ImageRef, PromptList, SlotIndex};
    use crate::collage::{CollageRenderer, FontLibrary, RenderOptions};
    use crate::db::MemoryPhotoStore;
    use crate::export::ExportGate;

    fn exporter(require_complete: bool) -> Arc<CollageExporter> {
        let options = RenderOptions {
            size: 60,
            gap: 3,
            border: 3,
            ..RenderOptions::default()
        };
        Arc::new(
            CollageExporter::new(
                CollageRenderer::new(FontLibrary::bitmap_only()),
                PromptList::default(),
                None,
                options,
                ExportGate { require_complete },
            )
            .with_caption("caption"),
        )
    }

    #[tokio::test]
    async fn test_incomplete_card_is_refused() {
        let store: SharedStore = Arc::new(MemoryPhotoStore::new());
        let result = download_collage(CollageQuery::default(), store, exporter(true)).await;
        let rejection = result.err().unwrap();
        let conflict = rejection.find::<ConflictError>().unwrap();
        assert_eq!(conflict.message, "Complete 8 more to export");
    }

    #[tokio::test]
    async fn test_download_headers() {
        let store: SharedStore = Arc::new(MemoryPhotoStore::new());
        store
            .put(SlotIndex::new(0).unwrap(), ImageRef::parse("missing.png").unwrap())
            .await
            .unwrap();

        let response = download_collage(CollageQuery::default(), store, exporter(false))
            .await
            .unwrap()
            .into_response();
        assert!(response.status().is_success());

        let headers = response.headers();
        assert_eq!(headers["content-type"], "image/png");
        assert_eq!(
            headers["content-disposition"],
            "attachment; filename=\"bingo-collage.png\""
        );
        assert_eq!(headers["etag"].len(), 66);
    }

    #[tokio::test]
    async fn test_share_payload() {
        let store: SharedStore = Arc::new(MemoryPhotoStore::new());
        let exporter = exporter(false);
        let options = exporter.options(Some(true));
        let result = exporter.export(store.as_ref(), &options).await.unwrap();

        let payload = SharePayload::new(&Artifact::collage(&result), "caption", result.digest());
        assert_eq!(payload.file_name, "bingo-collage.png");
        assert_eq!(payload.title, "Photo Challenge Bingo");
        assert_eq!(payload.data_url, result.data_url());
    }
}
