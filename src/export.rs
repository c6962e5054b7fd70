//! Artifact consumer side of the collage pipeline: saving the rendered PNG
//! and handing it to a share target together with a caption.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{info, warn};

use crate::card::{CardProgress, ImageRef, PromptList};
use crate::collage::loader::encode_data_url;
use crate::collage::{
    CollageError, CollageRenderer, RenderOptions, RenderResult, PNG_CONTENT_TYPE,
};
use crate::db::{PhotoStore, StoreError};

pub const COLLAGE_FILE_NAME: &str = "bingo-collage.png";
pub const SHARE_TITLE: &str = "Photo Challenge Bingo";
pub const DEFAULT_CAPTION: &str = "Captured sustainability in action! Completed the SnapGrid challenge at #SUSTEX2025 🌍 Big thanks to @DOST and @TheSMStore 🙌";
pub const EXPORT_FAILED_MESSAGE: &str = "Export failed, try again";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Complete {remaining} more to export")]
    Incomplete { remaining: usize },
    #[error("Copy the caption first")]
    CaptionNotCopied,
    #[error("Copy failed: {0}")]
    CopyFailed(String),
    #[error("Sharing is not supported by this target")]
    ShareUnsupported,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Render failed: {0}")]
    Render(#[from] CollageError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// A finished, named file ready for download or sharing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn collage(result: &RenderResult) -> Self {
        Artifact {
            file_name: COLLAGE_FILE_NAME.to_string(),
            content_type: PNG_CONTENT_TYPE.to_string(),
            bytes: result.png.clone(),
        }
    }

    pub fn data_url(&self) -> String {
        encode_data_url(&self.content_type, &self.bytes)
    }
}

/// Writes the artifact into `dir` under its file name. The bytes go to a
/// temporary sibling first so a reader never observes a half-written PNG.
pub async fn save_to_dir(artifact: &Artifact, dir: &Path) -> Result<PathBuf, ExportError> {
    tokio::fs::create_dir_all(dir).await?;

    let target = dir.join(&artifact.file_name);
    let temp_path = target.with_extension("png.tmp");
    tokio::fs::write(&temp_path, &artifact.bytes).await?;

    if let Err(e) = tokio::fs::rename(&temp_path, &target).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    info!("Saved {} ({} bytes)", target.display(), artifact.bytes.len());
    Ok(target)
}

/// Receives the caption text before a share (the clipboard, in a browser).
#[async_trait]
pub trait CaptionSink: Send + Sync {
    async fn copy(&self, caption: &str) -> Result<(), ExportError>;
}

/// A platform share mechanism.
#[async_trait]
pub trait ShareTarget: Send + Sync {
    fn can_share(&self, artifact: &Artifact) -> bool;

    async fn share(&self, artifact: &Artifact, title: &str, caption: &str)
        -> Result<(), ExportError>;
}

/// Caption sink that writes the caption to a text file.
#[derive(Debug, Clone)]
pub struct FileCaptionSink {
    path: PathBuf,
}

impl FileCaptionSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CaptionSink for FileCaptionSink {
    async fn copy(&self, caption: &str) -> Result<(), ExportError> {
        tokio::fs::write(&self.path, caption)
            .await
            .map_err(|e| ExportError::CopyFailed(format!("{}: {}", self.path.display(), e)))
    }
}

/// Share target that drops the artifact into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryShare {
    dir: PathBuf,
}

impl DirectoryShare {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ShareTarget for DirectoryShare {
    fn can_share(&self, artifact: &Artifact) -> bool {
        artifact.content_type == PNG_CONTENT_TYPE
    }

    async fn share(
        &self,
        artifact: &Artifact,
        title: &str,
        _caption: &str,
    ) -> Result<(), ExportError> {
        let path = save_to_dir(artifact, &self.dir).await?;
        info!("Shared '{}' to {}", title, path.display());
        Ok(())
    }
}

/// One open share dialog. Sharing stays locked until the caption has been
/// copied in this session.
#[derive(Debug, Clone)]
pub struct ShareSession {
    caption: String,
    copied: bool,
}

impl ShareSession {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            copied: false,
        }
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn is_copied(&self) -> bool {
        self.copied
    }

    pub async fn copy_caption(&mut self, sink: &dyn CaptionSink) -> Result<(), ExportError> {
        sink.copy(&self.caption).await?;
        self.copied = true;
        Ok(())
    }

    pub async fn share(
        &self,
        artifact: &Artifact,
        target: &dyn ShareTarget,
    ) -> Result<(), ExportError> {
        if !self.copied {
            return Err(ExportError::CaptionNotCopied);
        }
        if !target.can_share(artifact) {
            warn!("Share target cannot accept {}", artifact.file_name);
            return Err(ExportError::ShareUnsupported);
        }
        target.share(artifact, SHARE_TITLE, &self.caption).await
    }
}

/// Refuses exports of unfinished cards when completion is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportGate {
    pub require_complete: bool,
}

impl ExportGate {
    pub fn check(&self, progress: CardProgress) -> Result<(), ExportError> {
        if self.require_complete && !progress.complete {
            return Err(ExportError::Incomplete {
                remaining: progress.remaining,
            });
        }
        Ok(())
    }
}

/// Renders the current card from a store snapshot.
#[derive(Debug, Clone)]
pub struct CollageExporter {
    renderer: CollageRenderer,
    prompts: PromptList,
    logo: Option<ImageRef>,
    options: RenderOptions,
    gate: ExportGate,
    caption: String,
}

impl CollageExporter {
    pub fn new(
        renderer: CollageRenderer,
        prompts: PromptList,
        logo: Option<ImageRef>,
        options: RenderOptions,
        gate: ExportGate,
    ) -> Self {
        Self {
            renderer,
            prompts,
            logo,
            options,
            gate,
            caption: DEFAULT_CAPTION.to_string(),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn prompts(&self) -> &PromptList {
        &self.prompts
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Configured options with the label toggle optionally overridden.
    pub fn options(&self, draw_labels: Option<bool>) -> RenderOptions {
        let mut options = self.options.clone();
        if let Some(draw_labels) = draw_labels {
            options.draw_labels = draw_labels;
        }
        options
    }

    pub async fn export(
        &self,
        store: &dyn PhotoStore,
        options: &RenderOptions,
    ) -> Result<RenderResult, ExportError> {
        let photos = store.get_all().await?;
        self.gate.check(photos.progress())?;

        let result = self
            .renderer
            .render(&photos, self.logo.as_ref(), &self.prompts, options)
            .await?;
        info!(
            "Exported {} ({}x{}, {} bytes)",
            COLLAGE_FILE_NAME,
            result.width,
            result.height,
            result.png.len()
        );
        Ok(result)
    }
}
