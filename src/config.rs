use std::env;
use std::path::PathBuf;

use log::{info, warn};

use crate::card::{ImageRef, PromptList, CELL_COUNT};
use crate::collage::{CollageRenderer, FontLibrary, FontSpec, RenderOptions};
use crate::export::{CollageExporter, ExportGate, DEFAULT_CAPTION};
use crate::photo_encoder::SquareCropOptions;

const DEFAULT_FONT_DIRS: &str =
    "/usr/share/fonts,/usr/local/share/fonts,/Library/Fonts,/System/Library/Fonts,C:\\Windows\\Fonts";

#[derive(Debug, Clone)]
pub struct CollageConfig {
    pub size: u32,
    pub gap: u32,
    pub border: u32,
    pub draw_labels: bool,
    pub label_font: FontSpec,
    pub font_path: Option<PathBuf>,
    pub font_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub db_path: String,
    pub max_connections: u32,
    pub logo: String,
    pub prompts_path: Option<PathBuf>,
    pub collage: CollageConfig,
    pub crop_side: u32,
    pub crop_quality: u8,
    pub max_upload_mb: u64,
    pub require_complete: bool,
    pub share_caption: String,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config {
            port: env::var("SNAP_GRID_PORT")
                .unwrap_or_else(|_| "18474".to_string())
                .parse()?,
            host: env::var("SNAP_GRID_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            db_path: env::var("SNAP_GRID_DB_PATH")
                .unwrap_or_else(|_| "./data/snap-grid.db".to_string()),
            max_connections: env::var("SNAP_GRID_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            logo: env::var("SNAP_GRID_LOGO").unwrap_or_else(|_| "./assets/logo.png".to_string()),
            prompts_path: env::var("SNAP_GRID_PROMPTS_PATH").ok().map(PathBuf::from),
            collage: CollageConfig {
                size: env::var("SNAP_GRID_COLLAGE_SIZE")
                    .unwrap_or_else(|_| "1080".to_string())
                    .parse()?,
                gap: env::var("SNAP_GRID_COLLAGE_GAP")
                    .unwrap_or_else(|_| "12".to_string())
                    .parse()?,
                border: env::var("SNAP_GRID_COLLAGE_BORDER")
                    .unwrap_or_else(|_| "12".to_string())
                    .parse()?,
                draw_labels: env::var("SNAP_GRID_DRAW_LABELS")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()?,
                label_font: match env::var("SNAP_GRID_LABEL_FONT") {
                    Ok(descriptor) => descriptor.parse()?,
                    Err(_) => FontSpec::default(),
                },
                font_path: env::var("SNAP_GRID_FONT_PATH").ok().map(PathBuf::from),
                font_dirs: env::var("SNAP_GRID_FONT_DIRS")
                    .unwrap_or_else(|_| DEFAULT_FONT_DIRS.to_string())
                    .split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect(),
            },
            crop_side: env::var("SNAP_GRID_CROP_SIDE")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()?,
            crop_quality: env::var("SNAP_GRID_CROP_QUALITY")
                .unwrap_or_else(|_| "72".to_string())
                .parse()?,
            max_upload_mb: env::var("SNAP_GRID_MAX_UPLOAD_MB")
                .unwrap_or_else(|_| "25".to_string())
                .parse()?,
            require_complete: env::var("SNAP_GRID_REQUIRE_COMPLETE")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            share_caption: env::var("SNAP_GRID_SHARE_CAPTION")
                .unwrap_or_else(|_| DEFAULT_CAPTION.to_string()),
        };

        config.render_options(None).validate()?;
        Ok(config)
    }

    /// Render options for an export; `labels` overrides the configured default.
    pub fn render_options(&self, labels: Option<bool>) -> RenderOptions {
        RenderOptions {
            size: self.collage.size,
            gap: self.collage.gap,
            border: self.collage.border,
            draw_labels: labels.unwrap_or(self.collage.draw_labels),
            font: self.collage.label_font.clone(),
            ..RenderOptions::default()
        }
    }

    pub fn font_library(&self) -> FontLibrary {
        FontLibrary::scan(self.collage.font_path.clone(), &self.collage.font_dirs)
    }

    pub fn logo_ref(&self) -> Option<ImageRef> {
        ImageRef::parse(&self.logo)
    }

    pub fn crop_options(&self) -> SquareCropOptions {
        SquareCropOptions {
            side: self.crop_side,
            quality: self.crop_quality,
        }
    }

    pub fn export_gate(&self) -> ExportGate {
        ExportGate {
            require_complete: self.require_complete,
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }

    /// Built-in prompts unless a JSON array of nine strings is configured.
    pub async fn load_prompts(&self) -> Result<PromptList, Box<dyn std::error::Error>> {
        let Some(path) = &self.prompts_path else {
            return Ok(PromptList::default());
        };

        let raw = tokio::fs::read_to_string(path).await?;
        let prompts: Vec<String> = serde_json::from_str(&raw)?;
        if prompts.len() != CELL_COUNT {
            return Err(format!(
                "{} must contain {} prompts, found {}",
                path.display(),
                CELL_COUNT,
                prompts.len()
            )
            .into());
        }
        Ok(PromptList::new(prompts))
    }

    /// Assembles the exporter shared by the server and the command line.
    pub async fn build_exporter(&self) -> Result<CollageExporter, Box<dyn std::error::Error>> {
        let prompts = self.load_prompts().await?;

        let fonts = self.font_library();
        if fonts.font_count() == 0 {
            warn!("No label fonts found, labels will use the built-in bitmap font");
        } else {
            info!("Indexed {} label fonts", fonts.font_count());
        }
        let typeface = fonts.resolve(&self.collage.label_font);
        info!("Label font '{}' resolved to {:?}", self.collage.label_font, typeface);

        let logo = self.logo_ref();
        if logo.is_none() {
            warn!("No logo configured, the center cell will render as a placeholder");
        }

        Ok(CollageExporter::new(
            CollageRenderer::new(fonts),
            prompts,
            logo,
            self.render_options(None),
            self.export_gate(),
        )
        .with_caption(self.share_caption.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config() -> Config {
        Config {
            port: 18474,
            host: "127.0.0.1".to_string(),
            db_path: ":memory:".to_string(),
            max_connections: 1,
            logo: "logo.png".to_string(),
            prompts_path: None,
            collage: CollageConfig {
                size: 1080,
                gap: 12,
                border: 12,
                draw_labels: false,
                label_font: FontSpec::default(),
                font_path: None,
                font_dirs: vec![],
            },
            crop_side: 1024,
            crop_quality: 72,
            max_upload_mb: 25,
            require_complete: true,
            share_caption: DEFAULT_CAPTION.to_string(),
        }
    }

    #[test]
    fn test_render_options_override() {
        let config = config();
        assert!(!config.render_options(None).draw_labels);
        assert!(config.render_options(Some(true)).draw_labels);
        assert_eq!(config.render_options(None).canvas_side(), 1104);
        assert_eq!(config.max_upload_bytes(), 25 * 1024 * 1024);
    }

    #[test]
    fn test_oversized_collage_is_invalid() {
        let mut config = config();
        config.collage.border = u32::MAX;
        assert!(config.render_options(None).validate().is_err());
    }

    #[tokio::test]
    async fn test_load_prompts() {
        let dir = TempDir::new().unwrap();
        let mut config = config();
        assert_eq!(config.load_prompts().await.unwrap(), PromptList::default());

        let path = dir.path().join("prompts.json");
        let prompts: Vec<String> = (0..CELL_COUNT).map(|i| format!("prompt {}", i)).collect();
        std::fs::write(&path, serde_json::to_string(&prompts).unwrap()).unwrap();
        config.prompts_path = Some(path.clone());
        let loaded = config.load_prompts().await.unwrap();
        assert_eq!(loaded.label(0), Some("prompt 0"));
        assert_eq!(loaded.label(4), None);

        std::fs::write(&path, r#"["only one"]"#).unwrap();
        assert!(config.load_prompts().await.is_err());
    }
}
