use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbaImage};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::color::{fill_rect, Color};
use super::cover::draw_cover;
use super::grid::{CellRect, GridLayout};
use super::label::{wrap_text, FontLibrary, FontSpec, LabelFont};
use super::loader::{self, LoadedImage};
use crate::card::{ImageRef, PhotoMap, PromptList, CELL_COUNT, GRID_DIMENSION, LOGO_CELL};

/// Fill drawn under every cell before its image.
pub const CELL_FILL: Color = Color::rgb(0xe5, 0xe7, 0xeb);
/// Fill for cells without a usable image.
pub const PLACEHOLDER_FILL: Color = Color::rgb(0x9c, 0xa3, 0xaf);
/// Inset of label text inside its box.
pub const LABEL_PADDING: u32 = 8;

pub const PNG_CONTENT_TYPE: &str = "image/png";
/// Largest canvas side a render will allocate.
pub const MAX_CANVAS_SIDE: u32 = 8192;

#[derive(Debug, thiserror::Error)]
pub enum CollageError {
    #[error("Failed to encode collage: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Encoder produced no output")]
    EmptyOutput,
    #[error("Invalid render options: {0}")]
    InvalidOptions(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    /// Side of the grid area in pixels; the canvas adds the border on each side.
    pub size: u32,
    pub gap: u32,
    pub border: u32,
    pub background: Color,
    pub draw_labels: bool,
    pub label_color: Color,
    pub label_bg: Color,
    pub font: FontSpec,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            size: 1080,
            gap: 12,
            border: 12,
            background: Color::rgb(255, 255, 255),
            draw_labels: false,
            label_color: Color::rgb(255, 255, 255),
            label_bg: Color::rgba(0, 0, 0, 115),
            font: FontSpec::default(),
        }
    }
}

impl RenderOptions {
    pub fn canvas_side(&self) -> u32 {
        self.size.saturating_add(self.border.saturating_mul(2))
    }

    /// Rejects a canvas that is empty or larger than [`MAX_CANVAS_SIDE`].
    pub fn validate(&self) -> Result<(), CollageError> {
        let side = self.size as u64 + 2 * self.border as u64;
        if side == 0 || side > MAX_CANVAS_SIDE as u64 {
            return Err(CollageError::InvalidOptions(format!(
                "canvas side {} must be between 1 and {}",
                side, MAX_CANVAS_SIDE
            )));
        }
        Ok(())
    }

    pub fn layout(&self) -> GridLayout {
        GridLayout::calculate(
            self.size,
            GRID_DIMENSION,
            GRID_DIMENSION,
            self.gap,
            self.border,
        )
    }
}

/// A rendered collage: PNG bytes plus the same bytes in base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub png: Vec<u8>,
    pub base64: String,
    pub width: u32,
    pub height: u32,
}

impl RenderResult {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", PNG_CONTENT_TYPE, self.base64)
    }

    /// Hex SHA-256 of the PNG bytes.
    pub fn digest(&self) -> String {
        Sha256::digest(&self.png)
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Composites a bingo card into a single PNG.
///
/// The renderer holds no per-render state: every call allocates its own
/// canvas and decodes all images afresh, so concurrent renders are
/// independent.
#[derive(Debug, Clone, Default)]
pub struct CollageRenderer {
    fonts: FontLibrary,
}

impl CollageRenderer {
    pub fn new(fonts: FontLibrary) -> Self {
        Self { fonts }
    }

    pub async fn render(
        &self,
        photos: &PhotoMap,
        logo: Option<&ImageRef>,
        prompts: &PromptList,
        options: &RenderOptions,
    ) -> Result<RenderResult, CollageError> {
        options.validate()?;
        let side = options.canvas_side();
        let layout = options.layout();
        debug!(
            "Rendering collage {}x{} with {}x{} cells",
            side, side, layout.cell_width, layout.cell_height
        );

        let references: Vec<Option<ImageRef>> = (0..CELL_COUNT)
            .map(|i| {
                if i == LOGO_CELL {
                    logo.cloned()
                } else {
                    photos.get_cell(i).cloned()
                }
            })
            .collect();
        let images = loader::load_cells(references).await;

        let canvas = self.paint(&images, prompts, options);
        let result = encode_png(&canvas)?;

        info!(
            "Rendered collage with {} of {} photos ({} bytes)",
            photos.len(),
            CELL_COUNT - 1,
            result.png.len()
        );
        Ok(result)
    }

    /// Paints the full canvas once every cell has a definitive outcome.
    pub fn paint(
        &self,
        images: &[LoadedImage],
        prompts: &PromptList,
        options: &RenderOptions,
    ) -> RgbaImage {
        let side = options.canvas_side();
        let layout = options.layout();
        let mut canvas = RgbaImage::new(side, side);
        fill_rect(&mut canvas, 0, 0, side, side, options.background);

        let label_font = options.draw_labels.then(|| {
            LabelFont::new(self.fonts.resolve(&options.font), options.font.size_px)
        });

        for (index, cell) in layout.cells() {
            fill_rect(
                &mut canvas,
                cell.x as i64,
                cell.y as i64,
                cell.width,
                cell.height,
                CELL_FILL,
            );

            match images.get(index).and_then(LoadedImage::bitmap) {
                Some(bitmap) => draw_cover(&mut canvas, bitmap, cell),
                None => fill_rect(
                    &mut canvas,
                    cell.x as i64,
                    cell.y as i64,
                    cell.width,
                    cell.height,
                    PLACEHOLDER_FILL,
                ),
            }

            if let (Some(font), Some(label)) = (&label_font, prompts.label(index)) {
                draw_label(&mut canvas, font, label, cell, options);
            }
        }

        canvas
    }
}

/// Label box geometry for a number of wrapped lines.
pub fn label_box(cell: CellRect, line_count: usize, line_height: u32) -> CellRect {
    let height = (line_count as u32)
        .saturating_mul(line_height)
        .saturating_add(LABEL_PADDING * 2)
        .min(cell.height);
    CellRect {
        x: cell.x,
        y: cell.y + cell.height - height,
        width: cell.width,
        height,
    }
}

fn draw_label(
    canvas: &mut RgbaImage,
    font: &LabelFont,
    label: &str,
    cell: CellRect,
    options: &RenderOptions,
) {
    let max_width = cell.width.saturating_sub(LABEL_PADDING * 2) as f32;
    let lines = wrap_text(label, max_width, |text| font.measure(text));
    if lines.is_empty() {
        return;
    }

    let line_height = options.font.line_height();
    let bx = label_box(cell, lines.len(), line_height);
    fill_rect(
        canvas,
        bx.x as i64,
        bx.y as i64,
        bx.width,
        bx.height,
        options.label_bg,
    );

    for (k, line) in lines.iter().enumerate() {
        let baseline =
            bx.y as f32 + LABEL_PADDING as f32 + line_height as f32 * (k as f32 + 0.8);
        font.draw_line(
            canvas,
            line,
            (bx.x + LABEL_PADDING) as f32,
            baseline,
            options.label_color.0,
            bx,
        );
    }
}

/// Serializes the canvas to PNG. Fails rather than returning a partial artifact.
pub fn encode_png(canvas: &RgbaImage) -> Result<RenderResult, CollageError> {
    let mut png = Vec::new();
    canvas.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    if png.is_empty() {
        return Err(CollageError::EmptyOutput);
    }

    let base64 = STANDARD.encode(&png);
    Ok(RenderResult {
        png,
        base64,
        width: canvas.width(),
        height: canvas.height(),
    })
}
