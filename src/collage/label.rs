//! Prompt label layout and glyph painting.
//!
//! Labels are wrapped on word boundaries to at most [`MAX_LABEL_LINES`] lines
//! and painted with either an outline font (TrueType/OpenType via `rusttype`)
//! or, when no usable font file is available, the built-in 8x8 bitmap font.
//! The bitmap font measures text by character count, so wrapping keeps
//! working even without font metrics.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};
use log::{debug, warn};
use rusttype::{point, Font, Scale};
use serde::{Deserialize, Serialize};

use super::color::blend_pixel;
use super::grid::CellRect;

/// Lines beyond this are dropped to bound the label box height.
pub const MAX_LABEL_LINES: usize = 3;

const LINE_HEIGHT_RATIO: f32 = 1.1;
const BITMAP_GLYPH_SIZE: u32 = 8;
const FONT_EXTENSIONS: [&str; 3] = ["ttf", "otf", "ttc"];
const MAX_FONT_DIR_DEPTH: usize = 4;

/// Families tried after the requested ones.
const FALLBACK_FAMILIES: [&str; 8] = [
    "DejaVuSans",
    "LiberationSans",
    "Arial",
    "Helvetica",
    "Roboto",
    "NotoSans",
    "FreeSans",
    "SegoeUI",
];

/// Wraps `text` greedily on whitespace so that each line measures at most
/// `max_width`. A word wider than `max_width` stays whole on its own line.
/// At most [`MAX_LABEL_LINES`] lines are returned; the rest is dropped.
pub fn wrap_text<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", line, word)
        };

        if !line.is_empty() && measure(&candidate) > max_width {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        } else {
            line = candidate;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }

    lines.truncate(MAX_LABEL_LINES);
    lines
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid font descriptor: {0}")]
pub struct FontSpecError(String);

/// Parsed CSS-style font descriptor, e.g. `600 20px system-ui, Roboto`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FontSpec {
    pub weight: u16,
    pub size_px: f32,
    pub families: Vec<String>,
}

impl FontSpec {
    pub fn line_height(&self) -> u32 {
        (self.size_px * LINE_HEIGHT_RATIO).round() as u32
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        "600 20px system-ui, -apple-system, Segoe UI, Roboto, Helvetica, Arial"
            .parse()
            .unwrap_or(FontSpec {
                weight: 600,
                size_px: 20.0,
                families: vec!["system-ui".to_string()],
            })
    }
}

impl FromStr for FontSpec {
    type Err = FontSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let size_pos = tokens
            .iter()
            .position(|t| t.split('/').next().is_some_and(|size| size.ends_with("px")))
            .ok_or_else(|| FontSpecError(s.to_string()))?;

        let size_token = tokens[size_pos].split('/').next().unwrap_or_default();
        let size_px: f32 = size_token
            .trim_end_matches("px")
            .parse()
            .map_err(|_| FontSpecError(s.to_string()))?;
        if !(size_px > 0.0 && size_px.is_finite()) {
            return Err(FontSpecError(s.to_string()));
        }

        let mut weight = 400;
        for token in &tokens[..size_pos] {
            match *token {
                "bold" | "bolder" => weight = 700,
                "lighter" => weight = 300,
                "normal" | "italic" | "oblique" | "small-caps" => {}
                other => {
                    weight = other
                        .parse::<u16>()
                        .ok()
                        .filter(|w| (1..=1000).contains(w))
                        .ok_or_else(|| FontSpecError(s.to_string()))?;
                }
            }
        }

        let families = tokens[size_pos + 1..]
            .join(" ")
            .split(',')
            .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
            .filter(|f| !f.is_empty())
            .collect();

        Ok(FontSpec {
            weight,
            size_px,
            families,
        })
    }
}

impl TryFrom<String> for FontSpec {
    type Error = FontSpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FontSpec> for String {
    fn from(spec: FontSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for FontSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}px {}", self.weight, self.size_px, self.families.join(", "))
    }
}

/// Glyph source for label text.
#[derive(Clone)]
pub enum Typeface {
    Outline(Font<'static>),
    /// Built-in 8x8 bitmap font, scaled by whole pixels.
    Bitmap,
}

impl fmt::Debug for Typeface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Typeface::Outline(_) => write!(f, "Typeface::Outline"),
            Typeface::Bitmap => write!(f, "Typeface::Bitmap"),
        }
    }
}

/// A typeface at a concrete pixel size.
#[derive(Debug, Clone)]
pub struct LabelFont {
    typeface: Typeface,
    size_px: f32,
}

impl LabelFont {
    pub fn new(typeface: Typeface, size_px: f32) -> Self {
        Self { typeface, size_px }
    }

    fn bitmap_scale(&self) -> u32 {
        ((self.size_px / BITMAP_GLYPH_SIZE as f32).floor() as u32).max(1)
    }

    /// Advance width of `text` in pixels.
    pub fn measure(&self, text: &str) -> f32 {
        match &self.typeface {
            Typeface::Outline(font) => {
                let scale = Scale::uniform(self.size_px);
                font.layout(text, scale, point(0.0, 0.0))
                    .last()
                    .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
                    .unwrap_or(0.0)
            }
            Typeface::Bitmap => {
                text.chars().count() as f32 * (BITMAP_GLYPH_SIZE * self.bitmap_scale()) as f32
            }
        }
    }

    /// Paints one line with its left edge at `x` and baseline at `baseline`,
    /// clipped to `clip`.
    pub fn draw_line(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        x: f32,
        baseline: f32,
        color: Rgba<u8>,
        clip: CellRect,
    ) {
        let mut plot = |px: i64, py: i64, coverage: f32| {
            if px < clip.x as i64
                || py < clip.y as i64
                || px >= (clip.x + clip.width) as i64
                || py >= (clip.y + clip.height) as i64
                || px >= canvas.width() as i64
                || py >= canvas.height() as i64
            {
                return;
            }
            blend_pixel(canvas.get_pixel_mut(px as u32, py as u32), color, coverage);
        };

        match &self.typeface {
            Typeface::Outline(font) => {
                let scale = Scale::uniform(self.size_px);
                for glyph in font.layout(text, scale, point(x, baseline)) {
                    if let Some(bb) = glyph.pixel_bounding_box() {
                        glyph.draw(|gx, gy, v| {
                            plot(bb.min.x as i64 + gx as i64, bb.min.y as i64 + gy as i64, v);
                        });
                    }
                }
            }
            Typeface::Bitmap => {
                let scale = self.bitmap_scale() as i64;
                let glyph_size = BITMAP_GLYPH_SIZE as i64;
                let top = baseline.round() as i64 - (glyph_size - 1) * scale;
                let mut caret = x.round() as i64;

                for ch in text.chars() {
                    let rows = BASIC_FONTS
                        .get(ch)
                        .or_else(|| BASIC_FONTS.get('?'))
                        .unwrap_or([0; 8]);
                    for (row, bits) in rows.iter().enumerate() {
                        for col in 0..glyph_size {
                            if (bits >> col) & 1 == 0 {
                                continue;
                            }
                            for sy in 0..scale {
                                for sx in 0..scale {
                                    plot(
                                        caret + col * scale + sx,
                                        top + row as i64 * scale + sy,
                                        1.0,
                                    );
                                }
                            }
                        }
                    }
                    caret += glyph_size * scale;
                }
            }
        }
    }
}

/// Resolves font descriptors to typefaces from an explicit file or a set of
/// font directories. Each descriptor is loaded once and shared by clones.
#[derive(Debug, Clone, Default)]
pub struct FontLibrary {
    explicit: Option<PathBuf>,
    /// Lowercased file stem -> font file
    index: HashMap<String, PathBuf>,
    /// Descriptor text -> resolved typeface
    resolved: Arc<Mutex<HashMap<String, Typeface>>>,
}

impl FontLibrary {
    /// A library with no font files: every descriptor resolves to the bitmap font.
    pub fn bitmap_only() -> Self {
        Self::default()
    }

    pub fn scan(explicit: Option<PathBuf>, dirs: &[PathBuf]) -> Self {
        let mut index = HashMap::new();
        for dir in dirs {
            index_font_dir(dir, 0, &mut index);
        }
        debug!("Indexed {} font files", index.len());
        Self {
            explicit,
            index,
            resolved: Arc::default(),
        }
    }

    pub fn font_count(&self) -> usize {
        self.index.len() + usize::from(self.explicit.is_some())
    }

    pub fn resolve(&self, spec: &FontSpec) -> Typeface {
        let key = spec.to_string();
        if let Some(typeface) = self.cached(&key) {
            return typeface;
        }

        let typeface = self.load(spec);
        if let Ok(mut resolved) = self.resolved.lock() {
            resolved.insert(key, typeface.clone());
        }
        typeface
    }

    fn cached(&self, key: &str) -> Option<Typeface> {
        self.resolved.lock().ok()?.get(key).cloned()
    }

    fn load(&self, spec: &FontSpec) -> Typeface {
        if let Some(path) = &self.explicit {
            match load_font(path) {
                Some(font) => return Typeface::Outline(font),
                None => warn!("Failed to load font file {}", path.display()),
            }
        }

        for stem in candidate_stems(spec) {
            if let Some(path) = self.index.get(&stem) {
                if let Some(font) = load_font(path) {
                    debug!("Resolved font '{}' to {}", spec, path.display());
                    return Typeface::Outline(font);
                }
                warn!("Failed to load font file {}", path.display());
            }
        }

        if !self.index.is_empty() || self.explicit.is_some() {
            warn!("No font file matches '{}', using bitmap font", spec);
        }
        Typeface::Bitmap
    }
}

fn load_font(path: &Path) -> Option<Font<'static>> {
    let data = std::fs::read(path).ok()?;
    Font::try_from_vec(data)
}

fn index_font_dir(dir: &Path, depth: usize, index: &mut HashMap<String, PathBuf>) {
    if depth > MAX_FONT_DIR_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            index_font_dir(&path, depth + 1, index);
            continue;
        }
        let is_font = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FONT_EXTENSIONS.contains(&e.to_lowercase().as_str()));
        if !is_font {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            index.entry(stem.to_lowercase()).or_insert(path);
        }
    }
}

fn weight_suffixes(weight: u16) -> &'static [&'static str] {
    match weight {
        0..=149 => &["thin", "extralight", "light", "regular"],
        150..=249 => &["extralight", "light", "regular"],
        250..=349 => &["light", "regular"],
        350..=449 => &["regular", "book"],
        450..=549 => &["medium", "regular"],
        550..=649 => &["semibold", "demibold", "bold", "medium", "regular"],
        650..=749 => &["bold", "semibold", "regular"],
        750..=849 => &["extrabold", "bold", "regular"],
        _ => &["black", "heavy", "extrabold", "bold", "regular"],
    }
}

/// Lowercased file stems to look for, most specific first.
fn candidate_stems(spec: &FontSpec) -> Vec<String> {
    let families = spec
        .families
        .iter()
        .map(String::as_str)
        .chain(FALLBACK_FAMILIES)
        .map(|f| f.replace([' ', '-'], "").to_lowercase())
        .filter(|f| !f.is_empty());

    let mut stems = Vec::new();
    for family in families {
        for suffix in weight_suffixes(spec.weight) {
            stems.push(format!("{}-{}", family, suffix));
            if *suffix == "regular" {
                stems.push(family.clone());
            }
        }
    }
    stems
}
