//! Collage rendering pipeline
//!
//! Loads the eight photos and the logo concurrently, lays out a 3x3 grid,
//! cover-fits each image into its cell, optionally overlays wrapped prompt
//! labels, and encodes the result as PNG.

pub mod color;
pub mod cover;
pub mod grid;
pub mod label;
pub mod loader;
pub mod renderer;

pub use color::Color;
pub use cover::{draw_cover, CoverPlacement};
pub use grid::{CellRect, GridLayout};
pub use label::{wrap_text, FontLibrary, FontSpec, LabelFont, Typeface, MAX_LABEL_LINES};
pub use loader::{LoadedImage, Unavailable};
pub use renderer::{
    CollageError, CollageRenderer, RenderOptions, RenderResult, CELL_FILL, LABEL_PADDING,
    MAX_CANVAS_SIDE, PLACEHOLDER_FILL, PNG_CONTENT_TYPE,
};
