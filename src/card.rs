//! Bingo card data model
//!
//! A card is a 3x3 grid addressed row-major by cell index 0..=8. Cell 4 is
//! reserved for the event logo, so only the remaining eight cells can hold a
//! user photo. Photos are referenced by [`ImageRef`], either an inline
//! `data:` URL or a locator (file path or http(s) URL).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of cells in the grid (3x3).
pub const CELL_COUNT: usize = 9;

/// Grid columns and rows.
pub const GRID_DIMENSION: u32 = 3;

/// Cell reserved for the event logo.
pub const LOGO_CELL: usize = 4;

/// Number of photo slots a complete card holds.
pub const PHOTO_SLOT_COUNT: usize = CELL_COUNT - 1;

pub const DEFAULT_PROMPTS: [&str; CELL_COUNT] = [
    "Bring your own reusable bottle",
    "Spot a solar panel",
    "Sort your trash correctly",
    "Find a plant-based snack",
    "",
    "Reduce plastic waste today",
    "Ride public transport",
    "Meet an eco-friendly brand",
    "Take a selfie with a tree",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CardError {
    #[error("Slot {0} is out of range (valid slots are 0-8)")]
    OutOfRange(i64),
    #[error("Slot 4 is reserved for the logo")]
    ReservedSlot,
    #[error("Invalid slot key: {0}")]
    InvalidKey(String),
    #[error("Image reference is empty")]
    EmptyReference,
}

/// A photo slot: a cell index in 0..=8 other than the logo cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub fn new(index: usize) -> Result<Self, CardError> {
        if index >= CELL_COUNT {
            return Err(CardError::OutOfRange(index as i64));
        }
        if index == LOGO_CELL {
            return Err(CardError::ReservedSlot);
        }
        Ok(SlotIndex(index as u8))
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// All eight photo slots in row-major order.
    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (0..CELL_COUNT)
            .filter(|&i| i != LOGO_CELL)
            .map(|i| SlotIndex(i as u8))
    }
}

impl TryFrom<u8> for SlotIndex {
    type Error = CardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SlotIndex::new(value as usize)
    }
}

impl TryFrom<i64> for SlotIndex {
    type Error = CardError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if !(0..CELL_COUNT as i64).contains(&value) {
            return Err(CardError::OutOfRange(value));
        }
        SlotIndex::new(value as usize)
    }
}

impl From<SlotIndex> for u8 {
    fn from(slot: SlotIndex) -> Self {
        slot.0
    }
}

impl FromStr for SlotIndex {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| CardError::InvalidKey(s.to_string()))?;
        SlotIndex::try_from(value)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to an encoded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ImageRef {
    /// `data:<mime>;base64,<payload>`
    DataUrl(String),
    /// File path, `file://` or `http(s)://` URL
    Locator(String),
}

impl ImageRef {
    /// Parses a reference, returning `None` for an empty string.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if value
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
        {
            Some(ImageRef::DataUrl(value.to_string()))
        } else {
            Some(ImageRef::Locator(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ImageRef::DataUrl(s) | ImageRef::Locator(s) => s,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, ImageRef::DataUrl(_))
    }
}

impl TryFrom<String> for ImageRef {
    type Error = CardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ImageRef::parse(&value).ok_or(CardError::EmptyReference)
    }
}

impl From<ImageRef> for String {
    fn from(image: ImageRef) -> Self {
        match image {
            ImageRef::DataUrl(s) | ImageRef::Locator(s) => s,
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Inline payloads can be megabytes long
            ImageRef::DataUrl(s) => {
                let header = s.split(',').next().unwrap_or("data:");
                write!(f, "{},<{} bytes>", header, s.len())
            }
            ImageRef::Locator(s) => write!(f, "{}", s),
        }
    }
}

/// Sparse mapping from photo slot to image. Missing keys are empty cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoMap(BTreeMap<SlotIndex, ImageRef>);

impl PhotoMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: SlotIndex, image: ImageRef) -> Option<ImageRef> {
        self.0.insert(slot, image)
    }

    pub fn remove(&mut self, slot: SlotIndex) -> Option<ImageRef> {
        self.0.remove(&slot)
    }

    pub fn get(&self, slot: SlotIndex) -> Option<&ImageRef> {
        self.0.get(&slot)
    }

    /// Lookup by raw cell index; the logo cell and out-of-range indices are never present.
    pub fn get_cell(&self, index: usize) -> Option<&ImageRef> {
        SlotIndex::new(index).ok().and_then(|slot| self.get(slot))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn slots(&self) -> impl Iterator<Item = SlotIndex> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, &ImageRef)> {
        self.0.iter().map(|(slot, image)| (*slot, image))
    }

    pub fn progress(&self) -> CardProgress {
        CardProgress::from_filled(self.len())
    }
}

impl FromIterator<(SlotIndex, ImageRef)> for PhotoMap {
    fn from_iter<T: IntoIterator<Item = (SlotIndex, ImageRef)>>(iter: T) -> Self {
        PhotoMap(iter.into_iter().collect())
    }
}

/// Prompt labels index-aligned to grid cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptList(Vec<String>);

impl PromptList {
    pub fn new(prompts: Vec<String>) -> Self {
        PromptList(prompts)
    }

    /// Label painted on a cell, if any. The logo cell never has one.
    pub fn label(&self, index: usize) -> Option<&str> {
        if index == LOGO_CELL {
            return None;
        }
        self.0
            .get(index)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

impl Default for PromptList {
    fn default() -> Self {
        PromptList(DEFAULT_PROMPTS.iter().map(|s| s.to_string()).collect())
    }
}

/// Completion state of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CardProgress {
    pub filled: usize,
    pub remaining: usize,
    pub complete: bool,
}

impl CardProgress {
    pub fn from_filled(filled: usize) -> Self {
        let filled = filled.min(PHOTO_SLOT_COUNT);
        let remaining = PHOTO_SLOT_COUNT - filled;
        CardProgress {
            filled,
            remaining,
            complete: remaining == 0,
        }
    }
}
