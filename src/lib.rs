//! SnapGrid: photo bingo cards rendered into a shareable collage.

pub mod card;
pub mod collage;
pub mod config;
pub mod db;
pub mod export;
pub mod handlers_collage;
pub mod handlers_health;
pub mod handlers_photo;
pub mod photo_encoder;
pub mod warp_helpers;
