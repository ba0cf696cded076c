//! Glyph atlas font model.
//!
//! A font is a static [`FontData`] record (line metrics plus one
//! [`GlyphDescriptor`] per character) paired with a single-channel
//! signed-distance-field atlas image. [`FontMetrics`] scales the record to a
//! requested pixel size for layout.

pub mod atlas;
pub mod metrics;
pub mod system;

use thiserror::Error;

pub use atlas::{AtlasImage, BakeSettings, FontAsset};
pub use metrics::{FontData, FontMetrics, GlyphDescriptor, KerningPair};
pub use system::find_system_font;

#[derive(Error, Debug)]
pub enum FontError {
    #[error("Failed to load font: {0}")]
    FontLoad(String),

    #[error("Failed to read font asset: {0}")]
    Io(String),

    #[error("Failed to parse font asset: {0}")]
    Parse(String),

    #[error("Atlas size mismatch: expected {expected} bytes, got {actual}")]
    AtlasSize { expected: usize, actual: usize },

    #[error("Glyph does not fit in atlas: {0:?}")]
    AtlasFull(char),

    #[error("No font configured")]
    NotConfigured,
}
