//! Static font data and per-size metrics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::FontError;

/// A glyph's placement in the atlas and its layout metrics.
///
/// Rectangles are in atlas texels. Bearings and advance are in font units,
/// the same units as the line metrics on [`FontData`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlyphDescriptor {
    /// Left edge of the glyph cell in the atlas
    pub x: u32,
    /// Top edge of the glyph cell in the atlas
    pub y: u32,
    /// Cell width in texels (including the SDF border)
    pub width: u32,
    /// Cell height in texels (including the SDF border)
    pub height: u32,
    /// Offset from the pen position to the cell's left edge
    pub bearing_x: f32,
    /// Offset from the baseline up to the cell's top edge
    pub bearing_y: f32,
    /// Horizontal pen advance
    pub advance: f32,
    /// Scaled by x-height instead of cap-height
    #[serde(default)]
    pub lowercase: bool,
}

/// Kerning adjustment applied between two consecutive glyphs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KerningPair {
    pub left: char,
    pub right: char,
    pub amount: f32,
}

fn default_aspect() -> f32 {
    1.0
}

/// Static description of a pre-rasterized font.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontData {
    /// Distance from baseline to the top of the tallest glyphs
    pub ascent: f32,
    /// Distance from baseline down to the lowest descender (positive)
    pub descent: f32,
    /// Extra spacing between lines
    #[serde(default)]
    pub line_gap: f32,
    /// Height of capital letters
    pub cap_height: f32,
    /// Height of lowercase letters without ascenders
    pub x_height: f32,
    /// Advance of the space character
    pub space_advance: f32,
    /// Horizontal stretch applied to every glyph
    #[serde(default = "default_aspect")]
    pub aspect: f32,
    /// Width of the distance field border around each glyph, in texels
    #[serde(default)]
    pub sdf_border: f32,
    /// Atlas image width in pixels
    pub atlas_width: u32,
    /// Atlas image height in pixels
    pub atlas_height: u32,
    pub glyphs: HashMap<char, GlyphDescriptor>,
    #[serde(default)]
    pub kerning: Vec<KerningPair>,
}

impl FontData {
    /// Parse a JSON font record.
    pub fn from_json(json: &str) -> Result<Self, FontError> {
        let mut data: FontData =
            serde_json::from_str(json).map_err(|e| FontError::Parse(e.to_string()))?;
        data.validate()?;
        data.sort_kerning();
        Ok(data)
    }

    /// Reject records whose metrics would scale layout by zero or NaN.
    pub fn validate(&self) -> Result<(), FontError> {
        let heights = [("cap_height", self.cap_height), ("x_height", self.x_height)];
        for (name, value) in heights {
            if !(value.is_finite() && value > 0.0) {
                return Err(FontError::Parse(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.atlas_width == 0 || self.atlas_height == 0 {
            return Err(FontError::Parse(format!(
                "atlas size must be positive, got {}x{}",
                self.atlas_width, self.atlas_height
            )));
        }
        Ok(())
    }

    /// Serialize the record to pretty JSON.
    pub fn to_json(&self) -> Result<String, FontError> {
        serde_json::to_string_pretty(self).map_err(|e| FontError::Parse(e.to_string()))
    }

    /// Sort the kerning table so [`FontData::kern`] can binary search it.
    pub fn sort_kerning(&mut self) {
        self.kerning
            .sort_by(|a, b| (a.left, a.right).cmp(&(b.left, b.right)));
    }

    pub fn glyph(&self, c: char) -> Option<&GlyphDescriptor> {
        self.glyphs.get(&c)
    }

    /// Kerning between `left` and `right`, zero when the pair is absent.
    pub fn kern(&self, left: char, right: char) -> f32 {
        self.kerning
            .binary_search_by(|pair| (pair.left, pair.right).cmp(&(left, right)))
            .map(|i| self.kerning[i].amount)
            .unwrap_or(0.0)
    }
}

/// Font metrics scaled to a pixel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub pixel_size: f32,
    /// Pixels per font unit for cap-height glyphs
    pub cap_scale: f32,
    /// Pixels per font unit for lowercase glyphs, snapped so the x-height
    /// lands on a whole pixel
    pub low_scale: f32,
    /// Ascent in whole pixels
    pub ascent: f32,
    /// Line advance in whole pixels
    pub line_height: f32,
}

impl FontMetrics {
    pub fn new(font: &FontData, pixel_size: f32, extra_line_gap: f32) -> Self {
        let cap_scale = pixel_size / font.cap_height;
        let low_scale = (font.x_height * cap_scale).round() / font.x_height;
        let ascent = (font.ascent * cap_scale).round();
        let line_height = (cap_scale * (font.ascent + font.descent + font.line_gap)
            + extra_line_gap)
            .round();

        Self {
            pixel_size,
            cap_scale,
            low_scale,
            ascent,
            line_height,
        }
    }

    /// Scale used for a glyph.
    pub fn scale_for(&self, glyph: &GlyphDescriptor) -> f32 {
        if glyph.lowercase {
            self.low_scale
        } else {
            self.cap_scale
        }
    }
}
