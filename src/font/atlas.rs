//! SDF atlas baking and loading.
//!
//! Glyphs are rasterized with fontdue, padded by the distance field border,
//! converted to a signed distance field and shelf-packed into one
//! single-channel image. The edge of a glyph sits at value 128.

use fontdue::{Font, FontSettings};
use std::collections::HashMap;
use std::path::Path;

use super::metrics::{FontData, GlyphDescriptor, KerningPair};
use super::FontError;

/// Single-channel atlas pixels, row-major, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl AtlasImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FontError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(FontError::AtlasSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

/// Settings for [`FontAsset::bake`].
#[derive(Debug, Clone)]
pub struct BakeSettings {
    /// Rasterization size in pixels; font units equal pixels at this size
    pub raster_size: f32,
    /// Distance field border in texels
    pub sdf_border: u32,
    /// Maximum atlas width; shelves wrap at this width
    pub atlas_width: u32,
    /// Characters to bake
    pub charset: Vec<char>,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            raster_size: 48.0,
            sdf_border: 4,
            atlas_width: 512,
            charset: (' '..='~').collect(),
        }
    }
}

/// Font record and its atlas image.
#[derive(Debug, Clone)]
pub struct FontAsset {
    pub data: FontData,
    pub image: AtlasImage,
}

struct BakedGlyph {
    c: char,
    field: Vec<u8>,
    width: u32,
    height: u32,
    bearing_x: f32,
    bearing_y: f32,
    advance: f32,
}

impl FontAsset {
    /// Load a JSON font record and the raw atlas stored next to it with the
    /// `r8` extension.
    pub fn load_json(path: &Path) -> Result<Self, FontError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| FontError::Io(format!("{}: {}", path.display(), e)))?;
        let data = FontData::from_json(&json)?;

        let atlas_path = path.with_extension("r8");
        let pixels = std::fs::read(&atlas_path)
            .map_err(|e| FontError::Io(format!("{}: {}", atlas_path.display(), e)))?;
        let image = AtlasImage::new(data.atlas_width, data.atlas_height, pixels)?;

        Ok(Self { data, image })
    }

    /// Load from `path`: a `.json` record, or a font file to bake.
    pub fn load(path: &Path, settings: &BakeSettings) -> Result<Self, FontError> {
        if path.extension().is_some_and(|ext| ext == "json") {
            return Self::load_json(path);
        }
        let bytes = std::fs::read(path)
            .map_err(|e| FontError::Io(format!("{}: {}", path.display(), e)))?;
        Self::bake(&bytes, settings)
    }

    /// Rasterize a TrueType/OpenType font into an SDF atlas.
    pub fn bake(font_bytes: &[u8], settings: &BakeSettings) -> Result<Self, FontError> {
        let px = settings.raster_size;
        let font = Font::from_bytes(
            font_bytes,
            FontSettings {
                scale: px,
                ..FontSettings::default()
            },
        )
        .map_err(|e| FontError::FontLoad(e.to_string()))?;

        let line = font
            .horizontal_line_metrics(px)
            .ok_or_else(|| FontError::FontLoad("font has no horizontal metrics".to_string()))?;

        let ink_height = |c: char| {
            let m = font.metrics(c, px);
            (m.height as i32 + m.ymin) as f32
        };
        let mut cap_height = ink_height('H');
        if cap_height <= 0.0 {
            cap_height = line.ascent * 0.7;
        }
        let mut x_height = ink_height('x');
        if x_height <= 0.0 {
            x_height = cap_height * 0.5;
        }
        let space_advance = font.metrics(' ', px).advance_width;

        let border = settings.sdf_border;
        let mut baked = Vec::new();
        for &c in &settings.charset {
            if c == ' ' || font.lookup_glyph_index(c) == 0 {
                continue;
            }
            let (metrics, bitmap) = font.rasterize(c, px);
            let width = metrics.width as u32 + 2 * border;
            let height = metrics.height as u32 + 2 * border;
            baked.push(BakedGlyph {
                c,
                field: distance_field(&bitmap, metrics.width, metrics.height, border),
                width,
                height,
                bearing_x: metrics.xmin as f32 - border as f32,
                bearing_y: (metrics.ymin + metrics.height as i32) as f32 + border as f32,
                advance: metrics.advance_width,
            });
        }

        let (image, glyphs) = assemble_atlas(&baked, settings.atlas_width)?;
        let kerning = kerning_table(glyphs.keys().copied(), |left, right| {
            font.horizontal_kern(left, right, px)
        });

        let mut data = FontData {
            ascent: line.ascent,
            descent: -line.descent,
            line_gap: line.line_gap,
            cap_height,
            x_height,
            space_advance,
            aspect: 1.0,
            sdf_border: border as f32,
            atlas_width: image.width,
            atlas_height: image.height,
            glyphs,
            kerning,
        };
        data.validate()?;
        data.sort_kerning();

        tracing::info!(
            "Baked {} glyphs into {}x{} atlas",
            data.glyphs.len(),
            image.width,
            image.height
        );

        Ok(Self { data, image })
    }
}

/// Place `(char, width, height)` cells on shelves at most `atlas_width`
/// wide, tallest first.
///
/// Returns each cell's top-left corner in input order, and the atlas height.
pub fn shelf_pack(
    cells: &[(char, u32, u32)],
    atlas_width: u32,
) -> Result<(Vec<(u32, u32)>, u32), FontError> {
    let mut order: Vec<usize> = (0..cells.len()).collect();
    order.sort_by(|&a, &b| {
        let (ca, _, ha) = cells[a];
        let (cb, _, hb) = cells[b];
        hb.cmp(&ha).then(ca.cmp(&cb))
    });

    let mut placements = vec![(0, 0); cells.len()];
    let (mut pen_x, mut pen_y, mut shelf_height) = (0u32, 0u32, 0u32);
    for index in order {
        let (c, width, height) = cells[index];
        if width > atlas_width {
            return Err(FontError::AtlasFull(c));
        }
        if pen_x + width > atlas_width {
            pen_x = 0;
            pen_y += shelf_height;
            shelf_height = 0;
        }
        placements[index] = (pen_x, pen_y);
        pen_x += width;
        shelf_height = shelf_height.max(height);
    }
    Ok((placements, (pen_y + shelf_height).max(1)))
}

/// Pack baked glyphs and copy their fields into one image.
fn assemble_atlas(
    baked: &[BakedGlyph],
    atlas_width: u32,
) -> Result<(AtlasImage, HashMap<char, GlyphDescriptor>), FontError> {
    let cells: Vec<(char, u32, u32)> = baked.iter().map(|g| (g.c, g.width, g.height)).collect();
    let (placements, atlas_height) = shelf_pack(&cells, atlas_width)?;

    let mut pixels = vec![0u8; atlas_width as usize * atlas_height as usize];
    let mut glyphs = HashMap::with_capacity(baked.len());
    for (glyph, &(x, y)) in baked.iter().zip(&placements) {
        let width = glyph.width as usize;
        for row in 0..glyph.height as usize {
            let src = row * width;
            let dst = (y as usize + row) * atlas_width as usize + x as usize;
            pixels[dst..dst + width].copy_from_slice(&glyph.field[src..src + width]);
        }
        glyphs.insert(
            glyph.c,
            GlyphDescriptor {
                x,
                y,
                width: glyph.width,
                height: glyph.height,
                bearing_x: glyph.bearing_x,
                bearing_y: glyph.bearing_y,
                advance: glyph.advance,
                lowercase: glyph.c.is_lowercase(),
            },
        );
    }
    Ok((AtlasImage::new(atlas_width, atlas_height, pixels)?, glyphs))
}

/// Non-zero kerning between every ordered pair of `chars`.
fn kerning_table<I, F>(chars: I, kern: F) -> Vec<KerningPair>
where
    I: IntoIterator<Item = char>,
    F: Fn(char, char) -> Option<f32>,
{
    let chars: Vec<char> = chars.into_iter().collect();
    let mut table = Vec::new();
    for &left in &chars {
        for &right in &chars {
            match kern(left, right) {
                Some(amount) if amount != 0.0 => table.push(KerningPair {
                    left,
                    right,
                    amount,
                }),
                _ => {}
            }
        }
    }
    table
}

/// Convert a coverage bitmap into a signed distance field padded by
/// `border` texels on each side.
///
/// Inside texels map above 128, outside below; the distance saturates at
/// `border`.
pub fn distance_field(coverage: &[u8], width: usize, height: usize, border: u32) -> Vec<u8> {
    let border = border as i32;
    let out_w = width as i32 + 2 * border;
    let out_h = height as i32 + 2 * border;
    let inside = |x: i32, y: i32| -> bool {
        let (cx, cy) = (x - border, y - border);
        if cx < 0 || cy < 0 || cx >= width as i32 || cy >= height as i32 {
            return false;
        }
        coverage[cy as usize * width + cx as usize] >= 128
    };

    let spread = border.max(1) as f32;
    let mut field = Vec::with_capacity((out_w * out_h) as usize);
    for y in 0..out_h {
        for x in 0..out_w {
            let here = inside(x, y);
            let mut nearest = spread;
            for dy in -border..=border {
                for dx in -border..=border {
                    if inside(x + dx, y + dy) != here {
                        let d = ((dx * dx + dy * dy) as f32).sqrt() - 0.5;
                        nearest = nearest.min(d.max(0.0));
                    }
                }
            }
            let signed = if here { nearest } else { -nearest };
            let value = (0.5 + signed / (2.0 * spread)).clamp(0.0, 1.0);
            field.push((value * 255.0).round() as u8);
        }
    }
    field
}
