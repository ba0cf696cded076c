//! Text layout into SDF glyph quads.
//!
//! Each glyph becomes two triangles (six vertices of five floats: position,
//! atlas UV, glyph scale) appended to a shared [`VertexBuffer`]. Layout works
//! in design-space pixels with y pointing up; the baseline of the first line
//! sits `ascent` below the origin.

use std::ops::Range;

use crate::font::{FontData, FontMetrics, GlyphDescriptor};
use crate::ui::backend::{
    Primitive, ProgramDesc, UniformDecl, UniformKind, VertexAttribute,
};
use crate::ui::vertex::{TextVertex, VertexBuffer};

/// Vertices emitted per glyph.
pub const VERTICES_PER_GLYPH: usize = 6;

/// Floats emitted per glyph.
pub const FLOATS_PER_GLYPH: usize = VERTICES_PER_GLYPH * TextVertex::FLOATS;

/// Character drawn in place of glyphs missing from the font.
pub const REPLACEMENT_CHAR: char = '?';

pub const FONT_TEX: &str = "font_tex";
pub const SDF_TEX_SIZE: &str = "sdf_tex_size";
pub const SDF_BORDER_SIZE: &str = "sdf_border_size";
pub const TRANSFORM: &str = "transform";
pub const HINT_AMOUNT: &str = "hint_amount";
pub const SUBPIXEL_AMOUNT: &str = "subpixel_amount";
pub const FONT_COLOR: &str = "font_color";

/// SDF text program. Uniform order matches `TextUniforms` in `text.wgsl`.
pub const TEXT_PROGRAM: ProgramDesc = ProgramDesc {
    label: "sdf_text",
    source: include_str!("shaders/text.wgsl"),
    primitive: Primitive::Triangles,
    attributes: &[
        VertexAttribute { name: "pos", components: 2 },
        VertexAttribute { name: "tex", components: 2 },
        VertexAttribute { name: "scale", components: 1 },
    ],
    uniforms: &[
        UniformDecl { name: FONT_TEX, kind: UniformKind::Sampler },
        UniformDecl { name: TRANSFORM, kind: UniformKind::Mat3 },
        UniformDecl { name: FONT_COLOR, kind: UniformKind::Vec4 },
        UniformDecl { name: SDF_TEX_SIZE, kind: UniformKind::Vec2 },
        UniformDecl { name: SDF_BORDER_SIZE, kind: UniformKind::Float },
        UniformDecl { name: HINT_AMOUNT, kind: UniformKind::Float },
        UniformDecl { name: SUBPIXEL_AMOUNT, kind: UniformKind::Float },
    ],
};

/// Axis-aligned box in design space. `y` is the top edge.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextBounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextBounds {
    pub fn bottom(&self) -> f32 {
        self.y - self.height
    }
}

/// Result of laying out one string.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextLayout {
    /// Index of the first vertex written
    pub first_vertex: u32,
    pub vertex_count: u32,
    /// Pen position after the last character
    pub cursor: [f32; 2],
    pub bounds: TextBounds,
    /// Layout stopped early because the buffer was full
    pub truncated: bool,
}

impl TextLayout {
    pub fn vertex_range(&self) -> Range<u32> {
        self.first_vertex..self.first_vertex + self.vertex_count
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }
}

/// Look up `c`, falling back to the replacement glyph.
fn resolve_glyph(font: &FontData, c: char) -> Option<(char, &GlyphDescriptor)> {
    font.glyph(c)
        .map(|g| (c, g))
        .or_else(|| font.glyph(REPLACEMENT_CHAR).map(|g| (REPLACEMENT_CHAR, g)))
}

/// Build the six vertices of one glyph quad and return the advanced pen x.
///
/// `kern` moves the pen itself, so it shifts this glyph and everything
/// after it.
fn glyph_quad(
    font: &FontData,
    metrics: &FontMetrics,
    glyph: &GlyphDescriptor,
    pen: [f32; 2],
    kern: f32,
    out: &mut [f32; FLOATS_PER_GLYPH],
) -> f32 {
    let scale = metrics.scale_for(glyph);
    let stretch = font.aspect * scale;
    let baseline = pen[1] - metrics.ascent;

    let pen_x = pen[0] + stretch * kern;
    let left = pen_x + stretch * glyph.bearing_x;
    let right = left + stretch * glyph.width as f32;
    let top = baseline + scale * glyph.bearing_y;
    let bottom = top - scale * glyph.height as f32;

    let atlas_w = font.atlas_width.max(1) as f32;
    let atlas_h = font.atlas_height.max(1) as f32;
    let u0 = glyph.x as f32 / atlas_w;
    let u1 = (glyph.x + glyph.width) as f32 / atlas_w;
    let v0 = glyph.y as f32 / atlas_h;
    let v1 = (glyph.y + glyph.height) as f32 / atlas_h;

    let corners = [
        [left, top, u0, v0],
        [right, top, u1, v0],
        [left, bottom, u0, v1],
        [right, top, u1, v0],
        [right, bottom, u1, v1],
        [left, bottom, u0, v1],
    ];
    for (i, [x, y, u, v]) in corners.into_iter().enumerate() {
        out[i * TextVertex::FLOATS..(i + 1) * TextVertex::FLOATS]
            .copy_from_slice(&[x, y, u, v, scale]);
    }

    pen_x + stretch * glyph.advance
}

/// Lay out `text` starting at `origin`, appending glyph quads to `buffer`.
///
/// Spaces advance the pen by `space_advance * cap_scale` and emit nothing;
/// `\n` returns the pen to `origin.x` one line lower. Characters missing
/// from the font draw the replacement glyph, or advance like a space when
/// the font lacks that too. Layout stops at the first glyph that does not
/// fit in the buffer.
pub fn layout_text(
    text: &str,
    font: &FontData,
    metrics: &FontMetrics,
    origin: [f32; 2],
    buffer: &mut VertexBuffer,
) -> TextLayout {
    let start_floats = buffer.len();
    let mut pen = origin;
    let mut x_max = origin[0];
    let mut prev: Option<char> = None;
    let mut truncated = false;
    let mut quad = [0.0f32; FLOATS_PER_GLYPH];

    for c in text.chars() {
        if c == '\n' {
            x_max = x_max.max(pen[0]);
            pen[0] = origin[0];
            pen[1] -= metrics.line_height;
            prev = None;
            continue;
        }
        if c == ' ' {
            pen[0] += font.space_advance * metrics.cap_scale;
            prev = None;
            continue;
        }

        let Some((glyph_char, glyph)) = resolve_glyph(font, c) else {
            tracing::debug!("No glyph for {:?}, advancing as space", c);
            pen[0] += font.space_advance * metrics.cap_scale;
            prev = None;
            continue;
        };

        if buffer.remaining() < FLOATS_PER_GLYPH {
            truncated = true;
            break;
        }

        let kern = prev.map_or(0.0, |p| font.kern(p, glyph_char));
        pen[0] = glyph_quad(font, metrics, glyph, pen, kern, &mut quad);
        buffer.push(&quad);
        prev = Some(glyph_char);
    }
    x_max = x_max.max(pen[0]);

    let written = buffer.len() - start_floats;
    TextLayout {
        first_vertex: (start_floats / TextVertex::FLOATS) as u32,
        vertex_count: (written / TextVertex::FLOATS) as u32,
        cursor: pen,
        bounds: TextBounds {
            x: origin[0],
            y: origin[1],
            width: x_max - origin[0],
            height: origin[1] - pen[1] + metrics.line_height,
        },
        truncated,
    }
}
