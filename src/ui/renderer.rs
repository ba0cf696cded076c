//! Frame compositor for the ticker widget.
//!
//! Owns the GPU backend and every resource drawn through it. Each
//! [`Compositor::render`] call lays out the price label and caption, sizes
//! the surface, then draws the text layer and the sparkline into one frame.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::font::{FontAsset, FontData, FontError, FontMetrics};
use crate::ticker::Trend;
use crate::ui::backend::{
    BackendError, BufferId, ProgramId, RenderBackend, TextureId, UniformValue,
};
use crate::ui::plot::{LinePlot, PlotTransform};
use crate::ui::text::{
    layout_text, TextLayout, FONT_COLOR, FONT_TEX, HINT_AMOUNT, SDF_BORDER_SIZE, SDF_TEX_SIZE,
    SUBPIXEL_AMOUNT, TEXT_PROGRAM, TRANSFORM,
};
use crate::ui::vertex::{VertexBuffer, DEFAULT_VERTEX_CAPACITY};

#[derive(Error, Debug)]
pub enum RendererError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Compositor has been torn down")]
    TornDown,
}

/// Colors used by the widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub up: [f32; 4],
    pub down: [f32; 4],
    pub text: [f32; 4],
}

impl Palette {
    pub fn trend_color(&self, trend: Trend) -> [f32; 4] {
        match trend {
            Trend::Up => self.up,
            Trend::Down => self.down,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            up: [0.055, 0.796, 0.506, 1.0],
            down: [0.965, 0.275, 0.365, 1.0],
            text: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

/// Sizes and colors for a [`Compositor`].
#[derive(Debug, Clone)]
pub struct TickerStyle {
    /// Price label size in CSS pixels
    pub top_size: f32,
    /// Caption size in CSS pixels
    pub bottom_size: f32,
    pub line_gap: f32,
    pub palette: Palette,
    /// Text vertex buffer capacity in floats
    pub vertex_capacity: usize,
    pub plot: PlotTransform,
}

impl Default for TickerStyle {
    fn default() -> Self {
        Self {
            top_size: 32.0,
            bottom_size: 14.0,
            line_gap: 0.0,
            palette: Palette::default(),
            vertex_capacity: DEFAULT_VERTEX_CAPACITY,
            plot: PlotTransform::default(),
        }
    }
}

/// Element size in CSS pixels and the device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
}

/// Resolved surface size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasGeometry {
    /// Backing store width in device pixels (always even)
    pub backing_width: u32,
    /// Backing store height in device pixels (always even)
    pub backing_height: u32,
    /// CSS box matching the backing store
    pub css_width: f32,
    pub css_height: f32,
    pub pixel_ratio: f32,
}

impl CanvasGeometry {
    pub fn from_canvas(canvas: CanvasSize) -> Self {
        let ratio = if canvas.pixel_ratio > 0.0 {
            canvas.pixel_ratio
        } else {
            1.0
        };
        let backing_width = even_pixels(canvas.width * ratio).max(2);
        let backing_height = even_pixels(canvas.height * ratio).max(2);
        Self {
            backing_width,
            backing_height,
            css_width: backing_width as f32 / ratio,
            css_height: backing_height as f32 / ratio,
            pixel_ratio: ratio,
        }
    }
}

/// Round a pixel count to the nearest even number; halves round away from
/// zero, so 201 becomes 202.
pub fn even_pixels(value: f32) -> u32 {
    ((value.max(0.0) / 2.0).round() * 2.0) as u32
}

/// Column-major transform from design space (CSS pixels, y up, origin at
/// the canvas center) shifted by `offset` into clip space.
pub fn screen_transform(geometry: &CanvasGeometry, offset: [f32; 2]) -> [f32; 9] {
    let sx = 2.0 * geometry.pixel_ratio / geometry.backing_width as f32;
    let sy = 2.0 * geometry.pixel_ratio / geometry.backing_height as f32;
    [
        sx,
        0.0,
        0.0,
        0.0,
        sy,
        0.0,
        sx * offset[0],
        sy * offset[1],
        1.0,
    ]
}

/// Offset that centers the caption horizontally and both lines vertically.
pub fn text_offset(top: &TextLayout, bottom: &TextLayout) -> [f32; 2] {
    let height = top.bounds.height + bottom.bounds.height;
    [
        (-0.5 * bottom.bounds.width).round(),
        (0.5 * height).round(),
    ]
}

/// Input for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub top_text: &'a str,
    pub bottom_text: &'a str,
    pub series: &'a [f32],
    pub trend: Trend,
}

/// What a frame drew.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub top: TextLayout,
    pub bottom: TextLayout,
    pub plot_points: u32,
    pub text_drawn: bool,
    pub geometry: CanvasGeometry,
}

enum AtlasState {
    Pending,
    Ready(FontData),
    Failed(String),
}

/// Draws the ticker's text and sparkline through a [`RenderBackend`].
pub struct Compositor<B: RenderBackend> {
    backend: B,
    style: TickerStyle,
    text_program: ProgramId,
    text_buffer: BufferId,
    texture: TextureId,
    vertices: VertexBuffer,
    plot: LinePlot,
    atlas: AtlasState,
    metrics: HashMap<u32, FontMetrics>,
    geometry: Option<CanvasGeometry>,
    released: bool,
}

fn cached_metrics(
    cache: &mut HashMap<u32, FontMetrics>,
    font: &FontData,
    size: f32,
    line_gap: f32,
) -> FontMetrics {
    *cache
        .entry(size.to_bits())
        .or_insert_with(|| FontMetrics::new(font, size, line_gap))
}

impl<B: RenderBackend> Compositor<B> {
    /// Build programs and buffers. Fails if either program does not build.
    ///
    /// The text layer stays off until [`Compositor::atlas_loaded`] delivers
    /// a font.
    pub fn new(mut backend: B, style: TickerStyle) -> Result<Self, RendererError> {
        let text_program = backend.create_program(&TEXT_PROGRAM)?;
        let text_buffer = backend.create_buffer("Text Vertex Buffer", style.vertex_capacity)?;
        let texture = backend.create_texture("Glyph Atlas Texture")?;
        let plot = LinePlot::new(&mut backend, style.plot)?;

        Ok(Self {
            backend,
            vertices: VertexBuffer::with_capacity(style.vertex_capacity),
            style,
            text_program,
            text_buffer,
            texture,
            plot,
            atlas: AtlasState::Pending,
            metrics: HashMap::new(),
            geometry: None,
            released: false,
        })
    }

    /// Build a compositor with its font already available.
    pub fn with_font(backend: B, style: TickerStyle, asset: FontAsset) -> Result<Self, RendererError> {
        let mut compositor = Self::new(backend, style)?;
        compositor.atlas_loaded(Ok(asset))?;
        Ok(compositor)
    }

    /// Deliver the result of loading the font atlas.
    ///
    /// A failed load is logged and leaves the text layer off; the plot keeps
    /// drawing.
    pub fn atlas_loaded(&mut self, result: Result<FontAsset, FontError>) -> Result<(), RendererError> {
        match result {
            Ok(asset) => {
                self.backend.upload_texture(self.texture, &asset.image)?;
                info!(
                    "Glyph atlas ready: {} glyphs, {}x{}",
                    asset.data.glyphs.len(),
                    asset.image.width,
                    asset.image.height
                );
                self.metrics.clear();
                self.atlas = AtlasState::Ready(asset.data);
            }
            Err(e) => {
                warn!("Glyph atlas failed to load, text disabled: {}", e);
                self.atlas = AtlasState::Failed(e.to_string());
            }
        }
        Ok(())
    }

    pub fn text_ready(&self) -> bool {
        matches!(self.atlas, AtlasState::Ready(_))
    }

    /// Why the atlas failed to load, if it did.
    pub fn atlas_error(&self) -> Option<&str> {
        match &self.atlas {
            AtlasState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Draw one frame.
    pub fn render(&mut self, frame: &Frame<'_>, canvas: CanvasSize) -> Result<FrameStats, RendererError> {
        if self.released {
            return Err(RendererError::TornDown);
        }

        let text = self.layout_frame(frame);
        if text.is_some() {
            self.backend
                .write_buffer(self.text_buffer, self.vertices.as_slice())?;
        }
        let (top, bottom) = text.unwrap_or_default();

        let geometry = CanvasGeometry::from_canvas(canvas);
        let resized = self.geometry.map_or(true, |g| {
            (g.backing_width, g.backing_height) != (geometry.backing_width, geometry.backing_height)
        });
        if resized {
            debug!(
                "Resizing surface to {}x{}",
                geometry.backing_width, geometry.backing_height
            );
            self.backend
                .resize(geometry.backing_width, geometry.backing_height);
        }
        self.geometry = Some(geometry);

        self.backend.clear([0.0, 0.0, 0.0, 0.0]);

        let trend_color = self.style.palette.trend_color(frame.trend);
        let text_drawn = self.draw_text(&geometry, &top, &bottom, trend_color)?;

        let plot_points = self.plot.update(&mut self.backend, frame.series)?;
        self.plot.draw(&mut self.backend, trend_color)?;

        self.backend.present()?;

        debug!(
            "Frame: {} + {} text vertices, {} plot points",
            top.vertex_count, bottom.vertex_count, plot_points
        );

        Ok(FrameStats {
            top,
            bottom,
            plot_points,
            text_drawn,
            geometry,
        })
    }

    fn layout_frame(&mut self, frame: &Frame<'_>) -> Option<(TextLayout, TextLayout)> {
        let AtlasState::Ready(font) = &self.atlas else {
            return None;
        };
        self.vertices.clear();

        let top_metrics = cached_metrics(
            &mut self.metrics,
            font,
            self.style.top_size,
            self.style.line_gap,
        );
        let top = layout_text(
            frame.top_text,
            font,
            &top_metrics,
            [0.0, 0.0],
            &mut self.vertices,
        );

        let bottom_metrics = cached_metrics(
            &mut self.metrics,
            font,
            self.style.bottom_size,
            self.style.line_gap,
        );
        let bottom = layout_text(
            frame.bottom_text,
            font,
            &bottom_metrics,
            [0.0, top.bounds.bottom()],
            &mut self.vertices,
        );

        if top.truncated || bottom.truncated {
            warn!("Vertex buffer full, text truncated");
        }
        Some((top, bottom))
    }

    fn draw_text(
        &mut self,
        geometry: &CanvasGeometry,
        top: &TextLayout,
        bottom: &TextLayout,
        trend_color: [f32; 4],
    ) -> Result<bool, RendererError> {
        let AtlasState::Ready(font) = &self.atlas else {
            return Ok(false);
        };
        if top.is_empty() && bottom.is_empty() {
            return Ok(false);
        }

        let program = self.text_program;
        let transform = screen_transform(geometry, text_offset(top, bottom));
        let backend = &mut self.backend;

        backend.bind_texture(0, self.texture);
        backend.set_uniform(program, FONT_TEX, UniformValue::Sampler(0))?;
        backend.set_uniform(
            program,
            SDF_TEX_SIZE,
            UniformValue::Vec2([font.atlas_width as f32, font.atlas_height as f32]),
        )?;
        backend.set_uniform(program, SDF_BORDER_SIZE, UniformValue::Float(font.sdf_border))?;
        backend.set_uniform(program, TRANSFORM, UniformValue::Mat3(transform))?;
        backend.set_uniform(program, HINT_AMOUNT, UniformValue::Float(1.0))?;
        backend.set_uniform(program, SUBPIXEL_AMOUNT, UniformValue::Float(1.0))?;

        for (layout, color) in [(top, trend_color), (bottom, self.style.palette.text)] {
            if layout.is_empty() {
                continue;
            }
            backend.set_uniform(program, FONT_COLOR, UniformValue::Vec4(color))?;
            backend.draw(program, self.text_buffer, layout.vertex_range())?;
        }
        Ok(true)
    }

    /// Release every GPU resource. Later renders fail with
    /// [`RendererError::TornDown`].
    pub fn teardown(&mut self) {
        if self.released {
            return;
        }
        self.backend.delete_program(self.text_program);
        self.backend.delete_buffer(self.text_buffer);
        self.backend.delete_texture(self.texture);
        self.plot.release(&mut self.backend);
        self.released = true;
        debug!("Compositor resources released");
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn style(&self) -> &TickerStyle {
        &self.style
    }

    /// Geometry of the last rendered frame.
    pub fn geometry(&self) -> Option<CanvasGeometry> {
        self.geometry
    }

    pub fn text_program(&self) -> ProgramId {
        self.text_program
    }

    pub fn plot_program(&self) -> ProgramId {
        self.plot.program()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::backend::{Command, RecordingBackend};
    use crate::ui::text::TextBounds;
    use approx::assert_relative_eq;

    #[test]
    fn test_even_pixels() {
        assert_eq!(even_pixels(200.0), 200);
        assert_eq!(even_pixels(201.0), 202);
        assert_eq!(even_pixels(200.6), 200);
        assert_eq!(even_pixels(-3.0), 0);
    }

    #[test]
    fn test_geometry_applies_pixel_ratio() {
        let geometry = CanvasGeometry::from_canvas(CanvasSize {
            width: 200.0,
            height: 67.0,
            pixel_ratio: 1.5,
        });
        // 300 and 100.5 device pixels
        assert_eq!(geometry.backing_width, 300);
        assert_eq!(geometry.backing_height, 100);
        assert_relative_eq!(geometry.css_height, 100.0 / 1.5);
    }

    #[test]
    fn test_geometry_odd_width() {
        let geometry = CanvasGeometry::from_canvas(CanvasSize {
            width: 201.0,
            height: 67.0,
            pixel_ratio: 1.0,
        });
        assert_eq!(geometry.backing_width, 202);
        assert_eq!(geometry.backing_height, 68);
    }

    #[test]
    fn test_screen_transform_maps_edges() {
        let geometry = CanvasGeometry::from_canvas(CanvasSize {
            width: 200.0,
            height: 100.0,
            pixel_ratio: 2.0,
        });
        let m = screen_transform(&geometry, [0.0, 0.0]);
        // x = 100 css px reaches the right edge
        assert_relative_eq!(m[0] * 100.0, 1.0);
        assert_relative_eq!(m[4] * 50.0, 1.0);

        let shifted = screen_transform(&geometry, [-10.0, 20.0]);
        assert_relative_eq!(shifted[6], -0.1);
        assert_relative_eq!(shifted[7], 0.4);
        assert_eq!(shifted[8], 1.0);
    }

    #[test]
    fn test_text_offset_centers_caption() {
        let layout = |width: f32, height: f32| TextLayout {
            bounds: TextBounds {
                x: 0.0,
                y: 0.0,
                width,
                height,
            },
            ..TextLayout::default()
        };
        let offset = text_offset(&layout(120.0, 40.0), &layout(61.0, 17.0));
        assert_eq!(offset, [-31.0, 29.0]);
    }

    #[test]
    fn test_palette_trend_colors() {
        let palette = Palette::default();
        assert_eq!(palette.trend_color(Trend::Up), palette.up);
        assert_eq!(palette.trend_color(Trend::Down), palette.down);
    }

    #[test]
    fn test_program_failure_is_fatal() {
        let backend = RecordingBackend::new().fail_program(TEXT_PROGRAM.label);
        let result = Compositor::new(backend, TickerStyle::default());
        assert!(matches!(
            result,
            Err(RendererError::Backend(BackendError::ProgramLink { .. }))
        ));
    }

    #[test]
    fn test_pending_atlas_draws_plot_only() {
        let mut compositor =
            Compositor::new(RecordingBackend::new(), TickerStyle::default()).unwrap();
        assert!(!compositor.text_ready());

        let stats = compositor
            .render(
                &Frame {
                    top_text: "100.00",
                    bottom_text: "BTC/USDT",
                    series: &[1.0, 2.0],
                    trend: Trend::Up,
                },
                CanvasSize {
                    width: 200.0,
                    height: 67.0,
                    pixel_ratio: 1.0,
                },
            )
            .unwrap();

        assert!(!stats.text_drawn);
        assert_eq!(stats.plot_points, 2);
        let draws: Vec<_> = compositor
            .backend()
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. }))
            .collect();
        assert_eq!(draws.len(), 1);
    }

    #[test]
    fn test_clear_precedes_draws() {
        let mut compositor =
            Compositor::new(RecordingBackend::new(), TickerStyle::default()).unwrap();
        compositor
            .render(
                &Frame {
                    top_text: "",
                    bottom_text: "",
                    series: &[3.0, 2.0, 1.0],
                    trend: Trend::Down,
                },
                CanvasSize {
                    width: 100.0,
                    height: 50.0,
                    pixel_ratio: 1.0,
                },
            )
            .unwrap();
        let commands = compositor.backend().commands();
        let clear = commands
            .iter()
            .position(|c| *c == Command::Clear { color: [0.0; 4] })
            .unwrap();
        let draw = commands
            .iter()
            .position(|c| matches!(c, Command::Draw { .. }))
            .unwrap();
        assert!(clear < draw);
        assert_eq!(commands.last(), Some(&Command::Present));
    }
}
