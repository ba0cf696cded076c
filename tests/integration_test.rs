//! Integration tests for the ticker compositor
//!
//! Tests the full pipeline: font asset → layout → backend commands

use std::collections::HashMap;

use coin_ticker::font::{AtlasImage, FontAsset, FontData, FontError, GlyphDescriptor};
use coin_ticker::ticker::{format_price, PriceHistory, Trend};
use coin_ticker::ui::backend::{BackendError, Command, RecordingBackend, UniformValue};
use coin_ticker::ui::plot::PLOT_PROGRAM;
use coin_ticker::ui::renderer::{
    CanvasSize, Compositor, Frame, RendererError, TickerStyle,
};
use coin_ticker::ui::text::{FONT_COLOR, TRANSFORM};

fn glyph(x: u32) -> GlyphDescriptor {
    GlyphDescriptor {
        x,
        y: 0,
        width: 10,
        height: 20,
        bearing_x: 0.0,
        bearing_y: 16.0,
        advance: 10.0,
        lowercase: false,
    }
}

/// Two-glyph font ("A" and "B") with a blank 20x20 atlas
fn two_glyph_font() -> FontAsset {
    let mut glyphs = HashMap::new();
    glyphs.insert('A', glyph(0));
    glyphs.insert('B', glyph(10));
    let data = FontData {
        ascent: 16.0,
        descent: 4.0,
        line_gap: 0.0,
        cap_height: 16.0,
        x_height: 10.0,
        space_advance: 5.0,
        aspect: 1.0,
        sdf_border: 2.0,
        atlas_width: 20,
        atlas_height: 20,
        glyphs,
        kerning: Vec::new(),
    };
    let image = AtlasImage::new(20, 20, vec![0; 400]).expect("atlas size");
    FontAsset { data, image }
}

fn canvas(width: f32, height: f32) -> CanvasSize {
    CanvasSize {
        width,
        height,
        pixel_ratio: 1.0,
    }
}

fn style(top_size: f32) -> TickerStyle {
    TickerStyle {
        top_size,
        ..TickerStyle::default()
    }
}

/// `(color, count)` for every text draw, using the color set most recently
/// before it
fn text_draws(compositor: &Compositor<RecordingBackend>) -> Vec<([f32; 4], u32)> {
    let text_program = compositor.text_program();
    let mut color = None;
    let mut draws = Vec::new();
    for command in compositor.backend().commands() {
        match command {
            Command::SetUniform {
                program,
                name,
                value: UniformValue::Vec4(c),
            } if *program == text_program && *name == FONT_COLOR => color = Some(*c),
            Command::Draw { program, count, .. } if *program == text_program => {
                draws.push((color.expect("font_color set before draw"), *count));
            }
            _ => {}
        }
    }
    draws
}

fn plot_draw_count(compositor: &Compositor<RecordingBackend>) -> Option<u32> {
    let plot_program = compositor.plot_program();
    compositor
        .backend()
        .commands()
        .iter()
        .find_map(|c| match c {
            Command::Draw { program, count, .. } if *program == plot_program => Some(*count),
            _ => None,
        })
}

/// Render "AB" at 24 px and check the text buffer and draw range
#[test]
fn test_two_glyphs_emit_twelve_vertices() {
    let mut compositor =
        Compositor::with_font(RecordingBackend::new(), style(24.0), two_glyph_font()).unwrap();

    let stats = compositor
        .render(
            &Frame {
                top_text: "AB",
                bottom_text: "",
                series: &[1.0, 2.0, 3.0],
                trend: Trend::Up,
            },
            canvas(200.0, 67.0),
        )
        .unwrap();

    assert!(stats.text_drawn);
    assert_eq!(stats.top.vertex_count, 12);
    assert_eq!(stats.bottom.vertex_count, 0);

    let writes: Vec<usize> = compositor
        .backend()
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::WriteBuffer { floats, .. } => Some(*floats),
            _ => None,
        })
        .collect();
    // text buffer, then the three-point plot
    assert_eq!(writes, vec![60, 6]);

    let palette = compositor.style().palette;
    assert_eq!(text_draws(&compositor), vec![(palette.up, 12)]);
    assert_eq!(plot_draw_count(&compositor), Some(3));
}

#[test]
fn test_each_line_gets_its_own_color() {
    let mut compositor =
        Compositor::with_font(RecordingBackend::new(), style(24.0), two_glyph_font()).unwrap();
    compositor
        .render(
            &Frame {
                top_text: "ABBA",
                bottom_text: "BA",
                series: &[3.0, 2.0],
                trend: Trend::Down,
            },
            canvas(200.0, 67.0),
        )
        .unwrap();

    let palette = compositor.style().palette;
    assert_eq!(
        text_draws(&compositor),
        vec![(palette.down, 24), (palette.text, 12)]
    );
    assert_eq!(
        compositor
            .backend()
            .uniform(compositor.plot_program(), "color"),
        Some(UniformValue::Vec4(palette.down))
    );
}

#[test]
fn test_caption_sits_below_price() {
    let mut compositor =
        Compositor::with_font(RecordingBackend::new(), style(24.0), two_glyph_font()).unwrap();
    let stats = compositor
        .render(
            &Frame {
                top_text: "A",
                bottom_text: "B",
                series: &[],
                trend: Trend::Up,
            },
            canvas(200.0, 67.0),
        )
        .unwrap();

    assert_eq!(stats.bottom.first_vertex, 6);
    assert_eq!(stats.bottom.bounds.y, stats.top.bounds.bottom());
    assert!(stats.bottom.bounds.y < stats.top.bounds.y);
    // No series, no plot draw
    assert_eq!(stats.plot_points, 0);
    assert_eq!(plot_draw_count(&compositor), None);
}

#[test]
fn test_odd_canvas_rounds_to_even_backing_size() {
    let mut compositor =
        Compositor::with_font(RecordingBackend::new(), style(24.0), two_glyph_font()).unwrap();
    let frame = Frame {
        top_text: "AB",
        bottom_text: "",
        series: &[1.0],
        trend: Trend::Up,
    };

    let stats = compositor.render(&frame, canvas(201.0, 67.0)).unwrap();
    assert_eq!(stats.geometry.backing_width, 202);
    assert_eq!(stats.geometry.backing_height, 68);
    assert_eq!(compositor.backend().size(), (202, 68));

    match compositor
        .backend()
        .uniform(compositor.text_program(), TRANSFORM)
    {
        Some(UniformValue::Mat3(m)) => {
            assert_eq!(m[0], 2.0 / 202.0);
            assert_eq!(m[4], 2.0 / 68.0);
            assert_eq!(m[8], 1.0);
        }
        other => panic!("unexpected transform {:?}", other),
    }

    // Same size again does not resize
    compositor.backend_mut().take_commands();
    compositor.render(&frame, canvas(201.0, 67.0)).unwrap();
    assert!(!compositor
        .backend()
        .commands()
        .iter()
        .any(|c| matches!(c, Command::Resize { .. })));

    compositor.render(&frame, canvas(300.0, 67.0)).unwrap();
    assert_eq!(compositor.backend().size(), (300, 68));
}

#[test]
fn test_failed_atlas_still_draws_plot() {
    let mut compositor = Compositor::new(RecordingBackend::new(), style(24.0)).unwrap();
    compositor
        .atlas_loaded(Err(FontError::Io("missing.json: not found".to_string())))
        .unwrap();
    assert!(!compositor.text_ready());
    assert!(compositor.atlas_error().unwrap().contains("missing.json"));

    let stats = compositor
        .render(
            &Frame {
                top_text: "AB",
                bottom_text: "BTC/USDT",
                series: &[1.0, 4.0, 2.0],
                trend: Trend::Up,
            },
            canvas(200.0, 67.0),
        )
        .unwrap();

    assert!(!stats.text_drawn);
    assert!(text_draws(&compositor).is_empty());
    assert_eq!(plot_draw_count(&compositor), Some(3));
}

#[test]
fn test_plot_program_failure_is_fatal() {
    let backend = RecordingBackend::new().fail_program(PLOT_PROGRAM.label);
    match Compositor::new(backend, TickerStyle::default()) {
        Err(RendererError::Backend(BackendError::ProgramLink { label, .. })) => {
            assert_eq!(label, "line_plot");
        }
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("compositor built without a plot program"),
    }
}

#[test]
fn test_full_vertex_buffer_truncates_text() {
    let style = TickerStyle {
        top_size: 24.0,
        // Room for two glyphs
        vertex_capacity: 60,
        ..TickerStyle::default()
    };
    let mut compositor =
        Compositor::with_font(RecordingBackend::new(), style, two_glyph_font()).unwrap();
    let stats = compositor
        .render(
            &Frame {
                top_text: "ABA",
                bottom_text: "B",
                series: &[],
                trend: Trend::Up,
            },
            canvas(200.0, 67.0),
        )
        .unwrap();

    assert!(stats.top.truncated);
    assert_eq!(stats.top.vertex_count, 12);
    assert_eq!(stats.bottom.vertex_count, 0);
}

#[test]
fn test_teardown_releases_everything() {
    let mut compositor =
        Compositor::with_font(RecordingBackend::new(), style(24.0), two_glyph_font()).unwrap();
    assert_eq!(compositor.backend().live_resources(), 5);

    compositor.teardown();
    assert_eq!(compositor.backend().live_resources(), 0);

    // Idempotent
    compositor.teardown();
    let result = compositor.render(
        &Frame {
            top_text: "A",
            bottom_text: "",
            series: &[],
            trend: Trend::Up,
        },
        canvas(200.0, 67.0),
    );
    assert!(matches!(result, Err(RendererError::TornDown)));
}

#[test]
fn test_json_asset_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("font.json");
    let asset = two_glyph_font();
    std::fs::write(&json_path, asset.data.to_json().unwrap()).unwrap();
    std::fs::write(dir.path().join("font.r8"), &asset.image.pixels).unwrap();

    let loaded = FontAsset::load_json(&json_path).unwrap();
    assert_eq!(loaded.data.glyphs.len(), 2);

    let mut compositor =
        Compositor::with_font(RecordingBackend::new(), style(24.0), loaded).unwrap();
    let stats = compositor
        .render(
            &Frame {
                top_text: "BA",
                bottom_text: "",
                series: &[],
                trend: Trend::Up,
            },
            canvas(200.0, 67.0),
        )
        .unwrap();
    assert_eq!(stats.top.vertex_count, 12);
}

/// Price samples flowing through history into frames
#[test]
fn test_history_drives_trend_and_label() {
    let mut history = PriceHistory::new(4);
    let mut compositor =
        Compositor::with_font(RecordingBackend::new(), style(24.0), two_glyph_font()).unwrap();
    let palette = compositor.style().palette;

    for (price, expected) in [
        (100.0, palette.up),
        (99.5, palette.down),
        (99.5, palette.down),
        (101.0, palette.up),
    ] {
        history.push(price);
        let label = format_price(price);
        let series = history.series();
        compositor.backend_mut().take_commands();
        compositor
            .render(
                &Frame {
                    top_text: &label,
                    bottom_text: "AB",
                    series: &series,
                    trend: history.trend(),
                },
                canvas(200.0, 67.0),
            )
            .unwrap();
        assert_eq!(
            compositor
                .backend()
                .uniform(compositor.plot_program(), "color"),
            Some(UniformValue::Vec4(expected))
        );
    }
    assert_eq!(history.len(), 4);
}
