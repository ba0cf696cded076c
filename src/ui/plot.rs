//! Price sparkline.
//!
//! The series is normalized against its own maximum and drawn as one flat
//! colored line strip.

use crate::ui::backend::{
    BackendError, BufferId, Primitive, ProgramDesc, ProgramId, RenderBackend, UniformDecl,
    UniformKind, UniformValue, VertexAttribute,
};
use crate::ui::vertex::PlotVertex;

pub const PLOT_COLOR: &str = "color";
pub const PLOT_SCALE: &str = "scale";
pub const PLOT_OFFSET: &str = "offset";

/// Most points a [`LinePlot`] uploads; longer series keep their tail.
pub const MAX_PLOT_POINTS: usize = 1024;

/// Flat-color line program. Uniform order matches `PlotUniforms` in
/// `plot.wgsl`.
pub const PLOT_PROGRAM: ProgramDesc = ProgramDesc {
    label: "line_plot",
    source: include_str!("shaders/plot.wgsl"),
    primitive: Primitive::LineStrip,
    attributes: &[VertexAttribute { name: "coordinates", components: 2 }],
    uniforms: &[
        UniformDecl { name: PLOT_COLOR, kind: UniformKind::Vec4 },
        UniformDecl { name: PLOT_SCALE, kind: UniformKind::Vec2 },
        UniformDecl { name: PLOT_OFFSET, kind: UniformKind::Vec2 },
    ],
};

/// Map a series to line strip coordinates.
///
/// Sample `i` of `n` lands at `x = i / (n - 1) * 2 - 1` and
/// `y = v / max * 6 - 5 - 1.25`. An empty series yields nothing; a single
/// sample yields a flat segment across the full width. A non-positive
/// maximum leaves samples unscaled.
pub fn normalize_series(series: &[f32]) -> Vec<f32> {
    let max = series.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let divisor = if max > 0.0 && max.is_finite() { max } else { 1.0 };
    let y_of = |v: f32| (v / divisor) * 6.0 - 5.0 - 1.25;

    match series {
        [] => Vec::new(),
        [only] => {
            let y = y_of(*only);
            vec![-1.0, y, 1.0, y]
        }
        _ => {
            let last = (series.len() - 1) as f32;
            series
                .iter()
                .enumerate()
                .flat_map(|(i, &v)| [(i as f32 / last) * 2.0 - 1.0, y_of(v)])
                .collect()
        }
    }
}

/// Display transform applied to plot coordinates in the vertex shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotTransform {
    pub scale: [f32; 2],
    pub offset: [f32; 2],
}

impl Default for PlotTransform {
    fn default() -> Self {
        Self {
            scale: [1.0, 1.0],
            offset: [0.0, 0.0],
        }
    }
}

/// GPU side of the sparkline: program, vertex buffer and point count.
pub struct LinePlot {
    program: ProgramId,
    buffer: BufferId,
    points: u32,
    transform: PlotTransform,
}

impl LinePlot {
    pub fn new<B: RenderBackend>(
        backend: &mut B,
        transform: PlotTransform,
    ) -> Result<Self, BackendError> {
        let program = backend.create_program(&PLOT_PROGRAM)?;
        let buffer = backend.create_buffer("Plot Vertex Buffer", MAX_PLOT_POINTS * PlotVertex::FLOATS)?;
        Ok(Self {
            program,
            buffer,
            points: 0,
            transform,
        })
    }

    /// Normalize and upload `series`. Returns the number of points.
    pub fn update<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        series: &[f32],
    ) -> Result<u32, BackendError> {
        let tail = &series[series.len().saturating_sub(MAX_PLOT_POINTS)..];
        let vertices = normalize_series(tail);
        backend.write_buffer(self.buffer, &vertices)?;
        self.points = (vertices.len() / PlotVertex::FLOATS) as u32;
        Ok(self.points)
    }

    /// Draw the uploaded line in `color`. Nothing is drawn for an empty
    /// series.
    pub fn draw<B: RenderBackend>(
        &self,
        backend: &mut B,
        color: [f32; 4],
    ) -> Result<(), BackendError> {
        if self.points == 0 {
            return Ok(());
        }
        backend.set_uniform(self.program, PLOT_SCALE, UniformValue::Vec2(self.transform.scale))?;
        backend.set_uniform(self.program, PLOT_OFFSET, UniformValue::Vec2(self.transform.offset))?;
        backend.set_uniform(self.program, PLOT_COLOR, UniformValue::Vec4(color))?;
        backend.draw(self.program, self.buffer, 0..self.points)
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn release<B: RenderBackend>(&self, backend: &mut B) {
        backend.delete_program(self.program);
        backend.delete_buffer(self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::backend::{Command, RecordingBackend};
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_three_samples() {
        let v = normalize_series(&[10.0, 20.0, 30.0]);
        let xs: Vec<f32> = v.chunks(2).map(|p| p[0]).collect();
        assert_eq!(xs, vec![-1.0, 0.0, 1.0]);
        assert_relative_eq!(v[5], -0.25);
        assert_relative_eq!(v[1], 2.0 - 5.0 - 1.25);
    }

    #[test]
    fn test_normalize_degenerate_series() {
        assert!(normalize_series(&[]).is_empty());
        let single = normalize_series(&[42.0]);
        assert_eq!(single, vec![-1.0, -0.25, 1.0, -0.25]);
    }

    #[test]
    fn test_normalize_non_positive_max() {
        let v = normalize_series(&[0.0, 0.0]);
        assert_relative_eq!(v[1], -6.25);
    }

    #[test]
    fn test_plot_draw_uses_line_strip_and_color() {
        let mut backend = RecordingBackend::new();
        let mut plot = LinePlot::new(&mut backend, PlotTransform::default()).unwrap();
        assert_eq!(plot.update(&mut backend, &[1.0, 2.0, 3.0, 4.0]).unwrap(), 4);
        plot.draw(&mut backend, [0.0, 1.0, 0.0, 1.0]).unwrap();

        let commands = backend.commands();
        let color_at = commands
            .iter()
            .position(|c| matches!(c, Command::SetUniform { name: PLOT_COLOR, .. }))
            .unwrap();
        let draw_at = commands
            .iter()
            .position(|c| {
                matches!(
                    c,
                    Command::Draw {
                        primitive: Primitive::LineStrip,
                        count: 4,
                        ..
                    }
                )
            })
            .unwrap();
        assert!(color_at < draw_at);
        assert_eq!(
            backend.uniform(plot.program(), PLOT_COLOR),
            Some(UniformValue::Vec4([0.0, 1.0, 0.0, 1.0]))
        );
    }

    #[test]
    fn test_plot_skips_empty_series() {
        let mut backend = RecordingBackend::new();
        let mut plot = LinePlot::new(&mut backend, PlotTransform::default()).unwrap();
        plot.update(&mut backend, &[]).unwrap();
        plot.draw(&mut backend, [1.0; 4]).unwrap();
        assert!(!backend
            .commands()
            .iter()
            .any(|c| matches!(c, Command::Draw { .. })));
    }

    #[test]
    fn test_plot_keeps_series_tail() {
        let mut backend = RecordingBackend::new();
        let mut plot = LinePlot::new(&mut backend, PlotTransform::default()).unwrap();
        let series: Vec<f32> = (0..MAX_PLOT_POINTS + 10).map(|i| i as f32).collect();
        assert_eq!(
            plot.update(&mut backend, &series).unwrap(),
            MAX_PLOT_POINTS as u32
        );
    }
}
