//! Fixed-capacity float vertex storage.

/// Default capacity of a [`VertexBuffer`] in floats.
pub const DEFAULT_VERTEX_CAPACITY: usize = 100_000;

/// Text vertex layout: position, atlas UV and glyph scale.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TextVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub scale: f32,
}

impl TextVertex {
    pub const FLOATS: usize = 5;
}

/// Plot vertex layout: clip-space position.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PlotVertex {
    pub position: [f32; 2],
}

impl PlotVertex {
    pub const FLOATS: usize = 2;
}

/// A flat `f32` buffer that never grows past its capacity.
///
/// Writers check [`VertexBuffer::remaining`] and stop instead of
/// overflowing; the buffer is rewritten from the start every frame.
#[derive(Debug, Clone)]
pub struct VertexBuffer {
    data: Vec<f32>,
    capacity: usize,
}

impl VertexBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of floats written.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Append `values` if they all fit. Returns `false` and writes nothing
    /// otherwise.
    pub fn push(&mut self, values: &[f32]) -> bool {
        if values.len() > self.remaining() {
            return false;
        }
        self.data.extend_from_slice(values);
        true
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// View the contents as text vertices, if the length is a whole number
    /// of records.
    pub fn text_vertices(&self) -> Option<&[TextVertex]> {
        bytemuck::try_cast_slice(&self.data).ok()
    }

    pub fn plot_vertices(&self) -> Option<&[PlotVertex]> {
        bytemuck::try_cast_slice(&self.data).ok()
    }
}

impl Default for VertexBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_VERTEX_CAPACITY)
    }
}
