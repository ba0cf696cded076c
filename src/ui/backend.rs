//! Immediate-mode GPU backend abstraction.
//!
//! The compositor talks to the GPU through [`RenderBackend`], a small
//! WebGL-1-class surface: vertex buffers, programs with a fixed uniform
//! table, one texture unit binding table, and non-indexed draws.
//!
//! Uniforms are declared up front as `name -> kind` pairs on each
//! [`ProgramDesc`]; setting an undeclared name or a value of the wrong kind
//! is an error instead of a silent no-op.

use std::collections::HashMap;
use std::ops::Range;

use thiserror::Error;

use crate::font::AtlasImage;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("GPU unavailable: {0}")]
    Unsupported(String),

    #[error("Failed to build program {label}: {reason}")]
    ProgramLink { label: String, reason: String },

    #[error("Unknown uniform: {0}")]
    UnknownUniform(String),

    #[error("Uniform {name} expects {expected:?}, got {actual:?}")]
    UniformKind {
        name: String,
        expected: UniformKind,
        actual: UniformKind,
    },

    #[error("Unknown GPU resource: {0}")]
    UnknownResource(String),

    #[error("Buffer overflow: {len} floats into capacity {capacity}")]
    BufferOverflow { len: usize, capacity: usize },

    #[error("Draw reads past the uploaded vertex data")]
    DrawOutOfRange,

    #[error("No texture bound to unit {0}")]
    MissingTexture(u32),

    #[error("Surface error: {0}")]
    Surface(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Primitive assembly for a program's draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
    LineStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    /// Texture unit index
    Sampler,
    Float,
    Vec2,
    Vec4,
    /// Column-major 3x3 matrix
    Mat3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Sampler(u32),
    Float(f32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Sampler(_) => UniformKind::Sampler,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat3(_) => UniformKind::Mat3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: &'static str,
    pub kind: UniformKind,
}

/// A float vertex attribute; locations follow declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub components: u32,
}

/// Everything needed to build a program.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc {
    pub label: &'static str,
    /// WGSL source with `vs_main` and `fs_main` entry points
    pub source: &'static str,
    pub primitive: Primitive,
    pub attributes: &'static [VertexAttribute],
    pub uniforms: &'static [UniformDecl],
}

impl ProgramDesc {
    /// Floats per vertex.
    pub fn stride(&self) -> u32 {
        self.attributes.iter().map(|a| a.components).sum()
    }
}

/// Current uniform values of one program.
#[derive(Debug, Clone)]
pub struct UniformTable {
    decls: &'static [UniformDecl],
    values: Vec<Option<UniformValue>>,
}

impl UniformTable {
    pub fn new(decls: &'static [UniformDecl]) -> Self {
        Self {
            decls,
            values: vec![None; decls.len()],
        }
    }

    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<(), BackendError> {
        let index = self
            .decls
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| BackendError::UnknownUniform(name.to_string()))?;

        let expected = self.decls[index].kind;
        if value.kind() != expected {
            return Err(BackendError::UniformKind {
                name: name.to_string(),
                expected,
                actual: value.kind(),
            });
        }
        self.values[index] = Some(value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        let index = self.decls.iter().position(|d| d.name == name)?;
        self.values[index]
    }

    /// Texture unit of the program's sampler, if it declares one.
    pub fn sampler_unit(&self) -> Option<u32> {
        self.decls
            .iter()
            .zip(&self.values)
            .find(|(d, _)| d.kind == UniformKind::Sampler)
            .map(|(_, v)| match v {
                Some(UniformValue::Sampler(unit)) => *unit,
                _ => 0,
            })
    }

    pub fn has_sampler(&self) -> bool {
        self.decls.iter().any(|d| d.kind == UniformKind::Sampler)
    }

    /// Pack non-sampler uniforms in declaration order. Every scalar or
    /// vector takes a full vec4 slot and a mat3 takes three, matching a
    /// WGSL uniform struct of `vec4<f32>` and `mat3x3<f32>` fields. Unset
    /// values pack as zeros.
    pub fn pack(&self) -> Vec<f32> {
        let mut out = Vec::new();
        for (decl, value) in self.decls.iter().zip(&self.values) {
            match (decl.kind, value) {
                (UniformKind::Sampler, _) => {}
                (UniformKind::Mat3, Some(UniformValue::Mat3(m))) => {
                    for column in m.chunks(3) {
                        out.extend_from_slice(column);
                        out.push(0.0);
                    }
                }
                (UniformKind::Mat3, _) => out.extend_from_slice(&[0.0; 12]),
                (_, Some(UniformValue::Float(v))) => out.extend_from_slice(&[*v, 0.0, 0.0, 0.0]),
                (_, Some(UniformValue::Vec2([x, y]))) => out.extend_from_slice(&[*x, *y, 0.0, 0.0]),
                (_, Some(UniformValue::Vec4(v))) => out.extend_from_slice(v),
                _ => out.extend_from_slice(&[0.0; 4]),
            }
        }
        if out.is_empty() {
            out.extend_from_slice(&[0.0; 4]);
        }
        out
    }
}

/// WebGL-1-class rendering surface.
///
/// A frame is `clear`, any number of `set_uniform`/`draw` calls, then
/// `present`. Buffer writes apply to every draw of the frame that follows
/// them.
pub trait RenderBackend {
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, BackendError>;

    /// Create a vertex buffer holding up to `capacity` floats.
    fn create_buffer(&mut self, label: &str, capacity: usize) -> Result<BufferId, BackendError>;

    /// Create an empty texture; it is unusable until uploaded.
    fn create_texture(&mut self, label: &str) -> Result<TextureId, BackendError>;

    fn upload_texture(&mut self, texture: TextureId, image: &AtlasImage) -> Result<(), BackendError>;

    fn write_buffer(&mut self, buffer: BufferId, data: &[f32]) -> Result<(), BackendError>;

    /// Resize the backing surface in device pixels.
    fn resize(&mut self, width: u32, height: u32);

    fn clear(&mut self, color: [f32; 4]);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &'static str,
        value: UniformValue,
    ) -> Result<(), BackendError>;

    fn draw(
        &mut self,
        program: ProgramId,
        buffer: BufferId,
        vertices: Range<u32>,
    ) -> Result<(), BackendError>;

    fn present(&mut self) -> Result<(), BackendError>;

    fn delete_program(&mut self, program: ProgramId);

    fn delete_buffer(&mut self, buffer: BufferId);

    fn delete_texture(&mut self, texture: TextureId);
}

/// A command issued to a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateProgram { program: ProgramId, label: &'static str },
    CreateBuffer { buffer: BufferId, capacity: usize },
    CreateTexture { texture: TextureId },
    UploadTexture { texture: TextureId, width: u32, height: u32 },
    WriteBuffer { buffer: BufferId, floats: usize },
    Resize { width: u32, height: u32 },
    Clear { color: [f32; 4] },
    BindTexture { unit: u32, texture: TextureId },
    SetUniform { program: ProgramId, name: &'static str, value: UniformValue },
    Draw {
        program: ProgramId,
        buffer: BufferId,
        primitive: Primitive,
        first: u32,
        count: u32,
    },
    Present,
    DeleteProgram(ProgramId),
    DeleteBuffer(BufferId),
    DeleteTexture(TextureId),
}

struct RecordedProgram {
    desc: ProgramDesc,
    uniforms: UniformTable,
}

struct RecordedBuffer {
    capacity: usize,
    data: Vec<f32>,
}

/// Headless backend that validates and records every call.
///
/// Program creation checks that each declared uniform and attribute name
/// appears in the shader source.
#[derive(Default)]
pub struct RecordingBackend {
    commands: Vec<Command>,
    programs: HashMap<ProgramId, RecordedProgram>,
    buffers: HashMap<BufferId, RecordedBuffer>,
    textures: HashMap<TextureId, Option<(u32, u32)>>,
    bound: HashMap<u32, TextureId>,
    failing: Vec<&'static str>,
    size: (u32, u32),
    next_id: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make program creation fail for `label`.
    pub fn fail_program(mut self, label: &'static str) -> Self {
        self.failing.push(label);
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Uploaded contents of a buffer.
    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[f32]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        self.programs.get(&program)?.uniforms.get(name)
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Number of live programs, buffers and textures.
    pub fn live_resources(&self) -> usize {
        self.programs.len() + self.buffers.len() + self.textures.len()
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderBackend for RecordingBackend {
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, BackendError> {
        if self.failing.contains(&desc.label) {
            return Err(BackendError::ProgramLink {
                label: desc.label.to_string(),
                reason: "simulated link failure".to_string(),
            });
        }
        let names = desc
            .uniforms
            .iter()
            .map(|u| u.name)
            .chain(desc.attributes.iter().map(|a| a.name));
        for name in names {
            if !desc.source.contains(name) {
                return Err(BackendError::ProgramLink {
                    label: desc.label.to_string(),
                    reason: format!("`{}` not declared in shader", name),
                });
            }
        }

        let program = ProgramId(self.next_id());
        self.programs.insert(
            program,
            RecordedProgram {
                desc: *desc,
                uniforms: UniformTable::new(desc.uniforms),
            },
        );
        self.commands.push(Command::CreateProgram {
            program,
            label: desc.label,
        });
        Ok(program)
    }

    fn create_buffer(&mut self, _label: &str, capacity: usize) -> Result<BufferId, BackendError> {
        let buffer = BufferId(self.next_id());
        self.buffers.insert(
            buffer,
            RecordedBuffer {
                capacity,
                data: Vec::new(),
            },
        );
        self.commands.push(Command::CreateBuffer { buffer, capacity });
        Ok(buffer)
    }

    fn create_texture(&mut self, _label: &str) -> Result<TextureId, BackendError> {
        let texture = TextureId(self.next_id());
        self.textures.insert(texture, None);
        self.commands.push(Command::CreateTexture { texture });
        Ok(texture)
    }

    fn upload_texture(&mut self, texture: TextureId, image: &AtlasImage) -> Result<(), BackendError> {
        let slot = self
            .textures
            .get_mut(&texture)
            .ok_or_else(|| BackendError::UnknownResource(format!("{:?}", texture)))?;
        *slot = Some((image.width, image.height));
        self.commands.push(Command::UploadTexture {
            texture,
            width: image.width,
            height: image.height,
        });
        Ok(())
    }

    fn write_buffer(&mut self, buffer: BufferId, data: &[f32]) -> Result<(), BackendError> {
        let slot = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| BackendError::UnknownResource(format!("{:?}", buffer)))?;
        if data.len() > slot.capacity {
            return Err(BackendError::BufferOverflow {
                len: data.len(),
                capacity: slot.capacity,
            });
        }
        slot.data.clear();
        slot.data.extend_from_slice(data);
        self.commands.push(Command::WriteBuffer {
            buffer,
            floats: data.len(),
        });
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.commands.push(Command::Resize { width, height });
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.commands.push(Command::Clear { color });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.bound.insert(unit, texture);
        self.commands.push(Command::BindTexture { unit, texture });
    }

    fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &'static str,
        value: UniformValue,
    ) -> Result<(), BackendError> {
        let slot = self
            .programs
            .get_mut(&program)
            .ok_or_else(|| BackendError::UnknownResource(format!("{:?}", program)))?;
        slot.uniforms.set(name, value)?;
        self.commands.push(Command::SetUniform {
            program,
            name,
            value,
        });
        Ok(())
    }

    fn draw(
        &mut self,
        program: ProgramId,
        buffer: BufferId,
        vertices: Range<u32>,
    ) -> Result<(), BackendError> {
        let recorded = self
            .programs
            .get(&program)
            .ok_or_else(|| BackendError::UnknownResource(format!("{:?}", program)))?;
        let data = self
            .buffers
            .get(&buffer)
            .ok_or_else(|| BackendError::UnknownResource(format!("{:?}", buffer)))?;

        if let Some(unit) = recorded.uniforms.sampler_unit() {
            let uploaded = self
                .bound
                .get(&unit)
                .and_then(|t| self.textures.get(t))
                .is_some_and(|t| t.is_some());
            if !uploaded {
                return Err(BackendError::MissingTexture(unit));
            }
        }

        let stride = recorded.desc.stride() as usize;
        if vertices.end as usize * stride > data.data.len() {
            return Err(BackendError::DrawOutOfRange);
        }

        self.commands.push(Command::Draw {
            program,
            buffer,
            primitive: recorded.desc.primitive,
            first: vertices.start,
            count: vertices.end.saturating_sub(vertices.start),
        });
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        self.commands.push(Command::Present);
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() {
            self.commands.push(Command::DeleteProgram(program));
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            self.commands.push(Command::DeleteBuffer(buffer));
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.bound.retain(|_, bound| *bound != texture);
            self.commands.push(Command::DeleteTexture(texture));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIFORMS: &[UniformDecl] = &[
        UniformDecl { name: "tex", kind: UniformKind::Sampler },
        UniformDecl { name: "transform", kind: UniformKind::Mat3 },
        UniformDecl { name: "border", kind: UniformKind::Float },
        UniformDecl { name: "color", kind: UniformKind::Vec4 },
    ];

    const DESC: ProgramDesc = ProgramDesc {
        label: "test",
        source: "tex transform border color pos",
        primitive: Primitive::Triangles,
        attributes: &[VertexAttribute { name: "pos", components: 2 }],
        uniforms: UNIFORMS,
    };

    #[test]
    fn test_uniform_table_rejects_unknown_and_wrong_kind() {
        let mut table = UniformTable::new(UNIFORMS);
        assert_eq!(
            table.set("missing", UniformValue::Float(1.0)),
            Err(BackendError::UnknownUniform("missing".to_string()))
        );
        assert!(matches!(
            table.set("color", UniformValue::Float(1.0)),
            Err(BackendError::UniformKind { .. })
        ));
        table.set("color", UniformValue::Vec4([1.0; 4])).unwrap();
        assert_eq!(table.get("color"), Some(UniformValue::Vec4([1.0; 4])));
    }

    #[test]
    fn test_uniform_pack_layout() {
        let mut table = UniformTable::new(UNIFORMS);
        table
            .set(
                "transform",
                UniformValue::Mat3([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]),
            )
            .unwrap();
        table.set("border", UniformValue::Float(0.5)).unwrap();

        let packed = table.pack();
        // mat3 (12) + float slot (4) + unset vec4 (4), sampler skipped
        assert_eq!(packed.len(), 20);
        assert_eq!(&packed[0..4], &[1.0, 2.0, 3.0, 0.0]);
        assert_eq!(&packed[8..12], &[7.0, 8.0, 9.0, 0.0]);
        assert_eq!(&packed[12..16], &[0.5, 0.0, 0.0, 0.0]);
        assert_eq!(&packed[16..20], &[0.0; 4]);
    }

    #[test]
    fn test_sampler_unit_defaults_to_zero() {
        let mut table = UniformTable::new(UNIFORMS);
        assert_eq!(table.sampler_unit(), Some(0));
        table.set("tex", UniformValue::Sampler(2)).unwrap();
        assert_eq!(table.sampler_unit(), Some(2));
    }

    #[test]
    fn test_recording_program_validation() {
        let mut backend = RecordingBackend::new();
        let bad = ProgramDesc {
            source: "nothing here",
            ..DESC
        };
        assert!(matches!(
            backend.create_program(&bad),
            Err(BackendError::ProgramLink { .. })
        ));

        let mut failing = RecordingBackend::new().fail_program("test");
        assert!(failing.create_program(&DESC).is_err());
        assert!(backend.create_program(&DESC).is_ok());
    }

    #[test]
    fn test_recording_draw_requires_texture() {
        let mut backend = RecordingBackend::new();
        let program = backend.create_program(&DESC).unwrap();
        let buffer = backend.create_buffer("vb", 12).unwrap();
        backend.write_buffer(buffer, &[0.0; 12]).unwrap();

        assert_eq!(
            backend.draw(program, buffer, 0..6),
            Err(BackendError::MissingTexture(0))
        );

        let texture = backend.create_texture("atlas").unwrap();
        backend.bind_texture(0, texture);
        assert_eq!(
            backend.draw(program, buffer, 0..6),
            Err(BackendError::MissingTexture(0))
        );

        let image = AtlasImage::new(1, 1, vec![0]).unwrap();
        backend.upload_texture(texture, &image).unwrap();
        backend.draw(program, buffer, 0..6).unwrap();
        assert_eq!(
            backend.draw(program, buffer, 0..7),
            Err(BackendError::DrawOutOfRange)
        );
    }

    #[test]
    fn test_recording_buffer_overflow() {
        let mut backend = RecordingBackend::new();
        let buffer = backend.create_buffer("vb", 2).unwrap();
        assert!(matches!(
            backend.write_buffer(buffer, &[0.0; 3]),
            Err(BackendError::BufferOverflow { len: 3, capacity: 2 })
        ));
    }

    #[test]
    fn test_recording_delete_is_idempotent() {
        let mut backend = RecordingBackend::new();
        let buffer = backend.create_buffer("vb", 2).unwrap();
        backend.delete_buffer(buffer);
        backend.delete_buffer(buffer);
        let deletes = backend
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::DeleteBuffer(_)))
            .count();
        assert_eq!(deletes, 1);
        assert_eq!(backend.live_resources(), 0);
    }
}
