//! A GPU-free [`GlApi`] that records what the engine asks of it.
//!
//! `RecordingGl` hands out fresh names for every object, remembers which ones
//! are still alive, and logs uniform writes, buffer uploads, and draws so
//! tests can assert on them. Shader compilation succeeds unless the source
//! contains a marker registered with [`RecordingGl::fail_compile_containing`];
//! linking fails likewise for [`RecordingGl::fail_link_containing`].
//!
//! [`FakeWindow`] and [`FakeCompositor`] stand in for the host side.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::geometry::{Rect, Vec2};
use crate::gl::{BufferUsage, GlApi, ScissorRect, ShaderStage, UniformLocation};
use crate::host::{DamageSink, HostWindow, SnapshotSource, Texture, WindowId};

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformWrite {
    pub program: u32,
    pub name: String,
    pub value: UniformValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: Option<u32>,
    pub vertex_array: Option<u32>,
    pub texture: Option<u32>,
    pub scissor: Option<ScissorRect>,
    pub blend: bool,
    pub vertex_count: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferUpload {
    pub buffer: u32,
    pub data: Vec<f32>,
    pub partial: bool,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    attached: Vec<u32>,
    linked_sources: String,
    linked: bool,
}

#[derive(Debug, Default)]
pub struct RecordingGl {
    next_name: Cell<u32>,
    shaders: RefCell<HashMap<u32, (String, bool)>>,
    programs: RefCell<HashMap<u32, ProgramRecord>>,
    vertex_arrays: RefCell<HashSet<u32>>,
    buffers: RefCell<HashSet<u32>>,
    locations: RefCell<HashMap<u32, (u32, String)>>,
    fail_compile: RefCell<Vec<String>>,
    fail_link: RefCell<Vec<String>>,

    program: Cell<Option<u32>>,
    vertex_array: Cell<Option<u32>>,
    array_buffer: Cell<Option<u32>>,
    texture: Cell<Option<u32>>,
    blend: Cell<bool>,
    scissor: Cell<Option<ScissorRect>>,

    uniform_writes: RefCell<Vec<UniformWrite>>,
    uploads: RefCell<Vec<BufferUpload>>,
    draws: RefCell<Vec<DrawCall>>,
}

impl RecordingGl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every shader whose source contains `marker` fail to compile.
    pub fn fail_compile_containing(&self, marker: &str) {
        self.fail_compile.borrow_mut().push(marker.to_string());
    }

    /// Makes every program with an attached source containing `marker` fail to link.
    pub fn fail_link_containing(&self, marker: &str) {
        self.fail_link.borrow_mut().push(marker.to_string());
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.borrow().len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.borrow().len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.borrow().len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.borrow().len()
    }

    pub fn live_objects(&self) -> usize {
        self.live_shaders() + self.live_programs() + self.live_vertex_arrays() + self.live_buffers()
    }

    pub fn is_live_program(&self, program: u32) -> bool {
        self.programs.borrow().contains_key(&program)
    }

    pub fn uniform_writes(&self) -> Vec<UniformWrite> {
        self.uniform_writes.borrow().clone()
    }

    /// Most recent value written to the uniform called `name`.
    pub fn last_uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniform_writes
            .borrow()
            .iter()
            .rev()
            .find(|write| write.name == name)
            .map(|write| write.value.clone())
    }

    pub fn uploads(&self) -> Vec<BufferUpload> {
        self.uploads.borrow().clone()
    }

    pub fn draws(&self) -> Vec<DrawCall> {
        self.draws.borrow().clone()
    }

    /// Forgets recorded writes, uploads, and draws but keeps live objects.
    pub fn clear_log(&self) {
        self.uniform_writes.borrow_mut().clear();
        self.uploads.borrow_mut().clear();
        self.draws.borrow_mut().clear();
    }

    pub fn current_program(&self) -> Option<u32> {
        self.program.get()
    }

    pub fn bound_vertex_array(&self) -> Option<u32> {
        self.vertex_array.get()
    }

    pub fn bound_array_buffer(&self) -> Option<u32> {
        self.array_buffer.get()
    }

    pub fn bound_texture(&self) -> Option<u32> {
        self.texture.get()
    }

    pub fn blend_enabled(&self) -> bool {
        self.blend.get()
    }

    pub fn scissor_rect(&self) -> Option<ScissorRect> {
        self.scissor.get()
    }

    fn allocate(&self) -> u32 {
        let name = self.next_name.get() + 1;
        self.next_name.set(name);
        name
    }

    fn record(&self, location: Option<UniformLocation>, value: UniformValue) {
        let Some(location) = location else {
            return;
        };
        let Some((program, name)) = self.locations.borrow().get(&location.0).cloned() else {
            return;
        };
        self.uniform_writes.borrow_mut().push(UniformWrite {
            program,
            name,
            value,
        });
    }
}

impl GlApi for RecordingGl {
    fn create_shader(&self, _stage: ShaderStage) -> Result<u32, String> {
        let shader = self.allocate();
        self.shaders
            .borrow_mut()
            .insert(shader, (String::new(), false));
        Ok(shader)
    }

    fn shader_source(&self, shader: u32, source: &str) {
        if let Some(record) = self.shaders.borrow_mut().get_mut(&shader) {
            record.0 = source.to_string();
        }
    }

    fn compile_shader(&self, shader: u32) {
        let markers = self.fail_compile.borrow();
        if let Some(record) = self.shaders.borrow_mut().get_mut(&shader) {
            let failed = markers.iter().any(|marker| record.0.contains(marker.as_str()));
            record.1 = !failed;
        }
    }

    fn shader_compile_status(&self, shader: u32) -> bool {
        self.shaders
            .borrow()
            .get(&shader)
            .is_some_and(|(_, compiled)| *compiled)
    }

    fn shader_info_log(&self, shader: u32) -> String {
        let markers = self.fail_compile.borrow();
        let shaders = self.shaders.borrow();
        let Some((source, _)) = shaders.get(&shader) else {
            return String::new();
        };
        markers
            .iter()
            .find(|marker| source.contains(marker.as_str()))
            .map(|marker| format!("0:1: error: unexpected token '{marker}'"))
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: u32) {
        self.shaders.borrow_mut().remove(&shader);
    }

    fn create_program(&self) -> Result<u32, String> {
        let program = self.allocate();
        self.programs
            .borrow_mut()
            .insert(program, ProgramRecord::default());
        Ok(program)
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        if let Some(record) = self.programs.borrow_mut().get_mut(&program) {
            record.attached.push(shader);
        }
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        if let Some(record) = self.programs.borrow_mut().get_mut(&program) {
            record.attached.retain(|attached| *attached != shader);
        }
    }

    fn link_program(&self, program: u32) {
        let shaders = self.shaders.borrow();
        let markers = self.fail_link.borrow();
        if let Some(record) = self.programs.borrow_mut().get_mut(&program) {
            let sources: Vec<&str> = record
                .attached
                .iter()
                .filter_map(|shader| shaders.get(shader).map(|(source, _)| source.as_str()))
                .collect();
            let linked_sources = sources.join("\n");
            record.linked = !markers
                .iter()
                .any(|marker| linked_sources.contains(marker.as_str()));
            record.linked_sources = linked_sources;
        }
    }

    fn program_link_status(&self, program: u32) -> bool {
        self.programs
            .borrow()
            .get(&program)
            .is_some_and(|record| record.linked)
    }

    fn program_info_log(&self, program: u32) -> String {
        if self.program_link_status(program) {
            String::new()
        } else {
            "error: linking failed".to_string()
        }
    }

    fn delete_program(&self, program: u32) {
        self.programs.borrow_mut().remove(&program);
        self.locations
            .borrow_mut()
            .retain(|_, (owner, _)| *owner != program);
    }

    fn use_program(&self, program: Option<u32>) {
        self.program.set(program);
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<UniformLocation> {
        let programs = self.programs.borrow();
        let record = programs.get(&program).filter(|record| record.linked)?;
        if !record.linked_sources.contains(name) {
            return None;
        }
        drop(programs);

        let mut locations = self.locations.borrow_mut();
        if let Some((&location, _)) = locations
            .iter()
            .find(|(_, (owner, known))| *owner == program && known == name)
        {
            return Some(UniformLocation(location));
        }
        let location = self.allocate();
        locations.insert(location, (program, name.to_string()));
        Some(UniformLocation(location))
    }

    fn attrib_location(&self, program: u32, name: &str) -> Option<u32> {
        let programs = self.programs.borrow();
        let record = programs.get(&program).filter(|record| record.linked)?;
        match name {
            "pos" if record.linked_sources.contains("in vec2 pos") => Some(0),
            "texcoord" if record.linked_sources.contains("in vec2 texcoord") => Some(1),
            _ => None,
        }
    }

    fn create_vertex_array(&self) -> Result<u32, String> {
        let vao = self.allocate();
        self.vertex_arrays.borrow_mut().insert(vao);
        Ok(vao)
    }

    fn bind_vertex_array(&self, vao: Option<u32>) {
        self.vertex_array.set(vao);
    }

    fn delete_vertex_array(&self, vao: u32) {
        self.vertex_arrays.borrow_mut().remove(&vao);
    }

    fn create_buffer(&self) -> Result<u32, String> {
        let buffer = self.allocate();
        self.buffers.borrow_mut().insert(buffer);
        Ok(buffer)
    }

    fn bind_array_buffer(&self, buffer: Option<u32>) {
        self.array_buffer.set(buffer);
    }

    fn array_buffer_data(&self, data: &[f32], _usage: BufferUsage) {
        if let Some(buffer) = self.array_buffer.get() {
            self.uploads.borrow_mut().push(BufferUpload {
                buffer,
                data: data.to_vec(),
                partial: false,
            });
        }
    }

    fn array_buffer_sub_data(&self, data: &[f32]) {
        if let Some(buffer) = self.array_buffer.get() {
            self.uploads.borrow_mut().push(BufferUpload {
                buffer,
                data: data.to_vec(),
                partial: true,
            });
        }
    }

    fn delete_buffer(&self, buffer: u32) {
        self.buffers.borrow_mut().remove(&buffer);
    }

    fn vertex_attrib_vec2(&self, _index: u32) {}

    fn uniform_1f(&self, location: Option<UniformLocation>, value: f32) {
        self.record(location, UniformValue::Float(value));
    }

    fn uniform_1i(&self, location: Option<UniformLocation>, value: i32) {
        self.record(location, UniformValue::Int(value));
    }

    fn uniform_2f(&self, location: Option<UniformLocation>, x: f32, y: f32) {
        self.record(location, UniformValue::Vec2([x, y]));
    }

    fn uniform_4f(&self, location: Option<UniformLocation>, value: [f32; 4]) {
        self.record(location, UniformValue::Vec4(value));
    }

    fn uniform_matrix3(&self, location: Option<UniformLocation>, value: &[f32; 9]) {
        self.record(location, UniformValue::Mat3(*value));
    }

    fn bind_texture(&self, _unit: u32, _target: u32, texture: Option<u32>) {
        self.texture.set(texture);
    }

    fn texture_linear_filtering(&self, _target: u32) {}

    fn set_blend(&self, enabled: bool) {
        self.blend.set(enabled);
    }

    fn scissor(&self, rect: Option<ScissorRect>) {
        self.scissor.set(rect);
    }

    fn draw_triangle_strip(&self, vertex_count: i32) {
        self.draws.borrow_mut().push(DrawCall {
            program: self.program.get(),
            vertex_array: self.vertex_array.get(),
            texture: self.texture.get(),
            scissor: self.scissor.get(),
            blend: self.blend.get(),
            vertex_count,
        });
    }
}

/// A window whose geometry, texture, and visibility tests can change at will.
#[derive(Debug)]
pub struct FakeWindow {
    id: WindowId,
    pid: Option<u32>,
    geometry: Cell<Rect>,
    texture: RefCell<Option<Arc<Texture>>>,
    visible: Cell<bool>,
}

impl FakeWindow {
    pub fn new(id: u64, geometry: Rect) -> Self {
        Self {
            id: WindowId(id),
            pid: None,
            geometry: Cell::new(geometry),
            texture: RefCell::new(None),
            visible: Cell::new(true),
        }
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_texture(self, id: u32) -> Self {
        self.set_texture(Some(id));
        self
    }

    /// Arc'd as the trait object the engine holds.
    pub fn shared(self) -> Arc<dyn HostWindow> {
        Arc::new(self)
    }

    pub fn set_texture(&self, id: Option<u32>) {
        *self.texture.borrow_mut() = id.map(|id| Arc::new(Texture::new(id)));
    }

    pub fn set_geometry(&self, geometry: Rect) {
        self.geometry.set(geometry);
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }
}

impl HostWindow for FakeWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn position(&self) -> Vec2 {
        self.geometry.get().position()
    }

    fn size(&self) -> Vec2 {
        self.geometry.get().size()
    }

    fn surface_texture(&self) -> Option<Arc<Texture>> {
        self.texture.borrow().clone()
    }

    fn is_visible(&self) -> bool {
        self.visible.get()
    }
}

/// Snapshot store and damage log.
#[derive(Debug, Default)]
pub struct FakeCompositor {
    snapshots: RefCell<HashMap<WindowId, Arc<Texture>>>,
    damage: RefCell<Vec<Rect>>,
}

impl FakeCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_snapshot(&self, window: u64, texture: u32) {
        self.snapshots
            .borrow_mut()
            .insert(WindowId(window), Arc::new(Texture::new(texture)));
    }

    pub fn remove_snapshot(&self, window: u64) {
        self.snapshots.borrow_mut().remove(&WindowId(window));
    }

    pub fn damage(&self) -> Vec<Rect> {
        self.damage.borrow().clone()
    }

    pub fn take_damage(&self) -> Vec<Rect> {
        std::mem::take(&mut *self.damage.borrow_mut())
    }
}

impl SnapshotSource for FakeCompositor {
    fn snapshot(&self, window: WindowId) -> Option<Arc<Texture>> {
        self.snapshots.borrow().get(&window).cloned()
    }
}

impl DamageSink for FakeCompositor {
    fn damage_box(&self, rect: Rect) {
        self.damage.borrow_mut().push(rect);
    }
}
