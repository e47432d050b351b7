//! The slice of OpenGL (ES 3.0) the effect engine talks to.
//!
//! GL object names are plain `u32`s where `0` means "no object", mirroring the
//! raw GL convention. The compositor owns the context; every method must be
//! called on the thread where that context is current.

use std::num::NonZeroU32;

use glow::HasContext;

/// `GL_TEXTURE_2D`, the target of ordinary window textures.
pub const TEXTURE_2D: u32 = glow::TEXTURE_2D;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Integer framebuffer rectangle used for scissoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ScissorRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// GL entry points used by shader compilation and effect drawing.
///
/// Uniform setters accept `None` locations and ignore them, so uniforms the
/// driver optimised away need no special casing.
pub trait GlApi {
    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String>;
    fn shader_source(&self, shader: u32, source: &str);
    fn compile_shader(&self, shader: u32);
    fn shader_compile_status(&self, shader: u32) -> bool;
    fn shader_info_log(&self, shader: u32) -> String;
    fn delete_shader(&self, shader: u32);

    fn create_program(&self) -> Result<u32, String>;
    fn attach_shader(&self, program: u32, shader: u32);
    fn detach_shader(&self, program: u32, shader: u32);
    fn link_program(&self, program: u32);
    fn program_link_status(&self, program: u32) -> bool;
    fn program_info_log(&self, program: u32) -> String;
    fn delete_program(&self, program: u32);
    fn use_program(&self, program: Option<u32>);

    fn uniform_location(&self, program: u32, name: &str) -> Option<UniformLocation>;
    fn attrib_location(&self, program: u32, name: &str) -> Option<u32>;

    fn create_vertex_array(&self) -> Result<u32, String>;
    fn bind_vertex_array(&self, vao: Option<u32>);
    fn delete_vertex_array(&self, vao: u32);

    fn create_buffer(&self) -> Result<u32, String>;
    fn bind_array_buffer(&self, buffer: Option<u32>);
    fn array_buffer_data(&self, data: &[f32], usage: BufferUsage);
    fn array_buffer_sub_data(&self, data: &[f32]);
    fn delete_buffer(&self, buffer: u32);
    /// Enables `index` and points it at tightly packed `vec2` floats in the bound buffer.
    fn vertex_attrib_vec2(&self, index: u32);

    fn uniform_1f(&self, location: Option<UniformLocation>, value: f32);
    fn uniform_1i(&self, location: Option<UniformLocation>, value: i32);
    fn uniform_2f(&self, location: Option<UniformLocation>, x: f32, y: f32);
    fn uniform_4f(&self, location: Option<UniformLocation>, value: [f32; 4]);
    /// Uploads a column-major 3x3 matrix.
    fn uniform_matrix3(&self, location: Option<UniformLocation>, value: &[f32; 9]);

    /// Binds `texture` to texture unit `unit` (or unbinds with `None`).
    fn bind_texture(&self, unit: u32, target: u32, texture: Option<u32>);
    /// Sets linear min/mag filtering on the texture bound to `target`.
    fn texture_linear_filtering(&self, target: u32);

    /// Enables premultiplied-alpha blending or disables blending.
    fn set_blend(&self, enabled: bool);
    /// Restricts drawing to `rect`, or lifts the restriction with `None`.
    fn scissor(&self, rect: Option<ScissorRect>);
    fn draw_triangle_strip(&self, vertex_count: i32);
}

fn name(id: u32) -> Option<NonZeroU32> {
    NonZeroU32::new(id)
}

// SAFETY (applies to every block below): callers uphold the trait contract
// that the compositor's GL context is current on this thread, and every name
// passed in was produced by this same context.
impl GlApi for glow::Context {
    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { HasContext::create_shader(self, kind) }.map(|shader| shader.0.get())
    }

    fn shader_source(&self, shader: u32, source: &str) {
        if let Some(id) = name(shader) {
            unsafe { HasContext::shader_source(self, glow::NativeShader(id), source) }
        }
    }

    fn compile_shader(&self, shader: u32) {
        if let Some(id) = name(shader) {
            unsafe { HasContext::compile_shader(self, glow::NativeShader(id)) }
        }
    }

    fn shader_compile_status(&self, shader: u32) -> bool {
        name(shader)
            .map(|id| unsafe { self.get_shader_compile_status(glow::NativeShader(id)) })
            .unwrap_or(false)
    }

    fn shader_info_log(&self, shader: u32) -> String {
        name(shader)
            .map(|id| unsafe { self.get_shader_info_log(glow::NativeShader(id)) })
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: u32) {
        if let Some(id) = name(shader) {
            unsafe { HasContext::delete_shader(self, glow::NativeShader(id)) }
        }
    }

    fn create_program(&self) -> Result<u32, String> {
        unsafe { HasContext::create_program(self) }.map(|program| program.0.get())
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        if let (Some(program), Some(shader)) = (name(program), name(shader)) {
            unsafe {
                HasContext::attach_shader(
                    self,
                    glow::NativeProgram(program),
                    glow::NativeShader(shader),
                )
            }
        }
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        if let (Some(program), Some(shader)) = (name(program), name(shader)) {
            unsafe {
                HasContext::detach_shader(
                    self,
                    glow::NativeProgram(program),
                    glow::NativeShader(shader),
                )
            }
        }
    }

    fn link_program(&self, program: u32) {
        if let Some(id) = name(program) {
            unsafe { HasContext::link_program(self, glow::NativeProgram(id)) }
        }
    }

    fn program_link_status(&self, program: u32) -> bool {
        name(program)
            .map(|id| unsafe { self.get_program_link_status(glow::NativeProgram(id)) })
            .unwrap_or(false)
    }

    fn program_info_log(&self, program: u32) -> String {
        name(program)
            .map(|id| unsafe { self.get_program_info_log(glow::NativeProgram(id)) })
            .unwrap_or_default()
    }

    fn delete_program(&self, program: u32) {
        if let Some(id) = name(program) {
            unsafe { HasContext::delete_program(self, glow::NativeProgram(id)) }
        }
    }

    fn use_program(&self, program: Option<u32>) {
        let program = program.and_then(name).map(glow::NativeProgram);
        unsafe { HasContext::use_program(self, program) }
    }

    fn uniform_location(&self, program: u32, uniform: &str) -> Option<UniformLocation> {
        let id = name(program)?;
        unsafe { self.get_uniform_location(glow::NativeProgram(id), uniform) }
            .map(|location| UniformLocation(location.0))
    }

    fn attrib_location(&self, program: u32, attribute: &str) -> Option<u32> {
        let id = name(program)?;
        unsafe { self.get_attrib_location(glow::NativeProgram(id), attribute) }
    }

    fn create_vertex_array(&self) -> Result<u32, String> {
        unsafe { HasContext::create_vertex_array(self) }.map(|vao| vao.0.get())
    }

    fn bind_vertex_array(&self, vao: Option<u32>) {
        let vao = vao.and_then(name).map(glow::NativeVertexArray);
        unsafe { HasContext::bind_vertex_array(self, vao) }
    }

    fn delete_vertex_array(&self, vao: u32) {
        if let Some(id) = name(vao) {
            unsafe { HasContext::delete_vertex_array(self, glow::NativeVertexArray(id)) }
        }
    }

    fn create_buffer(&self) -> Result<u32, String> {
        unsafe { HasContext::create_buffer(self) }.map(|buffer| buffer.0.get())
    }

    fn bind_array_buffer(&self, buffer: Option<u32>) {
        let buffer = buffer.and_then(name).map(glow::NativeBuffer);
        unsafe { self.bind_buffer(glow::ARRAY_BUFFER, buffer) }
    }

    fn array_buffer_data(&self, data: &[f32], usage: BufferUsage) {
        let usage = match usage {
            BufferUsage::Static => glow::STATIC_DRAW,
            BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
        };
        unsafe { self.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(data), usage) }
    }

    fn array_buffer_sub_data(&self, data: &[f32]) {
        unsafe { self.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, 0, bytemuck::cast_slice(data)) }
    }

    fn delete_buffer(&self, buffer: u32) {
        if let Some(id) = name(buffer) {
            unsafe { HasContext::delete_buffer(self, glow::NativeBuffer(id)) }
        }
    }

    fn vertex_attrib_vec2(&self, index: u32) {
        unsafe {
            self.enable_vertex_attrib_array(index);
            self.vertex_attrib_pointer_f32(index, 2, glow::FLOAT, false, 0, 0);
        }
    }

    fn uniform_1f(&self, location: Option<UniformLocation>, value: f32) {
        if let Some(location) = native_location(location) {
            unsafe { self.uniform_1_f32(Some(&location), value) }
        }
    }

    fn uniform_1i(&self, location: Option<UniformLocation>, value: i32) {
        if let Some(location) = native_location(location) {
            unsafe { self.uniform_1_i32(Some(&location), value) }
        }
    }

    fn uniform_2f(&self, location: Option<UniformLocation>, x: f32, y: f32) {
        if let Some(location) = native_location(location) {
            unsafe { self.uniform_2_f32(Some(&location), x, y) }
        }
    }

    fn uniform_4f(&self, location: Option<UniformLocation>, value: [f32; 4]) {
        if let Some(location) = native_location(location) {
            unsafe { self.uniform_4_f32(Some(&location), value[0], value[1], value[2], value[3]) }
        }
    }

    fn uniform_matrix3(&self, location: Option<UniformLocation>, value: &[f32; 9]) {
        if let Some(location) = native_location(location) {
            unsafe { self.uniform_matrix_3_f32_slice(Some(&location), false, value) }
        }
    }

    fn bind_texture(&self, unit: u32, target: u32, texture: Option<u32>) {
        let texture = texture.and_then(name).map(glow::NativeTexture);
        unsafe {
            self.active_texture(glow::TEXTURE0 + unit);
            HasContext::bind_texture(self, target, texture);
        }
    }

    fn texture_linear_filtering(&self, target: u32) {
        unsafe {
            self.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            self.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        }
    }

    fn set_blend(&self, enabled: bool) {
        unsafe {
            if enabled {
                self.enable(glow::BLEND);
                self.blend_func(glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
            } else {
                self.disable(glow::BLEND);
            }
        }
    }

    fn scissor(&self, rect: Option<ScissorRect>) {
        unsafe {
            match rect {
                Some(rect) => {
                    self.enable(glow::SCISSOR_TEST);
                    HasContext::scissor(self, rect.x, rect.y, rect.width, rect.height);
                }
                None => self.disable(glow::SCISSOR_TEST),
            }
        }
    }

    fn draw_triangle_strip(&self, vertex_count: i32) {
        unsafe { self.draw_arrays(glow::TRIANGLE_STRIP, 0, vertex_count) }
    }
}

fn native_location(location: Option<UniformLocation>) -> Option<glow::NativeUniformLocation> {
    location.map(|location| glow::NativeUniformLocation(location.0))
}
