use std::collections::HashMap;

use crate::compile::{compile_program, wrap_fragment, ProgramError, VERTEX_SHADER};
use crate::effects::Effect;
use crate::gl::{BufferUsage, GlApi, UniformLocation};

/// Unit quad as a triangle strip, shared by the position and UV buffers.
pub const QUAD_VERTS: [f32; 8] = [1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0];

/// Locations of the uniforms every effect shares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommonUniforms {
    pub proj: Option<UniformLocation>,
    pub tex: Option<UniformLocation>,
    pub progress: Option<UniformLocation>,
    pub duration: Option<UniformLocation>,
    pub for_opening: Option<UniformLocation>,
    pub size: Option<UniformLocation>,
    pub padding: Option<UniformLocation>,
}

impl CommonUniforms {
    fn lookup<G: GlApi + ?Sized>(gl: &G, program: u32) -> Self {
        Self {
            proj: gl.uniform_location(program, "proj"),
            tex: gl.uniform_location(program, "tex"),
            progress: gl.uniform_location(program, "uProgress"),
            duration: gl.uniform_location(program, "uDuration"),
            for_opening: gl.uniform_location(program, "uForOpening"),
            size: gl.uniform_location(program, "uSize"),
            padding: gl.uniform_location(program, "uPadding"),
        }
    }
}

/// Vertex array and buffers for the unit quad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuadGeometry {
    pub vao: u32,
    pub vbo_pos: u32,
    pub vbo_uv: u32,
}

impl QuadGeometry {
    fn build<G: GlApi + ?Sized>(gl: &G, program: u32) -> Result<Self, ProgramError> {
        let mut quad = QuadGeometry::default();
        if let Err(err) = quad.fill(gl, program) {
            quad.destroy(gl);
            return Err(err);
        }
        Ok(quad)
    }

    fn fill<G: GlApi + ?Sized>(&mut self, gl: &G, program: u32) -> Result<(), ProgramError> {
        self.vao = gl.create_vertex_array().map_err(ProgramError::Create)?;
        gl.bind_vertex_array(Some(self.vao));

        self.vbo_pos = gl.create_buffer().map_err(ProgramError::Create)?;
        gl.bind_array_buffer(Some(self.vbo_pos));
        gl.array_buffer_data(&QUAD_VERTS, BufferUsage::Static);
        if let Some(pos) = gl.attrib_location(program, "pos") {
            gl.vertex_attrib_vec2(pos);
        }

        self.vbo_uv = gl.create_buffer().map_err(ProgramError::Create)?;
        gl.bind_array_buffer(Some(self.vbo_uv));
        gl.array_buffer_data(&QUAD_VERTS, BufferUsage::Dynamic);
        if let Some(texcoord) = gl.attrib_location(program, "texcoord") {
            gl.vertex_attrib_vec2(texcoord);
        }

        gl.bind_vertex_array(None);
        gl.bind_array_buffer(None);
        Ok(())
    }

    fn destroy<G: GlApi + ?Sized>(&mut self, gl: &G) {
        if self.vao != 0 {
            gl.delete_vertex_array(self.vao);
        }
        for buffer in [self.vbo_pos, self.vbo_uv] {
            if buffer != 0 {
                gl.delete_buffer(buffer);
            }
        }
        *self = QuadGeometry::default();
    }
}

/// GPU state of one compiled effect.
///
/// A default `ShaderProgram` has handle `0` and is "not ready"; rendering skips it.
#[derive(Debug, Clone, Default)]
pub struct ShaderProgram {
    program: u32,
    common: CommonUniforms,
    uniforms: HashMap<String, Option<UniformLocation>>,
    quad: QuadGeometry,
}

impl ShaderProgram {
    /// Compiles `effect`, looks up its uniforms and builds its quad.
    ///
    /// On error nothing created here is left alive.
    pub fn build<G: GlApi + ?Sized>(gl: &G, effect: &dyn Effect) -> Result<Self, ProgramError> {
        let fragment = wrap_fragment(effect.fragment_source());
        let program = compile_program(gl, VERTEX_SHADER, &fragment)?;

        let quad = match QuadGeometry::build(gl, program) {
            Ok(quad) => quad,
            Err(err) => {
                gl.delete_program(program);
                return Err(err);
            }
        };

        let uniforms = effect
            .uniform_names()
            .iter()
            .map(|name| {
                let location = gl.uniform_location(program, name);
                if location.is_none() {
                    tracing::debug!(effect = effect.name(), uniform = name, "uniform not active");
                }
                (name.to_string(), location)
            })
            .collect();

        Ok(Self {
            program,
            common: CommonUniforms::lookup(gl, program),
            uniforms,
            quad,
        })
    }

    pub fn handle(&self) -> u32 {
        self.program
    }

    pub fn is_ready(&self) -> bool {
        self.program != 0
    }

    pub fn common(&self) -> &CommonUniforms {
        &self.common
    }

    /// Location of an effect-specific uniform; `None` when unknown or inactive.
    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied().flatten()
    }

    pub fn quad(&self) -> &QuadGeometry {
        &self.quad
    }

    /// Releases every GL object and resets to the not-ready state. Idempotent.
    pub fn destroy<G: GlApi + ?Sized>(&mut self, gl: &G) {
        self.quad.destroy(gl);
        if self.program != 0 {
            gl.delete_program(self.program);
        }
        *self = ShaderProgram::default();
    }
}
