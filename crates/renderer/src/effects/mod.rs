//! Visual transition effects.
//!
//! An effect is a fragment shader body plus the knowledge of how to feed its
//! own uniforms from configuration. The renderer sets the shared uniforms
//! (projection, texture, progress, ...) itself and then hands an
//! [`UniformSink`] to [`Effect::apply_parameters`] for the rest, so no code
//! outside the effect needs to know what its parameters mean.

mod fire;
mod pixelate;
mod tv;

use fxconfig::{Color, ConfigSource, ConfigValue};

use crate::gl::GlApi;
use crate::program::ShaderProgram;

pub use fire::FireEffect;
pub use pixelate::PixelateEffect;
pub use tv::TvEffect;

pub trait Effect: Send + Sync {
    /// Unique identifier, also the value used in `open_effect`/`close_effect`.
    fn name(&self) -> &str;

    /// Fragment shader body, without the shared preamble.
    fn fragment_source(&self) -> &str;

    /// Uniforms beyond the common set that [`apply_parameters`](Self::apply_parameters) writes.
    fn uniform_names(&self) -> &[&str];

    /// Configuration keys this effect reads, with their defaults.
    fn config_defaults(&self) -> Vec<(&'static str, ConfigValue)> {
        Vec::new()
    }

    /// Writes the effect's own uniforms into the bound program.
    fn apply_parameters(&self, uniforms: &UniformSink<'_>, config: &dyn ConfigSource, seed: f32);
}

/// Writes uniforms of the currently bound program by name.
///
/// Names the program does not know (or that the driver optimised away) are
/// silently ignored.
pub struct UniformSink<'a> {
    gl: &'a dyn GlApi,
    program: &'a ShaderProgram,
}

impl<'a> UniformSink<'a> {
    pub fn new(gl: &'a dyn GlApi, program: &'a ShaderProgram) -> Self {
        Self { gl, program }
    }

    pub fn set_f32(&self, name: &str, value: f32) {
        self.gl.uniform_1f(self.program.uniform(name), value);
    }

    pub fn set_i32(&self, name: &str, value: i32) {
        self.gl.uniform_1i(self.program.uniform(name), value);
    }

    pub fn set_bool(&self, name: &str, value: bool) {
        self.set_i32(name, i32::from(value));
    }

    pub fn set_vec2(&self, name: &str, x: f32, y: f32) {
        self.gl.uniform_2f(self.program.uniform(name), x, y);
    }

    pub fn set_color(&self, name: &str, color: Color) {
        self.gl.uniform_4f(self.program.uniform(name), color.to_array());
    }
}

/// Reads a float tunable, falling back to `default`.
pub(crate) fn float_param(config: &dyn ConfigSource, key: &str, default: f64) -> f32 {
    config.get_float(key).unwrap_or(default) as f32
}

/// Reads a packed color tunable, falling back to the packed `default`.
pub(crate) fn color_param(config: &dyn ConfigSource, key: &str, default: u32) -> Color {
    config
        .get_color(key)
        .unwrap_or_else(|| Color::from_argb(default))
}

/// Every built-in effect, in registration order.
pub fn builtin() -> Vec<Box<dyn Effect>> {
    vec![
        Box::new(FireEffect),
        Box::new(TvEffect),
        Box::new(PixelateEffect),
    ]
}
