use fxconfig::{ConfigSource, ConfigValue};

use super::{float_param, Effect, UniformSink};

const SOURCE: &str = include_str!("../../shaders/pixelate.glsl");

const PIXEL_SIZE_KEY: &str = "plugin:hfx:pixelate_pixel_size";
const NOISE_KEY: &str = "plugin:hfx:pixelate_noise";

const DEFAULT_PIXEL_SIZE: f64 = 40.0;
const DEFAULT_NOISE: f64 = 0.5;

/// Coarsens the window into growing pixels that dissolve in a noisy pattern.
#[derive(Debug, Default, Clone, Copy)]
pub struct PixelateEffect;

impl Effect for PixelateEffect {
    fn name(&self) -> &str {
        "pixelate"
    }

    fn fragment_source(&self) -> &str {
        SOURCE
    }

    fn uniform_names(&self) -> &[&str] {
        &["uPixelSize", "uNoise"]
    }

    fn config_defaults(&self) -> Vec<(&'static str, ConfigValue)> {
        vec![
            (PIXEL_SIZE_KEY, ConfigValue::Float(DEFAULT_PIXEL_SIZE)),
            (NOISE_KEY, ConfigValue::Float(DEFAULT_NOISE)),
        ]
    }

    fn apply_parameters(&self, uniforms: &UniformSink<'_>, config: &dyn ConfigSource, _seed: f32) {
        uniforms.set_f32(
            "uPixelSize",
            float_param(config, PIXEL_SIZE_KEY, DEFAULT_PIXEL_SIZE),
        );
        uniforms.set_f32("uNoise", float_param(config, NOISE_KEY, DEFAULT_NOISE));
    }
}
