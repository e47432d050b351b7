use fxconfig::{ConfigSource, ConfigValue};

use super::{color_param, Effect, UniformSink};

const SOURCE: &str = include_str!("../../shaders/tv.glsl");

const COLOR_KEY: &str = "plugin:hfx:tv_color";
const DEFAULT_COLOR: u32 = 0xffc8_c8c8;

/// Collapses the window into a horizontal line and then a dot, like a CRT switching off.
#[derive(Debug, Default, Clone, Copy)]
pub struct TvEffect;

impl Effect for TvEffect {
    fn name(&self) -> &str {
        "tv"
    }

    fn fragment_source(&self) -> &str {
        SOURCE
    }

    fn uniform_names(&self) -> &[&str] {
        &["uColor"]
    }

    fn config_defaults(&self) -> Vec<(&'static str, ConfigValue)> {
        vec![(COLOR_KEY, ConfigValue::Int(i64::from(DEFAULT_COLOR)))]
    }

    fn apply_parameters(&self, uniforms: &UniformSink<'_>, config: &dyn ConfigSource, _seed: f32) {
        uniforms.set_color("uColor", color_param(config, COLOR_KEY, DEFAULT_COLOR));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_literal() {
        assert_eq!(
            TvEffect.config_defaults()[0].1,
            ConfigValue::color("rgba(c8c8c8ff)")
        );
    }
}
