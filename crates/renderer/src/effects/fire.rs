use fxconfig::{ConfigSource, ConfigValue};

use super::{color_param, float_param, Effect, UniformSink};

const SOURCE: &str = include_str!("../../shaders/fire.glsl");

const GRADIENT: [(&str, &str, &str); 5] = [
    ("uGradient1", "plugin:hfx:fire_color_1", "rgba(c8200000)"),
    ("uGradient2", "plugin:hfx:fire_color_2", "rgba(f04000a0)"),
    ("uGradient3", "plugin:hfx:fire_color_3", "rgba(ff8800dd)"),
    ("uGradient4", "plugin:hfx:fire_color_4", "rgba(ffcc00f0)"),
    ("uGradient5", "plugin:hfx:fire_color_5", "rgba(ffff66fe)"),
];

const SCALE_KEY: &str = "plugin:hfx:fire_scale";
const NOISE_3D_KEY: &str = "plugin:hfx:fire_3d_noise";
const SPEED_KEY: &str = "plugin:hfx:fire_movement_speed";

/// Burns the window away from the top with a five-stop flame gradient.
#[derive(Debug, Default, Clone, Copy)]
pub struct FireEffect;

impl Effect for FireEffect {
    fn name(&self) -> &str {
        "fire"
    }

    fn fragment_source(&self) -> &str {
        SOURCE
    }

    fn uniform_names(&self) -> &[&str] {
        &[
            "uGradient1",
            "uGradient2",
            "uGradient3",
            "uGradient4",
            "uGradient5",
            "uScale",
            "u3DNoise",
            "uMovementSpeed",
            "uSeed",
        ]
    }

    fn config_defaults(&self) -> Vec<(&'static str, ConfigValue)> {
        let mut defaults: Vec<_> = GRADIENT
            .iter()
            .map(|&(_, key, literal)| (key, ConfigValue::color(literal)))
            .collect();
        defaults.push((SCALE_KEY, ConfigValue::Float(1.0)));
        defaults.push((NOISE_3D_KEY, ConfigValue::Int(1)));
        defaults.push((SPEED_KEY, ConfigValue::Float(1.0)));
        defaults
    }

    fn apply_parameters(&self, uniforms: &UniformSink<'_>, config: &dyn ConfigSource, seed: f32) {
        for (uniform, key, literal) in GRADIENT {
            let fallback = fxconfig::parse_color(literal).unwrap_or(0);
            uniforms.set_color(uniform, color_param(config, key, fallback));
        }
        uniforms.set_f32("uScale", float_param(config, SCALE_KEY, 1.0));
        uniforms.set_bool("u3DNoise", config.get_bool(NOISE_3D_KEY).unwrap_or(true));
        uniforms.set_f32("uMovementSpeed", float_param(config, SPEED_KEY, 1.0));
        uniforms.set_f32("uSeed", seed);
    }
}
