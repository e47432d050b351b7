use std::collections::BTreeMap;
use std::io;

use anyhow::{bail, Context, Result};
use fxconfig::{ConfigStore, ConfigValue};
use renderer::compile::{wrap_fragment, VERTEX_SHADER};
use renderer::EffectRegistry;
use scheduler::TransitionSettings;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ConfigArgs, EffectsArgs, ShaderArgs, ShaderStageArg};
use crate::paths::ConfigLocation;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing(cli.verbose);

    let registry = EffectRegistry::with_builtin();
    match cli.command {
        Command::Effects(args) => list_effects(&registry, &args),
        Command::Shader(args) => print_shader(&registry, &args),
        Command::Config(args) => show_config(&registry, &args),
    }
}

fn initialise_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

#[derive(Debug, Serialize)]
struct EffectSummary {
    name: String,
    uniforms: Vec<String>,
    defaults: BTreeMap<String, ConfigValue>,
}

fn summarize_effects(registry: &EffectRegistry) -> Vec<EffectSummary> {
    registry
        .names()
        .into_iter()
        .filter_map(|name| registry.get(name))
        .map(|effect| EffectSummary {
            name: effect.name().to_string(),
            uniforms: effect
                .uniform_names()
                .iter()
                .map(|uniform| uniform.to_string())
                .collect(),
            defaults: effect
                .config_defaults()
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        })
        .collect()
}

fn list_effects(registry: &EffectRegistry, args: &EffectsArgs) -> Result<()> {
    let effects = summarize_effects(registry);
    if args.json {
        let rendered =
            serde_json::to_string_pretty(&effects).context("failed to serialise effects")?;
        println!("{rendered}");
        return Ok(());
    }

    for effect in effects {
        println!("{}", effect.name);
        println!("  uniforms: {}", effect.uniforms.join(", "));
        for (key, value) in &effect.defaults {
            println!("  {key} = {value}");
        }
    }
    Ok(())
}

fn print_shader(registry: &EffectRegistry, args: &ShaderArgs) -> Result<()> {
    let Some(effect) = registry.get(&args.effect) else {
        bail!(
            "unknown effect '{}'; available: {}",
            args.effect,
            registry.names().join(", ")
        );
    };
    match args.stage {
        ShaderStageArg::Vertex => print!("{VERTEX_SHADER}"),
        ShaderStageArg::Fragment => print!("{}", wrap_fragment(effect.fragment_source())),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    source: Option<String>,
    open_effect: Option<String>,
    close_effect: Option<String>,
    duration: f64,
    values: BTreeMap<String, ConfigValue>,
}

fn load_config(
    registry: &EffectRegistry,
    args: &ConfigArgs,
) -> Result<(ConfigStore, Option<String>)> {
    let location = ConfigLocation::discover(args.path.as_deref())?;
    let mut store = ConfigStore::with_core_defaults();
    registry.register_config_defaults(&mut store);

    let path = location.path();
    if !path.exists() {
        if location.is_optional() {
            tracing::info!(path = %path.display(), "no config file found; using defaults");
            return Ok((store, None));
        }
        bail!(
            "config file {} (from {}) does not exist",
            path.display(),
            location.label()
        );
    }

    store
        .merge_file(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    store
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    tracing::debug!(path = %path.display(), source = location.label(), "loaded config");
    Ok((store, Some(path.display().to_string())))
}

fn show_config(registry: &EffectRegistry, args: &ConfigArgs) -> Result<()> {
    let (store, source) = load_config(registry, args)?;
    let settings = TransitionSettings::from_config(&store);
    for (effect, direction) in [
        (settings.open_effect.as_deref(), "open"),
        (settings.close_effect.as_deref(), "close"),
    ] {
        if let Some(name) = effect.filter(|name| !registry.has(name)) {
            tracing::warn!(
                effect = %name,
                direction,
                "effect is not registered; no animation will play"
            );
        }
    }

    let report = ConfigReport {
        source,
        open_effect: settings.open_effect,
        close_effect: settings.close_effect,
        duration: settings.duration,
        values: store
            .entries()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect(),
    };

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&report).context("failed to serialise config")?;
        println!("{rendered}");
        return Ok(());
    }

    println!("source: {}", report.source.as_deref().unwrap_or("<defaults>"));
    println!("open_effect: {}", report.open_effect.as_deref().unwrap_or("none"));
    println!("close_effect: {}", report.close_effect.as_deref().unwrap_or("none"));
    println!("duration: {}s", report.duration);
    for (key, value) in &report.values {
        println!("{key} = {value}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn summaries_cover_every_builtin_effect() {
        let registry = EffectRegistry::with_builtin();
        let effects = summarize_effects(&registry);
        let names: Vec<_> = effects.iter().map(|effect| effect.name.as_str()).collect();
        assert_eq!(names, ["fire", "pixelate", "tv"]);

        let tv = &effects[2];
        assert_eq!(tv.uniforms, ["uColor"]);
        assert!(tv.defaults.contains_key("plugin:hfx:tv_color"));
    }

    #[test]
    fn explicit_config_is_merged_and_validated() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("hyprfx.toml");
        fs::write(
            &path,
            "[plugin.hfx]\nopen_effect = \"pixelate\"\nduration = \"750ms\"\n",
        )
        .unwrap();

        let registry = EffectRegistry::with_builtin();
        let args = ConfigArgs {
            path: Some(path.clone()),
            json: false,
        };
        let (store, source) = load_config(&registry, &args).unwrap();
        let settings = TransitionSettings::from_config(&store);

        assert_eq!(source.as_deref(), Some(path.display().to_string().as_str()));
        assert_eq!(settings.open_effect.as_deref(), Some("pixelate"));
        assert!((settings.duration - 0.75).abs() < 1e-9);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let root = TempDir::new().unwrap();
        let args = ConfigArgs {
            path: Some(root.path().join("absent.toml")),
            json: false,
        };
        let err = load_config(&EffectRegistry::with_builtin(), &args).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn mistyped_values_fail_validation() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("hyprfx.toml");
        fs::write(&path, "[plugin.hfx]\nfire_scale = \"huge\"\n").unwrap();

        let args = ConfigArgs {
            path: Some(path),
            json: false,
        };
        let err = load_config(&EffectRegistry::with_builtin(), &args).unwrap_err();
        assert!(format!("{err:#}").contains("fire_scale"));
    }
}
