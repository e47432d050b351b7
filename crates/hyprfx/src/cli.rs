use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "hyprfx",
    author,
    version,
    about = "Inspect hyprfx window transition effects and configuration"
)]
pub struct Cli {
    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered effects with their uniforms and config defaults.
    Effects(EffectsArgs),
    /// Print the GLSL handed to the driver for an effect.
    Shader(ShaderArgs),
    /// Load, validate and print the resolved configuration.
    Config(ConfigArgs),
}

#[derive(Parser, Debug, Default)]
pub struct EffectsArgs {
    /// Emit JSON instead of plain text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct ShaderArgs {
    /// Effect name (e.g. `fire`).
    #[arg(value_name = "EFFECT")]
    pub effect: String,

    /// Which stage to print.
    #[arg(long, value_enum, default_value_t = ShaderStageArg::Fragment)]
    pub stage: ShaderStageArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStageArg {
    Vertex,
    Fragment,
}

#[derive(Parser, Debug, Default)]
pub struct ConfigArgs {
    /// Config file; defaults to `$HYPRFX_CONFIG` or the user config directory.
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Emit JSON instead of plain text.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}
