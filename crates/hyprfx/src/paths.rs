use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::BaseDirs;

pub const ENV_CONFIG: &str = "HYPRFX_CONFIG";

const APPLICATION: &str = "hyprfx";
const CONFIG_FILE: &str = "hyprfx.toml";

/// A resolved config file path and how it was chosen.
///
/// Only the per-user default may be missing; a path named on the command
/// line or through `HYPRFX_CONFIG` has to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    Explicit(PathBuf),
    Env(PathBuf),
    Default(PathBuf),
}

impl ConfigLocation {
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::Explicit(path.to_path_buf()));
        }
        if let Some(path) = env_override(ENV_CONFIG) {
            return Ok(Self::Env(path));
        }
        let base = BaseDirs::new().ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self::Default(
            base.config_dir().join(APPLICATION).join(CONFIG_FILE),
        ))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Explicit(path) | Self::Env(path) | Self::Default(path) => path,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Default(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Explicit(_) => "command line",
            Self::Env(_) => ENV_CONFIG,
            Self::Default(_) => "default",
        }
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
