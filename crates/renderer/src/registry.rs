use std::collections::HashMap;
use std::fmt;

use fxconfig::ConfigStore;

use crate::compile::ProgramError;
use crate::effects::Effect;
use crate::gl::GlApi;
use crate::program::ShaderProgram;

/// A single effect whose program could not be built.
#[derive(Debug, thiserror::Error)]
#[error("effect '{effect}': {source}")]
pub struct EffectCompileError {
    pub effect: String,
    #[source]
    pub source: ProgramError,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{} effect(s) failed to compile: {}", .failures.len(), summarize(.failures))]
    Compile { failures: Vec<EffectCompileError> },
}

fn summarize(failures: &[EffectCompileError]) -> String {
    failures
        .iter()
        .map(|failure| failure.effect.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of [`EffectRegistry::compile_all`].
#[derive(Debug, Default)]
pub struct CompileReport {
    pub compiled: Vec<String>,
    pub failures: Vec<EffectCompileError>,
}

impl CompileReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turns any failure into an error for callers that need every effect.
    pub fn into_result(self) -> Result<Vec<String>, RegistryError> {
        if self.failures.is_empty() {
            Ok(self.compiled)
        } else {
            Err(RegistryError::Compile {
                failures: self.failures,
            })
        }
    }
}

/// A registered effect and its (possibly not yet built) program.
pub struct EffectEntry {
    pub effect: Box<dyn Effect>,
    pub program: ShaderProgram,
}

impl fmt::Debug for EffectEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectEntry")
            .field("effect", &self.effect.name())
            .field("program", &self.program.handle())
            .finish()
    }
}

/// Catalog of effects by name.
///
/// Registration is plain bookkeeping and needs no GL context. Programs only
/// come into existence in [`compile_all`](Self::compile_all) and go away in
/// [`destroy_all`](Self::destroy_all), both of which must run with the
/// compositor's context current and while no frame is being rendered.
#[derive(Debug, Default)]
pub struct EffectRegistry {
    entries: HashMap<String, EffectEntry>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in effect.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for effect in crate::effects::builtin() {
            registry.register(effect);
        }
        registry
    }

    /// Inserts `effect`, replacing any earlier registration with the same name.
    ///
    /// A replaced entry's program is dropped without touching GL, so register
    /// before [`compile_all`](Self::compile_all) or after [`destroy_all`](Self::destroy_all).
    pub fn register(&mut self, effect: Box<dyn Effect>) {
        let name = effect.name().to_string();
        let previous = self.entries.insert(
            name.clone(),
            EffectEntry {
                effect,
                program: ShaderProgram::default(),
            },
        );
        if let Some(previous) = previous {
            if previous.program.is_ready() {
                tracing::warn!(effect = %name, "replaced an effect with a live program");
            } else {
                tracing::debug!(effect = %name, "replaced effect registration");
            }
        }
    }

    /// Declares every registered effect's configuration keys in `config`.
    pub fn register_config_defaults(&self, config: &mut ConfigStore) {
        for name in self.names() {
            if let Some(entry) = self.entries.get(name) {
                for (key, value) in entry.effect.config_defaults() {
                    config.register_default(key, value);
                }
            }
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Effect> {
        self.entries.get(name).map(|entry| entry.effect.as_ref())
    }

    pub fn get_program(&self, name: &str) -> Option<&ShaderProgram> {
        self.entries.get(name).map(|entry| &entry.program)
    }

    pub fn entry(&self, name: &str) -> Option<&EffectEntry> {
        self.entries.get(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a program for every registered effect.
    ///
    /// Existing programs are destroyed first. Each effect is built on its own:
    /// a failure leaves that effect's program not ready and is recorded in the
    /// report, while the remaining effects keep compiling.
    pub fn compile_all<G: GlApi + ?Sized>(&mut self, gl: &G) -> CompileReport {
        self.destroy_all(gl);

        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort_unstable();

        let mut report = CompileReport::default();
        for name in names {
            let Some(entry) = self.entries.get_mut(&name) else {
                continue;
            };
            match ShaderProgram::build(gl, entry.effect.as_ref()) {
                Ok(program) => {
                    tracing::debug!(effect = %name, program = program.handle(), "compiled effect");
                    entry.program = program;
                    report.compiled.push(name);
                }
                Err(source) => {
                    tracing::error!(effect = %name, error = %source, "failed to compile effect");
                    report.failures.push(EffectCompileError {
                        effect: name,
                        source,
                    });
                }
            }
        }

        tracing::info!(
            compiled = report.compiled.len(),
            failed = report.failures.len(),
            "compiled effect programs"
        );
        report
    }

    /// Releases every program. Safe after a partial compile; idempotent.
    pub fn destroy_all<G: GlApi + ?Sized>(&mut self, gl: &G) {
        for entry in self.entries.values_mut() {
            entry.program.destroy(gl);
        }
    }
}
