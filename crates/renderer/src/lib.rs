//! GPU effect engine for window open/close transitions.
//!
//! The crate renders one textured quad per in-flight transition, using the
//! compositor's own GL context. The overall flow is:
//!
//! ```text
//!   EffectRegistry::register ──▶ compile_all(gl) ──▶ ShaderProgram per effect
//!                                                        │
//!   LiveAnimation / DetachedAnimation                    │
//!          │ dyn Animation                               ▼
//!          └──────────▶ FrameRenderer::render_frame ──▶ uniforms + draws
//!                                     │
//!                                     └─▶ Effect::apply_parameters(UniformSink)
//! ```
//!
//! Everything GL goes through [`gl::GlApi`], implemented for `glow::Context`.
//! The compositor side (windows, snapshots, damage, monitors) is described by
//! the traits in [`host`].

pub mod animation;
pub mod compile;
pub mod effects;
pub mod frame;
pub mod geometry;
pub mod gl;
pub mod host;
pub mod program;
pub mod registry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use animation::{
    effective_duration, seed_for, Animation, DetachedAnimation, LiveAnimation, Timeline,
    TransitionKind,
};
pub use compile::ProgramError;
pub use effects::{Effect, UniformSink};
pub use frame::{FrameOutcome, FrameRenderer, SkipReason};
pub use geometry::{Mat3, Rect, Vec2};
pub use gl::GlApi;
pub use host::{
    Compositor, DamageSink, FrameContext, HostWindow, Monitor, NoSnapshots, RenderStage,
    SnapshotSource, Texture, WindowId,
};
pub use program::ShaderProgram;
pub use registry::{CompileReport, EffectCompileError, EffectRegistry, RegistryError};
