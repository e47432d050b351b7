use std::time::Instant;

use fxconfig::ConfigSource;

use crate::animation::Animation;
use crate::effects::UniformSink;
use crate::geometry::{Rect, Vec2};
use crate::gl::GlApi;
use crate::host::{FrameContext, SnapshotSource};
use crate::program::QUAD_VERTS;
use crate::registry::EffectRegistry;

/// Why an animation drew nothing this frame. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnknownEffect,
    ProgramNotReady,
    Finished,
    WindowGone,
    Offscreen,
    TextureUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Drawn once per damage rectangle.
    Drawn { passes: usize },
    Skipped(SkipReason),
}

impl FrameOutcome {
    pub fn is_drawn(&self) -> bool {
        matches!(self, FrameOutcome::Drawn { .. })
    }
}

/// Monitor-local pixel box for a layout-space rectangle.
pub fn monitor_box(layout: Rect, frame: &FrameContext) -> Rect {
    let monitor = &frame.monitor;
    layout
        .translate(Vec2::new(-monitor.position.x, -monitor.position.y))
        .scale(monitor.scale)
        .round()
}

/// Turns one animation's state into draw calls for one monitor.
///
/// Holds only borrows, so a renderer is cheap to build per frame. The
/// registry is read-only here.
pub struct FrameRenderer<'a, G: GlApi> {
    gl: &'a G,
    registry: &'a EffectRegistry,
    config: &'a dyn ConfigSource,
}

impl<'a, G: GlApi> FrameRenderer<'a, G> {
    pub fn new(gl: &'a G, registry: &'a EffectRegistry, config: &'a dyn ConfigSource) -> Self {
        Self {
            gl,
            registry,
            config,
        }
    }

    /// Draws `animation` as it looks at `now`.
    ///
    /// Missing preconditions return [`FrameOutcome::Skipped`] without touching
    /// GL. After drawing, the program, vertex array, array buffer, texture and
    /// scissor are all unbound again.
    pub fn render_frame(
        &self,
        animation: &mut dyn Animation,
        frame: &FrameContext,
        snapshots: &dyn SnapshotSource,
        now: Instant,
    ) -> FrameOutcome {
        let name = animation.effect_name();
        let Some(entry) = self.registry.entry(name) else {
            tracing::trace!(effect = name, "unknown effect");
            return FrameOutcome::Skipped(SkipReason::UnknownEffect);
        };
        let program = &entry.program;
        if !program.is_ready() {
            tracing::trace!(effect = name, "program not ready");
            return FrameOutcome::Skipped(SkipReason::ProgramNotReady);
        }

        let progress = animation.progress_at(now);
        if progress >= 1.0 {
            return FrameOutcome::Skipped(SkipReason::Finished);
        }

        let Some(layout) = animation.geometry() else {
            return FrameOutcome::Skipped(SkipReason::WindowGone);
        };
        if !layout.intersects(&frame.monitor.layout_box()) {
            return FrameOutcome::Skipped(SkipReason::Offscreen);
        }

        let Some(texture) = animation.resolve_texture(snapshots) else {
            tracing::debug!(
                window = %animation.window_id(),
                kind = animation.kind().label(),
                "no texture yet"
            );
            return FrameOutcome::Skipped(SkipReason::TextureUnavailable);
        };

        let window_box = monitor_box(layout, frame);
        let matrix = frame
            .projection
            .multiply(&frame.monitor.projection.project_box(&window_box));

        let gl = self.gl;
        let common = program.common();
        gl.use_program(Some(program.handle()));
        gl.uniform_matrix3(common.proj, &matrix.to_gl());

        gl.bind_texture(0, texture.target, Some(texture.id));
        gl.texture_linear_filtering(texture.target);
        gl.uniform_1i(common.tex, 0);

        gl.uniform_1f(common.progress, progress);
        gl.uniform_1f(common.duration, animation.duration() as f32);
        gl.uniform_1i(common.for_opening, i32::from(animation.is_opening()));
        let scale = frame.monitor.scale;
        gl.uniform_2f(
            common.size,
            (layout.width * scale) as f32,
            (layout.height * scale) as f32,
        );
        gl.uniform_1f(common.padding, 0.0);

        entry.effect.apply_parameters(
            &UniformSink::new(gl, program),
            self.config,
            animation.seed(),
        );

        gl.set_blend(true);
        let quad = program.quad();
        gl.bind_vertex_array(Some(quad.vao));
        gl.bind_array_buffer(Some(quad.vbo_uv));
        gl.array_buffer_sub_data(&QUAD_VERTS);

        for rect in &frame.damage {
            gl.scissor(Some(*rect));
            gl.draw_triangle_strip(4);
        }

        gl.bind_vertex_array(None);
        gl.bind_array_buffer(None);
        gl.bind_texture(0, texture.target, None);
        gl.use_program(None);
        gl.scissor(None);

        FrameOutcome::Drawn {
            passes: frame.damage.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::animation::{DetachedAnimation, LiveAnimation, TransitionKind};
    use crate::geometry::Mat3;
    use crate::gl::ScissorRect;
    use crate::host::{HostWindow, Monitor, NoSnapshots};
    use crate::testing::{FakeCompositor, FakeWindow, RecordingGl, UniformValue};
    use fxconfig::ConfigStore;

    struct Fixture {
        gl: RecordingGl,
        registry: EffectRegistry,
        config: ConfigStore,
    }

    impl Fixture {
        fn new() -> Self {
            let gl = RecordingGl::new();
            let mut registry = EffectRegistry::with_builtin();
            let mut config = ConfigStore::with_core_defaults();
            registry.register_config_defaults(&mut config);
            registry.compile_all(&gl).into_result().unwrap();
            gl.clear_log();
            Self {
                gl,
                registry,
                config,
            }
        }

        fn renderer(&self) -> FrameRenderer<'_, RecordingGl> {
            FrameRenderer::new(&self.gl, &self.registry, &self.config)
        }
    }

    fn frame() -> FrameContext {
        let monitor = Monitor::new(Vec2::new(1920.0, 0.0), Vec2::new(1920.0, 1080.0), 2.0);
        let mut frame = FrameContext::full_damage(monitor);
        frame.damage = vec![
            ScissorRect::new(0, 0, 100, 100),
            ScissorRect::new(200, 200, 50, 50),
        ];
        frame
    }

    fn window(texture: u32) -> Arc<FakeWindow> {
        Arc::new(FakeWindow::new(9, Rect::new(2020.0, 10.0, 300.0, 200.0)).with_texture(texture))
    }

    #[test]
    fn draws_once_per_damage_rect_and_restores_state() {
        let fixture = Fixture::new();
        let window = window(77);
        let shared: Arc<dyn HostWindow> = window.clone();
        let t0 = Instant::now();
        let mut animation = LiveAnimation::new(&shared, "fire", TransitionKind::Opening, 2.0, t0);

        let outcome = fixture.renderer().render_frame(
            &mut animation,
            &frame(),
            &NoSnapshots,
            t0 + Duration::from_millis(500),
        );
        assert_eq!(outcome, FrameOutcome::Drawn { passes: 2 });

        let gl = &fixture.gl;
        let draws = gl.draws();
        assert_eq!(draws.len(), 2);
        let program = fixture.registry.get_program("fire").unwrap();
        for draw in &draws {
            assert_eq!(draw.program, Some(program.handle()));
            assert_eq!(draw.texture, Some(77));
            assert_eq!(draw.vertex_array, Some(program.quad().vao));
            assert_eq!(draw.vertex_count, 4);
            assert!(draw.blend);
        }
        assert_eq!(draws[1].scissor, Some(ScissorRect::new(200, 200, 50, 50)));

        assert_eq!(gl.current_program(), None);
        assert_eq!(gl.bound_vertex_array(), None);
        assert_eq!(gl.bound_array_buffer(), None);
        assert_eq!(gl.bound_texture(), None);
        assert_eq!(gl.scissor_rect(), None);

        let uploads = gl.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].buffer, program.quad().vbo_uv);
        assert!(uploads[0].partial);
    }

    #[test]
    fn sets_common_uniforms() {
        let fixture = Fixture::new();
        let window = window(77);
        let shared: Arc<dyn HostWindow> = window.clone();
        let t0 = Instant::now();
        let mut animation = LiveAnimation::new(&shared, "tv", TransitionKind::Opening, 2.0, t0);

        fixture.renderer().render_frame(
            &mut animation,
            &frame(),
            &NoSnapshots,
            t0 + Duration::from_secs(1),
        );

        let gl = &fixture.gl;
        assert_eq!(gl.last_uniform("uProgress"), Some(UniformValue::Float(0.5)));
        assert_eq!(gl.last_uniform("uDuration"), Some(UniformValue::Float(2.0)));
        assert_eq!(gl.last_uniform("uForOpening"), Some(UniformValue::Int(1)));
        assert_eq!(gl.last_uniform("uSize"), Some(UniformValue::Vec2([600.0, 400.0])));
        assert_eq!(gl.last_uniform("uPadding"), Some(UniformValue::Float(0.0)));
        assert_eq!(gl.last_uniform("tex"), Some(UniformValue::Int(0)));
        assert!(matches!(gl.last_uniform("uColor"), Some(UniformValue::Vec4(_))));
    }

    #[test]
    fn projection_places_the_window_box() {
        let fixture = Fixture::new();
        let window = window(77);
        let shared: Arc<dyn HostWindow> = window.clone();
        let t0 = Instant::now();
        let mut animation = LiveAnimation::new(&shared, "pixelate", TransitionKind::Opening, 1.0, t0);
        let frame = frame();

        fixture
            .renderer()
            .render_frame(&mut animation, &frame, &NoSnapshots, t0);

        let Some(UniformValue::Mat3(uploaded)) = fixture.gl.last_uniform("proj") else {
            panic!("projection not uploaded");
        };
        let expected = frame
            .projection
            .multiply(&Mat3::identity().project_box(&Rect::new(200.0, 20.0, 600.0, 400.0)));
        assert_eq!(uploaded, expected.to_gl());
    }

    #[test]
    fn closing_animation_renders_after_window_is_destroyed() {
        let fixture = Fixture::new();
        let compositor = FakeCompositor::new();
        let t0 = Instant::now();
        let mut animation = {
            let shared: Arc<dyn HostWindow> = window(55);
            DetachedAnimation::capture(&shared, "pixelate", 1.0, &compositor, t0)
        };

        let outcome = fixture.renderer().render_frame(
            &mut animation,
            &frame(),
            &compositor,
            t0 + Duration::from_millis(300),
        );
        assert!(outcome.is_drawn());
        assert_eq!(fixture.gl.draws()[0].texture, Some(55));
        assert_eq!(fixture.gl.last_uniform("uForOpening"), Some(UniformValue::Int(0)));
    }

    #[test]
    fn skips_without_drawing() {
        let fixture = Fixture::new();
        let t0 = Instant::now();
        let window = window(0);
        let shared: Arc<dyn HostWindow> = window.clone();
        let renderer = fixture.renderer();
        let frame = frame();

        let mut unknown = LiveAnimation::new(&shared, "sparkle", TransitionKind::Opening, 1.0, t0);
        assert_eq!(
            renderer.render_frame(&mut unknown, &frame, &NoSnapshots, t0),
            FrameOutcome::Skipped(SkipReason::UnknownEffect)
        );

        let mut no_texture = LiveAnimation::new(&shared, "fire", TransitionKind::Opening, 1.0, t0);
        assert_eq!(
            renderer.render_frame(&mut no_texture, &frame, &NoSnapshots, t0),
            FrameOutcome::Skipped(SkipReason::TextureUnavailable)
        );
        assert_eq!(
            renderer.render_frame(&mut no_texture, &frame, &NoSnapshots, t0 + Duration::from_secs(1)),
            FrameOutcome::Skipped(SkipReason::Finished)
        );

        window.set_texture(Some(3));
        window.set_geometry(Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(
            renderer.render_frame(&mut no_texture, &frame, &NoSnapshots, t0),
            FrameOutcome::Skipped(SkipReason::Offscreen)
        );

        drop(shared);
        drop(window);
        assert_eq!(
            renderer.render_frame(&mut no_texture, &frame, &NoSnapshots, t0),
            FrameOutcome::Skipped(SkipReason::WindowGone)
        );

        assert!(fixture.gl.draws().is_empty());
        assert!(fixture.gl.uniform_writes().is_empty());
    }

    #[test]
    fn skips_effects_whose_program_failed() {
        let gl = RecordingGl::new();
        gl.fail_compile_containing("uGradient1");
        let mut registry = EffectRegistry::with_builtin();
        let config = ConfigStore::with_core_defaults();
        let _ = registry.compile_all(&gl);

        let shared: Arc<dyn HostWindow> = window(77);
        let t0 = Instant::now();
        let mut animation = LiveAnimation::new(&shared, "fire", TransitionKind::Opening, 1.0, t0);
        let renderer = FrameRenderer::new(&gl, &registry, &config);
        assert_eq!(
            renderer.render_frame(&mut animation, &frame(), &NoSnapshots, t0),
            FrameOutcome::Skipped(SkipReason::ProgramNotReady)
        );
    }
}
