use std::sync::Arc;
use std::time::Instant;

use fxconfig::{
    ConfigSource, CLOSE_EFFECT_KEY, DEFAULT_DURATION_SECS, DEFAULT_EFFECT, DURATION_KEY,
    OPEN_EFFECT_KEY,
};
use renderer::{
    effective_duration, Animation, Compositor, DetachedAnimation, EffectRegistry, FrameContext,
    FrameOutcome, FrameRenderer, GlApi, HostWindow, LiveAnimation, SkipReason, TransitionKind,
    WindowId,
};

/// Which effect runs for each direction, and for how long.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionSettings {
    pub open_effect: Option<String>,
    pub close_effect: Option<String>,
    pub duration: f64,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            open_effect: Some(DEFAULT_EFFECT.to_string()),
            close_effect: Some(DEFAULT_EFFECT.to_string()),
            duration: DEFAULT_DURATION_SECS,
        }
    }
}

fn normalize_effect(value: Option<&str>) -> Option<String> {
    let name = value.unwrap_or(DEFAULT_EFFECT).trim();
    if name.is_empty() || name.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(name.to_string())
    }
}

impl TransitionSettings {
    pub fn from_config(config: &dyn ConfigSource) -> Self {
        Self {
            open_effect: normalize_effect(config.get_str(OPEN_EFFECT_KEY)),
            close_effect: normalize_effect(config.get_str(CLOSE_EFFECT_KEY)),
            duration: effective_duration(
                config.get_float(DURATION_KEY).unwrap_or(DEFAULT_DURATION_SECS),
            ),
        }
    }

    pub fn effect_for(&self, kind: TransitionKind) -> Option<&str> {
        match kind {
            TransitionKind::Opening => self.open_effect.as_deref(),
            TransitionKind::Closing => self.close_effect.as_deref(),
        }
    }
}

/// Counters for one [`AnimationScheduler::render`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub drawn: usize,
    pub skipped: usize,
    pub retired: usize,
}

/// Owns every in-flight transition.
///
/// Opening transitions live in per-window decoration slots; closing ones in
/// a separate collection that does not depend on the window staying alive.
/// Both are kept in insertion order, which is also draw order.
#[derive(Debug, Default)]
pub struct AnimationScheduler {
    settings: TransitionSettings,
    decorations: Vec<LiveAnimation>,
    closing: Vec<DetachedAnimation>,
}

impl AnimationScheduler {
    pub fn new(settings: TransitionSettings) -> Self {
        Self {
            settings,
            decorations: Vec::new(),
            closing: Vec::new(),
        }
    }

    pub fn settings(&self) -> &TransitionSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: TransitionSettings) {
        self.settings = settings;
    }

    /// Attaches an opening transition to `window`, replacing any earlier one.
    ///
    /// Returns `false` (and creates nothing) when the open effect is disabled
    /// or not registered.
    pub fn window_opened(
        &mut self,
        window: &Arc<dyn HostWindow>,
        registry: &EffectRegistry,
        now: Instant,
    ) -> bool {
        let id = window.id();
        let Some(effect) = self.enabled_effect(TransitionKind::Opening, registry) else {
            return false;
        };

        self.decorations.retain(|decoration| decoration.window_id() != id);
        self.decorations.push(LiveAnimation::new(
            window,
            effect,
            TransitionKind::Opening,
            self.settings.duration,
            now,
        ));
        tracing::debug!(window = %id, "open decoration attached");
        true
    }

    /// Starts a closing transition from `window`'s current geometry and image.
    ///
    /// Any opening transition still attached to the window is dropped. Returns
    /// `false` when the close effect is disabled or not registered.
    pub fn window_closed<C: Compositor>(
        &mut self,
        window: &Arc<dyn HostWindow>,
        registry: &EffectRegistry,
        compositor: &C,
        now: Instant,
    ) -> bool {
        let id = window.id();
        self.decorations.retain(|decoration| decoration.window_id() != id);

        let Some(effect) = self.enabled_effect(TransitionKind::Closing, registry) else {
            return false;
        };

        let animation =
            DetachedAnimation::capture(window, effect, self.settings.duration, compositor, now);
        compositor.damage_box(window.geometry());
        self.closing.push(animation);
        true
    }

    /// Drops the window's decoration; closing transitions are unaffected.
    pub fn window_destroyed(&mut self, id: WindowId) {
        self.decorations.retain(|decoration| decoration.window_id() != id);
    }

    /// Renders every running transition on one monitor.
    ///
    /// Finished transitions are retired first, with a final damage request so
    /// their last frame gets repainted away. Everything still running that
    /// overlaps this monitor is damaged again to keep frames coming.
    pub fn render<G: GlApi, C: Compositor>(
        &mut self,
        renderer: &FrameRenderer<'_, G>,
        frame: &FrameContext,
        compositor: &C,
        now: Instant,
    ) -> FrameStats {
        let mut stats = FrameStats {
            retired: self.retire_finished(compositor, now),
            ..FrameStats::default()
        };

        for decoration in &mut self.decorations {
            let visible = decoration
                .window()
                .is_some_and(|window| window.is_visible());
            if !visible {
                stats.skipped += 1;
                continue;
            }
            let outcome = renderer.render_frame(decoration, frame, compositor, now);
            record(&mut stats, outcome, &*decoration, compositor);
        }

        for animation in &mut self.closing {
            let outcome = renderer.render_frame(animation, frame, compositor, now);
            record(&mut stats, outcome, &*animation, compositor);
        }

        stats
    }

    /// Drops every transition. Call before destroying effect programs.
    pub fn clear(&mut self) {
        self.decorations.clear();
        self.closing.clear();
    }

    pub fn decoration_count(&self) -> usize {
        self.decorations.len()
    }

    pub fn closing_count(&self) -> usize {
        self.closing.len()
    }

    pub fn is_idle(&self) -> bool {
        self.decorations.is_empty() && self.closing.is_empty()
    }

    fn enabled_effect(&self, kind: TransitionKind, registry: &EffectRegistry) -> Option<String> {
        let effect = self.settings.effect_for(kind)?;
        if !registry.has(effect) {
            tracing::debug!(effect, kind = kind.label(), "effect not registered");
            return None;
        }
        Some(effect.to_string())
    }

    /// Drops finished transitions and transitions whose window is gone,
    /// damaging each finished one's box once more. Returns how many went.
    pub fn retire_finished<C: Compositor>(&mut self, compositor: &C, now: Instant) -> usize {
        let before = self.decorations.len() + self.closing.len();

        self.decorations.retain(|decoration| {
            let Some(window) = decoration.window() else {
                return false;
            };
            if decoration.is_done_at(now) {
                compositor.damage_box(window.geometry());
                return false;
            }
            true
        });

        self.closing.retain(|animation| {
            if !animation.is_done_at(now) {
                return true;
            }
            if let Some(geometry) = animation.geometry() {
                compositor.damage_box(geometry);
            }
            tracing::trace!(window = %animation.window_id(), "closing animation finished");
            false
        });

        before - self.decorations.len() - self.closing.len()
    }
}

/// Counts the outcome and damages the animation's box unless it can no
/// longer produce a frame here (offscreen or finished).
fn record<C: Compositor>(
    stats: &mut FrameStats,
    outcome: FrameOutcome,
    animation: &dyn Animation,
    compositor: &C,
) {
    let keep_redrawing = match outcome {
        FrameOutcome::Drawn { .. } => {
            stats.drawn += 1;
            true
        }
        FrameOutcome::Skipped(reason) => {
            stats.skipped += 1;
            !matches!(reason, SkipReason::Offscreen | SkipReason::Finished)
        }
    };
    if keep_redrawing {
        if let Some(geometry) = animation.geometry() {
            compositor.damage_box(geometry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use fxconfig::{ConfigStore, ConfigValue};
    use renderer::testing::{FakeCompositor, FakeWindow, RecordingGl};
    use renderer::{Monitor, Rect, Vec2};

    struct Harness {
        gl: RecordingGl,
        registry: EffectRegistry,
        config: ConfigStore,
        compositor: FakeCompositor,
        frame: FrameContext,
    }

    impl Harness {
        fn new() -> Self {
            let gl = RecordingGl::new();
            let mut registry = EffectRegistry::with_builtin();
            let mut config = ConfigStore::with_core_defaults();
            registry.register_config_defaults(&mut config);
            registry.compile_all(&gl).into_result().unwrap();
            let monitor = Monitor::new(Vec2::new(0.0, 0.0), Vec2::new(1920.0, 1080.0), 1.0);
            Self {
                gl,
                registry,
                config,
                compositor: FakeCompositor::new(),
                frame: FrameContext::full_damage(monitor),
            }
        }

        fn render(&self, scheduler: &mut AnimationScheduler, now: Instant) -> FrameStats {
            let renderer = FrameRenderer::new(&self.gl, &self.registry, &self.config);
            scheduler.render(&renderer, &self.frame, &self.compositor, now)
        }
    }

    fn window(id: u64, texture: u32) -> Arc<FakeWindow> {
        Arc::new(FakeWindow::new(id, Rect::new(10.0, 10.0, 400.0, 300.0)).with_texture(texture))
    }

    #[test]
    fn settings_from_config() {
        let mut config = ConfigStore::with_core_defaults();
        config.set(OPEN_EFFECT_KEY, ConfigValue::Str(" None ".into()));
        config.set(CLOSE_EFFECT_KEY, ConfigValue::Str("tv".into()));
        config.set(DURATION_KEY, ConfigValue::Float(-3.0));

        let settings = TransitionSettings::from_config(&config);
        assert_eq!(settings.open_effect, None);
        assert_eq!(settings.effect_for(TransitionKind::Closing), Some("tv"));
        assert_eq!(settings.duration, 1.0);
    }

    #[test]
    fn opening_lifecycle_retires_after_duration() {
        let harness = Harness::new();
        let mut scheduler = AnimationScheduler::new(TransitionSettings::default());
        let window = window(1, 10);
        let shared: Arc<dyn HostWindow> = window.clone();
        let t0 = Instant::now();

        assert!(scheduler.window_opened(&shared, &harness.registry, t0));
        assert_eq!(scheduler.decoration_count(), 1);

        let stats = harness.render(&mut scheduler, t0 + Duration::from_millis(500));
        assert_eq!(stats, FrameStats { drawn: 1, skipped: 0, retired: 0 });

        harness.gl.clear_log();
        let stats = harness.render(&mut scheduler, t0 + Duration::from_millis(1200));
        assert_eq!(stats, FrameStats { drawn: 0, skipped: 0, retired: 1 });
        assert!(harness.gl.draws().is_empty());
        assert!(scheduler.is_idle());
    }

    #[test]
    fn reopening_replaces_the_decoration() {
        let harness = Harness::new();
        let mut scheduler = AnimationScheduler::new(TransitionSettings::default());
        let shared: Arc<dyn HostWindow> = window(1, 10);
        let t0 = Instant::now();

        scheduler.window_opened(&shared, &harness.registry, t0);
        scheduler.window_opened(&shared, &harness.registry, t0 + Duration::from_millis(100));
        assert_eq!(scheduler.decoration_count(), 1);
    }

    #[test]
    fn disabled_or_unknown_effects_create_nothing() {
        let harness = Harness::new();
        let shared: Arc<dyn HostWindow> = window(1, 10);
        let t0 = Instant::now();

        for name in ["none", "", "sparkle"] {
            let mut config = ConfigStore::with_core_defaults();
            config.set(OPEN_EFFECT_KEY, ConfigValue::Str(name.into()));
            config.set(CLOSE_EFFECT_KEY, ConfigValue::Str(name.into()));
            let mut scheduler = AnimationScheduler::new(TransitionSettings::from_config(&config));

            assert!(!scheduler.window_opened(&shared, &harness.registry, t0));
            assert!(!scheduler.window_closed(&shared, &harness.registry, &harness.compositor, t0));
            assert!(scheduler.is_idle());
        }
        assert!(harness.compositor.damage().is_empty());
    }

    #[test]
    fn closing_survives_window_destruction() {
        let harness = Harness::new();
        let mut scheduler = AnimationScheduler::new(TransitionSettings {
            close_effect: Some("pixelate".into()),
            ..TransitionSettings::default()
        });
        let t0 = Instant::now();
        {
            let shared: Arc<dyn HostWindow> = window(2, 20);
            scheduler.window_opened(&shared, &harness.registry, t0);
            assert!(scheduler.window_closed(&shared, &harness.registry, &harness.compositor, t0));
            scheduler.window_destroyed(shared.id());
        }
        assert_eq!(scheduler.decoration_count(), 0);
        assert_eq!(scheduler.closing_count(), 1);
        assert_eq!(harness.compositor.take_damage(), [Rect::new(10.0, 10.0, 400.0, 300.0)]);

        let stats = harness.render(&mut scheduler, t0 + Duration::from_millis(400));
        assert_eq!(stats.drawn, 1);
        assert_eq!(harness.gl.draws()[0].texture, Some(20));
        assert_eq!(harness.compositor.take_damage().len(), 1);

        let stats = harness.render(&mut scheduler, t0 + Duration::from_secs(1));
        assert_eq!(stats.retired, 1);
        assert_eq!(scheduler.closing_count(), 0);
        assert_eq!(harness.compositor.take_damage().len(), 1);
    }

    #[test]
    fn closing_without_texture_waits_for_snapshot() {
        let harness = Harness::new();
        let mut scheduler = AnimationScheduler::new(TransitionSettings::default());
        let t0 = Instant::now();
        let shared: Arc<dyn HostWindow> = window(3, 0);
        scheduler.window_closed(&shared, &harness.registry, &harness.compositor, t0);
        drop(shared);

        let stats = harness.render(&mut scheduler, t0 + Duration::from_millis(100));
        assert_eq!(stats, FrameStats { drawn: 0, skipped: 1, retired: 0 });
        assert_eq!(scheduler.closing_count(), 1);

        harness.compositor.set_snapshot(3, 33);
        let stats = harness.render(&mut scheduler, t0 + Duration::from_millis(200));
        assert_eq!(stats.drawn, 1);
        assert_eq!(harness.gl.draws()[0].texture, Some(33));
    }

    #[test]
    fn skipped_animations_still_request_frames() {
        let gl = RecordingGl::new();
        gl.fail_compile_containing("uniform vec4 uColor;");
        let mut registry = EffectRegistry::with_builtin();
        let _ = registry.compile_all(&gl);
        let config = ConfigStore::with_core_defaults();
        let compositor = FakeCompositor::new();
        let frame = FrameContext::full_damage(Monitor::new(
            Vec2::new(0.0, 0.0),
            Vec2::new(1920.0, 1080.0),
            1.0,
        ));
        let mut scheduler = AnimationScheduler::new(TransitionSettings {
            open_effect: Some("tv".into()),
            ..TransitionSettings::default()
        });
        let shared: Arc<dyn HostWindow> = window(9, 90);
        let t0 = Instant::now();
        assert!(scheduler.window_opened(&shared, &registry, t0));

        let renderer = FrameRenderer::new(&gl, &registry, &config);
        let stats = scheduler.render(&renderer, &frame, &compositor, t0);
        assert_eq!(stats, FrameStats { drawn: 0, skipped: 1, retired: 0 });
        assert_eq!(compositor.take_damage(), [Rect::new(10.0, 10.0, 400.0, 300.0)]);

        let stats = scheduler.render(&renderer, &frame, &compositor, t0 + Duration::from_secs(2));
        assert_eq!(stats.retired, 1);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn offscreen_animations_do_not_request_frames() {
        let harness = Harness::new();
        let mut scheduler = AnimationScheduler::new(TransitionSettings::default());
        let window = window(10, 100);
        window.set_geometry(Rect::new(4000.0, 10.0, 400.0, 300.0));
        let shared: Arc<dyn HostWindow> = window.clone();
        let t0 = Instant::now();
        scheduler.window_opened(&shared, &harness.registry, t0);

        let stats = harness.render(&mut scheduler, t0);
        assert_eq!(stats, FrameStats { drawn: 0, skipped: 1, retired: 0 });
        assert!(harness.compositor.damage().is_empty());
    }

    #[test]
    fn retiring_without_rendering_reclaims_finished_transitions() {
        let harness = Harness::new();
        let mut scheduler = AnimationScheduler::new(TransitionSettings::default());
        let t0 = Instant::now();
        for id in 0..5 {
            let shared: Arc<dyn HostWindow> = window(20 + id, 200);
            scheduler.window_closed(&shared, &harness.registry, &harness.compositor, t0);
        }
        assert_eq!(scheduler.closing_count(), 5);

        assert_eq!(scheduler.retire_finished(&harness.compositor, t0), 0);
        assert_eq!(
            scheduler.retire_finished(&harness.compositor, t0 + Duration::from_secs(1)),
            5
        );
        assert!(scheduler.is_idle());
        assert!(harness.gl.draws().is_empty());
    }

    #[test]
    fn hidden_windows_are_skipped() {
        let harness = Harness::new();
        let mut scheduler = AnimationScheduler::new(TransitionSettings::default());
        let window = window(4, 40);
        let shared: Arc<dyn HostWindow> = window.clone();
        let t0 = Instant::now();
        scheduler.window_opened(&shared, &harness.registry, t0);
        window.set_visible(false);

        let stats = harness.render(&mut scheduler, t0);
        assert_eq!(stats, FrameStats { drawn: 0, skipped: 1, retired: 0 });
        assert_eq!(scheduler.decoration_count(), 1);
    }

    #[test]
    fn draw_order_is_insertion_order() {
        let harness = Harness::new();
        let mut scheduler = AnimationScheduler::new(TransitionSettings::default());
        let t0 = Instant::now();
        let first: Arc<dyn HostWindow> = window(5, 50);
        let second: Arc<dyn HostWindow> = window(6, 60);
        let third: Arc<dyn HostWindow> = window(7, 70);
        scheduler.window_opened(&second, &harness.registry, t0);
        scheduler.window_opened(&first, &harness.registry, t0);
        scheduler.window_closed(&third, &harness.registry, &harness.compositor, t0);

        harness.render(&mut scheduler, t0);
        let textures: Vec<_> = harness.gl.draws().iter().map(|draw| draw.texture).collect();
        assert_eq!(textures, [Some(60), Some(50), Some(70)]);
    }

    #[test]
    fn clear_drops_everything() {
        let harness = Harness::new();
        let mut scheduler = AnimationScheduler::new(TransitionSettings::default());
        let shared: Arc<dyn HostWindow> = window(8, 80);
        let t0 = Instant::now();
        scheduler.window_opened(&shared, &harness.registry, t0);
        scheduler.window_closed(&shared, &harness.registry, &harness.compositor, t0);
        scheduler.window_opened(&shared, &harness.registry, t0);

        scheduler.clear();
        assert!(scheduler.is_idle());
    }
}
