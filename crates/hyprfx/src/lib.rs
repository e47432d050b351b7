//! Plugin lifecycle for the window transition engine.
//!
//! [`Plugin`] ties the pieces together the way a compositor plugin needs
//! them: effects and their configuration keys are registered at
//! construction, programs are compiled in [`Plugin::init`], compositor events
//! are routed through the `on_*` hooks, and [`Plugin::shutdown`] releases
//! everything in the right order. The compositor's GL context must be current
//! whenever `init`, `reload`, `on_render` or `shutdown` runs.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use fxconfig::{ConfigSource, ConfigStore, STRICT_SHADERS_KEY};
use renderer::{
    CompileReport, Compositor, EffectRegistry, FrameContext, FrameRenderer, GlApi, HostWindow,
    RegistryError, RenderStage, WindowId,
};
use scheduler::{AnimationScheduler, FrameStats, TransitionSettings};

pub struct Plugin<G: GlApi> {
    gl: G,
    config: ConfigStore,
    registry: EffectRegistry,
    scheduler: AnimationScheduler,
    initialised: bool,
}

impl<G: GlApi> Plugin<G> {
    /// Plugin with every built-in effect registered.
    pub fn new(gl: G, config: ConfigStore) -> Self {
        Self::with_registry(gl, config, EffectRegistry::with_builtin())
    }

    pub fn with_registry(gl: G, mut config: ConfigStore, registry: EffectRegistry) -> Self {
        config.register_core_defaults();
        registry.register_config_defaults(&mut config);
        let settings = TransitionSettings::from_config(&config);
        Self {
            gl,
            config,
            registry,
            scheduler: AnimationScheduler::new(settings),
            initialised: false,
        }
    }

    /// Compiles every effect program.
    ///
    /// With `strict_shaders` set, any failure aborts: all programs are
    /// released again and an error naming the failed effects is returned.
    /// Otherwise failing effects stay disabled and the rest keep working.
    pub fn init(&mut self) -> Result<CompileReport> {
        let report = self.compile()?;
        self.initialised = true;
        tracing::info!(effects = self.registry.len(), "window transitions initialised");
        Ok(report)
    }

    /// Applies a new configuration and rebuilds the programs.
    ///
    /// In-flight transitions are dropped before the old programs go away.
    pub fn reload(&mut self, mut config: ConfigStore) -> Result<CompileReport> {
        config.register_core_defaults();
        self.registry.register_config_defaults(&mut config);
        if let Err(err) = config.validate() {
            tracing::warn!(error = %err, "configuration has invalid values; defaults apply");
        }
        self.config = config;
        self.scheduler
            .set_settings(TransitionSettings::from_config(&self.config));
        self.scheduler.clear();

        if !self.initialised {
            return Ok(CompileReport::default());
        }
        self.compile()
    }

    fn compile(&mut self) -> Result<CompileReport> {
        let report = self.registry.compile_all(&self.gl);
        if report.is_success() {
            return Ok(report);
        }

        if self.strict_shaders() {
            self.registry.destroy_all(&self.gl);
            self.initialised = false;
            let err = RegistryError::Compile {
                failures: report.failures,
            };
            return Err(anyhow::Error::new(err)
                .context("shader compilation failed with strict_shaders enabled"));
        }

        for failure in &report.failures {
            tracing::warn!(effect = %failure.effect, "effect disabled after compile failure");
        }
        Ok(report)
    }

    fn strict_shaders(&self) -> bool {
        self.config.get_bool(STRICT_SHADERS_KEY).unwrap_or(false)
    }

    /// Starts an opening transition. Does nothing until [`init`](Self::init) succeeds.
    pub fn on_open_window(&mut self, window: &Arc<dyn HostWindow>, now: Instant) -> bool {
        if !self.initialised {
            return false;
        }
        self.scheduler.window_opened(window, &self.registry, now)
    }

    /// Starts a closing transition. Does nothing until [`init`](Self::init) succeeds.
    pub fn on_close_window<C: Compositor>(
        &mut self,
        window: &Arc<dyn HostWindow>,
        compositor: &C,
        now: Instant,
    ) -> bool {
        if !self.initialised {
            return false;
        }
        self.scheduler
            .window_closed(window, &self.registry, compositor, now)
    }

    pub fn on_window_destroyed(&mut self, id: WindowId) {
        self.scheduler.window_destroyed(id);
    }

    /// Render hook. Only acts after windows have been drawn; returns `None`
    /// when there was nothing to do or the plugin is not initialised.
    pub fn on_render<C: Compositor>(
        &mut self,
        stage: RenderStage,
        frame: &FrameContext,
        compositor: &C,
        now: Instant,
    ) -> Option<FrameStats> {
        if stage != RenderStage::PostWindows || !self.initialised || self.scheduler.is_idle() {
            return None;
        }
        let renderer = FrameRenderer::new(&self.gl, &self.registry, &self.config);
        Some(self.scheduler.render(&renderer, frame, compositor, now))
    }

    /// Drops all transitions, then releases every GL object.
    pub fn shutdown(&mut self) {
        self.scheduler.clear();
        self.registry.destroy_all(&self.gl);
        if self.initialised {
            tracing::info!("window transitions shut down");
        }
        self.initialised = false;
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    pub fn gl(&self) -> &G {
        &self.gl
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &AnimationScheduler {
        &self.scheduler
    }
}

impl<G: GlApi> Drop for Plugin<G> {
    fn drop(&mut self) {
        if self.initialised {
            tracing::warn!("plugin dropped without shutdown; GL objects were not released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use fxconfig::{ConfigValue, CLOSE_EFFECT_KEY, OPEN_EFFECT_KEY};
    use renderer::testing::{FakeCompositor, FakeWindow, RecordingGl};
    use renderer::{Monitor, Rect, Vec2};

    fn frame() -> FrameContext {
        FrameContext::full_damage(Monitor::new(
            Vec2::new(0.0, 0.0),
            Vec2::new(1280.0, 720.0),
            1.0,
        ))
    }

    fn window(id: u64) -> Arc<dyn HostWindow> {
        FakeWindow::new(id, Rect::new(20.0, 20.0, 320.0, 240.0))
            .with_pid(100 + id as u32)
            .with_texture(id as u32 + 1000)
            .shared()
    }

    #[test]
    fn registers_effect_defaults() {
        let plugin = Plugin::new(RecordingGl::new(), ConfigStore::with_core_defaults());
        assert!(plugin.config().is_registered("plugin:hfx:fire_color_1"));
        assert_eq!(plugin.registry().len(), 3);
        assert!(!plugin.is_initialised());
    }

    #[test]
    fn full_lifecycle_leaves_no_gl_objects() {
        let mut plugin = Plugin::new(RecordingGl::new(), ConfigStore::with_core_defaults());
        let report = plugin.init().unwrap();
        assert_eq!(report.compiled.len(), 3);

        let compositor = FakeCompositor::new();
        let t0 = Instant::now();
        let opened = window(1);
        let closed = window(2);
        assert!(plugin.on_open_window(&opened, t0));
        assert!(plugin.on_close_window(&closed, &compositor, t0));
        drop(closed);

        let stats = plugin
            .on_render(RenderStage::PostWindows, &frame(), &compositor, t0 + Duration::from_millis(250))
            .unwrap();
        assert_eq!(stats.drawn, 2);

        plugin.shutdown();
        assert!(plugin.scheduler().is_idle());
        assert_eq!(plugin.gl().live_objects(), 0);
    }

    #[test]
    fn ignores_other_render_stages() {
        let mut plugin = Plugin::new(RecordingGl::new(), ConfigStore::with_core_defaults());
        plugin.init().unwrap();
        let compositor = FakeCompositor::new();
        let t0 = Instant::now();
        plugin.on_open_window(&window(1), t0);

        for stage in [RenderStage::Pre, RenderStage::PostOverlays, RenderStage::Last] {
            assert!(plugin.on_render(stage, &frame(), &compositor, t0).is_none());
        }
        assert!(plugin.gl().draws().is_empty());
        plugin.shutdown();
    }

    #[test]
    fn lenient_init_disables_only_the_broken_effect() {
        let gl = RecordingGl::new();
        gl.fail_compile_containing("uniform vec4 uColor;");
        let mut plugin = Plugin::new(gl, ConfigStore::with_core_defaults());

        let report = plugin.init().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(plugin.is_initialised());
        assert!(plugin.registry().get_program("fire").unwrap().is_ready());
        assert!(!plugin.registry().get_program("tv").unwrap().is_ready());
        plugin.shutdown();
    }

    #[test]
    fn strict_init_fails_and_releases_programs() {
        let gl = RecordingGl::new();
        gl.fail_link_containing("uPixelSize");
        let mut config = ConfigStore::with_core_defaults();
        config.set(STRICT_SHADERS_KEY, ConfigValue::Int(1));
        let mut plugin = Plugin::new(gl, config);

        let err = plugin.init().unwrap_err();
        assert!(format!("{err:#}").contains("pixelate"));
        assert!(!plugin.is_initialised());
        assert_eq!(plugin.gl().live_objects(), 0);
    }

    #[test]
    fn toml_config_values_are_converted_to_core_types() {
        let config = ConfigStore::from_toml_str(
            "[plugin.hfx]\nduration = \"250ms\"\nstrict_shaders = \"yes\"\n",
        )
        .unwrap();
        let gl = RecordingGl::new();
        gl.fail_compile_containing("uniform vec4 uColor;");
        let mut plugin = Plugin::new(gl, config);

        assert!((plugin.scheduler().settings().duration - 0.25).abs() < 1e-9);
        assert!(plugin.config().validate().is_ok());
        assert!(plugin.init().is_err());
        assert_eq!(plugin.gl().live_objects(), 0);
    }

    #[test]
    fn reload_converts_toml_values() {
        let mut plugin = Plugin::new(RecordingGl::new(), ConfigStore::with_core_defaults());
        plugin.init().unwrap();

        let config = ConfigStore::from_toml_str("[plugin.hfx]\nduration = \"1500ms\"\n").unwrap();
        plugin.reload(config).unwrap();
        assert!((plugin.scheduler().settings().duration - 1.5).abs() < 1e-9);
        plugin.shutdown();
    }

    #[test]
    fn hooks_do_nothing_after_strict_init_failure() {
        let gl = RecordingGl::new();
        gl.fail_link_containing("uPixelSize");
        let mut config = ConfigStore::with_core_defaults();
        config.set(STRICT_SHADERS_KEY, ConfigValue::Int(1));
        let mut plugin = Plugin::new(gl, config);
        assert!(plugin.init().is_err());

        let compositor = FakeCompositor::new();
        let t0 = Instant::now();
        for id in 0..50 {
            let window = window(id);
            assert!(!plugin.on_open_window(&window, t0));
            assert!(!plugin.on_close_window(&window, &compositor, t0));
        }
        assert_eq!(plugin.scheduler().closing_count(), 0);
        assert!(plugin.scheduler().is_idle());
        assert!(plugin
            .on_render(RenderStage::PostWindows, &frame(), &compositor, t0 + Duration::from_secs(60))
            .is_none());
        assert!(plugin.gl().draws().is_empty());
    }

    #[test]
    fn hooks_are_ignored_before_init() {
        let mut plugin = Plugin::new(RecordingGl::new(), ConfigStore::with_core_defaults());
        let compositor = FakeCompositor::new();
        let t0 = Instant::now();

        assert!(!plugin.on_open_window(&window(1), t0));
        assert!(!plugin.on_close_window(&window(2), &compositor, t0));
        assert!(plugin.scheduler().is_idle());
        assert!(compositor.damage().is_empty());
    }

    #[test]
    fn reload_applies_new_settings_and_drops_animations() {
        let mut plugin = Plugin::new(RecordingGl::new(), ConfigStore::with_core_defaults());
        plugin.init().unwrap();
        let t0 = Instant::now();
        plugin.on_open_window(&window(1), t0);
        let live_before = plugin.gl().live_objects();

        let mut config = ConfigStore::with_core_defaults();
        config.set(OPEN_EFFECT_KEY, ConfigValue::Str("none".into()));
        config.set(CLOSE_EFFECT_KEY, ConfigValue::Str("tv".into()));
        plugin.reload(config).unwrap();

        assert!(plugin.scheduler().is_idle());
        assert_eq!(plugin.scheduler().settings().open_effect, None);
        assert!(!plugin.on_open_window(&window(2), t0));
        assert_eq!(plugin.gl().live_objects(), live_before);
        plugin.shutdown();
    }
}
