//! In-flight transitions.
//!
//! Two shapes share the [`Animation`] contract. A [`LiveAnimation`] belongs to
//! a window that is still mapped and reads geometry and texture from it every
//! frame. A [`DetachedAnimation`] outlives its window: geometry is captured at
//! creation and the texture is captured once and then held, which keeps the
//! GL texture alive after the window is gone.

use std::sync::{Arc, Weak};
use std::time::Instant;

use fxconfig::DEFAULT_DURATION_SECS;

use crate::geometry::Rect;
use crate::host::{usable, HostWindow, SnapshotSource, Texture, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Opening,
    Closing,
}

impl TransitionKind {
    pub fn is_opening(self) -> bool {
        self == TransitionKind::Opening
    }

    pub fn label(self) -> &'static str {
        match self {
            TransitionKind::Opening => "opening",
            TransitionKind::Closing => "closing",
        }
    }
}

/// Duration in seconds, with non-positive or non-finite values replaced by the default.
pub fn effective_duration(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        DEFAULT_DURATION_SECS
    }
}

/// Start instant plus duration; progress is a pure function of the clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    start: Instant,
    duration: f64,
}

impl Timeline {
    pub fn new(start: Instant, duration_secs: f64) -> Self {
        Self {
            start,
            duration: effective_duration(duration_secs),
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// `clamp(elapsed / duration, 0, 1)`. Instants before the start count as zero.
    pub fn progress_at(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        (elapsed / self.duration).clamp(0.0, 1.0) as f32
    }

    pub fn is_done_at(&self, now: Instant) -> bool {
        self.progress_at(now) >= 1.0
    }
}

/// Per-window randomisation input: the owning pid, else a value derived from the id.
pub fn seed_for(window: &dyn HostWindow) -> f32 {
    match window.pid() {
        Some(pid) => pid as f32,
        None => (window.id().0 % 65_536) as f32,
    }
}

/// What the frame renderer needs from an in-flight transition.
pub trait Animation {
    fn effect_name(&self) -> &str;
    fn kind(&self) -> TransitionKind;
    fn timeline(&self) -> &Timeline;
    fn seed(&self) -> f32;
    fn window_id(&self) -> WindowId;

    /// Box in layout coordinates, or `None` when there is nothing to place.
    fn geometry(&self) -> Option<Rect>;

    /// Texture to sample this frame, or `None` to skip the frame.
    fn resolve_texture(&mut self, snapshots: &dyn SnapshotSource) -> Option<Arc<Texture>>;

    fn progress_at(&self, now: Instant) -> f32 {
        self.timeline().progress_at(now)
    }

    fn is_done_at(&self, now: Instant) -> bool {
        self.timeline().is_done_at(now)
    }

    fn duration(&self) -> f64 {
        self.timeline().duration()
    }

    fn is_opening(&self) -> bool {
        self.kind().is_opening()
    }
}

/// A transition attached to a mapped window.
#[derive(Debug)]
pub struct LiveAnimation {
    window: Weak<dyn HostWindow>,
    window_id: WindowId,
    effect: String,
    kind: TransitionKind,
    timeline: Timeline,
    seed: f32,
}

impl LiveAnimation {
    pub fn new(
        window: &Arc<dyn HostWindow>,
        effect: impl Into<String>,
        kind: TransitionKind,
        duration_secs: f64,
        now: Instant,
    ) -> Self {
        Self {
            window: Arc::downgrade(window),
            window_id: window.id(),
            effect: effect.into(),
            kind,
            timeline: Timeline::new(now, duration_secs),
            seed: seed_for(window.as_ref()),
        }
    }

    pub fn window(&self) -> Option<Arc<dyn HostWindow>> {
        self.window.upgrade()
    }
}

impl Animation for LiveAnimation {
    fn effect_name(&self) -> &str {
        &self.effect
    }

    fn kind(&self) -> TransitionKind {
        self.kind
    }

    fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    fn seed(&self) -> f32 {
        self.seed
    }

    fn window_id(&self) -> WindowId {
        self.window_id
    }

    fn geometry(&self) -> Option<Rect> {
        self.window.upgrade().map(|window| window.geometry())
    }

    fn resolve_texture(&mut self, _snapshots: &dyn SnapshotSource) -> Option<Arc<Texture>> {
        usable(self.window.upgrade()?.surface_texture())
    }
}

/// A transition that keeps rendering after its window is destroyed.
#[derive(Debug)]
pub struct DetachedAnimation {
    window: Weak<dyn HostWindow>,
    window_id: WindowId,
    effect: String,
    timeline: Timeline,
    seed: f32,
    geometry: Rect,
    texture: Option<Arc<Texture>>,
    attempts: u32,
}

impl DetachedAnimation {
    /// Captures `window`'s geometry and, if one is available, a texture.
    ///
    /// The render snapshot is preferred over the live surface. Without either,
    /// the animation retries on every frame until one shows up.
    pub fn capture(
        window: &Arc<dyn HostWindow>,
        effect: impl Into<String>,
        duration_secs: f64,
        snapshots: &dyn SnapshotSource,
        now: Instant,
    ) -> Self {
        let mut animation = Self {
            window: Arc::downgrade(window),
            window_id: window.id(),
            effect: effect.into(),
            timeline: Timeline::new(now, duration_secs),
            seed: seed_for(window.as_ref()),
            geometry: window.geometry(),
            texture: None,
            attempts: 0,
        };
        animation.try_acquire(snapshots);
        tracing::debug!(
            window = %animation.window_id,
            effect = %animation.effect,
            duration = animation.timeline.duration(),
            has_texture = animation.texture.is_some(),
            "captured closing window"
        );
        animation
    }

    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }

    /// Acquisition attempts made so far, including the one at capture time.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn try_acquire(&mut self, snapshots: &dyn SnapshotSource) {
        self.attempts += 1;
        let texture = usable(snapshots.snapshot(self.window_id)).or_else(|| {
            self.window
                .upgrade()
                .and_then(|window| usable(window.surface_texture()))
        });
        if let Some(texture) = texture {
            if self.attempts > 1 {
                tracing::debug!(
                    window = %self.window_id,
                    attempts = self.attempts,
                    texture = texture.id,
                    "acquired closing texture late"
                );
            }
            self.texture = Some(texture);
        }
    }
}

impl Animation for DetachedAnimation {
    fn effect_name(&self) -> &str {
        &self.effect
    }

    fn kind(&self) -> TransitionKind {
        TransitionKind::Closing
    }

    fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    fn seed(&self) -> f32 {
        self.seed
    }

    fn window_id(&self) -> WindowId {
        self.window_id
    }

    fn geometry(&self) -> Option<Rect> {
        Some(self.geometry)
    }

    fn resolve_texture(&mut self, snapshots: &dyn SnapshotSource) -> Option<Arc<Texture>> {
        if self.texture.is_none() {
            self.try_acquire(snapshots);
        }
        self.texture.clone()
    }
}
