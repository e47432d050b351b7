//! Interfaces the compositor provides to the effect engine.
//!
//! The engine never owns windows, monitors, or textures. It holds weak
//! references to windows and shared references to textures, and it reports
//! screen regions that need repainting back through [`DamageSink`].

use std::fmt;
use std::sync::Arc;

use crate::geometry::{Mat3, Rect, Vec2};
use crate::gl::{ScissorRect, TEXTURE_2D};

/// Stable identity of a compositor window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A GL texture owned by the compositor.
///
/// Textures are handed out as `Arc<Texture>`. The compositor must keep the GL
/// name alive for as long as any clone of that `Arc` exists, which is what
/// lets a closing animation keep drawing after its window is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub id: u32,
    pub target: u32,
}

impl Texture {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            target: TEXTURE_2D,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id == 0
    }
}

/// Returns the texture only if it names a real GL object.
pub(crate) fn usable(texture: Option<Arc<Texture>>) -> Option<Arc<Texture>> {
    texture.filter(|texture| !texture.is_empty())
}

/// The live view of a mapped window.
pub trait HostWindow {
    fn id(&self) -> WindowId;
    /// Owning process id, if the window has one.
    fn pid(&self) -> Option<u32>;
    /// Current (animated) position in layout coordinates.
    fn position(&self) -> Vec2;
    /// Current (animated) size in layout coordinates.
    fn size(&self) -> Vec2;
    /// Texture of the window's current surface buffer, if committed.
    fn surface_texture(&self) -> Option<Arc<Texture>>;

    fn is_visible(&self) -> bool {
        true
    }

    fn geometry(&self) -> Rect {
        Rect::from_parts(self.position(), self.size())
    }
}

/// Render-system-maintained snapshots of a window's last rendered frame.
pub trait SnapshotSource {
    fn snapshot(&self, window: WindowId) -> Option<Arc<Texture>>;
}

/// Accepts requests to repaint a region (layout coordinates).
pub trait DamageSink {
    fn damage_box(&self, rect: Rect);
}

/// Everything the scheduler needs from the compositor besides GL.
pub trait Compositor: SnapshotSource + DamageSink {}

impl<T: SnapshotSource + DamageSink> Compositor for T {}

/// Snapshot source for hosts that keep no snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSnapshots;

impl SnapshotSource for NoSnapshots {
    fn snapshot(&self, _window: WindowId) -> Option<Arc<Texture>> {
        None
    }
}

/// Stage of the compositor's frame at which the render hook fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Pre,
    PostWallpaper,
    PostWindows,
    PostOverlays,
    Last,
}

/// The output currently being rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Monitor {
    /// Top-left corner in layout coordinates.
    pub position: Vec2,
    /// Logical size in layout coordinates.
    pub size: Vec2,
    /// Pixel density (physical pixels per layout unit).
    pub scale: f64,
    /// Maps monitor-local pixels into the monitor's framebuffer orientation.
    pub projection: Mat3,
}

impl Monitor {
    /// Untransformed monitor whose projection is the identity.
    pub fn new(position: Vec2, size: Vec2, scale: f64) -> Self {
        Self {
            position,
            size,
            scale,
            projection: Mat3::identity(),
        }
    }

    pub fn layout_box(&self) -> Rect {
        Rect::from_parts(self.position, self.size)
    }

    /// Size in physical pixels.
    pub fn pixel_size(&self) -> Vec2 {
        Vec2::new(self.size.x * self.scale, self.size.y * self.scale)
    }
}

/// One render pass over one monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameContext {
    pub monitor: Monitor,
    /// Framebuffer projection applied after the monitor projection.
    pub projection: Mat3,
    /// Regions of the framebuffer being repainted this frame.
    pub damage: Vec<ScissorRect>,
}

impl FrameContext {
    /// Frame that repaints the whole monitor with a plain orthographic projection.
    pub fn full_damage(monitor: Monitor) -> Self {
        let pixels = monitor.pixel_size();
        Self {
            monitor,
            projection: Mat3::orthographic(pixels.x as f32, pixels.y as f32),
            damage: vec![ScissorRect::new(0, 0, pixels.x as i32, pixels.y as i32)],
        }
    }
}
