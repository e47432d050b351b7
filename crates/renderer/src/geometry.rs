//! Boxes and the 3x3 projection math used to place a window quad on screen.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in layout (logical) or pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_parts(position: Vec2, size: Vec2) -> Self {
        Self::new(position.x, position.y, size.x, size.y)
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn translate(self, offset: Vec2) -> Self {
        Self::new(self.x + offset.x, self.y + offset.y, self.width, self.height)
    }

    /// Scales position and size uniformly.
    pub fn scale(self, factor: f64) -> Self {
        Self::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    /// Snaps all four edges to whole pixels.
    ///
    /// Edges are rounded rather than the size, so two boxes sharing an edge
    /// still share it after rounding.
    pub fn round(self) -> Self {
        let right = (self.x + self.width).round();
        let bottom = (self.y + self.height).round();
        let x = self.x.round();
        let y = self.y.round();
        Self::new(x, y, right - x, bottom - y)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Row-major 3x3 matrix operating on homogeneous 2D points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub m: [f32; 9],
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mat3 {
    pub const fn identity() -> Self {
        Self {
            m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        }
    }

    pub const fn from_rows(m: [f32; 9]) -> Self {
        Self { m }
    }

    /// Orthographic projection mapping a `width`x`height` pixel space onto
    /// clip space with a top-left origin.
    pub fn orthographic(width: f32, height: f32) -> Self {
        let width = width.max(1.0);
        let height = height.max(1.0);
        Self::from_rows([
            2.0 / width,
            0.0,
            -1.0,
            0.0,
            -2.0 / height,
            1.0,
            0.0,
            0.0,
            1.0,
        ])
    }

    /// Returns `self * other`.
    pub fn multiply(&self, other: &Mat3) -> Mat3 {
        let a = &self.m;
        let b = &other.m;
        let mut out = [0.0f32; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = (0..3).map(|k| a[row * 3 + k] * b[k * 3 + col]).sum();
            }
        }
        Mat3 { m: out }
    }

    pub fn translate(&self, offset: Vec2) -> Mat3 {
        let translation = Mat3::from_rows([
            1.0,
            0.0,
            offset.x as f32,
            0.0,
            1.0,
            offset.y as f32,
            0.0,
            0.0,
            1.0,
        ]);
        self.multiply(&translation)
    }

    pub fn scale(&self, factor: Vec2) -> Mat3 {
        let scaling = Mat3::from_rows([
            factor.x as f32,
            0.0,
            0.0,
            0.0,
            factor.y as f32,
            0.0,
            0.0,
            0.0,
            1.0,
        ]);
        self.multiply(&scaling)
    }

    /// Maps the unit quad onto `rect` and then through `self`.
    pub fn project_box(&self, rect: &Rect) -> Mat3 {
        let placement = Mat3::identity()
            .translate(rect.position())
            .scale(rect.size());
        self.multiply(&placement)
    }

    pub fn transform_point(&self, point: Vec2) -> Vec2 {
        let m = &self.m;
        let (x, y) = (point.x as f32, point.y as f32);
        Vec2::new(
            f64::from(m[0] * x + m[1] * y + m[2]),
            f64::from(m[3] * x + m[4] * y + m[5]),
        )
    }

    /// Column-major element order expected by `glUniformMatrix3fv` without transpose.
    pub fn to_gl(&self) -> [f32; 9] {
        let m = &self.m;
        [m[0], m[3], m[6], m[1], m[4], m[7], m[2], m[5], m[8]]
    }
}
